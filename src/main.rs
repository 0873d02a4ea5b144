use exsearch::{param, run};
use log::{error, info};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn main() {
    let param_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "param.yaml".to_string());
    let param = match param::get(param_path.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("ERROR! Could not read {}: {}", param_path, e);
            process::exit(1);
        }
    };

    flexi_logger::Logger::try_with_env_or_str(&param.general.log_level)
        .unwrap()
        .start()
        .unwrap();

    let running = Arc::new(AtomicBool::new(true));
    match run(&param, running) {
        Ok(summary) => {
            info!(
                "Evaluated {} of {} combinations in {:.2}s on {} threads ({} batches)",
                summary.evaluated,
                summary.n_combinations,
                summary.runtime_s,
                summary.n_threads,
                summary.n_batches
            );
            for (i, (score, combination)) in summary
                .scores
                .iter()
                .zip(summary.combinations.iter())
                .enumerate()
            {
                info!(
                    "Model #{} [k={}]: {:?} {:.6} | features {:?}",
                    i + 1,
                    combination.len(),
                    param.search.performance,
                    score,
                    combination
                );
            }
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
