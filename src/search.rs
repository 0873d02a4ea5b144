use crate::combination::{next_combination, CombinationSet};
use crate::data::DataSet;
use crate::error::SearchError;
use crate::model::{Family, Glm};
use crate::param::Param;
use crate::ranking::{self, Ranking, ScoredCombination};
use crate::status::StatusLog;
use chrono::Local;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Coarse-grained progress commit intervals. A binomial fit runs a full
/// optimizer and is orders of magnitude slower than the closed-form Gaussian
/// one, so it reports far more often.
const UPDATE_AFTER_GAUSSIAN: u64 = 50_000;
const UPDATE_AFTER_BINOMIAL: u64 = 500;
const PRINT_INTERVAL_SEC: u64 = 5;
const STATUS_POLL: Duration = Duration::from_millis(500);

/// Everything a completed search reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub version: String,
    pub timestamp: String,
    pub runtime_s: f64,
    /// Scores ascending (best first), aligned with `combinations`
    pub scores: Vec<f64>,
    /// 1-based candidate indices, the implicit intercept not counted
    pub combinations: Vec<Vec<u32>>,
    pub evaluated: u64,
    pub n_combinations: u64,
    pub n_threads: usize,
    pub n_batches: usize,
    pub batch_sizes: Vec<u64>,
    /// Start cursor of each batch (diagnostics; `[0]` is the sentinel)
    pub batch_starts: Vec<Vec<u32>>,
}

/// Fit counter shared by all workers, with the condition variable the status
/// reporter sleeps on.
struct Progress {
    completed: Mutex<u64>,
    tick: Condvar,
}

/// Evaluate every combination of up to `kmax` candidates, in parallel, and
/// return the `n_results` best models.
///
/// `data` must already carry the intercept column when `param.search.intercept`
/// is set (see [`crate::run_on_data`]). Clearing `running` makes every worker
/// stop at its next progress checkpoint; the workers are then joined and
/// [`SearchError::Interrupted`] is returned without a partial ranking.
pub fn search(
    data: &DataSet,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<SearchSummary, SearchError> {
    let (n_candidates, k_max) = validate(data, param)?;

    let start = Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let n_threads = if param.general.thread_number > 0 {
        param.general.thread_number
    } else {
        thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
    };

    let combs = CombinationSet::new(n_candidates as u32, k_max as u32, n_threads)?;
    let n_batches = combs.n_batches();
    info!(
        "Exhaustive search over {} combinations of up to {} of {} predictors ({} batches)",
        combs.n_combinations(),
        k_max,
        n_candidates,
        n_batches
    );
    debug!("Batch sizes: {:?}", combs.batch_sizes());

    let progress = Progress {
        completed: Mutex::new(0),
        tick: Condvar::new(),
    };
    let update_after = match param.search.family {
        Family::Gaussian => UPDATE_AFTER_GAUSSIAN,
        Family::Binomial => UPDATE_AFTER_BINOMIAL,
    };

    let locals: Vec<(Ranking, u64)> = thread::scope(|scope| {
        let mut workers = Vec::with_capacity(n_batches);
        for batch in 0..n_batches {
            let combs = &combs;
            let progress = &progress;
            let running = running.as_ref();
            workers.push(scope.spawn(move || {
                scan_batch(batch, data, param, combs, progress, running, update_after)
            }));
        }

        // The spawning thread does no fits; it drives the status reporter
        // until the workers finish or the host cancels
        track_status(
            &progress,
            &running,
            combs.n_combinations(),
            param.general.quietly,
        );

        workers
            .into_iter()
            .map(|worker| worker.join().expect("search worker panicked"))
            .collect()
    });

    let evaluated = *progress
        .completed
        .lock()
        .expect("progress mutex poisoned");

    if !running.load(Ordering::Relaxed) {
        return Err(SearchError::Interrupted);
    }

    // Merge the per-worker rankings under the safe cutoff and drain ascending
    let merged = ranking::merge(locals, param.search.n_results);
    let (scores, combinations): (Vec<f64>, Vec<Vec<u32>>) = merged
        .into_sorted()
        .into_iter()
        .map(|entry| (entry.score, entry.combination))
        .unzip();

    Ok(SearchSummary {
        version: crate::version(),
        timestamp,
        runtime_s: start.elapsed().as_secs_f64(),
        scores,
        combinations,
        evaluated,
        n_combinations: combs.n_combinations(),
        n_threads: n_batches,
        n_batches,
        batch_sizes: combs.batch_sizes().to_vec(),
        batch_starts: combs.batch_limits()[..n_batches].to_vec(),
    })
}

/// Walk one contiguous range of the enumeration, fitting every combination
/// and retaining the local top `n_results`. Returns the local ranking and the
/// number of fits performed.
fn scan_batch(
    batch: usize,
    data: &DataSet,
    param: &Param,
    combs: &CombinationSet,
    progress: &Progress,
    running: &AtomicBool,
    update_after: u64,
) -> (Ranking, u64) {
    let n = combs.n();
    let mut cursor = combs.batch_limits()[batch].clone();
    let stop = &combs.batch_limits()[batch + 1];

    let mut model = Glm::new(
        data,
        param.search.family,
        param.search.performance,
        param.search.intercept,
        param.search.error_value,
        param.search.accept_stalled_fit,
    );
    let mut local = Ranking::new(param.search.n_results);
    let mut iterations: u64 = 0;

    // The stop cursor belongs to this batch and is the last combination
    // evaluated here; the next batch starts right after it
    while &cursor != stop {
        next_combination(&mut cursor, n);

        model.set_feature_combination(&cursor);
        model.fit();
        local.push(ScoredCombination {
            score: model.score(),
            combination: cursor.clone(),
        });
        iterations += 1;

        // Commit progress in coarse batches; the same point doubles as the
        // cancellation checkpoint
        if iterations % update_after == 0 {
            let mut completed = progress.completed.lock().expect("progress mutex poisoned");
            *completed += update_after;
            progress.tick.notify_one();
            drop(completed);

            if !running.load(Ordering::Relaxed) {
                return (local, iterations);
            }
        }
    }

    // Flush the remainder and wake the reporter one last time
    let mut completed = progress.completed.lock().expect("progress mutex poisoned");
    *completed += iterations % update_after;
    drop(completed);
    progress.tick.notify_one();

    (local, iterations)
}

/// Status loop of the spawning thread: sleeps on the progress condition
/// variable, prints a row at most every `PRINT_INTERVAL_SEC` seconds, and
/// returns once the search is complete or cancelled.
fn track_status(progress: &Progress, running: &AtomicBool, total: u64, quietly: bool) {
    let log = StatusLog::new(total);
    if !quietly {
        let header = log.header();
        if !header.is_empty() {
            info!("{}", header);
        }
    }

    let mut last_print = Instant::now();
    let mut completed = progress.completed.lock().expect("progress mutex poisoned");
    while *completed < total && running.load(Ordering::Relaxed) {
        let (guard, _) = progress
            .tick
            .wait_timeout(completed, STATUS_POLL)
            .expect("progress mutex poisoned");
        completed = guard;

        if !quietly && last_print.elapsed().as_secs() >= PRINT_INTERVAL_SEC {
            let row = log.status(*completed);
            if !row.is_empty() {
                info!("{}", row);
            }
            last_print = Instant::now();
        }
    }
    let final_count = *completed;
    drop(completed);

    if !quietly {
        let footer = log.footer(final_count);
        if !footer.is_empty() {
            info!("{}", footer);
        }
    }
}

/// Configuration checks, all performed before any worker starts. Returns the
/// candidate count and the resolved `k_max`.
fn validate(data: &DataSet, param: &Param) -> Result<(usize, usize), SearchError> {
    let n_samples = data.X.nrows();
    if n_samples == 0 {
        return Err(SearchError::Config("training data is empty".to_string()));
    }
    if data.y.len() != n_samples {
        return Err(SearchError::Config(format!(
            "y has {} responses for {} training samples",
            data.y.len(),
            n_samples
        )));
    }

    let offset = if param.search.intercept { 1 } else { 0 };
    if data.X.ncols() <= offset {
        return Err(SearchError::Config(
            "there are no candidate predictors beyond the intercept".to_string(),
        ));
    }
    if param.search.intercept && data.X.column(0).iter().any(|&v| v != 1.0) {
        return Err(SearchError::Config(
            "intercept is set but column 0 of X is not constant 1".to_string(),
        ));
    }
    let n_candidates = data.X.ncols() - offset;

    let k_max = if param.search.kmax == 0 {
        n_candidates
    } else {
        param.search.kmax
    };
    if k_max > n_candidates {
        return Err(SearchError::Config(format!(
            "kmax {} exceeds the {} candidate predictors",
            k_max, n_candidates
        )));
    }

    if param.search.n_results == 0 {
        return Err(SearchError::Config(
            "n_results must be at least 1".to_string(),
        ));
    }

    if param.search.family == Family::Binomial
        && data.y.iter().any(|&v| v != 0.0 && v != 1.0)
    {
        return Err(SearchError::Config(
            "binomial responses must be 0 or 1".to_string(),
        ));
    }

    match (&data.X_test, &data.y_test) {
        (Some(x_test), Some(y_test)) => {
            if x_test.ncols() != data.X.ncols() {
                return Err(SearchError::Config(format!(
                    "test set has {} columns but the training set has {}",
                    x_test.ncols(),
                    data.X.ncols()
                )));
            }
            if y_test.len() != x_test.nrows() {
                return Err(SearchError::Config(format!(
                    "y_test has {} responses for {} test samples",
                    y_test.len(),
                    x_test.nrows()
                )));
            }
        }
        (None, None) => {}
        _ => {
            return Err(SearchError::Config(
                "test data needs both X_test and y_test".to_string(),
            ));
        }
    }

    Ok((n_candidates, k_max))
}
