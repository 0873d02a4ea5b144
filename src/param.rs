use crate::model::{Family, Performance};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    pub search: Search,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct General {
    /// 0 requests one worker per available hardware thread
    #[serde(default = "thread_number_default")]
    pub thread_number: usize,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    /// Suppress the periodic status rows
    #[serde(default)]
    pub quietly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String, // Path to X data
    #[serde(default = "empty_string")]
    pub y: String, // Path to y data
    #[serde(default = "empty_string")]
    pub Xtest: String,
    #[serde(default = "empty_string")]
    pub ytest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Search {
    #[serde(default = "family_default")]
    pub family: Family,
    #[serde(default = "performance_default")]
    pub performance: Performance,
    /// Force an intercept term into every fitted subset
    #[serde(default = "intercept_default")]
    pub intercept: bool,
    /// Largest subset size to enumerate; 0 means up to all candidates
    #[serde(default = "kmax_default")]
    pub kmax: usize,
    /// Number of top models to keep
    #[serde(default = "n_results_default")]
    pub n_results: usize,
    /// Score assigned to combinations whose fit fails numerically
    #[serde(default = "error_value_default")]
    pub error_value: f64,
    /// Accept a positive finite log-likelihood written by an optimizer run
    /// that reported failure (the historical behavior)
    #[serde(default = "accept_stalled_fit_default")]
    pub accept_stalled_fit: bool,
}

pub fn get(param_file: String) -> Result<Param, Box<dyn Error>> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let config: Param = serde_yaml::from_reader(param_reader)?;

    Ok(config)
}

impl Default for Param {
    fn default() -> Param {
        Param {
            general: General::default(),
            data: Data::default(),
            search: Search::default(),
        }
    }
}

impl Default for General {
    fn default() -> General {
        General {
            thread_number: thread_number_default(),
            log_level: log_level_default(),
            quietly: false,
        }
    }
}

impl Default for Data {
    fn default() -> Data {
        Data {
            X: empty_string(),
            y: empty_string(),
            Xtest: empty_string(),
            ytest: empty_string(),
        }
    }
}

impl Default for Search {
    fn default() -> Search {
        Search {
            family: family_default(),
            performance: performance_default(),
            intercept: intercept_default(),
            kmax: kmax_default(),
            n_results: n_results_default(),
            error_value: error_value_default(),
            accept_stalled_fit: accept_stalled_fit_default(),
        }
    }
}

fn empty_string() -> String {
    "".to_string()
}
fn thread_number_default() -> usize {
    0
}
fn log_level_default() -> String {
    "info".to_string()
}
fn family_default() -> Family {
    Family::Gaussian
}
fn performance_default() -> Performance {
    Performance::Aic
}
fn intercept_default() -> bool {
    true
}
fn kmax_default() -> usize {
    0
}
fn n_results_default() -> usize {
    100
}
fn error_value_default() -> f64 {
    f64::INFINITY
}
fn accept_stalled_fit_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let param: Param = serde_yaml::from_str("search:\n  family: binomial\n").unwrap();
        assert_eq!(param.search.family, Family::Binomial);
        assert_eq!(param.search.performance, Performance::Aic);
        assert!(param.search.intercept);
        assert_eq!(param.search.kmax, 0);
        assert_eq!(param.search.n_results, 100);
        assert!(param.search.error_value.is_infinite());
        assert!(param.search.accept_stalled_fit);
        assert_eq!(param.general.thread_number, 0);
        assert_eq!(param.general.log_level, "info");
        assert!(!param.general.quietly);
        assert_eq!(param.data.X, "");
    }

    #[test]
    fn full_yaml_overrides_defaults() {
        let yaml = "general:\n  thread_number: 4\n  quietly: true\n\
                    data:\n  X: Xtrain.tsv\n  y: ytrain.tsv\n\
                    search:\n  family: gaussian\n  performance: mse\n  intercept: false\n  kmax: 3\n  n_results: 10\n  error_value: 1e30\n";
        let param: Param = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(param.general.thread_number, 4);
        assert!(param.general.quietly);
        assert_eq!(param.data.X, "Xtrain.tsv");
        assert_eq!(param.search.performance, Performance::Mse);
        assert!(!param.search.intercept);
        assert_eq!(param.search.kmax, 3);
        assert_eq!(param.search.n_results, 10);
        assert_eq!(param.search.error_value, 1e30);
    }
}
