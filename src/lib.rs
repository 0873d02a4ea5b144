//! Exsearch: exhaustive best-subset selection for generalized linear models
//!
//! # Overview
//!
//! Exsearch fits a generalized linear model for **every** subset of up to
//! `kmax` candidate predictors, scores each fit with AIC or (held-out) MSE,
//! and returns the top models. For the Gaussian family the search space
//! easily exceeds 10^8 fits, so the whole crate is organized around making
//! that tractable: a cheap "next combination" operator, an offline partition
//! of the search space into balanced batches, one worker thread per batch
//! with a private bounded ranking, and a provably safe merge of the
//! per-worker rankings.
//!
//! # Modules
//!
//! ## Data and Parameter Management
//! * `param` - Manages parameter configurations.
//! * `data` - Holds the training and optional held-out matrices.
//!
//! ## Search Components
//! * `combination` - Canonical subset enumeration and batch partitioning.
//! * `model` - The per-combination GLM fit kernel (OLS / logistic).
//! * `ranking` - Bounded top-R rankings and their cross-worker merge.
//!
//! ## Execution
//! * `search` - The parallel search driver.
//! * `status` - Progress row formatting for the status reporter.
//! * `error` - The crate's error type.
#![allow(non_snake_case)]

/// Canonical subset enumeration and batch partitioning.
pub mod combination;
/// Holds the training and optional held-out matrices.
pub mod data;
/// The crate's error type.
pub mod error;
/// The per-combination GLM fit kernel.
pub mod model;
/// Manages parameter configurations.
pub mod param;
/// Bounded top-R rankings and their cross-worker merge.
pub mod ranking;
/// The parallel search driver.
pub mod search;
/// Progress row formatting for the status reporter.
pub mod status;

pub use crate::data::DataSet;
pub use crate::error::SearchError;
pub use crate::model::{Family, Glm, Performance};
pub use crate::param::Param;
pub use crate::ranking::ScoredCombination;
pub use crate::search::SearchSummary;

use log::{debug, warn};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Version string reported in summaries, including the build-time git SHA.
pub(crate) fn version() -> String {
    let git_hash = option_env!("EXSEARCH_GIT_SHA").unwrap_or("unknown");
    format!("{}#{}", env!("CARGO_PKG_VERSION"), git_hash)
}

/// Executes a complete search from parameter configuration.
///
/// # Arguments
///
/// * `param` - Reference to parameter configuration
/// * `running` - Atomic flag to control execution state
///
/// # Description
///
/// * Loads training data from the file paths specified in parameters
/// * Loads the optional held-out set when both test paths are given
/// * Prepends the intercept column when configured
/// * Runs the exhaustive evaluation and returns the ranked summary
///
/// Clearing `running` cancels the search at the next worker checkpoint and
/// surfaces [`SearchError::Interrupted`].
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<SearchSummary, SearchError> {
    let mut data = DataSet::load_data(&param.data.X, &param.data.y).map_err(|e| {
        SearchError::Data(format!(
            "could not read {} / {}: {}",
            param.data.X, param.data.y, e
        ))
    })?;

    if !param.data.Xtest.is_empty() && !param.data.ytest.is_empty() {
        debug!("Loading test data...");
        let test = DataSet::load_data(&param.data.Xtest, &param.data.ytest).map_err(|e| {
            SearchError::Data(format!(
                "could not read {} / {}: {}",
                param.data.Xtest, param.data.ytest, e
            ))
        })?;
        if test.X.ncols() == data.X.ncols() {
            data.set_test(test.X, test.y);
        } else {
            warn!("Test data is not compatible with training data: feature counts differ. Ignoring test data.");
        }
    }

    run_on_data(data, param, running)
}

/// Executes a search on matrices already in memory.
///
/// `data` holds the raw candidate predictors; the intercept column is
/// prepended here when `param.search.intercept` is set, so callers never
/// build it themselves.
///
/// # Notes
///
/// This entry point is meant for embedders that parse or generate their data
/// elsewhere and only need the search machinery.
pub fn run_on_data(
    mut data: DataSet,
    param: &Param,
    running: Arc<AtomicBool>,
) -> Result<SearchSummary, SearchError> {
    if param.search.intercept {
        data.add_intercept_column();
    }
    search::search(&data, param, running)
}
