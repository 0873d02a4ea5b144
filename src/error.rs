use thiserror::Error;

/// Errors surfaced by the search entry points.
///
/// Numerical failures inside individual fits never reach this type: the
/// affected combination is scored with the configured error value and the
/// search continues (see [`crate::model::Glm`]).
#[derive(Error, Debug)]
pub enum SearchError {
    /// Rejected before any worker starts: bad shapes, `kmax` out of range,
    /// empty training data, and similar.
    #[error("invalid search configuration: {0}")]
    Config(String),

    /// The training or test files could not be read or parsed.
    #[error("could not load data: {0}")]
    Data(String),

    /// The host cleared the running flag; all workers were joined and no
    /// partial ranking is returned.
    #[error("execution aborted by the user")]
    Interrupted,
}
