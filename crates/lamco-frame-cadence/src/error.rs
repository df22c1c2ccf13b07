//! Error types for frame cadence operations
//!
//! Frame submission and reconfiguration never fail: once an adapter exists,
//! every operation is either applied on the execution context or silently
//! dropped because the adapter is shutting down. Errors only surface when
//! constructing an adapter or when a query cannot be answered.

use thiserror::Error;

/// Errors that can occur while creating or querying a frame cadence adapter
///
/// # Examples
///
/// ```no_run
/// # use lamco_frame_cadence::{CadenceConfig, CadenceError, FrameCadenceAdapter};
/// # async fn example() -> Result<(), CadenceError> {
/// let adapter = FrameCadenceAdapter::new(CadenceConfig::default())?;
///
/// match adapter.input_frame_rate_fps().await {
///     Ok(Some(fps)) => println!("Input rate: {} fps", fps),
///     Ok(None) => println!("Not enough samples yet"),
///     Err(CadenceError::AdapterClosed) => eprintln!("Adapter stopped"),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum CadenceError {
    /// Invalid configuration
    ///
    /// One or more [`CadenceConfig`](crate::CadenceConfig) values failed
    /// validation. The message lists every issue found.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No tokio runtime available
    ///
    /// The adapter spawns its execution context on the current tokio
    /// runtime, so it must be created from within one.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The execution context has stopped
    ///
    /// The adapter task exited before answering a query. This happens when
    /// the runtime is shutting down.
    #[error("Frame cadence adapter closed")]
    AdapterClosed,
}

/// Result type for frame cadence operations
pub type Result<T> = std::result::Result<T, CadenceError>;

impl CadenceError {
    /// Create an invalid config error from a list of validation issues
    pub(crate) fn invalid_config(issues: &[String]) -> Self {
        Self::InvalidConfig(issues.join("; "))
    }
}
