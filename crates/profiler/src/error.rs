use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("sampling session is already running")]
    AlreadyRunning,
    #[error("sampling session is not running")]
    NotRunning,
    #[error("sampling interval must be greater than zero")]
    ZeroInterval,
    #[error("failed to spawn sampler thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("current process is not visible to the metric source")]
    ProcessUnavailable,
    #[error("accelerator metrics unavailable: {0}")]
    Accelerator(String),
    #[error("metric source has no readings")]
    Empty,
}
