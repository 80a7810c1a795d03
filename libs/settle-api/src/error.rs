/// Failure of a single analysis call.
///
/// The batching core never retries: the error is logged and the next message
/// in the batch is analyzed.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// The analysis service could not be reached.
    #[error("transport: {0}")]
    Transport(String),

    /// The analysis service answered with a non-success status.
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    /// The analyzer refused the message.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl AnalyzeError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
