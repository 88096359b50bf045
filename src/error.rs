/// Failure of a single reply generation, classified by the stage that failed.
///
/// Every variant is terminal for the invocation that produced it and none is
/// fatal to the process. Callers surface [`ReplyError::user_message`] and let
/// the user resubmit.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// The image bytes could not be read.
    #[error("failed to read image: {0}")]
    Encoding(#[source] std::io::Error),

    /// The remote call succeeded but no usable text came back.
    #[error("no reply was generated by the model")]
    EmptyGeneration,

    /// The remote endpoint answered with a non-200 status.
    #[error("remote API error {status}: {body}")]
    RemoteApi { status: u16, body: String },

    /// No status could be obtained, or the body could not be read or parsed.
    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ReplyError {
    pub(crate) fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ReplyError::Transport(Box::new(err))
    }

    /// Short machine-readable name of the failed stage.
    pub fn stage(&self) -> &'static str {
        match self {
            ReplyError::Encoding(_) => "encoding",
            ReplyError::EmptyGeneration => "generation",
            ReplyError::RemoteApi { .. } => "remote_api",
            ReplyError::Transport(_) => "transport",
        }
    }

    /// Human-readable message naming the stage and the raw diagnostic.
    pub fn user_message(&self) -> String {
        match self {
            ReplyError::Encoding(e) => format!("Error encoding image: {e}"),
            ReplyError::EmptyGeneration => "No response generated from API".to_string(),
            ReplyError::RemoteApi { status, body } => format!("API Error: {status} - {body}"),
            ReplyError::Transport(e) => format!("Error calling Gemini API: {e}"),
        }
    }
}

/// Why the engine did not accept a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Engine is still processing")]
    Busy,
    #[error("Engine has been stopped")]
    Stopped,
}

/// Startup configuration failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} not found in environment variables; set it in the environment or in a .env file")]
    MissingCredential { var: &'static str },

    #[error("failed to read {path}: {source}")]
    Dotenv {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
