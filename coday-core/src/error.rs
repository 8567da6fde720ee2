use coday_protocol::ThreadId;

/// Errors surfaced by the core. Recoverable failures (tool errors, transient
/// provider failures) never reach this type — they are captured as events
/// (§7); this type is for failures that must propagate out of `run()` or a
/// repository call.
#[derive(Debug, thiserror::Error)]
pub enum CodayError {
    #[error("thread not found: {0}")]
    ThreadNotFound(ThreadId),

    #[error("repository I/O error")]
    Repository(#[source] std::io::Error),

    #[error("repository directory could not be initialized")]
    RepositoryInit(#[source] std::io::Error),

    #[error("provider request failed")]
    Provider(#[source] anyhow::Error),

    #[error("max tokens reached")]
    MaxTokens,

    #[error("cost threshold exceeded")]
    CostThresholdExceeded,

    #[error("config merge error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CodayError>;
