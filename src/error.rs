use crate::collections::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pool not running")]
    NotRunning,

    #[error("pool still running, call stop() before finalize()")]
    StillRunning,

    #[error("pool already finalized")]
    AlreadyFinalized,

    #[error("runtime not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("teardown error: {0}")]
    Teardown(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn teardown<S: Into<String>>(msg: S) -> Self {
        Error::Teardown(msg.into())
    }

    /// True for errors caused by calling the pool in the wrong lifecycle state.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Error::NotRunning | Error::StillRunning | Error::AlreadyFinalized
        )
    }
}
