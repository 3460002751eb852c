use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key not found")]
    KeyNotFound,

    /// The buffer pool had no frame to give. The index treats this as
    /// fatal; it cannot make progress without its pages.
    #[error("buffer pool is out of frames")]
    PoolExhausted,

    #[error("corrupt tree page: {0}")]
    CorruptPage(String),

    #[error(transparent)]
    Codec(#[from] anyhow::Error),
}
