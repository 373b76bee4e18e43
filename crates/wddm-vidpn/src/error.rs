use thiserror::Error;
use wddm_util::CollectionError;

pub type Result<T> = std::result::Result<T, VidPnError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VidPnError {
    #[error("out of memory while building a mode set")]
    NoMemory,

    #[error("target {0} has no supported mode set")]
    UnknownTarget(u32),
}

impl From<CollectionError> for VidPnError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::NoMemory => Self::NoMemory,
        }
    }
}
