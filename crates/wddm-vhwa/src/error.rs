use thiserror::Error;
use vhwa_protocol::{DecodeError, HostRc, VhwaCmdType};
use wddm_util::{CollectionError, Handle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VhwaError {
    #[error("command heap exhausted")]
    NoMemory,

    #[error("host failed {cmd:?} with rc {rc}")]
    HostFailure { cmd: VhwaCmdType, rc: HostRc },

    #[error("video source {0} does not exist")]
    InvalidSource(u32),

    #[error("invalid overlay handle {0:?}")]
    InvalidHandle(Handle),

    #[error("overlay acceleration is not enabled on source {0}")]
    NotEnabled(u32),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Collection(#[from] CollectionError),
}

impl VhwaError {
    /// Resource exhaustion on the guest side, as opposed to a host or caller error.
    pub fn is_no_memory(&self) -> bool {
        matches!(
            self,
            VhwaError::NoMemory | VhwaError::Collection(CollectionError::NoMemory)
        )
    }
}

pub type Result<T, E = VhwaError> = std::result::Result<T, E>;
