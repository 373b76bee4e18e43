use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer too small: need {needed} bytes, have {found}")]
    BufferTooSmall { needed: usize, found: usize },
    #[error("unknown VHWA command type {0}")]
    UnknownCommand(u32),
    #[error("FourCC count {found} exceeds the {capacity} entries the payload was sized for")]
    CountOverflow { found: u32, capacity: u32 },
}

pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.len() < needed {
        return Err(DecodeError::BufferTooSmall {
            needed,
            found: buf.len(),
        });
    }
    Ok(())
}
