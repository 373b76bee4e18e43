use bitflags::bitflags;

use crate::error::ensure_len;
use crate::wire::{Reader, Writer};
use crate::{DecodeError, HostRc};

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VhwaCmdType {
    SurfCanCreate = 1,
    SurfCreate = 2,
    SurfDestroy = 3,
    SurfLock = 4,
    SurfUnlock = 5,
    SurfBlt = 6,
    SurfFlip = 7,
    SurfOverlayUpdate = 8,
    SurfOverlaySetPosition = 9,
    SurfColorkeySet = 10,
    QueryInfo1 = 11,
    QueryInfo2 = 12,
    Enable = 13,
    Disable = 14,
    HhConstruct = 15,
    HhReset = 16,
    SurfGetInfo = 20,
}

impl VhwaCmdType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::SurfCanCreate,
            2 => Self::SurfCreate,
            3 => Self::SurfDestroy,
            4 => Self::SurfLock,
            5 => Self::SurfUnlock,
            6 => Self::SurfBlt,
            7 => Self::SurfFlip,
            8 => Self::SurfOverlayUpdate,
            9 => Self::SurfOverlaySetPosition,
            10 => Self::SurfColorkeySet,
            11 => Self::QueryInfo1,
            12 => Self::QueryInfo2,
            13 => Self::Enable,
            14 => Self::Disable,
            15 => Self::HhConstruct,
            16 => Self::HhReset,
            20 => Self::SurfGetInfo,
            _ => return None,
        })
    }
}

bitflags! {
    /// `Flags` word of the command header.
    ///
    /// `HG_*` bits are set by the host, `GH_*` bits by the guest.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VhwaCmdFlags: u32 {
        /// Guest asks for completion through its event path.
        const GH_ASYNCH_EVENT = 0x0000_0001;
        /// Guest asks for a completion interrupt.
        const GH_ASYNCH_IRQ = 0x0000_0002;
        /// Guest does not need to be told about completion.
        const GH_ASYNCH_NOCOMPLETION = 0x0000_0004;
        /// Host accepted the command for asynchronous processing.
        const HG_ASYNCH = 0x0001_0000;
        /// Host finished an asynchronous command before returning from submission.
        const HG_ASYNCH_RETURNED = 0x0002_0000;
        /// Host will raise an interrupt on completion.
        const HG_ASYNCH_IRQ = 0x0004_0000;
        /// Host-originated command.
        const HH_CMD = 0x1000_0000;
    }
}

impl VhwaCmdFlags {
    /// Whether the guest must run the completion callback right after submission.
    ///
    /// True when the host completed the command synchronously, or completed it asynchronously
    /// but will not deliver a later completion because the guest asked for none.
    pub fn completes_inline(self) -> bool {
        !self.contains(Self::HG_ASYNCH)
            || self.contains(Self::GH_ASYNCH_NOCOMPLETION | Self::HG_ASYNCH_RETURNED)
    }
}

/// Fixed command header preceding every payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VhwaCmdHeader {
    pub cmd_type: u32,
    pub rc: HostRc,
    pub display: i32,
    pub flags: u32,
    pub guest_reserved1: u64,
    pub guest_reserved2: u64,
    pub refs: u32,
    pub reserved: i32,
    /// Next-command link or inline data, depending on the transport.
    pub link: u64,
}

impl VhwaCmdHeader {
    pub const SIZE_BYTES: usize = 48;

    pub fn cmd(&self) -> Result<VhwaCmdType, DecodeError> {
        VhwaCmdType::from_u32(self.cmd_type).ok_or(DecodeError::UnknownCommand(self.cmd_type))
    }

    pub fn write_le(&self, buf: &mut [u8]) -> Result<(), DecodeError> {
        ensure_len(buf, Self::SIZE_BYTES)?;
        Writer::new(buf)
            .u32(self.cmd_type)
            .i32(self.rc)
            .i32(self.display)
            .u32(self.flags)
            .u64(self.guest_reserved1)
            .u64(self.guest_reserved2)
            .u32(self.refs)
            .i32(self.reserved)
            .u64(self.link);
        Ok(())
    }

    pub fn decode_from_le_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        ensure_len(buf, Self::SIZE_BYTES)?;
        let mut r = Reader::new(buf);
        Ok(Self {
            cmd_type: r.u32(),
            rc: r.i32(),
            display: r.i32(),
            flags: r.u32(),
            guest_reserved1: r.u64(),
            guest_reserved2: r.u64(),
            refs: r.u32(),
            reserved: r.i32(),
            link: r.u64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_completion_rules() {
        assert!(VhwaCmdFlags::empty().completes_inline());
        assert!(VhwaCmdFlags::GH_ASYNCH_EVENT.completes_inline());
        assert!(!VhwaCmdFlags::HG_ASYNCH.completes_inline());
        assert!(!(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::HG_ASYNCH_RETURNED).completes_inline());
        assert!(!(VhwaCmdFlags::HG_ASYNCH | VhwaCmdFlags::GH_ASYNCH_NOCOMPLETION).completes_inline());
        assert!((VhwaCmdFlags::HG_ASYNCH
            | VhwaCmdFlags::HG_ASYNCH_RETURNED
            | VhwaCmdFlags::GH_ASYNCH_NOCOMPLETION)
            .completes_inline());
    }

    #[test]
    fn header_field_offsets() {
        let hdr = VhwaCmdHeader {
            cmd_type: VhwaCmdType::SurfFlip as u32,
            rc: -1,
            display: 2,
            flags: VhwaCmdFlags::HG_ASYNCH.bits(),
            refs: 1,
            ..Default::default()
        };
        let mut buf = [0xAAu8; VhwaCmdHeader::SIZE_BYTES];
        hdr.write_le(&mut buf).unwrap();

        assert_eq!(&buf[0..4], &7u32.to_le_bytes());
        assert_eq!(&buf[4..8], &(-1i32).to_le_bytes());
        assert_eq!(&buf[8..12], &2i32.to_le_bytes());
        assert_eq!(&buf[12..16], &0x0001_0000u32.to_le_bytes());
        assert_eq!(&buf[32..36], &1u32.to_le_bytes());
        assert_eq!(&buf[40..48], &[0u8; 8]);

        let back = VhwaCmdHeader::decode_from_le_bytes(&buf).unwrap();
        assert_eq!(back.cmd(), Ok(VhwaCmdType::SurfFlip));
    }

    #[test]
    fn unknown_type_is_reported() {
        let hdr = VhwaCmdHeader {
            cmd_type: 17,
            ..Default::default()
        };
        assert_eq!(hdr.cmd(), Err(DecodeError::UnknownCommand(17)));
        assert_eq!(
            VhwaCmdHeader::decode_from_le_bytes(&[0; 8]),
            Err(DecodeError::BufferTooSmall {
                needed: 48,
                found: 8
            })
        );
    }
}
