// can-transceiver/src/frame.rs
//
// Implements classic CANbus 2.0 frames for SocketCAN on Linux.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! CAN bus frames.
//!
//! At the lowest level, [libc](https://crates.io/crates/libc) defines the
//! CAN frame as a struct that is binary compatible with the C data type
//! sent to and from the kernel:
//! - [can_frame](https://docs.rs/libc/latest/libc/struct.can_frame.html)
//!   The Classic CAN 2.0 frame with up to 8 bytes of data.
//!
//! [`CanFrame`] wraps that struct. It is what the transceiver writes to the
//! bus and what it hands to the frame handler on the receive side.

use crate::{
    id::{id_to_canid_t, CanId, IdFlags, CAN_EFF_MASK, CAN_MAX_DLEN, CAN_SFF_MASK},
    ConstructionError,
};
use embedded_can::{ExtendedId, Frame as EmbeddedFrame, Id, StandardId};
use itertools::Itertools;
use libc::{can_frame, canid_t, CAN_RTR_FLAG};
use std::{fmt, mem};

pub use libc::CAN_MTU;

/// Creates a default C `can_frame`.
/// This initializes the entire structure to zeros.
#[inline(always)]
pub fn can_frame_default() -> can_frame {
    unsafe { mem::zeroed() }
}

// ===== Frame trait =====

/// Shared trait for CAN frames
#[allow(clippy::len_without_is_empty)]
pub trait Frame: EmbeddedFrame {
    /// Get the composite SocketCAN ID word, with EFF/RTR/ERR flags
    fn id_word(&self) -> canid_t;

    /// Return the actual raw CAN ID (without EFF/RTR/ERR flags)
    fn raw_id(&self) -> canid_t {
        let mask = if self.is_extended() {
            CAN_EFF_MASK
        } else {
            CAN_SFF_MASK
        };
        self.id_word() & mask
    }

    /// Returns the EFF/RTR/ERR flags from the ID word
    fn id_flags(&self) -> IdFlags {
        IdFlags::from_bits_truncate(self.id_word())
    }

    /// Return the CAN ID as a standard or extended `CanId`.
    fn can_id(&self) -> CanId {
        CanId::from(self.id())
    }

    /// Get the data length
    fn len(&self) -> usize {
        self.dlc()
    }

    /// Check if frame is an error message
    fn is_error_frame(&self) -> bool {
        self.id_flags().contains(IdFlags::ERR)
    }
}

// ===== CanFrame =====

/// The classic CAN 2.0 frame with up to 8-bytes of data.
///
/// This is highly compatible with the `can_frame` from libc.
/// ([ref](https://docs.rs/libc/latest/libc/struct.can_frame.html))
///
/// The identifier width is encoded in the ID word: an extended (29-bit)
/// identifier always carries the `CAN_EFF_FLAG` bit, a standard (11-bit)
/// one never does.
#[derive(Clone, Copy)]
pub struct CanFrame(can_frame);

impl CanFrame {
    /// Initializes a CAN frame from raw parts.
    pub fn init(can_id: canid_t, data: &[u8]) -> Result<Self, ConstructionError> {
        match data.len() {
            n if n <= CAN_MAX_DLEN => {
                let mut frame = can_frame_default();
                frame.can_id = can_id;
                frame.can_dlc = n as u8;
                frame.data[..n].copy_from_slice(data);
                Ok(Self(frame))
            }
            _ => Err(ConstructionError::TooMuchData),
        }
    }

    /// Creates a data frame from a raw integer ID.
    ///
    /// The width of the ID is inferred from its magnitude.
    pub fn from_raw_id(id: u32, data: &[u8]) -> Result<Self, ConstructionError> {
        let id = CanId::try_from(id).map_err(|_| ConstructionError::IDTooLarge)?;
        Self::init(id_to_canid_t(id), data)
    }

    /// Check if this is a remote transmission request.
    pub fn is_remote(&self) -> bool {
        self.id_flags().contains(IdFlags::RTR)
    }
}

impl EmbeddedFrame for CanFrame {
    /// Create a new CAN 2.0 data frame
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let can_id = id_to_canid_t(id);
        Self::init(can_id, data).ok()
    }

    /// Create a new remote transmission request frame.
    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > CAN_MAX_DLEN {
            return None;
        }
        let mut frame = can_frame_default();
        frame.can_id = id_to_canid_t(id) | CAN_RTR_FLAG;
        frame.can_dlc = dlc as u8;
        Some(Self(frame))
    }

    /// Check if frame uses 29-bit extended ID format.
    fn is_extended(&self) -> bool {
        self.id_flags().contains(IdFlags::EFF)
    }

    /// Check if frame is a remote transmission request.
    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    /// Return the frame identifier.
    fn id(&self) -> Id {
        // Masking keeps both values in range, so neither constructor fails.
        if self.is_extended() {
            ExtendedId::new(self.0.can_id & CAN_EFF_MASK)
                .map(Id::from)
                .unwrap_or(Id::Extended(ExtendedId::ZERO))
        } else {
            StandardId::new((self.0.can_id & CAN_SFF_MASK) as u16)
                .map(Id::from)
                .unwrap_or(Id::Standard(StandardId::ZERO))
        }
    }

    /// Data length
    fn dlc(&self) -> usize {
        self.0.can_dlc as usize
    }

    /// A slice into the actual data. Slice will always be <= 8 bytes in length
    fn data(&self) -> &[u8] {
        if self.is_remote() {
            return &[];
        }
        let n = (self.0.can_dlc as usize).min(CAN_MAX_DLEN);
        &self.0.data[..n]
    }
}

impl Frame for CanFrame {
    /// Get the composite SocketCAN ID word, with EFF/RTR/ERR flags
    fn id_word(&self) -> canid_t {
        self.0.can_id
    }
}

impl Default for CanFrame {
    /// The default frame has all fields and data set to zero, and all flags off.
    fn default() -> Self {
        Self(can_frame_default())
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CanFrame {{ ")?;
        fmt::UpperHex::fmt(self, f)?;
        write!(f, " }}")
    }
}

impl fmt::UpperHex for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}#", self.can_id())?;
        if self.is_remote() {
            return write!(f, "R{}", self.dlc());
        }
        let mut parts = self.data().iter().map(|v| format!("{:02X}", v));
        write!(f, "{}", parts.join(" "))
    }
}

impl From<can_frame> for CanFrame {
    /// Create a `CanFrame` from a C `can_frame` struct.
    fn from(frame: can_frame) -> Self {
        Self(frame)
    }
}

impl AsRef<can_frame> for CanFrame {
    fn as_ref(&self) -> &can_frame {
        &self.0
    }
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{CAN_EFF_FLAG, CAN_ERR_FLAG};

    const STD_ID: u32 = 0x301;
    const EXT_ID: u32 = 0x12345678;

    const DATA: &[u8] = &[0xAA, 0xBB, 0xCC, 0xDD];

    #[test]
    fn test_standard_frame() {
        let frame = CanFrame::from_raw_id(STD_ID, DATA).unwrap();

        assert!(!frame.is_extended());
        assert!(!frame.is_remote_frame());
        assert!(!frame.is_error_frame());
        assert_eq!(frame.id_word(), STD_ID);
        assert_eq!(frame.raw_id(), STD_ID);
        assert_eq!(frame.dlc(), 4);
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.data(), DATA);
        assert_eq!(frame.can_id(), CanId::standard(STD_ID as u16).unwrap());
    }

    #[test]
    fn test_extended_frame() {
        let frame = CanFrame::from_raw_id(EXT_ID, DATA).unwrap();

        assert!(frame.is_extended());
        assert_eq!(frame.id_word(), EXT_ID | CAN_EFF_FLAG);
        assert_eq!(frame.raw_id(), EXT_ID);
        assert!(frame.id_flags().contains(IdFlags::EFF));
        assert_eq!(frame.can_id(), CanId::extended(EXT_ID).unwrap());
    }

    #[test]
    fn test_too_much_data() {
        let data = [0u8; 9];
        assert_eq!(
            CanFrame::from_raw_id(STD_ID, &data).unwrap_err(),
            ConstructionError::TooMuchData
        );
        assert!(CanFrame::new(StandardId::ZERO, &data).is_none());
        assert_eq!(
            CanFrame::from_raw_id(CAN_EFF_MASK + 1, DATA).unwrap_err(),
            ConstructionError::IDTooLarge
        );
    }

    #[test]
    fn test_remote_frame() {
        let id = StandardId::new(0x100).unwrap();
        let frame = CanFrame::new_remote(id, 2).unwrap();

        assert!(frame.is_remote_frame());
        assert_eq!(frame.dlc(), 2);
        assert!(frame.data().is_empty());
        assert_eq!(format!("{:X}", frame), "100#R2");
        assert!(CanFrame::new_remote(id, 9).is_none());
    }

    #[test]
    fn test_error_frame() {
        let mut raw = can_frame_default();
        raw.can_id = CAN_ERR_FLAG | 0x04;
        assert!(CanFrame::from(raw).is_error_frame());
    }

    #[test]
    fn test_frame_bytes() {
        let frame = CanFrame::from_raw_id(STD_ID, DATA).unwrap();
        assert_eq!(crate::as_bytes(frame.as_ref()).len(), CAN_MTU);
    }

    #[test]
    fn test_hex_format() {
        let frame = CanFrame::from_raw_id(STD_ID, DATA).unwrap();
        assert_eq!(format!("{:X}", frame), "301#AA BB CC DD");
        assert_eq!(format!("{:?}", frame), "CanFrame { 301#AA BB CC DD }");

        let frame = CanFrame::from_raw_id(EXT_ID, &[1]).unwrap();
        assert_eq!(format!("{:X}", frame), "12345678#01");
    }
}
