// can-transceiver/src/id.rs
//
// Implements CANbus Identifiers.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Implementation of CANbus standard and extended identifiers.
//!
//! The transceiver is configured with plain integer identifiers. The width
//! is inferred from the magnitude: values up to 0x7FF are standard (11-bit)
//! IDs, anything larger, up to 0x1FFF_FFFF, is an extended (29-bit) ID.

use crate::{Error, Result};
use bitflags::bitflags;
use embedded_can::{ExtendedId, Id, StandardId};
use libc::canid_t;
use std::fmt;

pub use libc::{
    CAN_EFF_FLAG, CAN_EFF_MASK, CAN_ERR_FLAG, CAN_ERR_MASK, CAN_MAX_DLEN, CAN_RTR_FLAG,
    CAN_SFF_MASK,
};

bitflags! {
    /// Bit flags in the composite SocketCAN ID word.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct IdFlags: canid_t {
        /// Indicates frame uses a 29-bit extended ID
        const EFF = CAN_EFF_FLAG;
        /// Indicates a remote request frame.
        const RTR = CAN_RTR_FLAG;
        /// Indicates an error frame.
        const ERR = CAN_ERR_FLAG;
    }
}

/// Gets the canid_t value from an Id
/// If it's an extended ID, the CAN_EFF_FLAG bit is also set.
pub fn id_to_canid_t(id: impl Into<Id>) -> canid_t {
    use Id::*;
    match id.into() {
        Standard(id) => id.as_raw() as canid_t,
        Extended(id) => id.as_raw() | CAN_EFF_FLAG,
    }
}

/// Creates a CAN ID from a raw integer value.
///
/// If the `id` is <= 0x7FF, it's assumed to be a standard ID, otherwise
/// it is created as an Extened ID.
pub fn id_from_raw(id: u32) -> Option<Id> {
    let id = match id {
        n if n <= CAN_SFF_MASK => StandardId::new(n as u16)?.into(),
        n => ExtendedId::new(n)?.into(),
    };
    Some(id)
}

/////////////////////////////////////////////////////////////////////////////
/// A CAN identifier that can be standard or extended.
///
/// This is similar to and generally interchangeable with
/// [embedded_can::Id](https://docs.rs/embedded-can/latest/embedded_can/enum.Id.html)
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CanId {
    /// Standard 11-bit Identifier (`0..=0x7FF`).
    Standard(StandardId),
    /// Extended 29-bit Identifier (`0..=0x1FFF_FFFF`).
    Extended(ExtendedId),
}

impl CanId {
    /// Creates a standard, 11-bit, ID
    pub fn standard(id: u16) -> Option<Self> {
        let id = StandardId::new(id)?;
        Some(Self::Standard(id))
    }

    /// Creates an extended, 29-bit, ID
    pub fn extended(id: u32) -> Option<Self> {
        let id = ExtendedId::new(id)?;
        Some(Self::Extended(id))
    }

    /// Gets the embedded_can::Id representation of the value.
    pub fn as_id(&self) -> Id {
        use CanId::*;
        match self {
            Standard(id) => Id::Standard(*id),
            Extended(id) => Id::Extended(*id),
        }
    }

    /// Gets the raw numeric value of the ID
    pub fn as_raw(&self) -> u32 {
        use CanId::*;
        match self {
            Standard(id) => id.as_raw() as u32,
            Extended(id) => id.as_raw(),
        }
    }

    /// Gets the composite SocketCAN ID word, with the EFF flag set for
    /// extended IDs.
    pub fn as_canid_t(&self) -> canid_t {
        id_to_canid_t(*self)
    }

    /// Gets the mask covering all the valid bits for an ID of this width.
    pub fn mask(&self) -> canid_t {
        match self {
            CanId::Standard(_) => CAN_SFF_MASK,
            CanId::Extended(_) => CAN_EFF_MASK,
        }
    }

    /// Determines if the ID is a standard, 11-bit, ID.
    #[inline]
    pub fn is_standard(&self) -> bool {
        matches!(self, CanId::Standard(_))
    }

    /// Determines if the ID is an extended, 29-bit, ID.
    #[inline]
    pub fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CanId::Standard(_) => write!(f, "{:03X}", self.as_raw()),
            CanId::Extended(_) => write!(f, "{:08X}", self.as_raw()),
        }
    }
}

impl From<StandardId> for CanId {
    #[inline]
    fn from(id: StandardId) -> Self {
        Self::Standard(id)
    }
}

impl From<ExtendedId> for CanId {
    #[inline]
    fn from(id: ExtendedId) -> Self {
        Self::Extended(id)
    }
}

impl From<Id> for CanId {
    /// Gets the embedded_can::Id representation of the value.
    fn from(id: Id) -> Self {
        use Id::*;
        match id {
            Standard(id) => Self::Standard(id),
            Extended(id) => Self::Extended(id),
        }
    }
}

impl From<CanId> for Id {
    #[inline]
    fn from(id: CanId) -> Self {
        id.as_id()
    }
}

/// Creates a CAN ID from a raw integer value.
///
/// If the `id` is <= 0x7FF, it's assumed to be a standard ID, otherwise
/// it is created as an Extened ID.
impl TryFrom<u32> for CanId {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        id_from_raw(id)
            .map(CanId::from)
            .ok_or(Error::InvalidId { id })
    }
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use proptest::prelude::*;

    // A standard ID
    const ID: u32 = 0x100;

    #[test]
    fn test_id_conv() {
        let sid = StandardId::MAX;
        let id = CanId::from(sid);

        assert!(id.is_standard());
        assert!(matches!(id, CanId::Standard(_)));
        assert_eq!(id.as_raw(), sid.as_raw() as u32);

        let eid = ExtendedId::MAX;
        let id = CanId::from(eid);

        assert!(id.is_extended());
        assert!(matches!(id, CanId::Extended(_)));
        assert_eq!(id.as_raw(), eid.as_raw());

        let sid = Id::from(StandardId::MAX);
        let id = CanId::from(sid);

        assert!(id.is_standard());
        assert_eq!(Id::from(id), sid);
    }

    #[test]
    fn test_id_raw() {
        let id = CanId::try_from(ID).unwrap();
        assert!(matches!(id, CanId::Standard(_)));
        assert_eq!(id.as_raw(), ID);
        assert_eq!(id.as_canid_t(), ID);
        assert_eq!(id.to_string(), "100");
    }

    #[test]
    fn test_id_boundaries() {
        let id = CanId::try_from(0x7FF).unwrap();
        assert!(id.is_standard());
        assert_eq!(id.mask(), CAN_SFF_MASK);

        let id = CanId::try_from(0x800).unwrap();
        assert!(id.is_extended());
        assert_eq!(id.mask(), CAN_EFF_MASK);
        assert_eq!(id.as_canid_t(), 0x800 | CAN_EFF_FLAG);
        assert_eq!(id.to_string(), "00000800");

        let id = CanId::try_from(CAN_EFF_MASK).unwrap();
        assert!(id.is_extended());

        let err = CanId::try_from(CAN_EFF_MASK + 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    proptest! {
        #[test]
        fn standard_ids_have_no_eff_flag(raw in 0u32..=CAN_SFF_MASK) {
            let id = CanId::try_from(raw).unwrap();
            prop_assert!(id.is_standard());
            prop_assert_eq!(id.as_canid_t(), raw);
            prop_assert_eq!(id.mask(), CAN_SFF_MASK);
        }

        #[test]
        fn extended_ids_carry_eff_flag(raw in (CAN_SFF_MASK + 1)..=CAN_EFF_MASK) {
            let id = CanId::try_from(raw).unwrap();
            prop_assert!(id.is_extended());
            prop_assert_eq!(id.as_canid_t(), raw | CAN_EFF_FLAG);
            prop_assert_eq!(id.mask(), CAN_EFF_MASK);
        }
    }
}
