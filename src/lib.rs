// can-transceiver/src/lib.rs
//
// The main lib file for the Rust CAN transceiver library.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! A point-to-point CAN transceiver over Linux SocketCAN.
//!
//! The Linux kernel supports using CAN-devices through a network-like API
//! (see <https://www.kernel.org/doc/Documentation/networking/can.txt>). This
//! crate uses that API to give an application a simple, single-peer view of
//! a CAN bus: receive the frames for one identifier, and transmit frames
//! under another.
//!
//! # An introduction to CAN
//!
//! The CAN bus was originally designed to allow microcontrollers inside a
//! vehicle to communicate over a single shared bus. Messages called
//! *frames* are multicast to all devices on the bus.
//!
//! Every frame consists of an ID and a payload of up to 8 bytes. If two
//! devices attempt to send a frame at the same time, the device with the
//! higher ID will notice the conflict, stop sending and reattempt to sent its
//! frame in the next time slot. This means that the lower the ID, the higher
//! the priority.
//!
//! IDs up to 0x7FF fit the 11-bit standard format. Anything larger, up to
//! 0x1FFFFFFF, is sent in the 29-bit extended format.
//!
//! # The transceiver
//!
//! A [`Transceiver`] is configured, with a [`DeviceConfig`], to read, to
//! write, or both. Reading happens on a background thread that hands each
//! matching frame to a handler; writing happens on the caller's thread.
//!
//! ```no_run
//! use can_transceiver::{DeviceConfig, Transceiver};
//!
//! let config = DeviceConfig::read_write(
//!     "vcan0",
//!     0x301,
//!     |frame| println!("{:X}", frame),
//!     0x300,
//! )?;
//!
//! let mut dev = Transceiver::open(config)?;
//! dev.read()?;
//! dev.send(&[0x01, 0x02])?;
//!
//! // Joins the receive thread, then closes the socket
//! dev.stop()?;
//! # Ok::<(), can_transceiver::Error>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![deny(unstable_features, unused_import_braces)]

use std::{mem::size_of, slice};

pub use embedded_can::{self, ExtendedId, Frame as EmbeddedFrame, Id, StandardId};

pub use std::io::{Error as IoError, ErrorKind as IoErrorKind, Result as IoResult};

pub mod errors;
pub use errors::{ConstructionError, Error, ErrorKind, Operation, Result, SetupStage};

pub mod addr;
pub use addr::CanAddr;

pub mod id;
pub use id::{CanId, IdFlags};

pub mod frame;
pub use frame::{CanFrame, Frame};

pub mod socket;
pub use socket::{CanFilter, CanSocket, ShouldRetry, SocketOptions, Transport};

pub mod config;
pub use config::{DeviceConfig, FrameHandler, Mode};

pub mod device;
pub use device::{RxState, Transceiver};

// ===== helper functions =====

/// Gets a byte slice for any sized variable.
///
/// Note that this should normally be unsafe, but since we're only
/// using it internally for types sent to the kernel, it's OK.
pub(crate) fn as_bytes<T: Sized>(val: &T) -> &[u8] {
    let sz = size_of::<T>();
    unsafe { slice::from_raw_parts::<'_, u8>(val as *const _ as *const u8, sz) }
}

/// Gets a mutable byte slice for any sized variable.
pub(crate) fn as_bytes_mut<T: Sized>(val: &mut T) -> &mut [u8] {
    let sz = size_of::<T>();
    unsafe { slice::from_raw_parts_mut(val as *mut _ as *mut u8, sz) }
}
