// can-transceiver/src/errors.rs
//
// Implements errors for the Rust CAN transceiver library on Linux.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Transceiver errors.
//!
//! Errors fall into three groups, according to when they can happen:
//!
//! - Setup errors ([`ErrorKind::Resource`]) abort construction of a
//!   device. No partially-initialized device is ever returned.
//! - Per-call errors ([`ErrorKind::Configuration`], [`ErrorKind::Validation`])
//!   are returned synchronously from the call that caused them.
//! - Receive-loop errors ([`ErrorKind::Transport`], [`ErrorKind::PeerClosed`])
//!   terminate the background loop and are handed to the owner when the
//!   receive thread is joined.
//!
//! Every error carries the interface name and, where there is one, the
//! identifier and the underlying OS error text.

use crate::IoError;
use std::fmt;

/// A result type for transceiver operations.
pub type Result<T> = std::result::Result<T, Error>;

// ===== Operation =====

/// The runtime operation that failed on a live device.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Reading frames on the receive thread.
    Receive,
    /// Writing a frame to the bus.
    Transmit,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Operation::*;
        let msg = match *self {
            Receive => "receive",
            Transmit => "transmit",
        };
        write!(f, "{}", msg)
    }
}

// ===== SetupStage =====

/// The step of socket setup at which construction failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SetupStage {
    /// Creating the raw CAN socket
    CreateSocket,
    /// Resolving the interface name to a kernel interface index
    ResolveInterface,
    /// Binding the socket to the interface
    Bind,
    /// Installing the identifier filter
    InstallFilter,
    /// Setting the receive timeout
    SetTimeout,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use SetupStage::*;
        let msg = match *self {
            CreateSocket => "creating socket",
            ResolveInterface => "getting interface index",
            Bind => "binding socket",
            InstallFilter => "installing receive filter",
            SetTimeout => "setting receive timeout",
        };
        write!(f, "{}", msg)
    }
}

// ===== ErrorKind =====

/// The broad category of an [`Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The device was used for an operation it wasn't set up for.
    Configuration,
    /// A value was out of range, like a payload longer than 8 bytes.
    Validation,
    /// Socket, interface, bind or filter setup failed.
    Resource,
    /// A receive or transmit failed on a live device.
    Transport,
    /// The remote end of the transport closed.
    PeerClosed,
}

// ===== Error =====

/// Errors from a CAN transceiver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No interface name was given
    #[error("No CAN interface name specified")]
    NoInterface,

    /// The device is not configured for the requested operation.
    #[error("Device on '{iface}' is not configured for {op}")]
    NotConfigured {
        /// The interface name
        iface: String,
        /// The operation that was attempted
        op: Operation,
    },

    /// The receive loop is already started and has not been stopped.
    #[error("Receive loop already started on '{iface}'")]
    AlreadyReading {
        /// The interface name
        iface: String,
    },

    /// The frame handler is gone, having panicked on a previous run.
    #[error("Device on '{iface}' has no frame handler")]
    NoHandler {
        /// The interface name
        iface: String,
    },

    /// A CAN identifier that does not fit in 29 bits.
    #[error("CAN ID 0x{id:X} is outside the 29-bit range")]
    InvalidId {
        /// The raw identifier value
        id: u32,
    },

    /// The declared payload length is more than a classic CAN frame holds.
    #[error("Payload length {len} exceeds the CAN maximum of 8 bytes")]
    InvalidLength {
        /// The declared length
        len: usize,
    },

    /// The declared payload length is more than the bytes supplied.
    #[error("Declared length {dlc} exceeds the {available} payload bytes supplied")]
    ShortPayload {
        /// The declared length
        dlc: usize,
        /// The number of bytes actually supplied
        available: usize,
    },

    /// A zero receive timeout, which the socket can't express.
    #[error("Receive timeout must be non-zero")]
    InvalidTimeout,

    /// Failed to construct a frame.
    #[error("Frame construction failed")]
    Construction(#[from] ConstructionError),

    /// Setting up the socket failed.
    #[error("Error {stage} on '{iface}'")]
    Resource {
        /// The setup step that failed
        stage: SetupStage,
        /// The interface name
        iface: String,
        /// The underlying OS error
        #[source]
        source: IoError,
    },

    /// A read or write failed on a live device.
    #[error("Error in {op} on '{iface}' (ID 0x{id:X})")]
    Transport {
        /// The operation that failed
        op: Operation,
        /// The interface name
        iface: String,
        /// The identifier being read or written
        id: u32,
        /// The underlying OS error
        #[source]
        source: IoError,
    },

    /// Fewer bytes were written than a full frame.
    #[error("Short write on '{iface}' (ID 0x{id:X}): {written} of {expected} bytes")]
    ShortWrite {
        /// The interface name
        iface: String,
        /// The identifier being written
        id: u32,
        /// Bytes actually written
        written: usize,
        /// Size of a full frame
        expected: usize,
    },

    /// The frame handler panicked on the receive thread.
    #[error("Frame handler for ID 0x{id:X} on '{iface}' panicked")]
    HandlerPanicked {
        /// The interface name
        iface: String,
        /// The read identifier
        id: u32,
    },

    /// The transport was closed by the peer.
    #[error("Connection closed by peer on '{iface}'")]
    PeerClosed {
        /// The interface name
        iface: String,
    },
}

impl Error {
    /// Gets the category of the error.
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            NoInterface | NotConfigured { .. } | AlreadyReading { .. } | NoHandler { .. } => {
                ErrorKind::Configuration
            }
            InvalidId { .. }
            | InvalidLength { .. }
            | ShortPayload { .. }
            | InvalidTimeout
            | Construction(_) => ErrorKind::Validation,
            Resource { .. } => ErrorKind::Resource,
            Transport { .. } | ShortWrite { .. } | HandlerPanicked { .. } => ErrorKind::Transport,
            PeerClosed { .. } => ErrorKind::PeerClosed,
        }
    }

    /// Creates a setup error for the specified stage.
    pub(crate) fn resource(stage: SetupStage, iface: &str, source: IoError) -> Self {
        Self::Resource {
            stage,
            iface: iface.into(),
            source,
        }
    }

    /// Gets the underlying OS error, if there is one.
    pub fn io_error(&self) -> Option<&IoError> {
        match self {
            Error::Resource { source, .. } | Error::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ===== ConstructionError =====

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Error that occurs when creating CAN packets
pub enum ConstructionError {
    /// CAN ID was outside the range of valid IDs
    IDTooLarge,
    /// Larger payload reported than can be held in the frame.
    TooMuchData,
}

impl std::error::Error for ConstructionError {}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConstructionError::*;
        match *self {
            IDTooLarge => write!(f, "CAN ID too large"),
            TooMuchData => write!(f, "Payload is too large"),
        }
    }
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IoErrorKind;

    #[test]
    fn test_resource_error_text() {
        let err = Error::resource(
            SetupStage::ResolveInterface,
            "can9",
            IoError::from_raw_os_error(libc::ENODEV),
        );

        assert_eq!(err.kind(), ErrorKind::Resource);
        let msg = err.to_string();
        assert!(msg.contains("getting interface index"));
        assert!(msg.contains("can9"));
        assert!(err.io_error().is_some());
    }

    #[test]
    fn test_os_error_appears_once_in_chain() {
        use std::error::Error as _;

        let err = Error::resource(
            SetupStage::Bind,
            "vcan0",
            IoError::from_raw_os_error(libc::ENODEV),
        );

        let mut chain = vec![err.to_string()];
        let mut src = err.source();
        while let Some(e) = src {
            chain.push(e.to_string());
            src = e.source();
        }

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], "Error binding socket on 'vcan0'");
        assert_eq!(chain.join(": ").matches("No such device").count(), 1);
    }

    #[test]
    fn test_kinds() {
        let err = Error::NotConfigured {
            iface: "vcan0".into(),
            op: Operation::Transmit,
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Device on 'vcan0' is not configured for transmit");

        assert_eq!(Error::InvalidLength { len: 9 }.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::from(ConstructionError::TooMuchData).kind(),
            ErrorKind::Validation
        );

        let err = Error::Transport {
            op: Operation::Receive,
            iface: "vcan0".into(),
            id: 0x301,
            source: IoErrorKind::BrokenPipe.into(),
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("0x301"));

        let err = Error::PeerClosed {
            iface: "vcan0".into(),
        };
        assert_eq!(err.kind(), ErrorKind::PeerClosed);
        assert!(err.io_error().is_none());
    }
}
