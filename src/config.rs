// can-transceiver/src/config.rs
//
// Device configuration for the CAN transceiver.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Device configuration.
//!
//! A device is configured for reading, writing, or both. The three shapes
//! are the three variants of [`Mode`], so a device configured for neither
//! can't be expressed.

use crate::{CanFrame, CanId, Error, Result};
use std::{fmt, time::Duration};

/// The default time a blocking receive waits before the receive loop
/// checks whether it has been asked to stop.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// A callback that is handed every matching received frame.
///
/// It runs on the receive thread, never on the thread that created the
/// device, and it blocks the next receive for as long as it runs.
pub type FrameHandler = Box<dyn FnMut(&CanFrame) + Send + 'static>;

/// The read/write shape of a device.
pub enum Mode {
    /// Receive frames for one identifier.
    ReadOnly {
        /// The identifier to receive
        id: CanId,
        /// Called for each received frame
        handler: FrameHandler,
    },
    /// Transmit frames under one identifier.
    WriteOnly {
        /// The identifier to transmit under
        id: CanId,
    },
    /// Receive frames for one identifier and transmit under another.
    ReadWrite {
        /// The identifier to receive
        read_id: CanId,
        /// Called for each received frame
        handler: FrameHandler,
        /// The identifier to transmit under
        write_id: CanId,
    },
}

impl Mode {
    /// The identifier to receive, if configured for reading.
    pub fn read_id(&self) -> Option<CanId> {
        match *self {
            Mode::ReadOnly { id, .. } => Some(id),
            Mode::ReadWrite { read_id, .. } => Some(read_id),
            Mode::WriteOnly { .. } => None,
        }
    }

    /// The identifier to transmit under, if configured for writing.
    pub fn write_id(&self) -> Option<CanId> {
        match *self {
            Mode::WriteOnly { id } => Some(id),
            Mode::ReadWrite { write_id, .. } => Some(write_id),
            Mode::ReadOnly { .. } => None,
        }
    }

    /// Whether the device can receive.
    pub fn can_read(&self) -> bool {
        self.read_id().is_some()
    }

    /// Whether the device can transmit.
    pub fn can_write(&self) -> bool {
        self.write_id().is_some()
    }

    /// Takes the handler out of the mode, leaving the identifiers.
    pub(crate) fn split(self) -> (Option<CanId>, Option<CanId>, Option<FrameHandler>) {
        match self {
            Mode::ReadOnly { id, handler } => (Some(id), None, Some(handler)),
            Mode::WriteOnly { id } => (None, Some(id), None),
            Mode::ReadWrite {
                read_id,
                handler,
                write_id,
            } => (Some(read_id), Some(write_id), Some(handler)),
        }
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::ReadOnly { id, .. } => f.debug_struct("ReadOnly").field("id", id).finish(),
            Mode::WriteOnly { id } => f.debug_struct("WriteOnly").field("id", id).finish(),
            Mode::ReadWrite {
                read_id, write_id, ..
            } => f
                .debug_struct("ReadWrite")
                .field("read_id", read_id)
                .field("write_id", write_id)
                .finish(),
        }
    }
}

/// Configuration for a [`Transceiver`](crate::Transceiver).
///
/// ```no_run
/// use can_transceiver::{DeviceConfig, Transceiver};
/// use std::time::Duration;
///
/// let config = DeviceConfig::read_only("vcan0", 0x301, |frame| {
///     println!("{:X}", frame);
/// })?
/// .with_read_timeout(Duration::from_millis(250))?;
///
/// let mut dev = Transceiver::open(config)?;
/// dev.read()?;
/// # Ok::<(), can_transceiver::Error>(())
/// ```
#[derive(Debug)]
pub struct DeviceConfig {
    iface: String,
    mode: Mode,
    read_timeout: Duration,
}

impl DeviceConfig {
    /// Creates a configuration from an interface name and mode.
    pub fn new(iface: impl Into<String>, mode: Mode) -> Result<Self> {
        let iface = iface.into();
        if iface.is_empty() {
            return Err(Error::NoInterface);
        }
        Ok(Self {
            iface,
            mode,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Configuration for a device that only receives frames for `read_id`.
    pub fn read_only<F>(iface: impl Into<String>, read_id: u32, handler: F) -> Result<Self>
    where
        F: FnMut(&CanFrame) + Send + 'static,
    {
        let mode = Mode::ReadOnly {
            id: CanId::try_from(read_id)?,
            handler: Box::new(handler),
        };
        Self::new(iface, mode)
    }

    /// Configuration for a device that only transmits under `write_id`.
    pub fn write_only(iface: impl Into<String>, write_id: u32) -> Result<Self> {
        let mode = Mode::WriteOnly {
            id: CanId::try_from(write_id)?,
        };
        Self::new(iface, mode)
    }

    /// Configuration for a device that receives frames for `read_id` and
    /// transmits under `write_id`.
    pub fn read_write<F>(
        iface: impl Into<String>,
        read_id: u32,
        handler: F,
        write_id: u32,
    ) -> Result<Self>
    where
        F: FnMut(&CanFrame) + Send + 'static,
    {
        let mode = Mode::ReadWrite {
            read_id: CanId::try_from(read_id)?,
            handler: Box::new(handler),
            write_id: CanId::try_from(write_id)?,
        };
        Self::new(iface, mode)
    }

    /// Sets how long a blocking receive waits before the loop checks for a
    /// stop request. This bounds how long stopping the device can take.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::InvalidTimeout);
        }
        self.read_timeout = timeout;
        Ok(self)
    }

    /// The interface name
    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// The read/write shape
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// The receive timeout
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub(crate) fn into_parts(self) -> (String, Mode, Duration) {
        (self.iface, self.mode, self.read_timeout)
    }
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn nop(_: &CanFrame) {}

    #[test]
    fn test_read_only() {
        let cfg = DeviceConfig::read_only("vcan0", 0x301, nop).unwrap();

        assert_eq!(cfg.iface(), "vcan0");
        assert_eq!(cfg.read_timeout(), DEFAULT_READ_TIMEOUT);
        assert!(cfg.mode().can_read());
        assert!(!cfg.mode().can_write());
        assert_eq!(cfg.mode().read_id(), CanId::standard(0x301));
    }

    #[test]
    fn test_write_only() {
        let cfg = DeviceConfig::write_only("vcan0", 0x1234_5678).unwrap();

        assert!(!cfg.mode().can_read());
        assert!(cfg.mode().can_write());
        assert_eq!(cfg.mode().write_id(), CanId::extended(0x1234_5678));
    }

    #[test]
    fn test_read_write() {
        let cfg = DeviceConfig::read_write("can1", 0x100, nop, 0x800).unwrap();

        assert_eq!(cfg.mode().read_id(), CanId::standard(0x100));
        assert_eq!(cfg.mode().write_id(), CanId::extended(0x800));

        let dbg = format!("{:?}", cfg.mode());
        assert!(dbg.starts_with("ReadWrite"));
    }

    #[test]
    fn test_bad_config() {
        let err = DeviceConfig::write_only("", 0x100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = DeviceConfig::write_only("vcan0", 0x2000_0000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = DeviceConfig::read_write("vcan0", 0x100, nop, u32::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidId { id: u32::MAX }));

        let err = DeviceConfig::write_only("vcan0", 0x100)
            .unwrap()
            .with_read_timeout(Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTimeout));
    }
}
