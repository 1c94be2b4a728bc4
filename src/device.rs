// can-transceiver/src/device.rs
//
// Implements the point-to-point CAN transceiver.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! The CAN transceiver device.
//!
//! A [`Transceiver`] owns one raw CAN socket bound to one interface. It can
//! receive the frames for a single identifier on a background thread,
//! handing each one to a caller-supplied handler, and it can transmit
//! frames under a second identifier from the owning thread.
//!
//! The receive thread is started lazily with [`Transceiver::read`]. It is
//! stopped cooperatively: a flag is set and the thread notices it the next
//! time its blocking receive returns, which happens at least once per
//! receive timeout. [`Transceiver::stop`], and dropping the device, wait
//! for the thread to exit before returning, so the socket is never closed
//! under a running receive.

use crate::{
    config::{DeviceConfig, FrameHandler},
    frame::{can_frame_default, CAN_MTU},
    socket::{open_bound, CanFilter, CanSocket, ShouldRetry, Transport},
    CanFrame, CanId, Error, Frame, Operation, Result, SetupStage,
};
use log::{debug, error, trace, warn};
use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// The state of the receive loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RxState {
    /// No receive loop has been started.
    Idle,
    /// The loop is receiving and dispatching frames.
    Running,
    /// A stop was requested; the loop exits once its current receive returns.
    Stopping,
    /// The loop has exited, either because it was stopped or on an error.
    Stopped,
}

/// What the receive thread hands back when it exits.
struct RxExit {
    /// The handler, unless it panicked.
    handler: Option<FrameHandler>,
    /// Why the loop ended.
    result: Result<()>,
}

/// The owner's side of a running receive thread.
struct RxThread {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    handle: JoinHandle<RxExit>,
}

/// Passes the frame handler to the receive thread.
///
/// The owner keeps a clone, so if the thread is never started the handler
/// is still there to be taken back.
#[derive(Clone)]
struct HandlerSlot(Arc<Mutex<Option<FrameHandler>>>);

impl HandlerSlot {
    fn new(handler: FrameHandler) -> Self {
        Self(Arc::new(Mutex::new(Some(handler))))
    }

    fn take(&self) -> Option<FrameHandler> {
        match self.0.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// The receive loop, as run on the background thread.
struct RxLoop<T> {
    iface: String,
    id: CanId,
    transport: Arc<T>,
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
}

impl<T: Transport> RxLoop<T> {
    fn run(self, slot: HandlerSlot) -> RxExit {
        debug!("Receive loop started on '{}' for ID {}", self.iface, self.id);

        let mut handler = slot.take();
        let result = self.pump(&mut handler);

        match result {
            Ok(()) => debug!("Receive loop on '{}' stopped", self.iface),
            Err(ref err) => match err.io_error() {
                Some(io) => error!("Receive loop on '{}' terminated: {}: {}", self.iface, err, io),
                None => error!("Receive loop on '{}' terminated: {}", self.iface, err),
            },
        }
        self.done.store(true, Ordering::Release);

        RxExit { handler, result }
    }

    /// Receives until asked to stop or until a fatal error.
    fn pump(&self, slot: &mut Option<FrameHandler>) -> Result<()> {
        let mut raw = can_frame_default();

        while !self.stop.load(Ordering::Acquire) {
            match self.transport.recv_raw(&mut raw) {
                Ok(0) => {
                    return Err(Error::PeerClosed {
                        iface: self.iface.clone(),
                    })
                }
                Ok(CAN_MTU) => {
                    let frame = CanFrame::from(raw);
                    if !self.accepts(&frame) {
                        trace!("Rejected {:X} on '{}'", frame, self.iface);
                        continue;
                    }
                    trace!("Dispatching {:X} on '{}'", frame, self.iface);

                    if let Some(handler) = slot.as_mut() {
                        if panic::catch_unwind(AssertUnwindSafe(|| handler(&frame))).is_err() {
                            *slot = None;
                            return Err(Error::HandlerPanicked {
                                iface: self.iface.clone(),
                                id: self.id.as_raw(),
                            });
                        }
                    }
                }
                Ok(n) => warn!("Discarding short read of {} bytes on '{}'", n, self.iface),
                Err(err) if err.should_retry() => (),
                Err(err) => {
                    return Err(Error::Transport {
                        op: Operation::Receive,
                        iface: self.iface.clone(),
                        id: self.id.as_raw(),
                        source: err,
                    })
                }
            }
        }
        Ok(())
    }

    /// Re-checks a frame against the read identifier.
    ///
    /// The kernel filter masks only the identifier bits, so it lets through
    /// extended frames whose low 11 bits match a standard ID. Here both the
    /// value and the width must match.
    fn accepts(&self, frame: &CanFrame) -> bool {
        !frame.is_error_frame() && frame.can_id() == self.id
    }
}

// ===== Transceiver =====

/// A point-to-point CAN transceiver on one interface.
///
/// The device is configured once, at construction, for reading, writing,
/// or both. See [`DeviceConfig`].
///
/// The frame handler runs on the receive thread. `send` is called on the
/// owning thread. The device is `Send` but not `Sync`, so callers that
/// transmit from several threads must serialise access themselves, for
/// example behind a `Mutex`.
pub struct Transceiver<T: Transport = CanSocket> {
    iface: String,
    read_id: Option<CanId>,
    write_id: Option<CanId>,
    read_timeout: Duration,
    transport: Arc<T>,
    handler: Option<FrameHandler>,
    rx: Option<RxThread>,
    stopped: bool,
}

impl Transceiver<CanSocket> {
    /// Opens a raw CAN socket on the configured interface and sets it up
    /// for the configured mode.
    ///
    /// Fails with a [`Resource`](crate::ErrorKind::Resource) error if the
    /// socket can't be created, the interface can't be found, or the bind
    /// or filter setup fails. Any socket opened along the way is closed
    /// before the error is returned.
    pub fn open(config: DeviceConfig) -> Result<Self> {
        let sock = open_bound(config.iface())?;
        Self::with_transport(config, sock)
    }
}

impl<T: Transport> Transceiver<T> {
    /// Creates a device over an already-bound transport.
    ///
    /// If the device reads, this installs the identifier filter and the
    /// receive timeout on the transport. A write-only device gets an empty
    /// filter, so nothing queues up on a socket that is never read.
    pub fn with_transport(config: DeviceConfig, transport: T) -> Result<Self> {
        let (iface, mode, read_timeout) = config.into_parts();
        let (read_id, write_id, handler) = mode.split();

        match read_id {
            Some(id) => {
                let filter = CanFilter::for_id(id);
                transport
                    .install_filter(filter)
                    .map_err(|e| Error::resource(SetupStage::InstallFilter, &iface, e))?;
                debug!(
                    "Installed filter {:X}/{:X} on '{}'",
                    filter.id(),
                    filter.mask(),
                    iface
                );

                transport
                    .set_recv_timeout(read_timeout)
                    .map_err(|e| Error::resource(SetupStage::SetTimeout, &iface, e))?;
            }
            None => {
                transport
                    .install_drop_all()
                    .map_err(|e| Error::resource(SetupStage::InstallFilter, &iface, e))?;
                debug!("Dropping all received frames on write-only '{}'", iface);
            }
        }

        Ok(Self {
            iface,
            read_id,
            write_id,
            read_timeout,
            transport: Arc::new(transport),
            handler,
            rx: None,
            stopped: false,
        })
    }

    /// The name of the interface the device is bound to.
    pub fn iface(&self) -> &str {
        &self.iface
    }

    /// The identifier received, if the device reads.
    pub fn read_id(&self) -> Option<CanId> {
        self.read_id
    }

    /// The identifier transmitted, if the device writes.
    pub fn write_id(&self) -> Option<CanId> {
        self.write_id
    }

    /// The receive timeout, which bounds how long a stop can take.
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Gets a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets the current state of the receive loop.
    pub fn state(&self) -> RxState {
        match self.rx {
            Some(ref rx) if rx.done.load(Ordering::Acquire) => RxState::Stopped,
            Some(ref rx) if rx.stop.load(Ordering::Acquire) => RxState::Stopping,
            Some(_) => RxState::Running,
            None if self.stopped => RxState::Stopped,
            None => RxState::Idle,
        }
    }

    /// Determines if the receive loop is currently running.
    pub fn is_running(&self) -> bool {
        self.state() == RxState::Running
    }

    /// Starts receiving frames on a background thread.
    ///
    /// Every received frame with the read identifier is passed to the
    /// handler, in the order received.
    ///
    /// Fails with a configuration error if the device was not configured
    /// for reading, or if a receive loop was already started and has not
    /// been stopped.
    pub fn read(&mut self) -> Result<()> {
        let id = self.read_id.ok_or_else(|| Error::NotConfigured {
            iface: self.iface.clone(),
            op: Operation::Receive,
        })?;

        if self.rx.is_some() {
            return Err(Error::AlreadyReading {
                iface: self.iface.clone(),
            });
        }

        let handler = self.handler.take().ok_or_else(|| Error::NoHandler {
            iface: self.iface.clone(),
        })?;

        let stop = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));

        let rx_loop = RxLoop {
            iface: self.iface.clone(),
            id,
            transport: Arc::clone(&self.transport),
            stop: Arc::clone(&stop),
            done: Arc::clone(&done),
        };

        let slot = HandlerSlot::new(handler);
        let thread_slot = slot.clone();

        let spawned = thread::Builder::new()
            .name(format!("can-rx-{}", self.iface))
            .spawn(move || rx_loop.run(thread_slot));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                // The closure was dropped without running
                self.handler = slot.take();
                return Err(Error::Transport {
                    op: Operation::Receive,
                    iface: self.iface.clone(),
                    id: id.as_raw(),
                    source: err,
                });
            }
        };

        self.rx = Some(RxThread { stop, done, handle });
        Ok(())
    }

    /// Stops the receive loop and waits for the thread to exit.
    ///
    /// This can take up to one receive timeout, plus the time the handler
    /// takes with the frame it is processing. Afterwards the loop can be
    /// started again with [`read`](Self::read).
    ///
    /// Returns the error that terminated the loop, if there was one. It is
    /// safe to call this at any time, and calling it again has no effect.
    pub fn stop(&mut self) -> Result<()> {
        let rx = match self.rx.take() {
            Some(rx) => rx,
            None => return Ok(()),
        };

        rx.stop.store(true, Ordering::Release);
        debug!("Stopping receive loop on '{}'", self.iface);

        let res = match rx.handle.join() {
            Ok(exit) => {
                self.handler = exit.handler;
                exit.result
            }
            Err(_) => Err(Error::HandlerPanicked {
                iface: self.iface.clone(),
                id: self.read_id.map(|id| id.as_raw()).unwrap_or_default(),
            }),
        };

        self.stopped = true;
        res
    }

    /// Transmits a frame with the write identifier and `data` as payload.
    ///
    /// The payload length must be 0 to 8 bytes.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.send_dlc(data, data.len())
    }

    /// Transmits a frame with the write identifier and the first `dlc`
    /// bytes of `payload`.
    ///
    /// Fails without writing anything if the device is not configured for
    /// writing, if `dlc` is more than 8, or if `payload` is shorter than
    /// `dlc`. A failed or short write is returned as a transport error;
    /// there are no retries.
    pub fn send_dlc(&self, payload: &[u8], dlc: usize) -> Result<()> {
        let id = self.write_id.ok_or_else(|| Error::NotConfigured {
            iface: self.iface.clone(),
            op: Operation::Transmit,
        })?;

        if dlc > crate::id::CAN_MAX_DLEN {
            return Err(Error::InvalidLength { len: dlc });
        }
        if dlc > payload.len() {
            return Err(Error::ShortPayload {
                dlc,
                available: payload.len(),
            });
        }

        let frame = CanFrame::init(id.as_canid_t(), &payload[..dlc])?;

        match self.transport.send_raw(frame.as_ref()) {
            Ok(CAN_MTU) => {
                trace!("Sent {:X} on '{}'", frame, self.iface);
                Ok(())
            }
            Ok(n) => Err(Error::ShortWrite {
                iface: self.iface.clone(),
                id: id.as_raw(),
                written: n,
                expected: CAN_MTU,
            }),
            Err(err) => Err(Error::Transport {
                op: Operation::Transmit,
                iface: self.iface.clone(),
                id: id.as_raw(),
                source: err,
            }),
        }
    }
}

impl<T: Transport> Drop for Transceiver<T> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            match err.io_error() {
                Some(io) => error!("Receive loop on '{}' ended with: {}: {}", self.iface, err, io),
                None => error!("Receive loop on '{}' ended with: {}", self.iface, err),
            }
        }
    }
}

impl<T: Transport> fmt::Debug for Transceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Transceiver")
            .field("iface", &self.iface)
            .field("read_id", &self.read_id)
            .field("write_id", &self.write_id)
            .field("read_timeout", &self.read_timeout)
            .field("state", &self.state())
            .finish()
    }
}

/////////////////////////////////////////////////////////////////////////////
