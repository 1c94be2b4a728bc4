// can-transceiver/src/socket.rs
//
// Implements raw sockets for CANbus 2.0 for SocketCAN on Linux.
//
// This file is part of the Rust 'can-transceiver' library.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Implementation of raw sockets for CANbus 2.0 for SocketCAN on Linux.
//!
//! The [`Transport`] trait is the seam between the transceiver and the
//! kernel. [`CanSocket`] is the production implementation; anything else
//! that can move whole `can_frame` structs can stand in for it.

use crate::{
    as_bytes, as_bytes_mut, id::CanId, CanAddr, Error, IoError, IoErrorKind, IoResult,
    SetupStage,
};
use libc::{can_frame, canid_t, socklen_t, AF_CAN, EINPROGRESS};
use log::debug;
use std::{
    fmt,
    io::{Read, Write},
    mem,
    os::{
        raw::c_int,
        unix::io::{AsRawFd, RawFd},
    },
    ptr,
    time::Duration,
};

pub use libc::{CAN_RAW, CAN_RAW_FILTER, SOL_CAN_RAW};

/// Check an error return value for timeouts.
///
/// Due to the fact that timeouts are reported as errors, receiving
/// on a socket with a timeout that does not receive a frame in time will
/// result in an error being returned. This trait adds a `should_retry` method
/// to `Error` and `Result` to check for this condition.
pub trait ShouldRetry {
    /// Check for timeout
    ///
    /// If `true`, the error is probably due to a timeout.
    fn should_retry(&self) -> bool;
}

impl ShouldRetry for IoError {
    fn should_retry(&self) -> bool {
        match self.kind() {
            // EAGAIN, EINPROGRESS and EWOULDBLOCK are the three possible codes
            // returned when a timeout occurs. the stdlib already maps EAGAIN
            // and EWOULDBLOCK os WouldBlock
            IoErrorKind::WouldBlock => true,
            // a signal arriving mid-call isn't a failure either
            IoErrorKind::Interrupted | IoErrorKind::TimedOut => true,
            // however, EINPROGRESS is also valid
            IoErrorKind::Other => {
                matches!(self.raw_os_error(), Some(errno) if errno == EINPROGRESS)
            }
            _ => false,
        }
    }
}

impl<E: fmt::Debug> ShouldRetry for IoResult<E> {
    fn should_retry(&self) -> bool {
        match *self {
            Err(ref e) => e.should_retry(),
            _ => false,
        }
    }
}

/// Creates an unbound raw CAN socket.
fn raw_socket() -> IoResult<socket2::Socket> {
    let af_can = socket2::Domain::from(AF_CAN);
    let can_raw = socket2::Protocol::from(CAN_RAW);

    socket2::Socket::new_raw(af_can, socket2::Type::RAW, Some(can_raw))
}

/// Opens a raw CAN socket bound to the named interface, reporting which
/// step failed.
///
/// The socket is created first, then the interface is resolved and the
/// socket bound to it. If a later step fails, the socket is dropped, and
/// thus closed, before the error is returned.
pub fn open_bound(ifname: &str) -> crate::Result<CanSocket> {
    let sock = raw_socket().map_err(|e| Error::resource(SetupStage::CreateSocket, ifname, e))?;

    let addr = CanAddr::from_iface(ifname)
        .map_err(|e| Error::resource(SetupStage::ResolveInterface, ifname, e))?;

    sock.bind(&addr.into_sock_addr())
        .map_err(|e| Error::resource(SetupStage::Bind, ifname, e))?;

    debug!("Bound CAN socket to '{}' (index {})", ifname, addr.ifindex());
    Ok(CanSocket(sock))
}

// ===== SocketOptions =====

/// Receive filter options for a raw CAN socket.
pub trait SocketOptions: AsRawFd {
    /// Sets a collection of multiple socket options with one call.
    ///
    /// A proper `std::io::Error` will be returned on failure.
    fn set_socket_option_mult<T>(&self, level: c_int, name: c_int, values: &[T]) -> IoResult<()> {
        let ret = if values.is_empty() {
            // can't pass in a ptr to a 0-len slice, pass a null ptr instead
            unsafe { libc::setsockopt(self.as_raw_fd(), level, name, ptr::null(), 0) }
        } else {
            unsafe {
                libc::setsockopt(
                    self.as_raw_fd(),
                    level,
                    name,
                    values.as_ptr().cast(),
                    mem::size_of_val(values) as socklen_t,
                )
            }
        };

        match ret {
            0 => Ok(()),
            _ => Err(IoError::last_os_error()),
        }
    }

    /// Sets CAN ID filters on the socket.
    ///
    /// CAN packages received by SocketCAN are matched against these filters,
    /// only matching packets are returned by the interface.
    fn set_filters(&self, filters: &[CanFilter]) -> IoResult<()> {
        self.set_socket_option_mult(SOL_CAN_RAW, CAN_RAW_FILTER, filters)
    }

    /// Disable reception of CAN frames.
    ///
    /// Sets a completely empty filter; disabling all CAN frame reception.
    fn set_filter_drop_all(&self) -> IoResult<()> {
        self.set_filters(&[])
    }
}

// ===== Transport =====

/// The frame-level transport a transceiver runs over.
///
/// Reads and writes move one whole kernel `can_frame` at a time and report
/// the number of bytes actually transferred, so the caller can tell a full
/// frame from a short read or write.
///
/// Implementations must be shareable between the owning thread (which
/// transmits) and the receive thread.
pub trait Transport: Send + Sync + 'static {
    /// Installs `filter` as the only accept rule for received frames.
    fn install_filter(&self, filter: CanFilter) -> IoResult<()>;

    /// Removes every accept rule, so no frames are queued for reception.
    fn install_drop_all(&self) -> IoResult<()>;

    /// Sets how long a receive may block before returning a timeout error.
    fn set_recv_timeout(&self, timeout: Duration) -> IoResult<()>;

    /// Receives into `frame`, returning the number of bytes read.
    ///
    /// A timeout is reported as an error for which
    /// [`ShouldRetry::should_retry`] is true.
    fn recv_raw(&self, frame: &mut can_frame) -> IoResult<usize>;

    /// Writes `frame` once, returning the number of bytes written.
    fn send_raw(&self, frame: &can_frame) -> IoResult<usize>;
}

// ===== CanSocket =====

/// A raw SocketCAN socket for classic CAN 2.0 frames.
///
/// The socket is closed when the object is dropped. Internally this is
/// just a wrapped socket (file) descriptor.
#[derive(Debug)]
pub struct CanSocket(socket2::Socket);

impl CanSocket {
    /// Gets a shared reference to the underlying socket object
    pub fn as_raw_socket(&self) -> &socket2::Socket {
        &self.0
    }
}

impl SocketOptions for CanSocket {}

impl Transport for CanSocket {
    fn install_filter(&self, filter: CanFilter) -> IoResult<()> {
        self.set_filters(&[filter])
    }

    fn install_drop_all(&self) -> IoResult<()> {
        self.set_filter_drop_all()
    }

    fn set_recv_timeout(&self, timeout: Duration) -> IoResult<()> {
        self.0.set_read_timeout(Some(timeout))
    }

    fn recv_raw(&self, frame: &mut can_frame) -> IoResult<usize> {
        self.as_raw_socket().read(as_bytes_mut(frame))
    }

    fn send_raw(&self, frame: &can_frame) -> IoResult<usize> {
        self.as_raw_socket().write(as_bytes(frame))
    }
}

impl AsRawFd for CanSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

// ===== CanFilter =====

/// The CAN filter defines which ID's can be accepted on a socket.
///
/// Each filter contains an internal id and mask. Packets are considered to
/// be matched by a filter if `received_id & mask == filter_id & mask` holds
/// true.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct CanFilter(libc::can_filter);

impl CanFilter {
    /// Construct a new CAN filter.
    pub fn new(id: canid_t, mask: canid_t) -> Self {
        Self(libc::can_filter {
            can_id: id,
            can_mask: mask,
        })
    }

    /// Construct a filter that accepts a single identifier.
    ///
    /// The mask covers all the bits of the identifier's width: the 11-bit
    /// standard mask for IDs up to 0x7FF, the 29-bit extended mask above.
    pub fn for_id(id: CanId) -> Self {
        Self::new(id.as_raw(), id.mask())
    }

    /// Gets the filter ID
    pub fn id(&self) -> canid_t {
        self.0.can_id
    }

    /// Gets the filter mask
    pub fn mask(&self) -> canid_t {
        self.0.can_mask
    }

    /// Determines if the kernel would pass a frame with the given
    /// composite ID word through this filter.
    pub fn matches(&self, id_word: canid_t) -> bool {
        id_word & self.mask() == self.id() & self.mask()
    }
}

impl From<CanId> for CanFilter {
    fn from(id: CanId) -> Self {
        CanFilter::for_id(id)
    }
}

/////////////////////////////////////////////////////////////////////////////
