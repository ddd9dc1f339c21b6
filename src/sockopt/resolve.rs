//! Socket handle → raw file descriptor
//!
//! `getsockopt()` works on integer descriptors, but callers hold
//! `TcpListener`s, `TcpStream`s and friends. This module is the narrow
//! capability boundary between the two: anything implementing
//! [`SocketDescriptor`] can hand over its descriptor, or say why it can't.
//!
//! # Educational Notes
//!
//! ## Borrowing the Descriptor
//!
//! Resolving never takes ownership: the handle keeps owning the socket and
//! closes it when dropped. The returned `RawFd` is only valid while the
//! handle is alive, which is why `fetch_tcp_info_for()` takes `&H` and does
//! the whole fetch inside that borrow.

use std::fmt;
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// A handle could not produce a usable descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Descriptor value can never name an open file (negative)
    InvalidDescriptor(RawFd),
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::InvalidDescriptor(fd) => {
                write!(f, "invalid socket descriptor: {fd}")
            }
        }
    }
}

impl std::error::Error for ResolutionError {}

// ============================================================================
// CAPABILITY TRAIT
// ============================================================================

/// Something that can name an open socket by raw descriptor
pub trait SocketDescriptor {
    /// Raw descriptor of the underlying socket
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` if the handle has no valid descriptor.
    fn resolve_descriptor(&self) -> Result<RawFd, ResolutionError>;
}

/// A bare descriptor number obtained elsewhere (FFI, inherited sockets, ...)
///
/// No ownership: the caller keeps responsibility for closing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor(pub RawFd);

impl SocketDescriptor for RawDescriptor {
    fn resolve_descriptor(&self) -> Result<RawFd, ResolutionError> {
        if self.0 < 0 {
            return Err(ResolutionError::InvalidDescriptor(self.0));
        }
        Ok(self.0)
    }
}

// Standard library handles always hold an open descriptor while alive
macro_rules! impl_socket_descriptor {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SocketDescriptor for $ty {
                fn resolve_descriptor(&self) -> Result<RawFd, ResolutionError> {
                    RawDescriptor(self.as_raw_fd()).resolve_descriptor()
                }
            }
        )*
    };
}

impl_socket_descriptor!(TcpListener, TcpStream, UdpSocket, OwnedFd, BorrowedFd<'_>);

impl<T: SocketDescriptor + ?Sized> SocketDescriptor for &T {
    fn resolve_descriptor(&self) -> Result<RawFd, ResolutionError> {
        (**self).resolve_descriptor()
    }
}

/// Resolve a handle to its raw descriptor
///
/// # Errors
///
/// Returns `ResolutionError` if the handle has no valid descriptor.
pub fn resolve<H: SocketDescriptor + ?Sized>(handle: &H) -> Result<RawFd, ResolutionError> {
    handle.resolve_descriptor()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsFd;

    #[test]
    fn test_negative_descriptor_rejected() {
        assert_eq!(
            resolve(&RawDescriptor(-1)),
            Err(ResolutionError::InvalidDescriptor(-1))
        );
        assert_eq!(resolve(&RawDescriptor(7)), Ok(7));
    }

    #[test]
    fn test_listener_resolves_to_its_fd() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        assert_eq!(resolve(&listener), Ok(listener.as_raw_fd()));
        assert_eq!(resolve(&listener.as_fd()), Ok(listener.as_raw_fd()));
    }

    #[test]
    fn test_trait_object() {
        let udp = UdpSocket::bind("127.0.0.1:0").expect("bind udp");
        let handle: &dyn SocketDescriptor = &udp;
        assert_eq!(resolve(handle), Ok(udp.as_raw_fd()));
    }

    #[test]
    fn test_error_message() {
        let err = ResolutionError::InvalidDescriptor(-5);
        assert_eq!(err.to_string(), "invalid socket descriptor: -5");
    }
}
