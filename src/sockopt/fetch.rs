//! `TCP_INFO` fetch: syscall, length validation and field extraction
//!
//! This is where a raw descriptor becomes a [`TcpInfoSnapshot`]:
//!
//! 1. Acquire a zeroed [`RawBuffer`] sized by `TCP_INFO_LAYOUT`
//! 2. `getsockopt(fd, SOL_TCP, TCP_INFO, buf, &mut len)`
//! 3. Non-zero return → `FetchError::Syscall`, nothing extracted
//! 4. Compare the length the kernel wrote back with the layout size
//! 5. Extract every named field that fits, derive the state label
//!
//! The buffer is dropped at the end of the call whichever way it exits.
//!
//! # Length Mismatch Policy
//!
//! The kernel copies `min(optlen, sizeof(struct tcp_info))` bytes and never
//! errors on a short copy. So a kernel older than our layout silently hands
//! back fewer bytes. What happens next depends on [`MismatchPolicy`]:
//!
//! - `Lenient` (default): log a warning, keep every field whose byte range
//!   fits in what was returned, mark the snapshot partial
//! - `Strict`: fail with `FetchError::LayoutMismatch`
//!
//! # Platform Support
//!
//! **Linux only** for the syscall. On other unix targets the call returns a
//! `Syscall` error with `ErrorKind::Unsupported` and never touches the kernel.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::os::fd::RawFd;

use log::{debug, warn};

use crate::config::{FetchOptions, MismatchPolicy};
use crate::sockopt::buffer::RawBuffer;
use crate::sockopt::layout::{FieldKind, FieldSpec, TCP_INFO_LAYOUT};
use crate::sockopt::resolve::{ResolutionError, SocketDescriptor};
use crate::sockopt::snapshot::{LayoutMismatch, TcpInfoSnapshot};
use crate::tcp_state_label;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Errors that can occur while fetching `tcp_info`
///
/// None of these are retried: they mean a wrong socket type, a closed
/// descriptor, or a layout that does not match the running kernel.
#[derive(Debug)]
pub enum FetchError {
    /// Handle had no usable descriptor
    Resolution(ResolutionError),

    /// getsockopt() returned non-zero (`code`), errno in `source`
    Syscall { code: i32, source: io::Error },

    /// Kernel returned a different length and the policy is `Strict`
    LayoutMismatch { expected: usize, actual: usize },
}

impl FetchError {
    /// errno of a failed syscall
    #[must_use]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            FetchError::Syscall { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Resolution(e) => write!(f, "cannot resolve descriptor: {e}"),
            FetchError::Syscall { code, source } => {
                write!(f, "getsockopt(TCP_INFO) failed with {code}: {source}")
            }
            FetchError::LayoutMismatch { expected, actual } => write!(
                f,
                "tcp_info layout mismatch: expected {expected} bytes, kernel returned {actual}"
            ),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Resolution(e) => Some(e),
            FetchError::Syscall { source, .. } => Some(source),
            FetchError::LayoutMismatch { .. } => None,
        }
    }
}

impl From<ResolutionError> for FetchError {
    fn from(e: ResolutionError) -> Self {
        FetchError::Resolution(e)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Fetch a `tcp_info` snapshot for a raw descriptor (lenient layout policy)
///
/// # Errors
///
/// - `FetchError::Syscall` if the kernel rejects the request (not a TCP
///   socket, closed descriptor, ...)
///
/// # Example
///
/// ```no_run
/// # use std::net::TcpListener;
/// # use std::os::fd::AsRawFd;
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// let snapshot = tcpinfo::fetch_tcp_info(listener.as_raw_fd())?;
/// assert_eq!(snapshot.state_label(), "LISTEN");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn fetch_tcp_info(fd: RawFd) -> Result<TcpInfoSnapshot, FetchError> {
    fetch_tcp_info_with(fd, &FetchOptions::default())
}

/// Fetch a `tcp_info` snapshot with explicit options
///
/// # Errors
///
/// - `FetchError::Syscall` if the kernel rejects the request
/// - `FetchError::LayoutMismatch` if the returned length differs and
///   `options.mismatch` is `Strict`
pub fn fetch_tcp_info_with(
    fd: RawFd,
    options: &FetchOptions,
) -> Result<TcpInfoSnapshot, FetchError> {
    let mut buffer = RawBuffer::zeroed(TCP_INFO_LAYOUT.total_size());

    getsockopt_tcp_info(fd, &mut buffer)?;

    let returned = buffer.returned_len();
    debug!(
        "getsockopt(fd={fd}, TCP_INFO) returned {returned} of {} bytes",
        buffer.capacity()
    );

    decode_tcp_info(buffer.as_bytes(), returned, options.mismatch)
}

/// Resolve a socket handle and fetch its snapshot (lenient layout policy)
///
/// # Errors
///
/// - `FetchError::Resolution` if the handle has no valid descriptor
/// - anything `fetch_tcp_info` returns
pub fn fetch_tcp_info_for<H: SocketDescriptor + ?Sized>(
    handle: &H,
) -> Result<TcpInfoSnapshot, FetchError> {
    let fd = handle.resolve_descriptor()?;
    fetch_tcp_info(fd)
}

/// Decode raw `tcp_info` bytes into a snapshot
///
/// `returned_len` is the length the kernel reported. Fields are read only
/// from `bytes[..min(returned_len, bytes.len())]`; a field whose byte range
/// does not fit is left out. If `returned_len` differs from the layout size
/// the policy decides between a partial snapshot and an error.
///
/// # Errors
///
/// `FetchError::LayoutMismatch` when the length differs and `policy` is `Strict`.
pub fn decode_tcp_info(
    bytes: &[u8],
    returned_len: usize,
    policy: MismatchPolicy,
) -> Result<TcpInfoSnapshot, FetchError> {
    let expected = TCP_INFO_LAYOUT.total_size();

    // === Validate length ===
    let mismatch = if returned_len == expected {
        None
    } else {
        match policy {
            MismatchPolicy::Strict => {
                return Err(FetchError::LayoutMismatch {
                    expected,
                    actual: returned_len,
                });
            }
            MismatchPolicy::Lenient => {
                warn!(
                    "{} length mismatch: kernel returned {returned_len} bytes, \
                     layout expects {expected}; snapshot will be partial",
                    TCP_INFO_LAYOUT.name()
                );
                Some(LayoutMismatch {
                    expected,
                    actual: returned_len,
                })
            }
        }
    };

    // === Extract fields ===
    let available = &bytes[..returned_len.min(bytes.len())];
    let fields: BTreeMap<&'static str, u32> = TCP_INFO_LAYOUT
        .named_fields()
        .filter_map(|(name, spec)| read_field(available, spec).map(|value| (name, value)))
        .collect();

    // A snapshot too short to hold tcpi_state gets the label for 0
    let state = fields.get("tcpi_state").copied().unwrap_or(0);
    let state_label = tcp_state_label(state).into_owned();

    Ok(TcpInfoSnapshot::new(fields, state_label, mismatch))
}

// ============================================================================
// INTERNALS
// ============================================================================

/// Read one field in host byte order, `None` if it does not fit
fn read_field(data: &[u8], spec: &FieldSpec) -> Option<u32> {
    let bytes = data.get(spec.offset..spec.end())?;

    match spec.kind {
        FieldKind::OpaqueByte => Some(u32::from(bytes[0])),
        FieldKind::Unsigned32 => Some(u32::from_ne_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])),
        FieldKind::PackedNibbles | FieldKind::Padding => None,
    }
}

/// The getsockopt() call itself
///
/// On success the kernel has written into `buffer` and stored the number of
/// bytes it wrote in the buffer's length word.
#[cfg(target_os = "linux")]
fn getsockopt_tcp_info(fd: RawFd, buffer: &mut RawBuffer) -> Result<(), FetchError> {
    // SAFETY: optval points at `buffer.capacity()` writable bytes owned by
    // `buffer`, and optlen points at its length word, which holds exactly
    // that capacity. The kernel never writes more than *optlen bytes.
    // Both stay borrowed (and alive) for the duration of the call.
    let ret = unsafe {
        let optval = buffer.as_mut_ptr();
        libc::getsockopt(
            fd,
            crate::SOL_TCP,
            crate::TCP_INFO,
            optval,
            buffer.len_mut(),
        )
    };

    if ret != 0 {
        // Read errno before anything else can overwrite it
        let source = io::Error::last_os_error();
        debug!("getsockopt(fd={fd}, TCP_INFO) failed: {source}");
        return Err(FetchError::Syscall { code: ret, source });
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn getsockopt_tcp_info(_fd: RawFd, _buffer: &mut RawBuffer) -> Result<(), FetchError> {
    Err(FetchError::Syscall {
        code: -1,
        source: io::Error::new(
            io::ErrorKind::Unsupported,
            "TCP_INFO is only supported on Linux",
        ),
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Full-size buffer with recognizable values at known offsets
    fn sample_bytes() -> Vec<u8> {
        let mut data = vec![0u8; TCP_INFO_LAYOUT.total_size()];
        data[0] = 1; // tcpi_state = ESTABLISHED
        data[1] = 2; // tcpi_ca_state
        data[5] = 7; // tcpi_options
        data[6] = 0x77; // wscale byte (never extracted)
        data[8..12].copy_from_slice(&204_000u32.to_ne_bytes()); // tcpi_rto
        data[68..72].copy_from_slice(&45_000u32.to_ne_bytes()); // tcpi_rtt
        data[80..84].copy_from_slice(&10u32.to_ne_bytes()); // tcpi_snd_cwnd
        data[100..104].copy_from_slice(&u32::MAX.to_ne_bytes()); // tcpi_total_retrans
        data
    }

    #[test]
    fn test_decode_full_buffer() {
        let data = sample_bytes();
        let snap = decode_tcp_info(&data, data.len(), MismatchPolicy::Strict).unwrap();

        assert!(!snap.is_partial());
        assert_eq!(snap.len(), 30);
        assert_eq!(snap.state(), Some(1));
        assert_eq!(snap.state_label(), "ESTABLISHED");
        assert_eq!(snap.get("tcpi_ca_state"), Some(2));
        assert_eq!(snap.get("tcpi_options"), Some(7));
        assert_eq!(snap.get("tcpi_rto"), Some(204_000));
        assert_eq!(snap.rtt_us(), Some(45_000));
        assert_eq!(snap.congestion_window(), Some(10));
        assert_eq!(snap.total_retrans(), Some(u32::MAX));
        assert_eq!(snap.get("tcpi_ato"), Some(0));
    }

    #[test]
    fn test_every_named_field_present_and_in_range() {
        let data = vec![0xFFu8; TCP_INFO_LAYOUT.total_size()];
        let snap = decode_tcp_info(&data, data.len(), MismatchPolicy::Strict).unwrap();

        for (name, spec) in TCP_INFO_LAYOUT.named_fields() {
            let value = snap.get(name).unwrap_or_else(|| panic!("{name} missing"));
            match spec.kind {
                FieldKind::OpaqueByte => assert_eq!(value, 0xFF, "{name}"),
                FieldKind::Unsigned32 => assert_eq!(value, u32::MAX, "{name}"),
                _ => unreachable!("unnamed kinds are never extracted"),
            }
        }
        assert_eq!(snap.state_label(), "UNKNOWN state:255");
    }

    #[test]
    fn test_lenient_short_buffer_is_partial() {
        // Kernel wrote only up to and including tcpi_rtt
        let data = sample_bytes();
        let snap = decode_tcp_info(&data, 72, MismatchPolicy::Lenient).unwrap();

        assert!(snap.is_partial());
        assert_eq!(
            snap.mismatch(),
            Some(LayoutMismatch {
                expected: 104,
                actual: 72
            })
        );
        assert_eq!(snap.rtt_us(), Some(45_000));
        assert_eq!(snap.get("tcpi_rttvar"), None);
        assert_eq!(snap.congestion_window(), None);
        assert_eq!(snap.total_retrans(), None);
        // 6 single bytes + 16 words (offsets 8..72)
        assert_eq!(snap.len(), 22);
    }

    #[test]
    fn test_lenient_skips_straddling_field() {
        // 70 bytes: tcpi_rtt (68..72) does not fully fit
        let data = sample_bytes();
        let snap = decode_tcp_info(&data, 70, MismatchPolicy::Lenient).unwrap();

        assert_eq!(snap.get("tcpi_rcv_ssthresh"), Some(0));
        assert_eq!(snap.rtt_us(), None);
    }

    #[test]
    fn test_lenient_empty_return() {
        let data = sample_bytes();
        let snap = decode_tcp_info(&data, 0, MismatchPolicy::Lenient).unwrap();

        assert!(snap.is_empty());
        assert!(snap.is_partial());
        assert_eq!(snap.state_label(), "UNKNOWN state:0");
    }

    #[test]
    fn test_lenient_longer_return_reads_only_buffer() {
        let data = sample_bytes();
        let snap = decode_tcp_info(&data, 232, MismatchPolicy::Lenient).unwrap();

        assert_eq!(snap.len(), 30);
        assert_eq!(snap.mismatch().map(|m| m.actual), Some(232));
    }

    #[test]
    fn test_strict_mismatch_is_error() {
        let data = sample_bytes();
        match decode_tcp_info(&data, 92, MismatchPolicy::Strict) {
            Err(FetchError::LayoutMismatch { expected, actual }) => {
                assert_eq!(expected, 104);
                assert_eq!(actual, 92);
            }
            other => panic!("expected LayoutMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_error_display_and_source() {
        use std::error::Error;

        let err = FetchError::Syscall {
            code: -1,
            source: io::Error::from_raw_os_error(libc::EBADF),
        };
        assert!(err.to_string().starts_with("getsockopt(TCP_INFO) failed with -1"));
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(err.source().is_some());

        let err = FetchError::from(ResolutionError::InvalidDescriptor(-1));
        assert_eq!(
            err.to_string(),
            "cannot resolve descriptor: invalid socket descriptor: -1"
        );

        let err = FetchError::LayoutMismatch {
            expected: 104,
            actual: 92,
        };
        assert!(err.source().is_none());
        assert_eq!(err.raw_os_error(), None);
    }
}
