// ============================================================================
// TCP_INFO SNAPSHOT LIBRARY
// ============================================================================
// This library reads the kernel's `struct tcp_info` for an open socket and
// decodes it into named fields (RTT, congestion window, retransmit counters,
// connection state, ...).
//
// === KEY FEATURES ===
// 1. Byte-exact description of the Linux `tcp_info` layout (sockopt::layout)
// 2. getsockopt(SOL_TCP, TCP_INFO) with a scoped scratch buffer (sockopt::fetch)
// 3. Returned-length validation to detect kernel ABI drift
// 4. Snapshot with alphabetically ordered fields + derived state label
//
// === MEMORY SAFETY ===
// The only unsafe code is the getsockopt() call itself. The buffer it writes
// into is owned by a RAII guard that lives exactly as long as one fetch.

use std::borrow::Cow;

// === MODULE DECLARATIONS ===
pub mod config;
pub use config::{ConfigError, DemoConfig, FetchOptions, MismatchPolicy};

pub mod sockopt;

// Re-export the high-level API so callers can write `tcpinfo::fetch_tcp_info`
pub use sockopt::layout::{FieldKind, FieldSpec, FieldWidth, StructLayout, TCP_INFO_LAYOUT};
pub use sockopt::snapshot::{FieldValue, LayoutMismatch, STATE_LABEL_KEY, TcpInfoSnapshot};
#[cfg(unix)]
pub use sockopt::{
    FetchError, RawDescriptor, ResolutionError, SocketDescriptor, decode_tcp_info,
    fetch_tcp_info, fetch_tcp_info_for, fetch_tcp_info_with, resolve,
};

// ============================================================================
// SOCKET OPTION CONSTANTS
// ============================================================================
// These are the raw values the kernel expects. They are spelled out here
// instead of taken from libc so the crate builds on every unix target; on
// Linux the tests check them against libc.

/// Socket-option level selecting the TCP protocol layer (`SOL_TCP`)
pub const SOL_TCP: i32 = 6;

/// Option name requesting a `struct tcp_info` snapshot (`TCP_INFO`)
pub const TCP_INFO: i32 = 11;

// ============================================================================
// TCP STATE CONSTANTS
// ============================================================================
// Values of `tcpi_state`, from the kernel's TCP state enum.
pub const TCP_ESTABLISHED: u8 = 0x01; // Active connection, data flowing
pub const TCP_SYN_SENT: u8 = 0x02; // Client sent connection request
pub const TCP_SYN_RECV: u8 = 0x03; // Server received connection request
pub const TCP_FIN_WAIT1: u8 = 0x04; // Closing connection (stage 1)
pub const TCP_FIN_WAIT2: u8 = 0x05; // Closing connection (stage 2)
pub const TCP_TIME_WAIT: u8 = 0x06; // Waiting for network to clear old packets
pub const TCP_CLOSE: u8 = 0x07; // Connection closed
pub const TCP_CLOSE_WAIT: u8 = 0x08; // Remote side closed, waiting for local close
pub const TCP_LAST_ACK: u8 = 0x09; // Waiting for final acknowledgment
pub const TCP_LISTEN: u8 = 0x0A; // Listening for incoming connections
pub const TCP_CLOSING: u8 = 0x0B; // Both sides closing simultaneously

/// Name of a known TCP state, or `None` for values outside 1..=11
///
/// The names follow the `tcp_info` convention (`FIN_WAIT_1`, not `FIN_WAIT1`).
#[inline]
#[must_use]
pub fn tcp_state_name(state: u32) -> Option<&'static str> {
    let Ok(state) = u8::try_from(state) else {
        return None;
    };

    let name = match state {
        TCP_ESTABLISHED => "ESTABLISHED",
        TCP_SYN_SENT => "SYN_SENT",
        TCP_SYN_RECV => "SYN_RECV",
        TCP_FIN_WAIT1 => "FIN_WAIT_1",
        TCP_FIN_WAIT2 => "FIN_WAIT_2",
        TCP_TIME_WAIT => "TIME_WAIT",
        TCP_CLOSE => "CLOSE",
        TCP_CLOSE_WAIT => "CLOSE_WAIT",
        TCP_LAST_ACK => "LAST_ACK",
        TCP_LISTEN => "LISTEN",
        TCP_CLOSING => "CLOSING",
        _ => return None,
    };
    Some(name)
}

/// Human-readable label for a `tcpi_state` value
///
/// Known states borrow a static string; anything else is rendered as
/// `UNKNOWN state:<value>` so the raw number is never lost.
///
/// # Example
///
/// ```
/// assert_eq!(tcpinfo::tcp_state_label(10), "LISTEN");
/// assert_eq!(tcpinfo::tcp_state_label(42), "UNKNOWN state:42");
/// ```
#[must_use]
pub fn tcp_state_label(state: u32) -> Cow<'static, str> {
    match tcp_state_name(state) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("UNKNOWN state:{state}")),
    }
}
