//! `getsockopt(SOL_TCP, TCP_INFO)` implementation
//!
//! This module asks the kernel for a `struct tcp_info` snapshot of one socket
//! and decodes the raw bytes into named fields.
//!
//! # Architecture
//!
//! - `layout`: byte-exact description of `struct tcp_info` (pure data)
//! - `resolve`: socket handle → raw file descriptor
//! - `buffer`: scoped scratch buffer handed to the kernel (RAII)
//! - `fetch`: the syscall, length validation and field extraction
//! - `snapshot`: decoded result, ordering and serialization
//!
//! # Data Flow
//!
//! ```text
//! handle ──resolve──▶ fd ──fetch──▶ RawBuffer ──decode(layout)──▶ TcpInfoSnapshot
//! ```
//!
//! ## Conditional Compilation
//!
//! `layout` and `snapshot` are plain data and compile everywhere (they are
//! also what the decoding tests run against). Anything touching a raw file
//! descriptor needs a unix target, and the syscall itself only means
//! something on Linux; other unix targets get an `Unsupported` syscall error.

// ============================================================================
// SUBMODULE DECLARATIONS
// ============================================================================

pub mod layout; // struct tcp_info shape (cross-platform)
pub mod snapshot; // decoded result (cross-platform)

#[cfg(unix)]
pub mod buffer; // scoped getsockopt buffer
#[cfg(unix)]
pub mod fetch; // getsockopt + decode
#[cfg(unix)]
pub mod resolve; // handle -> descriptor

// ============================================================================
// PUBLIC RE-EXPORTS
// ============================================================================

#[cfg(unix)]
pub use fetch::{
    FetchError,          // Error type for fetch operations
    decode_tcp_info,     // Decode raw bytes (kernel-free, used by tests)
    fetch_tcp_info,      // Fetch by raw descriptor, default options
    fetch_tcp_info_for,  // Resolve a handle, then fetch
    fetch_tcp_info_with, // Fetch by raw descriptor, explicit options
};

#[cfg(unix)]
pub use resolve::{RawDescriptor, ResolutionError, SocketDescriptor, resolve};
