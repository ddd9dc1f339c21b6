//! Decoded `tcp_info` snapshot
//!
//! A [`TcpInfoSnapshot`] is what callers get back from a fetch: every named
//! field of the layout mapped to its value, plus a derived `tcpi_state_str`
//! label. Keys are kernel field names (`tcpi_rtt`, `tcpi_snd_cwnd`, ...) and
//! are always presented in alphabetical order, so two snapshots print and
//! serialize the same way.
//!
//! # Partial Snapshots
//!
//! When the kernel returns fewer bytes than the layout describes, the fetcher
//! (in lenient mode) keeps only the fields that fit and records the mismatch
//! here. Check [`TcpInfoSnapshot::is_partial`] before trusting that a field
//! is missing because the kernel does not have it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Key under which the derived state label is presented
pub const STATE_LABEL_KEY: &str = "tcpi_state_str";

/// Returned length differed from the compiled-in layout size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutMismatch {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for LayoutMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kernel returned {} bytes of tcp_info, layout expects {}",
            self.actual, self.expected
        )
    }
}

/// One presented value: a raw counter or the derived state label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue<'a> {
    Number(u32),
    Label(&'a str),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Label(s) => f.write_str(s),
        }
    }
}

/// Point-in-time `tcp_info` values for one socket
///
/// # Example
///
/// ```no_run
/// # use std::net::TcpListener;
/// let listener = TcpListener::bind("127.0.0.1:0")?;
/// let snapshot = tcpinfo::fetch_tcp_info_for(&listener)?;
///
/// println!("state: {}", snapshot.state_label());
/// println!("rtt: {:?} us", snapshot.get("tcpi_rtt"));
/// println!("{}", serde_json::to_string_pretty(&snapshot)?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpInfoSnapshot {
    fields: BTreeMap<&'static str, u32>,
    state_label: String,
    mismatch: Option<LayoutMismatch>,
}

impl TcpInfoSnapshot {
    pub(crate) fn new(
        fields: BTreeMap<&'static str, u32>,
        state_label: String,
        mismatch: Option<LayoutMismatch>,
    ) -> Self {
        Self {
            fields,
            state_label,
            mismatch,
        }
    }

    /// Value of a named field, `None` if absent (unknown name or partial snapshot)
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.fields.get(name).copied()
    }

    /// Raw `tcpi_state` value
    #[must_use]
    pub fn state(&self) -> Option<u8> {
        self.get("tcpi_state").and_then(|v| u8::try_from(v).ok())
    }

    /// Derived state label (`ESTABLISHED`, `LISTEN`, `UNKNOWN state:N`, ...)
    #[must_use]
    pub fn state_label(&self) -> &str {
        &self.state_label
    }

    /// Smoothed round-trip time in microseconds
    #[must_use]
    pub fn rtt_us(&self) -> Option<u32> {
        self.get("tcpi_rtt")
    }

    /// Round-trip time variance in microseconds
    #[must_use]
    pub fn rtt_var_us(&self) -> Option<u32> {
        self.get("tcpi_rttvar")
    }

    /// Send congestion window in packets
    #[must_use]
    pub fn congestion_window(&self) -> Option<u32> {
        self.get("tcpi_snd_cwnd")
    }

    /// Lifetime retransmit count
    #[must_use]
    pub fn total_retrans(&self) -> Option<u32> {
        self.get("tcpi_total_retrans")
    }

    /// True if the kernel returned a different length than the layout size
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.mismatch.is_some()
    }

    /// The length mismatch, if any
    #[must_use]
    pub fn mismatch(&self) -> Option<LayoutMismatch> {
        self.mismatch
    }

    /// Number of extracted fields (the state label not included)
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Extracted fields in alphabetical order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        self.fields.iter().map(|(k, v)| (*k, *v))
    }

    /// Full presentation map: all fields plus `tcpi_state_str`, alphabetical
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&str, FieldValue<'_>> {
        let mut map: BTreeMap<&str, FieldValue<'_>> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, FieldValue::Number(*v)))
            .collect();
        map.insert(STATE_LABEL_KEY, FieldValue::Label(&self.state_label));
        map
    }
}

/// Serializes as one flat JSON object, keys in alphabetical order
impl Serialize for TcpInfoSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// `{tcpi_advmss=..., tcpi_ato=..., ...}`
impl fmt::Display for TcpInfoSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.to_map().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

// ============================================================================
// TESTS
// ============================================================================
