//! Byte-exact description of the kernel's `struct tcp_info`
//!
//! This is the single source of truth for the binary shape of the buffer we
//! hand to `getsockopt(TCP_INFO)`. The fetcher uses it twice: once to size the
//! scratch buffer, and once to pull each named field back out.
//!
//! # Educational Notes
//!
//! ## The Layout We Describe
//!
//! From `/usr/include/netinet/tcp.h` (the portion present in every kernel
//! since 2.6):
//!
//! ```c
//! struct tcp_info {
//!     uint8_t  tcpi_state;
//!     uint8_t  tcpi_ca_state;
//!     uint8_t  tcpi_retransmits;
//!     uint8_t  tcpi_probes;
//!     uint8_t  tcpi_backoff;
//!     uint8_t  tcpi_options;
//!     uint8_t  tcpi_snd_wscale : 4, tcpi_rcv_wscale : 4;
//!     /* newer kernels: uint8_t tcpi_delivery_rate_app_limited : 1, ... */
//!
//!     uint32_t tcpi_rto;
//!     ...
//!     uint32_t tcpi_total_retrans;
//! };
//! ```
//!
//! Newer kernels keep appending fields after `tcpi_total_retrans`. The kernel
//! copies `min(optlen, sizeof(struct tcp_info))` bytes, so asking for exactly
//! this prefix works on every kernel that has it.
//!
//! ## Bit-Fields
//!
//! The two window-scale nibbles share one byte, and how a C compiler orders
//! bit-fields inside a byte is implementation-defined. We therefore describe
//! that byte as `PackedNibbles` with no name: it is part of the layout (it
//! takes up space) but it is never extracted.
//!
//! ## Why Not Just a #[repr(C)] Struct?
//!
//! A `#[repr(C)]` mirror exists below ([`TcpInfoRaw`]) and is used to
//! cross-check this table at compile time. But a struct cannot answer
//! "which fields fit in the first N bytes?", which is exactly what we need
//! when the kernel hands back fewer bytes than we asked for. The table can.

// ============================================================================
// FIELD DESCRIPTION TYPES
// ============================================================================

/// Width of one entry in the layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    OneByte,
    FourBytes,
}

impl FieldWidth {
    /// Width in bytes
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            FieldWidth::OneByte => 1,
            FieldWidth::FourBytes => 4,
        }
    }
}

/// How the bytes of a layout entry are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Single raw byte, widened to u32 on extraction
    OpaqueByte,
    /// Native-endian unsigned 32-bit integer
    Unsigned32,
    /// Two 4-bit sub-values sharing one byte (`snd_wscale`/`rcv_wscale`)
    PackedNibbles,
    /// Alignment filler, carries no data
    Padding,
}

/// One entry in the `tcp_info` layout table
///
/// Entries without a name (`PackedNibbles`, `Padding`) occupy space but are
/// skipped during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: Option<&'static str>,
    pub offset: usize,
    pub width: FieldWidth,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn byte(name: &'static str, offset: usize) -> Self {
        Self {
            name: Some(name),
            offset,
            width: FieldWidth::OneByte,
            kind: FieldKind::OpaqueByte,
        }
    }

    const fn word(name: &'static str, offset: usize) -> Self {
        Self {
            name: Some(name),
            offset,
            width: FieldWidth::FourBytes,
            kind: FieldKind::Unsigned32,
        }
    }

    const fn unnamed(offset: usize, kind: FieldKind) -> Self {
        Self {
            name: None,
            offset,
            width: FieldWidth::OneByte,
            kind,
        }
    }

    /// First byte past this field
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.width.bytes()
    }

    /// True if this entry carries a value that gets extracted
    #[must_use]
    pub const fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

// ============================================================================
// THE TABLE
// ============================================================================

/// All entries of `struct tcp_info`, in kernel declaration order
const TCP_INFO_FIELDS: [FieldSpec; 32] = [
    // === State and options (8 bytes) ===
    FieldSpec::byte("tcpi_state", 0),
    FieldSpec::byte("tcpi_ca_state", 1),
    FieldSpec::byte("tcpi_retransmits", 2),
    FieldSpec::byte("tcpi_probes", 3),
    FieldSpec::byte("tcpi_backoff", 4),
    FieldSpec::byte("tcpi_options", 5),
    FieldSpec::unnamed(6, FieldKind::PackedNibbles), // snd_wscale:4, rcv_wscale:4
    FieldSpec::unnamed(7, FieldKind::Padding),       // align to 4
    // === Timeouts ===
    FieldSpec::word("tcpi_rto", 8),
    FieldSpec::word("tcpi_ato", 12),
    // === MSS ===
    FieldSpec::word("tcpi_snd_mss", 16),
    FieldSpec::word("tcpi_rcv_mss", 20),
    // === Packet counts ===
    FieldSpec::word("tcpi_unacked", 24),
    FieldSpec::word("tcpi_sacked", 28),
    FieldSpec::word("tcpi_lost", 32),
    FieldSpec::word("tcpi_retrans", 36),
    FieldSpec::word("tcpi_fackets", 40),
    // === Times (milliseconds) ===
    FieldSpec::word("tcpi_last_data_sent", 44),
    FieldSpec::word("tcpi_last_ack_sent", 48),
    FieldSpec::word("tcpi_last_data_recv", 52),
    FieldSpec::word("tcpi_last_ack_recv", 56),
    // === Metrics ===
    FieldSpec::word("tcpi_pmtu", 60),
    FieldSpec::word("tcpi_rcv_ssthresh", 64),
    FieldSpec::word("tcpi_rtt", 68),
    FieldSpec::word("tcpi_rttvar", 72),
    FieldSpec::word("tcpi_snd_ssthresh", 76),
    FieldSpec::word("tcpi_snd_cwnd", 80),
    FieldSpec::word("tcpi_advmss", 84),
    FieldSpec::word("tcpi_reordering", 88),
    FieldSpec::word("tcpi_rcv_rtt", 92),
    FieldSpec::word("tcpi_rcv_space", 96),
    FieldSpec::word("tcpi_total_retrans", 100),
];

/// Ordered layout of a fixed-size kernel struct
#[derive(Debug, Clone, Copy)]
pub struct StructLayout {
    name: &'static str,
    fields: &'static [FieldSpec],
}

/// The process-wide `struct tcp_info` layout
pub const TCP_INFO_LAYOUT: StructLayout = StructLayout {
    name: "tcp_info",
    fields: &TCP_INFO_FIELDS,
};

impl StructLayout {
    /// Struct name, for log messages
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Every entry, padding included, in declaration order
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Total byte size: sum of all entry widths (padding included)
    #[must_use]
    pub const fn total_size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].width.bytes();
            i += 1;
        }
        total
    }

    /// Entries that carry a value, in declaration order
    pub fn named_fields(&self) -> impl Iterator<Item = (&'static str, &'static FieldSpec)> {
        let fields: &'static [FieldSpec] = self.fields;
        fields
            .iter()
            .filter_map(|spec| spec.name.map(|name| (name, spec)))
    }

    /// Look up a named entry
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        let fields: &'static [FieldSpec] = self.fields;
        fields.iter().find(|spec| spec.name == Some(name))
    }
}

// ============================================================================
// COMPILE-TIME CROSS-CHECK
// ============================================================================

/// `#[repr(C)]` mirror of the described prefix of `struct tcp_info`
///
/// Never read from the kernel directly; it only pins the table's total size
/// (and, in tests, every offset) to what a C compiler would produce.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpInfoRaw {
    pub tcpi_state: u8,
    pub tcpi_ca_state: u8,
    pub tcpi_retransmits: u8,
    pub tcpi_probes: u8,
    pub tcpi_backoff: u8,
    pub tcpi_options: u8,
    pub tcpi_wscale: u8, // snd_wscale (bits 0-3) + rcv_wscale (bits 4-7)
    pub tcpi_pad: u8,

    pub tcpi_rto: u32,
    pub tcpi_ato: u32,
    pub tcpi_snd_mss: u32,
    pub tcpi_rcv_mss: u32,

    pub tcpi_unacked: u32,
    pub tcpi_sacked: u32,
    pub tcpi_lost: u32,
    pub tcpi_retrans: u32,
    pub tcpi_fackets: u32,

    pub tcpi_last_data_sent: u32,
    pub tcpi_last_ack_sent: u32,
    pub tcpi_last_data_recv: u32,
    pub tcpi_last_ack_recv: u32,

    pub tcpi_pmtu: u32,
    pub tcpi_rcv_ssthresh: u32,
    pub tcpi_rtt: u32,
    pub tcpi_rttvar: u32,
    pub tcpi_snd_ssthresh: u32,
    pub tcpi_snd_cwnd: u32,
    pub tcpi_advmss: u32,
    pub tcpi_reordering: u32,

    pub tcpi_rcv_rtt: u32,
    pub tcpi_rcv_space: u32,

    pub tcpi_total_retrans: u32,
}

const _: () = assert!(TCP_INFO_LAYOUT.total_size() == std::mem::size_of::<TcpInfoRaw>());

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_total_size() {
        // 8 bytes of state/options + 24 four-byte counters
        assert_eq!(TCP_INFO_LAYOUT.total_size(), 104);
        assert_eq!(std::mem::size_of::<TcpInfoRaw>(), 104);
    }

    #[test]
    fn test_fields_contiguous_and_in_bounds() {
        let total = TCP_INFO_LAYOUT.total_size();
        let mut expected_offset = 0;

        for spec in TCP_INFO_LAYOUT.fields() {
            assert_eq!(spec.offset, expected_offset, "gap before {:?}", spec);
            assert!(spec.end() <= total, "{:?} runs past the struct", spec);
            expected_offset = spec.end();
        }

        assert_eq!(expected_offset, total);
    }

    #[test]
    fn test_word_fields_are_aligned() {
        for (name, spec) in TCP_INFO_LAYOUT.named_fields() {
            if spec.width == FieldWidth::FourBytes {
                assert_eq!(spec.offset % 4, 0, "{name} is misaligned");
            }
        }
    }

    #[test]
    fn test_named_fields() {
        let names: Vec<&str> = TCP_INFO_LAYOUT.named_fields().map(|(n, _)| n).collect();

        assert_eq!(names.len(), 30);
        assert_eq!(names.first(), Some(&"tcpi_state"));
        assert_eq!(names.last(), Some(&"tcpi_total_retrans"));
        assert!(names.iter().all(|n| n.starts_with("tcpi_")));

        // Unnamed entries: the wscale byte and one padding byte
        let unnamed: Vec<FieldKind> = TCP_INFO_LAYOUT
            .fields()
            .iter()
            .filter(|spec| !spec.is_named())
            .map(|spec| spec.kind)
            .collect();
        assert_eq!(unnamed, vec![FieldKind::PackedNibbles, FieldKind::Padding]);
    }

    #[test]
    fn test_field_lookup() {
        let rtt = TCP_INFO_LAYOUT.field("tcpi_rtt").expect("tcpi_rtt in layout");
        assert_eq!(rtt.offset, 68);
        assert_eq!(rtt.kind, FieldKind::Unsigned32);

        assert!(TCP_INFO_LAYOUT.field("tcpi_snd_wscale").is_none());
        assert!(TCP_INFO_LAYOUT.field("nope").is_none());
    }

    #[test]
    fn test_offsets_match_repr_c() {
        // Spot-check the table against what the compiler lays out
        let pairs = [
            ("tcpi_state", offset_of!(TcpInfoRaw, tcpi_state)),
            ("tcpi_options", offset_of!(TcpInfoRaw, tcpi_options)),
            ("tcpi_rto", offset_of!(TcpInfoRaw, tcpi_rto)),
            ("tcpi_fackets", offset_of!(TcpInfoRaw, tcpi_fackets)),
            ("tcpi_pmtu", offset_of!(TcpInfoRaw, tcpi_pmtu)),
            ("tcpi_rtt", offset_of!(TcpInfoRaw, tcpi_rtt)),
            ("tcpi_snd_cwnd", offset_of!(TcpInfoRaw, tcpi_snd_cwnd)),
            ("tcpi_rcv_space", offset_of!(TcpInfoRaw, tcpi_rcv_space)),
            ("tcpi_total_retrans", offset_of!(TcpInfoRaw, tcpi_total_retrans)),
        ];

        for (name, offset) in pairs {
            assert_eq!(TCP_INFO_LAYOUT.field(name).map(|s| s.offset), Some(offset), "{name}");
        }
        assert_eq!(offset_of!(TcpInfoRaw, tcpi_wscale), 6);
    }
}
