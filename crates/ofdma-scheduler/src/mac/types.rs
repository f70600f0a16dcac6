use std::fmt;

use serde::{Deserialize, Serialize};

/// Association identifier assigned by the AP.
pub type Aid = u16;

/// Traffic identifier (802.11 user priority), `0..=7`.
pub type Tid = u8;

/// 48-bit MAC address of an associated station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Builds a locally numbered address (`00:00:00:00:xx:yy`), the way
    /// simulated stations are usually allocated.
    pub fn from_index(index: u16) -> Self {
        let [hi, lo] = index.to_be_bytes();
        MacAddress([0, 0, 0, 0, hi, lo])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl std::str::FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.trim().split(':');
        for byte in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("MAC address too short: {s}"))?;
            *byte = u8::from_str_radix(part, 16)
                .map_err(|e| format!("invalid MAC octet {part:?}: {e}"))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address too long: {s}"));
        }
        Ok(MacAddress(out))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// EDCA access category.
///
/// Ordering follows the AC index used by the channel-access layer
/// (`Be < Bk < Vi < Vo`); a candidate TID is only admissible when its AC
/// is not lower than the AC that won the opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessCategory {
    Be,
    Bk,
    Vi,
    Vo,
}

impl AccessCategory {
    pub fn from_tid(tid: Tid) -> Self {
        match tid {
            1 | 2 => AccessCategory::Bk,
            4 | 5 => AccessCategory::Vi,
            6 | 7 => AccessCategory::Vo,
            _ => AccessCategory::Be,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessCategory::Be => "be",
            AccessCategory::Bk => "bk",
            AccessCategory::Vi => "vi",
            AccessCategory::Vo => "vo",
        }
    }
}

/// Operating channel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum ChannelWidth {
    Mhz20,
    Mhz40,
    Mhz80,
    Mhz160,
}

impl ChannelWidth {
    pub const ALL: [ChannelWidth; 4] = [
        ChannelWidth::Mhz20,
        ChannelWidth::Mhz40,
        ChannelWidth::Mhz80,
        ChannelWidth::Mhz160,
    ];

    pub fn mhz(&self) -> u16 {
        match self {
            ChannelWidth::Mhz20 => 20,
            ChannelWidth::Mhz40 => 40,
            ChannelWidth::Mhz80 => 80,
            ChannelWidth::Mhz160 => 160,
        }
    }

    pub fn from_mhz(mhz: u16) -> Option<Self> {
        match mhz {
            20 => Some(ChannelWidth::Mhz20),
            40 => Some(ChannelWidth::Mhz40),
            80 => Some(ChannelWidth::Mhz80),
            160 => Some(ChannelWidth::Mhz160),
            _ => None,
        }
    }
}

impl TryFrom<u16> for ChannelWidth {
    type Error = String;

    fn try_from(mhz: u16) -> Result<Self, Self::Error> {
        ChannelWidth::from_mhz(mhz).ok_or_else(|| format!("unsupported channel width {mhz} MHz"))
    }
}

impl From<ChannelWidth> for u16 {
    fn from(width: ChannelWidth) -> u16 {
        width.mhz()
    }
}

impl fmt::Display for ChannelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

/// Modulation and stream count a station is currently served with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMode {
    /// HE MCS index (0..=11).
    pub mcs: u8,
    /// Number of spatial streams.
    pub nss: u8,
}

impl Default for TxMode {
    fn default() -> Self {
        TxMode { mcs: 0, nss: 1 }
    }
}

/// Backlog a station reported for uplink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStatus {
    /// Queued bytes across all TIDs.
    Bytes(u32),
    /// No report received yet.
    Unknown,
    /// Backlog too large to be represented.
    Unlimited,
}

/// Acknowledgment sequence used after a DL MU PPDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DlAckSequence {
    /// Each receiver is polled with its own BlockAckReq in SU format.
    SuFormat,
    /// A MU-BAR trigger solicits all block acks at once.
    #[default]
    MuBar,
    /// The trigger is aggregated into the DL PSDUs; no separate request.
    AggregateTf,
}

impl DlAckSequence {
    /// Whether the sequence needs a trigger frame after the DL MU PPDU.
    pub fn needs_trigger(&self) -> bool {
        matches!(self, DlAckSequence::MuBar | DlAckSequence::AggregateTf)
    }
}

/// Fixed fallback order in which TIDs are explored after the requesting one.
pub const TID_FALLBACK_ORDER: [Tid; 8] = [1, 2, 0, 3, 4, 5, 6, 7];

/// TIDs to explore for a station, requesting TID first, no duplicates.
pub fn tid_search_order(requesting: Tid) -> impl Iterator<Item = Tid> {
    std::iter::once(requesting).chain(
        TID_FALLBACK_ORDER
            .into_iter()
            .filter(move |&tid| tid != requesting),
    )
}
