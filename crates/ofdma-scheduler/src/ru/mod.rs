//! HE resource units and the two ways of partitioning a channel into them.
//!
//! - [`uniform`] grants every station an RU of the same size and maximises
//!   the number of stations served.
//! - [`weighted`] looks up a mixed-size partition from static tables so
//!   that higher-priority stations get the larger RUs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mac::ChannelWidth;

pub mod uniform;
pub mod weighted;

pub use uniform::{number_and_type_of_rus, UniformSizing};
pub use weighted::{PartitionTable, RuPartition, StaticPartitionTable};

/// RU size class, named after its tone count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuType {
    Tone26,
    Tone52,
    Tone106,
    Tone242,
    Tone484,
    Tone996,
    Tone2x996,
}

impl RuType {
    /// All classes, smallest first.
    pub const ALL: [RuType; 7] = [
        RuType::Tone26,
        RuType::Tone52,
        RuType::Tone106,
        RuType::Tone242,
        RuType::Tone484,
        RuType::Tone996,
        RuType::Tone2x996,
    ];

    pub fn tones(&self) -> u16 {
        match self {
            RuType::Tone26 => 26,
            RuType::Tone52 => 52,
            RuType::Tone106 => 106,
            RuType::Tone242 => 242,
            RuType::Tone484 => 484,
            RuType::Tone996 => 996,
            RuType::Tone2x996 => 1992,
        }
    }

    pub fn from_tones(tones: u16) -> Option<Self> {
        RuType::ALL.into_iter().find(|ru| ru.tones() == tones)
    }

    /// Number of 26-tone positions this RU covers in the tone plan.
    pub fn slots(&self) -> u16 {
        match self {
            RuType::Tone26 => 1,
            RuType::Tone52 => 2,
            RuType::Tone106 => 4,
            RuType::Tone242 => 9,
            RuType::Tone484 => 18,
            RuType::Tone996 => 37,
            RuType::Tone2x996 => 74,
        }
    }

    /// Number of RUs of this class that fit in a channel of `width`
    /// (the HE subcarrier-group table). 160 MHz only lists the full-band
    /// RU; narrower classes are reached through the two 80 MHz halves.
    pub fn count_in(&self, width: ChannelWidth) -> Option<usize> {
        use RuType::*;
        let n = match (width, self) {
            (ChannelWidth::Mhz20, Tone26) => 9,
            (ChannelWidth::Mhz20, Tone52) => 4,
            (ChannelWidth::Mhz20, Tone106) => 2,
            (ChannelWidth::Mhz20, Tone242) => 1,
            (ChannelWidth::Mhz40, Tone26) => 18,
            (ChannelWidth::Mhz40, Tone52) => 8,
            (ChannelWidth::Mhz40, Tone106) => 4,
            (ChannelWidth::Mhz40, Tone242) => 2,
            (ChannelWidth::Mhz40, Tone484) => 1,
            (ChannelWidth::Mhz80, Tone26) => 37,
            (ChannelWidth::Mhz80, Tone52) => 16,
            (ChannelWidth::Mhz80, Tone106) => 8,
            (ChannelWidth::Mhz80, Tone242) => 4,
            (ChannelWidth::Mhz80, Tone484) => 2,
            (ChannelWidth::Mhz80, Tone996) => 1,
            (ChannelWidth::Mhz160, Tone2x996) => 1,
            _ => return None,
        };
        Some(n)
    }
}

impl fmt::Display for RuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuType::Tone2x996 => write!(f, "RU_2x996_TONE"),
            other => write!(f, "RU_{}_TONE", other.tones()),
        }
    }
}

/// Tone budget of a channel, in 26-tone slots.
pub fn tone_budget(width: ChannelWidth) -> u16 {
    match width {
        ChannelWidth::Mhz20 => 9,
        ChannelWidth::Mhz40 => 18,
        ChannelWidth::Mhz80 => 37,
        ChannelWidth::Mhz160 => 74,
    }
}

/// A concrete resource unit: size class, 1-based index within the class
/// and, for 160 MHz channels, which 80 MHz half it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuSpec {
    pub primary_80mhz: bool,
    pub ru_type: RuType,
    pub index: usize,
}

impl RuSpec {
    pub fn new(ru_type: RuType, index: usize) -> Self {
        Self {
            primary_80mhz: true,
            ru_type,
            index,
        }
    }
}

impl fmt::Display for RuSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} idx {} ({})",
            self.ru_type,
            self.index,
            if self.primary_80mhz { "primary" } else { "secondary" }
        )
    }
}
