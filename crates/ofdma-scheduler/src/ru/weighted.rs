//! Mixed-size RU partitions for priority-driven allocation.
//!
//! The tables below list, per channel width and number of stations, one
//! partition of the channel into RUs of heterogeneous size, largest first.
//! Every entry tiles the tone budget exactly (see [`super::tone_budget`]).
//! Station counts for which no exact tiling exists are left out; callers
//! get an empty partition and fall back to uniform sizing.

use super::{tone_budget, RuType};
use crate::mac::ChannelWidth;

/// Ordered RU size classes, index 0 goes to the highest-priority station.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuPartition(Vec<RuType>);

impl RuPartition {
    pub fn new(rus: Vec<RuType>) -> Self {
        Self(rus)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[RuType] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = RuType> + '_ {
        self.0.iter().copied()
    }

    /// Total 26-tone slots covered by the partition.
    pub fn slots(&self) -> u16 {
        self.0.iter().map(RuType::slots).sum()
    }
}

/// Source of weighted partitions. Swappable so that tables can be retuned
/// (or replaced in tests) without touching the scheduler.
pub trait PartitionTable {
    /// Partition for `n_stations` stations, or an empty partition when the
    /// table has no entry for this width and count.
    fn partition(&self, width: ChannelWidth, n_stations: usize) -> RuPartition;
}

use RuType::{Tone106 as R106, Tone242 as R242, Tone26 as R26, Tone484 as R484, Tone52 as R52};

/// 20 MHz entries, index = number of stations - 1. `None` = no exact tiling.
const PARTITIONS_20MHZ: &[Option<&[RuType]>] = &[
    Some(&[R242]),
    None,
    Some(&[R106, R106, R26]),
    Some(&[R106, R52, R52, R26]),
    Some(&[R106, R52, R26, R26, R26]),
    Some(&[R52, R52, R52, R26, R26, R26]),
    Some(&[R52, R52, R26, R26, R26, R26, R26]),
    Some(&[R52, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R26, R26, R26, R26, R26, R26, R26, R26, R26]),
];

/// 40 MHz entries, index = number of stations - 1.
const PARTITIONS_40MHZ: &[Option<&[RuType]>] = &[
    Some(&[R484]),
    Some(&[R242, R242]),
    None,
    Some(&[R242, R106, R106, R26]),
    Some(&[R242, R106, R52, R52, R26]),
    Some(&[R242, R106, R52, R26, R26, R26]),
    Some(&[R242, R52, R52, R52, R26, R26, R26]),
    Some(&[R242, R52, R52, R26, R26, R26, R26, R26]),
    Some(&[R106, R106, R106, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R106, R52, R52, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R106, R52, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R106, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R52, R52, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R52, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R106, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R52, R52, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R52, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26, R26]),
    Some(&[R26; 18]),
];

/// Built-in tables for 20 and 40 MHz channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPartitionTable;

impl StaticPartitionTable {
    fn rows(width: ChannelWidth) -> Option<&'static [Option<&'static [RuType]>]> {
        match width {
            ChannelWidth::Mhz20 => Some(PARTITIONS_20MHZ),
            ChannelWidth::Mhz40 => Some(PARTITIONS_40MHZ),
            ChannelWidth::Mhz80 | ChannelWidth::Mhz160 => None,
        }
    }
}

impl PartitionTable for StaticPartitionTable {
    fn partition(&self, width: ChannelWidth, n_stations: usize) -> RuPartition {
        let Some(rows) = Self::rows(width) else {
            return RuPartition::empty();
        };
        if n_stations == 0 {
            return RuPartition::empty();
        }
        if n_stations > rows.len() {
            // Finest granularity, as many as fit in the channel.
            let n = (tone_budget(width) / RuType::Tone26.slots()) as usize;
            return RuPartition::new(vec![RuType::Tone26; n]);
        }
        match rows[n_stations - 1] {
            Some(rus) => RuPartition::new(rus.to_vec()),
            None => RuPartition::empty(),
        }
    }
}
