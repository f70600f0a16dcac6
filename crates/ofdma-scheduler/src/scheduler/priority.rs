//! # M-LWDF Priority Ranking
//!
//! Ranks the candidates of a DL round by an urgency cost in the spirit of
//! Modified Largest Weighted Delay First:
//!
//! ```text
//! cost(i) = payload(i) × weight(class(i)) × rate(mcs(i)) / C̄
//! C̄       = log2( mean_i payload(i) / airtime(payload(i), mcs_ref) )
//! ```
//!
//! Candidates are sorted by descending cost (stable, ties keep enumeration
//! order) and the weighted partition for the round is handed out in rank
//! order, so the most urgent station gets the largest RU.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Candidate;
use crate::config::{ClassifierConfig, McsSamplingConfig};
use crate::mac::{ChannelWidth, MacAddress};
use crate::ru::{PartitionTable, RuPartition, RuSpec, RuType};

/// Tones assumed per OFDM symbol when estimating airtime.
pub const AIRTIME_TONES: f64 = 242.0;
/// OFDM symbol duration including guard interval, in seconds.
pub const SYMBOL_DURATION_S: f64 = 13.6e-6;

/// QoS class of a candidate. Lower class number = more demanding traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TrafficClass {
    Class1,
    Class2,
    Class3,
    Class4,
}

impl TrafficClass {
    /// Delay-tolerance weight, decreasing with class number.
    pub fn weight(&self) -> f64 {
        match self {
            TrafficClass::Class1 => 10.0,
            TrafficClass::Class2 => 5.4927,
            TrafficClass::Class3 => 2.3299,
            TrafficClass::Class4 => 1.50515,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            TrafficClass::Class1 => 1,
            TrafficClass::Class2 => 2,
            TrafficClass::Class3 => 3,
            TrafficClass::Class4 => 4,
        }
    }
}

impl TryFrom<u8> for TrafficClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(TrafficClass::Class1),
            2 => Ok(TrafficClass::Class2),
            3 => Ok(TrafficClass::Class3),
            4 => Ok(TrafficClass::Class4),
            other => Err(format!("traffic class must be within 1..=4, got {other}")),
        }
    }
}

impl From<TrafficClass> for u8 {
    fn from(class: TrafficClass) -> u8 {
        class.number()
    }
}

/// Maps a candidate to its traffic class.
pub trait TrafficClassifier {
    fn classify(&self, candidate: &Candidate) -> TrafficClass;
}

impl<F> TrafficClassifier for F
where
    F: Fn(&Candidate) -> TrafficClass,
{
    fn classify(&self, candidate: &Candidate) -> TrafficClass {
        self(candidate)
    }
}

/// Classifies by TID, with optional per-station overrides.
#[derive(Debug, Clone, Default)]
pub struct TidClassifier {
    config: ClassifierConfig,
}

impl TidClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn with_station(mut self, station: MacAddress, class: TrafficClass) -> Self {
        self.config.stations.retain(|(mac, _)| *mac != station);
        self.config.stations.push((station, class));
        self
    }
}

impl TrafficClassifier for TidClassifier {
    fn classify(&self, candidate: &Candidate) -> TrafficClass {
        self.config
            .stations
            .iter()
            .find(|(mac, _)| *mac == candidate.station)
            .map(|(_, class)| *class)
            .unwrap_or_else(|| self.config.tid_classes[usize::from(candidate.tid & 0x07)])
    }
}

/// Supplies the modulation index a candidate is assumed to be served at.
///
/// The default draws it at random; a link-adaptation estimate can be
/// plugged in instead without touching the ranking.
pub trait McsSampler {
    fn sample(&mut self, candidate: &Candidate) -> u8;
}

/// Draws MCS indices uniformly from a closed range with a seeded RNG, so
/// that a given seed always produces the same sequence of decisions.
#[derive(Debug)]
pub struct UniformMcsSampler {
    rng: StdRng,
    lower: u8,
    upper: u8,
}

impl UniformMcsSampler {
    pub fn new(config: McsSamplingConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            lower: config.lower,
            upper: config.upper.max(config.lower),
        }
    }
}

impl McsSampler for UniformMcsSampler {
    fn sample(&mut self, _candidate: &Candidate) -> u8 {
        self.rng.random_range(self.lower..=self.upper)
    }
}

/// Always returns the same MCS.
#[derive(Debug, Clone, Copy)]
pub struct FixedMcs(pub u8);

impl McsSampler for FixedMcs {
    fn sample(&mut self, _candidate: &Candidate) -> u8 {
        self.0
    }
}

const RATES_20MHZ_MBPS: [f64; 12] = [
    8.1, 16.3, 24.4, 32.5, 48.8, 65.0, 73.1, 81.3, 97.5, 108.3, 129.0, 135.4,
];
const RATES_40MHZ_MBPS: [f64; 12] = [
    16.3, 32.5, 48.8, 65.0, 97.5, 130.0, 146.3, 162.5, 195.0, 216.7, 243.8, 270.8,
];

/// Instantaneous PHY rate (Mb/s) for a sampled MCS in `1..=12`; `0.0`
/// outside that range. Channels wider than 20 MHz use the 40 MHz table.
pub fn phy_rate_mbps(mcs: u8, width: ChannelWidth) -> f64 {
    let table = match width {
        ChannelWidth::Mhz20 => &RATES_20MHZ_MBPS,
        _ => &RATES_40MHZ_MBPS,
    };
    match mcs {
        1..=12 => table[usize::from(mcs - 1)],
        _ => 0.0,
    }
}

/// Constellation order and code rate of a HE MCS index.
pub fn he_modulation(mcs: u8) -> (f64, f64) {
    match mcs {
        0 => (2.0, 1.0 / 2.0),
        1 => (4.0, 1.0 / 2.0),
        2 => (4.0, 3.0 / 4.0),
        3 => (16.0, 1.0 / 2.0),
        4 => (16.0, 3.0 / 4.0),
        5 => (64.0, 2.0 / 3.0),
        6 => (64.0, 3.0 / 4.0),
        7 => (64.0, 5.0 / 6.0),
        8 => (256.0, 3.0 / 4.0),
        9 => (256.0, 5.0 / 6.0),
        10 => (1024.0, 3.0 / 4.0),
        11 => (1024.0, 5.0 / 6.0),
        _ => (2.0, 5.0 / 6.0),
    }
}

/// Airtime in seconds to send `bytes` at `mcs` over [`AIRTIME_TONES`] tones.
pub fn transmission_time(bytes: u32, mcs: u8) -> f64 {
    if bytes == 0 {
        return 0.0;
    }
    let (order, code_rate) = he_modulation(mcs);
    let bits = f64::from(bytes) * 8.0;
    let bits_per_symbol = order.log2() * code_rate * AIRTIME_TONES;
    bits / bits_per_symbol * SYMBOL_DURATION_S
}

/// `log2` of the mean per-candidate throughput (bytes/s) at `mcs`.
/// Empty payloads count as zero throughput.
pub fn average_channel_capacity(payloads: &[u32], mcs: u8) -> f64 {
    if payloads.is_empty() {
        return 0.0;
    }
    let total: f64 = payloads
        .iter()
        .map(|&bytes| {
            let t = transmission_time(bytes, mcs);
            if t > 0.0 {
                f64::from(bytes) / t
            } else {
                0.0
            }
        })
        .sum();
    (total / payloads.len() as f64).log2()
}

/// One candidate's ranking inputs and resulting cost.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityEntry {
    /// Position of the candidate in the round's enumeration order.
    pub candidate: usize,
    pub class: TrafficClass,
    pub mcs: u8,
    pub rate_mbps: f64,
    pub cost: f64,
}

/// RU handed to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuAssignment {
    pub candidate: usize,
    pub ru: RuSpec,
}

/// Result of a priority round: the full ranking and the RUs granted, in
/// rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityPlan {
    pub ranking: Vec<PriorityEntry>,
    pub partition: RuPartition,
    pub assignments: Vec<RuAssignment>,
}

pub struct PriorityScheduler {
    classifier: Box<dyn TrafficClassifier>,
    sampler: Box<dyn McsSampler>,
    table: Box<dyn PartitionTable>,
    reference_mcs: u8,
}

impl PriorityScheduler {
    pub fn new(
        classifier: Box<dyn TrafficClassifier>,
        sampler: Box<dyn McsSampler>,
        table: Box<dyn PartitionTable>,
        reference_mcs: u8,
    ) -> Self {
        Self {
            classifier,
            sampler,
            table,
            reference_mcs,
        }
    }

    pub fn set_classifier(&mut self, classifier: Box<dyn TrafficClassifier>) {
        self.classifier = classifier;
    }

    pub fn set_sampler(&mut self, sampler: Box<dyn McsSampler>) {
        self.sampler = sampler;
    }

    pub fn set_partition_table(&mut self, table: Box<dyn PartitionTable>) {
        self.table = table;
    }

    /// Computes every candidate's cost and returns them sorted by
    /// descending cost. Ties keep their enumeration order.
    pub fn rank(&mut self, candidates: &[Candidate], width: ChannelWidth) -> Vec<PriorityEntry> {
        let payloads: Vec<u32> = candidates.iter().map(|c| c.payload).collect();
        let capacity = average_channel_capacity(&payloads, self.reference_mcs);

        let mut ranking: Vec<PriorityEntry> = candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| {
                let class = self.classifier.classify(candidate);
                let mcs = self.sampler.sample(candidate);
                let rate_mbps = phy_rate_mbps(mcs, width);
                let cost = if capacity.is_finite() && capacity > 0.0 {
                    f64::from(candidate.payload) * class.weight() * rate_mbps / capacity
                } else {
                    0.0
                };
                PriorityEntry {
                    candidate: idx,
                    class,
                    mcs,
                    rate_mbps,
                    cost,
                }
            })
            .collect();

        // Vec::sort_by is stable.
        ranking.sort_by(|a, b| b.cost.total_cmp(&a.cost));
        ranking
    }

    /// Ranks the candidates and assigns the weighted partition in rank
    /// order. Returns `None` for degenerate rounds (fewer than two
    /// candidates) and when the partition table has no entry, in which
    /// case the caller falls back to uniform sizing.
    pub fn plan(&mut self, candidates: &[Candidate], width: ChannelWidth) -> Option<PriorityPlan> {
        if candidates.len() < 2 {
            return None;
        }

        let ranking = self.rank(candidates, width);
        let partition = self.table.partition(width, candidates.len());
        if partition.is_empty() {
            debug!(
                n = candidates.len(),
                %width,
                "no weighted partition, falling back to uniform sizing"
            );
            return None;
        }

        let mut per_class = [0usize; RuType::ALL.len()];
        let assignments: Vec<RuAssignment> = ranking
            .iter()
            .zip(partition.iter())
            .map(|(entry, ru_type)| {
                let counter = &mut per_class[ru_type as usize];
                *counter += 1;
                RuAssignment {
                    candidate: entry.candidate,
                    ru: RuSpec::new(ru_type, *counter),
                }
            })
            .collect();

        for (rank, (entry, assignment)) in ranking.iter().zip(&assignments).enumerate() {
            debug!(
                rank,
                station = %candidates[entry.candidate].station,
                class = entry.class.number(),
                mcs = entry.mcs,
                cost = entry.cost,
                ru = %assignment.ru,
                "priority assignment"
            );
        }

        Some(PriorityPlan {
            ranking,
            partition,
            assignments,
        })
    }
}
