use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::Deserialize;

use ofdma_scheduler::config::SchedulerConfigInput;
use ofdma_scheduler::mac::{Aid, BufferStatus, ChannelWidth, DlAckSequence, Tid, TxMode};
use ofdma_scheduler::SchedulerConfig;

use crate::ap::{ApSettings, Backlog, SimAccessPoint, SimStation};

/// Scenario file: channel, access point timing, stations and their traffic.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// TID of the frame that won channel access at every opportunity.
    #[serde(default)]
    pub tid: Tid,
    #[serde(default)]
    pub ap: ApInput,
    #[serde(default)]
    pub scheduler: SchedulerConfigInput,
    #[serde(default)]
    pub stations: Vec<StationGroup>,
}

fn default_rounds() -> usize {
    10
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApInput {
    pub channel_width: Option<ChannelWidth>,
    pub max_ppdu_us: Option<u64>,
    pub txop_remaining_us: Option<u64>,
    pub ack_sequence: Option<DlAckSequence>,
    pub max_ampdu_bytes: Option<u32>,
}

/// Traffic of one queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum TrafficInput {
    Infinite {
        frame_size: u32,
    },
    /// Explicit frame sizes, in queue order.
    Frames {
        sizes: Vec<u32>,
    },
    /// `count` frames with sizes drawn uniformly in `[min_size, max_size]`.
    Random {
        count: usize,
        min_size: u32,
        max_size: u32,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferStatusInput {
    Unknown,
    Unlimited,
    Bytes(u32),
}

impl From<BufferStatusInput> for BufferStatus {
    fn from(input: BufferStatusInput) -> Self {
        match input {
            BufferStatusInput::Unknown => BufferStatus::Unknown,
            BufferStatusInput::Unlimited => BufferStatus::Unlimited,
            BufferStatusInput::Bytes(bytes) => BufferStatus::Bytes(bytes),
        }
    }
}

/// `count` identical stations, AIDs assigned in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationGroup {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default = "default_tids")]
    pub tids: Vec<Tid>,
    pub traffic: Option<TrafficInput>,
    #[serde(default)]
    pub mcs: u8,
    #[serde(default = "default_nss")]
    pub nss: u8,
    pub buffer_status: Option<BufferStatusInput>,
    /// Restrict block-ack agreements to these TIDs (default: all).
    pub ba_tids: Option<Vec<Tid>>,
}

fn default_count() -> usize {
    1
}

fn default_tids() -> Vec<Tid> {
    vec![0]
}

fn default_nss() -> u8 {
    1
}

/// A loaded scenario, ready to build a simulated access point.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub rounds: usize,
    pub tid: Tid,
    pub settings: ApSettings,
    pub scheduler: SchedulerConfig,
    pub stations: Vec<StationGroup>,
}

impl Scenario {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: ScenarioFile = toml::from_str(input).context("invalid scenario TOML")?;
        Self::from_file(file)
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("loading scenario {}", path.display()))
    }

    pub fn from_file(file: ScenarioFile) -> Result<Self> {
        if file.tid > 7 {
            bail!("tid must be within 0..=7, got {}", file.tid);
        }
        let total: usize = file.stations.iter().map(|g| g.count).sum();
        if total > usize::from(Aid::MAX) {
            bail!("too many stations: {total}");
        }
        for group in &file.stations {
            if let Some(tid) = group.tids.iter().find(|&&t| t > 7) {
                bail!("station TID must be within 0..=7, got {tid}");
            }
            if let Some(TrafficInput::Random { min_size, max_size, .. }) = &group.traffic {
                if min_size > max_size {
                    bail!("random traffic: min_size {min_size} > max_size {max_size}");
                }
            }
        }

        let defaults = ApSettings::default();
        let settings = ApSettings {
            channel_width: file.ap.channel_width.unwrap_or(defaults.channel_width),
            max_ppdu: file.ap.max_ppdu_us.map_or(defaults.max_ppdu, Duration::from_micros),
            txop_remaining: file.ap.txop_remaining_us.map(Duration::from_micros),
            ack_sequence: file.ap.ack_sequence.unwrap_or(defaults.ack_sequence),
            max_ampdu_bytes: file.ap.max_ampdu_bytes.unwrap_or(defaults.max_ampdu_bytes),
        };
        let scheduler = file.scheduler.resolve().context("invalid scheduler config")?;

        Ok(Self {
            name: file.name,
            seed: file.seed,
            rounds: file.rounds,
            tid: file.tid,
            settings,
            scheduler,
            stations: file.stations,
        })
    }

    /// Builds the access point. Random traffic is drawn from the scenario
    /// seed, so the same scenario always yields the same queues.
    pub fn build_access_point(&self) -> SimAccessPoint {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut ap = SimAccessPoint::new(self.settings.clone());
        // `from_file` caps the station total at `Aid::MAX`.
        let mut aids = 1..=Aid::MAX;

        for group in &self.stations {
            for aid in aids.by_ref().take(group.count) {
                let mut station = SimStation::new(aid);
                station.mode = TxMode {
                    mcs: group.mcs,
                    nss: group.nss,
                };
                if let Some(status) = group.buffer_status {
                    station.buffer_status = status.into();
                }
                if let Some(ba) = &group.ba_tids {
                    station.ba_tids = ba.clone();
                }
                if let Some(traffic) = &group.traffic {
                    for &tid in &group.tids {
                        station.queues.insert(tid, backlog(traffic, &mut rng));
                    }
                }
                ap.associate(station);
            }
        }
        ap
    }
}

fn backlog(traffic: &TrafficInput, rng: &mut StdRng) -> Backlog {
    match traffic {
        TrafficInput::Infinite { frame_size } => Backlog::Infinite {
            frame_size: *frame_size,
        },
        TrafficInput::Frames { sizes } => Backlog::Frames(sizes.iter().copied().collect()),
        TrafficInput::Random {
            count,
            min_size,
            max_size,
        } => Backlog::Frames(
            (0..*count)
                .map(|_| rng.random_range(*min_size..=*max_size))
                .collect::<VecDeque<u32>>(),
        ),
    }
}
