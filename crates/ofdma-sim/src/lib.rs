//! Deterministic access-point simulator for the OFDMA scheduler.
//!
//! A [`Scenario`] describes the channel, the stations and their queues; a
//! [`Simulation`] replays one scheduling decision per transmit opportunity,
//! feeds every decision back as the previous one, and records what was sent.

pub mod ap;
pub mod scenario;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use ofdma_scheduler::mac::{Aid, DlAckSequence};
use ofdma_scheduler::{Decision, RrOfdmaScheduler, SchedulerStats, TxFormat, TxOpportunity};

pub use ap::{ApSettings, Backlog, SimAccessPoint, SimStation};
pub use scenario::Scenario;

/// One opportunity as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub index: usize,
    pub format: TxFormat,
    /// `(aid, RU)` in grant order, RUs rendered as text.
    pub receivers: Vec<(Aid, String)>,
    /// Granted HE TB PPDU duration for UL rounds, in microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ul_duration_us: Option<u64>,
    /// How the DL MU PPDU is acknowledged; absent for empty DL rounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_sequence: Option<DlAckSequence>,
    pub bytes_delivered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimReport {
    pub scenario: String,
    pub rounds: Vec<RoundRecord>,
    /// DL grants per AID.
    pub served: BTreeMap<Aid, u64>,
    pub mean_stations_per_dl: f64,
    pub stats: SchedulerStats,
}

impl SimReport {
    /// AIDs served in `round`, sorted.
    pub fn served_in(&self, round: usize) -> Vec<Aid> {
        let mut aids: Vec<Aid> = self
            .rounds
            .get(round)
            .map(|r| r.receivers.iter().map(|(aid, _)| *aid).collect())
            .unwrap_or_default();
        aids.sort_unstable();
        aids
    }
}

pub struct Simulation {
    name: String,
    rounds: usize,
    tid: u8,
    ap: SimAccessPoint,
    scheduler: RrOfdmaScheduler,
    previous: Option<Decision>,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let scheduler = RrOfdmaScheduler::new(scenario.scheduler.clone())?;
        Ok(Self::with_scheduler(scenario, scheduler))
    }

    /// Uses a pre-built scheduler, e.g. one with a custom classifier or MCS
    /// sampler.
    pub fn with_scheduler(scenario: &Scenario, scheduler: RrOfdmaScheduler) -> Self {
        Self {
            name: scenario.name.clone(),
            rounds: scenario.rounds,
            tid: scenario.tid,
            ap: scenario.build_access_point(),
            scheduler,
            previous: None,
        }
    }

    pub fn access_point(&self) -> &SimAccessPoint {
        &self.ap
    }

    pub fn access_point_mut(&mut self) -> &mut SimAccessPoint {
        &mut self.ap
    }

    pub fn scheduler(&self) -> &RrOfdmaScheduler {
        &self.scheduler
    }

    /// Runs one opportunity and applies its outcome to the queues.
    pub fn step(&mut self, index: usize) -> RoundRecord {
        let opportunity = TxOpportunity {
            tid: self.tid,
            previous: self.previous.as_ref(),
        };
        let decision = self.scheduler.schedule(&self.ap, opportunity);
        let delivered = self.ap.deliver(&decision);

        let record = RoundRecord {
            index,
            format: decision.format(),
            receivers: decision
                .dl()
                .map(|dl| dl.receivers.iter().map(|r| (r.aid, r.ru.to_string())).collect())
                .unwrap_or_default(),
            ul_duration_us: decision.ul().map(|ul| ul.trigger.ul_duration.as_micros() as u64),
            ack_sequence: decision.dl().and_then(|dl| dl.ack_sequence()),
            bytes_delivered: delivered.iter().map(|(_, b)| u64::from(*b)).sum(),
        };
        self.previous = Some(decision);
        record
    }

    pub fn run(mut self) -> SimReport {
        let mut records = Vec::with_capacity(self.rounds);
        let mut served: BTreeMap<Aid, u64> = BTreeMap::new();
        for index in 0..self.rounds {
            let record = self.step(index);
            for (aid, _) in &record.receivers {
                *served.entry(*aid).or_default() += 1;
            }
            records.push(record);
        }
        let stats = self.scheduler.stats().clone();
        info!(
            scenario = %self.name,
            rounds = records.len(),
            dl = stats.dl_ofdma,
            ul = stats.ul_ofdma,
            "simulation finished"
        );
        SimReport {
            scenario: self.name,
            rounds: records,
            served,
            mean_stations_per_dl: stats.mean_stations_per_dl(),
            stats,
        }
    }
}
