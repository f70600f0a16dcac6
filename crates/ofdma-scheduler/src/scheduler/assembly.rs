//! Station→RU assignment and construction of the DL MU transmission.

use tracing::debug;

use super::priority::PriorityScheduler;
use super::{Candidate, DlOfdmaInfo, DlReceiver, SchedulingRound};
use crate::config::{CursorPolicy, SchedulerConfig};
use crate::mac::{AccessPoint, Aid, ChannelWidth, MuTxVector, MuUserInfo, Preamble, TriggerDescriptor, TriggerKind, TxParams};
use crate::ru::{RuSpec, UniformSizing};
use crate::stats::SchedulerStats;

pub struct AssignmentAssembler<'c> {
    config: &'c SchedulerConfig,
}

impl<'c> AssignmentAssembler<'c> {
    pub fn new(config: &'c SchedulerConfig) -> Self {
        Self { config }
    }

    /// Builds the DL MU transmission for the candidates of `round` and
    /// moves `cursor` for the next round.
    pub fn assemble<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        round: &SchedulingRound,
        priority: &mut PriorityScheduler,
        cursor: &mut Option<Aid>,
        stats: &mut SchedulerStats,
    ) -> DlOfdmaInfo {
        let width = ap.channel_width();
        let candidates = &round.candidates;
        let Some(ack_sequence) = round.ack_sequence.filter(|_| !candidates.is_empty()) else {
            return DlOfdmaInfo::empty(width);
        };

        // 1. Who gets which RU
        let grants = self.grants(candidates, width, priority, stats);
        let granted = grants.len();
        debug!(admitted = candidates.len(), granted, "assigning RUs");

        // 2. Cursor for the next round
        self.update_cursor(candidates, &grants, round.next_cursor, cursor);

        // 3. TX vector, receivers and ack parameters
        let mut tx_vector = MuTxVector::new(Preamble::HeMu, width);
        let mut params = TxParams::for_dl(ack_sequence);
        let mut receivers = Vec::with_capacity(granted);
        for &(idx, ru) in &grants {
            let candidate = &candidates[idx];
            debug!(station = %candidate.station, aid = candidate.aid, %ru, "RU assigned");
            tx_vector.set_user(
                candidate.aid,
                MuUserInfo {
                    ru,
                    mode: ap.su_tx_mode(candidate.station),
                },
            );
            params.add_dl_receiver(candidate.station);
            receivers.push(DlReceiver {
                station: candidate.station,
                aid: candidate.aid,
                tid: candidate.tid,
                ru,
            });
        }
        stats.stations_served += granted as u64;

        // 4. MU-BAR built from the DL vector, so responses reuse its RUs
        let trigger = ack_sequence.needs_trigger().then(|| {
            let mut trigger = TriggerDescriptor::from_tx_vector(TriggerKind::MuBar, &tx_vector, self.config.trigger_max_mcs);
            trigger.ul_duration = ap.block_ack_window(&trigger, &params);
            trigger
        });

        DlOfdmaInfo {
            receivers,
            tx_vector,
            params,
            trigger,
        }
    }

    /// `(candidate index, RU)` pairs in grant order.
    fn grants(
        &self,
        candidates: &[Candidate],
        width: ChannelWidth,
        priority: &mut PriorityScheduler,
        stats: &mut SchedulerStats,
    ) -> Vec<(usize, RuSpec)> {
        if candidates.len() > 1 {
            stats.priority_rounds += 1;
            if let Some(plan) = priority.plan(candidates, width) {
                return plan.assignments.iter().map(|a| (a.candidate, a.ru)).collect();
            }
            stats.weighted_fallbacks += 1;
        }

        UniformSizing::compute(width, candidates.len())
            .ru_specs(width)
            .into_iter()
            .enumerate()
            .collect()
    }

    fn update_cursor(
        &self,
        candidates: &[Candidate],
        grants: &[(usize, RuSpec)],
        selector_cursor: Option<Aid>,
        cursor: &mut Option<Aid>,
    ) {
        let unserved = candidates
            .iter()
            .enumerate()
            .find(|(idx, _)| !grants.iter().any(|(served, _)| served == idx))
            .map(|(_, c)| c.aid);

        let next = match (unserved, self.config.cursor_policy) {
            (Some(aid), _) => Some(aid),
            (None, CursorPolicy::FirstOfRound) => candidates.first().map(|c| c.aid),
            (None, CursorPolicy::AfterLastServed) => selector_cursor.or(*cursor),
        };
        debug!(next = ?next, policy = ?self.config.cursor_policy, "next station to serve");
        *cursor = next;
    }
}
