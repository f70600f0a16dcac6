//! Transmission format selection and DL candidate admission.

use std::time::Duration;

use tracing::{debug, warn};

use super::{Candidate, DlOfdmaInfo, SchedulingRound, TxOpportunity, UlOfdmaInfo};
use crate::config::SchedulerConfig;
use crate::mac::{
    tid_search_order, AccessCategory, AccessPoint, Aid, BufferStatus, DlAckSequence, MacAddress, MuTxVector, MuUserInfo,
    Preamble, QueuedFrame, TriggerDescriptor, TriggerKind, TxParams,
};
use crate::ru::{number_and_type_of_rus, RuSpec, RuType, UniformSizing};
use crate::stats::SchedulerStats;

/// Outcome of format selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    NonOfdma,
    /// DL MU transmission to the candidates collected in the round. Empty
    /// only when DL OFDMA is forced.
    DlOfdma,
    UlOfdma(UlOfdmaInfo),
    /// The UL solicitation does not fit now. Nothing is sent and the stations
    /// of the carried vector are solicited again next time.
    UlDeferred(MuTxVector),
}

enum UlAttempt {
    /// No station reported pending data.
    Skip,
    Abort,
    Grant(UlOfdmaInfo),
}

pub struct FormatSelector<'c> {
    config: &'c SchedulerConfig,
}

impl<'c> FormatSelector<'c> {
    pub fn new(config: &'c SchedulerConfig) -> Self {
        Self { config }
    }

    /// Decides the format of the transmission starting at `opportunity`.
    ///
    /// DL candidates are written to `round`; `cursor` is resolved against
    /// the roster and the position reached by the walk is stored in
    /// `round.next_cursor`.
    pub fn select<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        opportunity: &TxOpportunity<'_>,
        cursor: &mut Option<Aid>,
        round: &mut SchedulingRound,
        stats: &mut SchedulerStats,
    ) -> Selection {
        if self.config.enable_ul_ofdma {
            if let Some(previous) = opportunity.previous.and_then(|d| d.dl()) {
                match self.try_ul(ap, opportunity, previous) {
                    UlAttempt::Grant(info) => return Selection::UlOfdma(info),
                    UlAttempt::Abort => {
                        stats.ul_aborted += 1;
                        round.clear();
                        return Selection::UlDeferred(previous.tx_vector.clone());
                    }
                    UlAttempt::Skip => {}
                }
            }
        }

        self.select_dl(ap, opportunity, cursor, round, stats)
    }

    fn try_ul<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        opportunity: &TxOpportunity<'_>,
        previous: &DlOfdmaInfo,
    ) -> UlAttempt {
        let roster = ap.stations();
        let vector = &previous.tx_vector;

        let mut params = TxParams::default();
        for aid in vector.users.keys() {
            match roster.get(aid) {
                Some(&station) => params.add_ul_sender(station),
                None => warn!(aid, "station left the BSS since the last DL MU transmission"),
            }
        }

        // 1. Largest backlog reported by the previous receivers
        let mut max_backlog: u32 = 0;
        for aid in vector.users.keys() {
            let Some(&station) = roster.get(aid) else {
                continue;
            };
            match ap.buffer_status(station) {
                BufferStatus::Unknown => {
                    debug!(%station, "buffer status unknown");
                    max_backlog = max_backlog.max(self.config.ul_psdu_size);
                }
                BufferStatus::Unlimited => {
                    debug!(%station, "buffer status not limited");
                    max_backlog = u32::MAX;
                    break;
                }
                BufferStatus::Bytes(bytes) => {
                    debug!(%station, bytes, "buffer status");
                    max_backlog = max_backlog.max(bytes);
                }
            }
        }

        if max_backlog == 0 {
            return UlAttempt::Skip;
        }

        let mut trigger = TriggerDescriptor::from_tx_vector(TriggerKind::Basic, vector, self.config.trigger_max_mcs);
        let Some(first_aid) = trigger.users.first().map(|u| u.aid) else {
            return UlAttempt::Skip;
        };

        // 2. Time available to the solicited stations
        let ac = AccessCategory::from_tid(opportunity.tid);
        let mut max_duration = ap.max_ppdu_duration();
        if let Some(remaining) = ap.txop_remaining(ac) {
            let response = ap.response_duration(&params, vector, Some(&trigger));
            let Some(available) = remaining.checked_sub(response) else {
                debug!(ac = ac.as_str(), ?remaining, ?response, "remaining TXOP too short for UL MU exchange");
                return UlAttempt::Abort;
            };
            max_duration = max_duration.min(available);
        }

        // 3. Grant what the backlog needs, or give up if the window cannot
        //    carry a single solicited PSDU
        let tb_vector = trigger.tb_vector();
        let buffer_time = ap.ppdu_duration(max_backlog, &tb_vector, first_aid);
        if buffer_time < max_duration {
            max_duration = buffer_time;
        } else {
            let min_duration = ap.ppdu_duration(self.config.ul_psdu_size, &tb_vector, first_aid);
            if max_duration < min_duration {
                debug!(available = ?max_duration, needed = ?min_duration, "UL window too short");
                return UlAttempt::Abort;
            }
        }

        debug!(ul_duration = ?max_duration, users = trigger.users.len(), "soliciting HE TB PPDU");
        trigger.ul_duration = max_duration;
        UlAttempt::Grant(UlOfdmaInfo { trigger, params })
    }

    fn select_dl<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        opportunity: &TxOpportunity<'_>,
        cursor: &mut Option<Aid>,
        round: &mut SchedulingRound,
        stats: &mut SchedulerStats,
    ) -> Selection {
        round.clear();

        let roster = ap.stations();
        let Some(head) = roster.keys().next().copied() else {
            debug!("no associated stations");
            return self.no_candidates();
        };

        // Start where the previous round stopped, or at the roster head if
        // that station has left.
        let start = match *cursor {
            Some(aid) if roster.contains_key(&aid) => aid,
            Some(aid) => {
                debug!(aid, head, "cursor station left, restarting from roster head");
                stats.cursor_resets += 1;
                head
            }
            None => head,
        };
        *cursor = Some(start);

        let order: Vec<(Aid, MacAddress)> = roster
            .range(start..)
            .chain(roster.range(..start))
            .map(|(&aid, &mac)| (aid, mac))
            .collect();

        let width = ap.channel_width();
        let primary_ac = AccessCategory::from_tid(opportunity.tid);
        let ack_sequence = ap.dl_ack_sequence(primary_ac);

        let mut count = self.config.max_stations;
        let ru_type = number_and_type_of_rus(width, &mut count);
        assert!(count >= 1, "uniform sizing granted no RU");

        // Best guess for the response time: the AP has frames for every
        // station following the cursor.
        let (guess, guess_params) = self.guess_transmission(ap, &order, UniformSizing { ru_type, count }, ack_sequence);

        let budget = match ap.txop_remaining(primary_ac) {
            Some(remaining) => {
                let trigger = ack_sequence.needs_trigger().then(|| {
                    let mut t = TriggerDescriptor::from_tx_vector(TriggerKind::MuBar, &guess, self.config.trigger_max_mcs);
                    t.ul_duration = ap.block_ack_window(&t, &guess_params);
                    t
                });
                let response = ap.response_duration(&guess_params, &guess, trigger.as_ref());
                match remaining.checked_sub(response) {
                    Some(budget) => Some(budget),
                    None => {
                        debug!(ac = primary_ac.as_str(), ?remaining, ?response, "not enough TXOP remaining time");
                        return self.no_candidates();
                    }
                }
            }
            None => None,
        };

        let mut examined = 0;
        for &(aid, station) in &order {
            examined += 1;
            debug!(%station, aid, "next candidate station");
            if let Some(candidate) = self.admit(ap, aid, station, opportunity, ru_type, budget) {
                debug!(%station, aid, tid = candidate.tid, payload = candidate.payload, "adding candidate");
                round.candidates.push(candidate);
                if round.candidates.len() >= self.config.max_stations {
                    break;
                }
            }
        }

        if round.is_empty() {
            debug!("no suitable frames to transmit");
            return self.no_candidates();
        }

        let next = order[examined % order.len()].0;
        *cursor = Some(next);
        round.next_cursor = Some(next);
        round.ack_sequence = Some(ack_sequence);
        Selection::DlOfdma
    }

    /// First TID of `station` whose head frame fits, searched in priority
    /// order among the ACs not below the requesting one.
    fn admit<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        aid: Aid,
        station: MacAddress,
        opportunity: &TxOpportunity<'_>,
        ru_type: RuType,
        budget: Option<Duration>,
    ) -> Option<Candidate> {
        let primary_ac = AccessCategory::from_tid(opportunity.tid);
        for tid in tid_search_order(opportunity.tid) {
            if AccessCategory::from_tid(tid) < primary_ac || !ap.ba_agreement(station, tid) {
                continue;
            }
            let Some(frame) = ap.peek_frame(station, tid) else {
                debug!(%station, tid, "no frames queued");
                continue;
            };
            if ap.within_limits(&frame, &self.trial_vector(ap, aid, station, ru_type), budget) {
                return Some(candidate_from(aid, &frame));
            }
        }
        None
    }

    /// MU vector holding only `station`, with one RU of the provisional size.
    fn trial_vector<A: AccessPoint + ?Sized>(&self, ap: &A, aid: Aid, station: MacAddress, ru_type: RuType) -> MuTxVector {
        let mut vector = MuTxVector::new(Preamble::HeMu, ap.channel_width());
        vector.set_user(
            aid,
            MuUserInfo {
                ru: RuSpec::new(ru_type, 1),
                mode: ap.su_tx_mode(station),
            },
        );
        vector
    }

    fn guess_transmission<A: AccessPoint + ?Sized>(
        &self,
        ap: &A,
        order: &[(Aid, MacAddress)],
        sizing: UniformSizing,
        ack_sequence: DlAckSequence,
    ) -> (MuTxVector, TxParams) {
        let width = ap.channel_width();
        let mut vector = MuTxVector::new(Preamble::HeMu, width);
        let mut params = TxParams::for_dl(ack_sequence);
        for (&(aid, station), ru) in order.iter().zip(sizing.ru_specs(width)) {
            vector.set_user(
                aid,
                MuUserInfo {
                    ru,
                    mode: ap.su_tx_mode(station),
                },
            );
            params.add_dl_receiver(station);
        }
        (vector, params)
    }

    fn no_candidates(&self) -> Selection {
        if self.config.force_dl_ofdma {
            Selection::DlOfdma
        } else {
            Selection::NonOfdma
        }
    }
}

fn candidate_from(aid: Aid, frame: &QueuedFrame) -> Candidate {
    Candidate {
        station: frame.station,
        aid,
        tid: frame.tid,
        payload: frame.size,
    }
}
