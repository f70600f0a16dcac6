use tracing::{debug, info};

use super::assembly::AssignmentAssembler;
use super::format::{FormatSelector, Selection};
use super::priority::{McsSampler, PriorityScheduler, TidClassifier, TrafficClassifier, UniformMcsSampler};
use super::{Decision, DlOfdmaInfo, SchedulingRound, TxOpportunity};
use crate::config::{ConfigError, SchedulerConfig};
use crate::mac::{AccessPoint, Aid};
use crate::ru::{PartitionTable, StaticPartitionTable};
use crate::stats::SchedulerStats;

/// Round-robin OFDMA scheduler of one access point.
///
/// The cursor (AID of the station to start the next DL round from) is the
/// only state kept across opportunities.
pub struct RrOfdmaScheduler {
    config: SchedulerConfig,
    cursor: Option<Aid>,
    round: SchedulingRound,
    priority: PriorityScheduler,
    stats: SchedulerStats,
}

impl RrOfdmaScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let priority = PriorityScheduler::new(
            Box::new(TidClassifier::new(config.classifier.clone())),
            Box::new(UniformMcsSampler::new(config.mcs_sampling)),
            Box::new(StaticPartitionTable),
            config.reference_mcs,
        );
        info!(
            max_stations = config.max_stations,
            force_dl_ofdma = config.force_dl_ofdma,
            enable_ul_ofdma = config.enable_ul_ofdma,
            cursor_policy = ?config.cursor_policy,
            "round-robin OFDMA scheduler created"
        );
        Ok(Self {
            config,
            cursor: None,
            round: SchedulingRound::default(),
            priority,
            stats: SchedulerStats::default(),
        })
    }

    pub fn with_classifier(mut self, classifier: impl TrafficClassifier + 'static) -> Self {
        self.priority.set_classifier(Box::new(classifier));
        self
    }

    pub fn with_sampler(mut self, sampler: impl McsSampler + 'static) -> Self {
        self.priority.set_sampler(Box::new(sampler));
        self
    }

    pub fn with_partition_table(mut self, table: impl PartitionTable + 'static) -> Self {
        self.priority.set_partition_table(Box::new(table));
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// AID of the station the next DL round starts from.
    pub fn cursor(&self) -> Option<Aid> {
        self.cursor
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Decides what the access point transmits at `opportunity`.
    pub fn schedule<A: AccessPoint + ?Sized>(&mut self, ap: &A, opportunity: TxOpportunity<'_>) -> Decision {
        self.round.clear();

        let selection = FormatSelector::new(&self.config).select(
            ap,
            &opportunity,
            &mut self.cursor,
            &mut self.round,
            &mut self.stats,
        );

        let decision = match selection {
            Selection::NonOfdma => Decision::NonOfdma,
            Selection::UlOfdma(info) => Decision::UlOfdma(info),
            Selection::UlDeferred(vector) => Decision::DlOfdma(DlOfdmaInfo::deferred(vector)),
            Selection::DlOfdma => Decision::DlOfdma(AssignmentAssembler::new(&self.config).assemble(
                ap,
                &self.round,
                &mut self.priority,
                &mut self.cursor,
                &mut self.stats,
            )),
        };

        let receivers = decision.dl().map_or(0, |dl| dl.receivers.len());
        self.stats.record(decision.format(), receivers);
        debug!(format = %decision.format(), receivers, cursor = ?self.cursor, "scheduling decision");

        self.round.clear();
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CursorPolicy;
    use crate::mac::{
        AccessCategory, BufferStatus, ChannelAccess, ChannelWidth, DlAckSequence, MacAddress, MuTxVector,
        PhyTiming, QueueInspector, QueuedFrame, StationRoster, Tid, TriggerDescriptor, TxMode, TxParams,
    };
    use crate::ru::{RuPartition, RuSpec, RuType};
    use crate::scheduler::priority::{FixedMcs, TrafficClass};
    use crate::scheduler::{Candidate, TxFormat};
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    /// Access point with fixed per-station queues and linear PHY timing.
    struct MockAp {
        width: ChannelWidth,
        stations: BTreeMap<Aid, MacAddress>,
        queues: HashMap<(MacAddress, Tid), u32>,
        fits: bool,
        txop: Option<Duration>,
        response: Duration,
        ack_sequence: DlAckSequence,
        buffer: BufferStatus,
        max_ppdu: Duration,
        /// Airtime per byte of HE TB PPDUs.
        ns_per_byte: u64,
    }

    impl MockAp {
        fn new(width: ChannelWidth, payloads: &[u32]) -> Self {
            let mut ap = Self {
                width,
                stations: BTreeMap::new(),
                queues: HashMap::new(),
                fits: true,
                txop: None,
                response: Duration::from_micros(100),
                ack_sequence: DlAckSequence::MuBar,
                buffer: BufferStatus::Bytes(0),
                max_ppdu: Duration::from_micros(5484),
                ns_per_byte: 100,
            };
            for (i, &payload) in payloads.iter().enumerate() {
                let aid = i as Aid + 1;
                let mac = MacAddress::from_index(aid);
                ap.stations.insert(aid, mac);
                ap.queues.insert((mac, 0), payload);
            }
            ap
        }
    }

    impl StationRoster for MockAp {
        fn stations(&self) -> &BTreeMap<Aid, MacAddress> {
            &self.stations
        }
    }

    impl QueueInspector for MockAp {
        fn ba_agreement(&self, _station: MacAddress, _tid: Tid) -> bool {
            true
        }

        fn peek_frame(&self, station: MacAddress, tid: Tid) -> Option<QueuedFrame> {
            self.queues
                .get(&(station, tid))
                .map(|&size| QueuedFrame { station, tid, size })
        }

        fn within_limits(&self, _frame: &QueuedFrame, _trial: &MuTxVector, _budget: Option<Duration>) -> bool {
            self.fits
        }

        fn buffer_status(&self, _station: MacAddress) -> BufferStatus {
            self.buffer
        }
    }

    impl ChannelAccess for MockAp {
        fn txop_remaining(&self, _ac: AccessCategory) -> Option<Duration> {
            self.txop
        }

        fn dl_ack_sequence(&self, _ac: AccessCategory) -> DlAckSequence {
            self.ack_sequence
        }

        fn response_duration(&self, _: &TxParams, _: &MuTxVector, _: Option<&TriggerDescriptor>) -> Duration {
            self.response
        }

        fn block_ack_window(&self, _: &TriggerDescriptor, _: &TxParams) -> Duration {
            Duration::from_micros(64)
        }
    }

    impl PhyTiming for MockAp {
        fn channel_width(&self) -> ChannelWidth {
            self.width
        }

        fn max_ppdu_duration(&self) -> Duration {
            self.max_ppdu
        }

        fn su_tx_mode(&self, _station: MacAddress) -> TxMode {
            TxMode { mcs: 9, nss: 1 }
        }

        fn ppdu_duration(&self, bytes: u32, _vector: &MuTxVector, _aid: Aid) -> Duration {
            Duration::from_nanos(u64::from(bytes) * self.ns_per_byte)
        }
    }

    fn scheduler(config: SchedulerConfig) -> RrOfdmaScheduler {
        RrOfdmaScheduler::new(config).unwrap().with_sampler(FixedMcs(10))
    }

    fn dl_only() -> SchedulerConfig {
        SchedulerConfig {
            enable_ul_ofdma: false,
            ..Default::default()
        }
    }

    #[test]
    fn single_candidate_gets_full_band() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100]);
        let mut s = scheduler(dl_only());
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let dl = decision.dl().expect("DL OFDMA");
        assert_eq!(dl.receivers.len(), 1);
        assert_eq!(dl.receivers[0].ru, RuSpec::new(RuType::Tone242, 1));
        assert_eq!(dl.tx_vector.user(1).map(|u| u.mode.mcs), Some(9));
        assert_eq!(s.stats().priority_rounds, 0);
    }

    #[test]
    fn mu_bar_trigger_caps_mcs() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200, 300]);
        let mut s = scheduler(dl_only());
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let trigger = decision.dl().and_then(|dl| dl.trigger.as_ref()).expect("MU-BAR");
        assert_eq!(trigger.users.len(), 3);
        assert!(trigger.users.iter().all(|u| u.mcs == 5));
        assert_eq!(trigger.ul_duration, Duration::from_micros(64));
    }

    #[test]
    fn su_format_has_no_trigger() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        ap.ack_sequence = DlAckSequence::SuFormat;
        let mut s = scheduler(dl_only());
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        assert!(decision.dl().unwrap().trigger.is_none());
    }

    #[test]
    fn priority_order_drives_ru_sizes() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[1000, 100, 500, 50]);
        let classes = [TrafficClass::Class1, TrafficClass::Class2, TrafficClass::Class3, TrafficClass::Class4];
        let mut s = scheduler(dl_only()).with_classifier(move |c: &Candidate| classes[usize::from(c.aid) - 1]);
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let dl = decision.dl().unwrap();
        let aids: Vec<Aid> = dl.receivers.iter().map(|r| r.aid).collect();
        assert_eq!(aids, vec![1, 3, 2, 4]);
        assert_eq!(dl.receivers[0].ru.ru_type, RuType::Tone106);
        assert_eq!(s.stats().priority_rounds, 1);
    }

    #[test]
    fn missing_weighted_entry_falls_back_to_uniform() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        let mut s = scheduler(dl_only());
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let dl = decision.dl().unwrap();
        assert_eq!(dl.receivers.len(), 2);
        assert!(dl.receivers.iter().all(|r| r.ru.ru_type == RuType::Tone106));
        assert_eq!(s.stats().weighted_fallbacks, 1);
    }

    #[test]
    fn nothing_fits_without_force_is_non_ofdma() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        ap.fits = false;
        let mut s = scheduler(dl_only());
        assert_eq!(s.schedule(&ap, TxOpportunity::new(0)), Decision::NonOfdma);
    }

    #[test]
    fn forced_dl_returns_empty_receivers() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        ap.fits = false;
        let mut s = scheduler(SchedulerConfig {
            force_dl_ofdma: true,
            ..dl_only()
        });
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(decision.format(), TxFormat::DlOfdma);
        assert!(decision.dl().unwrap().receivers.is_empty());
        assert_eq!(s.stats().dl_empty, 1);
        assert_eq!(s.stats().priority_rounds, 0);
    }

    #[test]
    fn forced_dl_without_stations_skips_priority_ranking() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[]);
        let mut s = scheduler(SchedulerConfig {
            force_dl_ofdma: true,
            ..dl_only()
        });
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(decision.format(), TxFormat::DlOfdma);
        assert!(decision.dl().unwrap().receivers.is_empty());
        assert_eq!(s.stats().priority_rounds, 0);
        assert_eq!(s.stats().weighted_fallbacks, 0);
        assert_eq!(s.cursor(), None);
    }

    /// Gives the whole 20 MHz channel to the top-ranked of two stations.
    struct SingleWinnerTable;

    impl PartitionTable for SingleWinnerTable {
        fn partition(&self, width: ChannelWidth, n_stations: usize) -> RuPartition {
            match (width, n_stations) {
                (ChannelWidth::Mhz20, 2) => RuPartition::new(vec![RuType::Tone242]),
                _ => RuPartition::empty(),
            }
        }
    }

    #[test]
    fn injected_partition_table_drives_assignment() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        let mut s = scheduler(dl_only()).with_partition_table(SingleWinnerTable);
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let dl = decision.dl().unwrap();
        assert_eq!(dl.receivers.len(), 1);
        assert_eq!(dl.receivers[0].ru, RuSpec::new(RuType::Tone242, 1));
        assert_eq!(dl.ack_sequence(), Some(DlAckSequence::MuBar));
        assert_eq!(s.stats().priority_rounds, 1);
        assert_eq!(s.stats().weighted_fallbacks, 0);

        // The station left without an RU opens the next round.
        let unserved = if dl.receivers[0].aid == 1 { 2 } else { 1 };
        assert_eq!(s.cursor(), Some(unserved));
    }

    #[test]
    fn short_txop_stops_dl() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100]);
        ap.txop = Some(Duration::from_micros(50));
        let mut s = scheduler(dl_only());
        assert_eq!(s.schedule(&ap, TxOpportunity::new(0)), Decision::NonOfdma);
    }

    #[test]
    fn lower_ac_tids_are_not_admitted() {
        // Frames only on TID 0 (BE); requesting TID 6 (VO) skips them.
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100]);
        let mut s = scheduler(dl_only());
        assert_eq!(s.schedule(&ap, TxOpportunity::new(6)), Decision::NonOfdma);
    }

    #[test]
    fn higher_ac_tids_are_admitted() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[]);
        let mac = MacAddress::from_index(1);
        ap.stations.insert(1, mac);
        ap.queues.insert((mac, 5), 300);
        let mut s = scheduler(dl_only());
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(decision.dl().unwrap().receivers[0].tid, 5);
    }

    #[test]
    fn first_of_round_cursor_rewinds() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100; 6]);
        let mut s = scheduler(SchedulerConfig {
            max_stations: 3,
            ..dl_only()
        });
        s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(s.cursor(), Some(1));
        s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(s.cursor(), Some(1));
    }

    #[test]
    fn after_last_served_cursor_advances() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100; 6]);
        let mut s = scheduler(SchedulerConfig {
            max_stations: 3,
            cursor_policy: CursorPolicy::AfterLastServed,
            ..dl_only()
        });
        s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(s.cursor(), Some(4));
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let mut aids: Vec<Aid> = decision.dl().unwrap().receivers.iter().map(|r| r.aid).collect();
        aids.sort();
        assert_eq!(aids, vec![4, 5, 6]);
        assert_eq!(s.cursor(), Some(1));
    }

    #[test]
    fn unserved_candidate_is_next() {
        // Twelve candidates at 20 MHz: the all-26-tone partition serves nine
        // and the first unserved one starts the next round.
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100; 12]);
        let mut s = scheduler(SchedulerConfig {
            max_stations: 12,
            ..dl_only()
        });
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(decision.dl().unwrap().receivers.len(), 9);
        assert_eq!(s.cursor(), Some(10));
    }

    #[test]
    fn departed_cursor_station_resets_to_head() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100; 6]);
        let mut s = scheduler(SchedulerConfig {
            max_stations: 3,
            cursor_policy: CursorPolicy::AfterLastServed,
            ..dl_only()
        });
        s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(s.cursor(), Some(4));
        ap.stations.remove(&4);
        let decision = s.schedule(&ap, TxOpportunity::new(0));
        let mut aids: Vec<Aid> = decision.dl().unwrap().receivers.iter().map(|r| r.aid).collect();
        aids.sort();
        assert_eq!(aids, vec![1, 2, 3]);
        assert_eq!(s.stats().cursor_resets, 1);
    }

    #[test]
    fn ul_follows_dl_with_buffered_data() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200, 300]);
        ap.buffer = BufferStatus::Bytes(2000);
        let mut s = scheduler(SchedulerConfig::default());
        let dl = s.schedule(&ap, TxOpportunity::new(0));
        assert_eq!(dl.format(), TxFormat::DlOfdma);
        let ul = s.schedule(&ap, TxOpportunity::after(0, &dl));
        let info = ul.ul().expect("UL OFDMA");
        assert_eq!(info.trigger.ul_duration, Duration::from_nanos(200_000));
        assert_eq!(info.params.acks.len(), 3);
        assert!(info.trigger.users.iter().all(|u| u.mcs <= 5));
    }

    #[test]
    fn ul_grant_is_capped_by_txop() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        ap.buffer = BufferStatus::Unlimited;
        let mut s = scheduler(SchedulerConfig::default());
        let dl = s.schedule(&ap, TxOpportunity::new(0));
        ap.txop = Some(Duration::from_micros(1100));
        let ul = s.schedule(&ap, TxOpportunity::after(0, &dl));
        assert_eq!(ul.ul().unwrap().trigger.ul_duration, Duration::from_micros(1000));
    }

    #[test]
    fn ul_abort_defers_to_next_opportunity() {
        let mut ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        ap.buffer = BufferStatus::Unknown;
        let mut s = scheduler(SchedulerConfig::default());
        let dl = s.schedule(&ap, TxOpportunity::new(0));

        // 500 B at 100 ns/B needs 50 µs; only 20 µs are left after the response.
        ap.txop = Some(Duration::from_micros(120));
        let deferred = s.schedule(&ap, TxOpportunity::after(0, &dl));
        let info = deferred.dl().expect("downgraded to DL OFDMA");
        assert!(info.receivers.is_empty());
        assert_eq!(info.tx_vector, dl.dl().unwrap().tx_vector);
        assert_eq!(s.stats().ul_aborted, 1);

        ap.txop = None;
        let retried = s.schedule(&ap, TxOpportunity::after(0, &deferred));
        assert_eq!(retried.format(), TxFormat::UlOfdma);
    }

    #[test]
    fn empty_backlog_skips_ul() {
        let ap = MockAp::new(ChannelWidth::Mhz20, &[100, 200]);
        let mut s = scheduler(SchedulerConfig::default());
        let dl = s.schedule(&ap, TxOpportunity::new(0));
        let next = s.schedule(&ap, TxOpportunity::after(0, &dl));
        assert_eq!(next.format(), TxFormat::DlOfdma);
        assert_eq!(next.dl().unwrap().receivers.len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = RrOfdmaScheduler::new(SchedulerConfig {
            ul_psdu_size: 0,
            ..Default::default()
        })
        .err();
        assert_eq!(err, Some(ConfigError::ZeroUlPsduSize));
    }
}
