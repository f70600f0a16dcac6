//! Simulated access point: station roster, per-TID transmit queues, buffer
//! status reports and a coarse HE timing model.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use ofdma_scheduler::mac::{
    AccessCategory, Aid, BufferStatus, ChannelAccess, ChannelWidth, DlAckSequence, MacAddress,
    MuTxVector, PhyTiming, QueueInspector, QueuedFrame, StationRoster, Tid, TriggerDescriptor, TxMode, TxParams,
};
use ofdma_scheduler::ru::RuType;
use ofdma_scheduler::scheduler::priority::he_modulation;
use ofdma_scheduler::Decision;

pub const SIFS: Duration = Duration::from_micros(16);
pub const HE_SYMBOL: Duration = Duration::from_nanos(13_600);
pub const HE_PREAMBLE: Duration = Duration::from_micros(48);
/// Legacy-rate control frames (BAR, BA, MU-BAR) on a 20 MHz channel.
pub const CONTROL_FRAME: Duration = Duration::from_micros(44);
pub const MULTI_STA_BLOCK_ACK: Duration = Duration::from_micros(68);

/// Data subcarriers of an RU.
pub fn data_tones(ru: RuType) -> u32 {
    match ru {
        RuType::Tone26 => 24,
        RuType::Tone52 => 48,
        RuType::Tone106 => 102,
        RuType::Tone242 => 234,
        RuType::Tone484 => 468,
        RuType::Tone996 => 980,
        RuType::Tone2x996 => 1960,
    }
}

/// Content of one per-TID queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Backlog {
    /// Never drains; every frame has the same size.
    Infinite { frame_size: u32 },
    Frames(VecDeque<u32>),
}

impl Backlog {
    fn head(&self) -> Option<u32> {
        match self {
            Backlog::Infinite { frame_size } => Some(*frame_size),
            Backlog::Frames(frames) => frames.front().copied(),
        }
    }

    fn pop(&mut self) -> Option<u32> {
        match self {
            Backlog::Infinite { frame_size } => Some(*frame_size),
            Backlog::Frames(frames) => frames.pop_front(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimStation {
    pub aid: Aid,
    pub mac: MacAddress,
    pub queues: BTreeMap<Tid, Backlog>,
    /// TIDs with an established block-ack agreement.
    pub ba_tids: Vec<Tid>,
    pub buffer_status: BufferStatus,
    pub mode: TxMode,
}

impl SimStation {
    pub fn new(aid: Aid) -> Self {
        Self {
            aid,
            mac: MacAddress::from_index(aid),
            queues: BTreeMap::new(),
            ba_tids: (0..8).collect(),
            buffer_status: BufferStatus::Bytes(0),
            mode: TxMode::default(),
        }
    }
}

/// Knobs of the simulated MAC/PHY.
#[derive(Debug, Clone)]
pub struct ApSettings {
    pub channel_width: ChannelWidth,
    pub max_ppdu: Duration,
    /// Remaining TXOP reported to the scheduler; `None` = no TXOP limit.
    pub txop_remaining: Option<Duration>,
    pub ack_sequence: DlAckSequence,
    pub max_ampdu_bytes: u32,
}

impl Default for ApSettings {
    fn default() -> Self {
        Self {
            channel_width: ChannelWidth::Mhz20,
            max_ppdu: Duration::from_micros(5484),
            txop_remaining: None,
            ack_sequence: DlAckSequence::MuBar,
            max_ampdu_bytes: 6_500_631,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimAccessPoint {
    pub settings: ApSettings,
    roster: BTreeMap<Aid, MacAddress>,
    stations: HashMap<MacAddress, SimStation>,
}

impl SimAccessPoint {
    pub fn new(settings: ApSettings) -> Self {
        Self {
            settings,
            roster: BTreeMap::new(),
            stations: HashMap::new(),
        }
    }

    pub fn associate(&mut self, station: SimStation) {
        self.roster.insert(station.aid, station.mac);
        self.stations.insert(station.mac, station);
    }

    pub fn disassociate(&mut self, aid: Aid) -> Option<SimStation> {
        let mac = self.roster.remove(&aid)?;
        self.stations.remove(&mac)
    }

    pub fn station(&self, aid: Aid) -> Option<&SimStation> {
        self.roster.get(&aid).and_then(|mac| self.stations.get(mac))
    }

    pub fn station_mut(&mut self, aid: Aid) -> Option<&mut SimStation> {
        let mac = self.roster.get(&aid)?;
        self.stations.get_mut(mac)
    }

    /// Dequeues the frames sent by a DL MU decision. Returns the bytes
    /// delivered per AID.
    pub fn deliver(&mut self, decision: &Decision) -> Vec<(Aid, u32)> {
        let Some(dl) = decision.dl() else {
            return Vec::new();
        };
        dl.receivers
            .iter()
            .filter_map(|r| {
                let station = self.stations.get_mut(&r.station)?;
                let bytes = station.queues.get_mut(&r.tid)?.pop()?;
                Some((r.aid, bytes))
            })
            .collect()
    }

    fn user_rate_bits_per_symbol(&self, vector: &MuTxVector, aid: Aid) -> f64 {
        let Some(user) = vector.user(aid) else {
            return 0.0;
        };
        let (order, code_rate) = he_modulation(user.mode.mcs);
        f64::from(data_tones(user.ru.ru_type)) * order.log2() * code_rate * f64::from(user.mode.nss.max(1))
    }

    fn su_response(&self, receivers: usize) -> Duration {
        // BAR + SIFS + BA + SIFS per receiver
        (CONTROL_FRAME * 2 + SIFS * 2) * receivers as u32
    }
}

impl StationRoster for SimAccessPoint {
    fn stations(&self) -> &BTreeMap<Aid, MacAddress> {
        &self.roster
    }
}

impl QueueInspector for SimAccessPoint {
    fn ba_agreement(&self, station: MacAddress, tid: Tid) -> bool {
        self.stations
            .get(&station)
            .is_some_and(|s| s.ba_tids.contains(&tid))
    }

    fn peek_frame(&self, station: MacAddress, tid: Tid) -> Option<QueuedFrame> {
        let size = self.stations.get(&station)?.queues.get(&tid)?.head()?;
        Some(QueuedFrame { station, tid, size })
    }

    fn within_limits(&self, frame: &QueuedFrame, trial: &MuTxVector, budget: Option<Duration>) -> bool {
        if frame.size > self.settings.max_ampdu_bytes {
            return false;
        }
        let Some(aid) = self.roster.iter().find(|(_, mac)| **mac == frame.station).map(|(aid, _)| *aid) else {
            return false;
        };
        let duration = self.ppdu_duration(frame.size, trial, aid);
        duration <= self.settings.max_ppdu && budget.map_or(true, |b| duration <= b)
    }

    fn buffer_status(&self, station: MacAddress) -> BufferStatus {
        self.stations
            .get(&station)
            .map_or(BufferStatus::Bytes(0), |s| s.buffer_status)
    }
}

impl ChannelAccess for SimAccessPoint {
    fn txop_remaining(&self, _ac: AccessCategory) -> Option<Duration> {
        self.settings.txop_remaining
    }

    fn dl_ack_sequence(&self, _ac: AccessCategory) -> DlAckSequence {
        self.settings.ack_sequence
    }

    fn response_duration(&self, params: &TxParams, _vector: &MuTxVector, trigger: Option<&TriggerDescriptor>) -> Duration {
        match (params.dl_ack_sequence, trigger) {
            (Some(DlAckSequence::SuFormat), _) | (Some(_), None) => self.su_response(params.acks.len()),
            (Some(DlAckSequence::AggregateTf), Some(t)) => SIFS + t.ul_duration,
            (Some(DlAckSequence::MuBar), Some(t)) => SIFS + CONTROL_FRAME + SIFS + t.ul_duration,
            // UL MU exchange: trigger, SIFS, TB PPDU (not counted), SIFS, multi-STA BA
            (None, Some(_)) => CONTROL_FRAME + SIFS * 2 + MULTI_STA_BLOCK_ACK,
            (None, None) => Duration::ZERO,
        }
    }

    fn block_ack_window(&self, trigger: &TriggerDescriptor, _params: &TxParams) -> Duration {
        // Compressed block ack (32 bytes) at the lowest allowed rate.
        let slowest = trigger
            .users
            .iter()
            .map(|u| {
                let (order, code_rate) = he_modulation(u.mcs);
                f64::from(data_tones(u.ru.ru_type)) * order.log2() * code_rate
            })
            .fold(f64::INFINITY, f64::min);
        if !slowest.is_finite() || slowest <= 0.0 {
            return HE_PREAMBLE;
        }
        let symbols = (32.0 * 8.0 / slowest).ceil() as u32;
        HE_PREAMBLE + HE_SYMBOL * symbols
    }
}

impl PhyTiming for SimAccessPoint {
    fn channel_width(&self) -> ChannelWidth {
        self.settings.channel_width
    }

    fn max_ppdu_duration(&self) -> Duration {
        self.settings.max_ppdu
    }

    fn su_tx_mode(&self, station: MacAddress) -> TxMode {
        self.stations.get(&station).map_or_else(TxMode::default, |s| s.mode)
    }

    fn ppdu_duration(&self, bytes: u32, vector: &MuTxVector, aid: Aid) -> Duration {
        let bits_per_symbol = self.user_rate_bits_per_symbol(vector, aid);
        if bits_per_symbol <= 0.0 {
            return Duration::MAX;
        }
        let symbols = (f64::from(bytes) * 8.0 / bits_per_symbol).ceil();
        HE_PREAMBLE + Duration::from_secs_f64(symbols * HE_SYMBOL.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofdma_scheduler::mac::{MuUserInfo, Preamble};
    use ofdma_scheduler::ru::RuSpec;

    fn station_with(aid: Aid, tid: Tid, backlog: Backlog) -> SimStation {
        let mut s = SimStation::new(aid);
        s.queues.insert(tid, backlog);
        s
    }

    #[test]
    fn finite_backlog_drains() {
        let mut b = Backlog::Frames(VecDeque::from(vec![100, 200]));
        assert_eq!(b.head(), Some(100));
        assert_eq!(b.pop(), Some(100));
        assert_eq!(b.pop(), Some(200));
        assert_eq!(b.head(), None);

        let mut inf = Backlog::Infinite { frame_size: 1500 };
        assert_eq!(inf.pop(), Some(1500));
        assert_eq!(inf.head(), Some(1500));
    }

    #[test]
    fn larger_ru_is_faster() {
        let ap = SimAccessPoint::new(ApSettings::default());
        let mut narrow = MuTxVector::new(Preamble::HeMu, ChannelWidth::Mhz20);
        narrow.set_user(1, MuUserInfo { ru: RuSpec::new(RuType::Tone26, 1), mode: TxMode { mcs: 7, nss: 1 } });
        let mut wide = MuTxVector::new(Preamble::HeMu, ChannelWidth::Mhz20);
        wide.set_user(1, MuUserInfo { ru: RuSpec::new(RuType::Tone242, 1), mode: TxMode { mcs: 7, nss: 1 } });
        assert!(ap.ppdu_duration(1500, &wide, 1) < ap.ppdu_duration(1500, &narrow, 1));
        assert_eq!(ap.ppdu_duration(1500, &wide, 2), Duration::MAX);
    }

    #[test]
    fn roster_and_queues() {
        let mut ap = SimAccessPoint::new(ApSettings::default());
        ap.associate(station_with(3, 0, Backlog::Infinite { frame_size: 700 }));
        let mac = MacAddress::from_index(3);
        assert_eq!(ap.stations().get(&3), Some(&mac));
        assert!(ap.ba_agreement(mac, 0));
        assert_eq!(ap.peek_frame(mac, 0).map(|f| f.size), Some(700));
        assert_eq!(ap.peek_frame(mac, 1), None);
        assert!(ap.disassociate(3).is_some());
        assert!(ap.stations().is_empty());
    }

    fn trial(ru: RuType, mode: TxMode) -> MuTxVector {
        let mut vector = MuTxVector::new(Preamble::HeMu, ChannelWidth::Mhz20);
        vector.set_user(1, MuUserInfo { ru: RuSpec::new(ru, 1), mode });
        vector
    }

    #[test]
    fn budget_limits_admission() {
        let mut ap = SimAccessPoint::new(ApSettings::default());
        ap.associate(station_with(1, 0, Backlog::Infinite { frame_size: 1500 }));
        let mode = TxMode { mcs: 7, nss: 1 };
        if let Some(station) = ap.station_mut(1) {
            station.mode = mode;
        }
        assert_eq!(ap.su_tx_mode(MacAddress::from_index(1)), mode);

        // 48 data tones at 64-QAM 5/6: about 50 symbols, 728 us
        let frame = ap.peek_frame(MacAddress::from_index(1), 0).unwrap();
        let vector = trial(RuType::Tone52, mode);
        let duration = ap.ppdu_duration(1500, &vector, 1);
        assert!(duration > Duration::from_micros(700) && duration < Duration::from_micros(760));
        assert!(ap.within_limits(&frame, &vector, None));
        assert!(ap.within_limits(&frame, &vector, Some(Duration::from_micros(800))));
        assert!(!ap.within_limits(&frame, &vector, Some(Duration::from_micros(10))));
    }

    #[test]
    fn max_ppdu_rejects_slow_frames() {
        let mut ap = SimAccessPoint::new(ApSettings::default());
        ap.associate(station_with(1, 0, Backlog::Infinite { frame_size: 1500 }));
        let frame = ap.peek_frame(MacAddress::from_index(1), 0).unwrap();

        // BPSK 1/2 on 48 data tones: 500 symbols, about 6.85 ms
        let slow = trial(RuType::Tone52, TxMode::default());
        assert!(ap.ppdu_duration(1500, &slow, 1) > ap.settings.max_ppdu);
        assert!(!ap.within_limits(&frame, &slow, None));

        // The full 20 MHz channel carries it well within the limit.
        assert!(ap.within_limits(&frame, &trial(RuType::Tone242, TxMode::default()), None));
    }
}
