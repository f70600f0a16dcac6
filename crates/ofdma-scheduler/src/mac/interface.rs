use std::collections::BTreeMap;
use std::time::Duration;

use super::types::{AccessCategory, Aid, BufferStatus, ChannelWidth, DlAckSequence, MacAddress, Tid, TxMode};
use super::vector::{MuTxVector, TriggerDescriptor, TxParams};

/// Head-of-line frame of a per-TID queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedFrame {
    pub station: MacAddress,
    pub tid: Tid,
    /// Packet size in bytes.
    pub size: u32,
}

/// Associated stations, ordered by AID.
pub trait StationRoster {
    fn stations(&self) -> &BTreeMap<Aid, MacAddress>;
}

/// Read-only view of the AP's per-station, per-TID transmit queues.
pub trait QueueInspector {
    /// Whether a block-ack agreement exists for `(station, tid)`.
    fn ba_agreement(&self, station: MacAddress, tid: Tid) -> bool;
    /// Next frame queued for `(station, tid)`, if any.
    fn peek_frame(&self, station: MacAddress, tid: Tid) -> Option<QueuedFrame>;
    /// Whether `frame`, sent with `trial`, respects the A-MPDU size limits
    /// and, when `budget` is set, fits within it.
    fn within_limits(&self, frame: &QueuedFrame, trial: &MuTxVector, budget: Option<Duration>) -> bool;
    /// Latest buffer status report of `station`.
    fn buffer_status(&self, station: MacAddress) -> BufferStatus;
}

/// EDCA state of the AP.
pub trait ChannelAccess {
    /// Remaining TXOP time for `ac`, or `None` when no TXOP limit applies.
    fn txop_remaining(&self, ac: AccessCategory) -> Option<Duration>;
    /// Ack sequence configured for DL MU PPDUs sent by `ac`.
    fn dl_ack_sequence(&self, ac: AccessCategory) -> DlAckSequence;
    /// Time taken by the response sequence (ack frames, trigger frames and
    /// interframe spaces) following a transmission with `vector`, not
    /// including any solicited HE TB data PPDU.
    fn response_duration(&self, params: &TxParams, vector: &MuTxVector, trigger: Option<&TriggerDescriptor>) -> Duration;
    /// Duration of the HE TB PPDU carrying the block acks solicited by `trigger`.
    fn block_ack_window(&self, trigger: &TriggerDescriptor, params: &TxParams) -> Duration;
}

/// PHY parameters and timing primitives.
pub trait PhyTiming {
    fn channel_width(&self) -> ChannelWidth;
    /// Longest PPDU the PHY may transmit.
    fn max_ppdu_duration(&self) -> Duration;
    /// Mode the station would be served with in a single-user PPDU.
    fn su_tx_mode(&self, station: MacAddress) -> TxMode;
    /// Duration of a PPDU carrying `bytes` for user `aid` of `vector`.
    fn ppdu_duration(&self, bytes: u32, vector: &MuTxVector, aid: Aid) -> Duration;
}

/// Everything the scheduler consumes from the access point.
pub trait AccessPoint: StationRoster + QueueInspector + ChannelAccess + PhyTiming {}

impl<T: StationRoster + QueueInspector + ChannelAccess + PhyTiming + ?Sized> AccessPoint for T {}
