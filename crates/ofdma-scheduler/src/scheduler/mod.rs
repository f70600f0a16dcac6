//! # Round-Robin OFDMA Scheduling
//!
//! One call per transmit opportunity. The pipeline is:
//!
//! 1. [`format::FormatSelector`] picks NON_OFDMA, DL_OFDMA or UL_OFDMA and,
//!    for DL, admits candidates round-robin from the persisted cursor.
//! 2. [`priority::PriorityScheduler`] ranks rounds of two or more candidates
//!    and hands out a weighted RU partition.
//! 3. [`assembly::AssignmentAssembler`] maps stations to RUs, builds the MU
//!    TX vector, ack parameters and trigger frame, and moves the cursor.
//!
//! [`rr::RrOfdmaScheduler`] owns the cursor and the per-round scratch state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mac::{Aid, ChannelWidth, DlAckSequence, MacAddress, MuTxVector, Preamble, Tid, TriggerDescriptor, TxParams};
use crate::ru::RuSpec;

pub mod assembly;
pub mod format;
pub mod priority;
pub mod rr;

/// A (station, TID) pair admitted to the current DL round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub station: MacAddress,
    pub aid: Aid,
    pub tid: Tid,
    /// Size in bytes of the head-of-line frame.
    pub payload: u32,
}

/// Format of the next transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxFormat {
    NonOfdma,
    DlOfdma,
    UlOfdma,
}

impl TxFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxFormat::NonOfdma => "NON_OFDMA",
            TxFormat::DlOfdma => "DL_OFDMA",
            TxFormat::UlOfdma => "UL_OFDMA",
        }
    }
}

impl fmt::Display for TxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of a DL MU PPDU and the RU it was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlReceiver {
    pub station: MacAddress,
    pub aid: Aid,
    pub tid: Tid,
    pub ru: RuSpec,
}

/// Everything needed to send a DL MU PPDU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlOfdmaInfo {
    /// Receivers in grant order (priority rank, or enumeration order).
    pub receivers: Vec<DlReceiver>,
    pub tx_vector: MuTxVector,
    pub params: TxParams,
    /// MU-BAR soliciting the block acks, for ack sequences that need one.
    pub trigger: Option<TriggerDescriptor>,
}

impl DlOfdmaInfo {
    /// DL MU decision without receivers: nothing is sent now.
    pub fn empty(width: ChannelWidth) -> Self {
        Self {
            receivers: Vec::new(),
            tx_vector: MuTxVector::new(Preamble::HeMu, width),
            params: TxParams::default(),
            trigger: None,
        }
    }

    /// An empty decision that keeps `tx_vector`, so the stations it lists
    /// are solicited again at the next opportunity.
    pub fn deferred(tx_vector: MuTxVector) -> Self {
        Self {
            receivers: Vec::new(),
            tx_vector,
            params: TxParams::default(),
            trigger: None,
        }
    }

    pub fn ack_sequence(&self) -> Option<DlAckSequence> {
        self.params.dl_ack_sequence
    }
}

/// Solicitation of an UL MU transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UlOfdmaInfo {
    /// Basic trigger frame carrying the granted HE TB PPDU duration.
    pub trigger: TriggerDescriptor,
    /// Multi-STA block ack acknowledging the solicited PSDUs.
    pub params: TxParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Decision {
    NonOfdma,
    DlOfdma(DlOfdmaInfo),
    UlOfdma(UlOfdmaInfo),
}

impl Decision {
    pub fn format(&self) -> TxFormat {
        match self {
            Decision::NonOfdma => TxFormat::NonOfdma,
            Decision::DlOfdma(_) => TxFormat::DlOfdma,
            Decision::UlOfdma(_) => TxFormat::UlOfdma,
        }
    }

    pub fn dl(&self) -> Option<&DlOfdmaInfo> {
        match self {
            Decision::DlOfdma(info) => Some(info),
            _ => None,
        }
    }

    pub fn ul(&self) -> Option<&UlOfdmaInfo> {
        match self {
            Decision::UlOfdma(info) => Some(info),
            _ => None,
        }
    }
}

/// The access point gained the channel to send a frame of `tid`.
#[derive(Debug, Clone, Copy)]
pub struct TxOpportunity<'a> {
    pub tid: Tid,
    /// Decision returned at the previous opportunity, if any.
    pub previous: Option<&'a Decision>,
}

impl<'a> TxOpportunity<'a> {
    pub fn new(tid: Tid) -> Self {
        Self { tid, previous: None }
    }

    pub fn after(tid: Tid, previous: &'a Decision) -> Self {
        Self {
            tid,
            previous: Some(previous),
        }
    }
}

/// Transient state of one scheduling round. Cleared at the start and at
/// the end of every opportunity; nothing in here survives a round.
#[derive(Debug, Default)]
pub struct SchedulingRound {
    /// Admitted candidates, in round-robin enumeration order.
    pub candidates: Vec<Candidate>,
    pub ack_sequence: Option<DlAckSequence>,
    /// Cursor position reached by candidate selection.
    pub next_cursor: Option<Aid>,
}

impl SchedulingRound {
    pub fn clear(&mut self) {
        self.candidates.clear();
        self.ack_sequence = None;
        self.next_cursor = None;
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
