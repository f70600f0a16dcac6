//! MAC/PHY vocabulary shared with the access point, and the traits through
//! which the scheduler queries it.

pub mod interface;
pub mod types;
pub mod vector;

pub use interface::{AccessPoint, ChannelAccess, PhyTiming, QueueInspector, QueuedFrame, StationRoster};
pub use types::{
    tid_search_order, AccessCategory, Aid, BufferStatus, ChannelWidth, DlAckSequence, MacAddress, Tid,
    TxMode, TID_FALLBACK_ORDER,
};
pub use vector::{
    AckRequest, MuTxVector, MuUserInfo, Preamble, TriggerDescriptor, TriggerKind, TriggerUser, TxParams,
};
