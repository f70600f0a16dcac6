pub mod config;
pub mod mac;
pub mod ru;
pub mod scheduler;
pub mod stats;

pub use config::{ConfigError, CursorPolicy, SchedulerConfig};
pub use scheduler::priority::{FixedMcs, McsSampler, TidClassifier, TrafficClass, TrafficClassifier, UniformMcsSampler};
pub use scheduler::rr::RrOfdmaScheduler;
pub use scheduler::{Candidate, Decision, DlOfdmaInfo, DlReceiver, TxFormat, TxOpportunity, UlOfdmaInfo};
pub use stats::SchedulerStats;

pub fn init() {
    tracing::info!("OFDMA Scheduler Initialized");
}
