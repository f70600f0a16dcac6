use serde::{Deserialize, Serialize};

use crate::scheduler::TxFormat;

/// Running counters of one scheduler instance, for JSON serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub opportunities: u64,
    pub non_ofdma: u64,
    pub dl_ofdma: u64,
    /// DL OFDMA decisions without receivers (forced DL, deferred UL).
    pub dl_empty: u64,
    pub ul_ofdma: u64,
    /// UL solicitations given up for lack of time.
    pub ul_aborted: u64,
    /// Rounds with more than one candidate, ranked by priority.
    pub priority_rounds: u64,
    /// Priority rounds whose weighted partition was empty.
    pub weighted_fallbacks: u64,
    /// Times the cursor pointed at a station no longer associated.
    pub cursor_resets: u64,
    pub stations_served: u64,
}

impl SchedulerStats {
    pub(crate) fn record(&mut self, format: TxFormat, receivers: usize) {
        self.opportunities += 1;
        match format {
            TxFormat::NonOfdma => self.non_ofdma += 1,
            TxFormat::DlOfdma => {
                self.dl_ofdma += 1;
                if receivers == 0 {
                    self.dl_empty += 1;
                }
            }
            TxFormat::UlOfdma => self.ul_ofdma += 1,
        }
    }

    /// Average number of stations per non-empty DL MU PPDU.
    pub fn mean_stations_per_dl(&self) -> f64 {
        let dl = self.dl_ofdma - self.dl_empty;
        if dl == 0 {
            0.0
        } else {
            self.stations_served as f64 / dl as f64
        }
    }
}
