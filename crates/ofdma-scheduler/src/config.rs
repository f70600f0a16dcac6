use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mac::MacAddress;
use crate::scheduler::priority::TrafficClass;

pub const CONFIG_VERSION: u32 = 1;

/// Largest number of stations a 160 MHz channel can split into (26-tone RUs).
pub const MAX_STATIONS_LIMIT: usize = 74;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Parse(String),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("max_stations must be within 1..={MAX_STATIONS_LIMIT}, got {0}")]
    MaxStations(usize),
    #[error("ul_psdu_size must be non-zero when UL OFDMA is enabled")]
    ZeroUlPsduSize,
    #[error("invalid MCS sampling range {lower}..={upper} (allowed 1..=12)")]
    McsRange { lower: u8, upper: u8 },
    #[error("{field} must be a HE MCS index (0..=11), got {value}")]
    McsIndex { field: &'static str, value: u8 },
    #[error("traffic class must be within 1..=4, got {0}")]
    TrafficClass(u8),
}

/// Where the round-robin cursor is left once RUs have been assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Rewind to the first candidate of the round whenever every candidate
    /// was served.
    #[default]
    FirstOfRound,
    /// Keep the position reached by candidate selection, i.e. right after
    /// the last examined station.
    AfterLastServed,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfigInput {
    pub version: u32,
    pub max_stations: Option<usize>,
    pub force_dl_ofdma: Option<bool>,
    pub enable_ul_ofdma: Option<bool>,
    pub ul_psdu_size: Option<u32>,
    pub cursor_policy: Option<CursorPolicy>,
    pub reference_mcs: Option<u8>,
    pub trigger_max_mcs: Option<u8>,
    pub mcs_sampling: McsSamplingInput,
    pub classifier: ClassifierInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct McsSamplingInput {
    pub lower: Option<u8>,
    pub upper: Option<u8>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierInput {
    /// Traffic class per TID, index = TID.
    pub tid_classes: Option<[u8; 8]>,
    pub stations: Vec<StationClassInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationClassInput {
    pub mac: MacAddress,
    pub class: u8,
}

/// Range and seed of the modulation draw used to rank candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McsSamplingConfig {
    pub lower: u8,
    pub upper: u8,
    pub seed: u64,
}

impl Default for McsSamplingConfig {
    fn default() -> Self {
        Self {
            lower: 1,
            upper: 11,
            seed: 0x0FD3A,
        }
    }
}

/// Traffic-class assignment: per-TID default plus per-station overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub tid_classes: [TrafficClass; 8],
    pub stations: Vec<(MacAddress, TrafficClass)>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        use TrafficClass::*;
        // TIDs 0..=7 map to BE, BK, BK, BE, VI, VI, VO, VO.
        Self {
            tid_classes: [Class3, Class4, Class4, Class3, Class2, Class2, Class1, Class1],
            stations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub version: u32,
    /// Maximum number of stations granted an RU in one DL MU PPDU.
    pub max_stations: usize,
    /// Return DL OFDMA even when no DL MU PPDU could be built.
    pub force_dl_ofdma: bool,
    /// Solicit an UL MU transmission after every DL MU transmission.
    pub enable_ul_ofdma: bool,
    /// Size in bytes of the solicited UL PSDU.
    pub ul_psdu_size: u32,
    pub cursor_policy: CursorPolicy,
    /// MCS at which the average channel capacity of a round is evaluated.
    pub reference_mcs: u8,
    /// Highest MCS stations may answer a trigger frame with.
    pub trigger_max_mcs: u8,
    pub mcs_sampling: McsSamplingConfig,
    pub classifier: ClassifierConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            max_stations: 4,
            force_dl_ofdma: false,
            enable_ul_ofdma: true,
            ul_psdu_size: 500,
            cursor_policy: CursorPolicy::default(),
            reference_mcs: 10,
            trigger_max_mcs: 5,
            mcs_sampling: McsSamplingConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(SchedulerConfig::default());
        }
        let parsed: SchedulerConfigInput =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        parsed.resolve()
    }

    /// Rejects configurations the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }
        if !(1..=MAX_STATIONS_LIMIT).contains(&self.max_stations) {
            return Err(ConfigError::MaxStations(self.max_stations));
        }
        if self.enable_ul_ofdma && self.ul_psdu_size == 0 {
            return Err(ConfigError::ZeroUlPsduSize);
        }
        let McsSamplingConfig { lower, upper, .. } = self.mcs_sampling;
        if lower == 0 || lower > upper || upper > 12 {
            return Err(ConfigError::McsRange { lower, upper });
        }
        for (field, value) in [
            ("reference_mcs", self.reference_mcs),
            ("trigger_max_mcs", self.trigger_max_mcs),
        ] {
            if value > 11 {
                return Err(ConfigError::McsIndex { field, value });
            }
        }
        Ok(())
    }
}

impl SchedulerConfigInput {
    pub fn resolve(self) -> Result<SchedulerConfig, ConfigError> {
        let defaults = SchedulerConfig::default();
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };

        let class = |raw: u8| TrafficClass::try_from(raw).map_err(|_| ConfigError::TrafficClass(raw));

        let mut classifier = ClassifierConfig::default();
        if let Some(raw) = self.classifier.tid_classes {
            for (slot, value) in classifier.tid_classes.iter_mut().zip(raw) {
                *slot = class(value)?;
            }
        }
        for station in self.classifier.stations {
            let c = class(station.class)?;
            match classifier.stations.iter_mut().find(|(mac, _)| *mac == station.mac) {
                Some(existing) => existing.1 = c,
                None => classifier.stations.push((station.mac, c)),
            }
        }

        let sampling = McsSamplingConfig {
            lower: self.mcs_sampling.lower.unwrap_or(defaults.mcs_sampling.lower),
            upper: self.mcs_sampling.upper.unwrap_or(defaults.mcs_sampling.upper),
            seed: self.mcs_sampling.seed.unwrap_or(defaults.mcs_sampling.seed),
        };

        let config = SchedulerConfig {
            version,
            max_stations: self.max_stations.unwrap_or(defaults.max_stations),
            force_dl_ofdma: self.force_dl_ofdma.unwrap_or(defaults.force_dl_ofdma),
            enable_ul_ofdma: self.enable_ul_ofdma.unwrap_or(defaults.enable_ul_ofdma),
            ul_psdu_size: self.ul_psdu_size.unwrap_or(defaults.ul_psdu_size),
            cursor_policy: self.cursor_policy.unwrap_or(defaults.cursor_policy),
            reference_mcs: self.reference_mcs.unwrap_or(defaults.reference_mcs),
            trigger_max_mcs: self.trigger_max_mcs.unwrap_or(defaults.trigger_max_mcs),
            mcs_sampling: sampling,
            classifier,
        };
        config.validate()?;
        Ok(config)
    }
}
