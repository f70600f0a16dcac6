//! Equal-size RU assignment.
//!
//! Given a channel width and a number of candidate stations, pick the RU
//! class that lets the largest number of stations (at most the number of
//! candidates) be served with RUs of identical size.

use super::{RuSpec, RuType};
use crate::mac::ChannelWidth;

/// Outcome of uniform sizing: one RU class granted `count` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSizing {
    pub ru_type: RuType,
    pub count: usize,
}

impl UniformSizing {
    /// Maximise the number of equally sized RUs not exceeding `n_stations`.
    ///
    /// # Panics
    ///
    /// If no class fits and the request is not the single-station 160 MHz
    /// case, which means `n_stations == 0`: callers must never size an
    /// empty round.
    pub fn compute(width: ChannelWidth, n_stations: usize) -> Self {
        for ru_type in RuType::ALL {
            let per_channel = match width {
                // 160 MHz is two 80 MHz halves, each carrying the same layout.
                ChannelWidth::Mhz160 => ru_type
                    .count_in(ChannelWidth::Mhz80)
                    .map(|n| 2 * n),
                _ => ru_type.count_in(width),
            };
            if let Some(count) = per_channel {
                if count <= n_stations {
                    return Self { ru_type, count };
                }
            }
        }

        assert!(
            width == ChannelWidth::Mhz160 && n_stations == 1,
            "no uniform RU class for {n_stations} stations at {width}"
        );
        Self {
            ru_type: RuType::Tone2x996,
            count: 1,
        }
    }

    /// Concrete RUs of this sizing, in assignment order: primary 80 MHz
    /// first, then (at 160 MHz) the secondary half, indices ascending.
    pub fn ru_specs(&self, width: ChannelWidth) -> Vec<RuSpec> {
        if self.ru_type == RuType::Tone2x996 {
            return vec![RuSpec::new(RuType::Tone2x996, 1)];
        }

        let (halves, layout_width): (&[bool], ChannelWidth) = match width {
            ChannelWidth::Mhz160 => (&[true, false], ChannelWidth::Mhz80),
            other => (&[true], other),
        };
        let per_half = self.ru_type.count_in(layout_width).unwrap_or(0);

        let mut out = Vec::with_capacity(self.count);
        for &primary_80mhz in halves {
            for index in 1..=per_half {
                out.push(RuSpec {
                    primary_80mhz,
                    ru_type: self.ru_type,
                    index,
                });
            }
        }
        out.truncate(self.count);
        out
    }
}

/// Narrowing form used by the format selector: `n_stations` is replaced by
/// the number of stations that are actually granted an RU.
pub fn number_and_type_of_rus(width: ChannelWidth, n_stations: &mut usize) -> RuType {
    let sizing = UniformSizing::compute(width, *n_stations);
    *n_stations = sizing.count;
    sizing.ru_type
}
