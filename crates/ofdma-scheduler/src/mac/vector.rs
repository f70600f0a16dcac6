use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::{Aid, ChannelWidth, DlAckSequence, MacAddress, TxMode};
use crate::ru::RuSpec;

/// PPDU format a TX vector describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preamble {
    /// Downlink multi-user PPDU.
    HeMu,
    /// Trigger-based uplink PPDU.
    HeTb,
}

/// Per-user portion of a MU TX vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuUserInfo {
    pub ru: RuSpec,
    pub mode: TxMode,
}

/// Transmission descriptor of a multi-user PPDU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuTxVector {
    pub preamble: Preamble,
    pub channel_width: ChannelWidth,
    /// Users keyed by AID.
    pub users: BTreeMap<Aid, MuUserInfo>,
}

impl MuTxVector {
    pub fn new(preamble: Preamble, channel_width: ChannelWidth) -> Self {
        Self {
            preamble,
            channel_width,
            users: BTreeMap::new(),
        }
    }

    pub fn set_user(&mut self, aid: Aid, info: MuUserInfo) {
        self.users.insert(aid, info);
    }

    pub fn user(&self, aid: Aid) -> Option<&MuUserInfo> {
        self.users.get(&aid)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// How a single receiver acknowledges the PSDU addressed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckRequest {
    /// The AP solicits the block ack with a BlockAckReq (SU or MU-BAR).
    BlockAckRequest,
    /// The receiver answers with a block ack without further request.
    BlockAck,
    /// Acknowledged inside a multi-STA block ack after an UL MU PPDU.
    MultiStaBlockAck,
}

/// Acknowledgment parameters attached to a transmission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxParams {
    pub dl_ack_sequence: Option<DlAckSequence>,
    pub acks: Vec<(MacAddress, AckRequest)>,
}

impl TxParams {
    pub fn for_dl(sequence: DlAckSequence) -> Self {
        Self {
            dl_ack_sequence: Some(sequence),
            acks: Vec::new(),
        }
    }

    /// Registers `station` as a receiver, picking the ack request that the
    /// configured DL ack sequence implies.
    pub fn add_dl_receiver(&mut self, station: MacAddress) {
        let request = match self.dl_ack_sequence {
            Some(DlAckSequence::AggregateTf) => AckRequest::BlockAck,
            Some(DlAckSequence::SuFormat) | Some(DlAckSequence::MuBar) | None => {
                AckRequest::BlockAckRequest
            }
        };
        self.acks.push((station, request));
    }

    pub fn add_ul_sender(&mut self, station: MacAddress) {
        self.acks.push((station, AckRequest::MultiStaBlockAck));
    }
}

/// Variant of a trigger frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Solicits HE TB data PPDUs.
    Basic,
    /// Solicits block acks after a DL MU PPDU.
    MuBar,
}

/// Per-user field of a trigger frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerUser {
    pub aid: Aid,
    pub ru: RuSpec,
    pub mcs: u8,
    pub nss: u8,
}

/// Content of a trigger frame, without its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerDescriptor {
    pub kind: TriggerKind,
    pub channel_width: ChannelWidth,
    pub users: Vec<TriggerUser>,
    /// Duration of the solicited HE TB PPDU.
    pub ul_duration: Duration,
}

impl TriggerDescriptor {
    /// Builds a trigger from the TX vector of a MU PPDU so that responses
    /// use the same RUs, capping every user's MCS at `max_mcs`.
    pub fn from_tx_vector(kind: TriggerKind, vector: &MuTxVector, max_mcs: u8) -> Self {
        let users = vector
            .users
            .iter()
            .map(|(&aid, info)| TriggerUser {
                aid,
                ru: info.ru,
                mcs: info.mode.mcs.min(max_mcs),
                nss: info.mode.nss,
            })
            .collect();
        Self {
            kind,
            channel_width: vector.channel_width,
            users,
            ul_duration: Duration::ZERO,
        }
    }

    /// TX vector describing the HE TB PPDU the trigger solicits.
    pub fn tb_vector(&self) -> MuTxVector {
        let mut vector = MuTxVector::new(Preamble::HeTb, self.channel_width);
        for user in &self.users {
            vector.set_user(
                user.aid,
                MuUserInfo {
                    ru: user.ru,
                    mode: TxMode {
                        mcs: user.mcs,
                        nss: user.nss,
                    },
                },
            );
        }
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ru::{RuSpec, RuType};

    fn vector_with(users: &[(Aid, u8)]) -> MuTxVector {
        let mut v = MuTxVector::new(Preamble::HeMu, ChannelWidth::Mhz20);
        for (i, &(aid, mcs)) in users.iter().enumerate() {
            v.set_user(
                aid,
                MuUserInfo {
                    ru: RuSpec::new(RuType::Tone52, i + 1),
                    mode: TxMode { mcs, nss: 1 },
                },
            );
        }
        v
    }

    #[test]
    fn trigger_caps_mcs() {
        let v = vector_with(&[(1, 9), (2, 3)]);
        let t = TriggerDescriptor::from_tx_vector(TriggerKind::MuBar, &v, 5);
        assert_eq!(t.users.len(), 2);
        assert_eq!(t.users[0].mcs, 5);
        assert_eq!(t.users[1].mcs, 3);
        assert_eq!(t.users[0].ru, RuSpec::new(RuType::Tone52, 1));
    }

    #[test]
    fn tb_vector_mirrors_trigger_users() {
        let v = vector_with(&[(4, 11)]);
        let t = TriggerDescriptor::from_tx_vector(TriggerKind::Basic, &v, 5);
        let tb = t.tb_vector();
        assert_eq!(tb.preamble, Preamble::HeTb);
        assert_eq!(tb.user(4).map(|u| u.mode.mcs), Some(5));
    }

    #[test]
    fn dl_receivers_follow_ack_sequence() {
        let mac = MacAddress::from_index(1);
        let mut p = TxParams::for_dl(DlAckSequence::AggregateTf);
        p.add_dl_receiver(mac);
        assert_eq!(p.acks, vec![(mac, AckRequest::BlockAck)]);

        let mut p = TxParams::for_dl(DlAckSequence::SuFormat);
        p.add_dl_receiver(mac);
        assert_eq!(p.acks, vec![(mac, AckRequest::BlockAckRequest)]);
    }
}
