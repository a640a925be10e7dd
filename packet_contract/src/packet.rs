// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Packet identifiers and records
//!
//! A [`PacketRecord`] is owned by the ledger. The client only ever holds a
//! copy fetched through `getPacketInfo`, which may already be stale.

use std::{fmt, str::FromStr};

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{abi::IRedPacket, ContractError};

/// Identifier assigned by the ledger when a packet is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub U256);

impl PacketId {
    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<U256> for PacketId {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<u64> for PacketId {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses user input, either decimal or `0x`-prefixed hex.
impl FromStr for PacketId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ContractError::EmptyPacketId);
        }
        let invalid = || ContractError::InvalidPacketId {
            input: trimmed.to_owned(),
        };
        let (digits, radix) = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => (hex, 16),
            None => (trimmed, 10),
        };
        // from_str_radix skips '_' and reads "" as zero
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(invalid());
        }
        U256::from_str_radix(digits, radix as u64)
            .map(PacketId)
            .map_err(|_| invalid())
    }
}

/// Snapshot of a packet as returned by `getPacketInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub creator: Address,
    /// Funded amount in wei
    pub total_amount: U256,
    /// Amount still claimable, in wei
    pub remaining_amount: U256,
    pub total_slots: u64,
    pub claimed_slots: u64,
    pub password_protected: bool,
    /// Computed by the ledger; false once fully claimed, expired or refunded
    pub active: bool,
    /// Unix timestamp in seconds
    pub created_at: u64,
    /// Unix timestamp in seconds
    pub expires_at: u64,
}

impl PacketRecord {
    pub fn remaining_slots(&self) -> u64 {
        self.total_slots.saturating_sub(self.claimed_slots)
    }

    fn check_invariants(self) -> Result<Self, ContractError> {
        if self.claimed_slots > self.total_slots {
            return Err(ContractError::InconsistentRecord(format!(
                "claimed slots {} exceed total slots {}",
                self.claimed_slots, self.total_slots
            )));
        }
        if self.remaining_amount > self.total_amount {
            return Err(ContractError::InconsistentRecord(format!(
                "remaining amount {} exceeds total amount {}",
                self.remaining_amount, self.total_amount
            )));
        }
        Ok(self)
    }
}

fn narrow(field: &'static str, value: U256) -> Result<u64, ContractError> {
    u64::try_from(value).map_err(|_| ContractError::ValueOverflow { field, value })
}

impl TryFrom<IRedPacket::getPacketInfoReturn> for PacketRecord {
    type Error = ContractError;

    fn try_from(info: IRedPacket::getPacketInfoReturn) -> Result<Self, Self::Error> {
        PacketRecord {
            creator: info.creator,
            total_amount: info.totalAmount,
            remaining_amount: info.remainingAmount,
            total_slots: narrow("totalPackets", info.totalPackets)?,
            claimed_slots: narrow("claimedPackets", info.claimedPackets)?,
            password_protected: info.isPasswordProtected,
            active: info.isActive,
            created_at: narrow("createdAt", info.createdAt)?,
            expires_at: narrow("expiresAt", info.expiresAt)?,
        }
        .check_invariants()
    }
}

#[cfg(test)]
mod packet_unit_test {
    use alloy::primitives::address;
    use rstest::*;

    use super::*;

    #[fixture]
    fn info() -> IRedPacket::getPacketInfoReturn {
        IRedPacket::getPacketInfoReturn {
            creator: address!("abababababababababababababababababababab"),
            totalAmount: U256::from(1_000u64),
            remainingAmount: U256::from(400u64),
            totalPackets: U256::from(5u64),
            claimedPackets: U256::from(3u64),
            isPasswordProtected: true,
            isActive: true,
            createdAt: U256::from(1_700_000_000u64),
            expiresAt: U256::from(1_700_086_400u64),
        }
    }

    #[rstest]
    #[case::decimal("7", 7)]
    #[case::padded(" 42 ", 42)]
    #[case::hex("0x1f", 31)]
    #[case::upper_hex("0XFF", 255)]
    fn packet_id_parses(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(input.parse::<PacketId>().unwrap(), PacketId::from(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::negative("-1")]
    #[case::garbage("seven")]
    #[case::bare_prefix("0x")]
    #[case::bare_upper_prefix("0X")]
    #[case::underscore("_")]
    #[case::prefixed_underscore("0x_")]
    #[case::separated_digits("1_0")]
    #[case::bad_hex_digit("0x1g")]
    fn packet_id_rejects(#[case] input: &str) {
        assert!(input.parse::<PacketId>().is_err());
    }

    #[test]
    fn packet_id_displays_decimal() {
        assert_eq!(PacketId::from(255u64).to_string(), "255");
    }

    #[rstest]
    fn record_from_packet_info(info: IRedPacket::getPacketInfoReturn) {
        let record = PacketRecord::try_from(info).unwrap();
        assert_eq!(record.total_slots, 5);
        assert_eq!(record.claimed_slots, 3);
        assert_eq!(record.remaining_slots(), 2);
        assert!(record.password_protected);
        assert_eq!(record.expires_at, 1_700_086_400);
    }

    #[rstest]
    fn record_rejects_overflowing_counter(mut info: IRedPacket::getPacketInfoReturn) {
        info.totalPackets = U256::MAX;
        assert!(matches!(
            PacketRecord::try_from(info),
            Err(ContractError::ValueOverflow {
                field: "totalPackets",
                ..
            })
        ));
    }

    #[rstest]
    fn record_rejects_claims_above_slots(mut info: IRedPacket::getPacketInfoReturn) {
        info.claimedPackets = U256::from(6u64);
        assert!(matches!(
            PacketRecord::try_from(info),
            Err(ContractError::InconsistentRecord(_))
        ));
    }
}
