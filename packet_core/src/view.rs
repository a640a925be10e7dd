// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Packet view
//!
//! Display-ready projection of a [`PacketRecord`]. The projection is pure:
//! the status comes from the ledger's own `active` flag, never from comparing
//! `expires_at` with the local clock.

use std::fmt::Display;

use alloy::primitives::{utils::format_ether, Address, U256};
use chrono::{DateTime, Local, TimeZone};
use packet_contract::{PacketId, PacketRecord};
use serde::Serialize;
use strum::{AsRefStr, Display as StrumDisplay};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, StrumDisplay, AsRefStr)]
pub enum PacketStatus {
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PacketView {
    pub packet_id: PacketId,
    pub creator: Address,
    /// In ether
    pub total_amount: String,
    /// In ether
    pub remaining_amount: String,
    pub total_slots: u64,
    pub claimed_slots: u64,
    pub remaining_slots: u64,
    pub password_protected: bool,
    pub status: PacketStatus,
    pub created_at: String,
    pub expires_at: String,
}

impl PacketView {
    /// Projects `record` with timestamps in the local time zone.
    pub fn new(packet_id: PacketId, record: &PacketRecord) -> Self {
        Self::in_timezone(packet_id, record, &Local)
    }

    pub fn in_timezone<Tz>(packet_id: PacketId, record: &PacketRecord, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            packet_id,
            creator: record.creator,
            total_amount: format_amount(record.total_amount),
            remaining_amount: format_amount(record.remaining_amount),
            total_slots: record.total_slots,
            claimed_slots: record.claimed_slots,
            remaining_slots: record.remaining_slots(),
            password_protected: record.password_protected,
            status: if record.active {
                PacketStatus::Active
            } else {
                PacketStatus::Ended
            },
            created_at: format_timestamp(record.created_at, tz),
            expires_at: format_timestamp(record.expires_at, tz),
        }
    }
}

/// Formats a wei amount in ether without trailing zeros.
pub fn format_amount(wei: U256) -> String {
    let ether = format_ether(wei);
    match ether.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => ether,
    }
}

/// Formats unix seconds in `tz`, falling back to the raw number when the
/// value is out of range.
pub fn format_timestamp<Tz>(seconds: u64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|utc| utc.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| seconds.to_string())
}
