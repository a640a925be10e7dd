// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::U256;

/// Errors raised while turning raw contract values into packet types
#[derive(thiserror::Error, Debug)]
pub enum ContractError {
    #[error("packet id is empty")]
    EmptyPacketId,
    #[error("invalid packet id: {input}")]
    InvalidPacketId { input: String },
    #[error("{field} does not fit in 64 bits: {value}")]
    ValueOverflow { field: &'static str, value: U256 },
    #[error("packet record is inconsistent: {0}")]
    InconsistentRecord(String),
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
}
