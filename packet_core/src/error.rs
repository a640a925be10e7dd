// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types of the red packet flows
//!
//! [`FlowError`] is what a terminal `Failed` state carries: a
//! machine-checkable [`ErrorKind`] plus a message fit for direct display.
//! [`LedgerError`] is what adapters return, [`Error`] covers misuse of the
//! library itself.

use alloy::primitives::TxHash;
use packet_contract::{ContractError, PacketId};
use strum::{AsRefStr, Display};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("The requested action is invalid for current flow state: {state}")]
    InvalidStateForRequestedAction { state: String },
    #[error(transparent)]
    Contract(#[from] ContractError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Machine-checkable classification of a flow outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NetworkUnavailable,
    Submission,
    ReceiptUnavailable,
    /// Funds moved but the packet id could not be read from the logs.
    /// Reported on a partial success, never on a `Failed` state.
    ExtractionIncomplete,
    ClaimRejected,
    Read,
}

/// Local constraint violations, detected before anything reaches the network
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Number of packets must be between {min}-{max}, got {input:?}")]
    InvalidSlots { input: String, min: u64, max: u64 },
    #[error("Duration must be between {min}-{max} hours, got {input:?}")]
    InvalidDuration { input: String, min: u64, max: u64 },
    #[error("Invalid amount {input:?}: {reason}")]
    InvalidAmount { input: String, reason: String },
    #[error("Please enter a red packet ID")]
    MissingPacketId,
    #[error("Invalid red packet ID: {input:?}")]
    InvalidPacketId { input: String },
    #[error("This red packet is password protected, please enter the password")]
    PasswordRequired,
    #[error("Query a red packet before claiming it")]
    NoPacketQueried,
    #[error("Red packet {packet_id} has ended")]
    PacketInactive { packet_id: PacketId },
}

impl From<ContractError> for ValidationError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::EmptyPacketId => ValidationError::MissingPacketId,
            ContractError::InvalidPacketId { input } => ValidationError::InvalidPacketId { input },
            other => ValidationError::InvalidPacketId {
                input: other.to_string(),
            },
        }
    }
}

/// Reason carried by a `Failed` flow state
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NetworkUnavailable(String),
    #[error("Transaction failed: {0}")]
    Submission(String),
    #[error("Transaction {tx_hash} was submitted but its receipt could not be obtained: {reason}")]
    ReceiptUnavailable { tx_hash: TxHash, reason: String },
    #[error("Claim failed: {0}")]
    ClaimRejected(String),
    #[error("Failed to get red packet info: {0}")]
    Read(String),
}

impl FlowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Validation(_) => ErrorKind::Validation,
            FlowError::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            FlowError::Submission(_) => ErrorKind::Submission,
            FlowError::ReceiptUnavailable { .. } => ErrorKind::ReceiptUnavailable,
            FlowError::ClaimRejected(_) => ErrorKind::ClaimRejected,
            FlowError::Read(_) => ErrorKind::Read,
        }
    }
}

/// Contract address lookup failures
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Please connect your wallet")]
    NotConnected,
    #[error(
        "Red Packet contract is not deployed on Mainnet (Chain ID: 1). \
        Please switch to Sepolia testnet (Chain ID: 11155111) to use the dApp."
    )]
    Mainnet,
    #[error(
        "Red Packet contract not deployed on network {chain_id}. \
        Please switch to Sepolia testnet (Chain ID: 11155111) or deploy the contract first."
    )]
    NotDeployed { chain_id: u64 },
}

impl From<NetworkError> for FlowError {
    fn from(err: NetworkError) -> Self {
        FlowError::NetworkUnavailable(err.to_string())
    }
}

/// Errors returned by ledger adapters
#[derive(ThisError, Debug)]
pub enum LedgerError {
    #[error("User rejected the request: {0}")]
    UserRejected(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Execution reverted: {0}")]
    Reverted(String),
    #[error("Rejected by the node: {0}")]
    Rejected(String),
    #[error("Could not decode ledger response: {0}")]
    Decode(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl From<ContractError> for LedgerError {
    fn from(err: ContractError) -> Self {
        LedgerError::Decode(err.to_string())
    }
}
