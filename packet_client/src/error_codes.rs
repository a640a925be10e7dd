// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use packet_core::LedgerError;

/// JSON-RPC error codes returned by nodes and wallets that the client
/// classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonRpcErrorCode {
    /// 3 -- Execution reverted, the revert data is in the error data.
    ExecutionReverted = 3,
    /// 4001 -- The user rejected the request (EIP-1193).
    UserRejectedRequest = 4001,
    /// 4100 -- The requested account is not authorized (EIP-1193).
    Unauthorized = 4100,
    /// -32000 -- Generic server error, see the message.
    ServerError = -32000,
}

impl JsonRpcErrorCode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(Self::ExecutionReverted),
            4001 => Some(Self::UserRejectedRequest),
            4100 => Some(Self::Unauthorized),
            -32000 => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// Maps a JSON-RPC error object onto a [`LedgerError`].
///
/// Nodes disagree on codes for reverts and balance problems, so the message
/// is inspected as well.
pub fn classify(code: i32, message: &str) -> LedgerError {
    let lowercase = message.to_lowercase();
    match JsonRpcErrorCode::from_code(code) {
        Some(JsonRpcErrorCode::UserRejectedRequest | JsonRpcErrorCode::Unauthorized) => {
            LedgerError::UserRejected(message.to_string())
        }
        Some(JsonRpcErrorCode::ExecutionReverted) => LedgerError::Reverted(message.to_string()),
        _ if lowercase.contains("revert") => LedgerError::Reverted(message.to_string()),
        _ if lowercase.contains("insufficient funds") => {
            LedgerError::InsufficientFunds(message.to_string())
        }
        _ => LedgerError::Rejected(format!("{message} (code {code})")),
    }
}

#[cfg(test)]
mod error_codes_unit_test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::user_rejected(4001, "User denied transaction signature.")]
    #[case::unauthorized(4100, "The requested account has not been authorized")]
    fn wallet_refusals(#[case] code: i32, #[case] message: &str) {
        assert!(matches!(classify(code, message), LedgerError::UserRejected(_)));
    }

    #[rstest]
    #[case::geth(3, "execution reverted: Already claimed")]
    #[case::hardhat(
        -32603,
        "VM Exception while processing transaction: reverted with reason string 'Invalid password'"
    )]
    fn reverts(#[case] code: i32, #[case] message: &str) {
        match classify(code, message) {
            LedgerError::Reverted(reason) => assert_eq!(reason, message),
            other => panic!("expected a revert, got {other:?}"),
        }
    }

    #[test]
    fn insufficient_funds() {
        assert!(matches!(
            classify(-32000, "insufficient funds for gas * price + value"),
            LedgerError::InsufficientFunds(_)
        ));
    }

    #[test]
    fn other_errors_keep_code() {
        match classify(-32601, "the method eth_foo does not exist") {
            LedgerError::Rejected(reason) => assert!(reason.ends_with("(code -32601)")),
            other => panic!("expected a rejection, got {other:?}"),
        }
    }
}
