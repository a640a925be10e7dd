// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The `flow` module drives red packet transactions from a user action to a
//! result the user can act on.
//!
//! Every write goes through the same steps: local validation, network
//! resolution, submission, waiting for the receipt and reading the outcome
//! out of the receipt logs. Progress is published as a [`FlowState`] through
//! each controller's `state()`.
//!
//! Controllers use user-defined adapters (see [crate::adapters]) for every
//! ledger round trip, and a [`crate::adapters::ContractResolver`] to find
//! the contract of the connected network.
//!
//! A controller runs one action at a time. A call made while another one is
//! in flight returns `None` without touching the ledger.

mod claim;
mod creation;
mod guard;
mod query;
mod refund;
mod state;

use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, TxHash};
pub use claim::{ClaimController, ClaimOutcome};
pub use creation::{
    CreationController, CreationOutcome, PacketForm, ValidatedPacket, MAX_DURATION_HOURS,
    MAX_SLOTS, MIN_DURATION_HOURS, MIN_SLOTS,
};
pub use guard::InFlightGuard;
use log::debug;
pub use query::{next_packet_id, read_packet};
pub use refund::{RefundController, RefundOutcome};
pub use state::{FlowEvent, FlowState};

use crate::{
    adapters::{Connection, ContractResolver, TransactionSender},
    receipt::{ReceiptHandle, ReceiptStatus},
    Error, FlowError, LedgerError, NetworkError, ValidationError,
};

/// Why a flow body stopped early
pub(crate) enum Interrupt {
    /// The action failed, the flow ends in `Failed`
    Failed(FlowError),
    /// The controller itself misbehaved
    Broken(Error),
}

impl From<FlowError> for Interrupt {
    fn from(err: FlowError) -> Self {
        Interrupt::Failed(err)
    }
}

impl From<ValidationError> for Interrupt {
    fn from(err: ValidationError) -> Self {
        Interrupt::Failed(err.into())
    }
}

impl From<NetworkError> for Interrupt {
    fn from(err: NetworkError) -> Self {
        Interrupt::Failed(err.into())
    }
}

impl From<Error> for Interrupt {
    fn from(err: Error) -> Self {
        Interrupt::Broken(err)
    }
}

/// Current [`FlowState`] of a controller, shared between `&self` calls
pub(crate) struct StateCell<T> {
    name: &'static str,
    state: Mutex<FlowState<T>>,
}

impl<T: Clone + std::fmt::Debug> StateCell<T> {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(FlowState::Idle),
        }
    }

    pub(crate) fn get(&self) -> FlowState<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves to the next state, leaving the current one untouched when the
    /// transition is not allowed.
    pub(crate) fn apply(&self, event: FlowEvent<T>) -> Result<FlowState<T>, Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = state.clone().on(event)?;
        debug!("{} flow: {} -> {}", self.name, state.label(), next.label());
        *state = next.clone();
        Ok(next)
    }

    /// Applies the terminal event of a flow body.
    ///
    /// A broken flow returns the controller to `Idle` so the next action can
    /// begin.
    pub(crate) fn finish(&self, result: Result<T, Interrupt>) -> Result<FlowState<T>, Error> {
        match result {
            Ok(value) => self.apply(FlowEvent::Completed(value)),
            Err(Interrupt::Failed(err)) => self.apply(FlowEvent::Fail(err)),
            Err(Interrupt::Broken(err)) => {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                debug!("{} flow: {} -> Idle after {err}", self.name, state.label());
                *state = FlowState::Idle;
                Err(err)
            }
        }
    }
}

pub(crate) fn ledger_error<Err: Into<LedgerError>>(err: Err) -> LedgerError {
    err.into()
}

/// Resolves the contract of the connected network.
pub(crate) async fn resolve_contract<E, R>(context: &E, resolver: &R) -> Result<Address, FlowError>
where
    E: Connection + Sync,
    R: ContractResolver,
{
    let chain_id = context
        .chain_id()
        .await
        .map_err(|err| FlowError::NetworkUnavailable(ledger_error(err).to_string()))?
        .ok_or(NetworkError::NotConnected)?;
    Ok(resolver.resolve(chain_id)?)
}

/// Resolves the sending account together with the contract.
pub(crate) async fn resolve_session<E, R>(
    context: &E,
    resolver: &R,
) -> Result<(Address, Address), FlowError>
where
    E: Connection + Sync,
    R: ContractResolver,
{
    let account = context
        .account()
        .await
        .map_err(|err| FlowError::NetworkUnavailable(ledger_error(err).to_string()))?
        .ok_or(NetworkError::NotConnected)?;
    let contract = resolve_contract(context, resolver).await?;
    Ok((account, contract))
}

/// Waits for the receipt of `tx_hash` and returns it with its status.
pub(crate) async fn confirm<E>(
    context: &E,
    tx_hash: TxHash,
) -> Result<(ReceiptHandle, ReceiptStatus), FlowError>
where
    E: TransactionSender + Sync,
{
    let receipt = context
        .await_receipt(tx_hash)
        .await
        .map_err(|err| FlowError::ReceiptUnavailable {
            tx_hash,
            reason: ledger_error(err).to_string(),
        })?;
    let status = receipt.read().await.status;
    if status == ReceiptStatus::Pending {
        return Err(FlowError::ReceiptUnavailable {
            tx_hash,
            reason: "the ledger client returned a pending receipt".to_string(),
        });
    }
    Ok((receipt, status))
}
