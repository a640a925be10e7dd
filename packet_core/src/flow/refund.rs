// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};

use alloy::primitives::{TxHash, U256};
use log::{debug, info};
use packet_contract::{PacketCall, PacketId};
use serde::Serialize;

use super::{
    confirm, ledger_error, resolve_session, FlowEvent, FlowState, InFlightGuard, Interrupt,
    StateCell,
};
use crate::{
    adapters::{Connection, ContractResolver, TransactionSender},
    event,
    receipt::{ReceiptStatus, TransactionRequest},
    registry::ContractRegistry,
    Error, FlowError, ValidationError,
};

/// Result of a mined `refundPacket`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundOutcome {
    pub tx_hash: TxHash,
    pub packet_id: PacketId,
    /// Amount from the `PacketRefunded` log, in wei
    pub refunded_amount: Option<U256>,
}

/// Returns the unclaimed remainder of an expired packet to its creator.
///
/// Whether the packet can be refunded is decided by the ledger alone.
pub struct RefundController<E, R = ContractRegistry> {
    /// Context that implements adapters
    context: E,
    resolver: R,
    state: StateCell<RefundOutcome>,
    in_flight: AtomicBool,
}

impl<E, R> RefundController<E, R> {
    pub fn new(context: E, resolver: R) -> Self {
        Self {
            context,
            resolver,
            state: StateCell::new("refund"),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> FlowState<RefundOutcome> {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl<E, R> RefundController<E, R>
where
    E: Connection + TransactionSender + Sync,
    R: ContractResolver + Sync,
{
    /// Refunds the packet named by `id_text`.
    ///
    /// Returns `Ok(None)` when a refund is already in flight.
    pub async fn refund(&self, id_text: &str) -> Result<Option<FlowState<RefundOutcome>>, Error> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("refundPacket already in flight, ignoring refund");
            return Ok(None);
        };
        self.state.apply(FlowEvent::Begin)?;

        let result = self.run(id_text).await;
        match &result {
            Ok(outcome) => info!(
                "Refunded red packet {} in transaction {}",
                outcome.packet_id, outcome.tx_hash
            ),
            Err(Interrupt::Failed(err)) => info!("refundPacket failed: {err}"),
            Err(Interrupt::Broken(_)) => {}
        }
        self.state.finish(result).map(Some)
    }

    async fn run(&self, id_text: &str) -> Result<RefundOutcome, Interrupt> {
        let packet_id = id_text.parse::<PacketId>().map_err(ValidationError::from)?;
        let (from, contract) = resolve_session(&self.context, &self.resolver).await?;

        info!("Submitting refundPacket({packet_id}) to {contract}");
        let request = TransactionRequest {
            from,
            to: contract,
            call: PacketCall::Refund { packet_id },
            value: U256::ZERO,
        };
        let tx_hash = self
            .context
            .send_transaction(request)
            .await
            .map_err(|err| FlowError::Submission(ledger_error(err).to_string()))?;
        self.state.apply(FlowEvent::Sent(tx_hash))?;

        let (receipt, status) = confirm(&self.context, tx_hash).await?;
        if status == ReceiptStatus::Reverted {
            return Err(FlowError::Submission(format!("transaction {tx_hash} reverted")).into());
        }
        self.state.apply(FlowEvent::Mined)?;

        let refunded_amount = event::packet_refunded(&*receipt.read().await)
            .found()
            .and_then(|refunded| refunded.data_word(0));
        if refunded_amount.is_none() {
            self.state.apply(FlowEvent::Missed)?;
        }

        Ok(RefundOutcome {
            tx_hash,
            packet_id,
            refunded_amount,
        })
    }
}
