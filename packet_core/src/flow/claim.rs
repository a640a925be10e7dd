// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use alloy::primitives::{TxHash, U256};
use log::{debug, info, warn};
use packet_contract::{PacketCall, PacketId, PacketRecord};
use serde::Serialize;

use super::{
    confirm, ledger_error, read_packet, resolve_contract, resolve_session, FlowEvent, FlowState,
    InFlightGuard, Interrupt, StateCell,
};
use crate::{
    adapters::{Connection, ContractResolver, PacketReader, TransactionSender},
    event,
    receipt::{ReceiptStatus, TransactionRequest},
    registry::ContractRegistry,
    Error, FlowError, LedgerError, ValidationError,
};

/// Result of a mined `claimPacket`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimOutcome {
    pub tx_hash: TxHash,
    pub packet_id: PacketId,
    /// Amount from the `PacketClaimed` log, in wei
    pub claimed_amount: Option<U256>,
    /// Record read back after the claim. `None` if that read failed, in
    /// which case the cached record is dropped and the packet must be
    /// queried again.
    pub refreshed: Option<PacketRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedPacket {
    packet_id: PacketId,
    record: PacketRecord,
}

/// Query-then-claim over a single cached packet.
///
/// A query overwrites the cached record. A claim always targets the cached
/// packet and re-queries it once mined; the cached counters are never
/// adjusted locally. Queries and claims share one in-flight flag.
pub struct ClaimController<E, R = ContractRegistry> {
    /// Context that implements adapters
    context: E,
    resolver: R,
    cached: Mutex<Option<CachedPacket>>,
    state: StateCell<ClaimOutcome>,
    in_flight: AtomicBool,
}

impl<E, R> ClaimController<E, R> {
    pub fn new(context: E, resolver: R) -> Self {
        Self {
            context,
            resolver,
            cached: Mutex::new(None),
            state: StateCell::new("claim"),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &E {
        &self.context
    }

    pub fn state(&self) -> FlowState<ClaimOutcome> {
        self.state.get()
    }

    /// Last successfully queried packet
    pub fn cached(&self) -> Option<(PacketId, PacketRecord)> {
        self.cached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|cached| (cached.packet_id, cached.record.clone()))
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Checks the local preconditions of a claim with `password`.
    ///
    /// Only the presence of a password is checked, the ledger decides
    /// whether it is correct.
    pub fn claim_readiness(&self, password: &str) -> Result<(), ValidationError> {
        let cached = self.cached();
        Self::ready(cached.as_ref(), password).map(|_| ())
    }

    /// Whether the claim action should be enabled
    pub fn can_claim(&self, password: &str) -> bool {
        !self.is_busy() && self.claim_readiness(password).is_ok()
    }

    fn ready<'a>(
        cached: Option<&'a (PacketId, PacketRecord)>,
        password: &str,
    ) -> Result<&'a (PacketId, PacketRecord), ValidationError> {
        let cached = cached.ok_or(ValidationError::NoPacketQueried)?;
        let (packet_id, record) = cached;
        if !record.active {
            return Err(ValidationError::PacketInactive {
                packet_id: *packet_id,
            });
        }
        if record.password_protected && password.is_empty() {
            return Err(ValidationError::PasswordRequired);
        }
        Ok(cached)
    }

    fn store(&self, packet_id: PacketId, record: PacketRecord) {
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(CachedPacket { packet_id, record });
    }

    /// Drops the cached record unless it belongs to `packet_id`.
    fn forget_unless(&self, packet_id: Option<PacketId>) {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.as_ref().map(|cached| cached.packet_id) != packet_id {
            *cached = None;
        }
    }
}

impl<E, R> ClaimController<E, R>
where
    E: Connection + PacketReader + TransactionSender + Sync,
    R: ContractResolver + Sync,
{
    /// Fetches the packet named by `id_text` and caches it.
    ///
    /// Returns `None` when a query or claim is already in flight. A failed
    /// query for another packet than the cached one clears the cache; a
    /// failed re-query of the cached packet keeps it.
    pub async fn query(&self, id_text: &str) -> Option<Result<PacketRecord, FlowError>> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Claim controller busy, ignoring query");
            return None;
        };

        let packet_id = match id_text.parse::<PacketId>() {
            Ok(packet_id) => packet_id,
            Err(err) => {
                self.forget_unless(None);
                return Some(Err(ValidationError::from(err).into()));
            }
        };
        let result = self.fetch(packet_id).await;
        match &result {
            Ok(record) => self.store(packet_id, record.clone()),
            Err(err) => {
                debug!("Query of red packet {packet_id} failed: {err}");
                self.forget_unless(Some(packet_id));
            }
        }
        Some(result)
    }

    async fn fetch(&self, packet_id: PacketId) -> Result<PacketRecord, FlowError> {
        let contract = resolve_contract(&self.context, &self.resolver).await?;
        read_packet(&self.context, contract, packet_id).await
    }

    /// Claims the cached packet with `password` (empty when unprotected).
    ///
    /// Returns `Ok(None)` when a query or claim is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateForRequestedAction`] if the state machine
    /// refuses a transition. A rejection by the ledger ends the flow in
    /// [`FlowState::Failed`] with a `claim_rejected` kind and is never
    /// retried.
    pub async fn claim(&self, password: &str) -> Result<Option<FlowState<ClaimOutcome>>, Error> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Claim controller busy, ignoring claim");
            return Ok(None);
        };
        self.state.apply(FlowEvent::Begin)?;

        let result = self.run(password).await;
        match &result {
            Ok(outcome) => info!(
                "Claimed red packet {} in transaction {}",
                outcome.packet_id, outcome.tx_hash
            ),
            Err(Interrupt::Failed(err)) => info!("claimPacket failed: {err}"),
            Err(Interrupt::Broken(_)) => {}
        }
        self.state.finish(result).map(Some)
    }

    async fn run(&self, password: &str) -> Result<ClaimOutcome, Interrupt> {
        let cached = self.cached();
        let (packet_id, _) = Self::ready(cached.as_ref(), password)?;
        let packet_id = *packet_id;
        let (from, contract) = resolve_session(&self.context, &self.resolver).await?;

        info!("Submitting claimPacket({packet_id}) to {contract}");
        let request = TransactionRequest {
            from,
            to: contract,
            call: PacketCall::Claim {
                packet_id,
                password: password.to_string(),
            },
            value: U256::ZERO,
        };
        let tx_hash = self
            .context
            .send_transaction(request)
            .await
            .map_err(|err| match ledger_error(err) {
                LedgerError::Reverted(reason) => FlowError::ClaimRejected(reason),
                other => FlowError::Submission(other.to_string()),
            })?;
        self.state.apply(FlowEvent::Sent(tx_hash))?;

        let (receipt, status) = confirm(&self.context, tx_hash).await?;
        if status == ReceiptStatus::Reverted {
            return Err(
                FlowError::ClaimRejected(format!("transaction {tx_hash} reverted")).into(),
            );
        }
        self.state.apply(FlowEvent::Mined)?;

        let claimed_amount = event::packet_claimed(&*receipt.read().await)
            .found()
            .and_then(|claimed| claimed.data_word(0));
        if claimed_amount.is_none() {
            self.state.apply(FlowEvent::Missed)?;
        }

        let refreshed = match read_packet(&self.context, contract, packet_id).await {
            Ok(record) => {
                self.store(packet_id, record.clone());
                Some(record)
            }
            Err(err) => {
                warn!("Claim of red packet {packet_id} mined but refreshing it failed: {err}");
                // the cached counters predate the claim
                self.forget_unless(None);
                None
            }
        };

        Ok(ClaimOutcome {
            tx_hash,
            packet_id,
            claimed_amount,
            refreshed,
        })
    }

    /// Whether the connected account already claimed the cached packet
    pub async fn already_claimed(&self) -> Result<bool, FlowError> {
        let (packet_id, _) = self.cached().ok_or(ValidationError::NoPacketQueried)?;
        let (account, contract) = resolve_session(&self.context, &self.resolver).await?;
        self.context
            .has_claimed(contract, packet_id, account)
            .await
            .map_err(|err| FlowError::Read(ledger_error(err).to_string()))
    }
}
