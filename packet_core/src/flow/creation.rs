// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::{atomic::AtomicBool, Mutex, PoisonError};

use alloy::primitives::{utils::parse_ether, TxHash, U256};
use log::{debug, info, warn};
use packet_contract::{PacketCall, PacketId};
use serde::{Deserialize, Serialize};

use super::{
    confirm, ledger_error, resolve_session, FlowEvent, FlowState, InFlightGuard, Interrupt,
    StateCell,
};
use crate::{
    adapters::{Connection, ContractResolver, TransactionSender},
    config::FlowConfig,
    event,
    receipt::{ReceiptHandle, ReceiptStatus, TransactionRequest},
    registry::ContractRegistry,
    Error, FlowError, ValidationError,
};

pub const MIN_SLOTS: u64 = 1;
pub const MAX_SLOTS: u64 = 100;
pub const MIN_DURATION_HOURS: u64 = 1;
pub const MAX_DURATION_HOURS: u64 = 720;

/// Wei per ether is 10^18
const ETHER_DECIMALS: usize = 18;
const DEFAULT_SLOTS: &str = "5";
const DEFAULT_DURATION_HOURS: &str = "24";

/// Creation form, as typed by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketForm {
    /// Total funding, in ether
    pub amount: String,
    pub total_slots: String,
    /// Empty for an unprotected packet
    pub password: String,
    pub duration_hours: String,
}

impl Default for PacketForm {
    fn default() -> Self {
        Self {
            amount: String::new(),
            total_slots: DEFAULT_SLOTS.to_string(),
            password: String::new(),
            duration_hours: DEFAULT_DURATION_HOURS.to_string(),
        }
    }
}

/// A form that passed local validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPacket {
    /// Attached value in wei
    pub value: U256,
    pub total_slots: u64,
    pub password: String,
    pub duration_hours: u64,
}

impl ValidatedPacket {
    pub fn call(&self) -> PacketCall {
        PacketCall::Create {
            total_slots: self.total_slots,
            password: self.password.clone(),
            duration_hours: self.duration_hours,
        }
    }
}

fn bounded(input: &str, min: u64, max: u64) -> Option<u64> {
    input
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|value| (min..=max).contains(value))
}

impl PacketForm {
    pub fn validate(&self) -> Result<ValidatedPacket, ValidationError> {
        let amount = self.amount.trim();
        if amount.is_empty() {
            return Err(ValidationError::InvalidAmount {
                input: self.amount.clone(),
                reason: "amount is required".to_string(),
            });
        }
        // parse_ether skips '_' and truncates digits past wei precision
        if amount.contains('_') {
            return Err(ValidationError::InvalidAmount {
                input: self.amount.clone(),
                reason: "digit separators are not allowed".to_string(),
            });
        }
        let fraction_digits = amount.split_once('.').map_or(0, |(_, fraction)| fraction.len());
        if fraction_digits > ETHER_DECIMALS {
            return Err(ValidationError::InvalidAmount {
                input: self.amount.clone(),
                reason: format!("at most {ETHER_DECIMALS} decimal places are allowed"),
            });
        }
        let value = parse_ether(amount).map_err(|err| ValidationError::InvalidAmount {
            input: self.amount.clone(),
            reason: err.to_string(),
        })?;
        // parse_ether yields the absolute value of a negative amount
        if value.is_zero() || amount.starts_with('-') {
            return Err(ValidationError::InvalidAmount {
                input: self.amount.clone(),
                reason: "amount must be positive".to_string(),
            });
        }

        let total_slots = bounded(&self.total_slots, MIN_SLOTS, MAX_SLOTS).ok_or_else(|| {
            ValidationError::InvalidSlots {
                input: self.total_slots.clone(),
                min: MIN_SLOTS,
                max: MAX_SLOTS,
            }
        })?;
        let duration_hours = bounded(&self.duration_hours, MIN_DURATION_HOURS, MAX_DURATION_HOURS)
            .ok_or_else(|| ValidationError::InvalidDuration {
                input: self.duration_hours.clone(),
                min: MIN_DURATION_HOURS,
                max: MAX_DURATION_HOURS,
            })?;

        Ok(ValidatedPacket {
            value,
            total_slots,
            password: self.password.clone(),
            duration_hours,
        })
    }
}

/// Result of a mined `createPacket`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreationOutcome {
    pub tx_hash: TxHash,
    /// `None` when no `PacketCreated` log could be read within the retry
    /// budget. The packet still exists and was funded.
    pub packet_id: Option<PacketId>,
}

impl CreationOutcome {
    /// True when the packet was created but its id is unknown
    pub fn is_partial(&self) -> bool {
        self.packet_id.is_none()
    }
}

/// Runs `createPacket` from the values of a [`PacketForm`].
///
/// A successful run, partial or not, clears the form. No packet record is
/// kept: the new packet must be queried like any other.
pub struct CreationController<E, R = ContractRegistry> {
    /// Context that implements adapters
    context: E,
    resolver: R,
    config: FlowConfig,
    form: Mutex<PacketForm>,
    state: StateCell<CreationOutcome>,
    in_flight: AtomicBool,
}

impl<E, R> CreationController<E, R> {
    pub fn new(context: E, resolver: R, config: FlowConfig) -> Self {
        Self {
            context,
            resolver,
            config,
            form: Mutex::new(PacketForm::default()),
            state: StateCell::new("create"),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &E {
        &self.context
    }

    pub fn form(&self) -> PacketForm {
        self.form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_form(&self, form: PacketForm) {
        *self.form.lock().unwrap_or_else(PoisonError::into_inner) = form;
    }

    pub fn update_form(&self, update: impl FnOnce(&mut PacketForm)) {
        update(&mut self.form.lock().unwrap_or_else(PoisonError::into_inner));
    }

    pub fn state(&self) -> FlowState<CreationOutcome> {
        self.state.get()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(std::sync::atomic::Ordering::Acquire)
    }
}

impl<E, R> CreationController<E, R>
where
    E: Connection + TransactionSender + Sync,
    R: ContractResolver + Sync,
{
    /// Submits the current form and runs the flow to a terminal state.
    ///
    /// Returns `Ok(None)` when a submission is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateForRequestedAction`] if the state machine
    /// refuses a transition. Every ledger or input problem ends the flow in
    /// [`FlowState::Failed`] instead.
    pub async fn submit(&self) -> Result<Option<FlowState<CreationOutcome>>, Error> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("createPacket already in flight, ignoring submit");
            return Ok(None);
        };
        self.state.apply(FlowEvent::Begin)?;

        let form = self.form();
        let result = self.run(&form).await;
        match &result {
            Ok(outcome) => {
                self.set_form(PacketForm::default());
                match outcome.packet_id {
                    Some(packet_id) => info!(
                        "Red packet {packet_id} created in transaction {}",
                        outcome.tx_hash
                    ),
                    None => warn!(
                        "Transaction {} created a red packet but its id could not be read from the receipt",
                        outcome.tx_hash
                    ),
                }
            }
            Err(Interrupt::Failed(err)) => info!("createPacket failed: {err}"),
            Err(Interrupt::Broken(_)) => {}
        }
        self.state.finish(result).map(Some)
    }

    async fn run(&self, form: &PacketForm) -> Result<CreationOutcome, Interrupt> {
        let packet = form.validate()?;
        let (from, contract) = resolve_session(&self.context, &self.resolver).await?;

        info!(
            "Submitting createPacket({}, <password>, {}) with {} wei to {contract}",
            packet.total_slots, packet.duration_hours, packet.value
        );
        let request = TransactionRequest {
            from,
            to: contract,
            call: packet.call(),
            value: packet.value,
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

        let packet_id = self.extract_packet_id(&receipt).await?;
        Ok(CreationOutcome { tx_hash, packet_id })
    }

    /// Reads the packet id from `PacketCreated`, re-reading the same receipt
    /// after a delay while the budget allows.
    async fn extract_packet_id(&self, receipt: &ReceiptHandle) -> Result<Option<PacketId>, Error> {
        let mut retries = 0;
        loop {
            let extraction = event::packet_created(&*receipt.read().await);
            if let Some(created) = extraction.found() {
                return Ok(created.uint(0).map(PacketId::from));
            }
            self.state.apply(FlowEvent::Missed)?;
            if retries >= self.config.extraction_retries {
                return Ok(None);
            }
            retries += 1;
            debug!(
                "PacketCreated not in receipt yet, retrying in {:?}",
                self.config.extraction_retry_delay
            );
            tokio::time::sleep(self.config.extraction_retry_delay).await;
        }
    }
}
