// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory ledger for the red packet flows.
//!
//! Simulates a single RedPacket deployment: packets are created, claimed in
//! equal shares and refunded after expiry, and every executed call emits the
//! same logs the deployed contract does. Every write call is recorded, and a
//! few faults can be injected to reproduce what real ledger clients do:
//! rejected submissions, receipts whose logs show up late or never, and
//! submissions that suspend before returning.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use alloy::{
    primitives::{address, keccak256, Address, TxHash, U256},
    sol_types::SolEvent,
};
use async_trait::async_trait;
use packet_contract::{IRedPacket, PacketCall, PacketId, PacketRecord};

use crate::{
    adapters::{Connection, PacketReader, TransactionSender},
    receipt::{LogEntry, ReceiptHandle, ReceiptStatus, TransactionReceipt, TransactionRequest},
    registry::{HARDHAT_CHAIN_ID, HARDHAT_DEPLOYMENT},
    LedgerError,
};

/// First Hardhat development account
pub const DEFAULT_ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
/// Ledger clock at start, unix seconds
pub const GENESIS_TIME: u64 = 1_700_000_000;

const SECONDS_PER_HOUR: u64 = 3600;
const MAX_PACKETS: u64 = 100;

#[derive(Debug, Clone)]
struct StoredPacket {
    creator: Address,
    total_amount: U256,
    remaining_amount: U256,
    total_slots: u64,
    claimed_slots: u64,
    password: String,
    created_at: u64,
    expires_at: u64,
    refunded: bool,
}

impl StoredPacket {
    fn active(&self, now: u64) -> bool {
        !self.refunded && self.claimed_slots < self.total_slots && now <= self.expires_at
    }

    fn record(&self, now: u64) -> PacketRecord {
        PacketRecord {
            creator: self.creator,
            total_amount: self.total_amount,
            remaining_amount: self.remaining_amount,
            total_slots: self.total_slots,
            claimed_slots: self.claimed_slots,
            password_protected: !self.password.is_empty(),
            active: self.active(now),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    chain_id: Option<u64>,
    account: Option<Address>,
    contract: Address,
    now: u64,
    next_packet_id: U256,
    packets: HashMap<PacketId, StoredPacket>,
    claims: HashSet<(PacketId, Address)>,
    receipts: HashMap<TxHash, ReceiptHandle>,
    nonce: u64,
}

/// How the logs of the next receipts are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogDelivery {
    Immediate,
    /// Logs are attached to the receipt after the delay
    Deferred(Duration),
    Dropped,
}

#[derive(Debug)]
struct Faults {
    reject_next_send: Option<String>,
    fail_next_read: Option<String>,
    receipt_delay: Option<Duration>,
    log_delivery: LogDelivery,
    revert_in_receipt: bool,
    yield_on_send: bool,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            reject_next_send: None,
            fail_next_read: None,
            receipt_delay: None,
            log_delivery: LogDelivery::Immediate,
            revert_in_receipt: false,
            yield_on_send: false,
        }
    }
}

/// Simulated RedPacket contract. Clones share the same ledger.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    faults: Arc<Mutex<Faults>>,
    writes: Arc<Mutex<Vec<TransactionRequest>>>,
    reads: Arc<Mutex<u64>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(HARDHAT_CHAIN_ID, HARDHAT_DEPLOYMENT)
    }
}

impl InMemoryLedger {
    /// A ledger with the contract deployed at `contract` on `chain_id`,
    /// connected as [`DEFAULT_ACCOUNT`].
    pub fn new(chain_id: u64, contract: Address) -> Self {
        let state = LedgerState {
            chain_id: Some(chain_id),
            account: Some(DEFAULT_ACCOUNT),
            contract,
            now: GENESIS_TIME,
            next_packet_id: U256::ZERO,
            packets: HashMap::new(),
            claims: HashSet::new(),
            receipts: HashMap::new(),
            nonce: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            faults: Arc::new(Mutex::new(Faults::default())),
            writes: Arc::new(Mutex::new(Vec::new())),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contract(&self) -> Address {
        self.state().contract
    }

    /// Switches the connected account, `None` disconnects it.
    pub fn set_account(&self, account: Option<Address>) {
        self.state().account = account;
    }

    /// Switches the connected network, `None` drops the session.
    pub fn set_chain_id(&self, chain_id: Option<u64>) {
        self.state().chain_id = chain_id;
    }

    pub fn now(&self) -> u64 {
        self.state().now
    }

    /// Moves the ledger clock forward. Packets expire against this clock.
    pub fn advance_time(&self, seconds: u64) {
        let mut state = self.state();
        state.now = state.now.saturating_add(seconds);
    }

    /// Sets the id the next created packet receives.
    pub fn set_next_packet_id(&self, packet_id: u64) {
        self.state().next_packet_id = U256::from(packet_id);
    }

    /// Creates a packet directly, without a transaction.
    pub fn create_packet(
        &self,
        creator: Address,
        value: U256,
        total_slots: u64,
        password: &str,
        duration_hours: u64,
    ) -> Result<PacketId, LedgerError> {
        let call = PacketCall::Create {
            total_slots,
            password: password.to_string(),
            duration_hours,
        };
        let mut state = self.state();
        state
            .execute(creator, &call, value)
            .map_err(LedgerError::Reverted)?;
        Ok(PacketId::from(state.next_packet_id - U256::from(1u64)))
    }

    /// Every write call received so far, rejected ones included
    pub fn writes(&self) -> Vec<TransactionRequest> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Hash of the last transaction the ledger accepted
    pub fn last_tx_hash(&self) -> Option<TxHash> {
        let nonce = self.state().nonce;
        (nonce > 0).then(|| keccak256(nonce.to_be_bytes()))
    }

    /// Number of read calls received so far
    pub fn read_count(&self) -> u64 {
        *self.reads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects the next submission as if the user declined it in the wallet.
    pub fn reject_next_send(&self, reason: &str) {
        self.faults().reject_next_send = Some(reason.to_string());
    }

    /// Fails the next `getPacketInfo` read as if the node were unreachable.
    pub fn fail_next_read(&self, reason: &str) {
        self.faults().fail_next_read = Some(reason.to_string());
    }

    /// Attaches the logs of subsequent receipts only after `delay`.
    pub fn defer_logs(&self, delay: Duration) {
        self.faults().log_delivery = LogDelivery::Deferred(delay);
    }

    /// Receipts are handed out only after `delay`, as if still pending.
    pub fn delay_receipts(&self, delay: Duration) {
        self.faults().receipt_delay = Some(delay);
    }

    /// Subsequent receipts never receive their logs.
    pub fn drop_logs(&self) {
        self.faults().log_delivery = LogDelivery::Dropped;
    }

    /// Failing calls are mined with a reverted receipt instead of being
    /// refused at submission.
    pub fn revert_in_receipt(&self) {
        self.faults().revert_in_receipt = true;
    }

    /// Submissions suspend once before being processed.
    pub fn yield_on_send(&self) {
        self.faults().yield_on_send = true;
    }

    fn count_read(&self) {
        *self.reads.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn check_contract(state: &LedgerState, contract: Address) -> Result<(), LedgerError> {
        if state.contract != contract {
            return Err(LedgerError::Rejected(format!("no contract at {contract}")));
        }
        Ok(())
    }
}

fn log_entry<E: SolEvent>(contract: Address, event: &E) -> LogEntry {
    let data = event.encode_log_data();
    LogEntry {
        address: contract,
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

impl LedgerState {
    fn packet(&self, packet_id: PacketId) -> Result<&StoredPacket, String> {
        self.packets
            .get(&packet_id)
            .ok_or_else(|| "Packet does not exist".to_string())
    }

    /// Runs `call` from `from`, returning the emitted logs or the revert reason.
    fn execute(
        &mut self,
        from: Address,
        call: &PacketCall,
        value: U256,
    ) -> Result<Vec<LogEntry>, String> {
        match call {
            PacketCall::Create {
                total_slots,
                password,
                duration_hours,
            } => self.create(from, value, *total_slots, password, *duration_hours),
            PacketCall::Claim {
                packet_id,
                password,
            } => self.claim(from, *packet_id, password),
            PacketCall::Refund { packet_id } => self.refund(from, *packet_id),
        }
    }

    fn create(
        &mut self,
        creator: Address,
        value: U256,
        total_slots: u64,
        password: &str,
        duration_hours: u64,
    ) -> Result<Vec<LogEntry>, String> {
        if value.is_zero() {
            return Err("Amount must be greater than 0".to_string());
        }
        if total_slots == 0 || total_slots > MAX_PACKETS {
            return Err("Invalid number of packets".to_string());
        }
        if duration_hours == 0 {
            return Err("Invalid duration".to_string());
        }
        let packet_id = PacketId::from(self.next_packet_id);
        self.next_packet_id += U256::from(1u64);
        let packet = StoredPacket {
            creator,
            total_amount: value,
            remaining_amount: value,
            total_slots,
            claimed_slots: 0,
            password: password.to_string(),
            created_at: self.now,
            expires_at: self
                .now
                .saturating_add(duration_hours.saturating_mul(SECONDS_PER_HOUR)),
            refunded: false,
        };
        let event = IRedPacket::PacketCreated {
            packetId: packet_id.as_u256(),
            creator,
            totalAmount: value,
            totalPackets: U256::from(total_slots),
            isPasswordProtected: !password.is_empty(),
            expiresAt: U256::from(packet.expires_at),
        };
        self.packets.insert(packet_id, packet);
        Ok(vec![log_entry(self.contract, &event)])
    }

    fn claim(
        &mut self,
        claimer: Address,
        packet_id: PacketId,
        password: &str,
    ) -> Result<Vec<LogEntry>, String> {
        let now = self.now;
        let packet = self.packet(packet_id)?;
        if !packet.active(now) {
            return Err("Packet is not active".to_string());
        }
        if self.claims.contains(&(packet_id, claimer)) {
            return Err("Already claimed".to_string());
        }
        if packet.password != password {
            return Err("Invalid password".to_string());
        }

        let packet = self
            .packets
            .get_mut(&packet_id)
            .ok_or_else(|| "Packet does not exist".to_string())?;
        let amount = if packet.claimed_slots + 1 == packet.total_slots {
            packet.remaining_amount
        } else {
            packet.total_amount / U256::from(packet.total_slots)
        };
        packet.claimed_slots += 1;
        packet.remaining_amount -= amount;
        self.claims.insert((packet_id, claimer));

        let event = IRedPacket::PacketClaimed {
            packetId: packet_id.as_u256(),
            claimer,
            amount,
        };
        Ok(vec![log_entry(self.contract, &event)])
    }

    fn refund(&mut self, from: Address, packet_id: PacketId) -> Result<Vec<LogEntry>, String> {
        let now = self.now;
        let contract = self.contract;
        let packet = self
            .packets
            .get_mut(&packet_id)
            .ok_or_else(|| "Packet does not exist".to_string())?;
        if packet.creator != from {
            return Err("Only creator can refund".to_string());
        }
        if now <= packet.expires_at {
            return Err("Packet has not expired".to_string());
        }
        if packet.refunded || packet.remaining_amount.is_zero() {
            return Err("Nothing to refund".to_string());
        }
        let amount = packet.remaining_amount;
        packet.remaining_amount = U256::ZERO;
        packet.refunded = true;

        let event = IRedPacket::PacketRefunded {
            packetId: packet_id.as_u256(),
            creator: from,
            amount,
        };
        Ok(vec![log_entry(contract, &event)])
    }
}

#[async_trait]
impl Connection for InMemoryLedger {
    type AdapterError = LedgerError;

    async fn chain_id(&self) -> Result<Option<u64>, Self::AdapterError> {
        Ok(self.state().chain_id)
    }

    async fn account(&self) -> Result<Option<Address>, Self::AdapterError> {
        Ok(self.state().account)
    }
}

#[async_trait]
impl PacketReader for InMemoryLedger {
    type AdapterError = LedgerError;

    async fn packet_info(
        &self,
        contract: Address,
        packet_id: PacketId,
    ) -> Result<PacketRecord, Self::AdapterError> {
        self.count_read();
        if let Some(reason) = self.faults().fail_next_read.take() {
            return Err(LedgerError::Rejected(reason));
        }
        let state = self.state();
        Self::check_contract(&state, contract)?;
        state
            .packet(packet_id)
            .map(|packet| packet.record(state.now))
            .map_err(LedgerError::Reverted)
    }

    async fn next_packet_id(&self, contract: Address) -> Result<PacketId, Self::AdapterError> {
        self.count_read();
        let state = self.state();
        Self::check_contract(&state, contract)?;
        Ok(PacketId::from(state.next_packet_id))
    }

    async fn has_claimed(
        &self,
        contract: Address,
        packet_id: PacketId,
        claimer: Address,
    ) -> Result<bool, Self::AdapterError> {
        self.count_read();
        let state = self.state();
        Self::check_contract(&state, contract)?;
        Ok(state.claims.contains(&(packet_id, claimer)))
    }
}

#[async_trait]
impl TransactionSender for InMemoryLedger {
    type AdapterError = LedgerError;

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TxHash, Self::AdapterError> {
        let yield_on_send = self.faults().yield_on_send;
        if yield_on_send {
            tokio::task::yield_now().await;
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let (rejection, delivery, revert_in_receipt) = {
            let mut faults = self.faults();
            (
                faults.reject_next_send.take(),
                faults.log_delivery,
                faults.revert_in_receipt,
            )
        };
        if let Some(reason) = rejection {
            return Err(LedgerError::UserRejected(reason));
        }

        let mut state = self.state();
        Self::check_contract(&state, request.to)?;
        if !request.call.is_payable() && !request.value.is_zero() {
            return Err(LedgerError::Reverted(format!(
                "{} is not payable",
                request.call.function_name()
            )));
        }
        let executed = state.execute(request.from, &request.call, request.value);

        state.nonce += 1;
        let tx_hash = keccak256(state.nonce.to_be_bytes());
        let (status, logs) = match executed {
            Ok(logs) => (ReceiptStatus::Mined, logs),
            Err(reason) if !revert_in_receipt => return Err(LedgerError::Reverted(reason)),
            Err(_) => (ReceiptStatus::Reverted, Vec::new()),
        };

        let receipt = match delivery {
            LogDelivery::Immediate => TransactionReceipt::new(tx_hash, status, logs).into_handle(),
            LogDelivery::Dropped => TransactionReceipt::new(tx_hash, status, vec![]).into_handle(),
            LogDelivery::Deferred(delay) => {
                let receipt = TransactionReceipt::new(tx_hash, status, vec![]).into_handle();
                let pending = receipt.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    pending.write().await.logs = logs;
                });
                receipt
            }
        };
        state.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<ReceiptHandle, Self::AdapterError> {
        let delay = self.faults().receipt_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::Rejected(format!("unknown transaction {tx_hash}")))
    }
}

#[cfg(test)]
mod memory_unit_test {
    use alloy::primitives::utils::parse_ether;
    use rstest::*;

    use super::*;

    const CLAIMER: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

    #[fixture]
    fn ledger() -> InMemoryLedger {
        InMemoryLedger::default()
    }

    #[rstest]
    fn claims_split_equally(ledger: InMemoryLedger) {
        let packet_id = ledger
            .create_packet(DEFAULT_ACCOUNT, parse_ether("1").unwrap(), 3, "", 24)
            .unwrap();
        let mut state = ledger.state();
        let first = address!("1000000000000000000000000000000000000001");
        let second = address!("1000000000000000000000000000000000000002");
        state.claim(first, packet_id, "").unwrap();
        state.claim(second, packet_id, "").unwrap();
        state.claim(CLAIMER, packet_id, "").unwrap();

        let record = state.packet(packet_id).unwrap().record(state.now);
        assert_eq!(record.claimed_slots, 3);
        assert!(record.remaining_amount.is_zero());
        assert!(!record.active);
    }

    #[rstest]
    fn claim_checks_password_and_duplicates(ledger: InMemoryLedger) {
        let packet_id = ledger
            .create_packet(DEFAULT_ACCOUNT, U256::from(10u64), 2, "secret", 1)
            .unwrap();
        let mut state = ledger.state();
        assert_eq!(
            state.claim(CLAIMER, packet_id, "wrong"),
            Err("Invalid password".to_string())
        );
        assert!(state.claim(CLAIMER, packet_id, "secret").is_ok());
        assert_eq!(
            state.claim(CLAIMER, packet_id, "secret"),
            Err("Already claimed".to_string())
        );
    }

    #[rstest]
    fn refund_only_after_expiry(ledger: InMemoryLedger) {
        let packet_id = ledger
            .create_packet(DEFAULT_ACCOUNT, U256::from(10u64), 2, "", 1)
            .unwrap();
        assert_eq!(
            ledger.state().refund(DEFAULT_ACCOUNT, packet_id),
            Err("Packet has not expired".to_string())
        );
        ledger.advance_time(SECONDS_PER_HOUR + 1);
        assert_eq!(
            ledger.state().refund(CLAIMER, packet_id),
            Err("Only creator can refund".to_string())
        );
        assert!(ledger.state().refund(DEFAULT_ACCOUNT, packet_id).is_ok());

        let state = ledger.state();
        let record = state.packet(packet_id).unwrap().record(state.now);
        assert!(!record.active);
        assert!(record.remaining_amount.is_zero());
    }

    #[rstest]
    fn packet_ids_increase(ledger: InMemoryLedger) {
        ledger.set_next_packet_id(7);
        let first = ledger
            .create_packet(DEFAULT_ACCOUNT, U256::from(1u64), 1, "", 1)
            .unwrap();
        let second = ledger
            .create_packet(DEFAULT_ACCOUNT, U256::from(1u64), 1, "", 1)
            .unwrap();
        assert_eq!(first, PacketId::from(7u64));
        assert_eq!(second, PacketId::from(8u64));
    }
}
