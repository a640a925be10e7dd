// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ethereum JSON-RPC implementation of the ledger adapters.
//!
//! Transactions are sent with `eth_sendTransaction`, so the node (or the
//! wallet bridge behind it) holds the keys and signs.

use std::time::Duration;

use alloy::{
    primitives::{Address, Bytes, TxHash, B256, U256, U64},
    sol_types::SolCall,
};
use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, ClientError},
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use log::debug;
use packet_contract::{IRedPacket, PacketId, PacketRecord};
use packet_core::{
    adapters::{Connection, PacketReader, TransactionSender},
    receipt::{LogEntry, ReceiptHandle, ReceiptStatus, TransactionReceipt, TransactionRequest},
    LedgerError,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error_codes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The fields of `eth_getTransactionReceipt` the flows use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: TxHash,
    /// `0x1` on success, `0x0` on revert. Absent before Byzantium.
    #[serde(default)]
    pub status: Option<U64>,
    pub logs: Vec<RpcLog>,
}

impl From<RpcReceipt> for TransactionReceipt {
    fn from(receipt: RpcReceipt) -> Self {
        let status = match receipt.status {
            Some(status) if status.is_zero() => ReceiptStatus::Reverted,
            _ => ReceiptStatus::Mined,
        };
        let logs = receipt
            .logs
            .into_iter()
            .map(|log| LogEntry {
                address: log.address,
                topics: log.topics,
                data: log.data,
            })
            .collect();
        TransactionReceipt::new(receipt.transaction_hash, status, logs)
    }
}

fn ledger_error(err: ClientError) -> LedgerError {
    match err {
        ClientError::Call(call) => error_codes::classify(call.code(), call.message()),
        other => LedgerError::Transport(anyhow::Error::new(other)),
    }
}

pub struct JsonRpcLedger {
    client: HttpClient,
    /// Sending account, the node's first account when unset
    from: Option<Address>,
    poll_interval: Duration,
}

impl JsonRpcLedger {
    pub fn new(url: &str, poll_interval: Duration) -> anyhow::Result<Self> {
        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self {
            client,
            from: None,
            poll_interval,
        })
    }

    pub fn with_from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    async fn call(&self, contract: Address, calldata: Vec<u8>) -> Result<Bytes, LedgerError> {
        let request = json!({ "to": contract, "data": Bytes::from(calldata) });
        self.client
            .request("eth_call", rpc_params![request, "latest"])
            .await
            .map_err(ledger_error)
    }

    /// Returns the receipt if the transaction is mined.
    pub async fn receipt(&self, tx_hash: TxHash) -> Result<Option<RpcReceipt>, LedgerError> {
        self.client
            .request("eth_getTransactionReceipt", rpc_params![tx_hash])
            .await
            .map_err(ledger_error)
    }
}

#[async_trait]
impl Connection for JsonRpcLedger {
    type AdapterError = LedgerError;

    async fn chain_id(&self) -> Result<Option<u64>, Self::AdapterError> {
        let chain_id: U64 = self
            .client
            .request("eth_chainId", rpc_params![])
            .await
            .map_err(ledger_error)?;
        Ok(Some(chain_id.to::<u64>()))
    }

    async fn account(&self) -> Result<Option<Address>, Self::AdapterError> {
        if let Some(from) = self.from {
            return Ok(Some(from));
        }
        let accounts: Vec<Address> = self
            .client
            .request("eth_accounts", rpc_params![])
            .await
            .map_err(ledger_error)?;
        Ok(accounts.first().copied())
    }
}

#[async_trait]
impl PacketReader for JsonRpcLedger {
    type AdapterError = LedgerError;

    async fn packet_info(
        &self,
        contract: Address,
        packet_id: PacketId,
    ) -> Result<PacketRecord, Self::AdapterError> {
        let call = IRedPacket::getPacketInfoCall {
            packetId: packet_id.as_u256(),
        };
        let output = self.call(contract, call.abi_encode()).await?;
        let info = IRedPacket::getPacketInfoCall::abi_decode_returns(&output)
            .map_err(|err| LedgerError::Decode(err.to_string()))?;
        Ok(PacketRecord::try_from(info)?)
    }

    async fn next_packet_id(&self, contract: Address) -> Result<PacketId, Self::AdapterError> {
        let output = self
            .call(contract, IRedPacket::nextPacketIdCall {}.abi_encode())
            .await?;
        let next: U256 = IRedPacket::nextPacketIdCall::abi_decode_returns(&output)
            .map_err(|err| LedgerError::Decode(err.to_string()))?;
        Ok(PacketId::from(next))
    }

    async fn has_claimed(
        &self,
        contract: Address,
        packet_id: PacketId,
        claimer: Address,
    ) -> Result<bool, Self::AdapterError> {
        let call = IRedPacket::hasClaimedCall {
            packetId: packet_id.as_u256(),
            claimer,
        };
        let output = self.call(contract, call.abi_encode()).await?;
        IRedPacket::hasClaimedCall::abi_decode_returns(&output)
            .map_err(|err| LedgerError::Decode(err.to_string()))
    }
}

#[async_trait]
impl TransactionSender for JsonRpcLedger {
    type AdapterError = LedgerError;

    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TxHash, Self::AdapterError> {
        let transaction = json!({
            "from": request.from,
            "to": request.to,
            "data": request.call.calldata(),
            "value": request.value,
        });
        debug!("eth_sendTransaction {}", request.call.function_name());
        self.client
            .request("eth_sendTransaction", rpc_params![transaction])
            .await
            .map_err(ledger_error)
    }

    async fn await_receipt(&self, tx_hash: TxHash) -> Result<ReceiptHandle, Self::AdapterError> {
        loop {
            if let Some(receipt) = self.receipt(tx_hash).await? {
                return Ok(TransactionReceipt::from(receipt).into_handle());
            }
            debug!("Transaction {tx_hash} pending");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
