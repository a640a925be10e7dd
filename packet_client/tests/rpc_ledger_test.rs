// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy::{
    primitives::{address, keccak256, utils::parse_ether, Address, Bytes, TxHash, U256, U64},
    sol_types::{SolCall, SolEvent},
};
use jsonrpsee::{
    core::RpcResult,
    proc_macros::rpc,
    server::{Server, ServerHandle},
    types::{ErrorObject, ErrorObjectOwned},
};
use packet_client::rpc::{JsonRpcLedger, RpcLog, RpcReceipt};
use packet_contract::IRedPacket;
use packet_core::{
    config::FlowConfig,
    flow::{next_packet_id, ClaimController, CreationController, FlowState, PacketForm},
    registry::{ContractRegistry, HARDHAT_DEPLOYMENT},
    ErrorKind, PacketId,
};
use rstest::*;
use serde_json::Value;

const ACCOUNT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const NEXT_PACKET_ID: u64 = 3;

#[rpc(server)]
trait EthNode {
    #[method(name = "eth_chainId")]
    fn chain_id(&self) -> RpcResult<U64>;

    #[method(name = "eth_accounts")]
    fn accounts(&self) -> RpcResult<Vec<Address>>;

    #[method(name = "eth_call")]
    fn call(&self, request: Value, block: String) -> RpcResult<Bytes>;

    #[method(name = "eth_sendTransaction")]
    fn send_transaction(&self, transaction: Value) -> RpcResult<TxHash>;

    #[method(name = "eth_getTransactionReceipt")]
    fn transaction_receipt(&self, tx_hash: TxHash) -> RpcResult<Option<RpcReceipt>>;
}

/// Hardhat-like node with one open packet (id 1) and `createPacket` support
#[derive(Clone, Default)]
struct MockNode {
    reject_sends: bool,
    sent: Arc<Mutex<Vec<Value>>>,
    receipt_polls: Arc<Mutex<u32>>,
}

fn invalid(message: impl ToString) -> ErrorObjectOwned {
    ErrorObject::owned(-32602, message.to_string(), None::<()>)
}

fn open_packet() -> IRedPacket::getPacketInfoReturn {
    IRedPacket::getPacketInfoReturn {
        creator: ACCOUNT,
        totalAmount: parse_ether("1").unwrap(),
        remainingAmount: parse_ether("0.5").unwrap(),
        totalPackets: U256::from(4u64),
        claimedPackets: U256::from(2u64),
        isPasswordProtected: false,
        isActive: true,
        createdAt: U256::from(1_700_000_000u64),
        expiresAt: U256::from(1_700_086_400u64),
    }
}

impl EthNodeServer for MockNode {
    fn chain_id(&self) -> RpcResult<U64> {
        Ok(U64::from(31337u64))
    }

    fn accounts(&self) -> RpcResult<Vec<Address>> {
        Ok(vec![ACCOUNT])
    }

    fn call(&self, request: Value, _block: String) -> RpcResult<Bytes> {
        let data: Bytes = serde_json::from_value(request["data"].clone()).map_err(invalid)?;
        let selector = data.get(..4).ok_or_else(|| invalid("missing selector"))?;
        let output = if selector == &IRedPacket::nextPacketIdCall::SELECTOR[..] {
            IRedPacket::nextPacketIdCall::abi_encode_returns(&U256::from(NEXT_PACKET_ID))
        } else if selector == &IRedPacket::getPacketInfoCall::SELECTOR[..] {
            let call = IRedPacket::getPacketInfoCall::abi_decode(&data).map_err(invalid)?;
            if call.packetId != U256::from(1u64) {
                return Err(ErrorObject::owned(
                    3,
                    "execution reverted: Packet does not exist",
                    None::<()>,
                ));
            }
            IRedPacket::getPacketInfoCall::abi_encode_returns(&open_packet())
        } else if selector == &IRedPacket::hasClaimedCall::SELECTOR[..] {
            IRedPacket::hasClaimedCall::abi_encode_returns(&false)
        } else {
            return Err(invalid("unknown selector"));
        };
        Ok(Bytes::from(output))
    }

    fn send_transaction(&self, transaction: Value) -> RpcResult<TxHash> {
        if self.reject_sends {
            return Err(ErrorObject::owned(
                4001,
                "User denied transaction signature.",
                None::<()>,
            ));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(transaction);
        Ok(keccak256(sent.len().to_be_bytes()))
    }

    fn transaction_receipt(&self, tx_hash: TxHash) -> RpcResult<Option<RpcReceipt>> {
        let mut polls = self.receipt_polls.lock().unwrap();
        *polls += 1;
        // the first poll sees the transaction still pending
        if *polls == 1 {
            return Ok(None);
        }
        let created = IRedPacket::PacketCreated {
            packetId: U256::from(NEXT_PACKET_ID),
            creator: ACCOUNT,
            totalAmount: parse_ether("1").unwrap(),
            totalPackets: U256::from(5u64),
            isPasswordProtected: false,
            expiresAt: U256::from(1_700_086_400u64),
        }
        .encode_log_data();
        Ok(Some(RpcReceipt {
            transaction_hash: tx_hash,
            status: Some(U64::from(1u64)),
            logs: vec![RpcLog {
                address: HARDHAT_DEPLOYMENT,
                topics: created.topics().to_vec(),
                data: created.data,
            }],
        }))
    }
}

async fn start(node: MockNode) -> (ServerHandle, JsonRpcLedger) {
    let server = Server::builder().build("127.0.0.1:0").await.unwrap();
    let local_addr = server.local_addr().unwrap();
    let handle = server.start(node.into_rpc());
    let ledger = JsonRpcLedger::new(
        &format!("http://127.0.0.1:{}", local_addr.port()),
        Duration::from_millis(10),
    )
    .unwrap();
    (handle, ledger)
}

#[fixture]
fn node() -> MockNode {
    MockNode::default()
}

#[rstest]
#[tokio::test]
async fn create_over_json_rpc(node: MockNode) {
    let (handle, ledger) = start(node.clone()).await;
    let controller = CreationController::new(
        ledger,
        ContractRegistry::default(),
        FlowConfig::default().with_extraction_retry_delay(Duration::from_millis(10)),
    );
    controller.set_form(PacketForm {
        amount: "1".to_string(),
        ..PacketForm::default()
    });

    let state = controller.submit().await.unwrap().unwrap();

    let outcome = match state {
        FlowState::Succeeded(outcome) => outcome,
        other => panic!("creation did not succeed: {other:?}"),
    };
    assert_eq!(outcome.packet_id, Some(PacketId::from(NEXT_PACKET_ID)));
    assert_eq!(*node.receipt_polls.lock().unwrap(), 2);

    let sent = node.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let from: Address = serde_json::from_value(sent[0]["from"].clone()).unwrap();
    let to: Address = serde_json::from_value(sent[0]["to"].clone()).unwrap();
    let value: U256 = serde_json::from_value(sent[0]["value"].clone()).unwrap();
    let data: Bytes = serde_json::from_value(sent[0]["data"].clone()).unwrap();
    assert_eq!(from, ACCOUNT);
    assert_eq!(to, HARDHAT_DEPLOYMENT);
    assert_eq!(value, parse_ether("1").unwrap());
    let call = IRedPacket::createPacketCall::abi_decode(&data).unwrap();
    assert_eq!(call.totalPackets, U256::from(5u64));
    assert_eq!(call.durationInHours, U256::from(24u64));

    handle.stop().unwrap();
}

#[rstest]
#[tokio::test]
async fn wallet_rejection_is_a_submission_error(mut node: MockNode) {
    node.reject_sends = true;
    let (handle, ledger) = start(node.clone()).await;
    let controller =
        CreationController::new(ledger, ContractRegistry::default(), FlowConfig::default());
    controller.set_form(PacketForm {
        amount: "1".to_string(),
        ..PacketForm::default()
    });

    let state = controller.submit().await.unwrap().unwrap();

    let err = state.failed().unwrap();
    assert_eq!(err.kind(), ErrorKind::Submission);
    assert!(err.to_string().contains("User denied transaction signature."));
    assert_eq!(controller.form().amount, "1");
    assert_eq!(*node.receipt_polls.lock().unwrap(), 0);

    handle.stop().unwrap();
}

#[rstest]
#[tokio::test]
async fn query_decodes_packet_info(node: MockNode) {
    let (handle, ledger) = start(node).await;
    let controller = ClaimController::new(ledger, ContractRegistry::default());

    let record = controller.query("1").await.unwrap().unwrap();

    assert_eq!(record.creator, ACCOUNT);
    assert_eq!(record.remaining_amount, parse_ether("0.5").unwrap());
    assert_eq!(record.remaining_slots(), 2);
    assert!(controller.can_claim(""));
    assert!(!controller.already_claimed().await.unwrap());

    handle.stop().unwrap();
}

#[rstest]
#[tokio::test]
async fn reverted_read_is_a_read_error(node: MockNode) {
    let (handle, ledger) = start(node).await;
    let controller = ClaimController::new(ledger, ContractRegistry::default());

    let err = controller.query("42").await.unwrap().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Read);
    assert!(err.to_string().contains("Packet does not exist"));
    assert_eq!(controller.cached(), None);

    handle.stop().unwrap();
}

#[rstest]
#[tokio::test]
async fn next_packet_id_over_json_rpc(node: MockNode) {
    let (handle, ledger) = start(node).await;

    let next = next_packet_id(&ledger, &ContractRegistry::default())
        .await
        .unwrap();

    assert_eq!(next, PacketId::from(NEXT_PACKET_ID));

    handle.stop().unwrap();
}
