// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]

use std::{path::PathBuf, time::Duration};

use alloy::primitives::{Address, TxHash};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use packet_client::rpc::JsonRpcLedger;
use packet_core::{
    adapters::{Connection, TransactionSender},
    config::FlowConfig,
    event::RED_PACKET_EVENTS,
    flow::{
        next_packet_id, ClaimController, CreationController, FlowState, PacketForm,
        RefundController,
    },
    registry::ContractRegistry,
    view::PacketView,
    PacketId,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ethereum JSON-RPC endpoint. The node must be able to sign for the
    /// sending account.
    /// Defaults to a local Hardhat node.
    #[arg(long, default_value = "http://127.0.0.1:8545", env = "PACKET_RPC_URL")]
    rpc_url: String,

    /// Sending account. Defaults to the first account of `eth_accounts`.
    #[arg(long, env = "PACKET_FROM")]
    from: Option<Address>,

    /// RedPacket contract address, overriding the known deployment of the
    /// connected network.
    #[arg(long, env = "PACKET_CONTRACT_ADDRESS")]
    contract_address: Option<Address>,

    /// JSON file with the flow timing settings.
    #[arg(long, env = "PACKET_CONFIG")]
    config: Option<PathBuf>,

    /// Wait before re-reading a receipt that had no `PacketCreated` log.
    #[arg(long, env = "PACKET_EXTRACTION_RETRY_DELAY_MS")]
    extraction_retry_delay_ms: Option<u64>,

    /// Number of receipt re-reads when the `PacketCreated` log is missing.
    #[arg(long, env = "PACKET_EXTRACTION_RETRIES")]
    extraction_retries: Option<u32>,

    /// Interval between two receipt polls.
    #[arg(long, env = "PACKET_RECEIPT_POLL_INTERVAL_MS")]
    receipt_poll_interval_ms: Option<u64>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fund a new red packet.
    Create {
        /// Amount in ether, e.g. `0.5`.
        amount: String,
        #[arg(long, default_value = "5")]
        slots: String,
        /// Leave empty for an open packet.
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "24")]
        duration_hours: String,
    },
    /// Show a red packet.
    Query { packet_id: String },
    /// Claim a share of a red packet.
    Claim {
        packet_id: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Return the unclaimed remainder of an expired red packet.
    Refund { packet_id: String },
    /// Print the id the next created packet will get.
    NextId,
    /// List the red packet events of a mined transaction.
    Inspect { tx_hash: TxHash },
}

impl Args {
    fn flow_config(&self) -> Result<FlowConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let file = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&file)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => FlowConfig::default(),
        };
        if let Some(delay) = self.extraction_retry_delay_ms {
            config = config.with_extraction_retry_delay(Duration::from_millis(delay));
        }
        if let Some(retries) = self.extraction_retries {
            config = config.with_extraction_retries(retries);
        }
        if let Some(interval) = self.receipt_poll_interval_ms {
            config = config.with_receipt_poll_interval(Duration::from_millis(interval));
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set the log level with the RUST_LOG environment variable.
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    debug!("Settings: {:?}", args);

    let config = args.flow_config()?;
    let mut ledger = JsonRpcLedger::new(&args.rpc_url, config.receipt_poll_interval)?;
    if let Some(from) = args.from {
        ledger = ledger.with_from(from);
    }

    let mut registry = ContractRegistry::default();
    if let Some(contract) = args.contract_address {
        match ledger.chain_id().await? {
            Some(chain_id) => {
                info!("Using contract {contract} on chain {chain_id}");
                registry = registry.with_deployment(chain_id, contract);
            }
            None => warn!("No chain id reported, ignoring contract override"),
        }
    }

    match args.command {
        Command::Create {
            amount,
            slots,
            password,
            duration_hours,
        } => {
            let controller = CreationController::new(ledger, registry, config);
            controller.set_form(PacketForm {
                amount,
                total_slots: slots,
                password,
                duration_hours,
            });
            let state = controller.submit().await?;
            let outcome = finished(state)?;
            if outcome.is_partial() {
                warn!(
                    "Packet created in {} but its id could not be read",
                    outcome.tx_hash
                );
            }
            print(args.json, &outcome, || match outcome.packet_id {
                Some(packet_id) => format!("Created red packet {packet_id} ({})", outcome.tx_hash),
                None => format!(
                    "Created red packet in {}, look up its id with `next-id`",
                    outcome.tx_hash
                ),
            })
        }
        Command::Query { packet_id } => {
            let controller = ClaimController::new(ledger, registry);
            let record = controller
                .query(&packet_id)
                .await
                .ok_or_else(|| anyhow!("A request is already in flight"))??;
            let packet_id: PacketId = packet_id.parse()?;
            let view = PacketView::new(packet_id, &record);
            print(args.json, &view, || describe(&view))
        }
        Command::Claim {
            packet_id,
            password,
        } => {
            let controller = ClaimController::new(ledger, registry);
            controller
                .query(&packet_id)
                .await
                .ok_or_else(|| anyhow!("A request is already in flight"))??;
            let outcome = finished(controller.claim(&password).await?)?;
            print(args.json, &outcome, || match outcome.claimed_amount {
                Some(amount) => format!(
                    "Claimed {} ETH from red packet {} ({})",
                    packet_core::view::format_amount(amount),
                    outcome.packet_id,
                    outcome.tx_hash
                ),
                None => format!(
                    "Claimed from red packet {} ({})",
                    outcome.packet_id, outcome.tx_hash
                ),
            })
        }
        Command::Refund { packet_id } => {
            let controller = RefundController::new(ledger, registry);
            let outcome = finished(controller.refund(&packet_id).await?)?;
            print(args.json, &outcome, || match outcome.refunded_amount {
                Some(amount) => format!(
                    "Refunded {} ETH from red packet {} ({})",
                    packet_core::view::format_amount(amount),
                    outcome.packet_id,
                    outcome.tx_hash
                ),
                None => format!(
                    "Refunded red packet {} ({})",
                    outcome.packet_id, outcome.tx_hash
                ),
            })
        }
        Command::NextId => {
            let packet_id = next_packet_id(&ledger, &registry).await?;
            print(args.json, &packet_id, || packet_id.to_string())
        }
        Command::Inspect { tx_hash } => {
            let handle = ledger.await_receipt(tx_hash).await?;
            let receipt = handle.read().await;
            let events: Vec<InspectedLog> = receipt
                .logs
                .iter()
                .enumerate()
                .filter_map(|(log_index, log)| {
                    RED_PACKET_EVENTS.identify(log).map(|descriptor| InspectedLog {
                        log_index,
                        address: log.address,
                        event: descriptor.signature().to_string(),
                    })
                })
                .collect();
            print(args.json, &events, || {
                if events.is_empty() {
                    return format!("No red packet events in {tx_hash}");
                }
                events
                    .iter()
                    .map(|event| format!("#{} {} {}", event.log_index, event.address, event.event))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

#[derive(Debug, Serialize)]
struct InspectedLog {
    log_index: usize,
    address: Address,
    event: String,
}

/// Unwraps a terminal flow state.
fn finished<T>(state: Option<FlowState<T>>) -> Result<T> {
    match state {
        Some(FlowState::Succeeded(outcome)) => Ok(outcome),
        Some(FlowState::Failed(err)) => Err(err.into()),
        Some(other) => Err(anyhow!("Flow stopped in state {}", other.label())),
        None => Err(anyhow!("A request is already in flight")),
    }
}

fn print<T: Serialize>(json: bool, value: &T, human: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", human());
    }
    Ok(())
}

fn describe(view: &PacketView) -> String {
    format!(
        "Red packet {}\n  creator:   {}\n  amount:    {} / {} ETH left\n  slots:     {} / {} claimed\n  password:  {}\n  status:    {}\n  created:   {}\n  expires:   {}",
        view.packet_id,
        view.creator,
        view.remaining_amount,
        view.total_amount,
        view.claimed_slots,
        view.total_slots,
        if view.password_protected { "yes" } else { "no" },
        view.status,
        view.created_at,
        view.expires_at,
    )
}
