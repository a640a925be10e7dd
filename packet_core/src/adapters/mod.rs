// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ledger adapters for the red packet flows.
//!
//! The flows never talk to a node directly. Everything they need from the
//! ledger (the connected account, read calls, write calls and receipts) goes
//! through these traits, so the same controllers drive a JSON-RPC node, a
//! wallet bridge or the in-memory ledger used in tests.
//!
//! Adapter errors must convert into [`crate::LedgerError`]: the flows classify
//! them (a revert on a claim is a rejection, anything else is a submission
//! failure) and cannot do so with an opaque error type.

mod connection;
mod reader;
mod resolver;
mod sender;

pub use connection::Connection;
pub use reader::PacketReader;
pub use resolver::ContractResolver;
pub use sender::TransactionSender;
