// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context implementations.
//!
//! A context implements the ledger adapters the flows run against. The
//! `packet_client` crate provides the JSON-RPC one; this module only holds
//! [`memory::InMemoryLedger`], a simulated RedPacket contract for tests and
//! local development.
pub mod memory;
