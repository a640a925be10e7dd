// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0
#![doc = include_str!("../README.md")]
//! ## Getting started
//!
//! Implement the [`adapters`] for your ledger client (or use the
//! `in_memory` context while developing), then drive packets through the
//! controllers of the [`flow`] module and render the results with [`view`].

pub mod adapters;
pub mod config;
#[cfg(feature = "in_memory")]
pub mod context;
mod error;
pub mod event;
pub mod flow;
pub mod receipt;
pub mod registry;
pub mod view;

pub use error::{Error, ErrorKind, FlowError, LedgerError, NetworkError, Result, ValidationError};
pub use packet_contract::{PacketCall, PacketId, PacketRecord};
