// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::Address;

use crate::NetworkError;

/// Resolves the RedPacket deployment of a network.
///
/// See [crate::registry::ContractRegistry] for the default implementation.
pub trait ContractResolver {
    fn resolve(&self, chain_id: u64) -> Result<Address, NetworkError>;
}
