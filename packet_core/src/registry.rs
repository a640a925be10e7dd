// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Known RedPacket deployments, keyed by chain id

use std::collections::HashMap;

use alloy::primitives::{address, Address};

use crate::{adapters::ContractResolver, NetworkError};

pub const MAINNET_CHAIN_ID: u64 = 1;
pub const HARDHAT_CHAIN_ID: u64 = 31337;
pub const SEPOLIA_CHAIN_ID: u64 = 11155111;

/// Default deployment on a local Hardhat node
pub const HARDHAT_DEPLOYMENT: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
/// Default deployment on Sepolia
pub const SEPOLIA_DEPLOYMENT: Address = address!("A9eFbD651C1a20941c8F6FFEBCeE1eC9AC75782F");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractRegistry {
    deployments: HashMap<u64, Address>,
}

impl ContractRegistry {
    /// A registry without any deployment
    pub fn empty() -> Self {
        Self {
            deployments: HashMap::new(),
        }
    }

    /// Adds or replaces the deployment of `chain_id`.
    ///
    /// Registering the zero address marks the chain as not deployed.
    pub fn with_deployment(mut self, chain_id: u64, contract: Address) -> Self {
        self.deployments.insert(chain_id, contract);
        self
    }

    pub fn deployment(&self, chain_id: u64) -> Option<Address> {
        self.deployments
            .get(&chain_id)
            .copied()
            .filter(|contract| !contract.is_zero())
    }
}

impl Default for ContractRegistry {
    fn default() -> Self {
        Self::empty()
            .with_deployment(HARDHAT_CHAIN_ID, HARDHAT_DEPLOYMENT)
            .with_deployment(SEPOLIA_CHAIN_ID, SEPOLIA_DEPLOYMENT)
    }
}

impl ContractResolver for ContractRegistry {
    fn resolve(&self, chain_id: u64) -> Result<Address, NetworkError> {
        match self.deployment(chain_id) {
            Some(contract) => Ok(contract),
            None if chain_id == MAINNET_CHAIN_ID => Err(NetworkError::Mainnet),
            None => Err(NetworkError::NotDeployed { chain_id }),
        }
    }
}
