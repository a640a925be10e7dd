// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # RedPacket ABI
//!
//! The deployed contract is fixed, so the interface is declared inline
//! instead of being loaded from an artifact.

use alloy::sol;

/// Canonical signature of the event emitted by `createPacket`.
pub const PACKET_CREATED_SIGNATURE: &str =
    "PacketCreated(uint256,address,uint256,uint256,bool,uint256)";
/// Canonical signature of the event emitted by `claimPacket`.
pub const PACKET_CLAIMED_SIGNATURE: &str = "PacketClaimed(uint256,address,uint256)";
/// Canonical signature of the event emitted by `refundPacket`.
pub const PACKET_REFUNDED_SIGNATURE: &str = "PacketRefunded(uint256,address,uint256)";

sol! {
    /// On-chain interface of the RedPacket contract
    ///
    /// Parameter names follow the deployed ABI, hence the camelCase.
    #[derive(Debug, PartialEq, Eq)]
    interface IRedPacket {
        event PacketCreated(
            uint256 indexed packetId,
            address indexed creator,
            uint256 totalAmount,
            uint256 totalPackets,
            bool isPasswordProtected,
            uint256 expiresAt
        );
        event PacketClaimed(uint256 indexed packetId, address indexed claimer, uint256 amount);
        event PacketRefunded(uint256 indexed packetId, address indexed creator, uint256 amount);

        function createPacket(
            uint256 totalPackets,
            string password,
            uint256 durationInHours
        ) external payable returns (uint256);
        function claimPacket(uint256 packetId, string password) external;
        function refundPacket(uint256 packetId) external;
        function getPacketInfo(uint256 packetId) external view returns (
            address creator,
            uint256 totalAmount,
            uint256 remainingAmount,
            uint256 totalPackets,
            uint256 claimedPackets,
            bool isPasswordProtected,
            bool isActive,
            uint256 createdAt,
            uint256 expiresAt
        );
        function hasClaimed(uint256 packetId, address claimer) external view returns (bool);
        function nextPacketId() external view returns (uint256);
    }
}
