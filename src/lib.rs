//! RelayChain - a minimal proof-of-work ledger relayed through a coordinator
//!
//! # Architecture
//!
//! A coordinator holds the authoritative chain and a registry of live peers.
//! Producers connect over WebSocket, cache the chain, mine a block for every
//! relayed transaction and submit it back; the coordinator validates, appends
//! and rebroadcasts the chain.
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, canonical hashing, chain store and validation
//! - [`transaction`] - Transaction value type
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search and mining worker
//!
//! ## Networking
//! - [`protocol`] - JSON wire messages
//! - [`network`] - Connection registry and WebSocket transport
//! - [`coordinator`] - Inbound message dispatch on the coordinator
//! - [`producer`] - Producer state and client loop
//!
//! ## Integration
//! - [`node`] - Coordinator process orchestration and tracing setup
//! - `api` - Read-only HTTP status API (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Networking
// ============================================================================
pub mod coordinator;
pub mod network;
pub mod producer;
pub mod protocol;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
