//! # Chain Lens
//!
//! Forensic analyzer for Bitcoin on-chain data. The crate turns raw
//! byte-level artifacts — serialized transactions and Bitcoin Core's
//! on-disk block/undo files — into structured, machine-checkable reports.
//!
//! ## Architecture
//!
//! The core is a layered pipeline of pure decoders, leaves first:
//! - Byte reader and integer codecs (`reader`, `varint`)
//! - Hashing primitives (`hashes`)
//! - Transaction decoder with offset-tracked identifiers (`transaction`)
//! - Script classification and disassembly (`script`, `opcodes`)
//! - Address derivation (`address`)
//! - Policy analysis and report assembly (`analysis`)
//! - Block and undo file decoding (`block`, `undo`)
//!
//! Every decoder is a pure function over a borrowed byte buffer; no I/O
//! happens below the orchestration layer, no signatures are validated,
//! and no Script is ever executed.
//!
//! ## Usage
//!
//! ```rust
//! use chain_lens::ChainLens;
//!
//! // 1-in/1-out legacy transaction, assembled for the example
//! let mut raw = Vec::new();
//! raw.extend_from_slice(&1i32.to_le_bytes());
//! raw.push(1);
//! raw.extend_from_slice(&[0x11; 32]);
//! raw.extend_from_slice(&0u32.to_le_bytes());
//! raw.push(0);
//! raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
//! raw.push(1);
//! raw.extend_from_slice(&1000u64.to_le_bytes());
//! raw.push(25);
//! raw.extend_from_slice(&[0x76, 0xa9, 0x14]);
//! raw.extend_from_slice(&[0x22; 20]);
//! raw.extend_from_slice(&[0x88, 0xac]);
//! raw.extend_from_slice(&0u32.to_le_bytes());
//!
//! let lens = ChainLens::new();
//! let report = lens.analyze_transaction_hex(&hex::encode(&raw)).unwrap();
//! assert!(!report.is_segwit);
//! assert_eq!(report.outputs[0].classified_kind.as_str(), "p2pkh");
//! ```

pub mod address;
pub mod analysis;
pub mod block;
pub mod constants;
pub mod error;
pub mod hashes;
pub mod opcodes;
pub mod reader;
pub mod report;
pub mod script;
pub mod transaction;
pub mod types;
pub mod undo;
pub mod varint;

pub use error::{LensError, Result};
pub use types::{Network, ScriptKind};

use std::path::Path;

use analysis::{PrevoutSpec, TxFixture};
use block::BlockAnalysisOptions;
use report::{BlockReport, TransactionReport};

/// Facade over the two analyzer modes, carrying the network parameter.
///
/// # Examples
///
/// ```
/// use chain_lens::{ChainLens, Network};
///
/// let mainnet = ChainLens::new();
/// let testnet = ChainLens::with_network(Network::Testnet);
/// assert_ne!(mainnet.network(), testnet.network());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ChainLens {
    network: Network,
}

impl ChainLens {
    /// Mainnet analyzer.
    pub fn new() -> Self {
        ChainLens {
            network: Network::Mainnet,
        }
    }

    /// Analyzer for an explicit network.
    pub fn with_network(network: Network) -> Self {
        ChainLens { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Analyze a raw transaction hex string without prevout context.
    pub fn analyze_transaction_hex(&self, raw_hex: &str) -> Result<TransactionReport> {
        analysis::analyze_transaction(raw_hex, &[], self.network)
    }

    /// Analyze a raw transaction with known prevouts.
    pub fn analyze_transaction(
        &self,
        raw_hex: &str,
        prevouts: &[PrevoutSpec],
    ) -> Result<TransactionReport> {
        analysis::analyze_transaction(raw_hex, prevouts, self.network)
    }

    /// Analyze a fixture document (the fixture's own network field wins).
    pub fn analyze_fixture(&self, fixture: &TxFixture) -> Result<TransactionReport> {
        analysis::analyze_fixture(fixture)
    }

    /// Analyze a block file with its undo and XOR-key companions.
    pub fn analyze_block_file(
        &self,
        blk_path: &Path,
        rev_path: &Path,
        xor_path: &Path,
    ) -> Result<Vec<BlockReport>> {
        block::analyze_block_file(blk_path, rev_path, xor_path, &BlockAnalysisOptions::default())
    }
}

impl Default for ChainLens {
    fn default() -> Self {
        Self::new()
    }
}
