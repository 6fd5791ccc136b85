//! Serde-serializable report shapes for both analyzer modes

use serde::Serialize;
use std::collections::BTreeMap;

use crate::script::OpReturnData;
use crate::types::{LockTimeKind, Network, RelativeTimelock, ScriptKind};

/// Structured warning attached to a transaction report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub code: WarningCode,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    HighFee,
    DustOutput,
    UnknownOutputScript,
    RbfSignaling,
    NonCanonicalSize,
}

/// Size breakdown as reported.
#[derive(Debug, Clone, Serialize)]
pub struct SizesReport {
    pub total_size: u64,
    pub non_witness_size: u64,
    pub witness_size: u64,
    pub weight: u64,
    pub vbytes: u64,
}

/// Prevout joined onto an input, when known.
#[derive(Debug, Clone, Serialize)]
pub struct PrevoutReport {
    pub value_sats: u64,
    pub kind: ScriptKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InputReport {
    pub prev_txid: String,
    pub prev_vout: u32,
    pub sequence: u32,
    pub classified_kind: ScriptKind,
    pub script_sig_asm: String,
    pub witness: Vec<String>,
    pub rbf_signals: bool,
    pub relative_timelock: Option<RelativeTimelock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevout: Option<PrevoutReport>,
    /// Disassembly of the witness script for p2wsh-style spends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_script_asm: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputReport {
    pub index: usize,
    pub value_sats: u64,
    pub classified_kind: ScriptKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub script_pubkey_hex: String,
    pub script_pubkey_asm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op_return: Option<OpReturnData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeesReport {
    pub absolute_sats: Option<i64>,
    pub rate_sat_per_vb: Option<f64>,
    pub segwit_savings_pct: Option<f64>,
}

/// Full transaction-mode report.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionReport {
    pub network: Network,
    pub txid: String,
    pub wtxid: Option<String>,
    pub version: i32,
    pub is_segwit: bool,
    pub locktime: u32,
    pub sizes: SizesReport,
    pub inputs: Vec<InputReport>,
    pub outputs: Vec<OutputReport>,
    pub fees: FeesReport,
    pub locktime_kind: LockTimeKind,
    pub warnings: Vec<Warning>,
}

/// Block header as reported (hashes in display order, bits as hex).
#[derive(Debug, Clone, Serialize)]
pub struct HeaderReport {
    pub version: i32,
    pub prev_block_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub bits: String,
    pub nonce: u32,
    pub block_hash: String,
}

/// Per-transaction line of a block report.
#[derive(Debug, Clone, Serialize)]
pub struct TxSummaryReport {
    pub index: usize,
    pub txid: String,
    pub total_out_sats: u64,
    pub fee_sats: Option<i64>,
    pub weight: u64,
    pub kinds: Vec<ScriptKind>,
}

/// Coinbase detail carried alongside the block report.
#[derive(Debug, Clone, Serialize)]
pub struct CoinbaseReport {
    pub script_hex: String,
    pub total_output_sats: u64,
}

/// Aggregates over the block's transactions.
#[derive(Debug, Clone, Serialize)]
pub struct BlockStats {
    pub total_fees_sats: i64,
    pub total_weight: u64,
    pub avg_fee_rate_sat_vb: f64,
    pub script_kind_counts: BTreeMap<String, u64>,
}

/// Full block-mode report for one block.
#[derive(Debug, Clone, Serialize)]
pub struct BlockReport {
    pub file: String,
    pub offset: u64,
    pub size: u32,
    pub header: HeaderReport,
    pub tx_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coinbase: Option<CoinbaseReport>,
    pub merkle_ok: bool,
    pub merkle_root_computed: String,
    pub tx_summary: Vec<TxSummaryReport>,
    pub stats: BlockStats,
}
