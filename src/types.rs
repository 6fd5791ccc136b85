//! Core record types produced by the decoders
//!
//! Records are built in a single decoder pass and are read-only afterward.
//! Hash-typed fields hold wire order internally; display and serialization
//! reverse them, as Bitcoin tooling conventionally does.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::{LensError, Result};
use crate::hashes::{to_hex_reversed, Hash};

/// Transaction identifier (wire order; displayed reversed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Txid(pub [u8; 32]);

/// Block identifier (wire order; displayed reversed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockHash(pub [u8; 32]);

impl Txid {
    /// Parse a display-order hex string into wire order.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(LensError::InvalidHex(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        hash.reverse();
        Ok(Txid(hash))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex_reversed(&self.0))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex_reversed(&self.0))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Which chain the analyzer derives addresses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

/// Closed set of script shapes the classifier recognizes.
///
/// Output classification only ever yields the first nine variants; the
/// remaining four are input-side refinements that need the prevout script
/// and the witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    P2pk,
    P2pkh,
    P2sh,
    P2wpkh,
    P2wsh,
    P2tr,
    Multisig,
    OpReturn,
    Unknown,
    P2shP2wpkh,
    P2shP2wsh,
    P2trKeypath,
    P2trScriptpath,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::P2pk => "p2pk",
            ScriptKind::P2pkh => "p2pkh",
            ScriptKind::P2sh => "p2sh",
            ScriptKind::P2wpkh => "p2wpkh",
            ScriptKind::P2wsh => "p2wsh",
            ScriptKind::P2tr => "p2tr",
            ScriptKind::Multisig => "multisig",
            ScriptKind::OpReturn => "op_return",
            ScriptKind::Unknown => "unknown",
            ScriptKind::P2shP2wpkh => "p2sh_p2wpkh",
            ScriptKind::P2shP2wsh => "p2sh_p2wsh",
            ScriptKind::P2trKeypath => "p2tr_keypath",
            ScriptKind::P2trScriptpath => "p2tr_scriptpath",
        }
    }
}

/// Witness data for one input.
///
/// Legacy inputs have no witness at all; a segwit transaction carries one
/// stack per input, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Witness {
    Legacy,
    Segwit(Vec<Vec<u8>>),
}

impl Witness {
    /// The stack items, empty for legacy inputs.
    pub fn items(&self) -> &[Vec<u8>] {
        match self {
            Witness::Legacy => &[],
            Witness::Segwit(items) => items,
        }
    }
}

impl Serialize for Witness {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let items = self.items();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&hex::encode(item))?;
        }
        seq.end()
    }
}

/// Serialized-size breakdown of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxSizes {
    pub total_size: u64,
    pub non_witness_size: u64,
    pub witness_size: u64,
    pub weight: u64,
    pub vbytes: u64,
}

/// A decoded transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub prev_txid: Txid,
    pub prev_vout: u32,
    pub script_sig: Vec<u8>,
    pub witness: Witness,
    pub sequence: u32,
}

impl Input {
    /// Coinbase inputs spend the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.prev_txid.0 == [0u8; 32] && self.prev_vout == 0xFFFFFFFF
    }
}

/// A decoded transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub value_sats: u64,
    pub script_pubkey: Vec<u8>,
    pub kind: ScriptKind,
}

/// Fully decoded transaction with identifier and size metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub version: i32,
    pub is_segwit: bool,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
    pub txid: Txid,
    /// Defined only for segwit transactions.
    pub wtxid: Option<Txid>,
    pub sizes: TxSizes,
    /// Offsets of non-minimal CompactSize encodings in the raw bytes.
    pub non_canonical_sizes: Vec<usize>,
}

impl TransactionRecord {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }
}

/// Fast-path transaction summary for block mode.
///
/// Shares the layout pass with the full decoder but materializes only the
/// fields block reports need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummaryRecord {
    pub txid: Txid,
    pub version: i32,
    pub weight: u64,
    pub vbytes: u64,
    pub num_inputs: usize,
    pub output_values: Vec<u64>,
    pub output_kinds: Vec<ScriptKind>,
    /// Present only when the first input spends the null outpoint.
    pub coinbase_script_sig: Option<Vec<u8>>,
}

impl TxSummaryRecord {
    pub fn total_output_sats(&self) -> u64 {
        self.output_values.iter().sum()
    }
}

/// Parsed 80-byte block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeaderRecord {
    pub version: i32,
    pub prev_block_hash: BlockHash,
    /// Wire order; compare against the recomputed tree root directly.
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub block_hash: BlockHash,
}

/// One prevout recovered from undo data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredPrevout {
    pub height: u32,
    pub is_coinbase: bool,
    pub amount_sats: u64,
    pub script_pubkey: Vec<u8>,
}

/// Interpretation of an absolute lock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockTimeKind {
    None,
    BlockHeight(u32),
    UnixTime(u32),
}

impl LockTimeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockTimeKind::None => "none",
            LockTimeKind::BlockHeight(_) => "block_height",
            LockTimeKind::UnixTime(_) => "unix_timestamp",
        }
    }
}

impl Serialize for LockTimeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// BIP68 relative lock for one input (absent when bit 31 disables it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelativeTimelock {
    pub kind: RelativeLockKind,
    /// Block count, or seconds for time-based locks.
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeLockKind {
    Blocks,
    Time,
}
