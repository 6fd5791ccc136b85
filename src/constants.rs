//! Wire constants, policy thresholds, and decoder caps

/// Network magic prefixing each block in a blk*.dat / rev*.dat file (mainnet).
pub const BLOCK_MAGIC: [u8; 4] = [0xf9, 0xbe, 0xb4, 0xd9];

/// Serialized block header length.
pub const HEADER_SIZE: usize = 80;

/// Segwit serialization marker and flag bytes.
pub const SEGWIT_MARKER: u8 = 0x00;
pub const SEGWIT_FLAG: u8 = 0x01;

/// Soft cap on input count; a DoS guard for hostile buffers, not consensus.
pub const MAX_DECODED_INPUTS: u64 = 100_000;

/// Soft cap on output count; a DoS guard for hostile buffers, not consensus.
pub const MAX_DECODED_OUTPUTS: u64 = 100_000;

/// Lock times below this are block heights, at or above it unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Any input sequence below this signals opt-in replace-by-fee (BIP125).
pub const SEQUENCE_RBF_THRESHOLD: u32 = 0xFFFFFFFE;

/// BIP68: bit 31 disables the relative lock for that input.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 0x8000_0000;

/// BIP68: bit 22 selects time-based (512-second units) over block-based.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 0x0040_0000;

/// BIP68: low 16 bits carry the lock value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000_FFFF;

/// Time-based relative locks count in units of 512 seconds.
pub const SEQUENCE_LOCKTIME_GRANULARITY: u32 = 512;

/// Fee rate above which a HIGH_FEE warning is emitted (sat/vB).
pub const HIGH_FEE_RATE_SAT_VB: f64 = 1000.0;

/// Dust relay threshold for legacy output kinds (satoshis).
pub const DUST_THRESHOLD_LEGACY: u64 = 546;

/// Dust relay threshold for p2wpkh outputs (satoshis).
pub const DUST_THRESHOLD_P2WPKH: u64 = 294;

/// Dust relay threshold for p2wsh and p2tr outputs (satoshis).
pub const DUST_THRESHOLD_WITNESS_32: u64 = 330;

/// Base58Check version byte for p2pkh, mainnet.
pub const BASE58_VERSION_P2PKH_MAINNET: u8 = 0x00;

/// Base58Check version byte for p2sh, mainnet.
pub const BASE58_VERSION_P2SH_MAINNET: u8 = 0x05;

/// Base58Check version byte for p2pkh, testnet.
pub const BASE58_VERSION_P2PKH_TESTNET: u8 = 0x6F;

/// Base58Check version byte for p2sh, testnet.
pub const BASE58_VERSION_P2SH_TESTNET: u8 = 0xC4;

/// Bech32 human-readable parts.
pub const BECH32_HRP_MAINNET: &str = "bc";
pub const BECH32_HRP_TESTNET: &str = "tb";

/// OP_RETURN protocol prefixes recognized by the payload sniffer.
pub const OP_RETURN_PREFIX_OMNI: &[u8] = &[0x6f, 0x6d, 0x6e, 0x69];
pub const OP_RETURN_PREFIX_OPENTIMESTAMPS: &[u8] = &[0x01, 0x09, 0xf9, 0x11, 0x02];
