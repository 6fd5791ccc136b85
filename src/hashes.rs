//! Hashing primitives for identifiers and address derivation

use bitcoin_hashes::{sha256d, Hash as _};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// 256-bit hash in wire order.
pub type Hash = [u8; 32];

/// Double-SHA-256, the hash behind TXIDs, block hashes and Base58 checksums.
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256d::Hash::hash(data).to_byte_array()
}

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// HASH160: RIPEMD-160 over SHA-256, used for legacy address payloads.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Hex of a hash in display order (byte-reversed from wire order).
pub fn to_hex_reversed(hash: &Hash) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}
