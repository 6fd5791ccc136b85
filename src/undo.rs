//! Bitcoin Core undo-stream decoding (rev*.dat)
//!
//! Undo data stores, for every non-coinbase transaction in a block, the
//! prevouts its inputs consumed: height/coinbase flag, a compressed
//! amount, and a compressed scriptPubKey. The script compression replaces
//! common templates with short tags; uncompressed-key p2pk entries store
//! only the x coordinate and must be lifted back onto the curve.

use secp256k1::PublicKey;

use crate::error::{LensError, Result};
use crate::reader::ByteCursor;
use crate::types::RecoveredPrevout;
use crate::varint::{decompress_amount, read_core_varint};

/// Recover the y coordinate of a compressed secp256k1 point.
///
/// `parity_odd` selects the sign of y. Fails with `CurvePointInvalid`
/// when x is not the abscissa of any curve point.
pub fn lift_x(x: &[u8; 32], parity_odd: bool) -> Result<[u8; 65]> {
    let mut compressed = [0u8; 33];
    compressed[0] = if parity_odd { 0x03 } else { 0x02 };
    compressed[1..].copy_from_slice(x);
    let key = PublicKey::from_slice(&compressed).map_err(|_| LensError::CurvePointInvalid)?;
    Ok(key.serialize_uncompressed())
}

/// Reconstruct a scriptPubKey from its compressed form.
///
/// | nSize | reconstruction |
/// |---|---|
/// | 0 | p2pkh around a 20-byte hash |
/// | 1 | p2sh around a 20-byte hash |
/// | 2, 3 | p2pk with the compressed key `(nSize) x` |
/// | 4, 5 | p2pk with the key lifted to its uncompressed form |
/// | >= 6 | literal script of `nSize - 6` bytes |
pub fn decompress_script(cursor: &mut ByteCursor, n_size: u64) -> Result<Vec<u8>> {
    match n_size {
        0 => {
            let hash = cursor.read(20)?;
            let mut script = Vec::with_capacity(25);
            script.extend_from_slice(&[0x76, 0xa9, 0x14]);
            script.extend_from_slice(hash);
            script.extend_from_slice(&[0x88, 0xac]);
            Ok(script)
        }
        1 => {
            let hash = cursor.read(20)?;
            let mut script = Vec::with_capacity(23);
            script.extend_from_slice(&[0xa9, 0x14]);
            script.extend_from_slice(hash);
            script.push(0x87);
            Ok(script)
        }
        2 | 3 => {
            let key = cursor.read(32)?;
            let mut script = Vec::with_capacity(35);
            script.push(0x21);
            script.push(n_size as u8);
            script.extend_from_slice(key);
            script.push(0xac);
            Ok(script)
        }
        4 | 5 => {
            let mut x = [0u8; 32];
            x.copy_from_slice(cursor.read(32)?);
            let key = lift_x(&x, n_size == 5)?;
            let mut script = Vec::with_capacity(67);
            script.push(0x41);
            script.extend_from_slice(&key);
            script.push(0xac);
            Ok(script)
        }
        _ => {
            let len = (n_size - 6) as usize;
            Ok(cursor.read(len)?.to_vec())
        }
    }
}

/// Decode one compressed prevout entry.
fn read_prevout(cursor: &mut ByteCursor) -> Result<RecoveredPrevout> {
    let code = read_core_varint(cursor)?;
    let height = (code >> 1) as u32;
    let is_coinbase = code & 1 == 1;

    // legacy per-txout version field, retained by Core for compatibility
    if height > 0 {
        let _version = read_core_varint(cursor)?;
    }

    let compressed_amount = read_core_varint(cursor)?;
    let amount_sats = decompress_amount(compressed_amount);

    let n_size = read_core_varint(cursor)?;
    let script_pubkey = decompress_script(cursor, n_size)?;

    Ok(RecoveredPrevout {
        height,
        is_coinbase,
        amount_sats,
        script_pubkey,
    })
}

/// Decode the undo stream for one block.
///
/// Returns one prevout list per non-coinbase transaction, in block order.
pub fn parse_block_undo(data: &[u8]) -> Result<Vec<Vec<RecoveredPrevout>>> {
    let mut cursor = ByteCursor::new(data);
    let num_tx = cursor.read_compact_size()?;

    let mut per_tx = Vec::with_capacity(num_tx as usize);
    for _ in 0..num_tx {
        let num_inputs = cursor.read_compact_size()?;
        let mut prevouts = Vec::with_capacity(num_inputs as usize);
        for _ in 0..num_inputs {
            prevouts.push(read_prevout(&mut cursor)?);
        }
        per_tx.push(prevouts);
    }
    Ok(per_tx)
}
