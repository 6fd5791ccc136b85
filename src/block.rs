//! Bitcoin Core block-file parsing and per-block analysis
//!
//! Block files (`blk*.dat`) and undo files (`rev*.dat`) are XOR-scrambled
//! on disk and framed as `magic || size || payload`. Analysis runs in
//! passes: descramble, enumerate block and transaction spans, decode the
//! undo streams, pair them to blocks by non-coinbase transaction count,
//! then assemble one report per block.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

use crate::constants::{BLOCK_MAGIC, HEADER_SIZE};
use crate::error::{LensError, Result};
use crate::hashes::{double_sha256, to_hex_reversed, Hash};
use crate::reader::ByteCursor;
use crate::report::{
    BlockReport, BlockStats, CoinbaseReport, HeaderReport, TxSummaryReport,
};
use crate::transaction::{decode_transaction_summary, scan_transaction};
use crate::types::{BlockHash, BlockHeaderRecord, RecoveredPrevout};
use crate::undo::parse_block_undo;

/// Apply the cyclic XOR key Bitcoin Core scrambles its block files with.
///
/// An empty or all-zero key leaves the data untouched.
pub fn xor_descramble(data: &mut [u8], key: &[u8]) {
    if key.is_empty() || key.iter().all(|&b| b == 0) {
        return;
    }
    for (offset, byte) in data.iter_mut().enumerate() {
        *byte ^= key[offset % key.len()];
    }
}

/// Compute a merkle root by pairwise double-SHA-256.
///
/// Odd levels duplicate their last hash; an empty list yields the all-zero
/// root.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut concat = [0u8; 64];
                concat[..32].copy_from_slice(&pair[0]);
                concat[32..].copy_from_slice(&pair[1]);
                double_sha256(&concat)
            })
            .collect();
    }
    level[0]
}

/// Parse the 80-byte header at the cursor position.
pub fn parse_block_header(cursor: &mut ByteCursor) -> Result<BlockHeaderRecord> {
    let start = cursor.tell();
    let version = cursor.read_i32()?;
    let prev_block_hash = cursor.read_hash()?;
    let merkle_root = cursor.read_hash()?;
    let timestamp = cursor.read_u32()?;
    let bits = cursor.read_u32()?;
    let nonce = cursor.read_u32()?;
    let header_bytes = cursor.slice(start, start + HEADER_SIZE)?;
    Ok(BlockHeaderRecord {
        version,
        prev_block_hash: BlockHash(prev_block_hash),
        merkle_root,
        timestamp,
        bits,
        nonce,
        block_hash: BlockHash(double_sha256(header_bytes)),
    })
}

/// Decode the BIP34 height commitment from a coinbase scriptSig.
///
/// The height is a minimal-integer push at the very start of the script;
/// only defined for block version >= 2.
pub fn decode_bip34_height(script_sig: &[u8]) -> Option<u32> {
    let push_len = *script_sig.first()? as usize;
    if push_len == 0 || push_len > 8 || push_len + 1 > script_sig.len() {
        return None;
    }
    let mut height: u64 = 0;
    for (i, &byte) in script_sig[1..1 + push_len].iter().enumerate() {
        height |= (byte as u64) << (8 * i);
    }
    u32::try_from(height).ok()
}

/// Span of one enumerated block inside the descrambled buffer.
#[derive(Debug, Clone)]
pub struct BlockSpan {
    /// Offset of the block payload (after magic and size).
    pub offset: usize,
    pub size: u32,
    pub tx_count: u64,
    /// `(start, end)` span of each transaction.
    pub tx_spans: Vec<(usize, usize)>,
}

/// Pass 1: enumerate blocks by their magic framing.
///
/// Zero padding between blocks is skipped (Core preallocates file space);
/// any other non-magic byte ends the scan.
pub fn enumerate_blocks(data: &[u8]) -> Result<Vec<BlockSpan>> {
    let mut spans = Vec::new();
    let mut pos = 0;

    while pos + 8 <= data.len() {
        if data[pos..pos + 4] != BLOCK_MAGIC {
            if data[pos] == 0 {
                pos += 1;
                continue;
            }
            break;
        }

        let mut cursor = ByteCursor::new(data);
        cursor.seek(pos + 4)?;
        let size = cursor.read_u32()?;
        let payload_start = cursor.tell();

        cursor.read(HEADER_SIZE)?;
        let tx_count = cursor.read_compact_size()?;
        let mut tx_spans = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            tx_spans.push(scan_transaction(&mut cursor)?);
        }

        spans.push(BlockSpan {
            offset: payload_start,
            size,
            tx_count,
            tx_spans,
        });
        pos = payload_start + size as usize;
    }

    Ok(spans)
}

/// Undo payloads extracted from a rev*.dat buffer, keyed by position.
struct RevBlock {
    /// Number of per-transaction undo entries (non-coinbase tx count).
    tx_undo_count: u64,
    data: Vec<u8>,
}

/// Pass 2: split a rev*.dat buffer into per-block undo payloads.
///
/// Each frame is `magic || size || payload || 32-byte checksum`; only the
/// leading CompactSize of the payload is inspected here.
fn enumerate_rev_blocks(data: &[u8]) -> Result<Vec<RevBlock>> {
    let mut blocks = Vec::new();
    let mut cursor = ByteCursor::new(data);

    while cursor.remaining() >= 8 {
        let magic = cursor.peek(4);
        if magic != BLOCK_MAGIC {
            break;
        }
        cursor.read(4)?;
        let size = cursor.read_u32()? as usize;
        let payload_start = cursor.tell();
        let payload = cursor.read(size)?.to_vec();
        if cursor.remaining() >= 32 {
            cursor.read(32)?; // dSHA256 checksum over the payload
        }

        let mut count_cursor = ByteCursor::new(&payload);
        let tx_undo_count = count_cursor.read_compact_size().map_err(|_| {
            LensError::UndoMismatch(format!(
                "undo frame at offset {} has no transaction count",
                payload_start
            ))
        })?;
        blocks.push(RevBlock {
            tx_undo_count,
            data: payload,
        });
    }

    Ok(blocks)
}

/// Pass 3: pair undo payloads to blocks by non-coinbase transaction count.
///
/// Returns, per block, the index of its undo payload (None for blocks
/// with only a coinbase). Emits a diagnostic when several unused payloads
/// share a count and the pairing is therefore ambiguous.
fn pair_rev_blocks(blocks: &[BlockSpan], rev_blocks: &[RevBlock]) -> Result<Vec<Option<usize>>> {
    let mut by_count: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (index, rev) in rev_blocks.iter().enumerate() {
        by_count.entry(rev.tx_undo_count).or_default().push(index);
    }

    let mut used = vec![false; rev_blocks.len()];
    let mut pairing = Vec::with_capacity(blocks.len());

    for (block_index, block) in blocks.iter().enumerate() {
        let non_coinbase = block.tx_count.saturating_sub(1);
        if non_coinbase == 0 {
            pairing.push(None);
            continue;
        }
        let candidates = by_count.get(&non_coinbase).map_or(&[][..], |v| &v[..]);
        let unused: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&i| !used[i])
            .collect();
        if unused.len() > 1 {
            warn!(
                block_index,
                non_coinbase, "ambiguous undo pairing: {} candidate payloads", unused.len()
            );
        }
        match unused.first() {
            Some(&rev_index) => {
                used[rev_index] = true;
                pairing.push(Some(rev_index));
            }
            None => {
                return Err(LensError::UndoMismatch(format!(
                    "no undo payload with {} entries for block {}",
                    non_coinbase, block_index
                )));
            }
        }
    }

    Ok(pairing)
}

/// Options for a block-file analysis run.
#[derive(Debug, Clone, Default)]
pub struct BlockAnalysisOptions {
    /// Stop between blocks once this instant has passed; already-finished
    /// reports are returned.
    pub deadline: Option<Instant>,
}

/// Analyze a block file with its undo and XOR-key companions.
pub fn analyze_block_file(
    blk_path: &Path,
    rev_path: &Path,
    xor_path: &Path,
    options: &BlockAnalysisOptions,
) -> Result<Vec<BlockReport>> {
    let read = |path: &Path| {
        std::fs::read(path).map_err(|e| {
            LensError::InvalidEncoding(format!("cannot read {}: {}", path.display(), e))
        })
    };
    let xor_key = read(xor_path)?;
    let mut blk_data = read(blk_path)?;
    let mut rev_data = read(rev_path)?;
    xor_descramble(&mut blk_data, &xor_key);
    xor_descramble(&mut rev_data, &xor_key);

    let file_name = blk_path.display().to_string();
    analyze_block_buffers(&blk_data, &rev_data, &file_name, options)
}

/// Analyze already-descrambled block and undo buffers.
pub fn analyze_block_buffers(
    blk_data: &[u8],
    rev_data: &[u8],
    file_name: &str,
    options: &BlockAnalysisOptions,
) -> Result<Vec<BlockReport>> {
    let blocks = enumerate_blocks(blk_data)?;
    let rev_blocks = enumerate_rev_blocks(rev_data)?;
    let pairing = pair_rev_blocks(&blocks, &rev_blocks)?;

    let mut reports = Vec::with_capacity(blocks.len());
    for (block_index, span) in blocks.iter().enumerate() {
        if let Some(deadline) = options.deadline {
            if Instant::now() >= deadline {
                warn!(
                    block_index,
                    total = blocks.len(),
                    "deadline reached, stopping between blocks"
                );
                break;
            }
        }

        let undo = match pairing[block_index] {
            Some(rev_index) => match parse_block_undo(&rev_blocks[rev_index].data) {
                Ok(undo) => Some(undo),
                Err(e) => {
                    // taint stays local: this block loses its fee column
                    warn!(block_index, error = %e, "undo stream malformed");
                    None
                }
            },
            None => None,
        };

        let report = analyze_block(blk_data, span, undo.as_deref(), file_name)?;
        debug!(
            block_index,
            block_hash = %report.header.block_hash,
            tx_count = report.tx_count,
            merkle_ok = report.merkle_ok,
            "block analyzed"
        );
        reports.push(report);
    }

    Ok(reports)
}

/// Pass 4: assemble the report for one enumerated block.
fn analyze_block(
    blk_data: &[u8],
    span: &BlockSpan,
    undo: Option<&[Vec<RecoveredPrevout>]>,
    file_name: &str,
) -> Result<BlockReport> {
    let mut cursor = ByteCursor::new(blk_data);
    cursor.seek(span.offset)?;
    let header = parse_block_header(&mut cursor)?;

    let mut txid_hashes = Vec::with_capacity(span.tx_spans.len());
    let mut tx_summary = Vec::with_capacity(span.tx_spans.len());
    let mut coinbase_height = None;
    let mut coinbase = None;
    let mut total_fees: i64 = 0;
    let mut fees_known = undo.is_some() || span.tx_count == 1;
    let mut total_weight: u64 = 0;
    let mut non_coinbase_vbytes: u64 = 0;
    let mut kind_counts: BTreeMap<String, u64> = BTreeMap::new();

    for (index, &(start, _end)) in span.tx_spans.iter().enumerate() {
        let mut tx_cursor = ByteCursor::new(blk_data);
        tx_cursor.seek(start)?;
        let summary = decode_transaction_summary(&mut tx_cursor, blk_data)?;
        txid_hashes.push(summary.txid.0);

        let total_out = summary.total_output_sats();
        let fee_sats = if index == 0 {
            let script_sig = summary.coinbase_script_sig.clone().unwrap_or_default();
            if header.version >= 2 {
                coinbase_height = decode_bip34_height(&script_sig);
            }
            coinbase = Some(CoinbaseReport {
                script_hex: hex::encode(&script_sig),
                total_output_sats: total_out,
            });
            None
        } else {
            match undo.and_then(|u| u.get(index - 1)) {
                Some(prevouts) if prevouts.len() == summary.num_inputs => {
                    let total_in: u64 = prevouts.iter().map(|p| p.amount_sats).sum();
                    let fee = total_in as i64 - total_out as i64;
                    total_fees += fee;
                    non_coinbase_vbytes += summary.vbytes;
                    Some(fee)
                }
                Some(prevouts) => {
                    warn!(
                        tx_index = index,
                        undo_inputs = prevouts.len(),
                        tx_inputs = summary.num_inputs,
                        "undo entry input count diverges from transaction"
                    );
                    fees_known = false;
                    None
                }
                None => {
                    fees_known = false;
                    None
                }
            }
        };

        total_weight += summary.weight;
        for kind in &summary.output_kinds {
            *kind_counts.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }

        tx_summary.push(TxSummaryReport {
            index,
            txid: summary.txid.to_string(),
            total_out_sats: total_out,
            fee_sats,
            weight: summary.weight,
            kinds: summary.output_kinds.clone(),
        });
    }

    let merkle_root_computed = compute_merkle_root(&txid_hashes);
    let merkle_ok = merkle_root_computed == header.merkle_root;
    if !merkle_ok {
        warn!(
            block_hash = %header.block_hash,
            computed = %to_hex_reversed(&merkle_root_computed),
            "merkle root mismatch"
        );
    }

    let avg_fee_rate = if fees_known && non_coinbase_vbytes > 0 {
        ((total_fees as f64 / non_coinbase_vbytes as f64) * 100.0).round() / 100.0
    } else {
        0.0
    };

    Ok(BlockReport {
        file: file_name.to_string(),
        offset: span.offset as u64,
        size: span.size,
        header: HeaderReport {
            version: header.version,
            prev_block_hash: header.prev_block_hash.to_string(),
            merkle_root: to_hex_reversed(&header.merkle_root),
            timestamp: header.timestamp,
            bits: format!("{:08x}", header.bits),
            nonce: header.nonce,
            block_hash: header.block_hash.to_string(),
        },
        tx_count: span.tx_count,
        coinbase_height,
        coinbase,
        merkle_ok,
        merkle_root_computed: to_hex_reversed(&merkle_root_computed),
        tx_summary,
        stats: BlockStats {
            total_fees_sats: total_fees,
            total_weight,
            avg_fee_rate_sat_vb: avg_fee_rate,
            script_kind_counts: kind_counts,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_descramble_round_trip() {
        let original = vec![0x12u8, 0x34, 0x56, 0x78, 0x9a];
        let key = [0xde, 0xad];
        let mut data = original.clone();
        xor_descramble(&mut data, &key);
        assert_ne!(data, original);
        assert_eq!(data[0], 0x12 ^ 0xde);
        assert_eq!(data[1], 0x34 ^ 0xad);
        assert_eq!(data[2], 0x56 ^ 0xde);
        xor_descramble(&mut data, &key);
        assert_eq!(data, original);
    }

    #[test]
    fn test_xor_descramble_zero_key_is_identity() {
        let mut data = vec![0x01, 0x02, 0x03];
        xor_descramble(&mut data, &[]);
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
        xor_descramble(&mut data, &[0x00; 8]);
        assert_eq!(data, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_merkle_single_leaf_is_identity() {
        let leaf = [0x42u8; 32];
        assert_eq!(compute_merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn test_merkle_pair() {
        let a = [0x01u8; 32];
        let b = [0x02u8; 32];
        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(&a);
        concat[32..].copy_from_slice(&b);
        assert_eq!(compute_merkle_root(&[a, b]), double_sha256(&concat));
    }

    #[test]
    fn test_merkle_odd_count_duplicates_last() {
        let a = [0x01u8; 32];
        let b = [0x02u8; 32];
        let c = [0x03u8; 32];
        // three leaves behave like [a, b, c, c]
        assert_eq!(
            compute_merkle_root(&[a, b, c]),
            compute_merkle_root(&[a, b, c, c])
        );
    }

    #[test]
    fn test_merkle_empty() {
        assert_eq!(compute_merkle_root(&[]), [0u8; 32]);
    }

    #[test]
    fn test_decode_bip34_height() {
        // 3-byte little-endian push of 840000
        let script = [0x03, 0x40, 0xd1, 0x0c, 0xaa, 0xbb];
        assert_eq!(decode_bip34_height(&script), Some(840_000));

        // height 1000
        assert_eq!(decode_bip34_height(&[0x03, 0xe8, 0x03, 0x00]), Some(1000));

        // empty or non-push scripts decode to nothing
        assert_eq!(decode_bip34_height(&[]), None);
        assert_eq!(decode_bip34_height(&[0x00, 0x01]), None);
        assert_eq!(decode_bip34_height(&[0x09]), None);
        // declared push longer than the script
        assert_eq!(decode_bip34_height(&[0x04, 0x01, 0x02]), None);
    }

    #[test]
    fn test_enumerate_blocks_skips_zero_padding() {
        // a minimal synthetic block: header-only framing is not valid, so
        // build one legacy tx after an 80-byte header
        let tx = crate::transaction::tests::legacy_tx();
        let mut payload = vec![0u8; HEADER_SIZE];
        payload.push(1);
        payload.extend_from_slice(&tx);

        let mut data = Vec::new();
        data.extend_from_slice(&BLOCK_MAGIC);
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
        data.extend_from_slice(&[0u8; 16]); // preallocated padding

        let spans = enumerate_blocks(&data).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].offset, 8);
        assert_eq!(spans[0].tx_count, 1);
        assert_eq!(spans[0].tx_spans[0].1 - spans[0].tx_spans[0].0, tx.len());
    }

    #[test]
    fn test_enumerate_blocks_stops_at_garbage() {
        let data = [0xaa, 0xbb, 0xcc, 0xdd, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(enumerate_blocks(&data).unwrap().is_empty());
    }
}
