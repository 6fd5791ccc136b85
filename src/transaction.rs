//! Wire-format transaction deserialization
//!
//! A single layout pass walks the raw bytes once, recording the spans of
//! every field. The full decoder, the block-mode fast path, and the
//! enumeration skip-scan all consume that one pass; nothing is ever parsed
//! twice, and the TXID preimage is reassembled from recorded offsets
//! instead of re-serialization.

use crate::constants::{
    MAX_DECODED_INPUTS, MAX_DECODED_OUTPUTS, SEGWIT_FLAG, SEGWIT_MARKER,
};
use crate::error::{LensError, Result};
use crate::hashes::double_sha256;
use crate::reader::ByteCursor;
use crate::script::classify_output;
use crate::types::{
    Input, Output, TransactionRecord, TxSizes, TxSummaryRecord, Txid, Witness,
};

/// Byte span of one input inside the raw buffer.
#[derive(Debug, Clone, Copy)]
struct InputSpan {
    prev_txid: usize,
    script_sig_start: usize,
    script_sig_end: usize,
    sequence: usize,
}

/// Byte span of one output inside the raw buffer.
#[derive(Debug, Clone, Copy)]
struct OutputSpan {
    value: usize,
    script_start: usize,
    script_end: usize,
}

/// Field offsets discovered by the layout pass.
#[derive(Debug, Clone)]
struct TxLayout {
    version: i32,
    is_segwit: bool,
    /// Offset of the input count; start of the non-witness midsection.
    start_inputs: usize,
    /// End of the last output; end of the non-witness midsection.
    end_outputs: usize,
    inputs: Vec<InputSpan>,
    outputs: Vec<OutputSpan>,
    /// One stack of item spans per input (segwit only).
    witness: Vec<Vec<(usize, usize)>>,
    locktime: u32,
    /// One past the locktime; total consumed length.
    end: usize,
    non_canonical: Vec<usize>,
}

/// Walk one serialized transaction starting at the cursor position.
fn parse_layout(cursor: &mut ByteCursor) -> Result<TxLayout> {
    let tx_start = cursor.tell();
    let version = cursor.read_i32()?;

    // exactly 0x00 0x01 is the segwit marker + flag; anything else is the
    // start of the input count and stays unconsumed
    let mut is_segwit = false;
    if cursor.peek(2) == [SEGWIT_MARKER, SEGWIT_FLAG] {
        cursor.read(2)?;
        is_segwit = true;
    }

    let start_inputs = cursor.tell();

    let num_inputs = cursor.read_compact_size()?;
    if num_inputs > MAX_DECODED_INPUTS {
        return Err(LensError::ExcessiveInputs(num_inputs));
    }
    let mut inputs = Vec::with_capacity(num_inputs as usize);
    for _ in 0..num_inputs {
        let prev_txid = cursor.tell();
        cursor.read(36)?; // prev txid + vout
        let script_len = cursor.read_compact_size()? as usize;
        let script_sig_start = cursor.tell();
        cursor.read(script_len)?;
        let script_sig_end = cursor.tell();
        let sequence = cursor.tell();
        cursor.read(4)?;
        inputs.push(InputSpan {
            prev_txid,
            script_sig_start,
            script_sig_end,
            sequence,
        });
    }

    let num_outputs = cursor.read_compact_size()?;
    if num_outputs > MAX_DECODED_OUTPUTS {
        return Err(LensError::ExcessiveOutputs(num_outputs));
    }
    let mut outputs = Vec::with_capacity(num_outputs as usize);
    for _ in 0..num_outputs {
        let value = cursor.tell();
        cursor.read(8)?;
        let script_len = cursor.read_compact_size()? as usize;
        let script_start = cursor.tell();
        cursor.read(script_len)?;
        outputs.push(OutputSpan {
            value,
            script_start,
            script_end: cursor.tell(),
        });
    }

    let end_outputs = cursor.tell();

    let mut witness = Vec::new();
    if is_segwit {
        for _ in 0..num_inputs {
            let num_items = cursor.read_compact_size()?;
            let mut items = Vec::with_capacity(num_items as usize);
            for _ in 0..num_items {
                let item_len = cursor.read_compact_size()? as usize;
                let start = cursor.tell();
                cursor.read(item_len)?;
                items.push((start, cursor.tell()));
            }
            witness.push(items);
        }
    }

    let locktime = cursor.read_u32()?;
    let end = cursor.tell();

    // a segwit transaction with no witness bytes should have used the
    // legacy serialization
    if is_segwit && witness.iter().all(|stack| stack.is_empty()) && num_inputs > 0 {
        return Err(LensError::InvalidWitness(
            "segwit marker present but every witness stack is empty".to_string(),
        ));
    }

    let non_canonical = cursor
        .non_canonical_offsets()
        .iter()
        .copied()
        .filter(|&offset| offset >= tx_start && offset < end)
        .collect();

    Ok(TxLayout {
        version,
        is_segwit,
        start_inputs,
        end_outputs,
        inputs,
        outputs,
        witness,
        locktime,
        end,
        non_canonical,
    })
}

/// Compute TXID/WTXID and sizes from the layout.
///
/// The non-witness preimage is `raw[0..4] || raw[start_inputs..end_outputs]
/// || raw[end-4..end]`, stitched together from the recorded offsets.
fn identity_and_sizes(raw: &[u8], layout: &TxLayout, tx_start: usize) -> (Txid, Option<Txid>, TxSizes) {
    let total = (layout.end - tx_start) as u64;
    let raw_tx = &raw[tx_start..layout.end];

    if layout.is_segwit {
        let mut preimage =
            Vec::with_capacity(8 + layout.end_outputs - layout.start_inputs);
        preimage.extend_from_slice(&raw_tx[..4]);
        preimage.extend_from_slice(&raw[layout.start_inputs..layout.end_outputs]);
        preimage.extend_from_slice(&raw_tx[raw_tx.len() - 4..]);

        let non_witness = preimage.len() as u64;
        let witness = total - non_witness;
        let weight = non_witness * 4 + witness;
        let sizes = TxSizes {
            total_size: total,
            non_witness_size: non_witness,
            witness_size: witness,
            weight,
            vbytes: (weight + 3) / 4,
        };
        (
            Txid(double_sha256(&preimage)),
            Some(Txid(double_sha256(raw_tx))),
            sizes,
        )
    } else {
        let weight = total * 4;
        let sizes = TxSizes {
            total_size: total,
            non_witness_size: total,
            witness_size: 0,
            weight,
            vbytes: (weight + 3) / 4,
        };
        (Txid(double_sha256(raw_tx)), None, sizes)
    }
}

/// Decode a full transaction record from raw bytes.
///
/// The buffer must contain exactly one serialized transaction.
pub fn decode_transaction(raw: &[u8]) -> Result<TransactionRecord> {
    let mut cursor = ByteCursor::new(raw);
    let layout = parse_layout(&mut cursor)?;
    if layout.end != raw.len() {
        return Err(LensError::Truncated {
            offset: layout.end,
            needed: 0,
            available: raw.len() - layout.end,
        });
    }
    materialize_full(raw, &layout, 0)
}

/// Decode a transaction from a hex string.
pub fn decode_transaction_hex(raw_hex: &str) -> Result<TransactionRecord> {
    let raw = hex::decode(raw_hex.trim())?;
    decode_transaction(&raw)
}

fn materialize_full(raw: &[u8], layout: &TxLayout, tx_start: usize) -> Result<TransactionRecord> {
    if layout.is_segwit && layout.witness.len() != layout.inputs.len() {
        return Err(LensError::WitnessCountMismatch {
            expected: layout.inputs.len(),
            got: layout.witness.len(),
        });
    }

    let mut inputs = Vec::with_capacity(layout.inputs.len());
    for (index, span) in layout.inputs.iter().enumerate() {
        let mut prev_txid = [0u8; 32];
        prev_txid.copy_from_slice(&raw[span.prev_txid..span.prev_txid + 32]);
        let prev_vout = u32::from_le_bytes([
            raw[span.prev_txid + 32],
            raw[span.prev_txid + 33],
            raw[span.prev_txid + 34],
            raw[span.prev_txid + 35],
        ]);
        let sequence = u32::from_le_bytes([
            raw[span.sequence],
            raw[span.sequence + 1],
            raw[span.sequence + 2],
            raw[span.sequence + 3],
        ]);
        let witness = if layout.is_segwit {
            Witness::Segwit(
                layout.witness[index]
                    .iter()
                    .map(|&(start, end)| raw[start..end].to_vec())
                    .collect(),
            )
        } else {
            Witness::Legacy
        };
        inputs.push(Input {
            prev_txid: Txid(prev_txid),
            prev_vout,
            script_sig: raw[span.script_sig_start..span.script_sig_end].to_vec(),
            witness,
            sequence,
        });
    }

    let mut outputs = Vec::with_capacity(layout.outputs.len());
    for span in &layout.outputs {
        let value_sats = u64::from_le_bytes([
            raw[span.value],
            raw[span.value + 1],
            raw[span.value + 2],
            raw[span.value + 3],
            raw[span.value + 4],
            raw[span.value + 5],
            raw[span.value + 6],
            raw[span.value + 7],
        ]);
        let script_pubkey = raw[span.script_start..span.script_end].to_vec();
        let kind = classify_output(&script_pubkey);
        outputs.push(Output {
            value_sats,
            script_pubkey,
            kind,
        });
    }

    let (txid, wtxid, sizes) = identity_and_sizes(raw, layout, tx_start);

    Ok(TransactionRecord {
        version: layout.version,
        is_segwit: layout.is_segwit,
        inputs,
        outputs,
        locktime: layout.locktime,
        txid,
        wtxid,
        sizes,
        non_canonical_sizes: layout.non_canonical.clone(),
    })
}

/// Block-mode fast path: advance the cursor over one transaction and
/// materialize only the summary fields.
pub fn decode_transaction_summary(cursor: &mut ByteCursor, raw: &[u8]) -> Result<TxSummaryRecord> {
    let tx_start = cursor.tell();
    let layout = parse_layout(cursor)?;

    let mut output_values = Vec::with_capacity(layout.outputs.len());
    let mut output_kinds = Vec::with_capacity(layout.outputs.len());
    for span in &layout.outputs {
        output_values.push(u64::from_le_bytes([
            raw[span.value],
            raw[span.value + 1],
            raw[span.value + 2],
            raw[span.value + 3],
            raw[span.value + 4],
            raw[span.value + 5],
            raw[span.value + 6],
            raw[span.value + 7],
        ]));
        output_kinds.push(classify_output(&raw[span.script_start..span.script_end]));
    }

    // the coinbase scriptSig is only meaningful for the null outpoint
    let coinbase_script_sig = layout.inputs.first().and_then(|span| {
        let null_prevout = raw[span.prev_txid..span.prev_txid + 32] == [0u8; 32]
            && raw[span.prev_txid + 32..span.prev_txid + 36] == [0xff, 0xff, 0xff, 0xff];
        if null_prevout {
            Some(raw[span.script_sig_start..span.script_sig_end].to_vec())
        } else {
            None
        }
    });

    let (txid, _, sizes) = identity_and_sizes(raw, &layout, tx_start);

    Ok(TxSummaryRecord {
        txid,
        version: layout.version,
        weight: sizes.weight,
        vbytes: sizes.vbytes,
        num_inputs: layout.inputs.len(),
        output_values,
        output_kinds,
        coinbase_script_sig,
    })
}

/// Enumeration skip-scan: advance the cursor over one transaction without
/// materializing anything, returning its `(start, end)` span.
pub fn scan_transaction(cursor: &mut ByteCursor) -> Result<(usize, usize)> {
    let start = cursor.tell();
    let layout = parse_layout(cursor)?;
    Ok((start, layout.end))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::ScriptKind;

    /// 1-in/2-out legacy transaction with p2pkh outputs.
    pub(crate) fn legacy_tx() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_le_bytes()); // version
        raw.push(1); // input count
        raw.extend_from_slice(&[0x11; 32]); // prev txid
        raw.extend_from_slice(&0u32.to_le_bytes()); // prev vout
        raw.push(0); // empty scriptSig
        raw.extend_from_slice(&0xffffffffu32.to_le_bytes()); // sequence
        raw.push(2); // output count
        for (value, fill) in [(1000u64, 0x22u8), (2000, 0x33)] {
            raw.extend_from_slice(&value.to_le_bytes());
            raw.push(25);
            raw.extend_from_slice(&[0x76, 0xa9, 0x14]);
            raw.extend_from_slice(&[fill; 20]);
            raw.extend_from_slice(&[0x88, 0xac]);
        }
        raw.extend_from_slice(&0u32.to_le_bytes()); // locktime
        raw
    }

    /// Segwit transaction: one input, one p2wpkh output, two witness items.
    pub(crate) fn segwit_tx() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&2i32.to_le_bytes()); // version
        raw.extend_from_slice(&[0x00, 0x01]); // marker + flag
        raw.push(1); // input count
        raw.extend_from_slice(&[0x44; 32]);
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.push(0); // empty scriptSig
        raw.extend_from_slice(&0xfffffffdu32.to_le_bytes()); // rbf sequence
        raw.push(1); // output count
        raw.extend_from_slice(&50_000u64.to_le_bytes());
        raw.push(22);
        raw.extend_from_slice(&[0x00, 0x14]);
        raw.extend_from_slice(&[0x55; 20]);
        raw.push(2); // witness items
        raw.push(71);
        raw.extend_from_slice(&[0xaa; 71]); // signature placeholder
        raw.push(33);
        raw.push(0x02);
        raw.extend_from_slice(&[0x66; 32]); // pubkey placeholder
        raw.extend_from_slice(&0u32.to_le_bytes()); // locktime
        raw
    }

    #[test]
    fn test_decode_legacy_transaction() {
        let raw = legacy_tx();
        let tx = decode_transaction(&raw).unwrap();

        assert_eq!(tx.version, 1);
        assert!(!tx.is_segwit);
        assert_eq!(tx.wtxid, None);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.locktime, 0);
        assert_eq!(tx.inputs[0].witness, Witness::Legacy);
        assert_eq!(tx.outputs[0].value_sats, 1000);
        assert_eq!(tx.outputs[1].value_sats, 2000);
        assert_eq!(tx.outputs[0].kind, ScriptKind::P2pkh);
        assert_eq!(tx.outputs[1].kind, ScriptKind::P2pkh);

        // legacy: txid is the hash of the whole serialization
        assert_eq!(tx.txid, Txid(double_sha256(&raw)));
        assert_eq!(tx.sizes.total_size, raw.len() as u64);
        assert_eq!(tx.sizes.weight, raw.len() as u64 * 4);
        assert_eq!(tx.sizes.vbytes, raw.len() as u64);
    }

    #[test]
    fn test_decode_segwit_transaction() {
        let raw = segwit_tx();
        let tx = decode_transaction(&raw).unwrap();

        assert!(tx.is_segwit);
        assert_eq!(tx.version, 2);
        let wtxid = tx.wtxid.expect("segwit tx must have a wtxid");
        assert_ne!(wtxid, tx.txid);
        assert_eq!(wtxid, Txid(double_sha256(&raw)));
        assert_eq!(tx.outputs[0].kind, ScriptKind::P2wpkh);
        assert_eq!(tx.inputs[0].witness.items().len(), 2);
        assert_eq!(tx.inputs[0].sequence, 0xfffffffd);

        // offset-stitched preimage equals a fresh non-witness serialization
        let mut fresh = Vec::new();
        fresh.extend_from_slice(&2i32.to_le_bytes());
        fresh.push(1);
        fresh.extend_from_slice(&[0x44; 32]);
        fresh.extend_from_slice(&1u32.to_le_bytes());
        fresh.push(0);
        fresh.extend_from_slice(&0xfffffffdu32.to_le_bytes());
        fresh.push(1);
        fresh.extend_from_slice(&50_000u64.to_le_bytes());
        fresh.push(22);
        fresh.extend_from_slice(&[0x00, 0x14]);
        fresh.extend_from_slice(&[0x55; 20]);
        fresh.extend_from_slice(&0u32.to_le_bytes());
        assert_eq!(tx.txid, Txid(double_sha256(&fresh)));

        // weight accounting
        let non_witness = fresh.len() as u64;
        let witness = raw.len() as u64 - non_witness;
        assert_eq!(tx.sizes.non_witness_size, non_witness);
        assert_eq!(tx.sizes.witness_size, witness);
        assert_eq!(tx.sizes.weight, non_witness * 4 + witness);
        assert_eq!(tx.sizes.vbytes, (tx.sizes.weight + 3) / 4);
    }

    #[test]
    fn test_decode_truncated_fails() {
        let raw = legacy_tx();
        for cut in [1, 5, 40, raw.len() - 1] {
            let err = decode_transaction(&raw[..cut]).unwrap_err();
            assert!(
                matches!(err, LensError::Truncated { .. }),
                "cut at {} gave {:?}",
                cut,
                err
            );
        }
    }

    #[test]
    fn test_decode_trailing_bytes_rejected() {
        let mut raw = legacy_tx();
        raw.push(0x00);
        assert!(decode_transaction(&raw).is_err());
    }

    #[test]
    fn test_marker_lookalike_rewinds_to_input_count() {
        // 0x00 followed by anything but 0x01 is not a marker: these two
        // bytes are the input count (0) and the output count (2)
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_le_bytes());
        raw.extend_from_slice(&[0x00, 0x02]);
        for value in [700u64, 800] {
            raw.extend_from_slice(&value.to_le_bytes());
            raw.push(1);
            raw.push(0x51);
        }
        raw.extend_from_slice(&0u32.to_le_bytes());

        let tx = decode_transaction(&raw).unwrap();
        assert!(!tx.is_segwit);
        assert_eq!(tx.inputs.len(), 0);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value_sats, 700);
        assert_eq!(tx.outputs[1].value_sats, 800);
    }

    #[test]
    fn test_segwit_with_all_empty_stacks_rejected() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&2i32.to_le_bytes());
        raw.extend_from_slice(&[0x00, 0x01]);
        raw.push(1);
        raw.extend_from_slice(&[0x44; 32]);
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.push(0);
        raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(&1000u64.to_le_bytes());
        raw.push(1);
        raw.push(0x51);
        raw.push(0); // empty witness stack
        raw.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            decode_transaction(&raw).unwrap_err(),
            LensError::InvalidWitness(_)
        ));
    }

    #[test]
    fn test_non_canonical_size_diagnostic() {
        // input count encoded as fd 01 00 instead of 01
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_le_bytes());
        raw.extend_from_slice(&[0xfd, 0x01, 0x00]);
        raw.extend_from_slice(&[0x11; 32]);
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.push(0);
        raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(&1000u64.to_le_bytes());
        raw.push(1);
        raw.push(0x51);
        raw.extend_from_slice(&0u32.to_le_bytes());

        let tx = decode_transaction(&raw).unwrap();
        assert_eq!(tx.non_canonical_sizes, vec![4]);
    }

    #[test]
    fn test_round_trip_identity() {
        // decode -> re-encode from the record -> decode again
        let raw = legacy_tx();
        let tx = decode_transaction(&raw).unwrap();

        let mut encoded = Vec::new();
        encoded.extend_from_slice(&tx.version.to_le_bytes());
        encoded.push(tx.inputs.len() as u8);
        for input in &tx.inputs {
            encoded.extend_from_slice(input.prev_txid.as_bytes());
            encoded.extend_from_slice(&input.prev_vout.to_le_bytes());
            encoded.push(input.script_sig.len() as u8);
            encoded.extend_from_slice(&input.script_sig);
            encoded.extend_from_slice(&input.sequence.to_le_bytes());
        }
        encoded.push(tx.outputs.len() as u8);
        for output in &tx.outputs {
            encoded.extend_from_slice(&output.value_sats.to_le_bytes());
            encoded.push(output.script_pubkey.len() as u8);
            encoded.extend_from_slice(&output.script_pubkey);
        }
        encoded.extend_from_slice(&tx.locktime.to_le_bytes());

        assert_eq!(encoded, raw);
        assert_eq!(decode_transaction(&encoded).unwrap(), tx);
    }

    #[test]
    fn test_summary_matches_full_decode() {
        let raw = segwit_tx();
        let full = decode_transaction(&raw).unwrap();

        let mut cursor = ByteCursor::new(&raw);
        let summary = decode_transaction_summary(&mut cursor, &raw).unwrap();

        assert_eq!(summary.txid, full.txid);
        assert_eq!(summary.weight, full.sizes.weight);
        assert_eq!(summary.vbytes, full.sizes.vbytes);
        assert_eq!(summary.num_inputs, full.inputs.len());
        assert_eq!(summary.output_values, vec![50_000]);
        assert_eq!(summary.output_kinds, vec![ScriptKind::P2wpkh]);
        assert_eq!(summary.coinbase_script_sig, None);
        assert_eq!(cursor.tell(), raw.len());
    }

    #[test]
    fn test_scan_spans_consecutive_transactions() {
        let first = legacy_tx();
        let second = segwit_tx();
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut cursor = ByteCursor::new(&stream);
        assert_eq!(scan_transaction(&mut cursor).unwrap(), (0, first.len()));
        assert_eq!(
            scan_transaction(&mut cursor).unwrap(),
            (first.len(), stream.len())
        );
    }

    #[test]
    fn test_coinbase_script_sig_extraction() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&1i32.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(&[0x00; 32]);
        raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
        raw.push(4);
        raw.extend_from_slice(&[0x03, 0xe8, 0x03, 0x00]); // BIP34 height 1000
        raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
        raw.push(1);
        raw.extend_from_slice(&5_000_000_000u64.to_le_bytes());
        raw.push(1);
        raw.push(0x51);
        raw.extend_from_slice(&0u32.to_le_bytes());

        let mut cursor = ByteCursor::new(&raw);
        let summary = decode_transaction_summary(&mut cursor, &raw).unwrap();
        assert_eq!(
            summary.coinbase_script_sig,
            Some(vec![0x03, 0xe8, 0x03, 0x00])
        );
    }
}
