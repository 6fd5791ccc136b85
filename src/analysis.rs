//! Policy analysis: fees, replace-by-fee, timelocks, witness savings,
//! warnings, and full transaction-report assembly

use serde::Deserialize;
use std::collections::HashMap;

use crate::address::derive_address;
use crate::constants::*;
use crate::error::Result;
use crate::report::{
    FeesReport, InputReport, OutputReport, PrevoutReport, SizesReport, TransactionReport,
    Warning, WarningCode,
};
use crate::script::{classify_input, classify_output, decode_op_return, disassemble};
use crate::transaction::decode_transaction_hex;
use crate::types::{
    LockTimeKind, Network, RelativeLockKind, RelativeTimelock, ScriptKind, TransactionRecord,
    Txid,
};

/// Input fixture for transaction mode.
#[derive(Debug, Clone, Deserialize)]
pub struct TxFixture {
    #[serde(alias = "raw_tx")]
    pub raw_hex: String,
    #[serde(default)]
    pub prevouts: Vec<PrevoutSpec>,
    #[serde(default)]
    pub network: Network,
}

/// One known prevout supplied alongside a raw transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct PrevoutSpec {
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    pub script_pubkey_hex: String,
}

/// Fee and fee-rate figures; `None` when any prevout is unknown.
pub fn compute_fees(
    total_input_sats: Option<u64>,
    total_output_sats: u64,
    vbytes: u64,
) -> (Option<i64>, Option<f64>) {
    let total_in = match total_input_sats {
        Some(v) => v,
        None => return (None, None),
    };
    let fee = total_in as i64 - total_output_sats as i64;
    let rate = if vbytes > 0 {
        Some((fee as f64 / vbytes as f64 * 100.0).round() / 100.0)
    } else {
        None
    };
    (Some(fee), rate)
}

/// BIP125: any input sequence below 0xFFFFFFFE opts in to replacement.
pub fn signals_rbf(tx: &TransactionRecord) -> bool {
    tx.inputs
        .iter()
        .any(|input| input.sequence < SEQUENCE_RBF_THRESHOLD)
}

/// Interpret an absolute lock time.
pub fn classify_locktime(locktime: u32) -> LockTimeKind {
    if locktime == 0 {
        LockTimeKind::None
    } else if locktime < LOCKTIME_THRESHOLD {
        LockTimeKind::BlockHeight(locktime)
    } else {
        LockTimeKind::UnixTime(locktime)
    }
}

/// BIP68 relative lock for one input; `None` when bit 31 disables it.
pub fn relative_timelock(sequence: u32) -> Option<RelativeTimelock> {
    if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return None;
    }
    let value = sequence & SEQUENCE_LOCKTIME_MASK;
    if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
        Some(RelativeTimelock {
            kind: RelativeLockKind::Time,
            value: value * SEQUENCE_LOCKTIME_GRANULARITY,
        })
    } else {
        Some(RelativeTimelock {
            kind: RelativeLockKind::Blocks,
            value,
        })
    }
}

/// Witness discount relative to a fully legacy serialization.
pub fn segwit_savings_pct(tx: &TransactionRecord) -> Option<f64> {
    if !tx.is_segwit {
        return None;
    }
    let weight_if_legacy = tx.sizes.total_size * 4;
    if weight_if_legacy == 0 {
        return Some(0.0);
    }
    let savings = (1.0 - tx.sizes.weight as f64 / weight_if_legacy as f64) * 100.0;
    Some((savings * 100.0).round() / 100.0)
}

/// Dust relay floor for an output kind; data carriers are exempt.
pub fn dust_threshold(kind: ScriptKind) -> Option<u64> {
    match kind {
        ScriptKind::OpReturn => None,
        ScriptKind::P2wpkh => Some(DUST_THRESHOLD_P2WPKH),
        ScriptKind::P2wsh | ScriptKind::P2tr => Some(DUST_THRESHOLD_WITNESS_32),
        _ => Some(DUST_THRESHOLD_LEGACY),
    }
}

/// Collect the structured warnings for a decoded transaction.
pub fn collect_warnings(
    tx: &TransactionRecord,
    fee_rate: Option<f64>,
    rbf: bool,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if let Some(rate) = fee_rate {
        if rate > HIGH_FEE_RATE_SAT_VB {
            warnings.push(Warning {
                code: WarningCode::HighFee,
                detail: format!("fee rate {:.2} sat/vB exceeds {}", rate, HIGH_FEE_RATE_SAT_VB),
            });
        }
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        if let Some(threshold) = dust_threshold(output.kind) {
            if output.value_sats < threshold {
                warnings.push(Warning {
                    code: WarningCode::DustOutput,
                    detail: format!(
                        "output {} pays {} sats, below the {} sat dust floor",
                        index, output.value_sats, threshold
                    ),
                });
            }
        }
    }

    for (index, output) in tx.outputs.iter().enumerate() {
        if output.kind == ScriptKind::Unknown {
            warnings.push(Warning {
                code: WarningCode::UnknownOutputScript,
                detail: format!("output {} matches no known script template", index),
            });
        }
    }

    if rbf {
        warnings.push(Warning {
            code: WarningCode::RbfSignaling,
            detail: "at least one input sequence signals BIP125 replaceability".to_string(),
        });
    }

    for &offset in &tx.non_canonical_sizes {
        warnings.push(Warning {
            code: WarningCode::NonCanonicalSize,
            detail: format!("non-minimal CompactSize encoding at offset {}", offset),
        });
    }

    warnings
}

/// Analyze a fixture document (raw hex plus optional prevouts).
pub fn analyze_fixture(fixture: &TxFixture) -> Result<TransactionReport> {
    analyze_transaction(&fixture.raw_hex, &fixture.prevouts, fixture.network)
}

/// Decode a raw transaction and assemble the full report.
///
/// Prevouts are optional: inputs without one stay unclassified and the fee
/// column is reported as unknown.
pub fn analyze_transaction(
    raw_hex: &str,
    prevouts: &[PrevoutSpec],
    network: Network,
) -> Result<TransactionReport> {
    let tx = decode_transaction_hex(raw_hex)?;

    // join supplied prevouts onto inputs by outpoint
    let mut prevout_map: HashMap<(Txid, u32), &PrevoutSpec> = HashMap::new();
    for prevout in prevouts {
        let txid = Txid::from_hex(&prevout.txid)?;
        prevout_map.insert((txid, prevout.vout), prevout);
    }

    let mut total_input_sats: Option<u64> = Some(0);
    let mut input_reports = Vec::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        let matched = prevout_map.get(&(input.prev_txid, input.prev_vout));

        let (classified_kind, prevout_report) = match matched {
            Some(spec) => {
                let prevout_script = hex::decode(&spec.script_pubkey_hex)?;
                let kind = classify_input(&prevout_script, &input.script_sig, &input.witness);
                let prevout_kind = classify_output(&prevout_script);
                total_input_sats = total_input_sats.map(|sum| sum + spec.value_sats);
                (
                    kind,
                    Some(PrevoutReport {
                        value_sats: spec.value_sats,
                        kind: prevout_kind,
                        address: derive_address(prevout_kind, &prevout_script, network),
                    }),
                )
            }
            None => {
                total_input_sats = None;
                (ScriptKind::Unknown, None)
            }
        };

        // surface the witness script for script-hash witness spends
        let witness_script_asm = match classified_kind {
            ScriptKind::P2wsh | ScriptKind::P2shP2wsh => input
                .witness
                .items()
                .last()
                .map(|script| disassemble(script)),
            _ => None,
        };

        input_reports.push(InputReport {
            prev_txid: input.prev_txid.to_string(),
            prev_vout: input.prev_vout,
            sequence: input.sequence,
            classified_kind,
            script_sig_asm: disassemble(&input.script_sig),
            witness: input.witness.items().iter().map(hex::encode).collect(),
            rbf_signals: input.sequence < SEQUENCE_RBF_THRESHOLD,
            relative_timelock: relative_timelock(input.sequence),
            prevout: prevout_report,
            witness_script_asm,
        });
    }

    let mut output_reports = Vec::with_capacity(tx.outputs.len());
    for (index, output) in tx.outputs.iter().enumerate() {
        let op_return = if output.kind == ScriptKind::OpReturn {
            decode_op_return(&output.script_pubkey)
        } else {
            None
        };
        output_reports.push(OutputReport {
            index,
            value_sats: output.value_sats,
            classified_kind: output.kind,
            address: derive_address(output.kind, &output.script_pubkey, network),
            script_pubkey_hex: hex::encode(&output.script_pubkey),
            script_pubkey_asm: disassemble(&output.script_pubkey),
            op_return,
        });
    }

    let (fee, fee_rate) = compute_fees(total_input_sats, tx.total_output_sats(), tx.sizes.vbytes);
    let rbf = signals_rbf(&tx);
    let warnings = collect_warnings(&tx, fee_rate, rbf);

    Ok(TransactionReport {
        network,
        txid: tx.txid.to_string(),
        wtxid: tx.wtxid.map(|id| id.to_string()),
        version: tx.version,
        is_segwit: tx.is_segwit,
        locktime: tx.locktime,
        sizes: SizesReport {
            total_size: tx.sizes.total_size,
            non_witness_size: tx.sizes.non_witness_size,
            witness_size: tx.sizes.witness_size,
            weight: tx.sizes.weight,
            vbytes: tx.sizes.vbytes,
        },
        inputs: input_reports,
        outputs: output_reports,
        fees: FeesReport {
            absolute_sats: fee,
            rate_sat_per_vb: fee_rate,
            segwit_savings_pct: segwit_savings_pct(&tx),
        },
        locktime_kind: classify_locktime(tx.locktime),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Input, Output, TxSizes, Witness};

    fn record_with_sequences(sequences: &[u32]) -> TransactionRecord {
        TransactionRecord {
            version: 2,
            is_segwit: false,
            inputs: sequences
                .iter()
                .map(|&sequence| Input {
                    prev_txid: Txid([0x11; 32]),
                    prev_vout: 0,
                    script_sig: vec![],
                    witness: Witness::Legacy,
                    sequence,
                })
                .collect(),
            outputs: vec![Output {
                value_sats: 10_000,
                script_pubkey: vec![0x51],
                kind: ScriptKind::Unknown,
            }],
            locktime: 0,
            txid: Txid([0; 32]),
            wtxid: None,
            sizes: TxSizes {
                total_size: 100,
                non_witness_size: 100,
                witness_size: 0,
                weight: 400,
                vbytes: 100,
            },
            non_canonical_sizes: vec![],
        }
    }

    #[test]
    fn test_compute_fees_known_prevouts() {
        let (fee, rate) = compute_fees(Some(10_000), 9_000, 200);
        assert_eq!(fee, Some(1000));
        assert_eq!(rate, Some(5.0));
    }

    #[test]
    fn test_compute_fees_rounds_to_two_decimals() {
        let (_, rate) = compute_fees(Some(10_000), 9_000, 300);
        assert_eq!(rate, Some(3.33));
    }

    #[test]
    fn test_compute_fees_unknown_prevout() {
        let (fee, rate) = compute_fees(None, 9_000, 200);
        assert_eq!(fee, None);
        assert_eq!(rate, None);
    }

    #[test]
    fn test_rbf_detection() {
        assert!(signals_rbf(&record_with_sequences(&[0xfffffffd])));
        assert!(signals_rbf(&record_with_sequences(&[
            0xffffffff, 0x00000001
        ])));
        assert!(!signals_rbf(&record_with_sequences(&[0xfffffffe])));
        assert!(!signals_rbf(&record_with_sequences(&[0xffffffff])));
    }

    #[test]
    fn test_classify_locktime() {
        assert_eq!(classify_locktime(0), LockTimeKind::None);
        assert_eq!(classify_locktime(800_000), LockTimeKind::BlockHeight(800_000));
        assert_eq!(classify_locktime(499_999_999), LockTimeKind::BlockHeight(499_999_999));
        assert_eq!(
            classify_locktime(500_000_000),
            LockTimeKind::UnixTime(500_000_000)
        );
    }

    #[test]
    fn test_relative_timelock_variants() {
        // bit 31 set: disabled
        assert_eq!(relative_timelock(0x8000_0010), None);
        // block-based
        assert_eq!(
            relative_timelock(0x0000_0064),
            Some(RelativeTimelock {
                kind: RelativeLockKind::Blocks,
                value: 100
            })
        );
        // time-based, 512-second units
        assert_eq!(
            relative_timelock(0x0040_0002),
            Some(RelativeTimelock {
                kind: RelativeLockKind::Time,
                value: 1024
            })
        );
        // only the low 16 bits carry the value
        assert_eq!(
            relative_timelock(0x0001_0001),
            Some(RelativeTimelock {
                kind: RelativeLockKind::Blocks,
                value: 1
            })
        );
    }

    #[test]
    fn test_dust_thresholds_per_kind() {
        assert_eq!(dust_threshold(ScriptKind::P2pkh), Some(546));
        assert_eq!(dust_threshold(ScriptKind::P2wpkh), Some(294));
        assert_eq!(dust_threshold(ScriptKind::P2tr), Some(330));
        assert_eq!(dust_threshold(ScriptKind::OpReturn), None);
    }

    #[test]
    fn test_collect_warnings() {
        let mut tx = record_with_sequences(&[0xfffffffd]);
        tx.outputs[0].value_sats = 100; // dust, and kind is Unknown
        let warnings = collect_warnings(&tx, Some(1500.0), true);
        let codes: Vec<WarningCode> = warnings.iter().map(|w| w.code).collect();
        assert!(codes.contains(&WarningCode::HighFee));
        assert!(codes.contains(&WarningCode::DustOutput));
        assert!(codes.contains(&WarningCode::UnknownOutputScript));
        assert!(codes.contains(&WarningCode::RbfSignaling));
    }

    #[test]
    fn test_no_warnings_for_clean_tx() {
        let mut tx = record_with_sequences(&[0xffffffff]);
        tx.outputs[0].kind = ScriptKind::P2pkh;
        assert!(collect_warnings(&tx, Some(10.0), false).is_empty());
    }
}
