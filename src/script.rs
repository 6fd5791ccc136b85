//! Script classification, disassembly, and OP_RETURN payload decoding
//!
//! Classification is a literal pattern match over the canonical output
//! templates; no Script execution happens anywhere in this crate.

use serde::Serialize;

use crate::opcodes::{
    self, OP_CHECKMULTISIG, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160,
    OP_PUSHBYTES_MAX, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_RETURN, OP_0, OP_1, OP_16,
};
use crate::types::{ScriptKind, Witness};

/// Classify a scriptPubKey against the canonical templates.
///
/// # Examples
///
/// ```
/// use chain_lens::script::classify_output;
/// use chain_lens::ScriptKind;
///
/// let mut p2pkh = vec![0x76, 0xa9, 0x14];
/// p2pkh.extend_from_slice(&[0u8; 20]);
/// p2pkh.extend_from_slice(&[0x88, 0xac]);
/// assert_eq!(classify_output(&p2pkh), ScriptKind::P2pkh);
/// ```
pub fn classify_output(script: &[u8]) -> ScriptKind {
    let n = script.len();

    // p2pkh: OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
    if n == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 0x14
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        return ScriptKind::P2pkh;
    }

    // p2sh: OP_HASH160 <20> OP_EQUAL
    if n == 23 && script[0] == OP_HASH160 && script[1] == 0x14 && script[22] == OP_EQUAL {
        return ScriptKind::P2sh;
    }

    // p2wpkh: OP_0 <20>
    if n == 22 && script[0] == OP_0 && script[1] == 0x14 {
        return ScriptKind::P2wpkh;
    }

    // p2wsh: OP_0 <32>
    if n == 34 && script[0] == OP_0 && script[1] == 0x20 {
        return ScriptKind::P2wsh;
    }

    // p2tr: OP_1 <32>
    if n == 34 && script[0] == OP_1 && script[1] == 0x20 {
        return ScriptKind::P2tr;
    }

    // p2pk: <33|65-byte pubkey push> OP_CHECKSIG
    if (n == 35 && script[0] == 33 && script[34] == OP_CHECKSIG)
        || (n == 67 && script[0] == 65 && script[66] == OP_CHECKSIG)
    {
        return ScriptKind::P2pk;
    }

    // bare multisig: OP_m <keys> OP_n OP_CHECKMULTISIG
    if is_bare_multisig(script) {
        return ScriptKind::Multisig;
    }

    if n >= 1 && script[0] == OP_RETURN {
        return ScriptKind::OpReturn;
    }

    ScriptKind::Unknown
}

/// `OP_m <N pushes of 33/65-byte keys> OP_n OP_CHECKMULTISIG` with
/// `1 <= m <= n <= 16` and exactly `n` keys.
fn is_bare_multisig(script: &[u8]) -> bool {
    let n = script.len();
    if n < 4 || script[n - 1] != OP_CHECKMULTISIG {
        return false;
    }
    let m_op = script[0];
    let n_op = script[n - 2];
    if !(OP_1..=OP_16).contains(&m_op) || !(OP_1..=OP_16).contains(&n_op) {
        return false;
    }
    let m = m_op - 0x50;
    let required_keys = n_op - 0x50;
    if m > required_keys {
        return false;
    }

    // walk the key pushes between OP_m and OP_n
    let mut pos = 1;
    let mut keys = 0u8;
    while pos < n - 2 {
        let push = script[pos] as usize;
        if push != 33 && push != 65 {
            return false;
        }
        if pos + 1 + push > n - 2 {
            return false;
        }
        pos += 1 + push;
        keys += 1;
    }
    keys == required_keys
}

/// Classify how an input spends its prevout.
///
/// Requires the prevout's scriptPubKey; taproot and nested-segwit
/// refinements additionally inspect the scriptSig and witness.
pub fn classify_input(prevout_script: &[u8], script_sig: &[u8], witness: &Witness) -> ScriptKind {
    let prevout_kind = classify_output(prevout_script);

    match prevout_kind {
        ScriptKind::P2sh => classify_p2sh_spend(script_sig, witness),
        ScriptKind::P2tr => classify_p2tr_spend(witness),
        other => other,
    }
}

fn classify_p2sh_spend(script_sig: &[u8], witness: &Witness) -> ScriptKind {
    // nested segwit: scriptSig is a single push of the redeem script
    if !witness.items().is_empty() && !script_sig.is_empty() {
        let push_len = script_sig[0] as usize;
        if (0x01..=OP_PUSHBYTES_MAX as usize).contains(&push_len)
            && push_len + 1 == script_sig.len()
        {
            let redeem = &script_sig[1..];
            if redeem.len() == 22 && redeem[0] == OP_0 && redeem[1] == 0x14 {
                return ScriptKind::P2shP2wpkh;
            }
            if redeem.len() == 34 && redeem[0] == OP_0 && redeem[1] == 0x20 {
                return ScriptKind::P2shP2wsh;
            }
        }
    }
    ScriptKind::P2sh
}

fn classify_p2tr_spend(witness: &Witness) -> ScriptKind {
    let items = witness.items();
    if items.len() == 1 {
        return ScriptKind::P2trKeypath;
    }
    // script path: the last item is a control block, 33 + 32k bytes,
    // leading byte 0xc0 or 0xc1
    if let Some(control) = items.last() {
        if !control.is_empty()
            && control[0] & 0xFE == 0xC0
            && control.len() >= 33
            && control.len() % 32 == 1
        {
            return ScriptKind::P2trScriptpath;
        }
    }
    ScriptKind::P2tr
}

/// Disassemble a script into space-joined human-readable tokens.
///
/// Direct pushes render as `OP_PUSHBYTES_N <hex>`; the three OP_PUSHDATA
/// forms render their payload the same way. A push whose declared length
/// runs past the end of the script renders the bytes that are present
/// followed by `OP_INVALID`.
pub fn disassemble(script: &[u8]) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut i = 0;

    while i < script.len() {
        let opcode = script[i];
        i += 1;

        if (0x01..=OP_PUSHBYTES_MAX).contains(&opcode) {
            let len = opcode as usize;
            i = push_token(script, i, len, &format!("OP_PUSHBYTES_{}", len), &mut tokens);
        } else if opcode == OP_PUSHDATA1 {
            if i >= script.len() {
                tokens.push("OP_PUSHDATA1".to_string());
                tokens.push("OP_INVALID".to_string());
                break;
            }
            let len = script[i] as usize;
            i += 1;
            i = push_token(script, i, len, "OP_PUSHDATA1", &mut tokens);
        } else if opcode == OP_PUSHDATA2 {
            if i + 2 > script.len() {
                tokens.push("OP_PUSHDATA2".to_string());
                tokens.push("OP_INVALID".to_string());
                break;
            }
            let len = u16::from_le_bytes([script[i], script[i + 1]]) as usize;
            i += 2;
            i = push_token(script, i, len, "OP_PUSHDATA2", &mut tokens);
        } else if opcode == OP_PUSHDATA4 {
            if i + 4 > script.len() {
                tokens.push("OP_PUSHDATA4".to_string());
                tokens.push("OP_INVALID".to_string());
                break;
            }
            let len =
                u32::from_le_bytes([script[i], script[i + 1], script[i + 2], script[i + 3]])
                    as usize;
            i += 4;
            i = push_token(script, i, len, "OP_PUSHDATA4", &mut tokens);
        } else {
            tokens.push(opcodes::render_opcode(opcode));
        }
    }

    tokens.join(" ")
}

/// Emit one push token, truncating to the available bytes and appending
/// `OP_INVALID` when the declared length runs past the script end.
fn push_token(
    script: &[u8],
    start: usize,
    len: usize,
    mnemonic: &str,
    tokens: &mut Vec<String>,
) -> usize {
    let available = script.len().saturating_sub(start);
    if len > available {
        let consumed = &script[start..];
        if consumed.is_empty() {
            tokens.push(mnemonic.to_string());
        } else {
            tokens.push(format!("{} {}", mnemonic, hex::encode(consumed)));
        }
        tokens.push("OP_INVALID".to_string());
        script.len()
    } else {
        tokens.push(format!(
            "{} {}",
            mnemonic,
            hex::encode(&script[start..start + len])
        ));
        start + len
    }
}

/// Decoded OP_RETURN payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpReturnData {
    pub data_hex: String,
    pub data_utf8: Option<String>,
    pub protocol: OpReturnProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpReturnProtocol {
    Omni,
    Opentimestamps,
    Unknown,
}

/// Decode the data pushes following a leading OP_RETURN.
///
/// All four push forms (and OP_0 as an empty push) are consumed in order;
/// their payloads concatenate into `data`. Anything that is not a push
/// terminates the walk. Returns `None` when the script does not start
/// with OP_RETURN.
pub fn decode_op_return(script: &[u8]) -> Option<OpReturnData> {
    if script.is_empty() || script[0] != OP_RETURN {
        return None;
    }

    let mut data: Vec<u8> = Vec::new();
    let mut i = 1;

    while i < script.len() {
        let opcode = script[i];
        i += 1;

        let len = if (0x01..=OP_PUSHBYTES_MAX).contains(&opcode) {
            opcode as usize
        } else if opcode == OP_PUSHDATA1 {
            if i >= script.len() {
                break;
            }
            let len = script[i] as usize;
            i += 1;
            len
        } else if opcode == OP_PUSHDATA2 {
            if i + 2 > script.len() {
                break;
            }
            let len = u16::from_le_bytes([script[i], script[i + 1]]) as usize;
            i += 2;
            len
        } else if opcode == OP_PUSHDATA4 {
            if i + 4 > script.len() {
                break;
            }
            let len =
                u32::from_le_bytes([script[i], script[i + 1], script[i + 2], script[i + 3]])
                    as usize;
            i += 4;
            len
        } else if opcode == OP_0 {
            0
        } else {
            break;
        };

        let end = (i + len).min(script.len());
        data.extend_from_slice(&script[i..end]);
        i = end;
    }

    let protocol = if data.starts_with(crate::constants::OP_RETURN_PREFIX_OMNI) {
        OpReturnProtocol::Omni
    } else if data.starts_with(crate::constants::OP_RETURN_PREFIX_OPENTIMESTAMPS) {
        OpReturnProtocol::Opentimestamps
    } else {
        OpReturnProtocol::Unknown
    };

    Some(OpReturnData {
        data_hex: hex::encode(&data),
        data_utf8: String::from_utf8(data).ok(),
        protocol,
    })
}
