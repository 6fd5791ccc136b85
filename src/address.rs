//! Address derivation: Base58Check, Bech32 (BIP173), Bech32m (BIP350)

use crate::constants::*;
use crate::error::{LensError, Result};
use crate::hashes::double_sha256;
use crate::types::{Network, ScriptKind};

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32_CONST: u32 = 1;
const BECH32M_CONST: u32 = 0x2bc8_30a3;

impl Network {
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Network::Mainnet => BASE58_VERSION_P2PKH_MAINNET,
            Network::Testnet => BASE58_VERSION_P2PKH_TESTNET,
        }
    }

    pub fn p2sh_version(self) -> u8 {
        match self {
            Network::Mainnet => BASE58_VERSION_P2SH_MAINNET,
            Network::Testnet => BASE58_VERSION_P2SH_TESTNET,
        }
    }

    pub fn hrp(self) -> &'static str {
        match self {
            Network::Mainnet => BECH32_HRP_MAINNET,
            Network::Testnet => BECH32_HRP_TESTNET,
        }
    }
}

/// Base58Check-encode `payload` (version byte already prepended).
///
/// The 4-byte checksum is the leading bytes of dSHA256(payload); each
/// leading zero byte of the checksummed input becomes a leading `1`.
pub fn base58check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum[..4]);

    // repeated division by 58 over the big-endian byte string
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
    for &byte in &data {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut encoded = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        encoded.push('1');
    }
    for &digit in digits.iter().rev() {
        encoded.push(BASE58_ALPHABET[digit as usize] as char);
    }
    encoded
}

fn bech32_polymod(values: &[u8]) -> u32 {
    const GEN: [u32; 5] = [
        0x3b6a_57b2,
        0x2650_8e6d,
        0x1ea1_19fa,
        0x3d42_33dd,
        0x2a14_62b3,
    ];
    let mut chk: u32 = 1;
    for &value in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ value as u32;
        for (i, generator) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= generator;
            }
        }
    }
    chk
}

fn bech32_hrp_expand(hrp: &str) -> Vec<u8> {
    let mut expanded: Vec<u8> = hrp.bytes().map(|b| b >> 5).collect();
    expanded.push(0);
    expanded.extend(hrp.bytes().map(|b| b & 31));
    expanded
}

/// Regroup 8-bit bytes into 5-bit values, padding the tail.
fn convert_to_5bit(data: &[u8]) -> Vec<u8> {
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * 8 / 5 + 1);
    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(((acc >> bits) & 31) as u8);
        }
    }
    if bits > 0 {
        out.push(((acc << (5 - bits)) & 31) as u8);
    }
    out
}

/// Encode a segwit address per BIP173 (v0) or BIP350 (v1+).
///
/// Program length must be 20 or 32 for witness v0 and 2..=40 for later
/// versions; anything else is `UnsupportedWitnessVersion`.
pub fn segwit_address(hrp: &str, witness_version: u8, program: &[u8]) -> Result<String> {
    if witness_version > 16 {
        return Err(LensError::UnsupportedWitnessVersion(format!(
            "witness version {} out of range",
            witness_version
        )));
    }
    match witness_version {
        0 => {
            if program.len() != 20 && program.len() != 32 {
                return Err(LensError::UnsupportedWitnessVersion(format!(
                    "v0 program must be 20 or 32 bytes, got {}",
                    program.len()
                )));
            }
        }
        _ => {
            if program.len() < 2 || program.len() > 40 {
                return Err(LensError::UnsupportedWitnessVersion(format!(
                    "v{} program must be 2..=40 bytes, got {}",
                    witness_version,
                    program.len()
                )));
            }
        }
    }

    let spec_const = if witness_version == 0 {
        BECH32_CONST
    } else {
        BECH32M_CONST
    };

    let mut data = vec![witness_version];
    data.extend(convert_to_5bit(program));

    // checksum over expanded hrp + data + six zero groups
    let mut values = bech32_hrp_expand(hrp);
    values.extend_from_slice(&data);
    values.extend_from_slice(&[0; 6]);
    let polymod = bech32_polymod(&values) ^ spec_const;

    let mut address = String::with_capacity(hrp.len() + 1 + data.len() + 6);
    address.push_str(hrp);
    address.push('1');
    for &group in &data {
        address.push(BECH32_CHARSET[group as usize] as char);
    }
    for i in 0..6 {
        let group = (polymod >> (5 * (5 - i))) & 31;
        address.push(BECH32_CHARSET[group as usize] as char);
    }
    Ok(address)
}

/// Verify the checksum of a segwit address against an expected HRP.
///
/// Used by tests and round-trip checks; returns the spec constant the
/// checksum satisfies.
pub fn verify_segwit_checksum(address: &str, expected_hrp: &str) -> Result<u32> {
    let (hrp, data_part) = address
        .rsplit_once('1')
        .ok_or_else(|| LensError::InvalidEncoding("missing separator".to_string()))?;
    if hrp != expected_hrp {
        return Err(LensError::InvalidEncoding(format!(
            "hrp {} does not match expected {}",
            hrp, expected_hrp
        )));
    }
    let mut values = bech32_hrp_expand(hrp);
    for ch in data_part.bytes() {
        let index = BECH32_CHARSET
            .iter()
            .position(|&c| c == ch.to_ascii_lowercase())
            .ok_or_else(|| {
                LensError::InvalidEncoding(format!("invalid data character {}", ch as char))
            })?;
        values.push(index as u8);
    }
    let polymod = bech32_polymod(&values);
    if polymod == BECH32_CONST || polymod == BECH32M_CONST {
        Ok(polymod)
    } else {
        Err(LensError::InvalidEncoding(
            "checksum verification failed".to_string(),
        ))
    }
}

/// Derive the address for a classified scriptPubKey, when one exists.
///
/// p2pk, bare multisig, op_return and unknown scripts have no address.
pub fn derive_address(kind: ScriptKind, script: &[u8], network: Network) -> Option<String> {
    match kind {
        ScriptKind::P2pkh => {
            let mut payload = vec![network.p2pkh_version()];
            payload.extend_from_slice(&script[3..23]);
            Some(base58check_encode(&payload))
        }
        ScriptKind::P2sh => {
            let mut payload = vec![network.p2sh_version()];
            payload.extend_from_slice(&script[2..22]);
            Some(base58check_encode(&payload))
        }
        ScriptKind::P2wpkh => segwit_address(network.hrp(), 0, &script[2..22]).ok(),
        ScriptKind::P2wsh => segwit_address(network.hrp(), 0, &script[2..34]).ok(),
        ScriptKind::P2tr => segwit_address(network.hrp(), 1, &script[2..34]).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashes::hash160;

    // the coinbase pubkey of the genesis block
    const GENESIS_PUBKEY_HEX: &str = "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f";

    #[test]
    fn test_base58check_genesis_pubkey_hash() {
        let pubkey = hex::decode(GENESIS_PUBKEY_HEX).unwrap();
        let mut payload = vec![0x00];
        payload.extend_from_slice(&hash160(&pubkey));
        assert_eq!(
            base58check_encode(&payload),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );
    }

    #[test]
    fn test_base58check_leading_zero_bytes() {
        let mut payload = vec![0x00, 0x00, 0x00];
        payload.extend_from_slice(&[0x01; 18]);
        let encoded = base58check_encode(&payload);
        assert!(encoded.starts_with("111"));
        assert!(!encoded.starts_with("1111"));
    }

    #[test]
    fn test_bech32_bip173_vector() {
        // BIP173: hash160 of the generator-point pubkey
        let program = hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        assert_eq!(
            segwit_address("bc", 0, &program).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn test_bech32_testnet_hrp() {
        let program = [0x00; 20];
        let address = segwit_address("tb", 0, &program).unwrap();
        assert!(address.starts_with("tb1q"));
        assert_eq!(verify_segwit_checksum(&address, "tb").unwrap(), BECH32_CONST);
    }

    #[test]
    fn test_bech32m_taproot_shape() {
        let program = [0xab; 32];
        let address = segwit_address("bc", 1, &program).unwrap();
        // v1 data group 'p', 32-byte program => 62 characters total
        assert!(address.starts_with("bc1p"));
        assert_eq!(address.len(), 62);
        assert_eq!(
            verify_segwit_checksum(&address, "bc").unwrap(),
            BECH32M_CONST
        );
    }

    #[test]
    fn test_segwit_program_length_constraints() {
        assert!(segwit_address("bc", 0, &[0x00; 21]).is_err());
        assert!(segwit_address("bc", 1, &[0x00; 1]).is_err());
        assert!(segwit_address("bc", 1, &[0x00; 41]).is_err());
        assert!(segwit_address("bc", 17, &[0x00; 32]).is_err());
        assert!(segwit_address("bc", 1, &[0x00; 2]).is_ok());
    }

    #[test]
    fn test_checksum_rejects_mutation() {
        let program = [0x11; 20];
        let address = segwit_address("bc", 0, &program).unwrap();
        let mut corrupted = address.into_bytes();
        let last = *corrupted.last().unwrap();
        *corrupted.last_mut().unwrap() = if last == b'q' { b'p' } else { b'q' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(verify_segwit_checksum(&corrupted, "bc").is_err());
    }

    #[test]
    fn test_derive_address_per_kind() {
        let mut p2pkh = vec![0x76, 0xa9, 0x14];
        p2pkh.extend_from_slice(&[0x22; 20]);
        p2pkh.extend_from_slice(&[0x88, 0xac]);
        let address = derive_address(ScriptKind::P2pkh, &p2pkh, Network::Mainnet).unwrap();
        assert!(address.starts_with('1'));

        let testnet = derive_address(ScriptKind::P2pkh, &p2pkh, Network::Testnet).unwrap();
        assert!(testnet.starts_with('m') || testnet.starts_with('n'));

        let mut p2sh = vec![0xa9, 0x14];
        p2sh.extend_from_slice(&[0x33; 20]);
        p2sh.push(0x87);
        let address = derive_address(ScriptKind::P2sh, &p2sh, Network::Mainnet).unwrap();
        assert!(address.starts_with('3'));

        let mut p2tr = vec![0x51, 0x20];
        p2tr.extend_from_slice(&[0x77; 32]);
        let address = derive_address(ScriptKind::P2tr, &p2tr, Network::Mainnet).unwrap();
        assert!(address.starts_with("bc1p"));

        assert_eq!(derive_address(ScriptKind::OpReturn, &[0x6a], Network::Mainnet), None);
        assert_eq!(derive_address(ScriptKind::Unknown, &[], Network::Mainnet), None);
    }
}
