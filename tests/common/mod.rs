//! Shared fixture builders for the integration suites

/// Raw bytes of the genesis coinbase transaction, assembled field by field.
///
/// TXID: 4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b
pub fn genesis_coinbase() -> Vec<u8> {
    let pubkey = hex::decode(
        "04678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4c\
         ef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5f",
    )
    .unwrap();

    let mut script_sig = vec![0x04, 0xff, 0xff, 0x00, 0x1d, 0x01, 0x04, 0x45];
    script_sig.extend_from_slice(
        b"The Times 03/Jan/2009 Chancellor on brink of second bailout for banks",
    );
    assert_eq!(script_sig.len(), 77);

    let mut raw = Vec::new();
    raw.extend_from_slice(&1i32.to_le_bytes());
    raw.push(1);
    raw.extend_from_slice(&[0x00; 32]);
    raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
    raw.push(script_sig.len() as u8);
    raw.extend_from_slice(&script_sig);
    raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
    raw.push(1);
    raw.extend_from_slice(&5_000_000_000u64.to_le_bytes());
    raw.push(67);
    raw.push(65);
    raw.extend_from_slice(&pubkey);
    raw.push(0xac);
    raw.extend_from_slice(&0u32.to_le_bytes());
    assert_eq!(raw.len(), 204);
    raw
}

/// The genesis block exactly as framed inside blk00000.dat.
pub fn genesis_block_file() -> Vec<u8> {
    let coinbase = genesis_coinbase();
    let merkle_root = chain_lens::hashes::double_sha256(&coinbase);

    let mut payload = Vec::new();
    payload.extend_from_slice(&1i32.to_le_bytes());
    payload.extend_from_slice(&[0x00; 32]);
    payload.extend_from_slice(&merkle_root);
    payload.extend_from_slice(&1231006505u32.to_le_bytes());
    payload.extend_from_slice(&0x1d00ffffu32.to_le_bytes());
    payload.extend_from_slice(&2083236893u32.to_le_bytes());
    payload.push(1);
    payload.extend_from_slice(&coinbase);

    let mut file = Vec::new();
    file.extend_from_slice(&[0xf9, 0xbe, 0xb4, 0xd9]);
    file.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    file.extend_from_slice(&payload);
    file
}

/// Legacy p2pkh transaction spending `prev_txid:vout`.
pub fn legacy_p2pkh_tx(prev_txid: [u8; 32], vout: u32, value: u64, hash_fill: u8) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&1i32.to_le_bytes());
    raw.push(1);
    raw.extend_from_slice(&prev_txid);
    raw.extend_from_slice(&vout.to_le_bytes());
    raw.push(0);
    raw.extend_from_slice(&0xffffffffu32.to_le_bytes());
    raw.push(1);
    raw.extend_from_slice(&value.to_le_bytes());
    raw.push(25);
    raw.extend_from_slice(&[0x76, 0xa9, 0x14]);
    raw.extend_from_slice(&[hash_fill; 20]);
    raw.extend_from_slice(&[0x88, 0xac]);
    raw.extend_from_slice(&0u32.to_le_bytes());
    raw
}
