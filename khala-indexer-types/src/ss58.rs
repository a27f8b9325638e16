// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! SS58 address encoding.
//!
//! Bridge and XCM events carry raw 32-byte account ids; records persist the
//! human-readable form under the network's registered address prefix.

use blake2::{Blake2b512, Digest};

/// Domain separator defined by the SS58 format.
const SS58_PREFIX: &[u8] = b"SS58PRE";

/// Encode a 32-byte account id under the given network prefix.
///
/// Prefixes below 64 occupy a single byte; larger registered prefixes use
/// the two-byte form. The checksum is the first two bytes of
/// blake2b-512 over `"SS58PRE" || prefix || account`.
pub fn encode(account: &[u8; 32], prefix: u16) -> String {
    let mut data = Vec::with_capacity(35);
    if prefix < 64 {
        data.push(prefix as u8);
    } else {
        // Two-byte prefix layout per the SS58 registry.
        let ident = prefix & 0b0011_1111_1111_1111;
        data.push(((ident & 0b0000_0000_1111_1100) >> 2) as u8 | 0b0100_0000);
        data.push((ident >> 8) as u8 | ((ident & 0b0000_0000_0000_0011) << 6) as u8);
    }
    data.extend_from_slice(account);

    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(&data);
    let checksum = hasher.finalize();
    data.extend_from_slice(&checksum[..2]);

    bs58::encode(data).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Alice's well-known dev account id.
    const ALICE: [u8; 32] = [
        0xd4, 0x35, 0x93, 0xc7, 0x15, 0xfd, 0xd3, 0x1c, 0x61, 0x14, 0x1a, 0xbd, 0x04, 0xa9,
        0x9f, 0xd6, 0x82, 0x2c, 0x85, 0x58, 0x85, 0x4c, 0xcd, 0xe3, 0x9a, 0x56, 0x84, 0xe7,
        0xa5, 0x6d, 0xa2, 0x7d,
    ];

    #[test]
    fn encodes_generic_substrate_prefix() {
        // Prefix 42 is the generic Substrate network.
        assert_eq!(
            encode(&ALICE, 42),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
    }

    #[test]
    fn prefix_changes_address() {
        let generic = encode(&ALICE, 42);
        let khala = encode(&ALICE, 30);
        assert_ne!(generic, khala);
        // Both decode back to the same 32 bytes + checksum.
        let raw = bs58::decode(&khala).into_vec().unwrap();
        assert_eq!(&raw[1..33], &ALICE);
    }

    #[test]
    fn checksum_is_two_bytes() {
        let raw = bs58::decode(encode(&ALICE, 30)).into_vec().unwrap();
        // 1-byte prefix + 32-byte body + 2-byte checksum.
        assert_eq!(raw.len(), 35);
    }
}
