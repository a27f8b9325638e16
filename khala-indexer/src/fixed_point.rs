// Copyright (c) Khala Indexer Team
// SPDX-License-Identifier: Apache-2.0

//! 64.64 fixed-point payout decoding.
//!
//! Worker settlement events carry the payout as a 128-bit value: the high
//! 64 bits are the integer part, the low 64 bits the fractional part. The
//! chain's documented interpretation of the fractional word is its base-10
//! digit string appended after the decimal point - NOT a fraction of 2^64 -
//! and records reproduce that interpretation verbatim. The result is scaled
//! to 10^12 minor units and truncated.
//!
//! All arithmetic is integer-exact; no step may round through a float.

use khala_indexer_types::Balance;
use primitive_types::U256;

/// Minor units per whole token (12 decimals).
pub const DECIMAL_SCALE: u128 = 1_000_000_000_000;

/// Decode a 64.64-encoded payout into minor units.
pub fn decode_fixed_point(v: u128) -> Balance {
    let int_part = v >> 64;
    let frac_part = v as u64;

    // The fractional digits are the decimal rendering of the low word, so a
    // low word of 1 means ".1", not ".000...1". No zero padding beyond what
    // the decimal conversion produces.
    let frac_digits = frac_part.to_string();
    let frac_scale = U256::from(10u8).pow(U256::from(frac_digits.len()));

    let scaled_int = U256::from(int_part) * U256::from(DECIMAL_SCALE);
    // Truncating division: fractional digits beyond the 12th are dropped.
    let scaled_frac = U256::from(frac_part) * U256::from(DECIMAL_SCALE) / frac_scale;

    (scaled_int + scaled_frac).as_u128()
}
