//! Stable names for fragment clones
//!
//! A clone is named after the arguments applied to it, so two spreads with
//! the same arguments share one clone. The name suffix is a MurmurHash3
//! (x86, 32-bit) of the sorted JSON of the arguments, rendered in base 62.

use std::collections::BTreeMap;

use anyhow::Result;

const BASE62: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// MurmurHash3 x86 32-bit over the UTF-16 code units of `key`
///
/// Each code unit contributes its low byte, which keeps hashes identical to
/// the ones the JavaScript runtime computes.
pub fn murmur3_32(key: &str, seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let bytes: Vec<u8> = key.encode_utf16().map(|unit| (unit & 0xff) as u8).collect();
    let mut hash = seed;

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        hash ^= k;
        hash = hash.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, byte) in tail.iter().enumerate() {
            k ^= (*byte as u32) << (8 * i);
        }
        k = k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        hash ^= k;
    }

    hash ^= bytes.len() as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}

/// Render in base 62, most significant digit first
pub fn base62(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE62[(value % 62) as usize]);
        value /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Suffix for a clone with the given applied arguments (name -> raw text)
pub fn arguments_hash(arguments: &BTreeMap<String, String>) -> Result<String> {
    let json = serde_json::to_string(arguments)?;
    Ok(base62(murmur3_32(&json, 0)))
}
