//! Canonical serialization for deterministic fingerprints.
//!
//! Policy parameter hashes and profile fingerprints are computed from
//! canonical JSON. Struct fields serialize in declaration order, so hashed
//! types must avoid `HashMap` and must quantize floats before hashing
//! (see [`quantize`]).

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Quantization factor applied to floats before hashing.
pub const FLOAT_QUANTIZATION_FACTOR: f64 = 1e12;

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization of plain data cannot fail")
}

/// Compute the xxHash64 of a value's canonical bytes.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute the canonical hash as a 16-digit hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

/// Quantize a float to an integer so the hash is platform independent.
pub fn quantize(value: f64) -> i64 {
    (value * FLOAT_QUANTIZATION_FACTOR).round() as i64
}
