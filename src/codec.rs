//! Register codec: converts Modbus 16-bit register words to/from typed
//! scalars and applies SMA scaling (§4.1).

use crate::error::{FusewattError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Modbus register datatype tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DType {
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
}

/// SMA scaling applied after decoding the raw integer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum Scaling {
    Fix0,
    Fix1,
    Fix2,
    Fix3,
    Temp,
    /// Lookup table mapping a raw integer value to a named tag
    TagList(HashMap<i64, String>),
}

/// A decoded register value, kept as either an integer (FIX0 / no scaling) or
/// a real number (FIX1-3 / TEMP), or a resolved tag (tag-list mapping).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Real(f64),
    Tag(String),
}

/// Number of 16-bit words a given dtype occupies on the wire (§4.1).
pub fn words_for(dtype: DType) -> usize {
    match dtype {
        DType::U16 | DType::S16 => 1,
        DType::U32 | DType::S32 => 2,
        DType::U64 | DType::S64 => 4,
    }
}

/// Decode big-endian register words into a raw (unscaled) signed 64-bit integer,
/// sign-extending for signed dtypes.
fn decode_raw(dtype: DType, words: &[u16]) -> Result<i64> {
    let expected = words_for(dtype);
    if words.len() != expected {
        return Err(FusewattError::programmer(format!(
            "expected {expected} words for {dtype:?}, got {}",
            words.len()
        )));
    }

    match dtype {
        DType::U16 => Ok(words[0] as i64),
        DType::S16 => Ok(words[0] as i16 as i64),
        DType::U32 => {
            let raw = ((words[0] as u32) << 16) | (words[1] as u32);
            Ok(raw as i64)
        }
        DType::S32 => {
            let raw = ((words[0] as u32) << 16) | (words[1] as u32);
            Ok(raw as i32 as i64)
        }
        DType::U64 => {
            let raw = ((words[0] as u64) << 48)
                | ((words[1] as u64) << 32)
                | ((words[2] as u64) << 16)
                | (words[3] as u64);
            Ok(raw as i64)
        }
        DType::S64 => {
            let raw = ((words[0] as u64) << 48)
                | ((words[1] as u64) << 32)
                | ((words[2] as u64) << 16)
                | (words[3] as u64);
            Ok(raw as i64)
        }
    }
}

/// Decode register words into a scaled scalar (§4.1).
pub fn decode(dtype: DType, words: &[u16], scaling: Option<&Scaling>) -> Result<Scalar> {
    let raw = decode_raw(dtype, words)?;

    match scaling {
        None | Some(Scaling::Fix0) => Ok(Scalar::Int(raw)),
        Some(Scaling::Fix1) => Ok(Scalar::Real(raw as f64 / 10.0)),
        Some(Scaling::Fix2) => Ok(Scalar::Real(raw as f64 / 100.0)),
        Some(Scaling::Fix3) => Ok(Scalar::Real(raw as f64 / 1000.0)),
        Some(Scaling::Temp) => Ok(Scalar::Real(raw as f64 / 10.0)),
        Some(Scaling::TagList(map)) => map
            .get(&raw)
            .cloned()
            .map(Scalar::Tag)
            .ok_or_else(|| FusewattError::programmer(format!("no tag-list mapping for value {raw}"))),
    }
}

/// Split a signed 32-bit watt value into two big-endian 16-bit words (§4.1),
/// used for the 40149 rendement write.
pub fn encode_s32(watts: i32) -> [u16; 2] {
    let raw = watts as u32;
    [(raw >> 16) as u16, (raw & 0xFFFF) as u16]
}

impl Scalar {
    /// Extract the value as `f64`, regardless of whether it decoded as an
    /// integer or a real number. Panics-free fallback of 0.0 for tags.
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Real(v) => *v,
            Scalar::Tag(_) => 0.0,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Scalar::Int(v) => *v,
            Scalar::Real(v) => *v as i64,
            Scalar::Tag(_) => 0,
        }
    }
}
