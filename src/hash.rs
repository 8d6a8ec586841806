//! Perceptual difference hash (dHash) for card images
//!
//! The codec reduces an image to a 9x8 grayscale grid and emits one bit per
//! horizontal brightness gradient: 64 bits packed MSB-first into 8 bytes.
//! The hash is resolution-invariant for near-identical images and
//! deliberately insensitive to color shifts; target images are flat printed
//! cards photographed near-frontally, so structural gradients are the signal
//! that survives lighting and white-balance changes.

use crate::error::{ScanError, ScanResult};
use image::{imageops::FilterType, DynamicImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed hash width in bytes
pub const HASH_BYTES: usize = 8;
/// Fixed hash width in bits
pub const HASH_BITS: u32 = 64;

const GRID_WIDTH: u32 = 9;
const GRID_HEIGHT: u32 = 8;

/// A 64-bit perceptual difference hash of a card image
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardHash([u8; HASH_BYTES]);

impl CardHash {
    /// Wrap a fixed 8-byte hash value
    pub fn from_bytes(bytes: [u8; HASH_BYTES]) -> Self {
        CardHash(bytes)
    }

    /// Validate and wrap a hash from a byte slice of unchecked length
    pub fn try_from_slice(bytes: &[u8]) -> ScanResult<Self> {
        let arr: [u8; HASH_BYTES] = bytes.try_into().map_err(|_| {
            ScanError::custom(format!(
                "hash must be exactly {} bytes, got {}",
                HASH_BYTES,
                bytes.len()
            ))
        })?;
        Ok(CardHash(arr))
    }

    /// Parse a hash from its 16-character hex representation
    pub fn from_hex(s: &str) -> ScanResult<Self> {
        let bytes = hex::decode(s.trim())?;
        Self::try_from_slice(&bytes)
    }

    /// Hex representation, as carried by the catalog hash index
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes, MSB-first row packing
    pub fn as_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }
}

impl fmt::Debug for CardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardHash({})", self.to_hex())
    }
}

impl fmt::Display for CardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the 64-bit difference hash of an image.
///
/// The source is resized to 9x8 ignoring aspect ratio, converted to
/// grayscale with the standard luma weighting (0.299 R + 0.587 G + 0.114 B),
/// and each of the 8 cells per row is compared against its immediate right
/// neighbor: bit set when the left pixel is brighter.
pub fn compute_hash(image: &DynamicImage) -> CardHash {
    let scaled = image
        .resize_exact(GRID_WIDTH, GRID_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut luma = [[0f32; GRID_WIDTH as usize]; GRID_HEIGHT as usize];
    for (y, row) in luma.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            let p = scaled.get_pixel(x as u32, y as u32);
            *cell = 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]);
        }
    }

    let mut bytes = [0u8; HASH_BYTES];
    for (row, packed) in bytes.iter_mut().enumerate() {
        let mut byte = 0u8;
        for col in 0..(GRID_WIDTH as usize - 1) {
            byte <<= 1;
            if luma[row][col] > luma[row][col + 1] {
                byte |= 1;
            }
        }
        *packed = byte;
    }

    CardHash(bytes)
}

/// Decode an image file from disk and hash it
pub fn compute_hash_from_path<P: AsRef<std::path::Path>>(path: P) -> ScanResult<CardHash> {
    let image = image::open(path)?;
    Ok(compute_hash(&image))
}

/// Hamming distance between two hashes: XOR then popcount, 0..=64
pub fn hamming_distance(a: &CardHash, b: &CardHash) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum()
}

/// Hamming distance over raw byte slices.
///
/// A length mismatch is not expected from catalog data but is treated as
/// maximum distance rather than an error, keeping the fusion pipeline total
/// when an upstream producer hands over a malformed hash.
pub fn hamming_distance_bytes(a: &[u8], b: &[u8]) -> u32 {
    if a.len() != HASH_BYTES || b.len() != HASH_BYTES {
        return HASH_BITS;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}
