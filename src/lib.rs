//! Cardscan - card identification against a closed catalog
//!
//! This library identifies a physical game card from a photographed region
//! by combining a 64-bit perceptual difference hash with phase-ordered
//! fuzzy text matching over the card catalog, then fusing both signals into
//! one ranked identification with a calibrated confidence tier.
//!
//! OCR and vision-model detection stay outside the crate: any engine that
//! satisfies the boundary types in [`ocr`] is interchangeable.

pub mod candidates;
pub mod config;
pub mod error;
pub mod fusion;
pub mod hash;
pub mod hash_matcher;
pub mod index;
pub mod loader;
pub mod ocr;
pub mod text_matcher;

// Re-export main types for convenience
pub use config::MatchConfig;
pub use error::{ScanError, ScanResult};
pub use fusion::{
    CardIdentifier, ConfidenceTier, IdentificationOutcome, IdentificationResult, MatchSource,
    RegionScan, ScanDiagnostics,
};
pub use hash::{
    compute_hash, compute_hash_from_path, hamming_distance, hamming_distance_bytes, CardHash,
};
pub use hash_matcher::{HashMatchCandidate, HashMatcher};
pub use index::{CardIndex, CardIndexEntry, CardSide, CardType, SharedIndex};
pub use loader::{
    load_index_from_file, load_index_from_file_async, load_index_from_json,
    load_index_with_catalog,
};
pub use ocr::{DetectedRegion, OcrExtraction};
pub use text_matcher::{
    MatchQuality, MatchedOn, SearchPhase, TextMatchCandidate, TextMatcher, TextSearchReport,
};
