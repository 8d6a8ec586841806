//! Nearest-neighbor hash lookup over the card index
//!
//! A plain linear Hamming scan: the catalog tops out in the low thousands
//! of entries, so no indexing structure earns its keep here.

use crate::config::MatchConfig;
use crate::hash::{self, CardHash, HASH_BITS};
use crate::index::CardIndex;
use serde::Serialize;
use std::sync::Arc;

/// One hash neighbor within the acceptance bound
#[derive(Debug, Clone, Serialize)]
pub struct HashMatchCandidate {
    pub card_id: String,
    /// Raw Hamming distance, 0..=64
    pub distance: u32,
    /// `distance / 64`, on the same 0-is-perfect scale as text scores
    pub normalized_score: f32,
}

impl HashMatchCandidate {
    fn new(card_id: &str, distance: u32) -> Self {
        HashMatchCandidate {
            card_id: card_id.to_string(),
            distance,
            normalized_score: distance as f32 / HASH_BITS as f32,
        }
    }
}

/// Hamming nearest-neighbor matcher over the read-only card index
#[derive(Debug, Clone)]
pub struct HashMatcher {
    index: Arc<CardIndex>,
    config: MatchConfig,
}

impl HashMatcher {
    pub fn new(index: Arc<CardIndex>, config: MatchConfig) -> Self {
        HashMatcher { index, config }
    }

    /// All entries within the acceptance distance, ascending, capped
    pub fn search(&self, query: &CardHash) -> Vec<HashMatchCandidate> {
        let mut candidates: Vec<HashMatchCandidate> = self
            .index
            .entries()
            .iter()
            .map(|entry| {
                HashMatchCandidate::new(&entry.card_id, hash::hamming_distance(&entry.hash, query))
            })
            .filter(|candidate| candidate.distance <= self.config.hash_accept_distance)
            .collect();

        candidates.sort_by(|a, b| a.distance.cmp(&b.distance));
        candidates.truncate(self.config.max_candidates);
        candidates
    }

    /// Single nearest neighbor with no acceptance bound. Fusion uses this
    /// to tell "hash too weak" apart from "no signal at all" when nothing
    /// clears the acceptance distance.
    pub fn nearest(&self, query: &CardHash) -> Option<HashMatchCandidate> {
        self.index
            .entries()
            .iter()
            .map(|entry| {
                HashMatchCandidate::new(&entry.card_id, hash::hamming_distance(&entry.hash, query))
            })
            .min_by_key(|candidate| candidate.distance)
    }

    /// Search from a raw byte slice as handed over by an upstream producer.
    /// A malformed length degrades to maximum distance (and therefore no
    /// candidates) instead of erroring, keeping the pipeline total.
    pub fn search_bytes(&self, query: &[u8]) -> Vec<HashMatchCandidate> {
        match CardHash::try_from_slice(query) {
            Ok(hash) => self.search(&hash),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{CardIndexEntry, CardType};

    fn entry(id: &str, hash: [u8; 8]) -> CardIndexEntry {
        CardIndexEntry {
            card_id: id.to_string(),
            filename: format!("{id}.png"),
            side: None,
            card_type: CardType::Resource,
            name: id.to_string(),
            hash: CardHash::from_bytes(hash),
            back_id: None,
        }
    }

    /// Hash with the first `bits` bits set
    fn hash_with_bits(bits: u32) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        for bit in 0..bits {
            bytes[(bit / 8) as usize] |= 0x80 >> (bit % 8);
        }
        bytes
    }

    fn matcher() -> HashMatcher {
        let index = CardIndex::new(vec![
            entry("exact", hash_with_bits(0)),
            entry("near", hash_with_bits(3)),
            entry("edge", hash_with_bits(21)),
            entry("far", hash_with_bits(30)),
        ])
        .unwrap();
        HashMatcher::new(Arc::new(index), MatchConfig::default())
    }

    #[test]
    fn test_sorted_ascending_within_bound() {
        let query = CardHash::from_bytes([0; 8]);
        let results = matcher().search(&query);

        // distance 30 exceeds the acceptance bound of 21.
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].card_id, "exact");
        assert_eq!(results[0].distance, 0);
        assert_eq!(results[1].card_id, "near");
        assert_eq!(results[1].distance, 3);
        assert_eq!(results[2].card_id, "edge");
        assert_eq!(results[2].distance, 21);
    }

    #[test]
    fn test_normalized_score() {
        let query = CardHash::from_bytes([0; 8]);
        let results = matcher().search(&query);
        assert!((results[1].normalized_score - 3.0 / 64.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_no_neighbors() {
        let query = CardHash::from_bytes([0xFF; 8]);
        let index = CardIndex::new(vec![entry("only", [0; 8])]).unwrap();
        let matcher = HashMatcher::new(Arc::new(index), MatchConfig::default());
        assert!(matcher.search(&query).is_empty());
    }

    #[test]
    fn test_cap() {
        let entries: Vec<CardIndexEntry> =
            (0..25).map(|i| entry(&format!("card-{i}"), [0; 8])).collect();
        let matcher = HashMatcher::new(
            Arc::new(CardIndex::new(entries).unwrap()),
            MatchConfig::default(),
        );
        let results = matcher.search(&CardHash::from_bytes([0; 8]));
        assert_eq!(results.len(), 10);
    }

    #[test]
    fn test_nearest_ignores_acceptance_bound() {
        let query = CardHash::from_bytes([0xFF; 8]);
        let index = CardIndex::new(vec![entry("only", hash_with_bits(34))]).unwrap();
        let matcher = HashMatcher::new(Arc::new(index), MatchConfig::default());

        assert!(matcher.search(&query).is_empty());
        let nearest = matcher.nearest(&query).unwrap();
        assert_eq!(nearest.card_id, "only");
        assert_eq!(nearest.distance, 30);
    }

    #[test]
    fn test_malformed_bytes_yield_nothing() {
        let m = matcher();
        assert!(m.search_bytes(&[0u8; 4]).is_empty());
        assert!(m.search_bytes(&[]).is_empty());
        // Well-formed bytes behave like a normal search.
        assert_eq!(m.search_bytes(&[0u8; 8]).len(), 3);
    }
}
