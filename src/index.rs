//! Immutable card index: the closed catalog every scan is matched against
//!
//! The index is loaded once, validated at the boundary, and shared read-only
//! by both matchers for the lifetime of a session. Concurrent first-time
//! loads share a single in-flight load through [`SharedIndex`] instead of a
//! module-global cache.

use crate::error::{ScanError, ScanResult};
use crate::hash::CardHash;
use crate::loader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;

/// Closed enumeration of card kinds in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Refinery,
    Generator,
    Resource,
    Blueprint,
    Event,
}

impl CardType {
    /// All catalog card kinds
    pub const ALL: [CardType; 5] = [
        CardType::Refinery,
        CardType::Generator,
        CardType::Resource,
        CardType::Blueprint,
        CardType::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardType::Refinery => "refinery",
            CardType::Generator => "generator",
            CardType::Resource => "resource",
            CardType::Blueprint => "blueprint",
            CardType::Event => "event",
        }
    }

    /// Parse the exact catalog type string
    pub fn parse(s: &str) -> ScanResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "refinery" => Ok(CardType::Refinery),
            "generator" => Ok(CardType::Generator),
            "resource" => Ok(CardType::Resource),
            "blueprint" => Ok(CardType::Blueprint),
            "event" => Ok(CardType::Event),
            other => Err(ScanError::catalog_unavailable(format!(
                "unknown card type in index: {:?}",
                other
            ))),
        }
    }

    /// Match noisy OCR type text against the fixed keyword table.
    ///
    /// The patterns are deliberately short prefixes ("refin", "gen") so a
    /// partially garbled type line still resolves.
    pub fn from_keyword(text: &str) -> Option<Self> {
        let table = keyword_table();
        table
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, card_type)| *card_type)
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn keyword_table() -> &'static [(Regex, CardType)] {
    static TABLE: OnceLock<Vec<(Regex, CardType)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        // Patterns are fixed literals; compilation cannot fail.
        [
            (r"(?i)refin", CardType::Refinery),
            (r"(?i)gen(?:erat)?", CardType::Generator),
            (r"(?i)resourc", CardType::Resource),
            (r"(?i)blue\s*print", CardType::Blueprint),
            (r"(?i)event", CardType::Event),
        ]
        .into_iter()
        .filter_map(|(pattern, card_type)| Regex::new(pattern).ok().map(|re| (re, card_type)))
        .collect()
    })
}

/// Face designator for double-sided cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSide {
    Front,
    Back,
}

impl CardSide {
    pub fn parse(s: &str) -> ScanResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "front" => Ok(CardSide::Front),
            "back" => Ok(CardSide::Back),
            other => Err(ScanError::catalog_unavailable(format!(
                "unknown card side in index: {:?}",
                other
            ))),
        }
    }
}

/// One physical card face in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardIndexEntry {
    /// Stable catalog key, unique per physical face
    pub card_id: String,
    /// Source image filename in the catalog
    pub filename: String,
    /// Face designator, when the card is double-sided
    pub side: Option<CardSide>,
    pub card_type: CardType,
    /// Display name used for text matching
    pub name: String,
    /// Precomputed 64-bit difference hash
    pub hash: CardHash,
    /// Cross-reference to the alternate face, resolved from the catalog
    pub back_id: Option<String>,
}

/// Immutable, load-once catalog index
#[derive(Debug, Clone)]
pub struct CardIndex {
    entries: Vec<CardIndexEntry>,
    by_id: HashMap<String, usize>,
}

impl CardIndex {
    /// Build an index from validated entries, enforcing card-id uniqueness
    pub fn new(entries: Vec<CardIndexEntry>) -> ScanResult<Self> {
        let mut by_id = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.card_id.clone(), pos).is_some() {
                return Err(ScanError::catalog_unavailable(format!(
                    "duplicate card id in index: {:?}",
                    entry.card_id
                )));
            }
        }
        Ok(CardIndex { entries, by_id })
    }

    pub fn entries(&self) -> &[CardIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve full metadata for an identified card id
    pub fn find_by_id(&self, id: &str) -> Option<&CardIndexEntry> {
        self.by_id.get(id).map(|&pos| &self.entries[pos])
    }

    /// All entries of one card type
    pub fn filter_by_type(&self, card_type: CardType) -> Vec<&CardIndexEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.card_type == card_type)
            .collect()
    }

    /// All entries whose type is in the active set
    pub fn filter_by_active_types(&self, active: &HashSet<CardType>) -> Vec<&CardIndexEntry> {
        self.entries
            .iter()
            .filter(|entry| active.contains(&entry.card_type))
            .collect()
    }
}

/// Single-flight handle for the one-time asynchronous index load.
///
/// Concurrent first-time callers all await the same in-flight load; once
/// resolved, every caller shares the same `Arc<CardIndex>`. A failed load
/// leaves the cell empty so a later call can retry, and never exposes a
/// partial catalog.
#[derive(Debug, Clone)]
pub struct SharedIndex {
    path: PathBuf,
    cell: Arc<OnceCell<Arc<CardIndex>>>,
}

impl SharedIndex {
    /// Create a handle backed by a JSON hash index file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        SharedIndex {
            path: path.as_ref().to_path_buf(),
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Load the index if this is the first call, otherwise return the
    /// already-resolved shared instance. Idempotent.
    pub async fn get(&self) -> ScanResult<Arc<CardIndex>> {
        let index = self
            .cell
            .get_or_try_init(|| async {
                let index = loader::load_index_from_file_async(&self.path).await?;
                tracing::info!(entries = index.len(), path = %self.path.display(), "card index loaded");
                Ok::<_, ScanError>(Arc::new(index))
            })
            .await?;
        Ok(Arc::clone(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, card_type: CardType, name: &str, hash: [u8; 8]) -> CardIndexEntry {
        CardIndexEntry {
            card_id: id.to_string(),
            filename: format!("{id}.png"),
            side: None,
            card_type,
            name: name.to_string(),
            hash: CardHash::from_bytes(hash),
            back_id: None,
        }
    }

    #[test]
    fn test_type_parse_round_trip() {
        for card_type in CardType::ALL {
            assert_eq!(CardType::parse(card_type.as_str()).unwrap(), card_type);
        }
        assert!(matches!(
            CardType::parse("energy"),
            Err(ScanError::CatalogUnavailable { .. })
        ));
    }

    #[test]
    fn test_keyword_table() {
        assert_eq!(CardType::from_keyword("Refinery"), Some(CardType::Refinery));
        assert_eq!(CardType::from_keyword("refiner"), Some(CardType::Refinery));
        // OCR often truncates; a bare prefix still resolves.
        assert_eq!(CardType::from_keyword("REFIN3RY"), Some(CardType::Refinery));
        assert_eq!(CardType::from_keyword("generator"), Some(CardType::Generator));
        assert_eq!(CardType::from_keyword("gen."), Some(CardType::Generator));
        assert_eq!(CardType::from_keyword("blue print"), Some(CardType::Blueprint));
        assert_eq!(CardType::from_keyword("solar furnace"), None);
        assert_eq!(CardType::from_keyword(""), None);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!(CardSide::parse("Front").unwrap(), CardSide::Front);
        assert_eq!(CardSide::parse("back").unwrap(), CardSide::Back);
        assert!(CardSide::parse("top").is_err());
    }

    #[test]
    fn test_index_lookup_and_filters() {
        let index = CardIndex::new(vec![
            entry("ref-001", CardType::Refinery, "Solar Furnace", [1; 8]),
            entry("ref-002", CardType::Refinery, "Ore Smelter", [2; 8]),
            entry("gen-001", CardType::Generator, "Wind Turbine", [3; 8]),
        ])
        .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.find_by_id("ref-002").unwrap().name, "Ore Smelter");
        assert!(index.find_by_id("missing").is_none());

        assert_eq!(index.filter_by_type(CardType::Refinery).len(), 2);
        assert_eq!(index.filter_by_type(CardType::Event).len(), 0);

        let active: HashSet<CardType> =
            [CardType::Refinery, CardType::Event].into_iter().collect();
        assert_eq!(index.filter_by_active_types(&active).len(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let result = CardIndex::new(vec![
            entry("ref-001", CardType::Refinery, "Solar Furnace", [1; 8]),
            entry("ref-001", CardType::Refinery, "Solar Furnace II", [2; 8]),
        ]);
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_shared_index_missing_file_is_catalog_failure() {
        let shared = SharedIndex::new("/nonexistent/index.json");
        let result = shared.get().await;
        assert!(result.is_err());
    }
}
