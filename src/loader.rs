//! Loading the catalog hash index and card catalog from JSON
//!
//! The hash index is an ordered collection of objects carrying both a hex
//! `hash` string and an authoritative `hashBytes` array; both must encode
//! the same 64 bits or the load fails. The card catalog supplies full
//! metadata per id, including cross-references to alternate faces.
//!
//! Any retrieval or parse failure surfaces as `CatalogUnavailable`: the
//! caller never sees a partial catalog.

use crate::error::{ScanError, ScanResult};
use crate::hash::{CardHash, HASH_BYTES};
use crate::index::{CardIndex, CardIndexEntry, CardSide, CardType};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::task;

/// Raw JSON shape of one hash index record
#[derive(Debug, Deserialize)]
struct RawIndexEntry {
    filename: String,
    #[serde(rename = "cardId")]
    card_id: String,
    #[serde(default)]
    side: Option<String>,
    #[serde(rename = "type")]
    card_type: String,
    name: String,
    hash: String,
    #[serde(rename = "hashBytes")]
    hash_bytes: Vec<u8>,
}

impl RawIndexEntry {
    fn into_entry(self) -> ScanResult<CardIndexEntry> {
        if self.hash_bytes.len() != HASH_BYTES {
            return Err(ScanError::catalog_unavailable(format!(
                "entry {:?}: hashBytes must be {} bytes, got {}",
                self.card_id,
                HASH_BYTES,
                self.hash_bytes.len()
            )));
        }

        // hashBytes is authoritative for distance computation, but the hex
        // field must agree with it or the index is corrupt.
        let hash = CardHash::try_from_slice(&self.hash_bytes)
            .map_err(|e| ScanError::catalog_unavailable(e.to_string()))?;
        let hex_hash = CardHash::from_hex(&self.hash).map_err(|_| {
            ScanError::catalog_unavailable(format!(
                "entry {:?}: malformed hex hash {:?}",
                self.card_id, self.hash
            ))
        })?;
        if hash != hex_hash {
            return Err(ScanError::catalog_unavailable(format!(
                "entry {:?}: hash and hashBytes disagree",
                self.card_id
            )));
        }

        let side = self.side.as_deref().map(CardSide::parse).transpose()?;

        Ok(CardIndexEntry {
            card_id: self.card_id,
            filename: self.filename,
            side,
            card_type: CardType::parse(&self.card_type)?,
            name: self.name,
            hash,
            back_id: None,
        })
    }
}

/// Raw JSON shape of one card catalog record
#[derive(Debug, Deserialize)]
struct RawCatalogRecord {
    #[serde(rename = "cardId", alias = "id")]
    card_id: String,
    #[serde(rename = "backId", default)]
    back_id: Option<String>,
}

/// Load and validate the hash index from JSON content
pub fn load_index_from_json(json_content: &str) -> ScanResult<CardIndex> {
    let raw: Vec<RawIndexEntry> = serde_json::from_str(json_content)
        .map_err(|e| ScanError::catalog_unavailable(format!("malformed hash index: {e}")))?;

    let entries = raw
        .into_iter()
        .map(RawIndexEntry::into_entry)
        .collect::<ScanResult<Vec<_>>>()?;

    tracing::debug!(entries = entries.len(), "hash index parsed");
    CardIndex::new(entries)
}

/// Load the hash index and merge alternate-face cross-references from the
/// card catalog. Catalog records that reference unknown ids fail the load.
pub fn load_index_with_catalog(index_json: &str, catalog_json: &str) -> ScanResult<CardIndex> {
    let index = load_index_from_json(index_json)?;

    let records: Vec<RawCatalogRecord> = serde_json::from_str(catalog_json)
        .map_err(|e| ScanError::catalog_unavailable(format!("malformed card catalog: {e}")))?;
    let back_ids: HashMap<String, String> = records
        .into_iter()
        .filter_map(|record| record.back_id.map(|back| (record.card_id, back)))
        .collect();

    for back in back_ids.values() {
        if index.find_by_id(back).is_none() {
            return Err(ScanError::catalog_unavailable(format!(
                "catalog references unknown card id {:?}",
                back
            )));
        }
    }

    let entries = index
        .entries()
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            entry.back_id = back_ids.get(&entry.card_id).cloned();
            entry
        })
        .collect();
    CardIndex::new(entries)
}

/// Load the hash index from a JSON file
pub fn load_index_from_file<P: AsRef<Path>>(path: P) -> ScanResult<CardIndex> {
    let path = path.as_ref();
    let json_content = fs::read_to_string(path).map_err(|e| {
        ScanError::catalog_unavailable(format!("cannot read {}: {e}", path.display()))
    })?;
    load_index_from_json(&json_content)
}

/// Async version of the file load: read with tokio fs, parse off the
/// async runtime.
pub async fn load_index_from_file_async<P: AsRef<Path>>(path: P) -> ScanResult<CardIndex> {
    let path = path.as_ref().to_path_buf();
    let json_content = tokio::fs::read_to_string(&path).await.map_err(|e| {
        ScanError::catalog_unavailable(format!("cannot read {}: {e}", path.display()))
    })?;

    task::spawn_blocking(move || load_index_from_json(&json_content))
        .await
        .map_err(|e| ScanError::custom(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const INDEX_JSON: &str = r#"[
        {
            "filename": "ref-001-front.png",
            "cardId": "ref-001",
            "side": "front",
            "type": "refinery",
            "name": "Solar Furnace",
            "hash": "ff00ff00ff00ff00",
            "hashBytes": [255, 0, 255, 0, 255, 0, 255, 0]
        },
        {
            "filename": "gen-001.png",
            "cardId": "gen-001",
            "side": null,
            "type": "generator",
            "name": "Wind Turbine",
            "hash": "0000000000000000",
            "hashBytes": [0, 0, 0, 0, 0, 0, 0, 0]
        }
    ]"#;

    #[test]
    fn test_load_index_from_json() {
        let index = load_index_from_json(INDEX_JSON).unwrap();
        assert_eq!(index.len(), 2);

        let entry = index.find_by_id("ref-001").unwrap();
        assert_eq!(entry.name, "Solar Furnace");
        assert_eq!(entry.card_type, CardType::Refinery);
        assert_eq!(entry.side, Some(CardSide::Front));
        assert_eq!(entry.hash.to_hex(), "ff00ff00ff00ff00");

        assert_eq!(index.find_by_id("gen-001").unwrap().side, None);
    }

    #[test]
    fn test_wrong_hash_length_rejected() {
        let json = r#"[{
            "filename": "x.png", "cardId": "x", "type": "event",
            "name": "X", "hash": "ff00", "hashBytes": [255, 0]
        }]"#;
        let result = load_index_from_json(json);
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[test]
    fn test_hex_bytes_disagreement_rejected() {
        let json = r#"[{
            "filename": "x.png", "cardId": "x", "type": "event",
            "name": "X", "hash": "0000000000000000",
            "hashBytes": [255, 0, 255, 0, 255, 0, 255, 0]
        }]"#;
        let result = load_index_from_json(json);
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"[{
            "filename": "x.png", "cardId": "x", "type": "starship",
            "name": "X", "hash": "0000000000000000",
            "hashBytes": [0, 0, 0, 0, 0, 0, 0, 0]
        }]"#;
        assert!(load_index_from_json(json).is_err());
    }

    #[test]
    fn test_malformed_json_is_catalog_unavailable() {
        let result = load_index_from_json("[{");
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[test]
    fn test_catalog_merge_back_ids() {
        let catalog = r#"[
            {"cardId": "ref-001", "backId": "gen-001"},
            {"cardId": "gen-001"}
        ]"#;
        let index = load_index_with_catalog(INDEX_JSON, catalog).unwrap();
        assert_eq!(
            index.find_by_id("ref-001").unwrap().back_id.as_deref(),
            Some("gen-001")
        );
        assert_eq!(index.find_by_id("gen-001").unwrap().back_id, None);
    }

    #[test]
    fn test_catalog_unknown_back_id_rejected() {
        let catalog = r#"[{"cardId": "ref-001", "backId": "missing"}]"#;
        let result = load_index_with_catalog(INDEX_JSON, catalog);
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = load_index_from_file("nonexistent-index.json");
        assert!(matches!(result, Err(ScanError::CatalogUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_async_file_loading() {
        let temp_dir = tempdir().unwrap();
        let index_file = temp_dir.path().join("index.json");
        tokio::fs::write(&index_file, INDEX_JSON).await.unwrap();

        let index = load_index_from_file_async(&index_file).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.find_by_id("ref-001").unwrap().name, "Solar Furnace");
    }
}
