//! Fusing text and hash matches into one ranked identification
//!
//! Both matchers run concurrently against the shared index; fusion is the
//! join point. Candidate sets are joined on card id before weighting so a
//! third signal later only extends the join, not the decision table.
//! All paths, including every rejection, carry full diagnostics so a caller
//! can explain a null identification to a human reviewer.

use crate::config::MatchConfig;
use crate::error::{ScanError, ScanResult};
use crate::hash::CardHash;
use crate::hash_matcher::{HashMatchCandidate, HashMatcher};
use crate::index::{CardIndex, CardType};
use crate::ocr::OcrExtraction;
use crate::text_matcher::{MatchQuality, TextMatcher, TextSearchReport};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task;

/// Rejection reason: neither matcher produced any evidence
pub const REASON_NO_SIGNAL: &str = "no signal";
/// Rejection reason: text existed but matched nothing, and the hash
/// neighbor was too distant to stand alone
pub const REASON_TEXT_FAILED_HASH_WEAK: &str =
    "OCR had content but text failed and hash too weak";
/// Rejection reason: no text at all, and the hash neighbor was too distant
pub const REASON_NO_OCR_HASH_WEAK: &str = "no OCR content and hash too weak";

/// Which signal carried the identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Text,
    Hash,
    /// Both components were weak on their own but their combination won
    Fused,
}

/// Coarse trustworthiness of an identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    fn from_quality(quality: MatchQuality) -> Self {
        match quality {
            MatchQuality::Excellent | MatchQuality::Good => ConfidenceTier::High,
            MatchQuality::Fair => ConfidenceTier::Medium,
            MatchQuality::Poor => ConfidenceTier::Low,
        }
    }
}

/// A single ranked identification. Constructed fresh per scan attempt and
/// never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationResult {
    pub card_id: String,
    /// Weighted combination of both components, 0 = perfect
    pub fused_score: f32,
    /// Text component; worst case 1.0 when no text candidate existed
    pub text_score: f32,
    /// Normalized hash component; worst case 1.0 when no hash neighbor
    pub hash_score: f32,
    pub match_source: MatchSource,
    pub confidence_tier: ConfidenceTier,
}

/// Raw candidate lists, weights, and the rejection reason when the result
/// is null
#[derive(Debug, Clone, Serialize)]
pub struct ScanDiagnostics {
    pub text: TextSearchReport,
    pub hash_candidates: Vec<HashMatchCandidate>,
    /// Nearest catalog hash regardless of the acceptance bound
    pub nearest_hash_distance: Option<u32>,
    pub text_weight: f32,
    pub hash_weight: f32,
    /// Which branch of the decision table resolved the scan
    pub method: &'static str,
    pub rejection: Option<&'static str>,
}

/// Outcome of one identification attempt: an identification or an
/// explained null, always with full diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationOutcome {
    pub result: Option<IdentificationResult>,
    pub diagnostics: ScanDiagnostics,
}

impl IdentificationOutcome {
    /// Render the outcome, diagnostics included, for review tooling
    pub fn to_json(&self) -> ScanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Inputs for one card region of a multi-card scan
#[derive(Debug, Clone)]
pub struct RegionScan {
    pub ocr: OcrExtraction,
    pub hash: CardHash,
}

/// The identification engine: runs both matchers concurrently over the
/// shared read-only index and fuses their results.
#[derive(Debug, Clone)]
pub struct CardIdentifier {
    text: TextMatcher,
    hash: HashMatcher,
    config: MatchConfig,
    active_types: HashSet<CardType>,
}

impl CardIdentifier {
    /// Identifier over the full catalog with the given tuning
    pub fn new(index: Arc<CardIndex>, config: MatchConfig) -> Self {
        Self::with_active_types(index, config, CardType::ALL.into_iter().collect())
    }

    /// Identifier restricted to a subset of card types (e.g. when the game
    /// state rules some kinds out)
    pub fn with_active_types(
        index: Arc<CardIndex>,
        config: MatchConfig,
        active_types: HashSet<CardType>,
    ) -> Self {
        CardIdentifier {
            text: TextMatcher::new(Arc::clone(&index), config),
            hash: HashMatcher::new(index, config),
            config,
            active_types,
        }
    }

    /// Identify one card region from its OCR extraction and perceptual
    /// hash. The two matchers have no data dependency on each other and run
    /// as separate blocking tasks; this method is the join point.
    ///
    /// Matching-quality failures are not errors: they resolve to an
    /// outcome with a null result and a populated rejection reason.
    pub async fn identify(
        &self,
        ocr: &OcrExtraction,
        hash: &CardHash,
    ) -> ScanResult<IdentificationOutcome> {
        let text_matcher = self.text.clone();
        let text_ocr = ocr.clone();
        let active_types = self.active_types.clone();
        let text_task =
            task::spawn_blocking(move || text_matcher.search(&text_ocr, &active_types));

        let hash_matcher = self.hash.clone();
        let query = *hash;
        let hash_task =
            task::spawn_blocking(move || (hash_matcher.search(&query), hash_matcher.nearest(&query)));

        let (text_report, hash_results) = tokio::join!(text_task, hash_task);
        let text_report =
            text_report.map_err(|e| ScanError::custom(format!("Task join error: {}", e)))?;
        let (hash_candidates, nearest) =
            hash_results.map_err(|e| ScanError::custom(format!("Task join error: {}", e)))?;

        Ok(self.fuse(ocr, text_report, hash_candidates, nearest))
    }

    /// Identify several detected regions of one capture in parallel. The
    /// regions are independent; the only shared state is the read-only
    /// index.
    pub async fn identify_regions(
        &self,
        regions: Vec<RegionScan>,
    ) -> ScanResult<Vec<IdentificationOutcome>> {
        let mut handles = Vec::with_capacity(regions.len());
        for region in regions {
            let identifier = self.clone();
            handles.push(tokio::spawn(async move {
                identifier.identify(&region.ocr, &region.hash).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| ScanError::custom(format!("Task join error: {}", e)))??;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Apply the decision table to both result sets
    fn fuse(
        &self,
        ocr: &OcrExtraction,
        text_report: TextSearchReport,
        hash_candidates: Vec<HashMatchCandidate>,
        nearest: Option<HashMatchCandidate>,
    ) -> IdentificationOutcome {
        let nearest_distance = nearest.as_ref().map(|c| c.distance);
        let has_text = !text_report.candidates.is_empty();
        let has_hash = !hash_candidates.is_empty();

        match (has_text, has_hash) {
            (true, true) => self.fuse_union(text_report, hash_candidates, nearest_distance),
            (true, false) => self.accept_text_only(text_report, hash_candidates, nearest_distance),
            (false, _) => {
                self.hash_only_or_reject(ocr, text_report, hash_candidates, nearest_distance)
            }
        }
    }

    /// Text fired alone: accept its best candidate, recording the hash
    /// component at its worst case.
    fn accept_text_only(
        &self,
        text_report: TextSearchReport,
        hash_candidates: Vec<HashMatchCandidate>,
        nearest_hash_distance: Option<u32>,
    ) -> IdentificationOutcome {
        // Candidates are non-empty on this branch.
        let best = text_report.candidates[0].clone();
        let tier = ConfidenceTier::from_quality(best.quality());
        tracing::debug!(card_id = %best.card_id, score = best.score, "text-only identification");

        IdentificationOutcome {
            result: Some(IdentificationResult {
                card_id: best.card_id,
                fused_score: self.config.fuse(best.score, 1.0),
                text_score: best.score,
                hash_score: 1.0,
                match_source: MatchSource::Text,
                confidence_tier: tier,
            }),
            diagnostics: self.diagnostics(
                text_report,
                hash_candidates,
                nearest_hash_distance,
                "text-only",
                None,
            ),
        }
    }

    /// No text candidates: the hash must stand alone, and is held to a
    /// stricter bound than the generic acceptance distance whether or not
    /// OCR produced any text.
    fn hash_only_or_reject(
        &self,
        ocr: &OcrExtraction,
        text_report: TextSearchReport,
        hash_candidates: Vec<HashMatchCandidate>,
        nearest_hash_distance: Option<u32>,
    ) -> IdentificationOutcome {
        if let Some(best) = hash_candidates
            .first()
            .filter(|c| c.distance <= self.config.hash_only_reject_distance)
        {
            let tier = if best.distance <= 8 {
                ConfidenceTier::High
            } else if best.distance <= 14 {
                ConfidenceTier::Medium
            } else {
                ConfidenceTier::Low
            };
            tracing::debug!(card_id = %best.card_id, distance = best.distance, "hash-only identification");

            let result = IdentificationResult {
                card_id: best.card_id.clone(),
                fused_score: self.config.fuse(1.0, best.normalized_score),
                text_score: 1.0,
                hash_score: best.normalized_score,
                match_source: MatchSource::Hash,
                confidence_tier: tier,
            };
            return IdentificationOutcome {
                result: Some(result),
                diagnostics: self.diagnostics(
                    text_report,
                    hash_candidates,
                    nearest_hash_distance,
                    "hash-only",
                    None,
                ),
            };
        }

        let reason = match (ocr.has_content(), nearest_hash_distance) {
            (_, None) => REASON_NO_SIGNAL,
            (true, Some(_)) => REASON_TEXT_FAILED_HASH_WEAK,
            (false, Some(_)) => REASON_NO_OCR_HASH_WEAK,
        };
        tracing::warn!(reason, nearest = ?nearest_hash_distance, "identification rejected");

        IdentificationOutcome {
            result: None,
            diagnostics: self.diagnostics(
                text_report,
                hash_candidates,
                nearest_hash_distance,
                "none",
                Some(reason),
            ),
        }
    }

    /// Both signals fired: join candidates on card id, weight, and take
    /// the minimum fused score.
    fn fuse_union(
        &self,
        text_report: TextSearchReport,
        hash_candidates: Vec<HashMatchCandidate>,
        nearest_hash_distance: Option<u32>,
    ) -> IdentificationOutcome {
        // Missing components sit at the worst-case score so a card backed
        // by both signals always beats one backed by either alone.
        let mut joined: HashMap<String, (f32, f32)> = HashMap::new();
        for candidate in &text_report.candidates {
            joined.entry(candidate.card_id.clone()).or_insert((1.0, 1.0)).0 = candidate.score;
        }
        for candidate in &hash_candidates {
            joined.entry(candidate.card_id.clone()).or_insert((1.0, 1.0)).1 =
                candidate.normalized_score;
        }

        let (card_id, (text_score, hash_score)) = joined
            .into_iter()
            .min_by(|a, b| {
                let fused_a = self.config.fuse(a.1 .0, a.1 .1);
                let fused_b = self.config.fuse(b.1 .0, b.1 .1);
                fused_a.total_cmp(&fused_b)
            })
            .unwrap_or_else(|| ("".to_string(), (1.0, 1.0)));
        let fused_score = self.config.fuse(text_score, hash_score);

        let match_source = if text_score > self.config.weak_component
            && hash_score > self.config.weak_component
        {
            MatchSource::Fused
        } else if text_score <= hash_score {
            MatchSource::Text
        } else {
            MatchSource::Hash
        };

        // Tier prefers text-match quality when a text candidate backs the
        // winning id, else falls back to fused-score banding.
        let winning_text = text_report
            .candidates
            .iter()
            .find(|c| c.card_id == card_id);
        let confidence_tier = match winning_text {
            Some(candidate) => ConfidenceTier::from_quality(candidate.quality()),
            None if fused_score < self.config.fused_high => ConfidenceTier::High,
            None if fused_score < self.config.fused_medium => ConfidenceTier::Medium,
            None => ConfidenceTier::Low,
        };

        tracing::debug!(
            card_id = %card_id,
            fused_score,
            source = ?match_source,
            "fused identification"
        );

        IdentificationOutcome {
            result: Some(IdentificationResult {
                card_id,
                fused_score,
                text_score,
                hash_score,
                match_source,
                confidence_tier,
            }),
            diagnostics: self.diagnostics(
                text_report,
                hash_candidates,
                nearest_hash_distance,
                "weighted-union",
                None,
            ),
        }
    }

    fn diagnostics(
        &self,
        text: TextSearchReport,
        hash_candidates: Vec<HashMatchCandidate>,
        nearest_hash_distance: Option<u32>,
        method: &'static str,
        rejection: Option<&'static str>,
    ) -> ScanDiagnostics {
        ScanDiagnostics {
            text,
            hash_candidates,
            nearest_hash_distance,
            text_weight: self.config.text_weight,
            hash_weight: self.config.hash_weight,
            method,
            rejection,
        }
    }
}
