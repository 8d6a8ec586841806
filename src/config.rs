//! Tuning parameters for matching and fusion
//!
//! Every threshold in the pipeline is an empirically tuned constant, not a
//! derived one. They live here as configurable fields with the production
//! defaults so they can be re-validated against a labeled sample instead of
//! being baked into the match code.

use serde::{Deserialize, Serialize};

/// Thresholds and weights used by the text matcher, hash matcher, and
/// fusion stage. All string-match scores follow the 0-is-perfect
/// convention; hash distances are raw bit counts out of 64.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Phase 1 filter bound: title candidates scoring at or above this are
    /// dropped outright.
    pub title_reject: f32,
    /// Phase 1 accept bound: the phase succeeds only when its best title
    /// candidate scores below this.
    pub title_accept: f32,
    /// Phase 2 accept bound for full-text candidates.
    pub full_text_accept: f32,
    /// Phase 3 last-resort bound over combined title + full-text candidates.
    pub loosened_accept: f32,
    /// Near-perfect score below which a phase stops scanning further
    /// candidate phrases.
    pub short_circuit: f32,
    /// Cap on ranked candidates returned by either matcher.
    pub max_candidates: usize,

    /// Generic hash acceptance bound (bits out of 64, roughly a third of
    /// the bit length).
    pub hash_accept_distance: u32,
    /// Stricter bound applied when the hash is the only signal; a lone
    /// hash match with no corroborating text is inherently weaker evidence.
    pub hash_only_reject_distance: u32,

    /// Fusion weight on the text component. OCR-derived names are a much
    /// stronger signal than a coarse 64-bit hash against a catalog that
    /// contains visually similar faces.
    pub text_weight: f32,
    /// Fusion weight on the hash component.
    pub hash_weight: f32,
    /// Component score above which a signal counts as weak when
    /// classifying the match source.
    pub weak_component: f32,

    /// Fused-score band for a high confidence tier.
    pub fused_high: f32,
    /// Fused-score band for a medium confidence tier.
    pub fused_medium: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            title_reject: 0.4,
            title_accept: 0.3,
            full_text_accept: 0.4,
            loosened_accept: 0.5,
            short_circuit: 0.15,
            max_candidates: 10,
            hash_accept_distance: 21,
            hash_only_reject_distance: 18,
            text_weight: 0.85,
            hash_weight: 0.15,
            weak_component: 0.3,
            fused_high: 0.25,
            fused_medium: 0.45,
        }
    }
}

impl MatchConfig {
    /// Weighted fusion of a text score and a normalized hash score
    pub fn fuse(&self, text_score: f32, hash_score: f32) -> f32 {
        text_score * self.text_weight + hash_score * self.hash_weight
    }
}
