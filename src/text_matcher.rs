//! Phase-ordered fuzzy search over catalog card names
//!
//! Search proceeds through an ordered list of (candidate pool, phrase set,
//! threshold) phases: type-constrained title search at a strict bound,
//! type-constrained full-text fallback, a loosened last attempt within the
//! type scope, then the same ladder unconstrained. Each phase is evaluated
//! independently and the first phase with an acceptable best match wins.
//!
//! Scores follow the Fuse convention: 0 is a perfect match, 1 is no
//! meaningful similarity, and a phrase may match anywhere inside a name.

use crate::candidates;
use crate::config::MatchConfig;
use crate::index::{CardIndex, CardIndexEntry, CardType};
use crate::ocr::OcrExtraction;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Which text region produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedOn {
    Title,
    FullText,
}

/// Ordinal quality of a text match, banded from its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MatchQuality {
    pub fn from_score(score: f32) -> Self {
        if score < 0.1 {
            MatchQuality::Excellent
        } else if score < 0.25 {
            MatchQuality::Good
        } else if score < 0.4 {
            MatchQuality::Fair
        } else {
            MatchQuality::Poor
        }
    }
}

/// One fuzzy text match against a catalog name
#[derive(Debug, Clone, Serialize)]
pub struct TextMatchCandidate {
    pub card_id: String,
    /// 0 = perfect, 1 = no similarity
    pub score: f32,
    pub matched_on: MatchedOn,
    /// The candidate phrase that produced the hit
    pub matched_phrase: String,
}

impl TextMatchCandidate {
    pub fn quality(&self) -> MatchQuality {
        MatchQuality::from_score(self.score)
    }
}

/// Which phase of the search ladder produced the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    TypedTitle,
    TypedFullText,
    TypedLoosened,
    UnscopedTitle,
    UnscopedFullText,
    UnscopedLoosened,
}

/// Outcome of one text search, with enough detail to audit which pool was
/// scanned and which phase carried it
#[derive(Debug, Clone, Serialize)]
pub struct TextSearchReport {
    /// Ranked candidates, best (lowest score) first, capped
    pub candidates: Vec<TextMatchCandidate>,
    /// Card type parsed out of the OCR type text, when in the active set
    pub detected_type: Option<CardType>,
    /// Phase that produced the candidates, `None` when nothing matched
    pub phase: Option<SearchPhase>,
    /// Size of the candidate pool the winning phase scanned
    pub pool_size: usize,
}

impl TextSearchReport {
    fn empty(detected_type: Option<CardType>) -> Self {
        TextSearchReport {
            candidates: Vec::new(),
            detected_type,
            phase: None,
            pool_size: 0,
        }
    }

    pub fn best(&self) -> Option<&TextMatchCandidate> {
        self.candidates.first()
    }
}

/// One rung of the search ladder
struct Phase<'a> {
    label: SearchPhase,
    pool: &'a [&'a CardIndexEntry],
    phrases: &'a [(String, MatchedOn)],
    /// Candidates scoring at or above this are dropped
    keep: f32,
    /// The phase succeeds only when its best candidate scores below this
    accept: f32,
}

/// Fuzzy matcher over the read-only card index
#[derive(Debug, Clone)]
pub struct TextMatcher {
    index: Arc<CardIndex>,
    config: MatchConfig,
}

impl TextMatcher {
    pub fn new(index: Arc<CardIndex>, config: MatchConfig) -> Self {
        TextMatcher { index, config }
    }

    /// Run the phase ladder for one OCR extraction, restricted to the
    /// active card types.
    pub fn search(&self, ocr: &OcrExtraction, active_types: &HashSet<CardType>) -> TextSearchReport {
        let detected_type =
            CardType::from_keyword(&ocr.type_text).filter(|t| active_types.contains(t));

        let title_phrases: Vec<(String, MatchedOn)> = candidates::generate(&ocr.title_text)
            .into_iter()
            .map(|p| (p, MatchedOn::Title))
            .collect();
        let full_phrases: Vec<(String, MatchedOn)> = candidates::generate(&ocr.full_text)
            .into_iter()
            .map(|p| (p, MatchedOn::FullText))
            .collect();
        if title_phrases.is_empty() && full_phrases.is_empty() {
            return TextSearchReport::empty(detected_type);
        }
        let combined_phrases: Vec<(String, MatchedOn)> = title_phrases
            .iter()
            .chain(full_phrases.iter())
            .cloned()
            .collect();

        let typed_pool: Vec<&CardIndexEntry> = detected_type
            .map(|t| self.index.filter_by_type(t))
            .unwrap_or_default();
        let full_pool = self.index.filter_by_active_types(active_types);

        let config = &self.config;
        let mut phases: Vec<Phase> = Vec::new();
        if detected_type.is_some() {
            phases.push(Phase {
                label: SearchPhase::TypedTitle,
                pool: &typed_pool,
                phrases: &title_phrases,
                keep: config.title_reject,
                accept: config.title_accept,
            });
            phases.push(Phase {
                label: SearchPhase::TypedFullText,
                pool: &typed_pool,
                phrases: &full_phrases,
                keep: config.full_text_accept,
                accept: config.full_text_accept,
            });
            phases.push(Phase {
                label: SearchPhase::TypedLoosened,
                pool: &typed_pool,
                phrases: &combined_phrases,
                keep: config.loosened_accept,
                accept: config.loosened_accept,
            });
        }
        phases.push(Phase {
            label: SearchPhase::UnscopedTitle,
            pool: &full_pool,
            phrases: &title_phrases,
            keep: config.title_reject,
            accept: config.title_accept,
        });
        phases.push(Phase {
            label: SearchPhase::UnscopedFullText,
            pool: &full_pool,
            phrases: &full_phrases,
            keep: config.full_text_accept,
            accept: config.full_text_accept,
        });
        phases.push(Phase {
            label: SearchPhase::UnscopedLoosened,
            pool: &full_pool,
            phrases: &combined_phrases,
            keep: config.loosened_accept,
            accept: config.loosened_accept,
        });

        for phase in &phases {
            if let Some(ranked) = self.run_phase(phase) {
                tracing::debug!(
                    phase = ?phase.label,
                    pool = phase.pool.len(),
                    best = ranked[0].score,
                    "text phase accepted"
                );
                return TextSearchReport {
                    candidates: ranked,
                    detected_type,
                    phase: Some(phase.label),
                    pool_size: phase.pool.len(),
                };
            }
        }

        tracing::debug!(detected_type = ?detected_type, "no text phase produced an acceptable match");
        TextSearchReport::empty(detected_type)
    }

    /// Scan one phase: best score per card id across all phrases, early
    /// exit once a near-perfect match appears.
    fn run_phase(&self, phase: &Phase) -> Option<Vec<TextMatchCandidate>> {
        if phase.pool.is_empty() || phase.phrases.is_empty() {
            return None;
        }

        let mut best_by_id: HashMap<&str, TextMatchCandidate> = HashMap::new();
        'phrases: for (phrase, region) in phase.phrases {
            for entry in phase.pool {
                let score = substring_score(phrase, &entry.name);
                if score >= phase.keep {
                    continue;
                }
                let current = best_by_id.get(entry.card_id.as_str());
                if current.map_or(true, |c| score < c.score) {
                    best_by_id.insert(
                        entry.card_id.as_str(),
                        TextMatchCandidate {
                            card_id: entry.card_id.clone(),
                            score,
                            matched_on: *region,
                            matched_phrase: phrase.clone(),
                        },
                    );
                }
            }
            // Longer phrases come first; once one of them lands a
            // near-perfect hit, scanning shorter windows cannot improve it
            // enough to matter.
            if best_by_id
                .values()
                .any(|c| c.score < self.config.short_circuit)
            {
                break 'phrases;
            }
        }

        let mut ranked: Vec<TextMatchCandidate> = best_by_id.into_values().collect();
        ranked.sort_by(|a, b| a.score.total_cmp(&b.score));
        ranked.truncate(self.config.max_candidates);

        match ranked.first() {
            Some(best) if best.score < phase.accept => Some(ranked),
            _ => None,
        }
    }
}

/// Fuse-style fuzzy score of `phrase` against `name`: the minimum
/// normalized edit distance of the phrase over any substring of the name
/// (free start and end, i.e. `ignoreLocation`). Phrases under 2 characters
/// never match.
pub fn substring_score(phrase: &str, name: &str) -> f32 {
    let pattern: Vec<char> = phrase.to_lowercase().chars().collect();
    let text: Vec<char> = name.to_lowercase().chars().collect();

    if pattern.len() < 2 {
        return 1.0;
    }
    if text.is_empty() {
        return 1.0;
    }

    // Sellers' approximate substring matching: the first row is zero so a
    // match may begin at any position, and the answer is the minimum of
    // the final row so it may end at any position.
    let mut prev: Vec<usize> = vec![0; text.len() + 1];
    let mut curr: Vec<usize> = vec![0; text.len() + 1];
    for (i, &pc) in pattern.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &tc) in text.iter().enumerate() {
            let cost = usize::from(pc != tc);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let best = prev.iter().copied().min().unwrap_or(pattern.len());
    (best as f32 / pattern.len() as f32).min(1.0)
}
