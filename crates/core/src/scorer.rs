//! Scorer (spec §4.F). Multi-factor weighted scoring with explicit, clamped
//! sub-scores — grounded on the teacher's `grep_relevance_score` shape (a
//! base score built from named contributions, then boosted).

use std::collections::HashMap;

use crate::document::{ScoreExplain, ScoreInfo};
use crate::request::Strategy;

const TITLE_EXACT_BOOST: f64 = 1.30;
const TITLE_PARTIAL_BOOST: f64 = 1.15;
const RECENCY_GRACE_DAYS: f64 = 30.0;
const RECENCY_DECAY: f64 = 0.05;
const RECENCY_FLOOR: f64 = 0.5;
const POPULARITY_DIVISOR: f64 = 5000.0;
const POPULARITY_WEIGHT: f64 = 0.1;
const POPULARITY_CAP: f64 = 1.1;

/// Holds the tunables for scoring plus the per-search popularity table
/// (category -> popularity count), so callers don't thread six floats
/// through every call.
#[derive(Clone, Debug)]
pub struct Scorer {
    pub title_exact_boost: f64,
    pub title_partial_boost: f64,
    pub recency_grace_days: f64,
    pub recency_decay: f64,
    pub popularity: HashMap<String, f64>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self {
            title_exact_boost: TITLE_EXACT_BOOST,
            title_partial_boost: TITLE_PARTIAL_BOOST,
            recency_grace_days: RECENCY_GRACE_DAYS,
            recency_decay: RECENCY_DECAY,
            popularity: HashMap::new(),
        }
    }
}

impl Scorer {
    pub fn new(popularity: HashMap<String, f64>) -> Self {
        Self { popularity, ..Self::default() }
    }

    /// Combine per-signal scores per strategy (spec §4.F table), with
    /// graceful degradation when one signal is absent (0.0).
    pub fn hybrid(&self, strategy: Strategy, text: f64, vector: f64, alpha: f64) -> f64 {
        match strategy {
            Strategy::Keyword => text,
            Strategy::Semantic => {
                if vector > 0.0 {
                    vector
                } else if text > 0.0 {
                    text * 0.5
                } else {
                    0.01
                }
            }
            Strategy::Hybrid | Strategy::Ai => {
                if vector == 0.0 && text == 0.0 {
                    0.01
                } else if vector == 0.0 {
                    text * 0.7
                } else if text == 0.0 {
                    vector * 0.8
                } else {
                    alpha * text + (1.0 - alpha) * vector
                }
            }
        }
    }

    /// Title boost (spec §4.F): exact match (case/trim-insensitive) beats
    /// substring containment beats no match.
    pub fn title_boost(&self, title: &str, raw_query: &str) -> f64 {
        let title_norm = title.trim().to_lowercase();
        let query_norm = raw_query.trim().to_lowercase();
        if query_norm.is_empty() {
            return 1.0;
        }
        if title_norm == query_norm {
            self.title_exact_boost
        } else if title_norm.contains(&query_norm) {
            self.title_partial_boost
        } else {
            1.0
        }
    }

    /// Recency factor (spec §4.F): 1.0 within the grace period, exponential
    /// decay beyond it clamped to a floor, 0.5 when the document has no
    /// timestamp.
    pub fn recency(&self, days_since_update: Option<f64>) -> f64 {
        let Some(days) = days_since_update else {
            return RECENCY_FLOOR;
        };
        if days <= self.recency_grace_days {
            return 1.0;
        }
        let days_after_grace = days - self.recency_grace_days;
        (-self.recency_decay * days_after_grace).exp().max(RECENCY_FLOOR)
    }

    /// Popularity factor (spec §4.F): looked up by category, `1 +
    /// (p/5000)·0.1` clamped to `<= 1.1`; missing or zero category → 1.0.
    pub fn popularity(&self, category: Option<&str>) -> f64 {
        let p = category.and_then(|c| self.popularity.get(c)).copied().unwrap_or(0.0);
        if p <= 0.0 {
            return 1.0;
        }
        (1.0 + (p / POPULARITY_DIVISOR) * POPULARITY_WEIGHT).min(POPULARITY_CAP)
    }

    /// Produce the full score breakdown for one hit.
    #[allow(clippy::too_many_arguments)]
    pub fn score(
        &self,
        strategy: Strategy,
        text: f64,
        vector: f64,
        alpha: f64,
        title: &str,
        raw_query: &str,
        days_since_update: Option<f64>,
        category: Option<&str>,
    ) -> ScoreInfo {
        let hybrid_raw = self.hybrid(strategy, text, vector, alpha);
        let boost = self.title_boost(title, raw_query);
        let hybrid = hybrid_raw * boost;
        let recency = self.recency(days_since_update);
        let popularity = self.popularity(category);
        let final_score = hybrid * recency * popularity;

        ScoreInfo {
            text,
            vector,
            hybrid,
            recency,
            popularity,
            final_score,
            explain: ScoreExplain {
                text_contribution: alpha * text,
                vector_contribution: (1.0 - alpha) * vector,
                title_boost: boost,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_hybrid_is_text_only() {
        let scorer = Scorer::default();
        assert_eq!(scorer.hybrid(Strategy::Keyword, 0.7, 0.9, 0.3), 0.7);
    }

    #[test]
    fn semantic_degrades_to_text_when_vector_absent() {
        let scorer = Scorer::default();
        assert_eq!(scorer.hybrid(Strategy::Semantic, 0.6, 0.0, 0.3), 0.3);
        assert_eq!(scorer.hybrid(Strategy::Semantic, 0.0, 0.0, 0.3), 0.01);
    }

    #[test]
    fn hybrid_degrades_gracefully_when_one_signal_absent() {
        let scorer = Scorer::default();
        assert_eq!(scorer.hybrid(Strategy::Hybrid, 0.5, 0.0, 0.3), 0.35);
        assert_eq!(scorer.hybrid(Strategy::Hybrid, 0.0, 0.5, 0.3), 0.4);
        assert_eq!(scorer.hybrid(Strategy::Hybrid, 0.0, 0.0, 0.3), 0.01);
    }

    #[test]
    fn hybrid_weighted_sum_when_both_present() {
        let scorer = Scorer::default();
        let h = scorer.hybrid(Strategy::Hybrid, 0.8, 0.4, 0.3);
        assert!((h - (0.3 * 0.8 + 0.7 * 0.4)).abs() < 1e-9);
    }

    #[test]
    fn title_exact_beats_partial_beats_none() {
        let scorer = Scorer::default();
        assert_eq!(scorer.title_boost("IPTU", "iptu"), TITLE_EXACT_BOOST);
        assert_eq!(scorer.title_boost("Segunda via do IPTU", "iptu"), TITLE_PARTIAL_BOOST);
        assert_eq!(scorer.title_boost("Licença ambiental", "iptu"), 1.0);
    }

    #[test]
    fn recency_within_grace_is_full_score() {
        let scorer = Scorer::default();
        assert_eq!(scorer.recency(Some(10.0)), 1.0);
        assert_eq!(scorer.recency(Some(30.0)), 1.0);
    }

    #[test]
    fn recency_decays_but_floors_at_half() {
        let scorer = Scorer::default();
        let recent = scorer.recency(Some(40.0));
        let old = scorer.recency(Some(4000.0));
        assert!(recent < 1.0 && recent > old);
        assert!(old >= 0.5);
    }

    #[test]
    fn missing_timestamp_gets_half_recency() {
        let scorer = Scorer::default();
        assert_eq!(scorer.recency(None), 0.5);
    }

    #[test]
    fn popularity_clamped_and_defaulted() {
        let mut table = HashMap::new();
        table.insert("saude".to_string(), 50_000.0);
        let scorer = Scorer::new(table);
        assert_eq!(scorer.popularity(Some("saude")), POPULARITY_CAP);
        assert_eq!(scorer.popularity(Some("educacao")), 1.0);
        assert_eq!(scorer.popularity(None), 1.0);
    }

    #[test]
    fn final_score_is_product_of_factors() {
        let scorer = Scorer::default();
        let info = scorer.score(Strategy::Keyword, 0.8, 0.0, 0.3, "Outra coisa", "iptu", None, None);
        assert!((info.final_score - (info.hybrid * info.recency * info.popularity)).abs() < 1e-9);
    }
}
