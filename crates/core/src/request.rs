//! Search request types (spec §3 "Search request") and the clamping rules
//! that make every field either required-and-validated or defaulted, never
//! rejected for being out of range.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Retrieval strategy. Unknown strategy strings fail synchronously (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Keyword,
    Semantic,
    Hybrid,
    Ai,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Keyword => "keyword",
            Strategy::Semantic => "semantic",
            Strategy::Hybrid => "hybrid",
            Strategy::Ai => "ai",
        }
    }

    pub fn needs_embedding(&self) -> bool {
        matches!(self, Strategy::Semantic | Strategy::Hybrid | Strategy::Ai)
    }

    pub fn needs_analysis(&self) -> bool {
        matches!(self, Strategy::Ai)
    }
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyword" => Ok(Strategy::Keyword),
            "semantic" => Ok(Strategy::Semantic),
            "hybrid" => Ok(Strategy::Hybrid),
            "ai" => Ok(Strategy::Ai),
            other => Err(AppError::Validation(format!("unknown strategy: {other}"))),
        }
    }
}

/// Request mode: `human` enables expansion/recency and looser typo tolerance,
/// `agent` disables both and tightens typo tolerance (spec §4.J step 3).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Human,
    Agent,
}

impl Mode {
    pub fn default_expand(&self) -> bool {
        matches!(self, Mode::Human)
    }

    pub fn default_recency(&self) -> bool {
        matches!(self, Mode::Human)
    }

    pub fn default_typos(&self) -> u32 {
        match self {
            Mode::Human => 2,
            Mode::Agent => 1,
        }
    }
}

/// Typed filters (spec §3).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    #[serde(default)]
    pub orgao: Option<String>,
    #[serde(default)]
    pub tempo_max: Option<i64>,
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub has_digital: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.category.is_none()
            && self.sub_category.is_none()
            && self.orgao.is_none()
            && self.tempo_max.is_none()
            && self.is_free.is_none()
            && self.has_digital.is_none()
    }
}

const DEFAULT_PER_PAGE: u32 = 10;
const MAX_PER_PAGE: u32 = 100;
const DEFAULT_ALPHA: f64 = 0.3;

/// A validated, clamped search request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub strategy: Strategy,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub threshold_keyword: Option<f64>,
    #[serde(default)]
    pub threshold_semantic: Option<f64>,
    #[serde(default)]
    pub threshold_hybrid: Option<f64>,
    #[serde(default)]
    pub threshold_ai: Option<f64>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub expand: Option<bool>,
    #[serde(default)]
    pub recency: Option<bool>,
    #[serde(default)]
    pub typos: Option<u32>,
}

impl SearchRequest {
    /// Page, clamped to `>= 1` (spec §3 "page < 1 is clamped to 1").
    pub fn effective_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// `per_page`, clamped to `[1, 100]`, defaulting to 10 (spec §3).
    pub fn effective_per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Alpha, defaulting to 0.3 unless the request supplies a value in `(0,1]`.
    pub fn effective_alpha(&self) -> f64 {
        match self.alpha {
            Some(a) if a > 0.0 && a <= 1.0 => a,
            _ => DEFAULT_ALPHA,
        }
    }

    pub fn effective_mode(&self) -> Mode {
        self.mode.unwrap_or_default()
    }

    pub fn effective_expand(&self) -> bool {
        self.expand.unwrap_or_else(|| self.effective_mode().default_expand())
    }

    pub fn effective_recency(&self) -> bool {
        self.recency.unwrap_or_else(|| self.effective_mode().default_recency())
    }

    pub fn effective_typos(&self) -> u32 {
        self.typos.unwrap_or_else(|| self.effective_mode().default_typos())
    }

    /// The threshold that applies to this strategy: `threshold_<strategy>` takes
    /// precedence over the generic `threshold` (spec §6 query params).
    pub fn threshold_for(&self, strategy: Strategy) -> Option<f64> {
        let specific = match strategy {
            Strategy::Keyword => self.threshold_keyword,
            Strategy::Semantic => self.threshold_semantic,
            Strategy::Hybrid => self.threshold_hybrid,
            Strategy::Ai => self.threshold_ai,
        };
        specific.or(self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> SearchRequest {
        SearchRequest {
            query: "iptu".into(),
            strategy: Strategy::Keyword,
            page: None,
            per_page: None,
            include_inactive: false,
            alpha: None,
            threshold: None,
            threshold_keyword: None,
            threshold_semantic: None,
            threshold_hybrid: None,
            threshold_ai: None,
            mode: None,
            collections: vec![],
            fields: vec![],
            filters: SearchFilters::default(),
            expand: None,
            recency: None,
            typos: None,
        }
    }

    #[test]
    fn page_below_one_clamps_to_one() {
        let mut req = base_request();
        req.page = Some(0);
        assert_eq!(req.effective_page(), 1);
    }

    #[test]
    fn per_page_clamps_not_rejects() {
        let mut req = base_request();
        req.per_page = Some(9999);
        assert_eq!(req.effective_per_page(), 100);
        req.per_page = Some(0);
        assert_eq!(req.effective_per_page(), 1);
    }

    #[test]
    fn alpha_out_of_range_falls_back_to_default() {
        let mut req = base_request();
        req.alpha = Some(0.0);
        assert_eq!(req.effective_alpha(), 0.3);
        req.alpha = Some(1.5);
        assert_eq!(req.effective_alpha(), 0.3);
        req.alpha = Some(0.7);
        assert_eq!(req.effective_alpha(), 0.7);
    }

    #[test]
    fn mode_precedence_matches_spec() {
        let mut req = base_request();
        req.mode = Some(Mode::Human);
        assert!(req.effective_expand());
        req.mode = Some(Mode::Agent);
        assert!(!req.effective_expand());
        req.expand = Some(true);
        assert!(req.effective_expand());
    }

    #[test]
    fn unknown_strategy_fails() {
        assert!(Strategy::from_str("nonsense").is_err());
        assert!(Strategy::from_str("hybrid").is_ok());
    }

    #[test]
    fn threshold_precedence() {
        let mut req = base_request();
        req.threshold = Some(0.2);
        req.threshold_hybrid = Some(0.5);
        assert_eq!(req.threshold_for(Strategy::Hybrid), Some(0.5));
        assert_eq!(req.threshold_for(Strategy::Keyword), Some(0.2));
    }
}
