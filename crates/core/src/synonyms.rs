//! Synonym Store + Expander (spec §4.B). A static closed-set table, built
//! the way the teacher builds its closed `skip_dirs`/`noise_dirs` sets —
//! `&[&str]` literals collected into owned sets at construction time.

use std::collections::{HashMap, HashSet};

const DEFAULT_MAX_EXPANSION: usize = 5;

/// Static phrase -> synonyms and token -> synonyms tables.
pub struct SynonymStore {
    phrases: HashMap<String, Vec<String>>,
    tokens: HashMap<String, Vec<String>>,
    max_expansion: usize,
}

impl SynonymStore {
    pub fn new() -> Self {
        Self::with_max_expansion(DEFAULT_MAX_EXPANSION)
    }

    pub fn with_max_expansion(max_expansion: usize) -> Self {
        let phrase_table: &[(&str, &[&str])] = &[
            ("segunda via", &["2a via", "duplicata", "reemissão"]),
            ("carteira de identidade", &["rg", "identidade civil"]),
            ("carteira de motorista", &["cnh", "habilitação"]),
        ];
        let token_table: &[(&str, &[&str])] = &[
            ("iptu", &["imposto predial", "imposto territorial urbano"]),
            ("cnh", &["carteira de motorista", "habilitação"]),
            ("rg", &["identidade", "carteira de identidade"]),
            ("cpf", &["cadastro de pessoa física"]),
            ("cnpj", &["cadastro nacional de pessoa jurídica"]),
            ("horario", &["horário de funcionamento", "atendimento"]),
            ("multa", &["infração", "penalidade"]),
            ("agendamento", &["marcar", "horário"]),
        ];
        Self {
            phrases: phrase_table
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            tokens: token_table
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
            max_expansion,
        }
    }
}

impl Default for SynonymStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of expanding a parsed query (spec §4.B "Output").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedQuery {
    pub tokens: Vec<String>,
    pub expanded_terms: Vec<String>,
    pub query_string: String,
}

/// Expand a normalized query and its tokens against the synonym store.
///
/// Tries `ExpandByPhrase(normalized)` first; falls through to
/// `ExpandByToken(tokens)` only when the phrase lookup misses entirely
/// (spec §4.B).
pub fn expand(store: &SynonymStore, normalized: &str, tokens: &[String]) -> ExpandedQuery {
    let mut seen: HashSet<String> = tokens.iter().cloned().collect();
    let mut expanded_terms = Vec::new();

    let mut push = |term: &str, expanded_terms: &mut Vec<String>| {
        if expanded_terms.len() >= store.max_expansion {
            return;
        }
        if seen.insert(term.to_string()) {
            expanded_terms.push(term.to_string());
        }
    };

    if let Some(synonyms) = store.phrases.get(normalized) {
        for synonym in synonyms {
            if expanded_terms.len() >= store.max_expansion {
                break;
            }
            push(synonym, &mut expanded_terms);
        }
    } else {
        'outer: for token in tokens {
            if let Some(synonyms) = store.tokens.get(token) {
                for synonym in synonyms {
                    if expanded_terms.len() >= store.max_expansion {
                        break 'outer;
                    }
                    push(synonym, &mut expanded_terms);
                }
            }
        }
    }

    let mut all_terms: Vec<String> = tokens.to_vec();
    all_terms.extend(expanded_terms.iter().cloned());
    let query_string = if all_terms.is_empty() { "*".to_string() } else { all_terms.join(" ") };

    ExpandedQuery { tokens: tokens.to_vec(), expanded_terms, query_string }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_match_takes_precedence_over_token_match() {
        let store = SynonymStore::new();
        let tokens = vec!["segunda".to_string(), "via".to_string()];
        let expanded = expand(&store, "segunda via", &tokens);
        assert!(expanded.expanded_terms.contains(&"duplicata".to_string()));
    }

    #[test]
    fn token_expansion_falls_back_when_no_phrase_match() {
        let store = SynonymStore::new();
        let tokens = vec!["iptu".to_string()];
        let expanded = expand(&store, "iptu", &tokens);
        assert!(expanded.expanded_terms.contains(&"imposto predial".to_string()));
    }

    #[test]
    fn expansion_is_capped_at_max() {
        let store = SynonymStore::with_max_expansion(1);
        let tokens = vec!["iptu".to_string()];
        let expanded = expand(&store, "iptu", &tokens);
        assert_eq!(expanded.expanded_terms.len(), 1);
    }

    #[test]
    fn original_tokens_always_retained_and_duplicates_suppressed() {
        let store = SynonymStore::new();
        let tokens = vec!["cnh".to_string()];
        let expanded = expand(&store, "cnh", &tokens);
        assert!(expanded.query_string.split(' ').any(|t| t == "cnh"));
        let unique: HashSet<&str> = expanded.query_string.split(' ').collect();
        assert_eq!(unique.len(), expanded.query_string.split(' ').count());
    }

    #[test]
    fn empty_expansion_yields_wildcard() {
        let store = SynonymStore::new();
        let expanded = expand(&store, "", &[]);
        assert_eq!(expanded.query_string, "*");
    }
}
