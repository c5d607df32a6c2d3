//! Query Parser (spec §4.A). A pure string transform, no I/O — grounded on
//! the teacher's token-level preprocessing (`preprocess_search_query`).

use std::collections::HashSet;

/// Closed stop-word set for Portuguese (spec §4.A "fixed closed stop-word set").
const STOP_WORDS: &[&str] = &[
    "a", "o", "as", "os", "de", "da", "do", "das", "dos", "em", "na", "no", "nas", "nos", "um",
    "uma", "uns", "umas", "e", "ou", "para", "por", "com", "sem", "que", "se", "é", "ao", "aos",
];

/// Closed set of known acronyms (spec §4.A "sigla detection").
const SIGLAS: &[&str] = &[
    "iptu", "cnh", "rg", "cpf", "cnpj", "inss", "cep", "nis", "pis", "ssp",
];

/// Result of parsing a raw query (spec §3 "Parsed query").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedQuery {
    pub original: String,
    pub normalized: String,
    pub tokens: Vec<String>,
    pub has_sigla: bool,
}

fn is_accepted_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '\'' || c.is_whitespace()
}

/// Trim, collapse whitespace, lowercase, strip punctuation except hyphen,
/// apostrophe and accented letters (spec §4.A).
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .chars()
        .map(|c| if is_accepted_char(c) { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Split on whitespace, drop length-1 tokens and stop words (spec §4.A).
pub fn tokenize(normalized: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    normalized
        .split_whitespace()
        .filter(|t| t.chars().count() > 1 && !stop.contains(t))
        .map(str::to_string)
        .collect()
}

fn detect_sigla(tokens: &[String]) -> bool {
    let siglas: HashSet<&str> = SIGLAS.iter().copied().collect();
    tokens.iter().any(|t| siglas.contains(t.as_str()))
}

/// Parse a raw query string into its normalized, tokenized form.
pub fn parse(raw: &str) -> ParsedQuery {
    let normalized = normalize(raw);
    let tokens = tokenize(&normalized);
    let has_sigla = detect_sigla(&tokens);
    ParsedQuery { original: raw.to_string(), normalized, tokens, has_sigla }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_lowercases() {
        assert_eq!(normalize("  Horário   de Funcionamento  "), "horário de funcionamento");
    }

    #[test]
    fn normalize_strips_punctuation_but_keeps_hyphen_and_apostrophe() {
        assert_eq!(normalize("d'água, já!"), "d'água já");
        assert_eq!(normalize("pré-natal?!"), "pré-natal");
    }

    #[test]
    fn tokenize_drops_single_char_and_stop_words() {
        let normalized = normalize("a emissão de cnh");
        assert_eq!(tokenize(&normalized), vec!["emissão".to_string(), "cnh".to_string()]);
    }

    #[test]
    fn sigla_detected_by_membership() {
        let parsed = parse("segunda via do iptu");
        assert!(parsed.has_sigla);
        let parsed = parse("horário de funcionamento");
        assert!(!parsed.has_sigla);
    }

    #[test]
    fn parse_is_idempotent_on_normalized_form() {
        let first = parse("  Segunda Via do IPTU  ");
        let second = parse(&first.normalized);
        assert_eq!(first.normalized, second.normalized);
        assert_eq!(first.tokens, second.tokens);
    }

    #[test]
    fn parse_preserves_original() {
        let parsed = parse("  IPTU  ");
        assert_eq!(parsed.original, "  IPTU  ");
    }
}
