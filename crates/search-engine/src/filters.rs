//! Filter compiler (spec §4.D "Filters are compiled to `k:=v` clauses").
//! Grounded on the teacher-adjacent `filter_compiler.rs` shape: one function
//! per filter field, composed with AND semantics, engine-independent from
//! the rest of the gateway so it can be unit-tested without a live index.

use serde_json::Value;

use search_core::SearchFilters;

fn quote_if_needed(value: &str) -> String {
    if value.contains(' ') {
        format!("`{value}`")
    } else {
        value.to_string()
    }
}

fn clause(field: &str, value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => quote_if_needed(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some(format!("{field}:={rendered}"))
}

/// Compile the configured status filter plus the request's typed filters
/// into a single `&&`-joined clause string, or `None` when there's nothing
/// to filter on (spec §4.D, §4.J step 7).
pub fn compile(
    status_filter: Option<&(String, Value)>,
    include_inactive: bool,
    filters: &SearchFilters,
) -> Option<String> {
    let mut clauses = Vec::new();

    if !include_inactive {
        if let Some((field, value)) = status_filter {
            if let Some(c) = clause(field, value) {
                clauses.push(c);
            }
        }
    }
    if let Some(status) = &filters.status {
        clauses.push(format!("status:={}", quote_if_needed(status)));
    }
    if let Some(category) = &filters.category {
        clauses.push(format!("category:={}", quote_if_needed(category)));
    }
    if let Some(sub_category) = &filters.sub_category {
        clauses.push(format!("sub_category:={}", quote_if_needed(sub_category)));
    }
    if let Some(orgao) = &filters.orgao {
        clauses.push(format!("orgao:={}", quote_if_needed(orgao)));
    }
    if let Some(tempo_max) = filters.tempo_max {
        clauses.push(format!("tempo_max:={tempo_max}"));
    }
    if let Some(is_free) = filters.is_free {
        clauses.push(format!("is_free:={is_free}"));
    }
    if let Some(has_digital) = filters.has_digital {
        clauses.push(format!("has_digital:={has_digital}"));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    }
}
