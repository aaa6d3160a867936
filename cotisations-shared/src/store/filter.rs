/// Client-side filtering for `Store::search`
///
/// Filters are a JSON object mapping field paths to expected values:
/// - string values match when the stringified field contains them,
///   ignoring case; a missing or null field reads as the empty string, so
///   only an empty needle matches it
/// - `null` values are ignored
/// - any other value must be equal to the field
///
/// Field paths may address nested objects with dots (`adresse.ville`).

use serde_json::{Map, Value};

/// Filter map used by searches
pub type Filters = Map<String, Value>;

/// Resolves a dot-separated path inside a JSON document
pub fn value_at_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

/// Returns true when `document` satisfies every filter
pub fn matches(document: &Value, filters: &Filters) -> bool {
    filters.iter().all(|(path, expected)| {
        if expected.is_null() {
            return true;
        }

        let actual = value_at_path(document, path);

        match expected {
            Value::String(needle) => {
                let haystack = match actual {
                    Some(Value::String(s)) => s.to_lowercase(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string().to_lowercase(),
                };
                haystack.contains(&needle.to_lowercase())
            }
            Value::Number(n) => match actual.and_then(Value::as_f64) {
                Some(a) => n.as_f64().is_some_and(|e| e == a),
                None => false,
            },
            other => actual == Some(other),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(value: Value) -> Filters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_string_filter_is_case_insensitive_substring() {
        let doc = json!({"nom": "Agbodjan", "prenom": "Kossi"});
        assert!(matches(&doc, &filters(json!({"nom": "bodj"}))));
        assert!(matches(&doc, &filters(json!({"nom": "AGBO"}))));
        assert!(!matches(&doc, &filters(json!({"nom": "Mensah"}))));
    }

    #[test]
    fn test_string_filter_matches_stringified_numbers() {
        let doc = json!({"telephone": 90112233});
        assert!(matches(&doc, &filters(json!({"telephone": "1122"}))));
    }

    #[test]
    fn test_number_filter_uses_equality() {
        let doc = json!({"canton_id": 3});
        assert!(matches(&doc, &filters(json!({"canton_id": 3}))));
        assert!(!matches(&doc, &filters(json!({"canton_id": 33}))));
        assert!(matches(&doc, &filters(json!({"canton_id": 3.0}))));
    }

    #[test]
    fn test_null_filter_is_ignored() {
        let doc = json!({"statut": "actif"});
        assert!(matches(&doc, &filters(json!({"statut": null, "absent": null}))));
    }

    #[test]
    fn test_dot_path_reaches_nested_fields() {
        let doc = json!({"adresse": {"ville": "Lomé"}});
        assert_eq!(value_at_path(&doc, "adresse.ville"), Some(&json!("Lomé")));
        assert!(matches(&doc, &filters(json!({"adresse.ville": "lom"}))));
        assert!(!matches(&doc, &filters(json!({"adresse.rue": "x"}))));
    }

    #[test]
    fn test_missing_field_reads_as_empty_string() {
        let doc = json!({"nom": "Afi", "telephone": null});
        assert!(!matches(&doc, &filters(json!({"telephone": "9"}))));
        assert!(!matches(&doc, &filters(json!({"reference": "PAY"}))));
        assert!(matches(&doc, &filters(json!({"reference": ""}))));
        assert!(matches(&doc, &filters(json!({"telephone": ""}))));
    }

    #[test]
    fn test_boolean_filter_uses_equality() {
        let doc = json!({"valeur": true});
        assert!(matches(&doc, &filters(json!({"valeur": true}))));
        assert!(!matches(&doc, &filters(json!({"valeur": false}))));
    }
}
