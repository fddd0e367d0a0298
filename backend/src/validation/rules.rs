use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar type a stored string must parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Text,
    Integer,
    Float,
    /// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, RFC 3339 or RFC 2822.
    Timestamp,
}

impl ValueType {
    fn accepts(&self, value: &str) -> bool {
        match self {
            ValueType::Text => true,
            ValueType::Integer => value.trim().parse::<i64>().is_ok(),
            ValueType::Float => value.trim().parse::<f64>().is_ok(),
            ValueType::Timestamp => {
                let v = value.trim();
                NaiveDateTime::parse_from_str(v, "%Y-%m-%d %H:%M:%S").is_ok()
                    || NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
                    || DateTime::parse_from_rfc3339(v).is_ok()
                    || DateTime::parse_from_rfc2822(v).is_ok()
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Timestamp => "timestamp",
        }
    }
}

/// A compiled field check.
///
/// Nulls only ever fail `Required`; every other rule passes a null, which is
/// what makes a field without `Required` nullable.
#[derive(Debug, Clone)]
pub enum Rule {
    Required,
    Type(ValueType),
    /// Inclusive bounds on the character count.
    LengthRange { min: usize, max: usize },
    Regex(Regex),
    Enum(Vec<String>),
    Predicate { name: String, check: fn(&str) -> bool },
}

impl Rule {
    /// Name reported in failure sets and quarantine messages.
    pub fn name(&self) -> String {
        match self {
            Rule::Required => "required".to_string(),
            Rule::Type(t) => format!("dtype({})", t.label()),
            Rule::LengthRange { min, max } => format!("str_length({}, {})", min, max),
            Rule::Regex(re) => format!("str_matches('{}')", re.as_str()),
            Rule::Enum(values) => format!(
                "isin([{}])",
                values
                    .iter()
                    .map(|v| format!("'{}'", v))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Rule::Predicate { name, .. } => format!("custom:{}", name),
        }
    }

    pub fn passes(&self, value: Option<&str>) -> bool {
        let value = match (self, value) {
            (Rule::Required, v) => return v.is_some(),
            (_, None) => return true,
            (_, Some(v)) => v,
        };
        match self {
            Rule::Required => true,
            Rule::Type(t) => t.accepts(value),
            Rule::LengthRange { min, max } => {
                let len = value.chars().count();
                len >= *min && len <= *max
            }
            Rule::Regex(re) => re.is_match(value),
            Rule::Enum(values) => values.iter().any(|v| v == value),
            Rule::Predicate { check, .. } => check(value),
        }
    }
}

/// Custom predicates that schema declarations may reference by name.
pub fn named_predicate(name: &str) -> Option<fn(&str) -> bool> {
    let check: fn(&str) -> bool = match name {
        "non_empty" => |s| !s.trim().is_empty(),
        "json_array" => |s| matches!(serde_json::from_str::<Value>(s), Ok(Value::Array(_))),
        "json_object" => |s| matches!(serde_json::from_str::<Value>(s), Ok(Value::Object(_))),
        // Normalizers write `{}` when a feed omits a list.
        "json_array_or_empty" => |s| match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(_)) => true,
            Ok(Value::Object(map)) => map.is_empty(),
            _ => false,
        },
        _ => return None,
    };
    Some(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_only_fail_required() {
        let rules = [
            Rule::Type(ValueType::Integer),
            Rule::LengthRange { min: 6, max: 199 },
            Rule::Regex(Regex::new("^x$").unwrap()),
            Rule::Enum(vec!["easy".into()]),
        ];
        for rule in &rules {
            assert!(rule.passes(None), "{} should pass null", rule.name());
        }
        assert!(!Rule::Required.passes(None));
        assert!(Rule::Required.passes(Some("")));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let rule = Rule::LengthRange { min: 3, max: 3 };
        assert!(rule.passes(Some("äöü")));
        assert!(!rule.passes(Some("ab")));
        assert!(!rule.passes(Some("abcd")));
    }

    #[test]
    fn timestamps_accept_known_layouts() {
        let rule = Rule::Type(ValueType::Timestamp);
        assert!(rule.passes(Some("2023-03-12 00:00:00")));
        assert!(rule.passes(Some("Tue, 10 Jun 2025 14:12:01 GMT")));
        assert!(rule.passes(Some("2025-06-10T14:12:01Z")));
        assert!(!rule.passes(Some("12 Mar, 2023")));
    }

    #[test]
    fn rule_names_describe_the_check() {
        assert_eq!(Rule::LengthRange { min: 6, max: 199 }.name(), "str_length(6, 199)");
        assert_eq!(
            Rule::Enum(vec!["easy".into(), "hard".into()]).name(),
            "isin(['easy', 'hard'])"
        );
        let check = named_predicate("non_empty").unwrap();
        assert_eq!(
            Rule::Predicate {
                name: "non_empty".into(),
                check
            }
            .name(),
            "custom:non_empty"
        );
    }

    #[test]
    fn named_predicates() {
        let non_empty = named_predicate("non_empty").unwrap();
        assert!(!non_empty("   "));
        let arr = named_predicate("json_array_or_empty").unwrap();
        assert!(arr(r#"[{"term": "rust"}]"#));
        assert!(arr("{}"));
        assert!(!arr(r#"{"a": 1}"#));
        assert!(!arr("not json"));
        assert!(named_predicate("no_such_check").is_none());
    }
}
