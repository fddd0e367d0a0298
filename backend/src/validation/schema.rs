//! Declarative table schemas and the registry the pipeline is built with.

use crate::error::{PipelineError, Result};
use crate::validation::rules::{named_predicate, Rule, ValueType};
use common::model::platform::SourcePlatform;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Duplicate natural keys tolerated in one batch before it is rejected.
pub const DEFAULT_MAX_DUPLICATE_KEYS: usize = 100;

const URL_PATTERN: &str = r#"^https?://[^\s<>"{}|\\^`\[\]]+$"#;
const TIMESTAMP_PATTERN: &str = r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$";

/// A rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Required,
    Type { value_type: ValueType },
    LengthRange { min: usize, max: usize },
    Regex { pattern: String },
    Enum { values: Vec<String> },
    Predicate { name: String },
}

impl RuleSpec {
    fn compile(&self, table: &str) -> Result<Rule> {
        let invalid = |reason: String| PipelineError::InvalidSchema {
            table: table.to_string(),
            reason,
        };
        Ok(match self {
            RuleSpec::Required => Rule::Required,
            RuleSpec::Type { value_type } => Rule::Type(*value_type),
            RuleSpec::LengthRange { min, max } => {
                if min > max {
                    return Err(invalid(format!("length range {}..{} is empty", min, max)));
                }
                Rule::LengthRange {
                    min: *min,
                    max: *max,
                }
            }
            RuleSpec::Regex { pattern } => Rule::Regex(
                Regex::new(pattern).map_err(|e| invalid(format!("regex error: {}", e)))?,
            ),
            RuleSpec::Enum { values } => Rule::Enum(values.clone()),
            RuleSpec::Predicate { name } => Rule::Predicate {
                name: name.clone(),
                check: named_predicate(name)
                    .ok_or_else(|| invalid(format!("unknown predicate '{}'", name)))?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub column: String,
    /// Optional columns may be absent from a batch without aborting the run.
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchemaSpec {
    pub table: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub natural_key: String,
    #[serde(default)]
    pub max_duplicate_keys: Option<usize>,
    pub fields: Vec<FieldSpec>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    pub column: String,
    pub optional: bool,
    pub rules: Vec<Rule>,
}

/// Compiled, ordered rule set for one staging table.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub version: u32,
    pub natural_key: String,
    pub max_duplicate_keys: usize,
    pub fields: Vec<FieldRules>,
}

impl TableSchema {
    pub fn compile(spec: &TableSchemaSpec, default_max_duplicate_keys: usize) -> Result<Self> {
        let fields = spec
            .fields
            .iter()
            .map(|f| -> Result<FieldRules> {
                Ok(FieldRules {
                    column: f.column.clone(),
                    optional: f.optional,
                    rules: f
                        .rules
                        .iter()
                        .map(|r| r.compile(&spec.table))
                        .collect::<Result<Vec<_>>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TableSchema {
            table: spec.table.clone(),
            version: spec.version,
            natural_key: spec.natural_key.clone(),
            max_duplicate_keys: spec
                .max_duplicate_keys
                .unwrap_or(default_max_duplicate_keys),
            fields,
        })
    }
}

/// Table-name → schema mapping handed to the pipeline at construction.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn compile(specs: &[TableSchemaSpec], default_max_duplicate_keys: usize) -> Result<Self> {
        let mut schemas = HashMap::new();
        for spec in specs {
            let schema = TableSchema::compile(spec, default_max_duplicate_keys)?;
            if schemas.insert(spec.table.clone(), schema).is_some() {
                return Err(PipelineError::InvalidSchema {
                    table: spec.table.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
        }
        Ok(SchemaRegistry { schemas })
    }

    /// Registry holding the built-in staging schemas.
    pub fn builtin(default_max_duplicate_keys: usize) -> Result<Self> {
        SchemaRegistry::compile(&builtin_specs(), default_max_duplicate_keys)
    }

    pub fn get(&self, table: &str) -> Result<&TableSchema> {
        self.schemas
            .get(table)
            .ok_or_else(|| PipelineError::SchemaNotFound(table.to_string()))
    }

    pub fn contains(&self, table: &str) -> bool {
        self.schemas.contains_key(table)
    }
}

fn field(column: &str, rules: Vec<RuleSpec>) -> FieldSpec {
    FieldSpec {
        column: column.to_string(),
        optional: false,
        rules,
    }
}

fn title_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::Required,
        typed(ValueType::Text),
        RuleSpec::LengthRange { min: 6, max: 199 },
    ]
}

fn typed(value_type: ValueType) -> RuleSpec {
    RuleSpec::Type { value_type }
}

fn key_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::Required,
        RuleSpec::Predicate {
            name: "non_empty".to_string(),
        },
    ]
}

fn regex(pattern: &str) -> RuleSpec {
    RuleSpec::Regex {
        pattern: pattern.to_string(),
    }
}

/// Schemas for the staging tables shipped with the pipeline.
pub fn builtin_specs() -> Vec<TableSchemaSpec> {
    vec![
        TableSchemaSpec {
            table: SourcePlatform::Gfg.staging_table().to_string(),
            version: 1,
            natural_key: "article_id".to_string(),
            max_duplicate_keys: None,
            fields: vec![
                field("article_id", key_rules()),
                field("title", title_rules()),
                field("author_id", vec![regex(r"^[a-z0-9]+$")]),
                field(
                    "last_updated",
                    vec![typed(ValueType::Timestamp), regex(TIMESTAMP_PATTERN)],
                ),
                field("link", vec![regex(URL_PATTERN)]),
                field(
                    "category",
                    vec![RuleSpec::Enum {
                        values: vec!["easy".into(), "medium".into(), "hard".into()],
                    }],
                ),
            ],
        },
        TableSchemaSpec {
            table: SourcePlatform::Medium.staging_table().to_string(),
            version: 1,
            natural_key: "id_rss".to_string(),
            max_duplicate_keys: None,
            fields: vec![
                field("id_rss", key_rules()),
                field("title", title_rules()),
                field("link", vec![RuleSpec::Required, regex(URL_PATTERN)]),
                field("published", vec![typed(ValueType::Timestamp)]),
                field(
                    "tags",
                    vec![RuleSpec::Predicate {
                        name: "json_array_or_empty".to_string(),
                    }],
                ),
                field(
                    "authors",
                    vec![RuleSpec::Predicate {
                        name: "json_array_or_empty".to_string(),
                    }],
                ),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_covers_every_platform() {
        let registry = SchemaRegistry::builtin(DEFAULT_MAX_DUPLICATE_KEYS).unwrap();
        for platform in SourcePlatform::ALL {
            let schema = registry.get(platform.staging_table()).unwrap();
            assert_eq!(schema.max_duplicate_keys, DEFAULT_MAX_DUPLICATE_KEYS);
        }
        assert!(matches!(
            registry.get("stg_unknown"),
            Err(PipelineError::SchemaNotFound(_))
        ));
    }

    #[test]
    fn builtin_date_columns_are_type_checked() {
        let registry = SchemaRegistry::builtin(DEFAULT_MAX_DUPLICATE_KEYS).unwrap();
        for (table, column, good) in [
            ("stg_gfg_articles", "last_updated", "2023-03-12 00:00:00"),
            ("stg_medium_articles", "published", "Tue, 10 Jun 2025 14:12:01 GMT"),
        ] {
            let schema = registry.get(table).unwrap();
            let field = schema.fields.iter().find(|f| f.column == column).unwrap();
            assert_eq!(field.rules[0].name(), "dtype(timestamp)");
            assert!(field.rules.iter().all(|r| r.passes(Some(good))));
            assert!(!field.rules[0].passes(Some("next tuesday")));
        }
    }

    #[test]
    fn spec_parses_from_json() {
        let json = r#"{
            "table": "stg_gfg_articles",
            "version": 2,
            "natural_key": "article_id",
            "max_duplicate_keys": 5,
            "fields": [
                {"column": "article_id", "rules": [{"kind": "required"}, {"kind": "predicate", "name": "non_empty"}]},
                {"column": "title", "rules": [{"kind": "length_range", "min": 6, "max": 199}]},
                {"column": "category", "optional": true, "rules": [{"kind": "enum", "values": ["easy"]}]},
                {"column": "last_updated", "rules": [{"kind": "type", "value_type": "timestamp"}]}
            ]
        }"#;
        let spec: TableSchemaSpec = serde_json::from_str(json).unwrap();
        let schema = TableSchema::compile(&spec, 100).unwrap();
        assert_eq!(schema.version, 2);
        assert_eq!(schema.max_duplicate_keys, 5);
        assert!(schema.fields[2].optional);
        assert_eq!(schema.fields[3].rules[0].name(), "dtype(timestamp)");
    }

    #[test]
    fn bad_declarations_are_rejected() {
        let mut spec = builtin_specs().remove(0);
        spec.fields[0].rules.push(RuleSpec::Regex {
            pattern: "([".to_string(),
        });
        assert!(matches!(
            TableSchema::compile(&spec, 100),
            Err(PipelineError::InvalidSchema { .. })
        ));

        let mut spec = builtin_specs().remove(0);
        spec.fields[0].rules.push(RuleSpec::Predicate {
            name: "is_prime".to_string(),
        });
        assert!(TableSchema::compile(&spec, 100).is_err());

        let twice = vec![builtin_specs().remove(0), builtin_specs().remove(0)];
        assert!(SchemaRegistry::compile(&twice, 100).is_err());
    }
}
