//! The fact data model.
//!
//! Facts arrive from metric definition files, so every declarative field is
//! optional on the wire and defaults to empty. The `type`, `source`, and
//! `method` fields are open sets: the enums below carry a catch-all variant
//! so unrecognized names flow through to the engine's hook registries
//! instead of failing at parse time.

use super::FactValue;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One node in a metric's evaluation graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fact {
    /// Identifier other facts reference through `dependsOn`. Unique within a metric.
    pub id: CompactString,

    /// Human-readable label, unused by the engine.
    pub name: String,

    /// Fact family; selects the processor.
    #[serde(rename = "type")]
    pub kind: String,

    /// Where an extract fact reads its bytes from.
    pub source: String,

    /// Repository directory name under the working-tree root.
    pub repo: String,

    /// File to read, relative to the repository directory.
    pub file_path: String,

    /// Query expression for the `jsonpath` rule. A string in practice, but
    /// kept loose because definition files occasionally carry other shapes.
    pub json_path: FactValue,

    /// Transformation applied to extracted bytes, or validation rule.
    pub rule: String,

    /// Optional request authentication for the API source.
    pub auth: Option<AuthSpec>,

    /// Ids of facts whose results this fact consumes, in consumption order.
    pub depends_on: Vec<CompactString>,

    /// Reduction method for aggregate facts.
    pub method: String,

    /// Request URI for the API source.
    pub uri: String,

    /// Regular expression for the `regex_match` rule.
    pub pattern: String,

    /// Substring looked for by the `search` rule.
    pub search_string: String,

    /// Query for the monitoring source.
    pub prometheus_query: String,

    #[serde(skip)]
    pub result: FactValue,

    #[serde(skip)]
    pub done: bool,
}

impl Fact {
    #[must_use]
    pub fn kind(&self) -> FactKind {
        self.kind.parse().unwrap_or_else(|_| FactKind::Other(self.kind.clone()))
    }

    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        self.source.parse().unwrap_or_else(|_| SourceKind::Other(self.source.clone()))
    }

    #[must_use]
    pub fn method_kind(&self) -> AggregateMethod {
        self.method.parse().unwrap_or_else(|_| AggregateMethod::Other(self.method.clone()))
    }
}

/// Request authentication: set `header` to the value of the process
/// environment variable named by `token_var`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSpec {
    pub header: String,
    pub token_var: String,
}

/// Fact family.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FactKind {
    Extract,
    Validate,
    Aggregate,
    #[strum(default)]
    Other(String),
}

/// Origin of an extract fact's bytes.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SourceKind {
    /// Local working tree mirroring the component's source repository. The
    /// name is historical; nothing here talks to a remote.
    Github,
    #[strum(to_string = "jsonapi", serialize = "api")]
    Api,
    Prometheus,
    #[strum(default)]
    Other(String),
}

/// Reduction applied by an aggregate fact.
#[derive(Debug, Clone, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AggregateMethod {
    Count,
    Sum,
    And,
    Or,
    #[strum(default)]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fact_deserializes_from_yaml() {
        let yaml = r"
id: version
type: extract
source: github
repo: my-service
filePath: package.json
rule: jsonpath
jsonPath: .version
dependsOn: [a, b]
";
        let fact: Fact = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fact.id, "version");
        assert_eq!(fact.kind(), FactKind::Extract);
        assert_eq!(fact.source_kind(), SourceKind::Github);
        assert_eq!(fact.file_path, "package.json");
        assert_eq!(fact.json_path, FactValue::String(".version".into()));
        assert_eq!(fact.depends_on, vec![CompactString::from("a"), CompactString::from("b")]);
        assert!(!fact.done);
        assert!(fact.result.is_null());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let yaml = r"
id: x
type: extract
somethingElse: 12
";
        let fact: Fact = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fact.id, "x");
    }

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("Extract".parse::<FactKind>().unwrap(), FactKind::Extract);
        assert_eq!("AGGREGATE".parse::<FactKind>().unwrap(), FactKind::Aggregate);
    }

    #[test]
    fn test_unknown_kind_falls_through() {
        assert_eq!("scorecard".parse::<FactKind>().unwrap(), FactKind::Other("scorecard".into()));
    }

    #[test]
    fn test_api_source_aliases() {
        assert_eq!("api".parse::<SourceKind>().unwrap(), SourceKind::Api);
        assert_eq!("jsonapi".parse::<SourceKind>().unwrap(), SourceKind::Api);
        assert_eq!("JsonAPI".parse::<SourceKind>().unwrap(), SourceKind::Api);
    }

    #[test]
    fn test_auth_spec_from_yaml() {
        let yaml = r"
id: x
auth:
  header: Authorization
  tokenVar: MY_TOKEN
";
        let fact: Fact = serde_yaml::from_str(yaml).unwrap();
        let auth = fact.auth.unwrap();
        assert_eq!(auth.header, "Authorization");
        assert_eq!(auth.token_var, "MY_TOKEN");
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("sum".parse::<AggregateMethod>().unwrap(), AggregateMethod::Sum);
        assert_eq!("median".parse::<AggregateMethod>().unwrap(), AggregateMethod::Other("median".into()));
    }
}
