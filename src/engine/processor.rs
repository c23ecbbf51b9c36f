//! Fact processors: one per fact family.
//!
//! Extract facts fetch bytes and optionally run a rule; validate and
//! aggregate facts only combine the results of their dependencies. Unknown
//! fact types dispatch through the custom-processor registry.

use super::Engine;
use super::fact::{AggregateMethod, Fact, FactKind};
use super::value::FactValue;
use crate::Result;
use anyhow::{Context, bail};
use regex::Regex;
use std::collections::HashSet;

impl Engine {
    pub(crate) async fn process_fact(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<FactValue> {
        match fact.kind() {
            FactKind::Extract => self.process_extract(fact, dependencies).await,
            FactKind::Validate => process_validate(fact, dependencies),
            FactKind::Aggregate => process_aggregate(fact, dependencies),
            FactKind::Other(kind) => match self.processors.get(&kind.to_ascii_lowercase()) {
                Some(hook) => hook.process(fact, dependencies).await,
                None => bail!("unknown fact type: {kind}"),
            },
        }
    }

    async fn process_extract(&self, fact: &Fact, dependencies: &[FactValue]) -> Result<FactValue> {
        if fact.source.is_empty() {
            bail!("source is required for extract facts");
        }

        let data = self
            .extract_from_source(fact, dependencies)
            .await
            .with_context(|| format!("extraction failed from source '{}'", fact.source))?;

        if !fact.rule.is_empty() {
            return self
                .apply_rule(fact, data.as_deref())
                .with_context(|| format!("rule '{}' failed", fact.rule));
        }

        Ok(match data {
            Some(bytes) if !bytes.is_empty() => FactValue::String(String::from_utf8_lossy(&bytes).into_owned()),
            _ => FactValue::Null,
        })
    }
}

fn process_validate(fact: &Fact, dependencies: &[FactValue]) -> Result<FactValue> {
    if dependencies.is_empty() {
        bail!("validation requires dependencies");
    }

    match fact.rule.to_ascii_lowercase().as_str() {
        "regex_match" => {
            let regex = Regex::new(&fact.pattern).with_context(|| format!("compiling pattern '{}'", fact.pattern))?;

            if let [only] = dependencies {
                return Ok(FactValue::Boolean(regex.is_match(&only.to_string())));
            }

            Ok(FactValue::List(
                dependencies
                    .iter()
                    .map(|dependency| FactValue::Boolean(regex.is_match(&dependency.to_string())))
                    .collect(),
            ))
        }
        "deps_match" => {
            // A single dependency trivially matches itself.
            if dependencies.len() < 2 {
                return Ok(FactValue::Boolean(true));
            }

            let first = dependencies[0].to_string();
            Ok(FactValue::Boolean(
                dependencies[1..].iter().all(|dependency| dependency.to_string() == first),
            ))
        }
        "unique" => {
            let mut seen = HashSet::new();
            Ok(FactValue::Boolean(
                dependencies.iter().all(|dependency| seen.insert(dependency.to_string())),
            ))
        }
        other => bail!("unknown validation rule: {other}"),
    }
}

fn process_aggregate(fact: &Fact, dependencies: &[FactValue]) -> Result<FactValue> {
    if dependencies.is_empty() {
        bail!("aggregation requires dependencies");
    }

    match fact.method_kind() {
        AggregateMethod::Count => Ok(FactValue::Number(dependencies.len() as f64)),
        AggregateMethod::Sum => Ok(FactValue::Number(
            dependencies.iter().filter_map(FactValue::as_float).sum(),
        )),
        AggregateMethod::And => Ok(FactValue::Boolean(
            dependencies
                .iter()
                .filter_map(FactValue::as_boolean)
                .fold(true, |all, flag| all && flag),
        )),
        AggregateMethod::Or => Ok(FactValue::Boolean(
            dependencies
                .iter()
                .filter_map(FactValue::as_boolean)
                .fold(false, |any, flag| any || flag),
        )),
        AggregateMethod::Other(method) => bail!("unknown aggregation method: {method}"),
    }
}
