//! Interpolation and dependency bookkeeping shared by the processors.

use super::fact::Fact;
use super::value::FactValue;
use crate::Result;
use anyhow::Context;
use compact_str::CompactString;
use std::collections::HashMap;

/// Token replaced by the component name inside fact fields.
pub(crate) const COMPONENT_TOKEN: &str = "${Metadata.Name}";

/// Position of each fact id within the declaration-ordered fact list.
pub(crate) type FactIndex = HashMap<CompactString, usize>;

/// Replace every occurrence of [`COMPONENT_TOKEN`] in the fields that carry
/// component-relative locations. Other fields are left untouched. Plain
/// substring replacement, so applying it twice is a no-op.
pub(crate) fn interpolate_component(fact: &mut Fact, component_name: &str) {
    fact.repo = fact.repo.replace(COMPONENT_TOKEN, component_name);
    fact.file_path = fact.file_path.replace(COMPONENT_TOKEN, component_name);
    fact.uri = fact.uri.replace(COMPONENT_TOKEN, component_name);
    fact.prometheus_query = fact.prometheus_query.replace(COMPONENT_TOKEN, component_name);

    if let FactValue::String(query) = &fact.json_path {
        fact.json_path = FactValue::String(query.replace(COMPONENT_TOKEN, component_name));
    }
}

/// True iff every dependency id resolves to a fact that has completed.
pub(crate) fn dependencies_satisfied(fact: &Fact, index: &FactIndex, facts: &[Fact]) -> bool {
    fact.depends_on
        .iter()
        .all(|id| index.get(id).is_some_and(|&position| facts[position].done))
}

/// Results of the satisfied dependencies, in `dependsOn` order.
pub(crate) fn dependency_results(fact: &Fact, index: &FactIndex, facts: &[Fact]) -> Vec<FactValue> {
    fact.depends_on
        .iter()
        .filter_map(|id| index.get(id))
        .filter(|&&position| facts[position].done)
        .map(|&position| facts[position].result.clone())
        .collect()
}

/// Parse TOML bytes and re-encode them as the equivalent JSON document, so
/// downstream JSON queries work regardless of the on-disk syntax.
pub(crate) fn toml_to_json(data: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(data).context("TOML content is not valid UTF-8")?;
    let value: toml::Value = toml::from_str(text).context("parsing TOML content")?;
    serde_json::to_vec(&value).context("re-encoding TOML content as JSON")
}
