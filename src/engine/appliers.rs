//! Rule application: turn the raw bytes an extractor produced into a typed
//! fact result.
//!
//! The `jsonpath` rule evaluates a jq-dialect query (filters, pipes,
//! `length`, predicate selectors) over the bytes parsed as JSON. A result
//! set of exactly one value is unwrapped; any other size comes back as a
//! list. Unrecognized rule names fall through to the custom-rule registry,
//! whose default is a plain UTF-8 decode.

use super::Engine;
use super::fact::Fact;
use super::value::FactValue;
use crate::Result;
use anyhow::{Context, anyhow, bail};

impl Engine {
    pub(crate) fn apply_rule(&self, fact: &Fact, data: Option<&[u8]>) -> Result<FactValue> {
        match fact.rule.to_ascii_lowercase().as_str() {
            "jsonpath" => apply_json_query(&fact.json_path, data),
            "notempty" => Ok(FactValue::Boolean(data.is_some_and(|bytes| !bytes.is_empty()))),
            "search" => {
                let bytes = data.context("the search rule expects the tree extractor's output")?;
                let hit: bool = serde_json::from_slice(bytes).context("decoding search outcome")?;
                Ok(FactValue::Boolean(hit))
            }
            other => match self.rules.get(other) {
                Some(hook) => hook.apply(fact, data),
                None => Ok(FactValue::String(
                    data.map(|bytes| String::from_utf8_lossy(bytes).into_owned()).unwrap_or_default(),
                )),
            },
        }
    }
}

fn apply_json_query(query: &FactValue, data: Option<&[u8]>) -> Result<FactValue> {
    let expression = match query {
        FactValue::String(text) if !text.is_empty() => text.as_str(),
        FactValue::String(_) => bail!("jsonPath cannot be empty"),
        FactValue::Null => bail!("jsonPath is required but not provided"),
        other => bail!("jsonPath must be a string, got {other}"),
    };

    let Some(data) = data.filter(|bytes| !bytes.is_empty()) else {
        return Ok(FactValue::List(Vec::new()));
    };

    let filter = compile_query(expression)?;
    let input: serde_json::Value = serde_json::from_slice(data).context("parsing extracted bytes as JSON")?;

    let inputs = jaq_core::RcIter::new(core::iter::empty());
    let context = jaq_core::Ctx::new(Vec::new(), &inputs);

    let mut results = Vec::new();
    for item in filter.run((context, jaq_json::Val::from(input))) {
        let Ok(value) = item else {
            bail!("query '{expression}' reported an error");
        };
        results.push(FactValue::from(serde_json::Value::from(value)));
    }

    if results.len() == 1 {
        Ok(results.remove(0))
    } else {
        Ok(FactValue::List(results))
    }
}

fn compile_query(expression: &str) -> Result<jaq_core::Filter<jaq_core::Native<jaq_json::Val>>> {
    use jaq_core::load::{Arena, File, Loader};

    let program = File { code: expression, path: () };
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();

    let modules = loader
        .load(&arena, program)
        .map_err(|_| anyhow!("could not parse query expression '{expression}'"))?;

    jaq_core::Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|_| anyhow!("could not compile query expression '{expression}'"))
}
