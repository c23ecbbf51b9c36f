//! The evaluation driver.
//!
//! Facts stay in declaration order in a flat vector; a separate id → position
//! index resolves dependencies. The driver repeatedly scans the list,
//! processing every fact whose dependencies have completed, until the list
//! quiesces. A pass that makes no progress while facts remain is a dependency
//! cycle (or a reference to an id that does not exist). Declaration order is
//! the deterministic tie-breaker for facts that become ready in the same
//! pass, since nothing runs concurrently within one metric.

use super::Engine;
use super::fact::Fact;
use super::helpers::{FactIndex, dependencies_satisfied, dependency_results, interpolate_component};
use super::value::FactValue;
use crate::Result;
use anyhow::{Context, bail};

const LOG_TARGET: &str = "    engine";

impl Engine {
    /// Evaluate a metric's facts for one component and return the metric's
    /// final value.
    ///
    /// The final value is the last non-null fact result in declaration
    /// order, returned as a number when it coerces to one and unchanged
    /// otherwise. Any processor failure aborts the evaluation, wrapped with
    /// the failing fact's id.
    pub async fn evaluate_metric(&self, mut facts: Vec<Fact>, component_name: &str) -> Result<FactValue> {
        if facts.is_empty() {
            bail!("no facts provided");
        }

        let index: FactIndex = facts
            .iter()
            .enumerate()
            .map(|(position, fact)| (fact.id.clone(), position))
            .collect();

        for fact in &mut facts {
            interpolate_component(fact, component_name);
        }

        loop {
            let mut progress = false;

            for position in 0..facts.len() {
                if facts[position].done {
                    continue;
                }
                if !dependencies_satisfied(&facts[position], &index, &facts) {
                    continue;
                }

                let fact = facts[position].clone();
                let dependencies = dependency_results(&fact, &index, &facts);

                log::debug!(target: LOG_TARGET, "Processing fact '{}'", fact.id);
                let result = self
                    .process_fact(&fact, &dependencies)
                    .await
                    .with_context(|| format!("failed to process fact '{}'", fact.id))?;

                facts[position].result = result;
                facts[position].done = true;
                progress = true;
            }

            if facts.iter().all(|fact| fact.done) {
                break;
            }
            if !progress {
                bail!("circular dependency or unresolved dependencies detected");
            }
        }

        let final_result = facts
            .iter()
            .rev()
            .map(|fact| &fact.result)
            .find(|result| !result.is_null())
            .cloned()
            .unwrap_or(FactValue::Null);

        match final_result.as_float() {
            Some(number) => Ok(FactValue::Number(number)),
            None => Ok(final_result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineBuilder;

    fn engine() -> Engine {
        EngineBuilder::new("./repos").build().unwrap()
    }

    fn extract_fact(id: &str, repo_root: &std::path::Path) -> (Engine, Fact) {
        let engine = EngineBuilder::new(camino::Utf8PathBuf::from_path_buf(repo_root.to_path_buf()).unwrap())
            .build()
            .unwrap();
        let fact = Fact {
            id: id.into(),
            kind: "extract".into(),
            source: "github".into(),
            repo: "svc".into(),
            file_path: "README.md".into(),
            ..Fact::default()
        };
        (engine, fact)
    }

    #[tokio::test]
    async fn test_empty_fact_list_fails() {
        let err = engine().evaluate_metric(Vec::new(), "svc").await.unwrap_err();
        assert!(err.to_string().contains("no facts provided"));
    }

    #[tokio::test]
    async fn test_cycle_is_detected() {
        let facts = vec![
            Fact {
                id: "a".into(),
                kind: "aggregate".into(),
                method: "count".into(),
                depends_on: vec!["b".into()],
                ..Fact::default()
            },
            Fact {
                id: "b".into(),
                kind: "aggregate".into(),
                method: "count".into(),
                depends_on: vec!["a".into()],
                ..Fact::default()
            },
        ];

        let err = engine().evaluate_metric(facts, "svc").await.unwrap_err();
        assert!(err.to_string().contains("circular dependency"));
    }

    #[tokio::test]
    async fn test_dangling_dependency_is_detected() {
        let facts = vec![Fact {
            id: "a".into(),
            kind: "aggregate".into(),
            method: "count".into(),
            depends_on: vec!["ghost".into()],
            ..Fact::default()
        }];

        let err = engine().evaluate_metric(facts, "svc").await.unwrap_err();
        assert!(err.to_string().contains("circular dependency or unresolved dependencies"));
    }

    #[tokio::test]
    async fn test_single_extract_returns_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("svc/README.md"), b"hello").unwrap();

        let (engine, fact) = extract_fact("a", dir.path());
        let result = engine.evaluate_metric(vec![fact], "svc").await.unwrap();
        assert_eq!(result, FactValue::String("hello".into()));
    }

    #[tokio::test]
    async fn test_failure_is_wrapped_with_the_fact_id() {
        let facts = vec![Fact { id: "broken".into(), kind: "extract".into(), ..Fact::default() }];
        let err = engine().evaluate_metric(facts, "svc").await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to process fact 'broken'"));
    }

    #[tokio::test]
    async fn test_placeholder_interpolation_feeds_extraction() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("billing")).unwrap();
        std::fs::write(dir.path().join("billing/README.md"), b"docs").unwrap();

        let (engine, mut fact) = extract_fact("a", dir.path());
        fact.repo = "${Metadata.Name}".into();

        let result = engine.evaluate_metric(vec![fact], "billing").await.unwrap();
        assert_eq!(result, FactValue::String("docs".into()));
    }

    #[tokio::test]
    async fn test_final_result_is_the_last_non_null_in_declaration_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("svc/README.md"), b"text").unwrap();

        let (engine, first) = extract_fact("first", dir.path());
        // The second fact reads a missing file with no rule, so its result
        // stays null and the driver falls back to the first fact.
        let second = Fact {
            id: "second".into(),
            kind: "extract".into(),
            source: "github".into(),
            repo: "svc".into(),
            file_path: "missing.txt".into(),
            ..Fact::default()
        };

        let result = engine.evaluate_metric(vec![first, second], "svc").await.unwrap();
        assert_eq!(result, FactValue::String("text".into()));
    }

    #[tokio::test]
    async fn test_final_result_coerces_to_float_when_possible() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("svc/README.md"), b"42").unwrap();

        let (engine, fact) = extract_fact("a", dir.path());
        let result = engine.evaluate_metric(vec![fact], "svc").await.unwrap();
        assert_eq!(result, FactValue::Number(42.0));
    }

    #[tokio::test]
    async fn test_out_of_order_declaration_still_resolves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("svc/README.md"), b"content").unwrap();

        // The aggregate is declared before the extract it depends on; the
        // fixed-point loop needs a second pass to finish it.
        let aggregate = Fact {
            id: "z".into(),
            kind: "aggregate".into(),
            method: "count".into(),
            depends_on: vec!["a".into()],
            ..Fact::default()
        };
        let (engine, extract) = extract_fact("a", dir.path());

        let result = engine.evaluate_metric(vec![aggregate, extract], "svc").await.unwrap();
        // Final result scan from the back: the extract's string result wins,
        // then coerces to nothing numeric, so it is returned as-is.
        assert_eq!(result, FactValue::String("content".into()));
    }

    #[tokio::test]
    async fn test_evaluation_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("svc")).unwrap();
        std::fs::write(dir.path().join("svc/README.md"), b"stable").unwrap();

        let (engine, fact) = extract_fact("a", dir.path());
        let first = engine.evaluate_metric(vec![fact.clone()], "svc").await.unwrap();
        let second = engine.evaluate_metric(vec![fact], "svc").await.unwrap();
        assert_eq!(first, second);
    }
}
