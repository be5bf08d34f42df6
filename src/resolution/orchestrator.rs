//! Resolution Orchestrator - one canonicalization run
//!
//! LOADED → DIFFED → (RESOLVED | SKIPPED-RESOLUTION) → PERSISTED → APPLIED
//!
//! The oracle is called at most once per run, with every unseen key in a single
//! batch, and never when nothing is unseen. Any failure before APPLIED drops the
//! records and leaves the store as it was, so callers never see half-applied
//! canonicalization and can simply rerun.

use crate::error::Result;
use crate::oracle::{Oracle, OracleAnswer, OracleRequest};
use crate::record::Record;
use crate::resolution::policy::{Rejection, ResolutionPolicy};
use crate::resolution::{RejectedKey, RunPhase, RunReport};
use crate::store::{Mapping, MappingStore};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Records with canonical fields applied, plus what happened.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub records: Vec<Record>,
    pub report: RunReport,
}

/// Result of folding an oracle answer into the mapping.
#[derive(Debug, Default, PartialEq)]
pub struct MergeSummary {
    pub added: usize,
    pub rejected: Vec<RejectedKey>,
    /// Answer keys that did not correspond to any requested key.
    pub extras: Vec<String>,
}

pub struct ResolutionOrchestrator<'a> {
    store: &'a dyn MappingStore,
    oracle: &'a dyn Oracle,
}

impl<'a> ResolutionOrchestrator<'a> {
    pub fn new(store: &'a dyn MappingStore, oracle: &'a dyn Oracle) -> Self {
        Self { store, oracle }
    }

    pub async fn resolve_and_apply(
        &self,
        mut records: Vec<Record>,
        policy: &dyn ResolutionPolicy,
    ) -> Result<ResolutionOutcome> {
        let started = Instant::now();
        let mut report = RunReport::start(policy.name(), records.len());

        let mut mapping = self.store.load();
        report.mapping_size_before = mapping.len();
        report.enter(RunPhase::Loaded);
        debug!("[{}] loaded {} entries from {}", policy.name(), mapping.len(), self.store.describe());

        let keys: Vec<String> = records.iter().map(|r| policy.key_for(r)).collect();
        let unseen = diff_unseen(&keys, &mapping);
        report.empty_keys = keys.iter().filter(|k| k.is_empty()).count();
        report.distinct_keys = keys.iter().filter(|k| !k.is_empty()).collect::<BTreeSet<_>>().len();
        report.unseen = unseen.len();
        report.enter(RunPhase::Diffed);

        if unseen.is_empty() {
            report.enter(RunPhase::SkippedResolution);
            info!("[{}] all {} distinct keys cached, no oracle call", policy.name(), report.distinct_keys);
        } else {
            info!(
                "[{}] {} of {} distinct keys unseen, resolving in one batch",
                policy.name(),
                unseen.len(),
                report.distinct_keys
            );

            let answer = self
                .oracle
                .resolve(OracleRequest {
                    keys: &unseen,
                    vocabulary: policy.vocabulary(),
                })
                .await?;
            report.oracle_calls += 1;

            let summary = merge_answer(&mut mapping, &unseen, &answer, policy);
            report.resolved = summary.added;
            report.rejected = summary.rejected;
            report.unresolved = unseen.iter().filter(|k| !mapping.contains_key(*k)).cloned().collect();
            report.enter(RunPhase::Resolved);

            if !report.unresolved.is_empty() {
                warn!(
                    "[{}] {} keys left unresolved, will retry next run: {:?}",
                    policy.name(),
                    report.unresolved.len(),
                    report.unresolved
                );
            }

            self.store.save(&mapping)?;
        }
        report.mapping_size_after = mapping.len();
        report.enter(RunPhase::Persisted);

        apply_mapping(&mut records, &keys, &mapping, policy);
        report.enter(RunPhase::Applied);
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "[{}] applied to {} records ({} resolved, {} rejected, {} unresolved) in {} ms",
            policy.name(),
            records.len(),
            report.resolved,
            report.rejected.len(),
            report.unresolved.len(),
            report.elapsed_ms
        );

        Ok(ResolutionOutcome { records, report })
    }
}

/// Distinct non-empty keys absent from `mapping`.
pub fn diff_unseen(keys: &[String], mapping: &Mapping) -> BTreeSet<String> {
    keys.iter()
        .filter(|k| !k.is_empty() && !mapping.contains_key(*k))
        .cloned()
        .collect()
}

/// Add validated answers for unseen keys. Existing entries are never touched.
///
/// Answer keys are re-normalized with the policy's normalizer, so an oracle
/// that echoes `"Excavators"` for the requested `"excavators"` still lands.
/// When several answer keys collapse onto one requested key, the first valid
/// one in answer order wins.
pub fn merge_answer(
    mapping: &mut Mapping,
    unseen: &BTreeSet<String>,
    answer: &OracleAnswer,
    policy: &dyn ResolutionPolicy,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for (answer_key, value) in answer {
        let key = policy.normalize(answer_key);
        if !unseen.contains(&key) {
            debug!("[{}] ignoring unrequested key '{}'", policy.name(), answer_key);
            summary.extras.push(answer_key.clone());
            continue;
        }
        if mapping.contains_key(&key) {
            continue;
        }

        match policy.validate(value) {
            Ok(canonical) => {
                mapping.insert(key, canonical);
                summary.added += 1;
            }
            Err(reason) => {
                warn!("[{}] data quality: rejected '{}' for '{}': {}", policy.name(), value, key, reason);
                record_rejection(&mut summary.rejected, key, reason);
            }
        }
    }

    // A key rejected under one spelling may have been accepted under another.
    summary.rejected.retain(|r| !mapping.contains_key(&r.key));
    summary
}

fn record_rejection(rejected: &mut Vec<RejectedKey>, key: String, reason: Rejection) {
    if !rejected.iter().any(|r| r.key == key) {
        rejected.push(RejectedKey {
            key,
            reason: reason.to_string(),
        });
    }
}

/// Write each record's canonical value, or the policy's unknown sentinel.
pub fn apply_mapping(
    records: &mut [Record],
    keys: &[String],
    mapping: &Mapping,
    policy: &dyn ResolutionPolicy,
) {
    for (record, key) in records.iter_mut().zip(keys) {
        let value = if key.is_empty() {
            policy.unknown_value()
        } else {
            mapping.get(key).map(String::as_str).unwrap_or(policy.unknown_value())
        };
        record.set(policy.target_field(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CanonError;
    use crate::oracle::decode_answer;
    use crate::resolution::policy::{CategoryPolicy, ManufacturerPolicy, UNKNOWN};
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// Answers from a fixed script and records every request it receives.
    struct ScriptedOracle {
        reply: Mutex<Box<dyn FnMut(&BTreeSet<String>) -> Result<OracleAnswer> + Send>>,
        calls: Mutex<Vec<BTreeSet<String>>>,
    }

    impl ScriptedOracle {
        fn new(reply: impl FnMut(&BTreeSet<String>) -> Result<OracleAnswer> + Send + 'static) -> Self {
            Self {
                reply: Mutex::new(Box::new(reply)),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn fixed(answer: Value) -> Self {
            let answer = answer.as_object().cloned().unwrap();
            Self::new(move |_| Ok(answer.clone()))
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn requests(&self) -> Vec<BTreeSet<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn resolve(&self, request: OracleRequest<'_>) -> Result<OracleAnswer> {
            self.calls.lock().unwrap().push(request.keys.clone());
            let mut reply = self.reply.lock().unwrap();
            (*reply)(request.keys)
        }
    }

    fn records(values: Value) -> Vec<Record> {
        values
            .as_array()
            .unwrap()
            .iter()
            .cloned()
            .map(|v| Record::try_from(v).unwrap())
            .collect()
    }

    fn keyset(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn category_policy() -> CategoryPolicy {
        CategoryPolicy::new(vec!["Excavator".to_string(), "Loader".to_string()]).unwrap()
    }

    #[tokio::test]
    async fn test_case_variants_share_one_oracle_key() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({"excavators": "Excavator"}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);

        let input = records(json!([{"source_category": "Excavators"}, {"source_category": "excavators"}]));
        let outcome = orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();

        assert_eq!(oracle.call_count(), 1);
        assert_eq!(oracle.requests()[0], keyset(&["excavators"]));
        assert_eq!(outcome.records[0].get_str("category"), Some("Excavator"));
        assert_eq!(outcome.records[1].get_str("category"), Some("Excavator"));
        assert_eq!(outcome.report.phases, vec![
            RunPhase::Loaded,
            RunPhase::Diffed,
            RunPhase::Resolved,
            RunPhase::Persisted,
            RunPhase::Applied,
        ]);
    }

    #[tokio::test]
    async fn test_warm_store_skips_oracle() {
        let mut mapping = Mapping::new();
        mapping.insert("cat".to_string(), "Caterpillar".to_string());
        let store = InMemoryStore::with_mapping(mapping);
        let oracle = ScriptedOracle::fixed(json!({}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);

        let input = records(json!([{"make": "CAT"}]));
        let outcome = orchestrator.resolve_and_apply(input, &ManufacturerPolicy::new()).await.unwrap();

        assert_eq!(oracle.call_count(), 0);
        assert_eq!(store.save_count(), 0);
        assert_eq!(outcome.records[0].get_str("canonical_make"), Some("Caterpillar"));
        assert_eq!(outcome.records[0].get_str("make"), Some("CAT"));
        assert!(outcome.report.phases.contains(&RunPhase::SkippedResolution));
        assert_eq!(outcome.report.phases.last(), Some(&RunPhase::Applied));
    }

    #[tokio::test]
    async fn test_malformed_response_fails_without_touching_store() {
        let mut mapping = Mapping::new();
        mapping.insert("loaders".to_string(), "Loader".to_string());
        let store = InMemoryStore::with_mapping(mapping.clone());
        let oracle = ScriptedOracle::new(|_| Err(CanonError::ResponseExtraction("no json here".to_string())));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);

        let input = records(json!([{"source_category": "Loaders"}, {"source_category": "Dozers"}]));
        let result = orchestrator.resolve_and_apply(input, &category_policy()).await;

        assert!(matches!(result, Err(CanonError::ResponseExtraction(_))));
        assert_eq!(store.save_count(), 0);
        assert_eq!(store.snapshot(), mapping);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent_and_free() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({"excavators": "Excavator", "loaders": "Loader"}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([
            {"source_category": "Excavators"},
            {"source_category": "Loaders"},
            {"source_category": null},
        ]));

        let first = orchestrator.resolve_and_apply(input.clone(), &category_policy()).await.unwrap();
        let second = orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();

        assert_eq!(first.records, second.records);
        assert_eq!(oracle.call_count(), 1);
        assert_eq!(second.report.oracle_calls, 0);
    }

    #[tokio::test]
    async fn test_omitted_keys_stay_unseen_and_are_retried() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::new(|keys| {
            let mut answer = OracleAnswer::new();
            if keys.contains("excavators") {
                answer.insert("excavators".to_string(), json!("Excavator"));
            }
            Ok(answer)
        });
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"source_category": "Excavators"}, {"source_category": "Loaders"}]));

        let first = orchestrator.resolve_and_apply(input.clone(), &category_policy()).await.unwrap();
        assert_eq!(first.records[1].get_str("category"), Some(UNKNOWN));
        assert_eq!(first.report.unresolved, vec!["loaders".to_string()]);
        assert_eq!(store.save_count(), 1);

        orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();
        let requests = oracle.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], keyset(&["loaders"]));
    }

    #[tokio::test]
    async fn test_outside_vocabulary_is_rejected_not_stored() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({"excavators": "Excavator", "cranes": "Crane"}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"source_category": "Excavators"}, {"source_category": "Cranes"}]));

        let outcome = orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();

        assert_eq!(outcome.records[1].get_str("category"), Some(UNKNOWN));
        assert_eq!(outcome.report.rejected.len(), 1);
        assert_eq!(outcome.report.rejected[0].key, "cranes");
        assert!(!store.snapshot().contains_key("cranes"));
    }

    #[tokio::test]
    async fn test_malformed_values_become_unknown_without_oracle() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"source_category": 5}, {"source_category": "  "}, {}]));

        let outcome = orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();

        assert_eq!(oracle.call_count(), 0);
        assert_eq!(outcome.report.empty_keys, 3);
        assert!(outcome.records.iter().all(|r| r.get_str("category") == Some(UNKNOWN)));
    }

    #[tokio::test]
    async fn test_store_grows_monotonically() {
        let mut mapping = Mapping::new();
        mapping.insert("loaders".to_string(), "Loader".to_string());
        let store = InMemoryStore::with_mapping(mapping.clone());
        // The oracle tries to overwrite a cached key; it must not win.
        let oracle = ScriptedOracle::fixed(json!({"excavators": "Excavator", "loaders": "Excavator"}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"source_category": "Excavators"}, {"source_category": "Loaders"}]));

        orchestrator.resolve_and_apply(input, &category_policy()).await.unwrap();

        let after = store.snapshot();
        assert!(mapping.keys().all(|k| after.contains_key(k)));
        assert_eq!(after["loaders"], "Loader");
        assert_eq!(after["excavators"], "Excavator");
    }

    #[test]
    fn test_merge_renormalizes_answer_keys_and_ignores_extras() {
        let policy = ManufacturerPolicy::new();
        let unseen = keyset(&["j deere"]);
        let answer = json!({"J. Deere": "John Deere", "komatsu": "Komatsu"});
        let mut mapping = Mapping::new();

        let summary = merge_answer(&mut mapping, &unseen, answer.as_object().unwrap(), &policy);

        assert_eq!(summary.added, 1);
        assert_eq!(summary.extras, vec!["komatsu".to_string()]);
        assert_eq!(mapping["j deere"], "John Deere");
    }

    #[tokio::test]
    async fn test_resolved_output_fed_back_needs_no_oracle() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({"cat": "Caterpillar", "obscure works": "Obscure Works"}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"make": "CAT"}, {"make": "Obscure Works"}, {"make": null}]));

        let first = orchestrator.resolve_and_apply(input, &ManufacturerPolicy::new()).await.unwrap();
        assert_eq!(first.records[0].get_str("make"), Some("CAT"));
        assert_eq!(first.records[0].get_str("canonical_make"), Some("Caterpillar"));
        assert_eq!(first.records[2].get("make"), Some(&Value::Null));
        assert_eq!(first.records[2].get_str("canonical_make"), Some(UNKNOWN));

        let second = orchestrator
            .resolve_and_apply(first.records.clone(), &ManufacturerPolicy::new())
            .await
            .unwrap();
        assert_eq!(oracle.call_count(), 1);
        assert_eq!(second.report.oracle_calls, 0);
        assert_eq!(second.records, first.records);
    }

    #[tokio::test]
    async fn test_unresolved_make_keeps_raw_value() {
        let store = InMemoryStore::new();
        let oracle = ScriptedOracle::fixed(json!({}));
        let orchestrator = ResolutionOrchestrator::new(&store, &oracle);
        let input = records(json!([{"make": "Obscure Works"}]));

        let outcome = orchestrator.resolve_and_apply(input, &ManufacturerPolicy::new()).await.unwrap();

        assert_eq!(outcome.records[0].get_str("make"), Some("Obscure Works"));
        assert_eq!(outcome.records[0].get_str("canonical_make"), Some(UNKNOWN));
        assert_eq!(outcome.report.unresolved, vec!["obscure works".to_string()]);
    }

    #[test]
    fn test_merge_first_answer_spelling_wins() {
        let policy = ManufacturerPolicy::new();
        let unseen = keyset(&["j deere"]);
        let answer = decode_answer(r#"{"j deere": "John Deere", "J Deere": "Deere"}"#).unwrap();
        let mut mapping = Mapping::new();

        let summary = merge_answer(&mut mapping, &unseen, &answer, &policy);

        assert_eq!(summary.added, 1);
        assert_eq!(mapping["j deere"], "John Deere");
    }

    #[test]
    fn test_merge_rejects_non_string_manufacturer_values() {
        let policy = ManufacturerPolicy::new();
        let unseen = keyset(&["cat", "jcb"]);
        let answer = json!({"cat": ["Caterpillar"], "jcb": "JCB"});
        let mut mapping = Mapping::new();

        let summary = merge_answer(&mut mapping, &unseen, answer.as_object().unwrap(), &policy);

        assert_eq!(summary.added, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(summary.rejected[0].key, "cat");
        assert!(!mapping.contains_key("cat"));
    }

    #[test]
    fn test_diff_skips_empty_and_cached() {
        let mut mapping = Mapping::new();
        mapping.insert("cat".to_string(), "Caterpillar".to_string());
        let keys = vec!["cat".to_string(), String::new(), "jcb".to_string(), "jcb".to_string()];

        let unseen = diff_unseen(&keys, &mapping);
        assert_eq!(unseen, keyset(&["jcb"]));
    }
}
