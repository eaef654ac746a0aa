//! Property tests over session lineage

use proptest::prelude::*;
use serde_json::json;
use stagetree_test_utils::{memory_engine, run_stages, session, stored_files};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn root_reruns_never_branch(revisions in prop::collection::vec(any::<u32>(), 1..8)) {
        let engine = memory_engine();
        for r in &revisions {
            engine.materialize(session(), "search", json!({"rev": r})).unwrap();
        }
        prop_assert_eq!(stored_files(engine.store(), session()), vec!["search/meta/search.json"]);

        let stored = engine.read_envelope(session(), "search").unwrap().unwrap();
        prop_assert_eq!(stored.content, json!({"rev": revisions[revisions.len() - 1]}));
    }

    #[test]
    fn children_chain_the_current_parent(q in "[a-z]{1,12}", g in "[a-z]{1,12}") {
        let engine = memory_engine();
        let search = engine.materialize(session(), "search", json!({"q": q})).unwrap();
        let gather = engine.materialize(session(), "gather", json!({"g": g})).unwrap();
        prop_assert_eq!(
            gather.envelope.parent_fingerprints.get("search"),
            Some(&search.envelope.fingerprint)
        );
        prop_assert!(engine.stale_stages(session()).unwrap().is_empty());
    }

    #[test]
    fn rename_choice_decides_join(take_rename in any::<bool>()) {
        let engine = memory_engine();
        let mut stages = vec!["search", "gather"];
        if take_rename {
            stages.push("rename");
        }
        stages.extend(["harmonize", "code"]);
        let runs = run_stages(&engine, session(), &stages);

        let code = runs.last().unwrap();
        prop_assert_eq!(code.path.dir().contains_join(), take_rename);
        prop_assert!(engine.completed_ids(session()).unwrap().contains("code"));
    }
}
