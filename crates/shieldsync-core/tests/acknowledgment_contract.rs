//! Engine contract: all-or-nothing acknowledgment
//!
//! A map is acknowledged iff every one of its configured targets reported
//! success (`Unchanged` or `Applied`). Partial success applies what it can
//! but never acknowledges; the provider's re-proposal is the retry path.

mod common;

use std::collections::HashMap;

use common::*;
use shieldsync_core::config::EngineConfig;
use shieldsync_core::engine::{Reconciler, TargetOutcome};
use shieldsync_core::traits::CidrTarget;

fn engine_with(
    source: &ScriptedMapSource,
    targets: HashMap<u64, Vec<Box<dyn CidrTarget>>>,
) -> Reconciler {
    let (engine, _events) = Reconciler::new(
        Box::new(source.clone()),
        targets,
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");
    engine
}

#[tokio::test]
async fn all_targets_succeeding_acknowledges_the_map() {
    let source = ScriptedMapSource::new(vec![proposed_map(
        7,
        "edge-eu",
        &["10.0.0.0/24", "10.0.1.0/24"],
    )]);

    let applied = RecordingTarget::new(
        "pl-0123abcd",
        Behavior::Applied {
            added: &["10.0.1.0/24"],
            removed: &[],
        },
    );
    let unchanged = RecordingTarget::new("sg-0123abcd", Behavior::Unchanged);

    let engine = engine_with(
        &source,
        HashMap::from([(
            7,
            vec![
                Box::new(applied.clone()) as Box<dyn CidrTarget>,
                Box::new(unchanged.clone()),
            ],
        )]),
    );

    let report = engine.run().await.unwrap();

    assert_eq!(source.acknowledge_calls(), vec![7]);
    assert_eq!(report.acknowledged_count(), 1);
    assert!(report.maps[0].acknowledged);
    assert_eq!(applied.apply_call_count(), 1);
    assert_eq!(unchanged.apply_call_count(), 1);
}

#[tokio::test]
async fn unchanged_everywhere_still_acknowledges() {
    // An idempotent re-run (everything already applied) must still settle
    // the proposal upstream.
    let source = ScriptedMapSource::new(vec![proposed_map(3, "edge", &["192.0.2.0/24"])]);
    let target = RecordingTarget::new("pl-0123abcd", Behavior::Unchanged);

    let engine = engine_with(
        &source,
        HashMap::from([(3, vec![Box::new(target.clone()) as Box<dyn CidrTarget>])]),
    );

    let report = engine.run().await.unwrap();

    assert_eq!(source.acknowledge_calls(), vec![3]);
    assert!(report.maps[0].acknowledged);
    assert_eq!(
        report.maps[0].outcomes[0].outcome,
        TargetOutcome::Unchanged
    );
}

#[tokio::test]
async fn partial_failure_applies_what_it_can_but_never_acknowledges() {
    // Scenario: prefix-list target succeeds, security-group target fails.
    // The successful mutation stays applied; the map stays unacknowledged.
    let source = ScriptedMapSource::new(vec![proposed_map(9, "edge-us", &["192.168.0.0/16"])]);

    let succeeding = RecordingTarget::new(
        "pl-0123abcd",
        Behavior::Applied {
            added: &["192.168.0.0/16"],
            removed: &[],
        },
    );
    let failing = RecordingTarget::new("sg-0123abcd", Behavior::FailApi);

    let engine = engine_with(
        &source,
        HashMap::from([(
            9,
            vec![
                Box::new(succeeding.clone()) as Box<dyn CidrTarget>,
                Box::new(failing.clone()),
            ],
        )]),
    );

    let report = engine.run().await.unwrap();

    // No acknowledge attempt at all
    assert!(source.acknowledge_calls().is_empty());
    assert!(!report.maps[0].acknowledged);

    // Both targets were attempted; both outcomes are recorded
    assert_eq!(succeeding.apply_call_count(), 1);
    assert_eq!(failing.apply_call_count(), 1);
    assert_eq!(report.maps[0].outcomes.len(), 2);
    assert!(!report.maps[0].outcomes[0].outcome.is_failure());
    assert!(report.maps[0].outcomes[1].outcome.is_failure());
    assert_eq!(report.failed_target_count(), 1);
}

#[tokio::test]
async fn first_target_failing_does_not_stop_the_second() {
    let source = ScriptedMapSource::new(vec![proposed_map(5, "edge", &["10.1.0.0/16"])]);

    let failing = RecordingTarget::new("pl-0123abcd", Behavior::FailConflict);
    let succeeding = RecordingTarget::new("sg-0123abcd", Behavior::Unchanged);

    let engine = engine_with(
        &source,
        HashMap::from([(
            5,
            vec![
                Box::new(failing.clone()) as Box<dyn CidrTarget>,
                Box::new(succeeding.clone()),
            ],
        )]),
    );

    let report = engine.run().await.unwrap();

    assert_eq!(succeeding.apply_call_count(), 1);
    assert!(!report.maps[0].acknowledged);
    assert!(source.acknowledge_calls().is_empty());
}

#[tokio::test]
async fn capacity_failure_blocks_acknowledgment() {
    let source = ScriptedMapSource::new(vec![proposed_map(7, "edge", &["10.0.1.0/24"])]);
    let target = RecordingTarget::new(
        "pl-0123abcd",
        Behavior::FailCapacity {
            required: 2,
            max: 1,
        },
    );

    let engine = engine_with(
        &source,
        HashMap::from([(7, vec![Box::new(target.clone()) as Box<dyn CidrTarget>])]),
    );

    let report = engine.run().await.unwrap();

    assert!(source.acknowledge_calls().is_empty());
    match &report.maps[0].outcomes[0].outcome {
        TargetOutcome::Failed { cause } => assert!(cause.contains("capacity"), "got {cause}"),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn acknowledge_failure_is_recorded_and_does_not_affect_other_maps() {
    let source = ScriptedMapSource::new(vec![
        proposed_map(1, "first", &["10.0.0.0/24"]),
        proposed_map(2, "second", &["10.0.1.0/24"]),
    ])
    .failing_acknowledge_for(1);

    let target_one = RecordingTarget::new("pl-0123abcd", Behavior::Unchanged);
    let target_two = RecordingTarget::new("pl-89abcdef", Behavior::Unchanged);

    let engine = engine_with(
        &source,
        HashMap::from([
            (1, vec![Box::new(target_one.clone()) as Box<dyn CidrTarget>]),
            (2, vec![Box::new(target_two.clone()) as Box<dyn CidrTarget>]),
        ]),
    );

    let report = engine.run().await.unwrap();

    // Both maps were attempted
    assert_eq!(source.acknowledge_calls(), vec![1, 2]);

    let first = report.maps.iter().find(|m| m.map_id == 1).unwrap();
    let second = report.maps.iter().find(|m| m.map_id == 2).unwrap();

    assert!(!first.acknowledged);
    assert!(first.acknowledge_error.is_some());
    assert!(second.acknowledged);
    assert!(report.has_failures());
}
