//! End-to-end flows through the async runtime shell.
//!
//! Every test goes through a SchedulerHandle; nothing reaches into the
//! scheduler directly, so these double as checks that the public API is
//! enough to drive real gameplay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use ability_core::{
    AbilityEvent, AbilitySpec, ActivationError, AuthorityMode, AuthorityOracle, CompletionPolicy,
    EndReason, EntityId, EntitySnapshot, GameplayEvent, TaskKind, TaskOutcome, TaskState, Tick,
};
use ability_runtime::{Runtime, RuntimeError, Topic};
use gameplay_tags::TagRegistry;

const HERO: EntityId = EntityId(7);

fn registry() -> TagRegistry {
    let mut registry = TagRegistry::new();
    for path in [
        "Combat.InCombat",
        "Status.Debuff.Stunned",
        "State.Casting",
        "Ability.Attack.Heavy",
        "Event.Hit",
    ] {
        registry.register(path).expect("valid tag path");
    }
    registry
}

async fn next_event(rx: &mut broadcast::Receiver<AbilityEvent>) -> AbilityEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("event should arrive")
        .expect("bus should stay open")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct PredictEverything;

impl AuthorityOracle for PredictEverything {
    fn is_locally_predicting(&self, _entity: EntityId) -> bool {
        true
    }
}

#[tokio::test]
async fn activation_gates_reject_through_the_api() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let combat = handle.tag("Combat.InCombat").unwrap();
    let stunned = handle.tag("Status.Debuff.Stunned").unwrap();

    let heavy = handle
        .register_spec(
            AbilitySpec::new("heavy_attack")
                .with_required([combat])
                .with_blocked_by([stunned]),
        )
        .await
        .unwrap();

    assert!(handle.add_entity(HERO).await.unwrap());
    assert!(handle.grant(HERO, heavy).await.unwrap());

    let err = handle.try_activate(HERO, heavy).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Activation(ActivationError::MissingRequiredTag { tag }) if tag == combat
    ));

    // Blocked wins once both gates apply.
    handle.grant_tag(HERO, stunned).await.unwrap();
    let err = handle.try_activate(HERO, heavy).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Activation(ActivationError::BlockedByTag { .. })
    ));

    handle.revoke_tag(HERO, stunned).await.unwrap();
    handle.grant_tag(HERO, combat).await.unwrap();
    handle.try_activate(HERO, heavy).await.unwrap();
}

#[tokio::test]
async fn events_fan_out_by_topic() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let mut ability_rx = handle.subscribe(Topic::Ability);
    let mut task_rx = handle.subscribe(Topic::Task);
    let mut tag_rx = handle.subscribe(Topic::Tag);

    let casting = handle.tag("State.Casting").unwrap();
    let channel = handle
        .register_spec(
            AbilitySpec::new("channel")
                .with_owned([casting])
                .with_plan([TaskKind::WaitTicks { ticks: 2 }]),
        )
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, channel).await.unwrap();
    let ability = handle.try_activate(HERO, channel).await.unwrap();

    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated {
            entity,
            ability: id,
            name,
            ..
        } => {
            assert_eq!(entity, HERO);
            assert_eq!(id, ability);
            assert_eq!(name, "channel");
        }
        other => panic!("expected Activated, got {other:?}"),
    }
    match next_event(&mut tag_rx).await {
        AbilityEvent::TagAdded { path, .. } => assert_eq!(path, "State.Casting"),
        other => panic!("expected TagAdded, got {other:?}"),
    }
    match next_event(&mut task_rx).await {
        AbilityEvent::TaskStarted {
            task, task_index, ..
        } => {
            assert_eq!(task, "wait_ticks");
            assert_eq!(task_index, 0);
        }
        other => panic!("expected TaskStarted, got {other:?}"),
    }

    assert_eq!(handle.tick(0.1).await.unwrap(), Tick(1));
    assert_eq!(handle.tick(0.1).await.unwrap(), Tick(2));

    match next_event(&mut task_rx).await {
        AbilityEvent::TaskEnded {
            task,
            outcome,
            fault,
            ..
        } => {
            assert_eq!(task, "wait_ticks");
            assert_eq!(outcome, TaskOutcome::Completed);
            assert_eq!(fault, None);
        }
        other => panic!("expected TaskEnded, got {other:?}"),
    }
    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended { reason, clock, .. } => {
            assert_eq!(reason, EndReason::Completed);
            assert_eq!(clock, Tick(2));
        }
        other => panic!("expected Ended, got {other:?}"),
    }
    match next_event(&mut tag_rx).await {
        AbilityEvent::TagRemoved { path, .. } => assert_eq!(path, "State.Casting"),
        other => panic!("expected TagRemoved, got {other:?}"),
    }
}

#[tokio::test]
async fn rejected_prediction_rolls_back_through_the_api() {
    let runtime = Runtime::builder(registry())
        .authority(Arc::new(PredictEverything))
        .build();
    let handle = runtime.handle();

    let mut ability_rx = handle.subscribe(Topic::Ability);

    let casting = handle.tag("State.Casting").unwrap();
    let charge = handle
        .register_spec(
            AbilitySpec::new("charge")
                .with_owned([casting])
                .with_cooldown(10)
                .with_completion(CompletionPolicy::Explicit),
        )
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, charge).await.unwrap();
    let ability = handle.try_activate(HERO, charge).await.unwrap();

    let before = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert_eq!(before.tags, vec!["State.Casting".to_string()]);
    assert_eq!(before.abilities.len(), 1);
    assert_eq!(before.abilities[0].authority, AuthorityMode::Predicted);

    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated { authority, .. } => {
            assert_eq!(authority, AuthorityMode::Predicted);
        }
        other => panic!("expected Activated, got {other:?}"),
    }

    assert!(handle.confirm(ability, false).await.unwrap());

    let after = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert!(after.tags.is_empty());
    assert!(after.abilities.is_empty());

    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended { reason, .. } => {
            assert_eq!(reason, EndReason::PredictionRejected);
        }
        other => panic!("expected Ended, got {other:?}"),
    }

    // The rollback also restored the cooldown, so this passes the gate.
    handle.try_activate(HERO, charge).await.unwrap();
}

#[tokio::test]
async fn batch_verdicts_settle_predictions() {
    let runtime = Runtime::builder(registry())
        .authority(Arc::new(PredictEverything))
        .build();
    let handle = runtime.handle();

    let dash = handle
        .register_spec(AbilitySpec::new("dash").with_completion(CompletionPolicy::Explicit))
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, dash).await.unwrap();
    let first = handle.try_activate(HERO, dash).await.unwrap();
    let second = handle.try_activate(HERO, dash).await.unwrap();

    handle
        .confirm_batch(vec![(first, true), (second, false)])
        .await
        .unwrap();

    let snapshot = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert_eq!(snapshot.abilities.len(), 1);
    assert_eq!(snapshot.abilities[0].id, first);
    assert_eq!(snapshot.abilities[0].authority, AuthorityMode::Confirmed);
}

#[tokio::test]
async fn tag_grant_interrupts_before_the_call_returns() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let mut ability_rx = handle.subscribe(Topic::Ability);

    let debuff = handle.tag("Status.Debuff").unwrap();
    let stunned = handle.tag("Status.Debuff.Stunned").unwrap();
    let channel = handle
        .register_spec(
            AbilitySpec::new("channel")
                .with_cancel_on([debuff])
                .with_completion(CompletionPolicy::Explicit),
        )
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, channel).await.unwrap();
    handle.try_activate(HERO, channel).await.unwrap();

    // A descendant of the watched tag lands; the cascade runs inside the
    // worker before it replies, so the snapshot below can never observe the
    // doomed instance.
    handle.grant_tag(HERO, stunned).await.unwrap();

    let snapshot = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert!(snapshot.abilities.is_empty());

    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated { .. } => {}
        other => panic!("expected Activated, got {other:?}"),
    }
    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended { reason, .. } => {
            assert_eq!(reason, EndReason::InterruptedByTag);
        }
        other => panic!("expected Ended, got {other:?}"),
    }
}

#[tokio::test]
async fn delivered_events_wake_waiting_tasks() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let hit = handle.tag("Event.Hit").unwrap();
    let riposte = handle
        .register_spec(AbilitySpec::new("riposte").with_plan([TaskKind::WaitEvent { tag: hit }]))
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, riposte).await.unwrap();
    handle.try_activate(HERO, riposte).await.unwrap();

    let waiting = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert_eq!(waiting.abilities.len(), 1);
    assert_eq!(waiting.abilities[0].tasks[0].name, "wait_event");
    assert_eq!(waiting.abilities[0].tasks[0].state, TaskState::Suspended);

    handle
        .deliver_event(HERO, GameplayEvent::new(hit))
        .await
        .unwrap();

    // The woken task completed and drained the plan.
    let done = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    assert!(done.abilities.is_empty());
}

#[tokio::test]
async fn snapshots_round_trip_as_json() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let casting = handle.tag("State.Casting").unwrap();
    let hit = handle.tag("Event.Hit").unwrap();
    let channel = handle
        .register_spec(
            AbilitySpec::new("channel")
                .with_owned([casting])
                .with_plan([TaskKind::WaitEvent { tag: hit }]),
        )
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, channel).await.unwrap();
    handle.try_activate(HERO, channel).await.unwrap();

    let snapshot = handle.snapshot(HERO).await.unwrap().expect("entity exists");
    let json = serde_json::to_string(&snapshot).expect("snapshot serializes");
    let back: EntitySnapshot = serde_json::from_str(&json).expect("snapshot parses");
    assert_eq!(back, snapshot);
}

#[tokio::test]
async fn shutdown_waits_for_the_worker() {
    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    handle.add_entity(HERO).await.unwrap();
    handle.tick(0.1).await.unwrap();

    // Cloned handles keep the command channel open; release ours first.
    drop(handle);
    runtime.shutdown().await.expect("worker exits cleanly");
}

/// Full combat flow: identity-based cancellation, cooldown gating, and
/// entity removal, all through the public API.
#[tokio::test]
async fn combat_flow_scenario() {
    init_tracing();

    let runtime = Runtime::builder(registry()).build();
    let handle = runtime.handle();

    let mut ability_rx = handle.subscribe(Topic::Ability);

    let attack_any = handle.tag("Ability.Attack").unwrap();
    let heavy_tag = handle.tag("Ability.Attack.Heavy").unwrap();

    let light = handle
        .register_spec(
            AbilitySpec::new("light_attack")
                .with_ability_tags([attack_any])
                .with_completion(CompletionPolicy::Explicit),
        )
        .await
        .unwrap();
    let heavy = handle
        .register_spec(
            AbilitySpec::new("heavy_attack")
                .with_ability_tags([heavy_tag])
                .with_cancels_abilities([attack_any])
                .with_cooldown(2)
                .with_completion(CompletionPolicy::Explicit),
        )
        .await
        .unwrap();

    handle.add_entity(HERO).await.unwrap();
    handle.grant(HERO, light).await.unwrap();
    handle.grant(HERO, heavy).await.unwrap();

    let light_id = handle.try_activate(HERO, light).await.unwrap();
    let heavy_id = handle.try_activate(HERO, heavy).await.unwrap();
    assert!(heavy_id > light_id);

    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated { name, .. } => assert_eq!(name, "light_attack"),
        other => panic!("expected Activated, got {other:?}"),
    }
    // Heavy's cancel set matched light's identity before heavy went live.
    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended {
            ability, reason, ..
        } => {
            assert_eq!(ability, light_id);
            assert_eq!(reason, EndReason::Cancelled);
        }
        other => panic!("expected Ended, got {other:?}"),
    }
    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated { ability, name, .. } => {
            assert_eq!(ability, heavy_id);
            assert_eq!(name, "heavy_attack");
        }
        other => panic!("expected Activated, got {other:?}"),
    }

    let err = handle.try_activate(HERO, heavy).await.unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Activation(ActivationError::OnCooldown { until }) if until == Tick(2)
    ));

    handle.tick(0.05).await.unwrap();
    handle.tick(0.05).await.unwrap();

    // Off cooldown; the fresh swing cancels the stale one, the cancel set
    // matches its own identity family.
    let second_heavy = handle.try_activate(HERO, heavy).await.unwrap();
    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended {
            ability, reason, ..
        } => {
            assert_eq!(ability, heavy_id);
            assert_eq!(reason, EndReason::Cancelled);
        }
        other => panic!("expected Ended, got {other:?}"),
    }
    match next_event(&mut ability_rx).await {
        AbilityEvent::Activated { ability, .. } => assert_eq!(ability, second_heavy),
        other => panic!("expected Activated, got {other:?}"),
    }

    assert!(handle.remove_entity(HERO).await.unwrap());
    match next_event(&mut ability_rx).await {
        AbilityEvent::Ended {
            ability, reason, ..
        } => {
            assert_eq!(ability, second_heavy);
            assert_eq!(reason, EndReason::Cancelled);
        }
        other => panic!("expected Ended, got {other:?}"),
    }
    assert!(handle.snapshot(HERO).await.unwrap().is_none());
}
