use sessiongate::{
    BypassReason, DebounceGate, InMemorySessionStore, ManualClock, PolicyTable, RejectionMode,
    SessionId, Verdict,
};
use std::sync::Arc;

const ROUTE: &str = "/debounce";

fn gate_with(
    policies: PolicyTable,
    clock: &ManualClock,
    mode: RejectionMode,
) -> DebounceGate<InMemorySessionStore> {
    DebounceGate::builder(InMemorySessionStore::new())
        .policies(policies)
        .clock(clock.clone())
        .rejection_mode(mode)
        .build()
}

#[tokio::test]
async fn disabled_or_missing_policy_always_allows() {
    let clock = ManualClock::new(1_700_000_000_000);
    let policies = PolicyTable::new().with_route("/zero", 0).with_route("/negative", -250);
    let gate = gate_with(policies, &clock, RejectionMode::Advance);
    let session = gate.store().create().unwrap();

    for route in ["/zero", "/negative", "/unprotected"] {
        for step in [0, 1, 1, 5, 0, 1_000, 2] {
            clock.advance(step);
            let verdict = gate.check(route, Some(&session)).await;
            assert!(
                matches!(verdict, Verdict::Bypassed(BypassReason::Disabled | BypassReason::NoPolicy)),
                "{route} should never be gated, got {verdict:?}"
            );
        }
    }
}

#[tokio::test]
async fn fresh_session_first_call_is_allowed() {
    let clock = ManualClock::new(42);
    let gate = gate_with(PolicyTable::new().with_route(ROUTE, 3_000), &clock, RejectionMode::Hold);
    let session = gate.store().create().unwrap();
    assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
}

#[tokio::test]
async fn calls_inside_window_report_remaining_time() {
    for delta in [0u64, 1, 999, 2_999] {
        let clock = ManualClock::new(10_000);
        let gate =
            gate_with(PolicyTable::new().with_route(ROUTE, 3_000), &clock, RejectionMode::Hold);
        let session = gate.store().create().unwrap();

        assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
        clock.advance(delta);
        let rejection = gate.enforce(ROUTE, Some(&session)).await.unwrap_err();
        assert_eq!(rejection.remaining_ms(), 3_000 - delta, "delta {delta}");
    }
}

#[tokio::test]
async fn calls_after_window_are_allowed() {
    for delta in [3_000u64, 3_001, 60_000] {
        let clock = ManualClock::new(10_000);
        let gate =
            gate_with(PolicyTable::new().with_route(ROUTE, 3_000), &clock, RejectionMode::Advance);
        let session = gate.store().create().unwrap();

        assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
        clock.advance(delta);
        assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed, "delta {delta}");
    }
}

#[tokio::test]
async fn sessions_do_not_share_state() {
    let clock = ManualClock::new(0);
    let gate = gate_with(PolicyTable::new().with_route(ROUTE, 3_000), &clock, RejectionMode::Hold);
    let a = gate.store().create().unwrap();
    let b = gate.store().create().unwrap();

    assert_eq!(gate.check(ROUTE, Some(&a)).await, Verdict::Allowed);
    assert_eq!(gate.check(ROUTE, Some(&b)).await, Verdict::Allowed);
    assert!(gate.check(ROUTE, Some(&a)).await.is_rejected());

    clock.set(3_000);
    assert_eq!(gate.check(ROUTE, Some(&b)).await, Verdict::Allowed);
    assert_eq!(gate.check(ROUTE, Some(&a)).await, Verdict::Allowed);
}

#[tokio::test]
async fn reference_scenario() {
    let clock = ManualClock::new(0);
    let gate = DebounceGate::builder(InMemorySessionStore::new())
        .policies(PolicyTable::new().with_route(ROUTE, 3_000))
        .clock(clock.clone())
        .build();
    let session = gate.store().create().unwrap();

    assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
    clock.set(1_000);
    assert_eq!(gate.enforce(ROUTE, Some(&session)).await.unwrap_err().remaining_ms(), 2_000);
    clock.set(3_500);
    assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
}

#[tokio::test]
async fn tight_loop_yields_single_allow() {
    for mode in [RejectionMode::Hold, RejectionMode::Advance] {
        let store = InMemorySessionStore::new();
        let session = store.create().unwrap();
        let gate = DebounceGate::builder(store)
            .policies(PolicyTable::new().with_route(ROUTE, 3_000))
            .rejection_mode(mode)
            .build();

        let mut allowed = 0;
        let mut rejected = 0;
        for _ in 0..1_000 {
            match gate.check(ROUTE, Some(&session)).await {
                Verdict::Allowed => allowed += 1,
                Verdict::Rejected(_) => rejected += 1,
                other => panic!("unexpected verdict {other:?}"),
            }
        }
        assert_eq!((allowed, rejected), (1, 999), "{mode:?}");
    }
}

#[tokio::test]
async fn distinct_sessions_each_get_one_allow() {
    let gate = DebounceGate::new(
        InMemorySessionStore::new(),
        PolicyTable::new().with_route(ROUTE, 3_000),
    );
    let mut allowed = 0;
    for _ in 0..100 {
        let session = gate.store().create().unwrap();
        if gate.check(ROUTE, Some(&session)).await == Verdict::Allowed {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_have_one_winner() {
    for _ in 0..20 {
        let gate = Arc::new(DebounceGate::new(
            InMemorySessionStore::new(),
            PolicyTable::new().with_route(ROUTE, 60_000),
        ));
        let session = gate.store().create().unwrap();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let mut handles = vec![];
        for _ in 0..16 {
            let gate = gate.clone();
            let session = session.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                gate.check(ROUTE, Some(&session)).await
            }));
        }

        let verdicts: Vec<Verdict> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("gate task must not panic"))
            .collect();
        let allowed = verdicts.iter().filter(|v| **v == Verdict::Allowed).count();
        let rejected = verdicts.iter().filter(|v| v.is_rejected()).count();
        assert_eq!(allowed, 1, "verdicts: {verdicts:?}");
        assert_eq!(rejected, 15);
    }
}

#[tokio::test]
async fn invalidated_session_restarts_clean() {
    let clock = ManualClock::new(0);
    let gate = gate_with(PolicyTable::new().with_route(ROUTE, 3_000), &clock, RejectionMode::Hold);
    let session = SessionId::new("fixed-id");
    gate.store().insert(session.clone()).unwrap();

    assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
    assert!(gate.store().invalidate(&session).unwrap());
    gate.forget(&session);

    assert_eq!(
        gate.check(ROUTE, Some(&session)).await,
        Verdict::Bypassed(BypassReason::NoSession)
    );

    gate.store().insert(session.clone()).unwrap();
    assert_eq!(gate.check(ROUTE, Some(&session)).await, Verdict::Allowed);
}
