use http::{Request, Response, StatusCode};
use sessiongate::{
    DebounceGate, DebounceLayer, DynamicConfig, ErrorBody, GateError, InMemorySessionStore,
    ManualClock, PolicyTable, RejectionLayer, SessionId,
};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{service_fn, Layer, Service, ServiceBuilder, ServiceExt};

fn request(path: &str, session: Option<&SessionId>) -> Request<String> {
    let mut req = Request::get(path).body(String::new()).unwrap();
    if let Some(session) = session {
        req.extensions_mut().insert(session.clone());
    }
    req
}

#[derive(Clone)]
struct Handler {
    calls: Arc<AtomicUsize>,
}

impl Service<Request<String>> for Handler {
    type Response = Response<String>;
    type Error = Infallible;
    type Future = std::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<String>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(Response::new(String::from("ok"))))
    }
}

fn counting_handler(calls: Arc<AtomicUsize>) -> Handler {
    Handler { calls }
}

#[tokio::test]
async fn rejected_calls_become_429_and_skip_handler() {
    let clock = ManualClock::new(0);
    let store = InMemorySessionStore::new();
    let session = store.create().unwrap();
    let gate = DebounceGate::builder(store)
        .policies(PolicyTable::new().with_route("/debounce", 3_000))
        .clock(clock.clone())
        .build();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = ServiceBuilder::new()
        .layer(RejectionLayer::new())
        .layer(DebounceLayer::new(gate))
        .service(counting_handler(calls.clone()));

    let first = svc.clone().oneshot(request("/debounce", Some(&session))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.body(), "ok");

    clock.set(1_000);
    let second = svc.clone().oneshot(request("/debounce", Some(&session))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: ErrorBody = serde_json::from_str(second.body()).unwrap();
    assert_eq!(body.name, "Debounced");
    assert!(body.data.contains("2000ms"), "body: {}", body.data);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "handler must not run on rejection");

    clock.set(3_500);
    let third = svc.clone().oneshot(request("/debounce", Some(&session))).await.unwrap();
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn anonymous_and_unprotected_requests_pass_through() {
    let gate = DebounceGate::new(
        InMemorySessionStore::new(),
        PolicyTable::new().with_route("/debounce", 3_000),
    );
    let session = gate.store().create().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = ServiceBuilder::new()
        .layer(RejectionLayer::new())
        .layer(DebounceLayer::new(gate))
        .service(counting_handler(calls.clone()));

    for _ in 0..3 {
        let anonymous = svc.clone().oneshot(request("/debounce", None)).await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::OK);
        let other = svc.clone().oneshot(request("/members", Some(&session))).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn gate_error_surfaces_without_translation_layer() {
    let gate = DebounceGate::new(
        InMemorySessionStore::new(),
        PolicyTable::new().with_route("/debounce", 3_000),
    );
    let session = gate.store().create().unwrap();
    let svc = DebounceLayer::new(gate).layer(counting_handler(Arc::new(AtomicUsize::new(0))));

    svc.clone().oneshot(request("/debounce", Some(&session))).await.unwrap();
    let err = svc.clone().oneshot(request("/debounce", Some(&session))).await.unwrap_err();
    assert!(err.is_debounced());
    assert_eq!(err.debounced().map(|d| d.interval_ms()), Some(3_000));
}

#[tokio::test]
async fn inner_errors_pass_through_untouched() {
    let gate = DebounceGate::new(InMemorySessionStore::new(), PolicyTable::new());
    let failing = service_fn(|_req: Request<String>| async {
        Err::<Response<String>, _>(std::io::Error::new(std::io::ErrorKind::Other, "db down"))
    });

    let gated = DebounceLayer::new(gate.clone()).layer(failing.clone());
    let err: GateError<std::io::Error> =
        gated.oneshot(request("/members", None)).await.unwrap_err();
    assert!(err.is_inner());

    let translated = ServiceBuilder::new()
        .layer(RejectionLayer::new())
        .layer(DebounceLayer::new(gate))
        .service(failing);
    let err = translated.oneshot(request("/members", None)).await.unwrap_err();
    assert_eq!(err.to_string(), "db down");
}

#[tokio::test]
async fn policy_reload_applies_to_running_stack() {
    let live = DynamicConfig::new(PolicyTable::new());
    let store = InMemorySessionStore::new();
    let session = store.create().unwrap();
    let gate = DebounceGate::builder(store).policies(live.clone()).build();
    let svc = ServiceBuilder::new()
        .layer(RejectionLayer::new())
        .layer(DebounceLayer::new(gate))
        .service(counting_handler(Arc::new(AtomicUsize::new(0))));

    for _ in 0..2 {
        let resp = svc.clone().oneshot(request("/reports", Some(&session))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert!(live.reload(r#"{"routes": {"/reports": "#).is_err());
    let resp = svc.clone().oneshot(request("/reports", Some(&session))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "a rejected reload leaves the old table in force");

    live.reload(r#"{"routes": {"/reports": 60000}}"#).unwrap();
    let first = svc.clone().oneshot(request("/reports", Some(&session))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = svc.clone().oneshot(request("/reports", Some(&session))).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}
