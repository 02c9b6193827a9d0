//! HTTP surface scenarios over the real router with the in-memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use common::{verdict, ScriptedOracle};
use loyalty_server::accrual::{AccrualOutcome, AccrualStatus};
use loyalty_server::api;
use loyalty_server::error::Error;
use loyalty_server::pipeline::{Pipeline, PipelineConfig};
use loyalty_server::service::BalanceService;
use loyalty_server::state::AppState;
use loyalty_server::store::memory::MemoryStore;
use loyalty_server::store::{LedgerStore, UserStore};

struct Harness {
    server: TestServer,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            None,
            store.clone(),
            store.clone(),
            store.clone(),
            "test-secret".into(),
            6,
        );
        let server = TestServer::new(api::router(state)).unwrap();
        Self { server, store }
    }

    async fn register(&self, login: &str, password: &str) -> String {
        let resp = self
            .server
            .post("/api/user/register")
            .json(&json!({ "login": login, "password": password }))
            .await;
        resp.assert_status_ok();
        resp.json::<serde_json::Value>()["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    async fn user_id(&self, login: &str) -> i64 {
        self.store.find_by_login(login).await.unwrap().unwrap().id
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// ── Registration and login ──

#[tokio::test]
async fn register_returns_token_in_header_and_body() {
    let h = Harness::new();

    let resp = h
        .server
        .post("/api/user/register")
        .json(&json!({ "login": "alice", "password": "password123" }))
        .await;
    resp.assert_status_ok();

    let header = resp.header("authorization");
    let header = header.to_str().unwrap();
    assert!(header.starts_with("Bearer "));

    let body: serde_json::Value = resp.json();
    assert_eq!(format!("Bearer {}", body["token"].as_str().unwrap()), header);
}

#[tokio::test]
async fn register_validates_input() {
    let h = Harness::new();

    let resp = h
        .server
        .post("/api/user/register")
        .json(&json!({ "login": "", "password": "password123" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = h
        .server
        .post("/api/user/register")
        .json(&json!({ "login": "alice", "password": "short" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = h
        .server
        .post("/api/user/register")
        .text("not json at all")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_login_conflicts() {
    let h = Harness::new();
    h.register("alice", "password123").await;

    let resp = h
        .server
        .post("/api/user/register")
        .json(&json!({ "login": "alice", "password": "password456" }))
        .await;
    resp.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_checks_credentials() {
    let h = Harness::new();
    h.register("alice", "password123").await;

    let resp = h
        .server
        .post("/api/user/login")
        .json(&json!({ "login": "alice", "password": "password123" }))
        .await;
    resp.assert_status_ok();
    assert!(resp.json::<serde_json::Value>()["token"].is_string());

    let resp = h
        .server
        .post("/api/user/login")
        .json(&json!({ "login": "alice", "password": "wrong" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);

    let resp = h
        .server
        .post("/api/user/login")
        .json(&json!({ "login": "nobody", "password": "password123" }))
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let h = Harness::new();

    for (method, path) in [
        ("POST", "/api/user/orders"),
        ("GET", "/api/user/orders"),
        ("GET", "/api/user/balance"),
        ("POST", "/api/user/balance/withdraw"),
        ("GET", "/api/user/withdrawals"),
    ] {
        let req = match method {
            "POST" => h.server.post(path),
            _ => h.server.get(path),
        };
        req.await.assert_status(StatusCode::UNAUTHORIZED);
    }

    let resp = h
        .server
        .get("/api/user/balance")
        .add_header("authorization", "Bearer not.a.token")
        .await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
}

// ── Orders ──

#[tokio::test]
async fn order_submission_contract() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;
    let bob = h.register("bob", "password123").await;

    // First submission is accepted for processing.
    let resp = h
        .server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("79927398713")
        .await;
    resp.assert_status(StatusCode::ACCEPTED);

    // Re-submission by the owner is OK, not a conflict.
    let resp = h
        .server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("79927398713")
        .await;
    resp.assert_status(StatusCode::OK);

    // A number failing the checksum is unprocessable.
    let resp = h
        .server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("12345")
        .await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // The same number from another user conflicts.
    let resp = h
        .server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&bob))
        .text("79927398713")
        .await;
    resp.assert_status(StatusCode::CONFLICT);

    // An empty body is a bad request.
    let resp = h
        .server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("  ")
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_listing_contract() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;

    let resp = h
        .server
        .get("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);

    h.server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("79927398713")
        .await
        .assert_status(StatusCode::ACCEPTED);

    let resp = h
        .server
        .get("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["number"], "79927398713");
    assert_eq!(orders[0]["status"], "NEW");
    assert!(orders[0].get("accrual").is_none());
    assert!(orders[0]["uploaded_at"].is_string());
}

// ── Balance and withdrawals ──

#[tokio::test]
async fn fresh_account_has_zero_balance() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;

    let resp = h
        .server
        .get("/api/user/balance")
        .add_header("authorization", bearer(&alice))
        .await;
    resp.assert_status_ok();

    let body: serde_json::Value = resp.json();
    assert_eq!(body["current"], 0.0);
    assert_eq!(body["withdrawn"], 0.0);
}

#[tokio::test]
async fn withdrawal_contract() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;
    let alice_id = h.user_id("alice").await;
    h.store
        .append_accrual(alice_id, "79927398713", 500.0)
        .await
        .unwrap();

    // Spend 100 points against a fresh order number.
    let resp = h
        .server
        .post("/api/user/balance/withdraw")
        .add_header("authorization", bearer(&alice))
        .json(&json!({ "order": "2377225624", "sum": 100 }))
        .await;
    resp.assert_status_ok();

    let balance: serde_json::Value = h
        .server
        .get("/api/user/balance")
        .add_header("authorization", bearer(&alice))
        .await
        .json();
    assert_eq!(balance["current"], 400.0);
    assert_eq!(balance["withdrawn"], 100.0);

    // More than the balance is refused with 402.
    let resp = h
        .server
        .post("/api/user/balance/withdraw")
        .add_header("authorization", bearer(&alice))
        .json(&json!({ "order": "2377225624", "sum": 500 }))
        .await;
    resp.assert_status(StatusCode::PAYMENT_REQUIRED);

    // A bad checksum is unprocessable even with funds available.
    let resp = h
        .server
        .post("/api/user/balance/withdraw")
        .add_header("authorization", bearer(&alice))
        .json(&json!({ "order": "12345", "sum": 10 }))
        .await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    // Non-positive sums are rejected.
    let resp = h
        .server
        .post("/api/user/balance/withdraw")
        .add_header("authorization", bearer(&alice))
        .json(&json!({ "order": "2377225624", "sum": -5 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let history: serde_json::Value = h
        .server
        .get("/api/user/withdrawals")
        .add_header("authorization", bearer(&alice))
        .await
        .json();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["order"], "2377225624");
    assert_eq!(entries[0]["sum"], 100.0);
    assert!(entries[0]["processed_at"].is_string());
}

#[tokio::test]
async fn empty_withdrawal_history_is_204() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;

    let resp = h
        .server
        .get("/api/user/withdrawals")
        .add_header("authorization", bearer(&alice))
        .await;
    resp.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let h = Harness::new();
    h.register("alice", "password123").await;
    let alice_id = h.user_id("alice").await;
    h.store
        .append_accrual(alice_id, "79927398713", 500.0)
        .await
        .unwrap();

    let service = Arc::new(BalanceService::new(h.store.clone()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.withdraw(alice_id, "2377225624", 100.0).await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(Error::InsufficientFunds) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(insufficient, 5);

    let balance = h.store.balance(alice_id).await.unwrap();
    assert_eq!(balance.current, 0.0);
    assert_eq!(balance.withdrawn, 500.0);
    assert_eq!(h.store.withdrawals(alice_id).await.unwrap().len(), 5);
}

// ── Full flow with the pipeline running ──

#[tokio::test]
async fn submitted_order_is_valued_and_spendable() {
    let h = Harness::new();
    let alice = h.register("alice", "password123").await;

    let oracle = ScriptedOracle::default();
    oracle
        .script(
            "79927398713",
            vec![
                AccrualOutcome::NotRegistered,
                verdict("79927398713", AccrualStatus::Processing, None),
                verdict("79927398713", AccrualStatus::Processed, Some(500.0)),
            ],
        )
        .await;

    let pipeline = Pipeline::spawn(
        h.store.clone(),
        h.store.clone(),
        Arc::new(oracle),
        PipelineConfig {
            workers: 2,
            queue_capacity: 16,
            scan_interval: Duration::from_millis(50),
        },
    );

    h.server
        .post("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .text("79927398713")
        .await
        .assert_status(StatusCode::ACCEPTED);

    // Wait for the pipeline to walk the order to PROCESSED and credit it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let balance: serde_json::Value = h
            .server
            .get("/api/user/balance")
            .add_header("authorization", bearer(&alice))
            .await
            .json();
        if balance["current"] == 500.0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "accrual never reached the balance"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let orders: serde_json::Value = h
        .server
        .get("/api/user/orders")
        .add_header("authorization", bearer(&alice))
        .await
        .json();
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "PROCESSED");
    assert_eq!(orders[0]["accrual"], 500.0);

    // The earned points are spendable.
    h.server
        .post("/api/user/balance/withdraw")
        .add_header("authorization", bearer(&alice))
        .json(&json!({ "order": "2377225624", "sum": 100 }))
        .await
        .assert_status_ok();

    let balance: serde_json::Value = h
        .server
        .get("/api/user/balance")
        .add_header("authorization", bearer(&alice))
        .await
        .json();
    assert_eq!(balance["current"], 400.0);
    assert_eq!(balance["withdrawn"], 100.0);

    pipeline.shutdown().await;
}

// ── Probes ──

#[tokio::test]
async fn health_is_public() {
    let h = Harness::new();
    let resp = h.server.get("/health").await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["status"], "ok");
}

#[tokio::test]
async fn ready_without_database_dependency_is_ok() {
    let h = Harness::new();
    h.server.get("/ready").await.assert_status_ok();
}
