//! HTTP tests against an in-process server on an ephemeral port

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use solana_sdk::signature::{Keypair, Signer};
use volo_operator_backend::{
    build_app,
    services::{RequestVerifier, UserAction},
    types::Config,
};
use volo_vault::{Address, U256};

const OPERATOR_KEY: &str = "operator-key";
const ADMIN_KEY: &str = "admin-key";
const ONE_SUI: u64 = 1_000_000_000;

struct TestServer {
    base: String,
    client: Client,
}

impl TestServer {
    async fn spawn(config: Config) -> Self {
        let app = build_app(Arc::new(config)).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    async fn with_keys() -> Self {
        Self::spawn(Config {
            operator_api_keys: vec![OPERATOR_KEY.to_string()],
            admin_api_keys: vec![ADMIN_KEY.to_string()],
            ..Config::default()
        })
        .await
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = self.client.post(format!("{}{path}", self.base)).json(&body);
        if let Some(key) = key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn operator(&self, path: &str, body: Value) -> Value {
        let (status, body) = self.post(path, Some(OPERATOR_KEY), body).await;
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        body
    }

    async fn admin(&self, path: &str, body: Value) -> Value {
        let (status, body) = self.post(path, Some(ADMIN_KEY), body).await;
        assert_eq!(status, StatusCode::OK, "{path}: {body}");
        body
    }

    /// Fee-free, lock-free vault with a fresh $1 SUI price and valuation
    async fn prepare(&self) {
        self.admin(
            "/api/admin/fee-rates",
            json!({ "deposit_fee_bps": 0, "withdraw_fee_bps": 0 }),
        )
        .await;
        self.admin(
            "/api/admin/locking-times",
            json!({ "withdraw_ms": 0, "cancel_ms": 0 }),
        )
        .await;
        self.refresh_sui().await;
    }

    async fn refresh_sui(&self) {
        let now = Utc::now().timestamp_millis();
        self.operator(
            "/api/operator/prices",
            json!({
                "asset": "SUI",
                "feed": {
                    "price": 100_000_000,
                    "exponent": -8,
                    "confidence": 0,
                    "ema_price": 100_000_000,
                    "published_at_ms": now,
                }
            }),
        )
        .await;
        self.operator("/api/operator/values", json!({ "asset": "SUI" }))
            .await;
    }

    /// Request and execute a deposit, returning the receipt id
    async fn deposit(&self, owner: &Wallet, amount: u64) -> String {
        let (status, body) = self
            .post("/api/vault/deposit", None, owner.deposit(amount))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let receipt_id = body["receipt_id"].as_str().unwrap().to_string();

        let executed = self
            .operator(
                "/api/operator/deposits/execute",
                json!({ "request_id": body["request_id"] }),
            )
            .await;
        assert_ne!(executed["shares"], "0");
        receipt_id
    }
}

/// User wallet signing requests the way a client would
struct Wallet(Keypair);

impl Wallet {
    fn new() -> Self {
        Self(Keypair::new())
    }

    fn address(&self) -> Address {
        Address::new(self.0.pubkey().to_bytes())
    }

    /// `fields` plus the signature over `action` at `timestamp`
    fn sign_at(&self, action: UserAction, timestamp: i64, fields: Value) -> Value {
        let message = RequestVerifier::request_message(&action, timestamp);
        let signature = self.0.sign_message(&message);

        let mut body = json!({
            "wallet": self.address().to_string(),
            "timestamp": timestamp,
            "request_signature": STANDARD.encode(signature.as_ref()),
        });
        if let (Some(body), Value::Object(fields)) = (body.as_object_mut(), fields) {
            body.extend(fields);
        }
        body
    }

    fn sign(&self, action: UserAction, fields: Value) -> Value {
        self.sign_at(action, Utc::now().timestamp(), fields)
    }

    fn deposit(&self, amount: u64) -> Value {
        self.sign(
            UserAction::Deposit {
                receipt_id: None,
                amount,
                expected_shares: U256::zero(),
            },
            json!({ "amount": amount }),
        )
    }

    fn transfer(&self, receipt_id: &str, new_owner: &Address) -> Value {
        let action = UserAction::TransferReceipt {
            receipt_id: receipt_id.parse().unwrap(),
            new_owner: *new_owner,
        };
        self.sign(
            action,
            json!({ "receipt_id": receipt_id, "new_owner": new_owner.to_string() }),
        )
    }
}

#[tokio::test]
async fn health_needs_no_key() {
    let server = TestServer::with_keys().await;
    let (status, body) = server.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["vault"].is_string());
}

#[tokio::test]
async fn role_keys_are_enforced() {
    let server = TestServer::with_keys().await;
    let body = json!({ "enabled": false });

    let (status, _) = server.post("/api/admin/enabled", None, body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Operator key does not unlock admin routes
    let (status, _) = server
        .post("/api/admin/enabled", Some(OPERATOR_KEY), body.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server.post("/api/admin/enabled", Some(ADMIN_KEY), body).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn deposit_and_withdraw_round_trip() {
    let server = TestServer::with_keys().await;
    server.prepare().await;

    let alice = Wallet::new();
    let receipt_id = server.deposit(&alice, 2 * ONE_SUI).await;

    let (status, receipt) = server.get(&format!("/api/vault/receipts/{receipt_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let shares: u128 = receipt["shares"].as_str().unwrap().parse().unwrap();

    let (_, summary) = server.get("/api/vault").await;
    assert_eq!(summary["total_shares"], receipt["shares"]);
    assert_eq!(summary["free_principal"], 2 * ONE_SUI);

    let withdraw = alice.sign(
        UserAction::Withdraw {
            receipt_id: receipt_id.parse().unwrap(),
            shares: U256::from(shares / 2),
            expected_amount: 0,
        },
        json!({ "receipt_id": receipt_id, "shares": (shares / 2).to_string() }),
    );
    let (status, body) = server.post("/api/vault/withdraw", None, withdraw).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let payout = server
        .operator(
            "/api/operator/withdrawals/execute",
            json!({ "request_id": body["request_id"] }),
        )
        .await;
    assert_eq!(payout["amount"], ONE_SUI);
    assert_eq!(payout["fee"], 0);
    assert_eq!(payout["recipient"], alice.address().to_string());

    let (_, events) = server.get("/api/vault/events").await;
    let kinds: Vec<_> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"]["event"].as_str().unwrap().to_string())
        .collect();
    assert!(kinds.contains(&"DepositExecuted".to_string()));
    assert!(kinds.contains(&"WithdrawExecuted".to_string()));
}

#[tokio::test]
async fn vault_errors_carry_codes() {
    let server = TestServer::with_keys().await;
    server.prepare().await;

    let (status, body) = server
        .post("/api/vault/deposit", None, Wallet::new().deposit(0))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "ZERO_AMOUNT");
    assert_eq!(body["retryable"], false);

    let (status, body) = server.get("/api/vault/receipts/not-base58!").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ADDRESS");

    let (status, body) = server
        .get(&format!("/api/vault/receipts/{}", Wallet::new().address()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "RECEIPT_NOT_FOUND");
}

#[tokio::test]
async fn operation_lifecycle_over_http() {
    let server = TestServer::with_keys().await;
    server.prepare().await;
    server.deposit(&Wallet::new(), 10 * ONE_SUI).await;

    let custody = server
        .operator(
            "/api/operator/operation/start",
            json!({ "principal_amount": 5 * ONE_SUI }),
        )
        .await;
    assert_eq!(custody["principal"], 5 * ONE_SUI);

    let (_, summary) = server.get("/api/vault").await;
    assert_eq!(summary["status"], "during_operation");

    // User requests are refused mid-operation
    let (status, body) = server
        .post("/api/vault/deposit", None, Wallet::new().deposit(ONE_SUI))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_NORMAL");

    server
        .operator("/api/operator/operation/return", custody)
        .await;

    let (status, body) = server
        .post("/api/operator/operation/reconcile", Some(OPERATOR_KEY), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INCOMPLETE_VALUE_UPDATE");

    server
        .operator("/api/operator/values", json!({ "asset": "SUI" }))
        .await;
    let result = server
        .operator("/api/operator/operation/reconcile", json!({}))
        .await;
    assert_eq!(result["loss"], "0");

    let (_, summary) = server.get("/api/vault").await;
    assert_eq!(summary["status"], "normal");
    assert!(summary["operation"].is_null());
}

#[tokio::test]
async fn frozen_operator_is_refused() {
    let server = TestServer::with_keys().await;
    server.prepare().await;

    server
        .admin("/api/admin/operator-frozen", json!({ "frozen": true }))
        .await;

    let (status, body) = server
        .post(
            "/api/operator/assets/coin",
            Some(OPERATOR_KEY),
            json!({ "asset": "USDC", "decimals": 6 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "OPERATOR_FROZEN");

    server
        .admin("/api/admin/operator-frozen", json!({ "frozen": false }))
        .await;
    let summary = server
        .operator(
            "/api/operator/assets/coin",
            json!({ "asset": "USDC", "decimals": 6 }),
        )
        .await;
    assert_eq!(summary["coins"]["USDC"]["balance"], 0);
}

#[tokio::test]
async fn receipt_transfer_needs_owner_signature() {
    let server = TestServer::spawn(Config {
        api_keys: vec!["shared-user-key".to_string()],
        operator_api_keys: vec![OPERATOR_KEY.to_string()],
        admin_api_keys: vec![ADMIN_KEY.to_string()],
        ..Config::default()
    })
    .await;
    server.prepare().await;

    let victim = Wallet::new();
    let intruder = Wallet::new();
    let (status, body) = server
        .post("/api/vault/deposit", Some("shared-user-key"), victim.deposit(ONE_SUI))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let receipt_id = body["receipt_id"].as_str().unwrap().to_string();

    // Claiming the victim's wallet with the intruder's signature
    let mut spoofed = intruder.transfer(&receipt_id, &intruder.address());
    spoofed["wallet"] = json!(victim.address().to_string());
    let (status, body) = server
        .post("/api/vault/receipts/transfer", Some("shared-user-key"), spoofed)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    // Signing honestly as the intruder reaches the vault's owner check
    let (status, body) = server
        .post(
            "/api/vault/receipts/transfer",
            Some("shared-user-key"),
            intruder.transfer(&receipt_id, &intruder.address()),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    // Still the victim's to give away
    let (status, receipt) = server
        .post(
            "/api/vault/receipts/transfer",
            Some("shared-user-key"),
            victim.transfer(&receipt_id, &intruder.address()),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{receipt}");
    assert_eq!(receipt["owner"], intruder.address().to_string());
}

#[tokio::test]
async fn stale_and_replayed_requests_are_refused() {
    let server = TestServer::with_keys().await;
    server.prepare().await;
    let alice = Wallet::new();

    let action = UserAction::Deposit {
        receipt_id: None,
        amount: ONE_SUI,
        expected_shares: U256::zero(),
    };
    let stale = alice.sign_at(
        action,
        Utc::now().timestamp() - 3_600,
        json!({ "amount": ONE_SUI }),
    );
    let (status, body) = server.post("/api/vault/deposit", None, stale).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "REQUEST_EXPIRED");

    let fresh = alice.deposit(ONE_SUI);
    let (status, _) = server.post("/api/vault/deposit", None, fresh.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.post("/api/vault/deposit", None, fresh).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "REQUEST_REPLAYED");

    let (_, pending) = server.get("/api/vault/requests").await;
    assert_eq!(pending["deposits"].as_array().unwrap().len(), 1);
}
