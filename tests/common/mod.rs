//! Test harness: an in-memory SQLite application with fake postal and
//! payment backends wired in through the service trait seams.

// Each integration test binary uses a different subset of the harness.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tower::ServiceExt;

use storefront_api::auth::{AuthConfig, AuthService};
use storefront_api::config::AppConfig;
use storefront_api::db;
use storefront_api::entities::product;
use storefront_api::errors::ServiceError;
use storefront_api::events;
use storefront_api::handlers::AppServices;
use storefront_api::services::payments::{sign_payload, GatewaySession, PaymentGateway, SessionLine};
use storefront_api::services::shipping::{PostalAddress, PostalLookup};
use storefront_api::{app, AppState};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_placeholder";

/// Postal registry fake backed by a mutable zipcode table.
pub struct FakePostalLookup {
    entries: Mutex<HashMap<String, PostalAddress>>,
}

impl FakePostalLookup {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "01001000".to_string(),
            PostalAddress {
                city: "São Paulo".to_string(),
                state: "SP".to_string(),
            },
        );
        entries.insert(
            "69900100".to_string(),
            PostalAddress {
                city: "Rio Branco".to_string(),
                state: "AC".to_string(),
            },
        );
        Self {
            entries: Mutex::new(entries),
        }
    }

    #[allow(dead_code)]
    pub fn insert(&self, zipcode: &str, city: &str, state: &str) {
        self.entries.lock().unwrap().insert(
            zipcode.to_string(),
            PostalAddress {
                city: city.to_string(),
                state: state.to_string(),
            },
        );
    }
}

#[async_trait]
impl PostalLookup for FakePostalLookup {
    async fn resolve(&self, zipcode: &str) -> Result<Option<PostalAddress>, ServiceError> {
        Ok(self.entries.lock().unwrap().get(zipcode).cloned())
    }
}

/// Payment gateway fake. Records created sessions and can be flipped into
/// a failing mode to exercise the orphaned-pending-order path.
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, i32>>,
    last_lines: Mutex<Vec<SessionLine>>,
    counter: AtomicU64,
    fail: AtomicBool,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            last_lines: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
            fail: AtomicBool::new(false),
        }
    }

    #[allow(dead_code)]
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Lines submitted with the most recent session, as the gateway saw them.
    #[allow(dead_code)]
    pub fn last_session_lines(&self) -> Vec<SessionLine> {
        self.last_lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        order_id: i32,
        lines: &[SessionLine],
        _shipping_cost: Decimal,
    ) -> Result<GatewaySession, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "gateway unavailable".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("cs_test_{}_{}", order_id, n);
        self.sessions.lock().unwrap().insert(id.clone(), order_id);
        *self.last_lines.lock().unwrap() = lines.to_vec();
        Ok(GatewaySession {
            url: format!("https://checkout.test/pay/{}", id),
            id,
        })
    }

    async fn order_id_for_session(&self, session_id: &str) -> Result<Option<i32>, ServiceError> {
        Ok(self.sessions.lock().unwrap().get(session_id).copied())
    }
}

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub lookup: Arc<FakePostalLookup>,
    pub gateway: Arc<FakeGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        // A pooled in-memory SQLite database only persists across a single
        // connection.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::bootstrap_schema(&pool)
            .await
            .expect("failed to bootstrap test schema");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = events::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::new(
                cfg.jwt_secret.clone(),
                Duration::from_secs(cfg.jwt_expiration),
            ),
            db_arc.clone(),
        ));

        let lookup = Arc::new(FakePostalLookup::new());
        let gateway = Arc::new(FakeGateway::new());

        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            auth_service,
            lookup.clone(),
            gateway.clone(),
        );

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            event_sender,
            services,
        };

        let router = app(state.clone());

        Self {
            router,
            state,
            lookup,
            gateway,
            _event_task: event_task,
        }
    }

    /// A fresh clone of the application router for raw request tests.
    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Registers a user and returns a bearer token for it.
    pub async fn register_user(&self, name: &str, email: &str) -> String {
        let user = self
            .state
            .services
            .auth
            .register(name, email, "hunter22!pass")
            .await
            .expect("register test user");
        self.state
            .services
            .auth
            .generate_token(user.id, &user.email)
            .expect("issue test token")
            .access_token
    }

    pub async fn seed_product(&self, label: &str, price: Decimal) -> i32 {
        let created = product::ActiveModel {
            label: Set(label.to_string()),
            price: Set(price),
            image: Set(None),
            ..Default::default()
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product");
        created.id
    }

    /// Rewrites a catalog price in place, bypassing the API.
    pub async fn set_product_price(&self, product_id: i32, price: Decimal) {
        let model = product::Entity::find_by_id(product_id)
            .one(&*self.state.db)
            .await
            .expect("load product")
            .expect("product exists");
        let mut active: product::ActiveModel = model.into();
        active.price = Set(price);
        active.update(&*self.state.db).await.expect("update price");
    }

    /// Creates an address for the token's user through the API.
    pub async fn seed_address(&self, token: &str, zipcode: &str) -> i32 {
        let response = self
            .request(
                Method::POST,
                "/user/addresses",
                Some(serde_json::json!({
                    "street": "Praça da Sé",
                    "number": "100",
                    "city": "São Paulo",
                    "state": "SP",
                    "country": "Brasil",
                    "zipcode": zipcode,
                })),
                Some(token),
            )
            .await;
        assert_eq!(response.status(), 201, "seed address should succeed");
        let body = response_json(response).await;
        body["data"]["id"].as_i64().expect("address id") as i32
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Posts a signed webhook payload the way the gateway would.
    pub async fn post_webhook(&self, payload: &Value) -> axum::response::Response {
        let bytes = serde_json::to_vec(payload).expect("serialize webhook payload");
        let signature = sign_payload(&bytes, TEST_WEBHOOK_SECRET, chrono::Utc::now().timestamp());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook/stripe")
            .header("content-type", "application/json")
            .header("stripe-signature", signature)
            .body(Body::from(bytes))
            .expect("build webhook request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during webhook request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response body")
}

/// Reads a JSON field as a decimal, tolerant of how the database backend
/// round-trips trailing zeros.
#[allow(dead_code)]
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal value: {other:?}"),
    }
}
