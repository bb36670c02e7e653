#![allow(dead_code)]

use tour_booking::{
    api::router::create_router,
    config::{Config, Environment},
    domain::models::payment::{CheckoutRequest, CheckoutSession, WebhookEvent},
    domain::ports::{EmailService, ImageStore, PaymentGateway},
    error::AppError,
    infra::factory::{assemble_state, load_templates, run_sqlite_migrations, Adapters, Repositories},
    infra::payments::stripe_gateway::StripeGateway,
    state::AppState,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Pool, Sqlite};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const PASSWORD: &str = "pass1234";
pub const BOUNDARY: &str = "----tourbookingboundary";

/// A file part: `(field, filename, content type, bytes)`.
pub type FilePart<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

pub fn multipart_body(fields: &[(&str, &str)], files: &[FilePart]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    for (field, filename, content_type, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[derive(Clone, Debug)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentMail>>,
    pub fail: bool,
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::ExternalService("mail server down".into()));
        }
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Records checkout requests and checks webhook signatures for real.
pub struct MockPaymentGateway {
    pub requests: Mutex<Vec<CheckoutRequest>>,
    verifier: StripeGateway,
}

impl MockPaymentGateway {
    fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            verifier: StripeGateway::new("http://localhost".into(), "sk_test".into(), WEBHOOK_SECRET.into()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            id: format!("cs_test_{}", request.tour_id),
            url: Some("https://checkout.test/session".into()),
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError> {
        self.verifier.verify_webhook(payload, signature)
    }
}

#[derive(Default)]
pub struct MockImageStore {
    pub saved: Mutex<Vec<(String, u32, u32)>>,
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn save_jpeg(&self, _data: Vec<u8>, width: u32, height: u32, relative_path: &str) -> Result<(), AppError> {
        self.saved.lock().unwrap().push((relative_path.to_string(), width, height));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub email: Arc<MockEmailService>,
    pub payments: Arc<MockPaymentGateway>,
    pub images: Arc<MockImageStore>,
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        environment: Environment::Development,
        database_url: database_url.to_string(),
        port: 0,
        public_url: "http://localhost:3000".to_string(),
        public_dir: "public".to_string(),
        jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
        jwt_expires_in: Duration::days(90),
        jwt_cookie_expires_in_days: 90,
        mail_service_url: "http://localhost".to_string(),
        mail_service_token: "token".to_string(),
        mail_from: "Tour Booking <hello@tour-booking.local>".to_string(),
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        stripe_api_url: "http://localhost".to_string(),
        rate_limit_per_hour: 100,
        trust_proxy: false,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_failing_mail() -> Self {
        Self::build(|_| {}, true).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, false).await
    }

    async fn build(tweak: impl FnOnce(&mut Config), mail_fails: bool) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        run_sqlite_migrations(&pool).await.expect("Failed to migrate test db");

        let mut config = test_config(&db_url);
        tweak(&mut config);

        let email = Arc::new(MockEmailService { fail: mail_fails, ..Default::default() });
        let payments = Arc::new(MockPaymentGateway::new());
        let images = Arc::new(MockImageStore::default());

        let adapters = Adapters {
            email: email.clone(),
            payment_gateway: payments.clone(),
            image_store: images.clone(),
        };
        let templates = load_templates().expect("templates compile");
        let state = Arc::new(assemble_state(&config, Repositories::sqlite(pool.clone()), adapters, templates));
        let router = create_router(state.clone());

        Self { router, pool, db_filename, state, email, payments, images }
    }

    pub async fn request(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    pub async fn multipart(&self, method: &str, uri: &str, token: &str, body: Vec<u8>) -> Response {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(req).await.unwrap()
    }

    /// Signs up a user and returns `(user_id, token)`.
    pub async fn signup(&self, name: &str, email: &str) -> (String, String) {
        let res = self
            .request(
                "POST",
                "/api/v1/users/signup",
                None,
                Some(json!({
                    "name": name, "email": email,
                    "password": PASSWORD, "password_confirm": PASSWORD
                })),
            )
            .await;
        assert_eq!(res.status(), StatusCode::CREATED, "signup failed");
        let body = parse_body(res).await;
        let id = body["data"]["user"]["id"].as_str().unwrap().to_string();
        let token = body["token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Signs up a user with the given role and logs in again so the token
    /// is issued after the role change.
    pub async fn signup_as(&self, role: &str, email: &str) -> (String, String) {
        let (id, _) = self.signup("Staff Member", email).await;
        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(&id)
            .execute(&self.pool)
            .await
            .unwrap();
        (id, self.login(email, PASSWORD).await)
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let res = self
            .request("POST", "/api/v1/users/login", None, Some(json!({ "email": email, "password": password })))
            .await;
        if !res.status().is_success() {
            panic!("Login failed in test helper: status {}", res.status());
        }
        let body = parse_body(res).await;
        body["token"].as_str().expect("No token in body").to_string()
    }

    /// Creates a tour as `token` and returns its id.
    pub async fn create_tour(&self, token: &str, tour: Value) -> String {
        let res = self.request("POST", "/api/v1/tours", Some(token), Some(tour)).await;
        assert_eq!(res.status(), StatusCode::CREATED, "tour creation failed");
        let body = parse_body(res).await;
        body["data"]["data"]["id"].as_str().unwrap().to_string()
    }

    pub fn sent_mail(&self) -> Vec<SentMail> {
        self.email.sent.lock().unwrap().clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
    }
}

pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn tour_json(name: &str, price: f64, difficulty: &str, duration: i32) -> Value {
    json!({
        "name": name,
        "duration": duration,
        "max_group_size": 10,
        "difficulty": difficulty,
        "price": price,
        "summary": "A fine day out in the hills",
        "description": "Long walks and good food.",
        "start_dates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"]
    })
}

/// `Stripe-Signature` header value for `payload` signed now.
pub fn sign_webhook(payload: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
