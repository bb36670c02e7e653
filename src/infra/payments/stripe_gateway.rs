//! Stripe Checkout over its REST API.

use crate::domain::{
    models::payment::{CheckoutRequest, CheckoutSession, WebhookEvent},
    ports::PaymentGateway,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{error, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Signed timestamps older than this are rejected as replays.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;
const CURRENCY: &str = "usd";

pub struct StripeGateway {
    client: Client,
    api_url: String,
    secret_key: String,
    webhook_secret: String,
}

impl StripeGateway {
    pub fn new(api_url: String, secret_key: String, webhook_secret: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            secret_key,
            webhook_secret,
        }
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SessionObject {
    client_reference_id: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    amount_total: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CustomerDetails {
    email: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let unit_amount = (request.price * 100.0).round() as i64;
        let form = [
            ("mode", "payment".to_string()),
            ("payment_method_types[]", "card".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("customer_email", request.customer_email.clone()),
            ("client_reference_id", request.tour_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", CURRENCY.to_string()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            ("line_items[0][price_data][product_data][name]", format!("{} Tour", request.tour_name)),
            ("line_items[0][price_data][product_data][description]", request.summary.clone()),
            ("line_items[0][price_data][product_data][images][0]", request.image_url.clone()),
        ];

        let res = self.client
            .post(format!("{}/v1/checkout/sessions", self.api_url.trim_end_matches('/')))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!("Payment provider connection error: {}", e);
                AppError::ExternalService("Payment provider is unavailable. Try again later!".into())
            })?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            error!("Checkout session creation failed. Status: {}, Body: {}", status, body);
            return Err(AppError::ExternalService("Could not create checkout session.".into()));
        }

        let session: SessionResponse = res.json().await.map_err(|e| {
            error!("Unreadable checkout session response: {}", e);
            AppError::ExternalService("Could not create checkout session.".into())
        })?;

        info!("Checkout session {} created for tour {}", session.id, request.tour_id);
        Ok(CheckoutSession { id: session.id, url: session.url })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, AppError> {
        verify_signature(&self.webhook_secret, payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

/// Checks a `t=<ts>,v1=<hex>` header against an HMAC-SHA256 of `"{ts}.{payload}"`.
pub fn verify_signature(secret: &str, payload: &[u8], header: &str, now: i64) -> Result<(), AppError> {
    let invalid = |reason: &str| {
        warn!("Rejected webhook: {}", reason);
        AppError::Validation(format!("Webhook error: {}", reason))
    };

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
    if candidates.is_empty() {
        return Err(invalid("missing signature"));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(invalid("timestamp outside tolerance"));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::InternalWithMsg(format!("HMAC key rejected: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matches = candidates.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });

    if matches { Ok(()) } else { Err(invalid("signature mismatch")) }
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent, AppError> {
    let event: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| AppError::Validation(format!("Webhook error: {}", e)))?;

    if event.kind != "checkout.session.completed" {
        return Ok(WebhookEvent::Ignored(event.kind));
    }

    let session = event.data.object;
    let customer_email = session
        .customer_email
        .or_else(|| session.customer_details.and_then(|d| d.email))
        .ok_or_else(|| AppError::Validation("Webhook error: session has no customer email".into()))?;
    let tour_id = session
        .client_reference_id
        .ok_or_else(|| AppError::Validation("Webhook error: session has no tour reference".into()))?;
    let amount = session.amount_total.unwrap_or_default() as f64 / 100.0;

    Ok(WebhookEvent::CheckoutCompleted { tour_id, customer_email, amount })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"type":"ping","data":{"object":{}}}"#;
        let header = sign(body, 1_700_000_000);
        assert!(verify_signature(SECRET, body, &header, 1_700_000_100).is_ok());
    }

    #[test]
    fn rejects_tampered_body_and_stale_timestamp() {
        let body = br#"{"type":"ping","data":{"object":{}}}"#;
        let header = sign(body, 1_700_000_000);

        assert!(verify_signature(SECRET, b"{}", &header, 1_700_000_000).is_err());
        assert!(verify_signature(SECRET, body, &header, 1_700_001_000).is_err());
        assert!(verify_signature(SECRET, body, "v1=abcd", 1_700_000_000).is_err());
    }

    #[test]
    fn decodes_completed_checkout() {
        let body = br#"{
            "type": "checkout.session.completed",
            "data": {"object": {
                "client_reference_id": "tour-1",
                "customer_details": {"email": "jonas@example.com"},
                "amount_total": 49700
            }}
        }"#;

        assert_eq!(
            parse_event(body).unwrap(),
            WebhookEvent::CheckoutCompleted {
                tour_id: "tour-1".into(),
                customer_email: "jonas@example.com".into(),
                amount: 497.0,
            }
        );
    }

    #[test]
    fn other_events_are_ignored() {
        let body = br#"{"type":"invoice.paid","data":{"object":{}}}"#;
        assert_eq!(parse_event(body).unwrap(), WebhookEvent::Ignored("invoice.paid".into()));
    }
}
