//! HTTP clients for the external transformation and payment providers.

use super::signature::{RequestComponents, request_signature};
use crate::config::{PaymentSettings, TransformSettings};
use crate::domain::payment::{Amount, Customer, OrderId, PAYMENT_WINDOW_MINUTES};
use crate::domain::ports::{PaymentGateway, Transformer};
use crate::domain::service::Service;
use crate::error::{GateError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

pub const CHECKOUT_PATH: &str = "/checkout/v1/payment";

#[derive(Serialize)]
struct TransformRequest<'a> {
    service: &'a str,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    second_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Deserialize)]
struct TransformResponse {
    image: String,
}

/// Posts `{service, image, second_image?, description?}` with base64 images to
/// a single endpoint and expects `{image}` back.
pub struct HttpTransformer {
    client: Client,
    settings: TransformSettings,
}

impl HttpTransformer {
    pub fn new(settings: TransformSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GateError::Transform(e.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait]
impl Transformer for HttpTransformer {
    async fn transform(
        &self,
        service: Service,
        primary: &[u8],
        secondary: Option<&[u8]>,
        description: Option<&str>,
    ) -> Result<Vec<u8>> {
        let body = TransformRequest {
            service: service.key(),
            image: STANDARD.encode(primary),
            second_image: secondary.map(|image| STANDARD.encode(image)),
            description,
        };

        let mut request = self.client.post(&self.settings.endpoint).json(&body);
        if let Some(token) = &self.settings.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GateError::Transform(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GateError::Transform(format!("provider answered {status}")));
        }

        let payload: TransformResponse = response
            .json()
            .await
            .map_err(|e| GateError::Transform(e.to_string()))?;
        STANDARD
            .decode(payload.image)
            .map_err(|e| GateError::Transform(format!("result is not base64: {e}")))
    }
}

/// Creates hosted-checkout payment links.
pub struct HttpPaymentGateway {
    client: Client,
    settings: PaymentSettings,
}

impl HttpPaymentGateway {
    pub fn new(settings: PaymentSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GateError::PaymentProvider(e.to_string()))?;
        Ok(Self { client, settings })
    }
}

/// Body of a checkout request. The amount is sent as a whole number string.
pub fn checkout_body(order_id: &OrderId, amount: &Amount, customer: &Customer, callback_url: Option<&str>) -> Value {
    let phone: String = customer.phone.chars().filter(char::is_ascii_digit).collect();
    serde_json::json!({
        "order": {
            "invoice_number": order_id.as_str(),
            "amount": amount.value().trunc().to_string(),
        },
        "customer": {
            "name": customer.name,
            "email": customer.email,
            "phone": phone,
        },
        "payment": {
            "payment_due_date": PAYMENT_WINDOW_MINUTES,
        },
        "callback_url": callback_url,
        "return_url": callback_url,
    })
}

/// Finds the payment link in any of the places the provider puts it.
pub fn extract_payment_link(response: &Value) -> Option<String> {
    ["/payment_url", "/redirect_url", "/response/payment/url"]
        .iter()
        .find_map(|pointer| response.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_link(
        &self,
        order_id: &OrderId,
        amount: &Amount,
        customer: &Customer,
    ) -> Result<String> {
        let body = checkout_body(
            order_id,
            amount,
            customer,
            self.settings.callback_url.as_deref(),
        );
        let body = serde_json::to_vec(&body).map_err(|e| GateError::PaymentProvider(e.to_string()))?;

        let request_id = format!("REQ-{}", Uuid::new_v4());
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let signature = request_signature(
            self.settings.secret_key.as_bytes(),
            &RequestComponents {
                client_id: &self.settings.client_id,
                request_id: &request_id,
                timestamp: &timestamp,
                target: CHECKOUT_PATH,
            },
            &body,
        )?;

        let url = format!(
            "{}{CHECKOUT_PATH}",
            self.settings.api_url.trim_end_matches('/')
        );
        debug!(%order_id, %url, %request_id, "requesting payment link");

        let response = self
            .client
            .post(&url)
            .header("Client-Id", &self.settings.client_id)
            .header("Request-Id", &request_id)
            .header("Request-Timestamp", &timestamp)
            .header("Signature", signature)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| GateError::PaymentProvider(e.to_string()))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| GateError::PaymentProvider(format!("{status}: {e}")))?;

        let link = extract_payment_link(&payload).ok_or_else(|| {
            GateError::PaymentProvider(format!("{status}: response carries no payment link"))
        })?;
        info!(%order_id, "payment link created");
        Ok(link)
    }
}
