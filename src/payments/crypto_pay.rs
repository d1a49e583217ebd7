//! Crypto Pay API client

use crate::{
    common::traits::{Invoice, InvoiceProvider, InvoiceRequest},
    config::PaymentsConfig,
    errors::{CaseboxResult, UpstreamError},
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const SERVICE: &str = "crypto_pay";
const TOKEN_HEADER: &str = "Crypto-Pay-API-Token";

pub struct CryptoPayClient {
    http: Client,
    base_url: String,
    token: String,
}

impl CryptoPayClient {
    pub fn new(config: &PaymentsConfig) -> CaseboxResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(request_failed)?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.crypto_bot_token.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

fn request_failed(e: reqwest::Error) -> UpstreamError {
    UpstreamError::RequestFailed {
        service: SERVICE,
        message: e.to_string(),
    }
}

fn invalid_response(message: impl Into<String>) -> UpstreamError {
    UpstreamError::InvalidResponse {
        service: SERVICE,
        message: message.into(),
    }
}

/// Scalars the API sends either as JSON numbers or as strings
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a `createInvoice` reply; anything without `"ok": true` is a rejection
pub fn parse_invoice_response(body: &Value) -> CaseboxResult<Invoice> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let message = body
            .get("error")
            .map(|e| match e.get("name").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => e.to_string(),
            })
            .unwrap_or_else(|| "Failed to create payment invoice".to_string());
        return Err(UpstreamError::Rejected {
            service: SERVICE,
            message,
        }
        .into());
    }

    let result = body.get("result").ok_or_else(|| invalid_response("missing result"))?;

    let invoice_id = result
        .get("invoice_id")
        .and_then(scalar_string)
        .ok_or_else(|| invalid_response("missing invoice_id"))?;

    let pay_url = result
        .get("pay_url")
        .or_else(|| result.get("bot_invoice_url"))
        .and_then(Value::as_str)
        .ok_or_else(|| invalid_response("missing pay_url"))?
        .to_string();

    let amount = result
        .get("amount")
        .and_then(scalar_string)
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| invalid_response("missing or malformed amount"))?;

    Ok(Invoice {
        invoice_id,
        pay_url,
        amount,
    })
}

#[async_trait]
impl InvoiceProvider for CryptoPayClient {
    async fn create_invoice(&self, request: &InvoiceRequest) -> CaseboxResult<Invoice> {
        let payload = json!({
            "asset": request.asset.as_str(),
            "amount": request.amount_usd.to_string(),
            "description": request.description,
            "paid_btn_name": "callback",
            "paid_btn_url": request.paid_btn_url,
            "payload": request.payload,
        });

        let response = self
            .http
            .post(self.method_url("createInvoice"))
            .header(TOKEN_HEADER, &self.token)
            .json(&payload)
            .send()
            .await
            .map_err(request_failed)?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| invalid_response(e.to_string()))?;
        parse_invoice_response(&body)
    }

    async fn get_me(&self) -> CaseboxResult<Value> {
        let response = self
            .http
            .get(self.method_url("getMe"))
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(request_failed)?;

        if !response.status().is_success() {
            return Err(UpstreamError::BadStatus {
                service: SERVICE,
                status: response.status().as_u16(),
            }
            .into());
        }

        Ok(response
            .json()
            .await
            .map_err(|e| invalid_response(e.to_string()))?)
    }
}
