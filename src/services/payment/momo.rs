use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{
    callback_raw_signature, creation_raw_signature, refund_raw_signature, sign, verify_signature,
    GatewayCallback, PaymentProvider, PaymentRequest, PaymentSession, RefundOutcome, REQUEST_TYPE,
};
use crate::config::GatewayConfig;
use crate::models::Booking;

pub struct MomoGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl MomoGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    result_code: i64,
    message: Option<String>,
    pay_url: Option<String>,
    qr_code_url: Option<String>,
    deeplink: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefundResponse {
    result_code: i64,
    message: Option<String>,
    trans_id: Option<i64>,
}

#[async_trait]
impl PaymentProvider for MomoGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> anyhow::Result<PaymentSession> {
        let request_id = format!("{}_{}", request.order_id, Utc::now().timestamp_millis());
        let raw = creation_raw_signature(&self.config, &request_id, request);
        let signature = sign(&self.config.secret_key, &raw)?;

        let body = serde_json::json!({
            "partnerCode": self.config.partner_code,
            "accessKey": self.config.access_key,
            "requestId": request_id,
            "amount": request.amount,
            "orderId": request.order_id,
            "orderInfo": request.order_info,
            "redirectUrl": self.config.redirect_url,
            "ipnUrl": self.config.ipn_url,
            "extraData": "",
            "requestType": REQUEST_TYPE,
            "signature": signature,
            "lang": "vi",
        });

        tracing::info!(order_id = %request.order_id, amount = request.amount, "creating payment session");

        let response: CreateSessionResponse = self
            .client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
            .context("failed to reach payment gateway")?
            .json()
            .await
            .context("invalid payment gateway response")?;

        if response.result_code == 0 {
            let pay_url = response
                .pay_url
                .context("gateway accepted the session but returned no payUrl")?;
            Ok(PaymentSession {
                pay_url,
                qr_code_url: response.qr_code_url,
                deeplink: response.deeplink,
            })
        } else {
            anyhow::bail!(
                "{}",
                response
                    .message
                    .unwrap_or_else(|| "payment session creation failed".to_string())
            )
        }
    }

    fn verify_callback(&self, callback: &GatewayCallback) -> bool {
        let raw = callback_raw_signature(&self.config.access_key, callback);
        verify_signature(&self.config.secret_key, &raw, &callback.signature)
    }

    async fn refund(&self, booking: &Booking, refund_amount: i64) -> RefundOutcome {
        let trans_id = match &booking.momo_trans_id {
            Some(id) => id.clone(),
            None => return RefundOutcome::failure("missing gateway transaction reference"),
        };

        let order_id = booking.id.clone();
        let request_id = format!("REFUND_{}_{}", order_id, Utc::now().timestamp_millis());
        let description = format!("Hoan tien dat tour - Booking ID: {order_id}");

        let raw = refund_raw_signature(
            &self.config,
            &request_id,
            &order_id,
            &trans_id,
            refund_amount,
            &description,
        );
        let signature = match sign(&self.config.secret_key, &raw) {
            Ok(s) => s,
            Err(e) => return RefundOutcome::failure(e.to_string()),
        };

        let body = serde_json::json!({
            "partnerCode": self.config.partner_code,
            "accessKey": self.config.access_key,
            "requestId": request_id,
            "amount": refund_amount,
            "orderId": order_id,
            "transId": trans_id,
            "description": description,
            "signature": signature,
            "lang": "vi",
        });

        tracing::info!(booking_id = %booking.id, amount = refund_amount, "requesting refund");

        let response = match self
            .client
            .post(&self.config.refund_endpoint)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, booking_id = %booking.id, "refund request failed to reach gateway");
                return RefundOutcome::failure(format!("gateway unreachable: {e}"));
            }
        };

        let parsed: RefundResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return RefundOutcome::failure(format!("invalid refund response: {e}")),
        };

        if parsed.result_code == 0 {
            RefundOutcome {
                success: true,
                trans_id: parsed.trans_id.map(|v| v.to_string()),
                error: None,
            }
        } else {
            RefundOutcome::failure(
                parsed
                    .message
                    .unwrap_or_else(|| "refund rejected by gateway".to_string()),
            )
        }
    }
}
