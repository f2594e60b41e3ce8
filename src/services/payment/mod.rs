pub mod momo;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::GatewayConfig;
use crate::models::Booking;

pub const REQUEST_TYPE: &str = "captureWallet";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: i64,
    pub order_info: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub pay_url: String,
    pub qr_code_url: Option<String>,
    pub deeplink: Option<String>,
}

/// Full payload of the gateway's return/IPN callback, including the signature
/// it carries over its own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayCallback {
    pub partner_code: String,
    pub order_id: String,
    pub request_id: String,
    pub amount: i64,
    pub order_info: String,
    pub order_type: String,
    pub trans_id: i64,
    pub result_code: i64,
    pub message: String,
    pub pay_type: String,
    pub response_time: i64,
    pub extra_data: String,
    pub signature: String,
}

/// Refund result as a value: the gateway declining a refund is a business
/// outcome the caller records, not an error that unwinds the cancellation.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub success: bool,
    pub trans_id: Option<String>,
    pub error: Option<String>,
}

impl RefundOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            trans_id: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> anyhow::Result<PaymentSession>;

    fn verify_callback(&self, callback: &GatewayCallback) -> bool;

    async fn refund(&self, booking: &Booking, refund_amount: i64) -> RefundOutcome;
}

// ── Canonicalization & signing ──
//
// The gateway signs `key=value` pairs joined by `&` in a fixed alphabetical
// order per operation. The three field sets below must match the gateway's
// byte for byte or verification fails.

pub fn creation_raw_signature(
    config: &GatewayConfig,
    request_id: &str,
    request: &PaymentRequest,
) -> String {
    format!(
        "accessKey={}&amount={}&extraData=&ipnUrl={}&orderId={}&orderInfo={}&partnerCode={}&redirectUrl={}&requestId={}&requestType={}",
        config.access_key,
        request.amount,
        config.ipn_url,
        request.order_id,
        request.order_info,
        config.partner_code,
        config.redirect_url,
        request_id,
        REQUEST_TYPE,
    )
}

pub fn callback_raw_signature(access_key: &str, cb: &GatewayCallback) -> String {
    format!(
        "accessKey={}&amount={}&extraData={}&message={}&orderId={}&orderInfo={}&orderType={}&partnerCode={}&payType={}&requestId={}&responseTime={}&resultCode={}&transId={}",
        access_key,
        cb.amount,
        cb.extra_data,
        cb.message,
        cb.order_id,
        cb.order_info,
        cb.order_type,
        cb.partner_code,
        cb.pay_type,
        cb.request_id,
        cb.response_time,
        cb.result_code,
        cb.trans_id,
    )
}

pub fn refund_raw_signature(
    config: &GatewayConfig,
    request_id: &str,
    order_id: &str,
    trans_id: &str,
    amount: i64,
    description: &str,
) -> String {
    format!(
        "accessKey={}&amount={}&description={}&orderId={}&partnerCode={}&requestId={}&transId={}",
        config.access_key, amount, description, order_id, config.partner_code, request_id, trans_id,
    )
}

pub fn sign(secret_key: &str, raw: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {e}"))?;
    mac.update(raw.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex-encoded signature against the recomputed MAC.
pub fn verify_signature(secret_key: &str, raw: &str, signature_hex: &str) -> bool {
    let supplied = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(raw.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}
