use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
}

/// Everything the payment gateway adapter needs, resolved once at startup and
/// handed to the adapter at construction. No field changes after that.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub partner_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub refund_endpoint: String,
    pub redirect_url: String,
    pub ipn_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "tourbook.db".to_string()),
            gateway: GatewayConfig::from_env(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            partner_code: env::var("MOMO_PARTNER_CODE").unwrap_or_default(),
            access_key: env::var("MOMO_ACCESS_KEY").unwrap_or_default(),
            secret_key: env::var("MOMO_SECRET_KEY").unwrap_or_default(),
            endpoint: env::var("MOMO_ENDPOINT").unwrap_or_else(|_| {
                "https://test-payment.momo.vn/v2/gateway/api/create".to_string()
            }),
            refund_endpoint: env::var("MOMO_REFUND_ENDPOINT").unwrap_or_else(|_| {
                "https://test-payment.momo.vn/v2/gateway/api/refund".to_string()
            }),
            redirect_url: env::var("MOMO_REDIRECT_URL").unwrap_or_default(),
            ipn_url: env::var("MOMO_IPN_URL").unwrap_or_default(),
        }
    }
}
