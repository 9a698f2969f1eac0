use async_trait::async_trait;
use serde_json::json;

use crate::config::RazorpayConfig;

use super::{GatewayOrder, GatewayOrderRequest, PaymentGateway, signature};

#[derive(Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    config: RazorpayConfig,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> anyhow::Result<GatewayOrder> {
        let url = format!("{}/orders", self.config.api_base.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&json!({
                "amount": request.amount,
                "currency": request.currency,
                "receipt": request.receipt,
                "notes": request.notes,
                "payment_capture": 1,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("razorpay order creation failed ({status}): {body}");
        }

        let order = response.json::<GatewayOrder>().await?;
        tracing::debug!(
            gateway_order_id = %order.id,
            amount = order.amount,
            "razorpay order created"
        );
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, sig: &str) -> bool {
        signature::verify(&self.config.key_secret, order_id, payment_id, sig)
    }
}
