use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{GatewayOrder, GatewayOrderRequest, PaymentGateway, signature};

/// In-process gateway that signs with a local secret. Lets the payment flow run
/// end to end without network access.
#[derive(Debug)]
pub struct FakeGateway {
    key_id: String,
    secret: String,
    counter: AtomicU64,
}

impl FakeGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            key_id: "rzp_test_fake".into(),
            secret: secret.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Signature a real checkout would hand back for this order/payment pair.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        signature::sign(&self.secret, order_id, payment_id)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> anyhow::Result<GatewayOrder> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(GatewayOrder {
            id: format!("order_fake_{n}"),
            amount: request.amount,
            currency: request.currency.clone(),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, sig: &str) -> bool {
        signature::verify(&self.secret, order_id, payment_id, sig)
    }
}
