use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(mac)
}

/// Hex HMAC-SHA256 of `order_id|payment_id`.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    mac(secret, order_id, payment_id)
        .map(|m| hex::encode(m.finalize().into_bytes()))
        .unwrap_or_default()
}

pub fn verify(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    match mac(secret, order_id, payment_id) {
        Some(m) => m.verify_slice(&expected).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_vector() {
        let sig = sign("secret", "order_1", "pay_1");
        assert_eq!(
            sig,
            "52115a0d3400de9e86aade1f1b6eba9e8974604f4e267a9e9a16633a4c8dd2cb"
        );
        assert!(verify("secret", "order_1", "pay_1", &sig));
    }

    #[test]
    fn rejects_tampering() {
        let sig = sign("secret", "order_1", "pay_1");
        assert!(!verify("secret", "order_1", "pay_2", &sig));
        assert!(!verify("other", "order_1", "pay_1", &sig));
        assert!(!verify("secret", "order_1", "pay_1", "not-hex"));
    }
}
