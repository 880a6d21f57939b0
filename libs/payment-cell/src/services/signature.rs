use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

fn signing_mac(secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256, PaymentError> {
    if secret.is_empty() {
        return Err(PaymentError::NotConfigured);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::NotConfigured)?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `"{order_id}|{payment_id}"`, the checkout callback signature.
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
    let digest = signing_mac(secret, order_id, payment_id)?.finalize().into_bytes();
    Ok(hex::encode(digest))
}

/// Constant-time check of a callback signature. Anything that is not valid
/// hex of the right length is a mismatch.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    let mac = signing_mac(secret, order_id, payment_id)?;
    let provided = hex::decode(signature.trim()).map_err(|_| PaymentError::SignatureMismatch)?;

    mac.verify_slice(&provided)
        .map_err(|_| PaymentError::SignatureMismatch)
}
