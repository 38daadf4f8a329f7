use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, order_id: &str, payment_id: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| AppError::Internal(format!("invalid signing key: {err}")))?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

/// Lowercase hex HMAC-SHA256 of `"{order_id}|{payment_id}"`.
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> Result<String, AppError> {
    let mac = mac_for(secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Exact match against the full lowercase digest. Case, length and any
/// other difference all fail. The digest comparison runs in constant time.
pub fn verify(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<bool, AppError> {
    if !signature
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Ok(false);
    }

    let Ok(supplied) = hex::decode(signature) else {
        return Ok(false);
    };

    let mac = mac_for(secret, order_id, payment_id)?;
    Ok(mac.verify_slice(&supplied).is_ok())
}
