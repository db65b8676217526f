//! HMAC-SHA256 payload signatures.
//!
//! The signature covers only the event payload, never the delivery envelope,
//! so it stays identical across retries of the same dispatch.

use hmac::{Hmac, Mac, digest::InvalidLength};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Canonical encoding of a payload: compact JSON with object keys sorted at
/// every depth.
pub fn canonical_json(payload: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(payload, &mut out);
    out.into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Lowercase hex HMAC-SHA256 of the canonical payload, keyed by `secret`.
pub fn sign(payload: &Value, secret: &str) -> Result<String, InvalidLength> {
    sign_bytes(&canonical_json(payload), secret)
}

pub fn sign_bytes(body: &[u8], secret: &str) -> Result<String, InvalidLength> {
    mac_bytes(body, secret).map(hex::encode)
}

/// Check a hex signature against `body` in constant time.
pub fn verify(body: &[u8], secret: &str, signature_hex: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(expected) = mac_bytes(body, secret) else {
        return false;
    };
    expected.as_slice().ct_eq(provided.as_slice()).into()
}

fn mac_bytes(body: &[u8], secret: &str) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}
