//! Callback signature: `lowercase_hex(SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

pub fn sign(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison against the payload's signature.
pub fn verify(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature_key: &str,
) -> bool {
    let expected = sign(order_id, status_code, gross_amount, server_key);
    let provided = signature_key.trim().to_ascii_lowercase();
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_is_lowercase_sha512_hex() {
        let sig = sign("order-1", "200", "63000000.00", "server-key");
        assert_eq!(sig.len(), 128);
        assert!(sig.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn test_known_vector() {
        // SHA-512 of the empty concatenation.
        assert_eq!(
            sign("", "", "", ""),
            "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce\
             47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e"
        );
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let sig = sign("order-1", "200", "63000000.00", "server-key");
        assert!(verify("order-1", "200", "63000000.00", "server-key", &sig));
        assert!(verify("order-1", "200", "63000000.00", "server-key", &sig.to_uppercase()));
        assert!(!verify("order-1", "200", "1.00", "server-key", &sig));
        assert!(!verify("order-1", "200", "63000000.00", "other-key", &sig));
        assert!(!verify("order-1", "200", "63000000.00", "server-key", ""));
    }
}
