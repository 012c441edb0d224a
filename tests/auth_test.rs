///! Integration test for JWT auth validation.
///!
///! Tokens are minted with the same HS256 secret the server would use and then
///! validated through `validate_token`. No running server or database is needed.
///!
///! Run with: `cargo test --test auth_test`
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use uuid::Uuid;

use agrimarket_backend::auth::jwt::{Claims, issue_token, validate_token};

/// A fake secret for testing; never use the real one in tests committed to git.
const TEST_SECRET: &str = "test-secret-at-least-256-bits-long-for-hs256-xxxxxxx";

fn encode_claims(claims: &Claims) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("Failed to encode test JWT")
}

#[test]
fn test_issued_token_decodes_correctly() {
    let user_id = Uuid::new_v4();
    let token = issue_token(user_id, "siti@agri.test", "farmer", TEST_SECRET, 24)
        .expect("Token should be issued");

    let claims = validate_token(&token, TEST_SECRET).expect("Token should be valid");

    assert_eq!(claims.sub, user_id.to_string());
    assert_eq!(claims.email.as_deref(), Some("siti@agri.test"));
    assert_eq!(claims.role.as_deref(), Some("farmer"));
    assert_eq!(claims.user_id().unwrap(), user_id);

    let now = Utc::now().timestamp() as usize;
    assert!(claims.exp > now + 23 * 3600);
    assert!(claims.iat.unwrap() <= now);
}

#[test]
fn test_expired_token_is_rejected() {
    let now = Utc::now().timestamp() as usize;

    let token = encode_claims(&Claims {
        sub: Uuid::new_v4().to_string(),
        exp: now - 300, // expired 5 minutes ago (well past the 60s default leeway)
        iat: Some(now - 3600),
        email: Some("expired@agri.test".to_string()),
        role: None,
    });

    let result = validate_token(&token, TEST_SECRET);
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("ExpiredSignature"));
}

#[test]
fn test_wrong_secret_is_rejected() {
    let token = issue_token(Uuid::new_v4(), "bob@agri.test", "worker", TEST_SECRET, 1).unwrap();

    let result = validate_token(&token, "completely-wrong-secret-xxxxxxxxxxxxxxxxxxx");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("InvalidSignature"));
}

#[test]
fn test_garbage_token_is_rejected() {
    let result = validate_token("not.a.valid.jwt", TEST_SECRET);
    assert!(result.is_err());
}

#[test]
fn test_non_uuid_subject_is_rejected() {
    let now = Utc::now().timestamp() as usize;

    let token = encode_claims(&Claims {
        sub: "user-42".to_string(),
        exp: now + 3600,
        iat: Some(now),
        email: None,
        role: None,
    });

    // The signature is fine; the subject is not a user id.
    let claims = validate_token(&token, TEST_SECRET).expect("Token should be valid");
    assert!(claims.user_id().is_err());
}
