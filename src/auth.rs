use crate::schemas::UserId;
use actix_web::{http::header::HeaderValue, HttpRequest};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::num::ParseIntError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq)]
pub enum AuthorizationLevel {
    /// The back office process, allowed to close transactions administratively.
    Service,
    User(UserId),
}

#[derive(Clone, Debug)]
pub struct AuthKeys {
    pub service_token: String,
    pub signing_secret: String,
}

/// User tokens look like `<user_id>:<hex hmac of user_id>`.
pub fn check_authorization_level(
    request: &HttpRequest,
    keys: &AuthKeys,
) -> Option<AuthorizationLevel> {
    let authorization = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)?
        .ok()?;
    let authorization = authorization
        .strip_prefix("Bearer ")
        .unwrap_or(authorization);
    if authorization == keys.service_token {
        return Some(AuthorizationLevel::Service);
    }
    let (user_id, hash) = authorization.rsplit_once(':')?;
    if user_id.is_empty() {
        return None;
    }
    let hash = hash
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|n| u8::from_str_radix(&String::from_iter(n), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .ok()?;
    hasher(user_id, &keys.signing_secret)
        .verify_slice(&hash)
        .ok()
        .map(|_| AuthorizationLevel::User(user_id.to_string()))
}

/// Token a client presents to act as `user_id`.
pub fn sign_user_token(user_id: &str, signing_secret: &str) -> String {
    let mac = hasher(user_id, signing_secret).finalize().into_bytes();
    let hex = mac.iter().map(|b| format!("{b:02x}")).collect::<String>();
    format!("{user_id}:{hex}")
}

fn hasher(user_id: &str, signing_secret: &str) -> HmacSha256 {
    let mut sha256_hasher = Sha256::new();
    sha256_hasher.update(signing_secret.as_bytes());
    let secret_hash = sha256_hasher.finalize();

    // HMAC accepts keys of any length, so this cannot fail.
    let mut hmac_hasher = <HmacSha256 as Mac>::new_from_slice(&secret_hash)
        .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
    hmac_hasher.update(user_id.as_bytes());
    hmac_hasher
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn keys() -> AuthKeys {
        AuthKeys {
            service_token: "svc-token".to_string(),
            signing_secret: "s3cret".to_string(),
        }
    }

    fn level(header: &str) -> Option<AuthorizationLevel> {
        let request = TestRequest::default()
            .insert_header(("Authorization", header))
            .to_http_request();
        check_authorization_level(&request, &keys())
    }

    #[test]
    fn service_token() {
        assert_eq!(level("svc-token"), Some(AuthorizationLevel::Service));
        assert_eq!(level("Bearer svc-token"), Some(AuthorizationLevel::Service));
    }

    #[test]
    fn signed_user_token() {
        let token = sign_user_token("ann", "s3cret");
        assert_eq!(level(&token), Some(AuthorizationLevel::User("ann".to_string())));
    }

    #[test]
    fn tampered_or_foreign_tokens_are_rejected() {
        let token = sign_user_token("ann", "s3cret");
        let forged = token.replacen("ann", "bob", 1);
        assert_eq!(level(&forged), None);
        assert_eq!(level(&sign_user_token("ann", "other")), None);
        assert_eq!(level("ann:zz"), None);
        assert_eq!(level("garbage"), None);
    }

    #[test]
    fn missing_header() {
        let request = TestRequest::default().to_http_request();
        assert_eq!(check_authorization_level(&request, &keys()), None);
    }
}
