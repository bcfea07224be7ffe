//! Middleware to parse an optional `x-token` header into request-scoped claims.
use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{constants::api::TOKEN_HEADER, state::AppState, utils::httperror::HttpError};

#[derive(Debug, Clone, Default, PartialEq)]
/// Claims of a verified token. Lives in the request extensions for one request only.
pub struct Claims(pub Map<String, Value>);

#[derive(Clone)]
/// Verifies HS256 tokens against the shared secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
    strict: bool,
}

impl TokenVerifier {
    pub fn new(secret: &str, strict: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Only the signature matters. `exp` is still checked when a token carries it.
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            strict,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Map<String, Value>>(token, &self.key, &self.validation).map(|data| Claims(data.claims))
    }

    /// Whether an invalid token halts the request.
    pub const fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Attach [`Claims`] for a valid token. Requests without a token pass through untouched.
pub async fn token_parser(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let verified = match req.headers().get(TOKEN_HEADER).map(HeaderValue::to_str) {
        None | Some(Ok("")) => return Ok(next.run(req).await),
        Some(Ok(token)) => state.tokens.verify(token).map_err(|err| err.to_string()),
        Some(Err(_)) => Err("Token contains non-ASCII characters".to_owned()),
    };
    match verified {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
        }
        Err(reason) if state.tokens.is_strict() => {
            warn!(%reason, "rejecting request with invalid token");
            return Err(HttpError::new(StatusCode::BAD_REQUEST, Some(reason)));
        }
        Err(reason) => debug!(%reason, "ignoring invalid token"),
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(claims: &Value, secret: &str) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn verifies_tokens_signed_with_the_secret() {
        let verifier = TokenVerifier::new("secret", true);
        let claims = verifier.verify(&token(&json!({"uid": "107"}), "secret")).unwrap();
        assert_eq!(claims.0["uid"], "107");
    }

    #[test]
    fn accepts_every_hmac_algorithm() {
        let verifier = TokenVerifier::new("secret", true);
        for algorithm in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
            let token = encode(
                &Header::new(algorithm),
                &json!({"uid": "107"}),
                &EncodingKey::from_secret(b"secret"),
            )
            .unwrap();
            let claims = verifier.verify(&token).unwrap();
            assert_eq!(claims.0["uid"], "107", "algorithm {algorithm:?}");
        }
    }

    #[test]
    fn audience_is_not_checked() {
        let verifier = TokenVerifier::new("secret", true);
        let claims = verifier
            .verify(&token(&json!({"uid": "107", "aud": "media"}), "secret"))
            .unwrap();
        assert_eq!(claims.0["aud"], "media");
    }

    #[test]
    fn rejects_foreign_or_expired_tokens() {
        let verifier = TokenVerifier::new("secret", false);
        assert!(verifier.verify(&token(&json!({"uid": "107"}), "other")).is_err());
        assert!(verifier.verify(&token(&json!({"exp": 1_000}), "secret")).is_err());
        assert!(verifier.verify("not.a.token").is_err());
        assert!(!verifier.is_strict());
    }
}
