//! JWT-backed provider. Grounded in `identity_server::oauth`'s use of `jsonwebtoken`
//! for validating externally-issued id tokens, generalized into a provider that
//! validates a configurable issuer/audience pair and maps claims to roles/permissions.

use std::collections::HashSet;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use live_common::UserId;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::{Authenticated, AuthContext};
use crate::provider::AuthProvider;

#[derive(Debug, Deserialize)]
struct Claims {
	sub: String,
	#[serde(default)]
	roles: Vec<String>,
	#[serde(default)]
	permissions: Vec<String>,
	iat: u64,
}

pub struct JwtProvider {
	decoding_key: DecodingKey,
	validation: Validation,
}

impl JwtProvider {
	pub fn new_hs256(secret: &[u8], issuer: &str, audience: &str) -> Self {
		let mut validation = Validation::new(Algorithm::HS256);
		validation.set_issuer(&[issuer]);
		validation.set_audience(&[audience]);
		Self {
			decoding_key: DecodingKey::from_secret(secret),
			validation,
		}
	}
}

#[async_trait]
impl AuthProvider for JwtProvider {
	fn name(&self) -> &str {
		"jwt"
	}

	async fn authenticate(&self, credentials: &Value) -> Option<AuthContext> {
		let token = credentials.get("token")?.as_str()?;
		let data = match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
		{
			Ok(data) => data,
			Err(err) => {
				debug!(?err, "jwt validation failed");
				return None;
			}
		};
		let user_id: UserId = data.claims.sub.parse().ok()?;
		Some(AuthContext::Authenticated(Authenticated {
			user_id,
			roles: data.claims.roles.into_iter().collect::<HashSet<_>>(),
			permissions: data.claims.permissions.into_iter().collect::<HashSet<_>>(),
			issued_at_ms: data.claims.iat * 1000,
			provider: None,
		}))
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use jsonwebtoken::{encode, EncodingKey, Header};

	#[derive(serde::Serialize)]
	struct TestClaims<'a> {
		sub: String,
		roles: Vec<String>,
		permissions: Vec<String>,
		iat: u64,
		iss: &'a str,
		aud: &'a str,
	}

	#[tokio::test]
	async fn valid_token_authenticates() {
		let secret = b"test-secret";
		let provider = JwtProvider::new_hs256(secret, "issuer", "audience");
		let user_id = UserId::random();
		let claims = TestClaims {
			sub: user_id.to_string(),
			roles: vec!["admin".into()],
			permissions: vec![],
			iat: 0,
			iss: "issuer",
			aud: "audience",
		};
		let token = encode(&Header::new(jsonwebtoken::Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap();
		let ctx = provider
			.authenticate(&serde_json::json!({"token": token}))
			.await
			.unwrap();
		assert!(ctx.has_role("admin"));
	}

	#[tokio::test]
	async fn token_with_wrong_audience_is_rejected() {
		let secret = b"test-secret";
		let provider = JwtProvider::new_hs256(secret, "issuer", "audience");
		let claims = TestClaims {
			sub: UserId::random().to_string(),
			roles: vec![],
			permissions: vec![],
			iat: 0,
			iss: "issuer",
			aud: "someone-else",
		};
		let token = encode(&Header::new(jsonwebtoken::Algorithm::HS256), &claims, &EncodingKey::from_secret(secret)).unwrap();
		assert!(provider
			.authenticate(&serde_json::json!({"token": token}))
			.await
			.is_none());
	}
}
