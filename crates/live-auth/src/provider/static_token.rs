//! A bearer-token provider backed by an in-memory lookup table. Useful for tests
//! and small deployments that don't need a full JWT/OAuth provider.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use live_common::UserId;
use serde_json::Value;

use crate::context::{Authenticated, AuthContext};
use crate::provider::AuthProvider;

#[derive(Debug, Clone)]
pub struct StaticTokenEntry {
	pub user_id: UserId,
	pub roles: HashSet<String>,
	pub permissions: HashSet<String>,
}

#[derive(Default)]
pub struct StaticTokenProvider {
	tokens: HashMap<String, StaticTokenEntry>,
}

impl StaticTokenProvider {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_token(mut self, token: impl Into<String>, entry: StaticTokenEntry) -> Self {
		self.tokens.insert(token.into(), entry);
		self
	}
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
	fn name(&self) -> &str {
		"static_token"
	}

	async fn authenticate(&self, credentials: &Value) -> Option<AuthContext> {
		let token = credentials.get("token")?.as_str()?;
		let entry = self.tokens.get(token)?;
		Some(AuthContext::Authenticated(Authenticated {
			user_id: entry.user_id,
			roles: entry.roles.clone(),
			permissions: entry.permissions.clone(),
			issued_at_ms: live_common_now_ms(),
			provider: None,
		}))
	}
}

fn live_common_now_ms() -> u64 {
	use std::time::{SystemTime, UNIX_EPOCH};
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
mod test {
	use super::*;

	#[tokio::test]
	async fn unknown_token_authenticates_as_none() {
		let provider = StaticTokenProvider::new();
		let ctx = provider.authenticate(&serde_json::json!({"token": "nope"})).await;
		assert!(ctx.is_none());
	}

	#[tokio::test]
	async fn known_token_authenticates_with_roles() {
		let provider = StaticTokenProvider::new().with_token(
			"abc",
			StaticTokenEntry {
				user_id: UserId::random(),
				roles: ["admin".to_string()].into_iter().collect(),
				permissions: HashSet::new(),
			},
		);
		let ctx = provider
			.authenticate(&serde_json::json!({"token": "abc"}))
			.await
			.unwrap();
		assert!(ctx.has_role("admin"));
	}
}
