//! The auth gate itself: authenticate, then authorize mount/action/room.

use serde_json::Value;
use tracing::instrument;

use crate::context::AuthContext;
use crate::provider::AuthProvider;
use crate::rules::{ActionRule, ComponentAuthRules, MountRule};

#[derive(Debug, Clone)]
pub struct AuthDecision {
	pub allowed: bool,
	pub reason: String,
}

impl AuthDecision {
	fn allow() -> Self {
		Self {
			allowed: true,
			reason: String::new(),
		}
	}

	fn deny(reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			reason: reason.into(),
		}
	}
}

pub struct AuthGate {
	providers: Vec<Box<dyn AuthProvider>>,
	default_provider: Option<usize>,
}

impl AuthGate {
	pub fn new() -> Self {
		Self {
			providers: Vec::new(),
			default_provider: None,
		}
	}

	pub fn with_provider(mut self, provider: Box<dyn AuthProvider>, is_default: bool) -> Self {
		if is_default {
			self.default_provider = Some(self.providers.len());
		}
		self.providers.push(provider);
		self
	}

	/// Authenticates `credentials`, trying only `provider_name` if given, otherwise
	/// the default provider first then the rest in registration order. The first
	/// provider to return an authenticated context wins.
	#[instrument(skip(self, credentials))]
	pub async fn authenticate(
		&self,
		credentials: Option<&Value>,
		provider_name: Option<&str>,
	) -> AuthContext {
		let Some(credentials) = credentials else {
			return AuthContext::Anonymous;
		};

		if let Some(name) = provider_name {
			let Some(provider) = self.providers.iter().find(|p| p.name() == name) else {
				return AuthContext::Anonymous;
			};
			return provider
				.authenticate(credentials)
				.await
				.map(|ctx| ctx.with_provider(provider.name()))
				.unwrap_or(AuthContext::Anonymous);
		}

		let ordered = self.ordered_providers();
		for provider in ordered {
			if let Some(ctx) = provider.authenticate(credentials).await {
				return ctx.with_provider(provider.name());
			}
		}
		AuthContext::Anonymous
	}

	fn ordered_providers(&self) -> Vec<&dyn AuthProvider> {
		let mut ordered: Vec<&dyn AuthProvider> = Vec::with_capacity(self.providers.len());
		if let Some(default_idx) = self.default_provider {
			ordered.push(self.providers[default_idx].as_ref());
		}
		for (idx, provider) in self.providers.iter().enumerate() {
			if Some(idx) != self.default_provider {
				ordered.push(provider.as_ref());
			}
		}
		ordered
	}

	/// Authorize component mount.
	pub fn authorize_mount(&self, ctx: &AuthContext, rule: &MountRule) -> AuthDecision {
		if rule.required && !ctx.is_authenticated() {
			return AuthDecision::deny("AUTH_DENIED: authentication required");
		}
		if !rule.roles.is_empty() && !ctx.has_any_role(&rule.roles) {
			return AuthDecision::deny("AUTH_DENIED: insufficient roles");
		}
		if !rule.permissions.is_empty() && !ctx.has_all_permissions(&rule.permissions) {
			return AuthDecision::deny("AUTH_DENIED: insufficient permissions");
		}
		AuthDecision::allow()
	}

	/// Authorize action call: the declarative rule, then the resolving
	/// provider's `authorize_action` hook if it implements one.
	pub async fn authorize_action(
		&self,
		ctx: &AuthContext,
		component_name: &str,
		action: &str,
		rule: Option<&ActionRule>,
		provider_name: Option<&str>,
	) -> AuthDecision {
		if let Some(rule) = rule {
			if !rule.roles.is_empty() && !ctx.has_any_role(&rule.roles) {
				return AuthDecision::deny("AUTH_DENIED: insufficient roles");
			}
			if !rule.permissions.is_empty() && !ctx.has_all_permissions(&rule.permissions) {
				return AuthDecision::deny("AUTH_DENIED: insufficient permissions");
			}
		}

		let resolved_name = provider_name.or_else(|| ctx.provider_name());
		let provider = match resolved_name {
			Some(name) => self.providers.iter().find(|p| p.name() == name),
			None => self.default_provider.map(|i| &self.providers[i]),
		};
		if let Some(provider) = provider {
			if let Some(false) = provider.authorize_action(ctx, component_name, action).await {
				return AuthDecision::deny("AUTH_DENIED: provider denied action");
			}
		}

		AuthDecision::allow()
	}

	/// Authorize room join: absent handler = allowed.
	pub async fn authorize_room(&self, ctx: &AuthContext, room_id: &str) -> AuthDecision {
		for provider in &self.providers {
			if let Some(false) = provider.authorize_room(ctx, room_id).await {
				return AuthDecision::deny("AUTH_DENIED: provider denied room join");
			}
		}
		AuthDecision::allow()
	}
}

impl Default for AuthGate {
	fn default() -> Self {
		Self::new()
	}
}

pub fn mount_rule_of(rules: Option<&ComponentAuthRules>) -> MountRule {
	rules.map(|r| r.mount.clone()).unwrap_or_default()
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::provider::StaticTokenProvider;
	use std::collections::HashSet;

	#[tokio::test]
	async fn no_credentials_is_anonymous() {
		let gate = AuthGate::new();
		let ctx = gate.authenticate(None, None).await;
		assert!(!ctx.is_authenticated());
	}

	#[tokio::test]
	async fn denies_mount_when_required_and_anonymous() {
		let gate = AuthGate::new();
		let ctx = gate.authenticate(None, None).await;
		let rule = MountRule {
			required: true,
			roles: vec!["admin".into()],
			permissions: vec![],
		};
		let decision = gate.authorize_mount(&ctx, &rule);
		assert!(!decision.allowed);
		assert!(decision.reason.contains("AUTH_DENIED"));
	}

	#[tokio::test]
	async fn denies_mount_when_role_insufficient() {
		use live_common::UserId;
		let gate = AuthGate::new();
		let ctx = crate::context::AuthContext::Authenticated(crate::context::Authenticated {
			user_id: UserId::random(),
			roles: ["user".to_string()].into_iter().collect::<HashSet<_>>(),
			permissions: HashSet::new(),
			issued_at_ms: 0,
			provider: None,
		});
		let rule = MountRule {
			required: true,
			roles: vec!["admin".into()],
			permissions: vec![],
		};
		let decision = gate.authorize_mount(&ctx, &rule);
		assert!(!decision.allowed);
	}

	#[tokio::test]
	async fn non_default_providers_action_hook_fires_for_sessions_it_authenticated() {
		use crate::context::Authenticated;
		use crate::provider::StaticTokenEntry;
		use async_trait::async_trait;
		use live_common::UserId;
		use serde_json::Value;

		struct DenyingProvider;

		#[async_trait]
		impl AuthProvider for DenyingProvider {
			fn name(&self) -> &str {
				"denying"
			}

			async fn authenticate(&self, credentials: &Value) -> Option<AuthContext> {
				(credentials.get("token")?.as_str()? == "x").then(|| {
					AuthContext::Authenticated(Authenticated {
						user_id: UserId::random(),
						roles: HashSet::new(),
						permissions: HashSet::new(),
						issued_at_ms: 0,
						provider: None,
					})
				})
			}

			async fn authorize_action(
				&self,
				_ctx: &AuthContext,
				_component_name: &str,
				_action: &str,
			) -> Option<bool> {
				Some(false)
			}
		}

		let default_provider = StaticTokenProvider::new().with_token(
			"d",
			StaticTokenEntry {
				user_id: UserId::random(),
				roles: HashSet::new(),
				permissions: HashSet::new(),
			},
		);
		let gate = AuthGate::new()
			.with_provider(Box::new(default_provider), true)
			.with_provider(Box::new(DenyingProvider), false);

		let ctx = gate
			.authenticate(Some(&serde_json::json!({"token": "x"})), Some("denying"))
			.await;
		assert_eq!(ctx.provider_name(), Some("denying"));

		let decision = gate.authorize_action(&ctx, "Counter", "increment", None, None).await;
		assert!(
			!decision.allowed,
			"the provider that authenticated this session should have been consulted, not the default"
		);
	}

	#[tokio::test]
	async fn default_provider_is_tried_first() {
		use crate::provider::StaticTokenEntry;
		use live_common::UserId;
		let default_provider = StaticTokenProvider::new().with_token(
			"d",
			StaticTokenEntry {
				user_id: UserId::random(),
				roles: HashSet::new(),
				permissions: HashSet::new(),
			},
		);
		let gate = AuthGate::new().with_provider(Box::new(default_provider), true);
		let ctx = gate
			.authenticate(Some(&serde_json::json!({"token": "d"})), None)
			.await;
		assert!(ctx.is_authenticated());
	}
}
