//! Auth context and capability predicates.

use std::collections::HashSet;

use live_common::UserId;

#[derive(Debug, Clone)]
pub enum AuthContext {
	Anonymous,
	Authenticated(Authenticated),
}

#[derive(Debug, Clone)]
pub struct Authenticated {
	pub user_id: UserId,
	pub roles: HashSet<String>,
	pub permissions: HashSet<String>,
	pub issued_at_ms: u64,
	/// Name of the provider that authenticated this session, set by `AuthGate`
	/// after a provider's `authenticate` succeeds.
	pub provider: Option<String>,
}

impl AuthContext {
	pub fn is_authenticated(&self) -> bool {
		!matches!(self, Self::Anonymous)
	}

	pub fn user_id(&self) -> Option<UserId> {
		match self {
			Self::Anonymous => None,
			Self::Authenticated(a) => Some(a.user_id),
		}
	}

	/// Name of the provider that authenticated this session, if any.
	pub fn provider_name(&self) -> Option<&str> {
		match self {
			Self::Anonymous => None,
			Self::Authenticated(a) => a.provider.as_deref(),
		}
	}

	/// Stamps the provider name onto an authenticated context. No-op on `Anonymous`.
	pub fn with_provider(mut self, name: &str) -> Self {
		if let Self::Authenticated(a) = &mut self {
			a.provider = Some(name.to_string());
		}
		self
	}

	pub fn has_role(&self, role: &str) -> bool {
		match self {
			Self::Anonymous => false,
			Self::Authenticated(a) => a.roles.contains(role),
		}
	}

	pub fn has_any_role(&self, roles: &[String]) -> bool {
		roles.iter().any(|r| self.has_role(r))
	}

	pub fn has_all_roles(&self, roles: &[String]) -> bool {
		roles.iter().all(|r| self.has_role(r))
	}

	pub fn has_permission(&self, permission: &str) -> bool {
		match self {
			Self::Anonymous => false,
			Self::Authenticated(a) => a.permissions.contains(permission),
		}
	}

	pub fn has_any_permission(&self, permissions: &[String]) -> bool {
		permissions.iter().any(|p| self.has_permission(p))
	}

	pub fn has_all_permissions(&self, permissions: &[String]) -> bool {
		permissions.iter().all(|p| self.has_permission(p))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn authed(roles: &[&str], perms: &[&str]) -> AuthContext {
		AuthContext::Authenticated(Authenticated {
			user_id: UserId::random(),
			roles: roles.iter().map(|s| s.to_string()).collect(),
			permissions: perms.iter().map(|s| s.to_string()).collect(),
			issued_at_ms: 0,
			provider: None,
		})
	}

	#[test]
	fn anonymous_fails_every_capability_check() {
		let ctx = AuthContext::Anonymous;
		assert!(!ctx.has_role("admin"));
		assert!(!ctx.has_any_role(&["admin".into()]));
		assert!(!ctx.has_all_roles(&["anything".into()]));
		assert!(!ctx.has_permission("write"));
	}

	#[test]
	fn any_role_is_or_matched() {
		let ctx = authed(&["user"], &[]);
		assert!(ctx.has_any_role(&["admin".into(), "user".into()]));
		assert!(!ctx.has_any_role(&["admin".into()]));
	}

	#[test]
	fn all_permissions_is_and_matched() {
		let ctx = authed(&[], &["read", "write"]);
		assert!(ctx.has_all_permissions(&["read".into(), "write".into()]));
		assert!(!ctx.has_all_permissions(&["read".into(), "delete".into()]));
	}
}
