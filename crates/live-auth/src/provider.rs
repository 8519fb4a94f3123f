//! Provider contract plus two concrete providers.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::AuthContext;

/// A pluggable authentication source. Exceptions inside a provider must never
/// propagate to the gate — callers are expected to catch panics or,
/// preferably, never panic and return `None` instead.
#[async_trait]
pub trait AuthProvider: Send + Sync {
	fn name(&self) -> &str;

	async fn authenticate(&self, credentials: &Value) -> Option<AuthContext>;

	/// Optional extra authorization hook consulted after the declarative action
	/// rule has already passed.
	async fn authorize_action(
		&self,
		_ctx: &AuthContext,
		_component_name: &str,
		_action: &str,
	) -> Option<bool> {
		None
	}

	/// Optional extra authorization hook for room joins. Absent handler = allowed
	///.
	async fn authorize_room(&self, _ctx: &AuthContext, _room_id: &str) -> Option<bool> {
		None
	}
}

mod jwt;
mod static_token;

pub use jwt::JwtProvider;
pub use static_token::{StaticTokenEntry, StaticTokenProvider};
