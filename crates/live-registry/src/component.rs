//! The `LiveComponent` contract and the observer components use to
//! push spontaneous room broadcasts without reaching back into a global
//! singleton.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use live_auth::AuthContext;
use live_common::RoomId;
use serde_json::Value;

/// A server-held, client-driven stateful object with a lifecycle and actions.
///
/// An explicit trait object rather than a runtime base class: a component
/// becomes discoverable by calling [`crate::ComponentRegistry::register`] with
/// a factory, not by inheriting from anything.
pub trait LiveComponent: Send + Sync {
	/// Dependency names that must be resolvable in the service container or mount
	/// fails.
	fn required_dependencies(&self) -> &[&'static str] {
		&[]
	}

	/// Dependency names injected if present, but mount does not fail without them.
	fn optional_dependencies(&self) -> &[&'static str] {
		&[]
	}

	/// Called once per declared dependency that resolved, the generalization of the
	/// source's `setX` setter convention.
	fn inject_service(&mut self, _name: &str, _service: Arc<dyn Any + Send + Sync>) {}

	/// Gives the component its room-broadcast closure.
	fn set_observer(&mut self, _observer: Arc<dyn ComponentObserver>) {}

	/// Gives the component the auth context it was mounted under.
	fn set_auth_context(&mut self, _ctx: AuthContext) {}

	/// Merges `props` into the component's initial state and returns it.
	fn mount(&mut self, props: Value) -> Value;

	/// Executes `action` against the current state, returning either the action's
	/// result value or a human-readable failure reason.
	fn execute_action(&mut self, action: &str, payload: Value) -> Result<Value, String>;

	/// The component's current state as a JSON value.
	fn state(&self) -> Value;

	/// Replaces the component's state wholesale, used by rehydration and migration.
	fn set_state(&mut self, state: Value);

	/// Called on unmount, after room subscriptions are torn down.
	fn destroy(&mut self) {}
}

/// The room-broadcast closure a mounted component is given. Lets a component push into its room from
/// inside `execute_action` without holding a reference to the room manager itself.
#[async_trait]
pub trait ComponentObserver: Send + Sync {
	async fn broadcast_room(&self, event: &str, data: Value);
}

/// An observer with nowhere to broadcast, used for components mounted outside a room.
pub struct NullObserver;

#[async_trait]
impl ComponentObserver for NullObserver {
	async fn broadcast_room(&self, _event: &str, _data: Value) {}
}

pub type ComponentFactory = Arc<dyn Fn() -> Box<dyn LiveComponent> + Send + Sync>;

#[allow(clippy::type_complexity)]
pub type ServiceFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// `X`, `XComponent`, and the capitalized forms of each are all tried on
/// lookup. There is no directory scan or dynamic module loading; variants are
/// generated purely from the requested name so `register("Counter", ...)`
/// resolves whether the client asks for `"Counter"`, `"CounterComponent"`, or
/// `"counter"`.
pub fn name_variants(requested: &str) -> Vec<String> {
	let mut variants = Vec::with_capacity(4);
	let mut push = |s: String| {
		if !variants.contains(&s) {
			variants.push(s);
		}
	};

	push(requested.to_string());

	let capitalized = capitalize(requested);
	push(capitalized.clone());

	if let Some(stripped) = requested.strip_suffix("Component") {
		push(stripped.to_string());
		push(capitalize(stripped));
	} else {
		push(format!("{requested}Component"));
		push(format!("{capitalized}Component"));
	}

	variants
}

fn capitalize(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn name_variants_include_component_suffix_forms() {
		let variants = name_variants("Counter");
		assert!(variants.contains(&"Counter".to_string()));
		assert!(variants.contains(&"CounterComponent".to_string()));
	}

	#[test]
	fn name_variants_strip_component_suffix() {
		let variants = name_variants("CounterComponent");
		assert!(variants.contains(&"Counter".to_string()));
	}

	#[test]
	fn name_variants_include_capitalized_form() {
		let variants = name_variants("counter");
		assert!(variants.contains(&"Counter".to_string()));
	}
}
