//! The Component Registry: instantiation, lifecycle, auto-discovery
//! via explicit registration, action dispatch, rehydration, health monitoring and
//! service dependency injection. Sits downstream of every other subsystem crate —
//! it is the composition root the WebSocket dispatcher is built on top of.

mod component;
mod delivery;
mod error;
mod instance;
mod observer;
mod registry;

pub use component::{name_variants, ComponentFactory, ComponentObserver, LiveComponent, NullObserver, ServiceFactory};
pub use delivery::ConnectionDeliverer;
pub use error::RegistryError;
pub use instance::{ComponentHealth, ComponentInstance, ComponentMetadata, ComponentMetrics, LifecycleState, MigrationRecord};
pub use observer::{RoomObserver, ROOM_KIND};
pub use registry::{ActionOutcome, ComponentRegistry, MountOutcome, RegistryConfig, RehydrateOutcome};

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use live_auth::{ActionRule, AuthContext, AuthGate, ComponentAuthRules, MountRule};
	use live_common::{ComponentId, ConnectionId, RoomId};
	use live_connections::{ConnectionManager, ConnectionManagerConfig};
	use live_rooms::RoomManager;
	use live_signature::{SignatureConfig, SigningKey, StateSignatureEngine};

	use super::*;
	use crate::test_support::CounterComponent;

	fn registry() -> Arc<ComponentRegistry> {
		let auth_gate = Arc::new(AuthGate::new());
		let signature_engine = Arc::new(StateSignatureEngine::new(
			SigningKey::generate(),
			SignatureConfig::default(),
		));
		let connections = Arc::new(ConnectionManager::new(ConnectionManagerConfig::default()));
		let rooms = Arc::new(RoomManager::new());
		let registry = Arc::new(ComponentRegistry::new(
			auth_gate,
			signature_engine,
			connections,
			rooms,
			RegistryConfig::default(),
		));
		registry.register("Counter", || Box::new(CounterComponent::default()));
		registry
	}

	#[tokio::test]
	async fn mount_then_increment_matches_literal_scenario() {
		let registry = registry();
		let mount = registry
			.mount(
				"Counter",
				serde_json::json!({"start": 5}).as_object().unwrap().clone(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();
		assert_eq!(mount.state["value"], 5);

		let outcome = registry
			.call_action(mount.component_id, "increment", serde_json::json!({"by": 3}), 1)
			.await
			.unwrap();
		assert_eq!(outcome.result["value"], 8);
		assert_eq!(outcome.state["value"], 8);
	}

	#[tokio::test]
	async fn action_on_unknown_component_requires_rehydration() {
		let registry = registry();
		let err = registry
			.call_action(ComponentId::random(), "increment", serde_json::Value::Null, 0)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::RehydrationRequired(_)));
	}

	#[tokio::test]
	async fn mount_unknown_class_is_component_not_found() {
		let registry = registry();
		let err = registry
			.mount(
				"Nonexistent",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::ComponentNotFound(_)));
	}

	#[tokio::test]
	async fn mount_denied_by_role_rule() {
		let registry = registry();
		registry.register_auth_rules(
			"Counter",
			ComponentAuthRules {
				mount: MountRule {
					required: true,
					roles: vec!["admin".into()],
					permissions: vec![],
				},
				actions: Default::default(),
			},
		);
		let err = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::AuthDenied(_)));
	}

	#[tokio::test]
	async fn rehydrate_round_trip_yields_new_id_and_rejects_replay() {
		let registry = registry();
		let mount = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();

		let rehydrated = registry
			.rehydrate(
				"Counter",
				&mount.signed_state,
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				1,
			)
			.await
			.unwrap();
		assert_ne!(rehydrated.new_component_id, mount.component_id);

		let err = registry
			.rehydrate(
				"Counter",
				&mount.signed_state,
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				2,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::Replayed));
	}

	#[tokio::test]
	async fn rehydrate_rejects_cross_class_tampering() {
		let registry = registry();
		registry.register("Cart", || Box::new(CounterComponent::default()));
		let mount = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();

		let err = registry
			.rehydrate(
				"Cart",
				&mount.signed_state,
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				1,
			)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::ClassMismatch));
	}

	#[tokio::test]
	async fn action_auth_rule_denies_insufficient_permission() {
		let registry = registry();
		let mut actions = std::collections::HashMap::new();
		actions.insert(
			"increment".to_string(),
			ActionRule {
				roles: vec![],
				permissions: vec!["counter:write".into()],
			},
		);
		registry.register_auth_rules(
			"Counter",
			ComponentAuthRules {
				mount: MountRule::default(),
				actions,
			},
		);
		let mount = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();

		let err = registry
			.call_action(mount.component_id, "increment", serde_json::json!({"by": 1}), 1)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::AuthDenied(_)));
	}

	#[tokio::test]
	async fn set_property_shallow_sets_single_key() {
		let registry = registry();
		let mount = registry
			.mount(
				"Counter",
				serde_json::json!({"start": 1}).as_object().unwrap().clone(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();
		let outcome = registry
			.set_property(mount.component_id, "label", serde_json::json!("hello"), 1)
			.await
			.unwrap();
		assert_eq!(outcome.state["label"], "hello");
		assert_eq!(outcome.state["value"], 1);
	}

	#[tokio::test]
	async fn unmount_then_action_requires_rehydration() {
		let registry = registry();
		let mount = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				None,
				0,
			)
			.await
			.unwrap();
		registry.unmount(mount.component_id).await.unwrap();
		let err = registry
			.call_action(mount.component_id, "increment", serde_json::Value::Null, 1)
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::RehydrationRequired(_)));
	}

	#[tokio::test]
	async fn join_room_on_mount_registers_membership() {
		let auth_gate = Arc::new(AuthGate::new());
		let signature_engine = Arc::new(StateSignatureEngine::new(
			SigningKey::generate(),
			SignatureConfig::default(),
		));
		let connections = Arc::new(ConnectionManager::new(ConnectionManagerConfig::default()));
		let rooms = Arc::new(RoomManager::new());
		let registry = Arc::new(ComponentRegistry::new(
			auth_gate,
			signature_engine,
			Arc::clone(&connections),
			Arc::clone(&rooms),
			RegistryConfig::default(),
		));
		registry.register("Counter", || Box::new(CounterComponent::default()));

		let room_id = RoomId::new("chat:7").unwrap();
		let mount = registry
			.mount(
				"Counter",
				Default::default(),
				ConnectionId::random(),
				None,
				AuthContext::Anonymous,
				Some(room_id.clone()),
				0,
			)
			.await
			.unwrap();
		assert_eq!(rooms.member_count(ROOM_KIND, &room_id).await, 1);

		registry.unmount(mount.component_id).await.unwrap();
		assert_eq!(rooms.member_count(ROOM_KIND, &room_id).await, 0);
	}
}
