//! Example registered components.
//! Real deployments register their own classes against the same
//! [`live_registry::ComponentRegistry`]; these exist so the dispatcher has
//! something to mount out of the box.

use live_registry::LiveComponent;
use serde_json::{json, Value};

/// The literal `Counter` from the end-to-end scenarios: `{start}` props, an
/// `increment`/`reset` action pair, optional `label` property.
#[derive(Default)]
pub struct Counter {
	value: i64,
	label: Option<String>,
}

impl LiveComponent for Counter {
	fn mount(&mut self, props: Value) -> Value {
		self.value = props.get("start").and_then(Value::as_i64).unwrap_or(0);
		self.state()
	}

	fn execute_action(&mut self, action: &str, payload: Value) -> Result<Value, String> {
		match action {
			"increment" => {
				let by = payload.get("by").and_then(Value::as_i64).unwrap_or(1);
				self.value += by;
				Ok(self.state())
			}
			"decrement" => {
				let by = payload.get("by").and_then(Value::as_i64).unwrap_or(1);
				self.value -= by;
				Ok(self.state())
			}
			"reset" => {
				self.value = 0;
				Ok(self.state())
			}
			other => Err(format!("unknown action {other:?}")),
		}
	}

	fn state(&self) -> Value {
		let mut state = json!({ "value": self.value });
		if let Some(label) = &self.label {
			state["label"] = json!(label);
		}
		state
	}

	fn set_state(&mut self, state: Value) {
		self.value = state.get("value").and_then(Value::as_i64).unwrap_or(0);
		self.label = state
			.get("label")
			.and_then(Value::as_str)
			.map(|s| s.to_string());
	}
}

/// A second, unrelated component class, so `Counter`'s signed state has something
/// to be rejected against on cross-class rehydration.
#[derive(Default)]
pub struct Cart {
	items: Vec<String>,
}

impl LiveComponent for Cart {
	fn mount(&mut self, _props: Value) -> Value {
		self.state()
	}

	fn execute_action(&mut self, action: &str, payload: Value) -> Result<Value, String> {
		match action {
			"add_item" => {
				let Some(item) = payload.get("item").and_then(Value::as_str) else {
					return Err("missing \"item\"".to_string());
				};
				self.items.push(item.to_string());
				Ok(self.state())
			}
			"clear" => {
				self.items.clear();
				Ok(self.state())
			}
			other => Err(format!("unknown action {other:?}")),
		}
	}

	fn state(&self) -> Value {
		json!({ "items": self.items })
	}

	fn set_state(&mut self, state: Value) {
		self.items = state
			.get("items")
			.and_then(Value::as_array)
			.map(|arr| {
				arr.iter()
					.filter_map(Value::as_str)
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default();
	}
}

/// Registers every example component class against `registry`.
pub fn register_all(registry: &live_registry::ComponentRegistry) {
	registry.register("Counter", || Box::new(Counter::default()));
	registry.register("Cart", || Box::new(Cart::default()));
}
