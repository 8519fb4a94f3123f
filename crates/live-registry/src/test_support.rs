//! A minimal component used by this crate's own tests, modeled on the literal
//! `Counter` example from the end-to-end scenarios.

use serde_json::{json, Value};

use crate::component::LiveComponent;

#[derive(Default)]
pub struct CounterComponent {
	value: i64,
	label: Option<String>,
}

impl LiveComponent for CounterComponent {
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
