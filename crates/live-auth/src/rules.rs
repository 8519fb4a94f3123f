//! Declarative, per-class authorization rules.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct MountRule {
	pub required: bool,
	pub roles: Vec<String>,
	pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ActionRule {
	pub roles: Vec<String>,
	pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ComponentAuthRules {
	pub mount: MountRule,
	pub actions: HashMap<String, ActionRule>,
}
