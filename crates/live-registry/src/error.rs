//! Registry-level errors. Every variant here is surfaced to the wire as
//! a tagged `success:false` response, never as a raw exception — the dispatcher
//! matches on these to build the right `ServerMessage`.

use live_common::ComponentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("COMPONENT_NOT_FOUND: no component class registered as {0:?}")]
	ComponentNotFound(String),

	#[error("{0}")]
	AuthDenied(String),

	#[error("missing required dependency {0:?}")]
	MissingDependency(String),

	/// Distinct sentinel so the dispatcher knows to ask the client to resend a
	/// signed envelope instead of reporting a generic error.
	#[error("COMPONENT_REHYDRATION_REQUIRED:{0}")]
	RehydrationRequired(ComponentId),

	#[error("EXPIRED: signed state has expired")]
	Expired,

	#[error("INVALID_SIGNATURE: signature does not match")]
	InvalidSignature,

	#[error("State already consumed - replay attack detected")]
	Replayed,

	#[error("KEY_NOT_FOUND: signing key unknown or outside the retention window")]
	KeyNotFound,

	#[error("Component class mismatch - state tampering detected")]
	ClassMismatch,

	#[error("no instance with id {0}")]
	InstanceNotFound(ComponentId),

	#[error("action failed: {0}")]
	ActionFailed(String),

	#[error(transparent)]
	Signature(#[from] live_signature::SignatureError),

	#[error("unknown property {0:?}")]
	UnknownProperty(String),
}
