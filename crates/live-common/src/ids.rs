//! Opaque, process-wide identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! make_uuid {
    {$(
        $(#[$meta:meta])*
        $vis:vis struct $ident:ident;
    )*} => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
        $vis struct $ident(Uuid);

        impl $ident {
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $ident {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $ident {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    )*}
}

make_uuid! {
	/// Identifies a mounted component instance. Unique for the lifetime of the process.
	pub struct ComponentId;

	/// Identifies a single WebSocket connection.
	pub struct ConnectionId;

	/// Identifies an authenticated (or anonymous-but-tracked) user.
	pub struct UserId;

	/// Identifies an in-flight chunked upload.
	pub struct UploadId;
}
