//! Identifiers for boards, lanes and the entities they reference.
//!
//! Boards and lanes get a temporary id (`temp-<client key>`) while their create
//! request is in flight. The store never issues ids with that prefix.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix marking a client-synthesized id that the store has not confirmed.
pub const TEMP_PREFIX: &str = "temp-";

/// Idempotency key attached to a create request and echoed back by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(pub Uuid);

impl ClientKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for ClientKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        string_id!($(#[$meta])* $name);

        impl $name {
            /// Placeholder id for a record created under `key`.
            pub fn temp(key: ClientKey) -> Self {
                Self(format!("{}{}", TEMP_PREFIX, key.0))
            }

            pub fn is_temp(&self) -> bool {
                self.0.starts_with(TEMP_PREFIX)
            }

            /// The client key a temporary id was derived from.
            pub fn client_key(&self) -> Option<ClientKey> {
                self.0
                    .strip_prefix(TEMP_PREFIX)
                    .and_then(|rest| Uuid::parse_str(rest).ok())
                    .map(ClientKey)
            }
        }
    };
}

entity_id!(
    /// Board identifier, temporary until the store confirms the board.
    BoardId
);
entity_id!(
    /// Lane identifier, temporary until the store confirms the lane.
    LaneId
);
string_id!(ProjectId);
string_id!(SprintId);
string_id!(
    /// Workflow state (issue status) a lane can be mapped to.
    StateId
);
