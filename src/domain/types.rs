//! Core identifier types for domain entities.
//!
//! These newtype wrappers provide type safety for entity identifiers,
//! preventing accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Message identifier assigned by the mail provider when an email is received.
    ///
    /// This is what the inbound webhook carries and what the intake run is keyed by.
    EmailId
);

string_id!(
    /// Local identifier of a stored inbound email record.
    InboundEmailId
);

string_id!(
    /// Local identifier of an event registration.
    RegistrationId
);

string_id!(
    /// Public, unguessable token granting edit rights to a registration.
    ///
    /// Appears in the `/email-event/{access_id}` link sent to the original sender.
    AccessId
);

string_id!(
    /// RFC 5322 Message-ID header value of the inbound email.
    MessageId
);

string_id!(
    /// Identifier of a finalized event a registration was promoted into.
    EventId
);

impl InboundEmailId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl RegistrationId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl AccessId {
    /// Generates a fresh access identifier from a v4 (random) UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_id_display() {
        let id = EmailId("msg-123".to_string());
        assert_eq!(id.to_string(), "msg-123");
    }

    #[test]
    fn registration_id_equality() {
        let id1 = RegistrationId::from("reg-1");
        let id2 = RegistrationId::from("reg-1".to_string());
        assert_eq!(id1, id2);
    }

    #[test]
    fn access_ids_are_unique_uuids() {
        let a = AccessId::generate();
        let b = AccessId::generate();
        assert_ne!(a, b);

        let parsed = Uuid::parse_str(a.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = AccessId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }

    #[test]
    fn message_id_from_str() {
        let id: MessageId = "<unique@example.com>".into();
        assert_eq!(id.0, "<unique@example.com>");
    }
}
