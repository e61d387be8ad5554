//! Message domain types.
//!
//! A chat turn is a single user message; the gateway never stores history.
//! Messages are only assembled to build a provider request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (persona, context)
    System,
}

/// A single message in a provider request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, profesor!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, profesor!");
    }

    #[test]
    fn messages_get_distinct_ids() {
        let a = Message::assistant("a");
        let b = Message::assistant("a");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn role_serializes_lowercase() {
        let msg = Message::system("rules");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
    }
}
