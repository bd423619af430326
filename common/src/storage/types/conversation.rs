use serde::{Deserialize, Serialize};

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

stored_object!(ConversationMessage, "conversation_message", {
    session_id: String,
    role: Role,
    content: String
});
