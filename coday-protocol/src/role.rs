use serde::Deserialize;
use serde::Serialize;

/// Speaker of a [`crate::Event::Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}
