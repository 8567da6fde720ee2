use serde::Deserialize;
use serde::Serialize;

/// Kind of change a [`crate::Event::FileEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Created,
    Updated,
    Deleted,
}
