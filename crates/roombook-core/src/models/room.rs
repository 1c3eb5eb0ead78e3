use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Room {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub location: String,
    pub capacity: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facilities: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Room {
    /// One-line label used when picking a room
    pub fn label(&self) -> String {
        format!("{} • {} • {} seats", self.name, self.location, self.capacity)
    }

    pub fn status_display(&self) -> &'static str {
        if self.is_active {
            "Active"
        } else {
            "Inactive"
        }
    }
}
