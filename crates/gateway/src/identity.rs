// Viewer Identity
//
// Turns the user descriptor sent with a join into the viewer shown to other
// people in the room. Identity is the principal id, else the email, else the
// connection's anonymous id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A person currently looking at a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub id: String,
    pub display_name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub photo: Option<String>,
}

/// User descriptor as sent by the client
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Generate the id used for a connection that never identifies itself.
pub fn anonymous_id() -> String {
    format!("anon-{}", uuid::Uuid::new_v4())
}

impl JoinUser {
    /// Resolve to a viewer. An explicitly supplied but blank id is rejected
    /// rather than silently treated as anonymous.
    pub fn into_viewer(self, anonymous_id: &str) -> Result<Viewer, String> {
        let email = non_blank(self.email);
        let id = match self.id {
            Some(id) if id.trim().is_empty() => {
                return Err("user id cannot be blank".to_string());
            }
            Some(id) => id.trim().to_string(),
            None => email
                .clone()
                .unwrap_or_else(|| anonymous_id.to_string()),
        };

        let display_name = non_blank(self.display_name)
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "Guest".to_string());

        let color = non_blank(self.color)
            .filter(|c| is_hex_color(c))
            .unwrap_or_else(|| color_for(&id));

        Ok(Viewer {
            id,
            display_name,
            color,
            photo: non_blank(self.photo),
        })
    }
}

/// Stable color for an id, so the same person keeps their avatar color.
pub fn color_for(id: &str) -> String {
    let digest = Sha256::digest(id.as_bytes());
    format!("#{}", hex::encode(&digest[..3]))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}
