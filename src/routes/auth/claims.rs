use serde::{Deserialize, Serialize};

/// Access-token claims. Role and memberships are deliberately absent: they are
/// reloaded from the database on every request.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub id: String,
    pub email: String,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}
