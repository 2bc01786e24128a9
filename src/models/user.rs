use core::fmt;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::Type, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Portal role. Team roles (`Admin`, `Manager`, `User`) operate across every
/// tenant; client roles (`Client`, `ClientNoAccess`) are scoped to the
/// organizations they belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Manager,
    User,
    Client,
    ClientNoAccess,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Manager,
        Role::User,
        Role::Client,
        Role::ClientNoAccess,
    ];

    pub fn is_team(self) -> bool {
        match self {
            Role::Admin | Role::Manager | Role::User => true,
            Role::Client | Role::ClientNoAccess => false,
        }
    }

    pub fn is_client(self) -> bool {
        !self.is_team()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
            Role::Client => "client",
            Role::ClientNoAccess => "client_no_access",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub is_onboarded: bool,
    /// Legacy single-organization pointer. Authorization reads memberships only.
    pub org_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvitedProfile {
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub org_id: Option<Uuid>,
}
