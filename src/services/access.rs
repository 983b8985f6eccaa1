//! Member roles and ownership rules shared by the domain services.

use serde::{Deserialize, Serialize};

/// Club role stored in `member.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Trainer,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Trainer => "trainer",
            Self::Admin => "admin",
        }
    }

    /// Parse a stored role. Unknown values fall back to `Member` so a bad row
    /// never grants extra rights.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "trainer" => Self::Trainer,
            _ => Self::Member,
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Trainers and admins maintain the event and program schedule.
    #[must_use]
    pub fn can_manage_schedule(self) -> bool {
        matches!(self, Self::Trainer | Self::Admin)
    }
}

/// The authenticated caller of a service operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub member_id: i64,
    pub role: Role,
}

impl Actor {
    #[must_use]
    pub fn new(member_id: i64, role: Role) -> Self {
        Self { member_id, role }
    }

    /// Whether the caller may act on a record owned by `owner_id`.
    #[must_use]
    pub fn can_act_for(&self, owner_id: i64) -> bool {
        self.role.is_admin() || self.member_id == owner_id
    }
}
