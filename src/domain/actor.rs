use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::directory::{Caregiver, Member, Partner};

/// Label used in history descriptions for scheduler-driven transitions.
pub const SYSTEM_ACTOR_LABEL: &str = "MealCare System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Member,
    Caregiver,
    Partner,
    Patron,
    Organization,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Caregiver => "CAREGIVER",
            Role::Partner => "PARTNER",
            Role::Patron => "PATRON",
            Role::Organization => "ORGANIZATION",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MEMBER" => Ok(Role::Member),
            "CAREGIVER" => Ok(Role::Caregiver),
            "PARTNER" => Ok(Role::Partner),
            "PATRON" => Ok(Role::Patron),
            "ORGANIZATION" => Ok(Role::Organization),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserSnapshot {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Role-scoped record of a user. `None` when the user has a role but no profile row yet.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleData {
    Member(Member),
    Caregiver(Caregiver),
    Partner(Partner),
    None,
}

/// Result of `role_data_by_user_id`: who is calling and in which capacity.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoleProfile {
    pub user: UserSnapshot,
    pub data: RoleData,
}

impl RoleProfile {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    pub fn partner(&self) -> Option<&Partner> {
        match &self.data {
            RoleData::Partner(partner) => Some(partner),
            _ => None,
        }
    }

    /// Member an order placed by this user is attributed to, when already known.
    pub fn represented_member_id(&self) -> Option<i32> {
        match &self.data {
            RoleData::Member(member) => Some(member.id),
            RoleData::Caregiver(caregiver) => caregiver.member_id,
            _ => None,
        }
    }
}

/// Who a history row is attributed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Actor {
    User { id: i32, name: String },
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<i32> {
        match self {
            Actor::User { id, .. } => Some(*id),
            Actor::System => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Actor::User { name, .. } => name,
            Actor::System => SYSTEM_ACTOR_LABEL,
        }
    }
}

impl From<&RoleProfile> for Actor {
    fn from(profile: &RoleProfile) -> Self {
        Actor::User {
            id: profile.user.id,
            name: profile.user.name.clone(),
        }
    }
}
