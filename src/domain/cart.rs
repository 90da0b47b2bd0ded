use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    directory::{Caregiver, Member},
    errors::CartError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Member,
    Caregiver,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Member => "MEMBER",
            ReferenceType::Caregiver => "CAREGIVER",
        }
    }
}

impl FromStr for ReferenceType {
    type Err = CartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MEMBER" => Ok(ReferenceType::Member),
            "CAREGIVER" => Ok(ReferenceType::Caregiver),
            _ => Err(CartError::InvalidReference(s.to_string())),
        }
    }
}

/// Owner of a cart line. Persisted as `(reference_id, reference_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartReference {
    Member(i32),
    Caregiver(i32),
}

impl CartReference {
    pub fn from_parts(reference_id: i32, reference_type: &str) -> Result<Self, CartError> {
        Ok(match reference_type.parse::<ReferenceType>()? {
            ReferenceType::Member => CartReference::Member(reference_id),
            ReferenceType::Caregiver => CartReference::Caregiver(reference_id),
        })
    }

    pub fn reference_id(&self) -> i32 {
        match self {
            CartReference::Member(id) | CartReference::Caregiver(id) => *id,
        }
    }

    pub fn reference_type(&self) -> ReferenceType {
        match self {
            CartReference::Member(_) => ReferenceType::Member,
            CartReference::Caregiver(_) => ReferenceType::Caregiver,
        }
    }
}

impl fmt::Display for CartReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.reference_type().as_str(), self.reference_id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Cart {
    pub id: i32,
    pub meal_id: i32,
    pub reference: CartReference,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub meal_id: i32,
    pub reference: CartReference,
    pub quantity: i32,
}

/// Concrete owner behind a [`CartReference`], exactly one of the two.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartOwner {
    Member(Member),
    Caregiver(Caregiver),
}

/// Cart line as rendered to clients: the owner's display data instead of a bare key.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedCart {
    pub id: i32,
    pub meal_id: i32,
    pub quantity: i32,
    pub owner: CartOwner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_references_from_stored_parts() {
        assert_eq!(
            CartReference::from_parts(4, "MEMBER").unwrap(),
            CartReference::Member(4)
        );
        assert_eq!(
            CartReference::from_parts(9, "caregiver").unwrap(),
            CartReference::Caregiver(9)
        );
    }

    #[test]
    fn unknown_reference_types_are_rejected() {
        let err = CartReference::from_parts(1, "PARTNER").unwrap_err();
        assert!(matches!(err, CartError::InvalidReference(kind) if kind == "PARTNER"));
    }
}
