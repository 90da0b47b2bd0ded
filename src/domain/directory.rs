//! Read models for the records this service borrows from the account side of the
//! platform. They are snapshots; nothing here is mutated by the order workflow.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Member {
    pub id: i32,
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub allergies: Vec<String>,
    pub illnesses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Caregiver {
    pub id: i32,
    pub user_id: i32,
    /// Member this caregiver orders for, if one is attached.
    pub member_id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Partner {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Meal {
    pub id: i32,
    pub partner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MealWithPartner {
    pub meal: Meal,
    pub partner: Partner,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Caregiver {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
