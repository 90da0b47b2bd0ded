use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Associations, Identifiable, Insertable, Queryable},
};

use crate::domain::{
    actor::UserSnapshot,
    cart::{Cart, CartReference},
    directory::{Caregiver, Meal, Member, Partner},
    order::{Order, OrderHistory, OrderMeal},
};

// Directory

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::members)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MemberEntity {
    pub id: i32,
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub allergies: Vec<String>,
    pub illnesses: Vec<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::caregivers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CaregiverEntity {
    pub id: i32,
    pub user_id: i32,
    pub member_id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::partners)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PartnerEntity {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub address: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::meals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MealEntity {
    pub id: i32,
    pub partner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl UserEntity {
    pub fn into_snapshot(self) -> Result<UserSnapshot> {
        Ok(UserSnapshot {
            role: self
                .role
                .parse()
                .with_context(|| format!("User #{} has an unusable role", self.id))?,
            id: self.id,
            name: self.name,
            email: self.email,
        })
    }
}

impl From<MemberEntity> for Member {
    fn from(row: MemberEntity) -> Self {
        Member {
            id: row.id,
            user_id: row.user_id,
            first_name: row.first_name,
            last_name: row.last_name,
            address: row.address,
            image_url: row.image_url,
            allergies: row.allergies,
            illnesses: row.illnesses,
        }
    }
}

impl From<CaregiverEntity> for Caregiver {
    fn from(row: CaregiverEntity) -> Self {
        Caregiver {
            id: row.id,
            user_id: row.user_id,
            member_id: row.member_id,
            first_name: row.first_name,
            last_name: row.last_name,
            address: row.address,
            image_url: row.image_url,
        }
    }
}

impl From<PartnerEntity> for Partner {
    fn from(row: PartnerEntity) -> Self {
        Partner {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            address: row.address,
        }
    }
}

impl From<MealEntity> for Meal {
    fn from(row: MealEntity) -> Self {
        Meal {
            id: row.id,
            partner_id: row.partner_id,
            name: row.name,
            description: row.description,
            image_url: row.image_url,
        }
    }
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartEntity {
    pub id: i32,
    pub meal_id: i32,
    pub reference_id: i32,
    pub reference_type: String,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity<'a> {
    pub meal_id: i32,
    pub reference_id: i32,
    pub reference_type: &'a str,
    pub quantity: i32,
}

impl TryFrom<CartEntity> for Cart {
    type Error = anyhow::Error;

    fn try_from(row: CartEntity) -> Result<Self> {
        Ok(Cart {
            reference: CartReference::from_parts(row.reference_id, &row.reference_type)
                .with_context(|| format!("Cart #{} has an unusable reference", row.id))?,
            id: row.id,
            meal_id: row.meal_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub member_id: i32,
    pub user_id: i32,
    pub status: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CreateOrderEntity<'a> {
    pub member_id: i32,
    pub user_id: i32,
    pub status: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_meals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderMealEntity {
    pub id: i32,
    pub order_id: i32,
    pub meal_id: i32,
    pub partner_id: i32,
    pub quantity: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_meals)]
pub struct CreateOrderMealEntity {
    pub order_id: i32,
    pub meal_id: i32,
    pub partner_id: i32,
    pub quantity: i32,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_histories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderHistoryEntity {
    pub id: i32,
    pub order_id: i32,
    pub user_id: Option<i32>,
    pub status: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_histories)]
pub struct CreateOrderHistoryEntity<'a> {
    pub order_id: i32,
    pub user_id: Option<i32>,
    pub status: &'a str,
    pub description: &'a str,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderEntity> for Order {
    type Error = anyhow::Error;

    fn try_from(row: OrderEntity) -> Result<Self> {
        Ok(Order {
            status: row
                .status
                .parse()
                .with_context(|| format!("Order #{} has an unusable status", row.id))?,
            id: row.id,
            member_id: row.member_id,
            user_id: row.user_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

impl From<OrderMealEntity> for OrderMeal {
    fn from(row: OrderMealEntity) -> Self {
        OrderMeal {
            id: row.id,
            order_id: row.order_id,
            meal_id: row.meal_id,
            partner_id: row.partner_id,
            quantity: row.quantity,
        }
    }
}

impl TryFrom<OrderHistoryEntity> for OrderHistory {
    type Error = anyhow::Error;

    fn try_from(row: OrderHistoryEntity) -> Result<Self> {
        Ok(OrderHistory {
            status: row
                .status
                .parse()
                .with_context(|| format!("Order history #{} has an unusable status", row.id))?,
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

// Outbox

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEntity {
    pub id: i32,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::outbox)]
pub struct CreateOutboxEntity {
    pub event_type: String,
    pub payload: String,
    pub status: String,
}
