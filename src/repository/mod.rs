//! Storage seams of the order service. `postgres` is the production backend,
//! `memory` keeps everything in process for tests and local demos.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    actor::RoleProfile,
    cart::{Cart, CartReference, NewCartLine},
    directory::{Caregiver, MealWithPartner, Member, Partner},
    errors::{CartError, OrderError},
    order::{DailyCap, Order, OrderAggregate, OrderDraft, TransitionRecord},
    status::OrderStatus,
};

/// Lookups into user/profile/meal data owned by the rest of the platform.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn role_data_by_user_id(&self, user_id: i32) -> Result<Option<RoleProfile>>;

    async fn member_by_id(&self, id: i32) -> Result<Option<Member>>;

    async fn caregiver_by_id(&self, id: i32) -> Result<Option<Caregiver>>;

    async fn partner_by_id(&self, id: i32) -> Result<Option<Partner>>;

    async fn meal_by_id(&self, id: i32) -> Result<Option<MealWithPartner>>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn carts(&self) -> Result<Vec<Cart>>;

    async fn carts_by_reference(&self, reference: CartReference) -> Result<Vec<Cart>>;

    async fn cart_by_id(&self, id: i32) -> Result<Option<Cart>>;

    /// Adds the line, or adds its quantity to the owner's existing line for the same meal.
    /// A merged quantity past `i32::MAX` is rejected with `QuantityTooLarge`.
    async fn add_to_cart(&self, line: NewCartLine) -> Result<Cart, CartError>;

    async fn update_cart_quantity(
        &self,
        id: i32,
        reference: CartReference,
        quantity: i32,
    ) -> Result<Option<Cart>>;

    async fn delete_cart(&self, id: i32, reference: CartReference) -> Result<Option<Cart>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the draft atomically: the daily cap is re-checked against the
    /// member's orders while other checkouts of the same member are held off.
    async fn place_order(&self, draft: OrderDraft, cap: DailyCap)
    -> Result<OrderAggregate, OrderError>;

    async fn order_by_id(&self, id: i32) -> Result<Option<OrderAggregate>>;

    async fn orders(&self) -> Result<Vec<OrderAggregate>>;

    /// Newest first.
    async fn orders_by_member(&self, member_id: i32) -> Result<Vec<OrderAggregate>>;

    /// Live orders sitting in `status` since before `changed_before`.
    async fn stale_orders(
        &self,
        status: OrderStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    /// Moves the order to `record.to` and appends the history row in one unit.
    /// Fails with `ConcurrentModification` if the order is no longer at
    /// `record.from` / `record.expected_version`.
    async fn append_transition(&self, record: TransitionRecord)
    -> Result<OrderAggregate, OrderError>;

    async fn soft_delete_order(&self, id: i32) -> Result<Option<Order>>;
}

pub trait Repository: DirectoryRepository + CartRepository + OrderRepository {}

impl<T> Repository for T where T: DirectoryRepository + CartRepository + OrderRepository {}
