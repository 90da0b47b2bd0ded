use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use super::{CartRepository, DirectoryRepository, OrderRepository};
use crate::{
    domain::{
        actor::{Role, RoleData, RoleProfile, UserSnapshot},
        cart::{Cart, CartReference, NewCartLine},
        directory::{Caregiver, Meal, MealWithPartner, Member, Partner},
        errors::{CartError, OrderError},
        order::{
            DailyCap, Order, OrderAggregate, OrderDraft, OrderHistory, OrderMeal, TransitionRecord,
        },
        status::OrderStatus,
    },
    notifications::events::OrderStatusChangedEvent,
};

/// In-process repository with failure injection. Seeding helpers are plain
/// synchronous calls so tests can build fixtures without a runtime.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: i32,
    users: HashMap<i32, UserSnapshot>,
    members: HashMap<i32, Member>,
    caregivers: HashMap<i32, Caregiver>,
    partners: HashMap<i32, Partner>,
    meals: HashMap<i32, Meal>,
    carts: BTreeMap<i32, Cart>,
    orders: BTreeMap<i32, OrderAggregate>,
    published: Vec<OrderStatusChangedEvent>,
    failing_orders: HashSet<i32>,
    fail_placements: bool,
    stale_order_faults: VecDeque<StaleOrderFault>,
}

/// Queued misbehaviour for the next `stale_orders` calls, one fault per call.
#[derive(Debug, Clone, Copy)]
enum StaleOrderFault {
    Fail,
    Stall(Duration),
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn add_user(&mut self, name: &str, role: Role) -> UserSnapshot {
        let id = self.next_id();
        let user = UserSnapshot {
            id,
            name: name.to_string(),
            email: format!("{}.{id}@mealcare.test", name.to_lowercase().replace(' ', ".")),
            role,
        };
        self.users.insert(id, user.clone());
        user
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_user(&self, name: &str, role: Role) -> UserSnapshot {
        self.state().add_user(name, role)
    }

    pub fn add_member(&self, first_name: &str, last_name: &str) -> (UserSnapshot, Member) {
        let mut state = self.state();
        let user = state.add_user(&format!("{first_name} {last_name}"), Role::Member);
        let member = Member {
            id: state.next_id(),
            user_id: user.id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            address: Some("12 Harbour Road".to_string()),
            image_url: None,
            allergies: vec!["peanuts".to_string()],
            illnesses: Vec::new(),
        };
        state.members.insert(member.id, member.clone());
        (user, member)
    }

    pub fn add_caregiver(
        &self,
        first_name: &str,
        last_name: &str,
        member_id: Option<i32>,
    ) -> (UserSnapshot, Caregiver) {
        let mut state = self.state();
        let user = state.add_user(&format!("{first_name} {last_name}"), Role::Caregiver);
        let caregiver = Caregiver {
            id: state.next_id(),
            user_id: user.id,
            member_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            address: None,
            image_url: None,
        };
        state.caregivers.insert(caregiver.id, caregiver.clone());
        (user, caregiver)
    }

    pub fn add_partner(&self, name: &str) -> (UserSnapshot, Partner) {
        let mut state = self.state();
        let user = state.add_user(name, Role::Partner);
        let partner = Partner {
            id: state.next_id(),
            user_id: user.id,
            name: name.to_string(),
            address: None,
        };
        state.partners.insert(partner.id, partner.clone());
        (user, partner)
    }

    pub fn add_meal(&self, partner_id: i32, name: &str) -> Meal {
        let mut state = self.state();
        let meal = Meal {
            id: state.next_id(),
            partner_id,
            name: name.to_string(),
            description: None,
            image_url: None,
        };
        state.meals.insert(meal.id, meal.clone());
        meal
    }

    pub fn reassign_meal(&self, meal_id: i32, partner_id: i32) {
        if let Some(meal) = self.state().meals.get_mut(&meal_id) {
            meal.partner_id = partner_id;
        }
    }

    /// Moves every timestamp of the order `by` into the past.
    pub fn age_order(&self, order_id: i32, by: TimeDelta) {
        if let Some(aggregate) = self.state().orders.get_mut(&order_id) {
            aggregate.order.created_at -= by;
            aggregate.order.updated_at -= by;
            for entry in &mut aggregate.histories {
                entry.created_at -= by;
            }
        }
    }

    /// Makes every following transition of `order_id` fail with a store error.
    pub fn fail_transitions_for(&self, order_id: i32) {
        self.state().failing_orders.insert(order_id);
    }

    pub fn fail_placements(&self) {
        self.state().fail_placements = true;
    }

    /// Makes the next `stale_orders` call fail with a store error.
    pub fn fail_next_stale_orders(&self) {
        self.state().stale_order_faults.push_back(StaleOrderFault::Fail);
    }

    /// Makes the next `stale_orders` call wait `delay` before answering.
    pub fn stall_next_stale_orders(&self, delay: Duration) {
        self.state()
            .stale_order_faults
            .push_back(StaleOrderFault::Stall(delay));
    }

    pub fn published(&self) -> Vec<OrderStatusChangedEvent> {
        self.state().published.clone()
    }
}

#[async_trait]
impl DirectoryRepository for MemoryRepository {
    async fn role_data_by_user_id(&self, user_id: i32) -> Result<Option<RoleProfile>> {
        let state = self.state();
        let Some(user) = state.users.get(&user_id).cloned() else {
            return Ok(None);
        };

        let data = match user.role {
            Role::Member => state
                .members
                .values()
                .find(|member| member.user_id == user_id)
                .cloned()
                .map(RoleData::Member),
            Role::Caregiver => state
                .caregivers
                .values()
                .find(|caregiver| caregiver.user_id == user_id)
                .cloned()
                .map(RoleData::Caregiver),
            Role::Partner => state
                .partners
                .values()
                .find(|partner| partner.user_id == user_id)
                .cloned()
                .map(RoleData::Partner),
            _ => None,
        }
        .unwrap_or(RoleData::None);

        Ok(Some(RoleProfile { user, data }))
    }

    async fn member_by_id(&self, id: i32) -> Result<Option<Member>> {
        Ok(self.state().members.get(&id).cloned())
    }

    async fn caregiver_by_id(&self, id: i32) -> Result<Option<Caregiver>> {
        Ok(self.state().caregivers.get(&id).cloned())
    }

    async fn partner_by_id(&self, id: i32) -> Result<Option<Partner>> {
        Ok(self.state().partners.get(&id).cloned())
    }

    async fn meal_by_id(&self, id: i32) -> Result<Option<MealWithPartner>> {
        let state = self.state();
        let Some(meal) = state.meals.get(&id).cloned() else {
            return Ok(None);
        };
        let partner = state
            .partners
            .get(&meal.partner_id)
            .cloned()
            .ok_or_else(|| anyhow!("Meal #{} points at a missing partner", meal.id))?;

        Ok(Some(MealWithPartner { meal, partner }))
    }
}

#[async_trait]
impl CartRepository for MemoryRepository {
    async fn carts(&self) -> Result<Vec<Cart>> {
        Ok(self.state().carts.values().cloned().collect())
    }

    async fn carts_by_reference(&self, reference: CartReference) -> Result<Vec<Cart>> {
        Ok(self
            .state()
            .carts
            .values()
            .filter(|cart| cart.reference == reference)
            .cloned()
            .collect())
    }

    async fn cart_by_id(&self, id: i32) -> Result<Option<Cart>> {
        Ok(self.state().carts.get(&id).cloned())
    }

    async fn add_to_cart(&self, line: NewCartLine) -> Result<Cart, CartError> {
        let mut state = self.state();
        let now = Utc::now();

        if let Some(existing) = state
            .carts
            .values_mut()
            .find(|cart| cart.meal_id == line.meal_id && cart.reference == line.reference)
        {
            existing.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or(CartError::QuantityTooLarge(line.meal_id))?;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let cart = Cart {
            id: state.next_id(),
            meal_id: line.meal_id,
            reference: line.reference,
            quantity: line.quantity,
            created_at: now,
            updated_at: now,
        };
        state.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn update_cart_quantity(
        &self,
        id: i32,
        reference: CartReference,
        quantity: i32,
    ) -> Result<Option<Cart>> {
        let mut state = self.state();
        let Some(cart) = state
            .carts
            .get_mut(&id)
            .filter(|cart| cart.reference == reference)
        else {
            return Ok(None);
        };
        cart.quantity = quantity;
        cart.updated_at = Utc::now();
        Ok(Some(cart.clone()))
    }

    async fn delete_cart(&self, id: i32, reference: CartReference) -> Result<Option<Cart>> {
        let mut state = self.state();
        if state
            .carts
            .get(&id)
            .is_none_or(|cart| cart.reference != reference)
        {
            return Ok(None);
        }
        Ok(state.carts.remove(&id))
    }
}

#[async_trait]
impl OrderRepository for MemoryRepository {
    async fn place_order(
        &self,
        draft: OrderDraft,
        cap: DailyCap,
    ) -> Result<OrderAggregate, OrderError> {
        let mut state = self.state();
        if state.fail_placements {
            return Err(OrderError::FailedToCreateOrder(anyhow!(
                "simulated store failure"
            )));
        }

        let existing_today: i64 = state
            .orders
            .values()
            .filter(|aggregate| {
                aggregate.order.member_id == draft.member_id
                    && !aggregate.order.is_deleted()
                    && cap.covers(aggregate.order.created_at)
                    && aggregate.order.status.counts_toward_daily_cap()
            })
            .map(OrderAggregate::total_quantity)
            .sum();
        cap.check(existing_today, draft.total_quantity())?;

        let now = Utc::now();
        let order_id = state.next_id();
        let mut meals = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            meals.push(OrderMeal {
                id: state.next_id(),
                order_id,
                meal_id: line.meal_id,
                partner_id: line.partner_id,
                quantity: line.quantity,
            });
        }
        let first_history = OrderHistory {
            id: state.next_id(),
            order_id,
            user_id: draft.first_history.user_id,
            status: draft.first_history.status,
            description: draft.first_history.description.clone(),
            created_at: now,
        };
        let aggregate = OrderAggregate {
            order: Order {
                id: order_id,
                member_id: draft.member_id,
                user_id: draft.user_id,
                status: draft.first_history.status,
                version: 0,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            },
            meals,
            histories: vec![first_history],
        };
        state.orders.insert(order_id, aggregate.clone());

        if let Some(reference) = draft.clear_cart {
            let ordered: HashSet<i32> = draft.lines.iter().map(|line| line.meal_id).collect();
            state
                .carts
                .retain(|_, cart| !(cart.reference == reference && ordered.contains(&cart.meal_id)));
        }

        state.published.push(draft.notification(order_id, now));
        Ok(aggregate)
    }

    async fn order_by_id(&self, id: i32) -> Result<Option<OrderAggregate>> {
        Ok(self.state().orders.get(&id).cloned())
    }

    async fn orders(&self) -> Result<Vec<OrderAggregate>> {
        Ok(self
            .state()
            .orders
            .values()
            .filter(|aggregate| !aggregate.order.is_deleted())
            .cloned()
            .collect())
    }

    async fn orders_by_member(&self, member_id: i32) -> Result<Vec<OrderAggregate>> {
        let mut orders: Vec<OrderAggregate> = self
            .state()
            .orders
            .values()
            .filter(|aggregate| {
                aggregate.order.member_id == member_id && !aggregate.order.is_deleted()
            })
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(orders)
    }

    async fn stale_orders(
        &self,
        status: OrderStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let fault = self.state().stale_order_faults.pop_front();
        match fault {
            Some(StaleOrderFault::Fail) => return Err(anyhow!("simulated store failure")),
            Some(StaleOrderFault::Stall(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }

        Ok(self
            .state()
            .orders
            .values()
            .map(|aggregate| &aggregate.order)
            .filter(|order| {
                order.status == status && !order.is_deleted() && order.updated_at < changed_before
            })
            .cloned()
            .collect())
    }

    async fn append_transition(
        &self,
        record: TransitionRecord,
    ) -> Result<OrderAggregate, OrderError> {
        let mut state = self.state();
        if state.failing_orders.contains(&record.order_id) {
            return Err(OrderError::Store(anyhow!(
                "simulated store failure for order #{}",
                record.order_id
            )));
        }

        let history_id = state.next_id();
        let now = Utc::now();
        let aggregate = state
            .orders
            .get_mut(&record.order_id)
            .ok_or(OrderError::OrderNotFound(record.order_id))?;

        let order = &mut aggregate.order;
        if order.is_deleted() || order.status != record.from || order.version != record.expected_version
        {
            return Err(OrderError::ConcurrentModification(record.order_id));
        }
        order.status = record.to;
        order.version += 1;
        order.updated_at = now;

        aggregate.histories.push(OrderHistory {
            id: history_id,
            order_id: record.order_id,
            user_id: record.history.user_id,
            status: record.history.status,
            description: record.history.description.clone(),
            created_at: now,
        });

        let aggregate = aggregate.clone();
        state.published.push(record.notification(now));
        Ok(aggregate)
    }

    async fn soft_delete_order(&self, id: i32) -> Result<Option<Order>> {
        let mut state = self.state();
        let Some(aggregate) = state
            .orders
            .get_mut(&id)
            .filter(|aggregate| !aggregate.order.is_deleted())
        else {
            return Ok(None);
        };
        aggregate.order.deleted_at = Some(Utc::now());
        Ok(Some(aggregate.order.clone()))
    }
}
