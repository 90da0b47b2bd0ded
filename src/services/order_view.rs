//! Response shape of an order: the aggregate with its member, meals and the
//! partner each line was placed with.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    domain::{
        directory::{Meal, Member, Partner},
        errors::OrderError,
        order::{OrderAggregate, OrderHistory},
        status::OrderStatus,
    },
    repository::DirectoryRepository,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderMealView {
    pub id: i32,
    pub quantity: i32,
    /// `None` once the meal has been removed from the catalogue.
    pub meal: Option<Meal>,
    pub partner: Partner,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderView {
    pub id: i32,
    pub status: OrderStatus,
    pub version: i32,
    pub user_id: i32,
    pub member: Member,
    pub meals: Vec<OrderMealView>,
    pub histories: Vec<OrderHistory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Looks records up once per id across all rendered orders.
struct Lookups<'r, R: ?Sized> {
    repo: &'r R,
    members: HashMap<i32, Member>,
    partners: HashMap<i32, Partner>,
    meals: HashMap<i32, Option<Meal>>,
}

impl<'r, R> Lookups<'r, R>
where
    R: DirectoryRepository + ?Sized,
{
    fn new(repo: &'r R) -> Self {
        Self {
            repo,
            members: HashMap::new(),
            partners: HashMap::new(),
            meals: HashMap::new(),
        }
    }

    async fn member(&mut self, id: i32) -> Result<Member, OrderError> {
        if let Some(member) = self.members.get(&id) {
            return Ok(member.clone());
        }
        let member = self
            .repo
            .member_by_id(id)
            .await?
            .ok_or(OrderError::MemberNotFound)?;
        self.members.insert(id, member.clone());
        Ok(member)
    }

    async fn partner(&mut self, id: i32) -> Result<Partner, OrderError> {
        if let Some(partner) = self.partners.get(&id) {
            return Ok(partner.clone());
        }
        let partner = self
            .repo
            .partner_by_id(id)
            .await?
            .ok_or_else(|| OrderError::Store(anyhow::anyhow!("Partner #{id} not found")))?;
        self.partners.insert(id, partner.clone());
        Ok(partner)
    }

    async fn meal(&mut self, id: i32) -> Result<Option<Meal>, OrderError> {
        if let Some(meal) = self.meals.get(&id) {
            return Ok(meal.clone());
        }
        let meal = self.repo.meal_by_id(id).await?.map(|found| found.meal);
        self.meals.insert(id, meal.clone());
        Ok(meal)
    }

    async fn render(&mut self, aggregate: OrderAggregate) -> Result<OrderView, OrderError> {
        let OrderAggregate {
            order,
            meals,
            histories,
        } = aggregate;

        let mut lines = Vec::with_capacity(meals.len());
        for line in meals {
            lines.push(OrderMealView {
                id: line.id,
                quantity: line.quantity,
                meal: self.meal(line.meal_id).await?,
                // The partner recorded on the line, not the meal's current one.
                partner: self.partner(line.partner_id).await?,
            });
        }

        Ok(OrderView {
            id: order.id,
            status: order.status(),
            version: order.version,
            user_id: order.user_id,
            member: self.member(order.member_id).await?,
            meals: lines,
            histories,
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }
}

pub async fn render<R>(repo: &R, aggregate: OrderAggregate) -> Result<OrderView, OrderError>
where
    R: DirectoryRepository + ?Sized,
{
    Lookups::new(repo).render(aggregate).await
}

pub async fn render_all<R>(
    repo: &R,
    aggregates: Vec<OrderAggregate>,
) -> Result<Vec<OrderView>, OrderError>
where
    R: DirectoryRepository + ?Sized,
{
    let mut lookups = Lookups::new(repo);
    let mut views = Vec::with_capacity(aggregates.len());
    for aggregate in aggregates {
        views.push(lookups.render(aggregate).await?);
    }
    Ok(views)
}
