use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper, sql_types::BigInt};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use super::PgRepository;
use crate::{
    domain::{
        errors::OrderError,
        order::{
            DailyCap, Order, OrderAggregate, OrderDraft, OrderHistory, OrderMeal, TransitionRecord,
        },
        status::OrderStatus,
    },
    models::{
        CreateOrderEntity, CreateOrderHistoryEntity, CreateOrderMealEntity, OrderEntity,
        OrderHistoryEntity, OrderMealEntity,
    },
    notifications::events::ORDER_STATUS_CHANGED,
    platform::outbox,
    repository::OrderRepository,
    schema::{carts, order_histories, order_meals, orders},
};

/// Statuses whose quantities no longer count toward the member's daily cap.
fn statuses_outside_daily_cap() -> Vec<&'static str> {
    OrderStatus::ALL
        .into_iter()
        .filter(|status| !status.counts_toward_daily_cap())
        .map(|status| status.as_str())
        .collect()
}

/// Loads lines and history for `rows` and assembles aggregates, keeping row order.
async fn load_aggregates(
    conn: &mut AsyncPgConnection,
    rows: Vec<OrderEntity>,
) -> Result<Vec<OrderAggregate>> {
    let order_ids: Vec<i32> = rows.iter().map(|order| order.id).collect();

    let meal_rows: Vec<OrderMealEntity> = order_meals::table
        .filter(order_meals::order_id.eq_any(&order_ids))
        .order_by(order_meals::id.asc())
        .select(OrderMealEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order meals")?;

    let history_rows: Vec<OrderHistoryEntity> = order_histories::table
        .filter(order_histories::order_id.eq_any(&order_ids))
        .order_by((order_histories::created_at.asc(), order_histories::id.asc()))
        .select(OrderHistoryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order histories")?;

    let mut meals: HashMap<i32, Vec<OrderMeal>> = HashMap::new();
    for row in meal_rows {
        meals.entry(row.order_id).or_default().push(row.into());
    }

    let mut histories: HashMap<i32, Vec<OrderHistory>> = HashMap::new();
    for row in history_rows {
        histories
            .entry(row.order_id)
            .or_default()
            .push(row.try_into()?);
    }

    rows.into_iter()
        .map(|row| {
            let id = row.id;
            Ok(OrderAggregate {
                order: row.try_into()?,
                meals: meals.remove(&id).unwrap_or_default(),
                histories: histories.remove(&id).unwrap_or_default(),
            })
        })
        .collect()
}

async fn load_aggregate(conn: &mut AsyncPgConnection, id: i32) -> Result<Option<OrderAggregate>> {
    let row: Option<OrderEntity> = orders::table
        .find(id)
        .select(OrderEntity::as_select())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to get order")?;

    match row {
        Some(row) => Ok(load_aggregates(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

#[async_trait]
impl OrderRepository for PgRepository {
    async fn place_order(
        &self,
        draft: OrderDraft,
        cap: DailyCap,
    ) -> Result<OrderAggregate, OrderError> {
        let conn = &mut self.conn().await?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                // Serializes checkouts of the same member until commit.
                diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
                    .bind::<BigInt, _>(i64::from(draft.member_id))
                    .execute(conn)
                    .await
                    .context("Failed to lock member for checkout")?;

                let existing_today: Option<i64> = order_meals::table
                    .inner_join(orders::table)
                    .filter(orders::member_id.eq(draft.member_id))
                    .filter(orders::deleted_at.is_null())
                    .filter(orders::created_at.ge(cap.day_start))
                    .filter(orders::created_at.lt(cap.day_end))
                    .filter(orders::status.ne_all(statuses_outside_daily_cap()))
                    .select(diesel::dsl::sum(order_meals::quantity))
                    .get_result(conn)
                    .await
                    .context("Failed to get today's ordered quantity")?;
                cap.check(existing_today.unwrap_or(0), draft.total_quantity())?;

                let now = Utc::now();
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        member_id: draft.member_id,
                        user_id: draft.user_id,
                        status: draft.first_history.status.as_str(),
                        created_at: now,
                        updated_at: now,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|err| OrderError::FailedToCreateOrder(err.into()))?;

                let lines: Vec<CreateOrderMealEntity> = draft
                    .lines
                    .iter()
                    .map(|line| CreateOrderMealEntity {
                        order_id: order.id,
                        meal_id: line.meal_id,
                        partner_id: line.partner_id,
                        quantity: line.quantity,
                    })
                    .collect();
                diesel::insert_into(order_meals::table)
                    .values(&lines)
                    .execute(conn)
                    .await
                    .map_err(|err| OrderError::FailedToCreateOrder(err.into()))?;

                diesel::insert_into(order_histories::table)
                    .values(CreateOrderHistoryEntity {
                        order_id: order.id,
                        user_id: draft.first_history.user_id,
                        status: draft.first_history.status.as_str(),
                        description: &draft.first_history.description,
                        created_at: now,
                    })
                    .execute(conn)
                    .await
                    .map_err(|err| OrderError::FailedToCreateOrder(err.into()))?;

                if let Some(reference) = draft.clear_cart {
                    let meal_ids: Vec<i32> = draft.lines.iter().map(|line| line.meal_id).collect();
                    diesel::delete(
                        carts::table
                            .filter(carts::reference_id.eq(reference.reference_id()))
                            .filter(carts::reference_type.eq(reference.reference_type().as_str()))
                            .filter(carts::meal_id.eq_any(&meal_ids)),
                    )
                    .execute(conn)
                    .await
                    .context("Failed to clear checked out cart lines")?;
                }

                outbox::publish(
                    conn,
                    ORDER_STATUS_CHANGED.into(),
                    draft.notification(order.id, now),
                )
                .await?;

                let aggregate = load_aggregate(conn, order.id).await?.ok_or_else(|| {
                    OrderError::FailedToCreateOrder(anyhow::anyhow!("Order vanished after insert"))
                })?;

                Ok::<OrderAggregate, OrderError>(aggregate)
            })
        })
        .await
    }

    async fn order_by_id(&self, id: i32) -> Result<Option<OrderAggregate>> {
        let conn = &mut self.conn().await?;
        load_aggregate(conn, id).await
    }

    async fn orders(&self) -> Result<Vec<OrderAggregate>> {
        let conn = &mut self.conn().await?;

        let rows: Vec<OrderEntity> = orders::table
            .filter(orders::deleted_at.is_null())
            .order_by(orders::updated_at.desc())
            .select(OrderEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get orders")?;

        load_aggregates(conn, rows).await
    }

    async fn orders_by_member(&self, member_id: i32) -> Result<Vec<OrderAggregate>> {
        let conn = &mut self.conn().await?;

        let rows: Vec<OrderEntity> = orders::table
            .filter(orders::member_id.eq(member_id))
            .filter(orders::deleted_at.is_null())
            .order_by((orders::created_at.desc(), orders::id.desc()))
            .select(OrderEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get member orders")?;

        load_aggregates(conn, rows).await
    }

    async fn stale_orders(
        &self,
        status: OrderStatus,
        changed_before: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let conn = &mut self.conn().await?;

        let rows: Vec<OrderEntity> = orders::table
            .filter(orders::status.eq(status.as_str()))
            .filter(orders::deleted_at.is_null())
            .filter(orders::updated_at.lt(changed_before))
            .order_by(orders::id.asc())
            .select(OrderEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get stale orders")?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn append_transition(
        &self,
        record: TransitionRecord,
    ) -> Result<OrderAggregate, OrderError> {
        let conn = &mut self.conn().await?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                let now = Utc::now();

                let updated: Option<OrderEntity> = diesel::update(
                    orders::table
                        .find(record.order_id)
                        .filter(orders::deleted_at.is_null())
                        .filter(orders::status.eq(record.from.as_str()))
                        .filter(orders::version.eq(record.expected_version)),
                )
                .set((
                    orders::status.eq(record.to.as_str()),
                    orders::version.eq(orders::version + 1),
                    orders::updated_at.eq(now),
                ))
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .optional()?;

                if updated.is_none() {
                    let exists: i64 = orders::table
                        .find(record.order_id)
                        .count()
                        .get_result(conn)
                        .await?;
                    return Err(if exists == 0 {
                        OrderError::OrderNotFound(record.order_id)
                    } else {
                        OrderError::ConcurrentModification(record.order_id)
                    });
                }

                diesel::insert_into(order_histories::table)
                    .values(CreateOrderHistoryEntity {
                        order_id: record.order_id,
                        user_id: record.history.user_id,
                        status: record.history.status.as_str(),
                        description: &record.history.description,
                        created_at: now,
                    })
                    .execute(conn)
                    .await
                    .context("Failed to append order history")?;

                outbox::publish(conn, ORDER_STATUS_CHANGED.into(), record.notification(now))
                    .await?;

                let aggregate = load_aggregate(conn, record.order_id)
                    .await?
                    .ok_or(OrderError::OrderNotFound(record.order_id))?;

                Ok::<OrderAggregate, OrderError>(aggregate)
            })
        })
        .await
    }

    async fn soft_delete_order(&self, id: i32) -> Result<Option<Order>> {
        let conn = &mut self.conn().await?;

        let row: Option<OrderEntity> = diesel::update(
            orders::table
                .find(id)
                .filter(orders::deleted_at.is_null()),
        )
        .set(orders::deleted_at.eq(Utc::now()))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to delete order")?;

        row.map(Order::try_from).transpose()
    }
}
