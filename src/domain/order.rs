use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{cart::CartReference, errors::OrderError, status::OrderStatus};
use crate::notifications::events::OrderStatusChangedEvent;

/// Order header. `status` mirrors the latest history row and is only written by
/// the repository together with that row.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Order {
    pub id: i32,
    pub member_id: i32,
    /// User who placed the order (the member or a caregiver acting for them).
    pub user_id: i32,
    pub(crate) status: OrderStatus,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderMeal {
    pub id: i32,
    pub order_id: i32,
    pub meal_id: i32,
    /// Partner that supplied the meal when the order was placed.
    pub partner_id: i32,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderHistory {
    pub id: i32,
    pub order_id: i32,
    /// `None` for entries written by the scheduler.
    pub user_id: Option<i32>,
    pub status: OrderStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderAggregate {
    pub order: Order,
    pub meals: Vec<OrderMeal>,
    /// Oldest first.
    pub histories: Vec<OrderHistory>,
}

impl OrderAggregate {
    pub fn total_quantity(&self) -> i64 {
        self.meals.iter().map(|line| i64::from(line.quantity)).sum()
    }

    pub fn latest_history(&self) -> Option<&OrderHistory> {
        self.histories.last()
    }

    pub fn has_partner(&self, partner_id: i32) -> bool {
        self.meals.iter().any(|line| line.partner_id == partner_id)
    }

    pub fn status_matches_history(&self) -> bool {
        self.latest_history()
            .is_some_and(|entry| entry.status == self.order.status)
    }

    /// First entry is `Placed`, every following entry is a legal step from the
    /// previous one and timestamps never go backwards.
    pub fn history_is_valid_path(&self) -> bool {
        let Some(first) = self.histories.first() else {
            return false;
        };
        if first.status != OrderStatus::Placed {
            return false;
        }

        self.histories.windows(2).all(|pair| {
            pair[0].status.is_valid_step(pair[1].status) && pair[0].created_at <= pair[1].created_at
        })
    }
}

// Write models

#[derive(Debug, Clone)]
pub struct NewHistory {
    pub user_id: Option<i32>,
    pub status: OrderStatus,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftLine {
    pub meal_id: i32,
    pub partner_id: i32,
    pub quantity: i32,
}

/// Everything needed to persist a new order in one go.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub member_id: i32,
    pub user_id: i32,
    pub lines: Vec<DraftLine>,
    pub first_history: NewHistory,
    /// Cart whose lines for the ordered meals get removed on commit.
    pub clear_cart: Option<CartReference>,
}

impl OrderDraft {
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    pub fn notification(&self, order_id: i32, occurred_at: DateTime<Utc>) -> OrderStatusChangedEvent {
        OrderStatusChangedEvent::new(
            order_id,
            self.member_id,
            self.first_history.status,
            self.first_history.description.clone(),
            occurred_at,
        )
    }
}

/// A single status change, applied only if the order is still at `from`/`expected_version`.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub order_id: i32,
    pub member_id: i32,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub expected_version: i32,
    pub history: NewHistory,
}

impl TransitionRecord {
    pub fn notification(&self, occurred_at: DateTime<Utc>) -> OrderStatusChangedEvent {
        OrderStatusChangedEvent::new(
            self.order_id,
            self.member_id,
            self.to,
            self.history.description.clone(),
            occurred_at,
        )
    }
}

// Daily cap

/// What the daily cap is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapScope {
    /// Only the quantities of the order being placed.
    PerOrder,
    /// The order being placed plus the member's still-open orders of the day.
    Cumulative,
}

impl FromStr for CapScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_order" => Ok(CapScope::PerOrder),
            "cumulative" => Ok(CapScope::Cumulative),
            other => Err(anyhow::anyhow!(
                "expected `per_order` or `cumulative`, got `{other}`"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCap {
    pub max: i32,
    pub scope: CapScope,
    pub day_start: DateTime<Utc>,
    pub day_end: DateTime<Utc>,
}

impl DailyCap {
    /// Cap for the calendar day containing `now` in `timezone`.
    pub fn for_day(max: i32, scope: CapScope, now: DateTime<Utc>, timezone: FixedOffset) -> Self {
        let local_midnight = now
            .with_timezone(&timezone)
            .date_naive()
            .and_time(NaiveTime::MIN);
        let day_start =
            local_midnight.and_utc() - TimeDelta::seconds(i64::from(timezone.local_minus_utc()));

        Self {
            max,
            scope,
            day_start,
            day_end: day_start + TimeDelta::days(1),
        }
    }

    pub fn covers(&self, placed_at: DateTime<Utc>) -> bool {
        placed_at >= self.day_start && placed_at < self.day_end
    }

    pub fn check(&self, existing_today: i64, requested: i64) -> Result<(), OrderError> {
        let counted = match self.scope {
            CapScope::PerOrder => requested,
            CapScope::Cumulative => existing_today + requested,
        };

        if counted > i64::from(self.max) {
            return Err(OrderError::DailyMaxOrderReached { max: self.max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn day_boundaries_follow_the_configured_offset() {
        let tz = FixedOffset::east_opt(7 * 3600).unwrap();
        // 2025-03-10 20:00 UTC is already 2025-03-11 03:00 at +07:00.
        let cap = DailyCap::for_day(5, CapScope::Cumulative, at(2025, 3, 10, 20, 0), tz);

        assert_eq!(cap.day_start, at(2025, 3, 10, 17, 0));
        assert_eq!(cap.day_end, at(2025, 3, 11, 17, 0));
        assert!(cap.covers(at(2025, 3, 10, 17, 0)));
        assert!(!cap.covers(at(2025, 3, 10, 16, 59)));
        assert!(!cap.covers(at(2025, 3, 11, 17, 0)));
    }

    #[test]
    fn cumulative_cap_counts_earlier_orders() {
        let cap = DailyCap::for_day(5, CapScope::Cumulative, Utc::now(), FixedOffset::east_opt(0).unwrap());

        assert!(cap.check(2, 3).is_ok());
        assert!(matches!(
            cap.check(3, 3),
            Err(OrderError::DailyMaxOrderReached { max: 5 })
        ));
    }

    #[test]
    fn per_order_cap_ignores_earlier_orders() {
        let cap = DailyCap::for_day(5, CapScope::PerOrder, Utc::now(), FixedOffset::east_opt(0).unwrap());

        assert!(cap.check(3, 3).is_ok());
        assert!(cap.check(100, 5).is_ok());
        assert!(cap.check(0, 6).is_err());
    }

    #[test]
    fn parses_cap_scope() {
        assert_eq!("cumulative".parse::<CapScope>().unwrap(), CapScope::Cumulative);
        assert_eq!("PER_ORDER".parse::<CapScope>().unwrap(), CapScope::PerOrder);
        assert!("daily".parse::<CapScope>().is_err());
    }
}
