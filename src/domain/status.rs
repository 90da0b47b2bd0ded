use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of an order, in the order an order normally walks through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    BeingPrepared,
    Prepared,
    PickedUp,
    OutForDelivery,
    Delivered,
    Completed,
    Cancelled,
}

/// What caused a transition. Each edge of the graph only accepts some triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    PartnerAction,
    RecipientAction,
    Scheduler,
    ExplicitCancel,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Placed,
        OrderStatus::Confirmed,
        OrderStatus::BeingPrepared,
        OrderStatus::Prepared,
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Value persisted in the `status` columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::BeingPrepared => "BEING_PREPARED",
            OrderStatus::Prepared => "PREPARED",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "Placed",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::BeingPrepared => "Being Prepared",
            OrderStatus::Prepared => "Prepared",
            OrderStatus::PickedUp => "Picked Up",
            OrderStatus::OutForDelivery => "Out For Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Anything before `Delivered` can still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        *self < OrderStatus::Delivered
    }

    /// Whether an order in this status still counts against the member's daily cap.
    pub fn counts_toward_daily_cap(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Completed | OrderStatus::Cancelled
        )
    }

    /// The trigger a human actor has to provide to move an order into `self`.
    /// `None` for statuses only the builder or the scheduler may set.
    pub fn manual_trigger(&self) -> Option<Trigger> {
        match self {
            OrderStatus::Confirmed | OrderStatus::BeingPrepared | OrderStatus::Prepared => {
                Some(Trigger::PartnerAction)
            }
            OrderStatus::Completed => Some(Trigger::RecipientAction),
            OrderStatus::Cancelled => Some(Trigger::ExplicitCancel),
            OrderStatus::Placed
            | OrderStatus::PickedUp
            | OrderStatus::OutForDelivery
            | OrderStatus::Delivered => None,
        }
    }

    /// Edge check without looking at the trigger. Used to validate recorded history.
    pub fn is_valid_step(&self, to: OrderStatus) -> bool {
        match (self, to) {
            (from, OrderStatus::Cancelled) => from.is_cancellable(),
            (OrderStatus::Placed, OrderStatus::Confirmed)
            | (OrderStatus::Confirmed, OrderStatus::BeingPrepared)
            | (OrderStatus::BeingPrepared, OrderStatus::Prepared)
            | (OrderStatus::Prepared, OrderStatus::PickedUp)
            | (OrderStatus::PickedUp, OrderStatus::OutForDelivery)
            | (OrderStatus::OutForDelivery, OrderStatus::Delivered)
            | (OrderStatus::Delivered, OrderStatus::Completed) => true,
            _ => false,
        }
    }

    pub fn can_transition(&self, to: OrderStatus, trigger: Trigger) -> bool {
        if !self.is_valid_step(to) {
            return false;
        }

        match to {
            OrderStatus::Cancelled => {
                matches!(trigger, Trigger::Scheduler | Trigger::ExplicitCancel)
            }
            OrderStatus::Confirmed | OrderStatus::BeingPrepared | OrderStatus::Prepared => {
                trigger == Trigger::PartnerAction
            }
            OrderStatus::PickedUp | OrderStatus::OutForDelivery | OrderStatus::Delivered => {
                trigger == Trigger::Scheduler
            }
            OrderStatus::Completed => trigger == Trigger::RecipientAction,
            OrderStatus::Placed => false,
        }
    }

    /// History description written when an order enters `self`.
    pub fn describe(&self, actor: &str) -> String {
        match self {
            OrderStatus::Placed => format!("Order was Placed by {actor}."),
            OrderStatus::Confirmed => format!("Order was Confirmed by {actor}."),
            OrderStatus::BeingPrepared => format!("Order is Being Prepared by {actor}."),
            OrderStatus::Prepared => {
                format!("Order was Prepared by {actor} and is waiting to be picked up.")
            }
            OrderStatus::PickedUp => "Order was Picked Up and is on its way.".to_string(),
            OrderStatus::OutForDelivery => "Order is Out For Delivery.".to_string(),
            OrderStatus::Delivered => "Order was Delivered.".to_string(),
            OrderStatus::Completed => format!("Order was Completed by {actor}."),
            OrderStatus::Cancelled => {
                format!("Order was Cancelled by {actor}. No further action will be taken.")
            }
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_a_chain_of_valid_steps() {
        let path = [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::BeingPrepared,
            OrderStatus::Prepared,
            OrderStatus::PickedUp,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].is_valid_step(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn cancel_is_reachable_only_before_delivery() {
        for status in OrderStatus::ALL {
            let expected = status < OrderStatus::Delivered;
            assert_eq!(status.is_valid_step(OrderStatus::Cancelled), expected, "{status}");
        }
    }

    #[test]
    fn rejects_skips_and_backwards_moves() {
        assert!(!OrderStatus::Delivered.is_valid_step(OrderStatus::Confirmed));
        assert!(!OrderStatus::Delivered.is_valid_step(OrderStatus::Placed));
        assert!(!OrderStatus::Placed.is_valid_step(OrderStatus::Prepared));
        assert!(!OrderStatus::Cancelled.is_valid_step(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.is_valid_step(OrderStatus::Cancelled));
    }

    #[test]
    fn triggers_are_enforced_per_edge() {
        use OrderStatus::*;

        assert!(Placed.can_transition(Confirmed, Trigger::PartnerAction));
        assert!(!Placed.can_transition(Confirmed, Trigger::Scheduler));
        assert!(Prepared.can_transition(PickedUp, Trigger::Scheduler));
        assert!(!Prepared.can_transition(PickedUp, Trigger::PartnerAction));
        assert!(Delivered.can_transition(Completed, Trigger::RecipientAction));
        assert!(!Delivered.can_transition(Completed, Trigger::PartnerAction));
        assert!(Placed.can_transition(Cancelled, Trigger::Scheduler));
        assert!(OutForDelivery.can_transition(Cancelled, Trigger::ExplicitCancel));
        assert!(!OutForDelivery.can_transition(Cancelled, Trigger::PartnerAction));
    }

    #[test]
    fn parses_persisted_values() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn descriptions_name_the_actor() {
        assert_eq!(
            OrderStatus::Placed.describe("Jane Doe"),
            "Order was Placed by Jane Doe."
        );
        assert_eq!(
            OrderStatus::Cancelled.describe("MealCare System"),
            "Order was Cancelled by MealCare System. No further action will be taken."
        );
        assert_eq!(
            OrderStatus::PickedUp.describe("ignored"),
            "Order was Picked Up and is on its way."
        );
    }
}
