use super::{actor::Role, cart::CartReference, status::OrderStatus};

// Orders

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),

    #[error("Total quantity for meal #{0} is too large")]
    QuantityTooLarge(i32),

    #[error("An order must contain at least one meal")]
    EmptyOrder,

    #[error("Meal #{0} not found")]
    MealNotFound(i32),

    #[error("User #{0} not found")]
    UserNotFound(i32),

    #[error("Member not found")]
    MemberNotFound,

    #[error("Caregiver not found")]
    CaregiverNotFound,

    #[error("Order #{0} not found")]
    OrderNotFound(i32),

    #[error("Users with role {0} cannot place orders")]
    RoleCannotOrder(Role),

    #[error("Daily max order of {max} meals reached")]
    DailyMaxOrderReached { max: i32 },

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order #{0} was modified by someone else, reload and try again")]
    ConcurrentModification(i32),

    #[error("{0}")]
    Forbidden(String),

    #[error("Failed to create order")]
    FailedToCreateOrder(#[source] anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

// Carts

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Invalid cart reference type: {0}")]
    InvalidReference(String),

    #[error("No owner found for cart reference {0}")]
    NotFound(CartReference),

    #[error("Cart #{0} not found")]
    CartNotFound(i32),

    #[error("Meal #{0} not found")]
    MealNotFound(i32),

    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),

    #[error("Cart quantity for meal #{0} is too large")]
    QuantityTooLarge(i32),

    #[error("Users with role {0} cannot hold a cart")]
    RoleCannotHoldCart(Role),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
