//! Checkout: turns requested meal lines into a persisted order.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    domain::{
        actor::{Role, RoleData, RoleProfile},
        cart::CartReference,
        errors::OrderError,
        order::{DailyCap, DraftLine, NewHistory, OrderAggregate, OrderDraft},
        status::OrderStatus,
    },
    platform::config::OrderConfig,
    repository::{DirectoryRepository, OrderRepository},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
pub struct CheckoutLine {
    pub meal_id: i32,
    pub quantity: i32,
}

/// Member the order belongs to, and the cart the caller checked out from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Recipient {
    member_id: i32,
    cart: CartReference,
}

/// Validates and persists an order for `user_id`. Nothing is written unless every
/// meal resolves, the caller resolves to a member and the daily cap holds.
pub async fn place_order<R>(
    repo: &R,
    config: &OrderConfig,
    user_id: i32,
    lines: &[CheckoutLine],
    now: DateTime<Utc>,
) -> Result<OrderAggregate, OrderError>
where
    R: DirectoryRepository + OrderRepository + ?Sized,
{
    let lines = merge_lines(lines)?;

    let mut draft_lines = Vec::with_capacity(lines.len());
    for line in &lines {
        let meal = repo
            .meal_by_id(line.meal_id)
            .await?
            .ok_or(OrderError::MealNotFound(line.meal_id))?;
        draft_lines.push(DraftLine {
            meal_id: meal.meal.id,
            partner_id: meal.partner.id,
            quantity: line.quantity,
        });
    }

    let profile = repo
        .role_data_by_user_id(user_id)
        .await?
        .ok_or(OrderError::UserNotFound(user_id))?;
    let recipient = resolve_recipient(repo, &profile).await?;

    let cap = DailyCap::for_day(config.max_member, config.cap_scope, now, config.timezone);
    let draft = OrderDraft {
        member_id: recipient.member_id,
        user_id: profile.user.id,
        lines: draft_lines,
        first_history: NewHistory {
            user_id: Some(profile.user.id),
            status: OrderStatus::Placed,
            description: OrderStatus::Placed.describe(&profile.user.name),
        },
        clear_cart: config.clear_cart_on_checkout.then_some(recipient.cart),
    };
    // Rechecked against today's orders inside `place_order`.
    cap.check(0, draft.total_quantity())?;

    let aggregate = repo.place_order(draft, cap).await?;
    info!(
        order_id = aggregate.order.id,
        member_id = aggregate.order.member_id,
        user_id,
        quantity = aggregate.total_quantity(),
        "Order placed"
    );

    Ok(aggregate)
}

/// Rejects empty or non-positive requests and folds repeated meals into one line.
fn merge_lines(lines: &[CheckoutLine]) -> Result<Vec<CheckoutLine>, OrderError> {
    if lines.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut merged: Vec<CheckoutLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity < 1 {
            return Err(OrderError::InvalidQuantity(line.quantity));
        }
        match merged.iter_mut().find(|seen| seen.meal_id == line.meal_id) {
            Some(seen) => {
                seen.quantity = seen
                    .quantity
                    .checked_add(line.quantity)
                    .ok_or(OrderError::QuantityTooLarge(line.meal_id))?;
            }
            None => merged.push(*line),
        }
    }

    Ok(merged)
}

async fn resolve_recipient<R>(repo: &R, profile: &RoleProfile) -> Result<Recipient, OrderError>
where
    R: DirectoryRepository + ?Sized,
{
    match (profile.role(), &profile.data) {
        (Role::Member, RoleData::Member(member)) => Ok(Recipient {
            member_id: member.id,
            cart: CartReference::Member(member.id),
        }),
        (Role::Member, _) => Err(OrderError::MemberNotFound),
        (Role::Caregiver, RoleData::Caregiver(caregiver)) => {
            let member_id = caregiver.member_id.ok_or(OrderError::MemberNotFound)?;
            let member = repo
                .member_by_id(member_id)
                .await?
                .ok_or(OrderError::MemberNotFound)?;
            Ok(Recipient {
                member_id: member.id,
                cart: CartReference::Caregiver(caregiver.id),
            })
        }
        (Role::Caregiver, _) => Err(OrderError::CaregiverNotFound),
        (role, _) => Err(OrderError::RoleCannotOrder(role)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::CapScope;
    use crate::repository::memory::MemoryRepository;

    fn line(meal_id: i32, quantity: i32) -> CheckoutLine {
        CheckoutLine { meal_id, quantity }
    }

    #[test]
    fn repeated_meals_are_merged() {
        let merged = merge_lines(&[line(1, 2), line(2, 1), line(1, 1)]).unwrap();
        assert_eq!(merged, vec![line(1, 3), line(2, 1)]);
    }

    #[test]
    fn empty_and_non_positive_requests_are_rejected() {
        assert!(matches!(merge_lines(&[]), Err(OrderError::EmptyOrder)));
        assert!(matches!(
            merge_lines(&[line(1, 1), line(2, 0)]),
            Err(OrderError::InvalidQuantity(0))
        ));
    }

    #[tokio::test]
    async fn overflowing_repeated_lines_are_rejected() {
        let repo = MemoryRepository::new();
        let (user, _) = repo.add_member("Ana", "Lim");
        let (_, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");

        let err = place_order(
            &repo,
            &OrderConfig::default(),
            user.id,
            &[line(soup.id, i32::MAX), line(soup.id, 1)],
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OrderError::QuantityTooLarge(id) if id == soup.id));
        assert!(repo.orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_meal_aborts_before_anything_is_written() {
        let repo = MemoryRepository::new();
        let (user, _) = repo.add_member("Ana", "Lim");
        let (_, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");

        let err = place_order(
            &repo,
            &OrderConfig::default(),
            user.id,
            &[line(soup.id, 1), line(999, 1)],
            Utc::now(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OrderError::MealNotFound(999)));
        assert!(repo.orders().await.unwrap().is_empty());
        assert!(repo.published().is_empty());
    }

    #[tokio::test]
    async fn caregiver_orders_are_attributed_to_their_member() {
        let repo = MemoryRepository::new();
        let (_, member) = repo.add_member("Ana", "Lim");
        let (caregiver_user, _) = repo.add_caregiver("Ben", "Lim", Some(member.id));
        let (_, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");

        let aggregate = place_order(
            &repo,
            &OrderConfig::default(),
            caregiver_user.id,
            &[line(soup.id, 2)],
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(aggregate.order.member_id, member.id);
        assert_eq!(aggregate.order.user_id, caregiver_user.id);
        assert_eq!(
            aggregate.histories[0].description,
            "Order was Placed by Ben Lim."
        );
    }

    #[tokio::test]
    async fn detached_caregivers_and_other_roles_cannot_order() {
        let repo = MemoryRepository::new();
        let (caregiver_user, _) = repo.add_caregiver("Ben", "Lim", None);
        let (partner_user, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");
        let config = OrderConfig::default();

        let err = place_order(&repo, &config, caregiver_user.id, &[line(soup.id, 1)], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::MemberNotFound));

        let err = place_order(&repo, &config, partner_user.id, &[line(soup.id, 1)], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::RoleCannotOrder(Role::Partner)));

        let err = place_order(&repo, &config, 4242, &[line(soup.id, 1)], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::UserNotFound(4242)));
    }

    #[tokio::test]
    async fn a_single_oversized_order_is_rejected_in_either_scope() {
        let repo = MemoryRepository::new();
        let (user, _) = repo.add_member("Ana", "Lim");
        let (_, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");

        for scope in [CapScope::PerOrder, CapScope::Cumulative] {
            let config = OrderConfig {
                cap_scope: scope,
                ..OrderConfig::default()
            };
            let err = place_order(&repo, &config, user.id, &[line(soup.id, 6)], Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, OrderError::DailyMaxOrderReached { max: 5 }));
        }
    }
}
