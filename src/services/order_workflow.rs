use tracing::info;

use crate::{
    domain::{
        actor::{Actor, RoleProfile},
        errors::OrderError,
        order::{NewHistory, Order, OrderAggregate, TransitionRecord},
        status::{OrderStatus, Trigger},
    },
    repository::OrderRepository,
};

/// Validates `order.status -> to` for `trigger` and writes the status change
/// together with its history row. Illegal moves write nothing.
pub async fn apply_transition<R>(
    repo: &R,
    order: &Order,
    to: OrderStatus,
    trigger: Trigger,
    actor: &Actor,
) -> Result<OrderAggregate, OrderError>
where
    R: OrderRepository + ?Sized,
{
    if order.is_deleted() {
        return Err(OrderError::OrderNotFound(order.id));
    }

    let from = order.status();
    if !from.can_transition(to, trigger) {
        return Err(OrderError::InvalidTransition { from, to });
    }

    let record = TransitionRecord {
        order_id: order.id,
        member_id: order.member_id,
        from,
        to,
        expected_version: order.version,
        history: NewHistory {
            user_id: actor.user_id(),
            status: to,
            description: to.describe(actor.label()),
        },
    };
    let aggregate = repo.append_transition(record).await?;

    info!(
        order_id = order.id,
        from = %from,
        to = %to,
        actor = actor.label(),
        "Order transitioned"
    );
    Ok(aggregate)
}

pub async fn transition<R>(
    repo: &R,
    order_id: i32,
    to: OrderStatus,
    trigger: Trigger,
    actor: &Actor,
) -> Result<OrderAggregate, OrderError>
where
    R: OrderRepository + ?Sized,
{
    let aggregate = live_order(repo, order_id).await?;
    apply_transition(repo, &aggregate.order, to, trigger, actor).await
}

/// Status change requested by a signed-in user. The trigger follows from the
/// target status and the caller has to be entitled to it on this order.
pub async fn manual_transition<R>(
    repo: &R,
    order_id: i32,
    to: OrderStatus,
    profile: &RoleProfile,
) -> Result<OrderAggregate, OrderError>
where
    R: OrderRepository + ?Sized,
{
    let aggregate = live_order(repo, order_id).await?;
    let Some(trigger) = to.manual_trigger() else {
        return Err(OrderError::InvalidTransition {
            from: aggregate.order.status(),
            to,
        });
    };

    if !may_trigger(profile, &aggregate, trigger) {
        return Err(OrderError::Forbidden(format!(
            "User #{} cannot move order #{} to {}",
            profile.user.id, order_id, to
        )));
    }

    apply_transition(repo, &aggregate.order, to, trigger, &Actor::from(profile)).await
}

/// Admins, the member the order is for (or their caregiver), partners with a line on it.
pub fn can_view(profile: &RoleProfile, aggregate: &OrderAggregate) -> bool {
    profile.is_admin()
        || aggregate.order.user_id == profile.user.id
        || is_recipient(profile, aggregate)
        || is_supplier(profile, aggregate)
}

fn may_trigger(profile: &RoleProfile, aggregate: &OrderAggregate, trigger: Trigger) -> bool {
    if profile.is_admin() {
        return true;
    }

    match trigger {
        Trigger::PartnerAction => is_supplier(profile, aggregate),
        Trigger::RecipientAction => is_recipient(profile, aggregate),
        Trigger::ExplicitCancel => {
            is_recipient(profile, aggregate) || is_supplier(profile, aggregate)
        }
        Trigger::Scheduler => false,
    }
}

fn is_recipient(profile: &RoleProfile, aggregate: &OrderAggregate) -> bool {
    profile.represented_member_id() == Some(aggregate.order.member_id)
}

fn is_supplier(profile: &RoleProfile, aggregate: &OrderAggregate) -> bool {
    profile
        .partner()
        .is_some_and(|partner| aggregate.has_partner(partner.id))
}

async fn live_order<R>(repo: &R, order_id: i32) -> Result<OrderAggregate, OrderError>
where
    R: OrderRepository + ?Sized,
{
    repo.order_by_id(order_id)
        .await?
        .filter(|aggregate| !aggregate.order.is_deleted())
        .ok_or(OrderError::OrderNotFound(order_id))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        domain::actor::Role,
        platform::config::OrderConfig,
        repository::{DirectoryRepository, memory::MemoryRepository},
        services::order_builder::{CheckoutLine, place_order},
    };

    struct Fixture {
        repo: MemoryRepository,
        member: RoleProfile,
        partner: RoleProfile,
        order_id: i32,
    }

    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let (member_user, _) = repo.add_member("Ana", "Lim");
        let (partner_user, partner) = repo.add_partner("Green Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");

        let aggregate = place_order(
            &repo,
            &OrderConfig::default(),
            member_user.id,
            &[CheckoutLine {
                meal_id: soup.id,
                quantity: 1,
            }],
            Utc::now(),
        )
        .await
        .unwrap();

        let member = repo.role_data_by_user_id(member_user.id).await.unwrap().unwrap();
        let partner = repo.role_data_by_user_id(partner_user.id).await.unwrap().unwrap();
        Fixture {
            repo,
            member,
            partner,
            order_id: aggregate.order.id,
        }
    }

    #[tokio::test]
    async fn partner_walks_the_order_through_preparation() {
        let fx = fixture().await;

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::BeingPrepared,
            OrderStatus::Prepared,
        ] {
            let aggregate = manual_transition(&fx.repo, fx.order_id, status, &fx.partner)
                .await
                .unwrap();
            assert_eq!(aggregate.order.status(), status);
            assert!(aggregate.status_matches_history());
        }

        let aggregate = fx.repo.order_by_id(fx.order_id).await.unwrap().unwrap();
        assert_eq!(aggregate.histories.len(), 4);
        assert_eq!(
            aggregate.histories[2].description,
            "Order is Being Prepared by Green Kitchen."
        );
        assert!(aggregate.history_is_valid_path());
    }

    #[tokio::test]
    async fn members_cannot_confirm_and_foreign_partners_are_forbidden() {
        let fx = fixture().await;
        let (other_user, _) = fx.repo.add_partner("Other Kitchen");
        let other = fx.repo.role_data_by_user_id(other_user.id).await.unwrap().unwrap();

        let err = manual_transition(&fx.repo, fx.order_id, OrderStatus::Confirmed, &fx.member)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));

        let err = manual_transition(&fx.repo, fx.order_id, OrderStatus::Confirmed, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden(_)));

        let aggregate = fx.repo.order_by_id(fx.order_id).await.unwrap().unwrap();
        assert_eq!(aggregate.histories.len(), 1);
    }

    #[tokio::test]
    async fn scheduler_only_statuses_cannot_be_set_by_hand() {
        let fx = fixture().await;
        let admin_user = fx.repo.add_user("Root", Role::Admin);
        let admin = fx.repo.role_data_by_user_id(admin_user.id).await.unwrap().unwrap();

        let err = manual_transition(&fx.repo, fx.order_id, OrderStatus::Delivered, &admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Placed,
                to: OrderStatus::Delivered
            }
        ));
    }

    #[tokio::test]
    async fn owner_can_cancel_until_delivery() {
        let fx = fixture().await;

        let aggregate = manual_transition(&fx.repo, fx.order_id, OrderStatus::Cancelled, &fx.member)
            .await
            .unwrap();
        assert_eq!(aggregate.order.status(), OrderStatus::Cancelled);
        assert_eq!(
            aggregate.latest_history().unwrap().description,
            "Order was Cancelled by Ana Lim. No further action will be taken."
        );

        let err = manual_transition(&fx.repo, fx.order_id, OrderStatus::Cancelled, &fx.member)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn stale_versions_are_refused() {
        let fx = fixture().await;
        let stale = fx.repo.order_by_id(fx.order_id).await.unwrap().unwrap().order;
        let actor = Actor::from(&fx.partner);

        apply_transition(&fx.repo, &stale, OrderStatus::Confirmed, Trigger::PartnerAction, &actor)
            .await
            .unwrap();
        let err = apply_transition(
            &fx.repo,
            &stale,
            OrderStatus::Cancelled,
            Trigger::ExplicitCancel,
            &actor,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, OrderError::ConcurrentModification(id) if id == fx.order_id));
        let aggregate = fx.repo.order_by_id(fx.order_id).await.unwrap().unwrap();
        assert_eq!(aggregate.order.status(), OrderStatus::Confirmed);
        assert_eq!(aggregate.histories.len(), 2);
    }

    #[tokio::test]
    async fn visibility_follows_involvement() {
        let fx = fixture().await;
        let aggregate = fx.repo.order_by_id(fx.order_id).await.unwrap().unwrap();
        let (stranger_user, _) = fx.repo.add_member("Cy", "Tan");
        let stranger = fx.repo.role_data_by_user_id(stranger_user.id).await.unwrap().unwrap();

        assert!(can_view(&fx.member, &aggregate));
        assert!(can_view(&fx.partner, &aggregate));
        assert!(!can_view(&stranger, &aggregate));
    }
}
