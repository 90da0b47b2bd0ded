mod common;

use chrono::{TimeDelta, Utc};
use common::World;
use mealcare_orderservice::{
    domain::{
        actor::Actor,
        cart::{CartReference, NewCartLine},
        errors::OrderError,
        order::CapScope,
        status::{OrderStatus, Trigger},
    },
    platform::config::OrderConfig,
    repository::{CartRepository, OrderRepository},
    services::{
        cart_resolver::reference_for,
        order_builder::{CheckoutLine, place_order},
        order_workflow::{manual_transition, transition},
    },
};

fn per_order() -> OrderConfig {
    OrderConfig {
        cap_scope: CapScope::PerOrder,
        ..OrderConfig::default()
    }
}

#[tokio::test]
async fn member_checkout_then_partner_confirmation() {
    let world = World::new().await;
    let config = OrderConfig::default();
    let cart = CartReference::Member(world.member_id());

    for (meal_id, quantity) in [(world.meal_a.id, 2), (world.meal_b.id, 1)] {
        world
            .repo
            .add_to_cart(NewCartLine {
                meal_id,
                reference: cart,
                quantity,
            })
            .await
            .unwrap();
    }

    let placed = world
        .order(&config, &[(world.meal_a.id, 2), (world.meal_b.id, 1)])
        .await;

    assert_eq!(placed.order.status(), OrderStatus::Placed);
    assert_eq!(placed.meals.len(), 2);
    let line_a = placed.meals.iter().find(|line| line.meal_id == world.meal_a.id).unwrap();
    let line_b = placed.meals.iter().find(|line| line.meal_id == world.meal_b.id).unwrap();
    assert_eq!((line_a.quantity, line_a.partner_id), (2, world.meal_a.partner_id));
    assert_eq!((line_b.quantity, line_b.partner_id), (1, world.meal_b.partner_id));
    assert_eq!(placed.histories.len(), 1);
    assert_eq!(placed.histories[0].status, OrderStatus::Placed);
    assert_eq!(placed.histories[0].user_id, Some(world.member.user.id));
    assert!(world.repo.carts_by_reference(cart).await.unwrap().is_empty());

    let confirmed = manual_transition(
        &world.repo,
        placed.order.id,
        OrderStatus::Confirmed,
        &world.partner_a,
    )
    .await
    .unwrap();

    assert_eq!(confirmed.order.status(), OrderStatus::Confirmed);
    assert_eq!(confirmed.histories.len(), 2);
    assert_eq!(
        confirmed.histories[1].description,
        "Order was Confirmed by Harbour Kitchen."
    );
    assert!(confirmed.status_matches_history());
    assert!(confirmed.history_is_valid_path());

    let published = world.repo.published();
    assert_eq!(
        published.iter().map(|event| event.status).collect::<Vec<_>>(),
        vec![OrderStatus::Placed, OrderStatus::Confirmed]
    );
}

#[tokio::test]
async fn full_lifecycle_keeps_history_valid_and_status_cached() {
    let world = World::new().await;
    let order = world.order(&OrderConfig::default(), &[(world.meal_a.id, 1)]).await;
    let id = order.order.id;

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::BeingPrepared,
        OrderStatus::Prepared,
    ] {
        manual_transition(&world.repo, id, status, &world.partner_a)
            .await
            .unwrap();
    }
    for status in [
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        transition(&world.repo, id, status, Trigger::Scheduler, &Actor::System)
            .await
            .unwrap();
    }
    let completed = manual_transition(&world.repo, id, OrderStatus::Completed, &world.member)
        .await
        .unwrap();

    assert_eq!(completed.order.status(), OrderStatus::Completed);
    assert_eq!(completed.histories.len(), 8);
    assert!(completed.history_is_valid_path());
    assert!(completed.status_matches_history());
    assert!(
        completed.histories[4..7]
            .iter()
            .all(|entry| entry.user_id.is_none())
    );
    assert_eq!(
        completed.histories[4].description,
        "Order was Picked Up and is on its way."
    );

    let err = manual_transition(&world.repo, id, OrderStatus::Cancelled, &world.member)
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn illegal_transitions_write_no_history() {
    let world = World::new().await;
    let order = world.order(&OrderConfig::default(), &[(world.meal_a.id, 1)]).await;
    let id = order.order.id;

    manual_transition(&world.repo, id, OrderStatus::Confirmed, &world.partner_a)
        .await
        .unwrap();
    manual_transition(&world.repo, id, OrderStatus::BeingPrepared, &world.partner_a)
        .await
        .unwrap();
    manual_transition(&world.repo, id, OrderStatus::Prepared, &world.partner_a)
        .await
        .unwrap();
    for status in [
        OrderStatus::PickedUp,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        transition(&world.repo, id, status, Trigger::Scheduler, &Actor::System)
            .await
            .unwrap();
    }
    let before = world.repo.order_by_id(id).await.unwrap().unwrap();

    let err = transition(&world.repo, id, OrderStatus::Placed, Trigger::Scheduler, &Actor::System)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Placed
        }
    ));

    let err = manual_transition(&world.repo, id, OrderStatus::Confirmed, &world.partner_a)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Confirmed
        }
    ));

    let after = world.repo.order_by_id(id).await.unwrap().unwrap();
    assert_eq!(after.histories, before.histories);
    assert_eq!(after.order.version, before.order.version);
}

#[tokio::test]
async fn partner_snapshot_survives_meal_reassignment() {
    let world = World::new().await;
    let order = world.order(&OrderConfig::default(), &[(world.meal_a.id, 1)]).await;

    world
        .repo
        .reassign_meal(world.meal_a.id, world.meal_b.partner_id);

    let stored = world.repo.order_by_id(order.order.id).await.unwrap().unwrap();
    assert_eq!(stored.meals[0].partner_id, world.meal_a.partner_id);

    // The new supplier has no line on the order.
    let err = manual_transition(
        &world.repo,
        order.order.id,
        OrderStatus::Confirmed,
        &world.partner_b,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));
}

#[tokio::test]
async fn cumulative_cap_counts_the_days_open_orders() {
    let world = World::new().await;
    let config = OrderConfig::default();
    world.order(&config, &[(world.meal_a.id, 3)]).await;

    let err = world
        .try_order(&config, &[(world.meal_b.id, 3)])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::DailyMaxOrderReached { max: 5 }));
    assert_eq!(world.repo.orders().await.unwrap().len(), 1);

    world.order(&config, &[(world.meal_b.id, 2)]).await;
}

#[tokio::test]
async fn per_order_cap_only_looks_at_the_new_order() {
    let world = World::new().await;
    let config = per_order();
    world.order(&config, &[(world.meal_a.id, 3)]).await;

    let second = world.order(&config, &[(world.meal_b.id, 3)]).await;
    assert_eq!(second.total_quantity(), 3);

    let err = world
        .try_order(&config, &[(world.meal_a.id, 4), (world.meal_b.id, 2)])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::DailyMaxOrderReached { max: 5 }));
}

#[tokio::test]
async fn closed_and_previous_day_orders_do_not_count() {
    let world = World::new().await;
    let config = OrderConfig::default();

    let yesterday = world.order(&config, &[(world.meal_a.id, 5)]).await;
    world.repo.age_order(yesterday.order.id, TimeDelta::days(1));

    let cancelled = world.order(&config, &[(world.meal_a.id, 5)]).await;
    manual_transition(
        &world.repo,
        cancelled.order.id,
        OrderStatus::Cancelled,
        &world.member,
    )
    .await
    .unwrap();

    world.order(&config, &[(world.meal_b.id, 5)]).await;
}

#[tokio::test]
async fn caregiver_checkout_counts_against_the_member_and_clears_their_own_cart() {
    let world = World::new().await;
    let config = OrderConfig::default();
    let caregiver_cart = reference_for(&world.caregiver).unwrap();
    world
        .repo
        .add_to_cart(NewCartLine {
            meal_id: world.meal_a.id,
            reference: caregiver_cart,
            quantity: 3,
        })
        .await
        .unwrap();

    let lines = [CheckoutLine {
        meal_id: world.meal_a.id,
        quantity: 3,
    }];
    let order = place_order(
        &world.repo,
        &config,
        world.caregiver.user.id,
        &lines,
        Utc::now(),
    )
    .await
    .unwrap();

    assert_eq!(order.order.member_id, world.member_id());
    assert!(world.repo.carts_by_reference(caregiver_cart).await.unwrap().is_empty());

    let err = world
        .try_order(&config, &[(world.meal_b.id, 3)])
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::DailyMaxOrderReached { .. }));
}

#[tokio::test]
async fn failed_placement_leaves_no_order() {
    let world = World::new().await;
    world.repo.fail_placements();

    let err = world
        .try_order(&OrderConfig::default(), &[(world.meal_a.id, 1)])
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::FailedToCreateOrder(_)));
    assert!(world.repo.orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn carts_are_kept_when_clearing_is_disabled() {
    let world = World::new().await;
    let config = OrderConfig {
        clear_cart_on_checkout: false,
        ..OrderConfig::default()
    };
    let cart = CartReference::Member(world.member_id());
    world
        .repo
        .add_to_cart(NewCartLine {
            meal_id: world.meal_a.id,
            reference: cart,
            quantity: 1,
        })
        .await
        .unwrap();

    world.order(&config, &[(world.meal_a.id, 1)]).await;

    assert_eq!(world.repo.carts_by_reference(cart).await.unwrap().len(), 1);
}
