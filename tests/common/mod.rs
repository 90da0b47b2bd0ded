#![allow(dead_code)]

use chrono::Utc;
use mealcare_orderservice::{
    domain::{actor::RoleProfile, directory::Meal, order::OrderAggregate},
    platform::config::OrderConfig,
    repository::{DirectoryRepository, memory::MemoryRepository},
    services::order_builder::{CheckoutLine, place_order},
};

/// One member, a caregiver attached to them and two partners with one meal each.
pub struct World {
    pub repo: MemoryRepository,
    pub member: RoleProfile,
    pub caregiver: RoleProfile,
    pub partner_a: RoleProfile,
    pub partner_b: RoleProfile,
    pub meal_a: Meal,
    pub meal_b: Meal,
}

impl World {
    pub async fn new() -> Self {
        let repo = MemoryRepository::new();
        let (member_user, member) = repo.add_member("Maya", "Santos");
        let (caregiver_user, _) = repo.add_caregiver("Carl", "Santos", Some(member.id));
        let (partner_a_user, partner_a) = repo.add_partner("Harbour Kitchen");
        let (partner_b_user, partner_b) = repo.add_partner("Hill Bakery");
        let meal_a = repo.add_meal(partner_a.id, "Vegetable Soup");
        let meal_b = repo.add_meal(partner_b.id, "Wholegrain Bread");

        let member = profile(&repo, member_user.id).await;
        let caregiver = profile(&repo, caregiver_user.id).await;
        let partner_a = profile(&repo, partner_a_user.id).await;
        let partner_b = profile(&repo, partner_b_user.id).await;

        Self {
            repo,
            member,
            caregiver,
            partner_a,
            partner_b,
            meal_a,
            meal_b,
        }
    }

    pub fn member_id(&self) -> i32 {
        self.member
            .represented_member_id()
            .expect("member profile is seeded")
    }

    pub async fn order(&self, config: &OrderConfig, lines: &[(i32, i32)]) -> OrderAggregate {
        self.try_order(config, lines)
            .await
            .expect("order should be placed")
    }

    pub async fn try_order(
        &self,
        config: &OrderConfig,
        lines: &[(i32, i32)],
    ) -> Result<OrderAggregate, mealcare_orderservice::domain::errors::OrderError> {
        let lines: Vec<CheckoutLine> = lines
            .iter()
            .map(|&(meal_id, quantity)| CheckoutLine { meal_id, quantity })
            .collect();
        place_order(&self.repo, config, self.member.user.id, &lines, Utc::now()).await
    }
}

pub async fn profile(repo: &MemoryRepository, user_id: i32) -> RoleProfile {
    repo.role_data_by_user_id(user_id)
        .await
        .expect("memory lookups do not fail")
        .expect("user is seeded")
}
