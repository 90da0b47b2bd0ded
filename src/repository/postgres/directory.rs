use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use super::PgRepository;
use crate::{
    domain::{
        actor::{Role, RoleData, RoleProfile},
        directory::{Caregiver, MealWithPartner, Member, Partner},
    },
    models::{CaregiverEntity, MealEntity, MemberEntity, PartnerEntity, UserEntity},
    repository::DirectoryRepository,
    schema::{caregivers, meals, members, partners, users},
};

#[async_trait]
impl DirectoryRepository for PgRepository {
    async fn role_data_by_user_id(&self, user_id: i32) -> Result<Option<RoleProfile>> {
        let conn = &mut self.conn().await?;

        let user: Option<UserEntity> = users::table
            .find(user_id)
            .select(UserEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get user")?;
        let Some(user) = user else {
            return Ok(None);
        };
        let user = user.into_snapshot()?;

        let data = match user.role {
            Role::Member => members::table
                .filter(members::user_id.eq(user_id))
                .select(MemberEntity::as_select())
                .get_result(conn)
                .await
                .optional()
                .context("Failed to get member")?
                .map(|row| RoleData::Member(row.into())),
            Role::Caregiver => caregivers::table
                .filter(caregivers::user_id.eq(user_id))
                .select(CaregiverEntity::as_select())
                .get_result(conn)
                .await
                .optional()
                .context("Failed to get caregiver")?
                .map(|row| RoleData::Caregiver(row.into())),
            Role::Partner => partners::table
                .filter(partners::user_id.eq(user_id))
                .select(PartnerEntity::as_select())
                .get_result(conn)
                .await
                .optional()
                .context("Failed to get partner")?
                .map(|row| RoleData::Partner(row.into())),
            Role::Admin | Role::Patron | Role::Organization => None,
        }
        .unwrap_or(RoleData::None);

        Ok(Some(RoleProfile { user, data }))
    }

    async fn member_by_id(&self, id: i32) -> Result<Option<Member>> {
        let conn = &mut self.conn().await?;

        let member: Option<MemberEntity> = members::table
            .find(id)
            .select(MemberEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get member")?;

        Ok(member.map(Member::from))
    }

    async fn caregiver_by_id(&self, id: i32) -> Result<Option<Caregiver>> {
        let conn = &mut self.conn().await?;

        let caregiver: Option<CaregiverEntity> = caregivers::table
            .find(id)
            .select(CaregiverEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get caregiver")?;

        Ok(caregiver.map(Caregiver::from))
    }

    async fn partner_by_id(&self, id: i32) -> Result<Option<Partner>> {
        let conn = &mut self.conn().await?;

        let partner: Option<PartnerEntity> = partners::table
            .find(id)
            .select(PartnerEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get partner")?;

        Ok(partner.map(Partner::from))
    }

    async fn meal_by_id(&self, id: i32) -> Result<Option<MealWithPartner>> {
        let conn = &mut self.conn().await?;

        let meal: Option<(MealEntity, PartnerEntity)> = meals::table
            .inner_join(partners::table)
            .filter(meals::id.eq(id))
            .select((MealEntity::as_select(), PartnerEntity::as_select()))
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get meal")?;

        Ok(meal.map(|(meal, partner)| MealWithPartner {
            meal: meal.into(),
            partner: partner.into(),
        }))
    }
}
