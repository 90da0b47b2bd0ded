use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::PgRepository;
use crate::{
    domain::{
        cart::{Cart, CartReference, NewCartLine},
        errors::CartError,
    },
    models::{CartEntity, CreateCartEntity},
    repository::CartRepository,
    schema::carts,
};

fn into_carts(rows: Vec<CartEntity>) -> Result<Vec<Cart>> {
    rows.into_iter().map(Cart::try_from).collect()
}

#[async_trait]
impl CartRepository for PgRepository {
    async fn carts(&self) -> Result<Vec<Cart>> {
        let conn = &mut self.conn().await?;

        let rows: Vec<CartEntity> = carts::table
            .order_by(carts::id.asc())
            .select(CartEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get carts")?;

        into_carts(rows)
    }

    async fn carts_by_reference(&self, reference: CartReference) -> Result<Vec<Cart>> {
        let conn = &mut self.conn().await?;

        let rows: Vec<CartEntity> = carts::table
            .filter(carts::reference_id.eq(reference.reference_id()))
            .filter(carts::reference_type.eq(reference.reference_type().as_str()))
            .order_by(carts::updated_at.desc())
            .select(CartEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get carts")?;

        into_carts(rows)
    }

    async fn cart_by_id(&self, id: i32) -> Result<Option<Cart>> {
        let conn = &mut self.conn().await?;

        let row: Option<CartEntity> = carts::table
            .find(id)
            .select(CartEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get cart")?;

        row.map(Cart::try_from).transpose()
    }

    async fn add_to_cart(&self, line: NewCartLine) -> Result<Cart, CartError> {
        let conn = &mut self.conn().await?;

        conn.transaction(move |conn| {
            Box::pin(async move {
                let existing: Option<CartEntity> = carts::table
                    .filter(carts::meal_id.eq(line.meal_id))
                    .filter(carts::reference_id.eq(line.reference.reference_id()))
                    .filter(carts::reference_type.eq(line.reference.reference_type().as_str()))
                    .select(CartEntity::as_select())
                    .for_update()
                    .get_result(conn)
                    .await
                    .optional()
                    .context("Failed to get existing cart line")?;

                let row: CartEntity = match existing {
                    Some(existing) => {
                        let quantity = existing
                            .quantity
                            .checked_add(line.quantity)
                            .ok_or(CartError::QuantityTooLarge(line.meal_id))?;
                        diesel::update(carts::table.find(existing.id))
                            .set((
                                carts::quantity.eq(quantity),
                                carts::updated_at.eq(Utc::now()),
                            ))
                            .returning(CartEntity::as_returning())
                            .get_result(conn)
                            .await
                            .context("Failed to update cart")?
                    }
                    None => diesel::insert_into(carts::table)
                        .values(CreateCartEntity {
                            meal_id: line.meal_id,
                            reference_id: line.reference.reference_id(),
                            reference_type: line.reference.reference_type().as_str(),
                            quantity: line.quantity,
                        })
                        .returning(CartEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to create cart")?,
                };

                Ok(Cart::try_from(row)?)
            })
        })
        .await
    }

    async fn update_cart_quantity(
        &self,
        id: i32,
        reference: CartReference,
        quantity: i32,
    ) -> Result<Option<Cart>> {
        let conn = &mut self.conn().await?;

        let row: Option<CartEntity> = diesel::update(
            carts::table
                .find(id)
                .filter(carts::reference_id.eq(reference.reference_id()))
                .filter(carts::reference_type.eq(reference.reference_type().as_str())),
        )
        .set((
            carts::quantity.eq(quantity),
            carts::updated_at.eq(Utc::now()),
        ))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to update cart")?;

        row.map(Cart::try_from).transpose()
    }

    async fn delete_cart(&self, id: i32, reference: CartReference) -> Result<Option<Cart>> {
        let conn = &mut self.conn().await?;

        let row: Option<CartEntity> = diesel::delete(
            carts::table
                .find(id)
                .filter(carts::reference_id.eq(reference.reference_id()))
                .filter(carts::reference_type.eq(reference.reference_type().as_str())),
        )
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await
        .optional()
        .context("Failed to delete cart")?;

        row.map(Cart::try_from).transpose()
    }
}
