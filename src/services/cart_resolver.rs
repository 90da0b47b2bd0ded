//! Turns the `(reference_id, reference_type)` pair stored on a cart line into
//! the member or caregiver that owns it.

use std::collections::HashMap;

use crate::{
    domain::{
        actor::{RoleData, RoleProfile},
        cart::{Cart, CartOwner, CartReference, ResolvedCart},
        errors::CartError,
    },
    repository::DirectoryRepository,
};

/// The cart a caller adds to and checks out from.
pub fn reference_for(profile: &RoleProfile) -> Result<CartReference, CartError> {
    match &profile.data {
        RoleData::Member(member) => Ok(CartReference::Member(member.id)),
        RoleData::Caregiver(caregiver) => Ok(CartReference::Caregiver(caregiver.id)),
        RoleData::Partner(_) | RoleData::None => Err(CartError::RoleCannotHoldCart(profile.role())),
    }
}

pub async fn resolve_owner<R>(repo: &R, reference: CartReference) -> Result<CartOwner, CartError>
where
    R: DirectoryRepository + ?Sized,
{
    let owner = match reference {
        CartReference::Member(id) => repo.member_by_id(id).await?.map(CartOwner::Member),
        CartReference::Caregiver(id) => repo.caregiver_by_id(id).await?.map(CartOwner::Caregiver),
    };

    owner.ok_or(CartError::NotFound(reference))
}

/// Same as [`resolve_owner`] for the raw stored columns.
pub async fn resolve_owner_parts<R>(
    repo: &R,
    reference_id: i32,
    reference_type: &str,
) -> Result<CartOwner, CartError>
where
    R: DirectoryRepository + ?Sized,
{
    let reference = CartReference::from_parts(reference_id, reference_type)?;
    resolve_owner(repo, reference).await
}

pub async fn resolve_cart<R>(repo: &R, cart: Cart) -> Result<ResolvedCart, CartError>
where
    R: DirectoryRepository + ?Sized,
{
    let owner = resolve_owner(repo, cart.reference).await?;
    Ok(attach(cart, owner))
}

/// Resolves every line, looking each distinct owner up once.
pub async fn resolve_carts<R>(repo: &R, carts: Vec<Cart>) -> Result<Vec<ResolvedCart>, CartError>
where
    R: DirectoryRepository + ?Sized,
{
    let mut owners: HashMap<CartReference, CartOwner> = HashMap::new();
    let mut resolved = Vec::with_capacity(carts.len());

    for cart in carts {
        let owner = match owners.get(&cart.reference) {
            Some(owner) => owner.clone(),
            None => {
                let owner = resolve_owner(repo, cart.reference).await?;
                owners.insert(cart.reference, owner.clone());
                owner
            }
        };
        resolved.push(attach(cart, owner));
    }

    Ok(resolved)
}

fn attach(cart: Cart, owner: CartOwner) -> ResolvedCart {
    ResolvedCart {
        id: cart.id,
        meal_id: cart.meal_id,
        quantity: cart.quantity,
        owner,
        created_at: cart.created_at,
        updated_at: cart.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{actor::Role, cart::NewCartLine},
        repository::{CartRepository, DirectoryRepository, memory::MemoryRepository},
    };

    #[tokio::test]
    async fn resolves_member_and_caregiver_owners() {
        let repo = MemoryRepository::new();
        let (_, member) = repo.add_member("Ana", "Lim");
        let (_, caregiver) = repo.add_caregiver("Ben", "Lim", Some(member.id));

        match resolve_owner(&repo, CartReference::Member(member.id)).await.unwrap() {
            CartOwner::Member(found) => assert_eq!(found.allergies, member.allergies),
            other => panic!("expected a member, got {other:?}"),
        }
        match resolve_owner(&repo, CartReference::Caregiver(caregiver.id)).await.unwrap() {
            CartOwner::Caregiver(found) => assert_eq!(found.member_id, Some(member.id)),
            other => panic!("expected a caregiver, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reports_missing_owners_and_bad_reference_types() {
        let repo = MemoryRepository::new();

        let err = resolve_owner(&repo, CartReference::Member(404)).await.unwrap_err();
        assert!(matches!(err, CartError::NotFound(CartReference::Member(404))));

        let err = resolve_owner_parts(&repo, 1, "PATRON").await.unwrap_err();
        assert!(matches!(err, CartError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn list_resolution_keeps_line_order() {
        let repo = MemoryRepository::new();
        let (_, member) = repo.add_member("Ana", "Lim");
        let (_, partner) = repo.add_partner("Kitchen");
        let soup = repo.add_meal(partner.id, "Soup");
        let rice = repo.add_meal(partner.id, "Rice");

        for meal_id in [soup.id, rice.id] {
            repo.add_to_cart(NewCartLine {
                meal_id,
                reference: CartReference::Member(member.id),
                quantity: 1,
            })
            .await
            .unwrap();
        }

        let carts = repo.carts().await.unwrap();
        let resolved = resolve_carts(&repo, carts.clone()).await.unwrap();

        assert_eq!(
            resolved.iter().map(|line| line.id).collect::<Vec<_>>(),
            carts.iter().map(|line| line.id).collect::<Vec<_>>()
        );
        assert!(
            resolved
                .iter()
                .all(|line| matches!(&line.owner, CartOwner::Member(owner) if owner.id == member.id))
        );
    }

    #[tokio::test]
    async fn partners_do_not_hold_carts() {
        let repo = MemoryRepository::new();
        let (user, _) = repo.add_partner("Kitchen");
        let profile = repo.role_data_by_user_id(user.id).await.unwrap().unwrap();

        let err = reference_for(&profile).unwrap_err();
        assert!(matches!(err, CartError::RoleCannotHoldCart(Role::Partner)));
    }
}
