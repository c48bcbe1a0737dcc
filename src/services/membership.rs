//! Organizations and who belongs to them.
//!
//! Mutations record search index events in an [`Outbox`] and flush it only
//! after the transaction has committed.

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;

use super::{is_member, policy};
use crate::entities::{car, organization, organization_member, ride, user};
use crate::error::{AppError, AppResult, DomainError};
use crate::search::{IndexEvent, OrganizationDocument, Outbox, SearchIndex};
use crate::utils::geo::sort_by_distance;

pub struct OrganizationFields {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub description: Option<String>,
    pub control_question: String,
    pub control_answer: String,
}

#[derive(Default)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub control_question: Option<String>,
    pub control_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationStats {
    pub total_members: u64,
    pub total_drivers: u64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub last_ride_at: Option<DateTime<FixedOffset>>,
}

pub async fn find_organization<C: ConnectionTrait>(conn: &C, organization_id: Uuid) -> AppResult<organization::Model> {
    organization::Entity::find_by_id(organization_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))
}

async fn membership_count<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<u64> {
    let count = organization_member::Entity::find()
        .filter(organization_member::Column::UserId.eq(user_id))
        .count(conn)
        .await?;
    Ok(count)
}

/// Add a membership row. Returns false when the user already belongs to the
/// organization, including when a concurrent join committed first.
pub async fn insert_member<C: ConnectionTrait>(conn: &C, organization_id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let member = organization_member::ActiveModel {
        organization_id: Set(organization_id),
        user_id: Set(user_id),
        joined_at: Set(Utc::now().into()),
    };
    let inserted = organization_member::Entity::insert(member)
        .on_conflict(
            OnConflict::columns([
                organization_member::Column::OrganizationId,
                organization_member::Column::UserId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(inserted > 0)
}

pub async fn create_organization(
    db: &DatabaseConnection,
    index: &dyn SearchIndex,
    creator_id: Uuid,
    limit: u64,
    fields: OrganizationFields,
) -> AppResult<organization::Model> {
    let txn = db.begin().await?;

    if membership_count(&txn, creator_id).await? >= limit {
        return Err(DomainError::OrganizationLimit.into());
    }

    let org = organization::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(fields.name),
        latitude: Set(fields.latitude),
        longitude: Set(fields.longitude),
        address: Set(fields.address),
        description: Set(fields.description),
        creator_id: Set(creator_id),
        control_question: Set(fields.control_question),
        control_answer: Set(fields.control_answer),
        created_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;
    insert_member(&txn, org.id, creator_id).await?;

    let mut outbox = Outbox::new();
    outbox.push(IndexEvent::Upsert(OrganizationDocument::from(&org)));

    txn.commit().await?;
    outbox.flush(index).await;

    tracing::info!(organization_id = %org.id, creator_id = %creator_id, "Organization created");
    Ok(org)
}

pub async fn update_organization(
    db: &DatabaseConnection,
    index: &dyn SearchIndex,
    actor_id: Uuid,
    organization_id: Uuid,
    changes: OrganizationChanges,
) -> AppResult<organization::Model> {
    let txn = db.begin().await?;

    let org = find_organization(&txn, organization_id).await?;
    policy::check_organization_owner(actor_id, &org)?;

    let mut active: organization::ActiveModel = org.into();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(latitude) = changes.latitude {
        active.latitude = Set(latitude);
    }
    if let Some(longitude) = changes.longitude {
        active.longitude = Set(longitude);
    }
    if let Some(address) = changes.address {
        active.address = Set(Some(address));
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    if let Some(question) = changes.control_question {
        active.control_question = Set(question);
    }
    if let Some(answer) = changes.control_answer {
        active.control_answer = Set(answer);
    }
    let org = active.update(&txn).await?;

    let mut outbox = Outbox::new();
    outbox.push(IndexEvent::Upsert(OrganizationDocument::from(&org)));

    txn.commit().await?;
    outbox.flush(index).await;

    tracing::info!(organization_id = %org.id, "Organization updated");
    Ok(org)
}

pub async fn delete_organization(
    db: &DatabaseConnection,
    index: &dyn SearchIndex,
    actor_id: Uuid,
    organization_id: Uuid,
) -> AppResult<()> {
    let txn = db.begin().await?;

    let org = find_organization(&txn, organization_id).await?;
    policy::check_organization_owner(actor_id, &org)?;
    organization::Entity::delete_by_id(org.id).exec(&txn).await?;

    let mut outbox = Outbox::new();
    outbox.push(IndexEvent::Remove(org.id));

    txn.commit().await?;
    outbox.flush(index).await;

    tracing::info!(organization_id = %org.id, "Organization deleted");
    Ok(())
}

/// Answering correctly is idempotent for existing members.
pub async fn join_organization(
    db: &DatabaseConnection,
    user_id: Uuid,
    organization_id: Uuid,
    answer: &str,
    limit: u64,
) -> AppResult<organization::Model> {
    let txn = db.begin().await?;

    let org = find_organization(&txn, organization_id).await?;
    let member = is_member(&txn, org.id, user_id).await?;
    let memberships = membership_count(&txn, user_id).await?;

    if policy::check_join_organization(&org, answer, member, memberships, limit)?
        && insert_member(&txn, org.id, user_id).await?
    {
        tracing::info!(organization_id = %org.id, user_id = %user_id, "User joined organization");
    }

    txn.commit().await?;
    Ok(org)
}

pub async fn leave_organization(db: &DatabaseConnection, user_id: Uuid, organization_id: Uuid) -> AppResult<()> {
    let org = find_organization(db, organization_id).await?;
    let member = is_member(db, org.id, user_id).await?;
    policy::check_leave_organization(user_id, &org, member)?;

    organization_member::Entity::delete_by_id((org.id, user_id))
        .exec(db)
        .await?;

    tracing::info!(organization_id = %org.id, user_id = %user_id, "User left organization");
    Ok(())
}

pub async fn list_organizations(db: &DatabaseConnection) -> AppResult<Vec<organization::Model>> {
    let orgs = organization::Entity::find()
        .order_by_asc(organization::Column::Name)
        .all(db)
        .await?;
    Ok(orgs)
}

pub async fn my_organizations<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<Vec<organization::Model>> {
    let ids: Vec<Uuid> = organization_member::Entity::find()
        .filter(organization_member::Column::UserId.eq(user_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| m.organization_id)
        .collect();

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let orgs = organization::Entity::find()
        .filter(organization::Column::Id.is_in(ids))
        .order_by_asc(organization::Column::Name)
        .all(conn)
        .await?;
    Ok(orgs)
}

/// The user's organizations, closest to (`latitude`, `longitude`) first.
pub async fn nearest_organizations(
    db: &DatabaseConnection,
    user_id: Uuid,
    latitude: f64,
    longitude: f64,
) -> AppResult<Vec<(organization::Model, f64)>> {
    let orgs = my_organizations(db, user_id).await?;
    Ok(sort_by_distance(orgs, latitude, longitude, |o| (o.latitude, o.longitude)))
}

pub async fn control_question(db: &DatabaseConnection, organization_id: Uuid) -> AppResult<String> {
    Ok(find_organization(db, organization_id).await?.control_question)
}

/// Only members may see who else belongs.
pub async fn members(db: &DatabaseConnection, user_id: Uuid, organization_id: Uuid) -> AppResult<Vec<user::Model>> {
    let org = find_organization(db, organization_id).await?;
    if !is_member(db, org.id, user_id).await? {
        return Err(DomainError::NotInOrganization.into());
    }

    let ids: Vec<Uuid> = organization_member::Entity::find()
        .filter(organization_member::Column::OrganizationId.eq(org.id))
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .order_by_asc(user::Column::LastName)
        .order_by_asc(user::Column::FirstName)
        .all(db)
        .await?;
    Ok(users)
}

pub async fn search(
    db: &DatabaseConnection,
    index: &dyn SearchIndex,
    text: &str,
    limit: usize,
) -> AppResult<Vec<organization::Model>> {
    let ids = index.query(text, limit).await?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut found = organization::Entity::find()
        .filter(organization::Column::Id.is_in(ids.clone()))
        .all(db)
        .await?;

    // Keep rank order; ids the index knows but the database no longer has are skipped.
    found.sort_by_key(|org| ids.iter().position(|id| *id == org.id));
    Ok(found)
}

pub async fn organization_stats<C: ConnectionTrait>(conn: &C, organization_id: Uuid) -> AppResult<OrganizationStats> {
    let member_ids: Vec<Uuid> = organization_member::Entity::find()
        .filter(organization_member::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    let total_drivers = if member_ids.is_empty() {
        0
    } else {
        let mut owners: Vec<Uuid> = car::Entity::find()
            .filter(car::Column::OwnerId.is_in(member_ids.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|c| c.owner_id)
            .collect();
        owners.sort();
        owners.dedup();
        owners.len() as u64
    };

    let rides = ride::Entity::find()
        .filter(ride::Column::OrganizationId.eq(organization_id))
        .all(conn)
        .await?;
    let prices = policy::price_range(rides.iter().map(|r| r.price));
    let last_ride_at = rides.iter().map(|r| r.start_time).max();

    Ok(OrganizationStats {
        total_members: member_ids.len() as u64,
        total_drivers,
        min_price: prices.map(|(lo, _)| lo),
        max_price: prices.map(|(_, hi)| hi),
        last_ride_at,
    })
}
