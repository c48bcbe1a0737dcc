mod common;

use carpool_backend::entities::{organization_member, user};
use carpool_backend::error::{AppError, DomainError};
use carpool_backend::search::{InMemorySearchIndex, SearchIndex};
use carpool_backend::services::accounts::{self, CarChanges, NewUser};
use carpool_backend::services::membership::{self, OrganizationChanges};
use carpool_backend::services::{is_driver, is_member, lifecycle};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use common::{ANSWER, ORGANIZATION_LIMIT, create_organization, create_user, join, setup_db, world};

fn domain(err: AppError) -> DomainError {
    match err {
        AppError::Domain(e) => e,
        other => panic!("expected a domain error, got {:?}", other),
    }
}

#[tokio::test]
async fn creator_is_a_member_and_cannot_leave() {
    let w = world().await;

    assert!(is_member(&w.db, w.org.id, w.creator.id).await.unwrap());

    let err = membership::leave_organization(&w.db, w.creator.id, w.org.id)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::CreatorCannotLeave);
}

#[tokio::test]
async fn joining_requires_the_control_answer() {
    let w = world().await;
    let newcomer = create_user(&w.db, "Nina").await;

    let err = membership::join_organization(&w.db, newcomer.id, w.org.id, "red", ORGANIZATION_LIMIT)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::IncorrectControlAnswer);
    assert!(!is_member(&w.db, w.org.id, newcomer.id).await.unwrap());

    join(&w.db, &newcomer, &w.org).await;
    // Joining twice is a no-op
    join(&w.db, &newcomer, &w.org).await;
    assert!(is_member(&w.db, w.org.id, newcomer.id).await.unwrap());

    membership::leave_organization(&w.db, newcomer.id, w.org.id).await.unwrap();
    assert!(!is_member(&w.db, w.org.id, newcomer.id).await.unwrap());

    let err = membership::leave_organization(&w.db, newcomer.id, w.org.id)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::NotInOrganization);
}

#[tokio::test]
async fn organization_limit_counts_created_and_joined() {
    let db = setup_db().await;
    let index = InMemorySearchIndex::new();
    let owner = create_user(&db, "Oleg").await;
    let joiner = create_user(&db, "Yana").await;

    let mut orgs = Vec::new();
    for n in 0..ORGANIZATION_LIMIT {
        orgs.push(create_organization(&db, &index, &owner, &format!("Office {}", n)).await);
    }

    let err = membership::create_organization(
        &db,
        &index,
        owner.id,
        ORGANIZATION_LIMIT,
        membership::OrganizationFields {
            name: "One too many".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            address: None,
            description: None,
            control_question: "?".to_string(),
            control_answer: ANSWER.to_string(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(domain(err), DomainError::OrganizationLimit);

    for org in orgs.iter().take(ORGANIZATION_LIMIT as usize - 1) {
        join(&db, &joiner, org).await;
    }
    let extra = create_organization(&db, &index, &joiner, "Own place").await;
    assert!(is_member(&db, extra.id, joiner.id).await.unwrap());

    let last = orgs.last().unwrap();
    let err = membership::join_organization(&db, joiner.id, last.id, ANSWER, ORGANIZATION_LIMIT)
        .await
        .unwrap_err();
    assert_eq!(domain(err), DomainError::OrganizationLimit);
}

#[tokio::test]
async fn members_are_visible_to_members_only() {
    let w = world().await;
    let outsider = create_user(&w.db, "Olga").await;

    let members = membership::members(&w.db, w.member.id, w.org.id).await.unwrap();
    assert_eq!(members.len(), 2);

    let err = membership::members(&w.db, outsider.id, w.org.id).await.unwrap_err();
    assert_eq!(domain(err), DomainError::NotInOrganization);
}

#[tokio::test]
async fn stats_are_derived_from_members_and_rides() {
    let w = world().await;

    let empty = membership::organization_stats(&w.db, w.org.id).await.unwrap();
    assert_eq!(empty.total_members, 2);
    assert_eq!(empty.total_drivers, 1);
    assert_eq!(empty.min_price, None);
    assert_eq!(empty.last_ride_at, None);

    common::create_car(&w.db, &w.creator).await;
    let ride = common::create_ride(&w.db, &w.creator, &w.org, &w.car, 2).await;
    lifecycle::cancel_ride(&w.db, w.creator.id, ride.id).await.unwrap();

    let stats = membership::organization_stats(&w.db, w.org.id).await.unwrap();
    // Two cars, still one driver
    assert_eq!(stats.total_drivers, 1);
    assert_eq!(stats.min_price, Some(150.0));
    assert_eq!(stats.max_price, Some(150.0));
    assert_eq!(stats.last_ride_at, Some(ride.start_time));
}

#[tokio::test]
async fn nearest_sorts_my_organizations() {
    let w = world().await;
    let far = create_organization(&w.db, &w.index, &w.creator, "Hermitage").await;
    membership::update_organization(
        &w.db,
        &w.index,
        w.creator.id,
        far.id,
        OrganizationChanges {
            latitude: Some(59.9398),
            longitude: Some(30.3146),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let ranked = membership::nearest_organizations(&w.db, w.creator.id, 59.93, 30.31)
        .await
        .unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].0.id, far.id);
    assert!(ranked[0].1 < ranked[1].1);

    // Only organizations the user belongs to
    let mine = membership::nearest_organizations(&w.db, w.member.id, 59.93, 30.31)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn search_follows_committed_changes() {
    let w = world().await;

    let hits = membership::search(&w.db, &w.index, "pushkin", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, w.org.id);

    let err = membership::update_organization(
        &w.db,
        &w.index,
        w.member.id,
        w.org.id,
        OrganizationChanges {
            name: Some("Hijacked".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);
    assert!(w.index.query("hijacked", 10).await.unwrap().is_empty());

    membership::update_organization(
        &w.db,
        &w.index,
        w.creator.id,
        w.org.id,
        OrganizationChanges {
            name: Some("Cafe Turandot".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(membership::search(&w.db, &w.index, "pushkin", 10).await.unwrap().is_empty());
    assert_eq!(membership::search(&w.db, &w.index, "turandot", 10).await.unwrap().len(), 1);

    membership::delete_organization(&w.db, &w.index, w.creator.id, w.org.id)
        .await
        .unwrap();
    assert!(w.index.query("turandot", 10).await.unwrap().is_empty());
    assert!(!is_member(&w.db, w.org.id, w.member.id).await.unwrap());
}

#[tokio::test]
async fn register_and_login() {
    let db = setup_db().await;
    let payload = || NewUser {
        first_name: "Maria".to_string(),
        last_name: "Smith".to_string(),
        email: "M.Smith@mail.ru".to_string(),
        phone_number: "+7 (916) 000-11-22".to_string(),
        password: "qwerty1".to_string(),
        photo_url: None,
        about: None,
    };

    let user = accounts::register(&db, payload()).await.unwrap();
    assert_eq!(user.email, "m.smith@mail.ru");
    assert_eq!(user.phone_number, "+79160001122");
    assert_ne!(user.password_hash, "qwerty1");

    let err = accounts::register(&db, payload()).await.unwrap_err();
    assert_eq!(domain(err), DomainError::EmailBusy);

    let by_email = accounts::authenticate(&db, "m.smith@mail.ru", "qwerty1").await.unwrap();
    let by_phone = accounts::authenticate(&db, "+7 916 000 11 22", "qwerty1").await.unwrap();
    assert_eq!(by_email.id, user.id);
    assert_eq!(by_phone.id, user.id);

    let err = accounts::authenticate(&db, "m.smith@mail.ru", "wrong").await.unwrap_err();
    assert_eq!(domain(err), DomainError::InvalidCredentials);
    let err = accounts::authenticate(&db, "nobody@mail.ru", "qwerty1").await.unwrap_err();
    assert_eq!(domain(err), DomainError::InvalidCredentials);
}

#[tokio::test]
async fn cars_belong_to_their_owner() {
    let w = world().await;

    assert!(is_driver(&w.db, w.creator.id).await.unwrap());
    assert!(!is_driver(&w.db, w.member.id).await.unwrap());

    let err = accounts::update_car(
        &w.db,
        w.member.id,
        w.car.id,
        CarChanges {
            color: Some("Black".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(domain(err), DomainError::InsufficientPermissions);

    let repainted = accounts::update_car(
        &w.db,
        w.creator.id,
        w.car.id,
        CarChanges {
            color: Some("Black".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(repainted.color, "Black");
    assert_eq!(repainted.model, w.car.model);
    assert_eq!(accounts::list_cars(&w.db, w.creator.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn racing_registration_is_email_busy() {
    let db = setup_db().await;
    let first = create_user(&db, "Vera").await;

    // Same email, different phone: only the unique index can catch it
    let late = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set("Vera".to_string()),
        last_name: Set("Late".to_string()),
        email: Set(first.email.clone()),
        phone_number: Set("+79990000000".to_string()),
        password_hash: Set(accounts::hash_password("secret1").unwrap()),
        photo_url: Set(None),
        about: Set(None),
        created_at: Set(Utc::now().into()),
    };
    let err = accounts::insert_user(&db, late).await.unwrap_err();
    assert_eq!(domain(err), DomainError::EmailBusy);
}

#[tokio::test]
async fn racing_join_keeps_a_single_membership() {
    let w = world().await;
    let newcomer = create_user(&w.db, "Gleb").await;

    assert!(membership::insert_member(&w.db, w.org.id, newcomer.id).await.unwrap());
    // The second of two concurrent joins finds the row already there
    assert!(!membership::insert_member(&w.db, w.org.id, newcomer.id).await.unwrap());

    let org = membership::join_organization(&w.db, newcomer.id, w.org.id, ANSWER, ORGANIZATION_LIMIT)
        .await
        .unwrap();
    assert_eq!(org.id, w.org.id);

    let rows = organization_member::Entity::find()
        .filter(organization_member::Column::OrganizationId.eq(w.org.id))
        .filter(organization_member::Column::UserId.eq(newcomer.id))
        .count(&w.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
