#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use carpool_backend::entities::{car, organization, ride, user};
use carpool_backend::search::InMemorySearchIndex;
use carpool_backend::services::accounts::{self, CarFields, NewUser};
use carpool_backend::services::membership::{self, OrganizationFields};
use carpool_backend::services::rides::{self, NewRide};
use chrono::{Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

pub const ANSWER: &str = "blue";
pub const ORGANIZATION_LIMIT: u64 = 5;

static NEXT_USER: AtomicU32 = AtomicU32::new(1);

/// Fresh in-memory database with every migration applied.
/// One connection, so the whole test shares a single SQLite memory store.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub async fn create_user(db: &DatabaseConnection, first_name: &str) -> user::Model {
    let n = NEXT_USER.fetch_add(1, Ordering::Relaxed);
    accounts::register(
        db,
        NewUser {
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            email: format!("{}{}@mail.ru", first_name.to_lowercase(), n),
            phone_number: format!("+7916{:07}", n),
            password: "secret1".to_string(),
            photo_url: None,
            about: None,
        },
    )
    .await
    .expect("register user")
}

pub async fn create_organization(
    db: &DatabaseConnection,
    index: &InMemorySearchIndex,
    creator: &user::Model,
    name: &str,
) -> organization::Model {
    membership::create_organization(
        db,
        index,
        creator.id,
        ORGANIZATION_LIMIT,
        OrganizationFields {
            name: name.to_string(),
            latitude: 55.7558,
            longitude: 37.6173,
            address: Some("Tverskaya 1".to_string()),
            description: None,
            control_question: "Color of the door?".to_string(),
            control_answer: ANSWER.to_string(),
        },
    )
    .await
    .expect("create organization")
}

pub async fn join(db: &DatabaseConnection, member: &user::Model, org: &organization::Model) {
    membership::join_organization(db, member.id, org.id, ANSWER, ORGANIZATION_LIMIT)
        .await
        .expect("join organization");
}

pub async fn create_car(db: &DatabaseConnection, owner: &user::Model) -> car::Model {
    accounts::create_car(
        db,
        owner.id,
        CarFields {
            model: "Lada Vesta".to_string(),
            color: "White".to_string(),
            registry_number: "A123BC77".to_string(),
        },
    )
    .await
    .expect("create car")
}

pub async fn create_ride_at(
    db: &DatabaseConnection,
    host: &user::Model,
    org: &organization::Model,
    car: &car::Model,
    seats: i32,
    stop: (f64, f64),
) -> ride::Model {
    rides::create_ride(
        db,
        host.id,
        NewRide {
            organization_id: org.id,
            car_id: car.id,
            stop_latitude: stop.0,
            stop_longitude: stop.1,
            stop_address: None,
            start_time: (Utc::now() + Duration::hours(2)).fixed_offset(),
            total_seats: seats,
            price: 150.0,
            description: None,
        },
    )
    .await
    .expect("create ride")
}

pub async fn create_ride(
    db: &DatabaseConnection,
    host: &user::Model,
    org: &organization::Model,
    car: &car::Model,
    seats: i32,
) -> ride::Model {
    create_ride_at(db, host, org, car, seats, (55.80, 37.60)).await
}

/// Organization O created by C, who owns a car, with M as a plain member.
pub struct World {
    pub db: DatabaseConnection,
    pub index: InMemorySearchIndex,
    pub creator: user::Model,
    pub member: user::Model,
    pub org: organization::Model,
    pub car: car::Model,
}

pub async fn world() -> World {
    let db = setup_db().await;
    let index = InMemorySearchIndex::new();
    let creator = create_user(&db, "Carl").await;
    let member = create_user(&db, "Mary").await;
    let org = create_organization(&db, &index, &creator, "Cafe Pushkin").await;
    join(&db, &member, &org).await;
    let car = create_car(&db, &creator).await;

    World {
        db,
        index,
        creator,
        member,
        org,
        car,
    }
}
