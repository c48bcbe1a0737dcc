use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entities::{car, user};
use crate::error::{AppError, AppResult, DomainError, is_unique_violation};
use crate::utils::validation::{is_valid_phone, normalize_phone};

pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub photo_url: Option<String>,
    pub about: Option<String>,
}

#[derive(Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub photo_url: Option<String>,
    pub about: Option<String>,
}

pub struct CarFields {
    pub model: String,
    pub color: String,
    pub registry_number: String,
}

#[derive(Default)]
pub struct CarChanges {
    pub model: Option<String>,
    pub color: Option<String>,
    pub registry_number: Option<String>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Failed to parse password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// A concurrent registration can still win the race for the unique index.
pub async fn insert_user(db: &DatabaseConnection, new_user: user::ActiveModel) -> AppResult<user::Model> {
    new_user.insert(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::from(DomainError::EmailBusy)
        } else {
            AppError::from(e)
        }
    })
}

pub async fn register(db: &DatabaseConnection, payload: NewUser) -> AppResult<user::Model> {
    let email = payload.email.trim().to_lowercase();
    let phone_number = normalize_phone(&payload.phone_number);

    let existing = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Email.eq(&email))
                .add(user::Column::PhoneNumber.eq(&phone_number)),
        )
        .one(db)
        .await?;

    if existing.is_some() {
        return Err(DomainError::EmailBusy.into());
    }

    let new_user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        email: Set(email),
        phone_number: Set(phone_number),
        password_hash: Set(hash_password(&payload.password)?),
        photo_url: Set(payload.photo_url),
        about: Set(payload.about),
        created_at: Set(Utc::now().into()),
    };

    let user = insert_user(db, new_user).await?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok(user)
}

/// `login` is either an email or a phone number.
pub async fn authenticate(db: &DatabaseConnection, login: &str, password: &str) -> AppResult<user::Model> {
    let query = if is_valid_phone(login) {
        user::Entity::find().filter(user::Column::PhoneNumber.eq(normalize_phone(login)))
    } else {
        user::Entity::find().filter(user::Column::Email.eq(login.trim().to_lowercase()))
    };

    let user = query
        .one(db)
        .await?
        .ok_or(DomainError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash)? {
        return Err(DomainError::InvalidCredentials.into());
    }

    Ok(user)
}

pub async fn find_user(db: &DatabaseConnection, user_id: Uuid) -> AppResult<user::Model> {
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn update_profile(
    db: &DatabaseConnection,
    user_id: Uuid,
    changes: ProfileChanges,
) -> AppResult<user::Model> {
    let user = find_user(db, user_id).await?;
    let mut active: user::ActiveModel = user.into();

    if let Some(first_name) = changes.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = changes.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(phone_number) = changes.phone_number {
        active.phone_number = Set(normalize_phone(&phone_number));
    }
    if let Some(photo_url) = changes.photo_url {
        active.photo_url = Set(Some(photo_url));
    }
    if let Some(about) = changes.about {
        active.about = Set(Some(about));
    }

    active.update(db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::from(DomainError::EmailBusy)
        } else {
            AppError::from(e)
        }
    })
}

pub async fn create_car(db: &DatabaseConnection, owner_id: Uuid, fields: CarFields) -> AppResult<car::Model> {
    let car = car::ActiveModel {
        id: Set(Uuid::new_v4()),
        owner_id: Set(owner_id),
        model: Set(fields.model),
        color: Set(fields.color),
        registry_number: Set(fields.registry_number),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;

    tracing::info!(car_id = %car.id, owner_id = %owner_id, "Car registered");
    Ok(car)
}

pub async fn list_cars(db: &DatabaseConnection, owner_id: Uuid) -> AppResult<Vec<car::Model>> {
    let cars = car::Entity::find()
        .filter(car::Column::OwnerId.eq(owner_id))
        .order_by_asc(car::Column::CreatedAt)
        .all(db)
        .await?;
    Ok(cars)
}

pub async fn update_car(
    db: &DatabaseConnection,
    owner_id: Uuid,
    car_id: Uuid,
    changes: CarChanges,
) -> AppResult<car::Model> {
    let car = car::Entity::find_by_id(car_id)
        .one(db)
        .await?
        .filter(|c| c.owner_id == owner_id)
        .ok_or(DomainError::InsufficientPermissions)?;

    let mut active: car::ActiveModel = car.into();
    if let Some(model) = changes.model {
        active.model = Set(model);
    }
    if let Some(color) = changes.color {
        active.color = Set(color);
    }
    if let Some(registry_number) = changes.registry_number {
        active.registry_number = Set(registry_number);
    }

    Ok(active.update(db).await?)
}
