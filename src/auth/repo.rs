use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub gender: Gender,
    pub profile_picture: String,
    pub created_at: OffsetDateTime,
}

/// Avatar URL is derived once at signup and stored with the user.
pub fn profile_picture_for(username: &str, gender: Gender) -> String {
    let variant = match gender {
        Gender::Male => "boy",
        Gender::Female => "girl",
    };
    format!(
        "https://avatar.iran.liara.run/public/{}?username={}",
        variant, username
    )
}

impl User {
    pub async fn find_by_username(db: &PgPool, username: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, name, password_hash, gender, profile_picture, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, name, password_hash, gender, profile_picture, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user. The unique index on `username` is the only
    /// serialization point for concurrent signups; a violation surfaces as
    /// `DuplicateUser` instead of a pre-insert existence check that would
    /// race.
    pub async fn create(
        db: &PgPool,
        username: &str,
        name: &str,
        password_hash: &str,
        gender: Gender,
    ) -> Result<User, ApiError> {
        let profile_picture = profile_picture_for(username, gender);
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, name, password_hash, gender, profile_picture)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, name, password_hash, gender, profile_picture, created_at
            "#,
        )
        .bind(username)
        .bind(name)
        .bind(password_hash)
        .bind(gender)
        .bind(&profile_picture)
        .fetch_one(db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::DuplicateUser
            }
            _ => ApiError::Store(e),
        })?;
        Ok(user)
    }

    /// Check a username/password pair against the store. Unknown user and
    /// wrong password collapse into the same `InvalidCredentials` so the
    /// response does not reveal which field was wrong.
    pub async fn verify_credentials(
        db: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        let user = Self::find_by_username(db, username)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;
        if !super::password::verify_password(password, &user.password_hash)? {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_picture_varies_by_gender() {
        assert_eq!(
            profile_picture_for("alice", Gender::Female),
            "https://avatar.iran.liara.run/public/girl?username=alice"
        );
        assert_eq!(
            profile_picture_for("bob", Gender::Male),
            "https://avatar.iran.liara.run/public/boy?username=bob"
        );
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            name: "Alice".into(),
            password_hash: "$argon2id$...".into(),
            gender: Gender::Female,
            profile_picture: profile_picture_for("alice", Gender::Female),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("alice"));
    }

    #[test]
    fn gender_deserializes_lowercase() {
        let g: Gender = serde_json::from_str("\"female\"").unwrap();
        assert_eq!(g, Gender::Female);
    }
}
