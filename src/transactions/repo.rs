use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_type", rename_all = "lowercase")]
pub enum PaymentType {
    Cash,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "category", rename_all = "lowercase")]
pub enum Category {
    Saving,
    Expense,
    Investment,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub payment_type: PaymentType,
    pub category: Category,
    pub amount: f64,
    pub location: String,
    pub date: Date,
    pub created_at: OffsetDateTime,
}

/// Per-category sum for the statistics endpoint.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CategoryStat {
    pub category: Category,
    pub total: f64,
}

const COLUMNS: &str =
    "id, user_id, description, payment_type, category, amount, location, date, created_at";

impl Transaction {
    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, ApiError> {
        let rows = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM transactions
            WHERE user_id = $1
            ORDER BY date DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Lookups are always scoped by owner; another user's transaction id
    /// reads as not found.
    pub async fn find_for_user(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Transaction>, ApiError> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM transactions
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &PgPool,
        user_id: Uuid,
        description: &str,
        payment_type: PaymentType,
        category: Category,
        amount: f64,
        location: &str,
        date: Date,
    ) -> Result<Transaction, ApiError> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            INSERT INTO transactions
                (user_id, description, payment_type, category, amount, location, date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(description)
        .bind(payment_type)
        .bind(category)
        .bind(amount)
        .bind(location)
        .bind(date)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_for_user(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        description: &str,
        payment_type: PaymentType,
        category: Category,
        amount: f64,
        location: &str,
        date: Date,
    ) -> Result<Option<Transaction>, ApiError> {
        let row = sqlx::query_as::<_, Transaction>(&format!(
            r#"
            UPDATE transactions
            SET description = $3, payment_type = $4, category = $5,
                amount = $6, location = $7, date = $8
            WHERE id = $1 AND user_id = $2
            RETURNING {COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(user_id)
        .bind(description)
        .bind(payment_type)
        .bind(category)
        .bind(amount)
        .bind(location)
        .bind(date)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete_for_user(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn category_statistics(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<CategoryStat>, ApiError> {
        let rows = sqlx::query_as::<_, CategoryStat>(
            r#"
            SELECT category, SUM(amount) AS total
            FROM transactions
            WHERE user_id = $1
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
