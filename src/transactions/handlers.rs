use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::context::RequestContext;
use crate::error::ApiError;
use crate::state::AppState;
use crate::transactions::dto::{Pagination, TransactionInput};
use crate::transactions::repo::{CategoryStat, Transaction};

pub fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list).post(create))
        .route("/transactions/statistics", get(statistics))
        .route(
            "/transactions/:id",
            get(get_one).put(update).delete(delete_one),
        )
}

fn validate(input: &TransactionInput) -> Result<(), ApiError> {
    if input.description.trim().is_empty() {
        return Err(ApiError::Validation("Description is required".into()));
    }
    if input.amount <= 0.0 || !input.amount.is_finite() {
        return Err(ApiError::Validation("Amount must be positive".into()));
    }
    Ok(())
}

#[instrument(skip(state, ctx))]
pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let user = ctx.require_user()?;
    let rows = Transaction::list_by_user(
        &state.db,
        user.id,
        pagination.limit.clamp(1, 100),
        pagination.offset.max(0),
    )
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state, ctx, input))]
pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(input): Json<TransactionInput>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let user = ctx.require_user()?;
    validate(&input)?;
    let transaction = Transaction::create(
        &state.db,
        user.id,
        input.description.trim(),
        input.payment_type,
        input.category,
        input.amount,
        input.location(),
        input.date,
    )
    .await?;
    info!(user_id = %user.id, transaction_id = %transaction.id, "transaction created");
    Ok((StatusCode::CREATED, Json(transaction)))
}

#[instrument(skip(state, ctx))]
pub async fn get_one(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    let user = ctx.require_user()?;
    let transaction = Transaction::find_for_user(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(transaction))
}

#[instrument(skip(state, ctx, input))]
pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
    Json(input): Json<TransactionInput>,
) -> Result<Json<Transaction>, ApiError> {
    let user = ctx.require_user()?;
    validate(&input)?;
    let transaction = Transaction::update_for_user(
        &state.db,
        user.id,
        id,
        input.description.trim(),
        input.payment_type,
        input.category,
        input.amount,
        input.location(),
        input.date,
    )
    .await?
    .ok_or(ApiError::NotFound)?;
    info!(user_id = %user.id, transaction_id = %transaction.id, "transaction updated");
    Ok(Json(transaction))
}

#[instrument(skip(state, ctx))]
pub async fn delete_one(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let user = ctx.require_user()?;
    if !Transaction::delete_for_user(&state.db, user.id, id).await? {
        return Err(ApiError::NotFound);
    }
    info!(user_id = %user.id, transaction_id = %id, "transaction deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Per-category sums powering the category breakdown chart.
#[instrument(skip(state, ctx))]
pub async fn statistics(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Vec<CategoryStat>>, ApiError> {
    let user = ctx.require_user()?;
    let stats = Transaction::category_statistics(&state.db, user.id).await?;
    Ok(Json(stats))
}
