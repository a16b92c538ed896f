//! Axum router over [`RequestHandler`].

use crate::error::ServerResult;
use crate::handler::{decode, parse_id, RequestHandler};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use ledgersync_protocol::{
    BudgetResponse, Expense, ExpenseId, InsertExpensesRequest, InsertExpensesResponse,
    MessageResponse, UpdateExpenseRequest, UpsertBudgetRequest, UserId,
};
use tower_http::trace::TraceLayer;

/// Builds the router with every ledger route, mounted under the configured
/// prefix, plus `/health` at the root.
pub fn build_router(handler: RequestHandler) -> Router {
    let api = Router::new()
        .route("/expenses/sync", post(insert_expenses))
        .route(
            "/expenses/{id}",
            get(fetch_expenses).put(update_expense).delete(delete_expense),
        )
        .route("/budget/sync", post(upsert_budget))
        .route("/budget/{user_id}", get(fetch_budget));

    let prefix = handler.context().config.api_prefix.clone();
    let router = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(&prefix, api)
    };

    router
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

async fn health_check() -> &'static str {
    "ok"
}

async fn fetch_expenses(
    State(handler): State<RequestHandler>,
    Path(user_id): Path<String>,
) -> ServerResult<Json<Vec<Expense>>> {
    let user_id = UserId::new(parse_id(&user_id)?);
    handler.fetch_expenses(user_id).map(Json)
}

// Bodies are decoded by hand so malformed JSON maps to the `{error}` shape.
async fn insert_expenses(
    State(handler): State<RequestHandler>,
    body: Bytes,
) -> ServerResult<Json<InsertExpensesResponse>> {
    let request = decode::<InsertExpensesRequest>(&body)?;
    handler.insert_expenses(request).map(Json)
}

async fn update_expense(
    State(handler): State<RequestHandler>,
    Path(id): Path<String>,
    body: Bytes,
) -> ServerResult<Json<MessageResponse>> {
    let id = ExpenseId::new(parse_id(&id)?);
    let request = decode::<UpdateExpenseRequest>(&body)?;
    handler.update_expense(id, request).map(Json)
}

async fn delete_expense(
    State(handler): State<RequestHandler>,
    Path(id): Path<String>,
) -> ServerResult<Json<MessageResponse>> {
    let id = ExpenseId::new(parse_id(&id)?);
    handler.delete_expense(id).map(Json)
}

async fn upsert_budget(
    State(handler): State<RequestHandler>,
    body: Bytes,
) -> ServerResult<Json<MessageResponse>> {
    let request = decode::<UpsertBudgetRequest>(&body)?;
    handler.upsert_budget(request).map(Json)
}

/// Answers `null` when the user has no budget row.
async fn fetch_budget(
    State(handler): State<RequestHandler>,
    Path(user_id): Path<String>,
) -> ServerResult<Json<Option<BudgetResponse>>> {
    let user_id = UserId::new(parse_id(&user_id)?);
    handler.fetch_budget(user_id).map(Json)
}
