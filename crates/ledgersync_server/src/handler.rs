//! Request handlers for the ledger routes.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::LedgerStore;
use ledgersync_protocol::{
    Budget, BudgetResponse, Expense, ExpenseId, InsertExpensesRequest, InsertExpensesResponse,
    MessageResponse, UpdateExpenseRequest, UpsertBudgetRequest, UserId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Ledger tables (shared across all handlers).
    pub store: Arc<LedgerStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<LedgerStore>) -> Self {
        Self { config, store }
    }
}

/// Handler for ledger requests.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the handler context.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// `GET /expenses/{userId}`
    pub fn fetch_expenses(&self, user_id: UserId) -> ServerResult<Vec<Expense>> {
        let rows = self.context.store.expenses_for(user_id);
        debug!(%user_id, count = rows.len(), "fetched expenses");
        Ok(rows)
    }

    /// `POST /expenses/sync`
    pub fn insert_expenses(
        &self,
        request: InsertExpensesRequest,
    ) -> ServerResult<InsertExpensesResponse> {
        let max = self.context.config.max_insert_batch;
        if request.expenses.len() > max {
            return Err(ServerError::InvalidRequest(format!(
                "too many expenses: {} > {}",
                request.expenses.len(),
                max
            )));
        }

        let user_id = request.user_id;
        let stored = self
            .context
            .store
            .insert_batch(user_id, request.expenses)
            .inspect_err(|e| warn!(%user_id, error = %e, "rejected expense batch"))?;
        info!(%user_id, count = stored.len(), "inserted expenses");
        Ok(InsertExpensesResponse {
            message: "Expenses synced successfully".into(),
            expenses: stored,
        })
    }

    /// `PUT /expenses/{id}`
    pub fn update_expense(
        &self,
        id: ExpenseId,
        request: UpdateExpenseRequest,
    ) -> ServerResult<MessageResponse> {
        let user_id = request.user_id;
        self.context.store.update(id, user_id, request.into_new())?;
        debug!(%user_id, %id, "updated expense");
        Ok(MessageResponse::new("Expense updated successfully"))
    }

    /// `DELETE /expenses/{id}`
    pub fn delete_expense(&self, id: ExpenseId) -> ServerResult<MessageResponse> {
        let row = self.context.store.delete(id)?;
        debug!(user_id = %row.user_id, %id, "deleted expense");
        Ok(MessageResponse::new("Expense deleted successfully"))
    }

    /// `POST /budget/sync`
    pub fn upsert_budget(&self, request: UpsertBudgetRequest) -> ServerResult<MessageResponse> {
        let budget = Budget::new(request.user_id, request.monthly_budget);
        budget.validate()?;
        self.context
            .store
            .upsert_budget(budget.user_id, budget.monthly_budget);
        debug!(user_id = %budget.user_id, amount = budget.monthly_budget, "upserted budget");
        Ok(MessageResponse::new("Budget synced successfully"))
    }

    /// `GET /budget/{userId}`
    pub fn fetch_budget(&self, user_id: UserId) -> ServerResult<Option<BudgetResponse>> {
        Ok(self
            .context
            .store
            .budget(user_id)
            .map(|monthly_budget| BudgetResponse { monthly_budget }))
    }

    /// Dispatches a raw request to the matching handler.
    ///
    /// `path` may carry the configured API prefix. Returns the status code
    /// and JSON body.
    pub fn route(&self, method: &str, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        let prefix = self.context.config.api_prefix.as_str();
        let path = path.split('?').next().unwrap_or_default();
        let route = path
            .strip_prefix(prefix)
            .filter(|rest| !prefix.is_empty() && rest.starts_with('/'))
            .unwrap_or(path);
        let segments: Vec<&str> = route.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            ("POST", ["expenses", "sync"]) => {
                respond(decode::<InsertExpensesRequest>(body).and_then(|r| self.insert_expenses(r)))
            }
            ("GET", ["expenses", user]) => {
                respond(parse_id(user).and_then(|u| self.fetch_expenses(UserId::new(u))))
            }
            ("PUT", ["expenses", id]) => respond(
                parse_id(id)
                    .and_then(|id| Ok((id, decode::<UpdateExpenseRequest>(body)?)))
                    .and_then(|(id, r)| self.update_expense(ExpenseId::new(id), r)),
            ),
            ("DELETE", ["expenses", id]) => {
                respond(parse_id(id).and_then(|id| self.delete_expense(ExpenseId::new(id))))
            }
            ("POST", ["budget", "sync"]) => {
                respond(decode::<UpsertBudgetRequest>(body).and_then(|r| self.upsert_budget(r)))
            }
            ("GET", ["budget", user]) => {
                respond(parse_id(user).and_then(|u| self.fetch_budget(UserId::new(u))))
            }
            _ => respond::<()>(Err(ServerError::NotFound(format!("route {method} {path}")))),
        }
    }
}

pub(crate) fn parse_id(raw: &str) -> ServerResult<u64> {
    raw.parse()
        .map_err(|_| ServerError::InvalidRequest(format!("invalid id: {raw}")))
}

/// Parses a JSON request body.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::InvalidRequest(e.to_string()))
}

fn respond<T: Serialize>(result: ServerResult<T>) -> (u16, Vec<u8>) {
    let (status, encoded) = match result {
        Ok(value) => (200, serde_json::to_vec(&value)),
        Err(e) => (e.status().as_u16(), serde_json::to_vec(&e.body())),
    };
    match encoded {
        Ok(body) => (status, body),
        Err(e) => (
            500,
            format!(r#"{{"error":"failed to encode response: {e}"}}"#).into_bytes(),
        ),
    }
}
