//! HTTP remote store.
//!
//! This module maps the [`RemoteStore`] operations onto the JSON routes of
//! the remote API. The actual HTTP client is abstracted via a trait so the
//! same gateway runs over reqwest in production and over an in-process
//! server in tests.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteStore;
use ledgersync_protocol::{
    BudgetResponse, ErrorResponse, Expense, ExpenseId, InsertExpensesRequest,
    InsertExpensesResponse, UpsertBudgetRequest, UserId,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// HTTP method of a gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request handed to an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Route below the base URL, e.g. `/expenses/3`.
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
    /// Session token sent as `Authorization: Bearer`.
    pub bearer: Option<String>,
}

/// A response returned by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to obtain any response at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientError {
    /// Error message.
    pub message: String,
    /// Whether the request hit its deadline.
    pub timed_out: bool,
}

impl HttpClientError {
    /// Creates a connection-level error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

impl From<HttpClientError> for SyncError {
    fn from(err: HttpClientError) -> Self {
        if err.timed_out {
            SyncError::Timeout
        } else {
            SyncError::transport_retryable(err.message)
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Non-2xx
/// statuses are responses, not errors.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError>;

    /// Checks if the client is usable.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based remote store.
///
/// Uses JSON request/response bodies.
pub struct HttpRemoteStore<C: HttpClient> {
    /// Base URL of the API (e.g. "https://ledger.example.com/api").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Session token.
    auth_token: Option<String>,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates a new HTTP remote store.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth_token: None,
            last_error: RwLock::new(None),
        }
    }

    /// Creates a store from the URL and token of `config`.
    pub fn from_config(config: &SyncConfig, client: C) -> Self {
        let store = Self::new(config.server_url.clone(), client);
        match &config.auth_token {
            Some(token) => store.with_auth_token(token.clone()),
            None => store,
        }
    }

    /// Sets the session token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the underlying client is usable.
    pub fn is_healthy(&self) -> bool {
        self.client.is_healthy()
    }

    fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> SyncResult<HttpResponse> {
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| SyncError::Protocol(format!("failed to encode request: {e}")))?;

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            path: path.to_string(),
            body,
            bearer: self.auth_token.clone(),
        };
        let response = self.client.send(request).map_err(|e| {
            *self.last_error.write() = Some(e.message.clone());
            SyncError::from(e)
        })?;
        *self.last_error.write() = None;
        Ok(response)
    }

    fn error_for(&self, response: &HttpResponse) -> SyncError {
        let message = serde_json::from_slice::<ErrorResponse>(&response.body)
            .map(|e| e.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&response.body).into_owned());
        *self.last_error.write() = Some(message.clone());
        SyncError::Server {
            status: response.status,
            message,
        }
    }

    fn expect_success(&self, response: HttpResponse) -> SyncResult<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(self.error_for(&response))
        }
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> SyncResult<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
}

impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    fn fetch_expenses(&self, user_id: UserId) -> SyncResult<Vec<Expense>> {
        let response = self.send::<()>(Method::Get, &format!("/expenses/{user_id}"), None)?;
        decode(&self.expect_success(response)?)
    }

    fn insert_expenses(&self, user_id: UserId, expenses: &[Expense]) -> SyncResult<Vec<Expense>> {
        let request = InsertExpensesRequest {
            user_id,
            expenses: expenses.iter().map(Expense::to_new).collect(),
        };
        let response = self.send(Method::Post, "/expenses/sync", Some(&request))?;
        let body: InsertExpensesResponse = decode(&self.expect_success(response)?)?;
        if body.expenses.len() != expenses.len() {
            return Err(SyncError::Protocol(format!(
                "insert echoed {} rows for {} records",
                body.expenses.len(),
                expenses.len()
            )));
        }
        Ok(body.expenses)
    }

    fn update_expense(&self, id: ExpenseId, expense: &Expense) -> SyncResult<()> {
        let request = expense.to_update_request();
        let response = self.send(Method::Put, &format!("/expenses/{id}"), Some(&request))?;
        if response.status == 404 {
            return Err(SyncError::NotFound(id));
        }
        self.expect_success(response).map(|_| ())
    }

    fn delete_expense(&self, id: ExpenseId) -> SyncResult<()> {
        let response = self.send::<()>(Method::Delete, &format!("/expenses/{id}"), None)?;
        if response.status == 404 {
            return Ok(());
        }
        self.expect_success(response).map(|_| ())
    }

    fn upsert_budget(&self, user_id: UserId, monthly_budget: f64) -> SyncResult<()> {
        let request = UpsertBudgetRequest {
            user_id,
            monthly_budget,
        };
        let response = self.send(Method::Post, "/budget/sync", Some(&request))?;
        self.expect_success(response).map(|_| ())
    }

    fn fetch_budget(&self, user_id: UserId) -> SyncResult<Option<f64>> {
        let response = self.send::<()>(Method::Get, &format!("/budget/{user_id}"), None)?;
        if response.status == 404 {
            return Ok(None);
        }
        let response = self.expect_success(response)?;
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: serde_json::Value = decode(&response)?;
        if value.is_null() || value.as_object().is_some_and(|o| o.is_empty()) {
            return Ok(None);
        }
        serde_json::from_value::<BudgetResponse>(value)
            .map(|b| Some(b.monthly_budget))
            .map_err(|e| SyncError::Protocol(format!("failed to decode budget: {e}")))
    }
}

/// Blocking reqwest client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the timeout of `config`.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpClientError::timeout(err.to_string())
        } else {
            HttpClientError::new(err.to_string())
        }
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.bytes()?.to_vec();
        Ok(HttpResponse { status, body })
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request for `path` (URL without scheme and host).
    fn handle(&self, method: Method, path: &str, body: &[u8]) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
        let body = request.body.unwrap_or_default();
        Ok(self.server.handle(request.method, &request.path, &body))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use parking_lot::Mutex;

    /// Replays canned responses and records requests.
    struct TestClient {
        responses: Mutex<Vec<Result<HttpResponse, HttpClientError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn respond(&self, status: u16, body: &str) {
            self.responses
                .lock()
                .push(Ok(HttpResponse::new(status, body.as_bytes())));
        }

        fn fail(&self, error: HttpClientError) {
            self.responses.lock().push(Err(error));
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.lock().last().cloned().unwrap()
        }
    }

    impl HttpClient for TestClient {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpClientError> {
            self.requests.lock().push(request);
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(HttpClientError::new("no response set"));
            }
            responses.remove(0)
        }

        fn is_healthy(&self) -> bool {
            true
        }
    }

    fn store() -> HttpRemoteStore<TestClient> {
        HttpRemoteStore::new("https://ledger.example.com/api/", TestClient::new())
            .with_auth_token("token-1")
    }

    fn coffee() -> Expense {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Expense::new(UserId::new(3), "Coffee", 4.5, "Food", date)
    }

    #[test]
    fn fetch_decodes_rows_and_sends_token() {
        let store = store();
        store.client.respond(
            200,
            r#"[{"id": 1, "user_id": 3, "expense_name": "Rent", "cost": "900.00",
                 "category": "Housing", "date": "2024-01-01T00:00:00Z"}]"#,
        );

        let rows = store.fetch_expenses(UserId::new(3)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cost, 900.0);

        let request = store.client.last_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "https://ledger.example.com/api/expenses/3");
        assert_eq!(request.bearer.as_deref(), Some("token-1"));
    }

    #[test]
    fn insert_sends_batch_and_checks_echo() {
        let store = store();
        store.client.respond(
            200,
            r#"{"message": "ok", "expenses": [{"id": 10, "user_id": 3, "name": "Coffee",
                 "cost": 4.5, "category": "Food", "date": "2024-01-01"}]}"#,
        );
        let stored = store.insert_expenses(UserId::new(3), &[coffee()]).unwrap();
        assert_eq!(stored[0].id, Some(ExpenseId::new(10)));

        let body: serde_json::Value =
            serde_json::from_slice(&store.client.last_request().body.unwrap()).unwrap();
        assert_eq!(body["userId"], 3);
        assert_eq!(body["expenses"][0]["name"], "Coffee");
        assert!(body["expenses"][0].get("id").is_none());

        store.client.respond(200, r#"{"message": "ok", "expenses": []}"#);
        let result = store.insert_expenses(UserId::new(3), &[coffee()]);
        assert!(matches!(result, Err(SyncError::Protocol(_))));
    }

    #[test]
    fn update_404_is_not_found_but_delete_404_is_ok() {
        let store = store();
        store.client.respond(404, r#"{"error": "Expense not found"}"#);
        let result = store.update_expense(ExpenseId::new(7), &coffee());
        assert!(matches!(result, Err(SyncError::NotFound(id)) if id == ExpenseId::new(7)));

        store.client.respond(404, r#"{"error": "Expense not found"}"#);
        store.delete_expense(ExpenseId::new(7)).unwrap();
        assert_eq!(store.client.last_request().method, Method::Delete);
    }

    #[test]
    fn server_errors_carry_status_and_message() {
        let store = store();
        store.client.respond(500, r#"{"error": "Failed to sync budget"}"#);
        let err = store.upsert_budget(UserId::new(3), 100.0).unwrap_err();
        assert!(err.is_retryable());
        assert!(
            matches!(err, SyncError::Server { status: 500, ref message } if message == "Failed to sync budget")
        );
        assert_eq!(store.last_error().as_deref(), Some("Failed to sync budget"));
    }

    #[test]
    fn fetch_budget_handles_missing_budget() {
        let store = store();
        store.client.respond(200, "null");
        assert_eq!(store.fetch_budget(UserId::new(3)).unwrap(), None);

        store.client.respond(200, "{}");
        assert_eq!(store.fetch_budget(UserId::new(3)).unwrap(), None);

        store.client.respond(200, r#"{"monthly_budget": "1200.00"}"#);
        assert_eq!(store.fetch_budget(UserId::new(3)).unwrap(), Some(1200.0));
    }

    #[test]
    fn client_errors_map_to_transport_and_timeout() {
        let store = store();
        store.client.fail(HttpClientError::new("connection refused"));
        let err = store.fetch_expenses(UserId::new(3)).unwrap_err();
        assert!(matches!(err, SyncError::Transport { retryable: true, .. }));
        assert_eq!(store.last_error().as_deref(), Some("connection refused"));

        store.client.fail(HttpClientError::timeout("deadline"));
        let err = store.fetch_expenses(UserId::new(3)).unwrap_err();
        assert!(matches!(err, SyncError::Timeout));
    }

    /// Answers every request with the path it was routed to.
    struct EchoPath;

    impl LoopbackServer for EchoPath {
        fn handle(&self, _method: Method, path: &str, _body: &[u8]) -> HttpResponse {
            HttpResponse::new(200, path)
        }
    }

    #[test]
    fn loopback_routes_below_the_base_url() {
        let store = HttpRemoteStore::new(
            "http://host/budget/expenses/api/",
            LoopbackClient::new(EchoPath),
        );
        let response = store.send::<()>(Method::Get, "/expenses/3", None).unwrap();
        assert_eq!(response.body, b"/expenses/3");
        assert_eq!(store.base_url(), "http://host/budget/expenses/api");
    }
}
