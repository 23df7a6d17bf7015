use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_EXPIRED, SESSION_REFRESH_FAILURES, SESSION_REFRESH_JOINS, SESSION_REFRESHES,
    SESSION_REQUEST_DURATION, SESSION_REQUEST_ERRORS, SESSION_REQUESTS, SESSION_RETRIES,
};
use crate::request::{RequestOptions, RequestOutcome, ResponseBody};
use crate::session::{Session, SessionState};
use crate::storage::{MemoryTokenStore, REFRESH_TOKEN_KEY, TokenStore};
use crate::types::{
    AuthResponse, LoginRequest, ProfileUpdate, RefreshRequest, RefreshResponse,
    RegistrationForm, User, UserRole,
};

pub const LOGIN_ENDPOINT: &str = "/api/auth/login";
pub const REGISTER_ENDPOINT: &str = "/api/auth/register";
pub const REFRESH_ENDPOINT: &str = "/api/auth/refresh";
pub const LOGOUT_ENDPOINT: &str = "/api/auth/logout";
pub const CURRENT_USER_ENDPOINT: &str = "/api/auth/me";
pub const PROFILE_ENDPOINT: &str = "/api/auth/profile";

const LOGIN_FALLBACK: &str = "Login failed. Please try again.";
const REGISTER_FALLBACK: &str = "Registration failed. Please try again.";
const PROFILE_FALLBACK: &str = "Profile update failed. Please try again.";

/// Endpoints that mint or revoke credentials.  A 401 from one of these is a
/// final answer and never triggers a refresh.
const CREDENTIAL_ENDPOINTS: [&str; 4] = [
    LOGIN_ENDPOINT,
    REGISTER_ENDPOINT,
    REFRESH_ENDPOINT,
    LOGOUT_ENDPOINT,
];

type RefreshFlight = Shared<BoxFuture<'static, Result<String>>>;

/// The refresh currently in flight, tagged so that a finished flight only
/// ever clears its own slot.
struct PendingRefresh {
    id: u64,
    flight: RefreshFlight,
}

/// Client for the ThalAssist API that owns one member's session.
///
/// Clones share the same session, user and refresh state, so a clone can be
/// handed to every component that needs to make authenticated calls.
///
/// ```
/// use thalassist::{ClientConfig, SessionClient, SessionState};
///
/// # tokio_test::block_on(async {
/// let client = SessionClient::in_memory(ClientConfig::new()).unwrap();
/// assert_eq!(client.state().await, SessionState::Anonymous);
/// assert!(client.refresh().await.is_err()); // no refresh token, nothing sent
/// # })
/// ```
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: ReqwestClient,
    base_url: String,
    timeout: Duration,
    store: Arc<dyn TokenStore>,
    state: Mutex<ClientState>,
    refresh_flight: Mutex<Option<PendingRefresh>>,
    next_flight: AtomicU64,
}

struct ClientState {
    session: Session,
    user: Option<User>,
    phase: SessionState,
    /// Bumped whenever the credentials are replaced or dropped.  A refresh
    /// started under an older generation must not write its tokens back.
    generation: u64,
}

impl ClientState {
    fn anonymous() -> Self {
        Self {
            session: Session::default(),
            user: None,
            phase: SessionState::Anonymous,
            generation: 0,
        }
    }

    /// Drops the credentials and the member, moving to a new generation.
    fn reset(&mut self) {
        let generation = self.generation.wrapping_add(1);
        *self = Self::anonymous();
        self.generation = generation;
    }

    /// The phase implied by the tokens currently held.
    fn settled_phase(&self) -> SessionState {
        if self.session.access_token.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }
}

impl SessionClient {
    /// Create a new session client that persists tokens into `store`.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let http = ReqwestClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                timeout: config.timeout,
                store,
                state: Mutex::new(ClientState::anonymous()),
                refresh_flight: Mutex::new(None),
                next_flight: AtomicU64::new(0),
            }),
        })
    }

    /// Create a client whose tokens only live in memory.
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        Self::new(config, Arc::new(MemoryTokenStore::new()))
    }

    /// The API root requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The durable store backing this session.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Restores a session from durable storage.
    ///
    /// With a stored access token the current user is fetched to prove the
    /// token still works.  Any failure clears the stored credentials and
    /// leaves the client anonymous.
    pub async fn initialize(&self) -> SessionState {
        let session = match Session::load(self.inner.store.as_ref()) {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored credentials");
                self.clear_credentials().await;
                return SessionState::Anonymous;
            }
        };
        if session.access_token.is_none() {
            self.inner.state.lock().await.reset();
            return SessionState::Anonymous;
        }

        {
            let mut state = self.inner.state.lock().await;
            state.reset();
            state.session = session;
            state.phase = SessionState::Authenticated;
        }
        match self.current_user().await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "restored session");
                SessionState::Authenticated
            }
            Err(err) => {
                tracing::info!(error = %err, "stored session is no longer valid");
                self.clear_credentials().await;
                SessionState::Anonymous
            }
        }
    }

    /// Forgets the in-memory session without touching durable storage.
    pub async fn dispose(&self) {
        self.abandon_refresh().await;
        self.inner.state.lock().await.reset();
    }

    /// Where the session is in its lifecycle.
    pub async fn state(&self) -> SessionState {
        self.inner.state.lock().await.phase
    }

    /// The signed-in member, if known.
    pub async fn user(&self) -> Option<User> {
        self.inner.state.lock().await.user.clone()
    }

    /// The access token attached to outgoing requests.
    pub async fn access_token(&self) -> Option<String> {
        self.inner.state.lock().await.session.access_token.clone()
    }

    /// True when a member is known and a token is held.
    pub async fn is_authenticated(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.user.is_some() && state.session.access_token.is_some()
    }

    /// True when the signed-in member has `role`.
    pub async fn has_role(&self, role: UserRole) -> bool {
        self.inner
            .state
            .lock()
            .await
            .user
            .as_ref()
            .is_some_and(|user| user.user_type == role)
    }

    /// Signs in and returns the member's profile.
    ///
    /// Stored tokens are only replaced once the server accepts the
    /// credentials.
    pub async fn login(&self, email: &str, password: &str, role: UserRole) -> Result<User> {
        let request = LoginRequest::new(email, password, role);
        request.validate_fields()?;
        let options = RequestOptions::post_json(&request)?;
        self.authenticate(LOGIN_ENDPOINT, options, LOGIN_FALLBACK)
            .await
    }

    /// Creates an account and signs in as the new member.
    pub async fn register(&self, form: &RegistrationForm) -> Result<User> {
        form.validate_fields()?;
        let options = RequestOptions::post_json(form)?;
        self.authenticate(REGISTER_ENDPOINT, options, REGISTER_FALLBACK)
            .await
    }

    async fn authenticate(
        &self,
        endpoint: &str,
        options: RequestOptions,
        fallback: &str,
    ) -> Result<User> {
        let previous = {
            let mut state = self.inner.state.lock().await;
            std::mem::replace(&mut state.phase, SessionState::Authenticating)
        };

        let result = self
            .authenticated_request(endpoint, options)
            .await
            .into_result()
            .and_then(|body| body.into_json::<AuthResponse>());

        match result {
            Ok(auth) => {
                let session = Session::new(auth.access_token, auth.refresh_token);
                let mut state = self.inner.state.lock().await;
                if let Err(err) = session.replace(self.inner.store.as_ref()) {
                    tracing::warn!(error = %err, "could not persist credentials");
                }
                state.reset();
                state.session = session;
                state.user = Some(auth.user.clone());
                state.phase = SessionState::Authenticated;
                tracing::info!(user_id = auth.user.id, role = %auth.user.user_type, "signed in");
                Ok(auth.user)
            }
            Err(err) => {
                self.inner.state.lock().await.phase = previous;
                tracing::debug!(endpoint, error = %err, "sign-in rejected");
                Err(with_fallback(err, fallback))
            }
        }
    }

    /// Fetches the signed-in member and replaces the cached profile.
    pub async fn current_user(&self) -> Result<User> {
        let user: User = self.get_json(CURRENT_USER_ENDPOINT).await?;
        self.inner.state.lock().await.user = Some(user.clone());
        Ok(user)
    }

    /// Applies a partial profile update and replaces the cached profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(Error::validation("Nothing to update", None));
        }
        let options = RequestOptions::put_json(update)?;
        let user: User = self
            .authenticated_request(PROFILE_ENDPOINT, options)
            .await
            .into_result()
            .and_then(|body| body.into_json())
            .map_err(|err| with_fallback(err, PROFILE_FALLBACK))?;
        self.inner.state.lock().await.user = Some(user.clone());
        Ok(user)
    }

    /// Signs out.
    ///
    /// The server is told on a best-effort basis; local credentials are
    /// cleared whatever it answers.
    pub async fn logout(&self) {
        if let Err(err) = self
            .authenticated_request(LOGOUT_ENDPOINT, RequestOptions::post_empty())
            .await
            .into_result()
        {
            tracing::warn!(error = %err, "logout notification failed");
        }
        self.abandon_refresh().await;
        self.clear_credentials().await;
        tracing::info!("signed out");
    }

    /// `GET` an endpoint and decode the JSON answer.
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.authenticated_request(endpoint, RequestOptions::get())
            .await
            .into_result()?
            .into_json()
    }

    /// `POST` a JSON body to an endpoint and decode the JSON answer.
    pub async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let options = RequestOptions::post_json(body)?;
        self.authenticated_request(endpoint, options)
            .await
            .into_result()?
            .into_json()
    }

    /// Issues a request with the current bearer token.
    ///
    /// A 401 from anything but a credential endpoint triggers one refresh and
    /// one retry with the new token.  When the refresh fails the stored
    /// credentials are cleared and `Unauthenticated` is returned.
    pub async fn authenticated_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> RequestOutcome<ResponseBody> {
        SESSION_REQUESTS.click();
        let start = Instant::now();
        let outcome = self.request_with_refresh(endpoint, &options).await;
        SESSION_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if !outcome.is_success() {
            SESSION_REQUEST_ERRORS.click();
        }
        outcome
    }

    async fn request_with_refresh(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> RequestOutcome<ResponseBody> {
        let token = self.access_token().await;
        let response = match self.send(endpoint, options, token.as_deref()).await {
            Ok(response) => response,
            Err(err) => return RequestOutcome::Failed(err),
        };

        if response.status() != StatusCode::UNAUTHORIZED || is_credential_endpoint(endpoint) {
            return Self::read_body(response).await.into();
        }

        tracing::debug!(endpoint, "access token rejected; refreshing");
        let fresh = match self.refresh_after(token.as_deref()).await {
            Ok(fresh) => fresh,
            // A discarded refresh means the credentials were already
            // replaced or dropped; leave them as they are now.
            Err(err) if err.is_unauthenticated() => {
                tracing::debug!(endpoint, "session changed during refresh");
                SESSION_EXPIRED.click();
                return RequestOutcome::Unauthenticated;
            }
            Err(err) => {
                tracing::warn!(endpoint, error = %err, "session expired");
                SESSION_EXPIRED.click();
                self.clear_credentials().await;
                return RequestOutcome::Unauthenticated;
            }
        };

        SESSION_RETRIES.click();
        match self.send(endpoint, options, Some(&fresh)).await {
            Ok(response) => Self::read_body(response).await.into(),
            Err(err) => RequestOutcome::Failed(err),
        }
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Concurrent callers share one exchange: whoever arrives while a
    /// refresh is in flight waits for that refresh instead of starting
    /// another.  Without a refresh token this fails without touching the
    /// network.  On failure the held tokens are left as they were.
    pub async fn refresh(&self) -> Result<()> {
        self.refresh_shared().await.map(|_| ())
    }

    /// Refreshes unless `stale` has already been replaced, in which case the
    /// replacement is returned straight away.
    async fn refresh_after(&self, stale: Option<&str>) -> Result<String> {
        {
            let state = self.inner.state.lock().await;
            match &state.session.access_token {
                Some(current) if Some(current.as_str()) != stale => {
                    SESSION_REFRESH_JOINS.click();
                    return Ok(current.clone());
                }
                _ => {}
            }
        }
        self.refresh_shared().await
    }

    async fn refresh_shared(&self) -> Result<String> {
        let flight = {
            let mut slot = self.inner.refresh_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    SESSION_REFRESH_JOINS.click();
                    pending.flight.clone()
                }
                None => {
                    let id = self.inner.next_flight.fetch_add(1, Ordering::Relaxed);
                    let client = self.clone();
                    let flight = async move {
                        let result = client.exchange_refresh_token().await;
                        let mut slot = client.inner.refresh_flight.lock().await;
                        if slot.as_ref().is_some_and(|pending| pending.id == id) {
                            slot.take();
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(PendingRefresh {
                        id,
                        flight: flight.clone(),
                    });
                    flight
                }
            }
        };
        flight.await
    }

    /// Forgets the refresh in flight so the next caller starts a new one.
    async fn abandon_refresh(&self) {
        self.inner.refresh_flight.lock().await.take();
    }

    async fn exchange_refresh_token(&self) -> Result<String> {
        let (refresh_token, generation) = {
            let mut state = self.inner.state.lock().await;
            let held = state.session.refresh_token.clone();
            let refresh_token = match held {
                Some(token) => Some(token),
                None => self.inner.store.get(REFRESH_TOKEN_KEY)?,
            };
            if refresh_token.is_some() {
                state.phase = SessionState::RefreshPending;
            }
            (refresh_token, state.generation)
        };
        let Some(refresh_token) = refresh_token else {
            SESSION_REFRESH_FAILURES.click();
            return Err(Error::authentication("No refresh token available"));
        };
        SESSION_REFRESHES.click();

        match self.post_refresh(refresh_token).await {
            Ok(refreshed) => {
                let mut state = self.inner.state.lock().await;
                if state.generation != generation {
                    tracing::debug!("credentials changed during refresh; discarding new token");
                    SESSION_REFRESH_FAILURES.click();
                    return Err(Error::Unauthenticated);
                }
                let session = Session::new(refreshed.access_token.clone(), refreshed.refresh_token);
                if let Err(err) = session.save(self.inner.store.as_ref()) {
                    tracing::warn!(error = %err, "could not persist refreshed credentials");
                }
                state.session.access_token = session.access_token;
                if session.refresh_token.is_some() {
                    state.session.refresh_token = session.refresh_token;
                }
                state.phase = SessionState::Authenticated;
                tracing::debug!("access token refreshed");
                Ok(refreshed.access_token)
            }
            Err(err) => {
                SESSION_REFRESH_FAILURES.click();
                let mut state = self.inner.state.lock().await;
                if state.generation == generation {
                    state.phase = state.settled_phase();
                }
                tracing::debug!(error = %err, "token refresh failed");
                Err(err)
            }
        }
    }

    async fn post_refresh(&self, refresh_token: String) -> Result<RefreshResponse> {
        let options = RequestOptions::post_json(&RefreshRequest { refresh_token })?;
        let response = self.send(REFRESH_ENDPOINT, &options, None).await?;
        Self::read_body(response).await?.into_json()
    }

    async fn clear_credentials(&self) {
        let mut state = self.inner.state.lock().await;
        state.reset();
        if let Err(err) = Session::erase(self.inner.store.as_ref()) {
            tracing::warn!(error = %err, "could not erase stored credentials");
        }
    }

    /// Create and return default headers for API requests.
    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let url = if endpoint.starts_with('/') {
            format!("{}{}", self.inner.base_url, endpoint)
        } else {
            format!("{}/{}", self.inner.base_url, endpoint)
        };
        Ok(Url::parse(&url)?)
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<Response> {
        let url = self.endpoint_url(endpoint)?;
        let mut request = self
            .inner
            .http
            .request(options.method.clone(), url)
            .headers(Self::default_headers());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = request.headers(options.headers.clone());
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        tracing::debug!(method = %options.method, endpoint, "sending request");
        request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Request timed out: {}", e),
                    Some(self.inner.timeout.as_secs_f64()),
                )
            } else if e.is_connect() {
                Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
            } else {
                Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
            }
        })
    }

    async fn read_body(response: Response) -> Result<ResponseBody> {
        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|val| val.to_str().ok())
            .is_some_and(|val| val.contains("application/json"));

        if is_json {
            response
                .json::<serde_json::Value>()
                .await
                .map(ResponseBody::Json)
                .map_err(|e| {
                    Error::serialization(
                        format!("Failed to parse response: {}", e),
                        Some(Box::new(e)),
                    )
                })
        } else {
            response.text().await.map(ResponseBody::Text).map_err(|e| {
                Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
            })
        }
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let message = match response.text().await {
            Ok(body) => server_message(&body),
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let message = message.unwrap_or_else(|| format!("HTTP {status_code}"));
        Error::from_status(status_code, message, retry_after)
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

fn is_credential_endpoint(endpoint: &str) -> bool {
    let path = endpoint.split(['?', '#']).next().unwrap_or(endpoint);
    let path = path.trim_end_matches('/');
    CREDENTIAL_ENDPOINTS.contains(&path)
}

/// Pulls a human-readable message out of an error body: `detail`, then
/// `message`, then `error.message`.  Validation failures that report
/// `detail` as a list of `{msg}` objects are joined with `; `.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = match value.get("detail") {
        Some(serde_json::Value::String(detail)) => Some(detail.clone()),
        Some(serde_json::Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    };
    detail
        .or_else(|| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .filter(|message| !message.trim().is_empty())
}

/// Swaps in `fallback` when the server rejected a request without saying why.
fn with_fallback(err: Error, fallback: &str) -> Error {
    match err.status_code() {
        Some(code)
            if err.message().trim().is_empty() || err.message() == format!("HTTP {code}") =>
        {
            Error::from_status(code, fallback.to_string(), None)
        }
        _ => err,
    }
}
