//! Authenticated API client with transparent access-token renewal.
//!
//! Every protected call goes through [`ApiClient::execute`]:
//!
//! 1. the access token is read fresh from the token store and attached as a
//!    bearer header (or the header is removed when there is none);
//! 2. a `401` on a request that has not been retried, with a refresh token
//!    available, triggers one renewal through `/token/refresh/`;
//! 3. on success the request is replayed once with the new token and its
//!    outcome returned as-is; on failure the session is invalidated.
//!
//! Renewal is single-flight: concurrent 401s queue on one guard, and a
//! request that finds the token already renewed by someone else replays
//! with it instead of calling the refresh endpoint again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::auth::{Session, SessionEvent, TokenKind, TokenPair, TokenStore};

use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport, REQUEST_TIMEOUT_SECS};
use super::ApiError;

pub(crate) const REFRESH_PATH: &str = "/token/refresh/";

/// Deadline for the whole refresh exchange. Running into it ends the session.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(REQUEST_TIMEOUT_SECS);

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    /// Only present when the server rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

/// API client for the reservation service.
/// Clone is cheap and clones share the session and the renewal guard.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Session,
    renewal: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a client talking HTTP to `base_url`
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(base_url)?;
        Ok(Self::with_transport(Arc::new(transport), store))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            session: Session::new(store),
            renewal: Arc::new(Mutex::new(())),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Session notifications; `LoggedOut` means the host should show its
    /// login entry point.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        self.session.store()
    }

    /// Send a request without the bearer header or renewal.
    pub(crate) async fn send_unauthenticated(
        &self,
        request: ApiRequest,
    ) -> Result<ApiResponse, ApiError> {
        self.transport.send(&request).await
    }

    fn authorize(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        match self.store().get(TokenKind::Access)? {
            Some(access) => request.set_bearer(&access),
            None => {
                request.clear_bearer();
                Ok(())
            }
        }
    }

    /// Send a protected request through the bearer/renewal pipeline.
    ///
    /// Returns the final response whatever its status; only transport
    /// failures and renewal failures are errors here.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.authorize(&mut request)?;
        let response = self.transport.send(&request).await?;

        if response.status != StatusCode::UNAUTHORIZED || request.retried {
            return Ok(response);
        }
        if self.store().get(TokenKind::Refresh)?.is_none() {
            debug!(path = %request.path, "Unauthorized with no refresh token, passing through");
            return Ok(response);
        }

        request.retried = true;
        let used = request.bearer_token().map(str::to_string);
        let access = self.renew(used.as_deref()).await?;

        request.set_bearer(&access)?;
        debug!(
            method = %request.method,
            path = %request.path,
            "Replaying request with renewed token"
        );
        self.transport.send(&request).await
    }

    /// Obtain a usable access token after `used` was rejected.
    async fn renew(&self, used: Option<&str>) -> Result<String, ApiError> {
        let _guard = self.renewal.lock().await;

        let current = self.store().get(TokenKind::Access)?;
        match (current, used) {
            (Some(current), used) if Some(current.as_str()) != used => {
                debug!("Access token already renewed by a concurrent request");
                return Ok(current);
            }
            (None, Some(_)) => {
                return Err(ApiError::SessionExpired(
                    "session ended while the request was in flight".to_string(),
                ));
            }
            _ => {}
        }

        let Some(refresh) = self.store().get(TokenKind::Refresh)? else {
            return Err(self.invalidate("no refresh token available".to_string()));
        };

        match self.refresh_access(&refresh).await {
            Ok(renewed) => {
                match renewed.refresh {
                    Some(ref rotated) => self.store().set_pair(&TokenPair {
                        access: renewed.access.clone(),
                        refresh: rotated.clone(),
                    })?,
                    None => self.store().set(TokenKind::Access, &renewed.access)?,
                }
                info!(rotated = renewed.refresh.is_some(), "Access token renewed");
                self.session.emit(SessionEvent::Renewed);
                Ok(renewed.access)
            }
            Err(e) => {
                warn!(error = %e, "Token renewal failed, ending session");
                Err(self.invalidate(e.to_string()))
            }
        }
    }

    async fn refresh_access(&self, refresh: &str) -> Result<RefreshResponse, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH).with_json(&RefreshRequest { refresh })?;
        let response = tokio::time::timeout(REFRESH_TIMEOUT, self.send_unauthenticated(request))
            .await
            .map_err(|_| ApiError::Timeout(REFRESH_TIMEOUT.as_secs()))??;
        response.error_for_status()?.json()
    }

    /// Clear both tokens and announce the logout, then hand back the error
    /// for the caller to return. If the tokens can't be cleared nothing is
    /// announced and the store failure is returned instead.
    fn invalidate(&self, reason: String) -> ApiError {
        if let Err(e) = self.store().clear() {
            warn!(error = %e, reason = %reason, "Failed to clear tokens, session left in place");
            return ApiError::TokenStore(e);
        }
        self.session.emit(SessionEvent::LoggedOut { reason: reason.clone() });
        ApiError::SessionExpired(reason)
    }
}
