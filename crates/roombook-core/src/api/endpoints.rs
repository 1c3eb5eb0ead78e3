//! Typed operations for every endpoint the client consumes.

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::auth::{SessionEvent, SessionState, TokenPair};
use crate::models::{
    ConfirmedRoles, Credentials, NewReservation, Registration, Reservation, ReservationUpdate,
    Room, UserProfile,
};

use super::transport::ApiRequest;
use super::{ApiClient, ApiError, ValidationErrors};

const TOKEN_PATH: &str = "/token/";
const REGISTER_PATH: &str = "/register/";
const ME_PATH: &str = "/me/";
const ROOMS_PATH: &str = "/rooms/";
const RESERVATIONS_PATH: &str = "/reservations/";
const MY_RESERVATIONS_PATH: &str = "/my-reservations/";

fn reservation_path(id: i64) -> String {
    format!("{}{}/", RESERVATIONS_PATH, id)
}

impl ApiClient {
    // ===== Request helpers =====

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.execute(request).await?.error_for_status()?.json()
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(ApiRequest::get(path)).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        request: ApiRequest,
        body: &B,
    ) -> Result<T, ApiError> {
        self.fetch(request.with_json(body)?).await
    }

    // ===== Authentication =====

    /// Exchange credentials for a token pair and store it.
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionState, ApiError> {
        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post(TOKEN_PATH).with_json(&credentials)?;

        let pair: TokenPair = self
            .send_unauthenticated(request)
            .await?
            .error_for_status()?
            .json()?;

        self.session().store().set_pair(&pair)?;
        info!(username, "Login successful");
        self.session().emit(SessionEvent::LoggedIn {
            username: username.to_string(),
        });

        Ok(SessionState::derive(Some(&pair.access)))
    }

    /// Create an account. Password confirmation is checked before sending.
    pub async fn register(&self, registration: &Registration) -> Result<(), ApiError> {
        if !registration.passwords_match() {
            let mut errors = ValidationErrors::default();
            errors.push(None, "Passwords don't match");
            return Err(ApiError::Validation(errors));
        }

        let request = ApiRequest::post(REGISTER_PATH).with_json(registration)?;
        self.send_unauthenticated(request).await?.error_for_status()?;
        info!(username = %registration.username, "Account registered");
        Ok(())
    }

    /// Register, then log in with the same credentials.
    pub async fn signup(&self, registration: &Registration) -> Result<SessionState, ApiError> {
        self.register(registration).await?;
        let credentials = registration.credentials();
        self.login(&credentials.username, &credentials.password).await
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        Ok(self.session().logout("user logged out")?)
    }

    /// Current user as the server sees it
    pub async fn me(&self) -> Result<UserProfile, ApiError> {
        self.get(ME_PATH).await
    }

    /// Roles confirmed by `/me/`. Use these, not the decoded token claims,
    /// to decide whether staff actions are offered.
    pub async fn confirm_roles(&self) -> Result<ConfirmedRoles, ApiError> {
        Ok(self.me().await?.roles())
    }

    // ===== Rooms =====

    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get(ROOMS_PATH).await
    }

    // ===== Reservations =====

    /// Reservations visible to the current user (all of them for staff)
    pub async fn reservations(&self) -> Result<Vec<Reservation>, ApiError> {
        self.get(RESERVATIONS_PATH).await
    }

    pub async fn my_reservations(&self) -> Result<Vec<Reservation>, ApiError> {
        self.get(MY_RESERVATIONS_PATH).await
    }

    pub async fn create_reservation(
        &self,
        reservation: &NewReservation,
    ) -> Result<Reservation, ApiError> {
        reservation.validate().map_err(ApiError::Validation)?;
        let created: Reservation = self
            .send_json(ApiRequest::post(RESERVATIONS_PATH), reservation)
            .await?;
        info!(id = created.id, room = created.room, "Reservation created");
        Ok(created)
    }

    pub async fn update_reservation(
        &self,
        id: i64,
        update: &ReservationUpdate,
    ) -> Result<Reservation, ApiError> {
        update.validate().map_err(ApiError::Validation)?;
        self.send_json(ApiRequest::put(reservation_path(id)), update).await
    }

    pub async fn cancel_reservation(&self, id: i64) -> Result<(), ApiError> {
        self.execute(ApiRequest::delete(reservation_path(id)))
            .await?
            .error_for_status()?;
        info!(id, "Reservation cancelled");
        Ok(())
    }

    pub async fn approve_reservation(&self, id: i64) -> Result<Option<Reservation>, ApiError> {
        self.decide(id, "approve").await
    }

    pub async fn reject_reservation(&self, id: i64) -> Result<Option<Reservation>, ApiError> {
        self.decide(id, "reject").await
    }

    /// Staff decision. The server may answer with the updated reservation
    /// or with an empty/status-only body.
    async fn decide(&self, id: i64, action: &str) -> Result<Option<Reservation>, ApiError> {
        let path = format!("{}{}/", reservation_path(id), action);
        let response = self.execute(ApiRequest::post(path)).await?.error_for_status()?;
        info!(id, action, "Reservation decision recorded");

        if response.body.trim().is_empty() {
            return Ok(None);
        }
        match response.json::<Reservation>() {
            Ok(reservation) => Ok(Some(reservation)),
            Err(e) => {
                debug!(error = %e, "Decision response is not a reservation");
                Ok(None)
            }
        }
    }
}
