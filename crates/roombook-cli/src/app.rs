use std::io::{self, Write};

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use roombook_core::api::ApiError;
use roombook_core::models::{
    pending_only, time_slots, NewReservation, Registration, Reservation, ReservationUpdate, Room,
};
use roombook_core::utils::{format_date, format_time, truncate_string};
use roombook_core::{ApiClient, Config, SessionEvent, SessionState};

use crate::args::Command;

/// Environment variables that pre-fill the login prompt
const USERNAME_ENV: &str = "ROOMBOOK_USERNAME";
const PASSWORD_ENV: &str = "ROOMBOOK_PASSWORD";

/// Maximum width of the title column in listings
const TITLE_WIDTH: usize = 28;

pub struct App {
    config: Config,
    client: ApiClient,
    json: bool,
}

/// Log the underlying error and turn it into the message shown to the user
fn fail(error: ApiError, action: &str) -> anyhow::Error {
    warn!(error = %error, action, "Request failed");
    anyhow::anyhow!(error.user_message(action))
}

impl App {
    pub fn new(mut config: Config, url: Option<String>, json: bool) -> Result<Self> {
        if let Some(url) = url {
            config.base_url = Some(url);
        }
        debug!(base_url = config.base_url(), storage = ?config.token_storage, "Config loaded");

        let store = config.token_store()?;
        let client = ApiClient::new(config.base_url(), store)?;

        // A stored token that can't be decoded is a broken session
        let state = client.session().restore()?;
        debug!(logged_in = state.is_logged_in(), "Session restored");

        Self::watch_session(&client);

        Ok(Self { config, client, json })
    }

    /// Follow session events in the background; a forced logout is the
    /// host's cue to send the user back to `login`.
    fn watch_session(client: &ApiClient) {
        let mut events = client.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::LoggedOut { reason }) => {
                        warn!(reason = %reason, "Session ended, run `roombook login` to continue");
                    }
                    Ok(SessionEvent::Renewed) => debug!("Access token renewed"),
                    Ok(SessionEvent::LoggedIn { username }) => {
                        debug!(username = %username, "Logged in")
                    }
                    Err(RecvError::Lagged(skipped)) => debug!(skipped, "Session events lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username } => self.login(username).await,
            Command::Signup { username, email } => self.signup(username, email).await,
            Command::Logout => {
                self.client.logout().map_err(|e| fail(e, "log out"))?;
                println!("Logged out.");
                Ok(())
            }
            Command::Whoami => self.whoami().await,
            Command::Rooms => {
                let rooms = self.client.rooms().await.map_err(|e| fail(e, "load rooms"))?;
                self.print_rooms(&rooms)
            }
            Command::Reservations { mine, pending } => {
                let reservations = if mine {
                    self.client.my_reservations().await
                } else {
                    self.client.reservations().await
                }
                .map_err(|e| fail(e, "load reservations"))?;

                let reservations = if pending {
                    pending_only(reservations)
                } else {
                    reservations
                };
                self.print_reservations(&reservations)
            }
            Command::Reserve { room, date, start, end, title } => {
                let new = NewReservation {
                    title,
                    room,
                    date,
                    start_time: start,
                    end_time: end,
                };
                let created = self
                    .client
                    .create_reservation(&new)
                    .await
                    .map_err(|e| fail(e, "create reservation"))?;
                println!("Reservation created successfully! (#{}, {})", created.id, created.status);
                Ok(())
            }
            Command::Edit { id, title, room, date, start, end } => {
                let update = ReservationUpdate {
                    title,
                    room,
                    date,
                    start_time: start,
                    end_time: end,
                };
                if update.is_empty() {
                    anyhow::bail!(
                        "Nothing to change. Pass at least one of --title, --room, --date, --start, --end."
                    );
                }
                let updated = self
                    .client
                    .update_reservation(id, &update)
                    .await
                    .map_err(|e| fail(e, "update reservation"))?;
                self.print_reservations(std::slice::from_ref(&updated))
            }
            Command::Cancel { id } => {
                self.client
                    .cancel_reservation(id)
                    .await
                    .map_err(|e| fail(e, "cancel reservation"))?;
                println!("Reservation #{} cancelled.", id);
                Ok(())
            }
            Command::Approve { id } => self.decide(id, true).await,
            Command::Reject { id } => self.decide(id, false).await,
            Command::Slots => {
                let slots: Vec<String> = time_slots().into_iter().map(format_time).collect();
                println!("{}", slots.join("  "));
                Ok(())
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username
            .or_else(|| std::env::var(USERNAME_ENV).ok())
            .or_else(|| self.config.last_username.clone())
        {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => prompt_line("Username: ")?,
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => password,
            _ => rpassword::prompt_password("Password: ")?,
        };

        if username.is_empty() || password.is_empty() {
            anyhow::bail!("Username and password required");
        }

        let state = match self.client.login(&username, &password).await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Login failed");
                anyhow::bail!(e.login_message());
            }
        };

        self.config.last_username = Some(username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        info!(username = %username, "Login successful");
        println!("Logged in as {}.", display_user(&state, &username));
        Ok(())
    }

    async fn signup(&mut self, username: String, email: String) -> Result<()> {
        let password = rpassword::prompt_password("Password: ")?;
        let password2 = rpassword::prompt_password("Confirm password: ")?;

        let registration = Registration {
            username: username.clone(),
            email,
            password,
            password2,
        };
        let state = self
            .client
            .signup(&registration)
            .await
            .map_err(|e| fail(e, "sign up"))?;

        self.config.last_username = Some(username.clone());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Account created. Logged in as {}.", display_user(&state, &username));
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        let state = self.client.session().state()?;
        let Some(user) = state.user() else {
            println!("Not logged in.");
            return Ok(());
        };

        // Roles come from the server; token claims are only for display
        let roles = self
            .client
            .confirm_roles()
            .await
            .map_err(|e| fail(e, "load user info"))?;

        let role = if roles.is_superuser {
            "superuser"
        } else if roles.is_staff {
            "staff"
        } else {
            "member"
        };
        if user.email.is_empty() {
            println!("{} ({})", user.username, role);
        } else {
            println!("{} <{}> ({})", user.username, user.email, role);
        }
        Ok(())
    }

    // =========================================================================
    // Staff
    // =========================================================================

    async fn decide(&self, id: i64, approve: bool) -> Result<()> {
        let (action, verb) = if approve {
            ("approve reservation", "approved")
        } else {
            ("reject reservation", "rejected")
        };

        let roles = self
            .client
            .confirm_roles()
            .await
            .map_err(|e| fail(e, action))?;
        if !roles.is_admin() {
            anyhow::bail!("Staff access required to {}.", action);
        }

        let result = if approve {
            self.client.approve_reservation(id).await
        } else {
            self.client.reject_reservation(id).await
        };
        let updated = result.map_err(|e| fail(e, action))?;

        match updated {
            Some(reservation) => {
                println!("Reservation #{} {} (now {}).", id, verb, reservation.status)
            }
            None => println!("Reservation #{} {}.", id, verb),
        }
        Ok(())
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn print_rooms(&self, rooms: &[Room]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(rooms)?);
            return Ok(());
        }
        if rooms.is_empty() {
            println!("No rooms available.");
            return Ok(());
        }
        for room in rooms {
            println!("{:>4}  {:<40} {}", room.id, room.label(), room.status_display());
        }
        Ok(())
    }

    fn print_reservations(&self, reservations: &[Reservation]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(reservations)?);
            return Ok(());
        }
        if reservations.is_empty() {
            println!("No reservations found.");
            return Ok(());
        }
        for res in reservations {
            println!(
                "{:>4}  {:<width$}  {}  {}-{}  {:<16} {:<12} {}",
                res.id,
                truncate_string(&res.title, TITLE_WIDTH),
                format_date(res.date),
                format_time(res.start_time),
                format_time(res.end_time),
                truncate_string(&res.room_display(), 16),
                truncate_string(&res.owner_display(), 12),
                res.status,
                width = TITLE_WIDTH,
            );
        }
        Ok(())
    }
}

fn display_user(state: &SessionState, fallback: &str) -> String {
    match state.user() {
        Some(user) if !user.username.is_empty() => user.username.clone(),
        _ => fallback.to_string(),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
