//! Data models for the reservation API.
//!
//! - `Room`: bookable conference rooms
//! - `Reservation`, `NewReservation`, `ReservationUpdate`: bookings and the
//!   request bodies that create or edit them
//! - `UserProfile`, `ConfirmedRoles`: the server's view of the current user
//! - `Credentials`, `Registration`: login and sign-up bodies

pub mod reservation;
pub mod room;
pub mod user;

pub use reservation::{
    pending_only, time_slots, NewReservation, Reservation, ReservationStatus, ReservationUpdate,
    UserRef,
};
pub use room::Room;
pub use user::{ConfirmedRoles, Credentials, Registration, UserProfile};
