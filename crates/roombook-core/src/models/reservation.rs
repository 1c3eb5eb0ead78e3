use std::fmt;

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::api::ValidationErrors;

/// First bookable time of day
const OPENING_HOUR: u32 = 9;

/// Last bookable time of day (18:00 exactly, nothing after)
const CLOSING_HOUR: u32 = 18;

/// Booking granularity in minutes
const SLOT_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ReservationStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The reservation owner. Depending on the serializer the API sends either
/// the user's id or the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
#[serde(untagged)]
pub enum UserRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "#{}", id),
            UserRef::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Reservation {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// Room name if the API sent one, otherwise the room id
    pub fn room_display(&self) -> String {
        match self.room_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.room.to_string(),
        }
    }

    /// Owner for display: `user_name`, then `user`, then empty
    pub fn owner_display(&self) -> String {
        match (&self.user_name, &self.user) {
            (Some(name), _) if !name.is_empty() => name.clone(),
            (_, Some(user)) => user.to_string(),
            _ => String::new(),
        }
    }
}

/// Keep only reservations still waiting for a staff decision
pub fn pending_only(reservations: Vec<Reservation>) -> Vec<Reservation> {
    reservations.into_iter().filter(Reservation::is_pending).collect()
}

/// Body of `POST /reservations/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReservation {
    pub title: String,
    pub room: i64,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl NewReservation {
    /// Check the booking rules the server enforces, so obvious mistakes are
    /// reported without a round trip. Overlaps are left to the server.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.title.trim().is_empty() {
            errors.push(Some("title"), "This field may not be blank.");
        }
        check_time_range(&mut errors, Some(self.start_time), Some(self.end_time));
        errors.into_result()
    }
}

/// Body of `PUT /reservations/:id/`. Only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReservationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
}

impl ReservationUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if matches!(self.title.as_deref(), Some(t) if t.trim().is_empty()) {
            errors.push(Some("title"), "This field may not be blank.");
        }
        check_time_range(&mut errors, self.start_time, self.end_time);
        errors.into_result()
    }
}

fn check_time_range(
    errors: &mut ValidationErrors,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            errors.push(None, "start_time must be before end_time.");
        }
    }

    for (time, label) in [(start, "start_time"), (end, "end_time")] {
        let Some(time) = time else { continue };
        if !within_opening_hours(time) {
            errors.push(None, format!("{} must be between 09:00 and 18:00.", label));
        } else if !on_slot_boundary(time) {
            errors.push(
                None,
                format!("{} must be on a 30-minute interval (minutes 0 or 30).", label),
            );
        }
    }
}

fn within_opening_hours(time: NaiveTime) -> bool {
    let hour = time.hour();
    (OPENING_HOUR..=CLOSING_HOUR).contains(&hour)
        && !(hour == CLOSING_HOUR && (time.minute() > 0 || time.second() > 0))
}

fn on_slot_boundary(time: NaiveTime) -> bool {
    time.minute() % SLOT_MINUTES == 0 && time.second() == 0 && time.nanosecond() == 0
}

/// Every bookable start or end time, 09:00 through 18:00 in half hours
pub fn time_slots() -> Vec<NaiveTime> {
    (OPENING_HOUR..=CLOSING_HOUR)
        .flat_map(|h| [0, SLOT_MINUTES].into_iter().map(move |m| (h, m)))
        .filter(|&(h, m)| !(h == CLOSING_HOUR && m > 0))
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn new_reservation(start: NaiveTime, end: NaiveTime) -> NewReservation {
        NewReservation {
            title: "Sprint review".to_string(),
            room: 1,
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_parse_reservation() {
        let json = r#"{"id": 11, "room": 2, "user": "alice", "title": "Standup", "description": "",
            "date": "2025-06-02", "start_time": "09:00:00", "end_time": "09:30:00",
            "status": "pending", "created_at": "2025-06-01T08:00:00Z"}"#;

        let res: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(res.start_time, time(9, 0));
        assert_eq!(res.user, Some(UserRef::Name("alice".to_string())));
        assert!(res.is_pending());
        assert_eq!(res.room_display(), "2");
        assert_eq!(res.owner_display(), "alice");
    }

    #[test]
    fn test_parse_reservation_with_names_and_numeric_user() {
        let json = r#"{"id": 12, "room": 2, "room_name": "Orion", "user": 5, "user_name": "bob",
            "title": "Planning", "date": "2025-06-02", "start_time": "10:00:00",
            "end_time": "11:30:00", "status": "confirmed"}"#;

        let res: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(res.user, Some(UserRef::Id(5)));
        assert_eq!(res.room_display(), "Orion");
        assert_eq!(res.owner_display(), "bob");
        assert_eq!(res.status, ReservationStatus::Confirmed);
    }

    #[test]
    fn test_unknown_status_still_parses() {
        let json = r#"{"id": 1, "room": 1, "title": "x", "date": "2025-06-02",
            "start_time": "10:00:00", "end_time": "11:00:00", "status": "archived"}"#;
        let res: Reservation = serde_json::from_str(json).unwrap();
        assert_eq!(res.status, ReservationStatus::Unknown);
    }

    #[test]
    fn test_pending_only() {
        let base: Reservation = serde_json::from_str(
            r#"{"id": 1, "room": 1, "title": "x", "date": "2025-06-02",
                "start_time": "10:00:00", "end_time": "11:00:00", "status": "pending"}"#,
        )
        .unwrap();
        let mut confirmed = base.clone();
        confirmed.id = 2;
        confirmed.status = ReservationStatus::Confirmed;

        let pending = pending_only(vec![base, confirmed]);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, 1);
    }

    #[test]
    fn test_new_reservation_serializes_server_formats() {
        let body = serde_json::to_value(new_reservation(time(9, 0), time(10, 30))).unwrap();
        assert_eq!(body["date"], "2025-06-02");
        assert_eq!(body["start_time"], "09:00:00");
        assert_eq!(body["end_time"], "10:30:00");
        assert_eq!(body["room"], 1);
    }

    #[test]
    fn test_validate_accepts_bookable_range() {
        assert!(new_reservation(time(9, 0), time(18, 0)).validate().is_ok());
        assert!(new_reservation(time(12, 30), time(13, 0)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let errors = new_reservation(time(11, 0), time(10, 0)).validate().unwrap_err();
        assert_eq!(errors.to_string(), "start_time must be before end_time.");

        assert!(new_reservation(time(10, 0), time(10, 0)).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_outside_hours_and_off_slot() {
        let errors = new_reservation(time(8, 30), time(18, 30)).validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "start_time must be between 09:00 and 18:00.; end_time must be between 09:00 and 18:00."
        );

        let errors = new_reservation(time(9, 15), time(10, 0)).validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "start_time must be on a 30-minute interval (minutes 0 or 30)."
        );
    }

    #[test]
    fn test_validate_blank_title() {
        let mut res = new_reservation(time(9, 0), time(10, 0));
        res.title = "  ".to_string();
        let errors = res.validate().unwrap_err();
        assert_eq!(errors.to_string(), "title: This field may not be blank.");
    }

    #[test]
    fn test_update_only_sends_set_fields() {
        let update = ReservationUpdate {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&update).unwrap(), r#"{"title":"Renamed"}"#);
        assert!(update.validate().is_ok());
        assert!(ReservationUpdate::default().is_empty());
    }

    #[test]
    fn test_update_checks_times_when_both_given() {
        let update = ReservationUpdate {
            start_time: Some(time(15, 0)),
            end_time: Some(time(14, 0)),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let only_end = ReservationUpdate {
            end_time: Some(time(14, 0)),
            ..Default::default()
        };
        assert!(only_end.validate().is_ok());
    }

    #[test]
    fn test_time_slots() {
        let slots = time_slots();
        assert_eq!(slots.len(), 19);
        assert_eq!(slots.first(), Some(&time(9, 0)));
        assert_eq!(slots[1], time(9, 30));
        assert_eq!(slots.last(), Some(&time(18, 0)));
    }
}
