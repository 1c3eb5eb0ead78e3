use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};

use roombook_core::utils::{parse_date, parse_time};

/// roombook - book conference rooms from the terminal
#[derive(Parser, Debug)]
#[command(name = "roombook")]
#[command(version, about = "Conference room reservations from the terminal", long_about = None)]
pub struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long = "url", env = "ROOMBOOK_API_URL", global = true)]
    pub url: Option<String>,

    /// Print results as JSON
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Also write logs to a daily file in this directory
    #[arg(long = "log-dir", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session tokens
    Login {
        #[arg(short = 'u', long = "username")]
        username: Option<String>,
    },

    /// Create an account, then log in
    Signup {
        #[arg(short = 'u', long = "username")]
        username: String,

        #[arg(short = 'e', long = "email")]
        email: String,
    },

    /// Forget the stored tokens
    Logout,

    /// Show who is logged in
    Whoami,

    /// List rooms
    Rooms,

    /// List reservations
    Reservations {
        /// Only my own reservations
        #[arg(long = "mine")]
        mine: bool,

        /// Only reservations waiting for approval
        #[arg(long = "pending")]
        pending: bool,
    },

    /// Request a reservation
    Reserve {
        #[arg(long = "room")]
        room: i64,

        /// Date as YYYY-MM-DD
        #[arg(long = "date", value_parser = date_arg)]
        date: NaiveDate,

        /// Start time as HH:MM
        #[arg(long = "start", value_parser = time_arg)]
        start: NaiveTime,

        /// End time as HH:MM
        #[arg(long = "end", value_parser = time_arg)]
        end: NaiveTime,

        #[arg(long = "title")]
        title: String,
    },

    /// Change an existing reservation
    Edit {
        id: i64,

        #[arg(long = "title")]
        title: Option<String>,

        #[arg(long = "room")]
        room: Option<i64>,

        #[arg(long = "date", value_parser = date_arg)]
        date: Option<NaiveDate>,

        #[arg(long = "start", value_parser = time_arg)]
        start: Option<NaiveTime>,

        #[arg(long = "end", value_parser = time_arg)]
        end: Option<NaiveTime>,
    },

    /// Cancel a reservation
    Cancel { id: i64 },

    /// Approve a pending reservation (staff)
    Approve { id: i64 },

    /// Reject a pending reservation (staff)
    Reject { id: i64 },

    /// Show the bookable time slots
    Slots,
}

fn date_arg(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

fn time_arg(s: &str) -> Result<NaiveTime, String> {
    parse_time(s).ok_or_else(|| format!("invalid time '{}', expected HH:MM", s))
}
