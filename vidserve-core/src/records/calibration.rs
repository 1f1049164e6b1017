//! Calibration freshness check.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

/// Whether a user with the given `last_login` must calibrate at `now`.
///
/// Missing or unparseable timestamps count as never logged in. A login
/// exactly `window` ago is still fresh.
pub fn needs_calibration(last_login: Option<&str>, now: NaiveDateTime, window: Duration) -> bool {
    let Some(last_login) = last_login.map(str::trim).filter(|s| !s.is_empty()) else {
        return true;
    };
    let Ok(last_login) = last_login.parse::<NaiveDateTime>() else {
        return true;
    };

    match TimeDelta::from_std(window) {
        Ok(window) => now - last_login > window,
        Err(_) => false,
    }
}
