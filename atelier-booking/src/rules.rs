use atelier_schedule::{SessionWindow, WindowError};
use chrono::Duration;

/// Studio-level booking policy: the buffer after every appointment, how long
/// an unpaid hold may block a slot, and the day's session windows.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub buffer_minutes: u32,
    pub hold_timeout_minutes: i64,
    pub windows: Vec<SessionWindow>,
    pub currency: String,
}

impl BookingRules {
    pub fn hold_timeout(&self) -> Duration {
        Duration::minutes(self.hold_timeout_minutes)
    }

    /// Build rules from "HH:MM" window pairs, the configuration format.
    pub fn from_window_strings(
        buffer_minutes: u32,
        hold_timeout_minutes: i64,
        windows: &[(String, String)],
        currency: String,
    ) -> Result<Self, WindowError> {
        let windows = windows
            .iter()
            .map(|(start, end)| SessionWindow::parse(start, end))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            buffer_minutes,
            hold_timeout_minutes,
            windows,
            currency,
        })
    }
}

impl Default for BookingRules {
    /// The studio's standing schedule: morning, afternoon and evening
    /// sessions, 5-minute buffer, 10-minute hold.
    fn default() -> Self {
        let window = |s, e| SessionWindow::parse(s, e).expect("static windows parse");
        Self {
            buffer_minutes: 5,
            hold_timeout_minutes: 10,
            windows: vec![
                window("10:00", "12:30"),
                window("14:00", "17:30"),
                window("20:00", "22:30"),
            ],
            currency: "myr".to_string(),
        }
    }
}
