use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// One bookable stretch of the studio day, e.g. 10:00-12:30. Windows never
/// interact: a slot at the tail of one session cannot leak into the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("session window must start before it ends: {start} >= {end}")]
    Inverted { start: NaiveTime, end: NaiveTime },

    #[error("unparseable session time: {0}")]
    Unparseable(String),
}

impl SessionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse "HH:MM"-"HH:MM" strings, the format the configuration uses.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(parse_session_time(start)?, parse_session_time(end)?)
    }
}

fn parse_session_time(value: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| WindowError::Unparseable(value.to_string()))
}

pub(crate) fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

pub(crate) fn time_from_minutes(minutes: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .expect("slot arithmetic stays within one day")
}

/// Generates the candidate start-time grid for a day. Pure and deterministic:
/// the same duration and windows always yield the same sequence.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    buffer_minutes: u32,
    windows: Vec<SessionWindow>,
}

impl SlotGrid {
    pub fn new(buffer_minutes: u32, windows: Vec<SessionWindow>) -> Self {
        Self {
            buffer_minutes,
            windows,
        }
    }

    pub fn buffer_minutes(&self) -> u32 {
        self.buffer_minutes
    }

    /// Candidate start times for a service of `duration_minutes`, walking
    /// each window independently in steps of duration + buffer. A start is
    /// emitted only while the service itself still fits the window; a window
    /// too short for one appointment yields nothing.
    pub fn starts(&self, duration_minutes: u32) -> Vec<NaiveTime> {
        let step = duration_minutes + self.buffer_minutes;
        let mut starts = Vec::new();

        for window in &self.windows {
            let end = minutes_of_day(window.end);
            let mut cursor = minutes_of_day(window.start);

            while cursor + duration_minutes <= end {
                starts.push(time_from_minutes(cursor));
                cursor += step;
            }
        }

        starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(start: (u32, u32), end: (u32, u32)) -> SessionWindow {
        SessionWindow::new(t(start.0, start.1), t(end.0, end.1)).unwrap()
    }

    #[test]
    fn fifteen_minute_service_in_a_three_hour_window() {
        // 15 min + 5 min buffer over 10:00-13:00: every 20 minutes, last
        // start 12:40 (12:40 + 15 <= 13:00).
        let grid = SlotGrid::new(5, vec![window((10, 0), (13, 0))]);
        let starts = grid.starts(15);

        assert_eq!(starts.first(), Some(&t(10, 0)));
        assert_eq!(starts.last(), Some(&t(12, 40)));
        assert_eq!(starts.len(), 9);
        assert_eq!(starts[1], t(10, 20));
    }

    #[test]
    fn windows_are_walked_independently() {
        let grid = SlotGrid::new(5, vec![window((10, 0), (10, 40)), window((14, 0), (14, 40))]);
        let starts = grid.starts(15);

        // 10:00, 10:20 fit (10:20+15 <= 10:40); the session tail does not
        // spill into the afternoon window.
        assert_eq!(starts, vec![t(10, 0), t(10, 20), t(14, 0), t(14, 20)]);
    }

    #[test]
    fn window_shorter_than_one_appointment_yields_nothing() {
        let grid = SlotGrid::new(5, vec![window((10, 0), (10, 10))]);
        assert!(grid.starts(15).is_empty());
    }

    #[test]
    fn service_fits_even_when_its_buffer_does_not() {
        // 12:40 + 15 = 12:55 fits a 12:55 close even though the trailing
        // buffer would not.
        let grid = SlotGrid::new(5, vec![window((12, 0), (12, 55))]);
        let starts = grid.starts(15);
        assert_eq!(starts.last(), Some(&t(12, 40)));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(SessionWindow::new(t(13, 0), t(10, 0)).is_err());
    }

    #[test]
    fn parses_config_time_format() {
        let w = SessionWindow::parse("10:00", "12:30").unwrap();
        assert_eq!(w.start, t(10, 0));
        assert_eq!(w.end, t(12, 30));
        assert!(SessionWindow::parse("25:00", "26:00").is_err());
    }

    proptest! {
        /// No two generated starts from one window ever have overlapping
        /// occupied intervals [start, start + duration + buffer).
        #[test]
        fn generated_slots_never_overlap(
            duration in 1u32..120,
            buffer in 0u32..30,
            start_min in 0u32..720,
            len in 1u32..600,
        ) {
            let end_min = (start_min + len).min(24 * 60 - 1);
            prop_assume!(start_min < end_min);

            let w = SessionWindow::new(
                time_from_minutes(start_min),
                time_from_minutes(end_min),
            ).unwrap();
            let starts = SlotGrid::new(buffer, vec![w]).starts(duration);

            for pair in starts.windows(2) {
                let a = minutes_of_day(pair[0]);
                let b = minutes_of_day(pair[1]);
                // Half-open intervals: the next slot starts at or after the
                // previous occupied interval ends.
                prop_assert!(a + duration + buffer <= b);
            }

            // Every emitted start fits the window.
            for s in &starts {
                prop_assert!(minutes_of_day(*s) + duration <= end_min);
            }
        }
    }
}
