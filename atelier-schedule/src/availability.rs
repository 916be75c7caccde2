use chrono::NaiveTime;
use serde::Serialize;

use crate::slots::minutes_of_day;

/// Half-open occupancy span in minutes from midnight: the booking's duration
/// plus its trailing buffer. Touching exactly at a boundary is not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupiedInterval {
    pub start_min: u32,
    pub end_min: u32,
}

impl OccupiedInterval {
    pub fn of_booking(start: NaiveTime, duration_minutes: u32, buffer_minutes: u32) -> Self {
        let start_min = minutes_of_day(start);
        Self {
            start_min,
            end_min: start_min + duration_minutes + buffer_minutes,
        }
    }

    pub fn overlaps(&self, other: &OccupiedInterval) -> bool {
        self.start_min < other.end_min && self.end_min > other.start_min
    }
}

/// One candidate slot with its availability verdict.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotAvailability {
    pub start: NaiveTime,
    pub available: bool,
}

/// Decides which candidate slots are free given the confirmed occupations of
/// the same date. The single source of truth for "is this slot free": the
/// buffer is applied to the candidate and to every existing booking
/// independently, so a long booking's buffer still blocks a short candidate
/// requested right after it.
#[derive(Debug, Clone, Copy)]
pub struct AvailabilityEngine {
    buffer_minutes: u32,
}

impl AvailabilityEngine {
    pub fn new(buffer_minutes: u32) -> Self {
        Self { buffer_minutes }
    }

    /// True when a `duration_minutes` appointment starting at `start` fits
    /// beside every `(start, duration)` occupation in `occupied`.
    pub fn is_free(
        &self,
        duration_minutes: u32,
        start: NaiveTime,
        occupied: &[(NaiveTime, u32)],
    ) -> bool {
        let candidate = OccupiedInterval::of_booking(start, duration_minutes, self.buffer_minutes);
        !occupied.iter().any(|(busy_start, busy_duration)| {
            candidate.overlaps(&OccupiedInterval::of_booking(
                *busy_start,
                *busy_duration,
                self.buffer_minutes,
            ))
        })
    }

    /// Availability verdict for every candidate, in candidate order.
    pub fn mark(
        &self,
        duration_minutes: u32,
        candidates: &[NaiveTime],
        occupied: &[(NaiveTime, u32)],
    ) -> Vec<SlotAvailability> {
        candidates
            .iter()
            .map(|start| SlotAvailability {
                start: *start,
                available: self.is_free(duration_minutes, *start, occupied),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{SessionWindow, SlotGrid};
    use proptest::prelude::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn booking_blocks_neighbours_but_not_boundary_touch() {
        // 15-minute booking at 10:20 with a 5-minute buffer occupies
        // [10:20, 10:40).
        let engine = AvailabilityEngine::new(5);
        let occupied = vec![(t(10, 20), 15)];

        // 10:00 candidate: [10:00, 10:20) vs [10:20, 10:40) -- boundary
        // touch, free under the half-open rule.
        assert!(engine.is_free(15, t(10, 0), &occupied));
        // 10:40 candidate: [10:40, 11:00) vs [10:20, 10:40) -- boundary
        // touch again, free.
        assert!(engine.is_free(15, t(10, 40), &occupied));
        // 10:30 would sit inside the booking's occupied span.
        assert!(!engine.is_free(15, t(10, 30), &occupied));
        // The booked start itself is blocked.
        assert!(!engine.is_free(15, t(10, 20), &occupied));
    }

    #[test]
    fn grid_example_from_the_booking_page() {
        // Service 15 min, buffer 5, window 10:00-13:00; confirmed booking at
        // 10:20. 10:00 ends inside nothing -- [10:00,10:20) touches
        // [10:20,10:40) so 10:00 stays free; 10:40 starts exactly where the
        // booking's buffered span ends, so it stays free too.
        let grid = SlotGrid::new(5, vec![SessionWindow::new(t(10, 0), t(13, 0)).unwrap()]);
        let engine = AvailabilityEngine::new(5);
        let marked = engine.mark(15, &grid.starts(15), &[(t(10, 20), 15)]);

        let verdict = |time: NaiveTime| {
            marked
                .iter()
                .find(|s| s.start == time)
                .map(|s| s.available)
                .unwrap()
        };

        assert!(verdict(t(10, 0)));
        assert!(!verdict(t(10, 20)));
        assert!(verdict(t(10, 40)));
        assert!(verdict(t(11, 0)));
    }

    #[test]
    fn long_booking_buffer_blocks_short_candidate_after_it() {
        // 30-minute admin block at 14:00 occupies [14:00, 14:35); a
        // 15-minute package at 14:10 must be unavailable.
        let engine = AvailabilityEngine::new(5);
        assert!(!engine.is_free(15, t(14, 10), &[(t(14, 0), 30)]));
        // 14:35 is the first free start.
        assert!(engine.is_free(15, t(14, 35), &[(t(14, 0), 30)]));
    }

    #[test]
    fn variable_durations_block_in_both_directions() {
        // A short existing booking must also block a long candidate that
        // would run into it from before.
        let engine = AvailabilityEngine::new(5);
        let occupied = vec![(t(11, 0), 15)];
        // 60-minute candidate at 10:10: [10:10, 11:15) overlaps [11:00, 11:20).
        assert!(!engine.is_free(60, t(10, 10), &occupied));
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(
            a_start in 0u32..1200, a_len in 1u32..180,
            b_start in 0u32..1200, b_len in 1u32..180,
        ) {
            let a = OccupiedInterval { start_min: a_start, end_min: a_start + a_len };
            let b = OccupiedInterval { start_min: b_start, end_min: b_start + b_len };
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn touching_intervals_never_overlap(start in 0u32..1200, len in 1u32..180) {
            let a = OccupiedInterval { start_min: start, end_min: start + len };
            let b = OccupiedInterval { start_min: start + len, end_min: start + len + 30 };
            prop_assert!(!a.overlaps(&b));
            prop_assert!(!b.overlaps(&a));
        }
    }
}
