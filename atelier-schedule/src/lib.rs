pub mod availability;
pub mod slots;

pub use availability::{AvailabilityEngine, OccupiedInterval, SlotAvailability};
pub use slots::{SessionWindow, SlotGrid, WindowError};
