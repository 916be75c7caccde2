pub mod clock;
pub mod errors;
pub mod payment;
pub mod referral;
pub mod repository;
pub mod reservation;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{BlockError, ConfirmError, ReserveError};
pub use repository::{ConfirmOutcome, HoldInsert, ReservationStore, StoreError};
pub use reservation::{Reservation, ReservationHolder, ReservationStatus};
pub use service::{Service, ServiceCatalog};
