pub mod app_config;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod referral_repo;
pub mod reservation_repo;
pub mod service_repo;
pub mod stripe;

pub use database::DbClient;
pub use events::EventProducer;
pub use memory::{MemoryReferralRepository, MemoryReservationStore, MemoryServiceRepository};
pub use redis_repo::RedisClient;
pub use referral_repo::PgReferralRepository;
pub use reservation_repo::PgReservationStore;
pub use service_repo::PgServiceRepository;
pub use stripe::{MockGateway, StripeCheckout};
