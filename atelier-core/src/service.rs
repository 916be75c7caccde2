use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Bookable package definition. Rows are maintained by admin tooling and
/// loaded once at startup; the scheduling core only ever reads them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub price_cents: i64,
    pub is_active: bool,
}

/// In-memory lookup over the service catalog.
pub struct ServiceCatalog {
    services: HashMap<Uuid, Service>,
}

impl ServiceCatalog {
    pub fn new(services: impl IntoIterator<Item = Service>) -> Self {
        Self {
            services: services.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Look up an active service by id.
    pub fn get(&self, id: &Uuid) -> Option<&Service> {
        self.services.get(id).filter(|s| s.is_active)
    }

    /// Active services, cheapest first (the order the booking page shows them).
    pub fn list(&self) -> Vec<&Service> {
        let mut services: Vec<&Service> =
            self.services.values().filter(|s| s.is_active).collect();
        services.sort_by_key(|s| s.price_cents);
        services
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
