use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Staff referral code. The percent doubles as the customer discount at
/// checkout and the staff commission rate on the discounted sale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferralCode {
    pub code: String,
    pub staff_name: String,
    pub discount_percent: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-code sales aggregate over confirmed customer bookings.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommissionLine {
    pub code: String,
    pub staff_name: String,
    pub discount_percent: i32,
    pub usage_count: i64,
    pub total_sales_cents: i64,
    pub commission_cents: i64,
}

impl CommissionLine {
    pub fn compute(referral: &ReferralCode, usage_count: i64, total_sales_cents: i64) -> Self {
        Self {
            code: referral.code.clone(),
            staff_name: referral.staff_name.clone(),
            discount_percent: referral.discount_percent,
            usage_count,
            total_sales_cents,
            commission_cents: total_sales_cents * referral.discount_percent as i64 / 100,
        }
    }
}

/// Discounted price in cents, rounded down. Percent outside 0..=100 is
/// clamped rather than trusted.
pub fn apply_discount(price_cents: i64, percent: i32) -> i64 {
    let percent = percent.clamp(0, 100) as i64;
    price_cents * (100 - percent) / 100
}

/// Codes are stored and matched uppercase without whitespace, the same
/// normalization the admin form applies.
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
