use serde::Deserialize;
use time::Date;

use crate::transactions::repo::{Category, PaymentType};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Deserialize)]
pub struct TransactionInput {
    pub description: String,
    pub payment_type: PaymentType,
    pub category: Category,
    pub amount: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(with = "iso_date")]
    pub date: Date,
}

impl TransactionInput {
    /// Location is optional on the wire; the stored record always has one.
    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
