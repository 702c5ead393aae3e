use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// REST representation of a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub company_name: Option<String>,
    pub email_address: Option<String>,
    pub phone: Option<String>,
    pub credit_limit: f64,
    pub is_active: bool,
    pub modified_date: DateTime<Utc>,
}
