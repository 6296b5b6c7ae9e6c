use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A payment-gateway transaction. Written by the gateway webhook, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "amountIn", default, deserialize_with = "null_as_default")]
    pub amount_in: f64,
    #[serde(rename = "amountOut", default, deserialize_with = "null_as_default")]
    pub amount_out: f64,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(rename = "transactionDate", default)]
    pub transaction_date: Option<String>,
    #[serde(rename = "accountNumber", default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "transferType", default)]
    pub transfer_type: Option<String>,
    #[serde(rename = "referenceCode", default)]
    pub reference_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payment_transaction_id: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rate: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

/// Unset optional attributes come back as explicit `null`; read them as the
/// type's default instead of rejecting the whole document.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The subset of a user profile document the dashboard reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Payment lifecycle status.
///
/// Stored values are free-form strings (usually lowercase); parsing is
/// case-insensitive and anything unrecognised reads as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
    Active,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Cancelled => "Cancelled",
            PaymentStatus::Active => "Active",
            PaymentStatus::Expired => "Expired",
        }
    }

    pub fn is_completed(self) -> bool {
        self == PaymentStatus::Completed
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPaymentStatus(pub String);

impl fmt::Display for UnknownPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown payment status: {:?}", self.0)
    }
}

impl std::error::Error for UnknownPaymentStatus {}

impl FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Active,
            PaymentStatus::Expired,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s))
        .or_else(|| s.eq_ignore_ascii_case("canceled").then_some(PaymentStatus::Cancelled))
        .ok_or_else(|| UnknownPaymentStatus(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for PaymentStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(PaymentStatus::Pending);
        };
        match raw.parse::<PaymentStatus>() {
            Ok(status) => Ok(status),
            Err(e) => {
                tracing::warn!(error = %e, "treating unrecognised payment status as Pending");
                Ok(PaymentStatus::Pending)
            }
        }
    }
}
