//! Invoice model and status rules.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Invoice payment state. Closed set; storage values outside it are a
/// mapping error, never an arbitrary string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    Pending,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "Paid",
            Self::Pending => "Pending",
            Self::Overdue => "Overdue",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "Paid" => Some(Self::Paid),
            "Pending" => Some(Self::Pending),
            "Overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

/// The central entity. `id` is client-generated (UUID-v4 shape) and
/// immutable after creation; dates are calendar dates with no time
/// component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub client_name: String,
    pub amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub observations: String,
}

/// Create-time fields; the orchestrator synthesizes the id and derives the
/// status when none is given.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub client_name: String,
    pub amount: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: Option<InvoiceStatus>,
    pub observations: String,
}

/// Status for a freshly created or re-dated invoice: overdue once the due
/// date is in the past, pending otherwise. `Paid` is only ever explicit.
pub fn derive_status(due_date: NaiveDate, today: NaiveDate) -> InvoiceStatus {
    if due_date < today {
        InvoiceStatus::Overdue
    } else {
        InvoiceStatus::Pending
    }
}

/// Parse a `YYYY-MM-DD` string as a plain calendar date.
///
/// Goes through `NaiveDate` component parsing, never a timezone-bearing
/// type, so the resulting year/month/day are identical on every host.
pub fn parse_calendar_date(field: &'static str, value: &str) -> Result<NaiveDate, MapError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| MapError::BadDate {
        field,
        value: value.to_string(),
    })
}

/// Format a calendar date back into the `YYYY-MM-DD` wire form.
pub fn format_calendar_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::{InvoiceStatus, derive_status, format_calendar_date, parse_calendar_date};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn status_round_trips_through_db_values() {
        for status in [
            InvoiceStatus::Paid,
            InvoiceStatus::Pending,
            InvoiceStatus::Overdue,
        ] {
            assert_eq!(InvoiceStatus::from_db_value(status.as_str()), Some(status));
        }
        assert_eq!(InvoiceStatus::from_db_value("Draft"), None);
    }

    #[test]
    fn past_due_date_derives_overdue() {
        let today = date(2024, 1, 2);
        assert_eq!(
            derive_status(date(2023, 12, 31), today),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn future_or_same_day_due_date_derives_pending() {
        let today = date(2024, 1, 2);
        assert_eq!(
            derive_status(date(2024, 2, 1), today),
            InvoiceStatus::Pending
        );
        assert_eq!(
            derive_status(date(2024, 1, 2), today),
            InvoiceStatus::Pending
        );
    }

    #[test]
    fn calendar_dates_keep_their_components() {
        // A naive UTC-midnight parse would shift this west of Greenwich.
        let parsed = parse_calendar_date("due_date", "2024-03-01").expect("parses");
        assert_eq!(parsed, date(2024, 3, 1));
        assert_eq!(format_calendar_date(parsed), "2024-03-01");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_calendar_date("due_date", "01/03/2024").is_err());
        assert!(parse_calendar_date("due_date", "2024-13-01").is_err());
    }
}
