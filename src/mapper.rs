//! Translation between wire/storage records and the in-memory invoice model.
//!
//! Records are JSON objects with snake_case columns (`client_name`,
//! `issue_date`, ...). Mapping is pure and total over its inputs; the only
//! wall-clock dependence is the due-date default, which callers inject via
//! [`Clock`].

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::clock::Clock;
use crate::error::MapError;
use crate::invoice::{Invoice, InvoiceStatus, format_calendar_date, parse_calendar_date};

fn required_str<'a>(record: &'a Value, field: &'static str) -> Result<&'a str, MapError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or(MapError::MissingField(field))
}

/// Coerce a JSON amount into a `Decimal`. Numbers and numeric strings are
/// accepted; anything else is a caller error, not silently defaulted.
fn coerce_amount(value: Option<&Value>) -> Result<Decimal, MapError> {
    let value = value.ok_or(MapError::MissingField("amount"))?;
    match value {
        Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(|_| MapError::BadAmount(n.to_string()))
        }
        Value::String(s) => {
            Decimal::from_str(s.trim()).map_err(|_| MapError::BadAmount(s.clone()))
        }
        other => Err(MapError::BadAmount(other.to_string())),
    }
}

/// Map a storage record onto an [`Invoice`].
///
/// Missing or null `due_date` defaults to today; missing `observations`
/// defaults to the empty string.
pub fn map_record_to_invoice(record: &Value, clock: &dyn Clock) -> Result<Invoice, MapError> {
    let id = required_str(record, "id")?.to_string();
    let client_name = required_str(record, "client_name")?.to_string();
    let amount = coerce_amount(record.get("amount"))?;
    let issue_date = parse_calendar_date("issue_date", required_str(record, "issue_date")?)?;

    let due_date = match record.get("due_date").and_then(Value::as_str) {
        Some(raw) => parse_calendar_date("due_date", raw)?,
        None => clock.today(),
    };

    let raw_status = required_str(record, "status")?;
    let status = InvoiceStatus::from_db_value(raw_status)
        .ok_or_else(|| MapError::BadStatus(raw_status.to_string()))?;

    let observations = record
        .get("observations")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(Invoice {
        id,
        client_name,
        amount,
        issue_date,
        due_date,
        status,
        observations,
    })
}

/// Inverse mapping for outbound creates: the full record tagged with the
/// owner's identity.
pub fn invoice_to_record(invoice: &Invoice, owner_id: &str) -> Value {
    json!({
        "id": invoice.id,
        "user_id": owner_id,
        "client_name": invoice.client_name,
        "amount": invoice.amount.to_string(),
        "issue_date": format_calendar_date(invoice.issue_date),
        "due_date": format_calendar_date(invoice.due_date),
        "status": invoice.status.as_str(),
        "observations": invoice.observations,
    })
}

/// Mutable columns only, for outbound updates keyed by id. The id and the
/// owner column never change after creation.
pub fn invoice_update_fields(invoice: &Invoice) -> Value {
    json!({
        "client_name": invoice.client_name,
        "amount": invoice.amount.to_string(),
        "issue_date": format_calendar_date(invoice.issue_date),
        "due_date": format_calendar_date(invoice.due_date),
        "status": invoice.status.as_str(),
        "observations": invoice.observations,
    })
}
