//! Invoice tool declarations and the dispatcher executing them.
//!
//! The dispatcher is a stateless adapter over the orchestrator: structured
//! results in, structured results out. "Not found" is a result value the
//! agent can relay conversationally, never an error; remote failures
//! propagate as `{"error": ...}` after the orchestrator has rolled back.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};

use crate::invoice::{InvoiceStatus, NewInvoice, parse_calendar_date};
use crate::orchestrator::InvoiceService;

/// Typed function declaration in the agent's schema dialect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// The four callable invoice operations, as declared to the agent.
pub fn tool_declarations() -> Vec<FunctionDeclaration> {
    vec![
        FunctionDeclaration {
            name: "createInvoice",
            description: "Creates a new invoice. The issue date is always today.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "clientName": { "type": "STRING", "description": "The name of the client." },
                    "amount": { "type": "NUMBER", "description": "The total amount of the invoice." },
                    "dueDate": { "type": "STRING", "description": "The due date for the invoice in YYYY-MM-DD format." },
                    "observations": { "type": "STRING", "description": "Optional notes or observations for the invoice." },
                },
                "required": ["clientName", "amount", "dueDate"],
            }),
        },
        FunctionDeclaration {
            name: "getInvoiceDetails",
            description: "Retrieves the full details of a specific invoice using its ID.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "STRING", "description": "The ID of the invoice to retrieve, for example \"d290f1ee-6c54-4b01-90e6-d701748f0851\"." },
                },
                "required": ["id"],
            }),
        },
        FunctionDeclaration {
            name: "updateInvoice",
            description: "Updates one or more fields of an existing invoice, identified by its ID.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "STRING", "description": "The ID of the invoice to update." },
                    "clientName": { "type": "STRING", "description": "The new name of the client." },
                    "amount": { "type": "NUMBER", "description": "The new total amount of the invoice." },
                    "dueDate": { "type": "STRING", "description": "The new due date in YYYY-MM-DD format." },
                    "status": { "type": "STRING", "description": "The new status of the invoice.", "enum": ["Paid", "Pending", "Overdue"] },
                    "observations": { "type": "STRING", "description": "The new notes or observations for the invoice." },
                },
                "required": ["id"],
            }),
        },
        FunctionDeclaration {
            name: "deleteInvoice",
            description: "Deletes an invoice permanently from the system using its ID.",
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "id": { "type": "STRING", "description": "The ID of the invoice to delete." },
                },
                "required": ["id"],
            }),
        },
    ]
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, Value> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| json!({ "error": format!("missing or invalid argument '{key}'") }))
}

fn arg_amount(args: &Value, key: &str) -> Result<Decimal, Value> {
    let raw = args
        .get(key)
        .ok_or_else(|| json!({ "error": format!("missing or invalid argument '{key}'") }))?;
    let parsed = match raw {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    };
    parsed.ok_or_else(|| json!({ "error": format!("argument '{key}' is not a number") }))
}

fn not_found(id: &str) -> Value {
    json!({ "error": format!("Invoice with ID {id} not found.") })
}

/// Executes agent function calls against the orchestrator.
#[derive(Clone)]
pub struct ToolDispatcher {
    service: InvoiceService,
}

impl ToolDispatcher {
    pub fn new(service: InvoiceService) -> Self {
        Self { service }
    }

    /// Run one function call and produce its structured result. Never
    /// raises: every failure mode comes back as an `{"error": ...}` value.
    pub async fn dispatch(&self, name: &str, args: &Value) -> Value {
        tracing::debug!(function = name, "dispatching agent function call");
        match name {
            "createInvoice" => self.create_invoice(args).await,
            "getInvoiceDetails" => self.get_invoice_details(args),
            "updateInvoice" => self.update_invoice(args).await,
            "deleteInvoice" => self.delete_invoice(args).await,
            other => json!({ "error": format!("Unknown function: {other}") }),
        }
    }

    async fn create_invoice(&self, args: &Value) -> Value {
        let client_name = match arg_str(args, "clientName") {
            Ok(v) => v.to_string(),
            Err(e) => return e,
        };
        let amount = match arg_amount(args, "amount") {
            Ok(v) => v,
            Err(e) => return e,
        };
        let due_date = match arg_str(args, "dueDate")
            .and_then(|raw| parse_calendar_date("dueDate", raw).map_err(|e| json!({ "error": e.to_string() })))
        {
            Ok(v) => v,
            Err(e) => return e,
        };
        let observations = args
            .get("observations")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let input = NewInvoice {
            client_name: client_name.clone(),
            amount,
            // The issue date is always "today" on this path.
            issue_date: self.service.clock().today(),
            due_date,
            status: None,
            observations,
        };
        match self.service.create_invoice(input).await {
            Ok(_) => json!({ "success": true, "clientName": client_name, "amount": amount.to_string() }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    fn get_invoice_details(&self, args: &Value) -> Value {
        let id = match arg_str(args, "id") {
            Ok(v) => v,
            Err(e) => return e,
        };
        match self.service.invoices().find_by_id_ci(id) {
            Some(invoice) => serde_json::to_value(&invoice)
                .unwrap_or_else(|e| json!({ "error": e.to_string() })),
            None => not_found(id),
        }
    }

    async fn update_invoice(&self, args: &Value) -> Value {
        let id = match arg_str(args, "id") {
            Ok(v) => v,
            Err(e) => return e,
        };
        let Some(mut invoice) = self.service.invoices().find_by_id_ci(id) else {
            return not_found(id);
        };

        if let Some(client_name) = args.get("clientName").and_then(Value::as_str) {
            invoice.client_name = client_name.to_string();
        }
        if args.get("amount").is_some() {
            match arg_amount(args, "amount") {
                Ok(amount) => invoice.amount = amount,
                Err(e) => return e,
            }
        }
        if let Some(raw) = args.get("dueDate").and_then(Value::as_str) {
            match parse_calendar_date("dueDate", raw) {
                Ok(due) => invoice.due_date = due,
                Err(e) => return json!({ "error": e.to_string() }),
            }
        }
        if let Some(raw) = args.get("status").and_then(Value::as_str) {
            match InvoiceStatus::from_db_value(raw) {
                Some(status) => invoice.status = status,
                None => return json!({ "error": format!("unknown invoice status '{raw}'") }),
            }
        }
        if let Some(observations) = args.get("observations").and_then(Value::as_str) {
            invoice.observations = observations.to_string();
        }

        let invoice_id = invoice.id.clone();
        match self.service.update_invoice(invoice).await {
            Ok(()) => json!({ "success": true, "id": invoice_id }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }

    async fn delete_invoice(&self, args: &Value) -> Value {
        let id = match arg_str(args, "id") {
            Ok(v) => v,
            Err(e) => return e,
        };
        // Confirmation is the agent's responsibility; once called, this
        // executes immediately.
        let Some(invoice) = self.service.invoices().find_by_id_ci(id) else {
            return not_found(id);
        };
        match self.service.delete_invoice(&invoice.id).await {
            Ok(()) => json!({ "success": true, "id": invoice.id }),
            Err(e) => json!({ "error": e.to_string() }),
        }
    }
}
