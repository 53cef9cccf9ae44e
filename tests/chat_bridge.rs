//! Chatbot bridge over a live session: scripted agent turns driving real
//! optimistic mutations, with the feed running underneath.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use notafacil::agent::{AgentClient, AgentTurn, ChatSession, FunctionCall, ToolDispatcher};
use notafacil::auth::StaticAuth;
use notafacil::clock::FixedClock;
use notafacil::error::AgentError;
use notafacil::session::Session;
use notafacil::store::{InvoiceStore, MemoryStore};

struct ScriptedAgent {
    turns: VecDeque<AgentTurn>,
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    async fn send_user_text(&mut self, _text: &str) -> Result<AgentTurn, AgentError> {
        self.turns
            .pop_front()
            .ok_or_else(|| AgentError::Protocol("script exhausted".to_string()))
    }

    async fn send_tool_result(
        &mut self,
        _name: &str,
        _result: Value,
    ) -> Result<AgentTurn, AgentError> {
        self.turns
            .pop_front()
            .ok_or_else(|| AgentError::Protocol("script exhausted".to_string()))
    }
}

fn call(name: &str, args: Value) -> AgentTurn {
    AgentTurn {
        text: None,
        function_calls: vec![FunctionCall {
            name: name.to_string(),
            args,
        }],
    }
}

fn text(reply: &str) -> AgentTurn {
    AgentTurn {
        text: Some(reply.to_string()),
        function_calls: Vec::new(),
    }
}

async fn live_session(store: Arc<MemoryStore>) -> Session {
    let clock = Arc::new(FixedClock(
        NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date"),
    ));
    let mut session = Session::new(Arc::new(StaticAuth::signed_in("u-1")), store, clock);
    session.sign_in().await.expect("signs in");
    session
}

#[tokio::test]
async fn conversational_create_then_delete_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let session = live_session(store.clone()).await;
    let dispatcher = ToolDispatcher::new(session.service().clone());

    let agent = ScriptedAgent {
        turns: vec![
            call(
                "createInvoice",
                json!({ "clientName": "Acme", "amount": 150.0, "dueDate": "2099-01-01" }),
            ),
            text("Created an invoice for Acme at $150."),
        ]
        .into(),
    };
    let mut chat = ChatSession::new(agent, dispatcher.clone(), 8);
    let reply = chat.send("invoice Acme for 150, due 2099-01-01").await.expect("replies");
    assert_eq!(reply, "Created an invoice for Acme at $150.");
    assert_eq!(session.invoices().len(), 1);

    let id = session.invoices().snapshot()[0].id.clone();
    let agent = ScriptedAgent {
        turns: vec![
            call("deleteInvoice", json!({ "id": id.to_uppercase() })),
            text("Deleted it."),
        ]
        .into(),
    };
    let mut chat = ChatSession::new(agent, dispatcher, 8);
    chat.send("yes, delete it").await.expect("replies");

    assert!(session.invoices().is_empty());
    tokio::time::sleep(Duration::from_millis(30)).await;
    // The store's own delete event must not resurrect anything.
    assert!(session.invoices().is_empty());
    assert_eq!(store.list_for_owner("u-1").await.expect("list").len(), 0);
}

#[tokio::test]
async fn not_found_results_flow_back_without_touching_the_store() {
    let store = Arc::new(MemoryStore::new());
    let session = live_session(store.clone()).await;
    let writes_before = store.write_calls();

    let agent = ScriptedAgent {
        turns: vec![
            call("getInvoiceDetails", json!({ "id": "X" })),
            text("There is no invoice with ID X."),
        ]
        .into(),
    };
    let mut chat = ChatSession::new(agent, ToolDispatcher::new(session.service().clone()), 8);
    let reply = chat.send("show me invoice X").await.expect("replies");

    assert_eq!(reply, "There is no invoice with ID X.");
    assert_eq!(store.write_calls(), writes_before);
    assert!(session.invoices().is_empty());
}

#[tokio::test]
async fn remote_failure_reaches_the_agent_as_a_structured_error() {
    let store = Arc::new(MemoryStore::new());
    let session = live_session(store.clone()).await;
    store.fail_next_write("constraint violation");

    let agent = ScriptedAgent {
        turns: vec![
            call(
                "createInvoice",
                json!({ "clientName": "Acme", "amount": 10, "dueDate": "2099-01-01" }),
            ),
            text("Sorry, the invoice could not be saved."),
        ]
        .into(),
    };
    let mut chat = ChatSession::new(agent, ToolDispatcher::new(session.service().clone()), 8);
    let reply = chat.send("invoice Acme for 10").await.expect("replies");

    assert_eq!(reply, "Sorry, the invoice could not be saved.");
    // Rollback happened before the result went back.
    assert!(session.invoices().is_empty());
}
