//! End-to-end agent behaviour against an in-memory harness and model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use browser_agent::{
    AccessibilityNode, AgentError, AgentEvent, AgentLogger, BrowserAgent, BrowserConnector,
    BrowserHarness, EventKind, ExtractionCall, ExtractionCallError, HarnessError, ModelClient,
    Schema, TypedSchema, ValueSchema, Verbosity,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

type Journal = Arc<Mutex<Vec<String>>>;

/// Harness that journals every primitive call.
struct MockHarness {
    journal: Journal,
    snapshot: Option<AccessibilityNode>,
    detached: AtomicBool,
    fail_navigation: bool,
}

impl MockHarness {
    fn new(journal: &Journal) -> Self {
        Self {
            journal: Arc::clone(journal),
            snapshot: Some(AccessibilityNode::new("Heading").with_name("Example Domain")),
            detached: AtomicBool::new(false),
            fail_navigation: false,
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.lock().unwrap().push(entry.into());
    }
}

#[async_trait]
impl BrowserHarness for MockHarness {
    type Page = String;
    type Context = String;

    async fn start(&self) -> Result<(), HarnessError> {
        self.record("harness:start");
        Ok(())
    }

    async fn stop(&self) -> Result<(), HarnessError> {
        self.record("harness:stop");
        Ok(())
    }

    async fn page(&self) -> Result<String, HarnessError> {
        Ok("page-1".into())
    }

    async fn context(&self) -> Result<String, HarnessError> {
        Ok("context-1".into())
    }

    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        self.record(format!("harness:navigate {url}"));
        if self.fail_navigation {
            return Err(HarnessError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            });
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, HarnessError> {
        self.record("harness:screenshot");
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn accessibility_snapshot(&self) -> Result<Option<AccessibilityNode>, HarnessError> {
        self.record("harness:snapshot");
        if self.detached.load(Ordering::SeqCst) {
            return Err(HarnessError::Message("page detached".into()));
        }
        Ok(self.snapshot.clone())
    }
}

/// Model answering with a fixed value and journaling what it was shown.
struct MockModel {
    journal: Journal,
    answer: Result<Value, String>,
    page_texts: Mutex<Vec<String>>,
}

impl MockModel {
    fn answering(journal: &Journal, answer: Value) -> Self {
        Self {
            journal: Arc::clone(journal),
            answer: Ok(answer),
            page_texts: Mutex::new(Vec::new()),
        }
    }

    fn failing(journal: &Journal, message: &str) -> Self {
        Self {
            journal: Arc::clone(journal),
            answer: Err(message.to_string()),
            page_texts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn extract(&self, call: ExtractionCall<'_>) -> Result<Value, ExtractionCallError> {
        self.journal.lock().unwrap().push("model:extract".into());
        self.page_texts
            .lock()
            .unwrap()
            .push(call.page_text.to_string());
        self.answer.clone().map_err(ExtractionCallError::Request)
    }
}

fn agent(harness: MockHarness, model: MockModel) -> BrowserAgent<MockHarness, MockModel> {
    BrowserAgent::new(
        BrowserConnector::with_harness(harness),
        model,
        AgentLogger::new(Verbosity::Minimal),
    )
}

/// Mirror every event into the journal as `event:<kind>`.
fn journal_events(agent: &BrowserAgent<MockHarness, MockModel>, journal: &Journal) {
    let sink = Arc::clone(journal);
    agent.events().subscribe(move |event: &AgentEvent| {
        sink.lock().unwrap().push(format!("event:{}", event.kind()));
        Ok(())
    });
}

fn entries(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with(prefix))
        .cloned()
        .collect()
}

fn title_schema() -> ValueSchema {
    ValueSchema::new(json!({
        "type": "object",
        "properties": { "title": { "type": "string" } },
        "required": ["title"]
    }))
    .expect("title schema")
}

#[tokio::test]
async fn extracts_page_title_with_ordered_events() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );
    journal_events(&agent, &journal);

    let completed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&completed);
    agent
        .events()
        .on(EventKind::ExtractionCompleted, move |event: &AgentEvent| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

    agent.start().await?;
    let schema = title_schema();
    let data = agent.extract("extract the page title", &schema).await?;

    assert_eq!(data, json!({ "title": "Example Domain" }));
    assert_eq!(
        agent.model().page_texts.lock().unwrap().as_slice(),
        ["Heading: Example Domain"]
    );
    assert_eq!(
        entries(&journal, "event:"),
        ["event:extraction-started", "event:extraction-completed"]
    );
    assert_eq!(
        entries(&journal, ""),
        [
            "harness:start",
            "event:extraction-started",
            "harness:snapshot",
            "harness:screenshot",
            "model:extract",
            "event:extraction-completed",
        ]
    );
    assert_eq!(
        completed.lock().unwrap().as_slice(),
        [AgentEvent::ExtractionCompleted {
            instructions: "extract the page title".into(),
            data: json!({ "title": "Example Domain" }),
        }]
    );

    // An already-valid result passes the validator unchanged.
    assert_eq!(schema.decode(data.clone())?, data);
    Ok(())
}

#[tokio::test]
async fn navigation_event_precedes_the_harness_call() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({})),
    );

    let urls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&urls);
    let order = Arc::clone(&journal);
    agent
        .events()
        .on(EventKind::Navigation, move |event: &AgentEvent| {
            if let AgentEvent::Navigation { url } = event {
                sink.lock().unwrap().push(url.clone());
                order.lock().unwrap().push("event:navigation".into());
            }
            Ok(())
        });

    agent.start().await?;
    agent.navigate("https://example.com/?q=a b").await?;

    assert_eq!(urls.lock().unwrap().as_slice(), ["https://example.com/?q=a b"]);
    assert_eq!(
        entries(&journal, ""),
        [
            "harness:start",
            "event:navigation",
            "harness:navigate https://example.com/?q=a b",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn navigation_failure_propagates_after_the_event() -> Result<()> {
    let journal = Journal::default();
    let mut harness = MockHarness::new(&journal);
    harness.fail_navigation = true;
    let agent = agent(harness, MockModel::answering(&journal, json!({})));
    journal_events(&agent, &journal);

    agent.start().await?;
    let err = agent
        .navigate("https://unreachable.invalid")
        .await
        .expect_err("navigation fails");

    match err {
        AgentError::Navigation(HarnessError::Navigation { url, .. }) => {
            assert_eq!(url, "https://unreachable.invalid")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(entries(&journal, "event:"), ["event:navigation"]);
    assert_eq!(entries(&journal, "harness:navigate").len(), 1);
    Ok(())
}

#[tokio::test]
async fn detached_page_fails_observation_without_model_call() -> Result<()> {
    let journal = Journal::default();
    let harness = MockHarness::new(&journal);
    harness.detached.store(true, Ordering::SeqCst);
    let agent = agent(
        harness,
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );
    journal_events(&agent, &journal);

    agent.start().await?;
    let err = agent
        .extract("extract the page title", &title_schema())
        .await
        .expect_err("observation fails");

    assert!(matches!(err, AgentError::Observation(_)), "got {err:?}");
    assert_eq!(entries(&journal, "event:"), ["event:extraction-started"]);
    assert!(entries(&journal, "model:").is_empty());
    assert!(entries(&journal, "harness:screenshot").is_empty());
    Ok(())
}

#[tokio::test]
async fn mismatched_model_output_is_rejected() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "count": "three" })),
    );
    journal_events(&agent, &journal);

    let schema = ValueSchema::new(json!({
        "type": "object",
        "properties": { "count": { "type": "number" } },
        "required": ["count"]
    }))?;

    agent.start().await?;
    let err = agent
        .extract("count the items", &schema)
        .await
        .expect_err("schema mismatch");

    assert!(matches!(err, AgentError::SchemaMismatch(_)), "got {err:?}");
    assert_eq!(entries(&journal, "event:"), ["event:extraction-started"]);
    Ok(())
}

#[tokio::test]
async fn model_failure_is_an_extraction_call_error() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::failing(&journal, "rate limited"),
    );
    journal_events(&agent, &journal);

    agent.start().await?;
    let err = agent
        .extract("extract the page title", &title_schema())
        .await
        .expect_err("model failure");

    match err {
        AgentError::ExtractionCall(ExtractionCallError::Request(message)) => {
            assert_eq!(message, "rate limited")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(entries(&journal, "event:"), ["event:extraction-started"]);
    Ok(())
}

#[tokio::test]
async fn calls_before_start_do_nothing() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );
    journal_events(&agent, &journal);

    let err = agent
        .extract("extract the page title", &title_schema())
        .await
        .expect_err("not started");
    assert!(matches!(err, AgentError::NotStarted), "got {err:?}");

    let err = agent
        .navigate("https://example.com")
        .await
        .expect_err("not started");
    assert!(matches!(err, AgentError::NotStarted), "got {err:?}");

    assert!(matches!(agent.page().await, Err(AgentError::NotStarted)));
    assert!(matches!(agent.context().await, Err(AgentError::NotStarted)));
    assert!(journal.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn stopped_agent_rejects_calls() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );

    agent.start().await?;
    assert_eq!(agent.page().await?, "page-1");
    assert_eq!(agent.context().await?, "context-1");
    agent.stop().await?;

    let err = agent
        .extract("extract the page title", &title_schema())
        .await
        .expect_err("stopped");
    assert!(matches!(err, AgentError::NotStarted));
    assert_eq!(entries(&journal, "harness:"), ["harness:start", "harness:stop"]);
    Ok(())
}

#[tokio::test]
async fn blank_instructions_are_rejected_before_any_event() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({})),
    );
    journal_events(&agent, &journal);

    agent.start().await?;
    let err = agent
        .extract("   ", &title_schema())
        .await
        .expect_err("blank instructions");

    assert!(matches!(err, AgentError::InvalidRequest(_)));
    assert_eq!(entries(&journal, ""), ["harness:start"]);
    Ok(())
}

#[tokio::test]
async fn failing_subscribers_do_not_affect_the_call() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );

    agent
        .events()
        .subscribe(|_event: &AgentEvent| Err("subscriber broke".into()));
    agent
        .events()
        .on(EventKind::ExtractionStarted, |_event: &AgentEvent| {
            panic!("subscriber panicked")
        });
    journal_events(&agent, &journal);

    agent.start().await?;
    let data = agent
        .extract("extract the page title", &title_schema())
        .await?;

    assert_eq!(data, json!({ "title": "Example Domain" }));
    assert_eq!(
        entries(&journal, "event:"),
        ["event:extraction-started", "event:extraction-completed"]
    );
    Ok(())
}

#[derive(Debug, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
struct PageTitle {
    title: String,
}

#[tokio::test]
async fn typed_schemas_decode_into_rust_values() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({ "title": "Example Domain" })),
    );

    let completed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&completed);
    agent
        .events()
        .on(EventKind::ExtractionCompleted, move |event: &AgentEvent| {
            if let AgentEvent::ExtractionCompleted { data, .. } = event {
                sink.lock().unwrap().push(data.clone());
            }
            Ok(())
        });

    agent.start().await?;
    let schema = TypedSchema::<PageTitle>::new()?;
    let title = agent.extract("extract the page title", &schema).await?;

    assert_eq!(
        title,
        PageTitle {
            title: "Example Domain".into()
        }
    );
    assert_eq!(
        completed.lock().unwrap().as_slice(),
        [json!({ "title": "Example Domain" })]
    );
    Ok(())
}

#[tokio::test]
async fn empty_snapshot_sends_empty_page_text() -> Result<()> {
    let journal = Journal::default();
    let mut harness = MockHarness::new(&journal);
    harness.snapshot = None;
    let agent = agent(
        harness,
        MockModel::answering(&journal, json!({ "title": "" })),
    );

    agent.start().await?;
    agent
        .extract("extract the page title", &title_schema())
        .await?;

    assert_eq!(agent.model().page_texts.lock().unwrap().as_slice(), [""]);
    Ok(())
}

/// Output type whose serializer always fails.
#[derive(Debug)]
struct Opaque;

impl Serialize for Opaque {
    fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("opaque values cannot be serialized"))
    }
}

struct OpaqueSchema(Value);

impl Schema for OpaqueSchema {
    type Output = Opaque;

    fn descriptor(&self) -> &Value {
        &self.0
    }

    fn decode(&self, _raw: Value) -> Result<Opaque, browser_agent::SchemaMismatchError> {
        Ok(Opaque)
    }
}

#[tokio::test]
async fn unserializable_output_is_not_reported_as_a_mismatch() -> Result<()> {
    let journal = Journal::default();
    let agent = agent(
        MockHarness::new(&journal),
        MockModel::answering(&journal, json!({})),
    );
    journal_events(&agent, &journal);

    agent.start().await?;
    let err = agent
        .extract("extract anything", &OpaqueSchema(json!({ "type": "object" })))
        .await
        .expect_err("serialization failure");

    assert!(
        matches!(err, AgentError::OutputSerialization(_)),
        "got {err:?}"
    );
    assert_eq!(entries(&journal, "event:"), ["event:extraction-started"]);
    Ok(())
}
