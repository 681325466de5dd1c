//! Human-readable narration of agent activity.

use serde_json::Value;

use crate::events::{AgentEvent, EventBus};
use crate::logging::AgentLogger;

const PREVIEW_CHARS: usize = 200;

/// Mirror every agent event to `logger` at info level under `narrator`.
pub fn narrate_agent(bus: &EventBus, logger: AgentLogger) {
    bus.subscribe(move |event| {
        logger.info(narration_line(event), Some("narrator"), None);
        Ok(())
    });
}

/// The single line printed for an event.
pub fn narration_line(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Navigation { url } => format!("◆ navigating to {url}"),
        AgentEvent::ExtractionStarted { instructions, .. } => {
            format!("⛏ extracting: {instructions}")
        }
        AgentEvent::ExtractionCompleted { data, .. } => {
            format!("⛏ extracted: {}", preview(data))
        }
    }
}

fn preview(data: &Value) -> String {
    let text = data.to_string();
    if text.chars().count() <= PREVIEW_CHARS {
        return text;
    }
    let mut cut: String = text.chars().take(PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::tests::capturing_logger;
    use serde_json::json;

    #[test]
    fn lines_follow_event_kind() {
        assert_eq!(
            narration_line(&AgentEvent::Navigation {
                url: "https://example.com".into()
            }),
            "◆ navigating to https://example.com"
        );
        assert_eq!(
            narration_line(&AgentEvent::ExtractionStarted {
                instructions: "get the title".into(),
                schema: json!({ "type": "object" }),
            }),
            "⛏ extracting: get the title"
        );
        assert_eq!(
            narration_line(&AgentEvent::ExtractionCompleted {
                instructions: "get the title".into(),
                data: json!({ "title": "Example Domain" }),
            }),
            "⛏ extracted: {\"title\":\"Example Domain\"}"
        );
    }

    #[test]
    fn long_payloads_are_truncated() {
        let line = narration_line(&AgentEvent::ExtractionCompleted {
            instructions: "all".into(),
            data: json!("x".repeat(500)),
        });
        assert!(line.ends_with('…'));
        assert!(line.chars().count() < 260);
    }

    #[test]
    fn narrator_logs_each_event() {
        let (logger, records) = capturing_logger();
        let bus = EventBus::default();
        narrate_agent(&bus, logger);

        bus.emit(&AgentEvent::Navigation {
            url: "https://example.com".into(),
        });

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "◆ navigating to https://example.com");
        assert_eq!(records[0].category.as_deref(), Some("narrator"));
    }
}
