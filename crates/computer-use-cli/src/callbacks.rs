use anyhow::{Context, Result};
use computer_use::callbacks::{ApiResponse, Callbacks};
use computer_use::models::content::MessageContent;
use computer_use::providers::base::Usage;
use computer_use::tools::ToolResult;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ResponseError;
use crate::screenshot::ScreenshotSink;
use crate::telemetry::Telemetry;

/// Build the hooks handed to the sampling loop
///
/// Assistant text and tool output go to the log, screenshots go to `sink`, and
/// every model call is counted in `telemetry`.
pub fn setup_callbacks(sink: Arc<ScreenshotSink>, telemetry: Arc<Telemetry>) -> Callbacks {
    let tool_telemetry = Arc::clone(&telemetry);

    Callbacks::new(
        log_output,
        move |result: &ToolResult, tool_use_id: &str| {
            handle_tool_output(&sink, &tool_telemetry, result, tool_use_id)
        },
        move |response: &ApiResponse| {
            handle_api_response(&telemetry, response)?;
            Ok(())
        },
    )
}

fn log_output(content: &MessageContent) {
    if let Some(text) = content.as_text() {
        tracing::info!("Assistant: {}", text);
    }
}

/// The value, unless it is missing or empty
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn handle_tool_output(
    sink: &ScreenshotSink,
    telemetry: &Telemetry,
    result: &ToolResult,
    tool_use_id: &str,
) -> Result<()> {
    telemetry.record_tool_result(result);

    if let Some(output) = non_empty(&result.output) {
        tracing::info!("Tool Output [{}]: {}", tool_use_id, output);
    }
    if let Some(error) = non_empty(&result.error) {
        tracing::error!("Tool Error [{}]: {}", tool_use_id, error);
    }
    if let Some(image) = non_empty(&result.base64_image) {
        sink.save(image, tool_use_id)
            .with_context(|| format!("Failed to save screenshot for {}", tool_use_id))?;
        telemetry.record_screenshot();
    }
    Ok(())
}

fn handle_api_response(telemetry: &Telemetry, response: &ApiResponse) -> Result<(), ResponseError> {
    let body: Value = serde_json::from_str(response.text())?;
    let content = body
        .get("content")
        .ok_or(ResponseError::MissingField("content"))?;

    telemetry.record_model_call(&Usage::from_response(&body));
    tracing::debug!("API Response:\n{}", to_pretty_json(content)?);
    Ok(())
}

/// Render JSON with four space indentation
fn to_pretty_json(value: &Value) -> Result<String, ResponseError> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_logs;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path) -> (Callbacks, Arc<Telemetry>) {
        let telemetry = Arc::new(Telemetry::new("test-model").unwrap());
        let sink = Arc::new(ScreenshotSink::new(dir.join("screenshots")));
        (setup_callbacks(sink, Arc::clone(&telemetry)), telemetry)
    }

    #[test]
    fn test_text_output_is_logged() {
        let temp = tempdir().unwrap();
        let (callbacks, _) = setup(temp.path());

        let (_, logs) = capture_logs(|| (callbacks.output)(&MessageContent::text("Opening Firefox")));
        assert!(logs.contains("INFO"));
        assert!(logs.contains("Assistant: Opening Firefox"));
    }

    #[test]
    fn test_non_text_output_is_ignored() {
        let temp = tempdir().unwrap();
        let (callbacks, _) = setup(temp.path());

        let (_, logs) = capture_logs(|| {
            (callbacks.output)(&MessageContent::tool_use(
                "toolu_01",
                "computer",
                json!({"action": "screenshot"}),
            ));
            (callbacks.output)(&MessageContent::png("aGVsbG8="));
        });
        assert!(logs.is_empty());
    }

    #[test]
    fn test_tool_output_and_error_are_both_logged() {
        let temp = tempdir().unwrap();
        let (callbacks, telemetry) = setup(temp.path());
        let result = ToolResult {
            output: Some("partial listing".to_string()),
            error: Some("permission denied".to_string()),
            ..Default::default()
        };

        let (outcome, logs) = capture_logs(|| (callbacks.tool_output)(&result, "toolu_42"));
        outcome.unwrap();

        assert!(logs.contains("Tool Output [toolu_42]: partial listing"));
        assert!(logs.contains("ERROR"));
        assert!(logs.contains("Tool Error [toolu_42]: permission denied"));
        assert!(!temp.path().join("screenshots").exists());
        assert_eq!(telemetry.summary().tool_errors, 1);
        assert_eq!(telemetry.summary().screenshots, 0);
    }

    #[test]
    fn test_tool_image_is_saved() {
        let temp = tempdir().unwrap();
        let (callbacks, telemetry) = setup(temp.path());
        let result = ToolResult::default().with_image(STANDARD.encode(b"fake png"));

        let (outcome, logs) = capture_logs(|| (callbacks.tool_output)(&result, "abc123"));
        outcome.unwrap();

        let path = temp.path().join("screenshots/screenshot_abc123.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"fake png");
        assert!(logs.contains("Saved screenshot:"));
        assert_eq!(telemetry.summary().screenshots, 1);
    }

    #[test]
    fn test_undecodable_image_fails_the_callback() {
        let temp = tempdir().unwrap();
        let (callbacks, _) = setup(temp.path());
        let result = ToolResult::default().with_image("%%%");

        let err = (callbacks.tool_output)(&result, "abc123").unwrap_err();
        assert!(err.to_string().contains("abc123"));
        assert!(err.downcast_ref::<crate::error::ScreenshotError>().is_some());
    }

    #[test]
    fn test_api_response_is_logged_at_debug() {
        let temp = tempdir().unwrap();
        let (callbacks, telemetry) = setup(temp.path());
        let response = ApiResponse::new(
            200,
            json!({
                "content": [{"type": "text", "text": "hi"}],
                "usage": {"input_tokens": 7, "output_tokens": 2}
            })
            .to_string(),
        );

        let (outcome, logs) = capture_logs(|| (callbacks.api_response)(&response));
        outcome.unwrap();

        assert!(logs.contains("DEBUG"));
        assert!(logs.contains("API Response:\n[\n    {\n        \"type\": \"text\","));
        let summary = telemetry.summary();
        assert_eq!(summary.model_calls, 1);
        assert_eq!(summary.input_tokens, 7);
        assert_eq!(summary.output_tokens, 2);
    }

    #[test]
    fn test_api_response_keeps_body_key_order() {
        let temp = tempdir().unwrap();
        let (callbacks, _) = setup(temp.path());
        let body = r#"{"id": "msg_1", "content": [{"type": "tool_use", "name": "computer", "id": "toolu_9", "input": {"action": "screenshot"}}]}"#;

        let (outcome, logs) = capture_logs(|| (callbacks.api_response)(&ApiResponse::new(200, body)));
        outcome.unwrap();

        let expected = "API Response:\n[\n    {\n        \"type\": \"tool_use\",\n        \"name\": \"computer\",\n        \"id\": \"toolu_9\",\n        \"input\": {\n            \"action\": \"screenshot\"\n        }\n    }\n]";
        assert!(logs.contains(expected), "unexpected log output: {}", logs);
    }

    #[test]
    fn test_empty_tool_error_is_neither_logged_nor_counted() {
        let temp = tempdir().unwrap();
        let (callbacks, telemetry) = setup(temp.path());
        let result = ToolResult {
            output: Some("ok".to_string()),
            error: Some(String::new()),
            ..Default::default()
        };

        let (outcome, logs) = capture_logs(|| (callbacks.tool_output)(&result, "toolu_7"));
        outcome.unwrap();

        assert!(!logs.contains("Tool Error"));
        assert_eq!(telemetry.summary().tool_calls, 1);
        assert_eq!(telemetry.summary().tool_errors, 0);
    }

    #[test]
    fn test_api_response_with_invalid_json_is_an_error() {
        let temp = tempdir().unwrap();
        let (callbacks, telemetry) = setup(temp.path());

        let err = (callbacks.api_response)(&ApiResponse::new(200, "<html>")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResponseError>(),
            Some(ResponseError::InvalidJson(_))
        ));
        assert_eq!(telemetry.summary().model_calls, 0);
    }

    #[test]
    fn test_api_response_without_content_is_an_error() {
        let temp = tempdir().unwrap();
        let (callbacks, _) = setup(temp.path());

        let err = (callbacks.api_response)(&ApiResponse::new(200, r#"{"id": "msg"}"#)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResponseError>(),
            Some(ResponseError::MissingField("content"))
        ));
    }

    #[test]
    fn test_pretty_json_uses_four_spaces() {
        let rendered = to_pretty_json(&json!({"a": [1]})).unwrap();
        assert_eq!(rendered, "{\n    \"a\": [\n        1\n    ]\n}");
    }
}
