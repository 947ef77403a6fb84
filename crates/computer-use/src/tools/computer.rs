use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{Display as StrumDisplay, EnumString};
use tokio::process::Command;

use super::{Tool, ToolResult};
use crate::errors::{ToolError, ToolOutcome};

const TYPING_DELAY_MS: u32 = 12;
const TYPING_GROUP_SIZE: usize = 50;
const SCREENSHOT_DELAY: Duration = Duration::from_secs(2);

/// The X display the tool drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub width: u32,
    pub height: u32,
    pub number: Option<u32>,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            number: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
enum Action {
    Key,
    Type,
    MouseMove,
    LeftClick,
    LeftClickDrag,
    RightClick,
    MiddleClick,
    DoubleClick,
    Screenshot,
    CursorPosition,
}

/// A validated request, ready to be turned into xdotool invocations
#[derive(Debug, Clone, PartialEq)]
enum Request {
    Move { drag: bool, x: u32, y: u32 },
    Key(String),
    Type(String),
    Click(&'static str),
    Screenshot,
    CursorPosition,
}

impl Request {
    fn parse(input: &Value) -> ToolOutcome<Self> {
        let action_name = input
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'action' parameter".into()))?;
        let action = Action::from_str(action_name).map_err(|_| {
            ToolError::InvalidParameters(format!("Invalid action: {}", action_name))
        })?;

        let text = input.get("text").filter(|v| !v.is_null());
        let coordinate = input.get("coordinate").filter(|v| !v.is_null());

        match action {
            Action::MouseMove | Action::LeftClickDrag => {
                let coordinate = coordinate.ok_or_else(|| {
                    ToolError::InvalidParameters(format!("coordinate is required for {}", action))
                })?;
                if text.is_some() {
                    return Err(ToolError::InvalidParameters(format!(
                        "text is not accepted for {}",
                        action
                    )));
                }
                let (x, y) = parse_coordinate(coordinate)?;
                Ok(Request::Move {
                    drag: action == Action::LeftClickDrag,
                    x,
                    y,
                })
            }
            Action::Key | Action::Type => {
                let text = text.and_then(|v| v.as_str()).ok_or_else(|| {
                    ToolError::InvalidParameters(format!("text is required for {}", action))
                })?;
                if coordinate.is_some() {
                    return Err(ToolError::InvalidParameters(format!(
                        "coordinate is not accepted for {}",
                        action
                    )));
                }
                if action == Action::Key {
                    Ok(Request::Key(text.to_string()))
                } else {
                    Ok(Request::Type(text.to_string()))
                }
            }
            _ => {
                if text.is_some() {
                    return Err(ToolError::InvalidParameters(format!(
                        "text is not accepted for {}",
                        action
                    )));
                }
                if coordinate.is_some() {
                    return Err(ToolError::InvalidParameters(format!(
                        "coordinate is not accepted for {}",
                        action
                    )));
                }
                Ok(match action {
                    Action::Screenshot => Request::Screenshot,
                    Action::CursorPosition => Request::CursorPosition,
                    Action::LeftClick => Request::Click("1"),
                    Action::RightClick => Request::Click("3"),
                    Action::MiddleClick => Request::Click("2"),
                    _ => Request::Click("--repeat 2 --delay 500 1"),
                })
            }
        }
    }
}

fn parse_coordinate(value: &Value) -> ToolOutcome<(u32, u32)> {
    let invalid = || ToolError::InvalidParameters(format!("{} must be a tuple of length 2", value));
    let items = value.as_array().ok_or_else(invalid)?;
    if items.len() != 2 {
        return Err(invalid());
    }
    let mut coords = items.iter().map(|v| {
        v.as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ToolError::InvalidParameters(format!("{} must be a tuple of non-negative ints", value)))
    });
    match (coords.next(), coords.next()) {
        (Some(x), Some(y)) => Ok((x?, y?)),
        _ => Err(invalid()),
    }
}

/// Quote a string for safe interpolation into a `sh -c` command line
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// `xdotool key` with every whitespace separated key combination as its own argument
fn key_command(xdotool: &str, keys: &str) -> String {
    let keys: Vec<String> = keys.split_whitespace().map(shell_quote).collect();
    format!("{} key -- {}", xdotool, keys.join(" "))
}

/// Read a temporary file and delete it; a failed delete is only logged
async fn take_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await?;
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::debug!("Could not remove {}: {}", path.display(), e);
    }
    Ok(bytes)
}

fn parse_cursor_position(output: &str) -> Option<(u32, u32)> {
    let mut x = None;
    let mut y = None;
    for line in output.lines() {
        if let Some(value) = line.strip_prefix("X=") {
            x = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("Y=") {
            y = value.trim().parse().ok();
        }
    }
    Some((x?, y?))
}

/// Mouse, keyboard and screen access to an X display through xdotool
pub struct ComputerTool {
    display: Display,
}

impl ComputerTool {
    pub fn new(display: Display) -> Self {
        Self { display }
    }

    fn xdotool(&self) -> String {
        match self.display.number {
            Some(number) => format!("DISPLAY=:{} xdotool", number),
            None => "xdotool".to_string(),
        }
    }

    async fn shell(&self, command: &str) -> ToolOutcome<(String, String)> {
        tracing::debug!(command, "running computer action");
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to run '{}': {}", command, e)))?;

        Ok((
            String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        ))
    }

    /// Run an action, wait for the screen to settle, then attach a screenshot
    async fn act(&self, command: &str) -> ToolOutcome<ToolResult> {
        let (stdout, stderr) = self.shell(command).await?;
        tokio::time::sleep(SCREENSHOT_DELAY).await;
        let screenshot = self.screenshot().await?;
        Ok(ToolResult {
            output: Some(stdout).filter(|s| !s.is_empty()),
            error: Some(stderr).filter(|s| !s.is_empty()),
            base64_image: screenshot.base64_image,
            system: None,
        })
    }

    async fn screenshot(&self) -> ToolOutcome<ToolResult> {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "screenshot_{}.png",
            Utc::now().format("%Y%m%d%H%M%S%f")
        ));
        let display_prefix = self
            .display
            .number
            .map(|n| format!("DISPLAY=:{} ", n))
            .unwrap_or_default();
        let quoted = shell_quote(&path.display().to_string());

        let (has_gnome, _) = self.shell("command -v gnome-screenshot").await?;
        let command = if has_gnome.is_empty() {
            format!("{}scrot -p {}", display_prefix, quoted)
        } else {
            format!("{}gnome-screenshot -f {} -p", display_prefix, quoted)
        };
        let (_, stderr) = self.shell(&command).await?;

        let bytes = take_file(&path).await.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to take screenshot: {} {}", e, stderr))
        })?;

        Ok(ToolResult::default().with_image(BASE64.encode(bytes)))
    }

    async fn run(&self, request: Request) -> ToolOutcome<ToolResult> {
        let xdotool = self.xdotool();
        match request {
            Request::Move { drag: false, x, y } => {
                self.act(&format!("{} mousemove --sync {} {}", xdotool, x, y))
                    .await
            }
            Request::Move { drag: true, x, y } => {
                self.act(&format!(
                    "{} mousedown 1 mousemove --sync {} {} mouseup 1",
                    xdotool, x, y
                ))
                .await
            }
            Request::Key(keys) => {
                self.act(&key_command(&xdotool, &keys)).await
            }
            Request::Type(text) => {
                let chars: Vec<char> = text.chars().collect();
                let mut outputs = Vec::new();
                let mut errors = Vec::new();
                for chunk in chars.chunks(TYPING_GROUP_SIZE) {
                    let chunk: String = chunk.iter().collect();
                    let (stdout, stderr) = self
                        .shell(&format!(
                            "{} type --delay {} -- {}",
                            xdotool,
                            TYPING_DELAY_MS,
                            shell_quote(&chunk)
                        ))
                        .await?;
                    outputs.push(stdout);
                    errors.push(stderr);
                }
                let screenshot = self.screenshot().await?;
                Ok(ToolResult {
                    output: Some(outputs.concat()).filter(|s| !s.is_empty()),
                    error: Some(errors.concat()).filter(|s| !s.is_empty()),
                    base64_image: screenshot.base64_image,
                    system: None,
                })
            }
            Request::Click(button) => {
                self.act(&format!("{} click {}", xdotool, button)).await
            }
            Request::Screenshot => self.screenshot().await,
            Request::CursorPosition => {
                let (stdout, stderr) = self
                    .shell(&format!("{} getmouselocation --shell", xdotool))
                    .await?;
                let (x, y) = parse_cursor_position(&stdout).ok_or_else(|| {
                    ToolError::ExecutionError(format!("Could not read cursor position: {}", stderr))
                })?;
                Ok(ToolResult::output(format!("X={},Y={}", x, y)))
            }
        }
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn definition(&self) -> Value {
        let mut definition = json!({
            "type": "computer_20241022",
            "name": "computer",
            "display_width_px": self.display.width,
            "display_height_px": self.display.height,
        });
        if let Some(number) = self.display.number {
            definition["display_number"] = json!(number);
        }
        definition
    }

    async fn call(&self, input: Value) -> ToolOutcome<ToolResult> {
        let request = Request::parse(&input)?;
        self.run(request).await
    }
}
