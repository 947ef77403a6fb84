use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{Tool, ToolResult};
use crate::errors::{ToolError, ToolOutcome};

const SNIPPET_LINES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    View,
    Create,
    StrReplace,
    Insert,
    UndoEdit,
}

impl Command {
    fn parse(command: &str) -> ToolOutcome<Self> {
        match command {
            "view" => Ok(Command::View),
            "create" => Ok(Command::Create),
            "str_replace" => Ok(Command::StrReplace),
            "insert" => Ok(Command::Insert),
            "undo_edit" => Ok(Command::UndoEdit),
            _ => Err(ToolError::InvalidParameters(format!(
                "Unrecognized command {}. The allowed commands for the str_replace_editor tool are: \
                 view, create, str_replace, insert, undo_edit",
                command
            ))),
        }
    }
}

/// View, create and edit files; every write is recorded so it can be undone
pub struct EditTool {
    file_history: Mutex<HashMap<PathBuf, Vec<String>>>,
}

impl EditTool {
    pub fn new() -> Self {
        Self {
            file_history: Mutex::new(HashMap::new()),
        }
    }

    fn history(&self) -> ToolOutcome<MutexGuard<'_, HashMap<PathBuf, Vec<String>>>> {
        self.file_history
            .lock()
            .map_err(|_| ToolError::ExecutionError("file history is unavailable".into()))
    }

    fn validate_path(command: Command, path: &Path) -> ToolOutcome<()> {
        if !path.is_absolute() {
            return Err(ToolError::InvalidParameters(format!(
                "The path {} is not an absolute path, it should start with `/`. Maybe you meant {}?",
                path.display(),
                Path::new("/").join(path).display()
            )));
        }
        if !path.exists() && command != Command::Create {
            return Err(ToolError::InvalidParameters(format!(
                "The path {} does not exist. Please provide a valid path.",
                path.display()
            )));
        }
        if path.exists() && command == Command::Create {
            return Err(ToolError::InvalidParameters(format!(
                "File already exists at: {}. Cannot overwrite files using command `create`.",
                path.display()
            )));
        }
        if path.is_dir() && command != Command::View {
            return Err(ToolError::InvalidParameters(format!(
                "The path {} is a directory and only the `view` command can be used on directories",
                path.display()
            )));
        }
        Ok(())
    }

    fn view(&self, path: &Path, view_range: Option<&Value>) -> ToolOutcome<ToolResult> {
        if path.is_dir() {
            if view_range.is_some() {
                return Err(ToolError::InvalidParameters(
                    "The `view_range` parameter is not allowed when `path` points to a directory."
                        .into(),
                ));
            }
            let mut entries = Vec::new();
            list_dir(path, 2, &mut entries)?;
            entries.sort();
            return Ok(ToolResult::output(format!(
                "Here's the files and directories up to 2 levels deep in {}, excluding hidden items:\n{}\n",
                path.display(),
                entries.join("\n")
            )));
        }

        let content = read_file(path)?;
        let Some(range) = view_range else {
            return Ok(ToolResult::output(numbered(&content, &path.display().to_string(), 1)));
        };

        let bounds: Vec<i64> = range
            .as_array()
            .map(|items| items.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default();
        if bounds.len() != 2 {
            return Err(ToolError::InvalidParameters(
                "Invalid `view_range`. It should be a list of two integers.".into(),
            ));
        }

        let lines: Vec<&str> = content.split('\n').collect();
        let n_lines = lines.len() as i64;
        let (start, end) = (bounds[0], bounds[1]);
        if start < 1 || start > n_lines {
            return Err(ToolError::InvalidParameters(format!(
                "Invalid `view_range`: {:?}. Its first element `{}` should be within the range of lines of the file: [1, {}]",
                bounds, start, n_lines
            )));
        }
        if end != -1 && end > n_lines {
            return Err(ToolError::InvalidParameters(format!(
                "Invalid `view_range`: {:?}. Its second element `{}` should be smaller than the number of lines in the file: `{}`",
                bounds, end, n_lines
            )));
        }
        if end != -1 && end < start {
            return Err(ToolError::InvalidParameters(format!(
                "Invalid `view_range`: {:?}. Its second element `{}` should be larger or equal than its first `{}`",
                bounds, end, start
            )));
        }

        let last = if end == -1 { n_lines } else { end };
        let selected = lines[(start - 1) as usize..last as usize].join("\n");
        Ok(ToolResult::output(numbered(
            &selected,
            &path.display().to_string(),
            start as usize,
        )))
    }

    fn create(&self, path: &Path, file_text: &str) -> ToolOutcome<ToolResult> {
        write_file(path, file_text)?;
        self.history()?
            .entry(path.to_path_buf())
            .or_default()
            .push(file_text.to_string());
        Ok(ToolResult::output(format!(
            "File created successfully at: {}",
            path.display()
        )))
    }

    fn str_replace(&self, path: &Path, old_str: &str, new_str: &str) -> ToolOutcome<ToolResult> {
        let content = expand_tabs(&read_file(path)?);
        let old_str = expand_tabs(old_str);
        let new_str = expand_tabs(new_str);

        let occurrences = content.matches(old_str.as_str()).count();
        if occurrences == 0 {
            return Err(ToolError::InvalidParameters(format!(
                "No replacement was performed, old_str `{}` did not appear verbatim in {}.",
                old_str,
                path.display()
            )));
        }
        if occurrences > 1 {
            let lines: Vec<usize> = content
                .split('\n')
                .enumerate()
                .filter(|(_, line)| line.contains(old_str.as_str()))
                .map(|(idx, _)| idx + 1)
                .collect();
            return Err(ToolError::InvalidParameters(format!(
                "No replacement was performed. Multiple occurrences of old_str `{}` in lines {:?}. Please ensure it is unique",
                old_str, lines
            )));
        }

        let new_content = content.replacen(old_str.as_str(), new_str.as_str(), 1);
        self.save_file_history(path, content.clone())?;
        write_file(path, &new_content)?;

        let replacement_line = content
            .split(old_str.as_str())
            .next()
            .map(|before| before.matches('\n').count())
            .unwrap_or(0);
        let start = replacement_line.saturating_sub(SNIPPET_LINES);
        let end = replacement_line + SNIPPET_LINES + new_str.matches('\n').count();
        let snippet = new_content
            .split('\n')
            .skip(start)
            .take(end - start + 1)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolResult::output(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected. Edit the file again if necessary.",
            path.display(),
            numbered(&snippet, &format!("a snippet of {}", path.display()), start + 1)
        )))
    }

    fn insert(&self, path: &Path, insert_line: usize, new_str: &str) -> ToolOutcome<ToolResult> {
        let content = expand_tabs(&read_file(path)?);
        let new_str = expand_tabs(new_str);
        let mut lines: Vec<&str> = content.split('\n').collect();

        if insert_line > lines.len() {
            return Err(ToolError::InvalidParameters(format!(
                "Invalid `insert_line` parameter: {}. It should be within the range of lines of the file: [0, {}]",
                insert_line,
                lines.len()
            )));
        }

        let inserted: Vec<&str> = new_str.split('\n').collect();
        let inserted_count = inserted.len();
        lines.splice(insert_line..insert_line, inserted);
        let new_content = lines.join("\n");

        self.save_file_history(path, content.clone())?;
        write_file(path, &new_content)?;

        let start = insert_line.saturating_sub(SNIPPET_LINES);
        let snippet = new_content
            .split('\n')
            .skip(start)
            .take(insert_line - start + inserted_count + SNIPPET_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolResult::output(format!(
            "The file {} has been edited. {}Review the changes and make sure they are as expected (correct indentation, no duplicate lines, etc). Edit the file again if necessary.",
            path.display(),
            numbered(&snippet, "a snippet of the edited file", start + 1)
        )))
    }

    fn undo_edit(&self, path: &Path) -> ToolOutcome<ToolResult> {
        let previous = self
            .history()?
            .get_mut(path)
            .and_then(|contents| contents.pop())
            .ok_or_else(|| {
                ToolError::InvalidParameters(format!(
                    "No edit history found for {}.",
                    path.display()
                ))
            })?;

        write_file(path, &previous)?;
        Ok(ToolResult::output(format!(
            "Last edit to {} undone successfully. {}",
            path.display(),
            numbered(&previous, &path.display().to_string(), 1)
        )))
    }

    fn save_file_history(&self, path: &Path, content: String) -> ToolOutcome<()> {
        self.history()?
            .entry(path.to_path_buf())
            .or_default()
            .push(content);
        Ok(())
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> ToolOutcome<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ToolError::ExecutionError(format!("Ran into {} while trying to read {}", e, path.display()))
    })
}

fn write_file(path: &Path, content: &str) -> ToolOutcome<()> {
    std::fs::write(path, content).map_err(|e| {
        ToolError::ExecutionError(format!("Ran into {} while trying to write to {}", e, path.display()))
    })
}

fn list_dir(path: &Path, depth: usize, entries: &mut Vec<String>) -> ToolOutcome<()> {
    let read = std::fs::read_dir(path)
        .map_err(|e| ToolError::ExecutionError(format!("Failed to read directory: {}", e)))?;
    for entry in read {
        let entry = entry.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to read directory entry: {}", e))
        })?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let entry_path = entry.path();
        entries.push(entry_path.display().to_string());
        if depth > 1 && entry_path.is_dir() {
            list_dir(&entry_path, depth - 1, entries)?;
        }
    }
    Ok(())
}

fn expand_tabs(text: &str) -> String {
    text.replace('\t', "        ")
}

/// Render content the way `cat -n` would, starting at `first_line`
fn numbered(content: &str, descriptor: &str, first_line: usize) -> String {
    let body = expand_tabs(content)
        .split('\n')
        .enumerate()
        .map(|(idx, line)| format!("{:6}\t{}", idx + first_line, line))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Here's the result of running `cat -n` on {}:\n{}\n",
        descriptor, body
    )
}

fn required_str<'a>(input: &'a Value, key: &str, command: &str) -> ToolOutcome<&'a str> {
    input.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
        ToolError::InvalidParameters(format!(
            "Parameter `{}` is required for command: {}",
            key, command
        ))
    })
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "str_replace_editor"
    }

    fn definition(&self) -> Value {
        json!({
            "type": "text_editor_20241022",
            "name": "str_replace_editor"
        })
    }

    async fn call(&self, input: Value) -> ToolOutcome<ToolResult> {
        let command_name = input
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'command' parameter".into()))?;
        let command = Command::parse(command_name)?;

        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| ToolError::InvalidParameters("Missing 'path' parameter".into()))?;
        Self::validate_path(command, &path)?;

        match command {
            Command::View => self.view(&path, input.get("view_range").filter(|v| !v.is_null())),
            Command::Create => {
                let file_text = required_str(&input, "file_text", command_name)?;
                self.create(&path, file_text)
            }
            Command::StrReplace => {
                let old_str = required_str(&input, "old_str", command_name)?;
                let new_str = input.get("new_str").and_then(|v| v.as_str()).unwrap_or("");
                self.str_replace(&path, old_str, new_str)
            }
            Command::Insert => {
                let insert_line = input
                    .get("insert_line")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        ToolError::InvalidParameters(
                            "Parameter `insert_line` is required for command: insert".into(),
                        )
                    })?;
                let new_str = required_str(&input, "new_str", command_name)?;
                self.insert(&path, insert_line as usize, new_str)
            }
            Command::UndoEdit => self.undo_edit(&path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn file_in(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    #[tokio::test]
    async fn test_create_and_view_file() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "test.txt");
        let tool = EditTool::new();

        let created = tool
            .call(json!({"command": "create", "path": path, "file_text": "Hello, world!\nsecond"}))
            .await
            .unwrap();
        assert!(created.output.unwrap().contains("File created successfully"));

        let viewed = tool
            .call(json!({"command": "view", "path": path}))
            .await
            .unwrap();
        let output = viewed.output.unwrap();
        assert!(output.contains("     1\tHello, world!"));
        assert!(output.contains("     2\tsecond"));
    }

    #[tokio::test]
    async fn test_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "exists.txt");
        std::fs::write(&path, "original").unwrap();

        let err = EditTool::new()
            .call(json!({"command": "create", "path": path, "file_text": "new"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("File already exists")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_relative_path_is_rejected() {
        let err = EditTool::new()
            .call(json!({"command": "view", "path": "relative/file.txt"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("not an absolute path")));
    }

    #[tokio::test]
    async fn test_view_range() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "lines.txt");
        std::fs::write(&path, "a\nb\nc\nd").unwrap();
        let tool = EditTool::new();

        let viewed = tool
            .call(json!({"command": "view", "path": path, "view_range": [2, 3]}))
            .await
            .unwrap();
        let output = viewed.output.unwrap();
        assert!(output.contains("     2\tb\n     3\tc"));
        assert!(!output.contains("\ta\n"));

        let to_end = tool
            .call(json!({"command": "view", "path": path, "view_range": [3, -1]}))
            .await
            .unwrap();
        assert!(to_end.output.unwrap().contains("     4\td"));

        let err = tool
            .call(json!({"command": "view", "path": path, "view_range": [0, 2]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_str_replace_and_undo() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "replace.txt");
        std::fs::write(&path, "Hello, world!\nHow are you?").unwrap();
        let tool = EditTool::new();

        let replaced = tool
            .call(json!({
                "command": "str_replace",
                "path": path,
                "old_str": "world",
                "new_str": "Rust"
            }))
            .await
            .unwrap();
        assert!(replaced.output.unwrap().contains("has been edited"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Hello, Rust!\nHow are you?"
        );

        tool.call(json!({"command": "undo_edit", "path": path}))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Hello, world!\nHow are you?"
        );

        let err = tool
            .call(json!({"command": "undo_edit", "path": path}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("No edit history")));
    }

    #[tokio::test]
    async fn test_str_replace_requires_unique_match() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "dupes.txt");
        std::fs::write(&path, "foo\nbar\nfoo").unwrap();
        let tool = EditTool::new();

        let err = tool
            .call(json!({"command": "str_replace", "path": path, "old_str": "foo", "new_str": "baz"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("lines [1, 3]")));

        let err = tool
            .call(json!({"command": "str_replace", "path": path, "old_str": "qux", "new_str": "baz"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("did not appear verbatim")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "foo\nbar\nfoo");
    }

    #[tokio::test]
    async fn test_insert() {
        let dir = TempDir::new().unwrap();
        let path = file_in(&dir, "insert.txt");
        std::fs::write(&path, "one\nthree").unwrap();
        let tool = EditTool::new();

        tool.call(json!({"command": "insert", "path": path, "insert_line": 1, "new_str": "two"}))
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\nthree");

        let err = tool
            .call(json!({"command": "insert", "path": path, "insert_line": 10, "new_str": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("[0, 3]")));
    }

    #[tokio::test]
    async fn test_view_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("visible.txt"), "").unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();

        let viewed = EditTool::new()
            .call(json!({"command": "view", "path": dir.path().display().to_string()}))
            .await
            .unwrap();
        let output = viewed.output.unwrap();
        assert!(output.contains("visible.txt"));
        assert!(!output.contains(".hidden"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let err = EditTool::new()
            .call(json!({"command": "delete", "path": "/tmp"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(msg) if msg.contains("Unrecognized command delete")));
    }
}
