use chrono::{DateTime, Local};
use indoc::formatdoc;

/// Build the system prompt for a computer use session
///
/// The suffix, when non-empty, is appended after a blank line so callers can
/// add task specific guidance without replacing the base instructions.
pub fn system_prompt(now: DateTime<Local>, suffix: &str) -> String {
    let base = formatdoc! {"
        <SYSTEM_CAPABILITY>
        * You are utilising a Linux machine with internet access through the `computer` tool.
        * You can install packages with apt or pip through the `bash` tool.
        * GUI applications started from bash need `DISPLAY` set and should be started in the background, e.g. `(DISPLAY=:1 firefox &)`.
        * Commands that produce a lot of output should be redirected to a file and inspected with `grep` or the `str_replace_editor` tool.
        * Take a screenshot after actions whose effect you are unsure of, and zoom out or scroll before concluding something is not visible.
        * Chain several `computer` actions together when the outcome of each is predictable.
        * The current date is {date}.
        </SYSTEM_CAPABILITY>

        <IMPORTANT>
        * When a browser shows a first-run wizard, skip it rather than completing it.
        * To read a PDF, download it with curl and convert it with pdftotext instead of scrolling through the viewer.
        </IMPORTANT>",
        date = now.format("%A, %B %-d, %Y"),
    };

    if suffix.is_empty() {
        base
    } else {
        format!("{}\n\n{}", base, suffix)
    }
}
