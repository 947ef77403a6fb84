use clap::Parser;

pub const DEFAULT_INSTRUCTION: &str = "Save an image of a cat to the desktop.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// What the model should do on the computer; words are joined with spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub instruction: Vec<String>,
}

impl Cli {
    pub fn instruction(&self) -> String {
        resolve_instruction(&self.instruction)
    }
}

/// Join the words into one instruction, falling back to the default when there are none
pub fn resolve_instruction(words: &[String]) -> String {
    let instruction = words.join(" ");
    if instruction.is_empty() {
        DEFAULT_INSTRUCTION.to_string()
    } else {
        instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_are_joined() {
        let cli = Cli::parse_from(["computer-use", "open", "the", "browser"]);
        assert_eq!(cli.instruction(), "open the browser");
    }

    #[test]
    fn test_default_instruction() {
        let cli = Cli::parse_from(["computer-use"]);
        assert!(cli.instruction.is_empty());
        assert_eq!(cli.instruction(), "Save an image of a cat to the desktop.");
    }

    #[test]
    fn test_hyphenated_words_are_instruction_text() {
        let cli = Cli::parse_from(["computer-use", "run", "ls", "-la", "--color"]);
        assert_eq!(cli.instruction(), "run ls -la --color");
    }

    #[test]
    fn test_quoted_instruction_is_kept_whole() {
        assert_eq!(
            resolve_instruction(&["open  two spaces".to_string()]),
            "open  two spaces"
        );
    }
}
