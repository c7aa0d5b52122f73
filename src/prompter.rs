//! Interactive input for the `connect` flow.
//!
//! The server speaks JSON-RPC over stdio, so stdin is never read for user
//! input. A [`ConsolePrompter`] talks to the controlling terminal directly;
//! a [`HostPrompter`] answers from values the MCP host supplied as tool
//! arguments.

use crate::error::KustoError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Prompt text for the cluster URL.
pub const CLUSTER_PROMPT: &str = "Enter Kusto cluster URL";

/// Prompt text for the database name.
pub const DATABASE_PROMPT: &str = "Enter database name";

/// Source of answers to connection prompts.
#[async_trait]
pub trait InputPrompter: Send + Sync {
    /// Ask a question and return the answer, or `default` when the answer is blank.
    async fn ask(&self, prompt: &str, default: &str) -> String;
}

/// Which prompter the `connect` tool uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrompterMode {
    /// Answers come from the tool arguments.
    #[default]
    Host,
    /// Answers are typed on the controlling terminal.
    Console,
}

impl FromStr for PrompterMode {
    type Err = KustoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "host" | "mcp" => Ok(PrompterMode::Host),
            "console" | "terminal" | "tty" => Ok(PrompterMode::Console),
            other => Err(KustoError::config(format!(
                "Unknown prompter '{}'. Valid values: host, console",
                other
            ))),
        }
    }
}

impl fmt::Display for PrompterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrompterMode::Host => write!(f, "host"),
            PrompterMode::Console => write!(f, "console"),
        }
    }
}

/// Answers prompts from values supplied by the MCP host.
#[derive(Debug, Clone, Default)]
pub struct HostPrompter {
    answers: HashMap<String, String>,
}

impl HostPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the answer for a prompt. Blank answers are ignored.
    pub fn with_answer(mut self, prompt: &str, answer: Option<&str>) -> Self {
        if let Some(answer) = answer.map(str::trim).filter(|a| !a.is_empty()) {
            self.answers.insert(prompt.to_string(), answer.to_string());
        }
        self
    }

    /// Prompter for the `connect` tool arguments.
    pub fn for_connect(cluster: Option<&str>, database: Option<&str>) -> Self {
        Self::new()
            .with_answer(CLUSTER_PROMPT, cluster)
            .with_answer(DATABASE_PROMPT, database)
    }
}

#[async_trait]
impl InputPrompter for HostPrompter {
    async fn ask(&self, prompt: &str, default: &str) -> String {
        self.answers
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Reads answers from the controlling terminal.
///
/// Falls back to the default when no terminal is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompter;

#[async_trait]
impl InputPrompter for ConsolePrompter {
    async fn ask(&self, prompt: &str, default: &str) -> String {
        let prompt = prompt.to_string();
        let fallback = default.to_string();
        let default = default.to_string();

        match tokio::task::spawn_blocking(move || read_from_terminal(&prompt, &default)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!("Terminal prompt unavailable, using default: {}", e);
                fallback
            }
            Err(e) => {
                warn!("Terminal prompt task failed, using default: {}", e);
                fallback
            }
        }
    }
}

fn read_from_terminal(prompt: &str, default: &str) -> std::io::Result<String> {
    use std::io::{BufRead, BufReader, Write};

    let (input, mut output) = open_terminal()?;
    if default.is_empty() {
        write!(output, "{}: ", prompt)?;
    } else {
        write!(output, "{} [{}]: ", prompt, default)?;
    }
    output.flush()?;

    let mut line = String::new();
    BufReader::new(input).read_line(&mut line)?;
    debug!("Read answer for prompt '{}'", prompt);
    Ok(answer_or_default(&line, default))
}

#[cfg(unix)]
fn open_terminal() -> std::io::Result<(std::fs::File, std::fs::File)> {
    let input = std::fs::File::open("/dev/tty")?;
    let output = std::fs::OpenOptions::new().write(true).open("/dev/tty")?;
    Ok((input, output))
}

#[cfg(windows)]
fn open_terminal() -> std::io::Result<(std::fs::File, std::fs::File)> {
    let input = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open("CONIN$")?;
    let output = std::fs::OpenOptions::new().write(true).open("CONOUT$")?;
    Ok((input, output))
}

#[cfg(not(any(unix, windows)))]
fn open_terminal() -> std::io::Result<(std::fs::File, std::fs::File)> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "no controlling terminal on this platform",
    ))
}

fn answer_or_default(line: &str, default: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompter_mode_parse() {
        assert_eq!("host".parse::<PrompterMode>().unwrap(), PrompterMode::Host);
        assert_eq!(
            "CONSOLE".parse::<PrompterMode>().unwrap(),
            PrompterMode::Console
        );
        assert!("nope".parse::<PrompterMode>().is_err());
        assert_eq!(PrompterMode::Console.to_string(), "console");
    }

    #[tokio::test]
    async fn test_host_prompter_answers() {
        let prompter = HostPrompter::for_connect(Some("https://c.kusto.windows.net"), Some(" "));
        assert_eq!(
            prompter.ask(CLUSTER_PROMPT, "").await,
            "https://c.kusto.windows.net"
        );
        // Blank answers fall through to the default.
        assert_eq!(prompter.ask(DATABASE_PROMPT, "current").await, "current");
        assert_eq!(prompter.ask("Something else", "").await, "");
    }

    #[test]
    fn test_answer_or_default() {
        assert_eq!(answer_or_default("  mydb \n", "x"), "mydb");
        assert_eq!(answer_or_default("\n", "x"), "x");
    }
}
