//! Command filter.

use async_trait::async_trait;
use gramflow_core::Bot;
use regex::{Regex, RegexBuilder};
use serde_json::{Value, json};
use tracing::trace;

use super::{Filter, FilterResult};
use crate::context::{Data, keys};
use crate::error::{DispatchResult, FilterError};
use crate::event::TelegramEvent;
use crate::flags::Flags;

/// A parsed bot command, injected as `command`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandObject {
    /// Command prefix, usually `/`.
    pub prefix: String,
    /// Command name without prefix and mention.
    pub command: String,
    /// Bot username after `@`, if given.
    pub mention: Option<String>,
    /// Everything after the first whitespace.
    pub args: Option<String>,
    /// Capture groups when the command matched a regex pattern, group 0 first.
    pub regexp_match: Option<Vec<Option<String>>>,
}

impl CommandObject {
    /// Parses `text` as `<prefix><command>[@mention] [args]`.
    ///
    /// Returns `None` for empty text.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        let (full_command, args) = match text.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                let tail = tail.trim_start();
                (head, (!tail.is_empty()).then(|| tail.to_string()))
            }
            None => (text, None),
        };
        let mut chars = full_command.chars();
        let prefix = chars.next()?;
        let (command, mention) = match chars.as_str().split_once('@') {
            Some((command, mention)) => (command, (!mention.is_empty()).then(|| mention.to_string())),
            None => (chars.as_str(), None),
        };
        Some(Self {
            prefix: prefix.to_string(),
            command: command.to_string(),
            mention,
            args,
            regexp_match: None,
        })
    }

    /// Whether the command names a bot explicitly.
    pub fn mentioned(&self) -> bool {
        self.mention.is_some()
    }

    /// Reassembles the command text.
    pub fn text(&self) -> String {
        let mut line = format!("{}{}", self.prefix, self.command);
        if let Some(mention) = &self.mention {
            line.push('@');
            line.push_str(mention);
        }
        if let Some(args) = &self.args {
            line.push(' ');
            line.push_str(args);
        }
        line
    }
}

/// One accepted command.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact name, without prefix.
    Name(String),
    /// Regex matched against the whole command name.
    Regex(Regex),
}

impl CommandPattern {
    fn describe(&self) -> Value {
        match self {
            Self::Name(name) => Value::String(name.clone()),
            Self::Regex(re) => json!({ "regex": re.as_str() }),
        }
    }
}

/// Accepts messages whose text is one of the configured commands.
///
/// ```rust,ignore
/// Command::new(["start", "help"])
/// Command::new(["settings"]).prefix("/!").ignore_case(true)
/// Command::regex(r"item_(\d+)")?
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    commands: Vec<CommandPattern>,
    prefix: String,
    ignore_case: bool,
    ignore_mention: bool,
}

impl Command {
    /// Matches any of `names`. A leading prefix character is not stripped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: names
                .into_iter()
                .map(|n| CommandPattern::Name(n.into()))
                .collect(),
            prefix: "/".into(),
            ignore_case: false,
            ignore_mention: false,
        }
    }

    /// Matches `/start`.
    pub fn start() -> Self {
        Self::new(["start"])
    }

    /// Matches commands against a regex.
    pub fn regex(pattern: &str) -> Result<Self, FilterError> {
        let re = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| FilterError::invalid("commands", e.to_string()))?;
        let mut command = Self::new(Vec::<String>::new());
        command.commands.push(CommandPattern::Regex(re));
        Ok(command)
    }

    /// Adds another accepted pattern.
    pub fn pattern(mut self, pattern: CommandPattern) -> Self {
        self.commands.push(pattern);
        self
    }

    /// Accepted prefix characters. Defaults to `/`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    /// Accept commands addressed to other bots.
    pub fn ignore_mention(mut self, ignore_mention: bool) -> Self {
        self.ignore_mention = ignore_mention;
        self
    }

    fn match_pattern(&self, command: &mut CommandObject) -> bool {
        for pattern in &self.commands {
            match pattern {
                CommandPattern::Regex(re) => {
                    if let Some(caps) = re.captures(&command.command) {
                        command.regexp_match = Some(
                            caps.iter()
                                .map(|m| m.map(|m| m.as_str().to_string()))
                                .collect(),
                        );
                        return true;
                    }
                }
                CommandPattern::Name(name) if self.ignore_case => {
                    if name.to_lowercase() == command.command.to_lowercase() {
                        return true;
                    }
                }
                CommandPattern::Name(name) => {
                    if *name == command.command {
                        return true;
                    }
                }
            }
        }
        false
    }

    async fn mention_matches(&self, command: &CommandObject, data: &Data) -> DispatchResult<bool> {
        let Some(mention) = &command.mention else {
            return Ok(true);
        };
        if self.ignore_mention {
            return Ok(true);
        }
        let Some(bot) = data.get::<Bot>(keys::BOT) else {
            return Ok(false);
        };
        let me = bot.me().await?;
        Ok(match me.username {
            Some(username) => username.eq_ignore_ascii_case(mention),
            None => true,
        })
    }

    fn descriptor(&self) -> Value {
        json!({
            "commands": self.commands.iter().map(CommandPattern::describe).collect::<Vec<_>>(),
            "prefix": self.prefix,
            "ignore_case": self.ignore_case,
            "ignore_mention": self.ignore_mention,
        })
    }

    pub(crate) fn from_kwargs(kwargs: &serde_json::Map<String, Value>) -> Result<Self, FilterError> {
        let names = match kwargs.get("commands") {
            Some(Value::String(name)) => vec![name.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| FilterError::invalid("commands", "expected a list of strings"))
                })
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(FilterError::invalid("commands", "expected a string or a list")),
            None => return Err(FilterError::invalid("commands", "is required")),
        };
        let mut command = Self::new(names);
        if let Some(prefix) = kwargs.get("commands_prefix") {
            let prefix = prefix
                .as_str()
                .ok_or_else(|| FilterError::invalid("commands_prefix", "expected a string"))?;
            command = command.prefix(prefix);
        }
        if let Some(v) = kwargs.get("commands_ignore_case") {
            let v = v
                .as_bool()
                .ok_or_else(|| FilterError::invalid("commands_ignore_case", "expected a bool"))?;
            command = command.ignore_case(v);
        }
        if let Some(v) = kwargs.get("commands_ignore_mention") {
            let v = v
                .as_bool()
                .ok_or_else(|| FilterError::invalid("commands_ignore_mention", "expected a bool"))?;
            command = command.ignore_mention(v);
        }
        Ok(command)
    }
}

#[async_trait]
impl Filter for Command {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        let Some(text) = event.as_message().and_then(|m| m.text_or_caption()) else {
            return Ok(FilterResult::Rejected);
        };
        let Some(mut command) = CommandObject::parse(text) else {
            return Ok(FilterResult::Rejected);
        };
        if !self.prefix.contains(command.prefix.as_str()) {
            return Ok(FilterResult::Rejected);
        }
        if !self.mention_matches(&command, data).await? {
            trace!(mention = ?command.mention, "Command addressed to another bot");
            return Ok(FilterResult::Rejected);
        }
        if !self.match_pattern(&mut command) {
            return Ok(FilterResult::Rejected);
        }
        Ok(FilterResult::AcceptedWith(
            Data::new().with(keys::COMMAND, command),
        ))
    }

    fn update_handler_flags(&self, flags: &mut Flags) {
        let entry = flags
            .entry("commands")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(self.descriptor());
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Builds a case-insensitive regex pattern for [`Command::pattern`].
pub fn case_insensitive(pattern: &str) -> Result<CommandPattern, FilterError> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
        .map(CommandPattern::Regex)
        .map_err(|e| FilterError::invalid("commands", e.to_string()))
}
