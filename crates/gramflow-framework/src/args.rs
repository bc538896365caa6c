//! Typed command arguments parsed with clap.
//!
//! Pair a [`Command`](crate::filters::Command) filter with a
//! [`CommandArgs<T>`] parameter to receive the arguments of the command as
//! a `clap::Parser` type.
//!
//! ```rust,ignore
//! use clap::Parser;
//!
//! #[derive(Parser, Clone)]
//! struct Remind {
//!     minutes: u32,
//!     text: Vec<String>,
//! }
//!
//! router.message().register(
//!     |args: CommandArgs<Remind>| async move { format!("in {} min", args.minutes) },
//!     Command::new(["remind"]),
//! );
//! ```

use std::ops::{Deref, DerefMut};

use clap::Parser;

use crate::context::{Data, keys};
use crate::error::{ExtractError, ExtractResult};
use crate::event::TelegramEvent;
use crate::extractor::{FromContext, ParamSpec, required};
use crate::filters::CommandObject;

/// Arguments of the matched command, parsed as `T`.
///
/// Extraction fails with the clap error message when the arguments do not
/// parse, which reaches `error` handlers like any other handler error.
#[derive(Debug, Clone)]
pub struct CommandArgs<T: Parser>(pub T);

impl<T: Parser> CommandArgs<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Parser> Deref for CommandArgs<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Parser> DerefMut for CommandArgs<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: Parser + Send + 'static> FromContext for CommandArgs<T> {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::COMMAND);
    }

    fn from_context(_event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        let command: CommandObject = required(data, keys::COMMAND)?;
        let mut argv = vec![command.command.clone()];
        argv.extend(shell_split(command.args.as_deref().unwrap_or_default()));
        T::try_parse_from(argv)
            .map(CommandArgs)
            .map_err(|e| ExtractError::custom(e.render().to_string()))
    }
}

/// Splits `input` on whitespace, honoring single and double quotes.
///
/// Inside double quotes a backslash escapes the next character.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => escape_next = true,
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                in_word = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                in_word = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        args.push(current);
    }
    args
}
