//! Text filter.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Filter, FilterResult};
use crate::context::Data;
use crate::error::{DispatchResult, FilterError};
use crate::event::TelegramEvent;

/// How [`Text`] compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
}

impl TextMatch {
    fn matches(self, text: &str, candidate: &str) -> bool {
        match self {
            Self::Equals => text == candidate,
            Self::Contains => text.contains(candidate),
            Self::StartsWith => text.starts_with(candidate),
            Self::EndsWith => text.ends_with(candidate),
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Self::Equals => "text",
            Self::Contains => "text_contains",
            Self::StartsWith => "text_startswith",
            Self::EndsWith => "text_endswith",
        }
    }
}

/// Matches the text of an event against candidates.
///
/// The text is the message text or caption, the callback query data, the
/// inline query or the poll question. Accepts when any candidate matches.
#[derive(Debug, Clone)]
pub struct Text {
    mode: TextMatch,
    candidates: Vec<String>,
    ignore_case: bool,
}

impl Text {
    pub fn new<I, S>(mode: TextMatch, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode,
            candidates: candidates.into_iter().map(Into::into).collect(),
            ignore_case: false,
        }
    }

    pub fn equals<I: IntoIterator<Item = S>, S: Into<String>>(candidates: I) -> Self {
        Self::new(TextMatch::Equals, candidates)
    }

    pub fn contains<I: IntoIterator<Item = S>, S: Into<String>>(candidates: I) -> Self {
        Self::new(TextMatch::Contains, candidates)
    }

    pub fn starts_with<I: IntoIterator<Item = S>, S: Into<String>>(candidates: I) -> Self {
        Self::new(TextMatch::StartsWith, candidates)
    }

    pub fn ends_with<I: IntoIterator<Item = S>, S: Into<String>>(candidates: I) -> Self {
        Self::new(TextMatch::EndsWith, candidates)
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub(crate) fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, FilterError> {
        let modes = [
            TextMatch::Equals,
            TextMatch::Contains,
            TextMatch::StartsWith,
            TextMatch::EndsWith,
        ];
        let mut chosen = None;
        for mode in modes {
            let Some(value) = kwargs.get(mode.keyword()) else {
                continue;
            };
            if let Some((previous, _)) = chosen {
                return Err(FilterError::invalid(
                    mode.keyword(),
                    format!("cannot be combined with '{}'", TextMatch::keyword(previous)),
                ));
            }
            chosen = Some((mode, candidates(mode.keyword(), value)?));
        }
        let Some((mode, list)) = chosen else {
            return Err(FilterError::invalid("text", "one of the text keywords is required"));
        };
        let mut text = Self::new(mode, list);
        if let Some(v) = kwargs.get("text_ignore_case") {
            let v = v
                .as_bool()
                .ok_or_else(|| FilterError::invalid("text_ignore_case", "expected a bool"))?;
            text = text.ignore_case(v);
        }
        Ok(text)
    }
}

fn candidates(key: &str, value: &Value) -> Result<Vec<String>, FilterError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| FilterError::invalid(key, "expected a list of strings"))
            })
            .collect(),
        _ => Err(FilterError::invalid(key, "expected a string or a list")),
    }
}

#[async_trait]
impl Filter for Text {
    async fn check(&self, event: &TelegramEvent, _data: &Data) -> DispatchResult<FilterResult> {
        let Some(text) = event.text() else {
            return Ok(FilterResult::Rejected);
        };
        let accepted = if self.ignore_case {
            let text = text.to_lowercase();
            self.candidates
                .iter()
                .any(|c| self.mode.matches(&text, &c.to_lowercase()))
        } else {
            self.candidates.iter().any(|c| self.mode.matches(text, c))
        };
        Ok(accepted.into())
    }

    fn name(&self) -> &str {
        "text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gramflow_core::{CallbackQuery, Message};
    use serde_json::json;

    fn message(text: &str) -> TelegramEvent {
        TelegramEvent::Message(Arc::new(Message {
            text: Some(text.into()),
            ..Default::default()
        }))
    }

    async fn accepts(filter: &Text, event: &TelegramEvent) -> bool {
        filter.check(event, &Data::new()).await.unwrap().is_accepted()
    }

    #[tokio::test]
    async fn test_modes() {
        let event = message("Hello world");
        assert!(accepts(&Text::equals(["Hello world"]), &event).await);
        assert!(!accepts(&Text::equals(["hello world"]), &event).await);
        assert!(accepts(&Text::equals(["hello world"]).ignore_case(true), &event).await);
        assert!(accepts(&Text::contains(["lo wo"]), &event).await);
        assert!(accepts(&Text::starts_with(["nope", "Hell"]), &event).await);
        assert!(accepts(&Text::ends_with(["world"]), &event).await);
    }

    #[tokio::test]
    async fn test_callback_data() {
        let event = TelegramEvent::CallbackQuery(Arc::new(CallbackQuery {
            data: Some("vote:yes".into()),
            ..Default::default()
        }));
        assert!(accepts(&Text::starts_with(["vote:"]), &event).await);
    }

    #[test]
    fn test_from_kwargs() {
        let kwargs = json!({"text_contains": "foo", "text_ignore_case": true});
        let text = Text::from_kwargs(kwargs.as_object().unwrap()).unwrap();
        assert_eq!(text.mode, TextMatch::Contains);
        assert!(text.ignore_case);

        let both = json!({"text": "a", "text_contains": "b"});
        assert!(Text::from_kwargs(both.as_object().unwrap()).is_err());
    }
}
