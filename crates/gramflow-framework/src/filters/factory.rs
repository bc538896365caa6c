//! Keyword filters resolved at registration.
//!
//! A [`FilterFactory`] declares the keywords it owns and builds a concrete
//! filter from them. Observers bind factories; `on(handler).kwarg(..)`
//! resolves keywords against the factories bound on the observer and on the
//! same observer of every ancestor router.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use super::{BoxedFilter, Command, ExceptionMessageFilter, StateFilter, Text};
use crate::error::FilterError;
use crate::event::EventType;

/// Builds a filter from registration keywords.
pub trait FilterFactory: Send + Sync + 'static {
    /// Name for error messages.
    fn name(&self) -> &'static str;

    /// Keywords this factory owns.
    fn fields(&self) -> &'static [&'static str];

    /// Builds the filter. `kwargs` holds only this factory's keywords.
    fn build(&self, kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError>;
}

/// A shared filter factory.
pub type BoxedFilterFactory = Arc<dyn FilterFactory>;

/// Resolves `kwargs` into filters, in factory order.
///
/// Fails with [`FilterError::Ambiguous`] when two factories own one keyword
/// and with [`FilterError::Unresolved`] when no factory owns it.
pub fn resolve_kwargs(
    factories: &[BoxedFilterFactory],
    kwargs: &Map<String, Value>,
) -> Result<Vec<BoxedFilter>, FilterError> {
    if kwargs.is_empty() {
        return Ok(Vec::new());
    }

    let mut owners: BTreeMap<&str, &'static str> = BTreeMap::new();
    for factory in factories {
        for field in factory.fields() {
            if !kwargs.contains_key(*field) {
                continue;
            }
            if let Some(first) = owners.insert(*field, factory.name()) {
                return Err(FilterError::Ambiguous {
                    key: field.to_string(),
                    first: first.to_string(),
                    second: factory.name().to_string(),
                });
            }
        }
    }

    let mut leftovers: Vec<String> = kwargs
        .keys()
        .filter(|k| !owners.contains_key(k.as_str()))
        .cloned()
        .collect();
    if !leftovers.is_empty() {
        leftovers.sort();
        return Err(FilterError::Unresolved { keys: leftovers });
    }

    let mut filters = Vec::new();
    for factory in factories {
        let own: Map<String, Value> = factory
            .fields()
            .iter()
            .filter_map(|f| kwargs.get(*f).map(|v| (f.to_string(), v.clone())))
            .collect();
        if !own.is_empty() {
            filters.push(factory.build(&own)?);
        }
    }
    Ok(filters)
}

// ============================================================================
// Builtin factories
// ============================================================================

struct CommandFactory;

impl FilterFactory for CommandFactory {
    fn name(&self) -> &'static str {
        "command"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "commands",
            "commands_prefix",
            "commands_ignore_case",
            "commands_ignore_mention",
        ]
    }

    fn build(&self, kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError> {
        Ok(Arc::new(Command::from_kwargs(kwargs)?))
    }
}

struct TextFactory;

impl FilterFactory for TextFactory {
    fn name(&self) -> &'static str {
        "text"
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "text",
            "text_contains",
            "text_startswith",
            "text_endswith",
            "text_ignore_case",
        ]
    }

    fn build(&self, kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError> {
        Ok(Arc::new(Text::from_kwargs(kwargs)?))
    }
}

struct StateFactory;

impl FilterFactory for StateFactory {
    fn name(&self) -> &'static str {
        "state"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["state"]
    }

    fn build(&self, kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError> {
        Ok(Arc::new(StateFilter::from_kwargs(kwargs)?))
    }
}

struct ExceptionMessageFactory;

impl FilterFactory for ExceptionMessageFactory {
    fn name(&self) -> &'static str {
        "exception_message"
    }

    fn fields(&self) -> &'static [&'static str] {
        &["exception_message"]
    }

    fn build(&self, kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError> {
        let pattern = kwargs
            .get("exception_message")
            .and_then(Value::as_str)
            .ok_or_else(|| FilterError::invalid("exception_message", "expected a string"))?;
        Ok(Arc::new(ExceptionMessageFilter::new(pattern)?))
    }
}

struct Builtins {
    command: BoxedFilterFactory,
    text: BoxedFilterFactory,
    state: BoxedFilterFactory,
    exception_message: BoxedFilterFactory,
}

fn builtins() -> &'static Builtins {
    static BUILTINS: OnceLock<Builtins> = OnceLock::new();
    BUILTINS.get_or_init(|| Builtins {
        command: Arc::new(CommandFactory),
        text: Arc::new(TextFactory),
        state: Arc::new(StateFactory),
        exception_message: Arc::new(ExceptionMessageFactory),
    })
}

/// Factories a router binds by default on the observer for `event_type`.
///
/// The instances are process-wide, so inherited copies deduplicate by
/// identity.
pub fn builtin_factories(event_type: EventType) -> Vec<BoxedFilterFactory> {
    let b = builtins();
    match event_type {
        EventType::Message
        | EventType::EditedMessage
        | EventType::ChannelPost
        | EventType::EditedChannelPost => {
            vec![b.command.clone(), b.text.clone(), b.state.clone()]
        }
        EventType::CallbackQuery | EventType::InlineQuery | EventType::Poll => {
            vec![b.text.clone(), b.state.clone()]
        }
        EventType::Error => vec![b.exception_message.clone()],
        EventType::Update => Vec::new(),
        _ => vec![b.state.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Overlapping;

    impl FilterFactory for Overlapping {
        fn name(&self) -> &'static str {
            "overlapping"
        }

        fn fields(&self) -> &'static [&'static str] {
            &["text"]
        }

        fn build(&self, _kwargs: &Map<String, Value>) -> Result<BoxedFilter, FilterError> {
            Ok(Arc::new(StateFilter::any()))
        }
    }

    fn kwargs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_resolves_builtins() {
        let factories = builtin_factories(EventType::Message);
        let filters =
            resolve_kwargs(&factories, &kwargs(json!({"commands": ["start"], "state": null}))).unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name(), "command");
        assert_eq!(filters[1].name(), "state");
    }

    #[test]
    fn test_unresolved() {
        let factories = builtin_factories(EventType::Message);
        let Err(err) =
            resolve_kwargs(&factories, &kwargs(json!({"zeta": 1, "alpha": 2, "text": "x"})))
        else {
            panic!("expected unresolved keywords");
        };
        assert_eq!(
            err,
            FilterError::Unresolved {
                keys: vec!["alpha".into(), "zeta".into()]
            }
        );
    }

    #[test]
    fn test_ambiguous() {
        let mut factories = builtin_factories(EventType::Message);
        factories.push(Arc::new(Overlapping));
        let Err(err) = resolve_kwargs(&factories, &kwargs(json!({"text": "x"}))) else {
            panic!("expected an ambiguous keyword");
        };
        assert!(matches!(err, FilterError::Ambiguous { ref key, .. } if key == "text"));
    }

    #[test]
    fn test_shared_instances() {
        let a = builtin_factories(EventType::Message);
        let b = builtin_factories(EventType::EditedMessage);
        assert!(Arc::ptr_eq(&a[0], &b[0]));
    }
}
