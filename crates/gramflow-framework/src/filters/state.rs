//! FSM state filter.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Filter, FilterResult};
use crate::context::{Data, keys};
use crate::error::{DispatchResult, FilterError};
use crate::event::TelegramEvent;
use crate::fsm::{State, StatesGroup};

/// One accepted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSpec {
    /// Any state, including none.
    Any,
    /// No state set.
    None,
    /// Exactly this state.
    Exact(String),
    /// Any state of this group.
    Group(StatesGroup),
}

impl StateSpec {
    fn matches(&self, state: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::None => state.is_none(),
            Self::Exact(name) => state == Some(name.as_str()),
            Self::Group(group) => state.is_some_and(|s| group.contains(s)),
        }
    }
}

impl From<&str> for StateSpec {
    fn from(name: &str) -> Self {
        if name == State::ANY {
            Self::Any
        } else {
            Self::Exact(name.to_string())
        }
    }
}

impl From<String> for StateSpec {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<&State> for StateSpec {
    fn from(state: &State) -> Self {
        Self::from(state.name())
    }
}

impl From<State> for StateSpec {
    fn from(state: State) -> Self {
        Self::from(&state)
    }
}

impl From<StatesGroup> for StateSpec {
    fn from(group: StatesGroup) -> Self {
        Self::Group(group)
    }
}

impl<T: Into<StateSpec>> From<Option<T>> for StateSpec {
    fn from(state: Option<T>) -> Self {
        state.map_or(Self::None, Into::into)
    }
}

/// Accepts when the current FSM state (`raw_state`) matches any spec.
///
/// ```rust,ignore
/// StateFilter::new([&Form::name])
/// StateFilter::none()
/// StateFilter::any()
/// ```
#[derive(Debug, Clone)]
pub struct StateFilter {
    states: Vec<StateSpec>,
}

impl StateFilter {
    pub fn new<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateSpec>,
    {
        Self {
            states: states.into_iter().map(Into::into).collect(),
        }
    }

    pub fn exact(state: impl Into<String>) -> Self {
        Self::new([StateSpec::Exact(state.into())])
    }

    pub fn any() -> Self {
        Self::new([StateSpec::Any])
    }

    /// Accepts only when no state is set.
    pub fn none() -> Self {
        Self::new([StateSpec::None])
    }

    pub fn states(&self) -> &[StateSpec] {
        &self.states
    }

    pub(crate) fn from_kwargs(kwargs: &Map<String, Value>) -> Result<Self, FilterError> {
        fn spec(value: &Value) -> Result<StateSpec, FilterError> {
            match value {
                Value::Null => Ok(StateSpec::None),
                Value::String(s) => Ok(StateSpec::from(s.as_str())),
                _ => Err(FilterError::invalid("state", "expected a string, null or a list")),
            }
        }

        let states = match kwargs.get("state") {
            Some(Value::Array(items)) => items.iter().map(spec).collect::<Result<_, _>>()?,
            Some(value) => vec![spec(value)?],
            None => return Err(FilterError::invalid("state", "is required")),
        };
        Ok(Self { states })
    }
}

#[async_trait]
impl Filter for StateFilter {
    async fn check(&self, _event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        let state = data
            .get::<Option<String>>(keys::RAW_STATE)
            .and_then(|s| s.as_deref());
        Ok(self.states.iter().any(|s| s.matches(state)).into())
    }

    fn name(&self) -> &str {
        "state"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LifecycleEvent;
    use serde_json::json;

    fn event() -> TelegramEvent {
        TelegramEvent::Lifecycle(LifecycleEvent::Startup)
    }

    async fn accepts(filter: &StateFilter, state: Option<&str>) -> bool {
        let data = Data::new().with(keys::RAW_STATE, state.map(str::to_string));
        filter.check(&event(), &data).await.unwrap().is_accepted()
    }

    #[tokio::test]
    async fn test_specs() {
        assert!(accepts(&StateFilter::exact("Form:name"), Some("Form:name")).await);
        assert!(!accepts(&StateFilter::exact("Form:name"), None).await);
        assert!(accepts(&StateFilter::none(), None).await);
        assert!(!accepts(&StateFilter::none(), Some("x")).await);
        assert!(accepts(&StateFilter::any(), None).await);
        assert!(accepts(&StateFilter::any(), Some("x")).await);
    }

    #[tokio::test]
    async fn test_group() {
        let form = StatesGroup::new("Form");
        let filter = StateFilter::new([form.clone()]);
        assert!(accepts(&filter, Some(form.state("age").name())).await);
        assert!(!accepts(&filter, Some("Other:age")).await);
    }

    #[tokio::test]
    async fn test_missing_raw_state_is_none() {
        let filter = StateFilter::none();
        assert!(filter.check(&event(), &Data::new()).await.unwrap().is_accepted());
    }

    #[test]
    fn test_from_kwargs() {
        let kwargs = json!({"state": ["*", null, "Form:a"]});
        let filter = StateFilter::from_kwargs(kwargs.as_object().unwrap()).unwrap();
        assert_eq!(
            filter.states(),
            [StateSpec::Any, StateSpec::None, StateSpec::Exact("Form:a".into())]
        );
    }
}
