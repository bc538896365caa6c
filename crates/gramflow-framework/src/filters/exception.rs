//! Filters for `error` observers.

use std::error::Error as StdError;
use std::marker::PhantomData;

use async_trait::async_trait;
use regex::Regex;

use super::{Filter, FilterResult};
use crate::context::{Data, keys};
use crate::error::{DispatchResult, FilterError};
use crate::event::TelegramEvent;

/// Accepts error events whose exception is an `E`.
///
/// ```rust,ignore
/// router.error().register(on_api_error, ExceptionTypeFilter::<ApiError>::new());
/// ```
pub struct ExceptionTypeFilter<E> {
    _marker: PhantomData<fn() -> E>,
}

impl<E> ExceptionTypeFilter<E> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<E> Default for ExceptionTypeFilter<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: StdError + 'static> Filter for ExceptionTypeFilter<E> {
    async fn check(&self, event: &TelegramEvent, _data: &Data) -> DispatchResult<FilterResult> {
        let TelegramEvent::Error(error) = event else {
            return Ok(FilterResult::Rejected);
        };
        Ok(error.exception.downcast_ref::<E>().is_some().into())
    }
}

/// Accepts error events whose message matches a regex at its start.
///
/// Capture groups are injected as `match_exception`.
#[derive(Debug, Clone)]
pub struct ExceptionMessageFilter {
    pattern: Regex,
}

impl ExceptionMessageFilter {
    pub fn new(pattern: &str) -> Result<Self, FilterError> {
        let pattern = Regex::new(&format!("^(?:{pattern})"))
            .map_err(|e| FilterError::invalid("exception_message", e.to_string()))?;
        Ok(Self { pattern })
    }
}

#[async_trait]
impl Filter for ExceptionMessageFilter {
    async fn check(&self, event: &TelegramEvent, _data: &Data) -> DispatchResult<FilterResult> {
        let TelegramEvent::Error(error) = event else {
            return Ok(FilterResult::Rejected);
        };
        let message = error.exception.to_string();
        let Some(caps) = self.pattern.captures(&message) else {
            return Ok(FilterResult::Rejected);
        };
        let groups: Vec<Option<String>> = caps
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        Ok(FilterResult::AcceptedWith(
            Data::new().with(keys::MATCH_EXCEPTION, groups),
        ))
    }

    fn name(&self) -> &str {
        "exception_message"
    }
}
