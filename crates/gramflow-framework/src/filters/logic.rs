//! Logical combinators over filters.

use async_trait::async_trait;

use super::{BoxedFilter, Filter, FilterResult, IntoFilters};
use crate::context::Data;
use crate::error::DispatchResult;
use crate::event::TelegramEvent;
use crate::flags::Flags;

/// Accepts when every inner filter accepts.
///
/// Stops at the first rejection. Data contributed by the inner filters is
/// merged; each inner filter sees only the original context.
pub struct AndFilter {
    filters: Vec<BoxedFilter>,
}

#[async_trait]
impl Filter for AndFilter {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        let mut merged: Option<Data> = None;
        for filter in &self.filters {
            match filter.check(event, data).await? {
                result if !result.is_accepted() => return Ok(FilterResult::Rejected),
                FilterResult::AcceptedWith(more) => {
                    merged.get_or_insert_with(Data::new).merge(more);
                }
                _ => {}
            }
        }
        Ok(merged.map_or(FilterResult::Accepted, FilterResult::AcceptedWith))
    }

    fn update_handler_flags(&self, flags: &mut Flags) {
        for filter in &self.filters {
            filter.update_handler_flags(flags);
        }
    }

    fn name(&self) -> &str {
        "and"
    }
}

/// Accepts with the result of the first accepting inner filter.
pub struct OrFilter {
    filters: Vec<BoxedFilter>,
}

#[async_trait]
impl Filter for OrFilter {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        for filter in &self.filters {
            let result = filter.check(event, data).await?;
            if result.is_accepted() {
                return Ok(result);
            }
        }
        Ok(FilterResult::Rejected)
    }

    fn name(&self) -> &str {
        "or"
    }
}

/// Negates the inner filter. Never contributes data.
pub struct InvertFilter {
    filter: BoxedFilter,
}

#[async_trait]
impl Filter for InvertFilter {
    async fn check(&self, event: &TelegramEvent, data: &Data) -> DispatchResult<FilterResult> {
        let result = self.filter.check(event, data).await?;
        Ok((!result.is_accepted()).into())
    }

    fn name(&self) -> &str {
        "invert"
    }
}

/// `and_f((a, b, c))`
pub fn and_f(filters: impl IntoFilters) -> AndFilter {
    AndFilter {
        filters: filters.into_filters(),
    }
}

/// `or_f((a, b, c))`
pub fn or_f(filters: impl IntoFilters) -> OrFilter {
    OrFilter {
        filters: filters.into_filters(),
    }
}

/// `invert_f(a)`
pub fn invert_f(filter: impl Filter) -> InvertFilter {
    InvertFilter {
        filter: std::sync::Arc::new(filter),
    }
}

/// Fluent combinators.
///
/// ```rust,ignore
/// let filter = Command::new(["start"]).or(Text::equals(["hello"])).and(is_private);
/// ```
pub trait FilterExt: Filter + Sized {
    fn and<F: Filter>(self, other: F) -> AndFilter {
        and_f((self, other))
    }

    fn or<F: Filter>(self, other: F) -> OrFilter {
        or_f((self, other))
    }

    fn invert(self) -> InvertFilter {
        invert_f(self)
    }
}

impl<T: Filter> FilterExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::event::LifecycleEvent;
    use crate::filters::filter_fn;

    fn event() -> TelegramEvent {
        TelegramEvent::Lifecycle(LifecycleEvent::Startup)
    }

    fn counting(calls: &Arc<AtomicUsize>, result: fn() -> FilterResult) -> impl Filter {
        let calls = calls.clone();
        filter_fn(move |_: &TelegramEvent, _: &Data| {
            calls.fetch_add(1, Ordering::SeqCst);
            result()
        })
    }

    #[tokio::test]
    async fn test_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filter = and_f((
            counting(&calls, || FilterResult::Rejected),
            counting(&calls, || FilterResult::Accepted),
        ));
        let result = filter.check(&event(), &Data::new()).await.unwrap();
        assert!(!result.is_accepted());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_and_merges_data() {
        let filter = and_f((
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("a", 1u8)),
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("b", 2u8)),
        ));
        let FilterResult::AcceptedWith(data) = filter.check(&event(), &Data::new()).await.unwrap()
        else {
            panic!("expected data");
        };
        assert_eq!(data.get::<u8>("a"), Some(&1));
        assert_eq!(data.get::<u8>("b"), Some(&2));
    }

    #[tokio::test]
    async fn test_and_plain() {
        let filter = and_f((
            filter_fn(|_: &TelegramEvent, _: &Data| true),
            filter_fn(|_: &TelegramEvent, _: &Data| true),
        ));
        assert!(matches!(
            filter.check(&event(), &Data::new()).await.unwrap(),
            FilterResult::Accepted
        ));
    }

    #[tokio::test]
    async fn test_or_returns_first_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let filter = or_f((
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("first", true)),
            counting(&calls, || FilterResult::Accepted),
        ));
        let FilterResult::AcceptedWith(data) = filter.check(&event(), &Data::new()).await.unwrap()
        else {
            panic!("expected data");
        };
        assert!(data.contains("first"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_or_skips_empty_mapping() {
        let filter = or_f((
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new()),
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("second", true)),
        ));
        let FilterResult::AcceptedWith(data) = filter.check(&event(), &Data::new()).await.unwrap()
        else {
            panic!("expected data");
        };
        assert!(data.contains("second"));
    }

    #[tokio::test]
    async fn test_and_rejects_on_empty_mapping() {
        let filter = and_f((
            filter_fn(|_: &TelegramEvent, _: &Data| true),
            filter_fn(|_: &TelegramEvent, _: &Data| Data::new()),
        ));
        assert!(matches!(
            filter.check(&event(), &Data::new()).await.unwrap(),
            FilterResult::Rejected
        ));
    }

    #[tokio::test]
    async fn test_invert() {
        let filter = filter_fn(|_: &TelegramEvent, _: &Data| Data::new()).invert();
        assert!(matches!(
            filter.check(&event(), &Data::new()).await.unwrap(),
            FilterResult::Accepted
        ));
        let filter = filter_fn(|_: &TelegramEvent, _: &Data| Data::new().with("k", 1u8)).invert();
        assert!(!filter.check(&event(), &Data::new()).await.unwrap().is_accepted());
        let filter = invert_f(filter_fn(|_: &TelegramEvent, _: &Data| false));
        assert!(matches!(
            filter.check(&event(), &Data::new()).await.unwrap(),
            FilterResult::Accepted
        ));
    }

    #[test]
    fn test_flags_forwarding() {
        struct Tagging;

        #[async_trait]
        impl Filter for Tagging {
            async fn check(&self, _: &TelegramEvent, _: &Data) -> DispatchResult<FilterResult> {
                Ok(FilterResult::Accepted)
            }

            fn update_handler_flags(&self, flags: &mut Flags) {
                flags.insert("tagged".into(), true.into());
            }
        }

        let mut flags = Flags::new();
        and_f(Tagging).update_handler_flags(&mut flags);
        assert!(flags.contains_key("tagged"));

        let mut flags = Flags::new();
        or_f(Tagging).update_handler_flags(&mut flags);
        Tagging.invert().update_handler_flags(&mut flags);
        assert!(flags.is_empty());
    }
}
