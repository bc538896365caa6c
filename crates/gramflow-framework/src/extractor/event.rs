//! Extractors for the event payload itself.

use std::sync::Arc;

use gramflow_core::{
    CallbackQuery, ChatJoinRequest, ChatMemberUpdated, ChosenInlineResult, InlineQuery, Message,
    Poll, PollAnswer, PreCheckoutQuery, ShippingQuery, Update,
};

use super::{FromContext, ParamSpec, required};
use crate::context::{Data, keys};
use crate::error::{ExtractError, ExtractResult};
use crate::event::{ErrorEvent, TelegramEvent};

fn mismatch(expected: &'static str, event: &TelegramEvent) -> ExtractError {
    ExtractError::EventTypeMismatch {
        expected,
        got: event.kind_name(),
    }
}

macro_rules! impl_payload_extractor {
    ($ty:ty, $expected:literal, $($variant:ident)|+) => {
        impl FromContext for $ty {
            fn from_context(event: &TelegramEvent, _data: &Data) -> ExtractResult<Self> {
                match event {
                    $(TelegramEvent::$variant(inner))|+ => Ok((**inner).clone()),
                    other => Err(mismatch($expected, other)),
                }
            }
        }
    };
}

// Any of the four message kinds.
impl_payload_extractor!(
    Message,
    "message",
    Message | EditedMessage | ChannelPost | EditedChannelPost
);
impl_payload_extractor!(InlineQuery, "inline_query", InlineQuery);
impl_payload_extractor!(ChosenInlineResult, "chosen_inline_result", ChosenInlineResult);
impl_payload_extractor!(CallbackQuery, "callback_query", CallbackQuery);
impl_payload_extractor!(ShippingQuery, "shipping_query", ShippingQuery);
impl_payload_extractor!(PreCheckoutQuery, "pre_checkout_query", PreCheckoutQuery);
impl_payload_extractor!(Poll, "poll", Poll);
impl_payload_extractor!(PollAnswer, "poll_answer", PollAnswer);
impl_payload_extractor!(ChatMemberUpdated, "chat_member", MyChatMember | ChatMember);
impl_payload_extractor!(ChatJoinRequest, "chat_join_request", ChatJoinRequest);
impl_payload_extractor!(ErrorEvent, "error", Error);

impl FromContext for TelegramEvent {
    fn from_context(event: &TelegramEvent, _data: &Data) -> ExtractResult<Self> {
        Ok(event.clone())
    }
}

/// The raw update, available to every handler of every router.
impl FromContext for Update {
    fn declare(spec: &mut ParamSpec) {
        spec.key(keys::EVENT_UPDATE);
    }

    fn from_context(event: &TelegramEvent, data: &Data) -> ExtractResult<Self> {
        if let TelegramEvent::Update(update) = event {
            return Ok((**update).clone());
        }
        let update: Arc<Update> = required(data, keys::EVENT_UPDATE)?;
        Ok((*update).clone())
    }
}
