//! Queries: callback, inline, shipping and pre-checkout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::chat::User;
use super::message::Message;

/// A press on an inline keyboard button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Message with the button, when sent by the bot and not too old.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
    /// Identifier of the inline message with the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    /// Global identifier of the chat the button was pressed in.
    #[serde(default)]
    pub chat_instance: String,
    /// Data attached to the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// An incoming inline query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Query text.
    #[serde(default)]
    pub query: String,
    /// Pagination offset.
    #[serde(default)]
    pub offset: String,
    /// Type of the chat the query was sent from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_type: Option<String>,
}

/// An inline result chosen by a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    /// Identifier of the chosen result.
    pub result_id: String,
    /// User that chose the result.
    pub from: User,
    /// Query that was used to obtain the result.
    #[serde(default)]
    pub query: String,
    /// Identifier of the sent inline message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
}

/// Shipping query for invoices with flexible price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Bot-specified invoice payload.
    #[serde(default)]
    pub invoice_payload: String,
    /// User specified shipping address.
    #[serde(default)]
    pub shipping_address: Value,
}

/// Pre-checkout query, must be answered within 10 seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency: String,
    /// Total price in the smallest currency units.
    #[serde(default)]
    pub total_amount: i64,
    /// Bot-specified invoice payload.
    #[serde(default)]
    pub invoice_payload: String,
}
