//! Core types shared across the Courier notification dispatcher.
//!
//! This crate defines the vocabulary of the system: channel-family tags
//! ([`ProviderType`]), credential units ([`Account`]), provider-level
//! configuration ([`ProviderConfig`]), the account-selection strategies
//! ([`AccountSelector`]), the polymorphic [`Message`] contract, the
//! [`SendResult`] returned for every delivery, and the [`SendError`]
//! taxonomy every layer speaks.

pub mod account;
pub mod config;
pub mod error;
pub mod message;
pub mod provider_type;
pub mod result;
pub mod selector;

pub use account::Account;
pub use config::{ProviderConfig, Strategy};
pub use error::SendError;
pub use message::{Message, new_msg_id};
pub use provider_type::ProviderType;
pub use result::SendResult;
pub use selector::AccountSelector;
