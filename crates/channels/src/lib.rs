//! Outbound channel abstraction.
//!
//! The routing core never talks to a messaging gateway directly; it goes
//! through [`ChannelOutbound`], implemented per platform (WhatsApp Business
//! Cloud API today).

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{ChannelOutbound, ChannelType},
};
