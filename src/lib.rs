//! Fee markup layered over a prime brokerage WebSocket feed.
//!
//! Streams signed `l2_data` and `orders` subscriptions, keeps a level-2
//! book per product, and settles the markup withheld on quote-denominated
//! orders against what actually filled.

pub mod auth;
pub mod book;
pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
pub mod fees;
pub mod logging;
pub mod models;
pub mod orders;
pub mod websocket;

pub use error::{MarkupError, Result};
