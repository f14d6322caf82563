//! Messenger Relay - webhook bridge between Facebook Messenger and RapidPro.
//!
//! This library provides the pieces wired together by the `messenger-relay`
//! binary:
//! - `web`: verification handshake, signed webhook intake, outbound send
//! - `dispatch`: verify → parse → normalize → forward pipeline
//! - `normalize`: Messenger events to platform-agnostic messages and back
//! - `transport`: deadline-bounded HTTP delivery to RapidPro and the Graph API
//!
//! ## Architecture
//!
//! ```text
//! Facebook → /webhook/:id/receive → Dispatcher → RapidProClient → RapidPro
//! RapidPro → /webhook/:id/send    → outbound_body → GraphClient → Facebook
//! ```

pub mod config;
pub mod dispatch;
pub mod messenger;
pub mod normalize;
pub mod transport;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher};
pub use normalize::{normalize_entry, NormalizedMessage};
pub use transport::{GraphClient, RapidProClient, TransportError};
pub use web::{router, AppState};
