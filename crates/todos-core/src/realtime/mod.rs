//! Realtime change notifications
//!
//! Subscribes to the hosted store's realtime channel and reports every
//! row change as a `ChangeEvent`.
//!
//! ## Protocol
//!
//! Phoenix channels over WebSocket:
//! 1. Connect to `/realtime/v1/websocket?apikey=..&vsn=1.0.0`
//! 2. Join `realtime:<channel>` asking for all postgres changes
//! 3. Send heartbeats on the `phoenix` topic
//! 4. Receive `postgres_changes` frames
//!
//! ## Usage
//!
//! ```ignore
//! let mut sub = Subscription::spawn(RealtimeConfig::from_config(&config)?);
//! while let Some(event) = sub.next_event().await { ... }
//! sub.shutdown().await;
//! ```

mod client;
mod message;

pub use client::{
    socket_endpoint, RealtimeConfig, RealtimeError, RealtimeEvent, Subscription,
    SubscriptionStatus,
};
pub use message::{Frame, Inbound};
