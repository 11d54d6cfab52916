//! Notification feed, push delivery and the task tying them to the session.

pub mod center;
pub mod feed;
pub mod push;

pub use center::{FeedError, FeedSnapshot, NotificationCenter};
pub use feed::{NotificationFeed, NotificationRecord};
pub use push::{
    run_relay, send_command, PushChannel, PushCommand, PushEvent, PushHub, PushSubscription,
    TcpPushChannel,
};
