//! Job board client - session lifecycle, route guarding and notifications
//!
//! Keeps track of who is logged in to the job board backend, decides which
//! pages a session may open, and maintains a live notification feed for
//! the logged-in user.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod notifications;
