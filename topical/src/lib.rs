//! A small discussion board: visitors pick initials and a color, open
//! topics, and reply with Markdown messages.

pub mod api;
pub mod assets;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod middleware;
pub mod model;
pub mod session;
pub mod store;
pub mod views;
