//! Session-relay proxy for Minecraft 1.8: backend accounts stay logged in to
//! their servers while players attach to and switch between them.

pub mod accounts;
pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod grants;
pub mod login;
pub mod net;
pub mod proxy;
pub mod redirect;
pub mod registry;
pub mod text;
pub mod user;

pub use error::ProxyError;
pub use proxy::Proxy;
