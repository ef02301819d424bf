//! The accounts file: one `credentials address` pair per line.
//!
//! ```text
//! # offline account
//! Steve play.example.net
//! alice@example.com:hunter2 mc.example.org:25570
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::auth::Credentials;
use crate::error::ProxyError;
use crate::proxy::Proxy;

pub const DEFAULT_PORT: u16 = 25565;

/// Pause between account logins, so a server doesn't see a burst of joins.
const CONNECT_SPACING: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct AccountEntry {
    pub credentials: Credentials,
    pub address: String,
}

pub fn parse_accounts(text: &str) -> Result<Vec<AccountEntry>, ProxyError> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(credentials), Some(address), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(ProxyError::Config(format!(
                "line {}: expected `credentials address`",
                index + 1
            )));
        };
        entries.push(AccountEntry {
            credentials: Credentials::parse(credentials),
            address: address.to_string(),
        });
    }
    Ok(entries)
}

pub fn load_accounts<P: AsRef<Path>>(path: P) -> Result<Vec<AccountEntry>, ProxyError> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ProxyError::Config(format!("{}: {e}", path.as_ref().display()))
    })?;
    parse_accounts(&text)
}

/// Split `host[:port]`, defaulting the port.
pub fn split_host_port(address: &str) -> (String, u16) {
    if let Some((host, port)) = address.rsplit_once(':') {
        if let Ok(port) = port.parse() {
            return (host.to_string(), port);
        }
    }
    (address.to_string(), DEFAULT_PORT)
}

/// Connect every account in turn. Failures are logged and not retried.
pub async fn connect_all(proxy: &Arc<Proxy>, entries: Vec<AccountEntry>) -> usize {
    let mut connected = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        if proxy.is_shutting_down() {
            break;
        }
        if index > 0 {
            tokio::time::sleep(CONNECT_SPACING).await;
        }
        let account = entry.credentials.account().to_string();
        match proxy.connect_account(entry.credentials, &entry.address).await {
            Ok(_) => {
                connected += 1;
                info!("Connected {account} to {}", entry.address);
            }
            Err(e) => warn!("Could not connect {account} to {}: {e}", entry.address),
        }
    }
    connected
}
