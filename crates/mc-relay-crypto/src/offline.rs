//! Offline-mode player UUIDs.

use md5::{Digest, Md5};
use uuid::{Builder, Uuid};

/// Name-based (version 3) UUID of `OfflinePlayer:<name>`, the identity an
/// unauthenticated server assigns to a player.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{name}").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    Builder::from_md5_bytes(bytes).into_uuid()
}
