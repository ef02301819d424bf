//! Reconnect grants: short-lived preference for a viewer's last backend.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectGrant {
    pub client: Uuid,
    /// Account label of the backend session to resume.
    pub backend_account: String,
    pub expires_at: Instant,
}

impl ReconnectGrant {
    pub fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// One grant per client identity. Later grants replace earlier ones.
#[derive(Debug)]
pub struct ReconnectGrants {
    grants: DashMap<Uuid, ReconnectGrant>,
    grace: Duration,
}

impl ReconnectGrants {
    pub fn new(grace: Duration) -> Self {
        Self {
            grants: DashMap::new(),
            grace,
        }
    }

    pub fn grant(&self, client: Uuid, backend_account: &str, now: Instant) {
        debug!("reconnect grant for {client} -> {backend_account}");
        self.grants.insert(
            client,
            ReconnectGrant {
                client,
                backend_account: backend_account.to_string(),
                expires_at: now + self.grace,
            },
        );
    }

    /// Grant only if `client` holds no unexpired grant. Returns whether it did.
    pub fn grant_if_absent(&self, client: Uuid, backend_account: &str, now: Instant) -> bool {
        let grant = ReconnectGrant {
            client,
            backend_account: backend_account.to_string(),
            expires_at: now + self.grace,
        };
        match self.grants.entry(client) {
            Entry::Occupied(entry) if entry.get().is_valid(now) => false,
            Entry::Occupied(mut entry) => {
                entry.insert(grant);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(grant);
                true
            }
        }
    }

    /// The unexpired grant for `client`, without consuming it.
    pub fn peek(&self, client: &Uuid, now: Instant) -> Option<ReconnectGrant> {
        self.grants
            .get(client)
            .filter(|grant| grant.is_valid(now))
            .map(|grant| grant.value().clone())
    }

    /// Consume the grant for `client`. An expired grant is discarded and not returned.
    pub fn take(&self, client: &Uuid, now: Instant) -> Option<ReconnectGrant> {
        self.grants
            .remove(client)
            .map(|(_, grant)| grant)
            .filter(|grant| grant.is_valid(now))
    }

    /// Whether someone other than `except` holds a valid grant for `backend_account`.
    pub fn is_reserved(&self, backend_account: &str, except: Option<&Uuid>, now: Instant) -> bool {
        self.grants.iter().any(|entry| {
            let grant = entry.value();
            Some(&grant.client) != except
                && grant.backend_account == backend_account
                && grant.is_valid(now)
        })
    }

    /// Drop expired grants. Returns how many were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.grants.len();
        self.grants.retain(|_, grant| grant.is_valid(now));
        before.saturating_sub(self.grants.len())
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(60);

    #[test]
    fn selectable_inside_window_only() {
        let grants = ReconnectGrants::new(GRACE);
        let t = Instant::now();
        let client = Uuid::from_u128(1);
        grants.grant(client, "alt1", t);

        assert!(grants.peek(&client, t + Duration::from_secs(59)).is_some());
        assert!(grants.peek(&client, t + Duration::from_secs(61)).is_none());
        assert!(grants.take(&client, t + Duration::from_secs(61)).is_none());
    }

    #[test]
    fn take_is_one_shot() {
        let grants = ReconnectGrants::new(GRACE);
        let t = Instant::now();
        let client = Uuid::from_u128(1);
        grants.grant(client, "alt1", t);
        assert_eq!(
            grants.take(&client, t).map(|g| g.backend_account),
            Some("alt1".to_string())
        );
        assert!(grants.take(&client, t).is_none());
    }

    #[test]
    fn reservation_ignores_own_grant() {
        let grants = ReconnectGrants::new(GRACE);
        let t = Instant::now();
        let alice = Uuid::from_u128(1);
        let bob = Uuid::from_u128(2);
        grants.grant(alice, "alt1", t);

        assert!(grants.is_reserved("alt1", Some(&bob), t));
        assert!(grants.is_reserved("alt1", None, t));
        assert!(!grants.is_reserved("alt1", Some(&alice), t));
        assert!(!grants.is_reserved("alt2", Some(&bob), t));
        assert!(!grants.is_reserved("alt1", Some(&bob), t + GRACE));
    }

    #[test]
    fn grant_if_absent_keeps_live_grant() {
        let grants = ReconnectGrants::new(GRACE);
        let t = Instant::now();
        let client = Uuid::from_u128(1);
        grants.grant(client, "alt1", t);

        assert!(!grants.grant_if_absent(client, "alt2", t + Duration::from_secs(10)));
        assert_eq!(grants.peek(&client, t).map(|g| g.backend_account), Some("alt1".into()));

        let later = t + Duration::from_secs(61);
        assert!(grants.grant_if_absent(client, "alt2", later));
        assert_eq!(grants.peek(&client, later).map(|g| g.backend_account), Some("alt2".into()));
    }

    #[test]
    fn sweep_removes_expired() {
        let grants = ReconnectGrants::new(GRACE);
        let t = Instant::now();
        grants.grant(Uuid::from_u128(1), "alt1", t);
        grants.grant(Uuid::from_u128(2), "alt2", t + Duration::from_secs(30));
        assert_eq!(grants.sweep(t + Duration::from_secs(61)), 1);
        assert_eq!(grants.len(), 1);
    }
}
