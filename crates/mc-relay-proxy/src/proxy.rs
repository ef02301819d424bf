//! Process-wide state: configuration, keys, backend sessions, players and
//! reconnect grants, plus the operator operations over them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mc_relay_crypto::ServerKeyPair;
use mc_relay_proto::packets::{KeepAlive, ServerStatus};
use mc_relay_proto::ProtocolPhase;

use crate::auth::{Credentials, Identity, SessionService};
use crate::backend::{BackendServices, BackendSession, SessionEvent};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::grants::ReconnectGrants;
use crate::redirect;
use crate::registry::SessionRegistry;
use crate::user::UserConnection;

pub const SHUTDOWN_MESSAGE: &str = "Shutting down the proxy...";

/// One line of the operator's `list` output.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub account: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phase: ProtocolPhase,
    pub viewer: Option<String>,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.account)?;
        if let Some(name) = &self.name {
            if name != &self.account {
                write!(f, " ({name})")?;
            }
        }
        if let Some(address) = &self.address {
            write!(f, " @ {address}")?;
        }
        write!(f, " [{}]", self.phase)?;
        match &self.viewer {
            Some(viewer) => write!(f, " viewed by {viewer}"),
            None => write!(f, " free"),
        }
    }
}

pub struct Proxy {
    config: ProxyConfig,
    keys: ServerKeyPair,
    session_service: Arc<dyn SessionService>,
    sessions: Arc<SessionRegistry>,
    players: DashMap<Uuid, Arc<UserConnection>>,
    grants: ReconnectGrants,
    events: broadcast::Sender<SessionEvent>,
    shutting_down: AtomicBool,
    shutdown: Notify,
}

impl Proxy {
    pub fn new(
        config: ProxyConfig,
        session_service: Arc<dyn SessionService>,
    ) -> Result<Arc<Self>, ProxyError> {
        let keys = ServerKeyPair::generate()?;
        Ok(Self::with_keys(config, session_service, keys))
    }

    pub fn with_keys(
        config: ProxyConfig,
        session_service: Arc<dyn SessionService>,
        keys: ServerKeyPair,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        let grants = ReconnectGrants::new(config.timing.reconnect_grace());
        Arc::new(Self {
            config,
            keys,
            session_service,
            sessions: Arc::new(SessionRegistry::new()),
            players: DashMap::new(),
            grants,
            events,
            shutting_down: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn keys(&self) -> &ServerKeyPair {
        &self.keys
    }

    pub fn session_service(&self) -> &dyn SessionService {
        self.session_service.as_ref()
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn grants(&self) -> &ReconnectGrants {
        &self.grants
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// A backend session wired to this proxy's registry and event stream.
    pub fn new_backend(&self, credentials: Credentials) -> Arc<BackendSession> {
        BackendSession::new(
            credentials,
            BackendServices {
                session_service: Arc::clone(&self.session_service),
                registry: Some(Arc::clone(&self.sessions)),
                events: self.events.clone(),
                connect_timeout: self.config.timing.connect_timeout(),
            },
        )
    }

    /// Log an account in and connect it to `address`.
    pub async fn connect_account(
        &self,
        credentials: Credentials,
        address: &str,
    ) -> Result<Arc<BackendSession>, ProxyError> {
        let session = self.new_backend(credentials);
        let socks = self.config.accounts.socks_proxy.as_deref();
        session.connect(address, socks).await?;
        Ok(session)
    }

    pub fn find_best_backend(&self, identity: &Identity) -> Option<Arc<BackendSession>> {
        redirect::find_best_backend(identity, &self.sessions.snapshot(), &self.grants, Instant::now())
    }

    pub fn is_online(&self, unique_id: &Uuid) -> bool {
        self.players.contains_key(unique_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn find_player(&self, name: &str) -> Option<Arc<UserConnection>> {
        self.players
            .iter()
            .find(|entry| entry.value().name().eq_ignore_ascii_case(name))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Fails if a connection with the same identity is already online.
    pub(crate) fn register_player(&self, user: &Arc<UserConnection>) -> Result<(), ProxyError> {
        match self.players.entry(user.unique_id()) {
            Entry::Occupied(_) => Err(ProxyError::AlreadyConnected),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(user));
                Ok(())
            }
        }
    }

    /// Forget a player whose connection ended. A player who leaves while
    /// watching a session may come back to it within the grace period.
    pub fn player_disconnected(&self, user: &Arc<UserConnection>) {
        let removed = self
            .players
            .remove_if(&user.unique_id(), |_, current| Arc::ptr_eq(current, user))
            .is_some();
        // A grant from an earlier switch outranks the session being left.
        if let Some(backend) = user.set_backend(None) {
            if backend.detach_viewer(user, false) && !self.is_shutting_down() {
                self.grants
                    .grant_if_absent(user.unique_id(), backend.account(), Instant::now());
            }
        }
        if removed {
            info!("{} disconnected", user.identity());
        }
    }

    /// Every live backend session.
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .snapshot()
            .iter()
            .map(|session| SessionSummary {
                account: session.account().to_string(),
                name: session.identity().map(|identity| identity.display_name),
                address: session.address(),
                phase: session.phase(),
                viewer: session.viewer().map(|viewer| viewer.name().to_string()),
            })
            .collect()
    }

    /// Move `player` onto the session logged in as `account`.
    pub fn switch(&self, player: &str, account: &str) -> Result<(), ProxyError> {
        let user = self
            .find_player(player)
            .ok_or_else(|| ProxyError::NotFound(format!("no player named {player}")))?;
        let session = self
            .sessions
            .find(account)
            .ok_or_else(|| ProxyError::NotFound(format!("no session for {account}")))?;
        redirect::attach(&user, &session, &self.grants, Instant::now())?;
        user.send_message(&format!("Now viewing {}", session.account()));
        Ok(())
    }

    pub fn disconnect_account(&self, account: &str) -> Result<(), ProxyError> {
        let session = self
            .sessions
            .find(account)
            .ok_or_else(|| ProxyError::NotFound(format!("no session for {account}")))?;
        session.disconnect();
        Ok(())
    }

    /// Description shown in the multiplayer server list.
    pub fn status(&self) -> ServerStatus {
        let sessions = self.sessions.snapshot();
        let free = sessions
            .iter()
            .filter(|session| session.is_connected() && !session.has_viewer())
            .count();
        let motd = format!("{}\n{free} free sessions", self.config.proxy.motd);
        ServerStatus::new(&motd, self.players.len() as i32, sessions.len() as i32)
    }

    /// One housekeeping pass: expire grants, probe both sides, and drop
    /// backends that went silent.
    pub fn sweep(&self, now: Instant) {
        let expired = self.grants.sweep(now);
        if expired > 0 {
            debug!("expired {expired} reconnect grants");
        }

        let id = rand::random::<i32>();
        let timeout = self.config.timing.backend_timeout();
        for session in self.sessions.snapshot() {
            if session.is_timed_out(now, timeout) {
                warn!("{} timed out", session.account());
                session.time_out();
            } else {
                session.send_keep_alive(id);
            }
        }
        for player in self.players.iter() {
            player.send(KeepAlive { id });
        }
    }

    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let proxy = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(proxy.config.timing.keep_alive_interval());
            interval.tick().await;
            while !proxy.is_shutting_down() {
                interval.tick().await;
                proxy.sweep(Instant::now());
            }
        })
    }

    /// A player kicked because their session's server went away keeps a
    /// claim on that account, should it come back.
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let proxy = Arc::clone(self);
        let mut events = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Ended {
                        account,
                        viewer: Some(viewer),
                        ..
                    }) => {
                        proxy.grants.grant_if_absent(viewer, &account, Instant::now());
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("session event listener skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Kick every player, then close every backend session. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("{SHUTDOWN_MESSAGE}");
        let players: Vec<_> = self.players.iter().map(|e| Arc::clone(e.value())).collect();
        for player in players {
            player.disconnect(SHUTDOWN_MESSAGE);
        }
        for session in self.sessions.snapshot() {
            session.disconnect();
        }
        self.shutdown.notify_waiters();
    }

    pub async fn wait_for_shutdown(&self) {
        let notified = self.shutdown.notified();
        if self.is_shutting_down() {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::tests::FakeSessionService;
    use crate::backend::tests::FakeServer;
    use crate::user::tests::viewer;
    use mc_relay_proto::Packet;
    use std::sync::OnceLock;
    use std::time::Duration;

    /// Key generation is slow; share one pair across tests.
    pub(crate) fn test_keys() -> ServerKeyPair {
        static KEYS: OnceLock<ServerKeyPair> = OnceLock::new();
        KEYS.get_or_init(|| ServerKeyPair::generate().unwrap()).clone()
    }

    pub(crate) fn test_proxy(service: FakeSessionService) -> Arc<Proxy> {
        Proxy::with_keys(ProxyConfig::default(), Arc::new(service), test_keys())
    }

    pub(crate) async fn add_session(proxy: &Arc<Proxy>, account: &str) -> (Arc<BackendSession>, FakeServer) {
        let session = proxy.new_backend(Credentials::parse(account));
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut server = FakeServer::new(server);
        let connect = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.start("localhost", async move { Ok(client) }).await })
        };
        server.accept_login(None).await;
        connect.await.unwrap().unwrap();
        (session, server)
    }

    #[tokio::test]
    async fn list_reports_sessions_and_viewers() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (_carol, _s2) = add_session(&proxy, "Carol").await;
        let (user, _client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        redirect::attach(&user, &alice, proxy.grants(), Instant::now()).unwrap();

        let list = proxy.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].account, "Alice");
        assert_eq!(list[0].viewer.as_deref(), Some("Bob"));
        assert_eq!(list[1].viewer, None);
        assert_eq!(list[1].phase, ProtocolPhase::Play);
        assert!(list[0].to_string().contains("viewed by Bob"));
    }

    #[tokio::test]
    async fn duplicate_identity_is_refused() {
        let proxy = test_proxy(FakeSessionService::default());
        let (first, _c1) = viewer("Bob");
        let (second, _c2) = viewer("Bob");
        proxy.register_player(&first).unwrap();
        assert!(matches!(proxy.register_player(&second), Err(ProxyError::AlreadyConnected)));
        proxy.player_disconnected(&second);
        assert!(proxy.is_online(&first.unique_id()));
    }

    #[tokio::test]
    async fn switch_moves_player_and_grants_return() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (carol, _s2) = add_session(&proxy, "Carol").await;
        let (user, _client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        redirect::attach(&user, &alice, proxy.grants(), Instant::now()).unwrap();

        proxy.switch("bob", "carol").unwrap();
        assert!(Arc::ptr_eq(&user.backend().unwrap(), &carol));
        assert_eq!(
            proxy.grants().peek(&user.unique_id(), Instant::now()).unwrap().backend_account,
            "Alice"
        );
        assert!(matches!(proxy.switch("nobody", "Carol"), Err(ProxyError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejoin_after_switch_returns_to_first_session() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (_carol, _s2) = add_session(&proxy, "Carol").await;
        let (_dave, _s3) = add_session(&proxy, "Dave").await;
        let (user, _client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        redirect::attach(&user, &alice, proxy.grants(), Instant::now()).unwrap();

        proxy.switch("Bob", "Carol").unwrap();
        proxy.player_disconnected(&user);

        let pick = proxy.find_best_backend(user.identity()).unwrap();
        assert_eq!(pick.account(), "Alice");
    }

    #[tokio::test]
    async fn replaced_viewer_leaves_no_claim() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (stale, _c1) = viewer("Bob");
        let (fresh, _c2) = viewer("Eve");
        proxy.register_player(&fresh).unwrap();
        redirect::attach(&stale, &alice, proxy.grants(), Instant::now()).unwrap();
        stale.disconnect("gone");
        redirect::attach(&fresh, &alice, proxy.grants(), Instant::now()).unwrap();

        proxy.player_disconnected(&stale);
        assert!(proxy.grants().peek(&stale.unique_id(), Instant::now()).is_none());
        assert!(Arc::ptr_eq(&alice.viewer().unwrap(), &fresh));
    }

    #[tokio::test]
    async fn leaving_player_keeps_a_claim() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (user, _client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        redirect::attach(&user, &alice, proxy.grants(), Instant::now()).unwrap();

        proxy.player_disconnected(&user);
        assert!(!proxy.is_online(&user.unique_id()));
        assert!(!alice.has_viewer());
        assert!(proxy.grants().is_reserved("Alice", None, Instant::now()));
        let pick = proxy.find_best_backend(user.identity()).unwrap();
        assert_eq!(pick.account(), "Alice");
    }

    #[tokio::test]
    async fn disconnect_account_removes_session() {
        let proxy = test_proxy(FakeSessionService::default());
        let (_alice, _s1) = add_session(&proxy, "Alice").await;
        proxy.disconnect_account("alice").unwrap();
        assert!(proxy.sessions().is_empty());
        assert!(matches!(
            proxy.disconnect_account("alice"),
            Err(ProxyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sweep_probes_and_expires() {
        let mut config = ProxyConfig::default();
        config.timing.backend_timeout_secs = 600;
        let proxy = Proxy::with_keys(config, Arc::new(FakeSessionService::default()), test_keys());
        let (_alice, mut server) = add_session(&proxy, "Alice").await;
        let (user, mut client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        let now = Instant::now();
        proxy.grants().grant(Uuid::from_u128(7), "Alice", now);

        proxy.sweep(now + Duration::from_secs(120));
        assert!(proxy.grants().is_empty());
        assert!(matches!(server.recv(ProtocolPhase::Play).await, Packet::ClientKeepAlive(_)));
        assert!(matches!(client.recv().await, Packet::KeepAlive(_)));
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _server) = add_session(&proxy, "Alice").await;
        proxy.sweep(Instant::now() + Duration::from_secs(600));
        assert!(!alice.is_connected());
        assert!(proxy.sessions().is_empty());
        assert_eq!(alice.last_kick_reason().as_deref(), Some("Timed out"));
    }

    #[tokio::test]
    async fn shutdown_kicks_players_once() {
        let proxy = test_proxy(FakeSessionService::default());
        let (alice, _s1) = add_session(&proxy, "Alice").await;
        let (user, mut client) = viewer("Bob");
        proxy.register_player(&user).unwrap();
        redirect::attach(&user, &alice, proxy.grants(), Instant::now()).unwrap();
        client.recv().await;

        proxy.shutdown();
        proxy.shutdown();
        proxy.wait_for_shutdown().await;

        let Packet::Disconnect(kick) = client.recv().await else {
            panic!("expected disconnect");
        };
        assert_eq!(crate::text::plain_text(&kick.reason), SHUTDOWN_MESSAGE);
        assert!(client.closed().await);
        assert!(proxy.sessions().is_empty());
    }

    #[tokio::test]
    async fn status_counts_free_sessions() {
        let proxy = test_proxy(FakeSessionService::default());
        let (_alice, _s1) = add_session(&proxy, "Alice").await;
        let status = proxy.status();
        assert_eq!(status.players.online, 0);
        assert_eq!(status.players.max, 1);
        assert!(status.description.to_string().contains("1 free sessions"));
    }
}
