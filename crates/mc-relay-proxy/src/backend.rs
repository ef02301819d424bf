//! Outbound connection to a game server, logged in with one account.
//!
//! A session outlives the player watching it: the server keeps streaming
//! world state into the cache whether or not a viewer is attached, and a
//! viewer can be swapped in at any time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mc_relay_crypto::{encrypt_with_public_key, generate_shared_secret, server_hash};
use mc_relay_proto::packets::{
    ClientKeepAlive, EncryptionRequest, EncryptionResponse, Handshake, LoginStart,
    PlayerPositionAndLook, ResourcePackResult, ResourcePackSend, ResourcePackStatus,
    PROTOCOL_VERSION,
};
use mc_relay_proto::{decode_packet, encode_packet, Direction, Packet, ProtocolPhase};

use crate::accounts::split_host_port;
use crate::auth::{AuthError, AuthSession, Credentials, Identity, SessionService};
use crate::cache::{Viewer, WorldStateCache};
use crate::error::ProxyError;
use crate::net::{self, ConnectionHandle, FrameReader};
use crate::registry::SessionRegistry;
use crate::text;
use crate::user::UserConnection;

/// Shown to a viewer whose backend was closed from the console.
pub const CLOSED_BY_OPERATOR: &str = "The backend session was closed";

const REL_X: i8 = 0x01;
const REL_Y: i8 = 0x02;
const REL_Z: i8 = 0x04;
const REL_YAW: i8 = 0x08;
const REL_PITCH: i8 = 0x10;

/// Lifecycle notifications published by backend sessions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected {
        account: String,
    },
    /// The server ended a session that had reached play.
    Ended {
        account: String,
        reason: String,
        viewer: Option<Uuid>,
    },
}

/// Shared collaborators handed to every backend session.
#[derive(Clone)]
pub struct BackendServices {
    pub session_service: Arc<dyn SessionService>,
    pub registry: Option<Arc<SessionRegistry>>,
    pub events: broadcast::Sender<SessionEvent>,
    pub connect_timeout: Duration,
}

/// Where the account's player stands, as last reported by either side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Location {
    /// Absolute position packet for a viewer taking over this player.
    pub fn to_packet(self) -> PlayerPositionAndLook {
        PlayerPositionAndLook {
            x: self.x,
            y: self.y,
            z: self.z,
            yaw: self.yaw,
            pitch: self.pitch,
            flags: 0,
        }
    }

    fn apply(&mut self, packet: &PlayerPositionAndLook) {
        let pick = |flag: i8, current: f64, value: f64| {
            if packet.flags & flag != 0 {
                current + value
            } else {
                value
            }
        };
        self.x = pick(REL_X, self.x, packet.x);
        self.y = pick(REL_Y, self.y, packet.y);
        self.z = pick(REL_Z, self.z, packet.z);
        self.yaw = pick(REL_YAW, self.yaw as f64, packet.yaw as f64) as f32;
        self.pitch = pick(REL_PITCH, self.pitch as f64, packet.pitch as f64) as f32;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PlayerState {
    entity_id: Option<i32>,
    dimension: i32,
    location: Location,
}

/// Returns true if the packet should not reach the viewer.
pub type PacketPredicate = Box<dyn Fn(&Packet) -> bool + Send + Sync>;

/// Rewrites a packet on its way to the viewer. Returns true if it changed it.
pub type Interceptor = Box<dyn Fn(&mut Packet) -> bool + Send + Sync>;

struct BlockedPacketFilter {
    predicate: PacketPredicate,
    expires_at: Instant,
}

struct Link {
    phase: ProtocolPhase,
    handle: Option<ConnectionHandle>,
    task: Option<JoinHandle<()>>,
    pending: Option<oneshot::Sender<Result<(), ProxyError>>>,
    generation: u64,
    ended: bool,
}

struct Relay {
    cache: WorldStateCache,
    viewer: Option<Arc<UserConnection>>,
}

trait BackendStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> BackendStream for T {}

pub struct BackendSession {
    credentials: Credentials,
    services: BackendServices,
    link: Mutex<Link>,
    auth: Mutex<Option<AuthSession>>,
    address: Mutex<Option<String>>,
    // Held across observe+forward and across replay+attach, so a viewer never
    // sees a packet twice or misses one.
    relay: Mutex<Relay>,
    player: Mutex<PlayerState>,
    filters: Mutex<Vec<BlockedPacketFilter>>,
    interceptors: RwLock<Vec<Interceptor>>,
    last_seen: Mutex<Instant>,
    last_kick: Mutex<Option<String>>,
}

impl BackendSession {
    pub fn new(credentials: Credentials, services: BackendServices) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            services,
            link: Mutex::new(Link {
                phase: ProtocolPhase::Handshake,
                handle: None,
                task: None,
                pending: None,
                generation: 0,
                ended: false,
            }),
            auth: Mutex::new(None),
            address: Mutex::new(None),
            relay: Mutex::new(Relay {
                cache: WorldStateCache::new(),
                viewer: None,
            }),
            player: Mutex::new(PlayerState::default()),
            filters: Mutex::new(Vec::new()),
            interceptors: RwLock::new(Vec::new()),
            last_seen: Mutex::new(Instant::now()),
            last_kick: Mutex::new(None),
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn account(&self) -> &str {
        self.credentials.account()
    }

    /// Identity the account logged in as, once external login has run.
    pub fn identity(&self) -> Option<Identity> {
        self.auth.lock().as_ref().map(|auth| auth.identity.clone())
    }

    pub fn phase(&self) -> ProtocolPhase {
        self.link.lock().phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase() == ProtocolPhase::Play
    }

    pub fn address(&self) -> Option<String> {
        self.address.lock().clone()
    }

    pub fn location(&self) -> Location {
        self.player.lock().location
    }

    pub fn entity_id(&self) -> Option<i32> {
        self.player.lock().entity_id
    }

    pub fn dimension(&self) -> i32 {
        self.player.lock().dimension
    }

    pub fn last_kick_reason(&self) -> Option<String> {
        self.last_kick.lock().clone()
    }

    pub fn viewer(&self) -> Option<Arc<UserConnection>> {
        self.relay.lock().viewer.clone()
    }

    /// A viewer counts only while its connection is open.
    pub fn has_viewer(&self) -> bool {
        self.relay
            .lock()
            .viewer
            .as_ref()
            .is_some_and(|viewer| !viewer.is_closed())
    }

    /// Whether `user` could take over this session right now.
    pub fn can_accept(&self, user: &Arc<UserConnection>) -> bool {
        match &self.relay.lock().viewer {
            Some(current) => Arc::ptr_eq(current, user) || current.is_closed(),
            None => true,
        }
    }

    /// Resolve the credentials into an identity and access token.
    pub async fn perform_external_login(&self) -> Result<Identity, ProxyError> {
        let session = self
            .credentials
            .login(self.services.session_service.as_ref())
            .await?;
        let identity = session.identity.clone();
        *self.auth.lock() = Some(session);
        debug!("{} resolved to {identity}", self.account());
        Ok(identity)
    }

    /// Log in and connect to `address` (`host[:port]`), optionally through a
    /// SOCKS5 proxy. Resolves once the server accepted the login.
    pub async fn connect(
        self: &Arc<Self>,
        address: &str,
        socks_proxy: Option<&str>,
    ) -> Result<(), ProxyError> {
        let target = address.to_string();
        let socks = socks_proxy.map(str::to_string);
        let timeout = self.services.connect_timeout;
        self.start(address, async move {
            tokio::time::timeout(timeout, open_stream(&target, socks.as_deref()))
                .await
                .map_err(|_| ProxyError::BackendUnreachable(format!("{target}: timed out")))?
        })
        .await
    }

    /// Run a connection attempt over whatever `open` yields.
    pub(crate) async fn start<F, S>(self: &Arc<Self>, address: &str, open: F) -> Result<(), ProxyError>
    where
        F: Future<Output = Result<S, ProxyError>> + Send + 'static,
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.disconnect();

        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut link = self.link.lock();
            link.generation += 1;
            link.ended = false;
            link.pending = Some(tx);
            link.generation
        };
        *self.address.lock() = Some(address.to_string());

        let (host, port) = split_host_port(address);
        let session = Arc::clone(self);
        let task = tokio::spawn(async move {
            let opened = async {
                session.perform_external_login().await?;
                open.await
            }
            .await;
            match opened {
                Ok(stream) => session.drive(stream, host, port, generation).await,
                Err(e) => session.handle_server_disconnect(e, generation),
            }
        });
        {
            let mut link = self.link.lock();
            if link.generation == generation {
                link.task = Some(task);
            } else {
                task.abort();
            }
        }

        rx.await.unwrap_or(Err(ProxyError::ConnectionClosed))
    }

    async fn drive<S>(self: Arc<Self>, stream: S, host: String, port: u16, generation: u64)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (handle, rx) = ConnectionHandle::new(format!("{}@{host}:{port}", self.account()));
        net::spawn_writer(write_half, rx, &handle);
        {
            let mut link = self.link.lock();
            if link.generation != generation {
                handle.close();
                return;
            }
            link.handle = Some(handle.clone());
            link.phase = ProtocolPhase::Login;
        }
        *self.last_seen.lock() = Instant::now();

        let name = match self.identity() {
            Some(identity) => identity.display_name,
            None => self.account().to_string(),
        };
        handle.send(Handshake {
            protocol_version: PROTOCOL_VERSION,
            server_address: host,
            server_port: port,
            next_state: Handshake::NEXT_LOGIN,
        });
        handle.send(LoginStart { name });

        let mut reader = FrameReader::new(read_half);
        let error = loop {
            let frame = match reader.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break ProxyError::ConnectionClosed,
                Err(e) => break e,
            };
            *self.last_seen.lock() = Instant::now();

            let phase = self.phase();
            let packet = match decode_packet(Direction::Clientbound, phase, frame.clone()) {
                Ok(packet) => packet,
                Err(e) => break e.into(),
            };
            if phase == ProtocolPhase::Login {
                if let Err(e) = self
                    .handle_login_packet(packet, &mut reader, &handle, generation)
                    .await
                {
                    break e;
                }
                continue;
            }
            if let Packet::Disconnect(kick) = &packet {
                break ProxyError::Kicked(text::plain_text(&kick.reason));
            }
            self.on_inbound_packet(frame, packet);
        };
        self.handle_server_disconnect(error, generation);
    }

    async fn handle_login_packet<R>(
        self: &Arc<Self>,
        packet: Packet,
        reader: &mut FrameReader<R>,
        handle: &ConnectionHandle,
        generation: u64,
    ) -> Result<(), ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        match packet {
            Packet::EncryptionRequest(request) => {
                self.answer_encryption(&request, reader, handle).await?;
            }
            Packet::SetCompression(compression) => {
                handle.set_compression(compression.threshold);
                reader.decoder_mut().set_compression(compression.threshold);
            }
            Packet::LoginSuccess(success) => {
                if let Some(registry) = &self.services.registry {
                    registry.register(Arc::clone(self));
                }
                let pending = {
                    let mut link = self.link.lock();
                    if link.generation != generation {
                        return Err(ProxyError::ConnectionClosed);
                    }
                    link.phase = ProtocolPhase::Play;
                    link.pending.take()
                };
                info!(
                    "{} logged in to {} as {}",
                    self.account(),
                    handle.label(),
                    success.username
                );
                if let Some(tx) = pending {
                    let _ = tx.send(Ok(()));
                }
                let _ = self.services.events.send(SessionEvent::Connected {
                    account: self.account().to_string(),
                });
            }
            Packet::LoginDisconnect(kick) => {
                return Err(ProxyError::Kicked(text::plain_text(&kick.reason)));
            }
            other => {
                return Err(ProxyError::ProtocolViolation(format!(
                    "unexpected {:?} during login",
                    other.kind()
                )));
            }
        }
        Ok(())
    }

    async fn answer_encryption<R>(
        &self,
        request: &EncryptionRequest,
        reader: &mut FrameReader<R>,
        handle: &ConnectionHandle,
    ) -> Result<(), ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        let secret = generate_shared_secret();
        let auth = self.auth.lock().clone();
        let (token, profile) = match auth {
            Some(AuthSession {
                access_token: Some(token),
                identity,
            }) => (token, identity.unique_id),
            _ => {
                return Err(AuthError::Rejected(format!(
                    "{} is an offline account but the server is in online mode",
                    self.account()
                ))
                .into())
            }
        };
        let hash = server_hash(&request.server_id, &secret, &request.public_key);
        self.services
            .session_service
            .join(&token, &profile, &hash)
            .await?;

        handle.send(EncryptionResponse {
            shared_secret: encrypt_with_public_key(&request.public_key, &secret)?,
            verify_token: encrypt_with_public_key(&request.public_key, &request.verify_token)?,
        });
        handle.enable_encryption(secret);
        reader.decoder_mut().enable_encryption(&secret)?;
        Ok(())
    }

    /// Route one play packet from the server: answer what the proxy answers
    /// itself, update the world cache, and forward the rest to the viewer.
    pub fn on_inbound_packet(&self, raw: Bytes, packet: Packet) {
        match &packet {
            Packet::ResourcePackSend(offer) => {
                self.accept_resource_pack(offer);
                return;
            }
            Packet::KeepAlive(keep_alive) => {
                self.send(ClientKeepAlive { id: keep_alive.id });
                return;
            }
            _ => {}
        }

        let blocked = self.is_blocked(&packet, Instant::now());
        self.track(&packet);

        let mut relay = self.relay.lock();
        relay.cache.observe(&packet);
        if blocked {
            return;
        }
        let Some(viewer) = relay.viewer.clone() else {
            return;
        };
        if viewer.is_closed() {
            relay.viewer = None;
            return;
        }
        let body = self.intercept(packet).unwrap_or(raw);
        viewer.send_raw(body);
    }

    fn accept_resource_pack(&self, offer: &ResourcePackSend) {
        debug!("{} accepting resource pack {}", self.account(), offer.url);
        for result in [ResourcePackResult::Accepted, ResourcePackResult::SuccessfullyLoaded] {
            self.send(ResourcePackStatus {
                hash: offer.hash.clone(),
                result,
            });
        }
    }

    fn track(&self, packet: &Packet) {
        let mut player = self.player.lock();
        match packet {
            Packet::JoinGame(join) => {
                player.entity_id = Some(join.entity_id);
                player.dimension = join.dimension as i32;
            }
            Packet::Respawn(respawn) => player.dimension = respawn.dimension,
            Packet::PlayerPositionAndLook(position) => player.location.apply(position),
            _ => {}
        }
    }

    /// Track movement the viewer reports for this session's player.
    pub fn observe_client_packet(&self, packet: &Packet) {
        let mut player = self.player.lock();
        let location = &mut player.location;
        match packet {
            Packet::ClientPosition(p) => {
                location.x = p.x;
                location.y = p.y;
                location.z = p.z;
            }
            Packet::ClientLook(p) => {
                location.yaw = p.yaw;
                location.pitch = p.pitch;
            }
            Packet::ClientPositionLook(p) => {
                *location = Location {
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    yaw: p.yaw,
                    pitch: p.pitch,
                };
            }
            _ => {}
        }
    }

    fn is_blocked(&self, packet: &Packet, now: Instant) -> bool {
        let mut filters = self.filters.lock();
        filters.retain(|filter| filter.expires_at > now);
        filters.iter().any(|filter| (filter.predicate)(packet))
    }

    fn intercept(&self, mut packet: Packet) -> Option<Bytes> {
        let interceptors = self.interceptors.read();
        if interceptors.is_empty() {
            return None;
        }
        let mut rewritten = false;
        for interceptor in interceptors.iter() {
            rewritten |= interceptor(&mut packet);
        }
        rewritten.then(|| encode_packet(&packet))
    }

    /// Keep matching packets from the viewer until `deadline`. The cache
    /// still sees them.
    pub fn block_packet_until(&self, predicate: PacketPredicate, deadline: Instant) {
        self.filters.lock().push(BlockedPacketFilter {
            predicate,
            expires_at: deadline,
        });
    }

    pub fn add_interceptor(&self, interceptor: Interceptor) {
        self.interceptors.write().push(interceptor);
    }

    fn handle(&self) -> Option<ConnectionHandle> {
        self.link.lock().handle.clone()
    }

    pub fn send(&self, packet: impl Into<Packet>) -> bool {
        self.handle().is_some_and(|handle| handle.send(packet))
    }

    /// Forward an encoded serverbound packet.
    pub fn send_raw(&self, body: Bytes) -> bool {
        self.handle().is_some_and(|handle| handle.send_raw(body))
    }

    /// Probe the server. Only sent once in play.
    pub fn send_keep_alive(&self, id: i32) -> bool {
        self.is_connected() && self.send(ClientKeepAlive { id })
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.is_connected() && now.saturating_duration_since(*self.last_seen.lock()) > timeout
    }

    /// Replay cached state into `user` and make it the viewer. The relay lock
    /// is held throughout, so no live packet slips between replay and attach.
    /// Returns true if the replay put the viewer into a world.
    pub(crate) fn attach_viewer(
        &self,
        user: &Arc<UserConnection>,
        fresh: bool,
    ) -> Result<bool, ProxyError> {
        let mut relay = self.relay.lock();
        if let Some(current) = &relay.viewer {
            if !Arc::ptr_eq(current, user) && !current.is_closed() {
                return Err(ProxyError::BackendOccupied(self.account().to_string()));
            }
        }
        let mut viewer = Viewer::new(fresh);
        relay.cache.replay_to(&mut viewer);
        let joined = viewer.packets.iter().any(|packet| {
            matches!(packet, Packet::JoinGame(_) | Packet::Respawn(_))
        });
        for packet in viewer.packets {
            user.send(packet);
        }
        relay.viewer = Some(Arc::clone(user));
        Ok(joined)
    }

    /// Drop `user` as viewer, optionally erasing this session's world state
    /// from its client first.
    pub(crate) fn detach_viewer(&self, user: &Arc<UserConnection>, erase: bool) -> bool {
        let mut relay = self.relay.lock();
        match &relay.viewer {
            Some(current) if Arc::ptr_eq(current, user) => {}
            _ => return false,
        }
        if erase {
            let mut viewer = Viewer::new(false);
            relay.cache.detach_from(&mut viewer);
            for packet in viewer.packets {
                user.send(packet);
            }
        }
        relay.viewer = None;
        true
    }

    /// Close the session from this side. The viewer, if any, is kicked.
    pub fn disconnect(&self) {
        let (handle, task, pending) = {
            let mut link = self.link.lock();
            link.generation += 1;
            link.ended = true;
            link.phase = ProtocolPhase::Handshake;
            (link.handle.take(), link.task.take(), link.pending.take())
        };
        let was_open = handle.is_some() || task.is_some();
        if let Some(task) = task {
            task.abort();
        }
        if let Some(handle) = handle {
            handle.close();
        }
        if let Some(tx) = pending {
            let _ = tx.send(Err(ProxyError::ConnectionClosed));
        }
        let viewer = self.reset_relay();
        if let Some(viewer) = viewer {
            viewer.release_backend(self);
            viewer.disconnect(CLOSED_BY_OPERATOR);
        }
        self.deregister();
        if was_open {
            info!("Closed backend session {}", self.account());
        }
    }

    /// Treat a silent server as gone.
    pub fn time_out(&self) {
        let (generation, task) = {
            let mut link = self.link.lock();
            (link.generation, link.task.take())
        };
        self.handle_server_disconnect(ProxyError::Kicked("Timed out".into()), generation);
        if let Some(task) = task {
            task.abort();
        }
    }

    /// The server side ended. Runs once per connection attempt; stale
    /// attempts are ignored.
    pub fn handle_server_disconnect(&self, error: ProxyError, generation: u64) {
        let (handle, pending) = {
            let mut link = self.link.lock();
            if link.generation != generation || link.ended {
                return;
            }
            link.ended = true;
            link.phase = ProtocolPhase::Handshake;
            link.task = None;
            (link.handle.take(), link.pending.take())
        };
        if let Some(handle) = handle {
            handle.close();
        }
        let reason = error.reason();
        *self.last_kick.lock() = Some(reason.clone());

        if let Some(tx) = pending {
            warn!("{} failed to connect: {reason}", self.account());
            self.reset_relay();
            self.deregister();
            let _ = tx.send(Err(error));
            return;
        }

        info!("Backend {} disconnected: {reason}", self.account());
        let viewer = self.reset_relay();
        let viewer_id = viewer.as_ref().map(|viewer| viewer.unique_id());
        if let Some(viewer) = viewer {
            viewer.release_backend(self);
            viewer.disconnect(&reason);
        }
        self.deregister();
        let _ = self.services.events.send(SessionEvent::Ended {
            account: self.account().to_string(),
            reason,
            viewer: viewer_id,
        });
    }

    fn reset_relay(&self) -> Option<Arc<UserConnection>> {
        let mut relay = self.relay.lock();
        relay.cache.reset();
        relay.viewer.take()
    }

    fn deregister(&self) {
        if let Some(registry) = &self.services.registry {
            registry.deregister(self);
        }
    }
}

async fn open_stream(
    address: &str,
    socks_proxy: Option<&str>,
) -> Result<Box<dyn BackendStream>, ProxyError> {
    let (host, port) = split_host_port(address);
    match socks_proxy {
        Some(proxy) => {
            let stream = tokio_socks::tcp::Socks5Stream::connect(proxy, (host.as_str(), port))
                .await
                .map_err(|e| ProxyError::BackendUnreachable(format!("{address} via {proxy}: {e}")))?;
            Ok(Box::new(stream))
        }
        None => {
            let stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| ProxyError::BackendUnreachable(format!("{address}: {e}")))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::tests::FakeSessionService;
    use mc_relay_proto::packets::{
        Chat, DestroyEntities, JoinGame, KeepAlive, LoginSuccess, SetCompression, SpawnObject,
    };
    use mc_relay_proto::ProtoError;
    use tokio::io::DuplexStream;

    pub(crate) fn services(registry: Option<Arc<SessionRegistry>>) -> BackendServices {
        let (events, _) = broadcast::channel(16);
        BackendServices {
            session_service: Arc::new(FakeSessionService::default()),
            registry,
            events,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Server side of a backend connection.
    pub(crate) struct FakeServer {
        pub reader: FrameReader<tokio::io::ReadHalf<DuplexStream>>,
        pub handle: ConnectionHandle,
    }

    impl FakeServer {
        pub(crate) fn new(stream: DuplexStream) -> Self {
            let (read_half, write_half) = tokio::io::split(stream);
            let (handle, rx) = ConnectionHandle::new("server");
            net::spawn_writer(write_half, rx, &handle);
            Self {
                reader: FrameReader::new(read_half),
                handle,
            }
        }

        pub(crate) async fn recv(&mut self, phase: ProtocolPhase) -> Packet {
            let frame = self.reader.next_frame().await.unwrap().unwrap();
            decode_packet(Direction::Serverbound, phase, frame).unwrap()
        }

        /// Read the handshake and login start, then accept the login.
        pub(crate) async fn accept_login(&mut self, compression: Option<i32>) -> String {
            let Packet::Handshake(handshake) = self.recv(ProtocolPhase::Handshake).await else {
                panic!("expected handshake");
            };
            assert_eq!(handshake.protocol_version, PROTOCOL_VERSION);
            assert_eq!(handshake.next_state, Handshake::NEXT_LOGIN);
            let Packet::LoginStart(start) = self.recv(ProtocolPhase::Login).await else {
                panic!("expected login start");
            };
            if let Some(threshold) = compression {
                self.handle.send(SetCompression { threshold });
                self.handle.set_compression(threshold);
                self.reader.decoder_mut().set_compression(threshold);
            }
            self.handle.send(LoginSuccess {
                uuid: Identity::offline(&start.name).unique_id.hyphenated().to_string(),
                username: start.name.clone(),
            });
            start.name
        }
    }

    /// A backend session in play, wired to an in-memory server.
    pub(crate) async fn connected_session(
        name: &str,
        registry: Option<Arc<SessionRegistry>>,
    ) -> (Arc<BackendSession>, FakeServer) {
        let session = BackendSession::new(Credentials::parse(name), services(registry));
        let (client, server) = tokio::io::duplex(1 << 16);
        let mut server = FakeServer::new(server);
        let connect = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .start("play.example.net", async move { Ok(client) })
                    .await
            })
        };
        server.accept_login(Some(64)).await;
        connect.await.unwrap().unwrap();
        (session, server)
    }

    fn join_game(entity_id: i32) -> JoinGame {
        JoinGame {
            entity_id,
            gamemode: 0,
            dimension: 0,
            difficulty: 1,
            max_players: 20,
            level_type: "default".into(),
            reduced_debug_info: false,
        }
    }

    fn object(entity_id: i32) -> SpawnObject {
        SpawnObject {
            entity_id,
            kind: 2,
            x: 32,
            y: 64,
            z: 96,
            pitch: 0,
            yaw: 0,
            data: 0,
            velocity: None,
        }
    }

    fn inbound(session: &BackendSession, packet: impl Into<Packet>) {
        let packet = packet.into();
        session.on_inbound_packet(encode_packet(&packet), packet);
    }

    #[tokio::test]
    async fn login_reaches_play_and_registers() {
        let registry = Arc::new(SessionRegistry::new());
        let (session, _server) = connected_session("Alice", Some(registry.clone())).await;
        assert!(session.is_connected());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("alice").unwrap().account(), "Alice");
        assert_eq!(session.identity().unwrap(), Identity::offline("Alice"));
    }

    #[tokio::test]
    async fn login_kick_fails_the_connect() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let (client, server) = tokio::io::duplex(4096);
        let mut server = FakeServer::new(server);
        let connect = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.start("localhost", async move { Ok(client) }).await })
        };
        server.recv(ProtocolPhase::Handshake).await;
        server.recv(ProtocolPhase::Login).await;
        server.handle.send(mc_relay_proto::packets::LoginDisconnect {
            reason: text::component("You are banned"),
        });
        let err = connect.await.unwrap().unwrap_err();
        assert_eq!(err.reason(), "You are banned");
        assert!(!session.is_connected());
        assert_eq!(session.last_kick_reason().as_deref(), Some("You are banned"));
    }

    #[tokio::test]
    async fn unreachable_server_fails_the_connect() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let err = session
            .start::<_, DuplexStream>("localhost", async {
                Err(ProxyError::BackendUnreachable("refused".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::BackendUnreachable(_)));
    }

    #[tokio::test]
    async fn resource_pack_offer_is_answered_not_forwarded() {
        let (session, mut server) = connected_session("Alice", None).await;
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        session.attach_viewer(&viewer, true).unwrap();

        server.handle.send(ResourcePackSend {
            url: "http://example.net/pack.zip".into(),
            hash: "abc".into(),
        });
        server.handle.send(Chat {
            json: text::component("after"),
            position: 0,
        });

        for expected in [ResourcePackResult::Accepted, ResourcePackResult::SuccessfullyLoaded] {
            let Packet::ResourcePackStatus(status) = server.recv(ProtocolPhase::Play).await else {
                panic!("expected resource pack status");
            };
            assert_eq!(status.hash, "abc");
            assert_eq!(status.result, expected);
        }

        // The viewer's first packet is the chat that followed the offer.
        let Packet::Chat(chat) = client.recv().await else {
            panic!("expected chat");
        };
        assert_eq!(text::plain_text(&chat.json), "after");
    }

    #[tokio::test]
    async fn keep_alive_is_answered_locally() {
        let (session, mut server) = connected_session("Alice", None).await;
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        session.attach_viewer(&viewer, true).unwrap();

        server.handle.send(KeepAlive { id: 77 });
        server.handle.send(Chat {
            json: text::component("hi"),
            position: 0,
        });
        assert_eq!(
            server.recv(ProtocolPhase::Play).await,
            Packet::ClientKeepAlive(ClientKeepAlive { id: 77 })
        );
        assert!(matches!(client.recv().await, Packet::Chat(_)));
    }

    #[tokio::test]
    async fn blocked_packets_are_still_cached() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        session.attach_viewer(&viewer, true).unwrap();

        let now = Instant::now();
        session.block_packet_until(
            Box::new(|p| matches!(p, Packet::SpawnObject(_))),
            now + Duration::from_secs(60),
        );
        inbound(&session, object(5));
        inbound(&session, DestroyEntities { entity_ids: vec![] });

        assert!(matches!(client.recv().await, Packet::DestroyEntities(_)));
        let mut replay = Viewer::new(false);
        session.relay.lock().cache.replay_to(&mut replay);
        assert!(matches!(replay.packets[0], Packet::SpawnObject(SpawnObject { entity_id: 5, .. })));
    }

    #[test]
    fn expired_filter_never_matches() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let now = Instant::now();
        session.block_packet_until(Box::new(|_| true), now);
        assert!(!session.is_blocked(&Packet::from(object(1)), now));
        assert!(!session.is_blocked(&Packet::from(object(1)), now + Duration::from_secs(1)));
        assert!(session.filters.lock().is_empty());

        session.block_packet_until(Box::new(|_| true), now + Duration::from_secs(5));
        assert!(session.is_blocked(&Packet::from(object(1)), now));
    }

    #[tokio::test]
    async fn interceptor_rewrites_forwarded_packets() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        session.attach_viewer(&viewer, true).unwrap();
        session.add_interceptor(Box::new(|packet| match packet {
            Packet::Chat(chat) => {
                chat.json = text::component("[relay] hello");
                true
            }
            _ => false,
        }));
        inbound(
            &session,
            Chat {
                json: text::component("hello"),
                position: 0,
            },
        );
        let Packet::Chat(chat) = client.recv().await else {
            panic!("expected chat");
        };
        assert_eq!(text::plain_text(&chat.json), "[relay] hello");
    }

    #[test]
    fn position_tracking_honours_relative_flags() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        inbound(&session, join_game(42));
        inbound(
            &session,
            PlayerPositionAndLook {
                x: 10.0,
                y: 64.0,
                z: -5.0,
                yaw: 90.0,
                pitch: 0.0,
                flags: 0,
            },
        );
        inbound(
            &session,
            PlayerPositionAndLook {
                x: 1.0,
                y: 70.0,
                z: 1.0,
                yaw: 10.0,
                pitch: 5.0,
                flags: REL_X | REL_Z | REL_YAW,
            },
        );
        assert_eq!(session.entity_id(), Some(42));
        assert_eq!(
            session.location(),
            Location {
                x: 11.0,
                y: 70.0,
                z: -4.0,
                yaw: 100.0,
                pitch: 5.0,
            }
        );
    }

    #[tokio::test]
    async fn server_kick_disconnects_viewer_and_publishes() {
        let registry = Arc::new(SessionRegistry::new());
        let (session, server) = connected_session("Alice", Some(registry.clone())).await;
        let mut events = session.services.events.subscribe();
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        viewer.set_backend(Some(Arc::clone(&session)));
        session.attach_viewer(&viewer, true).unwrap();

        server.handle.send(mc_relay_proto::packets::Disconnect {
            reason: text::component("Server restarting"),
        });

        let Packet::Disconnect(kick) = client.recv().await else {
            panic!("expected disconnect");
        };
        assert_eq!(text::plain_text(&kick.reason), "Server restarting");
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Ended {
                account: "Alice".into(),
                reason: "Server restarting".into(),
                viewer: Some(viewer.unique_id()),
            }
        );
        assert!(registry.is_empty());
        assert!(viewer.backend().is_none());
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn operator_disconnect_kicks_viewer() {
        let (session, _server) = connected_session("Alice", None).await;
        let (viewer, mut client) = crate::user::tests::viewer("Bob");
        session.attach_viewer(&viewer, true).unwrap();
        session.disconnect();
        session.disconnect();

        let Packet::Disconnect(kick) = client.recv().await else {
            panic!("expected disconnect");
        };
        assert_eq!(text::plain_text(&kick.reason), CLOSED_BY_OPERATOR);
        assert!(client.closed().await);
        assert!(!session.has_viewer());
    }

    #[tokio::test]
    async fn second_viewer_is_refused() {
        let session = BackendSession::new(Credentials::parse("Alice"), services(None));
        let (first, _c1) = crate::user::tests::viewer("Bob");
        let (second, _c2) = crate::user::tests::viewer("Carol");
        session.attach_viewer(&first, true).unwrap();
        assert!(matches!(
            session.attach_viewer(&second, true),
            Err(ProxyError::BackendOccupied(_))
        ));
        assert!(session.detach_viewer(&first, false));
        assert!(session.attach_viewer(&second, true).is_ok());
    }

    #[test]
    fn malformed_frame_maps_to_proxy_error() {
        let err: ProxyError = ProtoError::BadFrameLength.into();
        assert!(matches!(err, ProxyError::MalformedFrame(_)));
    }
}
