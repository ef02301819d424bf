//! Front-end connection handling: handshake, status, login, then the play
//! loop that forwards client packets to the attached backend session.

use std::sync::Arc;
use std::time::Instant;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use mc_relay_crypto::{server_hash, shared_secret_from_slice};
use mc_relay_proto::packets::{
    EncryptionRequest, EncryptionResponse, Handshake, LoginDisconnect, LoginStart, LoginSuccess,
    SetCompression, StatusPong, GAME_VERSION, PROTOCOL_VERSION,
};
use mc_relay_proto::{decode_packet, Direction, Packet, ProtocolPhase};

use crate::auth::Identity;
use crate::error::ProxyError;
use crate::net::{self, ConnectionHandle, FrameReader};
use crate::proxy::Proxy;
use crate::redirect;
use crate::text;
use crate::user::UserConnection;

const LEGACY_PING: u8 = 0xFE;
const LEGACY_KICK: u8 = 0xFF;
/// Advertised to pre-1.7 clients so they show the server as incompatible.
const LEGACY_PROTOCOL: i32 = 127;
const MAX_NAME_LEN: usize = 16;
const VERIFY_TOKEN_LEN: usize = 4;

/// Front-end connection states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    /// Waiting for the handshake.
    Handshake,
    /// Waiting for the status request.
    Status,
    /// Status sent, waiting for the ping.
    Ping,
    /// Waiting for login start.
    Username,
    /// Encryption request sent, waiting for the response.
    Encrypt {
        name: String,
        server_id: String,
        verify_token: [u8; VERIFY_TOKEN_LEN],
    },
    /// Encryption on; identity being verified and the player placed.
    Finished,
}

impl LoginState {
    fn phase(&self) -> ProtocolPhase {
        match self {
            LoginState::Handshake => ProtocolPhase::Handshake,
            LoginState::Status | LoginState::Ping => ProtocolPhase::Status,
            LoginState::Username | LoginState::Encrypt { .. } | LoginState::Finished => {
                ProtocolPhase::Login
            }
        }
    }

    /// Whether the client can be sent a login disconnect.
    fn can_kick(&self) -> bool {
        self.phase() == ProtocolPhase::Login
    }
}

enum Step {
    Continue,
    Close,
    Play(Arc<UserConnection>),
}

/// Drives one client connection through the pre-play states.
pub struct InitialHandler {
    proxy: Arc<Proxy>,
    handle: ConnectionHandle,
    peer: String,
    state: LoginState,
}

impl InitialHandler {
    pub fn new(proxy: Arc<Proxy>, handle: ConnectionHandle, peer: String) -> Self {
        Self {
            proxy,
            handle,
            peer,
            state: LoginState::Handshake,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    async fn run<R>(
        &mut self,
        reader: &mut FrameReader<R>,
    ) -> Result<Option<Arc<UserConnection>>, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        if reader.fill().await? == 0 {
            return Ok(None);
        }
        if reader.buffered().first() == Some(&LEGACY_PING) {
            debug!("legacy ping from {}", self.peer);
            self.handle.send_unframed(self.legacy_ping_reply());
            return Ok(None);
        }

        loop {
            let Some(frame) = reader.next_frame().await? else {
                return Ok(None);
            };
            let packet = decode_packet(Direction::Serverbound, self.state.phase(), frame)?;
            match self.handle_packet(packet, reader).await? {
                Step::Continue => {}
                Step::Close => return Ok(None),
                Step::Play(user) => return Ok(Some(user)),
            }
        }
    }

    async fn handle_packet<R>(
        &mut self,
        packet: Packet,
        reader: &mut FrameReader<R>,
    ) -> Result<Step, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        let state = std::mem::replace(&mut self.state, LoginState::Finished);
        match (state, packet) {
            (LoginState::Handshake, Packet::Handshake(handshake)) => {
                self.handle_handshake(&handshake)?;
                Ok(Step::Continue)
            }
            (LoginState::Status, Packet::StatusRequest(_)) => {
                self.state = LoginState::Ping;
                self.handle.send(self.proxy.status().to_packet()?);
                Ok(Step::Continue)
            }
            (LoginState::Ping, Packet::StatusPing(ping)) => {
                self.handle.send(StatusPong {
                    payload: ping.payload,
                });
                Ok(Step::Close)
            }
            (LoginState::Username, Packet::LoginStart(start)) => {
                self.handle_login_start(start)?;
                Ok(Step::Continue)
            }
            (
                LoginState::Encrypt {
                    name,
                    server_id,
                    verify_token,
                },
                Packet::EncryptionResponse(response),
            ) => {
                let identity = self
                    .handle_encryption(&name, &server_id, &verify_token, response, reader)
                    .await?;
                self.finish(identity, reader)
            }
            (state, packet) => {
                let message = format!("unexpected {:?} in state {:?}", packet.kind(), state);
                self.state = state;
                Err(ProxyError::ProtocolViolation(message))
            }
        }
    }

    fn handle_handshake(&mut self, handshake: &Handshake) -> Result<(), ProxyError> {
        debug!(
            "{} handshake for {}:{} (protocol {})",
            self.peer,
            handshake.clean_host(),
            handshake.server_port,
            handshake.protocol_version
        );
        match handshake.next_state {
            Handshake::NEXT_STATUS => {
                self.state = LoginState::Status;
                Ok(())
            }
            Handshake::NEXT_LOGIN => {
                self.state = LoginState::Username;
                if handshake.protocol_version != PROTOCOL_VERSION {
                    return Err(ProxyError::Kicked(format!("We only support {GAME_VERSION}")));
                }
                Ok(())
            }
            other => {
                self.state = LoginState::Handshake;
                Err(ProxyError::ProtocolViolation(format!("bad next state {other}")))
            }
        }
    }

    fn handle_login_start(&mut self, start: LoginStart) -> Result<(), ProxyError> {
        validate_name(&start.name).map_err(|reason| ProxyError::Kicked(reason.to_string()))?;

        let server_id = format!("{:x}", rand::random::<u32>());
        let verify_token: [u8; VERIFY_TOKEN_LEN] = rand::random();
        self.handle.send(EncryptionRequest {
            server_id: server_id.clone(),
            public_key: self.proxy.keys().public_key_der().to_vec(),
            verify_token: verify_token.to_vec(),
        });
        self.state = LoginState::Encrypt {
            name: start.name,
            server_id,
            verify_token,
        };
        Ok(())
    }

    async fn handle_encryption<R>(
        &mut self,
        name: &str,
        server_id: &str,
        verify_token: &[u8; VERIFY_TOKEN_LEN],
        response: EncryptionResponse,
        reader: &mut FrameReader<R>,
    ) -> Result<Identity, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        let keys = self.proxy.keys();
        let secret = shared_secret_from_slice(&keys.decrypt(&response.shared_secret)?)?;
        let token = keys.decrypt(&response.verify_token)?;
        if token != verify_token {
            return Err(ProxyError::ProtocolViolation("Invalid verify token".into()));
        }

        reader.decoder_mut().enable_encryption(&secret)?;
        self.handle.enable_encryption(secret);

        let hash = server_hash(server_id, &secret, keys.public_key_der());
        let profile = match self.proxy.session_service().has_joined(name, &hash).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return Err(ProxyError::Kicked("offline mode not supported".into())),
            Err(e) => {
                warn!("session check for {name} failed: {e}");
                return Err(ProxyError::Kicked("failed to authenticate".into()));
            }
        };
        Ok(profile.into_identity()?)
    }

    fn finish<R>(
        &mut self,
        identity: Identity,
        reader: &mut FrameReader<R>,
    ) -> Result<Step, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        if self.proxy.is_online(&identity.unique_id) {
            return Err(ProxyError::AlreadyConnected);
        }
        let Some(backend) = self.proxy.find_best_backend(&identity) else {
            return Err(ProxyError::Kicked("No client found".into()));
        };

        let threshold = self.proxy.config().proxy.compression_threshold;
        if threshold >= 0 {
            self.handle.send(SetCompression { threshold });
            self.handle.set_compression(threshold);
            reader.decoder_mut().set_compression(threshold);
        }
        self.handle.send(LoginSuccess {
            uuid: identity.unique_id.hyphenated().to_string(),
            username: identity.display_name.clone(),
        });

        let user = UserConnection::new(identity, self.handle.clone());
        if let Err(e) = self.proxy.register_player(&user) {
            user.disconnect(&e.reason());
            return Ok(Step::Close);
        }
        info!("{} logged in from {}", user.identity(), self.peer);

        if let Err(e) = redirect::attach(&user, &backend, self.proxy.grants(), Instant::now()) {
            warn!("could not place {}: {e}", user.identity());
            user.disconnect(&e.reason());
            self.proxy.player_disconnected(&user);
            return Ok(Step::Close);
        }
        Ok(Step::Play(user))
    }

    /// Close after a failure. Clients in login get told why.
    fn fail(&self, error: &ProxyError) {
        if self.state.can_kick() {
            info!("Disconnecting {}: {}", self.peer, error.reason());
            self.handle.send(LoginDisconnect {
                reason: text::component(&error.reason()),
            });
        } else {
            debug!("closing {}: {error}", self.peer);
        }
        self.handle.close();
    }

    fn legacy_ping_reply(&self) -> Bytes {
        let motd = self.proxy.config().proxy.motd.lines().next().unwrap_or_default();
        legacy_kick(&format!(
            "\u{a7}1\0{LEGACY_PROTOCOL}\0{GAME_VERSION}\0{motd}\0{}\0{}",
            self.proxy.player_count(),
            self.proxy.sessions().len()
        ))
    }
}

/// A pre-netty kick packet: 0xFF, UTF-16 length, UTF-16BE text.
fn legacy_kick(message: &str) -> Bytes {
    let units: Vec<u16> = message.encode_utf16().collect();
    let mut buf = BytesMut::with_capacity(3 + units.len() * 2);
    buf.put_u8(LEGACY_KICK);
    buf.put_u16(units.len() as u16);
    for unit in units {
        buf.put_u16(unit);
    }
    buf.freeze()
}

fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.len() > MAX_NAME_LEN {
        return Err("Username too long");
    }
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err("Username contains invalid characters");
    }
    Ok(())
}

/// Serve one client connection until it closes.
pub async fn handle_client<S>(proxy: Arc<Proxy>, stream: S, peer: String)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let (handle, rx) = ConnectionHandle::new(peer.clone());
    net::spawn_writer(write_half, rx, &handle);
    let mut reader = FrameReader::new(read_half);

    let mut handler = InitialHandler::new(proxy.clone(), handle.clone(), peer);
    let user = match handler.run(&mut reader).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            handle.close();
            return;
        }
        Err(e) => {
            handler.fail(&e);
            return;
        }
    };

    loop {
        let frame = match reader.next_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                debug!("{} read failed: {e}", user.identity());
                break;
            }
        };
        match decode_packet(Direction::Serverbound, ProtocolPhase::Play, frame.clone()) {
            Ok(packet) => user.handle_client_packet(frame, packet),
            Err(e) => {
                debug!("{} sent a malformed packet: {e}", user.identity());
                break;
            }
        }
    }
    user.disconnect("Disconnected");
    proxy.player_disconnected(&user);
}
