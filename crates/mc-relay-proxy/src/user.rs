//! A player connected to the proxy, viewing at most one backend session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use uuid::Uuid;

use mc_relay_proto::packets::{Chat, Disconnect};
use mc_relay_proto::Packet;

use crate::auth::Identity;
use crate::backend::BackendSession;
use crate::net::ConnectionHandle;
use crate::text;

pub struct UserConnection {
    identity: Identity,
    handle: ConnectionHandle,
    backend: Mutex<Option<Arc<BackendSession>>>,
    joined_world: AtomicBool,
    disconnected: AtomicBool,
}

impl UserConnection {
    pub fn new(identity: Identity, handle: ConnectionHandle) -> Arc<Self> {
        Arc::new(Self {
            identity,
            handle,
            backend: Mutex::new(None),
            joined_world: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn unique_id(&self) -> Uuid {
        self.identity.unique_id
    }

    pub fn name(&self) -> &str {
        &self.identity.display_name
    }

    pub fn send(&self, packet: impl Into<Packet>) -> bool {
        self.handle.send(packet)
    }

    pub fn send_raw(&self, body: Bytes) -> bool {
        self.handle.send_raw(body)
    }

    /// Chat line from the proxy itself.
    pub fn send_message(&self, message: &str) -> bool {
        self.send(Chat {
            json: text::component(message),
            position: 0,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn backend(&self) -> Option<Arc<BackendSession>> {
        self.backend.lock().clone()
    }

    /// Swap the backend pointer, returning the previous one.
    pub(crate) fn set_backend(
        &self,
        backend: Option<Arc<BackendSession>>,
    ) -> Option<Arc<BackendSession>> {
        std::mem::replace(&mut *self.backend.lock(), backend)
    }

    /// Clear the backend pointer if it still points at `backend`.
    pub(crate) fn release_backend(&self, backend: &BackendSession) {
        let mut current = self.backend.lock();
        if current
            .as_ref()
            .is_some_and(|b| std::ptr::eq(Arc::as_ptr(b), backend))
        {
            *current = None;
        }
    }

    /// A fresh client has never received a join game from us.
    pub(crate) fn is_fresh(&self) -> bool {
        !self.joined_world.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_joined(&self) {
        self.joined_world.store(true, Ordering::SeqCst);
    }

    /// Kick with `reason`. Only the first call sends anything.
    pub fn disconnect(&self, reason: &str) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }
        self.handle.send(Disconnect {
            reason: text::component(reason),
        });
        self.handle.close();
    }

    /// Route one play packet from the client to its backend.
    pub fn handle_client_packet(&self, raw: Bytes, packet: Packet) {
        // Keep-alives are a per-hop concern; the backend session answers its
        // own server.
        if let Packet::ClientKeepAlive(_) = packet {
            return;
        }
        let Some(backend) = self.backend() else {
            return;
        };
        backend.observe_client_packet(&packet);
        backend.send_raw(raw);
    }
}
