//! Moving a player between backend sessions.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::auth::Identity;
use crate::backend::BackendSession;
use crate::error::ProxyError;
use crate::grants::ReconnectGrants;
use crate::user::UserConnection;

/// Make `backend` the session `frontend` is watching.
///
/// The previous session's world is erased from the client first, then the
/// new session's cached state is replayed and the player is placed at the
/// account's last known location. Switching away from an account grants the
/// player the right to come back to it.
pub fn attach(
    frontend: &Arc<UserConnection>,
    backend: &Arc<BackendSession>,
    grants: &ReconnectGrants,
    now: Instant,
) -> Result<(), ProxyError> {
    if !backend.can_accept(frontend) {
        return Err(ProxyError::BackendOccupied(backend.account().to_string()));
    }

    let previous = frontend.set_backend(None);
    if let Some(previous) = &previous {
        previous.detach_viewer(frontend, true);
    }

    let joined = match backend.attach_viewer(frontend, frontend.is_fresh()) {
        Ok(joined) => joined,
        Err(e) => {
            frontend.disconnect(&e.reason());
            return Err(e);
        }
    };
    frontend.set_backend(Some(Arc::clone(backend)));
    if joined {
        frontend.mark_joined();
    }
    frontend.send(backend.location().to_packet());

    match previous {
        Some(previous) if previous.credentials() != backend.credentials() => {
            grants.grant(frontend.unique_id(), previous.account(), now);
            info!(
                "{} switched from {} to {}",
                frontend.identity(),
                previous.account(),
                backend.account()
            );
        }
        Some(_) => {}
        None => info!("{} is now viewing {}", frontend.identity(), backend.account()),
    }
    Ok(())
}

/// Pick the session a newly connected player should watch: the one their
/// reconnect grant points at if it is still free, otherwise the first free
/// session nobody else holds a grant for.
pub fn find_best_backend(
    identity: &Identity,
    sessions: &[Arc<BackendSession>],
    grants: &ReconnectGrants,
    now: Instant,
) -> Option<Arc<BackendSession>> {
    let available = |session: &&Arc<BackendSession>| session.is_connected() && !session.has_viewer();

    if let Some(grant) = grants.take(&identity.unique_id, now) {
        let granted = sessions
            .iter()
            .filter(available)
            .find(|session| session.account() == grant.backend_account);
        if let Some(session) = granted {
            return Some(Arc::clone(session));
        }
    }

    sessions
        .iter()
        .filter(available)
        .find(|session| !grants.is_reserved(session.account(), Some(&identity.unique_id), now))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tests::{connected_session, services};
    use crate::auth::Credentials;
    use crate::user::tests::viewer;
    use mc_relay_proto::encode_packet;
    use mc_relay_proto::packets::{PlayerPositionAndLook, SpawnObject};
    use mc_relay_proto::Packet;
    use std::time::Duration;

    fn object(entity_id: i32) -> Packet {
        Packet::from(SpawnObject {
            entity_id,
            kind: 1,
            x: 0,
            y: 0,
            z: 0,
            pitch: 0,
            yaw: 0,
            data: 0,
            velocity: None,
        })
    }

    fn feed(session: &BackendSession, packet: Packet) {
        session.on_inbound_packet(encode_packet(&packet), packet);
    }

    #[tokio::test]
    async fn attach_replays_then_positions() {
        let (session, _server) = connected_session("Alice", None).await;
        feed(&session, object(5));
        feed(&session, object(9));
        let grants = ReconnectGrants::new(Duration::from_secs(60));
        let (user, mut client) = viewer("Bob");

        attach(&user, &session, &grants, Instant::now()).unwrap();

        assert!(matches!(client.recv().await, Packet::SpawnObject(SpawnObject { entity_id: 5, .. })));
        assert!(matches!(client.recv().await, Packet::SpawnObject(SpawnObject { entity_id: 9, .. })));
        assert!(matches!(client.recv().await, Packet::PlayerPositionAndLook(PlayerPositionAndLook { flags: 0, .. })));
        assert!(Arc::ptr_eq(&user.backend().unwrap(), &session));
        assert!(grants.is_empty());
    }

    #[tokio::test]
    async fn switching_erases_old_world_and_grants_return() {
        let (first, _s1) = connected_session("Alice", None).await;
        let (second, _s2) = connected_session("Carol", None).await;
        feed(&first, object(5));
        let grants = ReconnectGrants::new(Duration::from_secs(60));
        let (user, mut client) = viewer("Bob");
        let t0 = Instant::now();

        attach(&user, &first, &grants, t0).unwrap();
        client.recv().await;
        client.recv().await;

        attach(&user, &second, &grants, t0).unwrap();
        let Packet::DestroyEntities(destroy) = client.recv().await else {
            panic!("expected destroy");
        };
        assert_eq!(destroy.entity_ids, vec![5]);
        assert!(matches!(client.recv().await, Packet::PlayerPositionAndLook(_)));

        assert!(!first.has_viewer());
        assert!(second.has_viewer());
        let grant = grants.peek(&user.unique_id(), t0 + Duration::from_secs(59)).unwrap();
        assert_eq!(grant.backend_account, "Alice");
        assert!(grants.peek(&user.unique_id(), t0 + Duration::from_secs(61)).is_none());
    }

    #[tokio::test]
    async fn occupied_backend_is_refused() {
        let (session, _server) = connected_session("Alice", None).await;
        let grants = ReconnectGrants::new(Duration::from_secs(60));
        let (first, _c1) = viewer("Bob");
        let (second, _c2) = viewer("Carol");
        attach(&first, &session, &grants, Instant::now()).unwrap();
        assert!(matches!(
            attach(&second, &session, &grants, Instant::now()),
            Err(ProxyError::BackendOccupied(_))
        ));
        assert!(second.backend().is_none());
    }

    #[tokio::test]
    async fn best_backend_honours_grants() {
        let (alice, _s1) = connected_session("Alice", None).await;
        let (carol, _s2) = connected_session("Carol", None).await;
        let idle = crate::backend::BackendSession::new(Credentials::parse("Dave"), services(None));
        let sessions = vec![idle, alice.clone(), carol.clone()];
        let grants = ReconnectGrants::new(Duration::from_secs(60));
        let now = Instant::now();
        let bob = Identity::offline("Bob");
        let eve = Identity::offline("Eve");

        grants.grant(bob.unique_id, "Carol", now);
        // Carol is held for Bob, so Eve gets Alice.
        let pick = find_best_backend(&eve, &sessions, &grants, now).unwrap();
        assert_eq!(pick.account(), "Alice");
        let pick = find_best_backend(&bob, &sessions, &grants, now).unwrap();
        assert_eq!(pick.account(), "Carol");
        assert!(grants.is_empty());
    }

    #[test]
    fn no_backend_when_none_connected() {
        let idle = crate::backend::BackendSession::new(Credentials::parse("Dave"), services(None));
        let grants = ReconnectGrants::new(Duration::from_secs(60));
        assert!(find_best_backend(&Identity::offline("Bob"), &[idle], &grants, Instant::now()).is_none());
    }
}
