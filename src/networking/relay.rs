use std::sync::Arc;

use config::Config;
use tokio::signal;
use tracing::{event, Level};

use super::commands::CommandTable;
use super::filters::ws_upgrade_route_filter;
use super::registry::{PeerRegistry, SharedRegistry};

/// The relay owns the peer registry and the server command table, and
/// exposes the warp route that accepts peer sockets. Both live exactly as
/// long as the relay; nothing here is process-global.
pub struct Relay {
    config_settings: Config,
    registry_lock: SharedRegistry,
    commands: Arc<CommandTable>,
}

/// Run the relay until ctrl-c. Shutdown drops the serve future, which tears
/// down every connection task and with it every peer transport.
pub async fn run(config_settings: Config) -> crate::Result<()> {
    let relay = Relay::new(config_settings);

    tokio::select! {
        res = relay.run_server() => {
            if let Err(err) = res {
                eprintln!("relay err {:?}", err);
            }
        },
        _ = signal::ctrl_c() => {
            event!(Level::INFO, "shutting down, closing peer connections");
        }
    }

    Ok(())
}

impl Relay {
    pub fn new(config_settings: Config) -> Relay {
        Relay {
            config_settings,
            registry_lock: PeerRegistry::shared(),
            commands: Arc::new(CommandTable::new()),
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry_lock.clone()
    }

    /// Runs warp::serve to listen for incoming connections
    pub async fn run_server(&self) -> crate::Result<()> {
        let host: [u8; 4] = self.config_settings.get::<[u8; 4]>("network.host")?;
        let port: u16 = self.config_settings.get::<u16>("network.port")?;

        let routes = ws_upgrade_route_filter(self.registry_lock.clone(), self.commands.clone());
        event!(
            Level::INFO,
            "relay listening on {}.{}.{}.{}:{}",
            host[0],
            host[1],
            host[2],
            host[3],
            port
        );
        warp::serve(routes).run((host, port)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networking::filters::ws_upgrade_route_filter;
    use serde_json::{json, Value};
    use std::time::Duration;
    use warp::ws::Message;
    use warp::{Filter, Reply};

    fn test_state() -> (SharedRegistry, Arc<CommandTable>) {
        (PeerRegistry::shared(), Arc::new(CommandTable::new()))
    }

    async fn connect<F, R>(socket_filter: F) -> warp::test::WsClient
    where
        F: Filter<Extract = (R,), Error = warp::Rejection> + Clone + Send + Sync + 'static,
        R: Reply + Send,
    {
        warp::test::ws()
            .path("/ws")
            .handshake(socket_filter)
            .await
            .expect("handshake")
    }

    async fn recv_json(ws_client: &mut warp::test::WsClient) -> Value {
        let msg = ws_client.recv().await.expect("frame");
        serde_json::from_str(msg.to_str().expect("text frame")).expect("json frame")
    }

    /// Drain the challenge pair and claim a name.
    async fn identify(ws_client: &mut warp::test::WsClient, name: &str) {
        recv_json(ws_client).await;
        recv_json(ws_client).await;
        let identify = json!({
            "type": "cmd",
            "target": ["server"],
            "cmd": "identify",
            "kwargs": { "name": name },
        });
        ws_client.send(Message::text(identify.to_string())).await;
    }

    /// Request/reply against the server's own command table. Frames from one
    /// connection are processed in order, so once the reply is back every
    /// frame sent before it has been handled too.
    async fn set_time_barrier(ws_client: &mut warp::test::WsClient) {
        let request = json!({ "type": "cmd", "target": ["server"], "cmd": "set_time" });
        ws_client.send(Message::text(request.to_string())).await;
        let reply = recv_json(ws_client).await;
        assert_eq!(reply["cmd"], "set_time");
    }

    async fn wait_for_peer_count(registry_lock: &SharedRegistry, count: usize) {
        for _ in 0..100 {
            if registry_lock.read().await.len() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} peers", count);
    }

    #[tokio::test]
    async fn test_handshake_challenge_order() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut ws_client = connect(socket_filter).await;

        let first = recv_json(&mut ws_client).await;
        assert_eq!(first["sender"], "server");
        assert_eq!(first["cmd"], "identify");

        let second = recv_json(&mut ws_client).await;
        assert_eq!(second["sender"], "server");
        assert_eq!(second["cmd"], "set_time");
        assert!(second["time"].is_f64());
    }

    #[tokio::test]
    async fn test_unidentified_peer_is_nagged() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock.clone(), commands);
        let mut ws_client = connect(socket_filter).await;

        recv_json(&mut ws_client).await;
        recv_json(&mut ws_client).await;

        let stray = json!({ "type": "data", "target": "X", "data": { "hello": 1 } });
        ws_client.send(Message::text(stray.to_string())).await;

        let nag = recv_json(&mut ws_client).await;
        assert_eq!(nag["sender"], "server");
        assert_eq!(nag["cmd"], "identify");
        assert!(registry_lock.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_identify_registers_peer() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock.clone(), commands);
        let mut ws_client = connect(socket_filter).await;

        identify(&mut ws_client, "A").await;
        set_time_barrier(&mut ws_client).await;

        let registry = registry_lock.read().await;
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("A").is_some());
    }

    #[tokio::test]
    async fn test_identify_twice_keeps_one_entry() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock.clone(), commands);
        let mut ws_client = connect(socket_filter).await;

        identify(&mut ws_client, "A").await;
        let again = json!({
            "type": "cmd",
            "target": ["server"],
            "cmd": "identify",
            "kwargs": { "name": "A" },
        });
        ws_client.send(Message::text(again.to_string())).await;
        set_time_barrier(&mut ws_client).await;

        let registry = registry_lock.read().await;
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("A").is_some());
    }

    #[tokio::test]
    async fn test_reidentify_moves_registration() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock.clone(), commands.clone());
        let mut ws_client = connect(socket_filter.clone()).await;

        identify(&mut ws_client, "A").await;
        let reidentify = json!({
            "type": "cmd",
            "target": ["server"],
            "cmd": "identify",
            "kwargs": { "name": "B" },
        });
        ws_client.send(Message::text(reidentify.to_string())).await;
        set_time_barrier(&mut ws_client).await;

        {
            let registry = registry_lock.read().await;
            assert_eq!(registry.len(), 1);
            assert!(registry.lookup("A").is_none());
            assert!(registry.lookup("B").is_some());
        }

        // the new name still reaches the same connection
        let mut other = connect(socket_filter).await;
        identify(&mut other, "C").await;
        let poke = json!({ "type": "data", "target": "B", "data": { "poke": true } });
        other.send(Message::text(poke.to_string())).await;

        let delivered = recv_json(&mut ws_client).await;
        assert_eq!(delivered["sender"], "C");
        assert_eq!(delivered["data"]["poke"], true);
    }

    #[tokio::test]
    async fn test_data_delivery_stamps_sender() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut alice = connect(socket_filter.clone()).await;
        let mut bob = connect(socket_filter).await;

        identify(&mut alice, "A").await;
        identify(&mut bob, "B").await;
        set_time_barrier(&mut bob).await;

        // the sender field is stamped from the connection, a spoof is
        // overwritten
        let message = json!({
            "sender": "mallory",
            "type": "data",
            "target": "B",
            "data": { "hello": 1 },
        });
        alice.send(Message::text(message.to_string())).await;

        let delivered = recv_json(&mut bob).await;
        assert_eq!(delivered["sender"], "A");
        assert_eq!(delivered["type"], "data");
        assert_eq!(delivered["data"]["hello"], 1);
    }

    #[tokio::test]
    async fn test_per_sender_ordering() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut alice = connect(socket_filter.clone()).await;
        let mut bob = connect(socket_filter).await;

        identify(&mut alice, "A").await;
        identify(&mut bob, "B").await;
        set_time_barrier(&mut bob).await;

        for seq in 0..3 {
            let message = json!({ "type": "data", "target": "B", "data": { "seq": seq } });
            alice.send(Message::text(message.to_string())).await;
        }

        for seq in 0..3 {
            let delivered = recv_json(&mut bob).await;
            assert_eq!(delivered["data"]["seq"], seq);
        }
    }

    #[tokio::test]
    async fn test_lossy_broadcast_skips_unknown_targets() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut alice = connect(socket_filter.clone()).await;
        let mut xavier = connect(socket_filter).await;

        identify(&mut alice, "A").await;
        identify(&mut xavier, "X").await;
        set_time_barrier(&mut xavier).await;

        let message = json!({
            "type": "data",
            "target": ["X", "unknown_peer"],
            "data": { "fan": "out" },
        });
        alice.send(Message::text(message.to_string())).await;

        let delivered = recv_json(&mut xavier).await;
        assert_eq!(delivered["sender"], "A");
        assert_eq!(delivered["data"]["fan"], "out");

        // and the relay is still serving the sender
        set_time_barrier(&mut alice).await;
    }

    #[tokio::test]
    async fn test_disconnect_cleans_registry() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock.clone(), commands);
        let mut alice = connect(socket_filter.clone()).await;
        let mut bob = connect(socket_filter).await;

        identify(&mut alice, "A").await;
        identify(&mut bob, "B").await;
        set_time_barrier(&mut bob).await;
        wait_for_peer_count(&registry_lock, 2).await;

        drop(bob);
        wait_for_peer_count(&registry_lock, 1).await;
        assert!(registry_lock.read().await.lookup("B").is_none());

        // routing to the departed peer is silently dropped and the relay
        // keeps serving
        let message = json!({ "type": "data", "target": "B", "data": { "late": 1 } });
        alice.send(Message::text(message.to_string())).await;
        set_time_barrier(&mut alice).await;
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_fatal() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut ws_client = connect(socket_filter).await;

        identify(&mut ws_client, "A").await;
        let unknown = json!({ "type": "cmd", "target": ["server"], "cmd": "frobnicate" });
        ws_client.send(Message::text(unknown.to_string())).await;

        // no reply for the unknown command; the loop keeps going
        set_time_barrier(&mut ws_client).await;
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped_not_fatal() {
        let (registry_lock, commands) = test_state();
        let socket_filter = ws_upgrade_route_filter(registry_lock, commands);
        let mut ws_client = connect(socket_filter).await;

        identify(&mut ws_client, "A").await;
        ws_client.send(Message::text("this is not json")).await;
        ws_client
            .send(Message::text(r#"{"sender":"A"}"#))
            .await;

        set_time_barrier(&mut ws_client).await;
    }

    #[tokio::test]
    async fn test_relay_starts_with_empty_registry() {
        let relay = Relay::new(Config::default());
        assert!(relay.registry().read().await.is_empty());
    }
}
