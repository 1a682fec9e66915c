use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{event, Level};
use uuid::Uuid;
use warp::ws::{Message as WsMessage, WebSocket};

use crate::message::{Message, MessageKind, SERVER_NAME};

use super::commands::CommandTable;
use super::connection::Connection;
use super::registry::SharedRegistry;

/// Runs for the lifetime of one peer socket. Spawned by the upgrade handler;
/// ends when the transport closes, at which point the peer is gone from the
/// registry.
pub async fn peer_connection(
    ws: WebSocket,
    id: Uuid,
    registry_lock: SharedRegistry,
    commands: Arc<CommandTable>,
) {
    let (peer_ws_sender, mut peer_ws_rcv) = ws.split();
    let (peer_sender, peer_rcv) = mpsc::unbounded_channel();
    let peer_rcv = UnboundedReceiverStream::new(peer_rcv);
    tokio::task::spawn(peer_rcv.forward(peer_ws_sender).map(|result| {
        if let Err(e) = result {
            event!(Level::ERROR, "error sending websocket msg: {}", e);
        }
    }));

    let mut connection = Connection::new(id, peer_sender);
    event!(Level::INFO, "{} connected", connection.id());

    if let Err(err) = connection.ask_for_identification() {
        event!(Level::ERROR, "error challenging {}: {}", connection.id(), err);
    }

    while let Some(result) = peer_ws_rcv.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                event!(
                    Level::ERROR,
                    "error receiving ws message from {}: {}",
                    connection.name(),
                    e
                );
                break;
            }
        };
        if msg.is_close() {
            break;
        }
        peer_msg(&mut connection, msg, &registry_lock, &commands).await;
    }

    connection.close();
    {
        let mut registry = registry_lock.write().await;
        registry.unregister_by_connection(connection.id());
    }
    event!(Level::INFO, "{} disconnected", connection.name());
}

/// Handle one inbound frame: challenge the unidentified, apply identify,
/// answer server commands, forward the rest.
async fn peer_msg(
    connection: &mut Connection,
    msg: WsMessage,
    registry_lock: &SharedRegistry,
    commands: &CommandTable,
) {
    let text = match msg.to_str() {
        Ok(text) => text,
        Err(_) => {
            event!(
                Level::ERROR,
                "non-text frame from {}, dropping",
                connection.name()
            );
            return;
        }
    };

    // one bad frame never closes the connection
    let mut message = match Message::decode(text) {
        Ok(message) => message,
        Err(err) => {
            event!(
                Level::ERROR,
                "dropping frame from {}: {}",
                connection.name(),
                err
            );
            return;
        }
    };

    let is_identify = message.is_command("identify");

    if !connection.is_identified() && !is_identify {
        // nag until the peer identifies; the frame itself is discarded
        if let Err(err) = connection.send(&Message::identify_challenge()) {
            event!(Level::ERROR, "error re-challenging {}: {}", connection.id(), err);
        }
        return;
    }

    if is_identify {
        handle_identify(connection, &message, registry_lock).await;
        return;
    }

    // sender is stamped from the connection, never taken from the frame
    message.sender = Some(String::from(connection.name()));

    let target = match message.target.clone() {
        Some(target) => target,
        None => return,
    };

    if target.contains(SERVER_NAME) && message.kind == Some(MessageKind::Cmd) {
        match commands.dispatch(connection, &message) {
            Ok(Some(reply)) => {
                if let Err(err) = connection.send(&reply) {
                    event!(Level::ERROR, "error replying to {}: {}", connection.name(), err);
                }
            }
            Ok(None) => {}
            Err(err) => {
                event!(Level::ERROR, "command from {} failed: {}", connection.name(), err);
            }
        }
        return;
    }

    // unresolved targets were already skipped; a send failure means the
    // target is on its way out
    let handles = {
        let registry = registry_lock.read().await;
        registry.resolve_targets(&target)
    };
    for handle in handles {
        if let Err(err) = handle.send(&message) {
            event!(Level::ERROR, "error forwarding to {}: {}", handle.name, err);
        }
    }
}

/// Apply an identify command: flip the state machine, move the registration
/// when the name changed.
async fn handle_identify(
    connection: &mut Connection,
    message: &Message,
    registry_lock: &SharedRegistry,
) {
    let name = match message.identify_name() {
        Some(name) => String::from(name),
        None => {
            event!(
                Level::ERROR,
                "identify from {} without a name, re-challenging",
                connection.id()
            );
            if let Err(err) = connection.send(&Message::identify_challenge()) {
                event!(Level::ERROR, "error re-challenging {}: {}", connection.id(), err);
            }
            return;
        }
    };

    let previous = connection.identify(&name);
    let registered;
    {
        let mut registry = registry_lock.write().await;
        if let Some(previous) = previous {
            registry.unregister(&previous);
        }
        registry.register(&name, connection.handle());
        registered = registry.len();
    }
    event!(
        Level::INFO,
        "{} identified as {} ({} peers registered)",
        connection.id(),
        name,
        registered
    );
}
