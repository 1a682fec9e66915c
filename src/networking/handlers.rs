use std::sync::Arc;

use tracing::{event, Level};
use uuid::Uuid;
use warp::{Rejection, Reply};

use super::commands::CommandTable;
use super::registry::SharedRegistry;
use super::socket;

/// Accept a websocket upgrade and hand the socket to its receive loop.
pub async fn ws_upgrade_handler(
    ws: warp::ws::Ws,
    registry_lock: SharedRegistry,
    commands: Arc<CommandTable>,
) -> std::result::Result<impl Reply, Rejection> {
    let id = Uuid::new_v4();
    event!(Level::DEBUG, "ws upgrade, connection id {}", id);
    Ok(ws.on_upgrade(move |socket| socket::peer_connection(socket, id, registry_lock, commands)))
}
