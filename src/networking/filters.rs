use std::convert::Infallible;
use std::sync::Arc;

use warp::{Filter, Reply};

use super::commands::CommandTable;
use super::handlers::ws_upgrade_handler;
use super::registry::SharedRegistry;

/// websocket upgrade filter, the relay's only route.
pub fn ws_upgrade_route_filter(
    registry_lock: SharedRegistry,
    commands: Arc<CommandTable>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::path("ws")
        .and(warp::ws())
        .and(with_registry(registry_lock))
        .and(with_commands(commands))
        .and_then(ws_upgrade_handler)
}

/// inject registry lock
fn with_registry(
    registry_lock: SharedRegistry,
) -> impl Filter<Extract = (SharedRegistry,), Error = Infallible> + Clone {
    warp::any().map(move || registry_lock.clone())
}

/// inject command table
fn with_commands(
    commands: Arc<CommandTable>,
) -> impl Filter<Extract = (Arc<CommandTable>,), Error = Infallible> + Clone {
    warp::any().map(move || commands.clone())
}
