use tokio::sync::mpsc;
use uuid::Uuid;
use warp::ws::Message as WsMessage;

use crate::error::RelayError;
use crate::message::{Message, UNKNOWN_NAME};
use crate::time::create_epoch_seconds;

/// Lifecycle of one peer connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unidentified,
    Identified,
    Closed,
}

/// One live transport channel to a peer.
///
/// The receive loop in [`super::socket`] owns the `Connection` exclusively;
/// every other task that wants to reach this peer goes through a
/// [`ConnectionHandle`] taken from the registry. Sends are enqueued on the
/// connection's unbounded outbound channel and drained by a dedicated writer
/// task, so nothing but that task ever touches the socket.
#[derive(Debug)]
pub struct Connection {
    id: Uuid,
    name: String,
    state: ConnectionState,
    sender: mpsc::UnboundedSender<std::result::Result<WsMessage, warp::Error>>,
}

impl Connection {
    pub fn new(
        id: Uuid,
        sender: mpsc::UnboundedSender<std::result::Result<WsMessage, warp::Error>>,
    ) -> Connection {
        Connection {
            id,
            name: String::from(UNKNOWN_NAME),
            state: ConnectionState::Unidentified,
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_identified(&self) -> bool {
        self.state == ConnectionState::Identified
    }

    /// Apply an identify command. Returns the name this connection was
    /// registered under before, when the registration has to move; `None`
    /// for a first identify or a repeat of the current name.
    pub fn identify(&mut self, name: &str) -> Option<String> {
        if self.state == ConnectionState::Identified && self.name == name {
            return None;
        }
        let previous = match self.state {
            ConnectionState::Identified => Some(self.name.clone()),
            _ => None,
        };
        self.name = String::from(name);
        self.state = ConnectionState::Identified;
        previous
    }

    /// Transport is gone; no transition out of here.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Enqueue one frame for the writer task.
    pub fn send(&self, message: &Message) -> std::result::Result<(), RelayError> {
        let text = message.encode()?;
        self.sender
            .send(Ok(WsMessage::text(text)))
            .map_err(|err| RelayError::Transport(err.to_string()))
    }

    /// The challenge pair every fresh connection receives: an identify
    /// request followed by a time sync.
    pub fn ask_for_identification(&self) -> std::result::Result<(), RelayError> {
        self.send(&Message::identify_challenge())?;
        self.send(&Message::set_time(create_epoch_seconds()))
    }

    /// Snapshot of the send side, the value type the registry stores.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            name: self.name.clone(),
            sender: self.sender.clone(),
        }
    }
}

/// Cheap clone of a connection's send side. The name is a snapshot taken at
/// registration time.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub name: String,
    sender: mpsc::UnboundedSender<std::result::Result<WsMessage, warp::Error>>,
}

impl ConnectionHandle {
    pub fn send(&self, message: &Message) -> std::result::Result<(), RelayError> {
        let text = message.encode()?;
        self.sender
            .send(Ok(WsMessage::text(text)))
            .map_err(|err| RelayError::Transport(err.to_string()))
    }
}
