use std::collections::HashMap;

use crate::error::RelayError;
use crate::message::Message;
use crate::time::create_epoch_seconds;

use super::connection::Connection;

/// A server command handler composes an optional reply for the requesting
/// connection. Handlers never touch the transport; the receive loop sends
/// the reply through the connection's outbound channel.
pub type CommandHandler = fn(&Connection, &Message) -> Option<Message>;

/// The commands the relay answers when addressed as `server`.
///
/// `identify` is not in the table: it mutates connection state and the
/// registry, so the receive loop handles it before dispatch.
pub struct CommandTable {
    handlers: HashMap<&'static str, CommandHandler>,
}

impl CommandTable {
    pub fn new() -> CommandTable {
        let mut table = CommandTable {
            handlers: HashMap::new(),
        };
        table.insert("set_time", set_time_command);
        table
    }

    pub fn insert(&mut self, name: &'static str, handler: CommandHandler) {
        self.handlers.insert(name, handler);
    }

    /// Dispatch one server-addressed command. Unknown names come back as
    /// [`RelayError::UnknownCommand`]; the caller logs and carries on.
    pub fn dispatch(
        &self,
        connection: &Connection,
        message: &Message,
    ) -> std::result::Result<Option<Message>, RelayError> {
        let name = match message.command_name() {
            Some(name) => name,
            None => {
                return Err(RelayError::MalformedMessage(String::from(
                    "cmd frame without a `cmd` field",
                )))
            }
        };
        match self.handlers.get(name) {
            Some(handler) => Ok(handler(connection, message)),
            None => Err(RelayError::UnknownCommand(String::from(name))),
        }
    }
}

/// Re-send the time sync that accompanies the identify challenge.
fn set_time_command(_connection: &Connection, _message: &Message) -> Option<Message> {
    Some(Message::set_time(create_epoch_seconds()))
}
