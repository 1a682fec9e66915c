/*!
# Switchboard

Switchboard is a **named-peer message relay**. Peers open a websocket to the
relay and identify themselves with a unique name. From then on they can
address JSON messages to one or more named peers, and the relay forwards each
message to every target that is currently connected. The relay itself takes
part in routing under the reserved name `server` and answers a small set of
control commands.

Delivery is best effort: a target name with no live registration is skipped
silently, and there is no acknowledgement or retry. What a single peer sends
to a single target arrives in the order it was sent.

# Usage

```bash
switchboard --config config
```

The config file carries the bind address under a `[network]` table. See
`config.toml` for the expected shape.

# Protocol

The wire protocol is documented in the [`networking`] module.

*/
pub mod error;
pub mod message;
pub mod networking;
pub mod time;

#[cfg(test)]
mod test_setup;

/// Error returned by the top-level run path. Component-level failures use
/// [`error::RelayError`]; anything that escapes to `main` is boxed.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;
