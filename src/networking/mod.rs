/*!

# Relay Wire Protocol

## Introduction

Switchboard speaks JSON text frames over websockets. One frame is one JSON
object; frames are never batched or split.

This gives full-duplex communication between the relay and every peer, which
matters because the relay pushes frames (challenges, forwarded traffic) to
peers that never asked for them.

## The envelope

```json
{"sender": "<name>", "target": "<name>" , "type": "cmd", "cmd": "<name>", "kwargs": {}, "data": {}}
```

- `sender`: the peer name the frame came from, or `server`. Inbound frames
  may omit it; the relay stamps the sending connection's current name onto
  every frame before routing, so a peer cannot speak under another peer's
  name.
- `target`: a single name or a list of names. The reserved name `server`
  addresses the relay itself.
- `type`: `cmd` for control commands, `data` for opaque payloads.
- `cmd` + `kwargs`: command name and arguments, for `cmd` frames.
- `data`: arbitrary JSON, for `data` frames.

Fields the relay does not recognize are forwarded to the targets untouched.

## Identification

The relay sends two frames on every fresh connection, before anything else:

```json
{"sender": "server", "cmd": "identify"}
{"sender": "server", "cmd": "set_time", "time": 1690000000.0}
```

A peer identifies with:

```json
{"type": "cmd", "target": ["server"], "cmd": "identify", "kwargs": {"name": "alice"}}
```

Identifying twice with the same name is a no-op. Identifying with a new name
moves the registration and releases the old name. If two connections claim
the same name, the last registration wins.

Until a peer identifies, every non-identify frame it sends is answered with
another `identify` challenge and otherwise dropped.

## Server commands

Frames whose `target` contains `server` and whose `type` is `cmd` are
consumed by the relay:

- `identify`: set the connection's peer name.
- `set_time`: ask for a fresh time sync frame.

An unknown command is logged and ignored. There is no error-response frame;
failures are visible only in the relay's logs.

## Routing

All other identified traffic is forwarded verbatim to every target name with
a live registration. Unresolved names are skipped silently. Delivery per
resolved target is at most once, and frames from one sender to one target
arrive in the order they were sent.

*/

pub mod commands;
pub mod connection;
pub mod filters;
pub mod handlers;
pub mod registry;
pub mod relay;
pub mod socket;
