//! WebSocket Session Management
//!
//! This module contains the core logic for running tutoring sessions over
//! WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Adapts a WebSocket connection to the shell's message channels.
//! - `shell`: Runs the session event loop and executes state-machine commands.
//! - `device`: Delivers scheduled speech to the client as audio frames.

pub mod device;
pub mod protocol;
pub mod session;
pub mod shell;

pub use session::ws_handler;
