//! Titia API Library Crate
//!
//! This library contains all the server-side logic for the Titia tutoring
//! service: configuration, application state, REST handlers, the WebSocket
//! session shell, and routing. The `api` binary is a thin wrapper around it.

pub mod audio_utils;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
