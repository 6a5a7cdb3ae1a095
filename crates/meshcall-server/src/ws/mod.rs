//! WebSocket control-plane surface (C10), §4.1, §6.

pub mod handler;
