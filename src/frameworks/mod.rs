// Frameworks layer: configuration, tracing bootstrap and server wiring.

pub mod config;
pub mod server;
