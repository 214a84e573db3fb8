// Interface adapters: wire protocol, HTTP controls and WebSocket handling.

pub mod http;
pub mod net;
pub mod protocol;
pub mod state;
