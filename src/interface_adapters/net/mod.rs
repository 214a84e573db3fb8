// Network adapter modules split by streaming client sockets vs HTTP control routes.

pub mod client;
pub mod control;

pub use client::{spawn_update_serializer, ws_handler};
pub use control::{
    bind_bike_handler, input_handler, session_status_handler, start_countdown_handler,
    start_recording_handler, start_replay_handler, stop_race_handler, stop_recording_handler,
    stop_replay_handler,
};
