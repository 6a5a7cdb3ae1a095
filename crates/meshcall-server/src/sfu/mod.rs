//! SFU (Selective Forwarding Unit) for the group calling service.
//!
//! Each participant sends their voice/screen tracks to the SFU, which
//! forwards them to every other participant in the call without any
//! transcoding — only the simulcast RID a subscriber receives for a
//! screen share changes per-subscriber (§4.9).

mod bwe;
mod data_channel;
mod registry;
mod server;
mod session;
mod signaling;
mod signaling_lock;
mod simulcast;
mod track_forwarding;

pub use registry::Registry;
pub use server::SfuServer;
pub use session::{Session, SessionState, TrackAction};
pub use simulcast::SimulcastController;
