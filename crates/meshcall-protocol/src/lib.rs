//! Wire protocol shared between the meshcall SFU and its integrators.
//!
//! Three layers live here, outside-in:
//! - [`ws`]: the WebSocket envelope an integrator speaks to the control plane.
//! - [`rtc`]: the `rtc` message carried inside that envelope (ICE/SDP/mute/screen).
//! - [`dc`]: the binary frame format spoken over the data channel once it opens.

pub mod dc;
pub mod ids;
pub mod rtc;
pub mod ws;

pub use dc::{DataChannelError, MessageType};
pub use ids::{is_valid_track_id, TrackType};
pub use rtc::{Message as RtcMessage, RtcMessageType};
pub use ws::{ClientEnvelope, ServerEnvelope};
