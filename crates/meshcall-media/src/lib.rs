//! Rate monitoring and voice-activity detection over inbound media (C1).

pub mod rate_monitor;
pub mod vad;

pub use rate_monitor::{RateMonitor, WINDOW_HIGH, WINDOW_LOW};
pub use vad::{VadConfig, VoiceActivityDetector};
