//! Process-wide build metadata (§3 `BuildInfo`), populated once at startup
//! from `env!` and never mutated again — the one intentional global the
//! design notes call out (§9).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub build_hash: String,
    pub build_date: String,
    pub build_version: String,
    pub rust_version: String,
}

impl BuildInfo {
    pub fn collect() -> Self {
        Self {
            build_hash: option_env!("MESHCALL_BUILD_HASH").unwrap_or("unknown").to_string(),
            build_date: option_env!("MESHCALL_BUILD_DATE").unwrap_or("unknown").to_string(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            rust_version: option_env!("MESHCALL_RUSTC_VERSION").unwrap_or("unknown").to_string(),
        }
    }
}
