//! Shared User-Agent string for page and reference requests.
//!
//! Single source for project URL and UA format so every request the harvester
//! makes identifies the tool the same way (good citizenship; RFC 9308).

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/swapi-harvest";

/// Default User-Agent for all harvester requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("swapi-harvest/{version} (data-harvesting-tool; +{PROJECT_UA_URL})")
}
