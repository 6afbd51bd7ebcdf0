// Build-time identity from Cargo.toml

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `User-Agent` sent on every backend request, e.g. "sirberus/0.3.0".
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
