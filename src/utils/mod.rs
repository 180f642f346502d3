//! Utility functions and helpers

use regex::Regex;
use uuid::Uuid;

/// Regex for validating user-declared resource names
/// Names must start with a letter or underscore, followed by letters, numbers, underscores, or hyphens
pub static VALID_NAME_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]*$").unwrap());

/// Check a name against the user-facing naming rule.
///
/// Reserved control-plane names (fallback resources) are chosen so that this
/// returns `false` for them.
pub fn is_valid_name(name: &str) -> bool {
    VALID_NAME_REGEX.is_match(name)
}

/// Separator every reserved control-plane name must carry.
///
/// Neither the user naming rule nor the `name.namespace` cluster names built
/// from it can contain this character.
pub const RESERVED_NAME_SEPARATOR: char = ':';

/// Check that a name can never be produced for a user-declared resource.
pub fn is_reserved_name(name: &str) -> bool {
    name.contains(RESERVED_NAME_SEPARATOR)
}

/// Generate a new UUID v4 as a string
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
