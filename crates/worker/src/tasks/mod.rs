//! Built-in task definitions.
//!
//! Task identifiers are exported as constants so enqueueing code and the
//! registry can never drift apart on a string.

pub mod emails;

use crate::registry::TaskRegistry;

pub const SEND_PASSWORD_RESET_EMAIL: &str = "send_password_reset_email";
pub const SEND_VERIFICATION_EMAIL: &str = "send_verification_email";

/// A registry with every built-in task registered.
pub fn default_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(SEND_PASSWORD_RESET_EMAIL, emails::send_password_reset_email);
    registry.register(SEND_VERIFICATION_EMAIL, emails::send_verification_email);
    registry
}
