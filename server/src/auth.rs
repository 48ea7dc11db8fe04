//! Per-role password checks for WebSocket upgrades.
//!
//! Browsers cannot set headers on a WebSocket upgrade, so the password
//! travels as a `?password=` query parameter. It is checked once, before the
//! upgrade; an established connection is never re-checked. Only `%XX`
//! escapes are decoded, so a literal `+` in a password stays a `+`.

use crate::config::AuthConfig;
use crate::sessions::Role;

impl AuthConfig {
    /// Whether `provided` satisfies the password configured for `role`.
    ///
    /// A role with no configured password always passes. A configured
    /// password with nothing provided always fails.
    pub fn permits(&self, role: Role, provided: Option<&str>) -> bool {
        let required = match role {
            Role::Controller => self.controller_password.as_deref(),
            Role::Viewer => self.viewer_password.as_deref(),
        };
        match (required, provided) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
        }
    }
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
///
/// Always iterates over the full length of `expected` regardless of `provided`
/// length, so an attacker cannot determine the password length from response
/// times.
pub fn constant_time_eq(expected: &[u8], provided: &[u8]) -> bool {
    let mut diff = u8::from(expected.len() != provided.len());
    for (i, e) in expected.iter().enumerate() {
        let p = provided.get(i).copied().unwrap_or(0xff);
        diff |= e ^ p;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(controller: Option<&str>, viewer: Option<&str>) -> AuthConfig {
        AuthConfig {
            controller_password: controller.map(String::from),
            viewer_password: viewer.map(String::from),
        }
    }

    #[test]
    fn no_password_configured_always_passes() {
        let auth = auth(None, None);
        assert!(auth.permits(Role::Controller, None));
        assert!(auth.permits(Role::Controller, Some("anything")));
        assert!(auth.permits(Role::Viewer, None));
    }

    #[test]
    fn roles_are_checked_independently() {
        let auth = auth(Some("drive"), Some("watch"));
        assert!(auth.permits(Role::Controller, Some("drive")));
        assert!(!auth.permits(Role::Controller, Some("watch")));
        assert!(auth.permits(Role::Viewer, Some("watch")));
        assert!(!auth.permits(Role::Viewer, Some("drive")));
        assert!(!auth.permits(Role::Viewer, None));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secre"));
        assert!(!constant_time_eq(b"secret", b"secrets"));
        assert!(!constant_time_eq(b"secret", b""));
        assert!(constant_time_eq(b"", b""));
    }
}
