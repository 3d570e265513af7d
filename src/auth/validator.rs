//! Authentication validator
//!
//! Implements the USER/PASS sequencing rules. Credentials are the configured
//! user table plus the optional anonymous login.

use crate::client::Session;
use crate::config::ServerConfig;
use crate::error::AuthError;

/// Returns true when `password` is accepted for `user`.
///
/// `anonymous` is accepted with any password while anonymous login is enabled.
pub fn password_matches(config: &ServerConfig, user: &str, password: &str) -> bool {
    if user == "anonymous" && config.anonymous {
        return true;
    }

    config
        .users
        .get(user)
        .is_some_and(|stored| stored == password)
}

/// Records the USER name on the session.
///
/// Any name is accepted; the check happens at PASS time.
pub fn validate_user(session: &mut Session, username: &str) -> Result<(), AuthError> {
    if session.is_authenticated() {
        return Err(AuthError::AlreadyLoggedIn);
    }

    session.set_user(Some(username.to_string()));
    Ok(())
}

/// Completes the login started by USER.
///
/// A mismatch clears the pending user so the next PASS needs a fresh USER.
pub fn validate_password(
    session: &mut Session,
    password: &str,
    config: &ServerConfig,
) -> Result<(), AuthError> {
    if session.is_authenticated() {
        return Err(AuthError::AlreadyLoggedIn);
    }

    let Some(user) = session.user().map(str::to_string) else {
        return Err(AuthError::UserRequired);
    };

    if password_matches(config, &user, password) {
        session.set_authenticated(true);
        Ok(())
    } else {
        session.set_user(None);
        Err(AuthError::LoginIncorrect(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn session() -> Session {
        Session::new("127.0.0.1:40000".parse::<SocketAddr>().unwrap())
    }

    fn config_with_alice() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.users.insert("alice".into(), "alice123".into());
        config
    }

    #[test]
    fn anonymous_depends_on_flag() {
        let mut config = ServerConfig::default();
        assert!(password_matches(&config, "anonymous", "whatever"));
        config.anonymous = false;
        assert!(!password_matches(&config, "anonymous", "whatever"));
    }

    #[test]
    fn pass_before_user_is_rejected() {
        let mut s = session();
        assert_eq!(
            validate_password(&mut s, "x", &config_with_alice()),
            Err(AuthError::UserRequired)
        );
        assert!(!s.is_authenticated());
    }

    #[test]
    fn wrong_password_clears_user() {
        let config = config_with_alice();
        let mut s = session();
        validate_user(&mut s, "alice").unwrap();

        assert_eq!(
            validate_password(&mut s, "nope", &config),
            Err(AuthError::LoginIncorrect("alice".into()))
        );
        assert_eq!(s.user(), None);
        assert_eq!(
            validate_password(&mut s, "alice123", &config),
            Err(AuthError::UserRequired)
        );
    }

    #[test]
    fn login_locks_out_user_and_pass() {
        let config = config_with_alice();
        let mut s = session();
        validate_user(&mut s, "alice").unwrap();
        validate_password(&mut s, "alice123", &config).unwrap();
        assert!(s.is_authenticated());

        assert_eq!(validate_user(&mut s, "bob"), Err(AuthError::AlreadyLoggedIn));
        assert_eq!(
            validate_password(&mut s, "alice123", &config),
            Err(AuthError::AlreadyLoggedIn)
        );
        assert_eq!(s.user(), Some("alice"));
    }
}
