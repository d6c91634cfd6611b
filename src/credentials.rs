use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{PlayerError, PlayerResult};

/// Server URL and basic-auth credentials for a single Nextcloud account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub server_url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Creates credentials from user input, trimming surrounding whitespace
    pub fn new(server_url: &str, username: &str, password: &str) -> Self {
        Self {
            server_url: server_url.trim().to_string(),
            username: username.trim().to_string(),
            password: password.trim().to_string(),
        }
    }

    /// Checks the fields before any request is made
    pub fn validate(&self) -> PlayerResult<()> {
        if self.server_url.is_empty() {
            return Err(PlayerError::invalid_argument("Server URL cannot be empty"));
        }

        if self.username.is_empty() {
            return Err(PlayerError::invalid_argument("Username cannot be empty"));
        }

        if self.password.is_empty() {
            return Err(PlayerError::invalid_argument("Password cannot be empty"));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(PlayerError::invalid_argument(
                "Server URL must start with http:// or https://",
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Login state for one application session.
///
/// Unauthenticated/Rejected -> Validating on submit, Validating -> Authenticated
/// on a 207 from the server, Validating -> Rejected on anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    Validating(Credentials),
    Authenticated(Credentials),
    Rejected { server_url: String, reason: String },
}

#[derive(Debug)]
pub struct LoginFlow {
    state: LoginState,
}

impl Default for LoginFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginFlow {
    pub fn new() -> Self {
        Self {
            state: LoginState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, LoginState::Authenticated(_))
    }

    /// Credentials of the authenticated user, if any
    pub fn credentials(&self) -> Option<&Credentials> {
        match &self.state {
            LoginState::Authenticated(credentials) => Some(credentials),
            _ => None,
        }
    }

    /// Moves to `Validating`. Blank fields are rejected here without leaving
    /// the current state, and an already authenticated session must log out first.
    pub fn submit(&mut self, credentials: Credentials) -> PlayerResult<Credentials> {
        if self.is_authenticated() {
            return Err(PlayerError::invalid_argument(
                "Already logged in; log out before logging in again",
            ));
        }
        if matches!(self.state, LoginState::Validating(_)) {
            return Err(PlayerError::invalid_argument("A login attempt is already in progress"));
        }

        credentials.validate()?;
        self.state = LoginState::Validating(credentials.clone());
        Ok(credentials)
    }

    /// Applies the outcome of the validation request. On failure the
    /// credentials are dropped; only the server URL is kept as a prefill.
    pub fn complete(&mut self, outcome: PlayerResult<()>) -> PlayerResult<()> {
        let credentials = match std::mem::replace(&mut self.state, LoginState::Unauthenticated) {
            LoginState::Validating(credentials) => credentials,
            other => {
                self.state = other;
                return Err(PlayerError::invalid_argument("No login attempt in progress"));
            }
        };

        match outcome {
            Ok(()) => {
                info!("Logged in, username: {}", credentials.username);
                self.state = LoginState::Authenticated(credentials);
                Ok(())
            }
            Err(e) => {
                warn!("Login rejected for user '{}': {}", credentials.username, e);
                self.state = LoginState::Rejected {
                    server_url: credentials.server_url,
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Explicit logout, the only way out of `Authenticated`
    pub fn logout(&mut self) {
        if let LoginState::Authenticated(ref credentials) = self.state {
            info!("Logged out, username: {}", credentials.username);
        }
        self.state = LoginState::Unauthenticated;
    }

    /// Server URL to prefill the next login prompt with
    pub fn prefill_server_url(&self) -> Option<&str> {
        match &self.state {
            LoginState::Validating(c) | LoginState::Authenticated(c) => Some(&c.server_url),
            LoginState::Rejected { server_url, .. } => Some(server_url),
            LoginState::Unauthenticated => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("https://cloud.example.com", "alice", "secret")
    }

    #[test]
    fn test_successful_login() {
        let mut flow = LoginFlow::new();
        flow.submit(creds()).unwrap();
        assert!(matches!(flow.state(), LoginState::Validating(_)));

        flow.complete(Ok(())).unwrap();
        assert!(flow.is_authenticated());
        assert_eq!(flow.credentials().unwrap().username, "alice");
    }

    #[test]
    fn test_rejected_login_clears_credentials() {
        let mut flow = LoginFlow::new();
        flow.submit(creds()).unwrap();

        let result = flow.complete(Err(PlayerError::AuthRejected {
            path: String::new(),
            status: 401,
            reason: "Unauthorized".to_string(),
        }));
        assert!(result.is_err());
        assert!(flow.credentials().is_none());
        assert_eq!(flow.prefill_server_url(), Some("https://cloud.example.com"));
        assert!(matches!(flow.state(), LoginState::Rejected { .. }));

        // Resubmission is explicit
        flow.submit(creds()).unwrap();
        assert!(matches!(flow.state(), LoginState::Validating(_)));
    }

    #[test]
    fn test_blank_fields_rejected_before_request() {
        let mut flow = LoginFlow::new();
        let err = flow
            .submit(Credentials::new("https://cloud.example.com", "  ", "secret"))
            .unwrap_err();
        assert!(matches!(err, PlayerError::InvalidArgument { .. }));
        assert_eq!(flow.state(), &LoginState::Unauthenticated);
    }

    #[test]
    fn test_authenticated_is_terminal_until_logout() {
        let mut flow = LoginFlow::new();
        flow.submit(creds()).unwrap();
        flow.complete(Ok(())).unwrap();

        assert!(flow.submit(creds()).is_err());
        assert!(flow.is_authenticated());

        flow.logout();
        assert_eq!(flow.state(), &LoginState::Unauthenticated);
    }

    #[test]
    fn test_complete_without_submit() {
        let mut flow = LoginFlow::new();
        assert!(flow.complete(Ok(())).is_err());
        assert_eq!(flow.state(), &LoginState::Unauthenticated);
    }

    #[test]
    fn test_debug_hides_password() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("alice"));
    }
}
