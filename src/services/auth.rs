//! Access gate
//!
//! One configured account, exact string comparison. Runs before any
//! upstream work for every non-health route.

use crate::error::{GatewayError, GatewayResult};
use crate::models::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Allow iff both fields match exactly (case-sensitive, no trimming)
pub fn authenticate(provided: &Credentials, configured: &Credentials) -> Access {
    if provided.user == configured.user && provided.password == configured.password {
        Access::Allow
    } else {
        Access::Deny
    }
}

/// Gate a request on the credential fields it presented
///
/// Missing or empty fields are a bad request, a mismatch is unauthorized.
pub fn admit(
    user: Option<&str>,
    password: Option<&str>,
    user_field: &str,
    password_field: &str,
    configured: &Credentials,
) -> GatewayResult<()> {
    let user = user
        .filter(|u| !u.is_empty())
        .ok_or_else(|| GatewayError::missing_param(user_field))?;
    let password = password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| GatewayError::missing_param(password_field))?;

    match authenticate(&Credentials::new(user, password), configured) {
        Access::Allow => Ok(()),
        Access::Deny => {
            tracing::warn!(user = %user, "rejected credentials");
            Err(GatewayError::Unauthorized)
        }
    }
}
