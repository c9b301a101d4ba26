use serde::Deserialize;

/// A user/password pair, compared byte-for-byte
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Identity the gateway advertises in every rewritten address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub port: u16,
    pub use_https: bool,
}

impl HostIdentity {
    pub fn scheme(&self) -> &'static str {
        if self.use_https {
            "https"
        } else {
            "http"
        }
    }

    /// `{scheme}://{hostname}:{port}`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme(), self.hostname, self.port)
    }
}
