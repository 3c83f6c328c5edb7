use serde::{Deserialize, Serialize};

/// Caller identity recorded on assets and audit entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub api_token: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            api_token: None,
        }
    }

    pub fn with_token(user_id: String, api_token: Option<String>) -> Self {
        Self { user_id, api_token }
    }

    /// Identity used by the in-memory catalog when no caller is known
    pub fn system() -> Self {
        Self::new("system".to_string())
    }

    pub fn default_user() -> Self {
        Self::new("harness".to_string())
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}
