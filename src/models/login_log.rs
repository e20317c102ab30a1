//! Login audit record

/// One login attempt, successful or not
#[derive(Debug, Clone)]
pub struct NewLoginLog {
    /// Email or phone the client tried to log in with
    pub identifier: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl NewLoginLog {
    pub fn success(identifier: &str, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            identifier: identifier.to_string(),
            ip_address,
            user_agent,
            success: true,
            failure_reason: None,
        }
    }

    pub fn failure(
        identifier: &str,
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: &str,
    ) -> Self {
        Self {
            identifier: identifier.to_string(),
            ip_address,
            user_agent,
            success: false,
            failure_reason: Some(reason.to_string()),
        }
    }
}
