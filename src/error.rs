/// Every failure the access core can report to its front end.
///
/// Variants are kept distinct so a front end can render a specific message for each; see
/// [`CoreError::kind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("'{0}' is not a valid IPv4 address or CIDR block")]
    InvalidAddress(String),

    /// Not a failure: the requested revocation had nothing to remove.
    #[error("{address} has no ACCEPT rule on port {port}")]
    NotFound { address: String, port: u16 },

    #[error("iptables {command} for {address} failed: {detail}")]
    RuleEdit {
        command: &'static str,
        address: String,
        detail: String,
    },

    #[error("Service {action} failed: {detail}")]
    ServiceControl {
        action: &'static str,
        detail: String,
    },

    #[error("No access grant is active")]
    GrantInactive,

    /// The deadline `seconds` from now is not representable.
    #[error("A grant of {seconds}s cannot be scheduled")]
    InvalidDuration { seconds: u64 },

    #[error("Failed to deliver grant expiry notification: {0}")]
    Notification(String),
}

impl CoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidAddress(_) => "InvalidAddress",
            CoreError::NotFound { .. } => "NotFound",
            CoreError::RuleEdit { .. } => "RuleEditError",
            CoreError::ServiceControl { .. } => "ServiceControlError",
            CoreError::GrantInactive => "GrantInactive",
            CoreError::InvalidDuration { .. } => "InvalidDuration",
            CoreError::Notification(_) => "NotificationError",
        }
    }

    /// `false` for outcomes that must not be rendered as errors.
    pub fn is_failure(&self) -> bool {
        !matches!(self, CoreError::NotFound { .. })
    }
}

/// Renders a failed or unstartable command the same way for every error kind:
/// `[exit status] stderr`.
pub fn describe_failure(output: &std::io::Result<crate::executor::CommandOutput>) -> String {
    match output {
        Ok(output) => {
            let status = match output.status {
                Some(code) => format!("exit status: {}", code),
                None => "terminated by signal".to_string(),
            };
            let stderr = output.stderr.trim_end();
            if stderr.is_empty() {
                format!("[{}]", status)
            } else {
                format!("[{}] {}", status, stderr)
            }
        }
        Err(e) => format!("could not be started: {}", e),
    }
}
