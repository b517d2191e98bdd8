// ABOUTME: Error conditions that callers of the backend layer need to tell apart
// ABOUTME: Carried inside anyhow::Error and recovered with downcast_ref where it matters

use thiserror::Error;

/// Typed failures surfaced by backends. Everything else travels as plain `anyhow` context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("No backend is available for {os} (desktop: {desktop:?}, session: {session:?})")]
    UnsupportedPlatform {
        os: String,
        desktop: String,
        session: String,
    },

    #[error("Unknown key '{name}' for {platform}")]
    UnknownKey { name: String, platform: String },

    #[error("Invalid shortcut '{trigger}': {reason}")]
    InvalidShortcut { trigger: String, reason: String },

    #[error("Shortcut '{trigger}' is already in use by another application")]
    ShortcutInUse { trigger: String },

    #[error("Compositor script did not respond within {millis} ms")]
    ScriptTimeout { millis: u64 },

    #[error("Desktop portal is unavailable: {0}")]
    PortalUnavailable(String),

    #[error("Desktop portal request failed with response code {code}")]
    PortalRequest { code: u32 },

    #[error("Command '{command}' failed: {message}")]
    Tool { command: String, message: String },

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
}

impl BackendError {
    pub fn invalid_shortcut(trigger: &str, reason: impl Into<String>) -> Self {
        BackendError::InvalidShortcut {
            trigger: trigger.to_string(),
            reason: reason.into(),
        }
    }
}

/// Returns the typed error inside an anyhow chain, if there is one.
pub fn backend_error(error: &anyhow::Error) -> Option<&BackendError> {
    error.chain().find_map(|cause| cause.downcast_ref::<BackendError>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_backend_error_survives_context() {
        let result: anyhow::Result<()> = Err(BackendError::ScriptTimeout { millis: 1000 }.into());
        let error = result.context("Failed to query window info").unwrap_err();

        assert_eq!(
            backend_error(&error),
            Some(&BackendError::ScriptTimeout { millis: 1000 })
        );
    }

    #[test]
    fn test_plain_errors_have_no_backend_error() {
        let error = anyhow::anyhow!("something else");
        assert!(backend_error(&error).is_none());
    }

    #[test]
    fn test_messages_are_displayable() {
        let error = BackendError::invalid_shortcut("Ctrl+", "no key specified");
        assert_eq!(error.to_string(), "Invalid shortcut 'Ctrl+': no key specified");
    }
}
