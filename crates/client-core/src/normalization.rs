use tracing::debug;

use crate::{
    error::{ClientError, ErrorCategory, classify_http_status},
    types::TransportStatus,
};

/// Stable code for rejected or expired credentials.
pub const AUTH_DENIED: &str = "auth_denied";
/// Stable code for authenticated requests the backend refuses.
pub const PERMISSION_DENIED: &str = "permission_denied";

/// Map a provider channel signal onto a transport status.
///
/// Signals with no lifecycle meaning (presence diffs, broadcasts) yield `None`.
pub fn normalize_provider_status(signal: &str) -> Option<TransportStatus> {
    match signal.parse() {
        Ok(status) => Some(status),
        Err(err) => {
            debug!(%err, "ignoring provider signal");
            None
        }
    }
}

/// Convert a raw backend failure into a tagged client error.
///
/// Provider-specific auth and permission codes collapse onto [`AUTH_DENIED`] and
/// [`PERMISSION_DENIED`] so retry policies can name them without knowing the provider.
pub fn normalize_backend_failure(
    http_status: Option<u16>,
    provider_code: Option<&str>,
    message: impl Into<String>,
) -> ClientError {
    let message = message.into();

    match provider_code {
        Some("PGRST301" | "PGRST302" | "invalid_grant" | "refresh_token_not_found" | "bad_jwt") => {
            return ClientError::new(ErrorCategory::Auth, AUTH_DENIED, message);
        }
        Some("42501" | "insufficient_privilege") => {
            return ClientError::new(ErrorCategory::Permission, PERMISSION_DENIED, message);
        }
        _ => {}
    }

    let Some(status) = http_status else {
        let code = provider_code.unwrap_or("network_error");
        return ClientError::new(ErrorCategory::Network, code, message);
    };

    let category = classify_http_status(status);
    let code = match category {
        ErrorCategory::Auth => AUTH_DENIED.to_owned(),
        ErrorCategory::Permission => PERMISSION_DENIED.to_owned(),
        _ => provider_code
            .map(str::to_owned)
            .unwrap_or_else(|| format!("http_{status}")),
    };
    ClientError::new(category, code, message)
}
