//! Conversions from external infrastructure errors into domain errors.

use lakeflow_common::auth::AuthError;
use lakeflow_domain::LakeflowError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub LakeflowError);

impl From<InfraError> for LakeflowError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<LakeflowError> for InfraError {
    fn from(value: LakeflowError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoLakeflowError {
    fn into_lakeflow(self) -> LakeflowError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → LakeflowError */
/* -------------------------------------------------------------------------- */

impl IntoLakeflowError for HttpError {
    fn into_lakeflow(self) -> LakeflowError {
        if self.is_builder() {
            return LakeflowError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        if self.is_timeout() {
            return LakeflowError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return LakeflowError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => LakeflowError::Auth(message),
                404 => LakeflowError::NotFound(message),
                400..=499 => LakeflowError::InvalidInput(message),
                _ => LakeflowError::Network(message),
            };
        }

        LakeflowError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_lakeflow())
    }
}

/* -------------------------------------------------------------------------- */
/* AuthError → LakeflowError */
/* -------------------------------------------------------------------------- */

impl IntoLakeflowError for AuthError {
    fn into_lakeflow(self) -> LakeflowError {
        match self {
            AuthError::MissingConfiguration | AuthError::InvalidConfiguration(_) => {
                LakeflowError::Config(self.to_string())
            }
            AuthError::CallbackServer(_) => LakeflowError::Io(self.to_string()),
            AuthError::AuthorizationCallback(_)
            | AuthError::TokenExchangeFailed { .. }
            | AuthError::AuthUnavailable(_) => LakeflowError::Auth(self.to_string()),
        }
    }
}

impl From<AuthError> for InfraError {
    fn from(value: AuthError) -> Self {
        InfraError(value.into_lakeflow())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
