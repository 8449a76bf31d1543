use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use builder_host::HostError;
use serde::{Deserialize, Serialize};
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Wire shape every failure is reported through, on responses and on
/// callback payloads alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// The fixed registry of failure kinds. Each carries the underlying
/// cause for the log record; clients only ever see the stable code and
/// the canned message.
#[derive(Debug)]
pub enum ApiError {
    Internal(String),
    VmNotFound,
    RequestBody(String),
    InvalidJson(String),
    VmCreate(String),
    VmOpen(String),
    CallbackMarshal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Internal(_) => "internal-error",
            ApiError::VmNotFound => "vm-not-found",
            ApiError::RequestBody(_) => "request-io-error",
            ApiError::InvalidJson(_) => "invalid-json",
            ApiError::VmCreate(_) => "vm-create-error",
            ApiError::VmOpen(_) => "vm-open-error",
            ApiError::CallbackMarshal(_) => "err-marshalling-response",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::VmNotFound => StatusCode::NOT_FOUND,
            ApiError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidJson(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::VmCreate(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::VmOpen(_) => StatusCode::CONFLICT,
            ApiError::CallbackMarshal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ApiError::Internal(_) => {
                "There was an unexpected internal error. We are looking into it."
            }
            ApiError::VmNotFound => "The requested virtual machine ID was not found",
            ApiError::RequestBody(_) => {
                "There was an IO error while reading the request body. Please try again."
            }
            ApiError::InvalidJson(_) => {
                "There was an error parsing the provided JSON message. Please try again."
            }
            ApiError::VmCreate(_) => {
                "There was an unexpected error trying to create the virtual machine. \
                 We are looking into it."
            }
            ApiError::VmOpen(_) => {
                "The VM was found but its configuration file could not be opened. \
                 Caused, most likely, by a corrupt descriptor or a stalled lock."
            }
            ApiError::CallbackMarshal(_) => {
                "There was an error marshaling the response. \
                 Please try again creating your virtual machine."
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.message().to_string(),
        }
    }

    fn cause(&self) -> &str {
        match self {
            ApiError::VmNotFound => "",
            ApiError::Internal(cause)
            | ApiError::RequestBody(cause)
            | ApiError::InvalidJson(cause)
            | ApiError::VmCreate(cause)
            | ApiError::VmOpen(cause)
            | ApiError::CallbackMarshal(cause) => cause,
        }
    }

    /// Record the triggering condition before the value is reported.
    /// Every selection of a registry value goes through here.
    pub fn log(&self, context: &str) {
        error!(
            code = self.code(),
            cause = self.cause(),
            context,
            "{}",
            self.message()
        );
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log("handling request");
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        match &err {
            HostError::Descriptor { .. } => ApiError::VmOpen(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ApiError::Internal(String::new()).code(), "internal-error");
        assert_eq!(ApiError::VmNotFound.code(), "vm-not-found");
        assert_eq!(
            ApiError::RequestBody(String::new()).code(),
            "request-io-error"
        );
        assert_eq!(ApiError::InvalidJson(String::new()).code(), "invalid-json");
        assert_eq!(ApiError::VmCreate(String::new()).code(), "vm-create-error");
        assert_eq!(ApiError::VmOpen(String::new()).code(), "vm-open-error");
        assert_eq!(
            ApiError::CallbackMarshal(String::new()).code(),
            "err-marshalling-response"
        );
    }

    #[test]
    fn descriptor_failures_map_to_open_not_internal() {
        let err = HostError::Descriptor {
            path: "/vms/a/a.vmx".to_string(),
            reason: "stalled lock".to_string(),
        };
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::VmOpen(_)));
        assert_eq!(api.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_host_failures_map_to_internal() {
        let err = HostError::Connect("host offline".to_string());
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::Internal(_)));
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
