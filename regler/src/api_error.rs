//! The common error returned from the admin handlers.
//!
//! Validation and not-found failures surface as structured responses with
//! their own status codes; everything server-side is logged in full and
//! reported to the client without detail.

use std::error::Error;
use std::fmt;
use std::panic::Location;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use regler_core::store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::error;

/// A type alias that includes the [`ApiError`]
pub type ApiResult<T> = Result<T, ApiError>;

/// The common error that is returned from the handlers
#[derive(Debug, Error)]
pub struct ApiError {
    /// Http status code to use for the response
    pub status_code: ApiErrorStatusCode,

    /// An arbitrary string literal describing the error
    pub context: Option<&'static str>,

    /// The offending field for validation failures
    pub field: Option<&'static str>,

    /// Location where the error originated from
    pub location: &'static Location<'static>,

    /// The error's underlying source
    pub source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// Http status codes available for [`ApiError`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiErrorStatusCode {
    BadRequest,
    NotFound,
    Conflict,
    ServerError,
}

impl ApiErrorStatusCode {
    /// Converts the status code into `http`'s type
    pub fn to_http(&self) -> StatusCode {
        match self {
            ApiErrorStatusCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorStatusCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorStatusCode::Conflict => StatusCode::CONFLICT,
            ApiErrorStatusCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            ApiErrorStatusCode::BadRequest => write!(f, "Bad Request")?,
            ApiErrorStatusCode::NotFound => write!(f, "Not Found")?,
            ApiErrorStatusCode::Conflict => write!(f, "Conflict")?,
            ApiErrorStatusCode::ServerError => write!(f, "Server Error")?,
        }
        if let Some(context) = self.context {
            write!(f, " '{context}'")?;
        }
        if let Some(field) = self.field {
            write!(f, " on field '{field}'")?;
        }
        if let Some(source) = &self.source {
            write!(f, " caused by '{source}'")?;
        }
        write!(f, " at '{}'", self.location)
    }
}

impl ApiError {
    /// Constructs a new `ApiError` with [`ApiErrorStatusCode::BadRequest`]
    #[track_caller]
    pub fn bad_request(context: &'static str) -> Self {
        Self::new(ApiErrorStatusCode::BadRequest, Some(context))
    }

    /// Constructs a new `ApiError` with [`ApiErrorStatusCode::NotFound`]
    #[track_caller]
    pub fn not_found(context: &'static str) -> Self {
        Self::new(ApiErrorStatusCode::NotFound, Some(context))
    }

    /// Constructs a new `ApiError` with [`ApiErrorStatusCode::Conflict`]
    #[track_caller]
    pub fn conflict(context: &'static str) -> Self {
        Self::new(ApiErrorStatusCode::Conflict, Some(context))
    }

    /// Constructs a new `ApiError` with [`ApiErrorStatusCode::ServerError`]
    #[track_caller]
    pub fn server_error(context: &'static str) -> Self {
        Self::new(ApiErrorStatusCode::ServerError, Some(context))
    }

    /// Names the field a validation failure refers to
    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    /// Adds a source to the `ApiError`
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Creates a closure for wrapping any error into an `ApiError::server_error`
    ///
    /// This is just a less noisy shorthand for
    /// `|error| ApiError::server_error("...").with_source(error)`.
    #[track_caller]
    pub fn map_server_error<E: Error + Send + Sync + 'static>(
        context: &'static str,
    ) -> impl Fn(E) -> Self {
        let location = Location::caller();
        move |error| {
            let mut this = Self::server_error(context).with_source(error);
            this.location = location;
            this
        }
    }

    /// Emit a tracing event `error!` or `debug!` describing the `ApiError`
    pub fn emit_tracing_event(&self) {
        let Self {
            status_code,
            context,
            field,
            location,
            source,
        } = &self;

        match status_code {
            ApiErrorStatusCode::BadRequest
            | ApiErrorStatusCode::NotFound
            | ApiErrorStatusCode::Conflict => {
                debug!(
                    error.status_code = status_code.to_http().as_u16(),
                    error.status_message = status_code.to_http().as_str(),
                    error.context = context,
                    error.field = field,
                    error.file = location.file(),
                    error.line = location.line(),
                    error.column = location.column(),
                    error.display = source.as_ref().map(tracing::field::display),
                    error.debug = source.as_ref().map(tracing::field::debug),
                    "Client error"
                );
            }
            ApiErrorStatusCode::ServerError => {
                error!(
                    error.status_code = status_code.to_http().as_u16(),
                    error.status_message = status_code.to_http().as_str(),
                    error.context = context,
                    error.file = location.file(),
                    error.line = location.line(),
                    error.column = location.column(),
                    error.display = source.as_ref().map(tracing::field::display),
                    error.debug = source.as_ref().map(tracing::field::debug),
                    "Server error"
                );
            }
        }
    }

    /// Constructs a new `ApiError`
    #[track_caller]
    fn new(status_code: ApiErrorStatusCode, context: Option<&'static str>) -> Self {
        Self {
            status_code,
            context,
            field: None,
            location: Location::caller(),
            source: None,
        }
    }
}

/// Response body sent for an [`ApiError`]
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.emit_tracing_event();

        let response = ApiErrorResponse {
            message: self
                .context
                .unwrap_or(match self.status_code {
                    ApiErrorStatusCode::BadRequest => "Bad Request",
                    ApiErrorStatusCode::NotFound => "Not Found",
                    ApiErrorStatusCode::Conflict => "Conflict",
                    ApiErrorStatusCode::ServerError => "Server Error",
                })
                .to_string(),
            field: self.field,
        };

        (self.status_code.to_http(), Json(response)).into_response()
    }
}

impl From<StoreError> for ApiError {
    #[track_caller]
    fn from(error: StoreError) -> Self {
        let this = match &error {
            StoreError::Validation { field } => {
                Self::bad_request("A required field is missing").with_field(*field)
            }
            StoreError::TooLong { field } => {
                Self::bad_request("A field exceeds its maximum length").with_field(*field)
            }
            StoreError::UnknownType { .. } => {
                Self::bad_request("The field type is not registered").with_field("field_type")
            }
            StoreError::NotFound { .. } => Self::not_found("Setting was not found"),
            StoreError::AlreadyExists { .. } => {
                Self::conflict("The settings key is already taken").with_field("key")
            }
            StoreError::Conflict => Self::conflict("The setting was modified concurrently"),
            StoreError::Database(_) => Self::server_error("Database error"),
        };
        this.with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: StoreError) -> ApiErrorStatusCode {
        ApiError::from(error).status_code
    }

    #[test]
    fn store_errors_map_to_their_status_codes() {
        assert_eq!(
            status_of(StoreError::Validation { field: "key" }),
            ApiErrorStatusCode::BadRequest
        );
        assert_eq!(
            status_of(StoreError::UnknownType {
                ident: "holo".to_string()
            }),
            ApiErrorStatusCode::BadRequest
        );
        assert_eq!(
            status_of(StoreError::NotFound {
                key: "missing".to_string()
            }),
            ApiErrorStatusCode::NotFound
        );
        assert_eq!(
            status_of(StoreError::AlreadyExists {
                key: "taken".to_string()
            }),
            ApiErrorStatusCode::Conflict
        );
        assert_eq!(status_of(StoreError::Conflict), ApiErrorStatusCode::Conflict);
    }

    #[test]
    fn validation_failures_carry_the_field_name() {
        let error = ApiError::from(StoreError::Validation { field: "group" });
        assert_eq!(error.field, Some("group"));
    }
}
