use std::sync::{Arc, OnceLock};

use crate::error_responses;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use schemars::{
    schema::{Schema, SchemaObject, SubschemaValidation},
    schema_for, JsonSchema,
};
use serde::Serialize;
use serde_json::Value;

pub use response::{ErrorResponse, ErrorResponseDocs};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not_found")]
    NotFound(String),

    // auth
    #[error("unauthorized")]
    Unauthorized(String),
    #[error("forbidden")]
    Forbidden(String),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),

    // validation
    #[error("validation")]
    Validation(String),
    #[error("validation")]
    JsonValidation(#[from] JsonRejection),
    #[error("validation")]
    QueryValidation(#[from] QueryRejection),
    #[error("validation")]
    PathValidation(#[from] PathRejection),

    #[error("conflict")]
    Conflict(String),

    #[error(transparent)]
    DB(crate::db::Error),

    // other
    #[error(transparent)]
    /// An application-specific error.
    App(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("unexpected")]
    Unexpected(String),
}

impl Error {
    pub fn unauthorized() -> Self {
        Self::Unauthorized("You must be signed in".into())
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You do not have permission to do this".into())
    }
}

impl From<crate::db::Error> for Error {
    fn from(error: crate::db::Error) -> Self {
        match error {
            crate::db::Error::NotFound(msg) => Self::NotFound(msg),
            crate::db::Error::Conflict(msg) => Self::Conflict(msg),
            error => Self::DB(error),
        }
    }
}

/// crate::Error <--> tokio_rusqlite::Error, so a closure passed to `DB::call`
/// can bail out with an application error and get it back unchanged.
pub mod db_mappers {
    use super::*;
    use crate::db::tokio_rusqlite;

    impl From<tokio_rusqlite::Error> for Error {
        fn from(error: tokio_rusqlite::Error) -> Self {
            match error {
                tokio_rusqlite::Error::Other(err) => match err.downcast::<Error>() {
                    Ok(error) => *error,
                    Err(err) => Error::from(crate::db::Error::from(tokio_rusqlite::Error::Other(err))),
                },
                error => Error::from(crate::db::Error::from(error)),
            }
        }
    }

    impl From<Error> for tokio_rusqlite::Error {
        fn from(error: Error) -> Self {
            tokio_rusqlite::Error::Other(error.into())
        }
    }
}

// Response

error_responses! {
    not_found: 404,
    validation: 400,
    path_validation: 400,
    query_validation: 400,
    json_validation: 422,
    unauthorized: 401,
    forbidden: 403,
    conflict: 409,
    unexpected: 500
}

impl From<&Error> for ErrorResponse {
    fn from(error: &Error) -> Self {
        let errors = errors();
        match error {
            Error::NotFound(message) => errors.not_found.with_message(message),
            Error::Unauthorized(message) => errors.unauthorized.with_message(message),
            Error::Forbidden(message) => errors.forbidden.with_message(message),
            Error::Validation(message) => errors.validation.with_message(message),
            Error::Conflict(message) => errors.conflict.with_message(message),
            Error::JsonValidation(error) => errors.json_validation.with_message(error.body_text()),
            Error::QueryValidation(error) => errors.query_validation.with_message(error.body_text()),
            Error::PathValidation(error) => errors.path_validation.with_message(error.body_text()),
            Error::App(app_error) => errors.unexpected.with_message(app_error.to_string()),
            Error::Unexpected(message) => errors.unexpected.with_message(message),
            Error::Session(_) | Error::DB(_) => errors.unexpected.with_message("Unexpected"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let error = Arc::new(self);

        let error_res = ErrorResponse::from(error.as_ref());
        let status = error_res.status;

        let mut res = axum::Json(error_res).into_response();
        res.extensions_mut().insert(error);

        *res.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        res
    }
}

pub async fn on_error(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if let Some(error) = response.extensions().get::<Arc<Error>>().map(Arc::as_ref) {
        if response.status().is_server_error() {
            tracing::error!("{:?}", error);
        } else {
            tracing::warn!("{:?}", error);
        }
    }

    response
}

mod response {
    use serde_json::Map;

    use super::*;

    #[derive(Debug, Serialize, serde::Deserialize, Clone, Default, JsonSchema)]
    pub struct ErrorResponse {
        pub error: String,
        pub message: Option<String>,
        pub status: u16,
        pub details: Option<Map<String, Value>>,
    }

    impl ErrorResponse {
        pub fn new(error: impl Into<String>, status: u16) -> Self {
            Self {
                error: error.into(),
                status,
                ..Default::default()
            }
        }

        pub fn with_message(&self, message: impl Into<String>) -> Self {
            let mut res = self.clone();
            res.message = Some(message.into());
            res
        }
    }

    /// `oneOf` over every registered error, each with its `error` and `status` pinned.
    pub struct ErrorResponseDocs;

    impl JsonSchema for ErrorResponseDocs {
        fn schema_name() -> String {
            String::from("ErrorResponse")
        }

        fn json_schema(_gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
            let error_schemas = errors()
                .all()
                .into_iter()
                .map(|response| {
                    let mut schema = schema_for!(ErrorResponse).schema;
                    let obj = schema.object();
                    if let Some(Schema::Object(status)) = obj.properties.get_mut("status") {
                        status.enum_values = Some(vec![Value::from(response.status)]);
                    }
                    if let Some(Schema::Object(error)) = obj.properties.get_mut("error") {
                        error.enum_values = Some(vec![Value::from(response.error.clone())]);
                    }

                    Schema::from(schema)
                })
                .collect::<Vec<_>>();

            let schema = SchemaObject {
                subschemas: Some(Box::new(SubschemaValidation {
                    one_of: Some(error_schemas),
                    ..Default::default()
                })),
                ..Default::default()
            };

            schema.into()
        }
    }

    /// Typed responses with a custom JSON schema
    /// ```rust
    /// error_responses! {
    ///     not_found: 404,
    ///     unexpected: 500
    /// }
    ///
    /// impl From<&Error> for ErrorResponse {
    ///     fn from(error: &Error) -> Self {
    ///     let errors = errors(); // <- from macro
    ///     match error {
    ///         Error::NotFound(message) => errors.not_found.with_message(message),
    ///         Error::Unexpected(message) => errors.unexpected.with_message(message),
    ///     }
    /// }
    /// ```
    #[macro_export]
    macro_rules! error_responses {
        (
            $($name:ident: $code:expr),* $(,)?
        ) => {
            #[derive(Debug, Clone, Serialize)]
            struct Responses {
                $(
                    $name: ErrorResponse,
                )*
            }

            impl Responses {
                fn all(&self) -> Vec<&ErrorResponse> {
                    vec![$(&self.$name),*]
                }
            }

            static ERRORS: OnceLock<Responses> = OnceLock::new();

            fn errors() -> &'static Responses {
                ERRORS.get_or_init(|| Responses {
                    $(
                        $name: ErrorResponse::new(stringify!($name), $code),
                    )*
                })
            }
        };
    }
}
