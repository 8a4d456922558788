use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use snafu::Snafu;
use std::num::ParseIntError;

pub type StudentsResult<T> = Result<T, StudentsError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StudentsError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error commiting SQL transaction"))]
    CommitTransaction { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse database url {:?}", url))]
    InvalidDatabaseUrl { source: sqlx::Error, url: String },
    #[snafu(display("Unable to parse max connections {:?}", original))]
    ParseMaxConnections {
        source: ParseIntError,
        original: String,
    },
    #[snafu(display("Route ID {} does not match student ID {}", route_id, body_id))]
    IdMismatch { route_id: i32, body_id: i32 },
    #[snafu(display("Unable to find student with ID: {}", id))]
    MissingStudent { id: i32 },
    #[snafu(display("A student with ID {} already exists", id))]
    DuplicateStudent { id: i32 },
}

impl StudentsError {
    pub const fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MakeQuery { .. } | Self::CommitTransaction { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::BadEnvVar { .. }
            | Self::InvalidDatabaseUrl { .. }
            | Self::ParseMaxConnections { .. } => ISE,
            Self::IdMismatch { .. } => BI,
            Self::MissingStudent { .. } => NF,
            Self::DuplicateStudent { .. } => StatusCode::CONFLICT,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for StudentsError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!(?self, "Error!");
        } else {
            warn!(%self, %status_code, "Rejected request");
        }

        (
            status_code,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
