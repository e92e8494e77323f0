//! Conversions from external infrastructure errors into domain errors.

use aqademiq_domain::AqademiqError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AqademiqError);

impl From<InfraError> for AqademiqError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AqademiqError> for InfraError {
    fn from(value: AqademiqError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAqademiqError {
    fn into_aqademiq(self) -> AqademiqError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → AqademiqError */
/* -------------------------------------------------------------------------- */

impl IntoAqademiqError for SqlError {
    fn into_aqademiq(self) -> AqademiqError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        AqademiqError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        AqademiqError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        AqademiqError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        AqademiqError::Database("foreign key constraint violation".into())
                    }
                    _ => AqademiqError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                AqademiqError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                AqademiqError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                AqademiqError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                AqademiqError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                AqademiqError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => AqademiqError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => AqademiqError::Database("invalid SQL query".into()),
            other => AqademiqError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_aqademiq())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AqademiqError */
/* -------------------------------------------------------------------------- */

impl IntoAqademiqError for HttpError {
    fn into_aqademiq(self) -> AqademiqError {
        if self.is_timeout() {
            return AqademiqError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return AqademiqError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => AqademiqError::Auth(message),
                404 => AqademiqError::NotFound(message),
                429 => AqademiqError::Network(message),
                400..=499 => AqademiqError::InvalidInput(message),
                _ => AqademiqError::Network(message),
            };
        }

        AqademiqError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_aqademiq())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → AqademiqError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(AqademiqError::Database(format!("connection pool error: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
