//! Error types for the upgrade engine.

use dbu_core::CoreError;
use dbu_db::DbError;
use thiserror::Error;

/// Upgrade engine errors.
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// A version string could not be parsed (U001).
    #[error("[U001] {0}")]
    Format(#[source] CoreError),

    /// Missing, invalid or misordered configuration (U002).
    #[error("[U002] Configuration error: {message}")]
    Config { message: String },

    /// An expected column or row is absent (U003).
    #[error("[U003] Not found: {message}")]
    NotFound { message: String },

    /// The requested target is older than the database (U004).
    #[error("[U004] Cannot downgrade schema from version {current} to {target}")]
    Downgrade { current: String, target: String },

    /// An interrupted upgrade was detected and the version row restored (U005).
    #[error(
        "[U005] Found interrupted upgrade marker '{found}'; schema version restored to {restored}. \
         Verify the database and run the upgrade again"
    )]
    InconsistentState { found: String, restored: String },

    /// A step failed; wraps the failing task's error (U006).
    #[error("[U006] Schema upgrade to version {version} failed in task '{task}'")]
    StepExecution {
        version: String,
        task: String,
        #[source]
        source: Box<UpgradeError>,
    },

    /// A task's database operation failed (U007).
    #[error("[U007] Task '{task}' failed: {cause}")]
    Execution {
        task: String,
        #[source]
        cause: DbError,
    },

    /// An insert collided with existing data (U008).
    #[error("[U008] Duplicate row inserted into {table}: {cause}")]
    Duplicate {
        table: String,
        #[source]
        cause: DbError,
    },

    /// Database error outside of task execution (U009).
    #[error("[U009] Database error: {0}")]
    Db(#[from] DbError),
}

/// Result type alias for [`UpgradeError`].
pub type UpgradeResult<T> = Result<T, UpgradeError>;

impl UpgradeError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        UpgradeError::Config {
            message: message.into(),
        }
    }

    pub(crate) fn execution(task: &str, cause: DbError) -> Self {
        UpgradeError::Execution {
            task: task.to_string(),
            cause,
        }
    }
}

impl From<CoreError> for UpgradeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidVersion { .. } => UpgradeError::Format(err),
            other => UpgradeError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
