//! Core error types for atelier-core.
//!
//! This module defines a comprehensive error hierarchy using thiserror
//! for better error handling and reporting across the library.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for atelier-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote projection errors
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Lookup of a non-existent entity
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Remote projection errors.
///
/// These cover the remote computation path of the Delivery Projector.
/// Transport failures are recoverable: the caller degrades to the local
/// computation instead of surfacing them.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// No remote endpoint is configured
    #[error("No remote projection endpoint configured")]
    NotConfigured,

    /// The request failed at the transport level
    #[error("Projection request failed: {0}")]
    RequestFailed(String),

    /// The remote answered with a non-success status
    #[error("Projection endpoint returned status {status}")]
    BadStatus { status: u16 },

    /// The response body could not be decoded
    #[error("Failed to decode projection response: {0}")]
    DecodeFailed(String),

    /// The request did not complete within the configured timeout
    #[error("Projection request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Block hours must be strictly positive
    #[error("Block hours must be positive, got {hours}")]
    NonPositiveHours { hours: f64 },

    /// Daily dedication must be strictly positive
    #[error("Daily dedication must be positive, got {hours}")]
    NonPositiveDedication { hours: f64 },

    /// Daily dedication outside the configured bounds
    #[error("Daily dedication {hours} outside allowed range {min}..={max}")]
    DedicationOutOfRange { hours: f64, min: f64, max: f64 },

    /// Production blocks must reference a project
    #[error("Production block '{block_id}' has no project")]
    ProductionWithoutProject { block_id: String },

    /// Backlog items carry no date and can never be forecast entries
    #[error("Unscheduled block '{block_id}' cannot be a shadow block")]
    ShadowInboxBlock { block_id: String },

    /// A scheduled date was required but the block sits in the inbox
    #[error("Block '{block_id}' is unscheduled; a date is required here")]
    UnscheduledBlock { block_id: String },

    /// Buffer percentage outside 0..=100
    #[error("Buffer percentage must be between 0 and 100, got {value}")]
    BufferOutOfRange { value: f64 },

    /// Plan type absent from the configured catalog
    #[error("Unknown plan type: {0}")]
    UnknownPlanType(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CoreError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        CoreError::Custom(err.to_string())
    }
}

impl From<reqwest::Error> for ProjectionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProjectionError::DecodeFailed(err.to_string())
        } else {
            ProjectionError::RequestFailed(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
