//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts >= 0, capacities > 0)
//! - Check addresses parse when the feature using them is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("deadline.header must not be empty")]
    EmptyHeader,

    #[error("deadline.header {0:?} must not contain whitespace")]
    HeaderWhitespace(String),

    #[error("deadline.default_timeout_secs must be a finite number >= 0, got {0}")]
    InvalidDefaultTimeout(f64),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check an already-deserialized configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let header = &config.deadline.header;
    if header.is_empty() {
        errors.push(ValidationError::EmptyHeader);
    } else if header.chars().any(char::is_whitespace) {
        errors.push(ValidationError::HeaderWhitespace(header.clone()));
    }

    if let Some(secs) = config.deadline.default_timeout_secs {
        if !secs.is_finite() || secs < 0.0 {
            errors.push(ValidationError::InvalidDefaultTimeout(secs));
        }
    }

    if config.consumer.queue_capacity == 0 {
        errors.push(ValidationError::Zero("consumer.queue_capacity"));
    }
    if config.consumer.max_in_flight == 0 {
        errors.push(ValidationError::Zero("consumer.max_in_flight"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
