//! Remote projection client with local fallback.
//!
//! The forward projection can be computed by a remote collaborator (the
//! persistence API of the wider system). When the call fails for any
//! transport reason the projector recomputes locally through
//! [`super::project_delivery`] -- the identical rule, so retries and
//! fallbacks can never disagree about a date. Validation errors are raised
//! before any network traffic and are never masked by the fallback.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{project_delivery, DeliveryProjection};
use crate::error::{CoreError, ProjectionError};
use crate::storage::config::ProjectionConfig;

#[derive(Debug, Serialize)]
struct ProjectionRequest {
    buffered_hours: f64,
    daily_dedication: f64,
    start_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct ProjectionResponse {
    estimated_date: Option<NaiveDate>,
    work_days: usize,
}

/// Forward-projection client.
///
/// With no endpoint configured every projection is computed locally.
pub struct RemoteProjector {
    endpoint: Option<String>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl RemoteProjector {
    pub fn new(config: &ProjectionConfig) -> Self {
        Self {
            endpoint: config.remote_endpoint.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            http_client: reqwest::Client::new(),
        }
    }

    /// Client pinned to a specific endpoint (used by tests).
    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            timeout,
            http_client: reqwest::Client::new(),
        }
    }

    /// Local-only client.
    pub fn local_only() -> Self {
        Self {
            endpoint: None,
            timeout: Duration::from_secs(10),
            http_client: reqwest::Client::new(),
        }
    }

    /// Compute the projection, preferring the remote collaborator.
    ///
    /// Transport failures degrade to the local rule; invalid inputs fail
    /// before any request is made.
    pub async fn project(
        &self,
        buffered_hours: f64,
        daily_dedication: f64,
        start: NaiveDate,
    ) -> Result<DeliveryProjection, CoreError> {
        // Validate (and short-circuit the trivial case) locally first, so a
        // remote round trip is never spent on inputs we would reject.
        let local = project_delivery(buffered_hours, daily_dedication, start)?;

        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => return Ok(local),
        };

        match self
            .request(endpoint, buffered_hours, daily_dedication, start)
            .await
        {
            Ok(projection) => Ok(projection),
            Err(err) => {
                tracing::warn!(error = %err, "remote projection failed, using local estimate");
                Ok(local)
            }
        }
    }

    async fn request(
        &self,
        endpoint: &str,
        buffered_hours: f64,
        daily_dedication: f64,
        start: NaiveDate,
    ) -> Result<DeliveryProjection, ProjectionError> {
        let body = ProjectionRequest {
            buffered_hours,
            daily_dedication,
            start_date: start,
        };

        let send = self.http_client.post(endpoint).json(&body).send();
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| ProjectionError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        if !response.status().is_success() {
            return Err(ProjectionError::BadStatus {
                status: response.status().as_u16(),
            });
        }

        let decoded: ProjectionResponse = response.json().await?;
        Ok(DeliveryProjection {
            estimated_date: decoded.estimated_date,
            work_days: decoded.work_days,
        })
    }
}
