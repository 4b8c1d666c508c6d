//! REST Store - MLflow tracking server client
//!
//! Speaks the MLflow 2.0 REST API over blocking HTTP:
//!
//! | Operation | Endpoint |
//! |---|---|
//! | look up experiment | `GET  experiments/get-by-name` |
//! | create experiment | `POST experiments/create` |
//! | open run | `POST runs/create` |
//! | log metric | `POST runs/log-metric` |
//! | log parameter | `POST runs/log-parameter` |
//! | record artifact hash | `POST runs/set-tag` |
//! | seal run | `POST runs/update` |

use super::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, TrackingBackend,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

const API_PREFIX: &str = "api/2.0/mlflow";

/// Tracking backend for an MLflow-compatible server.
#[derive(Debug, Clone)]
pub struct RestStore {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ExperimentEnvelope {
    experiment: RemoteExperiment,
}

#[derive(Debug, Deserialize)]
struct RemoteExperiment {
    experiment_id: String,
    name: String,
    #[serde(default)]
    creation_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CreatedExperiment {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct RunEnvelope {
    run: RemoteRun,
}

#[derive(Debug, Deserialize)]
struct RemoteRun {
    info: RemoteRunInfo,
}

#[derive(Debug, Deserialize)]
struct RemoteRunInfo {
    run_id: String,
    #[serde(default)]
    start_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

impl RestStore {
    /// Client for the server at `base_url` (e.g. `http://127.0.0.1:5000`).
    /// No request is made until the first tracking call.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Tracking(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Server base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an API method.
    #[must_use]
    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/{API_PREFIX}/{method}", self.base_url)
    }

    fn post(&self, method: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(method);
        tracing::debug!(%url, "tracking request");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| Error::Tracking(format!("POST {url}: {e}")))?;
        decode(&url, response)
    }

    fn lookup_experiment(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        let url = self.endpoint("experiments/get-by-name");
        let response = self
            .client
            .get(&url)
            .query(&[("experiment_name", name)])
            .send()
            .map_err(|e| Error::Tracking(format!("GET {url}: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = decode(&url, response)?;
        let envelope: ExperimentEnvelope = serde_json::from_value(body)?;
        let remote = envelope.experiment;
        let created_at = remote
            .creation_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        Ok(Some(ExperimentRecord::restore(
            remote.experiment_id,
            remote.name,
            created_at,
        )))
    }
}

fn decode(url: &str, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| Error::Tracking(format!("{url}: unreadable response: {e}")))?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ApiError>(&text).map_or_else(
            |_| text.clone(),
            |api| format!("{}: {}", api.error_code, api.message),
        );
        return Err(Error::Tracking(format!("{url} returned {status}: {detail}")));
    }

    if text.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(&text)
        .map_err(|e| Error::Tracking(format!("{url}: malformed response: {e}")))
}

fn millis(at: Option<DateTime<Utc>>) -> i64 {
    at.unwrap_or_else(Utc::now).timestamp_millis()
}

impl TrackingBackend for RestStore {
    fn get_or_create_experiment(&mut self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self.lookup_experiment(name)? {
            return Ok(existing);
        }
        let body = self.post("experiments/create", &json!({ "name": name }))?;
        let created: CreatedExperiment = serde_json::from_value(body)?;
        tracing::info!(experiment = name, id = %created.experiment_id, "created experiment");
        Ok(ExperimentRecord::new(created.experiment_id, name))
    }

    fn create_run(&mut self, experiment_id: &str, run_name: &str) -> Result<RunRecord> {
        let started = Utc::now();
        let body = self.post(
            "runs/create",
            &json!({
                "experiment_id": experiment_id,
                "run_name": run_name,
                "start_time": started.timestamp_millis(),
            }),
        )?;
        let envelope: RunEnvelope = serde_json::from_value(body)?;
        let info = envelope.run.info;
        let started_at = info
            .start_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(started);
        Ok(RunRecord::open(info.run_id, experiment_id, run_name).started(started_at))
    }

    fn log_param(&mut self, param: &ParamRecord) -> Result<()> {
        self.post(
            "runs/log-parameter",
            &json!({
                "run_id": param.run_id(),
                "key": param.key(),
                "value": param.value(),
            }),
        )
        .map(|_| ())
    }

    fn log_metric(&mut self, metric: &MetricRecord) -> Result<()> {
        self.post(
            "runs/log-metric",
            &json!({
                "run_id": metric.run_id(),
                "key": metric.key(),
                "value": metric.value(),
                "timestamp": metric.timestamp_millis(),
                "step": metric.step(),
            }),
        )
        .map(|_| ())
    }

    fn log_artifact(&mut self, artifact: &ArtifactRecord) -> Result<()> {
        self.post(
            "runs/set-tag",
            &json!({
                "run_id": artifact.run_id(),
                "key": format!("artifact.{}", artifact.key()),
                "value": artifact.to_string(),
            }),
        )
        .map(|_| ())
    }

    fn update_run(&mut self, run: &RunRecord) -> Result<()> {
        let mut body = json!({
            "run_id": run.run_id(),
            "status": run.status().as_str(),
        });
        if run.status().is_terminal() {
            body["end_time"] = json!(millis(run.ended_at()));
        }
        self.post("runs/update", &body).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let store = RestStore::new("http://127.0.0.1:62686/").unwrap();
        assert_eq!(store.base_url(), "http://127.0.0.1:62686");
        assert_eq!(
            store.endpoint("runs/create"),
            "http://127.0.0.1:62686/api/2.0/mlflow/runs/create"
        );
    }

    #[test]
    fn test_unreachable_server_is_tracking_error() {
        // Port 9 (discard) on localhost is not an MLflow server.
        let mut store = RestStore::new("http://127.0.0.1:9").unwrap();
        let err = store.get_or_create_experiment("exp").unwrap_err();
        assert!(matches!(err, Error::Tracking(_)));
    }
}
