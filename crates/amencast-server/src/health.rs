//! `/health` response body.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use amencast_pipeline::Stage;

/// Per-stage line of the health response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageHealth {
    /// Stage name.
    pub name: &'static str,
    /// Streams this stage currently holds.
    pub active_streams: usize,
}

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"`, or `"shutting_down"` once shutdown has begun.
    pub status: String,
    /// Streams held across all stages.
    pub active_streams: usize,
    /// Seconds since the worker started.
    pub uptime_secs: u64,
    /// RFC 3339 time of this response.
    pub timestamp: String,
    /// Breakdown per running stage.
    pub stages: Vec<StageHealth>,
}

/// Build a health response from the running stages.
pub fn health_check(
    start_time: Instant,
    stages: &[Arc<dyn Stage>],
    shutting_down: bool,
) -> HealthResponse {
    let stages: Vec<StageHealth> = stages
        .iter()
        .map(|s| StageHealth {
            name: s.name(),
            active_streams: s.active_streams(),
        })
        .collect();
    HealthResponse {
        status: if shutting_down { "shutting_down" } else { "ok" }.into(),
        active_streams: stages.iter().map(|s| s.active_streams).sum(),
        uptime_secs: start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        stages,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use amencast_pipeline::PipelineError;

    use super::*;

    struct Fixed(&'static str, usize);

    #[async_trait]
    impl Stage for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn active_streams(&self) -> usize {
            self.1
        }

        async fn run(&self, _shutdown: CancellationToken) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn stages() -> Vec<Arc<dyn Stage>> {
        vec![
            Arc::new(Fixed("transcription", 2)),
            Arc::new(Fixed("synthesis", 1)),
        ]
    }

    #[test]
    fn status_is_ok() {
        let resp = health_check(Instant::now(), &stages(), false);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, &stages(), false);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn streams_are_summed_across_stages() {
        let resp = health_check(Instant::now(), &stages(), false);
        assert_eq!(resp.active_streams, 3);
        assert_eq!(
            resp.stages[0],
            StageHealth {
                name: "transcription",
                active_streams: 2
            }
        );
    }

    #[test]
    fn shutting_down_is_reported() {
        let resp = health_check(Instant::now(), &stages(), true);
        assert_eq!(resp.status, "shutting_down");
    }

    #[test]
    fn serialization_is_camel_case() {
        let resp = health_check(Instant::now(), &stages(), false);
        let parsed = serde_json::to_value(&resp).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["activeStreams"], 3);
        assert_eq!(parsed["stages"][1]["name"], "synthesis");
        assert_eq!(parsed["stages"][1]["activeStreams"], 1);
        assert!(parsed["uptimeSecs"].is_number());
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn no_stages_is_still_healthy() {
        let none: Vec<Arc<dyn Stage>> = Vec::new();
        let resp = health_check(Instant::now(), &none, false);
        assert_eq!(resp.active_streams, 0);
        assert!(resp.stages.is_empty());
    }
}
