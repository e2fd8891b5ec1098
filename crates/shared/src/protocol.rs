use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{RequestId, SongLevel},
    error::{ErrorCode, TaskException},
};

/// Messages the page posts to a service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceWorkerMessage {
    SkipWaiting,
    RefreshAssets {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// One entry of the adaptive practice log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeEvent {
    pub id: String,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongEvent {
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub skill_scores: BTreeMap<String, f64>,
    pub weakest_skill: String,
    pub skill_label: String,
    pub song_level: SongLevel,
    pub recommended_game_id: String,
    pub recommended_game_label: String,
    pub coach_action_message: String,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    OpfsSyncTest {
        request_id: RequestId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload_bytes: Option<usize>,
    },
    ComputeRecommendations {
        request_id: RequestId,
        #[serde(default)]
        adaptive_log: Vec<PracticeEvent>,
        #[serde(default)]
        song_events: Vec<SongEvent>,
    },
}

impl WorkerRequest {
    pub fn storage_self_test(payload_bytes: Option<usize>) -> Self {
        Self::OpfsSyncTest {
            request_id: RequestId::new(),
            payload_bytes,
        }
    }

    pub fn compute_recommendations(
        adaptive_log: Vec<PracticeEvent>,
        song_events: Vec<SongEvent>,
    ) -> Self {
        Self::ComputeRecommendations {
            request_id: RequestId::new(),
            adaptive_log,
            song_events,
        }
    }

    pub fn request_id(&self) -> RequestId {
        match self {
            Self::OpfsSyncTest { request_id, .. }
            | Self::ComputeRecommendations { request_id, .. } => *request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::OpfsSyncTest { .. } => "OPFS_SYNC_TEST",
            Self::ComputeRecommendations { .. } => "COMPUTE_RECOMMENDATIONS",
        }
    }

    /// The failure reply matching this request's kind.
    pub fn failure(&self, err: &TaskException) -> WorkerResponse {
        let request_id = self.request_id();
        let error = Some(err.message.clone());
        let error_code = Some(err.code);
        match self {
            Self::OpfsSyncTest { .. } => WorkerResponse::OpfsSyncTestResult {
                request_id,
                ok: false,
                bytes: None,
                ms: None,
                error,
                error_code,
            },
            Self::ComputeRecommendations { .. } => WorkerResponse::RecommendationsResult {
                request_id,
                ok: false,
                recommendations: None,
                error,
                error_code,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    OpfsSyncTestResult {
        request_id: RequestId,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bytes: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
    RecommendationsResult {
        request_id: RequestId,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recommendations: Option<Recommendations>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<ErrorCode>,
    },
}

impl WorkerResponse {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::OpfsSyncTestResult { request_id, .. }
            | Self::RecommendationsResult { request_id, .. } => *request_id,
        }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Self::OpfsSyncTestResult { ok, .. } | Self::RecommendationsResult { ok, .. } => *ok,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::OpfsSyncTestResult { error, .. } | Self::RecommendationsResult { error, .. } => {
                error.as_deref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn skip_waiting_uses_type_tag() {
        let value = serde_json::to_value(ServiceWorkerMessage::SkipWaiting).expect("encode");
        assert_eq!(value, json!({ "type": "SKIP_WAITING" }));

        let refresh = serde_json::to_value(ServiceWorkerMessage::RefreshAssets {
            reason: Some("online".into()),
        })
        .expect("encode");
        assert_eq!(refresh, json!({ "type": "REFRESH_ASSETS", "reason": "online" }));
    }

    #[test]
    fn failure_reply_keeps_request_id_and_omits_result_fields() {
        let request = WorkerRequest::storage_self_test(None);
        let reply = request.failure(&TaskException::unsupported("OPFS unavailable"));
        assert_eq!(reply.request_id(), request.request_id());

        let value = serde_json::to_value(&reply).expect("encode");
        assert_eq!(value["type"], "OPFS_SYNC_TEST_RESULT");
        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "OPFS unavailable");
        assert!(value.get("bytes").is_none());
    }

    #[test]
    fn recommendations_request_accepts_missing_collections() {
        let raw = json!({
            "type": "COMPUTE_RECOMMENDATIONS",
            "request_id": "6f9619ff-8b86-4d01-b42d-00cf4fc964ff",
        });
        let request: WorkerRequest = serde_json::from_value(raw).expect("decode");
        match request {
            WorkerRequest::ComputeRecommendations {
                adaptive_log,
                song_events,
                ..
            } => {
                assert!(adaptive_log.is_empty());
                assert!(song_events.is_empty());
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
