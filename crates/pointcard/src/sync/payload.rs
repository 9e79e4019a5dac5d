//! Wire types for the aggregation endpoint

use serde::{Deserialize, Serialize};

use crate::identity::DeviceId;
use crate::queue::QueuedScan;
use crate::settings::Settings;

/// Action name of the post-sync notification
pub const UPDATE_LAST_SYNC_ACTION: &str = "updateLastSyncTime";

/// One batch upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Store the scans belong to
    pub store_id: String,
    /// Points per scan
    pub point_value: u32,
    /// Device that captured the batch
    pub device_id: String,
    /// Scans in queue order
    pub data: Vec<SyncRecord>,
}

/// One scan as transmitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// 14-digit member ID
    pub member_id: String,
    /// ISO-8601 capture time
    pub timestamp: String,
}

impl SyncRequest {
    /// Build the payload for a queue snapshot
    pub fn new(settings: &Settings, device_id: &DeviceId, batch: &[QueuedScan]) -> Self {
        Self {
            store_id: settings.store_id.clone(),
            point_value: settings.point_value,
            device_id: device_id.to_string(),
            data: batch
                .iter()
                .map(|queued| SyncRecord {
                    member_id: queued.entry.member_id.to_string(),
                    timestamp: queued.entry.timestamp_iso(),
                })
                .collect(),
        }
    }
}

/// Endpoint answer; `status == 200` means the batch was accepted
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    /// Application-level status code
    pub status: Option<i64>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

impl SyncResponse {
    /// Whether the endpoint accepted the batch
    pub fn is_accepted(&self) -> bool {
        self.status == Some(200)
    }
}

/// Best-effort "this device just synced" notice
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    /// Always [`UPDATE_LAST_SYNC_ACTION`]
    pub action: &'static str,
    /// Device that synced
    pub device_id: String,
}

impl NotifyRequest {
    /// Notice for `device_id`
    pub fn last_sync(device_id: &DeviceId) -> Self {
        Self {
            action: UPDATE_LAST_SYNC_ACTION,
            device_id: device_id.to_string(),
        }
    }
}

/// URL receiving the post-sync notification
///
/// A trailing `/exec` path segment is swapped for `/dev`; any other endpoint
/// is notified at its own URL. Only the last segment is considered: an
/// `/exec` elsewhere in the path (`/exec/v2`, `/executive`) is left alone.
pub fn notify_url(endpoint_url: &str) -> String {
    let (base, query) = match endpoint_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (endpoint_url, None),
    };

    let base = match base.strip_suffix("/exec") {
        Some(prefix) => format!("{prefix}/dev"),
        None => base.to_string(),
    };

    match query {
        Some(query) => format!("{base}?{query}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::validate;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_request_shape() {
        let settings = Settings::new("https://x.example/exec", "store-7", 5).unwrap();
        let device_id = DeviceId::generate();
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let batch = vec![QueuedScan {
            seq: 9,
            entry: validate("12345678901234", &device_id, ts).unwrap(),
        }];

        let json = serde_json::to_value(SyncRequest::new(&settings, &device_id, &batch)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "storeId": "store-7",
                "pointValue": 5,
                "deviceId": device_id.to_string(),
                "data": [{ "memberId": "12345678901234", "timestamp": "2024-01-02T03:04:05.000Z" }]
            })
        );
    }

    #[test]
    fn test_response_acceptance() {
        let ok: SyncResponse = serde_json::from_str(r#"{"status":200,"message":"ok"}"#).unwrap();
        assert!(ok.is_accepted());

        let rejected: SyncResponse = serde_json::from_str(r#"{"status":400,"message":"bad"}"#).unwrap();
        assert!(!rejected.is_accepted());

        let missing: SyncResponse = serde_json::from_str(r#"{"message":"?"}"#).unwrap();
        assert!(!missing.is_accepted());
    }

    #[test]
    fn test_notify_body() {
        let device_id = DeviceId::generate();
        let json = serde_json::to_value(NotifyRequest::last_sync(&device_id)).unwrap();
        assert_eq!(json["action"], "updateLastSyncTime");
        assert_eq!(json["deviceId"], device_id.to_string());
    }

    #[test]
    fn test_notify_url() {
        assert_eq!(
            notify_url("https://script.example.com/macros/s/ABC/exec"),
            "https://script.example.com/macros/s/ABC/dev"
        );
        assert_eq!(
            notify_url("https://script.example.com/s/exec?key=1"),
            "https://script.example.com/s/dev?key=1"
        );
        assert_eq!(notify_url("http://127.0.0.1:8080/sync"), "http://127.0.0.1:8080/sync");
        assert_eq!(notify_url("https://x.example/executive"), "https://x.example/executive");
        assert_eq!(notify_url("https://x.example/exec/v2"), "https://x.example/exec/v2");
    }
}
