//! Message protocol between the tracker and the inference worker.
//!
//! Every message is JSON-serialisable with a `type` discriminator:
//!
//! ```text
//! tracker ──▶ worker                      worker ──▶ tracker
//! {"type":"init", wasmUrl, modelUrl,      {"type":"ready"}
//!                 maxHands}               {"type":"error", message}
//! {"type":"infer", timestampMs}  + frame  {"type":"result", timestampMs,
//! {"type":"stop"}                                          inferMs, result}
//! ```
//!
//! The frame of an `infer` request is moved into the message and never
//! serialised.  `stop` has no reply.

use serde::{Deserialize, Serialize};

use crate::camera::VideoFrame;

use super::detector::{DetectionResult, DetectorOptions};

/// Result payload of a `result` reply.
pub type WorkerResult = DetectionResult;

/// Tracker → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerRequest {
    #[serde(rename_all = "camelCase")]
    Init {
        wasm_url: String,
        model_url: String,
        max_hands: usize,
    },
    #[serde(rename_all = "camelCase")]
    Infer {
        #[serde(skip)]
        frame: VideoFrame,
        timestamp_ms: f64,
    },
    Stop {},
}

impl WorkerRequest {
    pub fn init(options: &DetectorOptions) -> Self {
        Self::Init {
            wasm_url: options.wasm_url.clone(),
            model_url: options.model_url.clone(),
            max_hands: options.max_hands,
        }
    }

    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Infer { .. } => "infer",
            Self::Stop {} => "stop",
        }
    }
}

/// Worker → tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerReply {
    Ready,
    Error {
        message: String,
    },
    #[serde(rename = "result", rename_all = "camelCase")]
    InferResult {
        timestamp_ms: f64,
        infer_ms: f64,
        result: Option<WorkerResult>,
    },
}

impl WorkerReply {
    /// The `type` tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error { .. } => "error",
            Self::InferResult { .. } => "result",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Category, Vec2};
    use serde_json::{json, Value};

    #[test]
    fn init_wire_shape() {
        let msg = WorkerRequest::init(&DetectorOptions {
            wasm_url: "/wasm".into(),
            model_url: "/hand.task".into(),
            max_hands: 2,
        });
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({"type": "init", "wasmUrl": "/wasm", "modelUrl": "/hand.task", "maxHands": 2})
        );
    }

    #[test]
    fn infer_does_not_serialise_frame() {
        let msg = WorkerRequest::Infer {
            frame: VideoFrame {
                width: 2,
                height: 1,
                presentation_time_ms: 5.0,
                pixels: vec![0; 8],
            },
            timestamp_ms: 12.5,
        };
        let v: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, json!({"type": "infer", "timestampMs": 12.5}));
        assert_eq!(msg.kind(), "infer");
    }

    #[test]
    fn stop_wire_shape() {
        let v: Value = serde_json::to_value(&WorkerRequest::Stop {}).unwrap();
        assert_eq!(v, json!({"type": "stop"}));
    }

    #[test]
    fn reply_tags() {
        assert_eq!(
            serde_json::to_value(&WorkerReply::Ready).unwrap(),
            json!({"type": "ready"})
        );
        assert_eq!(
            serde_json::to_value(&WorkerReply::Error {
                message: "boom".into()
            })
            .unwrap(),
            json!({"type": "error", "message": "boom"})
        );
    }

    #[test]
    fn result_reply_parses_detector_shape() {
        let mut pts = Vec::new();
        for i in 0..21 {
            pts.push(json!({"x": i as f64 / 100.0, "y": 0.5}));
        }
        let raw = json!({
            "type": "result",
            "timestampMs": 100.0,
            "inferMs": 7.5,
            "result": {
                "landmarks": [pts],
                "handednesses": [[{"displayName": "Left", "score": 0.93}]]
            }
        });
        let reply: WorkerReply = serde_json::from_value(raw).unwrap();
        match reply {
            WorkerReply::InferResult {
                timestamp_ms,
                infer_ms,
                result: Some(r),
            } => {
                assert_eq!(timestamp_ms, 100.0);
                assert_eq!(infer_ms, 7.5);
                assert_eq!(r.landmarks[0].len(), 21);
                assert_eq!(r.landmarks[0][3], Vec2::new(0.03, 0.5));
                let cats: &Vec<Category> = &r.handednesses.as_ref().unwrap()[0];
                assert_eq!(cats[0].display_name.as_deref(), Some("Left"));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn null_result_is_none() {
        let reply: WorkerReply = serde_json::from_value(
            json!({"type": "result", "timestampMs": 1.0, "inferMs": 2.0, "result": null}),
        )
        .unwrap();
        assert_eq!(
            reply,
            WorkerReply::InferResult {
                timestamp_ms: 1.0,
                infer_ms: 2.0,
                result: None
            }
        );
        assert_eq!(reply.kind(), "result");
    }
}
