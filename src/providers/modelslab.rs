//! ModelsLab: image, video, music, 3D and face-swap endpoints.
//!
//! The API key travels in the JSON body. Slow jobs answer with
//! `status: "processing"` and a `fetch_result` URL that is polled with the
//! same key.

use serde_json::{Map, Value, json};
use url::Url;

use super::{ProviderAdapter, TransportErrorPolicy, join_url};
use crate::classify::{PollRules, RawResponse};
use crate::error::Result;
use crate::job::{Credentials, JobRequest, Operation, Provider};
use crate::transport::{Auth, HttpCall, TransportResponse};

pub const DEFAULT_BASE_URL: &str = "https://modelslab.com/api/v6";

pub struct ModelsLabAdapter {
    base_url: String,
}

impl ModelsLabAdapter {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn path(operation: Operation) -> Option<&'static str> {
        Some(match operation {
            Operation::Text2Img => "realtime/text2img",
            Operation::Text2Video => "video/text2video",
            Operation::MusicGen => "voice/music_gen",
            Operation::TextTo3d => "3d/text_to_3d",
            Operation::SingleFaceSwap => "deepfake/single_face_swap",
            Operation::MultipleFaceSwap => "deepfake/multiple_face_swap",
            Operation::SingleVideoSwap => "deepfake/single_video_swap",
            Operation::SpecificVideoSwap => "deepfake/specific_video_swap",
            Operation::Chat => return None,
        })
    }

    fn defaults(operation: Operation) -> Value {
        match operation {
            Operation::Text2Img => json!({
                "negative_prompt": "",
                "width": "512",
                "height": "512",
                "samples": "1",
                "safety_checker": false,
                "base64": false,
            }),
            Operation::Text2Video => json!({
                "negative_prompt": "",
                "num_frames": 16,
                "num_inference_steps": 20,
                "output_type": "mp4",
            }),
            op if op.is_face_swap() => json!({
                "watermark": false,
                "base64": false,
            }),
            _ => json!({}),
        }
    }
}

impl ProviderAdapter for ModelsLabAdapter {
    fn provider(&self) -> Provider {
        Provider::ModelsLab
    }

    fn supports(&self, operation: Operation) -> bool {
        Self::path(operation).is_some()
    }

    fn submit_call(&self, job: &JobRequest) -> Result<HttpCall> {
        let path = Self::path(job.operation()).unwrap_or_default();
        let url = join_url(&self.base_url, path)?;

        let mut body = match Self::defaults(job.operation()) {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in job.payload() {
            body.insert(key.clone(), value.clone());
        }
        body.insert("key".into(), Value::String(job.credentials().expose().to_string()));

        Ok(HttpCall::new(url, Auth::None, Value::Object(body)))
    }

    fn normalize(&self, response: &TransportResponse) -> Option<RawResponse> {
        RawResponse::from_value(response.body.as_json()?)
    }

    fn poll_call(&self, handle: &Url, credentials: &Credentials) -> HttpCall {
        HttpCall::new(
            handle.clone(),
            Auth::None,
            json!({ "key": credentials.expose() }),
        )
    }

    fn poll_rules(&self, _operation: Operation) -> PollRules {
        PollRules {
            future_links_as_success: true,
        }
    }

    // Image and video fetchers give up on the first network error; the
    // others keep polling.
    fn transport_error_policy(&self, operation: Operation) -> TransportErrorPolicy {
        match operation {
            Operation::Text2Img | Operation::Text2Video => TransportErrorPolicy::FailFast,
            _ => TransportErrorPolicy::CountAsAttempt,
        }
    }
}
