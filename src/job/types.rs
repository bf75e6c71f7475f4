use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External generation services the orchestrator can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    ModelsLab,
    Stability,
    HuggingFace,
    OpenAi,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::ModelsLab,
        Provider::Stability,
        Provider::HuggingFace,
        Provider::OpenAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::ModelsLab => "modelslab",
            Provider::Stability => "stability",
            Provider::HuggingFace => "huggingface",
            Provider::OpenAi => "openai",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn env_key(self) -> &'static str {
        match self {
            Provider::ModelsLab => "MODELSLAB_API_KEY",
            Provider::Stability => "STABILITY_API_KEY",
            Provider::HuggingFace => "HUGGINGFACE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown provider: {s}"))
    }
}

/// A generation operation and the payload fields it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "text2img")]
    Text2Img,
    #[serde(rename = "text2video")]
    Text2Video,
    #[serde(rename = "music_gen")]
    MusicGen,
    #[serde(rename = "text_to_3d")]
    TextTo3d,
    #[serde(rename = "single_face_swap")]
    SingleFaceSwap,
    #[serde(rename = "multiple_face_swap")]
    MultipleFaceSwap,
    #[serde(rename = "single_video_swap")]
    SingleVideoSwap,
    #[serde(rename = "specific_video_swap")]
    SpecificVideoSwap,
    #[serde(rename = "chat")]
    Chat,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Text2Img,
        Operation::Text2Video,
        Operation::MusicGen,
        Operation::TextTo3d,
        Operation::SingleFaceSwap,
        Operation::MultipleFaceSwap,
        Operation::SingleVideoSwap,
        Operation::SpecificVideoSwap,
        Operation::Chat,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Text2Img => "text2img",
            Operation::Text2Video => "text2video",
            Operation::MusicGen => "music_gen",
            Operation::TextTo3d => "text_to_3d",
            Operation::SingleFaceSwap => "single_face_swap",
            Operation::MultipleFaceSwap => "multiple_face_swap",
            Operation::SingleVideoSwap => "single_video_swap",
            Operation::SpecificVideoSwap => "specific_video_swap",
            Operation::Chat => "chat",
        }
    }

    /// Payload fields that must be present as non-empty strings.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Operation::Text2Img
            | Operation::Text2Video
            | Operation::MusicGen
            | Operation::TextTo3d
            | Operation::Chat => &["prompt"],
            Operation::SingleFaceSwap | Operation::MultipleFaceSwap => {
                &["init_image", "target_image"]
            }
            Operation::SingleVideoSwap => &["init_video", "target_image"],
            Operation::SpecificVideoSwap => &["init_video", "target_image", "reference_image"],
        }
    }

    pub fn is_face_swap(self) -> bool {
        matches!(
            self,
            Operation::SingleFaceSwap
                | Operation::MultipleFaceSwap
                | Operation::SingleVideoSwap
                | Operation::SpecificVideoSwap
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}
