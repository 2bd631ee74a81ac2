//! Narration voice catalogue.

use schemars::JsonSchema;
use serde::Serialize;

/// A synthesis voice selectable by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Voice {
    pub id: &'static str,
    pub label: &'static str,
}

/// Voices addressable by `voice_index`.
pub const VOICES: [Voice; 5] = [
    Voice { id: "zh-CN-XiaoxiaoNeural", label: "Xiaoxiao (female)" },
    Voice { id: "zh-CN-YunyangNeural", label: "Yunyang (male, news)" },
    Voice { id: "zh-CN-XiaoyiNeural", label: "Xiaoyi (female)" },
    Voice { id: "zh-CN-YunxiNeural", label: "Yunxi (male)" },
    Voice { id: "zh-CN-YunjianNeural", label: "Yunjian (male, sports)" },
];

pub const DEFAULT_VOICE: Voice = VOICES[0];

impl Voice {
    pub fn by_index(index: usize) -> Option<Voice> {
        VOICES.get(index).copied()
    }
}
