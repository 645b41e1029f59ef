//! Versioned talking-head graph template
//!
//! Node ids, node kinds and wiring are fixed per template version. Model
//! file names and tuning constants are data in [`TemplateSettings`] and can
//! be overridden from the `[template]` config section.

use serde::Deserialize;
use talkgen_common::{Error, Result};

/// Bumped whenever node ids, kinds or wiring change
pub const TEMPLATE_VERSION: &str = "infinitetalk-single/2";

/// Node ids used by the template
pub mod ids {
    pub const WIDTH: &str = "210";
    pub const HEIGHT: &str = "211";
    pub const MULTITALK_MODEL: &str = "120";
    pub const BLOCK_SWAP: &str = "134";
    pub const VIDEO_MODEL: &str = "122";
    pub const T5_ENCODER: &str = "136";
    pub const WAV2VEC_MODEL: &str = "137";
    pub const LOAD_IMAGE: &str = "207";
    pub const RESIZE_IMAGE: &str = "171";
    pub const LOAD_AUDIO: &str = "217";
    pub const CROP_AUDIO: &str = "159";
    pub const SEPARATE_AUDIO: &str = "170";
    pub const TEXT_ENCODE: &str = "135";
    pub const AUDIO_EMBEDS: &str = "194";
}

/// Node kind tags understood by the engine
pub mod kinds {
    pub const INT_CONSTANT: &str = "INTConstant";
    pub const MULTITALK_MODEL_LOADER: &str = "MultiTalkModelLoader";
    pub const BLOCK_SWAP: &str = "WanVideoBlockSwap";
    pub const VIDEO_MODEL_LOADER: &str = "WanVideoModelLoader";
    pub const T5_ENCODER_LOADER: &str = "LoadWanVideoT5TextEncoder";
    pub const WAV2VEC_LOADER: &str = "DownloadAndLoadWav2VecModel";
    pub const LOAD_IMAGE: &str = "LoadImage";
    pub const RESIZE_IMAGE: &str = "ImageResizeKJv2";
    pub const LOAD_AUDIO: &str = "LoadAudio";
    pub const CROP_AUDIO: &str = "AudioCrop";
    pub const SEPARATE_AUDIO: &str = "AudioSeparation";
    pub const TEXT_ENCODE: &str = "WanVideoTextEncode";
    pub const AUDIO_EMBEDS: &str = "MultiTalkWav2VecEmbeds";
}

/// Output index of the vocals stem on the separation node
pub const VOCALS_OUTPUT: u32 = 3;

/// Model names and tuning constants baked into the template
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSettings {
    // Model loaders
    pub multitalk_model: String,
    pub video_model: String,
    pub base_precision: String,
    pub quantization: String,
    pub load_device: String,
    pub attention_mode: String,
    pub blocks_to_swap: u32,
    pub t5_model: String,
    pub t5_precision: String,
    pub wav2vec_model: String,
    pub wav2vec_precision: String,

    // Image resize
    pub upscale_method: String,
    pub keep_proportion: String,
    pub pad_color: String,
    pub crop_position: String,
    pub divisible_by: u32,
    pub resize_device: String,

    // Text encoder
    pub negative_prompt: String,
    pub force_offload: bool,
    pub use_disk_cache: bool,
    pub text_encode_device: String,

    // Audio
    pub separation_chunk_fade_shape: String,
    pub separation_chunk_length: f64,
    pub separation_chunk_overlap: f64,
    pub normalize_loudness: bool,
    pub audio_scale: f64,
    pub audio_cfg_scale: f64,
    pub multi_audio_type: String,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            multitalk_model: "Wan2_1-InfiniteTalk-Single_fp8_e4m3fn_scaled_KJ.safetensors".to_string(),
            video_model: "Wan14Bi2vFusioniX.safetensors".to_string(),
            base_precision: "bf16".to_string(),
            quantization: "disabled".to_string(),
            load_device: "main_device".to_string(),
            attention_mode: "sdpa".to_string(),
            blocks_to_swap: 20,
            t5_model: "umt5-xxl-enc-bf16.safetensors".to_string(),
            t5_precision: "bf16".to_string(),
            wav2vec_model: "TencentGameMate/chinese-wav2vec2-base".to_string(),
            wav2vec_precision: "fp16".to_string(),

            upscale_method: "lanczos".to_string(),
            keep_proportion: "pad_edge".to_string(),
            pad_color: "0, 0, 0".to_string(),
            crop_position: "center".to_string(),
            divisible_by: 2,
            resize_device: "cpu".to_string(),

            negative_prompt: "bright tones, overexposed, static, blurred details, poor quality"
                .to_string(),
            force_offload: true,
            use_disk_cache: false,
            text_encode_device: "gpu".to_string(),

            separation_chunk_fade_shape: "linear".to_string(),
            separation_chunk_length: 10.0,
            separation_chunk_overlap: 0.1,
            normalize_loudness: true,
            audio_scale: 1.2,
            audio_cfg_scale: 1.2,
            multi_audio_type: "add".to_string(),
        }
    }
}

impl TemplateSettings {
    /// Build settings from the raw `[template]` config table
    ///
    /// Keys not present keep their defaults; unknown keys are rejected.
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [template] section: {}", e)))
    }
}
