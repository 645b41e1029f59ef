//! Compile resolved request parameters into the engine node graph
//!
//! Pure function: no I/O, no clock, no randomness. The same parameters and
//! settings always produce the same graph; different parameters change only
//! literal inputs, never ids, kinds or wiring.

use crate::params::ResolvedParameters;

use super::template::{ids, kinds, TemplateSettings, VOCALS_OUTPUT};
use super::types::{Graph, Node};
use super::validate::GraphIntegrityError;

/// Build the talking-head graph for one request
///
/// Returns `GraphIntegrityError` only if the template itself is miswired.
pub fn build_graph(
    params: &ResolvedParameters,
    settings: &TemplateSettings,
    client_id: &str,
) -> Result<Graph, GraphIntegrityError> {
    let nodes = vec![
        // Output dimensions
        Node::new(ids::WIDTH, kinds::INT_CONSTANT).with("value", params.width),
        Node::new(ids::HEIGHT, kinds::INT_CONSTANT).with("value", params.height),
        // Model loaders
        Node::new(ids::MULTITALK_MODEL, kinds::MULTITALK_MODEL_LOADER)
            .with("model", &settings.multitalk_model),
        Node::new(ids::BLOCK_SWAP, kinds::BLOCK_SWAP)
            .with("blocks_to_swap", settings.blocks_to_swap)
            .with("offload_img_emb", false)
            .with("offload_txt_emb", false)
            .with("use_non_blocking", true)
            .with("vace_blocks_to_swap", 0u32),
        Node::new(ids::VIDEO_MODEL, kinds::VIDEO_MODEL_LOADER)
            .with("model", &settings.video_model)
            .with("base_precision", &settings.base_precision)
            .with("quantization", &settings.quantization)
            .with("load_device", &settings.load_device)
            .with("attention_mode", &settings.attention_mode)
            .with_port("block_swap_args", ids::BLOCK_SWAP, 0)
            .with_port("multitalk_model", ids::MULTITALK_MODEL, 0),
        Node::new(ids::T5_ENCODER, kinds::T5_ENCODER_LOADER)
            .with("model_name", &settings.t5_model)
            .with("precision", &settings.t5_precision)
            .with("load_device", "offload_device")
            .with("quantization", "disabled"),
        Node::new(ids::WAV2VEC_MODEL, kinds::WAV2VEC_LOADER)
            .with("model", &settings.wav2vec_model)
            .with("base_precision", &settings.wav2vec_precision)
            .with("load_device", &settings.load_device),
        // Reference image
        Node::new(ids::LOAD_IMAGE, kinds::LOAD_IMAGE)
            .with("image", &params.image)
            .with("upload", "image"),
        Node::new(ids::RESIZE_IMAGE, kinds::RESIZE_IMAGE)
            .with_port("width", ids::WIDTH, 0)
            .with_port("height", ids::HEIGHT, 0)
            .with_port("image", ids::LOAD_IMAGE, 0)
            .with("upscale_method", &settings.upscale_method)
            .with("keep_proportion", &settings.keep_proportion)
            .with("pad_color", &settings.pad_color)
            .with("crop_position", &settings.crop_position)
            .with("divisible_by", settings.divisible_by)
            .with("device", &settings.resize_device),
        // Driving audio
        Node::new(ids::LOAD_AUDIO, kinds::LOAD_AUDIO)
            .with("audio", &params.audio)
            .with("upload", "audio"),
        Node::new(ids::CROP_AUDIO, kinds::CROP_AUDIO)
            .with("start_time", "0:00")
            .with("end_time", params.audio_end_timestamp())
            .with_port("audio", ids::LOAD_AUDIO, 0),
        Node::new(ids::SEPARATE_AUDIO, kinds::SEPARATE_AUDIO)
            .with("chunk_fade_shape", &settings.separation_chunk_fade_shape)
            .with("chunk_length", settings.separation_chunk_length)
            .with("chunk_overlap", settings.separation_chunk_overlap)
            .with_port("audio", ids::CROP_AUDIO, 0),
        // Conditioning
        Node::new(ids::TEXT_ENCODE, kinds::TEXT_ENCODE)
            .with("positive_prompt", &params.text_prompt)
            .with("negative_prompt", &settings.negative_prompt)
            .with("force_offload", settings.force_offload)
            .with("use_disk_cache", settings.use_disk_cache)
            .with("device", &settings.text_encode_device)
            .with_port("t5", ids::T5_ENCODER, 0),
        Node::new(ids::AUDIO_EMBEDS, kinds::AUDIO_EMBEDS)
            .with("normalize_loudness", settings.normalize_loudness)
            .with("num_frames", params.total_frames())
            .with("fps", params.frame_rate)
            .with("audio_scale", settings.audio_scale)
            .with("audio_cfg_scale", settings.audio_cfg_scale)
            .with("multi_audio_type", &settings.multi_audio_type)
            .with_port("wav2vec_model", ids::WAV2VEC_MODEL, 0)
            .with_port("audio_1", ids::SEPARATE_AUDIO, VOCALS_OUTPUT),
    ];

    let graph = Graph::new(client_id, nodes)?;

    tracing::debug!(
        nodes = graph.len(),
        total_frames = params.total_frames(),
        "Built generation graph"
    );

    Ok(graph)
}
