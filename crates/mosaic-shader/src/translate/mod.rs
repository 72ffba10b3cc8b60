//! WGSL to SPIR-V translation.
//!
//! The pipeline is parse, verify, (optionally) the vertex pulling rewrite, type resolution of
//! the rewritten module, and SPIR-V generation. Every stage fails fast with a
//! [`TranslationError`] naming the stage.

mod vertex_pulling;

use naga::back::spv;
use naga::proc::{BoundsCheckPolicies, BoundsCheckPolicy};
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use tracing::debug;

use crate::config::TranslateOptions;
use crate::error::{TranslationError, TranslationStage};
use crate::ir_validator::error_chain;

pub use vertex_pulling::{VertexAttribute, VertexBufferLayout, VertexState};

/// Translates WGSL source into a SPIR-V 1.3 module containing every entry point.
pub fn translate(source: &str, options: &TranslateOptions) -> Result<Vec<u32>, TranslationError> {
    let (module, info) = parse_and_verify(source)?;
    let words = generate(&module, &info, options, None)?;
    debug!(words = words.len(), "translated WGSL to SPIR-V");
    Ok(words)
}

/// Translates WGSL source, rewriting the vertex entry point `entry_point` to fetch its inputs
/// from storage buffers bound at `pulling_group` instead of vertex attributes.
///
/// Only `entry_point` is emitted.
pub fn translate_with_vertex_pulling(
    source: &str,
    vertex_state: &VertexState,
    entry_point: &str,
    pulling_group: u32,
    options: &TranslateOptions,
) -> Result<Vec<u32>, TranslationError> {
    let (mut module, _) = parse_and_verify(source)?;
    vertex_pulling::apply(&mut module, vertex_state, entry_point, pulling_group)
        .map_err(|message| TranslationError::new(TranslationStage::VertexPulling, message))?;

    let info = validator().validate(&module).map_err(|err| {
        TranslationError::new(TranslationStage::TypeResolution, error_chain(&err))
    })?;

    let pipeline = spv::PipelineOptions {
        shader_stage: naga::ShaderStage::Vertex,
        entry_point: entry_point.to_owned(),
    };
    let words = generate(&module, &info, options, Some(&pipeline))?;
    debug!(
        entry_point,
        pulling_group,
        buffers = vertex_state.vertex_buffers.len(),
        words = words.len(),
        "translated WGSL to SPIR-V with vertex pulling"
    );
    Ok(words)
}

/// Creation-time check for WGSL modules: parse and verify without generating code.
pub fn validate_wgsl(source: &str) -> Result<(), TranslationError> {
    parse_and_verify(source).map(|_| ())
}

fn validator() -> Validator {
    Validator::new(ValidationFlags::all(), Capabilities::all())
}

fn parse_and_verify(source: &str) -> Result<(naga::Module, ModuleInfo), TranslationError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        TranslationError::new(TranslationStage::Parse, err.emit_to_string(source))
    })?;
    let info = validator().validate(&module).map_err(|err| {
        TranslationError::new(TranslationStage::Verify, err.emit_to_string(source))
    })?;
    Ok((module, info))
}

fn generate(
    module: &naga::Module,
    info: &ModuleInfo,
    options: &TranslateOptions,
    pipeline: Option<&spv::PipelineOptions>,
) -> Result<Vec<u32>, TranslationError> {
    let policy = if options.robust_buffer_access {
        BoundsCheckPolicy::Restrict
    } else {
        BoundsCheckPolicy::Unchecked
    };
    let spv_options = spv::Options {
        lang_version: (1, 3),
        flags: spv::WriterFlags::DEBUG | spv::WriterFlags::LABEL_VARYINGS,
        bounds_check_policies: BoundsCheckPolicies {
            index: policy,
            buffer: policy,
            image_load: policy,
            ..Default::default()
        },
        ..Default::default()
    };
    spv::write_vec(module, info, &spv_options, pipeline)
        .map_err(|err| TranslationError::new(TranslationStage::Generate, error_chain(&err)))
}
