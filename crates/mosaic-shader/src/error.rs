use std::fmt;

use mosaic_formats::TextureFormat;
use thiserror::Error;

use crate::ir_validator::DiagnosticReport;
use crate::types::{BindGroupIndex, BindingNumber};

/// Malformed or unsupported shader IR. Fatal to the creation or reflection step that detects it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("SPIRV Validation failure:\n{0}")]
    Spirv(DiagnosticReport),
    #[error("SPIR-V module of {words} words exceeds the maximum of {max} words")]
    TooLarge { words: usize, max: usize },
    #[error("failed to parse SPIR-V for reflection: {0}")]
    Parse(String),
    #[error("Shader module declares no entry point")]
    NoEntryPoint,
    #[error("Unexpected shader execution model: {0}")]
    UnsupportedExecutionModel(String),
    #[error("Push constants aren't supported.")]
    PushConstants,
    #[error("Combined images and samplers aren't supported.")]
    CombinedImageSampler,
    #[error("No Binding decoration set for resource `{0}`")]
    MissingBindingDecoration(String),
    #[error("No Descriptor Decoration set for resource `{0}`")]
    MissingDescriptorSetDecoration(String),
    #[error("Bind group index {group} over limits in the SPIRV")]
    BindGroupOverLimit { group: u32 },
    #[error("Binding number {binding} over limits in the SPIRV (set {group})")]
    BindingOverLimit {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error("Shader has duplicate bindings (set {group} binding {binding})")]
    DuplicateBinding {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error("Unsupported resource `{name}`: {reason}")]
    UnsupportedResource { name: String, reason: String },
    #[error("Invalid layout for buffer block `{name}`: {reason}")]
    BufferLayout { name: String, reason: String },
    #[error("Invalid image format declaration on storage image")]
    InvalidImageFormat,
    #[error("The storage texture format {0} is not supported")]
    UnsupportedStorageFormat(TextureFormat),
    #[error("Unexpected texture component base type on `{0}`")]
    UnexpectedComponentType(String),
    #[error("Need location qualifier on vertex input")]
    MissingVertexInputLocation,
    #[error("Attribute location ({0}) over limits in the SPIRV")]
    VertexAttributeOverLimit(u32),
    #[error("Need location qualifier on vertex output")]
    MissingVertexOutputLocation,
    #[error("Need location qualifier on fragment input")]
    MissingFragmentInputLocation,
    #[error("Need location qualifier on fragment output")]
    MissingFragmentOutputLocation,
    #[error("Fragment output location ({0}) over limits in the SPIRV")]
    FragmentOutputOverLimit(u32),
    #[error("Unexpected Fragment output type")]
    UnexpectedFragmentOutputType,
}

/// Stage of the WGSL to SPIR-V pipeline that produced a [`TranslationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TranslationStage {
    Parse,
    Verify,
    VertexPulling,
    TypeResolution,
    Generate,
}

impl fmt::Display for TranslationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TranslationStage::Parse => "Parser",
            TranslationStage::Verify => "Validation",
            TranslationStage::VertexPulling => "Vertex pulling transform",
            TranslationStage::TypeResolution => "Type Determination",
            TranslationStage::Generate => "Generator",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("WGSL->SPIR-V failure:\n{stage}: {message}")]
pub struct TranslationError {
    pub stage: TranslationStage,
    pub message: String,
}

impl TranslationError {
    pub(crate) fn new(stage: TranslationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// A shader/layout mismatch. Fatal to pipeline creation, but the module stays usable with
/// other layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompatibilityError {
    #[error("Missing bind group layout entry for {}", declaration(*group, *binding))]
    MissingLayoutEntry {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The binding type of the bind group layout entry conflicts with {}",
        declaration(*group, *binding)
    )]
    BindingTypeConflict {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The bind group layout entry for {} is not visible for the shader stage",
        declaration(*group, *binding)
    )]
    NotVisible {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The textureComponentType of the bind group layout entry is different from {}",
        declaration(*group, *binding)
    )]
    TextureComponentTypeMismatch {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The viewDimension of the bind group layout entry is different from {}",
        declaration(*group, *binding)
    )]
    ViewDimensionMismatch {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The storageTextureFormat of the bind group layout entry is different from {}",
        declaration(*group, *binding)
    )]
    StorageTextureFormatMismatch {
        group: BindGroupIndex,
        binding: BindingNumber,
    },
    #[error(
        "The minimum buffer size of the bind group layout entry is smaller than {} ({} < {})",
        declaration(*group, *binding),
        layout_size,
        shader_size
    )]
    MinBufferSizeTooSmall {
        group: BindGroupIndex,
        binding: BindingNumber,
        layout_size: u64,
        shader_size: u64,
    },
    #[error("No bind group layout entry matches the declaration set {group} in the shader module")]
    MissingBindGroupLayout { group: BindGroupIndex },
}

fn declaration(group: BindGroupIndex, binding: BindingNumber) -> String {
    format!("the shader module declaration at set {group} binding {binding}")
}

/// Rejected shader module descriptor chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("Shader module descriptor missing chained descriptor")]
    MissingChainedDescriptor,
    #[error("Shader module descriptor chained nextInChain must be nullptr")]
    MultipleChainedDescriptors,
    #[error("Unsupported sType {0:#x}")]
    UnsupportedSType(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("bind group layout declares binding {0} more than once")]
    DuplicateBinding(BindingNumber),
}

/// Failures of [`crate::Device::create_shader_module`] and of the module operations that
/// combine reflection with another step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderModuleError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Compatibility(#[from] CompatibilityError),
    #[error("vertex pulling requires a module created from WGSL source")]
    PullingRequiresWgsl,
}
