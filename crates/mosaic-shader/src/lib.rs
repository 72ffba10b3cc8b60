//! Shader modules: creation from SPIR-V or WGSL, validation, reflection and pipeline layout
//! compatibility.
//!
//! A [`Device`] validates a [`ShaderModuleDescriptor`], translates WGSL to SPIR-V, and
//! deduplicates modules with identical SPIR-V through a content-addressed cache. Reflection
//! into [`EntryPointMetadata`] runs lazily, once per module, with the backend selected by
//! [`ShaderModuleConfig::reflection_backend`].

pub mod cache;
pub mod compat;
pub mod config;
pub mod device;
pub mod error;
pub mod ir_validator;
pub mod layout;
pub mod limits;
pub mod module;
pub mod reflect;
pub mod translate;
pub mod types;

pub use cache::{content_hash, hash_combine, ShaderCacheStats};
pub use compat::{
    compute_required_buffer_sizes_for_layout, validate_compatibility_with_bind_group_layout,
    validate_compatibility_with_pipeline_layout,
};
pub use config::{ParseReflectionBackendError, ReflectionBackend, ShaderModuleConfig, TranslateOptions};
pub use device::Device;
pub use error::{
    CompatibilityError, DescriptorError, LayoutError, ShaderModuleError, TranslationError,
    TranslationStage, ValidationError,
};
pub use ir_validator::{validate_spirv, Diagnostic, DiagnosticLevel, DiagnosticReport};
pub use layout::{BindGroupLayout, BindGroupLayoutEntry, PipelineLayout};
pub use module::{
    ChainedDescriptor, CompilationInfo, CompilationMessage, CompilationMessageKind, ShaderModule,
    ShaderModuleDescriptor, ShaderSourceKind,
};
pub use reflect::{reflector_for, Reflector};
pub use translate::{
    translate, translate_with_vertex_pulling, validate_wgsl, VertexAttribute, VertexBufferLayout,
    VertexState,
};
pub use types::{
    AttributeMask, BindGroupIndex, BindGroupMask, BindingInfoMap, BindingNumber, BindingType,
    EntryPointMetadata, ModuleBindingInfo, RequiredBufferSizes, ShaderBindingInfo, ShaderStages,
    SingleShaderStage,
};
