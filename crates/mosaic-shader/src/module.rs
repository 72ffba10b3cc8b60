use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, Weak};

use mosaic_formats::TextureComponentType;

use crate::cache::ShaderModuleCache;
use crate::compat;
use crate::config::{ReflectionBackend, TranslateOptions};
use crate::error::{DescriptorError, ShaderModuleError, ValidationError};
use crate::ir_validator::{DiagnosticLevel, DiagnosticReport};
use crate::layout::PipelineLayout;
use crate::limits::MAX_COLOR_ATTACHMENTS;
use crate::reflect::reflector_for;
use crate::translate::{self, VertexState};
use crate::types::{
    AttributeMask, EntryPointMetadata, ModuleBindingInfo, RequiredBufferSizes, SingleShaderStage,
};

/// One link of a shader module descriptor chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainedDescriptor {
    Spirv { code: Vec<u32> },
    Wgsl { source: String },
    /// A chained struct this implementation does not know.
    Unknown { s_type: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderModuleDescriptor {
    pub label: Option<String>,
    pub next_in_chain: Vec<ChainedDescriptor>,
}

impl ShaderModuleDescriptor {
    pub fn spirv(code: Vec<u32>) -> Self {
        Self {
            label: None,
            next_in_chain: vec![ChainedDescriptor::Spirv { code }],
        }
    }

    pub fn wgsl(source: impl Into<String>) -> Self {
        Self {
            label: None,
            next_in_chain: vec![ChainedDescriptor::Wgsl {
                source: source.into(),
            }],
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The source carried by a validated descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShaderSource<'a> {
    Spirv(&'a [u32]),
    Wgsl(&'a str),
}

/// Exactly one SPIR-V or WGSL link is accepted.
pub(crate) fn validate_descriptor(
    descriptor: &ShaderModuleDescriptor,
) -> Result<ShaderSource<'_>, DescriptorError> {
    match descriptor.next_in_chain.as_slice() {
        [] => Err(DescriptorError::MissingChainedDescriptor),
        [ChainedDescriptor::Spirv { code }] => Ok(ShaderSource::Spirv(code)),
        [ChainedDescriptor::Wgsl { source }] => Ok(ShaderSource::Wgsl(source)),
        [ChainedDescriptor::Unknown { s_type }] => Err(DescriptorError::UnsupportedSType(*s_type)),
        [_, ..] => Err(DescriptorError::MultipleChainedDescriptors),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderSourceKind {
    Spirv,
    Wgsl,
}

impl fmt::Display for ShaderSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderSourceKind::Spirv => f.write_str("SPIR-V"),
            ShaderSourceKind::Wgsl => f.write_str("WGSL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilationMessageKind {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationMessage {
    pub kind: CompilationMessageKind,
    /// 0 when the message has no position.
    pub line_num: u64,
    pub message: String,
}

/// Diagnostics gathered while the module was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationInfo {
    pub messages: Vec<CompilationMessage>,
}

impl CompilationInfo {
    pub(crate) fn from_report(report: &DiagnosticReport) -> Self {
        let messages = report
            .diagnostics()
            .iter()
            .map(|d| CompilationMessage {
                kind: match d.level {
                    DiagnosticLevel::Error => CompilationMessageKind::Error,
                    DiagnosticLevel::Warning => CompilationMessageKind::Warning,
                    DiagnosticLevel::Info => CompilationMessageKind::Info,
                },
                line_num: d.position.map_or(0, |p| p as u64),
                message: d.message.clone(),
            })
            .collect();
        Self { messages }
    }

    fn error(reason: &str) -> Self {
        Self {
            messages: vec![CompilationMessage {
                kind: CompilationMessageKind::Error,
                line_num: 0,
                message: reason.to_owned(),
            }],
        }
    }
}

type MemoizedMetadata = Result<Arc<EntryPointMetadata>, ValidationError>;

struct ValidModule {
    source_kind: ShaderSourceKind,
    /// Retained for vertex pulling, which re-translates per pipeline. A module first created
    /// from SPIR-V picks this up from a later WGSL request that translates to the same words.
    wgsl: OnceLock<String>,
    spirv: Vec<u32>,
    content_hash: u64,
    reflection_backend: ReflectionBackend,
    translate_options: TranslateOptions,
    metadata: OnceLock<MemoizedMetadata>,
}

enum ModuleState {
    Valid(ValidModule),
    /// Placeholder for a failed creation. Reflection data must not be queried.
    Error(String),
}

/// Back-reference used to drop the module's cache entry on destruction.
struct CacheLink {
    cache: Weak<Mutex<ShaderModuleCache>>,
    hash: u64,
}

/// Parameters a [`crate::Device`] passes when building a valid module.
pub(crate) struct ValidModuleParts {
    pub source_kind: ShaderSourceKind,
    pub wgsl: Option<String>,
    pub spirv: Vec<u32>,
    pub content_hash: u64,
    pub reflection_backend: ReflectionBackend,
    pub translate_options: TranslateOptions,
    pub compilation_info: CompilationInfo,
}

pub struct ShaderModule {
    label: Option<String>,
    state: ModuleState,
    compilation_info: CompilationInfo,
    cache_link: Option<CacheLink>,
}

impl fmt::Debug for ShaderModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ShaderModule");
        s.field("label", &self.label);
        match &self.state {
            ModuleState::Valid(valid) => s
                .field("source_kind", &valid.source_kind)
                .field("words", &valid.spirv.len())
                .field("content_hash", &valid.content_hash),
            ModuleState::Error(reason) => s.field("error", reason),
        };
        s.finish()
    }
}

impl ShaderModule {
    pub(crate) fn new_valid(
        label: Option<String>,
        parts: ValidModuleParts,
        cache: Weak<Mutex<ShaderModuleCache>>,
    ) -> Self {
        let cache_link = Some(CacheLink {
            cache,
            hash: parts.content_hash,
        });
        Self {
            label,
            state: ModuleState::Valid(ValidModule {
                source_kind: parts.source_kind,
                wgsl: parts.wgsl.map(OnceLock::from).unwrap_or_default(),
                spirv: parts.spirv,
                content_hash: parts.content_hash,
                reflection_backend: parts.reflection_backend,
                translate_options: parts.translate_options,
                metadata: OnceLock::new(),
            }),
            compilation_info: parts.compilation_info,
            cache_link,
        }
    }

    pub(crate) fn new_error(label: Option<String>, reason: String) -> Self {
        Self {
            label,
            compilation_info: CompilationInfo::error(&reason),
            state: ModuleState::Error(reason),
            cache_link: None,
        }
    }

    /// Keeps `source` for vertex pulling unless the module already has WGSL.
    pub(crate) fn attach_wgsl(&self, source: String) {
        if let ModuleState::Valid(valid) = &self.state {
            valid.wgsl.get_or_init(|| source);
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, ModuleState::Error(_))
    }

    /// The reason an error module was created, `None` for valid modules.
    pub fn error_reason(&self) -> Option<&str> {
        match &self.state {
            ModuleState::Valid(_) => None,
            ModuleState::Error(reason) => Some(reason),
        }
    }

    fn valid(&self) -> &ValidModule {
        match &self.state {
            ModuleState::Valid(valid) => valid,
            ModuleState::Error(reason) => {
                panic!("queried reflection data of an error shader module: {reason}")
            }
        }
    }

    pub fn source_kind(&self) -> ShaderSourceKind {
        self.valid().source_kind
    }

    /// The module's SPIR-V; for WGSL modules, the translation made at creation.
    pub fn spirv(&self) -> &[u32] {
        &self.valid().spirv
    }

    pub fn content_hash(&self) -> u64 {
        self.valid().content_hash
    }

    /// Reflects the entry point on first use. Every call, including concurrent first calls,
    /// observes the same result, and a failure is memoized as well.
    pub fn metadata(&self) -> Result<&Arc<EntryPointMetadata>, ValidationError> {
        let valid = self.valid();
        valid
            .metadata
            .get_or_init(|| {
                tracing::debug!(backend = %valid.reflection_backend, "reflecting shader module");
                reflector_for(valid.reflection_backend)
                    .reflect(&valid.spirv)
                    .map(Arc::new)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn binding_info(&self) -> Result<&ModuleBindingInfo, ValidationError> {
        Ok(&self.metadata()?.bindings)
    }

    pub fn used_vertex_attributes(&self) -> Result<AttributeMask, ValidationError> {
        Ok(self.metadata()?.used_vertex_attributes)
    }

    pub fn fragment_output_base_types(
        &self,
    ) -> Result<[TextureComponentType; MAX_COLOR_ATTACHMENTS], ValidationError> {
        Ok(self.metadata()?.fragment_output_base_types)
    }

    pub fn execution_model(&self) -> Result<SingleShaderStage, ValidationError> {
        Ok(self.metadata()?.stage)
    }

    pub fn validate_compatibility_with_pipeline_layout(
        &self,
        layout: &PipelineLayout,
    ) -> Result<(), ShaderModuleError> {
        let metadata = self.metadata()?;
        compat::validate_compatibility_with_pipeline_layout(metadata, layout)?;
        Ok(())
    }

    pub fn compute_required_buffer_sizes_for_layout(
        &self,
        layout: &PipelineLayout,
    ) -> Result<RequiredBufferSizes, ValidationError> {
        let metadata = self.metadata()?;
        Ok(compat::compute_required_buffer_sizes_for_layout(
            metadata, layout,
        ))
    }

    /// Re-translates the WGSL source with vertex pulling for one pipeline's vertex state.
    pub fn generate_pulling_spirv(
        &self,
        vertex_state: &VertexState,
        entry_point: &str,
        pulling_group: u32,
    ) -> Result<Vec<u32>, ShaderModuleError> {
        let valid = self.valid();
        let source = valid
            .wgsl
            .get()
            .ok_or(ShaderModuleError::PullingRequiresWgsl)?;
        Ok(translate::translate_with_vertex_pulling(
            source,
            vertex_state,
            entry_point,
            pulling_group,
            &valid.translate_options,
        )?)
    }

    pub fn compilation_info(&self) -> &CompilationInfo {
        &self.compilation_info
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        let Some(link) = &self.cache_link else {
            return;
        };
        if let Some(cache) = link.cache.upgrade() {
            let mut cache = cache.lock().unwrap_or_else(|poison| poison.into_inner());
            cache.remove(link.hash, self as *const ShaderModule);
        }
    }
}
