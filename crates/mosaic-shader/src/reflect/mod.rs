//! SPIR-V reflection into [`EntryPointMetadata`].
//!
//! Reflection happens in two halves. A backend lowers the module into a backend-neutral
//! [`ShaderResources`] inventory (resources grouped by class, plus the entry point's stage
//! interface). [`extract_metadata`] then applies the shared validation rules to that inventory.
//! Keeping the rules in one place is what makes the two backends agree.

mod cross_compiler;
mod reflection_service;

use std::collections::btree_map::Entry;

use mosaic_formats::{TextureComponentType, TextureFormat, TextureViewDimension};
use tracing::{debug_span, trace};

use crate::config::ReflectionBackend;
use crate::error::ValidationError;
use crate::limits::{MAX_BIND_GROUPS, MAX_BINDING_NUMBER, MAX_COLOR_ATTACHMENTS, MAX_SPIRV_WORDS};
use crate::types::{BindingType, EntryPointMetadata, ShaderBindingInfo, SingleShaderStage};

pub use cross_compiler::CrossCompilerReflector;
pub(crate) use cross_compiler::parse_with_naga;
pub use reflection_service::ReflectionServiceReflector;

/// Execution model of the reflected entry point, before it is checked against the supported
/// stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionModel {
    Vertex,
    Fragment,
    Compute,
    Other(String),
}

/// Dimensionality declared on an image type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDim {
    D1,
    D2,
    D3,
    Cube,
}

impl ImageDim {
    pub fn view_dimension(self, arrayed: bool) -> TextureViewDimension {
        match (self, arrayed) {
            (ImageDim::D1, _) => TextureViewDimension::D1,
            (ImageDim::D2, false) => TextureViewDimension::D2,
            (ImageDim::D2, true) => TextureViewDimension::D2Array,
            (ImageDim::D3, _) => TextureViewDimension::D3,
            (ImageDim::Cube, false) => TextureViewDimension::Cube,
            (ImageDim::Cube, true) => TextureViewDimension::CubeArray,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Buffer {
        /// Declared block size with any trailing runtime array counted as one element.
        declared_size: u64,
        non_writable: bool,
    },
    SampledImage {
        dim: ImageDim,
        arrayed: bool,
        multisampled: bool,
        component_type: TextureComponentType,
    },
    StorageImage {
        dim: ImageDim,
        arrayed: bool,
        multisampled: bool,
        /// `None` when the declared format has no engine equivalent.
        format: Option<TextureFormat>,
        non_readable: bool,
        non_writable: bool,
    },
    Sampler,
}

/// One descriptor-backed resource declared by the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDecl {
    pub name: String,
    pub set: Option<u32>,
    pub binding: Option<u32>,
    pub kind: ResourceKind,
}

/// One user-defined (non-builtin) stage input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDecl {
    pub name: String,
    pub location: Option<u32>,
    pub component_type: TextureComponentType,
}

/// Backend-neutral inventory of a module's first entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderResources {
    pub execution_model: ExecutionModel,
    pub push_constant_buffers: usize,
    pub combined_image_samplers: usize,
    pub uniform_buffers: Vec<ResourceDecl>,
    pub separate_images: Vec<ResourceDecl>,
    pub separate_samplers: Vec<ResourceDecl>,
    pub storage_buffers: Vec<ResourceDecl>,
    pub storage_images: Vec<ResourceDecl>,
    pub stage_inputs: Vec<InterfaceDecl>,
    pub stage_outputs: Vec<InterfaceDecl>,
}

impl ShaderResources {
    pub(crate) fn new(execution_model: ExecutionModel) -> Self {
        Self {
            execution_model,
            push_constant_buffers: 0,
            combined_image_samplers: 0,
            uniform_buffers: Vec::new(),
            separate_images: Vec::new(),
            separate_samplers: Vec::new(),
            storage_buffers: Vec::new(),
            storage_images: Vec::new(),
            stage_inputs: Vec::new(),
            stage_outputs: Vec::new(),
        }
    }
}

/// A reflection strategy. Implementations only differ in how they build [`ShaderResources`].
pub trait Reflector: Send + Sync {
    fn backend(&self) -> ReflectionBackend;

    fn collect_resources(&self, spirv: &[u32]) -> Result<ShaderResources, ValidationError>;

    fn reflect(&self, spirv: &[u32]) -> Result<EntryPointMetadata, ValidationError> {
        if spirv.len() > MAX_SPIRV_WORDS {
            return Err(ValidationError::TooLarge {
                words: spirv.len(),
                max: MAX_SPIRV_WORDS,
            });
        }
        let _span = debug_span!("reflect", backend = %self.backend()).entered();
        let resources = self.collect_resources(spirv)?;
        extract_metadata(&resources)
    }
}

pub fn reflector_for(backend: ReflectionBackend) -> &'static dyn Reflector {
    match backend {
        ReflectionBackend::CrossCompiler => &CrossCompilerReflector,
        ReflectionBackend::ReflectionService => &ReflectionServiceReflector,
    }
}

/// Applies the shared reflection rules to a backend's inventory.
pub fn extract_metadata(resources: &ShaderResources) -> Result<EntryPointMetadata, ValidationError> {
    let stage = match &resources.execution_model {
        ExecutionModel::Vertex => SingleShaderStage::Vertex,
        ExecutionModel::Fragment => SingleShaderStage::Fragment,
        ExecutionModel::Compute => SingleShaderStage::Compute,
        ExecutionModel::Other(name) => {
            return Err(ValidationError::UnsupportedExecutionModel(name.clone()))
        }
    };

    if resources.push_constant_buffers > 0 {
        return Err(ValidationError::PushConstants);
    }
    if resources.combined_image_samplers > 0 {
        return Err(ValidationError::CombinedImageSampler);
    }

    let mut metadata = EntryPointMetadata::new(stage);

    let classes = [
        (&resources.uniform_buffers, BindingType::UniformBuffer),
        (&resources.separate_images, BindingType::SampledTexture),
        (&resources.separate_samplers, BindingType::Sampler),
        (&resources.storage_buffers, BindingType::StorageBuffer),
        (&resources.storage_images, BindingType::StorageTexture),
    ];
    for (decls, class) in classes {
        for decl in decls {
            extract_binding(&mut metadata, decl, class)?;
        }
    }

    match stage {
        SingleShaderStage::Vertex => {
            let inputs = located(&resources.stage_inputs)
                .ok_or(ValidationError::MissingVertexInputLocation)?;
            for (location, _) in inputs {
                if !metadata.used_vertex_attributes.insert(location) {
                    return Err(ValidationError::VertexAttributeOverLimit(location));
                }
            }
            // Cross-compiling to backends without location-less varyings needs explicit
            // locations on vertex outputs too.
            if resources.stage_outputs.iter().any(|o| o.location.is_none()) {
                return Err(ValidationError::MissingVertexOutputLocation);
            }
        }
        SingleShaderStage::Fragment => {
            if resources.stage_inputs.iter().any(|i| i.location.is_none()) {
                return Err(ValidationError::MissingFragmentInputLocation);
            }
            let outputs = located(&resources.stage_outputs)
                .ok_or(ValidationError::MissingFragmentOutputLocation)?;
            for (location, component_type) in outputs {
                if location as usize >= MAX_COLOR_ATTACHMENTS {
                    return Err(ValidationError::FragmentOutputOverLimit(location));
                }
                if component_type == TextureComponentType::Other {
                    return Err(ValidationError::UnexpectedFragmentOutputType);
                }
                metadata.fragment_output_base_types[location as usize] = component_type;
            }
        }
        SingleShaderStage::Compute => {}
    }

    Ok(metadata)
}

/// Interface variables ordered by location, or `None` if any of them has no location.
fn located(decls: &[InterfaceDecl]) -> Option<Vec<(u32, TextureComponentType)>> {
    let mut located = decls
        .iter()
        .map(|decl| Some((decl.location?, decl.component_type)))
        .collect::<Option<Vec<_>>>()?;
    located.sort_by_key(|&(location, _)| location);
    Some(located)
}

fn extract_binding(
    metadata: &mut EntryPointMetadata,
    decl: &ResourceDecl,
    class: BindingType,
) -> Result<(), ValidationError> {
    let binding = decl
        .binding
        .ok_or_else(|| ValidationError::MissingBindingDecoration(decl.name.clone()))?;
    let group = decl
        .set
        .ok_or_else(|| ValidationError::MissingDescriptorSetDecoration(decl.name.clone()))?;
    if group as usize >= MAX_BIND_GROUPS {
        return Err(ValidationError::BindGroupOverLimit { group });
    }
    if binding > MAX_BINDING_NUMBER {
        return Err(ValidationError::BindingOverLimit { group, binding });
    }

    let slot = match metadata.bindings[group as usize].entry(binding) {
        Entry::Occupied(_) => return Err(ValidationError::DuplicateBinding { group, binding }),
        Entry::Vacant(slot) => slot,
    };

    let mismatch = || ValidationError::UnsupportedResource {
        name: decl.name.clone(),
        reason: format!("resource kind does not match its {class} class"),
    };

    let info = match (class, &decl.kind) {
        (
            BindingType::UniformBuffer,
            ResourceKind::Buffer {
                declared_size,
                non_writable: _,
            },
        ) => ShaderBindingInfo {
            min_buffer_binding_size: *declared_size,
            ..ShaderBindingInfo::new(BindingType::UniformBuffer)
        },
        (
            BindingType::StorageBuffer,
            ResourceKind::Buffer {
                declared_size,
                non_writable,
            },
        ) => {
            let binding_type = if *non_writable {
                BindingType::ReadonlyStorageBuffer
            } else {
                BindingType::StorageBuffer
            };
            ShaderBindingInfo {
                min_buffer_binding_size: *declared_size,
                ..ShaderBindingInfo::new(binding_type)
            }
        }
        (
            BindingType::SampledTexture,
            ResourceKind::SampledImage {
                dim,
                arrayed,
                multisampled,
                component_type,
            },
        ) => {
            if *component_type == TextureComponentType::Other {
                return Err(ValidationError::UnexpectedComponentType(decl.name.clone()));
            }
            ShaderBindingInfo {
                view_dimension: Some(dim.view_dimension(*arrayed)),
                texture_component_type: *component_type,
                multisampled: *multisampled,
                ..ShaderBindingInfo::new(BindingType::SampledTexture)
            }
        }
        (BindingType::Sampler, ResourceKind::Sampler) => {
            ShaderBindingInfo::new(BindingType::Sampler)
        }
        (
            BindingType::StorageTexture,
            ResourceKind::StorageImage {
                dim,
                arrayed,
                multisampled,
                format,
                non_readable,
                non_writable,
            },
        ) => {
            let binding_type = if *non_readable {
                BindingType::WriteonlyStorageTexture
            } else if *non_writable {
                BindingType::ReadonlyStorageTexture
            } else {
                BindingType::StorageTexture
            };
            let format = format.ok_or(ValidationError::InvalidImageFormat)?;
            if !format.supports_storage_usage() {
                return Err(ValidationError::UnsupportedStorageFormat(format));
            }
            ShaderBindingInfo {
                view_dimension: Some(dim.view_dimension(*arrayed)),
                storage_texture_format: Some(format),
                multisampled: *multisampled,
                ..ShaderBindingInfo::new(binding_type)
            }
        }
        _ => return Err(mismatch()),
    };

    trace!(group, binding, binding_type = %info.binding_type, name = %decl.name, "reflected binding");
    slot.insert(info);
    Ok(())
}
