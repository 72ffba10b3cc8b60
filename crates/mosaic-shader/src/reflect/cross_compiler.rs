use mosaic_formats::{TextureComponentType, TextureFormat};
use naga::{AddressSpace, Binding, Handle, ImageClass, ImageDimension, TypeInner};
use tracing::debug;

use super::{
    ExecutionModel, ImageDim, InterfaceDecl, ReflectionServiceReflector, Reflector, ResourceDecl,
    ResourceKind, ShaderResources,
};
use crate::config::ReflectionBackend;
use crate::error::ValidationError;

/// Reflects through naga's SPIR-V frontend.
///
/// naga's IR drops the access decorations that decide read-only buffers and write-only storage
/// images, it re-derives buffer layouts from its own packing rules, and it cannot represent
/// combined image samplers. Those facts are read from the declared (rspirv) view of the module.
/// When the frontend cannot represent a module at all, for example a std140 matrix whose stride
/// differs from naga's packed stride, the declared view is used as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossCompilerReflector;

pub(crate) fn parse_with_naga(words: &[u32]) -> Result<naga::Module, String> {
    let options = naga::front::spv::Options {
        adjust_coordinate_space: false,
        strict_capabilities: false,
        block_ctx_dump_prefix: None,
    };
    naga::front::spv::Frontend::new(words.iter().copied(), &options)
        .parse()
        .map_err(|err| err.to_string())
}

impl Reflector for CrossCompilerReflector {
    fn backend(&self) -> ReflectionBackend {
        ReflectionBackend::CrossCompiler
    }

    fn collect_resources(&self, spirv: &[u32]) -> Result<ShaderResources, ValidationError> {
        let declared = ReflectionServiceReflector.collect_resources(spirv)?;
        let module = match parse_with_naga(spirv) {
            Ok(module) => module,
            Err(message) => {
                debug!(%message, "naga frontend rejected module; using declared resources");
                return Ok(declared);
            }
        };

        let entry_point = module
            .entry_points
            .first()
            .ok_or(ValidationError::NoEntryPoint)?;
        let execution_model = match entry_point.stage {
            naga::ShaderStage::Vertex => ExecutionModel::Vertex,
            naga::ShaderStage::Fragment => ExecutionModel::Fragment,
            naga::ShaderStage::Compute => ExecutionModel::Compute,
            #[allow(unreachable_patterns)]
            other => ExecutionModel::Other(format!("{other:?}")),
        };

        let mut resources = ShaderResources::new(execution_model);
        resources.combined_image_samplers = declared.combined_image_samplers;

        for (_, var) in module.global_variables.iter() {
            collect_global(&module, var, &declared, &mut resources)?;
        }

        let function = &entry_point.function;
        for arg in &function.arguments {
            collect_interface(
                &module,
                arg.binding.as_ref(),
                arg.ty,
                arg.name.as_deref(),
                &mut resources.stage_inputs,
            );
        }
        if let Some(result) = &function.result {
            collect_interface(
                &module,
                result.binding.as_ref(),
                result.ty,
                None,
                &mut resources.stage_outputs,
            );
        }

        Ok(resources)
    }
}

/// The declared counterpart of a naga global, matched by name and binding.
fn declared_kind<'a>(
    declared: &'a ShaderResources,
    name: &str,
    set: Option<u32>,
    binding: Option<u32>,
) -> Option<&'a ResourceKind> {
    [
        &declared.uniform_buffers,
        &declared.storage_buffers,
        &declared.storage_images,
    ]
    .into_iter()
    .flatten()
    .find(|decl| decl.name == name && decl.set == set && decl.binding == binding)
    .map(|decl| &decl.kind)
}

fn collect_global(
    module: &naga::Module,
    var: &naga::GlobalVariable,
    declared: &ShaderResources,
    resources: &mut ShaderResources,
) -> Result<(), ValidationError> {
    let name = var.name.clone().unwrap_or_else(|| "<unnamed>".to_owned());
    let set = var.binding.as_ref().map(|b| b.group);
    let binding = var.binding.as_ref().map(|b| b.binding);
    let counterpart = declared_kind(declared, &name, set, binding);
    let ty = strip_binding_array(module, var.ty);

    let buffer = |naga_non_writable: bool| -> Result<ResourceKind, ValidationError> {
        if let Some(ResourceKind::Buffer {
            declared_size,
            non_writable,
        }) = counterpart
        {
            return Ok(ResourceKind::Buffer {
                declared_size: *declared_size,
                non_writable: *non_writable,
            });
        }
        let declared_size =
            declared_size(module, ty).map_err(|reason| ValidationError::BufferLayout {
                name: name.clone(),
                reason,
            })?;
        Ok(ResourceKind::Buffer {
            declared_size,
            non_writable: naga_non_writable,
        })
    };

    let (kind, class) = match var.space {
        AddressSpace::PushConstant => {
            resources.push_constant_buffers += 1;
            return Ok(());
        }
        AddressSpace::Uniform => (buffer(true)?, &mut resources.uniform_buffers),
        AddressSpace::Storage { access } => (
            buffer(!access.contains(naga::StorageAccess::STORE))?,
            &mut resources.storage_buffers,
        ),
        AddressSpace::Handle => match &module.types[ty].inner {
            TypeInner::Sampler { .. } => (ResourceKind::Sampler, &mut resources.separate_samplers),
            TypeInner::Image {
                dim,
                arrayed,
                class,
            } => {
                let dim = image_dim(*dim);
                match class {
                    ImageClass::Sampled { kind, multi } => (
                        ResourceKind::SampledImage {
                            dim,
                            arrayed: *arrayed,
                            multisampled: *multi,
                            component_type: component_type_of_kind(*kind),
                        },
                        &mut resources.separate_images,
                    ),
                    ImageClass::Depth { multi } => (
                        ResourceKind::SampledImage {
                            dim,
                            arrayed: *arrayed,
                            multisampled: *multi,
                            component_type: TextureComponentType::Float,
                        },
                        &mut resources.separate_images,
                    ),
                    ImageClass::Storage { format, access } => {
                        let (non_readable, non_writable) = match counterpart {
                            Some(ResourceKind::StorageImage {
                                non_readable,
                                non_writable,
                                ..
                            }) => (*non_readable, *non_writable),
                            _ => (
                                !access.contains(naga::StorageAccess::LOAD),
                                !access.contains(naga::StorageAccess::STORE),
                            ),
                        };
                        (
                            ResourceKind::StorageImage {
                                dim,
                                arrayed: *arrayed,
                                multisampled: false,
                                format: texture_format(*format),
                                non_readable,
                                non_writable,
                            },
                            &mut resources.storage_images,
                        )
                    }
                }
            }
            _ => return Ok(()),
        },
        _ => return Ok(()),
    };

    class.push(ResourceDecl {
        name,
        set,
        binding,
        kind,
    });
    Ok(())
}

fn strip_binding_array(module: &naga::Module, mut ty: Handle<naga::Type>) -> Handle<naga::Type> {
    while let TypeInner::BindingArray { base, .. } = module.types[ty].inner {
        ty = base;
    }
    ty
}

fn collect_interface(
    module: &naga::Module,
    binding: Option<&Binding>,
    ty: Handle<naga::Type>,
    name: Option<&str>,
    out: &mut Vec<InterfaceDecl>,
) {
    match binding {
        Some(Binding::BuiltIn(_)) => {}
        Some(Binding::Location { location, .. }) => out.push(InterfaceDecl {
            name: name.unwrap_or("<unnamed>").to_owned(),
            location: Some(*location),
            component_type: component_type_of(module, ty),
        }),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                for member in members {
                    collect_interface(
                        module,
                        member.binding.as_ref(),
                        member.ty,
                        member.name.as_deref(),
                        out,
                    );
                }
            }
            _ => out.push(InterfaceDecl {
                name: name.unwrap_or("<unnamed>").to_owned(),
                location: None,
                component_type: component_type_of(module, ty),
            }),
        },
    }
}

fn component_type_of(module: &naga::Module, ty: Handle<naga::Type>) -> TextureComponentType {
    match &module.types[ty].inner {
        TypeInner::Scalar(scalar)
        | TypeInner::Vector { scalar, .. }
        | TypeInner::Matrix { scalar, .. } => component_type_of_kind(scalar.kind),
        TypeInner::Array { base, .. } => component_type_of(module, *base),
        _ => TextureComponentType::Other,
    }
}

fn component_type_of_kind(kind: naga::ScalarKind) -> TextureComponentType {
    match kind {
        naga::ScalarKind::Float => TextureComponentType::Float,
        naga::ScalarKind::Sint => TextureComponentType::Sint,
        naga::ScalarKind::Uint => TextureComponentType::Uint,
        _ => TextureComponentType::Other,
    }
}

fn image_dim(dim: ImageDimension) -> ImageDim {
    match dim {
        ImageDimension::D1 => ImageDim::D1,
        ImageDimension::D2 => ImageDim::D2,
        ImageDimension::D3 => ImageDim::D3,
        ImageDimension::Cube => ImageDim::Cube,
    }
}

/// Size of a type as laid out in a buffer block, counting runtime arrays as one element.
fn declared_size(module: &naga::Module, ty: Handle<naga::Type>) -> Result<u64, String> {
    let size = match &module.types[ty].inner {
        TypeInner::Scalar(scalar) | TypeInner::Atomic(scalar) => u64::from(scalar.width),
        TypeInner::Vector { size, scalar } => *size as u64 * u64::from(scalar.width),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => {
            // Columns are laid out as vectors, and 3-component vectors take 4 slots.
            let column_slots = match rows {
                naga::VectorSize::Bi => 2,
                _ => 4,
            };
            *columns as u64 * column_slots * u64::from(scalar.width)
        }
        TypeInner::Array { size, stride, .. } => match size {
            naga::ArraySize::Constant(count) => u64::from(count.get()) * u64::from(*stride),
            naga::ArraySize::Dynamic => u64::from(*stride),
            #[allow(unreachable_patterns)]
            _ => return Err("array length is not a constant".to_owned()),
        },
        TypeInner::Struct { members, .. } => match members.last() {
            None => 0,
            Some(last) => u64::from(last.offset) + declared_size(module, last.ty)?,
        },
        other => return Err(format!("type {other:?} cannot appear in a buffer block")),
    };
    Ok(size)
}

fn texture_format(format: naga::StorageFormat) -> Option<TextureFormat> {
    use naga::StorageFormat as S;
    let format = match format {
        S::R8Unorm => TextureFormat::R8Unorm,
        S::R8Snorm => TextureFormat::R8Snorm,
        S::R8Uint => TextureFormat::R8Uint,
        S::R8Sint => TextureFormat::R8Sint,
        S::R16Uint => TextureFormat::R16Uint,
        S::R16Sint => TextureFormat::R16Sint,
        S::R16Float => TextureFormat::R16Float,
        S::Rg8Unorm => TextureFormat::Rg8Unorm,
        S::Rg8Snorm => TextureFormat::Rg8Snorm,
        S::Rg8Uint => TextureFormat::Rg8Uint,
        S::Rg8Sint => TextureFormat::Rg8Sint,
        S::R32Uint => TextureFormat::R32Uint,
        S::R32Sint => TextureFormat::R32Sint,
        S::R32Float => TextureFormat::R32Float,
        S::Rg16Uint => TextureFormat::Rg16Uint,
        S::Rg16Sint => TextureFormat::Rg16Sint,
        S::Rg16Float => TextureFormat::Rg16Float,
        S::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        S::Rgba8Snorm => TextureFormat::Rgba8Snorm,
        S::Rgba8Uint => TextureFormat::Rgba8Uint,
        S::Rgba8Sint => TextureFormat::Rgba8Sint,
        S::Rgb10a2Unorm => TextureFormat::Rgb10a2Unorm,
        S::Rg32Uint => TextureFormat::Rg32Uint,
        S::Rg32Sint => TextureFormat::Rg32Sint,
        S::Rg32Float => TextureFormat::Rg32Float,
        S::Rgba16Uint => TextureFormat::Rgba16Uint,
        S::Rgba16Sint => TextureFormat::Rgba16Sint,
        S::Rgba16Float => TextureFormat::Rgba16Float,
        S::Rgba32Uint => TextureFormat::Rgba32Uint,
        S::Rgba32Sint => TextureFormat::Rgba32Sint,
        S::Rgba32Float => TextureFormat::Rgba32Float,
        _ => return None,
    };
    Some(format)
}
