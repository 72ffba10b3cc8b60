use std::collections::HashMap;

use mosaic_formats::{TextureComponentType, TextureFormat};
use rspirv::dr::{Instruction, Module, Operand};
use rspirv::spirv::{self, Decoration, Dim, ImageFormat, Op, StorageClass, Word};

use super::{
    ExecutionModel, ImageDim, InterfaceDecl, Reflector, ResourceDecl, ResourceKind,
    ShaderResources,
};
use crate::config::ReflectionBackend;
use crate::error::ValidationError;

/// Reflects by walking the `rspirv` data representation directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReflectionServiceReflector;

impl Reflector for ReflectionServiceReflector {
    fn backend(&self) -> ReflectionBackend {
        ReflectionBackend::ReflectionService
    }

    fn collect_resources(&self, spirv: &[u32]) -> Result<ShaderResources, ValidationError> {
        let module =
            rspirv::dr::load_words(spirv).map_err(|err| ValidationError::Parse(err.to_string()))?;
        let index = ModuleIndex::new(&module);

        let entry_point = module
            .entry_points
            .first()
            .ok_or(ValidationError::NoEntryPoint)?;
        let execution_model = match entry_point.operands.first() {
            Some(Operand::ExecutionModel(spirv::ExecutionModel::Vertex)) => {
                ExecutionModel::Vertex
            }
            Some(Operand::ExecutionModel(spirv::ExecutionModel::Fragment)) => {
                ExecutionModel::Fragment
            }
            Some(Operand::ExecutionModel(spirv::ExecutionModel::GLCompute)) => {
                ExecutionModel::Compute
            }
            Some(Operand::ExecutionModel(other)) => ExecutionModel::Other(format!("{other:?}")),
            Some(other) => ExecutionModel::Other(format!("{other}")),
            None => return Err(ValidationError::NoEntryPoint),
        };
        let interface: Vec<Word> = entry_point
            .operands
            .iter()
            .skip(3)
            .filter_map(|operand| match operand {
                Operand::IdRef(id) => Some(*id),
                _ => None,
            })
            .collect();

        let mut resources = ShaderResources::new(execution_model);

        for inst in &module.types_global_values {
            if inst.class.opcode != Op::Variable {
                continue;
            }
            let (Some(id), Some(pointer)) = (inst.result_id, inst.result_type) else {
                continue;
            };
            let Some(Operand::StorageClass(storage_class)) = inst.operands.first() else {
                continue;
            };
            let pointee = index.pointee(pointer)?;

            match storage_class {
                StorageClass::Input | StorageClass::Output => {
                    if !interface.contains(&id) || index.is_builtin(id, pointee) {
                        continue;
                    }
                    let decl = InterfaceDecl {
                        name: index.name(id),
                        location: index.decoration_literal(id, Decoration::Location),
                        component_type: index.component_type(pointee),
                    };
                    if *storage_class == StorageClass::Input {
                        resources.stage_inputs.push(decl);
                    } else {
                        resources.stage_outputs.push(decl);
                    }
                }
                StorageClass::PushConstant => resources.push_constant_buffers += 1,
                StorageClass::Uniform | StorageClass::StorageBuffer => {
                    let block = index.strip_arrays(pointee);
                    let is_storage = *storage_class == StorageClass::StorageBuffer
                        || index.has_decoration(block, Decoration::BufferBlock);
                    let decl = index.resource(
                        id,
                        ResourceKind::Buffer {
                            declared_size: index.declared_size(block, &index.name(id))?,
                            non_writable: !is_storage || index.is_non_writable_block(id, block),
                        },
                    );
                    if is_storage {
                        resources.storage_buffers.push(decl);
                    } else {
                        resources.uniform_buffers.push(decl);
                    }
                }
                StorageClass::UniformConstant => {
                    index.collect_handle(id, pointee, &mut resources)?;
                }
                _ => {}
            }
        }

        Ok(resources)
    }
}

struct ModuleIndex<'a> {
    defs: HashMap<Word, &'a Instruction>,
    decorations: HashMap<Word, Vec<&'a Instruction>>,
    member_decorations: HashMap<Word, Vec<&'a Instruction>>,
    names: HashMap<Word, &'a str>,
}

impl<'a> ModuleIndex<'a> {
    fn new(module: &'a Module) -> Self {
        let defs = module
            .types_global_values
            .iter()
            .filter_map(|inst| inst.result_id.map(|id| (id, inst)))
            .collect();

        let mut decorations: HashMap<Word, Vec<&Instruction>> = HashMap::new();
        let mut member_decorations: HashMap<Word, Vec<&Instruction>> = HashMap::new();
        for inst in &module.annotations {
            let Some(Operand::IdRef(target)) = inst.operands.first() else {
                continue;
            };
            match inst.class.opcode {
                Op::Decorate => decorations.entry(*target).or_default().push(inst),
                Op::MemberDecorate => member_decorations.entry(*target).or_default().push(inst),
                _ => {}
            }
        }

        let names = module
            .debug_names
            .iter()
            .filter(|inst| inst.class.opcode == Op::Name)
            .filter_map(|inst| match inst.operands.as_slice() {
                [Operand::IdRef(target), Operand::LiteralString(name), ..] => {
                    Some((*target, name.as_str()))
                }
                _ => None,
            })
            .collect();

        Self {
            defs,
            decorations,
            member_decorations,
            names,
        }
    }

    fn name(&self, id: Word) -> String {
        self.names.get(&id).copied().unwrap_or("<unnamed>").to_owned()
    }

    fn def(&self, id: Word) -> Result<&'a Instruction, ValidationError> {
        self.defs
            .get(&id)
            .copied()
            .ok_or_else(|| ValidationError::Parse(format!("id %{id} has no definition")))
    }

    fn decoration_operands(&self, id: Word, decoration: Decoration) -> Option<&'a [Operand]> {
        self.decorations
            .get(&id)?
            .iter()
            .copied()
            .find_map(|inst: &'a Instruction| match inst.operands.get(1) {
                Some(Operand::Decoration(d)) if *d == decoration => Some(&inst.operands[2..]),
                _ => None,
            })
    }

    fn has_decoration(&self, id: Word, decoration: Decoration) -> bool {
        self.decoration_operands(id, decoration).is_some()
    }

    fn decoration_literal(&self, id: Word, decoration: Decoration) -> Option<u32> {
        match self.decoration_operands(id, decoration)?.first() {
            Some(Operand::LiteralBit32(value)) => Some(*value),
            _ => None,
        }
    }

    /// Members of `struct_id` carrying `decoration`, with the decoration's first literal.
    fn member_decorations(
        &self,
        struct_id: Word,
        decoration: Decoration,
    ) -> impl Iterator<Item = (u32, Option<u32>)> + '_ {
        self.member_decorations
            .get(&struct_id)
            .into_iter()
            .flatten()
            .filter_map(move |inst| match inst.operands.as_slice() {
                [_, Operand::LiteralBit32(member), Operand::Decoration(d), rest @ ..]
                    if *d == decoration =>
                {
                    let literal = match rest.first() {
                        Some(Operand::LiteralBit32(value)) => Some(*value),
                        _ => None,
                    };
                    Some((*member, literal))
                }
                _ => None,
            })
    }

    fn member_literal(&self, struct_id: Word, member: u32, decoration: Decoration) -> Option<u32> {
        self.member_decorations(struct_id, decoration)
            .find(|(m, _)| *m == member)
            .and_then(|(_, literal)| literal)
    }

    fn pointee(&self, pointer: Word) -> Result<Word, ValidationError> {
        match self.def(pointer)?.operands.as_slice() {
            [Operand::StorageClass(_), Operand::IdRef(pointee)] => Ok(*pointee),
            _ => Err(ValidationError::Parse(format!(
                "variable type %{pointer} is not a pointer"
            ))),
        }
    }

    fn strip_arrays(&self, mut ty: Word) -> Word {
        while let Some(inst) = self.defs.get(&ty) {
            match (inst.class.opcode, inst.operands.first()) {
                (Op::TypeArray | Op::TypeRuntimeArray, Some(Operand::IdRef(element))) => {
                    ty = *element
                }
                _ => break,
            }
        }
        ty
    }

    fn is_builtin(&self, variable: Word, pointee: Word) -> bool {
        if self.has_decoration(variable, Decoration::BuiltIn) {
            return true;
        }
        let block = self.strip_arrays(pointee);
        self.member_decorations(block, Decoration::BuiltIn)
            .next()
            .is_some()
    }

    fn member_count(&self, struct_id: Word) -> usize {
        match self.defs.get(&struct_id) {
            Some(inst) if inst.class.opcode == Op::TypeStruct => inst.operands.len(),
            _ => 0,
        }
    }

    fn is_non_writable_block(&self, variable: Word, block: Word) -> bool {
        if self.has_decoration(variable, Decoration::NonWritable) {
            return true;
        }
        let count = self.member_count(block);
        count > 0
            && (0..count as u32).all(|member| {
                self.member_decorations(block, Decoration::NonWritable)
                    .any(|(m, _)| m == member)
            })
    }

    fn resource(&self, id: Word, kind: ResourceKind) -> ResourceDecl {
        ResourceDecl {
            name: self.name(id),
            set: self.decoration_literal(id, Decoration::DescriptorSet),
            binding: self.decoration_literal(id, Decoration::Binding),
            kind,
        }
    }

    fn scalar_component_type(&self, ty: Word) -> TextureComponentType {
        let Some(inst) = self.defs.get(&ty) else {
            return TextureComponentType::Other;
        };
        match (inst.class.opcode, inst.operands.as_slice()) {
            (Op::TypeFloat, _) => TextureComponentType::Float,
            (Op::TypeInt, [_, Operand::LiteralBit32(1)]) => TextureComponentType::Sint,
            (Op::TypeInt, [_, Operand::LiteralBit32(0)]) => TextureComponentType::Uint,
            _ => TextureComponentType::Other,
        }
    }

    fn component_type(&self, ty: Word) -> TextureComponentType {
        let ty = self.strip_arrays(ty);
        let Some(inst) = self.defs.get(&ty) else {
            return TextureComponentType::Other;
        };
        match (inst.class.opcode, inst.operands.first()) {
            (Op::TypeVector | Op::TypeMatrix, Some(Operand::IdRef(component))) => {
                self.component_type(*component)
            }
            (Op::TypeFloat | Op::TypeInt, _) => self.scalar_component_type(ty),
            _ => TextureComponentType::Other,
        }
    }

    fn collect_handle(
        &self,
        id: Word,
        pointee: Word,
        resources: &mut ShaderResources,
    ) -> Result<(), ValidationError> {
        let ty = self.strip_arrays(pointee);
        let inst = self.def(ty)?;
        match inst.class.opcode {
            Op::TypeSampler => resources
                .separate_samplers
                .push(self.resource(id, ResourceKind::Sampler)),
            Op::TypeSampledImage => resources.combined_image_samplers += 1,
            Op::TypeImage => {
                let image = self.image_type(id, inst)?;
                if image.sampled == 2 {
                    let kind = ResourceKind::StorageImage {
                        dim: image.dim,
                        arrayed: image.arrayed,
                        multisampled: false,
                        format: texture_format(image.format),
                        non_readable: self.has_decoration(id, Decoration::NonReadable),
                        non_writable: self.has_decoration(id, Decoration::NonWritable),
                    };
                    resources.storage_images.push(self.resource(id, kind));
                } else {
                    let component_type = if image.depth {
                        TextureComponentType::Float
                    } else {
                        self.scalar_component_type(image.sampled_type)
                    };
                    let kind = ResourceKind::SampledImage {
                        dim: image.dim,
                        arrayed: image.arrayed,
                        multisampled: image.multisampled,
                        component_type,
                    };
                    resources.separate_images.push(self.resource(id, kind));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn image_type(&self, id: Word, inst: &Instruction) -> Result<ImageType, ValidationError> {
        let [Operand::IdRef(sampled_type), Operand::Dim(dim), Operand::LiteralBit32(depth), Operand::LiteralBit32(arrayed), Operand::LiteralBit32(ms), Operand::LiteralBit32(sampled), Operand::ImageFormat(format), ..] =
            inst.operands.as_slice()
        else {
            return Err(ValidationError::Parse(format!(
                "malformed image type for `{}`",
                self.name(id)
            )));
        };
        let dim = match dim {
            Dim::Dim1D => ImageDim::D1,
            Dim::Dim2D => ImageDim::D2,
            Dim::Dim3D => ImageDim::D3,
            Dim::DimCube => ImageDim::Cube,
            other => {
                let reason = match other {
                    Dim::DimRect => "rectangle images are not supported",
                    Dim::DimBuffer => "texel buffers are not supported",
                    Dim::DimSubpassData => "subpass inputs are not supported",
                    _ => "unsupported image dimension",
                };
                return Err(ValidationError::UnsupportedResource {
                    name: self.name(id),
                    reason: reason.to_owned(),
                });
            }
        };
        Ok(ImageType {
            sampled_type: *sampled_type,
            dim,
            depth: *depth == 1,
            arrayed: *arrayed == 1,
            multisampled: *ms == 1,
            sampled: *sampled,
            format: *format,
        })
    }

    /// Declared size of a buffer block type, counting a trailing runtime array as one element.
    fn declared_size(&self, ty: Word, name: &str) -> Result<u64, ValidationError> {
        let layout_error = |reason: String| ValidationError::BufferLayout {
            name: name.to_owned(),
            reason,
        };
        let inst = self.def(ty)?;
        let size = match (inst.class.opcode, inst.operands.as_slice()) {
            (Op::TypeInt | Op::TypeFloat, [Operand::LiteralBit32(width), ..]) => {
                u64::from(*width / 8)
            }
            (Op::TypeVector, [Operand::IdRef(component), Operand::LiteralBit32(count)]) => {
                u64::from(*count) * self.declared_size(*component, name)?
            }
            (Op::TypeArray, [Operand::IdRef(_), Operand::IdRef(length)]) => {
                let stride = self.array_stride(ty).ok_or_else(|| {
                    layout_error(format!("array %{ty} has no ArrayStride decoration"))
                })?;
                u64::from(self.constant_u32(*length)?) * u64::from(stride)
            }
            (Op::TypeRuntimeArray, _) => {
                let stride = self.array_stride(ty).ok_or_else(|| {
                    layout_error(format!("runtime array %{ty} has no ArrayStride decoration"))
                })?;
                u64::from(stride)
            }
            (Op::TypeStruct, members) => match members.len().checked_sub(1) {
                None => 0,
                Some(last) => {
                    let Operand::IdRef(member_ty) = &members[last] else {
                        return Err(layout_error(format!("struct %{ty} has a malformed member")));
                    };
                    let offset = self
                        .member_literal(ty, last as u32, Decoration::Offset)
                        .ok_or_else(|| {
                            layout_error(format!("member {last} of %{ty} has no Offset decoration"))
                        })?;
                    let member_size = match self.def(*member_ty)?.class.opcode {
                        Op::TypeMatrix => self.matrix_size(ty, last as u32, *member_ty, name)?,
                        _ => self.declared_size(*member_ty, name)?,
                    };
                    u64::from(offset) + member_size
                }
            },
            (Op::TypeMatrix, _) => {
                return Err(layout_error(format!(
                    "matrix %{ty} outside a struct member has no stride"
                )))
            }
            _ => return Err(layout_error(format!("type %{ty} cannot appear in a buffer block"))),
        };
        Ok(size)
    }

    /// Size of a matrix member: `MatrixStride` times the number of major vectors.
    fn matrix_size(
        &self,
        struct_id: Word,
        member: u32,
        matrix: Word,
        name: &str,
    ) -> Result<u64, ValidationError> {
        let stride = self
            .member_literal(struct_id, member, Decoration::MatrixStride)
            .ok_or_else(|| ValidationError::BufferLayout {
                name: name.to_owned(),
                reason: format!("matrix member {member} of %{struct_id} has no MatrixStride"),
            })?;
        let (column_type, columns) = match self.def(matrix)?.operands.as_slice() {
            [Operand::IdRef(column), Operand::LiteralBit32(count)] => (*column, *count),
            _ => return Err(ValidationError::Parse(format!("malformed OpTypeMatrix %{matrix}"))),
        };
        let row_major = self
            .member_decorations(struct_id, Decoration::RowMajor)
            .any(|(m, _)| m == member);
        let major_count = if row_major {
            match self.def(column_type)?.operands.as_slice() {
                [_, Operand::LiteralBit32(rows)] => *rows,
                _ => {
                    return Err(ValidationError::Parse(format!(
                        "malformed matrix column type %{column_type}"
                    )))
                }
            }
        } else {
            columns
        };
        Ok(u64::from(stride) * u64::from(major_count))
    }

    fn array_stride(&self, ty: Word) -> Option<u32> {
        self.decoration_literal(ty, Decoration::ArrayStride)
    }

    fn constant_u32(&self, id: Word) -> Result<u32, ValidationError> {
        let inst = self.def(id)?;
        match (inst.class.opcode, inst.operands.first()) {
            (Op::Constant, Some(Operand::LiteralBit32(value))) => Ok(*value),
            _ => Err(ValidationError::Parse(format!(
                "array length %{id} is not a 32-bit constant"
            ))),
        }
    }
}

struct ImageType {
    sampled_type: Word,
    dim: ImageDim,
    depth: bool,
    arrayed: bool,
    multisampled: bool,
    sampled: u32,
    format: ImageFormat,
}

fn texture_format(format: ImageFormat) -> Option<TextureFormat> {
    let format = match format {
        ImageFormat::R8 => TextureFormat::R8Unorm,
        ImageFormat::R8Snorm => TextureFormat::R8Snorm,
        ImageFormat::R8ui => TextureFormat::R8Uint,
        ImageFormat::R8i => TextureFormat::R8Sint,
        ImageFormat::R16ui => TextureFormat::R16Uint,
        ImageFormat::R16i => TextureFormat::R16Sint,
        ImageFormat::R16f => TextureFormat::R16Float,
        ImageFormat::Rg8 => TextureFormat::Rg8Unorm,
        ImageFormat::Rg8Snorm => TextureFormat::Rg8Snorm,
        ImageFormat::Rg8ui => TextureFormat::Rg8Uint,
        ImageFormat::Rg8i => TextureFormat::Rg8Sint,
        ImageFormat::R32ui => TextureFormat::R32Uint,
        ImageFormat::R32i => TextureFormat::R32Sint,
        ImageFormat::R32f => TextureFormat::R32Float,
        ImageFormat::Rg16ui => TextureFormat::Rg16Uint,
        ImageFormat::Rg16i => TextureFormat::Rg16Sint,
        ImageFormat::Rg16f => TextureFormat::Rg16Float,
        ImageFormat::Rgba8 => TextureFormat::Rgba8Unorm,
        ImageFormat::Rgba8Snorm => TextureFormat::Rgba8Snorm,
        ImageFormat::Rgba8ui => TextureFormat::Rgba8Uint,
        ImageFormat::Rgba8i => TextureFormat::Rgba8Sint,
        ImageFormat::Rgb10A2 => TextureFormat::Rgb10a2Unorm,
        ImageFormat::Rg32ui => TextureFormat::Rg32Uint,
        ImageFormat::Rg32i => TextureFormat::Rg32Sint,
        ImageFormat::Rg32f => TextureFormat::Rg32Float,
        ImageFormat::Rgba16ui => TextureFormat::Rgba16Uint,
        ImageFormat::Rgba16i => TextureFormat::Rgba16Sint,
        ImageFormat::Rgba16f => TextureFormat::Rgba16Float,
        ImageFormat::Rgba32ui => TextureFormat::Rgba32Uint,
        ImageFormat::Rgba32i => TextureFormat::Rgba32Sint,
        ImageFormat::Rgba32f => TextureFormat::Rgba32Float,
        _ => return None,
    };
    Some(format)
}
