//! Rewrites a vertex entry point to fetch its inputs from storage buffers.
//!
//! Every vertex buffer layout `i` becomes a read-only `array<u32>` at
//! `@group(pulling_group) @binding(i)`. The original entry function is demoted to a regular
//! function, and a new entry function taking `vertex_index` and `instance_index` rebuilds each
//! location input from buffer words before calling it.

use std::collections::{BTreeMap, HashMap};

use mosaic_formats::{VertexComponentKind, VertexFormat, VertexStepMode};
use naga::{
    AddressSpace, ArraySize, BinaryOperator, Binding, BuiltIn, Expression, Function,
    FunctionArgument, GlobalVariable, Handle, Literal, MathFunction, ResourceBinding, Scalar,
    ScalarKind, Span, Statement, StorageAccess, Type, TypeInner, UniqueArena,
};

use crate::limits::{MAX_BIND_GROUPS, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    /// Byte offset of the attribute within one element of the buffer.
    pub offset: u64,
    pub shader_location: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Byte distance between consecutive elements.
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

/// Vertex input state of a render pipeline, one layout per vertex buffer slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexState {
    pub vertex_buffers: Vec<VertexBufferLayout>,
}

/// Attribute placement resolved from a [`VertexState`], keyed by shader location.
struct AttributeSlot {
    buffer: usize,
    format: VertexFormat,
    first_word: u32,
}

pub(super) fn apply(
    module: &mut naga::Module,
    vertex_state: &VertexState,
    entry_point: &str,
    pulling_group: u32,
) -> Result<(), String> {
    let entry_index = module
        .entry_points
        .iter()
        .position(|ep| ep.name == entry_point)
        .ok_or_else(|| format!("entry point `{entry_point}` not found"))?;
    if module.entry_points[entry_index].stage != naga::ShaderStage::Vertex {
        return Err(format!("entry point `{entry_point}` is not a vertex shader"));
    }
    if pulling_group as usize >= MAX_BIND_GROUPS {
        return Err(format!(
            "pulling group {pulling_group} is over the limit of {MAX_BIND_GROUPS} bind groups"
        ));
    }
    let colliding = module
        .global_variables
        .iter()
        .find(|(_, var)| var.binding.as_ref().is_some_and(|b| b.group == pulling_group));
    if let Some((_, var)) = colliding {
        return Err(format!(
            "pulling group {pulling_group} is already used by `{}`",
            var.name.as_deref().unwrap_or("<unnamed>")
        ));
    }

    let (element_words, attributes) = resolve_layouts(vertex_state)?;

    let u32_ty = module.types.insert(
        Type {
            name: None,
            inner: TypeInner::Scalar(Scalar::U32),
        },
        Span::UNDEFINED,
    );
    let words_ty = module.types.insert(
        Type {
            name: None,
            inner: TypeInner::Array {
                base: u32_ty,
                size: ArraySize::Dynamic,
                stride: 4,
            },
        },
        Span::UNDEFINED,
    );
    let buffers: Vec<Handle<GlobalVariable>> = (0..vertex_state.vertex_buffers.len() as u32)
        .map(|binding| {
            module.global_variables.append(
                GlobalVariable {
                    name: Some(format!("vertex_pulling_buffer_{binding}")),
                    space: AddressSpace::Storage {
                        access: StorageAccess::LOAD,
                    },
                    binding: Some(ResourceBinding {
                        group: pulling_group,
                        binding,
                    }),
                    ty: words_ty,
                    init: None,
                },
                Span::UNDEFINED,
            )
        })
        .collect();

    let mut inner = std::mem::take(&mut module.entry_points[entry_index].function);
    let inputs: Vec<(Option<Binding>, Handle<Type>)> = inner
        .arguments
        .iter()
        .map(|arg| (arg.binding.clone(), arg.ty))
        .collect();
    let result = inner.result.clone();
    for arg in &mut inner.arguments {
        arg.binding = None;
    }
    if let Some(result) = &mut inner.result {
        result.binding = None;
    }
    inner.name = Some(format!("{entry_point}_inner"));
    let inner = module.functions.append(inner, Span::UNDEFINED);

    let mut function = Function {
        name: Some(entry_point.to_owned()),
        arguments: vec![
            FunctionArgument {
                name: Some("vertex_index".to_owned()),
                ty: u32_ty,
                binding: Some(Binding::BuiltIn(BuiltIn::VertexIndex)),
            },
            FunctionArgument {
                name: Some("instance_index".to_owned()),
                ty: u32_ty,
                binding: Some(Binding::BuiltIn(BuiltIn::InstanceIndex)),
            },
        ],
        result,
        ..Default::default()
    };
    let vertex_index = function
        .expressions
        .append(Expression::FunctionArgument(0), Span::UNDEFINED);
    let instance_index = function
        .expressions
        .append(Expression::FunctionArgument(1), Span::UNDEFINED);

    let mut builder = PullingBuilder {
        types: &module.types,
        step_modes: vertex_state
            .vertex_buffers
            .iter()
            .map(|layout| layout.step_mode)
            .collect(),
        element_words,
        attributes,
        buffers,
        vertex_index,
        instance_index,
        function,
        emit_start: None,
        globals: HashMap::new(),
        element_bases: HashMap::new(),
    };

    let mut arguments = Vec::with_capacity(inputs.len());
    for (binding, ty) in &inputs {
        arguments.push(builder.input_value(binding.as_ref(), *ty)?);
    }
    let function = builder.finish_with_call(inner, arguments);

    module.entry_points[entry_index].function = function;
    Ok(())
}

/// Checks the vertex state and converts it to word units.
fn resolve_layouts(
    vertex_state: &VertexState,
) -> Result<(Vec<u32>, BTreeMap<u32, AttributeSlot>), String> {
    if vertex_state.vertex_buffers.len() > MAX_VERTEX_BUFFERS {
        return Err(format!(
            "{} vertex buffers is over the limit of {MAX_VERTEX_BUFFERS}",
            vertex_state.vertex_buffers.len()
        ));
    }

    let mut element_words = Vec::with_capacity(vertex_state.vertex_buffers.len());
    let mut attributes = BTreeMap::new();
    for (buffer, layout) in vertex_state.vertex_buffers.iter().enumerate() {
        if layout.array_stride % 4 != 0 {
            return Err(format!(
                "vertex buffer {buffer} stride {} is not a multiple of 4",
                layout.array_stride
            ));
        }
        let stride = u32::try_from(layout.array_stride / 4)
            .map_err(|_| format!("vertex buffer {buffer} stride is too large"))?;
        element_words.push(stride);

        for attribute in &layout.attributes {
            let location = attribute.shader_location;
            if attribute.offset % 4 != 0 {
                return Err(format!(
                    "vertex attribute at location {location} has offset {} which is not a multiple of 4",
                    attribute.offset
                ));
            }
            let first_word = u32::try_from(attribute.offset / 4)
                .map_err(|_| format!("vertex attribute at location {location} offset is too large"))?;
            if location as usize >= MAX_VERTEX_ATTRIBUTES {
                return Err(format!(
                    "vertex attribute location {location} is over the limit of {MAX_VERTEX_ATTRIBUTES}"
                ));
            }
            let slot = AttributeSlot {
                buffer,
                format: attribute.format,
                first_word,
            };
            if attributes.insert(location, slot).is_some() {
                return Err(format!(
                    "vertex attribute location {location} is declared more than once"
                ));
            }
        }
    }
    Ok((element_words, attributes))
}

struct PullingBuilder<'a> {
    types: &'a UniqueArena<Type>,
    step_modes: Vec<VertexStepMode>,
    element_words: Vec<u32>,
    attributes: BTreeMap<u32, AttributeSlot>,
    buffers: Vec<Handle<GlobalVariable>>,
    vertex_index: Handle<Expression>,
    instance_index: Handle<Expression>,
    function: Function,
    /// First expression of the pending `Emit` range.
    emit_start: Option<usize>,
    globals: HashMap<usize, Handle<Expression>>,
    element_bases: HashMap<usize, Handle<Expression>>,
}

/// Expressions that are in scope for the whole function and must not be emitted.
fn is_pre_emitted(expression: &Expression) -> bool {
    matches!(
        expression,
        Expression::Literal(_)
            | Expression::Constant(_)
            | Expression::ZeroValue(_)
            | Expression::FunctionArgument(_)
            | Expression::GlobalVariable(_)
            | Expression::LocalVariable(_)
    )
}

impl PullingBuilder<'_> {
    fn expr(&mut self, expression: Expression) -> Handle<Expression> {
        if is_pre_emitted(&expression) {
            self.flush_emit();
        } else if self.emit_start.is_none() {
            self.emit_start = Some(self.function.expressions.len());
        }
        self.function.expressions.append(expression, Span::UNDEFINED)
    }

    fn flush_emit(&mut self) {
        if let Some(start) = self.emit_start.take() {
            let range = self.function.expressions.range_from(start);
            self.function
                .body
                .push(Statement::Emit(range), Span::UNDEFINED);
        }
    }

    fn literal(&mut self, kind: ScalarKind, value: u32) -> Handle<Expression> {
        let literal = match kind {
            ScalarKind::Float => Literal::F32(value as f32),
            ScalarKind::Sint => Literal::I32(value as i32),
            _ => Literal::U32(value),
        };
        self.expr(Expression::Literal(literal))
    }

    fn math(
        &mut self,
        fun: MathFunction,
        arg: Handle<Expression>,
        arg1: Option<Handle<Expression>>,
        arg2: Option<Handle<Expression>>,
    ) -> Handle<Expression> {
        self.expr(Expression::Math {
            fun,
            arg,
            arg1,
            arg2,
            arg3: None,
        })
    }

    fn finish_with_call(
        mut self,
        inner: Handle<Function>,
        arguments: Vec<Handle<Expression>>,
    ) -> Function {
        self.flush_emit();
        let result = self
            .function
            .result
            .is_some()
            .then(|| {
                self.function
                    .expressions
                    .append(Expression::CallResult(inner), Span::UNDEFINED)
            });
        self.function.body.push(
            Statement::Call {
                function: inner,
                arguments,
                result,
            },
            Span::UNDEFINED,
        );
        self.function
            .body
            .push(Statement::Return { value: result }, Span::UNDEFINED);
        self.function
    }

    /// Builds the value the original entry point received through `binding`.
    fn input_value(
        &mut self,
        binding: Option<&Binding>,
        ty: Handle<Type>,
    ) -> Result<Handle<Expression>, String> {
        match binding {
            Some(Binding::BuiltIn(BuiltIn::VertexIndex)) => Ok(self.vertex_index),
            Some(Binding::BuiltIn(BuiltIn::InstanceIndex)) => Ok(self.instance_index),
            Some(Binding::BuiltIn(other)) => {
                Err(format!("unsupported vertex input builtin {other:?}"))
            }
            Some(Binding::Location { location, .. }) => self.pull_attribute(*location, ty),
            None => {
                let TypeInner::Struct { members, .. } = &self.types[ty].inner else {
                    return Err("vertex input without a binding".to_owned());
                };
                let members: Vec<_> = members
                    .iter()
                    .map(|member| (member.binding.clone(), member.ty))
                    .collect();
                let mut components = Vec::with_capacity(members.len());
                for (binding, member_ty) in &members {
                    components.push(self.input_value(binding.as_ref(), *member_ty)?);
                }
                Ok(self.expr(Expression::Compose { ty, components }))
            }
        }
    }

    fn pull_attribute(
        &mut self,
        location: u32,
        ty: Handle<Type>,
    ) -> Result<Handle<Expression>, String> {
        let (count, scalar) = match self.types[ty].inner {
            TypeInner::Scalar(scalar) => (1, scalar),
            TypeInner::Vector { size, scalar } => (size as usize, scalar),
            ref other => {
                return Err(format!(
                    "shader input at location {location} has unsupported type {other:?}"
                ))
            }
        };
        let Some(slot) = self.attributes.get(&location) else {
            return Err(format!(
                "shader input at location {location} has no vertex attribute"
            ));
        };
        let (buffer, format, first_word) = (slot.buffer, slot.format, slot.first_word);

        let expected = match format.component_kind() {
            VertexComponentKind::Float => ScalarKind::Float,
            VertexComponentKind::Uint => ScalarKind::Uint,
            VertexComponentKind::Sint => ScalarKind::Sint,
        };
        if scalar.kind != expected || scalar.width != 4 {
            return Err(format!(
                "vertex attribute at location {location} has format {format}, which does not match the shader input"
            ));
        }

        let mut components = self.fetch(buffer, format, first_word);
        const PADDING: [u32; 4] = [0, 0, 0, 1];
        while components.len() < count {
            let value = PADDING[components.len()];
            components.push(self.literal(scalar.kind, value));
        }
        components.truncate(count);

        if count == 1 {
            Ok(components[0])
        } else {
            Ok(self.expr(Expression::Compose { ty, components }))
        }
    }

    /// `index * stride_words` for `buffer`, with the index picked by the step mode.
    fn element_base(&mut self, buffer: usize) -> Handle<Expression> {
        if let Some(&base) = self.element_bases.get(&buffer) {
            return base;
        }
        let index = match self.step_modes[buffer] {
            VertexStepMode::Vertex => self.vertex_index,
            VertexStepMode::Instance => self.instance_index,
        };
        let stride = self.literal(ScalarKind::Uint, self.element_words[buffer]);
        let base = self.expr(Expression::Binary {
            op: BinaryOperator::Multiply,
            left: index,
            right: stride,
        });
        self.element_bases.insert(buffer, base);
        base
    }

    fn load_word(&mut self, buffer: usize, word: u32) -> Handle<Expression> {
        let base = self.element_base(buffer);
        let global = match self.globals.get(&buffer) {
            Some(&global) => global,
            None => {
                let global = self.expr(Expression::GlobalVariable(self.buffers[buffer]));
                self.globals.insert(buffer, global);
                global
            }
        };
        let offset = self.literal(ScalarKind::Uint, word);
        let index = self.expr(Expression::Binary {
            op: BinaryOperator::Add,
            left: base,
            right: offset,
        });
        let pointer = self.expr(Expression::Access {
            base: global,
            index,
        });
        self.expr(Expression::Load { pointer })
    }

    fn bitcast(&mut self, expr: Handle<Expression>, kind: ScalarKind) -> Handle<Expression> {
        self.expr(Expression::As {
            expr,
            kind,
            convert: None,
        })
    }

    fn unpack(
        &mut self,
        fun: MathFunction,
        word: Handle<Expression>,
        take: u32,
    ) -> Vec<Handle<Expression>> {
        let vector = self.math(fun, word, None, None);
        (0..take)
            .map(|index| {
                self.expr(Expression::AccessIndex {
                    base: vector,
                    index,
                })
            })
            .collect()
    }

    /// `bits` wide field of `word` at bit `offset`, sign-extended when `signed`.
    fn extract_bits(
        &mut self,
        word: Handle<Expression>,
        offset: u32,
        signed: bool,
        bits: u32,
    ) -> Handle<Expression> {
        let value = if signed {
            self.bitcast(word, ScalarKind::Sint)
        } else {
            word
        };
        let offset = self.literal(ScalarKind::Uint, offset);
        let count = self.literal(ScalarKind::Uint, bits);
        self.math(MathFunction::ExtractBits, value, Some(offset), Some(count))
    }

    /// Scalar components of one attribute, in the format's natural count.
    fn fetch(
        &mut self,
        buffer: usize,
        format: VertexFormat,
        first_word: u32,
    ) -> Vec<Handle<Expression>> {
        use VertexFormat::*;

        let word_count = format.byte_size().div_ceil(4);
        let words: Vec<_> = (0..word_count)
            .map(|w| self.load_word(buffer, first_word + w))
            .collect();
        let count = format.component_count();

        match format {
            Float32 | Float32x2 | Float32x3 | Float32x4 => words
                .into_iter()
                .map(|w| self.bitcast(w, ScalarKind::Float))
                .collect(),
            Uint32 | Uint32x2 | Uint32x3 | Uint32x4 => words,
            Sint32 | Sint32x2 | Sint32x3 | Sint32x4 => words
                .into_iter()
                .map(|w| self.bitcast(w, ScalarKind::Sint))
                .collect(),
            Unorm8x2 | Unorm8x4 => self.unpack(MathFunction::Unpack4x8unorm, words[0], count),
            Snorm8x2 | Snorm8x4 => self.unpack(MathFunction::Unpack4x8snorm, words[0], count),
            Unorm16x2 | Unorm16x4 | Snorm16x2 | Snorm16x4 | Float16x2 | Float16x4 => {
                let fun = match format {
                    Unorm16x2 | Unorm16x4 => MathFunction::Unpack2x16unorm,
                    Snorm16x2 | Snorm16x4 => MathFunction::Unpack2x16snorm,
                    _ => MathFunction::Unpack2x16float,
                };
                words
                    .into_iter()
                    .flat_map(|w| self.unpack(fun, w, 2))
                    .collect()
            }
            Uint8x2 | Uint8x4 | Sint8x2 | Sint8x4 => {
                let signed = matches!(format, Sint8x2 | Sint8x4);
                (0..count)
                    .map(|c| self.extract_bits(words[0], c * 8, signed, 8))
                    .collect()
            }
            Uint16x2 | Uint16x4 | Sint16x2 | Sint16x4 => {
                let signed = matches!(format, Sint16x2 | Sint16x4);
                (0..count)
                    .map(|c| {
                        self.extract_bits(words[(c / 2) as usize], (c % 2) * 16, signed, 16)
                    })
                    .collect()
            }
        }
    }
}
