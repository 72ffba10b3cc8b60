//! Shared shader sources and hand-assembled SPIR-V modules for `mosaic-shader` integration
//! tests.

#![allow(dead_code)]

use mosaic_shader::{translate, TranslateOptions};
use rspirv::binary::Assemble;
use rspirv::dr::{Builder, Operand};
use rspirv::spirv::{self, Decoration, StorageClass, Word};

pub const COMPUTE_WGSL: &str = r#"
struct Params {
    scale: vec4<f32>,
    bias: f32,
}

struct Counters {
    count: u32,
    items: array<u32>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(0) @binding(3) var<storage, read> lights: array<vec4<f32>>;
@group(1) @binding(1) var<storage, read_write> counters: Counters;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let light = lights[id.x] * params.scale + vec4<f32>(params.bias);
    if (light.x > 0.5) {
        counters.items[id.x] = counters.count;
    }
}
"#;

pub const FRAGMENT_WGSL: &str = r#"
@group(0) @binding(0) var color_map: texture_2d<f32>;
@group(0) @binding(1) var color_sampler: sampler;
@group(0) @binding(2) var index_map: texture_2d_array<u32>;
@group(2) @binding(0) var sky: texture_cube<f32>;
@group(2) @binding(5) var shadow_sampler: sampler_comparison;

struct Targets {
    @location(0) color: vec4<f32>,
    @location(2) id: vec4<u32>,
}

@fragment
fn main(@location(0) uv: vec2<f32>) -> Targets {
    var out: Targets;
    let layer = textureLoad(index_map, vec2<i32>(0, 0), 0, 0);
    out.color = textureSample(color_map, color_sampler, uv)
        + textureSample(sky, color_sampler, vec3<f32>(uv, 1.0));
    out.id = layer;
    return out;
}
"#;

pub const VERTEX_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn main(
    @builtin(vertex_index) index: u32,
    @location(0) position: vec3<f32>,
    @location(3) uv: vec2<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, f32(index));
    out.uv = uv;
    return out;
}
"#;

pub const STORAGE_TEXTURE_WGSL: &str = r#"
@group(0) @binding(0) var output: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(1) var accum: texture_storage_2d_array<r32float, read_write>;

@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let previous = textureLoad(accum, vec2<i32>(id.xy), 0);
    textureStore(accum, vec2<i32>(id.xy), 0, previous + vec4<f32>(1.0));
    textureStore(output, vec2<i32>(id.xy), vec4<f32>(previous.x));
}
"#;

/// Routes library logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn wgsl_to_spirv(source: &str) -> Vec<u32> {
    translate(source, &TranslateOptions::default()).expect("test WGSL should translate")
}

fn base_builder() -> Builder {
    let mut b = Builder::new();
    b.set_version(1, 3);
    b.capability(spirv::Capability::Shader);
    b.memory_model(spirv::AddressingModel::Logical, spirv::MemoryModel::GLSL450);
    b
}

/// Adds an empty `void main()` and declares it as the entry point.
fn finish_entry(
    mut b: Builder,
    model: spirv::ExecutionModel,
    interface: Vec<Word>,
) -> Vec<u32> {
    let void = b.type_void();
    let fn_ty = b.type_function(void, vec![]);
    let main = b
        .begin_function(void, None, spirv::FunctionControl::NONE, fn_ty)
        .unwrap();
    b.begin_block(None).unwrap();
    b.ret().unwrap();
    b.end_function().unwrap();
    b.entry_point(model, main, "main", interface);
    match model {
        spirv::ExecutionModel::GLCompute => {
            b.execution_mode(main, spirv::ExecutionMode::LocalSize, [1, 1, 1])
        }
        spirv::ExecutionModel::Fragment => {
            b.execution_mode(main, spirv::ExecutionMode::OriginUpperLeft, [])
        }
        _ => {}
    }
    b.module().assemble()
}

/// Compute module with a `{ u32 }` push constant block.
pub fn compute_with_push_constants() -> Vec<u32> {
    let mut b = base_builder();
    let u32_ty = b.type_int(32, 0);
    let block = b.type_struct([u32_ty]);
    b.decorate(block, Decoration::Block, []);
    b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
    let ptr = b.type_pointer(None, StorageClass::PushConstant, block);
    let var = b.variable(ptr, None, StorageClass::PushConstant, None);
    b.name(var, "constants");
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Fragment module with a combined image sampler at (0, 0).
pub fn fragment_with_combined_sampler() -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let image = b.type_image(
        f32_ty,
        spirv::Dim::Dim2D,
        0,
        0,
        0,
        1,
        spirv::ImageFormat::Unknown,
        None,
    );
    let sampled = b.type_sampled_image(image);
    let ptr = b.type_pointer(None, StorageClass::UniformConstant, sampled);
    let var = b.variable(ptr, None, StorageClass::UniformConstant, None);
    b.name(var, "combined");
    b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
    b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(0)]);
    finish_entry(b, spirv::ExecutionModel::Fragment, vec![])
}

/// Vertex module whose single `vec4` input has no Location decoration.
pub fn vertex_without_input_location() -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let vec4 = b.type_vector(f32_ty, 4);
    let ptr = b.type_pointer(None, StorageClass::Input, vec4);
    let var = b.variable(ptr, None, StorageClass::Input, None);
    b.name(var, "position");
    finish_entry(b, spirv::ExecutionModel::Vertex, vec![var])
}

/// Compute module with a uniform block `{ vec4<f32>; u32 }` at `(set, binding)`.
pub fn compute_with_uniform(set: u32, binding: u32) -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let u32_ty = b.type_int(32, 0);
    let vec4 = b.type_vector(f32_ty, 4);
    let block = b.type_struct([vec4, u32_ty]);
    b.decorate(block, Decoration::Block, []);
    b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
    b.member_decorate(block, 1, Decoration::Offset, [Operand::LiteralBit32(16)]);
    let ptr = b.type_pointer(None, StorageClass::Uniform, block);
    let var = b.variable(ptr, None, StorageClass::Uniform, None);
    b.name(var, "globals");
    b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(set)]);
    b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(binding)]);
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Compute module declaring two uniform blocks at the same `(0, 1)` slot.
pub fn compute_with_duplicate_binding() -> Vec<u32> {
    let mut b = base_builder();
    let u32_ty = b.type_int(32, 0);
    let block = b.type_struct([u32_ty]);
    b.decorate(block, Decoration::Block, []);
    b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
    let ptr = b.type_pointer(None, StorageClass::Uniform, block);
    for name in ["first", "second"] {
        let var = b.variable(ptr, None, StorageClass::Uniform, None);
        b.name(var, name);
        b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
        b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(1)]);
    }
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Geometry-stage module, which reflection must refuse.
pub fn geometry_module() -> Vec<u32> {
    let mut b = base_builder();
    b.capability(spirv::Capability::Geometry);
    finish_entry(b, spirv::ExecutionModel::Geometry, vec![])
}

/// Compute module with a std140 uniform block `{ matCxR transform; }` at (0, 0) and a
/// `MatrixStride` of 16, the layout glslang emits for every matrix in a uniform block.
pub fn compute_with_std140_matrix(columns: u32, rows: u32, row_major: bool) -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let column = b.type_vector(f32_ty, rows);
    let matrix = b.type_matrix(column, columns);
    let block = b.type_struct([matrix]);
    b.decorate(block, Decoration::Block, []);
    b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
    let major = if row_major {
        Decoration::RowMajor
    } else {
        Decoration::ColMajor
    };
    b.member_decorate(block, 0, major, []);
    b.member_decorate(block, 0, Decoration::MatrixStride, [Operand::LiteralBit32(16)]);
    let ptr = b.type_pointer(None, StorageClass::Uniform, block);
    let var = b.variable(ptr, None, StorageClass::Uniform, None);
    b.name(var, "transform");
    b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
    b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(0)]);
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Compute module with a `{ u32 count; vec4<f32> items[]; }` buffer at (1, 0).
///
/// In the `Uniform` storage class the block is decorated `BufferBlock`, the pre-1.3 spelling
/// of a storage buffer. `non_writable` decorates every member `NonWritable`, which is how
/// glslang spells a `readonly` buffer.
pub fn compute_with_storage_block(class: StorageClass, non_writable: bool) -> Vec<u32> {
    let mut b = base_builder();
    let u32_ty = b.type_int(32, 0);
    let f32_ty = b.type_float(32);
    let vec4 = b.type_vector(f32_ty, 4);
    let items = b.type_runtime_array(vec4);
    b.decorate(items, Decoration::ArrayStride, [Operand::LiteralBit32(16)]);
    let block = b.type_struct([u32_ty, items]);
    let block_decoration = if class == StorageClass::Uniform {
        Decoration::BufferBlock
    } else {
        Decoration::Block
    };
    b.decorate(block, block_decoration, []);
    b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
    b.member_decorate(block, 1, Decoration::Offset, [Operand::LiteralBit32(16)]);
    if non_writable {
        b.member_decorate(block, 0, Decoration::NonWritable, []);
        b.member_decorate(block, 1, Decoration::NonWritable, []);
    }
    let ptr = b.type_pointer(None, class, block);
    let var = b.variable(ptr, None, class, None);
    b.name(var, "items");
    b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(1)]);
    b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(0)]);
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Compute module with an `rgba8` 2D storage image at (0, 3), decorated with the given
/// access qualifiers.
pub fn compute_with_storage_image(non_readable: bool, non_writable: bool) -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let image = b.type_image(
        f32_ty,
        spirv::Dim::Dim2D,
        0,
        0,
        0,
        2,
        spirv::ImageFormat::Rgba8,
        None,
    );
    let ptr = b.type_pointer(None, StorageClass::UniformConstant, image);
    let var = b.variable(ptr, None, StorageClass::UniformConstant, None);
    b.name(var, "target");
    b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
    b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(3)]);
    if non_readable {
        b.decorate(var, Decoration::NonReadable, []);
    }
    if non_writable {
        b.decorate(var, Decoration::NonWritable, []);
    }
    finish_entry(b, spirv::ExecutionModel::GLCompute, vec![])
}

/// Fragment module with a 2D depth image at (0, 0) and a sampler at (0, 1).
pub fn fragment_with_depth_image() -> Vec<u32> {
    let mut b = base_builder();
    let f32_ty = b.type_float(32);
    let image = b.type_image(
        f32_ty,
        spirv::Dim::Dim2D,
        1,
        0,
        0,
        1,
        spirv::ImageFormat::Unknown,
        None,
    );
    let image_ptr = b.type_pointer(None, StorageClass::UniformConstant, image);
    let shadow = b.variable(image_ptr, None, StorageClass::UniformConstant, None);
    b.name(shadow, "shadow");
    b.decorate(shadow, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
    b.decorate(shadow, Decoration::Binding, [Operand::LiteralBit32(0)]);

    let sampler = b.type_sampler();
    let sampler_ptr = b.type_pointer(None, StorageClass::UniformConstant, sampler);
    let compare = b.variable(sampler_ptr, None, StorageClass::UniformConstant, None);
    b.name(compare, "compare");
    b.decorate(compare, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
    b.decorate(compare, Decoration::Binding, [Operand::LiteralBit32(1)]);
    finish_entry(b, spirv::ExecutionModel::Fragment, vec![])
}

/// Vertex module in glslang's shape: a `vec4` input at location 0 and the `gl_PerVertex`
/// output block, whose members are all builtins.
pub fn vertex_with_per_vertex_block() -> Vec<u32> {
    let mut b = base_builder();
    b.capability(spirv::Capability::ClipDistance);
    b.capability(spirv::Capability::CullDistance);
    let f32_ty = b.type_float(32);
    let u32_ty = b.type_int(32, 0);
    let vec4 = b.type_vector(f32_ty, 4);
    let one = b.constant_bit32(u32_ty, 1);
    let distances = b.type_array(f32_ty, one);

    let per_vertex = b.type_struct([vec4, f32_ty, distances, distances]);
    b.name(per_vertex, "gl_PerVertex");
    b.decorate(per_vertex, Decoration::Block, []);
    let builtins = [
        spirv::BuiltIn::Position,
        spirv::BuiltIn::PointSize,
        spirv::BuiltIn::ClipDistance,
        spirv::BuiltIn::CullDistance,
    ];
    for (member, builtin) in builtins.into_iter().enumerate() {
        b.member_decorate(
            per_vertex,
            member as u32,
            Decoration::BuiltIn,
            [Operand::BuiltIn(builtin)],
        );
    }
    let out_ptr = b.type_pointer(None, StorageClass::Output, per_vertex);
    let out = b.variable(out_ptr, None, StorageClass::Output, None);

    let in_ptr = b.type_pointer(None, StorageClass::Input, vec4);
    let position = b.variable(in_ptr, None, StorageClass::Input, None);
    b.name(position, "position");
    b.decorate(position, Decoration::Location, [Operand::LiteralBit32(0)]);
    finish_entry(b, spirv::ExecutionModel::Vertex, vec![out, position])
}

/// Vertex module with an unlocated `vec4` input, plus whatever `extra` declares.
fn unlocated_vertex_with(extra: impl FnOnce(&mut Builder)) -> Vec<u32> {
    let mut b = base_builder();
    extra(&mut b);
    let f32_ty = b.type_float(32);
    let vec4 = b.type_vector(f32_ty, 4);
    let ptr = b.type_pointer(None, StorageClass::Input, vec4);
    let var = b.variable(ptr, None, StorageClass::Input, None);
    b.name(var, "position");
    finish_entry(b, spirv::ExecutionModel::Vertex, vec![var])
}

/// Vertex module with a push constant block and an unlocated input.
pub fn vertex_with_push_constants_and_unlocated_input() -> Vec<u32> {
    unlocated_vertex_with(|b| {
        let u32_ty = b.type_int(32, 0);
        let block = b.type_struct([u32_ty]);
        b.decorate(block, Decoration::Block, []);
        b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
        let ptr = b.type_pointer(None, StorageClass::PushConstant, block);
        let var = b.variable(ptr, None, StorageClass::PushConstant, None);
        b.name(var, "constants");
    })
}

/// Vertex module with two uniform blocks at (0, 1) and an unlocated input.
pub fn vertex_with_duplicate_binding_and_unlocated_input() -> Vec<u32> {
    unlocated_vertex_with(|b| {
        let u32_ty = b.type_int(32, 0);
        let block = b.type_struct([u32_ty]);
        b.decorate(block, Decoration::Block, []);
        b.member_decorate(block, 0, Decoration::Offset, [Operand::LiteralBit32(0)]);
        let ptr = b.type_pointer(None, StorageClass::Uniform, block);
        for name in ["first", "second"] {
            let var = b.variable(ptr, None, StorageClass::Uniform, None);
            b.name(var, name);
            b.decorate(var, Decoration::DescriptorSet, [Operand::LiteralBit32(0)]);
            b.decorate(var, Decoration::Binding, [Operand::LiteralBit32(1)]);
        }
    })
}
