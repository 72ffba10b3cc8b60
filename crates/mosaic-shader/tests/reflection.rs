mod common;

use mosaic_formats::{TextureComponentType, TextureFormat, TextureViewDimension};
use mosaic_shader::{
    reflector_for, validate_spirv, BindingType, CompilationMessageKind, DiagnosticLevel, Device,
    ReflectionBackend, Reflector, ShaderModuleConfig, ShaderModuleDescriptor, SingleShaderStage,
    ValidationError,
};
use pretty_assertions::assert_eq;

const BACKENDS: [ReflectionBackend; 2] = [
    ReflectionBackend::CrossCompiler,
    ReflectionBackend::ReflectionService,
];

fn device(backend: ReflectionBackend) -> Device {
    Device::new(ShaderModuleConfig {
        reflection_backend: backend,
        ..ShaderModuleConfig::default()
    })
}

#[test]
fn compute_buffers() {
    for backend in BACKENDS {
        let module = device(backend)
            .create_shader_module(&ShaderModuleDescriptor::wgsl(common::COMPUTE_WGSL))
            .unwrap();
        assert_eq!(module.execution_model().unwrap(), SingleShaderStage::Compute);

        let bindings = module.binding_info().unwrap();
        let params = &bindings[0][&0];
        assert_eq!(params.binding_type, BindingType::UniformBuffer, "{backend}");
        assert_eq!(params.min_buffer_binding_size, 20, "{backend}");

        let lights = &bindings[0][&3];
        assert_eq!(lights.binding_type, BindingType::ReadonlyStorageBuffer, "{backend}");
        assert_eq!(lights.min_buffer_binding_size, 16, "{backend}");

        let counters = &bindings[1][&1];
        assert_eq!(counters.binding_type, BindingType::StorageBuffer, "{backend}");
        assert_eq!(counters.min_buffer_binding_size, 8, "{backend}");

        assert!(bindings[2].is_empty() && bindings[3].is_empty());
        assert!(module.used_vertex_attributes().unwrap().is_empty());
    }
}

#[test]
fn fragment_textures_and_outputs() {
    for backend in BACKENDS {
        let module = device(backend)
            .create_shader_module(&ShaderModuleDescriptor::wgsl(common::FRAGMENT_WGSL))
            .unwrap();
        let metadata = module.metadata().unwrap();
        assert_eq!(metadata.stage, SingleShaderStage::Fragment);

        let color_map = &metadata.bindings[0][&0];
        assert_eq!(color_map.binding_type, BindingType::SampledTexture);
        assert_eq!(color_map.view_dimension, Some(TextureViewDimension::D2));
        assert_eq!(color_map.texture_component_type, TextureComponentType::Float);
        assert!(!color_map.multisampled);

        let index_map = &metadata.bindings[0][&2];
        assert_eq!(index_map.view_dimension, Some(TextureViewDimension::D2Array));
        assert_eq!(index_map.texture_component_type, TextureComponentType::Uint);

        assert_eq!(
            metadata.bindings[2][&0].view_dimension,
            Some(TextureViewDimension::Cube)
        );

        // Comparison samplers are indistinguishable from regular ones in SPIR-V.
        assert_eq!(metadata.bindings[0][&1].binding_type, BindingType::Sampler);
        assert_eq!(metadata.bindings[2][&5].binding_type, BindingType::Sampler);

        assert_eq!(
            metadata.fragment_output_base_types,
            [
                TextureComponentType::Float,
                TextureComponentType::Other,
                TextureComponentType::Uint,
                TextureComponentType::Other,
            ],
            "{backend}"
        );
    }
}

#[test]
fn vertex_attributes() {
    for backend in BACKENDS {
        let module = device(backend)
            .create_shader_module(&ShaderModuleDescriptor::wgsl(common::VERTEX_WGSL))
            .unwrap();
        assert_eq!(module.execution_model().unwrap(), SingleShaderStage::Vertex);
        assert_eq!(
            module.used_vertex_attributes().unwrap().iter().collect::<Vec<_>>(),
            vec![0, 3],
            "{backend}"
        );
    }
}

#[test]
fn storage_texture_access() {
    for backend in BACKENDS {
        let module = device(backend)
            .create_shader_module(&ShaderModuleDescriptor::wgsl(common::STORAGE_TEXTURE_WGSL))
            .unwrap();
        let bindings = module.binding_info().unwrap();

        let output = &bindings[0][&0];
        assert_eq!(output.binding_type, BindingType::WriteonlyStorageTexture, "{backend}");
        assert_eq!(output.storage_texture_format, Some(TextureFormat::Rgba8Unorm));
        assert_eq!(output.view_dimension, Some(TextureViewDimension::D2));

        let accum = &bindings[0][&1];
        assert_eq!(accum.binding_type, BindingType::StorageTexture, "{backend}");
        assert_eq!(accum.storage_texture_format, Some(TextureFormat::R32Float));
        assert_eq!(accum.view_dimension, Some(TextureViewDimension::D2Array));
    }
}

#[test]
fn rejected_features() {
    common::init_tracing();
    let cases = [
        (common::compute_with_push_constants(), ValidationError::PushConstants),
        (
            common::fragment_with_combined_sampler(),
            ValidationError::CombinedImageSampler,
        ),
        (
            common::vertex_without_input_location(),
            ValidationError::MissingVertexInputLocation,
        ),
        (
            common::compute_with_duplicate_binding(),
            ValidationError::DuplicateBinding {
                group: 0,
                binding: 1,
            },
        ),
        (
            common::geometry_module(),
            ValidationError::UnsupportedExecutionModel("Geometry".to_owned()),
        ),
    ];
    for (words, expected) in cases {
        for backend in BACKENDS {
            assert_eq!(
                reflector_for(backend).reflect(&words),
                Err(expected.clone()),
                "{backend}"
            );
        }
    }
}

#[test]
fn std140_matrix_module_is_accepted() {
    let words = common::compute_with_std140_matrix(2, 2, false);
    let report = validate_spirv(&words).unwrap();
    assert!(!report.has_errors(), "{:?}", report.diagnostics());
    assert!(report
        .diagnostics()
        .iter()
        .any(|d| d.level == DiagnosticLevel::Warning));

    for backend in BACKENDS {
        let module = device(backend)
            .create_shader_module(&ShaderModuleDescriptor::spirv(words.clone()))
            .unwrap();
        let transform = &module.binding_info().unwrap()[0][&0];
        assert_eq!(transform.binding_type, BindingType::UniformBuffer, "{backend}");
        assert_eq!(transform.min_buffer_binding_size, 32, "{backend}");
        let messages = &module.compilation_info().messages;
        assert!(messages.iter().all(|m| m.kind != CompilationMessageKind::Error));
        assert!(messages.iter().any(|m| m.kind == CompilationMessageKind::Warning));
    }
}

#[test]
fn group_over_limit_is_rejected() {
    let words = common::compute_with_uniform(4, 0);
    for backend in BACKENDS {
        assert_eq!(
            reflector_for(backend).reflect(&words),
            Err(ValidationError::BindGroupOverLimit { group: 4 }),
            "{backend}"
        );
    }
}

#[test]
fn reflection_failure_is_memoized() {
    let device = Device::new(ShaderModuleConfig {
        validate_on_create: false,
        ..ShaderModuleConfig::default()
    });
    let module = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(
            common::compute_with_push_constants(),
        ))
        .unwrap();
    assert_eq!(module.metadata().unwrap_err(), ValidationError::PushConstants);
    assert_eq!(module.binding_info().unwrap_err(), ValidationError::PushConstants);
}
