mod common;

use std::sync::Arc;
use std::thread;

use mosaic_shader::{
    ChainedDescriptor, CompilationMessageKind, DescriptorError, Device, ShaderModuleConfig,
    ShaderModuleDescriptor, ShaderModuleError, ShaderSourceKind, TranslationStage,
    ValidationError,
};

fn unvalidated_device() -> Device {
    Device::new(ShaderModuleConfig {
        validate_on_create: false,
        ..ShaderModuleConfig::default()
    })
}

#[test]
fn identical_spirv_is_deduplicated() {
    common::init_tracing();
    let device = Device::default();
    let first = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(common::compute_with_uniform(0, 0)))
        .unwrap();
    let second = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(common::compute_with_uniform(0, 0)))
        .unwrap();
    let other = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(common::compute_with_uniform(0, 1)))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(device.cached_module_count(), 2);
    assert_eq!(device.cache_stats().hits, 1);
    assert_eq!(first.source_kind(), ShaderSourceKind::Spirv);
}

#[test]
fn dropping_last_reference_evicts_module() {
    let device = Device::default();
    let descriptor = ShaderModuleDescriptor::spirv(common::compute_with_uniform(1, 2));
    let module = device.create_shader_module(&descriptor).unwrap();
    let hash = module.content_hash();
    let clone = Arc::clone(&module);

    drop(module);
    assert_eq!(device.cached_module_count(), 1);
    drop(clone);
    assert_eq!(device.cached_module_count(), 0);
    assert_eq!(device.cache_stats().removals, 1);

    let recreated = device.create_shader_module(&descriptor).unwrap();
    assert_eq!(recreated.content_hash(), hash);
    assert_eq!(device.cache_stats().misses, 2);
}

#[test]
fn module_outliving_device_drops_cleanly() {
    let module = Device::default()
        .create_shader_module(&ShaderModuleDescriptor::wgsl(common::COMPUTE_WGSL))
        .unwrap();
    assert!(!module.is_error());
    drop(module);
}

#[test]
fn wgsl_module_is_found_by_its_translation() {
    let device = unvalidated_device();
    let wgsl = device
        .create_shader_module(&ShaderModuleDescriptor::wgsl(common::COMPUTE_WGSL).with_label("wgsl"))
        .unwrap();
    let spirv = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(wgsl.spirv().to_vec()))
        .unwrap();

    assert!(Arc::ptr_eq(&wgsl, &spirv));
    assert_eq!(spirv.source_kind(), ShaderSourceKind::Wgsl);
    assert_eq!(spirv.label(), Some("wgsl"));
}

#[test]
fn metadata_is_computed_once() {
    let module = Device::default()
        .create_shader_module(&ShaderModuleDescriptor::wgsl(common::FRAGMENT_WGSL))
        .unwrap();
    let first = module.metadata().unwrap();
    let second = module.metadata().unwrap();
    assert!(Arc::ptr_eq(first, second));
}

#[test]
fn concurrent_first_reflection_agrees() {
    let module = Device::default()
        .create_shader_module(&ShaderModuleDescriptor::wgsl(common::VERTEX_WGSL))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let module = Arc::clone(&module);
            thread::spawn(move || Arc::clone(module.metadata().unwrap()))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for result in &results {
        assert!(Arc::ptr_eq(result, &results[0]));
    }
    assert!(Arc::ptr_eq(&results[0], module.metadata().unwrap()));
}

#[test]
fn concurrent_creation_shares_one_module() {
    let device = Device::default();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let device = device.clone();
            thread::spawn(move || {
                device
                    .create_shader_module(&ShaderModuleDescriptor::wgsl(common::COMPUTE_WGSL))
                    .unwrap()
            })
        })
        .collect();
    let modules: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for module in &modules {
        assert!(Arc::ptr_eq(module, &modules[0]));
    }
    assert_eq!(device.cached_module_count(), 1);
}

#[test]
fn descriptor_errors() {
    let device = Device::default();

    let err = device
        .create_shader_module(&ShaderModuleDescriptor::default())
        .unwrap_err();
    assert_eq!(
        err,
        ShaderModuleError::Descriptor(DescriptorError::MissingChainedDescriptor)
    );

    let mut chained = ShaderModuleDescriptor::spirv(common::compute_with_uniform(0, 0));
    chained.next_in_chain.push(ChainedDescriptor::Wgsl {
        source: common::COMPUTE_WGSL.to_owned(),
    });
    assert_eq!(
        device.create_shader_module(&chained).unwrap_err(),
        ShaderModuleError::Descriptor(DescriptorError::MultipleChainedDescriptors)
    );

    let unknown = ShaderModuleDescriptor {
        label: None,
        next_in_chain: vec![ChainedDescriptor::Unknown { s_type: 42 }],
    };
    assert_eq!(
        device.create_shader_module(&unknown).unwrap_err(),
        ShaderModuleError::Descriptor(DescriptorError::UnsupportedSType(42))
    );
    assert_eq!(device.cached_module_count(), 0);
}

#[test]
fn invalid_spirv_fails_creation_when_validating() {
    let device = Device::default();
    let err = device
        .create_shader_module(&ShaderModuleDescriptor::spirv(vec![0xdead_beef, 1, 2]))
        .unwrap_err();
    assert!(
        matches!(err, ShaderModuleError::Validation(ValidationError::Spirv(_))),
        "{err}"
    );
    assert!(err.to_string().starts_with("SPIRV Validation failure:\n"));
}

#[test]
fn invalid_spirv_fails_reflection_when_not_validating() {
    let module = unvalidated_device()
        .create_shader_module(&ShaderModuleDescriptor::spirv(vec![0xdead_beef, 1, 2]))
        .unwrap();
    assert!(matches!(module.metadata(), Err(ValidationError::Parse(_))));
}

#[test]
fn invalid_wgsl_names_the_stage() {
    let err = Device::default()
        .create_shader_module(&ShaderModuleDescriptor::wgsl("@compute fn main( {"))
        .unwrap_err();
    let ShaderModuleError::Translation(err) = err else {
        panic!("expected a translation error, got {err:?}");
    };
    assert_eq!(err.stage, TranslationStage::Parse);
}

#[test]
fn failed_creation_yields_error_module() {
    let device = Device::default();
    let descriptor = ShaderModuleDescriptor::default().with_label("empty");
    let module = device.create_shader_module_or_error(&descriptor);

    assert!(module.is_error());
    assert_eq!(module.label(), Some("empty"));
    assert_eq!(
        module.error_reason(),
        Some("Shader module descriptor missing chained descriptor")
    );
    let messages = &module.compilation_info().messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].kind, CompilationMessageKind::Error);
    assert_eq!(device.cached_module_count(), 0);
}

#[test]
#[should_panic(expected = "error shader module")]
fn error_module_reflection_panics() {
    let module = Device::default().create_error_shader_module(None, "lost");
    let _ = module.binding_info();
}

#[test]
fn valid_spirv_reports_no_errors() {
    let module = Device::default()
        .create_shader_module(&ShaderModuleDescriptor::spirv(common::compute_with_uniform(0, 0)))
        .unwrap();
    assert!(module
        .compilation_info()
        .messages
        .iter()
        .all(|m| m.kind != CompilationMessageKind::Error));
}
