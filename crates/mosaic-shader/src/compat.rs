//! Checks a reflected entry point against the resource layouts of a pipeline.

use crate::error::CompatibilityError;
use crate::layout::{BindGroupLayout, PipelineLayout};
use crate::limits::MAX_BIND_GROUPS;
use crate::types::{BindGroupIndex, BindingInfoMap, BindingType, EntryPointMetadata, RequiredBufferSizes};

/// Layout and shader binding types that may differ while staying compatible.
///
/// A writable storage buffer in the layout may back a read-only declaration. Samplers and
/// comparison samplers are interchangeable because reflection cannot tell them apart.
fn is_compatible_binding_type(layout: BindingType, shader: BindingType) -> bool {
    layout == shader
        || matches!(
            (layout, shader),
            (BindingType::StorageBuffer, BindingType::ReadonlyStorageBuffer)
                | (BindingType::Sampler, BindingType::ComparisonSampler)
                | (BindingType::ComparisonSampler, BindingType::Sampler)
        )
}

/// Validates every binding the entry point declares in `group` against `layout`.
pub fn validate_compatibility_with_bind_group_layout(
    group: BindGroupIndex,
    metadata: &EntryPointMetadata,
    layout: &BindGroupLayout,
) -> Result<(), CompatibilityError> {
    let Some(bindings) = metadata.bindings.get(group as usize) else {
        return Ok(());
    };

    for (&binding, shader) in bindings {
        let Some(&index) = layout.binding_map().get(&binding) else {
            return Err(CompatibilityError::MissingLayoutEntry { group, binding });
        };
        let entry = layout.binding_info(index);

        if !is_compatible_binding_type(entry.binding_type, shader.binding_type) {
            return Err(CompatibilityError::BindingTypeConflict { group, binding });
        }
        if !entry.visibility.contains(metadata.stage.stage_bit()) {
            return Err(CompatibilityError::NotVisible { group, binding });
        }

        match entry.binding_type {
            BindingType::SampledTexture => {
                if entry.texture_component_type != shader.texture_component_type {
                    return Err(CompatibilityError::TextureComponentTypeMismatch { group, binding });
                }
                if Some(entry.view_dimension) != shader.view_dimension {
                    return Err(CompatibilityError::ViewDimensionMismatch { group, binding });
                }
            }
            BindingType::StorageTexture
            | BindingType::ReadonlyStorageTexture
            | BindingType::WriteonlyStorageTexture => {
                if entry.storage_texture_format != shader.storage_texture_format {
                    return Err(CompatibilityError::StorageTextureFormatMismatch { group, binding });
                }
                if Some(entry.view_dimension) != shader.view_dimension {
                    return Err(CompatibilityError::ViewDimensionMismatch { group, binding });
                }
            }
            BindingType::UniformBuffer
            | BindingType::StorageBuffer
            | BindingType::ReadonlyStorageBuffer => {
                if entry.min_buffer_binding_size != 0
                    && shader.min_buffer_binding_size > entry.min_buffer_binding_size
                {
                    return Err(CompatibilityError::MinBufferSizeTooSmall {
                        group,
                        binding,
                        layout_size: entry.min_buffer_binding_size,
                        shader_size: shader.min_buffer_binding_size,
                    });
                }
            }
            BindingType::Sampler | BindingType::ComparisonSampler => {}
        }
    }

    Ok(())
}

/// Validates each present bind group layout, then rejects shader groups the layout omits.
pub fn validate_compatibility_with_pipeline_layout(
    metadata: &EntryPointMetadata,
    layout: &PipelineLayout,
) -> Result<(), CompatibilityError> {
    for group in 0..MAX_BIND_GROUPS {
        match layout.bind_group_layout(group) {
            Some(bgl) => {
                validate_compatibility_with_bind_group_layout(group as BindGroupIndex, metadata, bgl)?
            }
            None if !metadata.bindings[group].is_empty() => {
                return Err(CompatibilityError::MissingBindGroupLayout {
                    group: group as BindGroupIndex,
                })
            }
            None => {}
        }
    }
    Ok(())
}

/// Minimum sizes the shader needs for each unverified buffer binding, in packing order.
///
/// Groups without a layout get an empty list. Unverified buffers the shader does not use
/// still take a slot, with a requirement of 0.
pub fn compute_required_buffer_sizes_for_layout(
    metadata: &EntryPointMetadata,
    layout: &PipelineLayout,
) -> RequiredBufferSizes {
    let mut sizes = RequiredBufferSizes::default();
    for group in layout.bind_group_layouts_mask().iter() {
        if let Some(bgl) = layout.bind_group_layout(group) {
            sizes[group] = bind_group_min_buffer_sizes(&metadata.bindings[group], bgl);
        }
    }
    sizes
}

fn bind_group_min_buffer_sizes(shader: &BindingInfoMap, layout: &BindGroupLayout) -> Vec<u64> {
    let mut sizes = Vec::with_capacity(layout.unverified_buffer_count());
    for index in 0..layout.buffer_count() {
        let entry = layout.binding_info(index);
        if entry.min_buffer_binding_size != 0 {
            continue;
        }
        let required = shader
            .get(&entry.binding)
            .map_or(0, |info| info.min_buffer_binding_size);
        sizes.push(required);
    }
    sizes
}
