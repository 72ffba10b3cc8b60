//! Minimal bind group and pipeline layout model read by the compatibility checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use mosaic_formats::{TextureComponentType, TextureFormat, TextureViewDimension};

use crate::error::LayoutError;
use crate::limits::MAX_BIND_GROUPS;
use crate::types::{BindGroupMask, BindingNumber, BindingType, ShaderStages};

/// One binding slot of a bind group layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindGroupLayoutEntry {
    pub binding: BindingNumber,
    pub visibility: ShaderStages,
    pub binding_type: BindingType,
    pub has_dynamic_offset: bool,
    /// 0 means the size is verified at draw/dispatch time against the shader's requirement.
    pub min_buffer_binding_size: u64,
    pub view_dimension: TextureViewDimension,
    pub texture_component_type: TextureComponentType,
    pub storage_texture_format: Option<TextureFormat>,
    pub multisampled: bool,
}

impl BindGroupLayoutEntry {
    pub fn new(binding: BindingNumber, visibility: ShaderStages, binding_type: BindingType) -> Self {
        Self {
            binding,
            visibility,
            binding_type,
            has_dynamic_offset: false,
            min_buffer_binding_size: 0,
            view_dimension: TextureViewDimension::D2,
            texture_component_type: TextureComponentType::Float,
            storage_texture_format: None,
            multisampled: false,
        }
    }
}

/// Bind group layout with its entries stored in packing order.
///
/// Buffers are packed first so per-buffer side tables (dynamic offsets, required sizes) can be
/// indexed densely. Among buffers, dynamic-offset bindings come first, then bindings with a
/// pinned minimum size, then unverified ones. Each run is sorted by binding number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupLayout {
    entries: Vec<BindGroupLayoutEntry>,
    binding_map: BTreeMap<BindingNumber, usize>,
    buffer_count: usize,
    unverified_buffer_count: usize,
    dynamic_buffer_count: usize,
}

fn packing_key(entry: &BindGroupLayoutEntry) -> (bool, bool, bool, BindingNumber) {
    let is_buffer = entry.binding_type.is_buffer();
    (
        !is_buffer,
        !(is_buffer && entry.has_dynamic_offset),
        is_buffer && entry.min_buffer_binding_size == 0,
        entry.binding,
    )
}

impl BindGroupLayout {
    pub fn new(mut entries: Vec<BindGroupLayoutEntry>) -> Result<Self, LayoutError> {
        entries.sort_by_key(packing_key);

        let mut binding_map = BTreeMap::new();
        for (index, entry) in entries.iter().enumerate() {
            if binding_map.insert(entry.binding, index).is_some() {
                return Err(LayoutError::DuplicateBinding(entry.binding));
            }
        }

        let buffers = entries.iter().filter(|e| e.binding_type.is_buffer());
        let buffer_count = buffers.clone().count();
        let unverified_buffer_count = buffers
            .clone()
            .filter(|e| e.min_buffer_binding_size == 0)
            .count();
        let dynamic_buffer_count = buffers.filter(|e| e.has_dynamic_offset).count();

        Ok(Self {
            entries,
            binding_map,
            buffer_count,
            unverified_buffer_count,
            dynamic_buffer_count,
        })
    }

    /// Binding number to packed index.
    pub fn binding_map(&self) -> &BTreeMap<BindingNumber, usize> {
        &self.binding_map
    }

    /// Panics if `index` is out of range.
    pub fn binding_info(&self, index: usize) -> &BindGroupLayoutEntry {
        &self.entries[index]
    }

    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.entries
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// Buffers whose size is only known to be large enough once a shader is attached.
    pub fn unverified_buffer_count(&self) -> usize {
        self.unverified_buffer_count
    }

    pub fn dynamic_buffer_count(&self) -> usize {
        self.dynamic_buffer_count
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineLayout {
    bind_group_layouts: [Option<Arc<BindGroupLayout>>; MAX_BIND_GROUPS],
}

impl PipelineLayout {
    pub fn new(bind_group_layouts: [Option<Arc<BindGroupLayout>>; MAX_BIND_GROUPS]) -> Self {
        Self { bind_group_layouts }
    }

    pub fn bind_group_layout(&self, group: usize) -> Option<&Arc<BindGroupLayout>> {
        self.bind_group_layouts.get(group)?.as_ref()
    }

    pub fn bind_group_layouts_mask(&self) -> BindGroupMask {
        let mut mask = BindGroupMask::default();
        for (group, layout) in self.bind_group_layouts.iter().enumerate() {
            if layout.is_some() {
                mask.insert(group);
            }
        }
        mask
    }
}
