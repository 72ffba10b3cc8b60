use std::collections::BTreeMap;
use std::fmt;

use bitflags::bitflags;
use mosaic_formats::{TextureComponentType, TextureFormat, TextureViewDimension};

use crate::limits::{MAX_BIND_GROUPS, MAX_COLOR_ATTACHMENTS, MAX_VERTEX_ATTRIBUTES};

pub type BindGroupIndex = u32;
pub type BindingNumber = u32;

/// The single pipeline stage an entry point runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingleShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl SingleShaderStage {
    pub fn stage_bit(self) -> ShaderStages {
        match self {
            SingleShaderStage::Vertex => ShaderStages::VERTEX,
            SingleShaderStage::Fragment => ShaderStages::FRAGMENT,
            SingleShaderStage::Compute => ShaderStages::COMPUTE,
        }
    }
}

impl fmt::Display for SingleShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingleShaderStage::Vertex => write!(f, "vertex"),
            SingleShaderStage::Fragment => write!(f, "fragment"),
            SingleShaderStage::Compute => write!(f, "compute"),
        }
    }
}

bitflags! {
    /// Stage visibility of a bind group layout entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer,
    ReadonlyStorageBuffer,
    Sampler,
    ComparisonSampler,
    SampledTexture,
    /// Read-write storage texture.
    StorageTexture,
    ReadonlyStorageTexture,
    WriteonlyStorageTexture,
}

impl BindingType {
    pub fn is_buffer(self) -> bool {
        matches!(
            self,
            BindingType::UniformBuffer
                | BindingType::StorageBuffer
                | BindingType::ReadonlyStorageBuffer
        )
    }

    pub fn is_storage_texture(self) -> bool {
        matches!(
            self,
            BindingType::StorageTexture
                | BindingType::ReadonlyStorageTexture
                | BindingType::WriteonlyStorageTexture
        )
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BindingType::UniformBuffer => "uniform-buffer",
            BindingType::StorageBuffer => "storage-buffer",
            BindingType::ReadonlyStorageBuffer => "readonly-storage-buffer",
            BindingType::Sampler => "sampler",
            BindingType::ComparisonSampler => "comparison-sampler",
            BindingType::SampledTexture => "sampled-texture",
            BindingType::StorageTexture => "storage-texture",
            BindingType::ReadonlyStorageTexture => "readonly-storage-texture",
            BindingType::WriteonlyStorageTexture => "writeonly-storage-texture",
        };
        f.write_str(s)
    }
}

/// What a shader requires of one `(group, binding)` slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderBindingInfo {
    pub binding_type: BindingType,
    /// Buffer kinds only: size of the declared block, counting a trailing runtime array as one
    /// element.
    pub min_buffer_binding_size: u64,
    pub view_dimension: Option<TextureViewDimension>,
    pub texture_component_type: TextureComponentType,
    pub storage_texture_format: Option<TextureFormat>,
    pub multisampled: bool,
}

impl ShaderBindingInfo {
    pub fn new(binding_type: BindingType) -> Self {
        Self {
            binding_type,
            min_buffer_binding_size: 0,
            view_dimension: None,
            texture_component_type: TextureComponentType::Other,
            storage_texture_format: None,
            multisampled: false,
        }
    }
}

pub type BindingInfoMap = BTreeMap<BindingNumber, ShaderBindingInfo>;

/// Per-group declared bindings, indexed by bind group.
pub type ModuleBindingInfo = [BindingInfoMap; MAX_BIND_GROUPS];

/// Per-group minimum sizes for the layout's unverified buffer bindings, in packing order.
pub type RequiredBufferSizes = [Vec<u64>; MAX_BIND_GROUPS];

/// Bitset over vertex attribute locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttributeMask(u32);

impl AttributeMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns `false`, leaving the mask unchanged, if `location` is not below
    /// [`MAX_VERTEX_ATTRIBUTES`].
    pub fn insert(&mut self, location: u32) -> bool {
        if (location as usize) >= MAX_VERTEX_ATTRIBUTES {
            return false;
        }
        self.0 |= 1 << location;
        true
    }

    pub fn contains(&self, location: u32) -> bool {
        (location as usize) < MAX_VERTEX_ATTRIBUTES && self.0 & (1 << location) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..MAX_VERTEX_ATTRIBUTES as u32).filter(move |&location| self.contains(location))
    }
}

/// Bitset over bind group indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BindGroupMask(u8);

impl BindGroupMask {
    /// Returns `false`, leaving the mask unchanged, if `group` is not below [`MAX_BIND_GROUPS`].
    pub fn insert(&mut self, group: usize) -> bool {
        if group >= MAX_BIND_GROUPS {
            return false;
        }
        self.0 |= 1 << group;
        true
    }

    pub fn contains(&self, group: usize) -> bool {
        group < MAX_BIND_GROUPS && self.0 & (1 << group) != 0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_BIND_GROUPS).filter(move |&group| self.contains(group))
    }
}

/// Everything reflection learns about a module's single entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPointMetadata {
    pub stage: SingleShaderStage,
    pub bindings: ModuleBindingInfo,
    pub used_vertex_attributes: AttributeMask,
    pub fragment_output_base_types: [TextureComponentType; MAX_COLOR_ATTACHMENTS],
}

impl EntryPointMetadata {
    pub fn new(stage: SingleShaderStage) -> Self {
        Self {
            stage,
            bindings: Default::default(),
            used_vertex_attributes: AttributeMask::empty(),
            fragment_output_base_types: [TextureComponentType::Other; MAX_COLOR_ATTACHMENTS],
        }
    }

    /// Groups in which the shader declares at least one binding.
    pub fn used_groups(&self) -> BindGroupMask {
        let mut mask = BindGroupMask::default();
        for (group, bindings) in self.bindings.iter().enumerate() {
            if !bindings.is_empty() {
                mask.insert(group);
            }
        }
        mask
    }
}
