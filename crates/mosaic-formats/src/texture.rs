use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Base type of the texels a shader reads from (or writes to) a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureComponentType {
    Float,
    Sint,
    Uint,
    /// Unused, or not one of the other base types.
    #[default]
    Other,
}

impl fmt::Display for TextureComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextureComponentType::Float => "float",
            TextureComponentType::Sint => "sint",
            TextureComponentType::Uint => "uint",
            TextureComponentType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Block-compression family of a compressed format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionFamily {
    Bc,
    Etc2,
    Astc,
}

/// Every texture format the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureFormat {
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Uint,
    R16Sint,
    R16Float,
    Rg8Unorm,
    Rg8Snorm,
    Rg8Uint,
    Rg8Sint,
    R32Float,
    R32Uint,
    R32Sint,
    Rg16Uint,
    Rg16Sint,
    Rg16Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba8Snorm,
    Rgba8Uint,
    Rgba8Sint,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgb10a2Unorm,
    Rg11b10Ufloat,
    Rgb9e5Ufloat,
    Rg32Float,
    Rg32Uint,
    Rg32Sint,
    Rgba16Uint,
    Rgba16Sint,
    Rgba16Float,
    Rgba32Float,
    Rgba32Uint,
    Rgba32Sint,
    Depth32Float,
    Depth24Plus,
    Depth24PlusStencil8,
    Bc1RgbaUnorm,
    Bc1RgbaUnormSrgb,
    Bc2RgbaUnorm,
    Bc2RgbaUnormSrgb,
    Bc3RgbaUnorm,
    Bc3RgbaUnormSrgb,
    Bc4RUnorm,
    Bc4RSnorm,
    Bc5RgUnorm,
    Bc5RgSnorm,
    Bc6hRgbUfloat,
    Bc6hRgbFloat,
    Bc7RgbaUnorm,
    Bc7RgbaUnormSrgb,
    Etc2Rgb8Unorm,
    Etc2Rgb8UnormSrgb,
    Etc2Rgb8A1Unorm,
    Etc2Rgb8A1UnormSrgb,
    Etc2Rgba8Unorm,
    Etc2Rgba8UnormSrgb,
    EacR11Unorm,
    EacR11Snorm,
    EacRg11Unorm,
    EacRg11Snorm,
}

pub const ALL_TEXTURE_FORMATS: [TextureFormat; 63] = [
    TextureFormat::R8Unorm,
    TextureFormat::R8Snorm,
    TextureFormat::R8Uint,
    TextureFormat::R8Sint,
    TextureFormat::R16Uint,
    TextureFormat::R16Sint,
    TextureFormat::R16Float,
    TextureFormat::Rg8Unorm,
    TextureFormat::Rg8Snorm,
    TextureFormat::Rg8Uint,
    TextureFormat::Rg8Sint,
    TextureFormat::R32Float,
    TextureFormat::R32Uint,
    TextureFormat::R32Sint,
    TextureFormat::Rg16Uint,
    TextureFormat::Rg16Sint,
    TextureFormat::Rg16Float,
    TextureFormat::Rgba8Unorm,
    TextureFormat::Rgba8UnormSrgb,
    TextureFormat::Rgba8Snorm,
    TextureFormat::Rgba8Uint,
    TextureFormat::Rgba8Sint,
    TextureFormat::Bgra8Unorm,
    TextureFormat::Bgra8UnormSrgb,
    TextureFormat::Rgb10a2Unorm,
    TextureFormat::Rg11b10Ufloat,
    TextureFormat::Rgb9e5Ufloat,
    TextureFormat::Rg32Float,
    TextureFormat::Rg32Uint,
    TextureFormat::Rg32Sint,
    TextureFormat::Rgba16Uint,
    TextureFormat::Rgba16Sint,
    TextureFormat::Rgba16Float,
    TextureFormat::Rgba32Float,
    TextureFormat::Rgba32Uint,
    TextureFormat::Rgba32Sint,
    TextureFormat::Depth32Float,
    TextureFormat::Depth24Plus,
    TextureFormat::Depth24PlusStencil8,
    TextureFormat::Bc1RgbaUnorm,
    TextureFormat::Bc1RgbaUnormSrgb,
    TextureFormat::Bc2RgbaUnorm,
    TextureFormat::Bc2RgbaUnormSrgb,
    TextureFormat::Bc3RgbaUnorm,
    TextureFormat::Bc3RgbaUnormSrgb,
    TextureFormat::Bc4RUnorm,
    TextureFormat::Bc4RSnorm,
    TextureFormat::Bc5RgUnorm,
    TextureFormat::Bc5RgSnorm,
    TextureFormat::Bc6hRgbUfloat,
    TextureFormat::Bc6hRgbFloat,
    TextureFormat::Bc7RgbaUnorm,
    TextureFormat::Bc7RgbaUnormSrgb,
    TextureFormat::Etc2Rgb8Unorm,
    TextureFormat::Etc2Rgb8UnormSrgb,
    TextureFormat::Etc2Rgb8A1Unorm,
    TextureFormat::Etc2Rgb8A1UnormSrgb,
    TextureFormat::Etc2Rgba8Unorm,
    TextureFormat::Etc2Rgba8UnormSrgb,
    TextureFormat::EacR11Unorm,
    TextureFormat::EacR11Snorm,
    TextureFormat::EacRg11Unorm,
    TextureFormat::EacRg11Snorm,
];

pub const BC_FORMATS: [TextureFormat; 14] = [
    TextureFormat::Bc1RgbaUnorm,
    TextureFormat::Bc1RgbaUnormSrgb,
    TextureFormat::Bc2RgbaUnorm,
    TextureFormat::Bc2RgbaUnormSrgb,
    TextureFormat::Bc3RgbaUnorm,
    TextureFormat::Bc3RgbaUnormSrgb,
    TextureFormat::Bc4RUnorm,
    TextureFormat::Bc4RSnorm,
    TextureFormat::Bc5RgUnorm,
    TextureFormat::Bc5RgSnorm,
    TextureFormat::Bc6hRgbUfloat,
    TextureFormat::Bc6hRgbFloat,
    TextureFormat::Bc7RgbaUnorm,
    TextureFormat::Bc7RgbaUnormSrgb,
];

pub const ETC2_FORMATS: [TextureFormat; 10] = [
    TextureFormat::Etc2Rgb8Unorm,
    TextureFormat::Etc2Rgb8UnormSrgb,
    TextureFormat::Etc2Rgb8A1Unorm,
    TextureFormat::Etc2Rgb8A1UnormSrgb,
    TextureFormat::Etc2Rgba8Unorm,
    TextureFormat::Etc2Rgba8UnormSrgb,
    TextureFormat::EacR11Unorm,
    TextureFormat::EacR11Snorm,
    TextureFormat::EacRg11Unorm,
    TextureFormat::EacRg11Snorm,
];

// No ASTC formats are implemented yet.
pub const ASTC_FORMATS: [TextureFormat; 0] = [];

pub const COMPRESSED_FORMATS: [TextureFormat; 24] = [
    TextureFormat::Bc1RgbaUnorm,
    TextureFormat::Bc1RgbaUnormSrgb,
    TextureFormat::Bc2RgbaUnorm,
    TextureFormat::Bc2RgbaUnormSrgb,
    TextureFormat::Bc3RgbaUnorm,
    TextureFormat::Bc3RgbaUnormSrgb,
    TextureFormat::Bc4RUnorm,
    TextureFormat::Bc4RSnorm,
    TextureFormat::Bc5RgUnorm,
    TextureFormat::Bc5RgSnorm,
    TextureFormat::Bc6hRgbUfloat,
    TextureFormat::Bc6hRgbFloat,
    TextureFormat::Bc7RgbaUnorm,
    TextureFormat::Bc7RgbaUnormSrgb,
    TextureFormat::Etc2Rgb8Unorm,
    TextureFormat::Etc2Rgb8UnormSrgb,
    TextureFormat::Etc2Rgb8A1Unorm,
    TextureFormat::Etc2Rgb8A1UnormSrgb,
    TextureFormat::Etc2Rgba8Unorm,
    TextureFormat::Etc2Rgba8UnormSrgb,
    TextureFormat::EacR11Unorm,
    TextureFormat::EacR11Snorm,
    TextureFormat::EacRg11Unorm,
    TextureFormat::EacRg11Snorm,
];

/// Capabilities of a single texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Bytes per texel block. `None` for packed depth/stencil formats whose size depends on
    /// the aspect being accessed.
    pub block_byte_size: Option<u32>,
    pub block_width: u32,
    pub block_height: u32,
    pub supports_storage_usage: bool,
    pub compression: Option<CompressionFamily>,
    pub component_type: TextureComponentType,
    pub is_renderable: bool,
    pub is_depth_stencil: bool,
}

impl FormatInfo {
    const fn color(block_byte_size: u32, component_type: TextureComponentType) -> Self {
        Self {
            block_byte_size: Some(block_byte_size),
            block_width: 1,
            block_height: 1,
            supports_storage_usage: false,
            compression: None,
            component_type,
            is_renderable: true,
            is_depth_stencil: false,
        }
    }

    const fn storage(mut self) -> Self {
        self.supports_storage_usage = true;
        self
    }

    const fn not_renderable(mut self) -> Self {
        self.is_renderable = false;
        self
    }

    const fn depth(block_byte_size: Option<u32>) -> Self {
        Self {
            block_byte_size,
            block_width: 1,
            block_height: 1,
            supports_storage_usage: false,
            compression: None,
            component_type: TextureComponentType::Float,
            is_renderable: true,
            is_depth_stencil: true,
        }
    }

    const fn compressed(family: CompressionFamily, block_byte_size: u32) -> Self {
        Self {
            block_byte_size: Some(block_byte_size),
            block_width: 4,
            block_height: 4,
            supports_storage_usage: false,
            compression: Some(family),
            component_type: TextureComponentType::Float,
            is_renderable: false,
            is_depth_stencil: false,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.compression.is_some()
    }
}

impl TextureFormat {
    pub const fn info(self) -> FormatInfo {
        use CompressionFamily::{Bc, Etc2};
        use TextureComponentType::{Float, Sint, Uint};
        use TextureFormat::*;

        match self {
            R8Unorm => FormatInfo::color(1, Float),
            R8Snorm => FormatInfo::color(1, Float).not_renderable(),
            R8Uint => FormatInfo::color(1, Uint),
            R8Sint => FormatInfo::color(1, Sint),

            R16Uint => FormatInfo::color(2, Uint),
            R16Sint => FormatInfo::color(2, Sint),
            R16Float => FormatInfo::color(2, Float),
            Rg8Unorm => FormatInfo::color(2, Float),
            Rg8Snorm => FormatInfo::color(2, Float).not_renderable(),
            Rg8Uint => FormatInfo::color(2, Uint),
            Rg8Sint => FormatInfo::color(2, Sint),

            R32Float => FormatInfo::color(4, Float).storage(),
            R32Uint => FormatInfo::color(4, Uint).storage(),
            R32Sint => FormatInfo::color(4, Sint).storage(),
            Rg16Uint => FormatInfo::color(4, Uint),
            Rg16Sint => FormatInfo::color(4, Sint),
            Rg16Float => FormatInfo::color(4, Float),
            Rgba8Unorm => FormatInfo::color(4, Float).storage(),
            Rgba8UnormSrgb => FormatInfo::color(4, Float),
            Rgba8Snorm => FormatInfo::color(4, Float).storage().not_renderable(),
            Rgba8Uint => FormatInfo::color(4, Uint).storage(),
            Rgba8Sint => FormatInfo::color(4, Sint).storage(),
            Bgra8Unorm => FormatInfo::color(4, Float),
            Bgra8UnormSrgb => FormatInfo::color(4, Float),
            Rgb10a2Unorm => FormatInfo::color(4, Float),
            Rg11b10Ufloat => FormatInfo::color(4, Float).not_renderable(),
            Rgb9e5Ufloat => FormatInfo::color(4, Float).not_renderable(),

            Rg32Float => FormatInfo::color(8, Float).storage(),
            Rg32Uint => FormatInfo::color(8, Uint).storage(),
            Rg32Sint => FormatInfo::color(8, Sint).storage(),
            Rgba16Uint => FormatInfo::color(8, Uint).storage(),
            Rgba16Sint => FormatInfo::color(8, Sint).storage(),
            Rgba16Float => FormatInfo::color(8, Float).storage(),

            Rgba32Float => FormatInfo::color(16, Float).storage(),
            Rgba32Uint => FormatInfo::color(16, Uint).storage(),
            Rgba32Sint => FormatInfo::color(16, Sint).storage(),

            Depth32Float => FormatInfo::depth(Some(4)),
            Depth24Plus => FormatInfo::depth(Some(4)),
            Depth24PlusStencil8 => FormatInfo::depth(None),

            Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Bc4RUnorm | Bc4RSnorm => {
                FormatInfo::compressed(Bc, 8)
            }
            Bc2RgbaUnorm | Bc2RgbaUnormSrgb | Bc3RgbaUnorm | Bc3RgbaUnormSrgb | Bc5RgUnorm
            | Bc5RgSnorm | Bc6hRgbUfloat | Bc6hRgbFloat | Bc7RgbaUnorm | Bc7RgbaUnormSrgb => {
                FormatInfo::compressed(Bc, 16)
            }

            Etc2Rgb8Unorm | Etc2Rgb8UnormSrgb | Etc2Rgb8A1Unorm | Etc2Rgb8A1UnormSrgb
            | EacR11Unorm | EacR11Snorm => FormatInfo::compressed(Etc2, 8),
            Etc2Rgba8Unorm | Etc2Rgba8UnormSrgb | EacRg11Unorm | EacRg11Snorm => {
                FormatInfo::compressed(Etc2, 16)
            }
        }
    }

    pub fn supports_storage_usage(self) -> bool {
        self.info().supports_storage_usage
    }

    /// Lower-case WebGPU name of the format, e.g. `"rgba8unorm"`.
    pub fn name(self) -> &'static str {
        use TextureFormat::*;
        match self {
            R8Unorm => "r8unorm",
            R8Snorm => "r8snorm",
            R8Uint => "r8uint",
            R8Sint => "r8sint",
            R16Uint => "r16uint",
            R16Sint => "r16sint",
            R16Float => "r16float",
            Rg8Unorm => "rg8unorm",
            Rg8Snorm => "rg8snorm",
            Rg8Uint => "rg8uint",
            Rg8Sint => "rg8sint",
            R32Float => "r32float",
            R32Uint => "r32uint",
            R32Sint => "r32sint",
            Rg16Uint => "rg16uint",
            Rg16Sint => "rg16sint",
            Rg16Float => "rg16float",
            Rgba8Unorm => "rgba8unorm",
            Rgba8UnormSrgb => "rgba8unorm-srgb",
            Rgba8Snorm => "rgba8snorm",
            Rgba8Uint => "rgba8uint",
            Rgba8Sint => "rgba8sint",
            Bgra8Unorm => "bgra8unorm",
            Bgra8UnormSrgb => "bgra8unorm-srgb",
            Rgb10a2Unorm => "rgb10a2unorm",
            Rg11b10Ufloat => "rg11b10ufloat",
            Rgb9e5Ufloat => "rgb9e5ufloat",
            Rg32Float => "rg32float",
            Rg32Uint => "rg32uint",
            Rg32Sint => "rg32sint",
            Rgba16Uint => "rgba16uint",
            Rgba16Sint => "rgba16sint",
            Rgba16Float => "rgba16float",
            Rgba32Float => "rgba32float",
            Rgba32Uint => "rgba32uint",
            Rgba32Sint => "rgba32sint",
            Depth32Float => "depth32float",
            Depth24Plus => "depth24plus",
            Depth24PlusStencil8 => "depth24plus-stencil8",
            Bc1RgbaUnorm => "bc1-rgba-unorm",
            Bc1RgbaUnormSrgb => "bc1-rgba-unorm-srgb",
            Bc2RgbaUnorm => "bc2-rgba-unorm",
            Bc2RgbaUnormSrgb => "bc2-rgba-unorm-srgb",
            Bc3RgbaUnorm => "bc3-rgba-unorm",
            Bc3RgbaUnormSrgb => "bc3-rgba-unorm-srgb",
            Bc4RUnorm => "bc4-r-unorm",
            Bc4RSnorm => "bc4-r-snorm",
            Bc5RgUnorm => "bc5-rg-unorm",
            Bc5RgSnorm => "bc5-rg-snorm",
            Bc6hRgbUfloat => "bc6h-rgb-ufloat",
            Bc6hRgbFloat => "bc6h-rgb-float",
            Bc7RgbaUnorm => "bc7-rgba-unorm",
            Bc7RgbaUnormSrgb => "bc7-rgba-unorm-srgb",
            Etc2Rgb8Unorm => "etc2-rgb8unorm",
            Etc2Rgb8UnormSrgb => "etc2-rgb8unorm-srgb",
            Etc2Rgb8A1Unorm => "etc2-rgb8a1unorm",
            Etc2Rgb8A1UnormSrgb => "etc2-rgb8a1unorm-srgb",
            Etc2Rgba8Unorm => "etc2-rgba8unorm",
            Etc2Rgba8UnormSrgb => "etc2-rgba8unorm-srgb",
            EacR11Unorm => "eac-r11unorm",
            EacR11Snorm => "eac-r11snorm",
            EacRg11Unorm => "eac-rg11unorm",
            EacRg11Snorm => "eac-rg11snorm",
        }
    }

    /// WGSL scalar type used to sample a color texture of this format.
    ///
    /// Returns `None` for depth/stencil formats, which are sampled through depth texture
    /// types instead.
    pub fn wgsl_color_texture_component_type(self) -> Option<&'static str> {
        let info = self.info();
        if info.is_depth_stencil {
            return None;
        }
        match info.component_type {
            TextureComponentType::Float => Some("f32"),
            TextureComponentType::Sint => Some("i32"),
            TextureComponentType::Uint => Some("u32"),
            TextureComponentType::Other => None,
        }
    }

    /// Format qualifier to use in a WGSL `texture_storage_*` declaration.
    ///
    /// Only formats usable as storage textures have a qualifier.
    pub fn wgsl_image_format_qualifier(self) -> Option<&'static str> {
        self.supports_storage_usage().then(|| self.name())
    }

    /// Number of color channels written by a fragment output targeting this format.
    pub fn wgsl_renderable_color_component_count(self) -> Option<u32> {
        use TextureFormat::*;

        let info = self.info();
        if !info.is_renderable || info.is_depth_stencil {
            return None;
        }
        let count = match self {
            R8Unorm | R8Uint | R8Sint | R16Uint | R16Sint | R16Float | R32Float | R32Uint
            | R32Sint => 1,
            Rg8Unorm | Rg8Uint | Rg8Sint | Rg16Uint | Rg16Sint | Rg16Float | Rg32Float
            | Rg32Uint | Rg32Sint => 2,
            _ => 4,
        };
        Some(count)
    }
}

pub fn is_bc_format(format: TextureFormat) -> bool {
    format.info().compression == Some(CompressionFamily::Bc)
}

pub fn is_etc2_format(format: TextureFormat) -> bool {
    format.info().compression == Some(CompressionFamily::Etc2)
}

pub fn is_astc_format(format: TextureFormat) -> bool {
    format.info().compression == Some(CompressionFamily::Astc)
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown texture format `{0}`")]
pub struct ParseTextureFormatError(pub String);

impl FromStr for TextureFormat {
    type Err = ParseTextureFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TEXTURE_FORMATS
            .iter()
            .copied()
            .find(|format| format.name() == s)
            .ok_or_else(|| ParseTextureFormatError(s.to_owned()))
    }
}
