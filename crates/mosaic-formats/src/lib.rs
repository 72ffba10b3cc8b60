//! Read-only capability tables for texture and vertex formats.
//!
//! Shader reflection consults these tables to map declared storage-image formats onto
//! [`TextureFormat`] and to reject formats that cannot back a storage binding. The vertex
//! pulling transform uses [`VertexFormat`] to know how many bytes and components each
//! attribute occupies.

mod dimension;
mod texture;
mod vertex;

pub use dimension::{TextureDimension, TextureViewDimension};
pub use texture::{
    is_astc_format, is_bc_format, is_etc2_format, CompressionFamily, FormatInfo,
    ParseTextureFormatError, TextureComponentType, TextureFormat, ALL_TEXTURE_FORMATS,
    ASTC_FORMATS, BC_FORMATS, COMPRESSED_FORMATS, ETC2_FORMATS,
};
pub use vertex::{VertexComponentKind, VertexFormat, VertexStepMode, ALL_VERTEX_FORMATS};
