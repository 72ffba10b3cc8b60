use std::fmt;

/// Scalar kind a vertex attribute presents to the shader after fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexComponentKind {
    /// `f32` in the shader (includes normalized and half-float formats).
    Float,
    Uint,
    Sint,
}

/// Whether a vertex buffer advances per vertex or per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    #[default]
    Vertex,
    Instance,
}

/// Memory layout of a single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Float16x2,
    Float16x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

pub const ALL_VERTEX_FORMATS: [VertexFormat; 30] = [
    VertexFormat::Uint8x2,
    VertexFormat::Uint8x4,
    VertexFormat::Sint8x2,
    VertexFormat::Sint8x4,
    VertexFormat::Unorm8x2,
    VertexFormat::Unorm8x4,
    VertexFormat::Snorm8x2,
    VertexFormat::Snorm8x4,
    VertexFormat::Uint16x2,
    VertexFormat::Uint16x4,
    VertexFormat::Sint16x2,
    VertexFormat::Sint16x4,
    VertexFormat::Unorm16x2,
    VertexFormat::Unorm16x4,
    VertexFormat::Snorm16x2,
    VertexFormat::Snorm16x4,
    VertexFormat::Float16x2,
    VertexFormat::Float16x4,
    VertexFormat::Float32,
    VertexFormat::Float32x2,
    VertexFormat::Float32x3,
    VertexFormat::Float32x4,
    VertexFormat::Uint32,
    VertexFormat::Uint32x2,
    VertexFormat::Uint32x3,
    VertexFormat::Uint32x4,
    VertexFormat::Sint32,
    VertexFormat::Sint32x2,
    VertexFormat::Sint32x3,
    VertexFormat::Sint32x4,
];

impl VertexFormat {
    pub const fn component_count(self) -> u32 {
        use VertexFormat::*;
        match self {
            Float32 | Uint32 | Sint32 => 1,
            Uint8x2 | Sint8x2 | Unorm8x2 | Snorm8x2 | Uint16x2 | Sint16x2 | Unorm16x2
            | Snorm16x2 | Float16x2 | Float32x2 | Uint32x2 | Sint32x2 => 2,
            Float32x3 | Uint32x3 | Sint32x3 => 3,
            Uint8x4 | Sint8x4 | Unorm8x4 | Snorm8x4 | Uint16x4 | Sint16x4 | Unorm16x4
            | Snorm16x4 | Float16x4 | Float32x4 | Uint32x4 | Sint32x4 => 4,
        }
    }

    /// Size in bytes of a single component as stored in the vertex buffer.
    pub const fn component_byte_size(self) -> u32 {
        use VertexFormat::*;
        match self {
            Uint8x2 | Uint8x4 | Sint8x2 | Sint8x4 | Unorm8x2 | Unorm8x4 | Snorm8x2
            | Snorm8x4 => 1,
            Uint16x2 | Uint16x4 | Sint16x2 | Sint16x4 | Unorm16x2 | Unorm16x4 | Snorm16x2
            | Snorm16x4 | Float16x2 | Float16x4 => 2,
            _ => 4,
        }
    }

    pub const fn byte_size(self) -> u32 {
        self.component_count() * self.component_byte_size()
    }

    pub const fn component_kind(self) -> VertexComponentKind {
        use VertexFormat::*;
        match self {
            Uint8x2 | Uint8x4 | Uint16x2 | Uint16x4 | Uint32 | Uint32x2 | Uint32x3
            | Uint32x4 => VertexComponentKind::Uint,
            Sint8x2 | Sint8x4 | Sint16x2 | Sint16x4 | Sint32 | Sint32x2 | Sint32x3
            | Sint32x4 => VertexComponentKind::Sint,
            _ => VertexComponentKind::Float,
        }
    }

    pub fn name(self) -> &'static str {
        use VertexFormat::*;
        match self {
            Uint8x2 => "uint8x2",
            Uint8x4 => "uint8x4",
            Sint8x2 => "sint8x2",
            Sint8x4 => "sint8x4",
            Unorm8x2 => "unorm8x2",
            Unorm8x4 => "unorm8x4",
            Snorm8x2 => "snorm8x2",
            Snorm8x4 => "snorm8x4",
            Uint16x2 => "uint16x2",
            Uint16x4 => "uint16x4",
            Sint16x2 => "sint16x2",
            Sint16x4 => "sint16x4",
            Unorm16x2 => "unorm16x2",
            Unorm16x4 => "unorm16x4",
            Snorm16x2 => "snorm16x2",
            Snorm16x4 => "snorm16x4",
            Float16x2 => "float16x2",
            Float16x4 => "float16x4",
            Float32 => "float32",
            Float32x2 => "float32x2",
            Float32x3 => "float32x3",
            Float32x4 => "float32x4",
            Uint32 => "uint32",
            Uint32x2 => "uint32x2",
            Uint32x3 => "uint32x3",
            Uint32x4 => "uint32x4",
            Sint32 => "sint32",
            Sint32x2 => "sint32x2",
            Sint32x3 => "sint32x3",
            Sint32x4 => "sint32x4",
        }
    }
}

impl fmt::Display for VertexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
