use std::fmt;

/// Dimensionality of a texture view as seen by a shader binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureViewDimension {
    D1,
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

/// Dimensionality of the texture storage backing a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D1,
    D2,
    D3,
}

impl TextureViewDimension {
    /// Returns the storage dimension a texture must have to be viewed with `self`.
    ///
    /// Cube and array views are backed by 2D textures with multiple layers.
    pub fn texture_dimension(self) -> TextureDimension {
        match self {
            TextureViewDimension::D1 => TextureDimension::D1,
            TextureViewDimension::D2
            | TextureViewDimension::D2Array
            | TextureViewDimension::Cube
            | TextureViewDimension::CubeArray => TextureDimension::D2,
            TextureViewDimension::D3 => TextureDimension::D3,
        }
    }
}

impl fmt::Display for TextureViewDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TextureViewDimension::D1 => "1d",
            TextureViewDimension::D2 => "2d",
            TextureViewDimension::D2Array => "2d-array",
            TextureViewDimension::Cube => "cube",
            TextureViewDimension::CubeArray => "cube-array",
            TextureViewDimension::D3 => "3d",
        };
        f.write_str(s)
    }
}
