use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Which reflection backend turns SPIR-V into [`crate::EntryPointMetadata`].
///
/// Both backends produce identical metadata for the same module; the choice only matters while
/// migrating between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReflectionBackend {
    /// Reflect through naga's SPIR-V frontend.
    #[default]
    CrossCompiler,
    /// Reflect by walking the SPIR-V instruction stream with rspirv.
    ReflectionService,
}

impl ReflectionBackend {
    pub fn toggle_name(self) -> &'static str {
        match self {
            ReflectionBackend::CrossCompiler => "cross_compiler",
            ReflectionBackend::ReflectionService => "reflection_service",
        }
    }
}

impl fmt::Display for ReflectionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.toggle_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reflection backend `{0}` (expected `cross_compiler` or `reflection_service`)")]
pub struct ParseReflectionBackendError(String);

impl FromStr for ReflectionBackend {
    type Err = ParseReflectionBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cross_compiler" => Ok(ReflectionBackend::CrossCompiler),
            "reflection_service" => Ok(ReflectionBackend::ReflectionService),
            other => Err(ParseReflectionBackendError(other.to_owned())),
        }
    }
}

/// Options for the WGSL to SPIR-V translator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TranslateOptions {
    /// Clamp buffer, array and image-load indices so out-of-bounds accesses stay in bounds.
    pub robust_buffer_access: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            robust_buffer_access: true,
        }
    }
}

/// Per-device shader module configuration, passed explicitly at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderModuleConfig {
    /// Run the IR validator (SPIR-V) or the parse/verify checks (WGSL) at creation.
    pub validate_on_create: bool,
    pub reflection_backend: ReflectionBackend,
    pub robust_buffer_access: bool,
}

impl ShaderModuleConfig {
    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            robust_buffer_access: self.robust_buffer_access,
        }
    }
}

impl Default for ShaderModuleConfig {
    fn default() -> Self {
        Self {
            validate_on_create: true,
            reflection_backend: ReflectionBackend::default(),
            robust_buffer_access: true,
        }
    }
}
