//! Fixed hardware maxima enforced by reflection and compatibility validation.
//!
//! Shader IR is untrusted input. Every index the reflector records is checked against these
//! bounds, and exceeding one is a validation error rather than a silent truncation.

/// Number of bind groups a pipeline layout can hold.
pub const MAX_BIND_GROUPS: usize = 4;

/// Largest binding number a shader may declare within a group.
pub const MAX_BINDING_NUMBER: u32 = 65535;

/// Number of vertex attribute locations available to a vertex shader.
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Number of vertex buffer slots a vertex state can describe.
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// Number of color attachments a fragment shader can write.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;

/// Maximum accepted SPIR-V module length in words.
///
/// Validation and both reflection backends allocate proportionally to the module size. Real
/// shaders are a small fraction of this.
pub const MAX_SPIRV_WORDS: usize = 4 * 1024 * 1024; // 16 MiB
