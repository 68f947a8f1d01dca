//! Error types for the modicum core.

use thiserror::Error;

use crate::shader::ShaderError;

/// Errors produced by resource and draw operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A shader stage failed to compile or the program failed to link.
    #[error(transparent)]
    Shader(#[from] ShaderError),

    /// The backend refused to create a native object.
    #[error("backend error: {0}")]
    Backend(String),

    /// An active uniform or attribute has a native type the format registry does not know.
    #[error("unsupported type 0x{native_type:04X} for shader variable '{name}'")]
    UnsupportedType { name: String, native_type: u32 },

    /// A uniform name that the program does not declare.
    #[error("uniform not declared by program: {0}")]
    UnknownUniform(String),

    /// A vertex attribute name that the program does not declare.
    #[error("attribute not declared by program: {0}")]
    UnknownAttribute(String),

    /// A value of the wrong kind was written to a uniform or attribute.
    #[error("type mismatch for '{name}': expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    /// A value longer than the storage backing its uniform.
    #[error("value for '{name}' has {got} elements but storage holds {capacity}")]
    ValueTooLong {
        name: String,
        capacity: usize,
        got: usize,
    },

    /// A staged write that would run past the end of a buffer.
    #[error("{what} write of {len} elements at offset {offset} exceeds capacity {capacity}")]
    OutOfRange {
        what: &'static str,
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A triangle index that refers past the last vertex of its mesh.
    #[error("index {value} refers past the last vertex (mesh has {num_vertices})")]
    IndexOutOfBounds { value: u16, num_vertices: usize },

    /// A mesh with more vertices than 16-bit indices can address.
    #[error("mesh of {0} vertices cannot be addressed by 16-bit indices")]
    TooManyVertices(usize),

    /// Pixel data whose length does not match the texture dimensions.
    #[error("pixel data has {got} values, expected {expected}")]
    DataLength { expected: usize, got: usize },

    /// A resource used after `destroy()`.
    #[error("{0} used after destroy")]
    Destroyed(&'static str),

    /// A mesh drawn with a program other than the one that shaped it.
    #[error("mesh was built for a different program")]
    ForeignMesh,

    /// A scope declares a uniform with a different type than the drawing program.
    #[error("scope declares '{0}' with a different type than the program")]
    ScopeMismatch(String),

    /// A texture was still mutably borrowed when a draw needed to bind it.
    #[error("texture bound to '{0}' is already borrowed")]
    TextureBorrowed(String),

    /// A framebuffer failed its completeness check.
    #[error("framebuffer incomplete: status 0x{0:04X}")]
    IncompleteFramebuffer(u32),

    /// Encoded image bytes could not be decoded.
    #[error("image decode error: {0}")]
    Image(String),
}
