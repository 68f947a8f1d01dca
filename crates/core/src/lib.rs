#![deny(unsafe_code)]
//! Core of the modicum GL resource layer.
//!
//! Compiles shader programs and introspects their interface into typed
//! slots, mirrors buffers and textures on the CPU with dirty tracking, and
//! draws meshes by resolving every uniform across an ordered list of
//! `UniformGroup` scopes. All GL traffic goes through the [`gl::GlApi`]
//! seam, implemented for `glow::Context` and for the recording
//! [`gl::HeadlessGl`] backend.

pub mod buffer;
pub mod context;
pub mod dialect;
pub mod error;
pub mod format;
pub mod gl;
pub mod mesh;
pub mod params;
pub mod pixels;
pub mod program;
pub mod shader;
pub mod target;
pub mod texture;
pub mod uniforms;

pub use buffer::{Buffer, IndexBuffer, VertexBuffer};
pub use context::{Capabilities, Context, ContextOptions};
pub use error::RenderError;
pub use format::{Format, FormatRegistry, ScalarKind};
pub use gl::{GlApi, HeadlessGl, ShaderStage};
pub use mesh::Mesh;
pub use program::{DrawReport, Interface, Program, ProgramId};
pub use shader::ShaderError;
pub use target::{RenderTarget, TargetParams};
pub use texture::{Downgrade, Precision, SharedTexture, Texture, TextureParams};
pub use uniforms::{Data, UniformGroup, Value};
