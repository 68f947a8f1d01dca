//! The native graphics API seam.
//!
//! [`GlApi`] lists exactly the retained-mode calls this layer issues. Handles
//! are associated types, mirroring `glow::HasContext`, so the same resource
//! code drives a real context ([`glow::Context`]) or the recording
//! [`HeadlessGl`] used by tests and tooling.
//!
//! Enum-valued parameters (`target`, `mode`, `ty`, ...) take the standard GL
//! constants, spelled through `glow` (e.g. `glow::ARRAY_BUFFER`).
//!
//! # Module overview
//!
//! - `native` -- `GlApi` for `glow::Context`.
//! - [`headless`] -- GPU-less backend that records calls and scans shader declarations.

pub mod headless;
mod native;

use std::fmt;

pub use headless::{Call, HeadlessGl, HeadlessLocation};

/// A shader pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// The GL enum for this stage.
    pub fn native(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    /// Lowercase stage name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a linked program's active uniform or attribute list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    /// Name as reported by the driver (arrays carry a `[0]` suffix).
    pub name: String,
    /// Declared array size, 1 for non-arrays.
    pub size: i32,
    /// Native type enum, e.g. `glow::FLOAT_MAT3`.
    pub native_type: u32,
}

/// API version reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    /// GLES or WebGL rather than desktop GL.
    pub embedded: bool,
}

/// The retained-mode calls issued by this layer.
///
/// Calls operate on the backend's current bindings exactly like the GL
/// functions they are named after: `tex_*` calls act on the texture bound to
/// `TEXTURE_2D` on the active unit, `buffer_data` on the buffer bound to
/// `target`, and so on.
pub trait GlApi {
    type Shader: Copy + fmt::Debug;
    type Program: Copy + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type Texture: Copy + fmt::Debug + PartialEq;
    type Framebuffer: Copy + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    fn version(&self) -> ApiVersion;
    fn supports_extension(&self, name: &str) -> bool;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&self, shader: Self::Shader, source: &str);
    fn compile_shader(&self, shader: Self::Shader);
    fn shader_compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str);
    fn link_program(&self, program: Self::Program);
    fn program_link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Option<Self::Program>);

    fn active_uniforms(&self, program: Self::Program) -> Vec<ActiveVariable>;
    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveVariable>;
    fn uniform_location(&self, program: Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    /// `glUniform{components}fv`.
    fn uniform_f32(&self, location: Option<&Self::UniformLocation>, components: u32, data: &[f32]);
    /// `glUniform{components}iv`.
    fn uniform_i32(&self, location: Option<&Self::UniformLocation>, components: u32, data: &[i32]);
    /// `glUniformMatrix{dim}fv`, never transposed.
    fn uniform_matrix_f32(&self, location: Option<&Self::UniformLocation>, dim: u32, data: &[f32]);

    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    /// Tightly packed attribute pointer at offset zero of the bound `ARRAY_BUFFER`.
    fn vertex_attrib_pointer(&self, index: u32, size: i32, data_type: u32);

    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>);
    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    fn delete_texture(&self, texture: Self::Texture);
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<Self::Texture>);
    fn tex_image_2d(
        &self,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    );
    fn tex_sub_image_2d(&self, width: i32, height: i32, format: u32, ty: u32, pixels: &[u8]);
    fn tex_parameter(&self, parameter: u32, value: i32);

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String>;
    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer);
    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>);
    /// Attaches `texture` as `COLOR_ATTACHMENT0` of the bound framebuffer.
    fn framebuffer_color_texture(&self, texture: Option<Self::Texture>);
    fn check_framebuffer_status(&self) -> u32;

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: u32);
    fn enable(&self, capability: u32);
    fn disable(&self, capability: u32);
    fn blend_func(&self, src: u32, dst: u32);
}
