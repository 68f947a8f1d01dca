//! [`GlApi`] for a live `glow::Context` (desktop GL, GLES, WebGL).
//!
//! Every method forwards to the matching `glow::HasContext` call. glow wraps
//! raw GL entry points as `unsafe`; the handles passed in were all obtained
//! from the same context by this crate, and slices are borrowed only for the
//! duration of the call.

#![allow(unsafe_code)]

use glow::HasContext;

use super::{ActiveVariable, ApiVersion, GlApi, ShaderStage};

impl GlApi for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type Texture = glow::Texture;
    type Framebuffer = glow::Framebuffer;
    type UniformLocation = glow::UniformLocation;

    fn version(&self) -> ApiVersion {
        let version = HasContext::version(self);
        ApiVersion {
            major: version.major,
            minor: version.minor,
            embedded: version.is_embedded,
        }
    }

    fn supports_extension(&self, name: &str) -> bool {
        self.supported_extensions().contains(name)
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        // SAFETY: stage.native() is a valid shader type enum.
        unsafe { HasContext::create_shader(self, stage.native()) }
    }

    fn shader_source(&self, shader: Self::Shader, source: &str) {
        // SAFETY: shader is a live handle from create_shader.
        unsafe { HasContext::shader_source(self, shader, source) }
    }

    fn compile_shader(&self, shader: Self::Shader) {
        // SAFETY: shader is a live handle from create_shader.
        unsafe { HasContext::compile_shader(self, shader) }
    }

    fn shader_compile_status(&self, shader: Self::Shader) -> bool {
        // SAFETY: shader is a live handle from create_shader.
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        // SAFETY: shader is a live handle from create_shader.
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        // SAFETY: shader is a live handle; callers never reuse it afterwards.
        unsafe { HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        // SAFETY: no preconditions beyond a current context.
        unsafe { HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        // SAFETY: both handles are live and belong to this context.
        unsafe { HasContext::attach_shader(self, program, shader) }
    }

    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str) {
        // SAFETY: program is live; index is below the attribute count it reported.
        unsafe { HasContext::bind_attrib_location(self, program, index, name) }
    }

    fn link_program(&self, program: Self::Program) {
        // SAFETY: program is a live handle with both stages attached.
        unsafe { HasContext::link_program(self, program) }
    }

    fn program_link_status(&self, program: Self::Program) -> bool {
        // SAFETY: program is a live handle.
        unsafe { self.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        // SAFETY: program is a live handle.
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        // SAFETY: program is live; callers never reuse it afterwards.
        unsafe { HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Option<Self::Program>) {
        // SAFETY: program is None or a live, linked handle.
        unsafe { HasContext::use_program(self, program) }
    }

    fn active_uniforms(&self, program: Self::Program) -> Vec<ActiveVariable> {
        // SAFETY: program is live and linked; indices stay below the reported count.
        unsafe {
            (0..self.get_active_uniforms(program))
                .filter_map(|i| self.get_active_uniform(program, i))
                .map(|u| ActiveVariable {
                    name: u.name,
                    size: u.size,
                    native_type: u.utype,
                })
                .collect()
        }
    }

    fn active_attributes(&self, program: Self::Program) -> Vec<ActiveVariable> {
        // SAFETY: program is live and linked; indices stay below the reported count.
        unsafe {
            (0..self.get_active_attributes(program))
                .filter_map(|i| self.get_active_attribute(program, i))
                .map(|a| ActiveVariable {
                    name: a.name,
                    size: a.size,
                    native_type: a.atype,
                })
                .collect()
        }
    }

    fn uniform_location(
        &self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        // SAFETY: program is live and linked.
        unsafe { self.get_uniform_location(program, name) }
    }

    fn uniform_f32(&self, location: Option<&Self::UniformLocation>, components: u32, data: &[f32]) {
        // SAFETY: location came from the currently bound program; the slice
        // length is a multiple of `components`.
        unsafe {
            match components {
                1 => self.uniform_1_f32_slice(location, data),
                2 => self.uniform_2_f32_slice(location, data),
                3 => self.uniform_3_f32_slice(location, data),
                _ => self.uniform_4_f32_slice(location, data),
            }
        }
    }

    fn uniform_i32(&self, location: Option<&Self::UniformLocation>, components: u32, data: &[i32]) {
        // SAFETY: as for uniform_f32.
        unsafe {
            match components {
                1 => self.uniform_1_i32_slice(location, data),
                2 => self.uniform_2_i32_slice(location, data),
                3 => self.uniform_3_i32_slice(location, data),
                _ => self.uniform_4_i32_slice(location, data),
            }
        }
    }

    fn uniform_matrix_f32(&self, location: Option<&Self::UniformLocation>, dim: u32, data: &[f32]) {
        // SAFETY: as for uniform_f32; the slice length is a multiple of dim².
        unsafe {
            match dim {
                2 => self.uniform_matrix_2_f32_slice(location, false, data),
                3 => self.uniform_matrix_3_f32_slice(location, false, data),
                _ => self.uniform_matrix_4_f32_slice(location, false, data),
            }
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        // SAFETY: index is an attribute location bound at link time.
        unsafe { HasContext::enable_vertex_attrib_array(self, index) }
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        // SAFETY: index is an attribute location bound at link time.
        unsafe { HasContext::disable_vertex_attrib_array(self, index) }
    }

    fn vertex_attrib_pointer(&self, index: u32, size: i32, data_type: u32) {
        // SAFETY: an ARRAY_BUFFER holding at least `size` components per
        // vertex is bound by the caller.
        unsafe {
            if data_type == glow::INT {
                self.vertex_attrib_pointer_i32(index, size, data_type, 0, 0);
            } else {
                self.vertex_attrib_pointer_f32(index, size, data_type, false, 0, 0);
            }
        }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        // SAFETY: no preconditions beyond a current context.
        unsafe { HasContext::create_buffer(self) }
    }

    fn bind_buffer(&self, target: u32, buffer: Option<Self::Buffer>) {
        // SAFETY: buffer is None or a live handle.
        unsafe { HasContext::bind_buffer(self, target, buffer) }
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        // SAFETY: a buffer is bound to `target`; data is copied by the driver.
        unsafe { self.buffer_data_u8_slice(target, data, usage) }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        // SAFETY: buffer is live; callers never reuse it afterwards.
        unsafe { HasContext::delete_buffer(self, buffer) }
    }

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, offset: i32) {
        // SAFETY: the bound ELEMENT_ARRAY_BUFFER holds `count` indices that all
        // address vertices present in the bound attribute buffers.
        unsafe { HasContext::draw_elements(self, mode, count, element_type, offset) }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        // SAFETY: no preconditions beyond a current context.
        unsafe { HasContext::create_texture(self) }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        // SAFETY: texture is live; callers never reuse it afterwards.
        unsafe { HasContext::delete_texture(self, texture) }
    }

    fn active_texture(&self, unit: u32) {
        // SAFETY: unit is TEXTURE0 + n.
        unsafe { HasContext::active_texture(self, unit) }
    }

    fn bind_texture(&self, texture: Option<Self::Texture>) {
        // SAFETY: texture is None or a live handle.
        unsafe { HasContext::bind_texture(self, glow::TEXTURE_2D, texture) }
    }

    fn tex_image_2d(
        &self,
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        pixels: Option<&[u8]>,
    ) {
        // SAFETY: a texture is bound to TEXTURE_2D; pixels, when present, hold
        // width * height texels of the given format and type.
        unsafe {
            HasContext::tex_image_2d(
                self,
                glow::TEXTURE_2D,
                0,
                internal_format,
                width,
                height,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(pixels),
            );
        }
    }

    fn tex_sub_image_2d(&self, width: i32, height: i32, format: u32, ty: u32, pixels: &[u8]) {
        // SAFETY: as for tex_image_2d, against an existing allocation of the
        // same size and format.
        unsafe {
            HasContext::tex_sub_image_2d(
                self,
                glow::TEXTURE_2D,
                0,
                0,
                0,
                width,
                height,
                format,
                ty,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn tex_parameter(&self, parameter: u32, value: i32) {
        // SAFETY: a texture is bound to TEXTURE_2D.
        unsafe { self.tex_parameter_i32(glow::TEXTURE_2D, parameter, value) }
    }

    fn create_framebuffer(&self) -> Result<Self::Framebuffer, String> {
        // SAFETY: no preconditions beyond a current context.
        unsafe { HasContext::create_framebuffer(self) }
    }

    fn delete_framebuffer(&self, framebuffer: Self::Framebuffer) {
        // SAFETY: framebuffer is live; callers never reuse it afterwards.
        unsafe { HasContext::delete_framebuffer(self, framebuffer) }
    }

    fn bind_framebuffer(&self, framebuffer: Option<Self::Framebuffer>) {
        // SAFETY: framebuffer is None (default surface) or a live handle.
        unsafe { HasContext::bind_framebuffer(self, glow::FRAMEBUFFER, framebuffer) }
    }

    fn framebuffer_color_texture(&self, texture: Option<Self::Texture>) {
        // SAFETY: a framebuffer is bound; texture is None or a live handle
        // with level 0 allocated.
        unsafe {
            self.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                texture,
                0,
            );
        }
    }

    fn check_framebuffer_status(&self) -> u32 {
        // SAFETY: pure query.
        unsafe { HasContext::check_framebuffer_status(self, glow::FRAMEBUFFER) }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        // SAFETY: pure state change.
        unsafe { HasContext::viewport(self, x, y, width, height) }
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        // SAFETY: pure state change.
        unsafe { HasContext::clear_color(self, r, g, b, a) }
    }

    fn clear(&self, mask: u32) {
        // SAFETY: mask is a combination of *_BUFFER_BIT values.
        unsafe { HasContext::clear(self, mask) }
    }

    fn enable(&self, capability: u32) {
        // SAFETY: pure state change.
        unsafe { HasContext::enable(self, capability) }
    }

    fn disable(&self, capability: u32) {
        // SAFETY: pure state change.
        unsafe { HasContext::disable(self, capability) }
    }

    fn blend_func(&self, src: u32, dst: u32) {
        // SAFETY: pure state change.
        unsafe { HasContext::blend_func(self, src, dst) }
    }
}
