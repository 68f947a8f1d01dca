//! A GPU-less [`GlApi`] backend.
//!
//! `HeadlessGl` keeps just enough state to behave like a driver from the
//! caller's point of view: shader objects "compile" by scanning their
//! declarations, programs "link" by merging those declarations into an
//! active-interface list, and every state-changing call is appended to a call
//! log that tests and tools can inspect.
//!
//! Scanning recognises `uniform`, `attribute`, and vertex-stage `in`
//! declarations, skipping precision qualifiers and `layout(...)` prefixes.
//! Arrays are reported the way drivers report them: `name[0]` with the
//! declared size. A `#error` directive fails compilation, and a stage without
//! a `main` function fails linking. Unlike a real driver, every declared
//! variable is reported active, used or not.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::{ActiveVariable, ApiVersion, GlApi, ShaderStage};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UseProgram(Option<u32>),
    BindAttribLocation { program: u32, index: u32, name: String },
    EnableAttrib(u32),
    DisableAttrib(u32),
    UniformF32 { name: String, components: u32, data: Vec<f32> },
    UniformI32 { name: String, components: u32, data: Vec<i32> },
    UniformMatrix { name: String, dim: u32, data: Vec<f32> },
    VertexAttribPointer { index: u32, size: i32, data_type: u32 },
    BindBuffer { target: u32, buffer: Option<u32> },
    BufferData { target: u32, data: Vec<u8> },
    DrawElements { mode: u32, count: i32, element_type: u32 },
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TexImage2D {
        internal_format: i32,
        width: i32,
        height: i32,
        format: u32,
        ty: u32,
        bytes: Option<usize>,
    },
    TexSubImage2D { width: i32, height: i32, format: u32, ty: u32, bytes: usize },
    TexParameter { parameter: u32, value: i32 },
    BindFramebuffer(Option<u32>),
    FramebufferTexture(Option<u32>),
    Viewport { x: i32, y: i32, width: i32, height: i32 },
    ClearColor([f32; 4]),
    Clear(u32),
    Enable(u32),
    Disable(u32),
    BlendFunc(u32, u32),
    DeleteShader(u32),
    DeleteProgram(u32),
    DeleteBuffer(u32),
    DeleteTexture(u32),
    DeleteFramebuffer(u32),
}

/// Uniform location handed out by [`HeadlessGl`]: the owning program and the
/// uniform's base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessLocation {
    pub program: u32,
    pub name: String,
}

#[derive(Debug)]
struct ShaderObject {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
    scan: Scan,
}

#[derive(Debug, Default)]
struct ProgramObject {
    shaders: Vec<u32>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveVariable>,
    attributes: Vec<ActiveVariable>,
    bindings: BTreeMap<String, u32>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    bound_framebuffer: Option<u32>,
    color_attachments: HashMap<u32, u32>,
    calls: Vec<Call>,
}

impl State {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording backend with simulated shader introspection.
#[derive(Debug)]
pub struct HeadlessGl {
    version: ApiVersion,
    extensions: HashSet<String>,
    state: RefCell<State>,
}

impl HeadlessGl {
    /// A WebGL2-class backend (ES 3.0) with float color buffers and linear
    /// filtering of float textures.
    pub fn new() -> Self {
        Self {
            version: ApiVersion {
                major: 3,
                minor: 0,
                embedded: true,
            },
            extensions: ["EXT_color_buffer_float", "OES_texture_float_linear"]
                .into_iter()
                .map(String::from)
                .collect(),
            state: RefCell::new(State::default()),
        }
    }

    /// A WebGL1-class backend (ES 2.0) with no extensions at all.
    pub fn legacy() -> Self {
        Self {
            version: ApiVersion {
                major: 2,
                minor: 0,
                embedded: true,
            },
            extensions: HashSet::new(),
            state: RefCell::new(State::default()),
        }
    }

    /// Replaces the advertised extension list.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// A copy of every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Returns and forgets the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    /// Source most recently given to `shader`, if it exists.
    pub fn shader_source_of(&self, shader: u32) -> Option<String> {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.source.clone())
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl Default for HeadlessGl {
    fn default() -> Self {
        Self::new()
    }
}

impl GlApi for HeadlessGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type Framebuffer = u32;
    type UniformLocation = HeadlessLocation;

    fn version(&self) -> ApiVersion {
        self.version
    }

    fn supports_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate();
        state.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
                scan: Scan::default(),
            },
        );
        Ok(id)
    }

    fn shader_source(&self, shader: u32, source: &str) {
        if let Some(object) = self.state.borrow_mut().shaders.get_mut(&shader) {
            object.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        let Some(object) = state.shaders.get_mut(&shader) else {
            return;
        };
        match scan(&object.source, object.stage) {
            Ok(scan) => {
                object.scan = scan;
                object.compiled = true;
                object.log.clear();
            }
            Err(log) => {
                object.compiled = false;
                object.log = log;
            }
        }
    }

    fn shader_compile_status(&self, shader: u32) -> bool {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.shaders.remove(&shader);
        state.calls.push(Call::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.allocate();
        state.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(object) = self.state.borrow_mut().programs.get_mut(&program) {
            object.shaders.push(shader);
        }
    }

    fn bind_attrib_location(&self, program: u32, index: u32, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(object) = state.programs.get_mut(&program) {
            object.bindings.insert(name.to_string(), index);
        }
        state.calls.push(Call::BindAttribLocation {
            program,
            index,
            name: name.to_string(),
        });
    }

    fn link_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        let State {
            shaders, programs, ..
        } = &mut *state;
        let Some(object) = programs.get_mut(&program) else {
            return;
        };
        match link(object.shaders.iter().filter_map(|id| shaders.get(id))) {
            Ok((uniforms, attributes)) => {
                object.linked = true;
                object.log.clear();
                object.uniforms = uniforms;
                object.attributes = attributes;
            }
            Err(log) => {
                object.linked = false;
                object.log = log;
                object.uniforms.clear();
                object.attributes.clear();
            }
        }
    }

    fn program_link_status(&self, program: u32) -> bool {
        self.state
            .borrow()
            .programs
            .get(&program)
            .is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.calls.push(Call::DeleteProgram(program));
    }

    fn use_program(&self, program: Option<u32>) {
        self.record(Call::UseProgram(program));
    }

    fn active_uniforms(&self, program: u32) -> Vec<ActiveVariable> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_attributes(&self, program: u32) -> Vec<ActiveVariable> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<HeadlessLocation> {
        let state = self.state.borrow();
        let object = state.programs.get(&program).filter(|p| p.linked)?;
        let base = name.split('[').next().unwrap_or(name);
        object
            .uniforms
            .iter()
            .any(|u| u.name.split('[').next() == Some(base))
            .then(|| HeadlessLocation {
                program,
                name: base.to_string(),
            })
    }

    fn uniform_f32(&self, location: Option<&HeadlessLocation>, components: u32, data: &[f32]) {
        if let Some(location) = location {
            self.record(Call::UniformF32 {
                name: location.name.clone(),
                components,
                data: data.to_vec(),
            });
        }
    }

    fn uniform_i32(&self, location: Option<&HeadlessLocation>, components: u32, data: &[i32]) {
        if let Some(location) = location {
            self.record(Call::UniformI32 {
                name: location.name.clone(),
                components,
                data: data.to_vec(),
            });
        }
    }

    fn uniform_matrix_f32(&self, location: Option<&HeadlessLocation>, dim: u32, data: &[f32]) {
        if let Some(location) = location {
            self.record(Call::UniformMatrix {
                name: location.name.clone(),
                dim,
                data: data.to_vec(),
            });
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(Call::EnableAttrib(index));
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.record(Call::DisableAttrib(index));
    }

    fn vertex_attrib_pointer(&self, index: u32, size: i32, data_type: u32) {
        self.record(Call::VertexAttribPointer {
            index,
            size,
            data_type,
        });
    }

    fn create_buffer(&self) -> Result<u32, String> {
        Ok(self.state.borrow_mut().allocate())
    }

    fn bind_buffer(&self, target: u32, buffer: Option<u32>) {
        self.record(Call::BindBuffer { target, buffer });
    }

    fn buffer_data(&self, target: u32, data: &[u8], _usage: u32) {
        self.record(Call::BufferData {
            target,
            data: data.to_vec(),
        });
    }

    fn delete_buffer(&self, buffer: u32) {
        self.record(Call::DeleteBuffer(buffer));
    }

    fn draw_elements(&self, mode: u32, count: i32, element_type: u32, _offset: i32) {
        self.record(Call::DrawElements {
            mode,
            count,
            element_type,
        });
    }

    fn create_texture(&self) -> Result<u32, String> {
        Ok(self.state.borrow_mut().allocate())
    }

    fn delete_texture(&self, texture: u32) {
        self.record(Call::DeleteTexture(texture));
    }

    fn active_texture(&self, unit: u32) {
        self.record(Call::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: Option<u32>) {
        self.record(Call::BindTexture(texture));
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
        self.record(Call::TexImage2D {
            internal_format,
            width,
            height,
            format,
            ty,
            bytes: pixels.map(<[u8]>::len),
        });
    }

    fn tex_sub_image_2d(&self, width: i32, height: i32, format: u32, ty: u32, pixels: &[u8]) {
        self.record(Call::TexSubImage2D {
            width,
            height,
            format,
            ty,
            bytes: pixels.len(),
        });
    }

    fn tex_parameter(&self, parameter: u32, value: i32) {
        self.record(Call::TexParameter { parameter, value });
    }

    fn create_framebuffer(&self) -> Result<u32, String> {
        Ok(self.state.borrow_mut().allocate())
    }

    fn delete_framebuffer(&self, framebuffer: u32) {
        let mut state = self.state.borrow_mut();
        state.color_attachments.remove(&framebuffer);
        if state.bound_framebuffer == Some(framebuffer) {
            state.bound_framebuffer = None;
        }
        state.calls.push(Call::DeleteFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&self, framebuffer: Option<u32>) {
        let mut state = self.state.borrow_mut();
        state.bound_framebuffer = framebuffer;
        state.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn framebuffer_color_texture(&self, texture: Option<u32>) {
        let mut state = self.state.borrow_mut();
        if let Some(framebuffer) = state.bound_framebuffer {
            match texture {
                Some(texture) => state.color_attachments.insert(framebuffer, texture),
                None => state.color_attachments.remove(&framebuffer),
            };
        }
        state.calls.push(Call::FramebufferTexture(texture));
    }

    /// Like a driver, reports a bound framebuffer with nothing attached as
    /// missing an attachment.
    fn check_framebuffer_status(&self) -> u32 {
        let state = self.state.borrow();
        match state.bound_framebuffer {
            Some(framebuffer) if !state.color_attachments.contains_key(&framebuffer) => {
                glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
            }
            _ => glow::FRAMEBUFFER_COMPLETE,
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(Call::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(Call::ClearColor([r, g, b, a]));
    }

    fn clear(&self, mask: u32) {
        self.record(Call::Clear(mask));
    }

    fn enable(&self, capability: u32) {
        self.record(Call::Enable(capability));
    }

    fn disable(&self, capability: u32) {
        self.record(Call::Disable(capability));
    }

    fn blend_func(&self, src: u32, dst: u32) {
        self.record(Call::BlendFunc(src, dst));
    }
}

// --- declaration scanning ---

#[derive(Debug, Default, Clone)]
struct Scan {
    uniforms: Vec<ActiveVariable>,
    attributes: Vec<ActiveVariable>,
    has_main: bool,
}

const QUALIFIERS: &[&str] = &[
    "lowp", "mediump", "highp", "flat", "smooth", "centroid", "invariant",
];

/// Maps a GLSL type keyword to its native enum.
fn glsl_type(keyword: &str) -> Option<u32> {
    Some(match keyword {
        "float" => glow::FLOAT,
        "vec2" => glow::FLOAT_VEC2,
        "vec3" => glow::FLOAT_VEC3,
        "vec4" => glow::FLOAT_VEC4,
        "int" => glow::INT,
        "ivec2" => glow::INT_VEC2,
        "ivec3" => glow::INT_VEC3,
        "ivec4" => glow::INT_VEC4,
        "uint" => glow::UNSIGNED_INT,
        "bool" => glow::BOOL,
        "bvec2" => glow::BOOL_VEC2,
        "bvec3" => glow::BOOL_VEC3,
        "bvec4" => glow::BOOL_VEC4,
        "mat2" => glow::FLOAT_MAT2,
        "mat3" => glow::FLOAT_MAT3,
        "mat4" => glow::FLOAT_MAT4,
        "sampler2D" => glow::SAMPLER_2D,
        "sampler3D" => glow::SAMPLER_3D,
        "samplerCube" => glow::SAMPLER_CUBE,
        _ => return None,
    })
}

/// Replaces comments with spaces, keeping newlines so line numbers survive.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Splits a statement into identifier/number tokens and single punctuation characters.
fn tokenize(statement: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in statement.char_indices() {
        if c.is_ascii_alphanumeric() || c == '_' {
            start.get_or_insert(i);
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(&statement[s..i]);
        }
        if !c.is_whitespace() {
            tokens.push(&statement[i..i + c.len_utf8()]);
        }
    }
    if let Some(s) = start {
        tokens.push(&statement[s..]);
    }
    tokens
}

fn scan(source: &str, stage: ShaderStage) -> Result<Scan, String> {
    let source = strip_comments(source);

    for (line, text) in source.lines().enumerate() {
        if let Some(message) = text.trim_start().strip_prefix("#error") {
            return Err(format!(
                "ERROR: 0:{}: '#error' : {}",
                line + 1,
                message.trim()
            ));
        }
    }

    let source: String = source
        .lines()
        .map(|l| if l.trim_start().starts_with('#') { "" } else { l })
        .collect::<Vec<_>>()
        .join("\n");

    let mut result = Scan::default();
    let mut offset = 0;
    for statement in source.split([';', '{', '}']) {
        let line = source[..offset].matches('\n').count() + 1;
        offset += statement.len() + 1;

        let tokens = tokenize(statement);
        if tokens.windows(2).any(|w| w == ["main", "("]) {
            result.has_main = true;
        }
        let tokens = skip_layout(&tokens);
        let Some((&keyword, rest)) = tokens.split_first() else {
            continue;
        };
        let into = match (keyword, stage) {
            ("uniform", _) => &mut result.uniforms,
            ("attribute", ShaderStage::Vertex) | ("in", ShaderStage::Vertex) => {
                &mut result.attributes
            }
            _ => continue,
        };
        let rest: Vec<&str> = rest
            .iter()
            .copied()
            .skip_while(|t| QUALIFIERS.contains(t))
            .collect();
        let Some((&type_name, names)) = rest.split_first() else {
            continue;
        };
        let native_type = glsl_type(type_name)
            .ok_or_else(|| format!("ERROR: 0:{line}: '{type_name}' : unknown type"))?;
        into.extend(declarators(names, native_type));
    }
    Ok(result)
}

/// Drops a leading `layout ( ... )` qualifier.
fn skip_layout<'a, 'b>(tokens: &'b [&'a str]) -> &'b [&'a str] {
    if tokens.first() != Some(&"layout") {
        return tokens;
    }
    match tokens.iter().position(|t| *t == ")") {
        Some(end) => &tokens[end + 1..],
        None => tokens,
    }
}

/// Parses `a, b[4], c` into active variables of one type.
fn declarators(tokens: &[&str], native_type: u32) -> Vec<ActiveVariable> {
    let mut out = Vec::new();
    for group in tokens.split(|t| *t == ",") {
        let Some((&name, suffix)) = group.split_first() else {
            continue;
        };
        let size = match suffix {
            ["[", n, "]", ..] => n.parse().unwrap_or(1),
            _ => 1,
        };
        let name = if suffix.first() == Some(&"[") {
            format!("{name}[0]")
        } else {
            name.to_string()
        };
        out.push(ActiveVariable {
            name,
            size,
            native_type,
        });
    }
    out
}

fn link<'a>(
    shaders: impl Iterator<Item = &'a ShaderObject>,
) -> Result<(Vec<ActiveVariable>, Vec<ActiveVariable>), String> {
    let mut uniforms: Vec<ActiveVariable> = Vec::new();
    let mut attributes = Vec::new();
    let mut stages = HashSet::new();

    for shader in shaders {
        if !shader.compiled {
            return Err(format!("{} shader is not compiled", shader.stage));
        }
        if !shader.scan.has_main {
            return Err(format!("{} shader has no main function", shader.stage));
        }
        stages.insert(shader.stage);
        for uniform in &shader.scan.uniforms {
            match uniforms.iter().find(|u| u.name == uniform.name) {
                Some(existing) if existing.native_type != uniform.native_type => {
                    return Err(format!(
                        "uniform '{}' declared with different types",
                        uniform.name
                    ));
                }
                Some(_) => {}
                None => uniforms.push(uniform.clone()),
            }
        }
        if shader.stage == ShaderStage::Vertex {
            attributes.extend(shader.scan.attributes.iter().cloned());
        }
    }

    if stages.len() < 2 {
        return Err("program needs a vertex and a fragment shader".to_string());
    }
    Ok((uniforms, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = "
        attribute vec3 aPos;
        attribute vec2 aUV;
        uniform mat4 uCamera; // camera
        uniform mat4 uTransform;
        varying vec2 vUV;
        void main(void) {
            vUV = aUV;
            gl_Position = uCamera * uTransform * vec4(aPos, 1.0);
        }
    ";

    const FRAG: &str = "
        precision mediump float;
        varying vec2 vUV;
        uniform sampler2D uSampler;
        /* block
           comment */
        uniform highp vec4 uLights[8], uTint;
        void main(void) {
            gl_FragColor = texture2D(uSampler, vUV) * uTint;
        }
    ";

    fn linked(gl: &HeadlessGl, vert: &str, frag: &str) -> u32 {
        let program = gl.create_program().unwrap();
        for (stage, source) in [(ShaderStage::Vertex, vert), (ShaderStage::Fragment, frag)] {
            let shader = gl.create_shader(stage).unwrap();
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            assert!(gl.shader_compile_status(shader), "{}", gl.shader_info_log(shader));
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        program
    }

    #[test]
    fn scan_finds_attributes_in_declaration_order() {
        let gl = HeadlessGl::new();
        let program = linked(&gl, VERT, FRAG);
        let names: Vec<String> = gl
            .active_attributes(program)
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["aPos", "aUV"]);
    }

    #[test]
    fn scan_merges_uniforms_from_both_stages() {
        let gl = HeadlessGl::new();
        let program = linked(&gl, VERT, FRAG);
        let uniforms = gl.active_uniforms(program);
        let names: Vec<&str> = uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["uCamera", "uTransform", "uSampler", "uLights[0]", "uTint"]);
        assert_eq!(uniforms[3].size, 8);
        assert_eq!(uniforms[3].native_type, glow::FLOAT_VEC4);
        assert_eq!(uniforms[2].native_type, glow::SAMPLER_2D);
    }

    #[test]
    fn scan_accepts_es3_in_with_layout() {
        let gl = HeadlessGl::new();
        let vert = "#version 300 es\nlayout(location = 0) in highp vec2 aPos;\nvoid main() {}";
        let frag = "#version 300 es\nprecision mediump float;\nin vec2 vUV;\nout vec4 fragColor;\nvoid main() {}";
        let program = linked(&gl, vert, frag);
        let attributes = gl.active_attributes(program);
        assert_eq!(attributes.len(), 1);
        assert_eq!(attributes[0].name, "aPos");
        assert_eq!(attributes[0].native_type, glow::FLOAT_VEC2);
    }

    #[test]
    fn error_directive_fails_compile_with_line_number() {
        let gl = HeadlessGl::new();
        let shader = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(shader, "precision mediump float;\n#error broken on purpose\n");
        gl.compile_shader(shader);
        assert!(!gl.shader_compile_status(shader));
        let log = gl.shader_info_log(shader);
        assert!(log.contains("0:2"), "missing line in: {log}");
        assert!(log.contains("broken on purpose"), "missing message in: {log}");
    }

    #[test]
    fn unknown_type_fails_compile() {
        let gl = HeadlessGl::new();
        let shader = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(shader, "uniform Light uLight;\nvoid main() {}");
        gl.compile_shader(shader);
        assert!(!gl.shader_compile_status(shader));
        assert!(gl.shader_info_log(shader).contains("Light"));
    }

    #[test]
    fn missing_main_fails_link() {
        let gl = HeadlessGl::new();
        let program = gl.create_program().unwrap();
        for (stage, source) in [
            (ShaderStage::Vertex, "attribute vec2 aPos;"),
            (ShaderStage::Fragment, "void main() {}"),
        ] {
            let shader = gl.create_shader(stage).unwrap();
            gl.shader_source(shader, source);
            gl.compile_shader(shader);
            gl.attach_shader(program, shader);
        }
        gl.link_program(program);
        assert!(!gl.program_link_status(program));
        assert!(gl.program_info_log(program).contains("main"));
    }

    #[test]
    fn uniform_location_accepts_base_and_subscripted_names() {
        let gl = HeadlessGl::new();
        let program = linked(&gl, VERT, FRAG);
        assert!(gl.uniform_location(program, "uLights").is_some());
        assert_eq!(
            gl.uniform_location(program, "uLights[0]").map(|l| l.name),
            Some("uLights".to_string())
        );
        assert!(gl.uniform_location(program, "uMissing").is_none());
    }

    #[test]
    fn calls_are_recorded_in_order_and_can_be_taken() {
        let gl = HeadlessGl::new();
        gl.viewport(0, 0, 4, 4);
        gl.clear(glow::COLOR_BUFFER_BIT);
        assert_eq!(
            gl.take_calls(),
            vec![
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 4
                },
                Call::Clear(glow::COLOR_BUFFER_BIT),
            ]
        );
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn framebuffer_without_color_attachment_is_incomplete() {
        let gl = HeadlessGl::new();
        let framebuffer = gl.create_framebuffer().unwrap();
        let texture = gl.create_texture().unwrap();
        assert_eq!(gl.check_framebuffer_status(), glow::FRAMEBUFFER_COMPLETE);

        gl.bind_framebuffer(Some(framebuffer));
        assert_eq!(
            gl.check_framebuffer_status(),
            glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
        );
        gl.framebuffer_color_texture(Some(texture));
        assert_eq!(gl.check_framebuffer_status(), glow::FRAMEBUFFER_COMPLETE);
        gl.framebuffer_color_texture(None);
        assert_eq!(
            gl.check_framebuffer_status(),
            glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT
        );
    }

    #[test]
    fn legacy_backend_reports_es2_without_extensions() {
        let gl = HeadlessGl::legacy();
        assert_eq!(gl.version().major, 2);
        assert!(!gl.supports_extension("OES_texture_float"));
        let gl = gl.with_extensions(["OES_texture_float"]);
        assert!(gl.supports_extension("OES_texture_float"));
    }
}
