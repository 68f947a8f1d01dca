//! Shader programs: introspected interface and the draw protocol.
//!
//! A program is compiled and linked once, then asked for its active
//! uniforms and attributes. Each becomes a typed slot keyed by its base name
//! (array subscripts stripped), and that interface never changes afterwards.
//! Meshes and uniform groups are shaped from it.
//!
//! # Drawing
//!
//! [`Program::draw_mesh`] resolves every declared uniform against an ordered
//! list of scopes: the mesh's own group first, then the extra groups in the
//! order given. The first scope that has written the name supplies the
//! value. A name no scope has written is a resolution miss; the mesh
//! group's zero value is bound so nothing stale survives from an earlier
//! draw, and the miss is logged and reported.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::iter;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use serde::Serialize;

use crate::error::RenderError;
use crate::format::{AssignOp, Format, FormatRegistry, ScalarKind, TextureUnits};
use crate::gl::GlApi;
use crate::mesh::Mesh;
use crate::shader;
use crate::target::RenderTarget;
use crate::uniforms::{UniformGroup, Value};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a program, shared by the meshes and uniform
/// groups shaped from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        Self(NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A declared uniform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniformSlot {
    /// Declared array size, 1 for non-arrays.
    pub size: usize,
    pub format: Format,
}

/// A declared vertex attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeSlot {
    /// Binding index, assigned in introspection order.
    pub index: u32,
    pub format: Format,
}

/// Everything a linked program declares, keyed by base name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Interface {
    pub uniforms: BTreeMap<String, UniformSlot>,
    pub attributes: BTreeMap<String, AttributeSlot>,
}

/// Outcome of one [`Program::draw_mesh`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawReport {
    /// Indices covered by the draw call.
    pub index_count: usize,
    /// Texture units handed to samplers.
    pub texture_units: u32,
    /// Uniforms no scope supplied, bound to zero.
    pub misses: Vec<String>,
}

struct Handles<G: GlApi> {
    program: G::Program,
    vertex: G::Shader,
    fragment: G::Shader,
}

/// A linked program and its introspected interface.
pub struct Program<G: GlApi> {
    gl: Rc<G>,
    id: ProgramId,
    handles: Option<Handles<G>>,
    interface: Rc<Interface>,
    locations: BTreeMap<String, Option<G::UniformLocation>>,
    units: TextureUnits,
    viewport: Rc<Cell<(u32, u32)>>,
    warned: RefCell<HashSet<String>>,
}

impl<G: GlApi> Program<G> {
    /// Compiles, links and introspects a program.
    ///
    /// Attributes are bound to indices in introspection order and the
    /// program is relinked so those indices take effect.
    ///
    /// # Errors
    ///
    /// Compile and link failures, and any active variable whose type the
    /// registry does not know. No native objects survive a failure.
    pub fn new(
        gl: Rc<G>,
        registry: &FormatRegistry,
        viewport: Rc<Cell<(u32, u32)>>,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, RenderError> {
        let (vertex, fragment) = shader::compile_stages(gl.as_ref(), vertex_src, fragment_src)?;
        let program = match gl.create_program() {
            Ok(program) => program,
            Err(e) => {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                return Err(RenderError::Backend(e));
            }
        };
        let handles = Handles {
            program,
            vertex,
            fragment,
        };

        let interface = match introspect(gl.as_ref(), registry, &handles) {
            Ok(interface) => interface,
            Err(e) => {
                release(gl.as_ref(), &handles);
                return Err(e);
            }
        };

        let locations = interface
            .uniforms
            .keys()
            .map(|name| (name.clone(), gl.uniform_location(program, name)))
            .collect();

        info!(
            "linked program: {} uniforms, {} attributes",
            interface.uniforms.len(),
            interface.attributes.len()
        );

        Ok(Self {
            gl,
            id: ProgramId::next(),
            handles: Some(handles),
            interface: Rc::new(interface),
            locations,
            units: TextureUnits::default(),
            viewport,
            warned: RefCell::new(HashSet::new()),
        })
    }

    /// Makes this the current program, enables its attribute indices and
    /// selects the draw destination (`None` is the default surface).
    pub fn activate(&self, target: Option<&RenderTarget<G>>) -> Result<(), RenderError> {
        let handles = self.handles()?;
        self.gl.use_program(Some(handles.program));
        for slot in self.interface.attributes.values() {
            self.gl.enable_vertex_attrib_array(slot.index);
        }
        match target {
            Some(target) => target.bind(),
            None => {
                let (width, height) = self.viewport.get();
                self.gl.bind_framebuffer(None);
                self.gl.viewport(0, 0, width as i32, height as i32);
                Ok(())
            }
        }
    }

    /// Deselects the program and disables its attribute indices.
    pub fn deactivate(&self) {
        self.gl.use_program(None);
        for slot in self.interface.attributes.values() {
            self.gl.disable_vertex_attrib_array(slot.index);
        }
    }

    /// A mesh shaped to this program's attributes.
    pub fn make_mesh(&self, num_vertices: usize, num_triangles: usize) -> Result<Mesh<G>, RenderError> {
        self.handles()?;
        Mesh::new(
            Rc::clone(&self.gl),
            self.id,
            Rc::clone(&self.interface),
            num_vertices,
            num_triangles,
        )
    }

    /// A uniform group shaped to this program's uniforms, pre-populated
    /// with `initial`.
    pub fn make_uniform_group<'a, I>(&self, initial: I) -> Result<UniformGroup<G>, RenderError>
    where
        I: IntoIterator<Item = (&'a str, Value<'a, G>)>,
        G: 'a,
    {
        self.handles()?;
        let mut group = UniformGroup::new(self.id, Rc::clone(&self.interface));
        group.set_uniforms(initial)?;
        Ok(group)
    }

    /// Uploads the mesh, resolves every uniform across scopes, binds
    /// attributes and issues one indexed triangle draw.
    ///
    /// The program must be active. Scopes may come from other programs as
    /// long as they declare shared names with the same type.
    pub fn draw_mesh(
        &self,
        mesh: &mut Mesh<G>,
        scopes: &[&UniformGroup<G>],
    ) -> Result<DrawReport, RenderError> {
        self.handles()?;
        if mesh.program_id() != self.id {
            return Err(RenderError::ForeignMesh);
        }
        mesh.update()?;

        let gl = self.gl.as_ref();
        self.units.reset();
        let mut misses = Vec::new();

        for (name, slot) in &self.interface.uniforms {
            let scope = iter::once(mesh.uniforms())
                .chain(scopes.iter().copied())
                .find(|scope| scope.is_used(name));
            let value = match scope {
                Some(scope) => {
                    if scope.slot(name).map(|s| s.format.native_type) != Some(slot.format.native_type) {
                        return Err(RenderError::ScopeMismatch(name.clone()));
                    }
                    scope.value(name)
                }
                None => {
                    self.report_miss(name);
                    misses.push(name.clone());
                    mesh.uniforms().value(name)
                }
            };
            let value = value.ok_or_else(|| RenderError::UnknownUniform(name.clone()))?;
            let location = self.locations.get(name).and_then(Option::as_ref);
            slot.format.assign(gl, name, location, value, &self.units)?;
        }

        for (name, slot) in &self.interface.attributes {
            mesh.attribute(name)?.bind()?;
            gl.vertex_attrib_pointer(
                slot.index,
                slot.format.stride as i32,
                slot.format.attribute_type(),
            );
        }

        mesh.index_buffer().bind()?;
        let index_count = mesh.index_count();
        gl.draw_elements(glow::TRIANGLES, index_count as i32, glow::UNSIGNED_SHORT, 0);

        Ok(DrawReport {
            index_count,
            texture_units: self.units.used(),
            misses,
        })
    }

    /// Deletes the program and both shaders. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(handles) = self.handles.take() {
            release(self.gl.as_ref(), &handles);
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformSlot> {
        self.interface.uniforms.get(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSlot> {
        self.interface.attributes.get(name)
    }

    /// The native program handle.
    pub fn native(&self) -> Result<G::Program, RenderError> {
        self.handles().map(|h| h.program)
    }

    fn handles(&self) -> Result<&Handles<G>, RenderError> {
        self.handles.as_ref().ok_or(RenderError::Destroyed("program"))
    }

    fn report_miss(&self, name: &str) {
        if self.warned.borrow_mut().insert(name.to_string()) {
            warn!("uniform '{name}' is not set by any scope, binding zero");
        }
    }
}

impl<G: GlApi> fmt::Debug for Program<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("destroyed", &self.handles.is_none())
            .field("uniforms", &self.interface.uniforms.keys().collect::<Vec<_>>())
            .field("attributes", &self.interface.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Strips an array subscript: `uLights[0]` becomes `uLights`.
pub fn base_name(name: &str) -> &str {
    name.split('[').next().unwrap_or(name)
}

fn introspect<G: GlApi>(
    gl: &G,
    registry: &FormatRegistry,
    handles: &Handles<G>,
) -> Result<Interface, RenderError> {
    let program = handles.program;
    gl.attach_shader(program, handles.vertex);
    gl.attach_shader(program, handles.fragment);
    shader::link(gl, program)?;

    let mut interface = Interface::default();
    let active = gl
        .active_attributes(program)
        .into_iter()
        .filter(|a| !a.name.starts_with("gl_"));
    for (index, variable) in active.enumerate() {
        let name = base_name(&variable.name);
        let format = registry.require(name, variable.native_type)?;
        if format.kind == ScalarKind::Sampler || matches!(format.op, AssignOp::Matrix { .. }) {
            return Err(RenderError::UnsupportedType {
                name: name.to_string(),
                native_type: variable.native_type,
            });
        }
        let index = index as u32;
        gl.bind_attrib_location(program, index, name);
        interface.attributes.insert(
            name.to_string(),
            AttributeSlot {
                index,
                format: format.clone(),
            },
        );
    }
    shader::link(gl, program)?;

    for variable in gl.active_uniforms(program) {
        let name = base_name(&variable.name);
        let format = registry.require(name, variable.native_type)?;
        interface.uniforms.insert(
            name.to_string(),
            UniformSlot {
                size: variable.size.max(1) as usize,
                format: format.clone(),
            },
        );
    }
    Ok(interface)
}

fn release<G: GlApi>(gl: &G, handles: &Handles<G>) {
    gl.delete_program(handles.program);
    gl.delete_shader(handles.vertex);
    gl.delete_shader(handles.fragment);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextOptions};
    use crate::gl::{Call, HeadlessGl};
    use crate::texture::TextureParams;
    use crate::uniforms::Data;

    const SCENE_VERT: &str = "
        attribute vec3 aPos;
        uniform mat3 uTransform;
        void main() {
            gl_Position = vec4(uTransform * aPos, 1.0);
        }
    ";
    const SCENE_FRAG: &str = "
        precision mediump float;
        uniform vec4 uColor;
        uniform sampler2D uSampler;
        uniform float uWeights[4];
        void main() {
            gl_FragColor = uColor * texture2D(uSampler, vec2(0.5)) * uWeights[0];
        }
    ";

    const IDENTITY: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    fn setup() -> (Rc<HeadlessGl>, Context<HeadlessGl>) {
        let gl = Rc::new(HeadlessGl::new());
        let context = Context::new(Rc::clone(&gl), ContextOptions::default()).unwrap();
        (gl, context)
    }

    fn uploads_of(calls: &[Call], uniform: &str) -> Vec<Call> {
        calls
            .iter()
            .filter(|c| match c {
                Call::UniformF32 { name, .. }
                | Call::UniformI32 { name, .. }
                | Call::UniformMatrix { name, .. } => name == uniform,
                _ => false,
            })
            .cloned()
            .collect()
    }

    #[test]
    fn interface_matches_declared_names() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let uniforms: Vec<&str> = program.interface().uniforms.keys().map(String::as_str).collect();
        assert_eq!(uniforms, ["uColor", "uSampler", "uTransform", "uWeights"]);
        let attributes: Vec<&str> = program.interface().attributes.keys().map(String::as_str).collect();
        assert_eq!(attributes, ["aPos"]);
        assert_eq!(program.uniform("uWeights").unwrap().size, 4);
        assert_eq!(program.uniform("uTransform").unwrap().format.stride, 9);
    }

    #[test]
    fn attributes_are_bound_in_introspection_order_then_relinked() {
        let (gl, context) = setup();
        let vert = "attribute vec2 aUV;\nattribute vec3 aPos;\nvoid main() {}";
        let frag = "void main() {}";
        let program = context.make_program(vert, frag).unwrap();
        assert_eq!(program.attribute("aUV").unwrap().index, 0);
        assert_eq!(program.attribute("aPos").unwrap().index, 1);
        let binds: Vec<(u32, String)> = gl
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BindAttribLocation { index, name, .. } => Some((index, name)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![(0, "aUV".to_string()), (1, "aPos".to_string())]);
    }

    #[test]
    fn unsupported_uniform_type_releases_everything() {
        let (gl, context) = setup();
        let frag = "uniform samplerCube uSky;\nvoid main() {}";
        let err = context.make_program("void main() {}", frag).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedType { ref name, .. } if name == "uSky"));
        let calls = gl.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteProgram(_))).count(), 1);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteShader(_))).count(), 2);
    }

    #[test]
    fn matrix_attribute_is_unsupported() {
        let (_gl, context) = setup();
        let err = context
            .make_program("attribute mat4 aInstance;\nvoid main() {}", "void main() {}")
            .unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedType { .. }));
    }

    #[test]
    fn compile_failure_is_a_shader_error() {
        let (_gl, context) = setup();
        let err = context
            .make_program("#error nope\nvoid main() {}", "void main() {}")
            .unwrap_err();
        assert!(matches!(err, RenderError::Shader(_)));
    }

    #[test]
    fn activate_enables_attributes_and_targets_surface() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        gl.take_calls();
        program.activate(None).unwrap();
        let (width, height) = context.size();
        assert_eq!(
            gl.take_calls(),
            vec![
                Call::UseProgram(Some(program.native().unwrap())),
                Call::EnableAttrib(0),
                Call::BindFramebuffer(None),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: width as i32,
                    height: height as i32
                },
            ]
        );
        program.deactivate();
        assert_eq!(gl.take_calls(), vec![Call::UseProgram(None), Call::DisableAttrib(0)]);
    }

    #[test]
    fn activate_with_target_binds_its_framebuffer() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let target = context.make_target(8, 4, &Default::default()).unwrap();
        gl.take_calls();
        program.activate(Some(&target)).unwrap();
        let calls = gl.take_calls();
        assert!(calls.contains(&Call::BindFramebuffer(Some(target.framebuffer().unwrap()))));
        assert!(calls.contains(&Call::Viewport {
            x: 0,
            y: 0,
            width: 8,
            height: 4
        }));
    }

    #[test]
    fn scenario_single_triangle_draws_three_indices_without_misses() {
        let (gl, context) = setup();
        let program = context
            .make_program(
                "attribute vec3 aPos;\nuniform mat3 uTransform;\nvoid main() {}",
                "precision mediump float;\nvoid main() {}",
            )
            .unwrap();
        let mut mesh = program.make_mesh(3, 1).unwrap();
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        mesh.set_vertex(0, [("aPos", Data::from(&positions))])
            .unwrap()
            .set_index(0, &[0, 1, 2])
            .unwrap()
            .set_uniforms([("uTransform", Value::from(&IDENTITY))])
            .unwrap();

        program.activate(None).unwrap();
        gl.take_calls();
        let report = program.draw_mesh(&mut mesh, &[]).unwrap();

        assert!(report.misses.is_empty());
        assert_eq!(report.index_count, 3);
        let calls = gl.calls();
        let draws: Vec<&Call> = calls
            .iter()
            .filter(|c| matches!(c, Call::DrawElements { .. }))
            .collect();
        assert_eq!(
            draws,
            vec![&Call::DrawElements {
                mode: glow::TRIANGLES,
                count: 3,
                element_type: glow::UNSIGNED_SHORT,
            }]
        );
        assert_eq!(
            uploads_of(&calls, "uTransform"),
            vec![Call::UniformMatrix {
                name: "uTransform".into(),
                dim: 3,
                data: IDENTITY.to_vec(),
            }]
        );
        assert!(calls.contains(&Call::VertexAttribPointer {
            index: 0,
            size: 3,
            data_type: glow::FLOAT,
        }));
    }

    #[test]
    fn scene_scope_supplies_until_mesh_scope_sets_the_name() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(3, 1).unwrap();
        let scene_color: [f32; 4] = [0.0, 0.0, 1.0, 1.0];
        let scene = program
            .make_uniform_group([("uColor", Value::from(&scene_color))])
            .unwrap();

        gl.take_calls();
        program.draw_mesh(&mut mesh, &[&scene]).unwrap();
        assert_eq!(
            uploads_of(&gl.take_calls(), "uColor"),
            vec![Call::UniformF32 {
                name: "uColor".into(),
                components: 4,
                data: scene_color.to_vec(),
            }]
        );

        let mesh_color: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
        mesh.set_uniforms([("uColor", Value::from(&mesh_color))]).unwrap();
        program.draw_mesh(&mut mesh, &[&scene]).unwrap();
        assert_eq!(
            uploads_of(&gl.take_calls(), "uColor"),
            vec![Call::UniformF32 {
                name: "uColor".into(),
                components: 4,
                data: mesh_color.to_vec(),
            }]
        );
    }

    #[test]
    fn extra_scope_from_another_group_resolves_without_usage_error() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(3, 1).unwrap();
        let red: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
        let green: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
        let _unused = program.make_uniform_group([("uColor", Value::from(&red))]).unwrap();
        let extra = program.make_uniform_group([("uColor", Value::from(&green))]).unwrap();

        gl.take_calls();
        let report = program.draw_mesh(&mut mesh, &[&extra]).unwrap();
        assert!(!report.misses.contains(&"uColor".to_string()));
        assert_eq!(
            uploads_of(&gl.calls(), "uColor"),
            vec![Call::UniformF32 {
                name: "uColor".into(),
                components: 4,
                data: green.to_vec(),
            }]
        );
    }

    #[test]
    fn earlier_extra_scope_wins_over_later() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        let first = program.make_uniform_group([("uColor", Value::from(&[1.0f32; 4]))]).unwrap();
        let second = program.make_uniform_group([("uColor", Value::from(&[2.0f32; 4]))]).unwrap();
        gl.take_calls();
        program.draw_mesh(&mut mesh, &[&first, &second]).unwrap();
        let uploads = uploads_of(&gl.calls(), "uColor");
        assert!(matches!(&uploads[..], [Call::UniformF32 { data, .. }] if data == &vec![1.0; 4]));
    }

    #[test]
    fn misses_bind_zero_and_are_reported_every_draw() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        mesh.set_uniforms([("uTransform", Value::from(&IDENTITY))]).unwrap();

        gl.take_calls();
        let report = program.draw_mesh(&mut mesh, &[]).unwrap();
        assert_eq!(report.misses, vec!["uColor", "uSampler", "uWeights"]);
        let calls = gl.take_calls();
        assert_eq!(
            uploads_of(&calls, "uWeights"),
            vec![Call::UniformF32 {
                name: "uWeights".into(),
                components: 1,
                data: vec![0.0; 4],
            }]
        );
        assert!(calls.contains(&Call::BindTexture(None)));

        let report = program.draw_mesh(&mut mesh, &[]).unwrap();
        assert_eq!(report.misses.len(), 3);
    }

    #[test]
    fn samplers_take_sequential_units_and_upload_dirty_textures() {
        let (gl, context) = setup();
        let frag = "
            precision mediump float;
            uniform sampler2D uA;
            uniform sampler2D uB;
            void main() {}
        ";
        let program = context.make_program("void main() {}", frag).unwrap();
        let params = TextureParams {
            num_channels: 1,
            ..TextureParams::default()
        };
        let a = context.make_texture(2, 2, &[1.0, 2.0, 3.0, 4.0], &params).unwrap();
        let b = context.make_texture(1, 1, &[5.0], &params).unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        mesh.set_uniforms([("uA", Value::from(&a)), ("uB", Value::from(&b))])
            .unwrap();

        gl.take_calls();
        let report = program.draw_mesh(&mut mesh, &[]).unwrap();
        assert_eq!(report.texture_units, 2);
        assert!(!a.borrow().is_dirty());
        assert!(!b.borrow().is_dirty());
        let calls = gl.take_calls();
        assert!(calls.contains(&Call::ActiveTexture(glow::TEXTURE0)));
        assert!(calls.contains(&Call::ActiveTexture(glow::TEXTURE0 + 1)));
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::TexImage2D { .. })).count(), 2);

        program.draw_mesh(&mut mesh, &[]).unwrap();
        let calls = gl.take_calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::TexImage2D { .. } | Call::TexSubImage2D { .. })));
        assert!(calls.contains(&Call::UniformI32 {
            name: "uB".into(),
            components: 1,
            data: vec![1],
        }));
    }

    #[test]
    fn dropped_texture_unbinds_its_sampler() {
        let (gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        let texture = context.make_texture(1, 1, &[], &TextureParams::default()).unwrap();
        mesh.set_uniforms([("uSampler", Value::from(&texture))]).unwrap();
        drop(texture);

        gl.take_calls();
        let report = program.draw_mesh(&mut mesh, &[]).unwrap();
        assert!(!report.misses.contains(&"uSampler".to_string()));
        assert!(gl.calls().contains(&Call::BindTexture(None)));
    }

    #[test]
    fn scope_with_conflicting_type_is_rejected() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let other = context
            .make_program("void main() {}", "uniform vec3 uColor;\nvoid main() {}")
            .unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        let scope = other
            .make_uniform_group([("uColor", Value::from(&[1.0f32; 3]))])
            .unwrap();
        let err = program.draw_mesh(&mut mesh, &[&scope]).unwrap_err();
        assert!(matches!(err, RenderError::ScopeMismatch(ref n) if n == "uColor"));
    }

    #[test]
    fn foreign_mesh_is_rejected() {
        let (_gl, context) = setup();
        let a = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let b = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        assert_ne!(a.id(), b.id());
        let mut mesh = a.make_mesh(1, 0).unwrap();
        assert!(matches!(b.draw_mesh(&mut mesh, &[]), Err(RenderError::ForeignMesh)));
    }

    #[test]
    fn borrowed_texture_is_reported_at_draw() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut mesh = program.make_mesh(1, 0).unwrap();
        let texture = context.make_texture(1, 1, &[], &TextureParams::default()).unwrap();
        mesh.set_uniforms([("uSampler", Value::from(&texture))]).unwrap();
        let _guard = texture.borrow_mut();
        let err = program.draw_mesh(&mut mesh, &[]).unwrap_err();
        assert!(matches!(err, RenderError::TextureBorrowed(_)));
    }

    #[test]
    fn destroy_is_idempotent_and_blocks_use() {
        let (gl, context) = setup();
        let mut program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        gl.take_calls();
        program.destroy();
        program.destroy();
        let calls = gl.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteProgram(_))).count(), 1);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteShader(_))).count(), 2);
        assert!(matches!(program.activate(None), Err(RenderError::Destroyed("program"))));
        assert!(program.make_mesh(1, 0).is_err());
    }

    #[test]
    fn uniform_group_rejects_undeclared_names_and_wrong_kinds() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut group = program.make_uniform_group(iter::empty()).unwrap();
        let err = group.set_uniforms([("uColour", Value::from(&[1.0f32; 4]))]).unwrap_err();
        assert!(matches!(err, RenderError::UnknownUniform(ref n) if n == "uColour"));
        let err = group.set_uniforms([("uColor", Value::from(&[1i32; 4]))]).unwrap_err();
        assert!(matches!(err, RenderError::TypeMismatch { .. }));
        let err = group.set_uniforms([("uTransform", Value::from(&[0.0f32; 16]))]).unwrap_err();
        assert!(matches!(err, RenderError::ValueTooLong { capacity: 9, got: 16, .. }));
        assert_eq!(group.used_names().count(), 0);
    }

    #[test]
    fn uniform_group_writes_array_prefix_and_is_all_or_nothing() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let mut group = program.make_uniform_group(iter::empty()).unwrap();
        group.set_uniforms([("uWeights", Value::from(&[0.5f32, 0.25]))]).unwrap();
        assert_eq!(
            group.value("uWeights").and_then(|v| v.as_floats()),
            Some(&[0.5, 0.25, 0.0, 0.0][..])
        );

        let err = group
            .set_uniforms([
                ("uColor", Value::from(&[1.0f32; 4])),
                ("uMissing", Value::from(&[1.0f32])),
            ])
            .unwrap_err();
        assert!(matches!(err, RenderError::UnknownUniform(_)));
        assert!(!group.is_used("uColor"));
    }

    #[test]
    fn released_group_forgets_textures() {
        let (_gl, context) = setup();
        let program = context.make_program(SCENE_VERT, SCENE_FRAG).unwrap();
        let texture = context.make_texture(1, 1, &[], &TextureParams::default()).unwrap();
        let mut group = program.make_uniform_group([("uSampler", Value::from(&texture))]).unwrap();
        assert!(group.value("uSampler").and_then(|v| v.texture()).is_some());
        group.release();
        assert!(group.value("uSampler").and_then(|v| v.texture()).is_none());
        assert_eq!(Rc::strong_count(&texture), 1);
    }

    #[test]
    fn base_name_strips_subscript() {
        assert_eq!(base_name("uLights[0]"), "uLights");
        assert_eq!(base_name("uTint"), "uTint");
    }
}
