//! Meshes: index buffer, one vertex buffer per attribute, one uniform scope.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::buffer::{Buffer, IndexBuffer};
use crate::error::RenderError;
use crate::format::ScalarKind;
use crate::gl::GlApi;
use crate::program::{Interface, ProgramId};
use crate::uniforms::{Data, UniformGroup, Value};

/// Vertex count addressable by 16-bit indices.
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Vertex storage for one attribute, typed by its format's kind.
pub enum Attribute<G: GlApi> {
    Float(Buffer<G, f32>),
    Int(Buffer<G, i32>),
}

impl<G: GlApi> Attribute<G> {
    fn kind(&self) -> ScalarKind {
        match self {
            Attribute::Float(_) => ScalarKind::Float,
            Attribute::Int(_) => ScalarKind::Int,
        }
    }

    fn len(&self) -> usize {
        match self {
            Attribute::Float(b) => b.len(),
            Attribute::Int(b) => b.len(),
        }
    }

    fn write(&mut self, offset: usize, data: Data<'_>) -> Result<(), RenderError> {
        match (self, data) {
            (Attribute::Float(b), Data::Float(v)) => b.write(offset, v),
            (Attribute::Int(b), Data::Int(v)) => b.write(offset, v),
            (attribute, data) => Err(RenderError::TypeMismatch {
                name: "vertex attribute".to_string(),
                expected: attribute.kind().name(),
                got: data.kind().name(),
            }),
        }
    }

    fn slice(&self, start: usize, len: usize) -> Data<'_> {
        match self {
            Attribute::Float(b) => Data::Float(&b.data()[start..start + len]),
            Attribute::Int(b) => Data::Int(&b.data()[start..start + len]),
        }
    }

    fn update(&mut self) -> Result<bool, RenderError> {
        match self {
            Attribute::Float(b) => b.update(),
            Attribute::Int(b) => b.update(),
        }
    }

    pub fn bind(&self) -> Result<(), RenderError> {
        match self {
            Attribute::Float(b) => b.bind(),
            Attribute::Int(b) => b.bind(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Attribute::Float(b) => b.is_dirty(),
            Attribute::Int(b) => b.is_dirty(),
        }
    }

    fn destroy(&mut self) {
        match self {
            Attribute::Float(b) => b.destroy(),
            Attribute::Int(b) => b.destroy(),
        }
    }
}

/// Geometry plus per-mesh uniforms, shaped to one program.
///
/// All writes are staged on the CPU. Nothing reaches the GPU until
/// [`update`](Mesh::update), which a draw runs implicitly.
pub struct Mesh<G: GlApi> {
    program: ProgramId,
    interface: Rc<Interface>,
    num_vertices: usize,
    num_triangles: usize,
    attributes: BTreeMap<String, Attribute<G>>,
    indices: IndexBuffer<G>,
    uniforms: UniformGroup<G>,
    destroyed: bool,
}

impl<G: GlApi> Mesh<G> {
    pub(crate) fn new(
        gl: Rc<G>,
        program: ProgramId,
        interface: Rc<Interface>,
        num_vertices: usize,
        num_triangles: usize,
    ) -> Result<Self, RenderError> {
        if num_vertices > MAX_VERTICES {
            return Err(RenderError::TooManyVertices(num_vertices));
        }

        let mut attributes = BTreeMap::new();
        let mut indices = IndexBuffer::new(Rc::clone(&gl), glow::ELEMENT_ARRAY_BUFFER, num_triangles * 3)?;
        for (name, slot) in &interface.attributes {
            let len = num_vertices * slot.format.stride;
            let created = match slot.format.kind {
                ScalarKind::Float => Buffer::new(Rc::clone(&gl), glow::ARRAY_BUFFER, len).map(Attribute::Float),
                ScalarKind::Int => Buffer::new(Rc::clone(&gl), glow::ARRAY_BUFFER, len).map(Attribute::Int),
                ScalarKind::Sampler => Err(RenderError::UnsupportedType {
                    name: name.clone(),
                    native_type: slot.format.native_type,
                }),
            };
            match created {
                Ok(buffer) => {
                    attributes.insert(name.clone(), buffer);
                }
                Err(e) => {
                    indices.destroy();
                    attributes.values_mut().for_each(Attribute::destroy);
                    return Err(e);
                }
            }
        }

        debug!(
            "mesh of {num_vertices} vertices, {num_triangles} triangles, {} attributes",
            attributes.len()
        );
        Ok(Self {
            program,
            uniforms: UniformGroup::new(program, Rc::clone(&interface)),
            interface,
            num_vertices,
            num_triangles,
            attributes,
            indices,
            destroyed: false,
        })
    }

    /// Writes attribute values for vertex `index`.
    ///
    /// Each value is written at `index * stride` of its attribute; a value
    /// longer than one stride carries on into the following vertices. All
    /// names and lengths are checked before anything is written.
    pub fn set_vertex<'a, I>(&mut self, index: usize, values: I) -> Result<&mut Self, RenderError>
    where
        I: IntoIterator<Item = (&'a str, Data<'a>)>,
    {
        self.check_alive()?;
        let values: Vec<(&str, Data<'a>)> = values.into_iter().collect();
        for (name, data) in &values {
            let attribute = self.attribute(name)?;
            if attribute.kind() != data.kind() {
                return Err(RenderError::TypeMismatch {
                    name: name.to_string(),
                    expected: attribute.kind().name(),
                    got: data.kind().name(),
                });
            }
            let out_of_range = RenderError::OutOfRange {
                what: "vertex",
                offset: index.saturating_mul(self.stride(name)),
                len: data.len(),
                capacity: attribute.len(),
            };
            index
                .checked_mul(self.stride(name))
                .and_then(|offset| offset.checked_add(data.len()))
                .filter(|&end| end <= attribute.len())
                .ok_or(out_of_range)?;
        }
        for (name, data) in values {
            let offset = index * self.stride(name);
            if let Some(attribute) = self.attributes.get_mut(name) {
                attribute.write(offset, data)?;
            }
        }
        Ok(self)
    }

    /// Writes triangle indices starting at element `index`.
    ///
    /// # Errors
    ///
    /// `RenderError::IndexOutOfBounds` if any value addresses a vertex past
    /// the end, `RenderError::OutOfRange` if the write runs past the index
    /// buffer.
    pub fn set_index(&mut self, index: usize, values: &[u16]) -> Result<&mut Self, RenderError> {
        self.check_alive()?;
        if let Some(&value) = values.iter().find(|&&v| usize::from(v) >= self.num_vertices) {
            return Err(RenderError::IndexOutOfBounds {
                value,
                num_vertices: self.num_vertices,
            });
        }
        self.indices.write(index, values)?;
        Ok(self)
    }

    /// Writes the three indices of triangle `triangle`.
    pub fn set_triangle(&mut self, triangle: usize, corners: [u16; 3]) -> Result<&mut Self, RenderError> {
        let index = triangle.checked_mul(3).ok_or(RenderError::OutOfRange {
            what: "index",
            offset: usize::MAX,
            len: corners.len(),
            capacity: self.index_count(),
        })?;
        self.set_index(index, &corners)
    }

    /// Writes into the mesh's own uniform scope.
    pub fn set_uniforms<'a, I>(&mut self, values: I) -> Result<&mut Self, RenderError>
    where
        I: IntoIterator<Item = (&'a str, Value<'a, G>)>,
        G: 'a,
    {
        self.check_alive()?;
        self.uniforms.set_uniforms(values)?;
        Ok(self)
    }

    /// Uploads every dirty buffer. Idempotent when nothing is dirty.
    pub fn update(&mut self) -> Result<&mut Self, RenderError> {
        self.check_alive()?;
        let mut uploads = usize::from(self.indices.update()?);
        for attribute in self.attributes.values_mut() {
            uploads += usize::from(attribute.update()?);
        }
        if uploads > 0 {
            debug!("mesh update uploaded {uploads} buffers");
        }
        Ok(self)
    }

    /// Whether any buffer has writes not yet uploaded.
    pub fn is_dirty(&self) -> bool {
        self.indices.is_dirty() || self.attributes.values().any(Attribute::is_dirty)
    }

    /// Staged values of attribute `name` for vertex `index`.
    pub fn vertex(&self, name: &str, index: usize) -> Result<Data<'_>, RenderError> {
        let attribute = self.attribute(name)?;
        let stride = self.stride(name);
        if index >= self.num_vertices {
            return Err(RenderError::OutOfRange {
                what: "vertex",
                offset: index.saturating_mul(stride),
                len: stride,
                capacity: attribute.len(),
            });
        }
        Ok(attribute.slice(index * stride, stride))
    }

    /// Staged triangle indices.
    pub fn indices(&self) -> &[u16] {
        self.indices.data()
    }

    pub fn uniforms(&self) -> &UniformGroup<G> {
        &self.uniforms
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_triangles(&self) -> usize {
        self.num_triangles
    }

    pub fn index_count(&self) -> usize {
        self.num_triangles * 3
    }

    pub fn program_id(&self) -> ProgramId {
        self.program
    }

    /// Releases every buffer and the mesh's texture references. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.indices.destroy();
        self.attributes.values_mut().for_each(Attribute::destroy);
        self.uniforms.release();
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn attribute(&self, name: &str) -> Result<&Attribute<G>, RenderError> {
        self.attributes
            .get(name)
            .ok_or_else(|| RenderError::UnknownAttribute(name.to_string()))
    }

    pub(crate) fn index_buffer(&self) -> &IndexBuffer<G> {
        &self.indices
    }

    pub(crate) fn check_alive(&self) -> Result<(), RenderError> {
        if self.destroyed {
            Err(RenderError::Destroyed("mesh"))
        } else {
            Ok(())
        }
    }

    fn stride(&self, name: &str) -> usize {
        self.interface
            .attributes
            .get(name)
            .map_or(0, |slot| slot.format.stride)
    }
}

impl<G: GlApi> fmt::Debug for Mesh<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("program", &self.program)
            .field("num_vertices", &self.num_vertices)
            .field("num_triangles", &self.num_triangles)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
