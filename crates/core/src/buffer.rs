//! Typed CPU arrays mirrored to GPU buffers with dirty tracking.
//!
//! Writes only touch the CPU copy and mark the buffer dirty. `update`
//! uploads the whole array and clears the flag; with nothing dirty it issues
//! no calls at all.

use std::fmt;
use std::rc::Rc;

use bytemuck::Pod;
use log::trace;

use crate::error::RenderError;
use crate::gl::GlApi;

/// A typed array plus the GPU buffer it uploads to.
pub struct Buffer<G: GlApi, T: Pod> {
    gl: Rc<G>,
    target: u32,
    native: Option<G::Buffer>,
    data: Vec<T>,
    dirty: bool,
}

/// Per-attribute vertex data.
pub type VertexBuffer<G, T> = Buffer<G, T>;

/// 16-bit triangle indices.
pub type IndexBuffer<G> = Buffer<G, u16>;

impl<G: GlApi, T: Pod> Buffer<G, T> {
    /// Creates a zero-filled buffer of `len` elements for `target`
    /// (`ARRAY_BUFFER` or `ELEMENT_ARRAY_BUFFER`).
    ///
    /// Starts dirty, since the GPU side holds nothing yet.
    pub fn new(gl: Rc<G>, target: u32, len: usize) -> Result<Self, RenderError> {
        let native = gl.create_buffer().map_err(RenderError::Backend)?;
        Ok(Self {
            gl,
            target,
            native: Some(native),
            data: vec![T::zeroed(); len],
            dirty: true,
        })
    }

    /// Copies `values` in starting at element `offset`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::OutOfRange` if the write would run past the end.
    pub fn write(&mut self, offset: usize, values: &[T]) -> Result<(), RenderError> {
        let end = offset
            .checked_add(values.len())
            .filter(|&end| end <= self.data.len())
            .ok_or(RenderError::OutOfRange {
                what: self.kind(),
                offset,
                len: values.len(),
                capacity: self.data.len(),
            })?;
        self.data[offset..end].copy_from_slice(values);
        self.dirty = true;
        Ok(())
    }

    /// Uploads the array if dirty. Returns whether an upload happened.
    pub fn update(&mut self) -> Result<bool, RenderError> {
        let native = self.native()?;
        if !self.dirty {
            return Ok(false);
        }
        trace!("uploading {} buffer of {} elements", self.kind(), self.data.len());
        self.gl.bind_buffer(self.target, Some(native));
        self.gl
            .buffer_data(self.target, bytemuck::cast_slice(&self.data), glow::STATIC_DRAW);
        self.dirty = false;
        Ok(true)
    }

    /// Binds the buffer to its target.
    pub fn bind(&self) -> Result<(), RenderError> {
        self.gl.bind_buffer(self.target, Some(self.native()?));
        Ok(())
    }

    /// Deletes the GPU buffer. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(native) = self.native.take() {
            self.gl.delete_buffer(native);
        }
    }

    pub fn native(&self) -> Result<G::Buffer, RenderError> {
        self.native.ok_or(RenderError::Destroyed("buffer"))
    }

    /// The staged CPU copy.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn kind(&self) -> &'static str {
        if self.target == glow::ELEMENT_ARRAY_BUFFER {
            "index"
        } else {
            "vertex"
        }
    }
}

impl<G: GlApi, T: Pod + fmt::Debug> fmt::Debug for Buffer<G, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &self.kind())
            .field("native", &self.native)
            .field("len", &self.data.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
