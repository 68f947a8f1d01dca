//! Format registry: how each native shader type is stored and assigned.
//!
//! Rather than a hand-written table per type, the registry starts from the
//! ordered list of native uniform-assignment entry points and derives
//! everything else from each name: `uniform3fv` is a 3-component float
//! vector, `uniformMatrix4fv` a 4x4 float matrix. The native type enum is then
//! found by rebuilding the type's symbolic GL name (`FLOAT_VEC3`,
//! `FLOAT_MAT4`, ...) and looking it up. Samplers are registered separately,
//! because their value is a texture reference rather than numbers.

use std::cell::Cell;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::RenderError;
use crate::gl::GlApi;
use crate::uniforms::Storage;

/// Native assignment entry points, in registration order.
pub const ASSIGN_OPS: &[&str] = &[
    "uniform1fv",
    "uniform2fv",
    "uniform3fv",
    "uniform4fv",
    "uniform1iv",
    "uniform2iv",
    "uniform3iv",
    "uniform4iv",
    "uniformMatrix2fv",
    "uniformMatrix3fv",
    "uniformMatrix4fv",
];

/// The backing numeric kind of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Float,
    Int,
    Sampler,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Sampler => "sampler",
        }
    }
}

/// Which native call assigns a value of this format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum AssignOp {
    Vector { components: u32 },
    Matrix { dim: u32 },
    Sampler,
}

/// Immutable descriptor for one native shader type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Format {
    /// Native type enum, e.g. `glow::FLOAT_MAT3`.
    pub native_type: u32,
    /// Symbolic GL name, e.g. `FLOAT_MAT3`.
    pub symbol: String,
    /// Name of the native assignment entry point.
    pub op_name: &'static str,
    /// Elements per value: 1-4 for vectors, 4/9/16 for matrices.
    pub stride: usize,
    pub kind: ScalarKind,
    pub op: AssignOp,
}

impl Format {
    /// Creates zero-initialised backing storage for `size` array elements.
    pub fn create<G: GlApi>(&self, size: usize) -> Storage<G> {
        let len = size.max(1) * self.stride;
        match self.kind {
            ScalarKind::Float => Storage::Float(vec![0.0; len]),
            ScalarKind::Int => Storage::Int(vec![0; len]),
            ScalarKind::Sampler => Storage::Sampler(Default::default()),
        }
    }

    /// Vertex attribute component type for this format.
    pub fn attribute_type(&self) -> u32 {
        match self.kind {
            ScalarKind::Int => glow::INT,
            _ => glow::FLOAT,
        }
    }

    /// Assigns `value` to the uniform at `location` in the current program.
    ///
    /// Samplers draw the next texture unit from `units`, point the sampler
    /// at it, and bind the referenced texture there (uploading it first if it
    /// is dirty). A sampler with no texture, or whose texture has been
    /// dropped, unbinds the unit instead.
    pub fn assign<G: GlApi>(
        &self,
        gl: &G,
        name: &str,
        location: Option<&G::UniformLocation>,
        value: &Storage<G>,
        units: &TextureUnits,
    ) -> Result<(), RenderError> {
        match (self.op, value) {
            (AssignOp::Vector { components }, Storage::Float(data))
                if self.kind == ScalarKind::Float =>
            {
                gl.uniform_f32(location, components, data);
            }
            (AssignOp::Vector { components }, Storage::Int(data)) if self.kind == ScalarKind::Int => {
                gl.uniform_i32(location, components, data);
            }
            (AssignOp::Matrix { dim }, Storage::Float(data)) => {
                gl.uniform_matrix_f32(location, dim, data);
            }
            (AssignOp::Sampler, Storage::Sampler(slot)) => {
                let unit = units.next();
                gl.uniform_i32(location, 1, &[unit as i32]);
                gl.active_texture(glow::TEXTURE0 + unit);
                match slot.get() {
                    Some(texture) => {
                        let mut texture = texture
                            .try_borrow_mut()
                            .map_err(|_| RenderError::TextureBorrowed(name.to_string()))?;
                        gl.bind_texture(Some(texture.native()?));
                        if texture.is_dirty() {
                            texture.update()?;
                        }
                    }
                    None => gl.bind_texture(None),
                }
            }
            (_, other) => {
                return Err(RenderError::TypeMismatch {
                    name: name.to_string(),
                    expected: self.kind.name(),
                    got: other.kind().name(),
                })
            }
        }
        Ok(())
    }
}

/// Per-draw texture unit counter.
#[derive(Debug, Default)]
pub struct TextureUnits(Cell<u32>);

impl TextureUnits {
    pub fn reset(&self) {
        self.0.set(0);
    }

    /// Returns the next free unit index.
    pub fn next(&self) -> u32 {
        let unit = self.0.get();
        self.0.set(unit + 1);
        unit
    }

    /// Units handed out since the last reset.
    pub fn used(&self) -> u32 {
        self.0.get()
    }
}

/// Element count, matrix-ness and float-ness encoded in an op name.
fn describe(op_name: &str) -> Option<(u32, bool, bool)> {
    let rest = op_name.strip_prefix("uniform")?;
    let (is_matrix, rest) = match rest.strip_prefix("Matrix") {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    let n = rest.chars().next()?.to_digit(10)?;
    let is_float = match &rest[1..] {
        "fv" => true,
        "iv" => false,
        _ => return None,
    };
    Some((n, is_matrix, is_float))
}

/// Symbolic GL name for a type described by an op name.
fn symbol_for(n: u32, is_matrix: bool, is_float: bool) -> String {
    let base = if is_float { "FLOAT" } else { "INT" };
    match (is_matrix, n) {
        (true, _) => format!("{base}_MAT{n}"),
        (false, 1) => base.to_string(),
        (false, _) => format!("{base}_VEC{n}"),
    }
}

/// Looks up a native type enum by its symbolic GL name.
pub fn native_type(symbol: &str) -> Option<u32> {
    Some(match symbol {
        "FLOAT" => glow::FLOAT,
        "FLOAT_VEC2" => glow::FLOAT_VEC2,
        "FLOAT_VEC3" => glow::FLOAT_VEC3,
        "FLOAT_VEC4" => glow::FLOAT_VEC4,
        "INT" => glow::INT,
        "INT_VEC2" => glow::INT_VEC2,
        "INT_VEC3" => glow::INT_VEC3,
        "INT_VEC4" => glow::INT_VEC4,
        "FLOAT_MAT2" => glow::FLOAT_MAT2,
        "FLOAT_MAT3" => glow::FLOAT_MAT3,
        "FLOAT_MAT4" => glow::FLOAT_MAT4,
        "SAMPLER_2D" => glow::SAMPLER_2D,
        _ => return None,
    })
}

/// Formats keyed by native type enum. Built once per context.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: BTreeMap<u32, Format>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        let mut formats = BTreeMap::new();

        for &op_name in ASSIGN_OPS {
            let Some((n, is_matrix, is_float)) = describe(op_name) else {
                continue;
            };
            let symbol = symbol_for(n, is_matrix, is_float);
            let Some(native) = native_type(&symbol) else {
                continue;
            };
            formats.insert(
                native,
                Format {
                    native_type: native,
                    symbol,
                    op_name,
                    stride: (if is_matrix { n * n } else { n }) as usize,
                    kind: if is_float {
                        ScalarKind::Float
                    } else {
                        ScalarKind::Int
                    },
                    op: if is_matrix {
                        AssignOp::Matrix { dim: n }
                    } else {
                        AssignOp::Vector { components: n }
                    },
                },
            );
        }

        formats.insert(
            glow::SAMPLER_2D,
            Format {
                native_type: glow::SAMPLER_2D,
                symbol: "SAMPLER_2D".to_string(),
                op_name: "uniform1i",
                stride: 1,
                kind: ScalarKind::Sampler,
                op: AssignOp::Sampler,
            },
        );

        Self { formats }
    }

    /// The descriptor for a native type, if registered.
    pub fn get(&self, native_type: u32) -> Option<&Format> {
        self.formats.get(&native_type)
    }

    /// Like [`get`](Self::get), but an unknown type is an error naming the variable.
    pub fn require(&self, name: &str, native_type: u32) -> Result<&Format, RenderError> {
        self.get(native_type)
            .ok_or_else(|| RenderError::UnsupportedType {
                name: name.to_string(),
                native_type,
            })
    }

    /// All descriptors, ordered by native enum.
    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.values()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
