//! Uniform groups: named value stores used as scopes during a draw.
//!
//! A group holds one zero-initialised value per uniform its program
//! declares, plus the set of names that have actually been written. The
//! draw protocol only takes a value from a group whose used-set contains the
//! name, so a group can be pre-shaped for every uniform yet speak only for
//! the ones it sets.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::RenderError;
use crate::format::ScalarKind;
use crate::gl::GlApi;
use crate::program::{Interface, ProgramId, UniformSlot};
use crate::texture::{SharedTexture, Texture};

/// A borrowed flat numeric array, row-major for matrices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Data<'a> {
    Float(&'a [f32]),
    Int(&'a [i32]),
}

impl Data<'_> {
    pub fn len(&self) -> usize {
        match self {
            Data::Float(v) => v.len(),
            Data::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Data::Float(_) => ScalarKind::Float,
            Data::Int(_) => ScalarKind::Int,
        }
    }
}

impl<'a> From<&'a [f32]> for Data<'a> {
    fn from(v: &'a [f32]) -> Self {
        Data::Float(v)
    }
}

impl<'a, const N: usize> From<&'a [f32; N]> for Data<'a> {
    fn from(v: &'a [f32; N]) -> Self {
        Data::Float(v)
    }
}

impl<'a> From<&'a Vec<f32>> for Data<'a> {
    fn from(v: &'a Vec<f32>) -> Self {
        Data::Float(v)
    }
}

impl<'a> From<&'a [i32]> for Data<'a> {
    fn from(v: &'a [i32]) -> Self {
        Data::Int(v)
    }
}

impl<'a, const N: usize> From<&'a [i32; N]> for Data<'a> {
    fn from(v: &'a [i32; N]) -> Self {
        Data::Int(v)
    }
}

impl<'a> From<&'a Vec<i32>> for Data<'a> {
    fn from(v: &'a Vec<i32>) -> Self {
        Data::Int(v)
    }
}

/// A value written to a uniform: numbers, or a texture reference for samplers.
pub enum Value<'a, G: GlApi> {
    Data(Data<'a>),
    /// `None` leaves the sampler without a texture.
    Texture(Option<&'a SharedTexture<G>>),
}

impl<G: GlApi> Value<'_, G> {
    fn kind(&self) -> ScalarKind {
        match self {
            Value::Data(data) => data.kind(),
            Value::Texture(_) => ScalarKind::Sampler,
        }
    }
}

impl<'a, G: GlApi> From<Data<'a>> for Value<'a, G> {
    fn from(data: Data<'a>) -> Self {
        Value::Data(data)
    }
}

impl<'a, G: GlApi> From<&'a [f32]> for Value<'a, G> {
    fn from(v: &'a [f32]) -> Self {
        Value::Data(Data::Float(v))
    }
}

impl<'a, G: GlApi, const N: usize> From<&'a [f32; N]> for Value<'a, G> {
    fn from(v: &'a [f32; N]) -> Self {
        Value::Data(Data::Float(v))
    }
}

impl<'a, G: GlApi> From<&'a Vec<f32>> for Value<'a, G> {
    fn from(v: &'a Vec<f32>) -> Self {
        Value::Data(Data::Float(v))
    }
}

impl<'a, G: GlApi> From<&'a [i32]> for Value<'a, G> {
    fn from(v: &'a [i32]) -> Self {
        Value::Data(Data::Int(v))
    }
}

impl<'a, G: GlApi, const N: usize> From<&'a [i32; N]> for Value<'a, G> {
    fn from(v: &'a [i32; N]) -> Self {
        Value::Data(Data::Int(v))
    }
}

impl<'a, G: GlApi> From<&'a SharedTexture<G>> for Value<'a, G> {
    fn from(texture: &'a SharedTexture<G>) -> Self {
        Value::Texture(Some(texture))
    }
}

/// Get/set box holding a weak reference to a sampler's texture.
pub struct SamplerSlot<G: GlApi> {
    texture: Option<Weak<RefCell<Texture<G>>>>,
}

impl<G: GlApi> SamplerSlot<G> {
    /// The referenced texture, if one is set and still alive.
    pub fn get(&self) -> Option<SharedTexture<G>> {
        self.texture.as_ref().and_then(Weak::upgrade)
    }

    pub fn set(&mut self, texture: Option<&SharedTexture<G>>) {
        self.texture = texture.map(Rc::downgrade);
    }
}

impl<G: GlApi> Default for SamplerSlot<G> {
    fn default() -> Self {
        Self { texture: None }
    }
}

impl<G: GlApi> fmt::Debug for SamplerSlot<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplerSlot")
            .field("bound", &self.get().is_some())
            .finish()
    }
}

/// Typed backing store for one uniform.
pub enum Storage<G: GlApi> {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Sampler(SamplerSlot<G>),
}

impl<G: GlApi> fmt::Debug for Storage<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Storage::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Storage::Sampler(slot) => f.debug_tuple("Sampler").field(slot).finish(),
        }
    }
}

impl<G: GlApi> Storage<G> {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Storage::Float(_) => ScalarKind::Float,
            Storage::Int(_) => ScalarKind::Int,
            Storage::Sampler(_) => ScalarKind::Sampler,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Storage::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Storage::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The texture a sampler storage refers to, if any.
    pub fn texture(&self) -> Option<SharedTexture<G>> {
        match self {
            Storage::Sampler(slot) => slot.get(),
            _ => None,
        }
    }

    /// Checks that `value` fits this storage without writing it.
    fn check(&self, name: &str, value: &Value<'_, G>) -> Result<(), RenderError> {
        let capacity = match (self, value) {
            (Storage::Float(dst), Value::Data(Data::Float(_))) => dst.len(),
            (Storage::Int(dst), Value::Data(Data::Int(_))) => dst.len(),
            (Storage::Sampler(_), Value::Texture(_)) => return Ok(()),
            _ => {
                return Err(RenderError::TypeMismatch {
                    name: name.to_string(),
                    expected: self.kind().name(),
                    got: value.kind().name(),
                })
            }
        };
        match value {
            Value::Data(data) if data.len() > capacity => Err(RenderError::ValueTooLong {
                name: name.to_string(),
                capacity,
                got: data.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Writes a checked value. Shorter arrays overwrite a prefix.
    fn write(&mut self, value: &Value<'_, G>) {
        match (self, value) {
            (Storage::Float(dst), Value::Data(Data::Float(src))) => {
                dst[..src.len()].copy_from_slice(src);
            }
            (Storage::Int(dst), Value::Data(Data::Int(src))) => {
                dst[..src.len()].copy_from_slice(src);
            }
            (Storage::Sampler(slot), Value::Texture(texture)) => slot.set(*texture),
            _ => {}
        }
    }
}

/// A scope of named uniform values shaped to one program's uniform set.
pub struct UniformGroup<G: GlApi> {
    program: ProgramId,
    interface: Rc<Interface>,
    values: BTreeMap<String, Storage<G>>,
    used: BTreeSet<String>,
}

impl<G: GlApi> UniformGroup<G> {
    pub(crate) fn new(program: ProgramId, interface: Rc<Interface>) -> Self {
        let values = interface
            .uniforms
            .iter()
            .map(|(name, slot)| (name.clone(), slot.format.create(slot.size)))
            .collect();
        Self {
            program,
            interface,
            values,
            used: BTreeSet::new(),
        }
    }

    /// Writes named values and marks them used.
    ///
    /// Every name must be declared by the program and every value must match
    /// its kind and fit its storage; otherwise nothing is written.
    pub fn set_uniforms<'a, I>(&mut self, values: I) -> Result<&mut Self, RenderError>
    where
        I: IntoIterator<Item = (&'a str, Value<'a, G>)>,
        G: 'a,
    {
        let values: Vec<(&str, Value<'a, G>)> = values.into_iter().collect();
        for (name, value) in &values {
            let storage = self
                .values
                .get(*name)
                .ok_or_else(|| RenderError::UnknownUniform(name.to_string()))?;
            storage.check(name, value)?;
        }
        for (name, value) in &values {
            if let Some(storage) = self.values.get_mut(*name) {
                storage.write(value);
                self.used.insert(name.to_string());
            }
        }
        Ok(self)
    }

    /// Whether `name` has been written at least once.
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// Names written at least once, in sorted order.
    pub fn used_names(&self) -> impl Iterator<Item = &str> {
        self.used.iter().map(String::as_str)
    }

    /// Stored value for `name`; zero-initialised until first written.
    pub fn value(&self, name: &str) -> Option<&Storage<G>> {
        self.values.get(name)
    }

    /// Declaration of `name` in the program this group was shaped for.
    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.interface.uniforms.get(name)
    }

    pub fn program_id(&self) -> ProgramId {
        self.program
    }

    /// Drops every texture reference held by sampler uniforms.
    ///
    /// The textures themselves are untouched; only this group's claim on
    /// them goes away.
    pub fn release(&mut self) {
        for storage in self.values.values_mut() {
            if let Storage::Sampler(slot) = storage {
                slot.set(None);
            }
        }
    }
}

impl<G: GlApi> fmt::Debug for UniformGroup<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformGroup")
            .field("program", &self.program)
            .field("uniforms", &self.values.keys().collect::<Vec<_>>())
            .field("used", &self.used)
            .finish()
    }
}
