//! Textures: CPU pixel staging mirrored to a GPU texture.
//!
//! `set_data` only stages. The GPU sees nothing until `update`, which
//! either (re)allocates storage or, when size and pixel format still match
//! the current allocation, issues the cheaper sub-region upload.
//!
//! Pixel format negotiation picks the internal format and pixel type from
//! the requested precision and the context's capabilities. Float and
//! half-float precision degrade to byte precision when the backend cannot
//! sample them; the values are rescaled from 0-1 to 0-255 so the texture
//! still looks the same.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::context::Capabilities;
use crate::error::RenderError;
use crate::gl::GlApi;
use crate::params::{param_bool, param_usize};
use crate::pixels;

/// Pixel type enum of `OES_texture_half_float` on ES 2.0 backends.
pub const HALF_FLOAT_OES: u32 = 0x8D61;

/// A texture shared between its creator and any number of uniform groups.
///
/// Uniform groups only hold weak references; the creator decides when the
/// texture goes away.
pub type SharedTexture<G> = Rc<RefCell<Texture<G>>>;

/// Storage precision of texel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Precision {
    #[default]
    Byte,
    Float,
    HalfFloat,
}

impl Precision {
    pub fn is_float(self) -> bool {
        self != Precision::Byte
    }

    /// Opaque alpha in this precision's value range.
    pub fn opaque(self) -> f32 {
        if self.is_float() {
            1.0
        } else {
            255.0
        }
    }
}

/// Options for staging texture data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureParams {
    pub is_float: bool,
    pub is_half_float: bool,
    /// Channels per pixel in the staged data, 1-4.
    pub num_channels: usize,
    /// Linear filtering rather than nearest.
    pub smooth: bool,
    pub repeat: bool,
    /// Staged rows are bottom-to-top.
    pub flip_y: bool,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            is_float: false,
            is_half_float: false,
            num_channels: 4,
            smooth: true,
            repeat: false,
            flip_y: false,
        }
    }
}

impl TextureParams {
    /// Reads params from a loosely typed JSON object.
    ///
    /// Missing or mistyped keys keep their defaults; `numChannels` is
    /// clamped to 1-4.
    pub fn from_json(params: &Value) -> Self {
        let defaults = Self::default();
        Self {
            is_float: param_bool(params, "isFloat", defaults.is_float),
            is_half_float: param_bool(params, "isHalfFloat", defaults.is_half_float),
            num_channels: param_usize(params, "numChannels", defaults.num_channels).clamp(1, 4),
            smooth: param_bool(params, "smooth", defaults.smooth),
            repeat: param_bool(params, "repeat", defaults.repeat),
            flip_y: param_bool(params, "flipY", defaults.flip_y),
        }
    }

    /// Requested precision. Full float wins over half-float.
    pub fn precision(&self) -> Precision {
        if self.is_float {
            Precision::Float
        } else if self.is_half_float {
            Precision::HalfFloat
        } else {
            Precision::Byte
        }
    }

    pub fn channels(&self) -> usize {
        self.num_channels.clamp(1, 4)
    }
}

/// Negotiated upload format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelFormat {
    /// Precision actually stored, after any capability fallback.
    pub precision: Precision,
    pub internal_format: i32,
    pub format: u32,
    pub ty: u32,
}

impl PixelFormat {
    /// Picks the upload format for `requested`, falling back to byte
    /// precision when the backend cannot sample it.
    pub fn negotiate(requested: Precision, caps: &Capabilities) -> Self {
        let precision = match requested {
            Precision::Float if !caps.float_textures => {
                warn!("float textures unsupported, falling back to byte precision");
                Precision::Byte
            }
            Precision::HalfFloat if !caps.half_float_textures => {
                warn!("half-float textures unsupported, falling back to byte precision");
                Precision::Byte
            }
            other => other,
        };
        let (internal_format, ty) = match precision {
            Precision::Byte => (glow::RGBA, glow::UNSIGNED_BYTE),
            Precision::Float if caps.modern => (glow::RGBA32F, glow::FLOAT),
            Precision::Float => (glow::RGBA, glow::FLOAT),
            Precision::HalfFloat if caps.modern => (glow::RGBA16F, glow::HALF_FLOAT),
            Precision::HalfFloat => (glow::RGBA, HALF_FLOAT_OES),
        };
        Self {
            precision,
            internal_format: internal_format as i32,
            format: glow::RGBA,
            ty,
        }
    }
}

/// A requested setting that the backend or the texture size could not
/// honor. Each one is also logged as a warning when it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downgrade {
    /// Storage fell back to a lower precision.
    Precision { requested: Precision, used: Precision },
    /// Repeat was asked for on a non-power-of-two size; clamped to edge.
    Repeat,
    /// Linear filtering is unsupported for the format; using nearest.
    Linear,
}

/// Size and format of the current GPU allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Allocation {
    width: u32,
    height: u32,
    format: PixelFormat,
}

/// CPU-staged pixels plus the GPU texture they are uploaded to.
pub struct Texture<G: GlApi> {
    gl: Rc<G>,
    caps: Capabilities,
    native: Option<G::Texture>,
    width: u32,
    height: u32,
    params: TextureParams,
    format: PixelFormat,
    wrap: u32,
    filter: u32,
    downgrades: Vec<Downgrade>,
    staged: Option<Vec<u8>>,
    allocation: Option<Allocation>,
    dirty: bool,
}

impl<G: GlApi> Texture<G> {
    /// Creates the GPU texture and stages `data` (which may be empty).
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Backend` if the texture object cannot be
    /// created, or `RenderError::DataLength` for mis-sized data.
    pub fn new(
        gl: Rc<G>,
        caps: Capabilities,
        width: u32,
        height: u32,
        data: &[f32],
        params: &TextureParams,
    ) -> Result<Self, RenderError> {
        let native = gl.create_texture().map_err(RenderError::Backend)?;
        let mut texture = Self {
            gl,
            caps,
            native: Some(native),
            width: 0,
            height: 0,
            params: TextureParams::default(),
            format: PixelFormat::negotiate(Precision::Byte, &caps),
            wrap: glow::CLAMP_TO_EDGE,
            filter: glow::LINEAR,
            downgrades: Vec::new(),
            staged: None,
            allocation: None,
            dirty: true,
        };
        if let Err(e) = texture.set_data(width, height, data, params).map(|_| ()) {
            texture.destroy();
            return Err(e);
        }
        Ok(texture)
    }

    /// Wraps [`new`](Self::new) for sharing with uniform groups.
    pub fn shared(
        gl: Rc<G>,
        caps: Capabilities,
        width: u32,
        height: u32,
        data: &[f32],
        params: &TextureParams,
    ) -> Result<SharedTexture<G>, RenderError> {
        Self::new(gl, caps, width, height, data, params).map(|t| Rc::new(RefCell::new(t)))
    }

    /// Stages new pixels and parameters; uploads happen on [`update`](Self::update).
    ///
    /// `data` holds `width * height * num_channels` values, row-major and
    /// top-to-bottom unless `flip_y` is set. Byte textures take 0-255,
    /// float textures take 0-1 (or any range the shader expects). Empty
    /// data allocates without pixels.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::DataLength` if `data` is neither empty nor of
    /// the expected length, and `RenderError::Destroyed` after `destroy`.
    pub fn set_data(
        &mut self,
        width: u32,
        height: u32,
        data: &[f32],
        params: &TextureParams,
    ) -> Result<&mut Self, RenderError> {
        self.native()?;
        let channels = params.channels();
        let expected = width as usize * height as usize * channels;
        if !data.is_empty() && data.len() != expected {
            return Err(RenderError::DataLength {
                expected,
                got: data.len(),
            });
        }

        let requested = params.precision();
        let format = PixelFormat::negotiate(requested, &self.caps);

        self.staged = if data.is_empty() {
            None
        } else {
            let mut values = pixels::expand_to_rgba(data, channels, requested.opaque());
            if requested.is_float() && !format.precision.is_float() {
                values.iter_mut().for_each(|v| *v *= 255.0);
            }
            if params.flip_y {
                pixels::flip_rows(&mut values, width as usize * 4);
            }
            Some(pixels::encode(&values, format.precision))
        };

        let mut downgrades = Vec::new();
        if format.precision != requested {
            downgrades.push(Downgrade::Precision {
                requested,
                used: format.precision,
            });
        }
        self.wrap = wrap_mode(params.repeat, width, height, &mut downgrades);
        self.filter = filter_mode(params.smooth, format.precision, &self.caps, &mut downgrades);
        self.downgrades = downgrades;
        self.width = width;
        self.height = height;
        self.params = params.clone();
        self.format = format;
        self.dirty = true;
        Ok(self)
    }

    /// Uploads staged state to the GPU if anything changed.
    ///
    /// Leaves this texture bound to `TEXTURE_2D` on the active unit.
    pub fn update(&mut self) -> Result<&mut Self, RenderError> {
        let native = self.native()?;
        if !self.dirty {
            return Ok(self);
        }
        let gl = &self.gl;
        gl.bind_texture(Some(native));

        let (w, h) = (self.width as i32, self.height as i32);
        let format = self.format;
        if self.dimensions_changed() {
            debug!(
                "allocating {}x{} texture ({:?})",
                self.width, self.height, format.precision
            );
            gl.tex_image_2d(
                format.internal_format,
                w,
                h,
                format.format,
                format.ty,
                self.staged.as_deref(),
            );
            self.allocation = Some(Allocation {
                width: self.width,
                height: self.height,
                format,
            });
        } else if let Some(pixels) = &self.staged {
            debug!("updating {}x{} texture in place", self.width, self.height);
            gl.tex_sub_image_2d(w, h, format.format, format.ty, pixels);
        }
        self.staged = None;

        gl.tex_parameter(glow::TEXTURE_WRAP_S, self.wrap as i32);
        gl.tex_parameter(glow::TEXTURE_WRAP_T, self.wrap as i32);
        gl.tex_parameter(glow::TEXTURE_MIN_FILTER, self.filter as i32);
        gl.tex_parameter(glow::TEXTURE_MAG_FILTER, self.filter as i32);
        self.dirty = false;
        Ok(self)
    }

    /// Deletes the GPU texture. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(native) = self.native.take() {
            self.gl.delete_texture(native);
        }
        self.staged = None;
        self.allocation = None;
    }

    /// The native handle.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Destroyed` after [`destroy`](Self::destroy).
    pub fn native(&self) -> Result<G::Texture, RenderError> {
        self.native.ok_or(RenderError::Destroyed("texture"))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the next upload must reallocate GPU storage.
    pub fn dimensions_changed(&self) -> bool {
        self.allocation
            != Some(Allocation {
                width: self.width,
                height: self.height,
                format: self.format,
            })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn params(&self) -> &TextureParams {
        &self.params
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Effective wrap mode, `REPEAT` or `CLAMP_TO_EDGE`.
    pub fn wrap(&self) -> u32 {
        self.wrap
    }

    /// Effective filter, `LINEAR` or `NEAREST`.
    pub fn filter(&self) -> u32 {
        self.filter
    }

    /// Settings from the last [`set_data`](Self::set_data) that were not
    /// honored.
    pub fn downgrades(&self) -> &[Downgrade] {
        &self.downgrades
    }

    /// Encoded bytes waiting for the next upload.
    pub fn staged(&self) -> Option<&[u8]> {
        self.staged.as_deref()
    }
}

impl<G: GlApi> fmt::Debug for Texture<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("native", &self.native)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("dirty", &self.dirty)
            .finish()
    }
}

fn wrap_mode(repeat: bool, width: u32, height: u32, downgrades: &mut Vec<Downgrade>) -> u32 {
    if !repeat {
        return glow::CLAMP_TO_EDGE;
    }
    if width.is_power_of_two() && height.is_power_of_two() {
        glow::REPEAT
    } else {
        warn!("cannot repeat a non-power-of-two texture ({width}x{height}), clamping to edge");
        downgrades.push(Downgrade::Repeat);
        glow::CLAMP_TO_EDGE
    }
}

fn filter_mode(
    smooth: bool,
    precision: Precision,
    caps: &Capabilities,
    downgrades: &mut Vec<Downgrade>,
) -> u32 {
    if !smooth {
        return glow::NEAREST;
    }
    let linear = match precision {
        Precision::Byte => true,
        Precision::Float => caps.float_linear,
        Precision::HalfFloat => caps.half_float_linear,
    };
    if linear {
        glow::LINEAR
    } else {
        warn!("linear filtering of {precision:?} textures unsupported, using nearest");
        downgrades.push(Downgrade::Linear);
        glow::NEAREST
    }
}
