//! Render target (framebuffer + color texture) for off-screen drawing.
//!
//! A `RenderTarget` pairs a framebuffer with an optional owned color
//! texture of the target's size. Programs and the context draw into it in
//! place of the default surface; the color texture can then be sampled like
//! any other.

use std::fmt;
use std::rc::Rc;

use log::warn;
use serde::Serialize;
use serde_json::Value;

use crate::context::Capabilities;
use crate::error::RenderError;
use crate::gl::GlApi;
use crate::params::param_bool;
use crate::texture::{Precision, SharedTexture, Texture, TextureParams};

/// Options for creating a render target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetParams {
    /// Params for the color texture.
    pub texture: TextureParams,
    /// Whether to attach a color texture at all.
    pub color: bool,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            texture: TextureParams::default(),
            color: true,
        }
    }
}

impl TargetParams {
    /// Reads params from a loosely typed JSON object. Texture keys sit at
    /// the top level next to `color`.
    pub fn from_json(params: &Value) -> Self {
        Self {
            texture: TextureParams::from_json(params),
            color: param_bool(params, "color", true),
        }
    }
}

/// An off-screen draw destination.
pub struct RenderTarget<G: GlApi> {
    gl: Rc<G>,
    framebuffer: Option<G::Framebuffer>,
    texture: Option<SharedTexture<G>>,
    params: TextureParams,
    width: u32,
    height: u32,
}

impl<G: GlApi> RenderTarget<G> {
    /// Creates a framebuffer and, unless `params.color` is off, a color
    /// texture attached as `COLOR_ATTACHMENT0`.
    ///
    /// Float color textures need float color buffers; without them the
    /// texture is created with byte precision.
    ///
    /// # Errors
    ///
    /// Returns an error if the framebuffer or texture cannot be created, or
    /// if the framebuffer is not complete.
    pub fn new(
        gl: Rc<G>,
        caps: Capabilities,
        width: u32,
        height: u32,
        params: &TargetParams,
    ) -> Result<Self, RenderError> {
        let mut texture_params = params.texture.clone();
        if texture_params.precision() != Precision::Byte && !caps.color_buffer_float {
            warn!("float color buffers unsupported, target falls back to byte precision");
            texture_params.is_float = false;
            texture_params.is_half_float = false;
        }

        let framebuffer = gl.create_framebuffer().map_err(RenderError::Backend)?;
        let mut target = Self {
            gl: Rc::clone(&gl),
            framebuffer: Some(framebuffer),
            texture: None,
            params: texture_params,
            width,
            height,
        };

        if params.color {
            let texture = Texture::shared(gl, caps, width, height, &[], &target.params);
            match texture {
                Ok(texture) => target.texture = Some(texture),
                Err(e) => {
                    target.destroy();
                    return Err(e);
                }
            }
        }
        if let Err(e) = target.attach() {
            target.destroy();
            return Err(e);
        }
        Ok(target)
    }

    /// Reallocates the color texture at a new size and reattaches it.
    ///
    /// A no-op when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        self.framebuffer()?;
        if width == self.width && height == self.height {
            return Ok(());
        }
        if let Some(texture) = &self.texture {
            texture
                .try_borrow_mut()
                .map_err(|_| RenderError::TextureBorrowed("target color".to_string()))?
                .set_data(width, height, &[], &self.params)?;
        }
        self.width = width;
        self.height = height;
        self.attach()
    }

    /// Binds the framebuffer as the draw destination and sets the viewport
    /// to the target size.
    pub fn bind(&self) -> Result<(), RenderError> {
        self.gl.bind_framebuffer(Some(self.framebuffer()?));
        self.gl.viewport(0, 0, self.width as i32, self.height as i32);
        Ok(())
    }

    /// Deletes the framebuffer and the color texture. Idempotent.
    pub fn destroy(&mut self) {
        if let Some(framebuffer) = self.framebuffer.take() {
            self.gl.delete_framebuffer(framebuffer);
        }
        if let Some(texture) = self.texture.take() {
            if let Ok(mut texture) = texture.try_borrow_mut() {
                texture.destroy();
            }
        }
    }

    /// The color texture, for sampling in a later pass.
    pub fn texture(&self) -> Option<&SharedTexture<G>> {
        self.texture.as_ref()
    }

    pub fn framebuffer(&self) -> Result<G::Framebuffer, RenderError> {
        self.framebuffer.ok_or(RenderError::Destroyed("render target"))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Allocates the color texture and attaches it, then checks
    /// completeness. Leaves the default framebuffer bound.
    ///
    /// A target without a color texture has nothing to attach and is never
    /// complete, so it skips both steps.
    fn attach(&self) -> Result<(), RenderError> {
        let framebuffer = self.framebuffer()?;
        let Some(texture) = &self.texture else {
            return Ok(());
        };
        let native = {
            let mut texture = texture
                .try_borrow_mut()
                .map_err(|_| RenderError::TextureBorrowed("target color".to_string()))?;
            texture.update()?;
            texture.native()?
        };

        self.gl.bind_framebuffer(Some(framebuffer));
        self.gl.framebuffer_color_texture(Some(native));
        let status = self.gl.check_framebuffer_status();
        self.gl.bind_framebuffer(None);

        if status != glow::FRAMEBUFFER_COMPLETE {
            return Err(RenderError::IncompleteFramebuffer(status));
        }
        Ok(())
    }
}

impl<G: GlApi> fmt::Debug for RenderTarget<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTarget")
            .field("framebuffer", &self.framebuffer)
            .field("color", &self.texture.is_some())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{Call, HeadlessGl};
    use serde_json::json;

    fn target(gl: &Rc<HeadlessGl>, width: u32, height: u32, params: &TargetParams) -> RenderTarget<HeadlessGl> {
        let caps = Capabilities::detect(gl.as_ref());
        RenderTarget::new(Rc::clone(gl), caps, width, height, params).unwrap()
    }

    #[test]
    fn new_allocates_and_attaches_color_texture() {
        let gl = Rc::new(HeadlessGl::new());
        let target = target(&gl, 16, 8, &TargetParams::default());
        let texture = target.texture().unwrap().borrow().native().unwrap();
        let calls = gl.calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::TexImage2D { width: 16, height: 8, bytes: None, .. }
        )));
        assert!(calls.contains(&Call::FramebufferTexture(Some(texture))));
        assert_eq!(calls.last(), Some(&Call::BindFramebuffer(None)));
    }

    #[test]
    fn target_without_color_attaches_nothing() {
        let gl = Rc::new(HeadlessGl::new());
        let params = TargetParams {
            color: false,
            ..TargetParams::default()
        };
        let mut target = target(&gl, 4, 4, &params);
        assert!(target.texture().is_none());
        assert!(!gl.calls().iter().any(|c| matches!(c, Call::FramebufferTexture(_))));

        target.resize(8, 8).unwrap();
        assert_eq!((target.width(), target.height()), (8, 8));
        target.bind().unwrap();
    }

    #[test]
    fn float_target_falls_back_without_float_color_buffers() {
        let params = TargetParams::from_json(&json!({ "isFloat": true }));

        let gl = Rc::new(HeadlessGl::new());
        let modern = target(&gl, 2, 2, &params);
        let format = modern.texture().unwrap().borrow().pixel_format();
        assert_eq!(format.precision, Precision::Float);

        let gl = Rc::new(HeadlessGl::legacy());
        let legacy = target(&gl, 2, 2, &params);
        let format = legacy.texture().unwrap().borrow().pixel_format();
        assert_eq!(format.precision, Precision::Byte);
    }

    #[test]
    fn resize_to_same_size_is_a_no_op() {
        let gl = Rc::new(HeadlessGl::new());
        let mut target = target(&gl, 8, 8, &TargetParams::default());
        gl.take_calls();
        target.resize(8, 8).unwrap();
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn resize_reallocates_and_reattaches() {
        let gl = Rc::new(HeadlessGl::new());
        let mut target = target(&gl, 8, 8, &TargetParams::default());
        gl.take_calls();
        target.resize(8, 4).unwrap();
        assert_eq!((target.width(), target.height()), (8, 4));
        let calls = gl.calls();
        assert!(calls.iter().any(|c| matches!(
            c,
            Call::TexImage2D { width: 8, height: 4, .. }
        )));
        assert!(calls.iter().any(|c| matches!(c, Call::FramebufferTexture(Some(_)))));
        assert_eq!(target.texture().unwrap().borrow().width(), 8);
        assert_eq!(target.texture().unwrap().borrow().height(), 4);
    }

    #[test]
    fn bind_selects_framebuffer_and_viewport() {
        let gl = Rc::new(HeadlessGl::new());
        let target = target(&gl, 32, 16, &TargetParams::default());
        gl.take_calls();
        target.bind().unwrap();
        assert_eq!(
            gl.calls(),
            vec![
                Call::BindFramebuffer(Some(target.framebuffer().unwrap())),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 32,
                    height: 16
                },
            ]
        );
    }

    #[test]
    fn destroy_releases_framebuffer_and_texture_once() {
        let gl = Rc::new(HeadlessGl::new());
        let mut target = target(&gl, 4, 4, &TargetParams::default());
        let color = Rc::clone(target.texture().unwrap());
        target.destroy();
        target.destroy();
        let calls = gl.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteFramebuffer(_))).count(), 1);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::DeleteTexture(_))).count(), 1);
        assert!(matches!(target.bind(), Err(RenderError::Destroyed(_))));
        assert!(color.borrow().native().is_err());
    }

    #[test]
    fn params_read_color_flag_from_json() {
        let params = TargetParams::from_json(&json!({ "color": false, "numChannels": 3 }));
        assert!(!params.color);
        assert_eq!(params.texture.num_channels, 3);
        assert!(TargetParams::from_json(&json!({})).color);
    }
}
