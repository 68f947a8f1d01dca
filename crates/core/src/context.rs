//! Device context with capability detection.
//!
//! `Context` wraps a backend, probes it once for the optional features the
//! resources negotiate against, builds the format registry and applies the
//! initial draw state. Every resource it creates shares the backend by
//! reference count.

use std::cell::Cell;
use std::rc::Rc;

use log::debug;
use serde::Serialize;
use serde_json::Value;

use crate::dialect;
use crate::error::RenderError;
use crate::format::FormatRegistry;
use crate::gl::{GlApi, ShaderStage};
use crate::params::{param_bool, param_f32_array, param_u32};
use crate::program::Program;
use crate::target::{RenderTarget, TargetParams};
use crate::texture::{SharedTexture, Texture, TextureParams};

/// Optional backend features that resources adapt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// ES 3.0 / WebGL2 / GL 3+ class API.
    pub modern: bool,
    pub float_textures: bool,
    pub half_float_textures: bool,
    /// Linear filtering of float textures.
    pub float_linear: bool,
    /// Linear filtering of half-float textures.
    pub half_float_linear: bool,
    /// Float formats are color-renderable.
    pub color_buffer_float: bool,
}

impl Capabilities {
    /// Probes the backend's version and extension list.
    pub fn detect<G: GlApi>(gl: &G) -> Self {
        let modern = gl.version().major >= 3;
        let has = |name: &str| gl.supports_extension(name);
        Self {
            modern,
            float_textures: modern || has("OES_texture_float"),
            half_float_textures: modern || has("OES_texture_half_float"),
            float_linear: has("OES_texture_float_linear"),
            half_float_linear: modern || has("OES_texture_half_float_linear"),
            color_buffer_float: has("EXT_color_buffer_float") || has("WEBGL_color_buffer_float"),
        }
    }
}

/// Initial state and behaviour of a [`Context`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    /// Surface size in pixels.
    pub width: u32,
    pub height: u32,
    /// Alpha blending with `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`.
    pub blend: bool,
    pub depth_test: bool,
    pub clear_color: [f32; 4],
    /// Run shader sources through [`dialect::upgrade`] on modern backends.
    pub upgrade_shaders: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            width: 300,
            height: 150,
            blend: true,
            depth_test: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            upgrade_shaders: false,
        }
    }
}

impl ContextOptions {
    /// Reads options from a loosely typed JSON object, keeping defaults for
    /// missing keys.
    pub fn from_json(params: &Value) -> Self {
        let d = Self::default();
        Self {
            width: param_u32(params, "width", d.width),
            height: param_u32(params, "height", d.height),
            blend: param_bool(params, "blend", d.blend),
            depth_test: param_bool(params, "depthTest", d.depth_test),
            clear_color: param_f32_array(params, "clearColor", d.clear_color),
            upgrade_shaders: param_bool(params, "upgradeShaders", d.upgrade_shaders),
        }
    }
}

/// The device context every resource is created from.
pub struct Context<G: GlApi> {
    gl: Rc<G>,
    capabilities: Capabilities,
    registry: FormatRegistry,
    viewport: Rc<Cell<(u32, u32)>>,
    options: ContextOptions,
}

impl<G: GlApi> Context<G> {
    /// Wraps `gl` and applies the initial state from `options`.
    pub fn new(gl: Rc<G>, options: ContextOptions) -> Result<Self, RenderError> {
        let capabilities = Capabilities::detect(gl.as_ref());
        debug!("detected capabilities: {capabilities:?}");

        if options.blend {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
        if options.depth_test {
            gl.enable(glow::DEPTH_TEST);
        }
        let [r, g, b, a] = options.clear_color;
        gl.clear_color(r, g, b, a);
        gl.viewport(0, 0, options.width as i32, options.height as i32);
        gl.clear(glow::COLOR_BUFFER_BIT);

        Ok(Self {
            gl,
            capabilities,
            registry: FormatRegistry::new(),
            viewport: Rc::new(Cell::new((options.width, options.height))),
            options,
        })
    }

    /// Records a new surface size and resets the viewport to it.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport.set((width, height));
        self.options.width = width;
        self.options.height = height;
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    /// Clears `target` (or the default surface), optionally switching the
    /// clear color first.
    pub fn clear(
        &self,
        color: Option<[f32; 4]>,
        clear_depth: bool,
        target: Option<&RenderTarget<G>>,
    ) -> Result<(), RenderError> {
        match target {
            Some(target) => target.bind()?,
            None => {
                let (width, height) = self.viewport.get();
                self.gl.bind_framebuffer(None);
                self.gl.viewport(0, 0, width as i32, height as i32);
            }
        }
        if let Some([r, g, b, a]) = color {
            self.gl.clear_color(r, g, b, a);
        }
        let mut mask = glow::COLOR_BUFFER_BIT;
        if clear_depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        self.gl.clear(mask);
        Ok(())
    }

    /// Hands the raw backend to `f` for state this layer does not model.
    pub fn tweak<R>(&self, f: impl FnOnce(&G) -> R) -> R {
        f(&self.gl)
    }

    /// Compiles and links a program, upgrading the sources first when
    /// configured to.
    pub fn make_program(&self, vertex_src: &str, fragment_src: &str) -> Result<Program<G>, RenderError> {
        let viewport = Rc::clone(&self.viewport);
        if self.options.upgrade_shaders && self.capabilities.modern {
            let vertex = dialect::upgrade(vertex_src, ShaderStage::Vertex);
            let fragment = dialect::upgrade(fragment_src, ShaderStage::Fragment);
            Program::new(Rc::clone(&self.gl), &self.registry, viewport, &vertex, &fragment)
        } else {
            Program::new(Rc::clone(&self.gl), &self.registry, viewport, vertex_src, fragment_src)
        }
    }

    /// Creates a texture and stages `data` (see [`Texture::set_data`]).
    pub fn make_texture(
        &self,
        width: u32,
        height: u32,
        data: &[f32],
        params: &TextureParams,
    ) -> Result<SharedTexture<G>, RenderError> {
        Texture::shared(Rc::clone(&self.gl), self.capabilities, width, height, data, params)
    }

    /// Decodes an encoded image and stages it as a texture, keeping
    /// `params.num_channels` channels.
    #[cfg(feature = "image")]
    pub fn make_image_texture(
        &self,
        bytes: &[u8],
        params: &TextureParams,
    ) -> Result<SharedTexture<G>, RenderError> {
        let image = crate::pixels::decode_image(bytes, params.channels(), params.precision().is_float())?;
        self.make_texture(image.width, image.height, &image.data, params)
    }

    pub fn make_target(
        &self,
        width: u32,
        height: u32,
        params: &TargetParams,
    ) -> Result<RenderTarget<G>, RenderError> {
        RenderTarget::new(Rc::clone(&self.gl), self.capabilities, width, height, params)
    }

    pub fn gl(&self) -> &Rc<G> {
        &self.gl
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    /// Current surface size.
    pub fn size(&self) -> (u32, u32) {
        self.viewport.get()
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::{Call, HeadlessGl};
    use serde_json::json;

    #[test]
    fn modern_backend_has_everything_but_listed_extensions() {
        let caps = Capabilities::detect(&HeadlessGl::new());
        assert!(caps.modern);
        assert!(caps.float_textures);
        assert!(caps.half_float_textures);
        assert!(caps.half_float_linear);
        assert!(caps.float_linear);
        assert!(caps.color_buffer_float);

        let bare = HeadlessGl::new().with_extensions(Vec::<String>::new());
        let caps = Capabilities::detect(&bare);
        assert!(caps.float_textures);
        assert!(!caps.float_linear);
        assert!(!caps.color_buffer_float);
    }

    #[test]
    fn legacy_backend_depends_on_extensions() {
        let caps = Capabilities::detect(&HeadlessGl::legacy());
        assert_eq!(caps, Capabilities::default());

        let gl = HeadlessGl::legacy().with_extensions(["OES_texture_float", "WEBGL_color_buffer_float"]);
        let caps = Capabilities::detect(&gl);
        assert!(caps.float_textures);
        assert!(!caps.half_float_textures);
        assert!(caps.color_buffer_float);
    }

    #[test]
    fn new_applies_initial_state() {
        let gl = Rc::new(HeadlessGl::new());
        let options = ContextOptions {
            depth_test: true,
            clear_color: [0.1, 0.2, 0.3, 1.0],
            ..ContextOptions::default()
        };
        let _context = Context::new(Rc::clone(&gl), options).unwrap();
        assert_eq!(
            gl.calls(),
            vec![
                Call::Enable(glow::BLEND),
                Call::BlendFunc(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA),
                Call::Enable(glow::DEPTH_TEST),
                Call::ClearColor([0.1, 0.2, 0.3, 1.0]),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 300,
                    height: 150
                },
                Call::Clear(glow::COLOR_BUFFER_BIT),
            ]
        );
    }

    #[test]
    fn clear_targets_surface_or_render_target() {
        let gl = Rc::new(HeadlessGl::new());
        let mut context = Context::new(Rc::clone(&gl), ContextOptions::default()).unwrap();
        context.resize(64, 32);
        assert_eq!(context.size(), (64, 32));

        gl.take_calls();
        context.clear(Some([1.0, 0.0, 0.0, 1.0]), true, None).unwrap();
        assert_eq!(
            gl.take_calls(),
            vec![
                Call::BindFramebuffer(None),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 64,
                    height: 32
                },
                Call::ClearColor([1.0, 0.0, 0.0, 1.0]),
                Call::Clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT),
            ]
        );

        let target = context.make_target(8, 8, &TargetParams::default()).unwrap();
        gl.take_calls();
        context.clear(None, false, Some(&target)).unwrap();
        assert_eq!(
            gl.take_calls(),
            vec![
                Call::BindFramebuffer(Some(target.framebuffer().unwrap())),
                Call::Viewport {
                    x: 0,
                    y: 0,
                    width: 8,
                    height: 8
                },
                Call::Clear(glow::COLOR_BUFFER_BIT),
            ]
        );
    }

    #[test]
    fn tweak_exposes_backend() {
        let gl = Rc::new(HeadlessGl::new());
        let context = Context::new(Rc::clone(&gl), ContextOptions::default()).unwrap();
        gl.take_calls();
        context.tweak(|gl| gl.disable(glow::BLEND));
        assert_eq!(gl.calls(), vec![Call::Disable(glow::BLEND)]);
    }

    #[test]
    fn upgrade_option_rewrites_sources_on_modern_backends() {
        let vert = "attribute vec3 aPos;\nvoid main() {}";
        let frag = "precision mediump float;\nvoid main() { gl_FragColor = vec4(1.0); }";
        let options = ContextOptions {
            upgrade_shaders: true,
            ..ContextOptions::default()
        };

        let gl = Rc::new(HeadlessGl::new());
        let context = Context::new(Rc::clone(&gl), options.clone()).unwrap();
        let program = context.make_program(vert, frag).unwrap();
        assert!(program.attribute("aPos").is_some());
        let sources: Vec<String> = (1..=2).filter_map(|id| gl.shader_source_of(id)).collect();
        assert!(sources.iter().all(|s| s.starts_with("#version 300 es")));

        let gl = Rc::new(HeadlessGl::legacy());
        let context = Context::new(Rc::clone(&gl), options).unwrap();
        context.make_program(vert, frag).unwrap();
        assert_eq!(gl.shader_source_of(1).as_deref(), Some(vert));
    }

    #[test]
    fn options_from_json_keep_defaults() {
        let options = ContextOptions::from_json(&json!({
            "width": 640,
            "depthTest": true,
            "clearColor": [1.0, 1.0, 1.0, 1.0],
        }));
        assert_eq!(options.width, 640);
        assert_eq!(options.height, 150);
        assert!(options.depth_test);
        assert!(options.blend);
        assert_eq!(options.clear_color, [1.0; 4]);
    }

    #[test]
    fn oversized_surface_in_json_keeps_default() {
        let options = ContextOptions::from_json(&json!({
            "width": 4_294_967_596u64,
            "height": 1080,
        }));
        assert_eq!(options.width, 300);
        assert_eq!(options.height, 1080);
    }

    #[cfg(feature = "image")]
    #[test]
    fn image_texture_uses_decoded_size() {
        let mut png = Vec::new();
        image::RgbaImage::from_raw(2, 2, vec![255; 16])
            .unwrap()
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let gl = Rc::new(HeadlessGl::new());
        let context = Context::new(Rc::clone(&gl), ContextOptions::default()).unwrap();
        let params = TextureParams {
            num_channels: 3,
            ..TextureParams::default()
        };
        let texture = context.make_image_texture(&png, &params).unwrap();
        let texture = texture.borrow();
        assert_eq!((texture.width(), texture.height()), (2, 2));
        assert_eq!(texture.staged().map(<[u8]>::len), Some(16));
    }
}
