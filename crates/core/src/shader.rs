//! Shader compilation and linking helpers.
//!
//! Provides error types, source formatting for debugging, and functions
//! to compile individual shader stages and link programs through any
//! [`GlApi`] backend. The formatting utilities are pure string processing.

use thiserror::Error;

use crate::gl::{GlApi, ShaderStage};

/// Errors that can occur during shader compilation or program linking.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A shader stage failed to compile.
    #[error("shader compile error ({stage}):\n{log}")]
    CompileError {
        /// The shader stage that failed (e.g. "vertex", "fragment").
        stage: String,
        /// The numbered source followed by the driver's info log.
        log: String,
    },
    /// A program failed to link.
    #[error("shader link error:\n{0}")]
    LinkError(String),
}

/// Formats a shader compilation error for human-readable debugging.
///
/// Prepends right-aligned line numbers to each line of `source`, then
/// appends the driver's error `log`. This makes it easy to correlate
/// error messages (which reference line numbers) with the actual GLSL.
///
/// Both `source` and `log` may be empty; the function handles all
/// combinations gracefully.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let source_lines: Vec<&str> = if source.is_empty() {
        Vec::new()
    } else {
        source.lines().collect()
    };

    let line_count = source_lines.len();
    let width = if line_count == 0 {
        1
    } else {
        line_count.to_string().len()
    };

    let numbered: String = source_lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1, width = width))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, true) => String::new(),
        (true, false) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

/// Compiles a single shader stage.
///
/// On failure the shader object is deleted and the error carries the
/// numbered source plus the driver's info log.
///
/// # Errors
///
/// Returns `ShaderError::CompileError` if the source fails to compile or
/// the backend cannot create a shader object.
pub fn compile_shader<G: GlApi>(
    gl: &G,
    stage: ShaderStage,
    source: &str,
) -> Result<G::Shader, ShaderError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|log| ShaderError::CompileError {
            stage: stage.name().to_string(),
            log,
        })?;

    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if gl.shader_compile_status(shader) {
        Ok(shader)
    } else {
        let info_log = gl.shader_info_log(shader);
        gl.delete_shader(shader);
        Err(ShaderError::CompileError {
            stage: stage.name().to_string(),
            log: format_shader_error(source, &info_log),
        })
    }
}

/// Compiles a vertex and a fragment stage.
///
/// If the fragment stage fails, the already compiled vertex shader is
/// deleted before returning.
///
/// # Errors
///
/// Returns `ShaderError::CompileError` for the first stage that fails.
pub fn compile_stages<G: GlApi>(
    gl: &G,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<(G::Shader, G::Shader), ShaderError> {
    let vertex = compile_shader(gl, ShaderStage::Vertex, vertex_src)?;
    match compile_shader(gl, ShaderStage::Fragment, fragment_src) {
        Ok(fragment) => Ok((vertex, fragment)),
        Err(e) => {
            gl.delete_shader(vertex);
            Err(e)
        }
    }
}

/// Links `program` with whatever shaders are attached to it.
///
/// Linking may run more than once on the same program (after attribute
/// locations are rebound), so the program is left alive on failure and
/// cleanup is the caller's job.
///
/// # Errors
///
/// Returns `ShaderError::LinkError` with the driver's info log.
pub fn link<G: GlApi>(gl: &G, program: G::Program) -> Result<(), ShaderError> {
    gl.link_program(program);
    if gl.program_link_status(program) {
        Ok(())
    } else {
        Err(ShaderError::LinkError(gl.program_info_log(program)))
    }
}
