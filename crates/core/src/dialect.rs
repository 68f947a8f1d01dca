//! GLSL ES 1.00 to 3.00 source upgrade.
//!
//! A fixed set of textual substitutions, applied on identifier boundaries:
//! `attribute`/`varying` become `in`/`out`, the legacy sampling calls become
//! `texture`, and `gl_FragColor` becomes a declared `out` variable. Sources
//! that already target 3.00 pass through untouched.

use crate::gl::ShaderStage;

/// Name of the fragment output declared for upgraded fragment shaders.
pub const FRAG_OUTPUT: &str = "fragColor";

const VERSION_300: &str = "#version 300 es";

/// Rewrites an ES 1.00 source for an ES 3.00 compiler.
pub fn upgrade(source: &str, stage: ShaderStage) -> String {
    if targets_300(source) {
        return source.to_string();
    }

    let renames: &[(&str, &str)] = match stage {
        ShaderStage::Vertex => &[("attribute", "in"), ("varying", "out")],
        ShaderStage::Fragment => &[
            ("varying", "in"),
            ("texture2D", "texture"),
            ("textureCube", "texture"),
            ("gl_FragColor", FRAG_OUTPUT),
        ],
    };
    let body = renames
        .iter()
        .fold(source.to_string(), |src, (from, to)| replace_identifier(&src, from, to));

    let mut lines: Vec<String> = body.lines().map(str::to_string).collect();
    let version_line = match lines.iter().position(|l| is_version(l)) {
        Some(i) => {
            lines[i] = VERSION_300.to_string();
            i
        }
        None => {
            lines.insert(0, VERSION_300.to_string());
            0
        }
    };

    if stage == ShaderStage::Fragment {
        let after = lines
            .iter()
            .rposition(|l| l.trim_start().starts_with("precision "))
            .unwrap_or(version_line);
        lines.insert(after + 1, format!("out vec4 {FRAG_OUTPUT};"));
    }

    let mut out = lines.join("\n");
    if source.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn is_version(line: &str) -> bool {
    line.trim_start().starts_with("#version")
}

fn targets_300(source: &str) -> bool {
    source
        .lines()
        .any(|l| is_version(l) && l.split_whitespace().nth(1) == Some("300"))
}

fn is_ident(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replaces whole-identifier occurrences of `from`.
fn replace_identifier(source: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    let mut prev = None;
    while let Some(pos) = rest.find(from) {
        let before = rest[..pos].chars().next_back().or(prev);
        let tail = &rest[pos + from.len()..];
        out.push_str(&rest[..pos]);
        if is_ident(before) || is_ident(tail.chars().next()) {
            out.push_str(from);
        } else {
            out.push_str(to);
        }
        prev = from.chars().next_back();
        rest = tail;
    }
    out.push_str(rest);
    out
}
