//! Shader Chunk Resolver
//!
//! GLSL templates and the chunk library are embedded with `rust-embed` and
//! rendered through a `minijinja` environment:
//!
//! | Syntax                          | Meaning                                      |
//! |---------------------------------|----------------------------------------------|
//! | `{$ include "lights_pars" $}`   | Splice `chunks/lights_pars.glsl` (recursive) |
//! | `{{ num_dir_lights }}`          | Substitute a count from [`TemplateContext`]  |
//! | `$$ for i in range(n)` … `$$ endfor` | Unroll a fixed-bound loop              |
//!
//! Unrolling happens here, not in GLSL, because many drivers reject dynamic
//! indexing into sampler and struct arrays.
//!
//! A missing chunk is a [`RenderError::UnresolvedChunk`]: the template
//! library is broken, no draw can fix it.

use std::borrow::Cow;

use minijinja::{Environment, Error, UndefinedBehavior, syntax::SyntaxConfig};
use rust_embed::RustEmbed;
use rustc_hash::FxHashSet;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{RenderError, Result};
use crate::resources::CustomShader;

#[derive(RustEmbed)]
#[folder = "src/pipeline/shaders"]
struct ShaderAssets;

fn shader_loader(name: &str) -> std::result::Result<Option<String>, Error> {
    let filename = if std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("glsl"))
    {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}.glsl"))
    };

    if let Some(file) = ShaderAssets::get(&filename)
        && let Ok(source) = std::str::from_utf8(file.data.as_ref())
    {
        return Ok(Some(source.to_string()));
    }

    Ok(None)
}

/// Values visible to templates. Everything here changes the generated
/// source, so every field is derived from the program parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplateContext {
    pub num_dir_lights: u32,
    pub num_point_lights: u32,
    pub num_spot_lights: u32,
    pub num_hemi_lights: u32,
    pub num_clipping_planes: u32,
    /// Planes with OR semantics; they come first in `clippingPlanes`.
    pub union_clipping_planes: u32,
    pub num_morph_targets: u32,
    pub num_morph_normals: u32,
}

/// Template environment for one rendering context.
pub struct ChunkResolver {
    env: Environment<'static>,
    custom: FxHashSet<u64>,
}

impl std::fmt::Debug for ChunkResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkResolver")
            .field("custom_sources", &self.custom.len())
            .finish_non_exhaustive()
    }
}

impl ChunkResolver {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();

        let syntax = SyntaxConfig::builder()
            .block_delimiters("{$", "$}")
            .variable_delimiters("{{", "}}")
            .line_statement_prefix("$$")
            .build()
            .map_err(|e| RenderError::TemplateSyntax(e.to_string()))?;

        env.set_syntax(syntax);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        // Chunks end in `#endif`; dropping their final newline glues the
        // next directive onto it.
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::SemiStrict);
        env.set_loader(shader_loader);
        env.set_path_join_callback(|name, _parent| format!("chunks/{name}").into());

        Ok(Self {
            env,
            custom: FxHashSet::default(),
        })
    }

    /// Renders a template (`"phong.vert"`, `"custom/…"`) with `ctx`.
    pub fn render(&self, template: &str, ctx: &TemplateContext) -> Result<String> {
        let template = self.env.get_template(template)?;
        Ok(template.render(ctx)?)
    }

    /// Renders one library chunk on its own.
    pub fn chunk(&self, name: &str, ctx: &TemplateContext) -> Result<String> {
        self.render(&format!("chunks/{name}"), ctx)
    }

    #[must_use]
    pub fn has_chunk(&self, name: &str) -> bool {
        self.env.get_template(&format!("chunks/{name}")).is_ok()
    }

    /// Hash identifying a custom shader's sources.
    #[must_use]
    pub fn source_hash(shader: &CustomShader) -> u64 {
        let mut bytes = Vec::with_capacity(shader.vertex.len() + shader.fragment.len() + 1);
        bytes.extend_from_slice(shader.vertex.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(shader.fragment.as_bytes());
        xxh3_64(&bytes)
    }

    /// Registers a custom shader's sources as templates and returns their
    /// `(vertex, fragment)` names. Registering the same sources twice is a
    /// no-op.
    pub fn register_custom(&mut self, shader: &CustomShader) -> Result<(String, String)> {
        let hash = Self::source_hash(shader);
        let vertex = format!("custom/{hash:016x}.vert");
        let fragment = format!("custom/{hash:016x}.frag");

        if self.custom.insert(hash) {
            self.env
                .add_template_owned(vertex.clone(), shader.vertex.clone())
                .map_err(RenderError::from)?;
            self.env
                .add_template_owned(fragment.clone(), shader.fragment.clone())
                .map_err(RenderError::from)?;
        }
        Ok((vertex, fragment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(vertex: &str, fragment: &str) -> CustomShader {
        CustomShader {
            name: "test".into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            lights: false,
        }
    }

    /// Directive keywords found after other text on the same line.
    fn glued_directives(source: &str) -> Vec<(usize, String)> {
        const DIRECTIVES: [&str; 8] = ["#if", "#ifdef", "#ifndef", "#elif", "#else", "#endif", "#define", "#undef"];
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let code = line.split("//").next().unwrap_or_default().trim();
                DIRECTIVES
                    .iter()
                    .any(|d| code.match_indices(d).any(|(at, _)| at > 0))
            })
            .map(|(i, line)| (i + 1, line.to_owned()))
            .collect()
    }

    #[test]
    fn test_every_builtin_template_renders() {
        let resolver = ChunkResolver::new().unwrap();
        let ctx = TemplateContext {
            num_dir_lights: 1,
            num_point_lights: 2,
            num_spot_lights: 1,
            num_hemi_lights: 1,
            num_clipping_planes: 2,
            union_clipping_planes: 1,
            num_morph_targets: 8,
            num_morph_normals: 0,
        };
        for name in ["basic", "lambert", "phong", "standard", "points", "dashed", "depth", "normal"] {
            for stage in ["vert", "frag"] {
                let source = resolver.render(&format!("{name}.{stage}"), &ctx).unwrap();
                assert!(source.contains("void main()"), "{name}.{stage}");
                assert!(!source.contains("{$"), "{name}.{stage}");
                let glued = glued_directives(&source);
                assert!(glued.is_empty(), "{name}.{stage}: {glued:?}");

                let opened = source
                    .lines()
                    .filter_map(|l| l.split_whitespace().next())
                    .filter(|word| ["#if", "#ifdef", "#ifndef"].contains(word))
                    .count();
                let closed = source.lines().filter(|l| l.trim().starts_with("#endif")).count();
                assert_eq!(opened, closed, "{name}.{stage}");
            }
        }
    }

    #[test]
    fn test_included_chunk_keeps_its_last_line_break() {
        let mut resolver = ChunkResolver::new().unwrap();
        let (vertex, _) = resolver
            .register_custom(&custom(
                "{$ include \"morphtarget_pars_vertex\" $}\n#ifdef USE_SKINNING\nx;\n#endif\n",
                "",
            ))
            .unwrap();
        let ctx = TemplateContext {
            num_morph_targets: 4,
            ..TemplateContext::default()
        };
        let source = resolver.render(&vertex, &ctx).unwrap();
        assert!(source.lines().any(|l| l.trim() == "#ifdef USE_SKINNING"), "{source}");
        let glued = glued_directives(&source);
        assert!(glued.is_empty(), "{glued:?}");
    }

    #[test]
    fn test_loops_are_unrolled() {
        let mut resolver = ChunkResolver::new().unwrap();
        let (vertex, _) = resolver
            .register_custom(&custom("$$ for i in range(num_point_lights)\nx[ {{ i }} ];\n$$ endfor\n", ""))
            .unwrap();
        let ctx = TemplateContext {
            num_point_lights: 3,
            ..TemplateContext::default()
        };
        let source = resolver.render(&vertex, &ctx).unwrap();
        let lines: Vec<&str> = source.lines().filter(|l| !l.trim().is_empty()).collect();
        assert_eq!(lines, vec!["x[ 0 ];", "x[ 1 ];", "x[ 2 ];"]);
    }

    #[test]
    fn test_missing_chunk_is_unresolved() {
        let mut resolver = ChunkResolver::new().unwrap();
        let (vertex, _) = resolver
            .register_custom(&custom("{$ include \"does_not_exist\" $}\n", ""))
            .unwrap();
        let err = resolver.render(&vertex, &TemplateContext::default()).unwrap_err();
        assert!(matches!(err, RenderError::UnresolvedChunk(_)), "{err:?}");
    }

    #[test]
    fn test_custom_sources_include_library_chunks() {
        let mut resolver = ChunkResolver::new().unwrap();
        let shader = custom("{$ include \"common\" $}\nvoid main() {}\n", "void main() {}\n");
        let (vertex, _) = resolver.register_custom(&shader).unwrap();
        let again = resolver.register_custom(&shader).unwrap();
        assert_eq!(vertex, again.0);
        let source = resolver.render(&vertex, &TemplateContext::default()).unwrap();
        assert!(source.contains("#define PI"));
        assert!(resolver.has_chunk("common"));
        assert!(!resolver.has_chunk("nope"));
    }
}
