//! Shader Programs
//!
//! A [`Program`] is a linked driver program plus everything derived from it:
//! the [`UniformRegistry`], the attribute location map, the exact source text
//! handed to the driver and a [`ProgramDiagnostics`] record.
//!
//! Source assembly, per stage:
//!
//! ```text
//! prefix (precision, #defines, standard uniforms/attributes,
//!         encoding + tone mapping helpers)          ← built here from ProgramParameters
//! body   (template with chunks expanded, counts
//!         substituted, loops unrolled)              ← ChunkResolver
//! ```
//!
//! Compile and link failures never escape as errors: they are recorded in the
//! diagnostics, `runnable` is cleared and the registry stays empty, so the
//! renderer skips the draws that use this program.

use std::borrow::Cow;
use std::fmt::Write as _;

use log::{debug, error, warn};
use rustc_hash::FxHashMap;

use super::chunks::{ChunkResolver, TemplateContext};
use super::parameters::{FogKind, MapFeatures, ProgramParameters};
use crate::driver::{Extensions, GlDriver, ProgramId, ShaderId, ShaderStage};
use crate::errors::{ProgramError, Result};
use crate::resources::{Combine, DepthPacking, Encoding, EnvMapMode, VertexColors};
use crate::uniforms::UniformRegistry;

/// Outcome of compiling and linking a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramDiagnostics {
    /// `false` when a stage failed to compile or the program failed to link.
    pub runnable: bool,
    pub program_log: String,
    pub vertex_log: String,
    pub fragment_log: String,
    pub errors: Vec<ProgramError>,
}

/// A linked, reflected driver program.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    serial: u32,
    name: String,
    uniforms: UniformRegistry,
    attributes: FxHashMap<String, u32>,
    diagnostics: ProgramDiagnostics,
    vertex_source: String,
    fragment_source: String,
}

impl Program {
    /// Assembles, compiles and links the program described by `params`.
    ///
    /// `serial` is a context-unique identity used for render list sorting.
    /// Returns `Err` only for configuration errors (unresolved chunks,
    /// uniforms of unknown type).
    pub fn new(
        driver: &mut dyn GlDriver,
        resolver: &mut ChunkResolver,
        params: &ProgramParameters,
        serial: u32,
        check_errors: bool,
    ) -> Result<Self> {
        let ctx = params.template_context();
        let (vertex_template, fragment_template) = match &params.custom {
            Some(shader) => resolver.register_custom(shader)?,
            None => {
                let name = params.template.name();
                (format!("{name}.vert"), format!("{name}.frag"))
            }
        };

        let vertex_body = resolver.render(&vertex_template, &ctx)?;
        let fragment_body = resolver.render(&fragment_template, &ctx)?;
        let vertex_source = format!("{}\n{vertex_body}", vertex_prefix(params, &ctx));
        let fragment_source = format!("{}\n{fragment_body}", fragment_prefix(params, resolver, &ctx)?);

        let id = driver.create_program();
        let vertex = compile_stage(driver, ShaderStage::Vertex, &vertex_source);
        let fragment = compile_stage(driver, ShaderStage::Fragment, &fragment_source);
        driver.attach_shader(id, vertex);
        driver.attach_shader(id, fragment);

        // Some drivers misbehave when attribute 0 is unused; morphing makes
        // that likely, so pin it.
        if let Some(name) = &params.index0_attribute_name {
            driver.bind_attrib_location(id, 0, name);
        } else if params.morph_targets {
            driver.bind_attrib_location(id, 0, "position");
        }

        driver.link_program(id);

        let mut diagnostics = ProgramDiagnostics {
            runnable: true,
            ..ProgramDiagnostics::default()
        };
        if check_errors {
            diagnostics = check(driver, id, vertex, fragment, &params.shader_name);
        }

        driver.delete_shader(vertex);
        driver.delete_shader(fragment);

        let (uniforms, attributes) = if diagnostics.runnable {
            let uniforms = match UniformRegistry::new(driver, id) {
                Ok(registry) => registry,
                Err(err) => {
                    driver.delete_program(id);
                    return Err(err);
                }
            };
            let attributes = driver
                .active_attributes(id)
                .into_iter()
                .map(|a| (a.name, a.location))
                .collect();
            (uniforms, attributes)
        } else {
            (UniformRegistry::empty(), FxHashMap::default())
        };

        debug!(
            "Created program #{serial} '{}' (runnable: {})",
            params.shader_name, diagnostics.runnable
        );

        Ok(Self {
            id,
            serial,
            name: params.shader_name.clone(),
            uniforms,
            attributes,
            diagnostics,
            vertex_source,
            fragment_source,
        })
    }

    /// Deletes the driver program.
    pub fn destroy(self, driver: &mut dyn GlDriver) {
        debug!("Destroying program #{} '{}'", self.serial, self.name);
        driver.delete_program(self.id);
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn serial(&self) -> u32 {
        self.serial
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn uniforms(&self) -> &UniformRegistry {
        &self.uniforms
    }

    /// Location of an active attribute.
    #[inline]
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, u32)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &ProgramDiagnostics {
        &self.diagnostics
    }

    #[inline]
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.diagnostics.runnable
    }

    #[must_use]
    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex_source,
            ShaderStage::Fragment => &self.fragment_source,
        }
    }
}

fn compile_stage(driver: &mut dyn GlDriver, stage: ShaderStage, source: &str) -> ShaderId {
    let shader = driver.create_shader(stage);
    driver.shader_source(shader, source);
    driver.compile_shader(shader);
    shader
}

fn check(
    driver: &dyn GlDriver,
    program: ProgramId,
    vertex: ShaderId,
    fragment: ShaderId,
    name: &str,
) -> ProgramDiagnostics {
    let mut diagnostics = ProgramDiagnostics {
        runnable: driver.program_link_status(program),
        program_log: driver.program_info_log(program).trim().to_owned(),
        vertex_log: driver.shader_info_log(vertex).trim().to_owned(),
        fragment_log: driver.shader_info_log(fragment).trim().to_owned(),
        errors: Vec::new(),
    };

    for (stage, shader, log) in [
        (ShaderStage::Vertex, vertex, &diagnostics.vertex_log),
        (ShaderStage::Fragment, fragment, &diagnostics.fragment_log),
    ] {
        if !driver.shader_compile_status(shader) {
            diagnostics.errors.push(ProgramError::Compile {
                stage,
                log: log.clone(),
            });
        }
    }

    if diagnostics.runnable {
        if !diagnostics.program_log.is_empty() {
            warn!("Program '{name}' linked with warnings: {}", diagnostics.program_log);
        }
    } else {
        diagnostics.errors.push(ProgramError::Link {
            log: diagnostics.program_log.clone(),
        });
        for err in &diagnostics.errors {
            error!("Program '{name}': {err}");
        }
    }
    diagnostics
}

// ─── Prefix assembly ──────────────────────────────────────────────────────────

/// Prefix lines; empty entries are dropped when joined.
#[derive(Default)]
struct Prefix(Vec<Cow<'static, str>>);

impl Prefix {
    fn line(&mut self, line: impl Into<Cow<'static, str>>) {
        self.0.push(line.into());
    }

    fn define_if(&mut self, cond: bool, name: &'static str) {
        if cond {
            self.0.push(Cow::Owned(format!("#define {name}")));
        }
    }

    fn finish(self) -> String {
        let mut out = String::new();
        for line in self.0.iter().filter(|l| !l.is_empty()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Defines shared by both stages.
fn common_defines(prefix: &mut Prefix, params: &ProgramParameters, ctx: &TemplateContext) {
    let maps = params.maps;
    let precision = params.precision.as_str();
    prefix.line(format!("precision {precision} float;"));
    prefix.line(format!("precision {precision} int;"));
    prefix.line(format!("#define SHADER_NAME {}", params.shader_name));

    for (name, value) in &params.defines {
        prefix.line(format!("#define {name} {value}"));
    }

    prefix.line(format!("#define GAMMA_FACTOR {:?}", params.gamma_factor));
    prefix.line(format!("#define NUM_DIR_LIGHTS {}", ctx.num_dir_lights));
    prefix.line(format!("#define NUM_POINT_LIGHTS {}", ctx.num_point_lights));
    prefix.line(format!("#define NUM_SPOT_LIGHTS {}", ctx.num_spot_lights));
    prefix.line(format!("#define NUM_HEMI_LIGHTS {}", ctx.num_hemi_lights));
    prefix.line(format!("#define NUM_CLIPPING_PLANES {}", ctx.num_clipping_planes));
    prefix.line(format!("#define UNION_CLIPPING_PLANES {}", ctx.union_clipping_planes));

    prefix.define_if(params.fog.is_some(), "USE_FOG");
    prefix.define_if(params.fog == Some(FogKind::Exp2), "FOG_EXP2");

    prefix.define_if(maps.contains(MapFeatures::MAP), "USE_MAP");
    prefix.define_if(maps.contains(MapFeatures::ALPHA_MAP), "USE_ALPHAMAP");
    prefix.define_if(maps.contains(MapFeatures::LIGHT_MAP), "USE_LIGHTMAP");
    prefix.define_if(maps.contains(MapFeatures::AO_MAP), "USE_AOMAP");
    prefix.define_if(maps.contains(MapFeatures::EMISSIVE_MAP), "USE_EMISSIVEMAP");
    prefix.define_if(maps.contains(MapFeatures::BUMP_MAP), "USE_BUMPMAP");
    prefix.define_if(maps.contains(MapFeatures::NORMAL_MAP), "USE_NORMALMAP");
    prefix.define_if(maps.contains(MapFeatures::DISPLACEMENT_MAP), "USE_DISPLACEMENTMAP");
    prefix.define_if(maps.contains(MapFeatures::SPECULAR_MAP), "USE_SPECULARMAP");
    prefix.define_if(maps.contains(MapFeatures::ROUGHNESS_MAP), "USE_ROUGHNESSMAP");
    prefix.define_if(maps.contains(MapFeatures::METALNESS_MAP), "USE_METALNESSMAP");
    if maps.contains(MapFeatures::ENV_MAP) {
        prefix.line("#define USE_ENVMAP");
        prefix.line(match params.env_map_mode {
            EnvMapMode::Reflection => "#define ENVMAP_MODE_REFLECTION",
            EnvMapMode::Refraction => "#define ENVMAP_MODE_REFRACTION",
        });
    }
    prefix.define_if(maps.uses_uv(), "USE_UV");
    prefix.define_if(maps.uses_uv2(), "USE_UV2");

    match params.vertex_colors {
        VertexColors::None => {}
        VertexColors::Rgb => prefix.line("#define USE_COLOR"),
        VertexColors::Rgba => {
            prefix.line("#define USE_COLOR");
            prefix.line("#define USE_COLOR_ALPHA");
        }
    }

    prefix.define_if(params.flat_shading, "FLAT_SHADED");
    prefix.define_if(params.double_sided, "DOUBLE_SIDED");
    prefix.define_if(params.flip_sided, "FLIP_SIDED");
    if params.shadow_map_enabled {
        prefix.line("#define USE_SHADOWMAP");
        prefix.line(format!("#define {}", params.shadow_map_kind.define()));
    }
    prefix.define_if(params.physically_correct_lights, "PHYSICALLY_CORRECT_LIGHTS");
    prefix.define_if(params.logarithmic_depth_buffer, "USE_LOGDEPTHBUF");
    if params.logarithmic_depth_buffer && params.extensions.contains(Extensions::FRAG_DEPTH) {
        prefix.line("#define USE_LOGDEPTHBUF_EXT");
    }
}

fn vertex_prefix(params: &ProgramParameters, ctx: &TemplateContext) -> String {
    let mut prefix = Prefix::default();
    common_defines(&mut prefix, params, ctx);

    prefix.define_if(params.vertex_textures, "VERTEX_TEXTURES");
    if params.skinning {
        prefix.line("#define USE_SKINNING");
        prefix.line(format!("#define MAX_BONES {}", params.max_bones));
    }
    prefix.define_if(params.morph_targets, "USE_MORPHTARGETS");
    prefix.define_if(params.morph_normals, "USE_MORPHNORMALS");
    prefix.define_if(params.size_attenuation, "USE_SIZEATTENUATION");

    prefix.line(
        "uniform mat4 modelMatrix;\n\
         uniform mat4 modelViewMatrix;\n\
         uniform mat4 projectionMatrix;\n\
         uniform mat4 viewMatrix;\n\
         uniform mat3 normalMatrix;\n\
         uniform vec3 cameraPosition;\n\
         attribute vec3 position;\n\
         attribute vec3 normal;\n\
         attribute vec2 uv;\n\
         #ifdef USE_UV2\n\
         \tattribute vec2 uv2;\n\
         #endif\n\
         #ifdef USE_COLOR_ALPHA\n\
         \tattribute vec4 color;\n\
         #elif defined( USE_COLOR )\n\
         \tattribute vec3 color;\n\
         #endif\n\
         #ifdef USE_SKINNING\n\
         \tattribute vec4 skinIndex;\n\
         \tattribute vec4 skinWeight;\n\
         #endif",
    );

    if params.morph_targets {
        let mut morph = String::new();
        for i in 0..ctx.num_morph_targets {
            let _ = writeln!(morph, "attribute vec3 morphTarget{i};");
        }
        for i in 0..ctx.num_morph_normals {
            let _ = writeln!(morph, "attribute vec3 morphNormal{i};");
        }
        prefix.line(morph);
    }

    prefix.finish()
}

fn fragment_prefix(params: &ProgramParameters, resolver: &ChunkResolver, ctx: &TemplateContext) -> Result<String> {
    let mut prefix = Prefix::default();
    let ext = params.extensions;
    if ext.contains(Extensions::STANDARD_DERIVATIVES) {
        prefix.line("#extension GL_OES_standard_derivatives : enable");
    }
    if ext.contains(Extensions::FRAG_DEPTH) {
        prefix.line("#extension GL_EXT_frag_depth : enable");
    }
    if ext.contains(Extensions::SHADER_TEXTURE_LOD) {
        prefix.line("#extension GL_EXT_shader_texture_lod : enable");
        prefix.line("#define TEXTURE_LOD_EXT");
    }

    common_defines(&mut prefix, params, ctx);

    if params.maps.contains(MapFeatures::ENV_MAP) {
        prefix.line(match params.combine {
            Combine::Multiply => "#define ENVMAP_BLENDING_MULTIPLY",
            Combine::Mix => "#define ENVMAP_BLENDING_MIX",
            Combine::Add => "#define ENVMAP_BLENDING_ADD",
        });
    }
    prefix.define_if(params.premultiplied_alpha, "PREMULTIPLIED_ALPHA");
    prefix.define_if(params.alpha_test, "USE_ALPHATEST");
    prefix.define_if(params.dithering, "DITHERING");
    prefix.line(match params.depth_packing {
        DepthPacking::Basic => "#define DEPTH_PACKING 3200",
        DepthPacking::Rgba => "#define DEPTH_PACKING 3201",
    });

    prefix.line("uniform mat4 viewMatrix;\nuniform vec3 cameraPosition;");

    if let Some(operator) = params.tone_mapping.function_name() {
        prefix.line("#define TONE_MAPPING");
        prefix.line(resolver.chunk("tonemapping_pars", ctx)?);
        prefix.line(format!(
            "vec3 toneMapping( vec3 color ) {{ return {operator}ToneMapping( color ); }}"
        ));
    }

    prefix.line(resolver.chunk("encodings_pars", ctx)?);
    let maps = params.maps;
    if maps.contains(MapFeatures::MAP) {
        prefix.line(decoding_function("mapTexelToLinear", params.map_encoding));
    }
    if maps.contains(MapFeatures::ENV_MAP) {
        prefix.line(decoding_function("envMapTexelToLinear", params.env_map_encoding));
    }
    if maps.contains(MapFeatures::EMISSIVE_MAP) {
        prefix.line(decoding_function("emissiveMapTexelToLinear", params.emissive_map_encoding));
    }
    prefix.line(encoding_function("linearToOutputTexel", params.output_encoding));

    Ok(prefix.finish())
}

fn decoding_function(name: &str, encoding: Encoding) -> String {
    let (function, args) = encoding.components();
    format!("vec4 {name}( vec4 value ) {{ return {function}ToLinear{args}; }}")
}

fn encoding_function(name: &str, encoding: Encoding) -> String {
    let (function, args) = encoding.components();
    format!("vec4 {name}( vec4 value ) {{ return LinearTo{function}{args}; }}")
}
