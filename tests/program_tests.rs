//! Program Tests
//!
//! Tests for:
//! - Program reuse across materials that differ only in uniform data
//! - Distinct programs for distinct feature sets
//! - Reference counting and deletion
//! - Key interning across release and context loss
//! - Attribute 0 pinning for morphed geometry
//! - Compile / link failure diagnostics
//! - Unresolved chunks as configuration errors
//! - Every built-in template compiling and linking

use std::sync::Arc;

use glam::Vec3;
use myth_gl::RendererSettings;
use myth_gl::driver::{
    BufferId, DriverCall, DriverCapabilities, RecordingDriver, ShaderStage, TextureId, TextureTarget,
};
use myth_gl::errors::{ProgramError, RenderError};
use myth_gl::lights::LightCounts;
use myth_gl::pipeline::{ChunkResolver, FrameEnvironment, ProgramCache, ProgramHandle, ProgramParameters};
use myth_gl::resources::{
    CustomShader, DepthPacking, Fog, Geometry, Material, MaterialKind, RenderObject, TextureRef, VertexAttribute,
};

const VERTEX: &str = "void main() {\n\tgl_Position = projectionMatrix * modelViewMatrix * vec4( position, 1.0 );\n}\n";
const FRAGMENT: &str = "uniform vec3 tint;\nvoid main() {\n\tgl_FragColor = vec4( tint, 1.0 );\n}\n";

struct Fixture {
    driver: RecordingDriver,
    resolver: ChunkResolver,
    cache: ProgramCache,
    env: FrameEnvironment,
    caps: DriverCapabilities,
}

impl Fixture {
    fn new() -> anyhow::Result<Self> {
        let settings = RendererSettings::default();
        Ok(Self {
            driver: RecordingDriver::new(),
            resolver: ChunkResolver::new()?,
            cache: ProgramCache::new(),
            env: FrameEnvironment::new(&settings, LightCounts::default(), None),
            caps: DriverCapabilities::default(),
        })
    }

    fn params(&self, material: &Material, geometry: Geometry) -> ProgramParameters {
        let object = RenderObject::mesh(Arc::new(geometry), Arc::new(Material::basic()));
        ProgramParameters::new(material, &object, &self.env, (0, 0), &self.caps)
    }

    fn acquire(&mut self, material: &Material) -> myth_gl::errors::Result<ProgramHandle> {
        let params = self.params(material, triangle());
        self.cache.acquire(&mut self.driver, &mut self.resolver, &params, true)
    }

    fn created(&self) -> usize {
        self.driver.count(|c| matches!(c, DriverCall::CreateProgram(_)))
    }
}

fn triangle() -> Geometry {
    Geometry::new()
        .with_attribute("position", VertexAttribute::floats(BufferId(1), 3, 3))
        .with_attribute("normal", VertexAttribute::floats(BufferId(2), 3, 3))
        .with_attribute("uv", VertexAttribute::floats(BufferId(3), 2, 3))
}

fn custom(fragment: &str) -> Material {
    Material::custom(CustomShader {
        name: "TestShader".into(),
        vertex: VERTEX.into(),
        fragment: fragment.into(),
        lights: false,
    })
}

// ============================================================================
// Sharing
// ============================================================================

#[test]
fn color_only_difference_shares_program() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let red = Material::phong().with_color(Vec3::X);
    let blue = Material::phong().with_color(Vec3::Z);

    let a = fx.acquire(&red)?;
    let b = fx.acquire(&blue)?;

    assert_eq!(a, b);
    assert_eq!(fx.cache.len(), 1);
    assert_eq!(fx.cache.used_times(a), Some(2));
    assert_eq!(fx.created(), 1);
    Ok(())
}

#[test]
fn feature_flag_gives_distinct_program() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let plain = Material::lambert();
    let mut mapped = Material::lambert();
    mapped.maps.map = Some(TextureRef::new(TextureId(5), TextureTarget::Texture2D));

    let a = fx.acquire(&plain)?;
    let b = fx.acquire(&mapped)?;
    assert_ne!(a, b);
    assert_eq!(fx.cache.len(), 2);

    let Some(program) = fx.cache.get(b) else {
        panic!("mapped program missing");
    };
    assert!(program.source(ShaderStage::Fragment).contains("#define USE_MAP"));
    assert!(program.uniforms().contains("map"));
    assert_eq!(program.attribute("uv"), Some(2));
    Ok(())
}

#[test]
fn cache_key_is_stable_for_equal_inputs() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let material = Material::standard();
    let a = fx.params(&material, triangle()).cache_key();
    let b = fx.params(&material, triangle()).cache_key();
    assert_eq!(a, b);

    let other = fx.params(&Material::phong(), triangle()).cache_key();
    assert_ne!(a, other);
    Ok(())
}

#[test]
fn identical_custom_sources_share_program() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let a = fx.acquire(&custom(FRAGMENT))?;
    let b = fx.acquire(&custom(FRAGMENT))?;
    let c = fx.acquire(&custom("void main() {\n\tgl_FragColor = vec4( 0.0 );\n}\n"))?;

    assert_eq!(a, b);
    assert_ne!(a, c);
    let Some(program) = fx.cache.get(a) else {
        panic!("custom program missing");
    };
    assert!(program.is_runnable());
    assert!(program.uniforms().contains("tint"));
    Ok(())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn last_release_deletes_program() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let material = Material::basic();

    let handle = fx.acquire(&material)?;
    let again = fx.acquire(&material)?;
    assert_eq!(handle, again);
    assert_eq!(fx.driver.live_programs(), 1);

    fx.cache.release(&mut fx.driver, handle)?;
    assert_eq!(fx.cache.used_times(handle), Some(1));
    assert_eq!(fx.driver.live_programs(), 1);

    fx.cache.release(&mut fx.driver, handle)?;
    assert!(fx.cache.get(handle).is_none());
    assert_eq!(fx.driver.live_programs(), 0);
    assert_eq!(fx.driver.count(|c| matches!(c, DriverCall::DeleteProgram(_))), 1);

    // The stale handle is rejected.
    let err = fx.cache.release(&mut fx.driver, handle).unwrap_err();
    assert_eq!(err, RenderError::InvalidProgramHandle);
    Ok(())
}

#[test]
fn reacquire_after_full_release_recompiles() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let material = Material::basic();

    let first = fx.acquire(&material)?;
    let first_serial = fx.cache.get(first).map(myth_gl::pipeline::Program::serial);
    fx.cache.release(&mut fx.driver, first)?;

    let second = fx.acquire(&material)?;
    assert_ne!(first, second);
    assert_eq!(fx.created(), 2);
    assert_ne!(fx.cache.get(second).map(myth_gl::pipeline::Program::serial), first_serial);
    Ok(())
}

#[test]
fn released_keys_stay_interned_and_are_reused() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let material = Material::basic();

    for _ in 0..3 {
        let handle = fx.acquire(&material)?;
        fx.cache.release(&mut fx.driver, handle)?;
    }
    assert!(fx.cache.is_empty());
    assert_eq!(fx.cache.interned_keys(), 1);

    fx.acquire(&material)?;
    fx.cache.clear();
    fx.acquire(&material)?;
    fx.acquire(&Material::lambert())?;
    assert_eq!(fx.cache.interned_keys(), 2);
    Ok(())
}

// ============================================================================
// Attributes
// ============================================================================

#[test]
fn morph_targets_pin_position_to_location_zero() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let mut material = Material::basic();
    material.morph_targets = true;

    let mut geometry = triangle();
    geometry.morph_positions = vec![VertexAttribute::floats(BufferId(9), 3, 3)];
    let params = fx.params(&material, geometry);
    assert!(params.morph_targets);

    let handle = fx.cache.acquire(&mut fx.driver, &mut fx.resolver, &params, true)?;
    let Some(program) = fx.cache.get(handle) else {
        panic!("morph program missing");
    };
    assert!(fx.driver.calls().contains(&DriverCall::BindAttribLocation(
        program.id(),
        0,
        "position".to_owned()
    )));
    assert_eq!(program.attribute("position"), Some(0));
    assert!(program.uniforms().contains("morphTargetInfluences"));
    Ok(())
}

#[test]
fn morph_without_streams_is_not_enabled() -> anyhow::Result<()> {
    let fx = Fixture::new()?;
    let mut material = Material::basic();
    material.morph_targets = true;
    let params = fx.params(&material, triangle());
    assert!(!params.morph_targets);
    Ok(())
}

// ============================================================================
// Built-in templates
// ============================================================================

fn builtin_kinds() -> Vec<MaterialKind> {
    vec![
        MaterialKind::Basic,
        MaterialKind::Lambert,
        MaterialKind::Phong,
        MaterialKind::Standard,
        MaterialKind::Points { size_attenuation: true },
        MaterialKind::LineBasic,
        MaterialKind::LineDashed,
        MaterialKind::Depth { packing: DepthPacking::Rgba },
        MaterialKind::Normal,
    ]
}

/// Lines where a preprocessor directive follows other text.
fn glued_directives(source: &str) -> Vec<String> {
    source
        .lines()
        .filter(|line| {
            let code = line.split("//").next().unwrap_or_default().trim();
            ["#if", "#elif", "#else", "#endif", "#define", "#undef"]
                .iter()
                .any(|d| code.match_indices(d).any(|(at, _)| at > 0))
        })
        .map(str::to_owned)
        .collect()
}

fn assert_builtins_link(fx: &mut Fixture, clipping: (usize, usize)) -> anyhow::Result<()> {
    for kind in builtin_kinds() {
        let material = Material::new(kind.clone());
        let object = RenderObject::mesh(Arc::new(triangle()), Arc::new(Material::basic()));
        let params = ProgramParameters::new(&material, &object, &fx.env, clipping, &fx.caps);
        let handle = fx.cache.acquire(&mut fx.driver, &mut fx.resolver, &params, true)?;

        let Some(program) = fx.cache.get(handle) else {
            panic!("{kind:?}: program missing");
        };
        assert!(
            program.is_runnable(),
            "{kind:?}: {:?}",
            program.diagnostics()
        );
        assert!(program.attribute("position").is_some(), "{kind:?}");
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            let glued = glued_directives(program.source(stage));
            assert!(glued.is_empty(), "{kind:?} {stage:?}: {glued:?}");
        }
    }
    Ok(())
}

#[test]
fn every_builtin_template_links() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    assert_builtins_link(&mut fx, (0, 0))
}

#[test]
fn every_builtin_template_links_with_lights_fog_and_clipping() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let mut settings = RendererSettings::default();
    settings.shadow_map.enabled = true;
    let lights = LightCounts {
        directional: 1,
        point: 2,
        spot: 1,
        hemisphere: 1,
    };
    let fog = Fog::Exp2 {
        color: Vec3::ONE,
        density: 0.1,
    };
    fx.env = FrameEnvironment::new(&settings, lights, Some(&fog));

    assert_builtins_link(&mut fx, (2, 1))?;

    let object = RenderObject::mesh(Arc::new(triangle()), Arc::new(Material::basic()));
    let params = ProgramParameters::new(&Material::phong(), &object, &fx.env, (2, 1), &fx.caps);
    let lit = fx.cache.acquire(&mut fx.driver, &mut fx.resolver, &params, true)?;
    let Some(program) = fx.cache.get(lit) else {
        panic!("lit program missing");
    };
    assert!(program.uniforms().contains("pointLights"));
    assert!(program.uniforms().contains("clippingPlanes"));
    assert!(program.uniforms().contains("fogDensity"));
    Ok(())
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn compile_failure_is_recorded_not_returned() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let handle = fx.acquire(&custom("#error broken\nvoid main() {}\n"))?;

    let Some(program) = fx.cache.get(handle) else {
        panic!("failed program is still cached");
    };
    let diagnostics = program.diagnostics();
    assert!(!program.is_runnable());
    assert!(diagnostics.fragment_log.contains("broken"), "{}", diagnostics.fragment_log);
    assert!(diagnostics.vertex_log.is_empty());
    assert!(diagnostics.errors.iter().any(|e| matches!(
        e,
        ProgramError::Compile {
            stage: ShaderStage::Fragment,
            ..
        }
    )));
    assert!(diagnostics.errors.iter().any(|e| matches!(e, ProgramError::Link { .. })));
    assert!(program.uniforms().is_empty());
    assert_eq!(program.attributes().count(), 0);

    // Cached: a second material with the same sources does not recompile.
    fx.acquire(&custom("#error broken\nvoid main() {}\n"))?;
    assert_eq!(fx.created(), 1);
    Ok(())
}

#[test]
fn forced_link_failure_marks_program_unrunnable() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    fx.driver.set_link_failure(true);
    let handle = fx.acquire(&Material::basic())?;

    let Some(program) = fx.cache.get(handle) else {
        panic!("program missing");
    };
    assert!(!program.is_runnable());
    assert!(program.diagnostics().program_log.contains("forced"));
    assert_eq!(program.diagnostics().errors.len(), 1);
    Ok(())
}

#[test]
fn unresolved_chunk_is_fatal() -> anyhow::Result<()> {
    let mut fx = Fixture::new()?;
    let material = Material::custom(CustomShader {
        name: "Missing".into(),
        vertex: "{$ include \"no_such_chunk\" $}\nvoid main() {}\n".into(),
        fragment: "void main() {}\n".into(),
        lights: false,
    });

    let err = fx.acquire(&material).unwrap_err();
    assert!(matches!(err, RenderError::UnresolvedChunk(_)), "{err:?}");
    assert!(fx.cache.is_empty());
    assert_eq!(fx.driver.live_programs(), 0);
    Ok(())
}
