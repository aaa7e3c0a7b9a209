//! Uniform Tests
//!
//! Tests for:
//! - Uniform name parsing (singular, pure array, struct paths)
//! - Registry tree construction from reflection results
//! - Uploads through the tree: structs, arrays, dirty flags
//! - Sampler uniforms: unit allocation and placeholder textures

use glam::{Mat4, Vec3};
use myth_gl::driver::{
    ActiveUniform, DriverCall, RecordingDriver, TextureId, TextureTarget, UniformLocation, type_code,
};
use myth_gl::resources::{DirectTextureBinder, TextureRef};
use myth_gl::state::GpuState;
use myth_gl::uniforms::path::parse;
use myth_gl::uniforms::{
    NodeKind, ScratchPool, TextureUnits, Uniform, UniformId, UniformRegistry, UniformValue, UniformValues,
    UploadContext, UploadStrategy,
};

fn active(name: &str, code: u32, size: u32, loc: u32) -> ActiveUniform {
    ActiveUniform {
        name: name.to_owned(),
        type_code: code,
        size,
        location: UniformLocation(loc),
    }
}

/// Owns everything an [`UploadContext`] borrows.
struct Harness {
    driver: RecordingDriver,
    state: GpuState,
    textures: DirectTextureBinder,
    units: TextureUnits,
    scratch: ScratchPool,
}

impl Harness {
    fn new() -> Self {
        Self {
            driver: RecordingDriver::new(),
            state: GpuState::new(16),
            textures: DirectTextureBinder::new(),
            units: TextureUnits::new(16),
            scratch: ScratchPool::new(),
        }
    }

    fn ctx(&mut self) -> UploadContext<'_> {
        UploadContext {
            driver: &mut self.driver,
            state: &mut self.state,
            textures: &mut self.textures,
            units: &mut self.units,
            scratch: &mut self.scratch,
        }
    }

    fn float_uploads(&self) -> Vec<(u32, Vec<f32>)> {
        self.driver
            .calls()
            .iter()
            .filter_map(|c| match c {
                DriverCall::UniformF { location, data, .. } => Some((location.0, data.clone())),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// Name Parsing
// ============================================================================

#[test]
fn parse_struct_path() -> anyhow::Result<()> {
    let path = parse("spotLights[0].direction")?;
    assert_eq!(path.containers, vec![UniformId::from("spotLights"), UniformId::from(0)]);
    assert_eq!(path.leaf, UniformId::from("direction"));
    assert_eq!(path.strategy, UploadStrategy::Singular);
    Ok(())
}

#[test]
fn parse_singular() -> anyhow::Result<()> {
    let path = parse("foo")?;
    assert!(path.containers.is_empty());
    assert_eq!(path.leaf, UniformId::from("foo"));
    assert_eq!(path.strategy, UploadStrategy::Singular);
    Ok(())
}

#[test]
fn parse_pure_array() -> anyhow::Result<()> {
    let path = parse("bar[3]")?;
    assert!(path.containers.is_empty());
    assert_eq!(path.leaf, UniformId::from("bar"));
    assert_eq!(path.strategy, UploadStrategy::PureArray);
    Ok(())
}

#[test]
fn parse_array_inside_struct() -> anyhow::Result<()> {
    let path = parse("shadow[1].matrix[0]")?;
    assert_eq!(path.containers, vec![UniformId::from("shadow"), UniformId::from(1)]);
    assert_eq!(path.leaf, UniformId::from("matrix"));
    assert_eq!(path.strategy, UploadStrategy::PureArray);
    Ok(())
}

#[test]
fn parse_rejects_empty_identifier() {
    assert!(parse("").is_err());
    assert!(parse(".foo").is_err());
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn registry_builds_struct_tree() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("diffuse", type_code::FLOAT_VEC3, 1, 0),
        active("spotLights[0].direction", type_code::FLOAT_VEC3, 1, 1),
        active("spotLights[0].color", type_code::FLOAT_VEC3, 1, 2),
        active("spotLights[1].direction", type_code::FLOAT_VEC3, 1, 3),
        active("boneMatrices[0]", type_code::FLOAT_MAT4, 4, 4),
    ])?;

    let top: Vec<String> = registry
        .sequence()
        .iter()
        .filter_map(|i| registry.node(*i))
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(top, vec!["diffuse", "spotLights", "boneMatrices"]);

    let Some(lights) = registry.lookup("spotLights").and_then(|i| registry.node(i)) else {
        panic!("spotLights missing");
    };
    let NodeKind::Struct(lights) = &lights.kind else {
        panic!("spotLights is not a struct");
    };
    assert_eq!(lights.children().len(), 2);
    assert!(lights.child(&UniformId::Index(1)).is_some());
    assert!(lights.child(&UniformId::Index(2)).is_none());

    let Some(bones) = registry.lookup("boneMatrices").and_then(|i| registry.node(i)) else {
        panic!("boneMatrices missing");
    };
    let NodeKind::Leaf(leaf) = &bones.kind else {
        panic!("boneMatrices is not a leaf");
    };
    assert_eq!(leaf.size, 4);
    assert_eq!(leaf.strategy, UploadStrategy::PureArray);
    Ok(())
}

#[test]
fn seq_with_values_filters_and_keeps_order() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("a", type_code::FLOAT, 1, 0),
        active("b", type_code::FLOAT, 1, 1),
        active("c", type_code::FLOAT, 1, 2),
    ])?;
    let mut values = UniformValues::new();
    values.set("c", 3.0_f32);
    values.set("a", 1.0_f32);
    values.set("unused", 9.0_f32);

    let seq = registry.seq_with_values(&values);
    let names: Vec<String> = seq
        .iter()
        .filter_map(|i| registry.node(*i))
        .map(|n| n.id.to_string())
        .collect();
    assert_eq!(names, vec!["a", "c"]);
    Ok(())
}

// ============================================================================
// Uploads
// ============================================================================

#[test]
fn struct_upload_descends_by_member_and_index() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("spotLights[0].direction", type_code::FLOAT_VEC3, 1, 7),
        active("spotLights[1].direction", type_code::FLOAT_VEC3, 1, 8),
    ])?;

    let light = |d: Vec3| UniformValue::Struct(vec![("direction".into(), UniformValue::Vec3(d))]);
    let value = UniformValue::List(vec![light(Vec3::X), light(Vec3::Y)]);

    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "spotLights", &value);

    assert_eq!(
        h.float_uploads(),
        vec![(7, vec![1.0, 0.0, 0.0]), (8, vec![0.0, 1.0, 0.0])]
    );
    Ok(())
}

#[test]
fn missing_struct_member_is_skipped() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("spotLights[0].direction", type_code::FLOAT_VEC3, 1, 7),
        active("spotLights[1].direction", type_code::FLOAT_VEC3, 1, 8),
    ])?;
    let value = UniformValue::List(vec![UniformValue::Struct(vec![(
        "direction".into(),
        UniformValue::Vec3(Vec3::Z),
    )])]);

    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "spotLights", &value);
    assert_eq!(h.float_uploads(), vec![(7, vec![0.0, 0.0, 1.0])]);
    Ok(())
}

#[test]
fn pure_array_zero_fills_short_values() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[active("weights[0]", type_code::FLOAT, 4, 3)])?;
    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "weights", &UniformValue::Floats(vec![0.5, 0.25]));
    assert_eq!(h.float_uploads(), vec![(3, vec![0.5, 0.25, 0.0, 0.0])]);
    Ok(())
}

#[test]
fn float_slice_fills_matrix_block() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("boneMatrices[0]", type_code::FLOAT_MAT4, 3, 2),
        active("map", type_code::SAMPLER_2D, 1, 4),
    ])?;
    let bones = [Mat4::IDENTITY, Mat4::from_translation(Vec3::X)];

    let mut h = Harness::new();
    registry.set_floats(&mut h.ctx(), "boneMatrices", bytemuck::cast_slice(&bones));
    registry.set_floats(&mut h.ctx(), "map", &[1.0]);

    let mut expected: Vec<f32> = bones.iter().flat_map(|m| m.to_cols_array()).collect();
    expected.resize(48, 0.0);
    assert_eq!(
        h.driver.calls(),
        &[DriverCall::UniformF {
            kind: "matrix4fv",
            location: UniformLocation(2),
            data: expected,
        }]
    );
    Ok(())
}

#[test]
fn unknown_names_are_ignored() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[active("opacity", type_code::FLOAT, 1, 0)])?;
    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "notInProgram", &UniformValue::Float(1.0));
    assert!(h.driver.calls().is_empty());
    Ok(())
}

#[test]
fn needs_update_flag_controls_upload() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("always", type_code::FLOAT, 1, 0),
        active("dirty", type_code::FLOAT, 1, 1),
        active("clean", type_code::FLOAT, 1, 2),
    ])?;
    let mut values = UniformValues::new();
    values.insert("always", Uniform::new(1.0_f32));
    values.insert(
        "dirty",
        Uniform {
            value: UniformValue::Float(2.0),
            needs_update: Some(true),
        },
    );
    values.insert(
        "clean",
        Uniform {
            value: UniformValue::Float(3.0),
            needs_update: Some(false),
        },
    );

    let mut h = Harness::new();
    registry.upload(&mut h.ctx(), &values);
    assert_eq!(h.float_uploads(), vec![(0, vec![1.0]), (1, vec![2.0])]);
    Ok(())
}

// ============================================================================
// Samplers
// ============================================================================

#[test]
fn samplers_take_consecutive_units() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[
        active("map", type_code::SAMPLER_2D, 1, 0),
        active("envMap", type_code::SAMPLER_CUBE, 1, 1),
    ])?;
    let mut values = UniformValues::new();
    values.set("map", TextureRef::new(TextureId(40), TextureTarget::Texture2D));
    values.set("envMap", TextureRef::new(TextureId(41), TextureTarget::CubeMap));

    let mut h = Harness::new();
    registry.upload(&mut h.ctx(), &values);

    assert_eq!(h.units.used(), 2);
    assert!(h.driver.calls().contains(&DriverCall::UniformI {
        kind: "1i",
        location: UniformLocation(0),
        data: vec![0],
    }));
    assert!(h.driver.calls().contains(&DriverCall::UniformI {
        kind: "1i",
        location: UniformLocation(1),
        data: vec![1],
    }));
    assert_eq!(
        h.driver.bound_texture(0),
        Some((TextureTarget::Texture2D, Some(TextureId(40))))
    );
    assert_eq!(
        h.driver.bound_texture(1),
        Some((TextureTarget::CubeMap, Some(TextureId(41))))
    );
    Ok(())
}

#[test]
fn missing_texture_binds_placeholder_once() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[active("map", type_code::SAMPLER_2D, 1, 0)])?;
    let empty = UniformValue::Texture(None);

    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "map", &empty);
    h.units.reset();
    registry.set_value(&mut h.ctx(), "map", &empty);

    assert_eq!(h.driver.count(|c| matches!(c, DriverCall::CreateTexture(_))), 1);
    assert_eq!(
        h.driver.count(|c| matches!(c, DriverCall::TexImage2D { width: 1, height: 1, .. })),
        1
    );
    let Some((TextureTarget::Texture2D, Some(_))) = h.driver.bound_texture(0) else {
        panic!("no placeholder bound on unit 0");
    };
    Ok(())
}

#[test]
fn sampler_array_allocates_one_unit_per_element() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[active("shadowMap[0]", type_code::SAMPLER_2D, 3, 5)])?;
    let value = UniformValue::Textures(vec![
        Some(TextureRef::new(TextureId(10), TextureTarget::Texture2D)),
        Some(TextureRef::new(TextureId(11), TextureTarget::Texture2D)),
    ]);

    let mut h = Harness::new();
    registry.set_value(&mut h.ctx(), "shadowMap", &value);

    assert_eq!(h.units.used(), 3);
    assert!(h.driver.calls().contains(&DriverCall::UniformI {
        kind: "1iv",
        location: UniformLocation(5),
        data: vec![0, 1, 2],
    }));
    assert_eq!(
        h.driver.bound_texture(1),
        Some((TextureTarget::Texture2D, Some(TextureId(11))))
    );
    Ok(())
}

#[test]
fn large_sampler_array_gets_every_unit() -> anyhow::Result<()> {
    let registry = UniformRegistry::from_active(&[active("maps[0]", type_code::SAMPLER_2D, 40, 1)])?;
    let value = UniformValue::Textures(vec![Some(TextureRef::new(TextureId(3), TextureTarget::Texture2D))]);

    let mut h = Harness::new();
    h.state = GpuState::new(64);
    h.units = TextureUnits::new(64);
    registry.set_value(&mut h.ctx(), "maps", &value);

    assert_eq!(h.units.used(), 40);
    assert!(h.driver.calls().contains(&DriverCall::UniformI {
        kind: "1iv",
        location: UniformLocation(1),
        data: (0..40).collect(),
    }));
    assert_eq!(
        h.driver.bound_texture(0),
        Some((TextureTarget::Texture2D, Some(TextureId(3))))
    );
    Ok(())
}
