//! Scene lights and their view-space uniform form.
//!
//! [`SceneLights`] is what the caller fills in (world space). Once per frame
//! and camera, [`LightsState::setup`] folds it into view-space uniform
//! structs. Light *counts* are part of the program key and drive the
//! unrolled per-light loops in the templates; light *values* are plain
//! uniform data.

use std::borrow::Cow;

use glam::{Mat4, Vec3};

use crate::uniforms::{UniformValue, UniformValues};

// ─── Scene-side lights ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Directional light shining from `position` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    /// Cut-off distance; 0 means unlimited.
    pub distance: f32,
    pub decay: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub distance: f32,
    /// Half-angle of the cone, radians.
    pub angle: f32,
    /// Fraction of the cone that is attenuated, `0..=1`.
    pub penumbra: f32,
    pub decay: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: Vec3,
    pub ground_color: Vec3,
    pub intensity: f32,
    /// World-space direction towards the sky.
    pub direction: Vec3,
}

/// All lights of a scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLights {
    pub ambient: Vec<AmbientLight>,
    pub directional: Vec<DirectionalLight>,
    pub point: Vec<PointLight>,
    pub spot: Vec<SpotLight>,
    pub hemisphere: Vec<HemisphereLight>,
}

impl SceneLights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn counts(&self) -> LightCounts {
        LightCounts {
            directional: self.directional.len() as u32,
            point: self.point.len() as u32,
            spot: self.spot.len() as u32,
            hemisphere: self.hemisphere.len() as u32,
        }
    }
}

/// Per-kind light counts, as seen by the program key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LightCounts {
    pub directional: u32,
    pub point: u32,
    pub spot: u32,
    pub hemisphere: u32,
}

// ─── LightsState ──────────────────────────────────────────────────────────────

/// Lights folded into view space for one frame.
#[derive(Debug, Clone, Default)]
pub struct LightsState {
    counts: LightCounts,
    ambient: Vec3,
    directional: Vec<UniformValue>,
    point: Vec<UniformValue>,
    spot: Vec<UniformValue>,
    hemisphere: Vec<UniformValue>,
}

fn member(name: &'static str, value: impl Into<UniformValue>) -> (Cow<'static, str>, UniformValue) {
    (Cow::Borrowed(name), value.into())
}

impl LightsState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the view-space light uniforms for `view_matrix`.
    pub fn setup(&mut self, lights: &SceneLights, view_matrix: &Mat4, physically_correct: bool) {
        let direction = |v: Vec3| view_matrix.transform_vector3(v).normalize_or_zero();
        let point = |p: Vec3| view_matrix.transform_point3(p);
        let decay = |d: f32| if physically_correct { d } else { 1.0 };

        self.counts = lights.counts();
        self.ambient = lights.ambient.iter().map(|a| a.color * a.intensity).sum();

        self.directional.clear();
        self.directional.extend(lights.directional.iter().map(|l| {
            UniformValue::Struct(vec![
                member("direction", direction(l.position - l.target)),
                member("color", l.color * l.intensity),
            ])
        }));

        self.point.clear();
        self.point.extend(lights.point.iter().map(|l| {
            UniformValue::Struct(vec![
                member("position", point(l.position)),
                member("color", l.color * l.intensity),
                member("distance", l.distance),
                member("decay", decay(l.decay)),
            ])
        }));

        self.spot.clear();
        self.spot.extend(lights.spot.iter().map(|l| {
            UniformValue::Struct(vec![
                member("position", point(l.position)),
                member("direction", direction(l.position - l.target)),
                member("color", l.color * l.intensity),
                member("distance", l.distance),
                member("decay", decay(l.decay)),
                member("coneCos", l.angle.cos()),
                member("penumbraCos", (l.angle * (1.0 - l.penumbra)).cos()),
            ])
        }));

        self.hemisphere.clear();
        self.hemisphere.extend(lights.hemisphere.iter().map(|l| {
            UniformValue::Struct(vec![
                member("direction", direction(l.direction)),
                member("skyColor", l.sky_color * l.intensity),
                member("groundColor", l.ground_color * l.intensity),
            ])
        }));
    }

    #[inline]
    #[must_use]
    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    #[inline]
    #[must_use]
    pub fn ambient(&self) -> Vec3 {
        self.ambient
    }

    /// Writes the light uniforms of a lit material.
    pub fn write_uniforms(&self, out: &mut UniformValues) {
        out.set("ambientLightColor", self.ambient);
        out.set("directionalLights", UniformValue::List(self.directional.clone()));
        out.set("pointLights", UniformValue::List(self.point.clone()));
        out.set("spotLights", UniformValue::List(self.spot.clone()));
        out.set("hemisphereLights", UniformValue::List(self.hemisphere.clone()));
    }
}
