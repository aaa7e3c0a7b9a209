//! Renderer
//!
//! [`Renderer`] drives one [`GlDriver`] through the frame loop:
//!
//! 1. **Setup**: lights are folded into view space, global clip planes are
//!    projected, the frame environment (light counts, fog, tone mapping) is
//!    fingerprinted.
//! 2. **Project**: every visible object (or every group of a multi-material
//!    object) resolves its program and becomes a [`RenderItem`].
//! 3. **Sort**: opaque items by state, transparent items back to front.
//! 4. **Draw**: per item, in this order: material state → program bind →
//!    uniforms → attribute enables → stale attribute disables → draw call.
//!
//! A draw whose program failed to compile or link is skipped before any state
//! is touched, so driver state stays as the last successful draw left it.
//!
//! # Uniform refresh
//!
//! | Uniforms                                   | Uploaded when                         |
//! |--------------------------------------------|---------------------------------------|
//! | `projectionMatrix`, `viewMatrix`, …        | program or camera changed             |
//! | material, lights, fog, `clippingPlanes`    | program, material or camera changed   |
//! | `modelMatrix`, `modelViewMatrix`, bones, … | every draw                            |

use bytemuck::cast_slice;
use glam::Vec4;
use log::{debug, trace};

use crate::clipping::normal_matrix;
use crate::context::RenderContext;
use crate::driver::{BufferTarget, DriverCapabilities, GlDriver, Rect};
use crate::errors::Result;
use crate::info::RenderInfo;
use crate::pipeline::{FrameEnvironment, Program, ProgramCache, ProgramHandle, ProgramParameters};
use crate::properties::{ProgramFingerprint, ProgramSlot};
use crate::render_list::RenderItem;
use crate::resources::{
    Camera, Fog, Geometry, GeometryGroup, Material, MaterialId, ObjectKind, RenderObject, Scene, TextureBinder,
    VertexAttribute,
};
use crate::settings::RendererSettings;
use crate::state::GpuState;
use crate::uniforms::{UniformValue, UniformValues, UploadContext};

/// Bindings made by earlier draws of the current frame.
#[derive(Debug, Clone, Copy, Default)]
struct DrawBindings {
    material: Option<MaterialId>,
    camera: Option<u64>,
}

/// Inputs fixed for the duration of one frame.
#[derive(Debug, Clone, Copy)]
struct FrameInputs {
    env: FrameEnvironment,
    env_hash: u64,
    frame: u64,
    clipping_enabled: bool,
}

pub struct Renderer<D: GlDriver> {
    driver: D,
    context: RenderContext,
    settings: RendererSettings,
    info: RenderInfo,
    bindings: DrawBindings,
}

impl<D: GlDriver> std::fmt::Debug for Renderer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("context", &self.context)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl<D: GlDriver> Renderer<D> {
    /// Creates a renderer and applies the context defaults to `driver`.
    pub fn new(driver: D, capabilities: DriverCapabilities, settings: RendererSettings) -> Result<Self> {
        let context = RenderContext::new(capabilities)?;
        Ok(Self::with_context(driver, context, settings))
    }

    /// Creates a renderer whose sampler uniforms bind through `textures`.
    pub fn with_texture_binder(
        driver: D,
        capabilities: DriverCapabilities,
        settings: RendererSettings,
        textures: Box<dyn TextureBinder>,
    ) -> Result<Self> {
        let context = RenderContext::with_texture_binder(capabilities, textures)?;
        Ok(Self::with_context(driver, context, settings))
    }

    fn with_context(driver: D, context: RenderContext, settings: RendererSettings) -> Self {
        let mut renderer = Self {
            driver,
            context,
            settings,
            info: RenderInfo::default(),
            bindings: DrawBindings::default(),
        };
        renderer.apply_defaults();
        renderer
    }

    fn apply_defaults(&mut self) {
        let state = &mut self.context.state;
        state.init_defaults(&mut self.driver);
        state.color.set_clear(&mut self.driver, self.settings.clear_color, false);
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.driver
    }

    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &RenderContext {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Settings take effect on the next [`Self::render`]; changes that alter
    /// generated source select new programs then.
    #[inline]
    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    /// Statistics of the last frame.
    #[inline]
    #[must_use]
    pub fn info(&self) -> &RenderInfo {
        &self.info
    }

    /// Program most recently resolved for `material`, if any. A material
    /// shared by objects of different variants holds one program per variant.
    #[must_use]
    pub fn program_for(&self, material: &Material) -> Option<&Program> {
        let handle = self.context.properties.get(material.id())?.program()?;
        self.context.programs.get(handle)
    }

    /// Number of programs `material` currently holds, one per object variant.
    #[must_use]
    pub fn program_count_for(&self, material: &Material) -> usize {
        self.context
            .properties
            .get(material.id())
            .map_or(0, |state| state.programs.len())
    }

    // ─── Framebuffer ─────────────────────────────────────────────────────────

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.settings.clear_color = color;
        self.context.state.color.set_clear(&mut self.driver, color, false);
    }

    pub fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        self.driver.clear(color, depth, stencil);
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.context.state.viewport(&mut self.driver, rect);
    }

    pub fn set_scissor(&mut self, rect: Rect) {
        self.context.state.scissor(&mut self.driver, rect);
    }

    pub fn set_scissor_test(&mut self, on: bool) {
        self.context.state.set_scissor_test(&mut self.driver, on);
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Releases every program of `material` and drops its property bag.
    pub fn dispose_material(&mut self, material: MaterialId) -> Result<()> {
        let Some(state) = self.context.properties.remove(material) else {
            return Ok(());
        };
        if self.bindings.material == Some(material) {
            self.bindings.material = None;
        }
        for handle in state.handles() {
            release_program(
                &mut self.driver,
                &mut self.context.programs,
                &mut self.context.state,
                handle,
            )?;
        }
        Ok(())
    }

    /// The driver context is gone: every cached binding, program and
    /// placeholder texture is forgotten without driver calls.
    pub fn context_lost(&mut self) {
        debug!("Rendering context lost");
        self.context.reset();
        self.bindings = DrawBindings::default();
    }

    /// The driver context is back: state defaults are applied again. Programs
    /// are rebuilt lazily by the next frame.
    pub fn context_restored(&mut self) {
        debug!("Rendering context restored");
        self.apply_defaults();
    }

    // ─── Frame ───────────────────────────────────────────────────────────────

    /// Renders `scene` from `camera`.
    ///
    /// Only template or registry errors (a broken chunk library, an
    /// unsupported uniform type) are returned; programs that fail to compile
    /// or link skip their draws and are reported in [`RenderInfo::skipped`].
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<()> {
        self.info.begin_frame();
        self.bindings = DrawBindings::default();

        let settings = &self.settings;
        let context = &mut self.context;
        context
            .lights
            .setup(&scene.lights, &camera.view_matrix, settings.physically_correct_lights);
        let env = FrameEnvironment::new(settings, context.lights.counts(), scene.fog.as_ref());
        let clipping_enabled = context
            .clipping
            .init(&settings.clipping_planes, settings.local_clipping_enabled, camera);

        let frame = FrameInputs {
            env,
            env_hash: env.hash(),
            frame: self.info.frame,
            clipping_enabled,
        };

        self.project(scene, camera, &frame)?;
        if self.settings.sort_objects {
            self.context.render_list.sort();
        }
        if self.settings.auto_clear {
            self.clear(true, true, true);
        }

        let list = std::mem::take(&mut self.context.render_list);
        let result = list
            .iter()
            .try_for_each(|item| self.draw_item(scene, camera, &frame, item));
        self.context.render_list = list;
        result?;

        self.info.programs = self.context.programs.len() as u32;
        trace!(
            "Frame {}: {} calls, {} skipped",
            self.info.frame, self.info.calls, self.info.skipped
        );
        Ok(())
    }

    fn project(&mut self, scene: &Scene, camera: &Camera, frame: &FrameInputs) -> Result<()> {
        let view_projection = camera.projection_matrix * camera.view_matrix;
        self.context.render_list.init();

        for (index, object) in scene.objects.iter().enumerate() {
            if !object.visible {
                continue;
            }
            let z = view_projection.project_point3(object.world_position()).z;

            if object.materials.len() > 1 {
                for group in &object.geometry.groups {
                    if object.materials.get(group.material_index).is_some_and(|m| m.visible) {
                        self.push_item(index, object, group.material_index, z, Some(*group), frame)?;
                    }
                }
            } else if object.materials.first().is_some_and(|m| m.visible) {
                self.push_item(index, object, 0, z, None, frame)?;
            }
        }
        Ok(())
    }

    fn push_item(
        &mut self,
        index: usize,
        object: &RenderObject,
        slot: usize,
        z: f32,
        group: Option<GeometryGroup>,
        frame: &FrameInputs,
    ) -> Result<()> {
        let material = &object.materials[slot];
        let handle = self.resolve_program(object, material, frame)?;
        let program = self.context.programs.get(handle).map_or(u32::MAX, Program::serial);

        self.context.render_list.push(RenderItem {
            object: index,
            object_id: object.id(),
            material_slot: slot,
            material_id: material.id(),
            program,
            render_order: object.render_order,
            z,
            group,
            transparent: material.transparent,
        });
        Ok(())
    }

    /// Program serving `material` on `object` this frame. Each object variant
    /// of the material has its own slot; the cache key is only rebuilt when
    /// the fingerprint of that slot moved, and the superseded program is
    /// released after the new one is acquired.
    fn resolve_program(
        &mut self,
        object: &RenderObject,
        material: &Material,
        frame: &FrameInputs,
    ) -> Result<ProgramHandle> {
        let context = &mut self.context;
        let clipping = context.clipping.plane_counts(material);
        let fingerprint = ProgramFingerprint::new(material, object, frame.env_hash, clipping);

        let variant = fingerprint.object_variant;
        let state = context.properties.entry(material.id());
        if let Some(handle) = state.program_matching(&fingerprint) {
            state.current = Some(variant);
            return Ok(handle);
        }

        let params = ProgramParameters::new(material, object, &frame.env, clipping, &context.capabilities);
        let handle = context.programs.acquire(
            &mut self.driver,
            &mut context.chunks,
            &params,
            self.settings.check_shader_errors,
        )?;

        state.current = Some(variant);
        if let Some(previous) = state.programs.insert(variant, ProgramSlot::new(fingerprint, handle)) {
            release_program(&mut self.driver, &mut context.programs, &mut context.state, previous.handle)?;
        }
        Ok(handle)
    }

    fn draw_item(&mut self, scene: &Scene, camera: &Camera, frame: &FrameInputs, item: &RenderItem) -> Result<()> {
        let Some(object) = scene.objects.get(item.object) else {
            return Ok(());
        };
        let Some(material) = object.materials.get(item.material_slot) else {
            return Ok(());
        };
        let geometry = &object.geometry;
        let Some((start, count)) = draw_range(geometry, item.group.as_ref()) else {
            return Ok(());
        };
        let instances = geometry.instance_count.unwrap_or(1);
        if instances == 0 {
            return Ok(());
        }

        let handle = self.resolve_program(object, material, frame)?;

        let Self {
            driver,
            context,
            settings,
            info,
            bindings,
        } = self;
        let RenderContext {
            state,
            programs,
            properties,
            clipping,
            lights,
            units,
            scratch,
            textures,
            ..
        } = context;
        let driver: &mut dyn GlDriver = driver;

        let Some(program) = programs.get(handle) else {
            return Ok(());
        };
        if !program.is_runnable() {
            debug!(
                "Skipping draw of object {:?}: program '{}' is not runnable",
                object.id(),
                program.name()
            );
            info.skipped += 1;
            return Ok(());
        }

        // ── Material state ──
        let mirrored = object.kind == ObjectKind::Mesh && object.world_matrix.determinant() < 0.0;
        state.set_material(driver, material, settings.front_face_cw != mirrored);
        if object.kind.is_line() {
            state.set_line_width(driver, material.line_width);
        }

        let material_state = properties.entry(material.id());
        if frame.clipping_enabled && (settings.local_clipping_enabled || bindings.camera != Some(camera.id())) {
            let stamp = (frame.frame, material.version());
            let from_cache = material_state.clipping_stamp == Some(stamp);
            clipping.set_state(material, camera, &mut material_state.clipping_cache, from_cache);
            material_state.clipping_stamp = Some(stamp);
        }

        // ── Program ──
        units.reset();
        let mut refresh_material = bindings.material != Some(material.id());
        let refresh_program = state.use_program(driver, program.id());
        if refresh_program {
            refresh_material = true;
        }

        let registry = program.uniforms();
        let mut upload = UploadContext {
            driver: &mut *driver,
            state: &mut *state,
            textures: textures.as_mut(),
            units: &mut *units,
            scratch: &mut *scratch,
        };

        // ── Camera uniforms ──
        if refresh_program || bindings.camera != Some(camera.id()) {
            registry.set_value(&mut upload, "projectionMatrix", &UniformValue::Mat4(camera.projection_matrix));
            if settings.logarithmic_depth_buffer {
                let fc = 2.0 / (camera.far + 1.0).log2();
                registry.set_value(&mut upload, "logDepthBufFC", &UniformValue::Float(fc));
            }
            registry.set_value(&mut upload, "viewMatrix", &UniformValue::Mat4(camera.view_matrix));
            registry.set_value(&mut upload, "cameraPosition", &UniformValue::Vec3(camera.position));

            if bindings.camera != Some(camera.id()) {
                bindings.camera = Some(camera.id());
                refresh_material = true;
            }
        }

        // ── Skinning ──
        if material.skinning
            && let Some(skeleton) = &object.skeleton
        {
            registry.set_value(&mut upload, "bindMatrix", &UniformValue::Mat4(skeleton.bind_matrix));
            registry.set_value(
                &mut upload,
                "bindMatrixInverse",
                &UniformValue::Mat4(skeleton.bind_matrix_inverse),
            );
            registry.set_floats(&mut upload, "boneMatrices", cast_slice(&skeleton.bone_matrices));
        }

        // ── Material uniforms ──
        if refresh_material {
            let values = &mut material_state.uniforms;
            material.write_uniforms(values);
            if material.kind.is_lit() {
                lights.write_uniforms(values);
            }
            if material.fog
                && let Some(fog) = &scene.fog
            {
                write_fog(values, fog);
            }
            values.set("toneMappingExposure", settings.tone_mapping_exposure);
            values.set("toneMappingWhitePoint", settings.tone_mapping_white_point);
            if frame.clipping_enabled {
                clipping.write_uniform(values);
            }

            let len = material_state.uniforms.len();
            if let Some(slot) = material_state.programs.values_mut().find(|slot| slot.handle == handle) {
                if slot.sequence_is_stale(len) {
                    slot.sequence = registry.seq_with_values(&material_state.uniforms);
                    slot.sequence_len = Some(len);
                }
                registry.upload_sequence(&mut upload, &slot.sequence, &material_state.uniforms);
            }
            bindings.material = Some(material.id());
        }

        // ── Object uniforms ──
        let model_view = camera.view_matrix * object.world_matrix;
        registry.set_value(&mut upload, "modelMatrix", &UniformValue::Mat4(object.world_matrix));
        registry.set_value(&mut upload, "modelViewMatrix", &UniformValue::Mat4(model_view));
        registry.set_value(&mut upload, "normalMatrix", &UniformValue::Mat3(normal_matrix(&model_view)));

        if material.morph_targets && !geometry.morph_positions.is_empty() {
            // The leaf is sized 8 (4 with morph normals); missing weights upload as 0.
            registry.set_floats(&mut upload, "morphTargetInfluences", &object.morph_influences);
        }

        // ── Attributes ──
        state.attributes.init();
        for (name, location) in program.attributes() {
            let Some(attribute) = geometry_attribute(geometry, name) else {
                continue;
            };
            driver.bind_buffer(BufferTarget::Array, Some(attribute.buffer));
            state.attributes.enable_with_divisor(driver, location, attribute.divisor);
            driver.vertex_attrib_pointer(location, &attribute.layout());
        }
        state.attributes.disable_unused(driver);

        // ── Draw ──
        let mode = object.kind.draw_mode();
        match &geometry.index {
            Some(index) => {
                driver.bind_buffer(BufferTarget::ElementArray, Some(index.buffer));
                let offset = u64::from(start) * index.bytes_per_index();
                driver.draw_elements(mode, count, index.format, offset, instances);
            }
            None => driver.draw_arrays(mode, start, count, instances),
        }
        info.record_draw(mode, count, instances);
        Ok(())
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

/// Drops one reference to `handle`; forgets the driver binding when the
/// program was destroyed.
fn release_program(
    driver: &mut dyn GlDriver,
    programs: &mut ProgramCache,
    state: &mut GpuState,
    handle: ProgramHandle,
) -> Result<()> {
    let id = programs.get(handle).map(Program::id);
    programs.release(driver, handle)?;
    if programs.get(handle).is_none()
        && let Some(id) = id
    {
        state.forget_program(id);
    }
    Ok(())
}

/// `(start, count)` of a draw: the geometry draw range, clipped to the
/// element count and intersected with `group`. `None` when empty.
fn draw_range(geometry: &Geometry, group: Option<&GeometryGroup>) -> Option<(u32, u32)> {
    let total = geometry.element_count();
    let range = geometry.draw_range;

    let mut start = range.start;
    let mut end = range.count.map_or(total, |c| range.start.saturating_add(c)).min(total);
    if let Some(group) = group {
        start = start.max(group.start);
        end = end.min(group.start.saturating_add(group.count));
    }
    if end > start { Some((start, end - start)) } else { None }
}

/// Geometry stream feeding the program attribute `name`. Morph attributes
/// (`morphTarget0`, `morphNormal0`, …) map onto the geometry's morph streams.
fn geometry_attribute<'a>(geometry: &'a Geometry, name: &str) -> Option<&'a VertexAttribute> {
    if let Some(i) = name.strip_prefix("morphTarget").and_then(|i| i.parse::<usize>().ok()) {
        return geometry.morph_positions.get(i);
    }
    if let Some(i) = name.strip_prefix("morphNormal").and_then(|i| i.parse::<usize>().ok()) {
        return geometry.morph_normals.get(i);
    }
    geometry.attribute(name)
}

fn write_fog(values: &mut UniformValues, fog: &Fog) {
    values.set("fogColor", fog.color());
    match *fog {
        Fog::Linear { near, far, .. } => {
            values.set("fogNear", near);
            values.set("fogFar", far);
        }
        Fog::Exp2 { density, .. } => values.set("fogDensity", density),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::BufferId;
    use crate::resources::{DrawRange, IndexBuffer};

    fn triangles(count: u32) -> Geometry {
        Geometry::new().with_attribute("position", VertexAttribute::floats(BufferId(1), 3, count))
    }

    #[test]
    fn test_draw_range_intersects_group() {
        let mut geometry = triangles(30);
        assert_eq!(draw_range(&geometry, None), Some((0, 30)));

        geometry.draw_range = DrawRange {
            start: 6,
            count: Some(100),
        };
        assert_eq!(draw_range(&geometry, None), Some((6, 24)));

        let group = GeometryGroup {
            start: 0,
            count: 9,
            material_index: 0,
        };
        assert_eq!(draw_range(&geometry, Some(&group)), Some((6, 3)));

        let outside = GeometryGroup {
            start: 0,
            count: 3,
            material_index: 0,
        };
        assert_eq!(draw_range(&geometry, Some(&outside)), None);
    }

    #[test]
    fn test_indexed_range_uses_index_count() {
        let geometry = triangles(4).with_index(IndexBuffer {
            buffer: BufferId(2),
            format: wgpu::IndexFormat::Uint16,
            count: 6,
        });
        assert_eq!(draw_range(&geometry, None), Some((0, 6)));
    }

    #[test]
    fn test_morph_attributes_map_to_streams() {
        let mut geometry = triangles(3);
        geometry.morph_positions.push(VertexAttribute::floats(BufferId(7), 3, 3));
        assert_eq!(geometry_attribute(&geometry, "morphTarget0").map(|a| a.buffer), Some(BufferId(7)));
        assert!(geometry_attribute(&geometry, "morphTarget1").is_none());
        assert!(geometry_attribute(&geometry, "morphNormal0").is_none());
        assert_eq!(geometry_attribute(&geometry, "position").map(|a| a.buffer), Some(BufferId(1)));
    }

    #[test]
    fn test_fog_uniforms() {
        let mut values = UniformValues::new();
        write_fog(
            &mut values,
            &Fog::Exp2 {
                color: glam::Vec3::ONE,
                density: 0.25,
            },
        );
        assert!(values.contains("fogColor"));
        assert_eq!(values.get("fogDensity").map(|u| &u.value), Some(&UniformValue::Float(0.25)));
        assert!(!values.contains("fogNear"));
    }
}
