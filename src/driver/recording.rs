//! Recording Driver
//!
//! A headless [`GlDriver`] that records every call and simulates the parts of
//! driver-side state the binder relies on: enabled capabilities, enabled
//! vertex attribute arrays, the bound program and per-unit texture bindings.
//!
//! Shader "compilation" runs the GLSL source through a small preprocessor and
//! reflects `uniform` / `attribute` declarations, so programs built on top of
//! it report active uniforms exactly like a real context would
//! (`pointLights[0].color`, `boneMatrices[0]`, ...).
//!
//! ```rust,ignore
//! let mut driver = RecordingDriver::new();
//! state.enable(&mut driver, Capability::DepthTest);
//! assert_eq!(driver.count(|c| matches!(c, DriverCall::Enable(_))), 1);
//! ```

use std::collections::BTreeSet;

use glam::Vec4;
use rustc_hash::{FxHashMap, FxHashSet};
use wgpu::{BlendFactor, BlendOperation, CompareFunction, FrontFace, IndexFormat, StencilOperation};

use super::reflect::{Declarations, Preprocessed, preprocess};
use super::{
    ActiveAttribute, ActiveUniform, AttributeLayout, BufferId, BufferTarget, Capability, CullFace,
    DrawMode, GlDriver, ProgramId, Rect, ShaderId, ShaderStage, TextureId, TextureTarget,
    UniformLocation,
};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Enable(Capability),
    Disable(Capability),
    BlendEquation(BlendOperation, BlendOperation),
    BlendFunc(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    ColorMask(bool),
    DepthMask(bool),
    DepthFunc(CompareFunction),
    StencilMask(u32),
    StencilFunc(CompareFunction, i32, u32),
    StencilOp(StencilOperation, StencilOperation, StencilOperation),
    ClearColor(Vec4),
    ClearDepth(f32),
    ClearStencil(i32),
    Clear { color: bool, depth: bool, stencil: bool },
    CullFace(CullFace),
    FrontFace(FrontFace),
    LineWidth(f32),
    PolygonOffset(f32, f32),
    Scissor(Rect),
    Viewport(Rect),
    ActiveTexture(u32),
    BindTexture(TextureTarget, Option<TextureId>),
    CreateTexture(TextureId),
    TexImage2D { target: TextureTarget, face: u32, width: u32, height: u32 },
    BindBuffer(BufferTarget, Option<BufferId>),
    EnableAttribArray(u32),
    DisableAttribArray(u32),
    AttribDivisor(u32, u32),
    AttribPointer(u32, AttributeLayout),
    CreateShader(ShaderStage, ShaderId),
    ShaderSource(ShaderId),
    CompileShader(ShaderId),
    DeleteShader(ShaderId),
    CreateProgram(ProgramId),
    AttachShader(ProgramId, ShaderId),
    BindAttribLocation(ProgramId, u32, String),
    LinkProgram(ProgramId),
    DeleteProgram(ProgramId),
    UseProgram(Option<ProgramId>),
    /// Float upload; `kind` is the call suffix (`"1f"`, `"3fv"`, `"matrix4fv"`, ...).
    UniformF { kind: &'static str, location: UniformLocation, data: Vec<f32> },
    /// Integer upload; `kind` is the call suffix (`"1i"`, `"2iv"`, ...).
    UniformI { kind: &'static str, location: UniformLocation, data: Vec<i32> },
    DrawArrays { mode: DrawMode, first: u32, count: u32, instances: u32 },
    DrawElements { mode: DrawMode, count: u32, format: IndexFormat, offset: u64, instances: u32 },
}

#[derive(Debug)]
struct ShaderRecord {
    stage: ShaderStage,
    source: String,
    compiled: Option<Declarations>,
    log: String,
}

#[derive(Debug, Default)]
struct ProgramRecord {
    shaders: Vec<ShaderId>,
    attrib_bindings: Vec<(u32, String)>,
    linked: bool,
    log: String,
    uniforms: Vec<ActiveUniform>,
    attributes: Vec<ActiveAttribute>,
    sources: Vec<(ShaderStage, String)>,
}

/// Headless driver that records calls and simulates driver state.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Vec<DriverCall>,
    next_handle: u32,
    enabled: FxHashSet<Capability>,
    attributes: BTreeSet<u32>,
    program: Option<ProgramId>,
    active_unit: u32,
    textures: FxHashMap<u32, (TextureTarget, Option<TextureId>)>,
    shaders: FxHashMap<ShaderId, ShaderRecord>,
    programs: FxHashMap<ProgramId, ProgramRecord>,
    fail_link: bool,
}

impl RecordingDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Inspection ──────────────────────────────────────────────────────────

    /// Every call recorded since construction or the last [`Self::clear_calls`].
    #[must_use]
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Attribute locations currently enabled on the simulated context.
    #[must_use]
    pub fn enabled_attributes(&self) -> Vec<u32> {
        self.attributes.iter().copied().collect()
    }

    #[must_use]
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    #[must_use]
    pub fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    #[must_use]
    pub fn bound_texture(&self, unit: u32) -> Option<(TextureTarget, Option<TextureId>)> {
        self.textures.get(&unit).copied()
    }

    /// Number of programs created and not yet deleted.
    #[must_use]
    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    /// Source handed to the driver for one stage of a linked program.
    #[must_use]
    pub fn program_source(&self, program: ProgramId, stage: ShaderStage) -> Option<&str> {
        self.programs
            .get(&program)?
            .sources
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, src)| src.as_str())
    }

    /// Forces every subsequent link to fail.
    pub fn set_link_failure(&mut self, fail: bool) {
        self.fail_link = fail;
    }

    fn next(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn link(&mut self, program: ProgramId) {
        let fail_link = self.fail_link;
        let Some(record) = self.programs.get(&program) else {
            return;
        };

        let stages: Vec<&ShaderRecord> = record.shaders.iter().filter_map(|s| self.shaders.get(s)).collect();
        let sources: Vec<(ShaderStage, String)> = stages.iter().map(|s| (s.stage, s.source.clone())).collect();
        let vertex = stages.iter().find(|s| s.stage == ShaderStage::Vertex);
        let fragment = stages.iter().find(|s| s.stage == ShaderStage::Fragment);

        let outcome = match (vertex, fragment) {
            _ if fail_link => Err("error: linking forced to fail".to_owned()),
            (Some(v), Some(f)) => match (&v.compiled, &f.compiled) {
                (Some(vd), Some(fd)) => reflect_program(vd, fd, &record.attrib_bindings),
                _ => Err("error: attached shader is not compiled".to_owned()),
            },
            _ => Err("error: missing shader stage".to_owned()),
        };

        let Some(record) = self.programs.get_mut(&program) else {
            return;
        };
        record.sources = sources;
        match outcome {
            Ok((uniforms, attributes)) => {
                record.linked = true;
                record.log.clear();
                record.uniforms = uniforms;
                record.attributes = attributes;
            }
            Err(log) => {
                record.linked = false;
                record.log = log;
                record.uniforms.clear();
                record.attributes.clear();
            }
        }
    }

    fn uniform_f(&mut self, kind: &'static str, location: UniformLocation, data: &[f32]) {
        self.calls.push(DriverCall::UniformF {
            kind,
            location,
            data: data.to_vec(),
        });
    }

    fn uniform_i(&mut self, kind: &'static str, location: UniformLocation, data: &[i32]) {
        self.calls.push(DriverCall::UniformI {
            kind,
            location,
            data: data.to_vec(),
        });
    }
}

type Reflected = (Vec<ActiveUniform>, Vec<ActiveAttribute>);

fn reflect_program(
    vertex: &Declarations,
    fragment: &Declarations,
    bindings: &[(u32, String)],
) -> Result<Reflected, String> {
    let mut uniforms = Vec::new();
    let mut seen = FxHashSet::default();
    let vertex_uniforms = vertex.active_uniforms(&[fragment])?;
    let fragment_uniforms = fragment.active_uniforms(&[vertex])?;

    for (name, type_code, size) in vertex_uniforms.into_iter().chain(fragment_uniforms) {
        if seen.insert(name.clone()) {
            let location = UniformLocation(uniforms.len() as u32);
            uniforms.push(ActiveUniform {
                name,
                type_code,
                size,
                location,
            });
        }
    }

    let mut taken: BTreeSet<u32> = BTreeSet::new();
    let mut attributes = Vec::new();
    let mut unbound = Vec::new();
    for (name, type_code) in vertex.active_attributes()? {
        match bindings.iter().find(|(_, n)| *n == name) {
            Some((location, _)) => {
                taken.insert(*location);
                attributes.push(ActiveAttribute {
                    name,
                    type_code,
                    location: *location,
                });
            }
            None => unbound.push((name, type_code)),
        }
    }
    let mut next = 0;
    for (name, type_code) in unbound {
        while taken.contains(&next) {
            next += 1;
        }
        taken.insert(next);
        attributes.push(ActiveAttribute {
            name,
            type_code,
            location: next,
        });
    }
    attributes.sort_by_key(|a| a.location);

    Ok((uniforms, attributes))
}

fn compile(source: &str) -> Result<Declarations, String> {
    let pre: Preprocessed = preprocess(source)?;
    Declarations::parse(&pre)
}

impl GlDriver for RecordingDriver {
    fn enable(&mut self, capability: Capability) {
        self.enabled.insert(capability);
        self.calls.push(DriverCall::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.enabled.remove(&capability);
        self.calls.push(DriverCall::Disable(capability));
    }

    fn blend_equation_separate(&mut self, color: BlendOperation, alpha: BlendOperation) {
        self.calls.push(DriverCall::BlendEquation(color, alpha));
    }

    fn blend_func_separate(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.calls
            .push(DriverCall::BlendFunc(src_color, dst_color, src_alpha, dst_alpha));
    }

    fn color_mask(&mut self, write: bool) {
        self.calls.push(DriverCall::ColorMask(write));
    }

    fn depth_mask(&mut self, write: bool) {
        self.calls.push(DriverCall::DepthMask(write));
    }

    fn depth_func(&mut self, func: CompareFunction) {
        self.calls.push(DriverCall::DepthFunc(func));
    }

    fn stencil_mask(&mut self, mask: u32) {
        self.calls.push(DriverCall::StencilMask(mask));
    }

    fn stencil_func(&mut self, func: CompareFunction, reference: i32, mask: u32) {
        self.calls.push(DriverCall::StencilFunc(func, reference, mask));
    }

    fn stencil_op(&mut self, fail: StencilOperation, depth_fail: StencilOperation, pass: StencilOperation) {
        self.calls.push(DriverCall::StencilOp(fail, depth_fail, pass));
    }

    fn clear_color(&mut self, color: Vec4) {
        self.calls.push(DriverCall::ClearColor(color));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.calls.push(DriverCall::ClearDepth(depth));
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.calls.push(DriverCall::ClearStencil(stencil));
    }

    fn clear(&mut self, color: bool, depth: bool, stencil: bool) {
        self.calls.push(DriverCall::Clear {
            color,
            depth,
            stencil,
        });
    }

    fn cull_face(&mut self, face: CullFace) {
        self.calls.push(DriverCall::CullFace(face));
    }

    fn front_face(&mut self, winding: FrontFace) {
        self.calls.push(DriverCall::FrontFace(winding));
    }

    fn line_width(&mut self, width: f32) {
        self.calls.push(DriverCall::LineWidth(width));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.calls.push(DriverCall::PolygonOffset(factor, units));
    }

    fn scissor(&mut self, rect: Rect) {
        self.calls.push(DriverCall::Scissor(rect));
    }

    fn viewport(&mut self, rect: Rect) {
        self.calls.push(DriverCall::Viewport(rect));
    }

    fn active_texture(&mut self, unit: u32) {
        self.active_unit = unit;
        self.calls.push(DriverCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureId>) {
        self.textures.insert(self.active_unit, (target, texture));
        self.calls.push(DriverCall::BindTexture(target, texture));
    }

    fn create_texture(&mut self) -> TextureId {
        let id = TextureId(self.next());
        self.calls.push(DriverCall::CreateTexture(id));
        id
    }

    fn tex_image_2d(&mut self, target: TextureTarget, face: u32, width: u32, height: u32, _rgba: &[u8]) {
        self.calls.push(DriverCall::TexImage2D {
            target,
            face,
            width,
            height,
        });
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: Option<BufferId>) {
        self.calls.push(DriverCall::BindBuffer(target, buffer));
    }

    fn enable_vertex_attrib_array(&mut self, location: u32) {
        self.attributes.insert(location);
        self.calls.push(DriverCall::EnableAttribArray(location));
    }

    fn disable_vertex_attrib_array(&mut self, location: u32) {
        self.attributes.remove(&location);
        self.calls.push(DriverCall::DisableAttribArray(location));
    }

    fn vertex_attrib_divisor(&mut self, location: u32, divisor: u32) {
        self.calls.push(DriverCall::AttribDivisor(location, divisor));
    }

    fn vertex_attrib_pointer(&mut self, location: u32, layout: &AttributeLayout) {
        self.calls.push(DriverCall::AttribPointer(location, *layout));
    }

    fn create_shader(&mut self, stage: ShaderStage) -> ShaderId {
        let id = ShaderId(self.next());
        self.shaders.insert(
            id,
            ShaderRecord {
                stage,
                source: String::new(),
                compiled: None,
                log: String::new(),
            },
        );
        self.calls.push(DriverCall::CreateShader(stage, id));
        id
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            source.clone_into(&mut record.source);
        }
        self.calls.push(DriverCall::ShaderSource(shader));
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        if let Some(record) = self.shaders.get_mut(&shader) {
            match compile(&record.source) {
                Ok(decls) => {
                    record.compiled = Some(decls);
                    record.log.clear();
                }
                Err(log) => {
                    record.compiled = None;
                    record.log = log;
                }
            }
        }
        self.calls.push(DriverCall::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: ShaderId) -> bool {
        self.shaders.get(&shader).is_some_and(|s| s.compiled.is_some())
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders.get(&shader).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader);
        self.calls.push(DriverCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> ProgramId {
        let id = ProgramId(self.next());
        self.programs.insert(id, ProgramRecord::default());
        self.calls.push(DriverCall::CreateProgram(id));
        id
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.shaders.push(shader);
        }
        self.calls.push(DriverCall::AttachShader(program, shader));
    }

    fn bind_attrib_location(&mut self, program: ProgramId, location: u32, name: &str) {
        if let Some(record) = self.programs.get_mut(&program) {
            record.attrib_bindings.retain(|(_, n)| n != name);
            record.attrib_bindings.push((location, name.to_owned()));
        }
        self.calls
            .push(DriverCall::BindAttribLocation(program, location, name.to_owned()));
    }

    fn link_program(&mut self, program: ProgramId) {
        self.link(program);
        self.calls.push(DriverCall::LinkProgram(program));
    }

    fn program_link_status(&self, program: ProgramId) -> bool {
        self.programs.get(&program).is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs.get(&program).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program);
        if self.program == Some(program) {
            self.program = None;
        }
        self.calls.push(DriverCall::DeleteProgram(program));
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.calls.push(DriverCall::UseProgram(program));
    }

    fn active_uniforms(&self, program: ProgramId) -> Vec<ActiveUniform> {
        self.programs.get(&program).map(|p| p.uniforms.clone()).unwrap_or_default()
    }

    fn active_attributes(&self, program: ProgramId) -> Vec<ActiveAttribute> {
        self.programs.get(&program).map(|p| p.attributes.clone()).unwrap_or_default()
    }

    fn uniform_1f(&mut self, location: UniformLocation, value: f32) {
        self.uniform_f("1f", location, &[value]);
    }

    fn uniform_1fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("1fv", location, data);
    }

    fn uniform_2fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("2fv", location, data);
    }

    fn uniform_3fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("3fv", location, data);
    }

    fn uniform_4fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("4fv", location, data);
    }

    fn uniform_1i(&mut self, location: UniformLocation, value: i32) {
        self.uniform_i("1i", location, &[value]);
    }

    fn uniform_1iv(&mut self, location: UniformLocation, data: &[i32]) {
        self.uniform_i("1iv", location, data);
    }

    fn uniform_2iv(&mut self, location: UniformLocation, data: &[i32]) {
        self.uniform_i("2iv", location, data);
    }

    fn uniform_3iv(&mut self, location: UniformLocation, data: &[i32]) {
        self.uniform_i("3iv", location, data);
    }

    fn uniform_4iv(&mut self, location: UniformLocation, data: &[i32]) {
        self.uniform_i("4iv", location, data);
    }

    fn uniform_matrix_2fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("matrix2fv", location, data);
    }

    fn uniform_matrix_3fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("matrix3fv", location, data);
    }

    fn uniform_matrix_4fv(&mut self, location: UniformLocation, data: &[f32]) {
        self.uniform_f("matrix4fv", location, data);
    }

    fn draw_arrays(&mut self, mode: DrawMode, first: u32, count: u32, instances: u32) {
        self.calls.push(DriverCall::DrawArrays {
            mode,
            first,
            count,
            instances,
        });
    }

    fn draw_elements(&mut self, mode: DrawMode, count: u32, format: IndexFormat, offset: u64, instances: u32) {
        self.calls.push(DriverCall::DrawElements {
            mode,
            count,
            format,
            offset,
            instances,
        });
    }
}
