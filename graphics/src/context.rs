//! Driver-thread executor.
//!
//! The [`Context`] is the only object that talks to the [`Driver`]. Queued
//! commands run against it one at a time on the driver thread, so it needs no
//! internal synchronization. It tracks the scene/render-pass phase, the bound
//! pipeline and resources, and on OpenGL-style backends a cache of vertex
//! array objects keyed by the vertex input they capture.
//!
//! Contract violations (wrong phase, wrong resource type, resources from
//! another device, using a resource before its init ran) panic: by the time a
//! command reaches the context there is nothing the caller can do about it.

use std::collections::HashMap;

use ember_core::memory::Memory;
use ember_core::window::Window;

use crate::backend::{BackendKind, Driver, NativeHandle, NativeKind};
use crate::device::DeviceCaps;
use crate::refcount::SharedRef;
use crate::resources::{
    Buffer, DeviceId, Framebuffer, GpuResource, Program, ResourceKind, Sampler, Texture,
    VertexDeclaration,
};
use crate::types::{
    BufferKind, ClearMask, DrawArgs, DrawIndexedArgs, LoadOp, PipelineState, ProgramStatus,
    RenderPassDescriptor, RenderTarget, StoreOp, TextureRegion, TextureUsage, Viewport,
};

/// Where the context is in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextPhase {
    /// Outside any scene or pass.
    Idle,
    /// Between `begin_scene` and `end_scene`.
    SceneBegun,
    /// Inside a render pass.
    InRenderPass,
}

/// An operation executed by the context, as recorded in its trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOp {
    BeginScene,
    EndScene,
    BeginRenderPass,
    BindPipelineState,
    BindVertexBuffers(usize),
    BindIndexBuffer,
    BindUniformBuffer(u32),
    BindTexture(u32),
    BindSampler(u32),
    Draw(DrawArgs),
    DrawIndexed(DrawIndexedArgs),
    EndRenderPass,
    SwapBuffers,
    UpdateBuffer(BufferKind),
    UpdateTexture,
    GenerateMipmaps,
    InitResource(ResourceKind),
    ReleaseResource(ResourceKind),
    /// Marker recorded by [`Context::custom`].
    Custom(&'static str),
}

/// Counters describing the work done by the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    /// Render passes begun.
    pub passes: u64,
    /// Draws issued to the driver.
    pub draws: u64,
    /// Draws skipped because the pipeline's program failed to compile.
    pub skipped_draws: u64,
    /// Vertex array objects built.
    pub vertex_array_builds: u64,
    /// Draws that reused a cached vertex array object.
    pub vertex_array_hits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexArrayKey {
    layout: NativeHandle,
    vertex_buffers: Vec<NativeHandle>,
    index_buffer: Option<NativeHandle>,
}

impl VertexArrayKey {
    fn references(&self, handle: NativeHandle) -> bool {
        self.layout == handle
            || self.index_buffer == Some(handle)
            || self.vertex_buffers.contains(&handle)
    }
}

struct PassState {
    // Keeps the target alive until the pass ends.
    _target: RenderTarget,
    discard_on_end: ClearMask,
}

/// Single-threaded state machine issuing native API calls.
pub struct Context {
    driver: Box<dyn Driver>,
    kind: BackendKind,
    device_id: DeviceId,
    caps: DeviceCaps,

    scene_begun: bool,
    pass: Option<PassState>,

    pipeline: Option<PipelineState>,
    vertex_buffers: Vec<SharedRef<Buffer>>,
    index_buffer: Option<SharedRef<Buffer>>,
    uniform_buffers: HashMap<u32, SharedRef<Buffer>>,
    textures: HashMap<u32, SharedRef<Texture>>,
    samplers: HashMap<u32, SharedRef<Sampler>>,

    vertex_arrays: HashMap<VertexArrayKey, NativeHandle>,
    vertex_array_dirty: bool,

    trace: Option<Vec<ContextOp>>,
    executed_ops: u64,
    stats: ContextStats,
}

impl Context {
    pub(crate) fn new(
        driver: Box<dyn Driver>,
        device_id: DeviceId,
        caps: DeviceCaps,
        trace_ops: bool,
    ) -> Self {
        let kind = driver.kind();
        Self {
            driver,
            kind,
            device_id,
            caps,
            scene_begun: false,
            pass: None,
            pipeline: None,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            uniform_buffers: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            vertex_array_dirty: true,
            trace: trace_ops.then(Vec::new),
            executed_ops: 0,
            stats: ContextStats::default(),
        }
    }

    /// Conventions of the driver.
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Name of the driver.
    pub fn driver_name(&self) -> &str {
        self.driver.name()
    }

    /// Device limits.
    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    /// Current phase.
    pub fn phase(&self) -> ContextPhase {
        if self.pass.is_some() {
            ContextPhase::InRenderPass
        } else if self.scene_begun {
            ContextPhase::SceneBegun
        } else {
            ContextPhase::Idle
        }
    }

    /// Work counters.
    pub fn stats(&self) -> ContextStats {
        self.stats
    }

    /// Number of operations executed since creation.
    pub fn executed_ops(&self) -> u64 {
        self.executed_ops
    }

    /// Number of cached vertex array objects.
    pub fn cached_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Take the recorded trace. Empty when tracing is disabled.
    pub fn take_trace(&mut self) -> Vec<ContextOp> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// Record a named marker in the trace.
    pub fn custom(&mut self, name: &'static str) {
        self.op(ContextOp::Custom(name));
    }

    fn op(&mut self, op: ContextOp) {
        log::trace!("context: {op:?}");
        self.executed_ops += 1;
        if let Some(trace) = &mut self.trace {
            trace.push(op);
        }
    }

    fn native<R: GpuResource>(&self, resource: &R) -> NativeHandle {
        let core = resource.core();
        assert_eq!(
            core.device_id(),
            self.device_id,
            "{:?} belongs to another device",
            core.kind()
        );
        assert!(core.is_initialized(), "{:?} used before initialization", core.kind());
        core.native_handle()
            .unwrap_or_else(|| panic!("{:?} has no native object", core.kind()))
    }

    fn expect_in_pass(&self, operation: &str) {
        assert!(self.pass.is_some(), "{operation} called outside a render pass");
    }

    fn expect_buffer_kind(buffer: &Buffer, kind: BufferKind, operation: &str) {
        assert_eq!(
            buffer.kind(),
            kind,
            "{operation} expects a {kind:?} buffer, got a {:?} buffer",
            buffer.kind()
        );
    }

    // ---------------------------------------------------------------------
    // Resource lifetime
    // ---------------------------------------------------------------------

    pub(crate) fn init_buffer(&mut self, buffer: &Buffer) {
        let handle = self.driver.create_buffer(buffer.size());
        buffer.core().set_initialized(Some(handle));
        self.op(ContextOp::InitResource(buffer.core().kind()));
    }

    pub(crate) fn init_texture(&mut self, texture: &Texture) {
        let handle = self.driver.create_texture(texture.descriptor());
        texture.core().set_initialized(Some(handle));
        self.op(ContextOp::InitResource(ResourceKind::Texture));
    }

    pub(crate) fn init_sampler(&mut self, sampler: &Sampler) {
        let handle = self.driver.create_sampler(sampler.descriptor());
        sampler.core().set_initialized(Some(handle));
        self.op(ContextOp::InitResource(ResourceKind::Sampler));
    }

    pub(crate) fn init_program(&mut self, program: &Program) {
        let desc = program.descriptor();
        match self.driver.create_program(&desc.vertex_source, &desc.fragment_source) {
            Ok(handle) => {
                program.core().set_initialized(Some(handle));
                program.set_compiled();
            }
            Err(message) => {
                log::error!(
                    "program {:?} failed to compile: {message}",
                    program.label().unwrap_or("<unnamed>")
                );
                program.core().set_initialized(None);
                program.set_failed(message);
            }
        }
        self.op(ContextOp::InitResource(ResourceKind::Program));
    }

    pub(crate) fn init_framebuffer(&mut self, framebuffer: &Framebuffer) {
        let colors: Vec<_> = framebuffer
            .color_attachments()
            .iter()
            .map(|texture| self.native(&**texture))
            .collect();
        let depth = framebuffer.depth_attachment().map(|texture| self.native(&**texture));
        let handle = self.driver.create_framebuffer(&colors, depth);
        framebuffer.core().set_initialized(Some(handle));
        self.op(ContextOp::InitResource(ResourceKind::Framebuffer));
    }

    pub(crate) fn init_vertex_declaration(&mut self, declaration: &VertexDeclaration) {
        let handle = self.driver.create_vertex_layout(declaration.descriptor());
        declaration.core().set_initialized(Some(handle));
        self.op(ContextOp::InitResource(ResourceKind::VertexDeclaration));
    }

    /// Destroy the native object of a resource whose last reference is gone.
    pub(crate) fn release_resource(&mut self, kind: ResourceKind, handle: NativeHandle) {
        if matches!(
            kind.native_kind(),
            NativeKind::Buffer | NativeKind::VertexLayout
        ) {
            self.evict_vertex_arrays(handle);
        }
        self.driver.destroy(kind.native_kind(), handle);
        self.op(ContextOp::ReleaseResource(kind));
    }

    fn evict_vertex_arrays(&mut self, handle: NativeHandle) {
        let stale: Vec<_> = self
            .vertex_arrays
            .keys()
            .filter(|key| key.references(handle))
            .cloned()
            .collect();
        for key in stale {
            if let Some(vao) = self.vertex_arrays.remove(&key) {
                log::trace!("evicting vertex array {vao} referencing {handle}");
                self.driver.destroy(NativeKind::VertexArray, vao);
            }
        }
    }

    /// Destroy every cached vertex array object.
    pub(crate) fn destroy_vertex_arrays(&mut self) {
        for (_, vao) in self.vertex_arrays.drain() {
            self.driver.destroy(NativeKind::VertexArray, vao);
        }
    }

    /// Drop every binding and any open pass or scene.
    ///
    /// Releasing the held references may queue release commands.
    pub(crate) fn reset(&mut self) {
        if self.pass.is_some() || self.scene_begun {
            log::warn!("context reset in phase {:?}", self.phase());
        }
        self.clear_bindings();
        self.pass = None;
        self.scene_begun = false;
    }

    fn clear_bindings(&mut self) {
        self.pipeline = None;
        self.vertex_buffers.clear();
        self.index_buffer = None;
        self.uniform_buffers.clear();
        self.textures.clear();
        self.samplers.clear();
        self.vertex_array_dirty = true;
    }

    // ---------------------------------------------------------------------
    // Updates
    // ---------------------------------------------------------------------

    /// Write `size` bytes of `data` into `buffer` at `offset`.
    pub fn update_buffer(
        &mut self,
        buffer: &Buffer,
        kind: BufferKind,
        offset: u64,
        size: u64,
        data: &Memory,
    ) {
        Self::expect_buffer_kind(buffer, kind, "update_buffer");
        let handle = self.native(buffer);
        debug_assert!(
            offset.checked_add(size).is_some_and(|end| end <= buffer.size()),
            "update of {size} bytes at {offset} overflows buffer of {} bytes",
            buffer.size()
        );
        debug_assert!(
            size <= data.len() as u64,
            "update of {size} bytes from a {} byte blob",
            data.len()
        );
        self.driver.write_buffer(handle, offset, &data[..size as usize]);
        self.op(ContextOp::UpdateBuffer(kind));
    }

    /// Upload texels into a region of one mip level.
    pub fn update_texture_2d(
        &mut self,
        texture: &Texture,
        level: u32,
        region: TextureRegion,
        data: &Memory,
    ) {
        let handle = self.native(texture);
        assert!(
            texture.usage().contains(TextureUsage::UPLOAD),
            "texture {:?} was not created for uploads",
            texture.label()
        );
        assert!(
            level < texture.mip_level_count(),
            "mip level {level} out of range ({} levels)",
            texture.mip_level_count()
        );
        debug_assert!({
            let (width, height) = texture.descriptor().mip_size(level);
            region.x + region.width <= width && region.y + region.height <= height
        });
        debug_assert!(region.byte_size(texture.format()) <= data.len() as u64);
        self.driver.write_texture(handle, level, region, data);
        self.op(ContextOp::UpdateTexture);
    }

    /// Regenerate every mip level below the base.
    pub fn generate_mipmaps(&mut self, texture: &Texture) {
        let handle = self.native(texture);
        if texture.mip_level_count() > 1 {
            self.driver.generate_mipmaps(handle);
        }
        self.op(ContextOp::GenerateMipmaps);
    }

    // ---------------------------------------------------------------------
    // Phases
    // ---------------------------------------------------------------------

    /// Start a scene.
    pub fn begin_scene(&mut self) {
        assert_eq!(self.phase(), ContextPhase::Idle, "begin_scene called while not idle");
        self.scene_begun = true;
        self.op(ContextOp::BeginScene);
    }

    /// End the current scene.
    pub fn end_scene(&mut self) {
        assert_eq!(
            self.phase(),
            ContextPhase::SceneBegun,
            "end_scene called without a matching begin_scene"
        );
        self.scene_begun = false;
        self.op(ContextOp::EndScene);
    }

    /// Start a render pass. Valid while idle or inside a scene.
    pub fn begin_render_pass(&mut self, desc: &RenderPassDescriptor, target: RenderTarget) {
        assert!(self.pass.is_none(), "begin_render_pass called inside a render pass");

        let present = match &target {
            RenderTarget::Framebuffer(framebuffer) => {
                let colors = framebuffer.color_attachments().len();
                assert_eq!(colors, 1, "render pass needs exactly one colour target, got {colors}");
                let handle = self.native(&**framebuffer);
                self.driver.bind_render_target(Some(handle));
                let mut present = ClearMask::COLOR;
                if let Some(depth) = framebuffer.depth_attachment() {
                    present |= ClearMask::DEPTH;
                    present.set(ClearMask::STENCIL, depth.format().has_stencil());
                }
                present
            }
            RenderTarget::Window(window) => {
                window.make_context_current();
                self.driver.bind_render_target(None);
                ClearMask::all()
            }
        };

        let clear = desc.options.load_mask(LoadOp::Clear) & present;
        if !clear.is_empty() {
            self.driver.clear(clear, &desc.clear);
        }
        let discard = desc.options.load_mask(LoadOp::Discard) & present;
        if !discard.is_empty() {
            self.driver.invalidate(discard);
        }

        let (width, height) = target.size();
        let viewport = desc.viewport.unwrap_or_else(|| Viewport::from_dimensions(width, height));
        self.driver.set_viewport(&viewport);

        self.pass = Some(PassState {
            _target: target,
            discard_on_end: desc.options.store_mask(StoreOp::Discard) & present,
        });
        self.vertex_array_dirty = true;
        self.stats.passes += 1;
        self.op(ContextOp::BeginRenderPass);
    }

    /// End the current render pass, restoring the phase it was begun from.
    pub fn end_render_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            panic!("end_render_pass called outside a render pass");
        };
        if !pass.discard_on_end.is_empty() {
            self.driver.invalidate(pass.discard_on_end);
        }
        self.driver.use_program(None);
        if self.kind.uses_vertex_array_cache() {
            self.driver.bind_vertex_array(None);
        }
        self.clear_bindings();
        self.op(ContextOp::EndRenderPass);
    }

    /// Present a window's back buffer.
    pub fn swap_buffers(&mut self, window: &dyn Window) {
        assert!(self.pass.is_none(), "swap_buffers called inside a render pass");
        window.swap_buffers();
        self.op(ContextOp::SwapBuffers);
    }

    // ---------------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------------

    /// Switch program, vertex declaration and raster state.
    pub fn bind_pipeline_state(&mut self, state: PipelineState) {
        self.expect_in_pass("bind_pipeline_state");
        self.native(&*state.vertex_declaration);
        let program = &state.program;
        assert_eq!(
            program.core().device_id(),
            self.device_id,
            "Program belongs to another device"
        );
        assert!(program.is_initialized(), "Program used before initialization");

        self.driver.set_raster_state(&state.raster);
        match program.status() {
            ProgramStatus::Compiled => self.driver.use_program(program.native_handle()),
            status => log::warn!(
                "binding program {:?} with status {status:?}; draws will be skipped",
                program.label()
            ),
        }
        self.pipeline = Some(state);
        self.vertex_array_dirty = true;
        self.op(ContextOp::BindPipelineState);
    }

    /// Bind vertex buffers to slots `0..buffers.len()`.
    pub fn bind_vertex_buffers(&mut self, buffers: Vec<SharedRef<Buffer>>) {
        self.expect_in_pass("bind_vertex_buffers");
        assert!(
            buffers.len() <= self.caps.max_vertex_buffers as usize,
            "{} vertex buffers exceed the device limit of {}",
            buffers.len(),
            self.caps.max_vertex_buffers
        );
        for buffer in &buffers {
            Self::expect_buffer_kind(buffer, BufferKind::Vertex, "bind_vertex_buffers");
            self.native(&**buffer);
        }
        let count = buffers.len();
        self.vertex_buffers = buffers;
        self.vertex_array_dirty = true;
        self.op(ContextOp::BindVertexBuffers(count));
    }

    /// Bind the index buffer used by indexed draws.
    pub fn bind_index_buffer(&mut self, buffer: SharedRef<Buffer>) {
        self.expect_in_pass("bind_index_buffer");
        Self::expect_buffer_kind(&buffer, BufferKind::Index, "bind_index_buffer");
        self.native(&*buffer);
        self.index_buffer = Some(buffer);
        self.vertex_array_dirty = true;
        self.op(ContextOp::BindIndexBuffer);
    }

    /// Bind a range of a uniform buffer to a block slot.
    pub fn bind_uniform_buffer(
        &mut self,
        slot: u32,
        buffer: SharedRef<Buffer>,
        offset: u64,
        size: u64,
    ) {
        self.expect_in_pass("bind_uniform_buffer");
        Self::expect_buffer_kind(&buffer, BufferKind::Uniform, "bind_uniform_buffer");
        assert!(
            slot < self.caps.max_uniform_buffer_bindings,
            "uniform slot {slot} out of range"
        );
        let alignment = self.caps.uniform_buffer_offset_alignment;
        assert!(
            offset % alignment == 0,
            "uniform offset {offset} is not a multiple of {alignment}"
        );
        debug_assert!(offset + size <= buffer.size());
        let handle = self.native(&*buffer);
        self.driver.bind_uniform_buffer(slot, handle, offset, size);
        self.uniform_buffers.insert(slot, buffer);
        self.op(ContextOp::BindUniformBuffer(slot));
    }

    /// Bind a texture to a texture unit.
    pub fn bind_texture(&mut self, slot: u32, texture: SharedRef<Texture>) {
        self.expect_in_pass("bind_texture");
        assert!(slot < self.caps.max_texture_units, "texture unit {slot} out of range");
        assert!(
            texture.usage().contains(TextureUsage::SAMPLED),
            "texture {:?} was not created for sampling",
            texture.label()
        );
        let handle = self.native(&*texture);
        self.driver.bind_texture(slot, handle);
        self.textures.insert(slot, texture);
        self.op(ContextOp::BindTexture(slot));
    }

    /// Bind a sampler to a texture unit.
    pub fn bind_sampler(&mut self, slot: u32, sampler: SharedRef<Sampler>) {
        self.expect_in_pass("bind_sampler");
        assert!(slot < self.caps.max_texture_units, "texture unit {slot} out of range");
        let handle = self.native(&*sampler);
        self.driver.bind_sampler(slot, handle);
        self.samplers.insert(slot, sampler);
        self.op(ContextOp::BindSampler(slot));
    }

    // ---------------------------------------------------------------------
    // Draws
    // ---------------------------------------------------------------------

    /// Instanced non-indexed draw.
    pub fn draw(&mut self, args: &DrawArgs) {
        self.expect_in_pass("draw");
        if self.prepare_vertex_input(false) {
            self.driver.draw(args);
            self.stats.draws += 1;
        }
        self.op(ContextOp::Draw(*args));
    }

    /// Instanced indexed draw using the bound index buffer.
    pub fn draw_indexed(&mut self, args: &DrawIndexedArgs) {
        self.expect_in_pass("draw_indexed");
        let Some(format) = self
            .index_buffer
            .as_ref()
            .and_then(|buffer| buffer.index_format())
        else {
            panic!("draw_indexed called without an index buffer");
        };
        if self.prepare_vertex_input(true) {
            self.driver.draw_indexed(format, args);
            self.stats.draws += 1;
        }
        self.op(ContextOp::DrawIndexed(*args));
    }

    /// Make the bound vertex input current. Returns false if the draw must be skipped.
    fn prepare_vertex_input(&mut self, indexed: bool) -> bool {
        let Some(pipeline) = &self.pipeline else {
            panic!("draw called without a bound pipeline state");
        };
        if pipeline.program.status() != ProgramStatus::Compiled {
            log::warn!(
                "skipping draw: program {:?} is {:?}",
                pipeline.program.label(),
                pipeline.program.status()
            );
            self.stats.skipped_draws += 1;
            return false;
        }

        let required = pipeline.vertex_declaration.buffer_count();
        assert!(
            self.vertex_buffers.len() >= required,
            "vertex declaration needs {required} vertex buffers, {} bound",
            self.vertex_buffers.len()
        );

        let layout = self.native(&*pipeline.vertex_declaration);
        let vertex_buffers: Vec<_> = self
            .vertex_buffers
            .iter()
            .map(|b| self.native(&**b))
            .collect();
        let index_buffer = self.index_buffer.as_ref().map(|b| self.native(&**b));

        if self.kind.uses_vertex_array_cache() {
            if self.vertex_array_dirty {
                let key = VertexArrayKey {
                    layout,
                    vertex_buffers,
                    index_buffer,
                };
                let vao = match self.vertex_arrays.get(&key) {
                    Some(&vao) => {
                        self.stats.vertex_array_hits += 1;
                        vao
                    }
                    None => {
                        let vao = self.driver.create_vertex_array(
                            key.layout,
                            &key.vertex_buffers,
                            key.index_buffer,
                        );
                        log::trace!("built vertex array {vao}");
                        self.stats.vertex_array_builds += 1;
                        self.vertex_arrays.insert(key, vao);
                        vao
                    }
                };
                self.driver.bind_vertex_array(Some(vao));
                self.vertex_array_dirty = false;
            }
        } else {
            self.driver.bind_vertex_buffers(layout, &vertex_buffers);
            if indexed
                && let (Some(buffer), Some(format)) = (
                    index_buffer,
                    self.index_buffer.as_ref().and_then(|b| b.index_format()),
                )
            {
                self.driver.bind_index_buffer(buffer, format);
            }
        }
        true
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backend", &self.kind)
            .field("phase", &self.phase())
            .field("executed_ops", &self.executed_ops)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(Context: Send);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ember_core::window::HeadlessWindow;

    use super::*;
    use crate::backend::{DriverCall, DriverLog, NullDriver};
    use crate::device::{Device, DeviceConfig};
    use crate::types::{
        AttachmentOptions, BufferDescriptor, BufferUsage, FramebufferDescriptor, IndexFormat,
        ProgramDescriptor, RenderTargetOption, TextureDescriptor, TextureFormat, VertexAttribute,
        VertexBufferLayout, VertexDeclarationDescriptor, VertexFormat,
    };

    struct Fixture {
        window: Arc<dyn Window>,
        state: PipelineState,
        vertices: SharedRef<Buffer>,
        indices: SharedRef<Buffer>,
        log: DriverLog,
        device: Arc<Device>,
    }

    impl Fixture {
        fn new(kind: BackendKind) -> Self {
            Self::with_fragment(kind, "void main() {}")
        }

        fn with_fragment(kind: BackendKind, fragment: &str) -> Self {
            let driver = NullDriver::new(kind);
            let log = driver.log();
            let config = DeviceConfig::default().with_trace_ops(true);
            let device = Device::new(Box::new(driver), config).unwrap();
            let declaration = device
                .create_vertex_declaration(
                    &VertexDeclarationDescriptor::new()
                        .with_buffer(VertexBufferLayout::new(12))
                        .with_attribute(VertexAttribute::new(0, 0, 0, VertexFormat::Float32x3)),
                )
                .unwrap();
            let program = device
                .create_program(&ProgramDescriptor::new("void main() {}", fragment))
                .unwrap();
            let vertices = device
                .create_vertex_buffer(&BufferDescriptor::new(36, BufferUsage::Static))
                .unwrap();
            let indices = device
                .create_index_buffer(
                    &BufferDescriptor::new(12, BufferUsage::Static),
                    IndexFormat::Uint16,
                )
                .unwrap();
            device.take_op_trace();
            log.clear_calls();
            Self {
                window: Arc::new(HeadlessWindow::new(320, 240)),
                state: PipelineState::new(program, declaration),
                vertices,
                indices,
                log,
                device,
            }
        }

        fn target(&self) -> RenderTarget {
            RenderTarget::Window(Arc::clone(&self.window))
        }

        fn bind_all(&self, ctx: &mut Context) {
            ctx.bind_pipeline_state(self.state.clone());
            ctx.bind_vertex_buffers(vec![self.vertices.clone()]);
            ctx.bind_index_buffer(self.indices.clone());
        }
    }

    #[test]
    fn test_phases() {
        let f = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| {
            assert_eq!(ctx.phase(), ContextPhase::Idle);
            ctx.begin_scene();
            assert_eq!(ctx.phase(), ContextPhase::SceneBegun);
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            assert_eq!(ctx.phase(), ContextPhase::InRenderPass);
            ctx.end_render_pass();
            assert_eq!(ctx.phase(), ContextPhase::SceneBegun);
            ctx.end_scene();
            assert_eq!(ctx.phase(), ContextPhase::Idle);

            // Passes are also valid outside a scene.
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            ctx.end_render_pass();
            assert_eq!(ctx.phase(), ContextPhase::Idle);
            assert_eq!(ctx.stats().passes, 2);
        });
        assert_eq!(
            f.device.take_op_trace(),
            vec![
                ContextOp::BeginScene,
                ContextOp::BeginRenderPass,
                ContextOp::EndRenderPass,
                ContextOp::EndScene,
                ContextOp::BeginRenderPass,
                ContextOp::EndRenderPass,
            ]
        );
    }

    #[test]
    fn test_vertex_array_cache_reuse_and_eviction() {
        let f = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| {
            for _ in 0..2 {
                ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
                f.bind_all(ctx);
                ctx.draw_indexed(&DrawIndexedArgs::indices(6));
                ctx.draw_indexed(&DrawIndexedArgs::indices(6));
                ctx.end_render_pass();
            }
            let stats = ctx.stats();
            assert_eq!(stats.draws, 4);
            assert_eq!(stats.vertex_array_builds, 1);
            assert_eq!(stats.vertex_array_hits, 1);
            assert_eq!(ctx.cached_vertex_arrays(), 1);
        });
        assert_eq!(f.log.count(|call| matches!(call, DriverCall::CreateVertexArray { .. })), 1);

        let Fixture { vertices, log, device, .. } = f;
        let handle = vertices.native_handle().unwrap();
        drop(vertices);
        device.execute_commands();

        assert_eq!(device.with_context(|ctx| ctx.cached_vertex_arrays()), 0);
        assert_eq!(log.live_count(NativeKind::VertexArray), 0);
        assert!(log.calls().contains(&DriverCall::Destroy(NativeKind::Buffer, handle)));
    }

    #[test]
    fn test_vulkan_binds_vertex_input_per_draw() {
        let f = Fixture::new(BackendKind::Vulkan);
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            f.bind_all(ctx);
            ctx.draw_indexed(&DrawIndexedArgs::indices(6));
            ctx.draw(&DrawArgs::vertices(3));
            ctx.end_render_pass();
            assert_eq!(ctx.cached_vertex_arrays(), 0);
        });
        assert_eq!(f.log.count(|call| matches!(call, DriverCall::CreateVertexArray { .. })), 0);
        assert_eq!(f.log.count(|call| matches!(call, DriverCall::BindVertexBuffers { .. })), 2);
        assert_eq!(f.log.count(|call| matches!(call, DriverCall::BindIndexBuffer(..))), 1);
        assert_eq!(f.log.count(DriverCall::is_draw), 2);
    }

    #[test]
    fn test_window_pass_clear_and_invalidate() {
        let f = Fixture::new(BackendKind::OpenGl);
        let desc = RenderPassDescriptor::default().with_options(AttachmentOptions {
            color: RenderTargetOption::ClearStore,
            depth: RenderTargetOption::DiscardDiscard,
            stencil: RenderTargetOption::LoadStore,
        });
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&desc, f.target());
            ctx.end_render_pass();
        });
        let calls = f.log.calls();
        assert!(calls.contains(&DriverCall::BindRenderTarget(None)));
        assert!(calls.contains(&DriverCall::Clear(ClearMask::COLOR)));
        assert_eq!(
            f.log.count(|call| *call == DriverCall::Invalidate(ClearMask::DEPTH)),
            2
        );
        assert!(calls.contains(&DriverCall::SetViewport(Viewport::from_dimensions(320, 240))));
    }

    #[test]
    fn test_framebuffer_pass_masks_missing_aspects() {
        let f = Fixture::new(BackendKind::OpenGl);
        let color = f
            .device
            .create_texture(&TextureDescriptor::new_2d(
                64,
                32,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_TARGET,
            ))
            .unwrap();
        let framebuffer = f
            .device
            .create_framebuffer(&FramebufferDescriptor::new(color))
            .unwrap();
        f.log.clear_calls();

        let desc = RenderPassDescriptor::default()
            .with_options(AttachmentOptions::uniform(RenderTargetOption::ClearDiscard));
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&desc, framebuffer.clone().into());
            ctx.end_render_pass();
        });
        let calls = f.log.calls();
        assert_eq!(calls[0], DriverCall::BindRenderTarget(framebuffer.native_handle()));
        assert!(calls.contains(&DriverCall::Clear(ClearMask::COLOR)));
        assert!(calls.contains(&DriverCall::Invalidate(ClearMask::COLOR)));
        assert!(calls.contains(&DriverCall::SetViewport(Viewport::from_dimensions(64, 32))));
    }

    #[test]
    fn test_viewport_override() {
        let f = Fixture::new(BackendKind::Vulkan);
        let viewport = Viewport::new(8.0, 8.0, 64.0, 32.0).with_depth_range(0.25, 0.75);
        let desc = RenderPassDescriptor::default().with_viewport(viewport);
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&desc, f.target());
            ctx.end_render_pass();
        });

        let calls = f.log.take_calls();
        assert!(calls.contains(&DriverCall::SetViewport(viewport)));
        assert!(f.log.calls().is_empty());
    }

    #[test]
    fn test_failed_program_skips_draws() {
        let f = Fixture::with_fragment(BackendKind::OpenGl, "#error broken");
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            f.bind_all(ctx);
            ctx.draw(&DrawArgs::vertices(3));
            ctx.end_render_pass();
            assert_eq!(ctx.stats().draws, 0);
            assert_eq!(ctx.stats().skipped_draws, 1);
        });
        assert_eq!(f.log.count(DriverCall::is_draw), 0);
        assert!(f.device.take_op_trace().contains(&ContextOp::Draw(DrawArgs::vertices(3))));
    }

    #[test]
    fn test_update_buffer_writes_contents() {
        let f = Fixture::new(BackendKind::Vulkan);
        let data = Memory::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        f.device.with_context(|ctx| {
            ctx.update_buffer(&f.vertices, BufferKind::Vertex, 4, 8, &data);
        });
        let contents = f.log.buffer_contents(f.vertices.native_handle().unwrap()).unwrap();
        assert_eq!(&contents[4..12], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(f.device.take_op_trace(), vec![ContextOp::UpdateBuffer(BufferKind::Vertex)]);
    }

    #[test]
    #[should_panic(expected = "draw called outside a render pass")]
    fn test_draw_outside_pass_panics() {
        let f = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| ctx.draw(&DrawArgs::vertices(3)));
    }

    #[test]
    #[should_panic(expected = "begin_render_pass called inside a render pass")]
    fn test_nested_pass_panics() {
        let f = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
        });
    }

    #[test]
    #[should_panic(expected = "draw called without a bound pipeline state")]
    fn test_draw_without_pipeline_panics() {
        let f = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            ctx.draw(&DrawArgs::vertices(3));
        });
    }

    #[test]
    #[should_panic(expected = "exactly one colour target")]
    fn test_multiple_colour_targets_panic() {
        let f = Fixture::new(BackendKind::OpenGl);
        let target = || {
            f.device
                .create_texture(&TextureDescriptor::new_2d(
                    16,
                    16,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::RENDER_TARGET,
                ))
                .unwrap()
        };
        let framebuffer = f
            .device
            .create_framebuffer(&FramebufferDescriptor::new(target()).with_color(target()))
            .unwrap();
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), framebuffer.into());
        });
    }

    #[test]
    #[should_panic(expected = "is not a multiple of 256")]
    fn test_misaligned_uniform_offset_panics() {
        let f = Fixture::new(BackendKind::OpenGl);
        let uniforms = f
            .device
            .create_uniform_buffer(&BufferDescriptor::new(1024, BufferUsage::Dynamic))
            .unwrap();
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            ctx.bind_uniform_buffer(0, uniforms, 64, 64);
        });
    }

    #[test]
    #[should_panic(expected = "belongs to another device")]
    fn test_foreign_resource_panics() {
        let f = Fixture::new(BackendKind::OpenGl);
        let other = Fixture::new(BackendKind::OpenGl);
        f.device.with_context(|ctx| {
            ctx.begin_render_pass(&RenderPassDescriptor::default(), f.target());
            ctx.bind_vertex_buffers(vec![other.vertices.clone()]);
        });
    }
}
