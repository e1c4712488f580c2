//! Per-caller command recording.

use std::sync::Arc;

use ember_core::memory::Memory;
use ember_core::profile_scope;
use ember_core::window::Window;

use crate::context::Context;
use crate::refcount::SharedRef;
use crate::resources::{Buffer, Sampler, Texture};
use crate::types::{
    BufferKind, DrawArgs, DrawIndexedArgs, PipelineState, RenderPassDescriptor, RenderTarget,
    TextureRegion,
};

use super::{Command, CommandQueue};

/// Records GPU operations for later execution on the driver thread.
///
/// Recording touches no GPU state: each call captures its operands (resource
/// handles by shared reference, memory blobs by clone) into one command.
/// [`commit`](Self::commit) moves the whole sequence into the device queue as
/// a single batch and leaves the list empty for reuse.
///
/// Phase errors (drawing outside a render pass, nested passes) are detected
/// when the driver thread replays the list, not while recording.
///
/// # Example
///
/// ```ignore
/// let mut cmd = device.create_cmd_list();
/// cmd.update_vertex_buffer(&vb, 0, 96, vertices);
/// cmd.begin_render_pass(RenderPassDescriptor::new(), framebuffer.clone());
/// cmd.bind_pipeline_state(&pipeline);
/// cmd.bind_vertex_buffers(&[vb.clone()]);
/// cmd.draw(4, 0, 1, 0);
/// cmd.end_render_pass();
/// cmd.commit();
/// ```
pub struct CmdList {
    queue: Arc<CommandQueue>,
    commands: Vec<Command>,
}

impl CmdList {
    pub(crate) fn new(queue: Arc<CommandQueue>) -> Self {
        Self {
            queue,
            commands: Vec::new(),
        }
    }

    fn push(&mut self, command: impl FnOnce(&mut Context) + Send + 'static) {
        self.commands.push(Box::new(command));
    }

    /// Write `size` bytes of `data` into a vertex buffer at `offset`.
    pub fn update_vertex_buffer(
        &mut self,
        buffer: &SharedRef<Buffer>,
        offset: u64,
        size: u64,
        data: Memory,
    ) {
        let buffer = buffer.clone();
        self.push(move |ctx| ctx.update_buffer(&buffer, BufferKind::Vertex, offset, size, &data));
    }

    /// Write `size` bytes of `data` into an index buffer at `offset`.
    pub fn update_index_buffer(
        &mut self,
        buffer: &SharedRef<Buffer>,
        offset: u64,
        size: u64,
        data: Memory,
    ) {
        let buffer = buffer.clone();
        self.push(move |ctx| ctx.update_buffer(&buffer, BufferKind::Index, offset, size, &data));
    }

    /// Write `size` bytes of `data` into a uniform buffer at `offset`.
    pub fn update_uniform_buffer(
        &mut self,
        buffer: &SharedRef<Buffer>,
        offset: u64,
        size: u64,
        data: Memory,
    ) {
        let buffer = buffer.clone();
        self.push(move |ctx| ctx.update_buffer(&buffer, BufferKind::Uniform, offset, size, &data));
    }

    /// Upload tightly packed texels into a region of one mip level.
    pub fn update_texture_2d(
        &mut self,
        texture: &SharedRef<Texture>,
        level: u32,
        region: TextureRegion,
        data: Memory,
    ) {
        let texture = texture.clone();
        self.push(move |ctx| ctx.update_texture_2d(&texture, level, region, &data));
    }

    /// Regenerate every mip level below the base level.
    pub fn generate_mipmaps(&mut self, texture: &SharedRef<Texture>) {
        let texture = texture.clone();
        self.push(move |ctx| ctx.generate_mipmaps(&texture));
    }

    /// Start a scene.
    pub fn begin_scene(&mut self) {
        self.push(|ctx| ctx.begin_scene());
    }

    /// End the current scene.
    pub fn end_scene(&mut self) {
        self.push(|ctx| ctx.end_scene());
    }

    /// Start a render pass into `target`.
    pub fn begin_render_pass(
        &mut self,
        desc: RenderPassDescriptor,
        target: impl Into<RenderTarget>,
    ) {
        let target = target.into();
        self.push(move |ctx| ctx.begin_render_pass(&desc, target));
    }

    /// Switch program, vertex declaration and raster state.
    pub fn bind_pipeline_state(&mut self, state: &PipelineState) {
        let state = state.clone();
        self.push(move |ctx| ctx.bind_pipeline_state(state));
    }

    /// Bind vertex buffers to slots `0..buffers.len()`.
    pub fn bind_vertex_buffers(&mut self, buffers: &[SharedRef<Buffer>]) {
        let buffers = buffers.to_vec();
        self.push(move |ctx| ctx.bind_vertex_buffers(buffers));
    }

    /// Bind the index buffer used by indexed draws.
    pub fn bind_index_buffer(&mut self, buffer: &SharedRef<Buffer>) {
        let buffer = buffer.clone();
        self.push(move |ctx| ctx.bind_index_buffer(buffer));
    }

    /// Bind `size` bytes of a uniform buffer starting at `offset` to a block slot.
    pub fn bind_uniform_buffer(
        &mut self,
        slot: u32,
        buffer: &SharedRef<Buffer>,
        offset: u64,
        size: u64,
    ) {
        let buffer = buffer.clone();
        self.push(move |ctx| ctx.bind_uniform_buffer(slot, buffer, offset, size));
    }

    /// Bind a texture to a texture unit.
    pub fn bind_texture(&mut self, slot: u32, texture: &SharedRef<Texture>) {
        let texture = texture.clone();
        self.push(move |ctx| ctx.bind_texture(slot, texture));
    }

    /// Bind a sampler to a texture unit.
    pub fn bind_sampler(&mut self, slot: u32, sampler: &SharedRef<Sampler>) {
        let sampler = sampler.clone();
        self.push(move |ctx| ctx.bind_sampler(slot, sampler));
    }

    /// Instanced non-indexed draw.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
        first_instance: u32,
    ) {
        let args = DrawArgs::new(vertex_count, first_vertex, instance_count, first_instance);
        self.push(move |ctx| ctx.draw(&args));
    }

    /// Instanced indexed draw using the bound index buffer.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
        first_instance: u32,
    ) {
        let args = DrawIndexedArgs::new(
            index_count,
            first_index,
            base_vertex,
            instance_count,
            first_instance,
        );
        self.push(move |ctx| ctx.draw_indexed(&args));
    }

    /// End the current render pass.
    pub fn end_render_pass(&mut self) {
        self.push(|ctx| ctx.end_render_pass());
    }

    /// Present a window's back buffer.
    pub fn swap_buffers(&mut self, window: Arc<dyn Window>) {
        self.push(move |ctx| ctx.swap_buffers(window.as_ref()));
    }

    /// Record an arbitrary operation against the context.
    pub fn record(&mut self, command: impl FnOnce(&mut Context) + Send + 'static) {
        self.push(command);
    }

    /// Number of recorded, uncommitted commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Hand every recorded command to the queue as one batch.
    ///
    /// Returns the number of commands submitted.
    pub fn commit(&mut self) -> usize {
        profile_scope!("CmdList::commit");
        let batch = std::mem::take(&mut self.commands);
        let count = batch.len();
        self.queue.enqueue(batch);
        count
    }
}

impl Drop for CmdList {
    fn drop(&mut self) {
        if !self.commands.is_empty() {
            log::warn!(
                "CmdList dropped with {} uncommitted commands; discarding them",
                self.commands.len()
            );
        }
    }
}

impl std::fmt::Debug for CmdList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmdList")
            .field("recorded", &self.commands.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(CmdList: Send);
