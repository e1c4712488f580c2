//! Headless driver.
//!
//! Hands out monotonically increasing handles, keeps buffer contents in
//! memory and records every call into a [`DriverLog`] that can be inspected
//! from any thread. Misuse that a real driver would turn into undefined
//! behaviour (touching a destroyed handle, writing past the end of a buffer)
//! panics instead.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceCaps;
use crate::types::{
    ClearMask, ClearValues, DrawArgs, DrawIndexedArgs, IndexFormat, RasterState,
    SamplerDescriptor, TextureDescriptor, TextureRegion, VertexDeclarationDescriptor, Viewport,
};

use super::{BackendKind, Driver, NativeHandle, NativeKind};

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    CreateBuffer { handle: NativeHandle, size: u64 },
    WriteBuffer { buffer: NativeHandle, offset: u64, len: usize },
    CreateTexture { handle: NativeHandle, width: u32, height: u32, mip_levels: u32 },
    WriteTexture { texture: NativeHandle, level: u32, region: TextureRegion },
    GenerateMipmaps(NativeHandle),
    CreateSampler(NativeHandle),
    CreateProgram(NativeHandle),
    ProgramFailed { log: String },
    CreateFramebuffer {
        handle: NativeHandle,
        colors: Vec<NativeHandle>,
        depth: Option<NativeHandle>,
    },
    CreateVertexLayout(NativeHandle),
    CreateVertexArray {
        handle: NativeHandle,
        layout: NativeHandle,
        vertex_buffers: Vec<NativeHandle>,
        index_buffer: Option<NativeHandle>,
    },
    Destroy(NativeKind, NativeHandle),
    BindRenderTarget(Option<NativeHandle>),
    Clear(ClearMask),
    SetViewport(Viewport),
    Invalidate(ClearMask),
    UseProgram(Option<NativeHandle>),
    SetRasterState(RasterState),
    BindVertexArray(Option<NativeHandle>),
    BindVertexBuffers { layout: NativeHandle, buffers: Vec<NativeHandle> },
    BindIndexBuffer(NativeHandle, IndexFormat),
    BindUniformBuffer { slot: u32, buffer: NativeHandle, offset: u64, size: u64 },
    BindTexture { slot: u32, texture: NativeHandle },
    BindSampler { slot: u32, sampler: NativeHandle },
    Draw(DrawArgs),
    DrawIndexed(IndexFormat, DrawIndexedArgs),
}

impl DriverCall {
    /// Returns true for draw calls of either kind.
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::Draw(_) | Self::DrawIndexed(..))
    }
}

#[derive(Default)]
struct NullState {
    next_handle: u64,
    live: HashMap<NativeHandle, NativeKind>,
    buffers: HashMap<NativeHandle, Vec<u8>>,
    calls: Vec<DriverCall>,
}

impl NullState {
    fn allocate(&mut self, kind: NativeKind) -> NativeHandle {
        self.next_handle += 1;
        let handle = NativeHandle::new(self.next_handle)
            .unwrap_or_else(|| unreachable!("handle counter starts above zero"));
        self.live.insert(handle, kind);
        handle
    }

    fn expect_live(&self, handle: NativeHandle, kind: NativeKind) {
        match self.live.get(&handle) {
            Some(&live_kind) => assert_eq!(
                live_kind, kind,
                "native handle {handle} is a {live_kind:?}, used as a {kind:?}"
            ),
            None => panic!("native handle {handle} ({kind:?}) is not live"),
        }
    }
}

/// Shared view of a [`NullDriver`]'s state, usable from any thread.
#[derive(Clone)]
pub struct DriverLog {
    state: Arc<Mutex<NullState>>,
}

impl DriverLog {
    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().calls.clone()
    }

    /// Take the recorded calls, leaving the log empty.
    pub fn take_calls(&self) -> Vec<DriverCall> {
        std::mem::take(&mut self.state.lock().calls)
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Number of live native objects of one kind.
    pub fn live_count(&self, kind: NativeKind) -> usize {
        self.state.lock().live.values().filter(|&&k| k == kind).count()
    }

    /// Number of live native objects of every kind.
    pub fn total_live(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Current contents of a live buffer.
    pub fn buffer_contents(&self, buffer: NativeHandle) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }
}

impl std::fmt::Debug for DriverLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DriverLog")
            .field("calls", &state.calls.len())
            .field("live", &state.live.len())
            .finish()
    }
}

/// Driver that performs no GPU work.
pub struct NullDriver {
    kind: BackendKind,
    caps: DeviceCaps,
    state: Arc<Mutex<NullState>>,
}

impl NullDriver {
    /// Create a driver following `kind`'s conventions with typical limits.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_caps(kind, Self::default_caps(kind))
    }

    /// Create a driver reporting custom limits.
    pub fn with_caps(kind: BackendKind, caps: DeviceCaps) -> Self {
        Self {
            kind,
            caps,
            state: Arc::new(Mutex::new(NullState::default())),
        }
    }

    /// Limits reported by default for `kind`.
    pub fn default_caps(kind: BackendKind) -> DeviceCaps {
        match kind {
            BackendKind::OpenGl => DeviceCaps {
                max_vertex_attributes: 16,
                max_vertex_buffers: 16,
                max_texture_size: 16384,
                max_texture_units: 32,
                max_uniform_buffer_bindings: 36,
                uniform_buffer_offset_alignment: 256,
                max_uniform_block_size: 64 * 1024,
                anisotropic_filtering: true,
                max_anisotropy: 16.0,
                max_buffer_size: 1 << 30,
                max_color_attachments: 8,
            },
            BackendKind::Vulkan => DeviceCaps {
                max_vertex_attributes: 32,
                max_vertex_buffers: 32,
                max_texture_size: 16384,
                max_texture_units: 64,
                max_uniform_buffer_bindings: 90,
                uniform_buffer_offset_alignment: 64,
                max_uniform_block_size: 64 * 1024,
                anisotropic_filtering: true,
                max_anisotropy: 16.0,
                max_buffer_size: 1 << 32,
                max_color_attachments: 8,
            },
        }
    }

    /// Handle for inspecting this driver after it moves into a device.
    pub fn log(&self) -> DriverLog {
        DriverLog {
            state: Arc::clone(&self.state),
        }
    }

    fn record(&self, call: DriverCall) {
        log::trace!("NullDriver: {call:?}");
        self.state.lock().calls.push(call);
    }

    fn check_source(stage: &str, source: &str) -> Result<(), String> {
        if source.trim().is_empty() {
            return Err(format!("{stage} shader: empty source"));
        }
        if let Some(line) = source
            .lines()
            .position(|line| line.trim_start().starts_with("#error"))
        {
            return Err(format!("{stage} shader: 0:{}: #error directive", line + 1));
        }
        Ok(())
    }
}

impl Driver for NullDriver {
    fn name(&self) -> &str {
        match self.kind {
            BackendKind::OpenGl => "Null (OpenGL conventions)",
            BackendKind::Vulkan => "Null (Vulkan conventions)",
        }
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn query_caps(&mut self) -> DeviceCaps {
        self.caps
    }

    fn create_buffer(&mut self, size: u64) -> NativeHandle {
        let handle = {
            let mut state = self.state.lock();
            let handle = state.allocate(NativeKind::Buffer);
            state.buffers.insert(handle, vec![0; size as usize]);
            handle
        };
        self.record(DriverCall::CreateBuffer { handle, size });
        handle
    }

    fn write_buffer(&mut self, buffer: NativeHandle, offset: u64, data: &[u8]) {
        {
            let mut state = self.state.lock();
            state.expect_live(buffer, NativeKind::Buffer);
            let contents = state
                .buffers
                .get_mut(&buffer)
                .unwrap_or_else(|| panic!("buffer {buffer} has no storage"));
            let start = offset as usize;
            let end = start + data.len();
            assert!(
                end <= contents.len(),
                "write of {} bytes at {offset} overflows buffer {buffer} of {} bytes",
                data.len(),
                contents.len()
            );
            contents[start..end].copy_from_slice(data);
        }
        self.record(DriverCall::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> NativeHandle {
        let handle = self.state.lock().allocate(NativeKind::Texture);
        self.record(DriverCall::CreateTexture {
            handle,
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_level_count,
        });
        handle
    }

    fn write_texture(
        &mut self,
        texture: NativeHandle,
        level: u32,
        region: TextureRegion,
        _data: &[u8],
    ) {
        self.state.lock().expect_live(texture, NativeKind::Texture);
        self.record(DriverCall::WriteTexture { texture, level, region });
    }

    fn generate_mipmaps(&mut self, texture: NativeHandle) {
        self.state.lock().expect_live(texture, NativeKind::Texture);
        self.record(DriverCall::GenerateMipmaps(texture));
    }

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> NativeHandle {
        let handle = self.state.lock().allocate(NativeKind::Sampler);
        self.record(DriverCall::CreateSampler(handle));
        handle
    }

    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<NativeHandle, String> {
        let checked = Self::check_source("vertex", vertex_source)
            .and_then(|()| Self::check_source("fragment", fragment_source));
        match checked {
            Ok(()) => {
                let handle = self.state.lock().allocate(NativeKind::Program);
                self.record(DriverCall::CreateProgram(handle));
                Ok(handle)
            }
            Err(log) => {
                self.record(DriverCall::ProgramFailed { log: log.clone() });
                Err(log)
            }
        }
    }

    fn create_framebuffer(
        &mut self,
        colors: &[NativeHandle],
        depth: Option<NativeHandle>,
    ) -> NativeHandle {
        let handle = {
            let mut state = self.state.lock();
            for &color in colors {
                state.expect_live(color, NativeKind::Texture);
            }
            if let Some(depth) = depth {
                state.expect_live(depth, NativeKind::Texture);
            }
            state.allocate(NativeKind::Framebuffer)
        };
        self.record(DriverCall::CreateFramebuffer {
            handle,
            colors: colors.to_vec(),
            depth,
        });
        handle
    }

    fn create_vertex_layout(&mut self, _desc: &VertexDeclarationDescriptor) -> NativeHandle {
        let handle = self.state.lock().allocate(NativeKind::VertexLayout);
        self.record(DriverCall::CreateVertexLayout(handle));
        handle
    }

    fn create_vertex_array(
        &mut self,
        layout: NativeHandle,
        vertex_buffers: &[NativeHandle],
        index_buffer: Option<NativeHandle>,
    ) -> NativeHandle {
        let handle = {
            let mut state = self.state.lock();
            state.expect_live(layout, NativeKind::VertexLayout);
            for &buffer in vertex_buffers.iter().chain(index_buffer.iter()) {
                state.expect_live(buffer, NativeKind::Buffer);
            }
            state.allocate(NativeKind::VertexArray)
        };
        self.record(DriverCall::CreateVertexArray {
            handle,
            layout,
            vertex_buffers: vertex_buffers.to_vec(),
            index_buffer,
        });
        handle
    }

    fn destroy(&mut self, kind: NativeKind, handle: NativeHandle) {
        {
            let mut state = self.state.lock();
            state.expect_live(handle, kind);
            state.live.remove(&handle);
            state.buffers.remove(&handle);
        }
        self.record(DriverCall::Destroy(kind, handle));
    }

    fn bind_render_target(&mut self, framebuffer: Option<NativeHandle>) {
        if let Some(fb) = framebuffer {
            self.state.lock().expect_live(fb, NativeKind::Framebuffer);
        }
        self.record(DriverCall::BindRenderTarget(framebuffer));
    }

    fn clear(&mut self, mask: ClearMask, _values: &ClearValues) {
        self.record(DriverCall::Clear(mask));
    }

    fn set_viewport(&mut self, viewport: &Viewport) {
        self.record(DriverCall::SetViewport(*viewport));
    }

    fn invalidate(&mut self, mask: ClearMask) {
        self.record(DriverCall::Invalidate(mask));
    }

    fn use_program(&mut self, program: Option<NativeHandle>) {
        if let Some(program) = program {
            self.state.lock().expect_live(program, NativeKind::Program);
        }
        self.record(DriverCall::UseProgram(program));
    }

    fn set_raster_state(&mut self, state: &RasterState) {
        self.record(DriverCall::SetRasterState(*state));
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<NativeHandle>) {
        if let Some(vao) = vertex_array {
            self.state.lock().expect_live(vao, NativeKind::VertexArray);
        }
        self.record(DriverCall::BindVertexArray(vertex_array));
    }

    fn bind_vertex_buffers(&mut self, layout: NativeHandle, buffers: &[NativeHandle]) {
        {
            let state = self.state.lock();
            state.expect_live(layout, NativeKind::VertexLayout);
            for &buffer in buffers {
                state.expect_live(buffer, NativeKind::Buffer);
            }
        }
        self.record(DriverCall::BindVertexBuffers {
            layout,
            buffers: buffers.to_vec(),
        });
    }

    fn bind_index_buffer(&mut self, buffer: NativeHandle, format: IndexFormat) {
        self.state.lock().expect_live(buffer, NativeKind::Buffer);
        self.record(DriverCall::BindIndexBuffer(buffer, format));
    }

    fn bind_uniform_buffer(&mut self, slot: u32, buffer: NativeHandle, offset: u64, size: u64) {
        self.state.lock().expect_live(buffer, NativeKind::Buffer);
        self.record(DriverCall::BindUniformBuffer {
            slot,
            buffer,
            offset,
            size,
        });
    }

    fn bind_texture(&mut self, slot: u32, texture: NativeHandle) {
        self.state.lock().expect_live(texture, NativeKind::Texture);
        self.record(DriverCall::BindTexture { slot, texture });
    }

    fn bind_sampler(&mut self, slot: u32, sampler: NativeHandle) {
        self.state.lock().expect_live(sampler, NativeKind::Sampler);
        self.record(DriverCall::BindSampler { slot, sampler });
    }

    fn draw(&mut self, args: &DrawArgs) {
        self.record(DriverCall::Draw(*args));
    }

    fn draw_indexed(&mut self, format: IndexFormat, args: &DrawIndexedArgs) {
        self.record(DriverCall::DrawIndexed(format, *args));
    }
}

impl std::fmt::Debug for NullDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullDriver").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_monotonic() {
        let mut driver = NullDriver::new(BackendKind::OpenGl);
        let a = driver.create_buffer(16);
        let b = driver.create_buffer(16);
        assert!(b > a);
    }

    #[test]
    fn test_buffer_write_is_visible_through_log() {
        let mut driver = NullDriver::new(BackendKind::Vulkan);
        let log = driver.log();
        let buffer = driver.create_buffer(8);
        driver.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(log.buffer_contents(buffer), Some(vec![0, 0, 0, 0, 1, 2, 3, 4]));
        assert_eq!(log.live_count(NativeKind::Buffer), 1);

        driver.destroy(NativeKind::Buffer, buffer);
        assert_eq!(log.total_live(), 0);
        assert_eq!(log.buffer_contents(buffer), None);
    }

    #[test]
    #[should_panic(expected = "overflows buffer")]
    fn test_buffer_overflow_panics() {
        let mut driver = NullDriver::new(BackendKind::OpenGl);
        let buffer = driver.create_buffer(4);
        driver.write_buffer(buffer, 2, &[0; 4]);
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn test_double_destroy_panics() {
        let mut driver = NullDriver::new(BackendKind::OpenGl);
        let sampler = driver.create_sampler(&SamplerDescriptor::default());
        driver.destroy(NativeKind::Sampler, sampler);
        driver.destroy(NativeKind::Sampler, sampler);
    }

    #[test]
    #[should_panic(expected = "used as a Texture")]
    fn test_kind_mismatch_panics() {
        let mut driver = NullDriver::new(BackendKind::OpenGl);
        let buffer = driver.create_buffer(4);
        driver.bind_texture(0, buffer);
    }

    #[test]
    fn test_program_compile_failures() {
        let mut driver = NullDriver::new(BackendKind::OpenGl);
        assert!(driver.create_program("void main() {}", "void main() {}").is_ok());

        let err = driver.create_program("   ", "void main() {}").unwrap_err();
        assert_eq!(err, "vertex shader: empty source");

        let err = driver
            .create_program("void main() {}", "void main() {}\n#error unsupported\n")
            .unwrap_err();
        assert_eq!(err, "fragment shader: 0:2: #error directive");
        assert_eq!(driver.log().live_count(NativeKind::Program), 1);
    }

    #[test]
    fn test_caps_differ_per_backend() {
        let gl = NullDriver::default_caps(BackendKind::OpenGl);
        let vk = NullDriver::default_caps(BackendKind::Vulkan);
        assert_eq!(gl.uniform_buffer_offset_alignment, 256);
        assert_eq!(vk.uniform_buffer_offset_alignment, 64);
    }
}
