//! Graphics device.
//!
//! The [`Device`] owns the command queue and the driver-thread [`Context`],
//! creates resources and command lists, and exposes the limits and clip-space
//! convention of its driver.
//!
//! # Thread Safety
//!
//! `Device` is `Send + Sync`. Resources and command lists may be created and
//! recorded on any thread; [`Device::execute_commands`] must be called on the
//! driver thread (the thread that created the device, unless re-bound with
//! [`Device::bind_driver_thread`]).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ember_core::math::Mat4;
use ember_core::thread::DriverThread;
use parking_lot::Mutex;

use crate::backend::{BackendKind, Driver};
use crate::command::{CmdList, CommandQueue};
use crate::context::{Context, ContextOp, ContextStats};
use crate::error::GraphicsError;
use crate::refcount::SharedRef;
use crate::resources::{
    Buffer, DeviceId, Framebuffer, GpuResource, Program, ResourceCore, ResourceKind, Sampler,
    Texture, VertexDeclaration,
};
use crate::types::{
    BufferDescriptor, BufferKind, FramebufferDescriptor, IndexFormat, ProgramDescriptor,
    SamplerDescriptor, TextureDescriptor, TextureUsage, VertexDeclarationDescriptor,
    max_mip_levels,
};

/// Limits of a device, queried once from the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceCaps {
    /// Maximum vertex attributes in a declaration.
    pub max_vertex_attributes: u32,
    /// Maximum vertex buffers bound at once.
    pub max_vertex_buffers: u32,
    /// Maximum texture width or height.
    pub max_texture_size: u32,
    /// Number of texture units.
    pub max_texture_units: u32,
    /// Number of uniform block binding slots.
    pub max_uniform_buffer_bindings: u32,
    /// Required alignment of uniform buffer binding offsets.
    pub uniform_buffer_offset_alignment: u64,
    /// Maximum size of one uniform block.
    pub max_uniform_block_size: u64,
    /// Whether anisotropic filtering is available.
    pub anisotropic_filtering: bool,
    /// Maximum sampler anisotropy.
    pub max_anisotropy: f32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Maximum colour attachments in a framebuffer.
    pub max_color_attachments: u32,
}

/// Device construction options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    /// Debug label used in logs.
    pub label: Option<String>,
    /// Reject drivers that follow different conventions.
    pub backend: Option<BackendKind>,
    /// Keep a trace of every operation the context executes.
    pub trace_ops: bool,
    /// Cap on commands executed per [`Device::execute_commands`] call.
    pub max_commands_per_drain: Option<usize>,
}

impl DeviceConfig {
    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Require a driver following `backend`'s conventions.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Enable or disable the operation trace.
    pub fn with_trace_ops(mut self, trace_ops: bool) -> Self {
        self.trace_ops = trace_ops;
        self
    }

    /// Execute at most `max` commands per drain.
    pub fn with_max_commands_per_drain(mut self, max: usize) -> Self {
        self.max_commands_per_drain = Some(max);
        self
    }
}

/// Resource factory and owner of the command queue and context.
pub struct Device {
    id: DeviceId,
    label: Option<String>,
    kind: BackendKind,
    caps: DeviceCaps,
    driver_thread: DriverThread,
    context: Mutex<Context>,
    queue: Arc<CommandQueue>,
    live: Arc<AtomicUsize>,
    max_commands_per_drain: Option<usize>,
}

impl Device {
    /// Create a device over `driver`. The calling thread becomes the driver thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver does not follow the requested backend
    /// conventions or the configuration is invalid.
    pub fn new(
        mut driver: Box<dyn Driver>,
        config: DeviceConfig,
    ) -> Result<Arc<Self>, GraphicsError> {
        let kind = driver.kind();
        if let Some(expected) = config.backend
            && expected != kind
        {
            return Err(GraphicsError::InitializationFailed(format!(
                "driver {} follows {kind} conventions, {expected} was requested",
                driver.name()
            )));
        }
        if config.max_commands_per_drain == Some(0) {
            return Err(GraphicsError::InvalidParameter(
                "max_commands_per_drain must be non-zero".to_string(),
            ));
        }

        let caps = driver.query_caps();
        if !caps.uniform_buffer_offset_alignment.is_power_of_two() {
            return Err(GraphicsError::InitializationFailed(format!(
                "driver reported uniform buffer alignment {}",
                caps.uniform_buffer_offset_alignment
            )));
        }

        log::info!(
            "Device {:?}: {} ({kind}), max texture {}",
            config.label.as_deref().unwrap_or("<unnamed>"),
            driver.name(),
            caps.max_texture_size
        );

        let id = DeviceId::next();
        Ok(Arc::new(Self {
            id,
            label: config.label,
            kind,
            caps,
            driver_thread: DriverThread::current(),
            context: Mutex::new(Context::new(driver, id, caps, config.trace_ops)),
            queue: Arc::new(CommandQueue::new()),
            live: Arc::new(AtomicUsize::new(0)),
            max_commands_per_drain: config.max_commands_per_drain,
        }))
    }

    /// Device identity, shared by every resource it creates.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Device limits.
    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    /// Conventions of the driver.
    pub fn backend_kind(&self) -> BackendKind {
        self.kind
    }

    /// Correction for OpenGL-convention projections: `clip_matrix() * projection`.
    pub fn clip_matrix(&self) -> Mat4 {
        self.kind.clip_matrix()
    }

    /// The queue drained by [`execute_commands`](Self::execute_commands).
    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Number of resources whose last shared reference has not been released.
    pub fn live_resource_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Returns true when called on the driver thread.
    pub fn is_driver_thread(&self) -> bool {
        self.driver_thread.is_current()
    }

    /// Make the calling thread the driver thread.
    pub fn bind_driver_thread(&self) {
        let previous = self.driver_thread.rebind_to_current();
        log::debug!("driver thread moved from {previous:?} to {:?}", self.driver_thread.id());
    }

    /// Create an empty command list bound to this device.
    pub fn create_cmd_list(&self) -> CmdList {
        CmdList::new(Arc::clone(&self.queue))
    }

    // ---------------------------------------------------------------------
    // Resource creation
    // ---------------------------------------------------------------------

    fn core(&self, kind: ResourceKind) -> ResourceCore {
        ResourceCore::new(self.id, kind, Arc::downgrade(&self.queue), Arc::clone(&self.live))
    }

    /// Wrap `resource` and run `init` now if the context is free on the driver
    /// thread, otherwise queue it ahead of anything recorded against the handle.
    ///
    /// Immediate init also requires an empty queue: a resource may depend on
    /// others whose own init is still pending, such as a framebuffer over a
    /// texture created on a recording thread.
    fn finish<R: GpuResource>(&self, resource: R, init: fn(&mut Context, &R)) -> SharedRef<R> {
        let resource = SharedRef::new(resource);
        let kind = resource.core().kind();
        if self.driver_thread.is_current()
            && let Some(mut context) = self.context.try_lock()
            && self.queue.is_empty()
        {
            log::trace!("initializing {kind:?} immediately");
            init(&mut context, &resource);
        } else {
            log::trace!("deferring {kind:?} initialization");
            let deferred = resource.clone();
            self.queue.enqueue_one(Box::new(move |context| init(context, &deferred)));
        }
        resource
    }

    fn validate_buffer(&self, desc: &BufferDescriptor, limit: u64) -> Result<(), GraphicsError> {
        if desc.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }
        if desc.size > limit {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "buffer size {} exceeds maximum {limit}",
                desc.size
            )));
        }
        Ok(())
    }

    fn create_buffer(
        &self,
        desc: &BufferDescriptor,
        kind: BufferKind,
        index_format: Option<IndexFormat>,
    ) -> SharedRef<Buffer> {
        let resource_kind = match kind {
            BufferKind::Vertex => ResourceKind::VertexBuffer,
            BufferKind::Index => ResourceKind::IndexBuffer,
            BufferKind::Uniform => ResourceKind::UniformBuffer,
        };
        let buffer = Buffer::new(self.core(resource_kind), kind, desc.clone(), index_format);
        log::trace!("created {kind:?} buffer {:?}, size={}", desc.label, desc.size);
        self.finish(buffer, Context::init_buffer)
    }

    /// Create a vertex buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or exceeds device limits.
    pub fn create_vertex_buffer(
        &self,
        desc: &BufferDescriptor,
    ) -> Result<SharedRef<Buffer>, GraphicsError> {
        self.validate_buffer(desc, self.caps.max_buffer_size)?;
        Ok(self.create_buffer(desc, BufferKind::Vertex, None))
    }

    /// Create an index buffer holding `format` indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero, exceeds device limits, or is not a
    /// whole number of indices.
    pub fn create_index_buffer(
        &self,
        desc: &BufferDescriptor,
        format: IndexFormat,
    ) -> Result<SharedRef<Buffer>, GraphicsError> {
        self.validate_buffer(desc, self.caps.max_buffer_size)?;
        if desc.size % format.size() != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "index buffer size {} is not a multiple of {format:?}",
                desc.size
            )));
        }
        Ok(self.create_buffer(desc, BufferKind::Index, Some(format)))
    }

    /// Create a uniform buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or exceeds the uniform block limit.
    pub fn create_uniform_buffer(
        &self,
        desc: &BufferDescriptor,
    ) -> Result<SharedRef<Buffer>, GraphicsError> {
        let limit = self.caps.max_uniform_block_size.min(self.caps.max_buffer_size);
        self.validate_buffer(desc, limit)?;
        Ok(self.create_buffer(desc, BufferKind::Uniform, None))
    }

    /// Create a 2D texture.
    ///
    /// # Errors
    ///
    /// Returns an error if a dimension is zero or too large, the mip count is
    /// out of range for the size, or no usage is requested.
    pub fn create_texture(
        &self,
        desc: &TextureDescriptor,
    ) -> Result<SharedRef<Texture>, GraphicsError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        let max_dim = self.caps.max_texture_size;
        if desc.width > max_dim || desc.height > max_dim {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "texture {}x{} exceeds maximum dimension {max_dim}",
                desc.width, desc.height
            )));
        }
        let max_mips = max_mip_levels(desc.width, desc.height);
        if desc.mip_level_count == 0 || desc.mip_level_count > max_mips {
            return Err(GraphicsError::InvalidParameter(format!(
                "mip level count {} out of range 1..={max_mips} for {}x{}",
                desc.mip_level_count, desc.width, desc.height
            )));
        }
        if desc.sample_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "sample count cannot be zero".to_string(),
            ));
        }
        if desc.usage.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "texture usage cannot be empty".to_string(),
            ));
        }

        let texture = Texture::new(self.core(ResourceKind::Texture), desc.clone());
        log::trace!(
            "created texture {:?}, size={}x{}",
            desc.label,
            desc.width,
            desc.height
        );
        Ok(self.finish(texture, Context::init_texture))
    }

    /// Create a texture sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if the anisotropy is below 1 or beyond device support.
    pub fn create_sampler(
        &self,
        desc: &SamplerDescriptor,
    ) -> Result<SharedRef<Sampler>, GraphicsError> {
        if desc.max_anisotropy.is_nan() || desc.max_anisotropy < 1.0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "max anisotropy {} must be at least 1",
                desc.max_anisotropy
            )));
        }
        if desc.max_anisotropy > 1.0
            && (!self.caps.anisotropic_filtering || desc.max_anisotropy > self.caps.max_anisotropy)
        {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "anisotropy {} not supported",
                desc.max_anisotropy
            )));
        }
        let sampler = Sampler::new(self.core(ResourceKind::Sampler), desc.clone());
        Ok(self.finish(sampler, Context::init_sampler))
    }

    /// Create a shader program.
    ///
    /// Compilation happens on the driver thread; poll
    /// [`Program::status`](crate::Program::status) for the outcome.
    ///
    /// # Errors
    ///
    /// Currently infallible; compile errors are reported through the status.
    pub fn create_program(
        &self,
        desc: &ProgramDescriptor,
    ) -> Result<SharedRef<Program>, GraphicsError> {
        let program = Program::new(self.core(ResourceKind::Program), desc.clone());
        Ok(self.finish(program, Context::init_program))
    }

    /// Create an offscreen framebuffer.
    ///
    /// # Errors
    ///
    /// Returns an error if attachments are missing, too many, created by
    /// another device, not renderable, or differ in size.
    pub fn create_framebuffer(
        &self,
        desc: &FramebufferDescriptor,
    ) -> Result<SharedRef<Framebuffer>, GraphicsError> {
        let Some(first) = desc.colors.first() else {
            return Err(GraphicsError::InvalidParameter(
                "framebuffer needs at least one colour attachment".to_string(),
            ));
        };
        if desc.colors.len() > self.caps.max_color_attachments as usize {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "{} colour attachments exceed maximum {}",
                desc.colors.len(),
                self.caps.max_color_attachments
            )));
        }

        let size = (first.width(), first.height());
        for (index, texture) in desc.colors.iter().chain(desc.depth.iter()).enumerate() {
            let is_depth = index >= desc.colors.len();
            if texture.core().device_id() != self.id {
                return Err(GraphicsError::ForeignResource(format!(
                    "framebuffer attachment {index}"
                )));
            }
            if !texture.usage().contains(TextureUsage::RENDER_TARGET) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attachment {index} ({:?}) lacks RENDER_TARGET usage",
                    texture.label()
                )));
            }
            if texture.format().is_depth_stencil() != is_depth {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attachment {index} has format {:?}, which does not fit its slot",
                    texture.format()
                )));
            }
            if (texture.width(), texture.height()) != size {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attachment {index} is {}x{}, expected {}x{}",
                    texture.width(),
                    texture.height(),
                    size.0,
                    size.1
                )));
            }
        }

        let framebuffer = Framebuffer::new(
            self.core(ResourceKind::Framebuffer),
            desc.label.clone(),
            desc.colors.clone(),
            desc.depth.clone(),
            size,
        );
        Ok(self.finish(framebuffer, Context::init_framebuffer))
    }

    /// Create a vertex declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration is empty, references a missing
    /// buffer slot, repeats a location, overruns a stride, or exceeds limits.
    pub fn create_vertex_declaration(
        &self,
        desc: &VertexDeclarationDescriptor,
    ) -> Result<SharedRef<VertexDeclaration>, GraphicsError> {
        if desc.buffers.is_empty() || desc.attributes.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "vertex declaration needs at least one buffer and one attribute".to_string(),
            ));
        }
        if desc.attributes.len() > self.caps.max_vertex_attributes as usize {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "{} vertex attributes exceed maximum {}",
                desc.attributes.len(),
                self.caps.max_vertex_attributes
            )));
        }
        if desc.buffers.len() > self.caps.max_vertex_buffers as usize {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "{} vertex buffers exceed maximum {}",
                desc.buffers.len(),
                self.caps.max_vertex_buffers
            )));
        }

        let mut locations = Vec::with_capacity(desc.attributes.len());
        for attribute in &desc.attributes {
            let Some(layout) = desc.buffers.get(attribute.buffer_slot as usize) else {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attribute {} reads missing buffer slot {}",
                    attribute.location, attribute.buffer_slot
                )));
            };
            if attribute.offset + attribute.format.size() > layout.stride {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attribute {} overruns stride {}",
                    attribute.location, layout.stride
                )));
            }
            if locations.contains(&attribute.location) {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attribute location {} used twice",
                    attribute.location
                )));
            }
            locations.push(attribute.location);
        }

        let declaration =
            VertexDeclaration::new(self.core(ResourceKind::VertexDeclaration), desc.clone());
        Ok(self.finish(declaration, Context::init_vertex_declaration))
    }

    // ---------------------------------------------------------------------
    // Driver thread
    // ---------------------------------------------------------------------

    /// Drain the command queue against the context.
    ///
    /// Returns the number of commands executed. Must be called on the driver
    /// thread.
    pub fn execute_commands(&self) -> usize {
        assert!(
            self.driver_thread.is_current(),
            "execute_commands called off the driver thread"
        );
        let Some(mut context) = self.context.try_lock() else {
            panic!("execute_commands re-entered while the context is in use");
        };
        self.queue.drain_and_execute(&mut context, self.max_commands_per_drain)
    }

    /// Drain until the queue stays empty, including releases queued by the
    /// commands themselves. Returns the total executed.
    pub fn execute_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let executed = self.execute_commands();
            if executed == 0 {
                return total;
            }
            total += executed;
        }
    }

    /// Run `f` against the context directly. Must be called on the driver thread.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut Context) -> R) -> R {
        assert!(
            self.driver_thread.is_current(),
            "with_context called off the driver thread"
        );
        f(&mut self.context.lock())
    }

    /// Work counters of the context.
    pub fn context_stats(&self) -> ContextStats {
        self.context.lock().stats()
    }

    /// Take the operation trace. Empty unless enabled in the config.
    pub fn take_op_trace(&self) -> Vec<ContextOp> {
        self.context.lock().take_trace()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.driver_thread.is_current() {
            let context = self.context.get_mut();
            context.reset();
            let mut flushed = 0;
            loop {
                let executed = self.queue.drain_and_execute(context, None);
                if executed == 0 {
                    break;
                }
                flushed += executed;
            }
            context.destroy_vertex_arrays();
            log::debug!("device {:?} dropped, flushed {flushed} commands", self.label);
        } else {
            let mut discarded = 0;
            loop {
                let count = self.queue.discard();
                if count == 0 {
                    break;
                }
                discarded += count;
            }
            log::warn!(
                "device {:?} dropped off the driver thread; discarded {discarded} pending commands",
                self.label
            );
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("label", &self.label)
            .field("backend", &self.kind)
            .field("pending", &self.queue.len())
            .field("live_resources", &self.live_resource_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
