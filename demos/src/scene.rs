//! A small scene that touches every stage of the device.
//!
//! Shared resources are created once on the driver thread. Producer threads
//! each own an offscreen framebuffer; every frame they create a transient
//! uniform buffer, render a handful of quads into their target and drop the
//! buffer again, so its native object is released through the queue.

use std::sync::Arc;

use ember_core::math::{Mat4, Vec3, orthographic_gl};
use ember_core::memory::Memory;
use ember_core::window::Window;
use ember_graphics::types::{
    BufferUsage, FramebufferDescriptor, PipelineState, RasterState, RenderPassDescriptor,
    SamplerDescriptor, TextureRegion, VertexAttribute, VertexBufferLayout,
    VertexDeclarationDescriptor, VertexFormat,
};
use ember_graphics::{
    Buffer, BufferDescriptor, Device, Framebuffer, GraphicsError, IndexFormat, ProgramDescriptor,
    Sampler, SharedRef, Texture, TextureDescriptor, TextureFormat, TextureUsage,
};

const VERTEX_SHADER: &str = "\
#version 330 core
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;
layout(std140) uniform Transform { mat4 u_mvp; };
out vec2 v_uv;
void main() {
    v_uv = a_uv;
    gl_Position = u_mvp * vec4(a_position, 1.0);
}
";

const FRAGMENT_SHADER: &str = "\
#version 330 core
in vec2 v_uv;
uniform sampler2D u_texture;
out vec4 o_color;
void main() {
    o_color = texture(u_texture, v_uv);
}
";

/// Position and texture coordinate.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    uv: [f32; 2],
}

const QUAD: [Vertex; 4] = [
    Vertex { position: [-0.5, -0.5, 0.0], uv: [0.0, 0.0] },
    Vertex { position: [0.5, -0.5, 0.0], uv: [1.0, 0.0] },
    Vertex { position: [-0.5, 0.5, 0.0], uv: [0.0, 1.0] },
    Vertex { position: [0.5, 0.5, 0.0], uv: [1.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

const UNIFORM_SIZE: u64 = std::mem::size_of::<[f32; 16]>() as u64;

/// Resources shared by every producer, plus one offscreen target per producer.
pub struct DemoScene {
    pipeline: PipelineState,
    vertices: SharedRef<Buffer>,
    indices: SharedRef<Buffer>,
    checker: SharedRef<Texture>,
    sampler: SharedRef<Sampler>,
    targets: Vec<SharedRef<Framebuffer>>,
    target_size: u32,
    projection: Mat4,
    device: Arc<Device>,
}

impl DemoScene {
    /// Create the scene resources and queue their initial contents.
    ///
    /// # Errors
    ///
    /// Returns an error if any resource descriptor is rejected by the device.
    pub fn new(
        device: Arc<Device>,
        producers: usize,
        target_size: u32,
    ) -> Result<Self, GraphicsError> {
        let declaration = device.create_vertex_declaration(
            &VertexDeclarationDescriptor::new()
                .with_label("position_uv")
                .with_buffer(VertexBufferLayout::new(std::mem::size_of::<Vertex>() as u32))
                .with_attribute(VertexAttribute::new(0, 0, 0, VertexFormat::Float32x3))
                .with_attribute(VertexAttribute::new(1, 0, 12, VertexFormat::Float32x2)),
        )?;
        let program = device.create_program(
            &ProgramDescriptor::new(VERTEX_SHADER, FRAGMENT_SHADER).with_label("textured"),
        )?;

        let vertices = device.create_vertex_buffer(
            &BufferDescriptor::new(std::mem::size_of_val(&QUAD) as u64, BufferUsage::Static)
                .with_label("quad_vertices"),
        )?;
        let indices = device.create_index_buffer(
            &BufferDescriptor::new(std::mem::size_of_val(&QUAD_INDICES) as u64, BufferUsage::Static)
                .with_label("quad_indices"),
            IndexFormat::Uint16,
        )?;

        let checker = device.create_texture(
            &TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::SAMPLED | TextureUsage::UPLOAD,
            )
            .with_label("checker")
            .with_full_mip_chain(),
        )?;
        let sampler = device.create_sampler(&SamplerDescriptor::nearest().with_label("point"))?;

        let mut targets = Vec::with_capacity(producers);
        for producer in 0..producers {
            let color = device.create_texture(
                &TextureDescriptor::new_2d(
                    target_size,
                    target_size,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::RENDER_TARGET | TextureUsage::SAMPLED,
                )
                .with_label(format!("producer_{producer}_color")),
            )?;
            let depth = device.create_texture(
                &TextureDescriptor::new_2d(
                    target_size,
                    target_size,
                    TextureFormat::Depth24PlusStencil8,
                    TextureUsage::RENDER_TARGET,
                )
                .with_label(format!("producer_{producer}_depth")),
            )?;
            targets.push(device.create_framebuffer(
                &FramebufferDescriptor::new(color)
                    .with_depth(depth)
                    .with_label(format!("producer_{producer}")),
            )?);
        }

        let mut upload = device.create_cmd_list();
        upload.update_vertex_buffer(&vertices, 0, vertices.size(), Memory::from_pod(&QUAD));
        upload.update_index_buffer(&indices, 0, indices.size(), Memory::from_pod(&QUAD_INDICES));
        let texels = Memory::from_vec(checkerboard(8));
        upload.update_texture_2d(&checker, 0, TextureRegion::full(8, 8), texels);
        upload.generate_mipmaps(&checker);
        upload.commit();

        let projection = device.clip_matrix() * orthographic_gl(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        log::info!(
            "scene ready: {producers} targets of {target_size}x{target_size}, {} backend",
            device.backend_kind()
        );

        Ok(Self {
            pipeline: PipelineState::new(program, declaration)
                .with_raster(RasterState::transparent()),
            vertices,
            indices,
            checker,
            sampler,
            targets,
            target_size,
            projection,
            device,
        })
    }

    /// Number of offscreen targets.
    pub fn producers(&self) -> usize {
        self.targets.len()
    }

    /// Record and commit one producer's offscreen pass. Callable from any thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the transient uniform buffer cannot be created.
    pub fn record_offscreen(
        &self,
        producer: usize,
        frame: u64,
        draws: u32,
    ) -> Result<usize, GraphicsError> {
        let uniforms = self.device.create_uniform_buffer(
            &BufferDescriptor::new(UNIFORM_SIZE, BufferUsage::Stream).with_label("transform"),
        )?;
        let angle = frame as f32 * 0.05 + producer as f32;
        let model = Mat4::new_rotation(Vec3::z() * angle);
        let mvp = self.projection * model;

        let mut cmd = self.device.create_cmd_list();
        cmd.update_uniform_buffer(&uniforms, 0, UNIFORM_SIZE, Memory::from_pod(mvp.as_slice()));
        cmd.begin_render_pass(
            RenderPassDescriptor::default()
                .with_label(format!("producer_{producer}"))
                .with_clear_color([0.1, 0.1, 0.1 * producer as f32, 1.0]),
            self.targets[producer].clone(),
        );
        cmd.bind_pipeline_state(&self.pipeline);
        cmd.bind_vertex_buffers(&[self.vertices.clone()]);
        cmd.bind_index_buffer(&self.indices);
        cmd.bind_uniform_buffer(0, &uniforms, 0, UNIFORM_SIZE);
        cmd.bind_texture(0, &self.checker);
        cmd.bind_sampler(0, &self.sampler);
        for instance in 0..draws {
            cmd.draw_indexed(6, 0, 0, 1, instance);
        }
        cmd.end_render_pass();
        Ok(cmd.commit())
    }

    /// Record and commit the pass that shows the first target on `window`.
    pub fn record_present(&self, window: &Arc<dyn Window>) -> usize {
        let Some(first) = self.targets.first() else {
            return 0;
        };
        let shown = first.color_attachments()[0].clone();

        let mut cmd = self.device.create_cmd_list();
        cmd.begin_scene();
        let desc = RenderPassDescriptor::default().with_label("present");
        cmd.begin_render_pass(desc, Arc::clone(window));
        cmd.bind_pipeline_state(&self.pipeline);
        cmd.bind_vertex_buffers(&[self.vertices.clone()]);
        cmd.bind_index_buffer(&self.indices);
        cmd.bind_texture(0, &shown);
        cmd.bind_sampler(0, &self.sampler);
        cmd.draw_indexed(6, 0, 0, 1, 0);
        cmd.end_render_pass();
        cmd.end_scene();
        cmd.swap_buffers(Arc::clone(window));
        cmd.commit()
    }

    /// Size of each offscreen target.
    pub fn target_size(&self) -> u32 {
        self.target_size
    }
}

/// Two-colour checkerboard in RGBA8.
fn checkerboard(size: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x + y) % 2 == 0 { [255, 255, 255, 255] } else { [40, 40, 40, 255] }
        })
        .collect()
}
