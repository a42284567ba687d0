//! Ocean demo application.

use std::path::Path;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec2, Vec3};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use tracing::info;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};

use thalassa_app::{AppContext, Frame, ThalassaApp, WindowEvent};
use thalassa_gpu::image::max_mip_levels;
use thalassa_gpu::{
    allocate_descriptor_sets, Buffer, DescriptorPoolConfig, DescriptorSetLayoutConfig,
    DescriptorSetUpdate, GraphicsPipelineConfig, Image, ImageConfig, PipelineLayoutConfig,
    SamplerConfig,
};
use thalassa_render::{Camera, CameraUniforms};

use crate::mesh::{Mesh, SkyVertex, VertexUv};

/// Camera field of view in degrees.
const CAMERA_FOV_DEG: f32 = 50.0;

/// Orbit rotation speed in radians per normalized cursor unit.
const ORBIT_SENSITIVITY: f32 = 4.0;

/// Fraction the orbit radius shrinks per zoom-in step.
const ZOOM_STEP: f32 = 0.9;

/// Closest the camera may zoom toward the origin.
const ZOOM_MIN_RADIUS: f32 = 1.3;

/// Farthest the camera may zoom from the origin.
const ZOOM_MAX_RADIUS: f32 = 20.0;

/// Side length of the generated noise texture in texels.
const NOISE_TEXTURE_SIZE: u32 = 256;

/// Noise sample frequency across the texture.
const NOISE_FREQUENCY: f64 = 8.0;

/// Ocean configuration (from CLI or defaults).
#[derive(Debug, Clone)]
pub struct OceanParams {
    pub size: f32,
    pub divisions: u32,
    pub seed: u32,
    pub exposure: f32,
}

impl Default for OceanParams {
    fn default() -> Self {
        Self {
            size: 100.0,
            divisions: 1024,
            seed: 7,
            exposure: 1.0,
        }
    }
}

impl OceanParams {
    /// Parse ocean parameters from command line arguments.
    pub fn from_args() -> Self {
        let mut params = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--size" => {
                    if i + 1 < args.len() {
                        if let Ok(v) = args[i + 1].parse() {
                            params.size = v;
                            i += 1;
                        }
                    }
                }
                "--divisions" => {
                    if i + 1 < args.len() {
                        if let Ok(v) = args[i + 1].parse() {
                            params.divisions = v;
                            i += 1;
                        }
                    }
                }
                "--seed" => {
                    if i + 1 < args.len() {
                        if let Ok(v) = args[i + 1].parse() {
                            params.seed = v;
                            i += 1;
                        }
                    }
                }
                "--exposure" => {
                    if i + 1 < args.len() {
                        if let Ok(v) = args[i + 1].parse() {
                            params.exposure = v;
                            i += 1;
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        params.divisions = params.divisions.max(1);
        params
    }
}

/// One directional light, std140 compatible.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Light {
    /// xyz points toward the light, w is unused.
    direction: [f32; 4],
    /// rgb is the color, a the intensity.
    color: [f32; 4],
}

/// Fragment lighting environment, std140 compatible.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightsUniforms {
    lights: [Light; 3],
    /// rgb is the color, a the intensity.
    ambient: [f32; 4],
}

/// Wave animation parameters, std140 compatible.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct WaveUniforms {
    time: f32,
    exposure: f32,
    _pad: [f32; 2],
}

/// Accumulated mouse input for the orbit camera, drained once per frame.
#[derive(Default)]
struct OrbitController {
    dragging: bool,
    cursor: Option<(f64, f64)>,
    drag: Vec2,
    zoom: f32,
}

impl OrbitController {
    fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some((last_x, last_y)) = self.cursor {
                    if self.dragging {
                        self.drag.x += (position.x - last_x) as f32;
                        self.drag.y += (position.y - last_y) as f32;
                    }
                }
                self.cursor = Some((position.x, position.y));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.zoom += match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 40.0,
                };
            }
            _ => {}
        }
    }

    fn take_drag(&mut self) -> Vec2 {
        std::mem::take(&mut self.drag)
    }

    fn take_zoom(&mut self) -> f32 {
        std::mem::take(&mut self.zoom)
    }
}

/// Ocean demo state.
pub struct OceanApp {
    /// Subdivided plane displaced by the vertex shader.
    ocean_mesh: Mesh,
    /// Unit cube drawn at the far plane around the camera.
    skybox_mesh: Mesh,
    /// Orbiting view over the ocean.
    camera: Camera,
    /// Per-frame-slot camera uniforms.
    camera_buffer: Buffer,
    /// Per-frame-slot wave parameters.
    wave_buffer: Buffer,
    /// Per-frame-slot lighting environment.
    lights_buffer: Buffer,
    /// Tiling noise texture sampled for surface detail.
    noise_image: Image,
    descriptor_pool: vk::DescriptorPool,
    set_layout: vk::DescriptorSetLayout,
    /// One descriptor set per frame slot, offset into the uniform buffers.
    descriptor_sets: Vec<vk::DescriptorSet>,
    pipeline_layout: vk::PipelineLayout,
    ocean_pipeline: vk::Pipeline,
    skybox_pipeline: vk::Pipeline,
    lights: LightsUniforms,
    wave: WaveUniforms,
    elapsed: f32,
    orbit: OrbitController,
}

impl ThalassaApp for OceanApp {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let params = OceanParams::from_args();
        info!(
            "Ocean config: size={} divisions={} seed={} exposure={}",
            params.size, params.divisions, params.seed, params.exposure
        );

        let ocean_mesh = Mesh::plane(&ctx.gpu, params.size, params.divisions)?;
        let skybox_mesh = Mesh::skybox(&ctx.gpu)?;
        info!(
            "Meshes uploaded: {} ocean triangles",
            u64::from(params.divisions) * u64::from(params.divisions) * 2
        );

        let noise_image = create_noise_texture(ctx, params.seed)?;
        info!(
            "Noise texture ready: {0}x{0}, {1} mip levels",
            NOISE_TEXTURE_SIZE,
            max_mip_levels(NOISE_TEXTURE_SIZE, NOISE_TEXTURE_SIZE)
        );

        let frames = ctx.renderer.frames_in_flight();
        let camera_buffer = create_uniform_buffer::<CameraUniforms>(ctx, frames)?;
        let wave_buffer = create_uniform_buffer::<WaveUniforms>(ctx, frames)?;
        let lights_buffer = create_uniform_buffer::<LightsUniforms>(ctx, frames)?;

        let lights = default_lights();
        let wave = WaveUniforms {
            time: 0.0,
            exposure: params.exposure,
            _pad: [0.0; 2],
        };

        let device = ctx.gpu.device();

        // Descriptor sets: one per frame slot over the shared layout.

        let set_layout = DescriptorSetLayoutConfig::new()
            // [Binding 0] Camera
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            // [Binding 1] Wave parameters
            .uniform_buffer(1, vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            // [Binding 2] Lights
            .uniform_buffer(2, vk::ShaderStageFlags::FRAGMENT)
            // [Binding 3] Noise texture
            .combined_image_sampler(3, vk::ShaderStageFlags::FRAGMENT)
            .build(device)?;

        let descriptor_pool = DescriptorPoolConfig::new()
            .pool_size(vk::DescriptorType::UNIFORM_BUFFER, 3 * frames as u32)
            .pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, frames as u32)
            .with_max_sets(frames as u32)
            .build(device)?;

        let layouts = vec![set_layout; frames];
        let descriptor_sets =
            unsafe { allocate_descriptor_sets(device, descriptor_pool, &layouts)? };

        for (slot, set) in descriptor_sets.iter().enumerate() {
            let slot = slot as vk::DeviceSize;
            DescriptorSetUpdate::new(*set)
                .uniform_buffer(0, camera_buffer.descriptor_info_for_element(slot))
                .uniform_buffer(1, wave_buffer.descriptor_info_for_element(slot))
                .uniform_buffer(2, lights_buffer.descriptor_info_for_element(slot))
                .combined_image_sampler(3, noise_image.descriptor_info())
                .update(device);
        }

        // Pipelines: ocean and skybox share the layout and push constant.

        let pipeline_layout = PipelineLayoutConfig::new()
            .set_layout(set_layout)
            // [Push constant] Model matrix
            .push_constant_range(
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                std::mem::size_of::<Mat4>() as u32,
            )
            .build(device)?;

        let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders");

        let mut ocean_config = GraphicsPipelineConfig::new(
            shader_dir.join("ocean.vert.spv"),
            shader_dir.join("ocean.frag.spv"),
        );
        ocean_config.vertex_bindings = vec![VertexUv::binding_description()];
        ocean_config.vertex_attributes = VertexUv::attribute_descriptions();
        let ocean_pipeline = ocean_config.build(
            device,
            ctx.gpu.pipeline_cache(),
            pipeline_layout,
            ctx.renderer.render_pass(),
            0,
        )?;

        let mut skybox_config = GraphicsPipelineConfig::new(
            shader_dir.join("skybox.vert.spv"),
            shader_dir.join("skybox.frag.spv"),
        );
        skybox_config.vertex_bindings = vec![SkyVertex::binding_description()];
        skybox_config.vertex_attributes = SkyVertex::attribute_descriptions();
        let skybox_pipeline = skybox_config.build(
            device,
            ctx.gpu.pipeline_cache(),
            pipeline_layout,
            ctx.renderer.render_pass(),
            0,
        )?;

        let camera = Camera::new(
            Vec3::new(0.0, 1.5, 3.0),
            Vec3::ZERO,
            CAMERA_FOV_DEG.to_radians(),
            ctx.aspect_ratio(),
            0.1,
            100.0,
        );

        info!("Ocean demo initialized");

        Ok(Self {
            ocean_mesh,
            skybox_mesh,
            camera,
            camera_buffer,
            wave_buffer,
            lights_buffer,
            noise_image,
            descriptor_pool,
            set_layout,
            descriptor_sets,
            pipeline_layout,
            ocean_pipeline,
            skybox_pipeline,
            lights,
            wave,
            elapsed: 0.0,
            orbit: OrbitController::default(),
        })
    }

    fn update(&mut self, ctx: &AppContext, dt: f32) {
        self.elapsed += dt;
        self.wave.time = self.elapsed;

        let drag = self.orbit.take_drag();
        let zoom = self.orbit.take_zoom();
        if drag == Vec2::ZERO && zoom == 0.0 {
            return;
        }

        let mut position = self.camera.position;

        if drag != Vec2::ZERO {
            // Normalize cursor motion by the window's larger axis so the
            // rotation speed is resolution independent.
            let window_size = (ctx.width().max(ctx.height())).max(1) as f32;
            let delta = drag / window_size;

            let right = Vec3::Y.cross(-self.camera.direction).normalize_or_zero();
            if right != Vec3::ZERO {
                position = Quat::from_axis_angle(right, -ORBIT_SENSITIVITY * delta.y) * position;
            }
            position = Quat::from_rotation_y(-ORBIT_SENSITIVITY * delta.x) * position;
        }

        if zoom != 0.0 {
            let radius = position.length();
            if zoom > 0.0 && radius > ZOOM_MIN_RADIUS {
                position *= ZOOM_STEP;
            } else if zoom < 0.0 && radius < ZOOM_MAX_RADIUS {
                position /= ZOOM_STEP;
            }
        }

        self.camera.set_position(position);
        self.camera.look_at(Vec3::ZERO);
    }

    fn render(&mut self, ctx: &AppContext, frame: &Frame) -> anyhow::Result<()> {
        let slot = frame.frame_index as vk::DeviceSize;
        let camera_uniforms = self.camera.uniforms();
        self.camera_buffer
            .write_element(bytemuck::bytes_of(&camera_uniforms), slot);
        self.wave_buffer
            .write_element(bytemuck::bytes_of(&self.wave), slot);
        self.lights_buffer
            .write_element(bytemuck::bytes_of(&self.lights), slot);

        let device = ctx.gpu.device();
        let command_buffer = frame.command_buffer;
        let push_stages = vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT;

        unsafe {
            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[self.descriptor_sets[frame.frame_index]],
                &[],
            );

            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.ocean_pipeline,
            );
            let model = Mat4::IDENTITY;
            device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                push_stages,
                0,
                bytemuck::bytes_of(&model),
            );
            self.ocean_mesh.bind(device, command_buffer);
            self.ocean_mesh.draw(device, command_buffer);

            // The skybox rides on the camera so its faces never parallax.
            let sky_model = Mat4::from_translation(self.camera.position);
            device.cmd_push_constants(
                command_buffer,
                self.pipeline_layout,
                push_stages,
                0,
                bytemuck::bytes_of(&sky_model),
            );
            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.skybox_pipeline,
            );
            self.skybox_mesh.bind(device, command_buffer);
            self.skybox_mesh.draw(device, command_buffer);
        }

        Ok(())
    }

    fn on_resize(&mut self, _ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        self.camera.set_aspect(width as f32 / height as f32);
        Ok(())
    }

    fn on_event(&mut self, event: &WindowEvent) -> bool {
        self.orbit.process_event(event);
        false
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        let device = ctx.gpu.device();
        unsafe {
            device.destroy_pipeline(self.ocean_pipeline, None);
            device.destroy_pipeline(self.skybox_pipeline, None);
            device.destroy_pipeline_layout(self.pipeline_layout, None);
            device.destroy_descriptor_pool(self.descriptor_pool, None);
            device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

/// Host-visible uniform buffer with one element per frame slot, mapped
/// for its whole lifetime.
fn create_uniform_buffer<T>(ctx: &AppContext, frames: usize) -> thalassa_gpu::Result<Buffer> {
    let mut buffer = Buffer::new_aligned(
        ctx.gpu.device_arc(),
        ctx.gpu.memory_properties(),
        frames as vk::DeviceSize,
        std::mem::size_of::<T>() as vk::DeviceSize,
        ctx.gpu.limits().min_uniform_buffer_offset_alignment,
        vk::BufferUsageFlags::UNIFORM_BUFFER,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    buffer.map()?;
    Ok(buffer)
}

/// Sampled noise texture with a full mip chain and anisotropic filtering.
fn create_noise_texture(ctx: &AppContext, seed: u32) -> thalassa_gpu::Result<Image> {
    let mut image = Image::new(
        ctx.gpu.device_arc(),
        ctx.gpu.memory_properties(),
        ImageConfig::default_2d(NOISE_TEXTURE_SIZE, NOISE_TEXTURE_SIZE).with_full_mip_chain(),
    )?;

    let texels = noise_texels(NOISE_TEXTURE_SIZE, seed);
    image.upload(
        ctx.gpu.memory_properties(),
        ctx.gpu.command_pool(),
        ctx.gpu.graphics_queue(),
        &texels,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        true,
    )?;

    let sampler = SamplerConfig::linear()
        .with_max_lod(max_mip_levels(NOISE_TEXTURE_SIZE, NOISE_TEXTURE_SIZE) as f32)
        .with_anisotropy(ctx.gpu.limits().max_sampler_anisotropy)
        .build(ctx.gpu.device())?;
    image.set_sampler(sampler);

    Ok(image)
}

/// Grayscale fractal noise texels in RGBA8.
fn noise_texels(size: u32, seed: u32) -> Vec<u8> {
    let fbm = Fbm::<Perlin>::new(seed).set_octaves(4);

    let mut texels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let value = fbm.get([
                f64::from(x) / f64::from(size) * NOISE_FREQUENCY,
                f64::from(y) / f64::from(size) * NOISE_FREQUENCY,
            ]);
            let byte = ((value.clamp(-1.0, 1.0) + 1.0) * 0.5 * 255.0) as u8;
            texels.extend_from_slice(&[byte, byte, byte, 255]);
        }
    }
    texels
}

fn default_lights() -> LightsUniforms {
    LightsUniforms {
        lights: [
            directional_light(90.0, 80.0, [1.0, 1.0, 1.0], 3.0),
            directional_light(-90.0, 25.0, [250.0 / 255.0, 161.0 / 255.0, 161.0 / 255.0], 1.0),
            directional_light(90.0, 25.0, [255.0 / 255.0, 236.0 / 255.0, 122.0 / 255.0], 3.0),
        ],
        ambient: [3.0 / 255.0, 40.0 / 255.0, 84.0 / 255.0, 0.1],
    }
}

/// Directional light whose direction points from the origin toward a
/// position at the given longitude and latitude, in degrees.
fn directional_light(longitude: f32, latitude: f32, color: [f32; 3], intensity: f32) -> Light {
    let direction =
        Quat::from_rotation_y(longitude.to_radians())
            * (Quat::from_rotation_x(-latitude.to_radians()) * Vec3::Z);
    Light {
        direction: [direction.x, direction.y, direction.z, 1.0],
        color: [color[0], color[1], color[2], intensity],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_structs_match_their_std140_sizes() {
        assert_eq!(std::mem::size_of::<Light>(), 32);
        assert_eq!(std::mem::size_of::<LightsUniforms>(), 112);
        assert_eq!(std::mem::size_of::<WaveUniforms>(), 16);
    }

    #[test]
    fn zenith_light_points_straight_up() {
        let light = directional_light(0.0, 90.0, [1.0, 1.0, 1.0], 1.0);
        assert_relative_eq!(light.direction[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction[1], 1.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn longitude_rotates_the_light_around_the_up_axis() {
        let light = directional_light(90.0, 0.0, [1.0, 1.0, 1.0], 1.0);
        assert_relative_eq!(light.direction[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(light.direction[2], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn noise_texels_are_opaque_rgba() {
        let texels = noise_texels(16, 7);
        assert_eq!(texels.len(), 16 * 16 * 4);
        assert!(texels.chunks_exact(4).all(|texel| texel[3] == 255));
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        assert_eq!(noise_texels(8, 42), noise_texels(8, 42));
    }

    #[test]
    fn drained_orbit_input_resets_to_zero() {
        let mut orbit = OrbitController {
            dragging: false,
            cursor: None,
            drag: Vec2::new(3.0, -2.0),
            zoom: 1.5,
        };

        assert_eq!(orbit.take_drag(), Vec2::new(3.0, -2.0));
        assert_eq!(orbit.take_zoom(), 1.5);
        assert_eq!(orbit.take_drag(), Vec2::ZERO);
        assert_eq!(orbit.take_zoom(), 0.0);
    }
}
