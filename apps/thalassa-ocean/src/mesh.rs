//! Static meshes staged into device-local memory.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use thalassa_gpu::{record_buffer_copy, Buffer, GpuContext};

/// Vertex with a position and texture coordinates.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexUv {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
}

impl VertexUv {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(std::mem::offset_of!(Self, tex_coord) as u32),
        ]
    }
}

/// Position-only vertex for the skybox cube.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SkyVertex {
    pub position: [f32; 3],
}

impl SkyVertex {
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32B32_SFLOAT)
            .offset(0)]
    }
}

/// Indexed triangle mesh in device-local vertex and index buffers.
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl Mesh {
    /// Flat XZ grid of `divisions`x`divisions` quads spanning `size`
    /// world units, centered on the origin. Texture coordinates run
    /// from (0, 0) to (1, 1) across the whole plane.
    pub fn plane(gpu: &GpuContext, size: f32, divisions: u32) -> thalassa_gpu::Result<Self> {
        let (vertices, indices) = plane_geometry(size, divisions);
        Self::from_data(gpu, &vertices, &indices)
    }

    /// Unit cube around the origin, faces pointing inward.
    pub fn skybox(gpu: &GpuContext) -> thalassa_gpu::Result<Self> {
        let (vertices, indices) = skybox_geometry();
        Self::from_data(gpu, &vertices, &indices)
    }

    fn from_data<V: Pod>(
        gpu: &GpuContext,
        vertices: &[V],
        indices: &[u32],
    ) -> thalassa_gpu::Result<Self> {
        let device = gpu.device_arc();
        let memory_properties = gpu.memory_properties();

        let mut vertex_staging = Buffer::new(
            device.clone(),
            memory_properties,
            vertices.len() as vk::DeviceSize,
            std::mem::size_of::<V>() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        vertex_staging.map()?;
        vertex_staging.write_to_buffer(bytemuck::cast_slice(vertices), 0);
        vertex_staging.unmap();

        let vertex_buffer = Buffer::new(
            device.clone(),
            memory_properties,
            vertices.len() as vk::DeviceSize,
            std::mem::size_of::<V>() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        let mut index_staging = Buffer::new(
            device.clone(),
            memory_properties,
            indices.len() as vk::DeviceSize,
            std::mem::size_of::<u32>() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        index_staging.map()?;
        index_staging.write_to_buffer(bytemuck::cast_slice(indices), 0);
        index_staging.unmap();

        let index_buffer = Buffer::new(
            device.clone(),
            memory_properties,
            indices.len() as vk::DeviceSize,
            std::mem::size_of::<u32>() as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        gpu.execute_single_time_commands(|cb| {
            unsafe {
                record_buffer_copy(&device, cb, &vertex_staging, &vertex_buffer);
                record_buffer_copy(&device, cb, &index_staging, &index_buffer);
            }
            Ok(())
        })?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Bind vertex and index buffers.
    ///
    /// # Safety
    /// The command buffer must be recording.
    pub unsafe fn bind(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.vertex_buffer.handle()], &[0]);
            device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );
        }
    }

    /// Issue one indexed draw covering the whole mesh.
    ///
    /// # Safety
    /// The command buffer must be recording with this mesh bound.
    pub unsafe fn draw(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        unsafe {
            device.cmd_draw_indexed(command_buffer, self.index_count, 1, 0, 0, 0);
        }
    }
}

fn plane_geometry(size: f32, divisions: u32) -> (Vec<VertexUv>, Vec<u32>) {
    assert!(divisions > 0, "plane needs at least one division");

    let side = divisions + 1;
    let step = 1.0 / divisions as f32;

    let mut vertices = Vec::with_capacity((side * side) as usize);
    for i in 0..side {
        for j in 0..side {
            let x = (i as f32 - 0.5 * divisions as f32) * size / divisions as f32;
            let z = (j as f32 - 0.5 * divisions as f32) * size / divisions as f32;
            vertices.push(VertexUv {
                position: [x, 0.0, z],
                tex_coord: [i as f32 * step, j as f32 * step],
            });
        }
    }

    let mut indices = Vec::with_capacity((divisions * divisions * 6) as usize);
    for i in 0..divisions {
        for j in 0..divisions {
            indices.push(i * side + j);
            indices.push((i + 1) * side + j);
            indices.push(i * side + j + 1);

            indices.push((i + 1) * side + j);
            indices.push((i + 1) * side + j + 1);
            indices.push(i * side + j + 1);
        }
    }

    (vertices, indices)
}

fn skybox_geometry() -> (Vec<SkyVertex>, Vec<u32>) {
    // Corner layout:
    //
    //   7--------6
    //  /|       /|
    // 4--------5 |
    // | |      | |
    // | 3------|-2
    // |/       |/
    // 0--------1
    let corners = [
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, -1.0, -1.0],
        [-1.0, -1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
    ];
    let vertices = corners
        .into_iter()
        .map(|position| SkyVertex { position })
        .collect();

    #[rustfmt::skip]
    let indices = vec![
        1, 2, 6, 6, 5, 1, // Right
        0, 4, 7, 7, 3, 0, // Left
        4, 5, 6, 6, 7, 4, // Top
        0, 3, 2, 2, 1, 0, // Bottom
        0, 1, 5, 5, 4, 0, // Back
        3, 7, 6, 6, 2, 3, // Front
    ];

    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_vertex_and_index_counts_match_the_grid() {
        let (vertices, indices) = plane_geometry(10.0, 4);
        assert_eq!(vertices.len(), 25);
        assert_eq!(indices.len(), 4 * 4 * 6);
    }

    #[test]
    fn plane_is_centered_and_spans_the_requested_size() {
        let (vertices, _) = plane_geometry(100.0, 8);

        let first = vertices.first().unwrap();
        let last = vertices.last().unwrap();
        assert_eq!(first.position, [-50.0, 0.0, -50.0]);
        assert_eq!(last.position, [50.0, 0.0, 50.0]);
        assert_eq!(first.tex_coord, [0.0, 0.0]);
        assert_eq!(last.tex_coord, [1.0, 1.0]);
    }

    #[test]
    fn plane_indices_stay_in_bounds() {
        let (vertices, indices) = plane_geometry(1.0, 7);
        let max = indices.iter().max().copied().unwrap();
        assert!((max as usize) < vertices.len());
    }

    #[test]
    fn skybox_is_a_unit_cube() {
        let (vertices, indices) = skybox_geometry();
        assert_eq!(vertices.len(), 8);
        assert_eq!(indices.len(), 36);
        for vertex in &vertices {
            for coordinate in vertex.position {
                assert_eq!(coordinate.abs(), 1.0);
            }
        }
    }

    #[test]
    fn vertex_layout_matches_the_shader_inputs() {
        let attributes = VertexUv::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(VertexUv::binding_description().stride, 20);
        assert_eq!(SkyVertex::binding_description().stride, 12);
    }
}
