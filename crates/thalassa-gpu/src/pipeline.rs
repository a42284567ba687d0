//! Pipeline layout and graphics pipeline creation.

use std::path::{Path, PathBuf};

use ash::vk;

use crate::error::{GpuError, Result};
use crate::shader;

/// Pipeline layout description.
#[derive(Default, Clone)]
pub struct PipelineLayoutConfig {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineLayoutConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor set layout.
    #[must_use]
    pub fn set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Append a push constant range.
    #[must_use]
    pub fn push_constant_range(
        mut self,
        stages: vk::ShaderStageFlags,
        offset: u32,
        size: u32,
    ) -> Self {
        self.push_constant_ranges.push(
            vk::PushConstantRange::default()
                .stage_flags(stages)
                .offset(offset)
                .size(size),
        );
        self
    }

    /// Build the pipeline layout.
    pub fn build(&self, device: &ash::Device) -> Result<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(&self.push_constant_ranges);

        let layout = unsafe { device.create_pipeline_layout(&create_info, None)? };
        Ok(layout)
    }
}

/// Shader stages and fixed function state for one graphics pipeline.
///
/// Viewport and scissor are always dynamic states, so a pipeline survives
/// swapchain recreation; record them each frame instead.
#[derive(Clone)]
pub struct GraphicsPipelineConfig {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub tessellation_control_shader: Option<PathBuf>,
    pub tessellation_evaluation_shader: Option<PathBuf>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub topology: vk::PrimitiveTopology,
    /// When non-zero the input assembly topology becomes `PATCH_LIST`.
    pub patch_control_points: u32,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: vk::CompareOp,
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::new(),
            fragment_shader: PathBuf::new(),
            tessellation_control_shader: None,
            tessellation_evaluation_shader: None,
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            patch_control_points: 0,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS_OR_EQUAL,
        }
    }
}

impl GraphicsPipelineConfig {
    /// Config with default fixed function state for a vertex/fragment pair.
    pub fn new(vertex_shader: impl Into<PathBuf>, fragment_shader: impl Into<PathBuf>) -> Self {
        Self {
            vertex_shader: vertex_shader.into(),
            fragment_shader: fragment_shader.into(),
            ..Self::default()
        }
    }

    /// Shader stages in pipeline order.
    ///
    /// # Panics
    /// Panics when only one of the two tessellation shaders is set.
    fn stage_paths(&self) -> Vec<(vk::ShaderStageFlags, &Path)> {
        assert_eq!(
            self.tessellation_control_shader.is_some(),
            self.tessellation_evaluation_shader.is_some(),
            "tessellation requires both a control and an evaluation shader"
        );

        let mut stages = vec![(vk::ShaderStageFlags::VERTEX, self.vertex_shader.as_path())];
        if let Some(control) = self.tessellation_control_shader.as_deref() {
            stages.push((vk::ShaderStageFlags::TESSELLATION_CONTROL, control));
        }
        if let Some(evaluation) = self.tessellation_evaluation_shader.as_deref() {
            stages.push((vk::ShaderStageFlags::TESSELLATION_EVALUATION, evaluation));
        }
        stages.push((vk::ShaderStageFlags::FRAGMENT, self.fragment_shader.as_path()));
        stages
    }

    fn effective_topology(&self) -> vk::PrimitiveTopology {
        if self.patch_control_points > 0 {
            vk::PrimitiveTopology::PATCH_LIST
        } else {
            self.topology
        }
    }

    /// Build the pipeline against one subpass of `render_pass`.
    ///
    /// Shader modules are loaded from disk and destroyed again once the
    /// pipeline is linked.
    pub fn build(
        &self,
        device: &ash::Device,
        cache: vk::PipelineCache,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        subpass: u32,
    ) -> Result<vk::Pipeline> {
        let mut modules = Vec::new();
        let mut shader_stages = Vec::new();
        for (stage, path) in self.stage_paths() {
            let module = match shader::load_shader_module(device, path) {
                Ok(module) => module,
                Err(err) => {
                    unsafe { destroy_modules(device, &modules) };
                    return Err(err);
                }
            };
            modules.push(module);
            shader_stages.push(
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage)
                    .module(module)
                    .name(c"main"),
            );
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.effective_topology())
            .primitive_restart_enable(false);

        let tessellation_state = vk::PipelineTessellationStateCreateInfo::default()
            .patch_control_points(self.patch_control_points);

        // Viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA);

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(std::slice::from_ref(&color_blend_attachment));

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(subpass);

        if self.patch_control_points > 0 {
            pipeline_info = pipeline_info.tessellation_state(&tessellation_state);
        }

        let result = unsafe { device.create_graphics_pipelines(cache, &[pipeline_info], None) };

        // The modules are only inputs to pipeline linking.
        unsafe { destroy_modules(device, &modules) };

        let pipelines = result
            .map_err(|(_pipelines, result)| GpuError::PipelineCreation(result.to_string()))?;
        Ok(pipelines[0])
    }
}

unsafe fn destroy_modules(device: &ash::Device, modules: &[vk::ShaderModule]) {
    for &module in modules {
        unsafe { device.destroy_shader_module(module, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_matches_the_fixed_function_contract() {
        let config = GraphicsPipelineConfig::default();

        assert_eq!(config.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(config.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(config.cull_mode, vk::CullModeFlags::NONE);
        assert_eq!(config.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert!(config.depth_test);
        assert!(config.depth_write);
        assert_eq!(config.depth_compare, vk::CompareOp::LESS_OR_EQUAL);
    }

    #[test]
    fn plain_configs_keep_their_topology() {
        let config = GraphicsPipelineConfig {
            topology: vk::PrimitiveTopology::LINE_LIST,
            ..GraphicsPipelineConfig::default()
        };

        assert_eq!(config.effective_topology(), vk::PrimitiveTopology::LINE_LIST);
    }

    #[test]
    fn patch_control_points_force_a_patch_list_topology() {
        let config = GraphicsPipelineConfig {
            patch_control_points: 4,
            ..GraphicsPipelineConfig::default()
        };

        assert_eq!(config.effective_topology(), vk::PrimitiveTopology::PATCH_LIST);
    }

    #[test]
    fn stage_list_covers_the_tessellation_pair() {
        let config = GraphicsPipelineConfig {
            tessellation_control_shader: Some(PathBuf::from("wave.tesc.spv")),
            tessellation_evaluation_shader: Some(PathBuf::from("wave.tese.spv")),
            ..GraphicsPipelineConfig::new("wave.vert.spv", "wave.frag.spv")
        };

        let stages: Vec<vk::ShaderStageFlags> =
            config.stage_paths().iter().map(|(stage, _)| *stage).collect();
        assert_eq!(
            stages,
            [
                vk::ShaderStageFlags::VERTEX,
                vk::ShaderStageFlags::TESSELLATION_CONTROL,
                vk::ShaderStageFlags::TESSELLATION_EVALUATION,
                vk::ShaderStageFlags::FRAGMENT,
            ]
        );
    }

    #[test]
    #[should_panic(expected = "tessellation requires both a control and an evaluation shader")]
    fn lone_tessellation_control_shader_panics() {
        let config = GraphicsPipelineConfig {
            tessellation_control_shader: Some(PathBuf::from("wave.tesc.spv")),
            ..GraphicsPipelineConfig::new("wave.vert.spv", "wave.frag.spv")
        };

        let _ = config.stage_paths();
    }
}
