//! Graphics and compute pipeline creation.
//!
//! Pipelines target dynamic rendering, so the attachment formats come from
//! the render pass the pipeline was declared against instead of a
//! `VkRenderPass`.

use std::ffi::CString;

use ash::vk;

use crate::backend::{ComputePipelineInputs, GraphicsPipelineInputs};
use crate::error::GraphicsError;
use crate::types::ShaderStage;

use super::conversion::{
    convert_blend_factor, convert_blend_op, convert_compare_op, convert_cull_mode,
    convert_fill_mode, convert_front_face, convert_logic_op, convert_shader_stage,
    convert_stencil_state, convert_texture_format, convert_topology, convert_vertex_format,
    convert_write_mask,
};
use super::device::DeviceFeatures;
use super::resources::{VulkanPipelineLayout, VulkanShaderModule};

fn entry_point(stage: &ShaderStage) -> Result<CString, GraphicsError> {
    CString::new(stage.entry_point.as_str()).map_err(|_| {
        GraphicsError::InvalidParameter(format!(
            "entry point {:?} contains a NUL byte",
            stage.entry_point
        ))
    })
}

fn pipeline_error(label: &Option<String>, e: vk::Result) -> GraphicsError {
    match e {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            GraphicsError::OutOfMemory
        }
        other => GraphicsError::ResourceCreationFailed(format!(
            "pipeline {:?}: {:?}",
            label, other
        )),
    }
}

pub(super) fn create_graphics_pipeline(
    device: &ash::Device,
    features: &DeviceFeatures,
    inputs: &GraphicsPipelineInputs<'_>,
    modules: &[&VulkanShaderModule],
    layout: &VulkanPipelineLayout,
) -> Result<vk::Pipeline, GraphicsError> {
    let desc = inputs.desc;

    let names = inputs
        .stages
        .iter()
        .map(|(_, stage)| entry_point(stage))
        .collect::<Result<Vec<_>, _>>()?;
    let stages: Vec<vk::PipelineShaderStageCreateInfo> = inputs
        .stages
        .iter()
        .zip(modules)
        .zip(&names)
        .map(|(((_, stage), module), name)| {
            vk::PipelineShaderStageCreateInfo::default()
                .stage(convert_shader_stage(stage.stage))
                .module(module.module)
                .name(name)
        })
        .collect();

    let vertex_bindings: Vec<vk::VertexInputBindingDescription> = desc
        .vertex_input
        .bindings
        .iter()
        .map(|binding| vk::VertexInputBindingDescription {
            binding: u32::from(binding.binding),
            stride: u32::from(binding.stride),
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let vertex_attributes: Vec<vk::VertexInputAttributeDescription> = desc
        .vertex_input
        .elements
        .iter()
        .map(|element| vk::VertexInputAttributeDescription {
            location: u32::from(element.location),
            binding: u32::from(element.binding_index),
            format: convert_vertex_format(element.format),
            offset: u32::from(element.offset),
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_bindings)
        .vertex_attribute_descriptions(&vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(convert_topology(desc.input_assembly.topology))
        .primitive_restart_enable(desc.input_assembly.primitive_restart);

    // viewport and scissor are dynamic
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let raster = &desc.raster_state;
    let depth_clamp = !raster.depth_clip && features.depth_clamp;
    if !raster.depth_clip && !features.depth_clamp {
        log::warn!("depth clamp unsupported, pipeline {:?} keeps depth clipping", desc.label);
    }
    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(depth_clamp)
        .polygon_mode(convert_fill_mode(raster.fill_mode))
        .cull_mode(convert_cull_mode(raster.cull_mode))
        .front_face(convert_front_face(raster.front))
        .depth_bias_enable(raster.depth_bias)
        .depth_bias_constant_factor(raster.depth_bias_constant_factor)
        .depth_bias_slope_factor(raster.depth_bias_slope_factor)
        .depth_bias_clamp(raster.depth_bias_clamp)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let ds = &desc.depth_stencil;
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(ds.depth_test)
        .depth_write_enable(ds.depth_write)
        .depth_compare_op(convert_compare_op(ds.depth_compare))
        .stencil_test_enable(ds.stencil_test)
        .front(convert_stencil_state(
            &ds.front,
            ds.stencil_read_mask,
            ds.stencil_write_mask,
            ds.stencil_ref,
        ))
        .back(convert_stencil_state(
            &ds.back,
            ds.stencil_read_mask,
            ds.stencil_write_mask,
            ds.stencil_ref,
        ));

    let blending = &desc.color_blending;
    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0..inputs
        .color_formats
        .len())
        .map(|i| {
            let attachment = blending.attachments.get(i).copied().unwrap_or_default();
            vk::PipelineColorBlendAttachmentState {
                blend_enable: attachment.blend_enable.into(),
                src_color_blend_factor: convert_blend_factor(attachment.src_color),
                dst_color_blend_factor: convert_blend_factor(attachment.dst_color),
                color_blend_op: convert_blend_op(attachment.color_op),
                src_alpha_blend_factor: convert_blend_factor(attachment.src_alpha),
                dst_alpha_blend_factor: convert_blend_factor(attachment.dst_alpha),
                alpha_blend_op: convert_blend_op(attachment.alpha_op),
                color_write_mask: convert_write_mask(attachment.write_mask),
            }
        })
        .collect();
    let logic_op = convert_logic_op(blending.logic_op).filter(|_| {
        if !features.logic_op {
            log::warn!("logic op unsupported, ignored for pipeline {:?}", desc.label);
        }
        features.logic_op
    });
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(logic_op.is_some())
        .logic_op(logic_op.unwrap_or(vk::LogicOp::COPY))
        .attachments(&blend_attachments)
        .blend_constants(blending.blend_factor);

    let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    if blending.dynamic_blend_factor {
        dynamic_states.push(vk::DynamicState::BLEND_CONSTANTS);
    }
    if ds.dynamic_stencil_ref {
        dynamic_states.push(vk::DynamicState::STENCIL_REFERENCE);
    }
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let color_formats: Vec<vk::Format> = inputs
        .color_formats
        .iter()
        .map(|format| convert_texture_format(*format))
        .collect();
    let depth_format = inputs
        .depth_format
        .map_or(vk::Format::UNDEFINED, convert_texture_format);
    let stencil_format = match inputs.depth_format {
        Some(format) if format.has_stencil() => depth_format,
        _ => vk::Format::UNDEFINED,
    };
    let mut rendering = vk::PipelineRenderingCreateInfo::default()
        .color_attachment_formats(&color_formats)
        .depth_attachment_format(depth_format)
        .stencil_attachment_format(stencil_format);

    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(layout.layout)
        .push_next(&mut rendering);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| pipeline_error(&desc.label, e))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::Internal("driver returned no pipeline".into()))
}

pub(super) fn create_compute_pipeline(
    device: &ash::Device,
    inputs: &ComputePipelineInputs<'_>,
    module: &VulkanShaderModule,
    layout: &VulkanPipelineLayout,
) -> Result<vk::Pipeline, GraphicsError> {
    let name = entry_point(&inputs.desc.stage)?;
    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module.module)
        .name(&name);
    let create_info = vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(layout.layout);

    let pipelines = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
    }
    .map_err(|(_, e)| pipeline_error(&inputs.desc.label, e))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::Internal("driver returned no pipeline".into()))
}
