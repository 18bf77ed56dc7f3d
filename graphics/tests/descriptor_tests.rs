//! Descriptor layout, set and pipeline layout tests.

mod common;

use rstest::rstest;

use common::{Backend, TestContext};
use verglas_graphics::descriptor::unpack_binding_index;
use verglas_graphics::{
    BindPoint, BufferUsage, BufferViewAccess, BufferViewDesc, Command, DescriptorBindingDesc,
    DescriptorBindingType, DescriptorData, DescriptorSetDesc, DescriptorSetLayoutHandle,
    DescriptorSetWriteInfo, DiagnosticCatcher, MAX_PUSH_CONSTANT_BYTES,
    MemoryPlacement, PipelineLayoutDesc, PushConstantDesc, RangeKind, SamplerDesc,
    ShaderVisibility, TextureCreateDesc, TextureDesc, TextureFormat, TextureLayout, TextureUsage,
    TextureViewDesc,
};

fn binding(binding_type: DescriptorBindingType) -> DescriptorBindingDesc {
    DescriptorBindingDesc::new(binding_type, ShaderVisibility::ALL)
}

/// `[CBV, SRV, SRV, Sampler]`, the layout most tests use.
fn material_layout(ctx: &TestContext) -> (DescriptorSetLayoutHandle, [u32; 4]) {
    let desc = DescriptorSetDesc::new(vec![
        binding(DescriptorBindingType::ConstantBuffer),
        binding(DescriptorBindingType::SampledTexture),
        binding(DescriptorBindingType::SampledTexture),
        binding(DescriptorBindingType::Sampler),
    ])
    .with_label("material");
    let mut indices = [0u32; 4];
    let layout = ctx
        .context
        .create_descriptor_set_layout(&desc, &mut indices);
    assert!(layout.is_valid());
    (layout, indices)
}

// ============================================================================
// Layouts
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_binding_indices_are_packed_per_range(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (_, indices) = material_layout(&ctx);

    assert_eq!(
        indices.map(|i| i & 0xFFFF),
        [
            RangeKind::Cbv as u32,
            RangeKind::Srv as u32,
            RangeKind::Srv as u32,
            RangeKind::Sampler as u32
        ]
    );
    assert_eq!(indices.map(|i| i >> 16), [0, 0, 1, 0]);
    assert_eq!(indices, [0, 1, 1 | (1 << 16), 3]);
    assert_eq!(unpack_binding_index(indices[2]), Some((RangeKind::Srv, 1)));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_arrays_and_pinned_offsets(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let desc = DescriptorSetDesc::new(vec![
        binding(DescriptorBindingType::SampledTexture).with_count(4),
        binding(DescriptorBindingType::StorageReadOnlyBuffer),
        binding(DescriptorBindingType::StorageReadWriteTexture).with_binding_index(2),
        binding(DescriptorBindingType::StorageReadWriteBuffer),
    ]);
    let mut indices = [0u32; 4];
    let layout = ctx
        .context
        .create_descriptor_set_layout(&desc, &mut indices);
    assert!(layout.is_valid());
    assert_eq!(
        indices.map(unpack_binding_index),
        [
            Some((RangeKind::Srv, 0)),
            Some((RangeKind::Srv, 4)),
            Some((RangeKind::Uav, 2)),
            Some((RangeKind::Uav, 3)),
        ]
    );
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_invalid_layouts_are_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let catcher = DiagnosticCatcher::new();

    let two = DescriptorSetDesc::new(vec![
        binding(DescriptorBindingType::ConstantBuffer),
        binding(DescriptorBindingType::ConstantBuffer),
    ]);
    let mut short = [0u32; 1];
    assert!(
        !ctx.context
            .create_descriptor_set_layout(&two, &mut short)
            .is_valid()
    );

    let empty_array = DescriptorSetDesc::new(vec![
        binding(DescriptorBindingType::SampledTexture).with_count(0),
    ]);
    let mut indices = [0u32; 1];
    assert!(
        !ctx.context
            .create_descriptor_set_layout(&empty_array, &mut indices)
            .is_valid()
    );

    let overlapping = DescriptorSetDesc::new(vec![
        binding(DescriptorBindingType::Sampler).with_count(2),
        binding(DescriptorBindingType::Sampler).with_binding_index(1),
    ]);
    let mut indices = [0u32; 2];
    assert!(
        !ctx.context
            .create_descriptor_set_layout(&overlapping, &mut indices)
            .is_valid()
    );
    catcher.expect_count(3);
}

// ============================================================================
// Sets
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_set_update_with_live_objects(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (layout, indices) = material_layout(&ctx);
    let set = ctx.context.create_descriptor_set(layout);
    assert!(set.is_valid());

    let constants = ctx.create_buffer(
        256,
        MemoryPlacement::StageEveryFrame,
        BufferUsage::CONSTANT,
    );
    let texture = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        TextureUsage::SAMPLED,
    ));
    let albedo = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(texture, TextureFormat::Rgba8Unorm));
    let normal = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(texture, TextureFormat::Rgba8Unorm));
    let sampler = ctx.context.create_sampler(&SamplerDesc::new());

    let catcher = DiagnosticCatcher::new();
    let texture_data = |view| DescriptorData::Texture {
        view,
        layout: TextureLayout::ShaderResource,
    };
    assert!(ctx.context.update_descriptor_set(
        set,
        &[
            DescriptorSetWriteInfo::new(
                indices[0],
                DescriptorData::ConstantBuffer {
                    buffer: constants,
                    offset: 0,
                    size: 256,
                },
            ),
            DescriptorSetWriteInfo::new(indices[1], texture_data(albedo)),
            DescriptorSetWriteInfo::new(indices[2], texture_data(normal)),
            DescriptorSetWriteInfo::new(indices[3], DescriptorData::Sampler(sampler)),
        ],
    ));
    catcher.expect_none();

    // A texture cannot land in the sampler slot.
    assert!(!ctx.context.update_descriptor_set(
        set,
        &[DescriptorSetWriteInfo::new(indices[3], texture_data(albedo))],
    ));
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_set_update_with_destroyed_view_is_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (layout, indices) = material_layout(&ctx);
    let set = ctx.context.create_descriptor_set(layout);
    let texture = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        TextureUsage::SAMPLED,
    ));
    let view = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(texture, TextureFormat::Rgba8Unorm));
    assert!(ctx.context.destroy_texture_view(view));

    let catcher = DiagnosticCatcher::new();
    assert!(!ctx.context.update_descriptor_set(
        set,
        &[DescriptorSetWriteInfo::new(
            indices[1],
            DescriptorData::Texture {
                view,
                layout: TextureLayout::ShaderResource,
            },
        )],
    ));
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_set_outlives_its_layout(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (layout, indices) = material_layout(&ctx);
    let set = ctx.context.create_descriptor_set(layout);
    let sampler = ctx.context.create_sampler(&SamplerDesc::point());
    assert!(ctx.context.destroy_descriptor_set_layout(layout));
    ctx.flush();

    assert!(ctx.context.update_descriptor_set(
        set,
        &[DescriptorSetWriteInfo::new(indices[3], DescriptorData::Sampler(sampler))],
    ));
    assert!(ctx.context.destroy_descriptor_set(set));
    assert!(!ctx.context.create_descriptor_set(layout).is_valid());
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_storage_buffer_view_in_set(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let desc = DescriptorSetDesc::new(vec![binding(DescriptorBindingType::StorageReadWriteBuffer)]);
    let mut indices = [0u32; 1];
    let layout = ctx
        .context
        .create_descriptor_set_layout(&desc, &mut indices);
    let set = ctx.context.create_descriptor_set(layout);

    let buffer = ctx.create_buffer(1024, MemoryPlacement::GpuOnly, BufferUsage::READ_WRITE);
    let view = ctx.context.create_buffer_view(&BufferViewDesc::new(
        buffer,
        1024,
        16,
        BufferViewAccess::READ_WRITE,
    ));
    assert!(view.is_valid());
    assert!(ctx.context.update_descriptor_set(
        set,
        &[DescriptorSetWriteInfo::new(indices[0], DescriptorData::Buffer(view))],
    ));
}

// ============================================================================
// Pipeline Layouts and Binding
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_push_constant_budget(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (layout, _) = material_layout(&ctx);

    let fits = ctx.context.create_pipeline_layout(&PipelineLayoutDesc {
        descriptor_sets: vec![layout],
        push_constants: vec![PushConstantDesc::new(
            MAX_PUSH_CONSTANT_BYTES as u8,
            ShaderVisibility::ALL,
        )],
        ..Default::default()
    });
    assert!(fits.is_valid());

    let catcher = DiagnosticCatcher::new();
    let too_big = ctx.context.create_pipeline_layout(&PipelineLayoutDesc {
        descriptor_sets: vec![layout],
        push_constants: vec![
            PushConstantDesc::new(128, ShaderVisibility::VERTEX),
            PushConstantDesc::new(4, ShaderVisibility::FRAGMENT),
        ],
        ..Default::default()
    });
    assert!(!too_big.is_valid());
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_binding_sets_and_push_constants(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let (layout, _) = material_layout(&ctx);
    let set = ctx.context.create_descriptor_set(layout);
    let pipeline_layout = ctx.context.create_pipeline_layout(&PipelineLayoutDesc {
        descriptor_sets: vec![layout],
        push_constants: vec![PushConstantDesc::new(16, ShaderVisibility::COMPUTE)],
        use_vertex_layout: false,
    });

    let catcher = DiagnosticCatcher::new();
    let mut list = ctx
        .context
        .begin_compute_command_list()
        .expect("compute command list");
    list.begin_compute_pass();
    list.set_compute_descriptor_sets(pipeline_layout, &[set], 0);
    // Rebinding the same set is elided.
    list.set_compute_descriptor_sets(pipeline_layout, &[set], 0);
    list.set_compute_push_constant(pipeline_layout, &[1, 2, 3, 4]);
    list.end_compute_pass();
    catcher.expect_none();

    let binds = list
        .commands()
        .iter()
        .filter(|c| {
            matches!(
                c,
                Command::BindDescriptorSet {
                    bind_point: BindPoint::Compute,
                    set_index: 0,
                    ..
                }
            )
        })
        .count();
    assert_eq!(binds, 1);
    assert!(
        list.commands()
            .iter()
            .any(|c| matches!(c, Command::PushConstants { data, .. } if data.len() == 16))
    );

    // Past the end of the 16 byte range.
    list.set_compute_push_constant(pipeline_layout, &[0; 5]);
    list.set_compute_descriptor_sets(pipeline_layout, &[set, set], 0);
    catcher.expect_count(2);
    ctx.context.end_compute_command_list(list);

    ctx.flush();
    catcher.expect_count(2);
}
