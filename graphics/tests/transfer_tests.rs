//! Buffer and texture transfer tests.
//!
//! Data goes in through upload placements, moves on the GPU with copy
//! commands and comes back through readback buffers.

mod common;

use rstest::rstest;

use common::{Backend, TestContext, generate_test_pattern};
use verglas_graphics::{
    BarrierAccess, BarrierSyncStages, BufferCopyParameters, BufferMemoryBarrier, BufferUsage,
    BufferHandle, BufferMapping, DiagnosticCatcher, Extent3d, MemoryPlacement, SubResourceIndexing,
    TextureCreateDesc, TextureDesc, TextureFormat, TextureLayout, TextureMemoryBarrier,
    RenderPassHandle, TextureHandle, TextureUsage,
};

fn transfer_barrier(buffer: BufferHandle) -> BufferMemoryBarrier {
    BufferMemoryBarrier::new(
        buffer,
        BarrierSyncStages::TRANSFER,
        BarrierSyncStages::TRANSFER,
        BarrierAccess::TRANSFER_DST,
        BarrierAccess::TRANSFER_SRC,
    )
}

/// Undefined contents to copy destination.
fn upload_barrier(texture: TextureHandle) -> TextureMemoryBarrier {
    TextureMemoryBarrier::new(
        texture,
        BarrierSyncStages::NONE,
        BarrierSyncStages::TRANSFER,
        BarrierAccess::NONE,
        BarrierAccess::TRANSFER_DST,
    )
    .with_layouts(TextureLayout::Unknown, TextureLayout::TransferDst)
}

// ============================================================================
// Buffer Copies
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
#[case::wgpu(Backend::Wgpu)]
fn test_staging_copy_roundtrip(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let payload = 0x0123_4567_89AB_CDEF_u64.to_be_bytes();

    let src = ctx.create_buffer(8, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let gpu = ctx.create_buffer(
        8,
        MemoryPlacement::GpuOnly,
        BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC,
    );
    let readback = ctx.create_buffer(8, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);
    ctx.upload(src, &payload);

    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.copy_buffer(&BufferCopyParameters::new(src, gpu, 8));
    list.place_memory_barriers(&[], &[transfer_barrier(gpu)], &[]);
    list.copy_buffer(&BufferCopyParameters::new(gpu, readback, 8));
    assert_eq!(list.commands().len(), 3);
    ctx.context.end_graphics_command_list(list);

    ctx.flush();
    assert_eq!(ctx.read(readback, 8), payload);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_copy_with_offsets(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let pattern = generate_test_pattern(256);

    let src = ctx.create_buffer(256, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let dst = ctx.create_buffer(256, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);
    ctx.upload(src, &pattern);

    let mut list = ctx
        .context
        .begin_transfer_command_list()
        .expect("transfer command list");
    list.copy_buffer(&BufferCopyParameters::new(src, dst, 64).with_offsets(128, 16));
    ctx.context.end_transfer_command_list(list);
    ctx.flush();

    let bytes = ctx.read(dst, 256);
    assert_eq!(&bytes[16..80], &pattern[128..192]);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_overrunning_copy_records_nothing(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let src = ctx.create_buffer(16, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let dst = ctx.create_buffer(8, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);

    let catcher = DiagnosticCatcher::new();
    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.copy_buffer(&BufferCopyParameters::new(src, dst, 16));
    assert!(list.commands().is_empty());
    ctx.context.end_graphics_command_list(list);
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_copy_with_overflowing_offset_records_nothing(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let src = ctx.create_buffer(16, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let dst = ctx.create_buffer(16, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);

    let catcher = DiagnosticCatcher::new();
    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.copy_buffer(&BufferCopyParameters::new(src, dst, 8).with_offsets(u64::MAX - 2, 0));
    assert!(list.commands().is_empty());
    ctx.context.end_graphics_command_list(list);
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_copy_of_destroyed_buffer_is_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let src = ctx.create_buffer(16, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let dst = ctx.create_buffer(16, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);
    assert!(ctx.context.destroy_buffer(src));

    let catcher = DiagnosticCatcher::new();
    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.copy_buffer(&BufferCopyParameters::new(src, dst, 16));
    list.place_memory_barriers(&[], &[transfer_barrier(src)], &[]);
    assert!(list.commands().is_empty());
    ctx.context.end_graphics_command_list(list);
    catcher.expect_count(2);
}

// ============================================================================
// Mapping
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_map_roundtrip_on_upload_buffer(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let pattern = generate_test_pattern(64);
    let buffer = ctx.create_buffer(
        64,
        MemoryPlacement::StageEveryFrame,
        BufferUsage::CONSTANT | BufferUsage::TRANSFER_SRC,
    );
    assert!(!ctx.context.needs_staging_buffer(buffer));

    ctx.upload(buffer, &pattern);
    assert_eq!(ctx.read(buffer, 64), pattern);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_double_map_is_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffer = ctx.create_buffer(32, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);

    let mut first = BufferMapping::whole(buffer);
    assert!(ctx.context.map_buffer(&mut first));
    assert_eq!(first.size, 32);

    let catcher = DiagnosticCatcher::new();
    let mut second = BufferMapping::whole(buffer);
    assert!(!ctx.context.map_buffer(&mut second));
    catcher.expect_count(1);

    assert!(ctx.context.unmap_buffer(&mut first));
    assert!(!ctx.context.unmap_buffer(&mut first));
    catcher.expect_count(2);
}

// ============================================================================
// Textures
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_texture_upload_and_readback(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let desc = TextureDesc::new_2d(16, 4, TextureFormat::Rgba8Unorm).with_label("pattern");
    let footprints = ctx
        .context
        .fetch_texture_sub_resources_memory_footprints(&desc);
    assert_eq!(footprints.len(), 1);
    let footprint = footprints[0];
    assert!(footprint.line_byte_aligned_size >= 16 * 4);

    let texture = ctx.context.create_texture(
        &TextureCreateDesc::new(
            desc.clone(),
            TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC | TextureUsage::SAMPLED,
        )
        .with_footprints(footprints.clone()),
    );
    let staging = ctx.context.create_staging_buffer(&desc, &footprints);
    let readback = ctx.create_buffer(
        footprint.size(),
        MemoryPlacement::Readback,
        BufferUsage::TRANSFER_DST,
    );
    assert!(texture.is_valid() && staging.is_valid());
    assert_eq!(
        ctx.context.buffer_desc(staging).and_then(|d| d.label).as_deref(),
        Some("pattern staging")
    );

    let texels = generate_test_pattern(16 * 4 * 4);
    let sub_resource = SubResourceIndexing::new(&desc, 0, 0);
    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.place_memory_barriers(&[], &[], &[upload_barrier(texture)]);
    list.set_texture_data(staging, texture, &footprint, &sub_resource, &texels);
    list.place_memory_barriers(
        &[],
        &[],
        &[TextureMemoryBarrier::new(
            texture,
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::TRANSFER,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::TRANSFER_SRC,
        )
        .with_layouts(TextureLayout::TransferDst, TextureLayout::TransferSrc)],
    );
    list.copy_texture_to_buffer(texture, &sub_resource, readback, &footprint);
    ctx.context.end_graphics_command_list(list);
    ctx.flush();

    let bytes = ctx.read(readback, footprint.size());
    let pitch = footprint.line_byte_aligned_size as usize;
    for (row, expected) in texels.chunks_exact(16 * 4).enumerate() {
        assert_eq!(&bytes[row * pitch..row * pitch + 16 * 4], expected, "row {row}");
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_texture_to_texture_copy(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let desc = TextureDesc::new_2d(8, 8, TextureFormat::R8Unorm);
    let footprints = ctx
        .context
        .fetch_texture_sub_resources_memory_footprints(&desc);
    let footprint = footprints[0];
    let usage = TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC;
    let src = ctx
        .context
        .create_texture(&TextureCreateDesc::new(desc.clone(), usage));
    let dst = ctx
        .context
        .create_texture(&TextureCreateDesc::new(desc.clone(), usage));
    let staging = ctx.context.create_staging_buffer(&desc, &footprints);
    let readback = ctx.create_buffer(
        footprint.size(),
        MemoryPlacement::Readback,
        BufferUsage::TRANSFER_DST,
    );

    let texels = generate_test_pattern(64);
    let sub_resource = SubResourceIndexing::new(&desc, 0, 0);
    let to_src = |texture| {
        TextureMemoryBarrier::new(
            texture,
            BarrierSyncStages::TRANSFER,
            BarrierSyncStages::TRANSFER,
            BarrierAccess::TRANSFER_DST,
            BarrierAccess::TRANSFER_SRC,
        )
        .with_layouts(TextureLayout::TransferDst, TextureLayout::TransferSrc)
    };

    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.place_memory_barriers(&[], &[], &[upload_barrier(src), upload_barrier(dst)]);
    list.set_texture_data(staging, src, &footprint, &sub_resource, &texels);
    list.place_memory_barriers(&[], &[], &[to_src(src)]);
    list.copy_texture(src, &sub_resource, dst, &sub_resource, Extent3d::new_2d(8, 8));
    list.place_memory_barriers(&[], &[], &[to_src(dst)]);
    list.copy_texture_to_buffer(dst, &sub_resource, readback, &footprint);
    ctx.context.end_graphics_command_list(list);
    ctx.flush();

    let bytes = ctx.read(readback, footprint.size());
    let pitch = footprint.line_byte_aligned_size as usize;
    for (row, expected) in texels.chunks_exact(8).enumerate() {
        assert_eq!(&bytes[row * pitch..row * pitch + 8], expected, "row {row}");
    }
}

#[test]
fn test_transfer_list_rejects_render_commands() {
    let Some(ctx) = TestContext::new(Backend::Software) else {
        panic!("the software executor is always available");
    };
    let catcher = DiagnosticCatcher::new();
    let mut list = ctx
        .context
        .begin_transfer_command_list()
        .expect("transfer command list");
    list.begin_compute_pass();
    list.begin_render_pass(RenderPassHandle::INVALID);
    assert!(list.commands().is_empty());
    ctx.context.end_transfer_command_list(list);
    catcher.expect_count(2);
}
