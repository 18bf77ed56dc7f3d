//! Object lifetime and validation tests for the graphics context.
//!
//! Every case runs on the software executor and, when a device is present,
//! on Vulkan.

mod common;

use rstest::rstest;

use common::{Backend, TestContext, test_info};
use verglas_core::GenHandle;
use verglas_graphics::{
    BufferCreateDesc, BufferHandle, BufferMapping, BufferUsage, DiagnosticCatcher, Features,
    MemoryPlacement, SamplerDesc, Severity, TextureCreateDesc, TextureDesc, TextureFormat,
    TextureHandle, TextureUsage, TextureViewDesc,
};

// ============================================================================
// Handle Lifetime
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
#[case::wgpu(Backend::Wgpu)]
fn test_create_destroy_single_buffer(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffer = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert_eq!(buffer.0, GenHandle::new(0, 0));

    let catcher = DiagnosticCatcher::new();
    assert!(ctx.context.destroy_buffer(buffer));
    catcher.expect_none();

    assert!(!ctx.context.destroy_buffer(buffer));
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_handle_generation_protects_against_reuse(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let old = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert!(ctx.context.destroy_buffer(old));
    assert_eq!(ctx.context.pending_releases(), 1);

    ctx.flush();
    assert_eq!(ctx.context.pending_releases(), 0);

    let new = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert_eq!(new.0.index, old.0.index);
    assert_ne!(new.0.generation, old.0.generation);

    assert!(ctx.context.buffer_desc(old).is_none());
    assert!(ctx.context.buffer_desc(new).is_some());
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_destroyed_slot_is_not_reused_before_its_frame_executes(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let old = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert!(ctx.context.destroy_buffer(old));

    let new = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert_ne!(new.0.index, old.0.index);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_invalid_handle_access(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);

    let catcher = DiagnosticCatcher::new();
    assert!(
        ctx.context
            .buffer_desc(BufferHandle(GenHandle::new(0xFFFF, 0)))
            .is_none()
    );
    catcher.expect_none();

    assert!(
        ctx.context
            .buffer_desc(BufferHandle(GenHandle::new(4000, 0)))
            .is_none()
    );
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_live_object_count(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let baseline = ctx.context.live_objects();

    let texture = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(8, 8, TextureFormat::Rgba8Unorm),
        TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST,
    ));
    let view = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(texture, TextureFormat::Rgba8Unorm));
    let sampler = ctx.context.create_sampler(&SamplerDesc::point());
    assert!(texture.is_valid() && view.is_valid() && sampler.is_valid());
    assert_eq!(ctx.context.live_objects(), baseline + 3);

    assert!(ctx.context.destroy_texture_view(view));
    assert!(ctx.context.destroy_texture(texture));
    assert!(ctx.context.destroy_sampler(sampler));
    assert_eq!(ctx.context.live_objects(), baseline);
    assert_eq!(ctx.context.pending_releases(), 3);

    ctx.flush();
    assert_eq!(ctx.context.pending_releases(), 0);
}

// ============================================================================
// Validation
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_buffer_validation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let catcher = DiagnosticCatcher::new();

    let empty = ctx.context.create_buffer(&BufferCreateDesc::new(
        0,
        MemoryPlacement::GpuOnly,
        BufferUsage::TRANSFER_DST,
    ));
    assert!(!empty.is_valid());
    catcher.expect_count(1);

    let writable_readback = ctx.context.create_buffer(&BufferCreateDesc::new(
        64,
        MemoryPlacement::Readback,
        BufferUsage::TRANSFER_DST | BufferUsage::WRITE,
    ));
    assert!(!writable_readback.is_valid());
    catcher.expect_count(2);

    let writable_upload = ctx.context.create_buffer(&BufferCreateDesc::new(
        64,
        MemoryPlacement::StageEveryFrame,
        BufferUsage::CONSTANT | BufferUsage::WRITE,
    ));
    assert!(!writable_upload.is_valid());
    catcher.expect_count(3);
    assert!(
        catcher
            .messages()
            .iter()
            .all(|d| d.severity == Severity::Error)
    );
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_gpu_only_buffer_cannot_be_mapped(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let buffer = ctx.create_buffer(32, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert!(ctx.context.needs_staging_buffer(buffer));

    let catcher = DiagnosticCatcher::new();
    let mut mapping = BufferMapping::whole(buffer);
    assert!(!ctx.context.map_buffer(&mut mapping));
    assert!(!mapping.is_mapped());
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_texture_validation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let catcher = DiagnosticCatcher::new();

    let no_usage = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        TextureUsage::empty(),
    ));
    assert!(!no_usage.is_valid());

    let too_many_mips = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm).with_mip_count(8),
        TextureUsage::SAMPLED,
    ));
    assert!(!too_many_mips.is_valid());
    catcher.expect_count(2);

    let unknown = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(TextureHandle::INVALID, TextureFormat::Rgba8Unorm));
    assert!(!unknown.is_valid());
    catcher.expect_count(3);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_view_of_destroyed_texture_is_rejected(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let texture = ctx.context.create_texture(&TextureCreateDesc::new(
        TextureDesc::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        TextureUsage::SAMPLED,
    ));
    assert!(ctx.context.destroy_texture(texture));

    let catcher = DiagnosticCatcher::new();
    let view = ctx
        .context
        .create_texture_view(&TextureViewDesc::new(texture, TextureFormat::Rgba8Unorm));
    assert!(!view.is_valid());
    catcher.expect_count(1);
}

// ============================================================================
// Queues and Features
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_disabled_queue_class_hands_out_no_list(#[case] backend: Backend) {
    let mut features = Features::default()
        .with_present(false)
        .with_validation_layers(false);
    features.compute = false;
    let info = test_info("no-compute").with_features(features);
    let Some(ctx) = TestContext::with_info(backend, info, None) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let catcher = DiagnosticCatcher::new();
    assert!(ctx.context.begin_compute_command_list().is_none());
    catcher.expect_count(1);

    let list = ctx.context.begin_graphics_command_list();
    assert!(list.is_some());
    if let Some(list) = list {
        ctx.context.end_graphics_command_list(list);
    }
    catcher.expect_count(1);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_dedicated_queues_follow_features(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    // Both are off in the default features.
    assert!(!ctx.context.has_dedicated_transfer_queue());
    assert!(!ctx.context.has_dedicated_compute_queue());
    let api = ctx.context.application_info().api;
    assert_eq!(ctx.context.shader_file_extension(), api.shader_file_extension());
}

// ============================================================================
// Device Loss
// ============================================================================

#[test]
fn test_device_lost_turns_calls_into_diagnostics() {
    let Some(mut ctx) = TestContext::new(Backend::Software) else {
        panic!("the software executor is always available");
    };
    let buffer = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    if let Some(software) = ctx.software() {
        software.simulate_device_lost();
    }

    let catcher = DiagnosticCatcher::new();
    ctx.context.end_frame();
    assert!(ctx.context.is_device_lost());
    assert!(
        catcher
            .messages()
            .iter()
            .any(|d| d.severity == Severity::Fatal)
    );

    catcher.clear();
    let refused = ctx.context.create_buffer(&BufferCreateDesc::new(
        16,
        MemoryPlacement::GpuOnly,
        BufferUsage::TRANSFER_DST,
    ));
    assert!(!refused.is_valid());
    assert!(ctx.context.begin_graphics_command_list().is_none());
    assert!(!ctx.context.wait_for_frame(1));
    assert_eq!(catcher.count(), 3);

    // Destruction still works so the host can tear down.
    catcher.clear();
    assert!(ctx.context.destroy_buffer(buffer));
    catcher.expect_none();
}

#[test]
fn test_wait_for_unsubmitted_frame_is_rejected() {
    let Some(ctx) = TestContext::new(Backend::Software) else {
        panic!("the software executor is always available");
    };
    let catcher = DiagnosticCatcher::new();
    assert!(!ctx.context.wait_for_frame(ctx.context.frame_id()));
    catcher.expect_count(1);
    assert!(ctx.context.wait_for_last_frame());
}
