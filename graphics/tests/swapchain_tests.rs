//! Swap chain tests on a headless target.
//!
//! Without a window the context keeps an offscreen chain: the images are
//! ordinary textures the context owns, and presenting only rotates them.

mod common;

use rstest::rstest;

use common::{Backend, TestContext, test_info};
use verglas_graphics::{
    BarrierAccess, BarrierSyncStages, BufferUsage, ColorAttachment, DiagnosticCatcher,
    DisplayOptions, Features, HeadlessTarget, MemoryPlacement, RenderPassDesc, SoftEnable,
    SubResourceIndexing, TextureFormat, TextureHandle, TextureLayout, TextureMemoryBarrier,
};

fn headless(
    backend: Backend,
    width: u32,
    height: u32,
    display_options: DisplayOptions,
) -> Option<TestContext> {
    let info = test_info("verglas-swapchain")
        .with_features(
            Features::default()
                .with_present(true)
                .with_validation_layers(false),
        )
        .with_display_options(display_options.with_size(width, height));
    TestContext::with_info(backend, info, Some(&HeadlessTarget::new(width, height)))
}

// ============================================================================
// Creation
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_offscreen_chain_follows_display_options(#[case] backend: Backend) {
    for (triple_buffering, srgb, images, format) in [
        (
            SoftEnable::TryEnable,
            SoftEnable::TryEnable,
            3,
            TextureFormat::Bgra8Srgb,
        ),
        (
            SoftEnable::Disabled,
            SoftEnable::Disabled,
            2,
            TextureFormat::Bgra8Unorm,
        ),
    ] {
        let options = DisplayOptions::default()
            .with_triple_buffering(triple_buffering)
            .with_srgb_present(srgb);
        let Some(ctx) = headless(backend, 64, 32, options) else {
            eprintln!("Backend {:?} not available, skipping", backend);
            return;
        };
        assert_eq!(ctx.context.swap_chain_image_count(), images);
        assert_eq!(ctx.context.frame_context_count(), images as usize);
        assert_eq!(ctx.context.swap_chain_format(), Some(format));

        for index in 0..images {
            let texture = ctx.context.present_texture(index);
            let desc = ctx.context.texture_desc(texture).expect("swap chain image");
            assert_eq!(desc.desc.dimensions.width, 64);
            assert_eq!(desc.desc.dimensions.height, 32);
            assert!(ctx.context.present_render_target_view(index).is_valid());
        }
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_present_accessors_reject_bad_indices(#[case] backend: Backend) {
    let Some(ctx) = headless(backend, 16, 16, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let catcher = DiagnosticCatcher::new();
    let count = ctx.context.swap_chain_image_count();
    assert!(!ctx.context.present_texture(count).is_valid());
    assert!(!ctx.context.present_render_target_view(count).is_valid());
    catcher.expect_count(2);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_context_without_swap_chain(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    assert_eq!(ctx.context.swap_chain_image_count(), 0);
    assert_eq!(ctx.context.swap_chain_format(), None);
    assert_eq!(ctx.context.current_present_image_index(), 0);

    let catcher = DiagnosticCatcher::new();
    assert!(!ctx.context.present_texture(0).is_valid());
    assert!(!ctx.context.resize(32, 32));
    catcher.expect_count(2);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_swap_chain_images_cannot_be_destroyed(#[case] backend: Backend) {
    let Some(ctx) = headless(backend, 16, 16, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let image = ctx.context.present_texture(0);
    let view = ctx.context.present_render_target_view(0);

    let catcher = DiagnosticCatcher::new();
    assert!(!ctx.context.destroy_texture(image));
    assert!(!ctx.context.destroy_render_target_view(view));
    catcher.expect_count(2);
    assert!(ctx.context.texture_desc(image).is_some());
}

// ============================================================================
// Presentation
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_present_image_rotates_each_frame(#[case] backend: Backend) {
    let Some(mut ctx) = headless(backend, 16, 16, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let count = ctx.context.swap_chain_image_count();
    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(ctx.context.current_present_image_index());
        ctx.context.end_frame();
    }
    let expected: Vec<u32> = (0..5).map(|frame| frame % count).collect();
    assert_eq!(seen, expected);

    assert!(ctx.context.wait_for_last_frame());
    if let Some(software) = ctx.software() {
        assert_eq!(software.presented_images(), expected);
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_clear_present_image_and_read_it_back(#[case] backend: Backend) {
    let Some(mut ctx) = headless(backend, 8, 4, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let index = ctx.context.current_present_image_index();
    let image: TextureHandle = ctx.context.present_texture(index);
    let desc = ctx.context.texture_desc(image).expect("swap chain image").desc;
    let footprints = ctx
        .context
        .fetch_texture_sub_resources_memory_footprints(&desc);
    let footprint = footprints[0];
    let readback = ctx.create_buffer(
        footprint.size(),
        MemoryPlacement::Readback,
        BufferUsage::TRANSFER_DST,
    );

    let pass = ctx.context.create_render_pass(&RenderPassDesc::new().with_color(
        ColorAttachment::new(ctx.context.present_render_target_view(index))
            .with_clear([1.0, 0.0, 0.0, 1.0]),
    ));
    assert!(pass.is_valid());

    let sub_resource = SubResourceIndexing::new(&desc, 0, 0);
    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    list.begin_render_pass(pass);
    list.end_render_pass();
    list.place_memory_barriers(
        &[],
        &[],
        &[TextureMemoryBarrier::new(
            image,
            BarrierSyncStages::COLOR_BLENDING,
            BarrierSyncStages::TRANSFER,
            BarrierAccess::COLOR_ATTACHMENT,
            BarrierAccess::TRANSFER_SRC,
        )
        .with_layouts(TextureLayout::ColorAttachment, TextureLayout::TransferSrc)],
    );
    list.copy_texture_to_buffer(image, &sub_resource, readback, &footprint);
    ctx.context.end_graphics_command_list(list);
    ctx.flush();

    let bytes = ctx.read(readback, footprint.size());
    let pitch = footprint.line_byte_aligned_size as usize;
    for row in 0..4 {
        for texel in bytes[row * pitch..row * pitch + 8 * 4].chunks_exact(4) {
            assert_eq!(texel, [0, 0, 255, 255], "row {row}");
        }
    }
}

// ============================================================================
// Resize
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_resize_replaces_images(#[case] backend: Backend) {
    let Some(mut ctx) = headless(backend, 32, 32, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let count = ctx.context.swap_chain_image_count();
    let old_image = ctx.context.present_texture(0);
    let old_view = ctx.context.present_render_target_view(0);
    ctx.context.end_frame();
    let live = ctx.context.live_objects();

    let catcher = DiagnosticCatcher::new();
    assert!(ctx.context.resize(96, 48));
    catcher.expect_none();

    assert_eq!(ctx.context.swap_chain_image_count(), count);
    assert!(ctx.context.texture_desc(old_image).is_none());

    let image = ctx.context.present_texture(0);
    assert_ne!(image, old_image);
    assert_ne!(ctx.context.present_render_target_view(0), old_view);
    let desc = ctx.context.texture_desc(image).expect("resized image").desc;
    assert_eq!(
        (desc.dimensions.width, desc.dimensions.height),
        (96, 48)
    );

    // Frames keep flowing on the new images; the old ones are released.
    ctx.flush();
    catcher.expect_none();
    assert_eq!(ctx.context.pending_releases(), 0);
    assert_eq!(ctx.context.live_objects(), live);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_destroy_then_resize_in_one_frame(#[case] backend: Backend) {
    let Some(mut ctx) = headless(backend, 32, 32, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    ctx.context.end_frame();

    let buffer = ctx.create_buffer(16, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);
    assert!(ctx.context.destroy_buffer(buffer));

    let catcher = DiagnosticCatcher::new();
    assert!(ctx.context.resize(64, 64));
    catcher.expect_none();
    assert!(ctx.context.pending_releases() > 1);

    // The buffer and the old images all go with the frame that retired them.
    ctx.flush();
    assert_eq!(ctx.context.pending_releases(), 0);
    catcher.expect_none();
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_resize_to_empty_extent_is_rejected(#[case] backend: Backend) {
    let Some(mut ctx) = headless(backend, 32, 32, DisplayOptions::default()) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let image = ctx.context.present_texture(0);
    let catcher = DiagnosticCatcher::new();
    assert!(!ctx.context.resize(0, 32));
    catcher.expect_count(1);
    assert_eq!(ctx.context.present_texture(0), image);
}
