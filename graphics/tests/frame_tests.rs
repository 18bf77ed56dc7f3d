//! Frame ring, back-pressure and timestamp tests.
//!
//! The back-pressure cases hold the software queue so frames stay in flight
//! for as long as the test needs them to.

mod common;

use std::time::Duration;

use rstest::rstest;

use common::{Backend, TestContext};
use verglas_graphics::{
    BufferCopyParameters, BufferUsage, DiagnosticCatcher, MemoryPlacement, SoftEnable,
    TimestampHandle,
};

/// Long enough for a blocked call to show it is blocked.
const SETTLE: Duration = Duration::from_millis(100);

// ============================================================================
// Frame Ring
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_frame_context_count(#[case] backend: Backend) {
    for (triple_buffering, expected) in [
        (SoftEnable::ForceEnable, 3),
        (SoftEnable::TryEnable, 2),
        (SoftEnable::Disabled, 2),
    ] {
        let Some(ctx) = TestContext::with_triple_buffering(backend, triple_buffering) else {
            eprintln!("Backend {:?} not available, skipping", backend);
            return;
        };
        assert_eq!(
            ctx.context.frame_context_count(),
            expected,
            "{triple_buffering:?}"
        );
    }
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_frame_ids_and_context_rotation(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::with_triple_buffering(backend, SoftEnable::ForceEnable)
    else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    assert_eq!(ctx.context.frame_id(), 1);

    let mut seen = Vec::new();
    for expected in 1..=7 {
        seen.push(ctx.context.current_frame_context_index());
        assert_eq!(ctx.context.end_frame(), expected);
    }
    assert_eq!(seen, [1, 2, 0, 1, 2, 0, 1]);
    assert_eq!(ctx.context.frame_id(), 8);

    assert!(ctx.context.wait_for_last_frame());
    assert!(ctx.context.is_frame_executed(7));
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_empty_frames_still_signal(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let catcher = DiagnosticCatcher::new();
    for _ in 0..5 {
        ctx.flush();
    }
    catcher.expect_none();
    assert!(ctx.context.is_frame_executed(5));
    assert!(!ctx.context.is_frame_executed(6));
}

// ============================================================================
// Back-pressure
// ============================================================================

#[test]
fn test_fourth_end_frame_waits_for_the_first() {
    let Some(mut ctx) = TestContext::with_triple_buffering(Backend::Software, SoftEnable::ForceEnable)
    else {
        panic!("the software executor is always available");
    };
    assert_eq!(ctx.context.frame_context_count(), 3);
    let gate = ctx.gate().expect("software gate");
    gate.hold();

    for expected in 1..=3 {
        assert_eq!(ctx.context.end_frame(), expected);
    }
    assert!(!ctx.context.is_frame_executed(1));

    let context = &mut ctx.context;
    let (blocked, ended) = std::thread::scope(|scope| {
        let fourth = scope.spawn(move || context.end_frame());
        std::thread::sleep(SETTLE);
        let blocked = !fourth.is_finished();
        gate.release();
        (blocked, fourth.join())
    });
    assert!(blocked, "the fourth end_frame returned before frame 1 executed");
    assert_eq!(ended.ok(), Some(4));
    assert!(ctx.context.is_frame_executed(1));
}

#[test]
fn test_double_buffering_blocks_on_the_third_frame() {
    let Some(mut ctx) = TestContext::with_triple_buffering(Backend::Software, SoftEnable::Disabled)
    else {
        panic!("the software executor is always available");
    };
    let gate = ctx.gate().expect("software gate");
    gate.hold();

    assert_eq!(ctx.context.end_frame(), 1);
    assert_eq!(ctx.context.end_frame(), 2);

    let context = &mut ctx.context;
    let (blocked, ended) = std::thread::scope(|scope| {
        let third = scope.spawn(move || context.end_frame());
        std::thread::sleep(SETTLE);
        let blocked = !third.is_finished();
        gate.release();
        (blocked, third.join())
    });
    assert!(blocked);
    assert_eq!(ended.ok(), Some(3));
}

#[test]
fn test_release_waits_for_the_retiring_frame() {
    let Some(mut ctx) = TestContext::new(Backend::Software) else {
        panic!("the software executor is always available");
    };
    let gate = ctx.gate().expect("software gate");
    let buffer = ctx.create_buffer(64, MemoryPlacement::GpuOnly, BufferUsage::TRANSFER_DST);

    gate.hold();
    assert!(ctx.context.destroy_buffer(buffer));
    let frame = ctx.context.end_frame();
    assert_eq!(ctx.context.pending_releases(), 1);
    assert!(ctx.context.buffer_desc(buffer).is_none());

    gate.release();
    assert!(ctx.context.wait_for_frame(frame));
    assert_eq!(ctx.context.pending_releases(), 0);
}

// ============================================================================
// Timestamps
// ============================================================================

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
#[case::wgpu(Backend::Wgpu)]
fn test_timestamps_resolve_after_the_frame(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    if !ctx.context.supports_timestamps() {
        eprintln!("Backend {:?} has no timestamp queries, skipping", backend);
        return;
    }
    let src = ctx.create_buffer(4096, MemoryPlacement::StageOnce, BufferUsage::TRANSFER_SRC);
    let dst = ctx.create_buffer(4096, MemoryPlacement::Readback, BufferUsage::TRANSFER_DST);

    let mut list = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    let start = list.put_timestamp();
    list.copy_buffer(&BufferCopyParameters::new(src, dst, 4096));
    let end = list.put_timestamp();
    ctx.context.end_graphics_command_list(list);

    assert_eq!(start.index, 0);
    assert_eq!(end.index, 1);
    assert_eq!(u64::from(start.frame_id), ctx.context.frame_id());
    assert!(ctx.context.resolved_timestamps(ctx.context.frame_id()).is_none());

    let frame = ctx.flush();
    let ticks = ctx
        .context
        .resolved_timestamps(frame)
        .expect("timestamps of an executed frame");
    assert_eq!(ticks.len(), 2);
    assert!(ticks[1] >= ticks[0]);
    assert_eq!(ctx.context.resolved_timestamp(start), ticks[0]);
    assert_eq!(ctx.context.resolved_timestamp(end), ticks[1]);
    assert!(ctx.context.timestamp_period_ns() > 0.0);

    assert_eq!(ctx.context.resolved_timestamp(TimestampHandle::INVALID), 0);
}

#[rstest]
#[case::software(Backend::Software)]
#[case::vulkan(Backend::Vulkan)]
fn test_timestamps_are_shared_across_lists_of_a_frame(#[case] backend: Backend) {
    let Some(mut ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let mut graphics = ctx
        .context
        .begin_graphics_command_list()
        .expect("graphics command list");
    let mut transfer = ctx
        .context
        .begin_transfer_command_list()
        .expect("transfer command list");
    let first = graphics.put_timestamp();
    let second = transfer.put_timestamp();
    ctx.context.end_transfer_command_list(transfer);
    ctx.context.end_graphics_command_list(graphics);
    assert_ne!(first.index, second.index);

    let frame = ctx.flush();
    assert_eq!(
        ctx.context.resolved_timestamps(frame).map(|ticks| ticks.len()),
        Some(2)
    );
}
