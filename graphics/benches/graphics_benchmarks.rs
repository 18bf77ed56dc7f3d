use criterion::{Criterion, black_box, criterion_group, criterion_main};

use verglas_core::pool::GenHandle;
use verglas_graphics::barrier::{PassKind, dx12, metal, vulkan};
use verglas_graphics::descriptor::{DescriptorHeap, DescriptorSetLayoutInfo};
use verglas_graphics::{
    ApplicationInfo, BackendType, BarrierAccess, BarrierSyncStages, BufferCreateDesc,
    BufferHandle, BufferMemoryBarrier, BufferUsage, DescriptorBindingDesc, DescriptorBindingType,
    DescriptorSetDesc, GlobalMemoryBarrier, GraphicsContext, HeapKind, MemoryPlacement,
    ShaderVisibility, TextureHandle, TextureLayout, TextureMemoryBarrier,
};

// ---------------------------------------------------------------------------
// Barrier translation
// ---------------------------------------------------------------------------

fn frame_barriers() -> (
    Vec<GlobalMemoryBarrier>,
    Vec<BufferMemoryBarrier>,
    Vec<TextureMemoryBarrier>,
) {
    let global = vec![GlobalMemoryBarrier::new(
        BarrierSyncStages::COMPUTE_SHADING,
        BarrierSyncStages::VERTEX_SHADING,
        BarrierAccess::UNORDERED_ACCESS,
        BarrierAccess::SHADER_RESOURCE,
    )];
    let buffers = (0..16u16)
        .map(|i| {
            BufferMemoryBarrier::new(
                BufferHandle(GenHandle::new(i, 1)),
                BarrierSyncStages::TRANSFER,
                BarrierSyncStages::VERTEX_INPUT_ASSEMBLY,
                BarrierAccess::TRANSFER_DST,
                BarrierAccess::VERTEX_BUFFER,
            )
        })
        .collect();
    let textures = (0..16u16)
        .map(|i| {
            TextureMemoryBarrier::new(
                TextureHandle(GenHandle::new(i, 1)),
                BarrierSyncStages::COLOR_BLENDING,
                BarrierSyncStages::FRAGMENT_SHADING,
                BarrierAccess::COLOR_ATTACHMENT,
                BarrierAccess::SHADER_RESOURCE,
            )
            .with_layouts(TextureLayout::ColorAttachment, TextureLayout::ShaderResource)
        })
        .collect();
    (global, buffers, textures)
}

fn bench_barrier_translation(c: &mut Criterion) {
    let (global, buffers, textures) = frame_barriers();

    c.bench_function("barrier_dx12_enhanced_33", |b| {
        b.iter(|| black_box(dx12::translate(true, &global, &buffers, &textures)));
    });

    c.bench_function("barrier_dx12_legacy_33", |b| {
        b.iter(|| black_box(dx12::translate(false, &global, &buffers, &textures)));
    });

    c.bench_function("barrier_vulkan_sync2_33", |b| {
        b.iter(|| black_box(vulkan::translate(true, &global, &buffers, &textures)));
    });

    c.bench_function("barrier_metal_compute", |b| {
        b.iter(|| black_box(metal::translate(PassKind::Compute, black_box(global.first().copied()))));
    });
}

// ---------------------------------------------------------------------------
// Descriptor packing
// ---------------------------------------------------------------------------

fn bench_descriptor_packing(c: &mut Criterion) {
    let desc = DescriptorSetDesc::new(vec![
        DescriptorBindingDesc::new(DescriptorBindingType::ConstantBuffer, ShaderVisibility::ALL),
        DescriptorBindingDesc::new(DescriptorBindingType::SampledTexture, ShaderVisibility::FRAGMENT)
            .with_count(8),
        DescriptorBindingDesc::new(
            DescriptorBindingType::StorageReadWriteBuffer,
            ShaderVisibility::COMPUTE,
        ),
        DescriptorBindingDesc::new(DescriptorBindingType::Sampler, ShaderVisibility::FRAGMENT)
            .with_count(2),
    ]);

    c.bench_function("descriptor_layout_pack_4_bindings", |b| {
        b.iter(|| black_box(DescriptorSetLayoutInfo::pack(black_box(&desc))));
    });

    c.bench_function("descriptor_heap_allocate_free_256", |b| {
        let heap = DescriptorHeap::new(HeapKind::CbvSrvUav);
        let mut frame = 0u64;
        b.iter(|| {
            let starts: Vec<u32> = (0..256).filter_map(|_| heap.allocate(4)).collect();
            frame += 1;
            for start in starts {
                heap.free(start, 4, frame);
            }
            heap.retire(frame);
        });
    });
}

// ---------------------------------------------------------------------------
// Context handle lookups
// ---------------------------------------------------------------------------

fn bench_context_lookups(c: &mut Criterion) {
    let info = ApplicationInfo::new("bench").with_backend(BackendType::Software);
    let Ok(context) = GraphicsContext::create(info, None) else {
        eprintln!("software executor unavailable, skipping context benchmarks");
        return;
    };
    let buffers: Vec<BufferHandle> = (0..1024)
        .map(|_| {
            context.create_buffer(&BufferCreateDesc::new(
                256,
                MemoryPlacement::GpuOnly,
                BufferUsage::TRANSFER_DST,
            ))
        })
        .collect();

    c.bench_function("context_buffer_desc_1024", |b| {
        b.iter(|| {
            let mut total = 0u64;
            for buffer in &buffers {
                total += context.buffer_desc(black_box(*buffer)).map_or(0, |d| d.size);
            }
            black_box(total)
        });
    });
}

criterion_group!(
    benches,
    bench_barrier_translation,
    bench_descriptor_packing,
    bench_context_lookups
);
criterion_main!(benches);
