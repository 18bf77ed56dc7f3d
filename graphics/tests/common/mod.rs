//! Common utilities for integration tests.
//!
//! Every test is parameterised over [`Backend`]. The software executor is
//! always available; the Vulkan and wgpu cases skip themselves when no device
//! can be brought up on the machine running the tests.

#![allow(dead_code)]

use std::sync::Arc;

use verglas_graphics::{
    Api, ApplicationInfo, BackendType, BufferCreateDesc, BufferHandle, BufferMapping,
    BufferUsage, DisplayOptions, Features, GraphicsContext, MemoryPlacement, PresentTarget,
    QueueGate, SoftEnable, SoftwareBackend,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Executors the integration tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// CPU reference executor.
    Software,
    /// Native Vulkan through ash.
    Vulkan,
    /// DX12 or Metal through wgpu. Skips unless built with `wgpu-backend`.
    Wgpu,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Software => "software",
            Backend::Vulkan => "vulkan",
            Backend::Wgpu => "wgpu",
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Application info for tests: no window, validation off.
pub fn test_info(name: &str) -> ApplicationInfo {
    ApplicationInfo::new(name).with_features(
        Features::default()
            .with_present(false)
            .with_validation_layers(false),
    )
}

// ============================================================================
// Test Context
// ============================================================================

/// A context plus the hooks of the software executor, when it runs one.
pub struct TestContext {
    pub context: GraphicsContext,
    pub backend: Backend,
    software: Option<Arc<SoftwareBackend>>,
}

impl TestContext {
    /// A context without a swap chain.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_info(backend, test_info("verglas-tests"), None)
    }

    /// A context on `backend`, or `None` when the executor is unavailable.
    pub fn with_info(
        backend: Backend,
        info: ApplicationInfo,
        presentable: Option<&dyn PresentTarget>,
    ) -> Option<Self> {
        init_logging();
        match backend {
            Backend::Software => {
                let software = Arc::new(SoftwareBackend::new().ok()?);
                let context = GraphicsContext::with_backend(
                    info.with_backend(BackendType::Software),
                    software.clone(),
                    presentable,
                )
                .ok()?;
                Some(Self {
                    context,
                    backend,
                    software: Some(software),
                })
            }
            Backend::Vulkan => {
                let info = info.with_api(Api::Vulkan1_3).with_backend(BackendType::Vulkan);
                match GraphicsContext::create(info, presentable) {
                    Ok(context) => Some(Self {
                        context,
                        backend,
                        software: None,
                    }),
                    Err(e) => {
                        eprintln!("Vulkan unavailable: {e}");
                        None
                    }
                }
            }
            Backend::Wgpu => {
                let api = if cfg!(target_os = "macos") {
                    Api::Metal3
                } else {
                    Api::Dx12V1
                };
                let info = info.with_api(api).with_backend(BackendType::Wgpu);
                match GraphicsContext::create(info, presentable) {
                    Ok(context) => Some(Self {
                        context,
                        backend,
                        software: None,
                    }),
                    Err(e) => {
                        eprintln!("wgpu adapter unavailable: {e}");
                        None
                    }
                }
            }
        }
    }

    /// Context with `triple_buffering` and no presentable.
    pub fn with_triple_buffering(backend: Backend, triple_buffering: SoftEnable) -> Option<Self> {
        let info = test_info("verglas-frames").with_display_options(
            DisplayOptions::default().with_triple_buffering(triple_buffering),
        );
        Self::with_info(backend, info, None)
    }

    /// Gate of the software queue thread.
    pub fn gate(&self) -> Option<Arc<QueueGate>> {
        self.software.as_ref().map(|software| software.gate())
    }

    pub fn software(&self) -> Option<&SoftwareBackend> {
        self.software.as_deref()
    }

    pub fn create_buffer(
        &self,
        size: u64,
        placement: MemoryPlacement,
        usage: BufferUsage,
    ) -> BufferHandle {
        let handle = self
            .context
            .create_buffer(&BufferCreateDesc::new(size, placement, usage));
        assert!(handle.is_valid(), "buffer creation failed");
        handle
    }

    /// Write `data` at the start of an upload buffer.
    pub fn upload(&self, buffer: BufferHandle, data: &[u8]) {
        let mut mapping =
            BufferMapping::new(buffer, 0, data.len() as u64).with_pure_write(true);
        assert!(self.context.map_buffer(&mut mapping));
        assert!(mapping.write(0, data));
        assert!(self.context.unmap_buffer(&mut mapping));
    }

    /// Read `size` bytes from the start of a CPU-visible buffer.
    pub fn read(&self, buffer: BufferHandle, size: u64) -> Vec<u8> {
        let mut mapping = BufferMapping::new(buffer, 0, size);
        assert!(self.context.map_buffer(&mut mapping));
        let bytes = mapping.bytes().to_vec();
        assert!(self.context.unmap_buffer(&mut mapping));
        bytes
    }

    /// End the current frame and wait for it to execute.
    pub fn flush(&mut self) -> u64 {
        let frame = self.context.end_frame();
        assert!(self.context.wait_for_frame(frame));
        frame
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // A held gate would keep the context's shutdown wait from returning.
        if let Some(gate) = self.gate() {
            gate.release();
        }
    }
}

/// Deterministic byte pattern.
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 + 3) as u8).collect()
}
