use std::sync::{Arc, Mutex, PoisonError};

use crate::shared::config::EngineConfig;
use crate::shared::constants::PUSH_CONSTANT_SIZE;
use crate::shared::error::{ExecutionError, InitError};

/// Error captured from a wgpu error scope.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuFault {
    OutOfMemory(String),
    Validation(String),
}

/// Reason the device was lost, set once from the device-lost callback.
type LostState = Arc<Mutex<Option<String>>>;

/// Device context shared by every slot of one engine.
///
/// Owns the wgpu instance, device and queue. All submissions go through
/// the single queue held here.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    lost: LostState,
    _instance: wgpu::Instance,
}

impl GpuContext {
    pub fn new(config: &EngineConfig) -> Result<Self, InitError> {
        pollster::block_on(Self::new_async(config))
    }

    pub async fn new_async(config: &EngineConfig) -> Result<Self, InitError> {
        let flags = if config.debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.to_wgpu(),
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .ok_or(InitError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            log::info!("Adapter {} has no compute support", adapter_info.name);
            return Err(InitError::NoAdapter);
        }

        let required_features = wgpu::Features::PUSH_CONSTANTS;
        let missing = required_features - adapter.features();
        if !missing.is_empty() {
            return Err(InitError::MissingFeatures(missing));
        }

        let adapter_limits = adapter.limits();
        if adapter_limits.max_push_constant_size < PUSH_CONSTANT_SIZE {
            return Err(InitError::InsufficientLimit {
                name: "max_push_constant_size",
                actual: adapter_limits.max_push_constant_size,
                required: PUSH_CONSTANT_SIZE,
            });
        }
        let required_limits = wgpu::Limits {
            max_push_constant_size: PUSH_CONSTANT_SIZE,
            // readback staging for large images
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults()
        }
        .using_resolution(adapter_limits);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("vlur-device"),
                    required_features,
                    required_limits,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(InitError::DeviceRequest)?;

        log::info!(
            "Using GPU adapter: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        let lost: LostState = Arc::new(Mutex::new(None));
        let lost_hook = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            if matches!(reason, wgpu::DeviceLostReason::Destroyed) {
                log::debug!("GPU device destroyed");
            } else {
                log::error!("GPU device lost ({reason:?}): {message}");
            }
            let mut state = lost_hook.lock().unwrap_or_else(PoisonError::into_inner);
            state.get_or_insert(message);
        });
        // The default handler panics; errors outside a scope are only logged.
        device.on_uncaptured_error(Box::new(|error| {
            log::error!("Uncaptured GPU error: {error}");
        }));

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            lost,
            _instance: instance,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    /// Fails with `DeviceLost` once the device-lost callback has fired.
    pub fn ensure_alive(&self) -> Result<(), ExecutionError> {
        match self
            .lost
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(reason) => Err(ExecutionError::DeviceLost(reason.clone())),
            None => Ok(()),
        }
    }

    /// Run `f` inside out-of-memory and validation error scopes.
    ///
    /// Returns the closure's value together with the first captured fault,
    /// out-of-memory taking precedence.
    pub fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<GpuFault>) {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        let fault = oom.or(validation).map(|error| match error {
            wgpu::Error::OutOfMemory { .. } => GpuFault::OutOfMemory(error.to_string()),
            other => GpuFault::Validation(other.to_string()),
        });
        (value, fault)
    }

    /// Submit one command buffer and block until the GPU has finished it.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<(), ExecutionError> {
        self.ensure_alive()?;
        let ((), fault) = self.scoped(|device| {
            let index = self.queue.submit(std::iter::once(encoder.finish()));
            device.poll(wgpu::Maintain::wait_for(index));
        });
        self.ensure_alive()?;
        match fault {
            None => Ok(()),
            Some(GpuFault::OutOfMemory(detail)) | Some(GpuFault::Validation(detail)) => {
                Err(ExecutionError::Submission(detail))
            }
        }
    }

    /// Wait for all outstanding work on the queue.
    pub fn flush(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Context for tests, or `None` when the machine has no usable adapter.
#[cfg(test)]
pub(crate) fn try_gpu_context() -> Option<GpuContext> {
    GpuContext::new(&EngineConfig::default()).ok()
}
