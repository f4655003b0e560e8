use std::path::PathBuf;

use thiserror::Error;

use crate::blurring::domain::image_processor::SlotId;

/// Failures while bringing up the device context or the blur pipeline.
/// Fatal to engine creation; never retried.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("no compute-capable GPU adapter found")]
    NoAdapter,
    #[error("adapter is missing required features: {0:?}")]
    MissingFeatures(wgpu::Features),
    #[error("adapter limit {name} is {actual}, need at least {required}")]
    InsufficientLimit {
        name: &'static str,
        actual: u32,
        required: u32,
    },
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[source] wgpu::RequestDeviceError),
    #[error("failed to load shader: {0}")]
    ShaderAsset(#[from] AssetError),
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("shader asset {0} not found")]
    NotFound(String),
    #[error("failed to read shader asset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures scoped to a single `configure` call. The slot keeps its prior state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("out of device memory while creating {what}: {detail}")]
    OutOfMemory { what: &'static str, detail: String },
    #[error("image size {width}x{height} exceeds device limit of {max} pixels per side")]
    UnsupportedSize { width: u32, height: u32, max: u32 },
    #[error("readback of {bytes} bytes exceeds device buffer limit of {max} bytes")]
    ReadbackTooLarge { bytes: u64, max: u64 },
    #[error("unsupported image resource: {0}")]
    UnsupportedFormat(String),
    #[error("shared buffer export failed: {0}")]
    Export(String),
}

/// Failures while executing GPU work. `DeviceLost` invalidates every slot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("GPU submission failed: {0}")]
    Submission(String),
    #[error("GPU device lost: {0}")]
    DeviceLost(String),
    #[error("output readback failed: {0}")]
    Readback(String),
}

/// Caller bugs: the call itself was illegal in the current state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    #[error("slot {0} is not configured")]
    NotConfigured(SlotId),
    #[error("blur radius {0} is outside [1.0, 25.0]")]
    RadiusOutOfRange(f32),
    #[error("invalid bitmap: {0}")]
    InvalidBitmap(String),
    #[error("processor has been destroyed")]
    Destroyed,
    #[error("engine handle is not live")]
    InvalidHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Initialization,
    Resource,
    Execution,
    Contract,
}

#[derive(Error, Debug)]
pub enum VlurError {
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl VlurError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            VlurError::Init(_) => ErrorCategory::Initialization,
            VlurError::Resource(_) => ErrorCategory::Resource,
            VlurError::Execution(_) => ErrorCategory::Execution,
            VlurError::Contract(_) => ErrorCategory::Contract,
        }
    }

    pub fn is_device_lost(&self) -> bool {
        matches!(self, VlurError::Execution(ExecutionError::DeviceLost(_)))
    }
}
