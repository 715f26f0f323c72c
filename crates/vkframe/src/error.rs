use ash::{LoadingError, vk};

use thiserror::Error;

use crate::state::ImageState;

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Failed to load Vulkan entry point: {0}")]
    EntryLoading(#[from] LoadingError),
    #[error("Instance extension {0:?} is not available")]
    MissingExtension(std::ffi::CString),
    #[error("Instance layer {0:?} is not available")]
    MissingLayer(std::ffi::CString),
    #[error("Could not query window handle: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Extension {0} is not supported by device")]
    UnsupportedExtension(String),
    #[error("Feature {0} not supported")]
    UnsupportedFeature(String),
    #[error("No physical device found. Is a Vulkan capable GPU and driver installed?")]
    NoPhysicalDevice,
    #[error("Physical device does not expose a {0} queue family")]
    MissingQueueFamily(&'static str),
    #[error("Instance error: {0}")]
    InstanceError(#[from] InstanceError),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error(
        "No memory type matches type bits {type_bits:#b} with properties {properties:?}"
    )]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },
    #[error("Memory block with properties {0:?} is not host visible")]
    NotHostVisible(vk::MemoryPropertyFlags),
    #[error("Memory block is already mapped")]
    AlreadyMapped,
    #[error("Access of {size} bytes at offset {offset} exceeds block of {block_size} bytes")]
    OutOfBounds {
        offset: u64,
        size: u64,
        block_size: u64,
    },
    #[error("Allocator error: {0}")]
    Allocator(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Wait timed out after {0}ns")]
    Timeout(u64),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Illegal image state transition {from:?} -> {to:?}")]
    Illegal { from: ImageState, to: ImageState },
    #[error("Image is in state {found:?}, expected {expected:?}")]
    StateMismatch {
        expected: ImageState,
        found: ImageState,
    },
    #[error("Image mip levels are not in a common state")]
    NonUniformLevels,
    #[error("Mip level {level} out of range, image has {count} levels")]
    LevelOutOfRange { level: u32, count: u32 },
}

#[derive(Error, Debug)]
pub enum CommandBufferError {
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Command pool is not resettable")]
    PoolNotResetable,
    #[error("No command pool for queue family {0}")]
    NoPool(u32),
    #[error("Submitting to queue failed with {0}")]
    SubmitFailed(vk::Result),
    #[error("Failed to allocate command buffer. Requested {count}, got {allocated}")]
    FailedToAllocate { allocated: usize, count: usize },
    #[error("Waiting for submission failed: {0}")]
    Sync(#[from] SyncError),
}

#[derive(Error, Debug)]
pub enum PresentError {
    #[error("Surface has a zero extent {0:?}, wait for the window to become visible")]
    ZeroExtent(vk::Extent2D),
    #[error("Frame ring call out of order, expected phase {expected:?} but ring is in {found:?}")]
    OutOfOrder {
        expected: crate::ring::FramePhase,
        found: crate::ring::FramePhase,
    },
    #[error("Image index {0} is not part of the swapchain")]
    InvalidImage(u32),
    #[error("A presentation ring needs at least one frame in flight")]
    NoFramesInFlight,
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Frame submission failed: {0}")]
    Submit(#[from] CommandBufferError),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("Swapchain creation failed: {0}")]
    Swapchain(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum VkFrameError {
    #[error("Instance error: {0}")]
    InstanceError(#[from] InstanceError),
    #[error("Device error: {0}")]
    DeviceError(#[from] DeviceError),
    #[error("Memory error: {0}")]
    MemoryError(#[from] MemoryError),
    #[error("Buffer mapping error: {0}")]
    BufferMapError(#[from] crate::resources::BufferMapError),
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
    #[error("State transition error: {0}")]
    TransitionError(#[from] TransitionError),
    #[error("CommandBuffer error: {0}")]
    CommandBufferError(#[from] CommandBufferError),
    #[error("Presentation error: {0}")]
    PresentError(#[from] PresentError),
    #[error("Vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use crate::error::{
        CommandBufferError, DeviceError, InstanceError, MemoryError, PresentError, SyncError,
        TransitionError, VkFrameError,
    };

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(InstanceError: Send, Sync);
        assert_impl_all!(DeviceError: Send, Sync);
        assert_impl_all!(MemoryError: Send, Sync);
        assert_impl_all!(SyncError: Send, Sync);
        assert_impl_all!(TransitionError: Send, Sync);
        assert_impl_all!(CommandBufferError: Send, Sync);
        assert_impl_all!(PresentError: Send, Sync);
        assert_impl_all!(VkFrameError: Send, Sync);
    }

    #[test]
    fn window_handle_errors_convert() {
        assert_impl_all!(raw_window_handle::HandleError: std::error::Error);
        assert_impl_all!(InstanceError: From<raw_window_handle::HandleError>);

        let err = InstanceError::from(raw_window_handle::HandleError::Unavailable);
        assert!(std::error::Error::source(&err).is_some());
    }
}
