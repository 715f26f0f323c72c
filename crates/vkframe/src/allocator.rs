//! ## Allocator
//!
//! In Vulkan the application itself is responsible for allocating memory. Every buffer and image
//! is bound to exactly one block that it owns, and that block is freed when its owner is dropped.
//!
//! The `Allocator` trait abstracts over where that memory comes from. The default
//! [DedicatedAllocator] creates one `vkAllocateMemory` block per resource, selecting the memory type
//! whose property flags are a superset of the requested [MemoryUsage]. A pooled implementation based on
//! [Traverse Research's](https://github.com/Traverse-Research/gpu-allocator) `gpu-allocator` crate
//! is available through the `gpu_allocator` feature.
//!
//! Host access goes through [write_block] and [read_block], which map, copy and unmap in one go and
//! refuse any access that would leave the block.

use std::ptr::NonNull;

use ash::vk;

use crate::error::MemoryError;

mod dedicated;
pub use dedicated::{DedicatedAllocator, MemoryBlock, find_memory_type};

#[cfg(feature = "gpu_allocator")]
mod gpu_allocator;
#[cfg(feature = "gpu_allocator")]
pub use self::gpu_allocator::create_gpu_allocator;

mod unallocated;
pub use unallocated::UnmanagedAllocation;

///Types of memory usage. Make sure to use GpuOnly wherever it applies to get optimal performance.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MemoryUsage {
    ///Device local memory, not accessible from the host.
    GpuOnly,
    ///Host visible and coherent memory, used for staging uploads.
    CpuToGpu,
    ///Host visible and coherent memory the device writes back into.
    GpuToCpu,
}

impl MemoryUsage {
    ///Property flags a memory type must support to satisfy this usage.
    pub fn required_properties(&self) -> vk::MemoryPropertyFlags {
        match self {
            MemoryUsage::GpuOnly => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryUsage::CpuToGpu | MemoryUsage::GpuToCpu => {
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }
}

///Abstract allocation trait that allows finding the memory handle of an allocation, as well as its offset on that memory.
pub trait Allocation {
    fn memory(&self) -> vk::DeviceMemory;
    fn offset(&self) -> u64;
    ///Size of the block in bytes. Fixed for the lifetime of the allocation.
    fn size(&self) -> u64;
    fn memory_properties(&self) -> vk::MemoryPropertyFlags;
    ///Maps `size` bytes starting at `offset` (relative to this allocation) into host memory.
    ///
    /// Only legal on host visible blocks. Must be paired with [unmap](Allocation::unmap) before the device uses the block again.
    fn map(
        &mut self,
        device: &ash::Device,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, MemoryError>;
    fn unmap(&mut self, device: &ash::Device);
}

///Implemented for all allocations a resource can own. Allows the [Image](crate::resources::Image) and
/// [Buffer](crate::resources::Buffer) implementations to hide their allocator type.
pub trait AnonymAllocation: Allocation {}

impl<A: Allocator + Send + Sync + 'static> AnonymAllocation for ManagedAllocation<A> {}

///An allocation that frees itself when dropped.
pub struct ManagedAllocation<A: Allocator + Send + Sync + 'static> {
    pub allocator: std::sync::Arc<std::sync::Mutex<A>>,
    pub allocation: Option<<A as Allocator>::Allocation>,
}

impl<A: Allocator + Send + Sync + 'static> ManagedAllocation<A> {
    ///Returns false if the allocation was already released.
    pub fn is_valid(&self) -> bool {
        self.allocation.is_some()
    }

    ///Frees the allocation. Calling this on an already released allocation does nothing.
    pub fn release(&mut self) {
        let Some(allocation) = self.allocation.take() else {
            return;
        };

        match self.allocator.lock() {
            Ok(mut lck) => {
                if let Err(_e) = lck.free(allocation) {
                    #[cfg(feature = "logging")]
                    log::error!("Freeing allocation failed with: {}", _e);
                }
            }
            Err(_) => {
                #[cfg(feature = "logging")]
                log::warn!("Could not free managed allocation, allocator lock is poisoned");
            }
        }
    }
}

impl<A: Allocator + Send + Sync + 'static> Allocation for ManagedAllocation<A> {
    fn memory(&self) -> vk::DeviceMemory {
        self.allocation
            .as_ref()
            .map(|a| a.memory())
            .unwrap_or(vk::DeviceMemory::null())
    }
    fn offset(&self) -> u64 {
        self.allocation.as_ref().map(|a| a.offset()).unwrap_or(0)
    }
    fn size(&self) -> u64 {
        self.allocation.as_ref().map(|a| a.size()).unwrap_or(0)
    }
    fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.allocation
            .as_ref()
            .map(|a| a.memory_properties())
            .unwrap_or(vk::MemoryPropertyFlags::empty())
    }
    fn map(
        &mut self,
        device: &ash::Device,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, MemoryError> {
        match self.allocation.as_mut() {
            Some(a) => a.map(device, offset, size),
            None => Err(MemoryError::OutOfBounds {
                offset,
                size,
                block_size: 0,
            }),
        }
    }
    fn unmap(&mut self, device: &ash::Device) {
        if let Some(a) = self.allocation.as_mut() {
            a.unmap(device)
        }
    }
}

impl<A: Allocator + Send + Sync + 'static> Drop for ManagedAllocation<A> {
    fn drop(&mut self) {
        self.release()
    }
}

///Trait that can be implemented by anything that can handle allocation for a initialized [ash::Device](ash::Device).
pub trait Allocator {
    type Allocation: Allocation + Send + Sync + 'static;
    type AllocationError: std::error::Error + Send + Sync + 'static;
    ///creates a single allocation (possibly tagged via `name` for debugging).
    fn allocate(
        &mut self,
        name: Option<&str>,
        requirements: vk::MemoryRequirements,
        usage: MemoryUsage,
        is_linear: bool,
    ) -> Result<Self::Allocation, Self::AllocationError>;

    ///Frees a allocation
    fn free(&mut self, allocation: Self::Allocation) -> Result<(), Self::AllocationError>;

    ///Allocates for a provided buffer
    fn allocate_buffer(
        &mut self,
        device: &ash::Device,
        name: Option<&str>,
        buffer: &vk::Buffer,
        usage: MemoryUsage,
    ) -> Result<Self::Allocation, Self::AllocationError> {
        let requirements = unsafe { device.get_buffer_memory_requirements(*buffer) };
        //NOTE: Buffers are always "linear" in memory
        self.allocate(name, requirements, usage, true)
    }

    fn allocate_image(
        &mut self,
        device: &ash::Device,
        name: Option<&str>,
        image: &vk::Image,
        usage: MemoryUsage,
        is_linear: bool,
    ) -> Result<Self::Allocation, Self::AllocationError> {
        let requirements = unsafe { device.get_image_memory_requirements(*image) };
        self.allocate(name, requirements, usage, is_linear)
    }
}

///Converts an allocator specific error. [MemoryError]s, as returned by the [DedicatedAllocator], are passed through unchanged.
pub(crate) fn into_memory_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> MemoryError {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = Box::new(error);
    match boxed.downcast::<MemoryError>() {
        Ok(memory_error) => *memory_error,
        Err(other) => MemoryError::Allocator(other),
    }
}

///Checks that `size` bytes at `offset` lie within a block of `block_size` bytes.
pub fn check_range(offset: u64, size: u64, block_size: u64) -> Result<(), MemoryError> {
    match offset.checked_add(size) {
        Some(end) if end <= block_size => Ok(()),
        _ => Err(MemoryError::OutOfBounds {
            offset,
            size,
            block_size,
        }),
    }
}

///Copies `data` into `block` at `offset`. Maps, copies and unmaps the block. Fails without touching the block
/// if the write would exceed its size.
pub fn write_block<B: Allocation + ?Sized>(
    block: &mut B,
    device: &ash::Device,
    offset: u64,
    data: &[u8],
) -> Result<(), MemoryError> {
    let size = data.len() as u64;
    check_range(offset, size, block.size())?;
    if size == 0 {
        return Ok(());
    }

    let ptr = block.map(device, offset, size)?;
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len());
    }

    let flushed = if block
        .memory_properties()
        .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
    {
        Ok(())
    } else {
        let range = vk::MappedMemoryRange::default()
            .memory(block.memory())
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe { device.flush_mapped_memory_ranges(&[range]) }
    };
    block.unmap(device);
    flushed?;
    Ok(())
}

///Copies `dst.len()` bytes starting at `offset` from `block` into `dst`.
pub fn read_block<B: Allocation + ?Sized>(
    block: &mut B,
    device: &ash::Device,
    offset: u64,
    dst: &mut [u8],
) -> Result<(), MemoryError> {
    let size = dst.len() as u64;
    check_range(offset, size, block.size())?;
    if size == 0 {
        return Ok(());
    }

    let ptr = block.map(device, offset, size)?;
    if !block
        .memory_properties()
        .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
    {
        let range = vk::MappedMemoryRange::default()
            .memory(block.memory())
            .offset(0)
            .size(vk::WHOLE_SIZE);
        if let Err(e) = unsafe { device.invalidate_mapped_memory_ranges(&[range]) } {
            block.unmap(device);
            return Err(e.into());
        }
    }
    unsafe {
        std::ptr::copy_nonoverlapping(ptr.as_ptr(), dst.as_mut_ptr(), dst.len());
    }
    block.unmap(device);
    Ok(())
}
