use std::{marker::PhantomData, ptr::NonNull};

use super::{Allocation, AnonymAllocation};
use crate::error::MemoryError;

///Allocation of a resource whose memory is owned by someone else. Used for swapchain images, since the swapchain
/// handles their memory itself. Any attempt to map it fails.
pub struct UnmanagedAllocation {
    _hidden: PhantomData<()>, //exists so that this struct cannot be created outside of vkframe.
}

impl UnmanagedAllocation {
    pub(crate) fn new() -> Self {
        UnmanagedAllocation {
            _hidden: PhantomData,
        }
    }
}

impl Allocation for UnmanagedAllocation {
    fn memory(&self) -> ash::vk::DeviceMemory {
        ash::vk::DeviceMemory::null()
    }
    fn offset(&self) -> u64 {
        0
    }
    fn size(&self) -> u64 {
        0
    }
    fn memory_properties(&self) -> ash::vk::MemoryPropertyFlags {
        ash::vk::MemoryPropertyFlags::empty()
    }
    fn map(
        &mut self,
        _device: &ash::Device,
        _offset: u64,
        _size: u64,
    ) -> Result<NonNull<u8>, MemoryError> {
        Err(MemoryError::NotHostVisible(self.memory_properties()))
    }
    fn unmap(&mut self, _device: &ash::Device) {}
}

impl AnonymAllocation for UnmanagedAllocation {}
