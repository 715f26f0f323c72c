use std::ptr::NonNull;

use gpu_allocator::{
    MemoryLocation,
    vulkan::{AllocationCreateDesc, AllocationScheme, AllocatorCreateDesc},
};

use super::{Allocation, MemoryUsage, check_range};
use crate::{context::Device, error::MemoryError};

pub fn memory_usage_to_location(usage: MemoryUsage) -> MemoryLocation {
    match usage {
        MemoryUsage::CpuToGpu => MemoryLocation::CpuToGpu,
        MemoryUsage::GpuOnly => MemoryLocation::GpuOnly,
        MemoryUsage::GpuToCpu => MemoryLocation::GpuToCpu,
    }
}

///Creates a pooled allocator for `device`. Can be passed to [Ctx::from_parts](crate::context::Ctx::from_parts).
pub fn create_gpu_allocator(device: &Device) -> Result<gpu_allocator::vulkan::Allocator, MemoryError> {
    gpu_allocator::vulkan::Allocator::new(&AllocatorCreateDesc {
        instance: device.instance.inner.clone(),
        device: device.inner.clone(),
        physical_device: device.physical_device,
        debug_settings: gpu_allocator::AllocatorDebugSettings {
            log_leaks_on_shutdown: true,
            ..Default::default()
        },
        buffer_device_address: false,
        allocation_sizes: Default::default(),
    })
    .map_err(|e| MemoryError::Allocator(Box::new(e)))
}

//gpu-allocator keeps host visible blocks persistently mapped, so mapping only
//offsets into that mapping.
impl Allocation for gpu_allocator::vulkan::Allocation {
    fn memory(&self) -> ash::vk::DeviceMemory {
        unsafe { gpu_allocator::vulkan::Allocation::memory(self) }
    }
    fn offset(&self) -> u64 {
        gpu_allocator::vulkan::Allocation::offset(self)
    }
    fn size(&self) -> u64 {
        gpu_allocator::vulkan::Allocation::size(self)
    }
    fn memory_properties(&self) -> ash::vk::MemoryPropertyFlags {
        gpu_allocator::vulkan::Allocation::memory_properties(self)
    }
    fn map(
        &mut self,
        _device: &ash::Device,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, MemoryError> {
        check_range(offset, size, Allocation::size(self))?;
        let ptr = self
            .mapped_ptr()
            .ok_or(MemoryError::NotHostVisible(Allocation::memory_properties(self)))?;
        Ok(unsafe { ptr.cast::<u8>().add(offset as usize) })
    }
    fn unmap(&mut self, _device: &ash::Device) {}
}

impl super::Allocator for gpu_allocator::vulkan::Allocator {
    type Allocation = gpu_allocator::vulkan::Allocation;
    type AllocationError = gpu_allocator::AllocationError;

    fn allocate(
        &mut self,
        name: Option<&str>,
        requirements: ash::vk::MemoryRequirements,
        usage: MemoryUsage,
        is_linear: bool,
    ) -> Result<Self::Allocation, Self::AllocationError> {
        let alloc_desc = AllocationCreateDesc {
            linear: is_linear,
            location: memory_usage_to_location(usage),
            name: name.unwrap_or("vkframe allocation"),
            requirements,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        };

        gpu_allocator::vulkan::Allocator::allocate(self, &alloc_desc)
    }

    fn free(&mut self, allocation: Self::Allocation) -> Result<(), Self::AllocationError> {
        gpu_allocator::vulkan::Allocator::free(self, allocation)
    }
}
