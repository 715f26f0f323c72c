use std::{ptr::NonNull, sync::Arc};

use ash::vk;

use super::{Allocation, Allocator, MemoryUsage, check_range};
use crate::{context::Device, error::MemoryError};

///Searches the device's memory types for the first one that is allowed by `type_bits` and
/// supports at least all of `wanted`.
pub fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    wanted: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(i, ty)| (type_bits & (1 << i)) != 0 && ty.property_flags.contains(wanted))
        .map(|(i, _)| i as u32)
}

///A single `vkDeviceMemory` allocation. Its size is fixed at allocation time.
#[derive(Debug)]
pub struct MemoryBlock {
    memory: vk::DeviceMemory,
    size: u64,
    memory_type: u32,
    properties: vk::MemoryPropertyFlags,
    mapped: Option<NonNull<u8>>,
}

//SAFETY: the mapped pointer is only created and read through `&mut self`.
unsafe impl Send for MemoryBlock {}
unsafe impl Sync for MemoryBlock {}

impl MemoryBlock {
    pub fn memory_type(&self) -> u32 {
        self.memory_type
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }
}

impl Allocation for MemoryBlock {
    fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }
    fn offset(&self) -> u64 {
        0
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn memory_properties(&self) -> vk::MemoryPropertyFlags {
        self.properties
    }

    fn map(
        &mut self,
        device: &ash::Device,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, MemoryError> {
        check_range(offset, size, self.size)?;
        if !self
            .properties
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
        {
            return Err(MemoryError::NotHostVisible(self.properties));
        }
        if self.mapped.is_some() {
            #[cfg(feature = "logging")]
            log::error!("Tried to map already mapped memory block {:?}", self.memory);
            return Err(MemoryError::AlreadyMapped);
        }

        //Always map the whole block, so flushes over the whole range stay valid.
        let ptr = unsafe {
            device.map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
        };
        let ptr = NonNull::new(ptr as *mut u8).ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        self.mapped = Some(ptr);

        Ok(unsafe { ptr.add(offset as usize) })
    }

    fn unmap(&mut self, device: &ash::Device) {
        if self.mapped.take().is_some() {
            unsafe { device.unmap_memory(self.memory) };
        }
    }
}

///Allocator that creates one dedicated device memory block per request.
pub struct DedicatedAllocator {
    device: Arc<Device>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl DedicatedAllocator {
    pub fn new(device: &Arc<Device>) -> Self {
        let memory_properties = unsafe {
            device
                .instance
                .inner
                .get_physical_device_memory_properties(device.physical_device)
        };

        DedicatedAllocator {
            device: device.clone(),
            memory_properties,
        }
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }
}

impl Allocator for DedicatedAllocator {
    type Allocation = MemoryBlock;
    type AllocationError = MemoryError;

    fn allocate(
        &mut self,
        _name: Option<&str>,
        requirements: vk::MemoryRequirements,
        usage: MemoryUsage,
        _is_linear: bool,
    ) -> Result<Self::Allocation, Self::AllocationError> {
        let properties = usage.required_properties();
        let memory_type = find_memory_type(
            &self.memory_properties,
            requirements.memory_type_bits,
            properties,
        )
        .ok_or(MemoryError::NoSuitableMemoryType {
            type_bits: requirements.memory_type_bits,
            properties,
        })?;

        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory = unsafe { self.device.inner.allocate_memory(&info, None)? };

        #[cfg(feature = "logging")]
        log::trace!(
            "Allocated {} bytes of memory type {} for {}",
            requirements.size,
            memory_type,
            _name.unwrap_or("unnamed")
        );

        Ok(MemoryBlock {
            memory,
            size: requirements.size,
            memory_type,
            properties: self.memory_properties.memory_types[memory_type as usize].property_flags,
            mapped: None,
        })
    }

    fn free(&mut self, mut allocation: Self::Allocation) -> Result<(), Self::AllocationError> {
        allocation.unmap(&self.device.inner);
        unsafe { self.device.inner.free_memory(allocation.memory, None) };

        #[cfg(feature = "logging")]
        log::trace!("Freed {} bytes", allocation.size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (i, flags) in types.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn picks_first_superset_type() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        assert_eq!(
            find_memory_type(&props, u32::MAX, MemoryUsage::CpuToGpu.required_properties()),
            Some(2)
        );
        assert_eq!(
            find_memory_type(&props, u32::MAX, MemoryUsage::GpuOnly.required_properties()),
            Some(0)
        );
    }

    #[test]
    fn respects_type_bits() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        assert_eq!(
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
    }

    #[test]
    fn no_matching_type() {
        let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type(&props, u32::MAX, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
        //Type exists, but is masked out by the resource.
        assert_eq!(
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            None
        );
    }

    #[test]
    fn impl_send_sync() {
        assert_impl_all!(MemoryBlock: Send, Sync);
        assert_impl_all!(DedicatedAllocator: Send, Sync);
    }
}
