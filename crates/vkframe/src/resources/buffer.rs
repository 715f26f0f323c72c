use std::{
    hash::{Hash, Hasher},
    sync::{Arc, Mutex},
};

use ash::vk;
use thiserror::Error;

use super::SharingMode;
use crate::{
    allocator::{
        Allocation, Allocator, AnonymAllocation, ManagedAllocation, MemoryUsage, into_memory_error,
        read_block, write_block,
    },
    context::Device,
    error::MemoryError,
};

#[derive(Error, Debug)]
pub enum BufferMapError {
    #[error("Access of {size} bytes at offset {offset} exceeds buffer of {buffer_size} bytes")]
    OutOfBounds {
        offset: u64,
        size: u64,
        buffer_size: u64,
    },
    #[error("Buffer with usage {0:?} can not be mapped")]
    NotMapable(MemoryUsage),
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}

#[derive(Clone, Debug)]
pub struct BufDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub sharing: SharingMode,
}

impl BufDesc {
    ///Exclusive buffer of `size` bytes.
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        BufDesc {
            size,
            usage,
            sharing: SharingMode::Exclusive,
        }
    }

    pub fn as_create_info(&self) -> vk::BufferCreateInfo<'_> {
        let info = vk::BufferCreateInfo::default()
            .size(self.size)
            .usage(self.usage);
        match &self.sharing {
            SharingMode::Exclusive => info.sharing_mode(vk::SharingMode::EXCLUSIVE),
            SharingMode::Concurrent {
                queue_family_indices,
            } => info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(queue_family_indices),
        }
    }
}

///Self managing buffer that is bound to exactly one memory block, and frees it when dropped.
//Note Freeing happens in `ManagedAllocation`'s implementation.
pub struct Buffer {
    pub desc: BufDesc,
    pub inner: vk::Buffer,
    pub usage: MemoryUsage,
    pub allocation: Box<dyn AnonymAllocation + Send + Sync + 'static>,
    pub device: Arc<Device>,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_buffer(self.inner, None) }
    }
}

///The hash implementation is based on [Buffer](ash::vk::Buffer)'s hash.
impl Hash for Buffer {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.inner.hash(hasher)
    }
}

impl Buffer {
    ///Creates a buffer for `description` and binds freshly allocated memory of `usage` to it.
    pub fn new<A: Allocator + Send + Sync + 'static>(
        device: &Arc<Device>,
        allocator: &Arc<Mutex<A>>,
        description: BufDesc,
        usage: MemoryUsage,
        name: Option<&str>,
    ) -> Result<Self, MemoryError> {
        let buffer = unsafe {
            device
                .inner
                .create_buffer(&description.as_create_info(), None)?
        };

        let allocation = {
            let mut lck = allocator
                .lock()
                .map_err(|_| MemoryError::Allocator("allocator lock is poisoned".into()))?;
            lck.allocate_buffer(&device.inner, name, &buffer, usage)
        };
        let allocation = match allocation {
            Ok(a) => a,
            Err(e) => {
                unsafe { device.inner.destroy_buffer(buffer, None) };
                return Err(into_memory_error(e));
            }
        };

        let allocation = ManagedAllocation {
            allocator: allocator.clone(),
            allocation: Some(allocation),
        };

        if let Err(e) = unsafe {
            device
                .inner
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            unsafe { device.inner.destroy_buffer(buffer, None) };
            return Err(e.into());
        }

        Ok(Buffer {
            device: device.clone(),
            allocation: Box::new(allocation),
            usage,
            desc: description,
            inner: buffer,
        })
    }

    ///A staging buffer is a host visible, mappable buffer, initialised to `data`. It can be used as transfer source
    /// and destination.
    pub fn new_staging_for_data<A: Allocator + Send + Sync + 'static, T: bytemuck::Pod>(
        device: &Arc<Device>,
        allocator: &Arc<Mutex<A>>,
        name: Option<&str>,
        data: &[T],
    ) -> Result<Self, BufferMapError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let desc = BufDesc::new(
            //zero sized buffers are invalid.
            (bytes.len() as u64).max(1),
            vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
        );

        let mut buffer = Buffer::new(device, allocator, desc, MemoryUsage::CpuToGpu, name)?;
        buffer.write(0, bytes)?;
        Ok(buffer)
    }

    pub fn size(&self) -> u64 {
        self.desc.size
    }

    fn check_access(&self, offset: u64, size: u64) -> Result<(), BufferMapError> {
        if self.usage == MemoryUsage::GpuOnly {
            #[cfg(feature = "logging")]
            log::error!("Tried to map buffer that has usage: {:?}", self.usage);
            return Err(BufferMapError::NotMapable(self.usage));
        }
        match offset.checked_add(size) {
            Some(end) if end <= self.desc.size => Ok(()),
            _ => Err(BufferMapError::OutOfBounds {
                offset,
                size,
                buffer_size: self.desc.size,
            }),
        }
    }

    ///Writes `data` into the buffer at `offset`. Nothing is written if the range exceeds the buffer, or if the buffer
    /// is not host visible.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), BufferMapError> {
        self.check_access(offset, data.len() as u64)?;
        write_block(self.allocation.as_mut(), &self.device.inner, offset, data)?;
        Ok(())
    }

    ///Reads `dst.len()` bytes starting at `offset`.
    pub fn read(&mut self, offset: u64, dst: &mut [u8]) -> Result<(), BufferMapError> {
        self.check_access(offset, dst.len() as u64)?;
        read_block(self.allocation.as_mut(), &self.device.inner, offset, dst)?;
        Ok(())
    }
}
