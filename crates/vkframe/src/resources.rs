//! Allocatable resources. Mostly [Image] and [Buffer], plus the command pools and buffers work is recorded into.
//!
//! Buffers and images own their memory through an [AnonymAllocation](crate::allocator::AnonymAllocation), so the
//! allocator type does not leak into their signature. Dropping a resource destroys the handle and frees the memory.

use smallvec::SmallVec;

mod buffer;
pub use buffer::{BufDesc, Buffer, BufferMapError};

mod image;
pub use image::{Image, ImageType, ImageView, ImgDesc, ImgViewDesc};

mod command_buffer;
pub use command_buffer::{CommandBuffer, CommandBufferAllocator, CommandPool};

///How a resource is shared between queue families.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SharingMode {
    Exclusive,
    Concurrent {
        ///The queue family indices of families that can access the resource concurrently.
        queue_family_indices: SmallVec<[u32; 4]>,
    },
}
