//! # vkframe
//!
//! Frame pipelining and resource transfer on top of [ash].
//!
//! vkframe provides transparent wrappers around the lifetime sensitive Vulkan objects. This includes the
//! [Instance](context::Instance), [Device](context::Device), buffers, images and synchronisation primitives. Those wrappers
//! keep track of their dependencies and destroy the wrapped object once dropped.
//!
//! On top of that it implements
//!
//! - a [state tracker](state) that only allows a fixed set of image state transitions and records the matching barriers,
//! - the [presentation ring](ring) that keeps a fixed number of frames in flight,
//! - [texel and mip accounting](util) used when uploading images.
//!
//! Uploads, one shot command submission and cross queue ownership transfers live in the `vkframe-commands` crate.
//!
//! Structures that are not sensitive to lifetime requirements (like create info) are not wrapped.

pub use ash;
pub use bytemuck;
#[cfg(feature = "gpu_allocator")]
pub use gpu_allocator;

///Allocator related details. vkframe allows for custom allocators (the `A` parameter on the [Context](context::Ctx)).
pub mod allocator;

///Structures you need to get started. Basically [Instance](context::Instance) and [Device](context::Device) creation.
/// Also includes the [Ctx](context::Ctx) struct, which also keeps track of a memory allocator and the command pools.
pub mod context;

pub mod resources;

pub mod ring;

pub mod state;

///Window surface related structures. Includes a self managed [Surface](surface::Surface) type.
pub mod surface;

/// [Swapchain](swapchain::Swapchain) type that can be created from a [Surface](surface::Surface).
pub mod swapchain;

pub mod sync;

mod error;
pub use error::{
    CommandBufferError, DeviceError, InstanceError, MemoryError, PresentError, SyncError,
    TransitionError, VkFrameError,
};

pub mod util;
