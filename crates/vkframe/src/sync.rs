//! # Synchronisation
//!
//! vkframe uses thin wrappers around Vulkan's native synchronisation primitives:
//!
//! - [Fence]: signalled by the device once a submission completes, waited on by the host. Each frame slot of the
//!   [PresentationRing](crate::ring::PresentationRing) owns one, as does every synchronous scoped submission.
//! - [Semaphore]: device-only ordering between submissions. Binary semaphores order image acquisition and
//!   presentation; timeline semaphores order work across queues, since their value can be reused frame after frame.
//! - [BarrierBuilder]: collects memory barriers (image layout transitions, queue ownership transfers) and records them
//!   as one `vkCmdPipelineBarrier2` call.
//!
//! All host side waits take a timeout. Running into it is reported as [SyncError::Timeout] and treated as fatal,
//! since it means the device is lost or a submission will never complete.

use std::{fmt::Debug, sync::Arc};

use ash::vk;

use crate::{context::Device, error::SyncError};

mod barrier;
pub use barrier::BarrierBuilder;

///Timeout used for all host side waits, in nanoseconds (100 seconds).
pub const DEFAULT_FENCE_TIMEOUT: u64 = 100_000_000_000;

///Binary host-device synchronisation primitive.
pub struct Fence {
    pub inner: vk::Fence,
    pub device: Arc<Device>,
}

impl Fence {
    ///Creates a new fence. Frame slot fences start `signaled`, so the first wait on them returns immediately.
    pub fn new(device: &Arc<Device>, signaled: bool) -> Result<Self, SyncError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let inner = unsafe {
            device
                .inner
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        };

        Ok(Fence {
            inner,
            device: device.clone(),
        })
    }

    ///Blocks until the fence is signaled. Fails with [SyncError::Timeout] if that takes longer than `timeout` nanoseconds.
    pub fn wait(&self, timeout: u64) -> Result<(), SyncError> {
        match unsafe {
            self.device
                .inner
                .wait_for_fences(core::slice::from_ref(&self.inner), true, timeout)
        } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => {
                #[cfg(feature = "logging")]
                log::error!("Fence {:?} timed out after {}ns", self.inner, timeout);
                Err(SyncError::Timeout(timeout))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn reset(&self) -> Result<(), SyncError> {
        unsafe {
            self.device
                .inner
                .reset_fences(core::slice::from_ref(&self.inner))?
        };
        Ok(())
    }

    pub fn is_signaled(&self) -> Result<bool, SyncError> {
        Ok(unsafe { self.device.inner.get_fence_status(self.inner)? })
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_fence(self.inner, None) }
    }
}

impl Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SemaphoreKind {
    Binary,
    Timeline,
}

///Binary or [timeline](https://www.khronos.org/blog/vulkan-timeline-semaphores) semaphore.
pub struct Semaphore {
    pub inner: vk::Semaphore,
    pub device: Arc<Device>,
    pub kind: SemaphoreKind,
}

impl Semaphore {
    ///Creates a binary semaphore, as needed for swapchain acquire and present.
    pub fn binary(device: &Arc<Device>) -> Result<Arc<Self>, SyncError> {
        let semaphore = unsafe {
            device
                .inner
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Arc::new(Semaphore {
            inner: semaphore,
            device: device.clone(),
            kind: SemaphoreKind::Binary,
        }))
    }

    pub fn timeline(device: &Arc<Device>, initial_value: u64) -> Result<Arc<Self>, SyncError> {
        let mut timeline_ci = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(initial_value);
        let ci = vk::SemaphoreCreateInfo::default().push_next(&mut timeline_ci);

        let semaphore = unsafe { device.inner.create_semaphore(&ci, None)? };

        Ok(Arc::new(Semaphore {
            inner: semaphore,
            device: device.clone(),
            kind: SemaphoreKind::Timeline,
        }))
    }

    ///Returns the current value of a timeline semaphore. Note that this can change at any time if the semaphore is in use on
    /// the device.
    pub fn get_value(&self) -> Result<u64, SyncError> {
        debug_assert_eq!(self.kind, SemaphoreKind::Timeline);
        Ok(unsafe { self.device.inner.get_semaphore_counter_value(self.inner)? })
    }

    ///Blocks until the timeline semaphore reaches `value`, or fails after `timeout` nanoseconds.
    pub fn wait(&self, value: u64, timeout: u64) -> Result<(), SyncError> {
        debug_assert_eq!(self.kind, SemaphoreKind::Timeline);
        let sem = [self.inner];
        let val = [value];
        let wait = vk::SemaphoreWaitInfo::default().semaphores(&sem).values(&val);

        match unsafe { self.device.inner.wait_semaphores(&wait, timeout) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(SyncError::Timeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }

    ///Signals the timeline semaphore from the host.
    pub fn signal(&self, value: u64) -> Result<(), SyncError> {
        debug_assert_eq!(self.kind, SemaphoreKind::Timeline);
        let info = vk::SemaphoreSignalInfo::default()
            .semaphore(self.inner)
            .value(value);
        unsafe { self.device.inner.signal_semaphore(&info)? };
        Ok(())
    }

    ///Describes a wait on, or signal of, this semaphore at `stage`. `value` is ignored for binary semaphores.
    pub fn submit_info(
        &self,
        value: u64,
        stage: vk::PipelineStageFlags2,
    ) -> vk::SemaphoreSubmitInfo<'static> {
        let value = match self.kind {
            SemaphoreKind::Binary => 0,
            SemaphoreKind::Timeline => value,
        };
        vk::SemaphoreSubmitInfo::default()
            .semaphore(self.inner)
            .value(value)
            .stage_mask(stage)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.inner.destroy_semaphore(self.inner, None) }
    }
}

impl Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.inner)
    }
}
