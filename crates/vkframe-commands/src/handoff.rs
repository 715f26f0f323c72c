//! Handing a buffer from one queue to another.
//!
//! When a buffer is written on one queue (usually compute) and read on another (usually graphics), three things are
//! needed:
//!
//! 1. a *release* barrier recorded on the producer, transferring ownership from the producer's queue family,
//! 2. a semaphore the producer's submission signals and the consumer's submission waits on,
//! 3. the matching *acquire* barrier recorded on the consumer.
//!
//! [HandoffPlan] computes the barriers, [Handoff] owns the timeline semaphore and hands out one [BufferHandoff] per
//! transfer. If both roles are served by the same queue, submission order is sufficient and nothing is recorded.

use std::sync::Arc;

use vkframe::{
    SyncError,
    allocator::Allocator,
    ash::{self, vk},
    context::{Ctx, QueueRole},
    resources::Buffer,
    sync::{BarrierBuilder, Semaphore},
};

///Access of a buffer at a pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferAccess {
    pub access: vk::AccessFlags2,
    pub stage: vk::PipelineStageFlags2,
}

impl BufferAccess {
    pub const fn new(access: vk::AccessFlags2, stage: vk::PipelineStageFlags2) -> Self {
        BufferAccess { access, stage }
    }

    ///Compute shader writes.
    pub const COMPUTE_WRITE: Self = Self::new(
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
        vk::PipelineStageFlags2::COMPUTE_SHADER,
    );
    pub const TRANSFER_WRITE: Self = Self::new(
        vk::AccessFlags2::TRANSFER_WRITE,
        vk::PipelineStageFlags2::TRANSFER,
    );
    pub const TRANSFER_READ: Self = Self::new(
        vk::AccessFlags2::TRANSFER_READ,
        vk::PipelineStageFlags2::TRANSFER,
    );
    pub const VERTEX_READ: Self = Self::new(
        vk::AccessFlags2::VERTEX_ATTRIBUTE_READ,
        vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT,
    );
    pub const FRAGMENT_READ: Self = Self::new(
        vk::AccessFlags2::SHADER_STORAGE_READ,
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
    );
}

///Barriers and synchronisation needed to move a buffer between two queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandoffPlan {
    pub producer_family: u32,
    pub consumer_family: u32,
    ///Both roles submit to the same queue.
    pub same_queue: bool,
    ///Last write of the producer.
    pub last_write: BufferAccess,
    ///First access of the consumer.
    pub next_access: BufferAccess,
}

impl HandoffPlan {
    ///True if the consumer has to wait on a semaphore signaled by the producer.
    pub fn needs_semaphore(&self) -> bool {
        !self.same_queue
    }

    ///True if queue family ownership has to be released and acquired.
    pub fn transfers_ownership(&self) -> bool {
        !self.same_queue && self.producer_family != self.consumer_family
    }

    ///Barrier the producer records after its last write.
    pub fn release_barrier(
        &self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
    ) -> Option<vk::BufferMemoryBarrier2<'static>> {
        if !self.transfers_ownership() {
            return None;
        }
        Some(
            vk::BufferMemoryBarrier2::default()
                .buffer(buffer)
                .offset(offset)
                .size(size)
                .src_access_mask(self.last_write.access)
                .src_stage_mask(self.last_write.stage)
                .dst_access_mask(vk::AccessFlags2::NONE)
                .dst_stage_mask(vk::PipelineStageFlags2::NONE)
                .src_queue_family_index(self.producer_family)
                .dst_queue_family_index(self.consumer_family),
        )
    }

    ///Barrier the consumer records before its first access. Mirrors [release_barrier](Self::release_barrier).
    pub fn acquire_barrier(
        &self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
    ) -> Option<vk::BufferMemoryBarrier2<'static>> {
        if !self.transfers_ownership() {
            return None;
        }
        Some(
            vk::BufferMemoryBarrier2::default()
                .buffer(buffer)
                .offset(offset)
                .size(size)
                .src_access_mask(vk::AccessFlags2::NONE)
                .src_stage_mask(vk::PipelineStageFlags2::NONE)
                .dst_access_mask(self.next_access.access)
                .dst_stage_mask(self.next_access.stage)
                .src_queue_family_index(self.producer_family)
                .dst_queue_family_index(self.consumer_family),
        )
    }
}

///Reusable handoff between two queue roles. Owns the timeline semaphore both sides synchronise on.
pub struct Handoff {
    semaphore: Arc<Semaphore>,
    value: u64,
    producer_family: u32,
    consumer_family: u32,
    same_queue: bool,
}

impl Handoff {
    pub fn new<A: Allocator + Send + Sync + 'static>(
        ctx: &Ctx<A>,
        producer: QueueRole,
        consumer: QueueRole,
    ) -> Result<Self, SyncError> {
        let producer_queue = ctx.queue(producer);
        let consumer_queue = ctx.queue(consumer);
        let same_queue = producer_queue.inner == consumer_queue.inner;

        #[cfg(feature = "logging")]
        log::info!(
            "Handoff {:?}(family {}) -> {:?}(family {}), same queue: {}",
            producer,
            producer_queue.family_index,
            consumer,
            consumer_queue.family_index,
            same_queue
        );

        Ok(Handoff {
            semaphore: Semaphore::timeline(&ctx.device, 0)?,
            value: 0,
            producer_family: producer_queue.family_index,
            consumer_family: consumer_queue.family_index,
            same_queue,
        })
    }

    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    ///Value the most recent [BufferHandoff] signals.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn is_same_queue(&self) -> bool {
        self.same_queue
    }

    pub fn plan(&self, last_write: BufferAccess, next_access: BufferAccess) -> HandoffPlan {
        HandoffPlan {
            producer_family: self.producer_family,
            consumer_family: self.consumer_family,
            same_queue: self.same_queue,
            last_write,
            next_access,
        }
    }

    ///Starts the next handoff of the whole `buffer`. Each call advances the timeline value.
    pub fn buffer(
        &mut self,
        buffer: &Buffer,
        last_write: BufferAccess,
        next_access: BufferAccess,
    ) -> BufferHandoff {
        self.value += 1;
        BufferHandoff {
            plan: self.plan(last_write, next_access),
            buffer: buffer.inner,
            offset: 0,
            size: vk::WHOLE_SIZE,
            semaphore: self.semaphore.clone(),
            value: self.value,
        }
    }
}

///One transfer of a buffer from the producer to the consumer queue.
///
/// The buffer handle is not kept alive. The caller has to keep the buffer valid until the consumer has finished.
#[derive(Clone, Debug)]
pub struct BufferHandoff {
    pub plan: HandoffPlan,
    pub buffer: vk::Buffer,
    pub offset: u64,
    pub size: u64,
    semaphore: Arc<Semaphore>,
    value: u64,
}

impl BufferHandoff {
    ///Restricts the handoff to `size` bytes starting at `offset`.
    pub fn with_range(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = size;
        self
    }

    pub fn semaphore(&self) -> &Arc<Semaphore> {
        &self.semaphore
    }

    ///Timeline value the producer signals and the consumer waits for.
    pub fn value(&self) -> u64 {
        self.value
    }

    ///Records the release barrier into the producer's `command_buffer`, if one is needed.
    pub fn record_release(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        if let Some(barrier) = self
            .plan
            .release_barrier(self.buffer, self.offset, self.size)
        {
            BarrierBuilder::new()
                .buffer_custom_barrier(barrier)
                .record(device, command_buffer);
        }
    }

    ///Records the acquire barrier into the consumer's `command_buffer`, if one is needed.
    pub fn record_acquire(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        if let Some(barrier) = self
            .plan
            .acquire_barrier(self.buffer, self.offset, self.size)
        {
            BarrierBuilder::new()
                .buffer_custom_barrier(barrier)
                .record(device, command_buffer);
        }
    }

    ///Semaphore signal the producer's submission has to include. `None` on a shared queue.
    pub fn signal_info(&self) -> Option<vk::SemaphoreSubmitInfo<'static>> {
        self.plan
            .needs_semaphore()
            .then(|| self.semaphore.submit_info(self.value, self.plan.last_write.stage))
    }

    ///Semaphore wait the consumer's submission has to include, at the stage of its first access. `None` on a shared
    /// queue.
    pub fn wait_info(&self) -> Option<vk::SemaphoreSubmitInfo<'static>> {
        self.plan
            .needs_semaphore()
            .then(|| self.semaphore.submit_info(self.value, self.plan.next_access.stage))
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    fn plan(producer: u32, consumer: u32, same_queue: bool) -> HandoffPlan {
        HandoffPlan {
            producer_family: producer,
            consumer_family: consumer,
            same_queue,
            last_write: BufferAccess::COMPUTE_WRITE,
            next_access: BufferAccess::VERTEX_READ,
        }
    }

    #[test]
    fn release_and_acquire_mirror() {
        let plan = plan(1, 0, false);
        let release = plan
            .release_barrier(vk::Buffer::null(), 0, 128)
            .expect("release barrier");
        let acquire = plan
            .acquire_barrier(vk::Buffer::null(), 0, 128)
            .expect("acquire barrier");

        assert_eq!(release.src_queue_family_index, 1);
        assert_eq!(release.dst_queue_family_index, 0);
        assert_eq!(acquire.src_queue_family_index, 1);
        assert_eq!(acquire.dst_queue_family_index, 0);

        assert_eq!(release.src_access_mask, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(release.dst_access_mask, vk::AccessFlags2::NONE);
        assert_eq!(acquire.src_access_mask, vk::AccessFlags2::NONE);
        assert_eq!(acquire.dst_access_mask, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ);
        assert_eq!(acquire.dst_stage_mask, vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT);
        assert_eq!((release.size, acquire.size), (128, 128));
    }

    #[test]
    fn same_family_needs_no_barrier() {
        let plan = plan(0, 0, false);
        assert!(plan.needs_semaphore());
        assert!(!plan.transfers_ownership());
        assert!(plan.release_barrier(vk::Buffer::null(), 0, 4).is_none());
        assert!(plan.acquire_barrier(vk::Buffer::null(), 0, 4).is_none());
    }

    #[test]
    fn same_queue_skips_everything() {
        let plan = plan(0, 0, true);
        assert!(!plan.needs_semaphore());
        assert!(!plan.transfers_ownership());
        assert!(plan.release_barrier(vk::Buffer::null(), 0, 4).is_none());
    }

    #[test]
    fn handoff_send_sync() {
        assert_impl_all!(Handoff: Send, Sync);
        assert_impl_all!(BufferHandoff: Send, Sync);
        assert_impl_all!(HandoffPlan: Send, Sync, Copy);
    }
}
