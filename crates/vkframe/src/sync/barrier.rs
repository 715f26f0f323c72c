use ash::vk;
use tinyvec::TinyVec;

///Barrier building helper. Lets you add barriers for images and buffers
/// via a simple builder API, and records them as a single `vkCmdPipelineBarrier2`.
///
/// Uses tinyvec internally. Up to [STACK_ALLOCATION](Self::STACK_ALLOCATION) barriers per type are kept on the stack,
/// the builder however can outgrow that value.
#[derive(Debug, Default)]
pub struct BarrierBuilder {
    pub images: TinyVec<[vk::ImageMemoryBarrier2<'static>; Self::STACK_ALLOCATION]>,
    pub buffers: TinyVec<[vk::BufferMemoryBarrier2<'static>; Self::STACK_ALLOCATION]>,
}

impl BarrierBuilder {
    ///Amount of barriers that can be stack allocated.
    pub const STACK_ALLOCATION: usize = 6;

    pub fn new() -> Self {
        Self::default()
    }

    ///Adds this barrier to the internal collection.
    ///
    /// # Safety
    ///
    /// Make sure that the `buffer` handle is alive until the barrier is used on the GPU.
    #[allow(clippy::too_many_arguments)]
    pub fn buffer_barrier(
        &mut self,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        src_access_mask: vk::AccessFlags2,
        src_pipeline_stage: vk::PipelineStageFlags2,
        src_queue_family: u32,
        dst_access_mask: vk::AccessFlags2,
        dst_pipeline_stage: vk::PipelineStageFlags2,
        dst_queue_family: u32,
    ) -> &mut Self {
        let item = vk::BufferMemoryBarrier2::default()
            .buffer(buffer)
            .src_access_mask(src_access_mask)
            .src_stage_mask(src_pipeline_stage)
            .src_queue_family_index(src_queue_family)
            .dst_access_mask(dst_access_mask)
            .dst_stage_mask(dst_pipeline_stage)
            .dst_queue_family_index(dst_queue_family)
            .offset(offset)
            .size(size);
        self.buffers.push(item);

        self
    }

    pub fn buffer_custom_barrier(&mut self, barrier: vk::BufferMemoryBarrier2<'static>) -> &mut Self {
        self.buffers.push(barrier);
        self
    }

    ///Adds this barrier.
    ///
    /// # Safety
    ///
    /// Make sure that the `image` handle is alive until the barrier is used on the GPU.
    #[allow(clippy::too_many_arguments)]
    pub fn image_barrier(
        &mut self,
        image: vk::Image,
        subresource_range: vk::ImageSubresourceRange,
        src_access_mask: vk::AccessFlags2,
        src_pipeline_stage: vk::PipelineStageFlags2,
        src_layout: vk::ImageLayout,
        dst_access_mask: vk::AccessFlags2,
        dst_pipeline_stage: vk::PipelineStageFlags2,
        dst_layout: vk::ImageLayout,
    ) -> &mut Self {
        let item = vk::ImageMemoryBarrier2::default()
            .image(image)
            .subresource_range(subresource_range)
            .src_access_mask(src_access_mask)
            .src_stage_mask(src_pipeline_stage)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .old_layout(src_layout)
            .dst_access_mask(dst_access_mask)
            .dst_stage_mask(dst_pipeline_stage)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .new_layout(dst_layout);

        #[cfg(feature = "logging")]
        log::trace!("transition[{:?}] {:?} -> {:?}", image, src_layout, dst_layout);

        self.images.push(item);

        self
    }

    pub fn image_custom_barrier(&mut self, barrier: vk::ImageMemoryBarrier2<'static>) -> &mut Self {
        self.images.push(barrier);
        self
    }

    ///Returns a dependency info, containing the currently pushed barriers
    pub fn as_dependency_info(&self) -> vk::DependencyInfo<'_> {
        vk::DependencyInfo::default()
            .image_memory_barriers(self.images.as_slice())
            .buffer_memory_barriers(self.buffers.as_slice())
    }

    ///Returns true if at least one barrier has been added.
    pub fn has_barrier(&self) -> bool {
        !self.images.is_empty() || !self.buffers.is_empty()
    }

    ///Records all barriers into `command_buffer`. Does nothing if no barrier was added.
    pub fn record(&self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        if self.has_barrier() {
            unsafe { device.cmd_pipeline_barrier2(command_buffer, &self.as_dependency_info()) }
        }
    }
}
