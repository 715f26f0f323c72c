use ash::vk;

use crate::error::CommandBufferError;

///The three roles a queue can serve for the frame loop. Several roles may map to the same queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Present,
    Compute,
}

///Abstract queue that collects a [vk::Queue](ash::vk::Queue) and its family.
///
/// Submissions must be externally synchronised. vkframe assumes a single host thread issues all work.
#[derive(Clone, Debug)]
pub struct Queue {
    pub inner: vk::Queue,
    pub family_index: u32,
    pub properties: vk::QueueFamilyProperties,
}

impl Queue {
    ///Submits `command_buffers` as one batch. `waits` and `signals` may reference binary and timeline semaphores.
    /// `fence` may be null.
    pub fn submit(
        &self,
        device: &ash::Device,
        command_buffers: &[vk::CommandBuffer],
        waits: &[vk::SemaphoreSubmitInfo<'_>],
        signals: &[vk::SemaphoreSubmitInfo<'_>],
        fence: vk::Fence,
    ) -> Result<(), CommandBufferError> {
        let cb_infos = command_buffers
            .iter()
            .map(|cb| vk::CommandBufferSubmitInfo::default().command_buffer(*cb))
            .collect::<Vec<_>>();
        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(waits)
            .command_buffer_infos(&cb_infos)
            .signal_semaphore_infos(signals);

        unsafe { device.queue_submit2(self.inner, &[submit], fence) }
            .map_err(CommandBufferError::SubmitFailed)
    }

    pub fn wait_idle(&self, device: &ash::Device) -> Result<(), vk::Result> {
        unsafe { device.queue_wait_idle(self.inner) }
    }
}

pub struct QueueBuilder {
    ///The family's index.
    pub family_index: u32,
    ///its properties
    pub properties: vk::QueueFamilyProperties,
    ///The length of this vector determines how many instances of this queue are created. The number determines the
    /// priority of each queue on the hardware.
    pub priorities: Vec<f32>,
}

impl QueueBuilder {
    pub fn as_create_info(&self) -> vk::DeviceQueueCreateInfo<'_> {
        vk::DeviceQueueCreateInfo::default()
            .queue_family_index(self.family_index)
            .queue_priorities(&self.priorities)
    }
}
