//! # Image state tracking
//!
//! Every [Image] carries the [ImageState] of each of its mip levels. Those states are only changed through a
//! [StateTracker], which validates the requested transition against a fixed table of legal edges and records the
//! matching pipeline barrier into a command buffer.
//!
//! The table is intentionally small. Any edge not listed in [barrier_for] is rejected with
//! [TransitionError::Illegal] instead of being approximated by a catch-all barrier.
//!
//! The aspect of each barrier is derived from the image's format, the subresource range always spans all
//! array layers. [StateTracker::transition] moves every mip level at once, [StateTracker::transition_level] a single
//! level, which is what mipmap generation needs.

use ash::vk;

use crate::{error::TransitionError, resources::Image, sync::BarrierBuilder};

///Abstract access state of an image (or a single mip level of it).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageState {
    Undefined,
    CopyDestination,
    CopySource,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderRead,
    PresentSource,
    General,
}

impl ImageState {
    ///Image layout that corresponds to this state.
    pub fn layout(&self) -> vk::ImageLayout {
        match self {
            ImageState::Undefined => vk::ImageLayout::UNDEFINED,
            ImageState::CopyDestination => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ImageState::CopySource => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ImageState::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ImageState::DepthStencilAttachment => {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            }
            ImageState::ShaderRead => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ImageState::PresentSource => vk::ImageLayout::PRESENT_SRC_KHR,
            ImageState::General => vk::ImageLayout::GENERAL,
        }
    }
}

///Access and stage masks of a legal transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionBarrier {
    pub src_access: vk::AccessFlags2,
    pub dst_access: vk::AccessFlags2,
    pub src_stage: vk::PipelineStageFlags2,
    pub dst_stage: vk::PipelineStageFlags2,
}

///Looks up the barrier configuration of the edge `from -> to`. Fails for every edge that is not part of the table.
pub fn barrier_for(from: ImageState, to: ImageState) -> Result<TransitionBarrier, TransitionError> {
    use ImageState::*;

    let (src_access, dst_access, src_stage, dst_stage) = match (from, to) {
        (Undefined, CopyDestination) => (
            vk::AccessFlags2::NONE,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::PipelineStageFlags2::TRANSFER,
        ),
        (CopyDestination, ShaderRead) => (
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::AccessFlags2::SHADER_READ,
            vk::PipelineStageFlags2::TRANSFER,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
        ),
        (Undefined, DepthStencilAttachment) => (
            vk::AccessFlags2::NONE,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
        ),
        (CopyDestination, General) => (
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::AccessFlags2::MEMORY_READ,
            vk::PipelineStageFlags2::TRANSFER,
            vk::PipelineStageFlags2::TRANSFER,
        ),
        (CopyDestination, CopySource) => (
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::AccessFlags2::TRANSFER_READ,
            vk::PipelineStageFlags2::TRANSFER,
            vk::PipelineStageFlags2::TRANSFER,
        ),
        (CopySource, ShaderRead) => (
            vk::AccessFlags2::TRANSFER_READ,
            vk::AccessFlags2::SHADER_READ,
            vk::PipelineStageFlags2::TRANSFER,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
        ),
        (Undefined, ColorAttachment) => (
            vk::AccessFlags2::NONE,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags2::TOP_OF_PIPE,
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        ),
        _ => {
            #[cfg(feature = "logging")]
            log::error!("Illegal image state transition {:?} -> {:?}", from, to);
            return Err(TransitionError::Illegal { from, to });
        }
    };

    Ok(TransitionBarrier {
        src_access,
        dst_access,
        src_stage,
        dst_stage,
    })
}

///Records validated state transitions into a command buffer that is in the recording state.
///
/// The image's tracked state changes as soon as the barrier is recorded. The caller is responsible for submitting the
/// command buffer before the image is used in the new state.
pub struct StateTracker<'a> {
    device: &'a ash::Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> StateTracker<'a> {
    pub fn new(device: &'a ash::Device, command_buffer: vk::CommandBuffer) -> Self {
        StateTracker {
            device,
            command_buffer,
        }
    }

    ///Transitions all mip levels of `image` to `to`. All levels have to be in the same state.
    pub fn transition(&self, image: &mut Image, to: ImageState) -> Result<(), TransitionError> {
        let Some(from) = image.state() else {
            #[cfg(feature = "logging")]
            log::error!(
                "Can not transition image {:?} as a whole, its mip levels differ in state",
                image.inner
            );
            return Err(TransitionError::NonUniformLevels);
        };

        let barrier = barrier_for(from, to)?;
        self.record(image, image.subresource_all(), from, to, barrier);
        image.states.iter_mut().for_each(|s| *s = to);
        Ok(())
    }

    ///Like [transition](Self::transition), but fails with [TransitionError::StateMismatch] if the image is not in `from`.
    pub fn transition_from(
        &self,
        image: &mut Image,
        from: ImageState,
        to: ImageState,
    ) -> Result<(), TransitionError> {
        match image.state() {
            Some(found) if found == from => self.transition(image, to),
            Some(found) => {
                #[cfg(feature = "logging")]
                log::error!(
                    "Image {:?} is in state {:?}, but transition expected {:?}",
                    image.inner,
                    found,
                    from
                );
                Err(TransitionError::StateMismatch {
                    expected: from,
                    found,
                })
            }
            None => Err(TransitionError::NonUniformLevels),
        }
    }

    ///Transitions exactly one mip `level` of `image`, for all of its array layers.
    pub fn transition_level(
        &self,
        image: &mut Image,
        level: u32,
        to: ImageState,
    ) -> Result<(), TransitionError> {
        let Some(from) = image.level_state(level) else {
            return Err(TransitionError::LevelOutOfRange {
                level,
                count: image.mip_levels(),
            });
        };

        let barrier = barrier_for(from, to)?;
        self.record(image, image.subresource_level(level), from, to, barrier);
        image.states[level as usize] = to;
        Ok(())
    }

    fn record(
        &self,
        image: &Image,
        range: vk::ImageSubresourceRange,
        from: ImageState,
        to: ImageState,
        barrier: TransitionBarrier,
    ) {
        let mut builder = BarrierBuilder::new();
        builder.image_barrier(
            image.inner,
            range,
            barrier.src_access,
            barrier.src_stage,
            from.layout(),
            barrier.dst_access,
            barrier.dst_stage,
            to.layout(),
        );
        builder.record(self.device, self.command_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ImageState; 8] = [
        ImageState::Undefined,
        ImageState::CopyDestination,
        ImageState::CopySource,
        ImageState::ColorAttachment,
        ImageState::DepthStencilAttachment,
        ImageState::ShaderRead,
        ImageState::PresentSource,
        ImageState::General,
    ];

    #[test]
    fn legal_table() {
        use ImageState::*;
        let legal = [
            (Undefined, CopyDestination),
            (CopyDestination, CopySource),
            (CopySource, ShaderRead),
            (CopyDestination, ShaderRead),
            (Undefined, DepthStencilAttachment),
            (Undefined, ColorAttachment),
            (CopyDestination, General),
        ];

        for from in ALL {
            for to in ALL {
                let result = barrier_for(from, to);
                if legal.contains(&(from, to)) {
                    assert!(result.is_ok(), "{:?} -> {:?} should be legal", from, to);
                } else {
                    assert_eq!(result, Err(TransitionError::Illegal { from, to }));
                }
            }
        }
    }

    #[test]
    fn shader_read_to_color_attachment_is_rejected() {
        assert_eq!(
            barrier_for(ImageState::ShaderRead, ImageState::ColorAttachment),
            Err(TransitionError::Illegal {
                from: ImageState::ShaderRead,
                to: ImageState::ColorAttachment
            })
        );
    }

    #[test]
    fn upload_barriers() {
        let to_dst = barrier_for(ImageState::Undefined, ImageState::CopyDestination).unwrap();
        assert_eq!(to_dst.src_access, vk::AccessFlags2::NONE);
        assert_eq!(to_dst.dst_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(to_dst.src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(to_dst.dst_stage, vk::PipelineStageFlags2::TRANSFER);

        let to_read = barrier_for(ImageState::CopyDestination, ImageState::ShaderRead).unwrap();
        assert_eq!(to_read.src_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(to_read.dst_access, vk::AccessFlags2::SHADER_READ);
        assert_eq!(to_read.dst_stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);

        let depth = barrier_for(ImageState::Undefined, ImageState::DepthStencilAttachment).unwrap();
        assert!(
            depth
                .dst_access
                .contains(vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn layouts_are_distinct() {
        for (i, a) in ALL.iter().enumerate() {
            for b in ALL.iter().skip(i + 1) {
                assert_ne!(a.layout(), b.layout());
            }
        }
    }
}
