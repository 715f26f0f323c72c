//! # Presentation ring
//!
//! Pipelines frames between the host and the device. A fixed number of frame slots (two by default) each own an
//! acquire semaphore, a render-complete semaphore and a fence. Every frame walks through
//!
//! `Idle -> Acquiring -> Submitted -> Presenting -> Idle`
//!
//! and then moves on to the next slot. Before a slot is reused its fence is waited on, so the host can never run more
//! than `frames_in_flight` frames ahead of the device. Additionally each swapchain image remembers which slot wrote it
//! last. If a freshly acquired image is still being written by another slot, that slot's fence is waited on as well.
//!
//! The bookkeeping lives in [FrameRing], which is generic over the fence type and has no device dependency.
//! [PresentationRing] pairs it with a [Swapchain] and the actual Vulkan objects.
//!
//! A stale surface is not an error. [PresentationRing::acquire_next_image] and [PresentationRing::present] report it as
//! [Acquire::Rebuild] or [PresentOutcome::Rebuild], after which the caller calls [PresentationRing::rebuild].

use std::sync::Arc;

use ash::vk;

use crate::{
    allocator::Allocator,
    context::{Ctx, Device, Queue},
    error::{PresentError, SyncError},
    resources::{Image, ImageView},
    surface::Surface,
    swapchain::Swapchain,
    sync::{DEFAULT_FENCE_TIMEOUT, Fence, Semaphore},
};

///Host side view of a fence as needed by the [FrameRing].
pub trait FrameFence {
    ///Blocks until the fence is signaled, or fails after `timeout` nanoseconds.
    fn wait(&self, timeout: u64) -> Result<(), SyncError>;
    ///Moves the fence back to the unsignaled state. Only legal once it was signaled.
    fn reset(&self) -> Result<(), SyncError>;
    fn is_signaled(&self) -> Result<bool, SyncError>;
}

impl FrameFence for Fence {
    fn wait(&self, timeout: u64) -> Result<(), SyncError> {
        Fence::wait(self, timeout)
    }
    fn reset(&self) -> Result<(), SyncError> {
        Fence::reset(self)
    }
    fn is_signaled(&self) -> Result<bool, SyncError> {
        Fence::is_signaled(self)
    }
}

///Phase of the frame that is currently being worked on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Submitted,
    Presenting,
}

///Frame slot and swapchain image bookkeeping of a [PresentationRing].
///
/// Holds one fence per frame slot. Calls that happen in the wrong [FramePhase] fail with [PresentError::OutOfOrder].
pub struct FrameRing<F: FrameFence> {
    fences: Vec<F>,
    current: usize,
    ///Slot that last wrote each swapchain image.
    images_in_flight: Vec<Option<usize>>,
    phase: FramePhase,
    timeout: u64,
}

impl<F: FrameFence> FrameRing<F> {
    ///Creates a ring with one slot per fence. Fences are expected to start out signaled.
    ///
    /// Fails with [PresentError::NoFramesInFlight] if `fences` is empty.
    pub fn new(fences: Vec<F>, image_count: usize, timeout: u64) -> Result<Self, PresentError> {
        if fences.is_empty() {
            return Err(PresentError::NoFramesInFlight);
        }
        Ok(FrameRing {
            fences,
            current: 0,
            images_in_flight: vec![None; image_count],
            phase: FramePhase::Idle,
            timeout,
        })
    }

    ///Index of the slot the current frame uses.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frames_in_flight(&self) -> usize {
        self.fences.len()
    }

    pub fn fence(&self, slot: usize) -> Option<&F> {
        self.fences.get(slot)
    }

    ///Slot that last wrote swapchain image `image`, if any.
    pub fn image_owner(&self, image: u32) -> Option<usize> {
        self.images_in_flight.get(image as usize).copied().flatten()
    }

    fn expect(&self, expected: FramePhase) -> Result<(), PresentError> {
        if self.phase == expected {
            Ok(())
        } else {
            #[cfg(feature = "logging")]
            log::error!(
                "Frame ring used out of order: expected {:?}, but is in {:?}",
                expected,
                self.phase
            );
            Err(PresentError::OutOfOrder {
                expected,
                found: self.phase,
            })
        }
    }

    ///Waits until the current slot's previous frame has finished on the device. Returns the slot index.
    pub fn begin_acquire(&mut self) -> Result<usize, PresentError> {
        self.expect(FramePhase::Idle)?;
        self.fences[self.current].wait(self.timeout)?;
        self.phase = FramePhase::Acquiring;
        Ok(self.current)
    }

    ///Returns to [FramePhase::Idle] without using the slot, for instance if no image could be acquired.
    pub fn abandon_acquire(&mut self) -> Result<(), PresentError> {
        self.expect(FramePhase::Acquiring)?;
        self.phase = FramePhase::Idle;
        Ok(())
    }

    ///Marks `image` as written by the current slot. If another slot wrote it last, waits for that slot's fence first.
    pub fn claim_image(&mut self, image: u32) -> Result<(), PresentError> {
        self.expect(FramePhase::Acquiring)?;
        let Some(owner) = self.images_in_flight.get_mut(image as usize) else {
            return Err(PresentError::InvalidImage(image));
        };

        if let Some(slot) = *owner {
            if slot != self.current {
                self.fences[slot].wait(self.timeout)?;
            }
        }
        *owner = Some(self.current);
        Ok(())
    }

    ///Resets the current slot's fence and returns it, so it can be attached to the frame's submission.
    pub fn begin_submit(&mut self) -> Result<&F, PresentError> {
        self.expect(FramePhase::Acquiring)?;
        let fence = &self.fences[self.current];
        fence.reset()?;
        self.phase = FramePhase::Submitted;
        Ok(fence)
    }

    pub fn begin_present(&mut self) -> Result<(), PresentError> {
        self.expect(FramePhase::Submitted)?;
        self.phase = FramePhase::Presenting;
        Ok(())
    }

    ///Ends the frame and advances to the next slot.
    pub fn finish_present(&mut self) -> Result<(), PresentError> {
        self.expect(FramePhase::Presenting)?;
        self.current = (self.current + 1) % self.fences.len();
        self.phase = FramePhase::Idle;
        Ok(())
    }

    ///Forgets all image owners, for instance after the swapchain was recreated with `image_count` images.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images_in_flight = vec![None; image_count];
        self.phase = FramePhase::Idle;
    }

    ///Replaces all slot fences. Expects exactly one fence per slot, the slot count never changes.
    pub fn replace_fences(&mut self, fences: Vec<F>) {
        debug_assert_eq!(fences.len(), self.fences.len());
        self.fences = fences;
    }
}

///Configuration of a [PresentationRing].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingConfig {
    ///Number of frame slots. Fixed for the lifetime of the ring.
    pub frames_in_flight: usize,
    ///Timeout of all fence waits, in nanoseconds.
    pub fence_timeout: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            frames_in_flight: 2,
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
        }
    }
}

///Semaphores of one frame slot. The slot's fence is owned by the [FrameRing].
pub struct FrameSlot {
    ///Signaled once the acquired swapchain image can be written.
    pub acquire: Arc<Semaphore>,
    ///Signaled by the frame's submission, waited on by the present.
    pub render_complete: Arc<Semaphore>,
}

impl FrameSlot {
    fn new(device: &Arc<Device>) -> Result<Self, SyncError> {
        Ok(FrameSlot {
            acquire: Semaphore::binary(device)?,
            render_complete: Semaphore::binary(device)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    ///Index of the swapchain image to render into.
    Image(u32),
    ///The surface changed. Call [PresentationRing::rebuild] before trying again.
    Rebuild,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    ///The image was presented or dropped, but the swapchain no longer matches the surface.
    Rebuild,
}

///Swapchain plus frame slots. Drives the per frame loop:
///
/// 1. [acquire_next_image](Self::acquire_next_image)
/// 2. record commands into the image, then [submit](Self::submit) them
/// 3. [present](Self::present)
pub struct PresentationRing {
    device: Arc<Device>,
    pub swapchain: Swapchain,
    slots: Vec<FrameSlot>,
    frames: FrameRing<Fence>,
    config: RingConfig,
}

impl PresentationRing {
    pub fn new<A: Allocator + Send + Sync + 'static>(
        ctx: &Ctx<A>,
        surface: &Arc<Surface>,
        extent: vk::Extent2D,
        config: RingConfig,
    ) -> Result<Self, PresentError> {
        if extent.width == 0 || extent.height == 0 {
            return Err(PresentError::ZeroExtent(extent));
        }
        if config.frames_in_flight == 0 {
            return Err(PresentError::NoFramesInFlight);
        }

        let swapchain = Swapchain::builder(&ctx.device, surface, extent)?.build()?;
        let (slots, fences) = Self::create_sync(&ctx.device, config.frames_in_flight)?;
        let frames = FrameRing::new(fences, swapchain.image_count(), config.fence_timeout)?;

        #[cfg(feature = "logging")]
        log::info!(
            "Created presentation ring with {} frames in flight over {} swapchain images",
            config.frames_in_flight,
            swapchain.image_count()
        );

        Ok(PresentationRing {
            device: ctx.device.clone(),
            swapchain,
            slots,
            frames,
            config,
        })
    }

    fn create_sync(device: &Arc<Device>, count: usize) -> Result<(Vec<FrameSlot>, Vec<Fence>), SyncError> {
        let mut slots = Vec::with_capacity(count);
        let mut fences = Vec::with_capacity(count);
        for _ in 0..count {
            slots.push(FrameSlot::new(device)?);
            //signaled, so the first wait on each slot returns immediately
            fences.push(Fence::new(device, true)?);
        }
        Ok((slots, fences))
    }

    pub fn config(&self) -> &RingConfig {
        &self.config
    }

    pub fn frame_ring(&self) -> &FrameRing<Fence> {
        &self.frames
    }

    ///Slot used by the frame that is currently being built.
    pub fn current_slot(&self) -> &FrameSlot {
        &self.slots[self.frames.current()]
    }

    pub fn image(&self, index: u32) -> Option<&Arc<Image>> {
        self.swapchain.images.get(index as usize)
    }

    pub fn view(&self, index: u32) -> Option<&ImageView> {
        self.swapchain.views.get(index as usize)
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    ///Waits for the current slot to become free, then acquires the next swapchain image.
    pub fn acquire_next_image(&mut self) -> Result<Acquire, PresentError> {
        let slot = self.frames.begin_acquire()?;
        let acquired = self
            .swapchain
            .acquire_next_image(&self.slots[slot].acquire, self.config.fence_timeout);

        match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    #[cfg(feature = "logging")]
                    log::warn!("Acquired image {} is suboptimal for the surface", index);
                }
                self.frames.claim_image(index)?;
                Ok(Acquire::Image(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.frames.abandon_acquire()?;
                Ok(Acquire::Rebuild)
            }
            Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => {
                self.frames.abandon_acquire()?;
                Err(SyncError::Timeout(self.config.fence_timeout).into())
            }
            Err(e) => {
                self.frames.abandon_acquire()?;
                Err(e.into())
            }
        }
    }

    ///Drops the frame started by [acquire_next_image](Self::acquire_next_image) without submitting it, for instance
    /// if recording failed or the window was resized in between. The next call acquires with the same slot.
    ///
    /// The slot's acquire semaphore might still have a pending signal, so it is replaced after waiting for the device.
    pub fn abandon_frame(&mut self) -> Result<(), PresentError> {
        self.frames.abandon_acquire()?;

        let slot = self.frames.current();
        self.device.wait_idle()?;
        self.slots[slot].acquire = Semaphore::binary(&self.device)?;

        #[cfg(feature = "logging")]
        log::warn!("Abandoned frame on slot {}", slot);

        Ok(())
    }

    ///Submits the frame's command buffers to `queue`.
    ///
    /// The submission waits on the slot's acquire semaphore before writing color attachments, signals the slot's
    /// render-complete semaphore and the slot's fence. `waits` and `signals` are appended, for instance for a
    /// [cross queue handoff](https://docs.vulkan.org/spec/latest/chapters/synchronization.html#synchronization-queue-transfers).
    pub fn submit(
        &mut self,
        queue: &Queue,
        command_buffers: &[vk::CommandBuffer],
        waits: &[vk::SemaphoreSubmitInfo<'_>],
        signals: &[vk::SemaphoreSubmitInfo<'_>],
    ) -> Result<(), PresentError> {
        let slot = self.frames.current();
        let fence = self.frames.begin_submit()?.inner;

        let mut all_waits = Vec::with_capacity(waits.len() + 1);
        all_waits.push(
            self.slots[slot]
                .acquire
                .submit_info(0, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        );
        all_waits.extend_from_slice(waits);

        let mut all_signals = Vec::with_capacity(signals.len() + 1);
        all_signals.push(
            self.slots[slot]
                .render_complete
                .submit_info(0, vk::PipelineStageFlags2::ALL_COMMANDS),
        );
        all_signals.extend_from_slice(signals);

        queue.submit(
            &self.device.inner,
            command_buffers,
            &all_waits,
            &all_signals,
            fence,
        )?;
        Ok(())
    }

    ///Presents image `index` on `queue` once the current frame's rendering is done, then moves to the next slot.
    pub fn present(&mut self, index: u32, queue: &Queue) -> Result<PresentOutcome, PresentError> {
        if index as usize >= self.swapchain.image_count() {
            return Err(PresentError::InvalidImage(index));
        }

        self.frames.begin_present()?;
        let slot = self.frames.current();
        let presented = self
            .swapchain
            .present(queue.inner, index, &self.slots[slot].render_complete);
        self.frames.finish_present()?;

        match presented {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                #[cfg(feature = "logging")]
                log::warn!("Swapchain is out of date after present");
                Ok(PresentOutcome::Rebuild)
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("Error while presenting image: {}", e);
                Err(e.into())
            }
        }
    }

    ///Recreates the swapchain for `extent`. If `clean_sync` is set, all semaphores and fences are recreated as well,
    /// otherwise only the images are replaced.
    ///
    /// Waits for the device to become idle. Fails with [PresentError::ZeroExtent] while the window is minimized.
    /// A frame that was acquired but not yet submitted is [abandoned](Self::abandon_frame) first.
    pub fn rebuild(&mut self, extent: vk::Extent2D, clean_sync: bool) -> Result<(), PresentError> {
        if extent.width == 0 || extent.height == 0 {
            return Err(PresentError::ZeroExtent(extent));
        }
        if self.frames.phase() == FramePhase::Acquiring {
            self.abandon_frame()?;
        }
        if self.frames.phase() != FramePhase::Idle {
            return Err(PresentError::OutOfOrder {
                expected: FramePhase::Idle,
                found: self.frames.phase(),
            });
        }

        self.device.wait_idle()?;
        self.swapchain.recreate(extent)?;

        if clean_sync {
            let (slots, fences) = Self::create_sync(&self.device, self.config.frames_in_flight)?;
            self.slots = slots;
            self.frames.replace_fences(fences);
        }
        self.frames.reset_images(self.swapchain.image_count());

        #[cfg(feature = "logging")]
        log::info!(
            "Rebuilt presentation ring for {:?} (clean sync: {})",
            self.swapchain.extent,
            clean_sync
        );

        Ok(())
    }
}

impl Drop for PresentationRing {
    fn drop(&mut self) {
        //semaphores and fences might still be in use by the last frames
        if let Err(_e) = self.device.wait_idle() {
            #[cfg(feature = "logging")]
            log::error!("Waiting for idle before dropping presentation ring failed: {}", _e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum FenceState {
        Signaled,
        Unsignaled,
        Pending,
    }

    ///Simulated device, completes submitted fences in submission order.
    #[derive(Default)]
    struct SimDevice {
        fences: Vec<FenceState>,
        queue: VecDeque<usize>,
        waits: usize,
        submitted: usize,
        completed: usize,
    }

    impl SimDevice {
        fn complete_next(&mut self) -> bool {
            match self.queue.pop_front() {
                Some(f) => {
                    self.fences[f] = FenceState::Signaled;
                    self.completed += 1;
                    true
                }
                None => false,
            }
        }

        ///Frames submitted but not yet finished by the device.
        fn in_flight(&self) -> usize {
            self.submitted - self.completed
        }
    }

    struct MockFence {
        id: usize,
        device: Rc<RefCell<SimDevice>>,
    }

    impl MockFence {
        fn submit(&self) {
            let mut dev = self.device.borrow_mut();
            assert_eq!(dev.fences[self.id], FenceState::Unsignaled);
            dev.fences[self.id] = FenceState::Pending;
            dev.queue.push_back(self.id);
            dev.submitted += 1;
        }
    }

    impl FrameFence for MockFence {
        fn wait(&self, timeout: u64) -> Result<(), SyncError> {
            let mut dev = self.device.borrow_mut();
            dev.waits += 1;
            loop {
                match dev.fences[self.id] {
                    FenceState::Signaled => return Ok(()),
                    //nothing submitted, would never signal
                    FenceState::Unsignaled => return Err(SyncError::Timeout(timeout)),
                    FenceState::Pending => {
                        assert!(dev.complete_next());
                    }
                }
            }
        }
        fn reset(&self) -> Result<(), SyncError> {
            let mut dev = self.device.borrow_mut();
            assert_eq!(
                dev.fences[self.id],
                FenceState::Signaled,
                "fence {} reset while its work is still pending",
                self.id
            );
            dev.fences[self.id] = FenceState::Unsignaled;
            Ok(())
        }
        fn is_signaled(&self) -> Result<bool, SyncError> {
            Ok(self.device.borrow().fences[self.id] == FenceState::Signaled)
        }
    }

    fn ring(slots: usize, images: usize) -> (FrameRing<MockFence>, Rc<RefCell<SimDevice>>) {
        let device = Rc::new(RefCell::new(SimDevice {
            fences: vec![FenceState::Signaled; slots],
            ..Default::default()
        }));
        let fences = (0..slots)
            .map(|id| MockFence {
                id,
                device: device.clone(),
            })
            .collect();
        (FrameRing::new(fences, images, 1_000).unwrap(), device)
    }

    ///xorshift, so the simulated presentation engine and device progress are reproducible
    fn next_random(state: &mut u64) -> u64 {
        *state ^= *state << 13;
        *state ^= *state >> 7;
        *state ^= *state << 17;
        *state
    }

    #[test]
    fn thousand_frames_never_exceed_slot_count() {
        const SLOTS: usize = 2;
        const IMAGES: u32 = 3;
        let (mut ring, device) = ring(SLOTS, IMAGES as usize);
        let mut rng = 0x2545_f491_4f6c_dd1d_u64;
        let mut max_in_flight = 0;

        for frame in 0..1000 {
            let slot = ring.begin_acquire().unwrap();
            assert_eq!(slot, frame % SLOTS);
            //the slot's previous work must be done before anything is recorded into it
            assert!(ring.fence(slot).unwrap().is_signaled().unwrap());
            //frame `frame - SLOTS` has finished, so the new frame is at most the SLOTS-th one in flight
            assert!(device.borrow().in_flight() < SLOTS);

            let image = (next_random(&mut rng) % IMAGES as u64) as u32;
            ring.claim_image(image).unwrap();
            assert_eq!(ring.image_owner(image), Some(slot));

            let fence = ring.begin_submit().unwrap();
            fence.submit();
            let in_flight = device.borrow().in_flight();
            assert!(in_flight <= SLOTS);
            max_in_flight = max_in_flight.max(in_flight);

            ring.begin_present().unwrap();
            ring.finish_present().unwrap();

            //the device progresses at a random pace
            for _ in 0..(next_random(&mut rng) % 2) {
                device.borrow_mut().complete_next();
            }
        }
        assert!(device.borrow().waits >= 1000);
        assert_eq!(device.borrow().submitted, 1000);
        //the host actually ran ahead of the device, otherwise the bound above says nothing
        assert_eq!(max_in_flight, SLOTS);
    }

    #[test]
    fn image_of_other_slot_waits_for_its_fence() {
        let (mut ring, device) = ring(2, 2);

        //frame 0 writes image 1 on slot 0
        ring.begin_acquire().unwrap();
        ring.claim_image(1).unwrap();
        ring.begin_submit().unwrap().submit();
        ring.begin_present().unwrap();
        ring.finish_present().unwrap();
        assert_eq!(device.borrow().fences[0], FenceState::Pending);

        //frame 1 gets image 1 again, on slot 1
        assert_eq!(ring.begin_acquire().unwrap(), 1);
        ring.claim_image(1).unwrap();
        assert_eq!(device.borrow().fences[0], FenceState::Signaled);
        assert_eq!(ring.image_owner(1), Some(1));
    }

    #[test]
    fn out_of_order_calls_fail() {
        let (mut ring, _device) = ring(2, 2);
        assert!(matches!(
            ring.begin_submit(),
            Err(PresentError::OutOfOrder {
                expected: FramePhase::Acquiring,
                found: FramePhase::Idle
            })
        ));
        assert!(matches!(
            ring.finish_present(),
            Err(PresentError::OutOfOrder { .. })
        ));

        ring.begin_acquire().unwrap();
        assert!(matches!(
            ring.begin_acquire(),
            Err(PresentError::OutOfOrder {
                expected: FramePhase::Idle,
                found: FramePhase::Acquiring
            })
        ));
        assert!(matches!(
            ring.claim_image(7),
            Err(PresentError::InvalidImage(7))
        ));
    }

    #[test]
    fn abandoned_acquire_keeps_slot() {
        let (mut ring, _device) = ring(2, 3);
        assert_eq!(ring.begin_acquire().unwrap(), 0);
        ring.abandon_acquire().unwrap();
        assert_eq!(ring.phase(), FramePhase::Idle);
        assert_eq!(ring.begin_acquire().unwrap(), 0);
    }

    #[test]
    fn abandoned_frame_after_claim_can_be_reacquired() {
        let (mut ring, device) = ring(2, 3);
        assert_eq!(ring.begin_acquire().unwrap(), 0);
        ring.claim_image(2).unwrap();
        ring.abandon_acquire().unwrap();
        assert_eq!(ring.phase(), FramePhase::Idle);

        //the same slot is used again and nothing was submitted for the dropped frame
        assert_eq!(ring.begin_acquire().unwrap(), 0);
        assert_eq!(ring.phase(), FramePhase::Acquiring);
        assert_eq!(device.borrow().submitted, 0);
        //the claimed image still points at slot 0, whose fence is signaled
        ring.claim_image(2).unwrap();
        assert_eq!(ring.image_owner(2), Some(0));
        ring.begin_submit().unwrap().submit();
        ring.begin_present().unwrap();
        ring.finish_present().unwrap();
        assert_eq!(ring.current(), 1);
    }

    #[test]
    fn ring_without_slots_is_rejected() {
        assert!(matches!(
            FrameRing::<MockFence>::new(Vec::new(), 3, 1_000),
            Err(PresentError::NoFramesInFlight)
        ));
    }

    #[test]
    fn reset_images_forgets_owners() {
        let (mut ring, _device) = ring(2, 3);
        ring.begin_acquire().unwrap();
        ring.claim_image(2).unwrap();
        ring.abandon_acquire().unwrap();
        ring.reset_images(4);
        assert_eq!(ring.image_owner(2), None);
        assert_eq!(ring.image_owner(3), None);
        assert_eq!(ring.image_owner(4), None);
    }

    #[test]
    fn default_config_is_double_buffered() {
        let config = RingConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.fence_timeout, DEFAULT_FENCE_TIMEOUT);
    }
}
