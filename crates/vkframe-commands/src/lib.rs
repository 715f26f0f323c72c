//! # vkframe-commands
//!
//! One shot command submission on top of [vkframe]. The main part is [ScopedCommands]: a command buffer that is
//! allocated from the context's pool, recorded by the caller and submitted exactly once when the scope ends.
//!
//! Resources the recorded commands use can be moved into the scope via [keep_alive](ScopedCommands::keep_alive).
//! They are dropped only after the submission has finished on the device.
//!
//! Built on top of the scope are the staged transfers ([buffer_init], [image_init]) and the [handoff] of a buffer between
//! two queues.

use std::{any::Any, sync::Arc};

use smallvec::SmallVec;
use vkframe::{
    CommandBufferError, MemoryError, SyncError, TransitionError,
    ash::{self, vk},
    context::{Ctx, Device, Queue, QueueRole},
    resources::{BufferMapError, CommandBuffer, CommandBufferAllocator, CommandPool},
    state::StateTracker,
    sync::{DEFAULT_FENCE_TIMEOUT, Fence, Semaphore},
};

pub use vkframe;

pub mod buffer_init;
pub mod handoff;
pub mod image_init;

///Errors of the staged transfer functions.
#[derive(thiserror::Error, Debug)]
pub enum TransferError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
    #[error("Buffer mapping error: {0}")]
    BufferMap(#[from] BufferMapError),
    #[error("CommandBuffer error: {0}")]
    CommandBuffer(#[from] CommandBufferError),
    #[error("State transition error: {0}")]
    Transition(#[from] TransitionError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Data size mismatch, expected {expected} bytes, got {found}")]
    SizeMismatch { expected: u64, found: u64 },
    #[error("Format {format:?} lacks {missing:?} for optimal tiling, can not generate mip levels")]
    MissingFormatFeatures {
        format: vk::Format,
        missing: vk::FormatFeatureFlags,
    },
    #[error("Image usage {found:?} lacks {missing:?}")]
    MissingUsage {
        missing: vk::ImageUsageFlags,
        found: vk::ImageUsageFlags,
    },
}

///Decides how long the end of a [ScopedCommands] blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubmitMode {
    ///Submits with a one shot fence and waits for it with [DEFAULT_FENCE_TIMEOUT].
    Synchronous,
    ///Submits without fence and waits for the whole queue to become idle.
    Asynchronous,
}

struct SemaphoreUse {
    semaphore: Arc<Semaphore>,
    value: u64,
    stage: vk::PipelineStageFlags2,
}

impl SemaphoreUse {
    fn info(&self) -> vk::SemaphoreSubmitInfo<'static> {
        self.semaphore.submit_info(self.value, self.stage)
    }
}

///Short lived command buffer that is submitted exactly once.
///
/// Recording starts at construction with the `ONE_TIME_SUBMIT` hint. Either call [submit](Self::submit) to see
/// submission errors, or let the scope drop, in which case the buffer is submitted as well and failures are logged.
///
/// The scope is meant for a single host thread and must not outlive the [Ctx] it was created from.
pub struct ScopedCommands {
    device: Arc<Device>,
    queue: Queue,
    mode: SubmitMode,
    //Option so the buffer can be leaked if the device never finishes it.
    command_buffer: Option<CommandBuffer<Arc<CommandPool>>>,
    waits: SmallVec<[SemaphoreUse; 2]>,
    signals: SmallVec<[SemaphoreUse; 2]>,
    resources: Vec<Box<dyn Any + Send + 'static>>,
    submitted: bool,
}

impl ScopedCommands {
    ///Allocates a primary command buffer from the pool of `role` and begins recording.
    pub fn new<A: vkframe::allocator::Allocator + Send + Sync + 'static>(
        ctx: &Ctx<A>,
        role: QueueRole,
        mode: SubmitMode,
    ) -> Result<Self, CommandBufferError> {
        let mut command_buffer = ctx
            .pool(role)?
            .clone()
            .allocate_buffer(vk::CommandBufferLevel::PRIMARY)?;
        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        Ok(ScopedCommands {
            device: ctx.device.clone(),
            queue: ctx.queue(role).clone(),
            mode,
            command_buffer: Some(command_buffer),
            waits: SmallVec::new(),
            signals: SmallVec::new(),
            resources: Vec::new(),
            submitted: false,
        })
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.inner
    }

    ///Queue the scope will be submitted to.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    ///Raw handle of the recording command buffer.
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
            .as_ref()
            .map(|cb| cb.inner)
            .unwrap_or(vk::CommandBuffer::null())
    }

    ///Records `cmd` into the scope's command buffer.
    ///
    ///```ignore
    ///scope.record(|device, cb| unsafe { device.cmd_fill_buffer(cb, buffer, 0, vk::WHOLE_SIZE, 0) });
    ///```
    pub fn record(&mut self, cmd: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> &mut Self {
        let cb = self.command_buffer();
        cmd(&self.device.inner, cb);
        self
    }

    ///State tracker that records its barriers into this scope.
    pub fn state_tracker(&self) -> StateTracker<'_> {
        StateTracker::new(&self.device.inner, self.command_buffer())
    }

    ///Keeps `resource` alive until the submitted work has finished on the device.
    pub fn keep_alive(&mut self, resource: impl Any + Send + 'static) -> &mut Self {
        self.resources.push(Box::new(resource));
        self
    }

    ///Lets the submission wait for `semaphore` at `stage`. `value` is ignored for binary semaphores.
    pub fn wait_semaphore(
        &mut self,
        semaphore: &Arc<Semaphore>,
        value: u64,
        stage: vk::PipelineStageFlags2,
    ) -> &mut Self {
        self.waits.push(SemaphoreUse {
            semaphore: semaphore.clone(),
            value,
            stage,
        });
        self
    }

    ///Signals `semaphore` once all commands up to `stage` have finished.
    pub fn signal_semaphore(
        &mut self,
        semaphore: &Arc<Semaphore>,
        value: u64,
        stage: vk::PipelineStageFlags2,
    ) -> &mut Self {
        self.signals.push(SemaphoreUse {
            semaphore: semaphore.clone(),
            value,
            stage,
        });
        self
    }

    ///Ends recording, submits and blocks according to the [SubmitMode].
    pub fn submit(mut self) -> Result<(), CommandBufferError> {
        self.finish()
    }

    ///Ends recording without submitting anything. Kept resources are dropped right away.
    pub fn discard(mut self) {
        self.submitted = true;
        if let Some(mut cb) = self.command_buffer.take() {
            if let Err(_e) = cb.end() {
                #[cfg(feature = "logging")]
                log::error!("Failed to end discarded command buffer: {}", _e);
            }
        }
        self.resources.clear();
    }

    fn finish(&mut self) -> Result<(), CommandBufferError> {
        if self.submitted {
            return Ok(());
        }
        self.submitted = true;

        let Some(mut cb) = self.command_buffer.take() else {
            return Ok(());
        };
        cb.end()?;

        let waits = self.waits.iter().map(|w| w.info()).collect::<SmallVec<[_; 2]>>();
        let signals = self
            .signals
            .iter()
            .map(|s| s.info())
            .collect::<SmallVec<[_; 2]>>();

        let fence = match self.mode {
            SubmitMode::Synchronous => Some(Fence::new(&self.device, false)?),
            SubmitMode::Asynchronous => None,
        };

        self.queue.submit(
            &self.device.inner,
            &[cb.inner],
            &waits,
            &signals,
            fence.as_ref().map(|f| f.inner).unwrap_or(vk::Fence::null()),
        )?;

        let result = match &fence {
            Some(fence) => fence.wait(DEFAULT_FENCE_TIMEOUT).map_err(CommandBufferError::from),
            None => self
                .queue
                .wait_idle(&self.device.inner)
                .map_err(CommandBufferError::from),
        };

        if let Err(e) = result {
            //Work is submitted but not known to be done. Everything it references must outlive it.
            #[cfg(feature = "logging")]
            log::error!(
                "Scoped commands on family {} did not finish, leaking command buffer: {}",
                self.queue.family_index,
                e
            );
            std::mem::forget(fence);
            std::mem::forget(cb);
            std::mem::forget(std::mem::take(&mut self.resources));
            return Err(e);
        }

        drop(fence);
        drop(cb);
        self.resources.clear();
        self.waits.clear();
        self.signals.clear();
        Ok(())
    }
}

impl Drop for ScopedCommands {
    fn drop(&mut self) {
        if self.submitted {
            return;
        }
        //Never submit half recorded work while unwinding.
        if std::thread::panicking() {
            self.submitted = true;
            if let Some(mut cb) = self.command_buffer.take() {
                let _ = cb.end();
            }
            return;
        }
        if let Err(_e) = self.finish() {
            #[cfg(feature = "logging")]
            log::error!("Failed to submit scoped commands on drop: {}", _e);
        }
    }
}

///Opens a [ScopedCommands] on `role`, lets `record` fill it and submits it.
///
/// If `record` fails, nothing is submitted and its error is returned.
pub fn with_scoped_commands<A, R, E>(
    ctx: &Ctx<A>,
    role: QueueRole,
    mode: SubmitMode,
    record: impl FnOnce(&mut ScopedCommands) -> Result<R, E>,
) -> Result<R, E>
where
    A: vkframe::allocator::Allocator + Send + Sync + 'static,
    E: From<CommandBufferError>,
{
    let mut scope = ScopedCommands::new(ctx, role, mode)?;
    match record(&mut scope) {
        Ok(r) => {
            scope.submit()?;
            Ok(r)
        }
        Err(e) => {
            scope.discard();
            Err(e)
        }
    }
}
