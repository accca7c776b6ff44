//! Per-frame orchestration.
//!
//! [`FrameOrchestrator`] owns the swapchain, render pass, command buffers and
//! frame slots, and runs the begin/end frame protocol on top of a [`Driver`].
//! Resize notifications only bump a generation counter; the swapchain is
//! rebuilt at the start of the next `begin_frame`.

use crate::command::CommandBufferPool;
use crate::config::RendererConfig;
use crate::driver::{AcquireOutcome, Driver, FrameSubmission};
use crate::error::Result;
use crate::render_pass::{ClearValues, RenderPass};
use crate::swapchain::{Swapchain, SwapchainManager};
use crate::sync::FrameSynchronizer;
use ash::vk;

/// Mutable per-frame bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameContext {
    /// Image acquired by the last successful `begin_frame`.
    pub image_index: u32,
    /// Bumped on every resize notification.
    pub size_generation: u64,
    /// Value of `size_generation` the swapchain was last built for.
    pub size_last_generation: u64,
    /// Set when acquire or present reported the swapchain stale.
    pub recreate_requested: bool,
    /// Between a successful `begin_frame` and its `end_frame`.
    pub frame_in_progress: bool,
    /// Target size of the swapchain. Never reset to zero by recreation.
    pub width: u32,
    pub height: u32,
}

impl FrameContext {
    /// Whether the swapchain must be rebuilt before the next frame.
    pub const fn needs_recreate(&self) -> bool {
        self.recreate_requested || self.size_generation != self.size_last_generation
    }
}

/// The begin/end frame contract consumed by the renderer frontend.
pub struct FrameOrchestrator<D: Driver> {
    driver: D,
    swapchain: SwapchainManager,
    render_pass: RenderPass,
    commands: CommandBufferPool,
    sync: FrameSynchronizer,
    frame: FrameContext,
    fence_timeout_ns: u64,
    shut_down: bool,
}

impl<D: Driver> FrameOrchestrator<D> {
    /// Build the swapchain and everything sized to it for a `width` x `height` window.
    pub fn new(driver: D, config: &RendererConfig, width: u32, height: u32) -> Result<Self> {
        let mut swapchain = SwapchainManager::new(&driver, width, height)?;
        let image_count = swapchain.swapchain().image_count();

        let requested = config.max_frames_in_flight as usize;
        let frames_in_flight = requested.clamp(1, image_count.max(1));
        if frames_in_flight != requested {
            tracing::warn!(
                "max_frames_in_flight {requested} clamped to {frames_in_flight} \
                 for {image_count} swapchain images"
            );
        }

        let extent = swapchain.swapchain().extent();
        let mut render_pass = RenderPass::new(
            &driver,
            swapchain.swapchain().surface_format().format,
            swapchain.swapchain().depth_format(),
            vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            },
            ClearValues {
                color: config.clear_color,
                depth: config.clear_depth,
                stencil: config.clear_stencil,
            },
        )?;

        let mut commands = CommandBufferPool::new();
        let built = swapchain
            .swapchain_mut()
            .build_framebuffers(&driver, &render_pass)
            .and_then(|()| commands.recreate(&driver, image_count))
            .and_then(|()| FrameSynchronizer::new(&driver, frames_in_flight, image_count));

        let sync = match built {
            Ok(sync) => sync,
            Err(e) => {
                commands.free_all(&driver);
                render_pass.destroy(&driver);
                swapchain.destroy(&driver);
                return Err(e);
            }
        };

        tracing::info!(
            "Frame orchestrator ready: {image_count} images, {frames_in_flight} frames in flight"
        );

        Ok(Self {
            driver,
            swapchain,
            render_pass,
            commands,
            sync,
            frame: FrameContext {
                width,
                height,
                ..FrameContext::default()
            },
            fence_timeout_ns: config.fence_timeout_ns(),
            shut_down: false,
        })
    }

    /// Prepare the next frame for recording.
    ///
    /// Returns `Ok(false)` when no frame can be recorded this tick (swapchain
    /// being rebuilt, window minimized, image acquisition reported the
    /// swapchain out of date). The caller just tries again next tick.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn begin_frame(&mut self, delta_time: f32) -> Result<bool> {
        assert!(
            !self.frame.frame_in_progress,
            "begin_frame called while a frame is already in progress"
        );
        assert!(!self.shut_down, "begin_frame called after shutdown");
        tracing::trace!("begin_frame dt={delta_time}");

        if self.swapchain.is_recreating() {
            tracing::debug!("Swapchain is being recreated, skipping frame.");
            return Ok(false);
        }

        if self.frame.needs_recreate() && !self.recreate_swapchain()? {
            tracing::debug!("Swapchain recreation deferred, booting.");
            return Ok(false);
        }

        let slot = *self.sync.current();
        self.driver.wait_for_fence(slot.in_flight, self.fence_timeout_ns)?;

        let image_index = match self.driver.acquire_next_image(
            self.swapchain.swapchain().handle(),
            slot.image_available,
            self.fence_timeout_ns,
        )? {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => {
                if suboptimal {
                    self.frame.recreate_requested = true;
                }
                image_index
            }
            AcquireOutcome::OutOfDate => {
                tracing::debug!("Swapchain out of date on acquire, recreating next frame.");
                self.frame.recreate_requested = true;
                return Ok(false);
            }
        };
        self.frame.image_index = image_index;

        let extent = self.swapchain.swapchain().extent();
        let command_buffer = self.commands.get_mut(image_index);
        command_buffer.reset(&self.driver)?;
        command_buffer.begin(&self.driver, false, false, false)?;

        // Flip y so +Y is up in clip space.
        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        self.driver
            .cmd_set_viewport_scissor(command_buffer.handle(), viewport, scissor);

        self.render_pass.begin(
            &self.driver,
            command_buffer,
            self.swapchain.swapchain().framebuffer(image_index),
        );

        self.frame.frame_in_progress = true;
        Ok(true)
    }

    /// Submit and present the frame started by the last successful `begin_frame`.
    #[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
    pub fn end_frame(&mut self, delta_time: f32) -> Result<()> {
        assert!(
            self.frame.frame_in_progress,
            "end_frame called without a successful begin_frame"
        );
        self.frame.frame_in_progress = false;
        tracing::trace!("end_frame dt={delta_time}");

        let image_index = self.frame.image_index;
        let command_buffer = self.commands.get_mut(image_index);
        self.render_pass.end(&self.driver, command_buffer);
        command_buffer.end(&self.driver)?;

        // An earlier frame may still be using this image. When it was our own
        // slot, its fence is already signaled and the wait returns at once.
        if let Some(owner) = self.sync.image_owner(image_index) {
            self.driver
                .wait_for_fence(self.sync.slot(owner).in_flight, self.fence_timeout_ns)?;
        }
        self.sync.assign_image(image_index);

        let slot = *self.sync.current();
        self.driver.reset_fence(slot.in_flight)?;

        self.driver.submit(&FrameSubmission {
            command_buffer: command_buffer.handle(),
            wait_semaphore: slot.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.queue_complete,
            fence: slot.in_flight,
        })?;
        command_buffer.mark_submitted();

        let outcome = self
            .driver
            .present(self.swapchain.swapchain().handle(), slot.queue_complete, image_index)?;
        if outcome.needs_recreate() {
            tracing::debug!("Present reported {outcome:?}, recreating next frame.");
            self.frame.recreate_requested = true;
        }

        self.sync.advance();
        Ok(())
    }

    /// Record a new target size. No GPU work happens until the next `begin_frame`.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        self.frame.width = width;
        self.frame.height = height;
        self.frame.size_generation += 1;
        tracing::trace!(
            "Resized to {width}x{height}, generation {}",
            self.frame.size_generation
        );
    }

    /// Rebuild the swapchain and everything sized to it.
    ///
    /// Returns `Ok(false)` without doing anything when the target size has a
    /// zero dimension. Fails with
    /// [`GpuError::RecreationInProgress`](crate::GpuError::RecreationInProgress)
    /// if a recreation is already running.
    pub fn recreate_swapchain(&mut self) -> Result<bool> {
        self.swapchain.begin_recreate()?;

        if self.frame.width == 0 || self.frame.height == 0 {
            tracing::debug!(
                "recreate_swapchain called when window is < 1 in a dimension. Booting."
            );
            self.swapchain.finish_recreate();
            return Ok(false);
        }

        let result = self.rebuild();
        // Cleared last, on success and failure alike.
        self.swapchain.finish_recreate();
        result.map(|()| true)
    }

    fn rebuild(&mut self) -> Result<()> {
        self.driver.wait_idle()?;
        self.sync.reset_images(0);

        self.swapchain
            .rebuild(&self.driver, self.frame.width, self.frame.height)?;
        let image_count = self.swapchain.swapchain().image_count();
        let extent = self.swapchain.swapchain().extent();

        self.sync.reset_images(image_count);
        if self.sync.frames_in_flight() < self.sync.allocated_slots() {
            tracing::warn!(
                "Swapchain now has {image_count} images, cycling {} of {} frame slots",
                self.sync.frames_in_flight(),
                self.sync.allocated_slots()
            );
        }

        self.render_pass.set_extent(extent);
        self.swapchain
            .swapchain_mut()
            .build_framebuffers(&self.driver, &self.render_pass)?;
        self.commands.recreate(&self.driver, image_count)?;

        self.frame.size_last_generation = self.frame.size_generation;
        self.frame.recreate_requested = false;
        tracing::info!("Swapchain recreated at {}x{}.", extent.width, extent.height);
        Ok(())
    }

    /// Wait for the device and destroy everything this orchestrator created.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Err(e) = self.driver.wait_idle() {
            tracing::error!("wait_idle failed during shutdown: {e}");
        }

        self.sync.destroy(&self.driver);
        self.commands.free_all(&self.driver);
        self.swapchain.swapchain_mut().destroy_framebuffers(&self.driver);
        self.render_pass.destroy(&self.driver);
        self.swapchain.destroy(&self.driver);
        tracing::info!("Frame orchestrator shut down.");
    }

    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Index of the frame slot the next frame will use.
    pub const fn current_frame(&self) -> usize {
        self.sync.current_frame()
    }

    pub const fn frame_context(&self) -> &FrameContext {
        &self.frame
    }

    pub const fn synchronizer(&self) -> &FrameSynchronizer {
        &self.sync
    }

    pub const fn swapchain(&self) -> &Swapchain {
        self.swapchain.swapchain()
    }

    pub const fn swapchain_manager(&self) -> &SwapchainManager {
        &self.swapchain
    }

    pub fn swapchain_manager_mut(&mut self) -> &mut SwapchainManager {
        &mut self.swapchain
    }

    pub const fn command_buffers(&self) -> &CommandBufferPool {
        &self.commands
    }

    pub const fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    pub fn is_recreating(&self) -> bool {
        self.swapchain.is_recreating()
    }

    /// Current target size.
    pub const fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }
}

impl<D: Driver> Drop for FrameOrchestrator<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
