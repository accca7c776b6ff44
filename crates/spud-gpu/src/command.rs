//! Command buffer management.
//!
//! Every command buffer carries an explicit recording state. Driver calls are
//! only issued after the state machine accepts the operation; an illegal
//! transition is a bug at the call site and panics.

use crate::driver::Driver;
use crate::error::Result;
use ash::vk;

/// Recording state of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandBufferState {
    NotAllocated,
    Ready,
    Recording,
    InRenderPass,
    RecordingEnded,
    Submitted,
}

impl CommandBufferState {
    pub const ALL: [Self; 6] = [
        Self::NotAllocated,
        Self::Ready,
        Self::Recording,
        Self::InRenderPass,
        Self::RecordingEnded,
        Self::Submitted,
    ];
}

/// Operation applied to a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandOp {
    Allocate,
    Begin,
    BeginRenderPass,
    EndRenderPass,
    End,
    MarkSubmitted,
    Reset,
    Free,
}

impl CommandOp {
    pub const ALL: [Self; 8] = [
        Self::Allocate,
        Self::Begin,
        Self::BeginRenderPass,
        Self::EndRenderPass,
        Self::End,
        Self::MarkSubmitted,
        Self::Reset,
        Self::Free,
    ];
}

/// State after applying `op` in `state`, or `None` if the transition is illegal.
pub const fn transition(state: CommandBufferState, op: CommandOp) -> Option<CommandBufferState> {
    use CommandBufferState as S;
    match (state, op) {
        (S::NotAllocated, CommandOp::Allocate) => Some(S::Ready),
        (S::Ready, CommandOp::Begin) => Some(S::Recording),
        (S::Recording, CommandOp::BeginRenderPass) => Some(S::InRenderPass),
        (S::InRenderPass, CommandOp::EndRenderPass) => Some(S::Recording),
        (S::Recording, CommandOp::End) => Some(S::RecordingEnded),
        (S::RecordingEnded, CommandOp::MarkSubmitted) => Some(S::Submitted),
        (_, CommandOp::Reset) => Some(S::Ready),
        (S::NotAllocated, CommandOp::Free) => None,
        (_, CommandOp::Free) => Some(S::NotAllocated),
        _ => None,
    }
}

/// A primary or secondary command buffer from the graphics command pool.
#[derive(Debug)]
pub struct CommandBuffer {
    handle: vk::CommandBuffer,
    state: CommandBufferState,
}

impl CommandBuffer {
    /// Allocate a command buffer from the driver's command pool.
    pub fn allocate(driver: &impl Driver, primary: bool) -> Result<Self> {
        let mut buffer = Self {
            handle: vk::CommandBuffer::null(),
            state: CommandBufferState::NotAllocated,
        };
        buffer.apply(CommandOp::Allocate);

        let level = if primary {
            vk::CommandBufferLevel::PRIMARY
        } else {
            vk::CommandBufferLevel::SECONDARY
        };
        buffer.handle = driver.allocate_command_buffer(level)?;
        Ok(buffer)
    }

    /// Get the raw command buffer handle.
    pub const fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub const fn state(&self) -> CommandBufferState {
        self.state
    }

    /// Advance the state machine, panicking on an illegal transition.
    pub fn apply(&mut self, op: CommandOp) {
        let Some(next) = transition(self.state, op) else {
            panic!("illegal command buffer transition: {op:?} from {:?}", self.state);
        };
        self.state = next;
    }

    /// Begin recording.
    pub fn begin(
        &mut self,
        driver: &impl Driver,
        single_use: bool,
        render_pass_continue: bool,
        simultaneous_use: bool,
    ) -> Result<()> {
        self.apply(CommandOp::Begin);

        let mut flags = vk::CommandBufferUsageFlags::empty();
        if single_use {
            flags |= vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT;
        }
        if render_pass_continue {
            flags |= vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE;
        }
        if simultaneous_use {
            flags |= vk::CommandBufferUsageFlags::SIMULTANEOUS_USE;
        }
        driver.begin_command_buffer(self.handle, flags)
    }

    /// End recording.
    pub fn end(&mut self, driver: &impl Driver) -> Result<()> {
        self.apply(CommandOp::End);
        driver.end_command_buffer(self.handle)
    }

    /// Note that the recorded commands were handed to a queue.
    pub fn mark_submitted(&mut self) {
        self.apply(CommandOp::MarkSubmitted);
    }

    /// Return the buffer to the ready state.
    pub fn reset(&mut self, driver: &impl Driver) -> Result<()> {
        let allocated = self.state != CommandBufferState::NotAllocated;
        self.apply(CommandOp::Reset);
        if allocated {
            driver.reset_command_buffer(self.handle)?;
        }
        Ok(())
    }

    /// Free the buffer back to the pool.
    pub fn free(&mut self, driver: &impl Driver) {
        self.apply(CommandOp::Free);
        driver.free_command_buffer(self.handle);
        self.handle = vk::CommandBuffer::null();
    }
}

/// One primary command buffer per swapchain image.
#[derive(Debug, Default)]
pub struct CommandBufferPool {
    buffers: Vec<CommandBuffer>,
}

impl CommandBufferPool {
    pub const fn new() -> Self {
        Self { buffers: Vec::new() }
    }

    /// Free any existing buffers and allocate `count` fresh primary buffers.
    pub fn recreate(&mut self, driver: &impl Driver, count: usize) -> Result<()> {
        self.free_all(driver);

        self.buffers.reserve(count);
        for _ in 0..count {
            self.buffers.push(CommandBuffer::allocate(driver, true)?);
        }

        tracing::debug!("{count} graphics command buffers created.");
        Ok(())
    }

    /// Free every allocated buffer.
    pub fn free_all(&mut self, driver: &impl Driver) {
        for mut buffer in self.buffers.drain(..) {
            if buffer.state != CommandBufferState::NotAllocated {
                buffer.free(driver);
            }
        }
    }

    /// Number of buffers, equal to the swapchain image count.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn get(&self, image_index: u32) -> &CommandBuffer {
        let index = image_index as usize;
        assert!(
            index < self.buffers.len(),
            "image index {index} out of range for {} command buffers",
            self.buffers.len()
        );
        &self.buffers[index]
    }

    pub fn get_mut(&mut self, image_index: u32) -> &mut CommandBuffer {
        let index = image_index as usize;
        assert!(
            index < self.buffers.len(),
            "image index {index} out of range for {} command buffers",
            self.buffers.len()
        );
        &mut self.buffers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandBuffer> {
        self.buffers.iter()
    }
}
