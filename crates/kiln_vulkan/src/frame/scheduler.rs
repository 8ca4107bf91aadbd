use ash::vk;

use super::{
    AcquireOutcome, CommandRecorder, FenceStatus, FenceTimeout, FrameBackend, FrameError,
    FrameStatus, FrameTarget, PresentOutcome, Presenter, Submission,
};
use crate::{
    constants::MAX_FRAMES_IN_FLIGHT,
    sync::{SemaphoreRole, SyncError},
};

/// Resources owned by one frame in flight
struct FrameSlot<B: FrameBackend> {
    command_buffer: B::CommandBuffer,
    image_available: B::Semaphore,
    render_finished: B::Semaphore,
    in_flight: B::Fence,
}

impl<B: FrameBackend> FrameSlot<B> {
    fn new(backend: &mut B, slot: usize) -> Result<FrameSlot<B>, SyncError> {
        let command_buffer = backend
            .allocate_command_buffer()
            .map_err(|source| SyncError::AllocateCommandBuffer { slot, source })?;
        let image_available =
            backend
                .create_semaphore()
                .map_err(|source| SyncError::CreateSemaphore {
                    slot,
                    role: SemaphoreRole::ImageAvailable,
                    source,
                })?;
        let render_finished =
            backend
                .create_semaphore()
                .map_err(|source| SyncError::CreateSemaphore {
                    slot,
                    role: SemaphoreRole::RenderFinished,
                    source,
                })?;
        // Signaled so the first wait on a fresh slot returns straight away
        let in_flight = backend
            .create_fence(true)
            .map_err(|source| SyncError::CreateFence { slot, source })?;

        Ok(FrameSlot {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }
}

/// Configures a [`FrameScheduler`] before its frame slots are created
pub struct FrameSchedulerBuilder {
    frames_in_flight: usize,
    throttle_timeout: FenceTimeout,
}

impl FrameSchedulerBuilder {
    pub fn new() -> FrameSchedulerBuilder {
        FrameSchedulerBuilder {
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            throttle_timeout: FenceTimeout::default(),
        }
    }

    /// Number of frames the CPU may get ahead of the GPU
    pub fn frames_in_flight(mut self, frames_in_flight: usize) -> FrameSchedulerBuilder {
        self.frames_in_flight = frames_in_flight;
        self
    }

    /// How long [`FrameScheduler::draw_frame`] blocks on a busy slot before giving up
    pub fn throttle_timeout(mut self, timeout: FenceTimeout) -> FrameSchedulerBuilder {
        self.throttle_timeout = timeout;
        self
    }

    /// Creates every frame slot up front, the first failure aborts the build
    pub fn build<B: FrameBackend>(self, mut backend: B) -> Result<FrameScheduler<B>, FrameError> {
        if self.frames_in_flight == 0 {
            return Err(FrameError::NoFramesInFlight);
        }

        let mut slots = Vec::with_capacity(self.frames_in_flight);
        for slot in 0..self.frames_in_flight {
            slots.push(FrameSlot::new(&mut backend, slot)?);
        }
        log::debug!(
            "Created {} frame slots, throttle timeout {}",
            self.frames_in_flight,
            self.throttle_timeout
        );

        Ok(FrameScheduler {
            slots,
            current_slot: 0,
            frames_in_flight: self.frames_in_flight,
            throttle_timeout: self.throttle_timeout,
            backend,
        })
    }
}

impl Default for FrameSchedulerBuilder {
    fn default() -> FrameSchedulerBuilder {
        FrameSchedulerBuilder::new()
    }
}

/// Drives the render loop over a fixed ring of frame slots.
///
/// The slot index advances by one every presented frame, independently of which swapchain
/// image the presenter hands out.
pub struct FrameScheduler<B: FrameBackend> {
    // Declared before `backend` so slots are released before the backend is dropped
    slots: Vec<FrameSlot<B>>,
    current_slot: usize,
    frames_in_flight: usize,
    throttle_timeout: FenceTimeout,
    backend: B,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    pub fn throttle_timeout(&self) -> FenceTimeout {
        self.throttle_timeout
    }

    pub fn is_shut_down(&self) -> bool {
        self.slots.is_empty()
    }

    /// Runs one render cycle.
    ///
    /// Waits until the current slot is free, acquires an image, records and submits the
    /// slot's command buffer, presents and moves on to the next slot. A stale swapchain is
    /// reported as [`FrameStatus::NeedsRebuild`], rebuilding it is up to the caller.
    pub fn draw_frame<P, R>(
        &mut self,
        presenter: &mut P,
        recorder: &mut R,
    ) -> Result<FrameStatus, FrameError>
    where
        P: Presenter<B::Semaphore>,
        R: CommandRecorder<B::CommandBuffer>,
    {
        let slot_index = self.current_slot;
        let slot = self.slots.get_mut(slot_index).ok_or(FrameError::ShutDown)?;

        let status = self
            .backend
            .wait_for_fence(&slot.in_flight, self.throttle_timeout)
            .map_err(FrameError::Wait)?;
        if status == FenceStatus::TimedOut {
            log::warn!(
                "Frame slot {} still busy after {}",
                slot_index,
                self.throttle_timeout
            );
            return Err(FrameError::ThrottleTimeout {
                slot: slot_index,
                timeout: self.throttle_timeout,
            });
        }

        let (image_index, acquired_suboptimal) =
            match presenter.acquire_next_image(FenceTimeout::Infinite, &slot.image_available)? {
                AcquireOutcome::Ready {
                    image_index,
                    suboptimal,
                } => (image_index, suboptimal),
                AcquireOutcome::OutOfDate => {
                    log::warn!("Swapchain out of date while acquiring, skipping frame");
                    return Ok(FrameStatus::NeedsRebuild);
                }
            };

        self.backend
            .reset_command_buffer(&mut slot.command_buffer)
            .map_err(FrameError::ResetCommandBuffer)?;
        let target = FrameTarget {
            slot: slot_index,
            image_index,
        };
        recorder.record(&mut slot.command_buffer, target)?;

        // Reset right before the submit that signals it again, a reset fence left
        // unsubmitted by an early return would never signal
        self.backend
            .reset_fence(&slot.in_flight)
            .map_err(FrameError::ResetFence)?;
        self.backend
            .submit(Submission {
                command_buffer: &slot.command_buffer,
                wait_semaphore: &slot.image_available,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_semaphore: &slot.render_finished,
                fence: &slot.in_flight,
            })
            .map_err(FrameError::Submit)?;

        let presented = presenter.present(image_index, &slot.render_finished)?;

        self.current_slot = (self.current_slot + 1) % self.frames_in_flight;

        match presented {
            PresentOutcome::Presented if !acquired_suboptimal => Ok(FrameStatus::Presented {
                slot: slot_index,
                image_index,
            }),
            PresentOutcome::OutOfDate => {
                log::warn!("Swapchain out of date while presenting");
                Ok(FrameStatus::NeedsRebuild)
            }
            _ => {
                log::debug!("Swapchain is suboptimal for the surface");
                Ok(FrameStatus::NeedsRebuild)
            }
        }
    }

    /// Waits for the device to go idle, then releases every frame slot.
    ///
    /// Calling it again after it succeeded does nothing.
    pub fn shutdown(&mut self) -> Result<(), FrameError> {
        if self.slots.is_empty() {
            return Ok(());
        }

        self.backend.wait_idle().map_err(FrameError::Idle)?;
        self.slots.clear();
        log::debug!("Frame scheduler shut down");

        Ok(())
    }
}

impl<B: FrameBackend> Drop for FrameScheduler<B> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("Frame scheduler dropped without a clean shutdown: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{frame::SlotResources, VulkanError};
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet, VecDeque},
        rc::Rc,
        time::Duration,
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        WaitFence { fence: u32, timeout: FenceTimeout },
        ResetFence(u32),
        ResetBuffer(u32),
        Acquire { semaphore: u32, timeout: FenceTimeout },
        Record { buffer: u32, slot: usize, image_index: u32 },
        BindUniform { uniform: u32, buffer: u32 },
        Submit { buffer: u32, wait: u32, signal: u32, fence: u32, stage: vk::PipelineStageFlags },
        Present { image_index: u32, wait: u32 },
        WaitIdle,
        Destroy(u32),
    }

    /// Pretend GPU that records calls and flags hazards
    #[derive(Default)]
    struct Gpu {
        calls: Vec<Call>,
        next_id: u32,
        signaled: HashSet<u32>,
        /// Fences of submitted batches that haven't been retired yet
        pending: HashSet<u32>,
        /// Buffers and semaphores mapped to the fence of the batch that last used them
        used_by: HashMap<u32, u32>,
        /// Uniform buffers mapped to the command buffer that last read them
        read_by: HashMap<u32, u32>,
        hung: HashSet<u32>,
        semaphores_created: usize,
        fail_semaphore_at: Option<usize>,
        fail_submit: bool,
        violations: Vec<String>,
    }

    impl Gpu {
        fn in_use(&self, id: u32) -> bool {
            self.pending.contains(&id)
                || self
                    .used_by
                    .get(&id)
                    .map_or(false, |fence| self.pending.contains(fence))
        }

        fn read_in_flight(&self, uniform: u32) -> bool {
            self.read_by
                .get(&uniform)
                .map_or(false, |&buffer| self.in_use(buffer))
        }

        fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|&call| matches(call)).count()
        }
    }

    type SharedGpu = Rc<RefCell<Gpu>>;

    struct Handle {
        id: u32,
        gpu: SharedGpu,
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.in_use(self.id) {
                let message = format!("object {} destroyed while the GPU uses it", self.id);
                gpu.violations.push(message);
            }
            gpu.calls.push(Call::Destroy(self.id));
        }
    }

    struct MockBackend {
        gpu: SharedGpu,
    }

    impl MockBackend {
        fn handle(&self) -> Handle {
            let mut gpu = self.gpu.borrow_mut();
            gpu.next_id += 1;
            Handle {
                id: gpu.next_id,
                gpu: self.gpu.clone(),
            }
        }
    }

    impl FrameBackend for MockBackend {
        type CommandBuffer = Handle;
        type Semaphore = Handle;
        type Fence = Handle;

        fn create_semaphore(&self) -> Result<Handle, VulkanError> {
            let attempt = {
                let mut gpu = self.gpu.borrow_mut();
                gpu.semaphores_created += 1;
                gpu.semaphores_created
            };
            if self.gpu.borrow().fail_semaphore_at == Some(attempt) {
                return Err(VulkanError::OutOfDeviceMemory);
            }
            Ok(self.handle())
        }

        fn create_fence(&self, signaled: bool) -> Result<Handle, VulkanError> {
            let fence = self.handle();
            if signaled {
                self.gpu.borrow_mut().signaled.insert(fence.id);
            }
            Ok(fence)
        }

        fn allocate_command_buffer(&mut self) -> Result<Handle, VulkanError> {
            Ok(self.handle())
        }

        fn wait_for_fence(
            &self,
            fence: &Handle,
            timeout: FenceTimeout,
        ) -> Result<FenceStatus, VulkanError> {
            let mut gpu = self.gpu.borrow_mut();
            gpu.calls.push(Call::WaitFence {
                fence: fence.id,
                timeout,
            });
            if gpu.hung.contains(&fence.id) {
                return Ok(FenceStatus::TimedOut);
            }
            if gpu.pending.remove(&fence.id) {
                gpu.signaled.insert(fence.id);
            }
            if !gpu.signaled.contains(&fence.id) {
                let message = format!("waited on fence {} that will never signal", fence.id);
                gpu.violations.push(message);
                return Ok(FenceStatus::TimedOut);
            }
            Ok(FenceStatus::Signaled)
        }

        fn reset_fence(&self, fence: &Handle) -> Result<(), VulkanError> {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.in_use(fence.id) {
                let message = format!("fence {} reset while pending", fence.id);
                gpu.violations.push(message);
            }
            gpu.signaled.remove(&fence.id);
            gpu.calls.push(Call::ResetFence(fence.id));
            Ok(())
        }

        fn reset_command_buffer(&self, buffer: &mut Handle) -> Result<(), VulkanError> {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.in_use(buffer.id) {
                let message = format!("command buffer {} reset while pending", buffer.id);
                gpu.violations.push(message);
            }
            gpu.calls.push(Call::ResetBuffer(buffer.id));
            Ok(())
        }

        fn submit(&self, submission: Submission<'_, Self>) -> Result<(), VulkanError> {
            let mut gpu = self.gpu.borrow_mut();
            if gpu.fail_submit {
                return Err(VulkanError::DeviceLost);
            }
            let fence = submission.fence.id;
            if gpu.signaled.contains(&fence) || gpu.pending.contains(&fence) {
                let message = format!("submitted with fence {} that wasn't reset", fence);
                gpu.violations.push(message);
            }
            gpu.pending.insert(fence);
            for id in [
                submission.command_buffer.id,
                submission.wait_semaphore.id,
                submission.signal_semaphore.id,
            ] {
                gpu.used_by.insert(id, fence);
            }
            gpu.calls.push(Call::Submit {
                buffer: submission.command_buffer.id,
                wait: submission.wait_semaphore.id,
                signal: submission.signal_semaphore.id,
                fence,
                stage: submission.wait_stage,
            });
            Ok(())
        }

        fn wait_idle(&self) -> Result<(), VulkanError> {
            let mut gpu = self.gpu.borrow_mut();
            let retired: Vec<u32> = gpu.pending.drain().collect();
            gpu.signaled.extend(retired);
            gpu.calls.push(Call::WaitIdle);
            Ok(())
        }
    }

    /// Swapchain stand-in handing out images in a fixed order
    struct MockPresenter {
        gpu: SharedGpu,
        images: Vec<u32>,
        next: usize,
        acquire_overrides: VecDeque<AcquireOutcome>,
        present_overrides: VecDeque<PresentOutcome>,
    }

    impl MockPresenter {
        fn new(gpu: &SharedGpu, images: &[u32]) -> MockPresenter {
            MockPresenter {
                gpu: gpu.clone(),
                images: images.to_vec(),
                next: 0,
                acquire_overrides: VecDeque::new(),
                present_overrides: VecDeque::new(),
            }
        }
    }

    impl Presenter<Handle> for MockPresenter {
        fn acquire_next_image(
            &mut self,
            timeout: FenceTimeout,
            signal: &Handle,
        ) -> Result<AcquireOutcome, FrameError> {
            self.gpu.borrow_mut().calls.push(Call::Acquire {
                semaphore: signal.id,
                timeout,
            });
            if let Some(outcome) = self.acquire_overrides.pop_front() {
                return Ok(outcome);
            }
            let image_index = self.images[self.next % self.images.len()];
            self.next += 1;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn present(&mut self, image_index: u32, wait: &Handle) -> Result<PresentOutcome, FrameError> {
            self.gpu.borrow_mut().calls.push(Call::Present {
                image_index,
                wait: wait.id,
            });
            Ok(self
                .present_overrides
                .pop_front()
                .unwrap_or(PresentOutcome::Presented))
        }
    }

    struct MockRecorder {
        gpu: SharedGpu,
        fail_next: bool,
    }

    impl MockRecorder {
        fn new(gpu: &SharedGpu) -> MockRecorder {
            MockRecorder {
                gpu: gpu.clone(),
                fail_next: false,
            }
        }
    }

    impl CommandRecorder<Handle> for MockRecorder {
        fn record(&mut self, buffer: &mut Handle, target: FrameTarget) -> Result<(), FrameError> {
            if std::mem::take(&mut self.fail_next) {
                return Err(FrameError::UnknownImage(target.image_index));
            }
            let mut gpu = self.gpu.borrow_mut();
            if gpu.in_use(buffer.id) {
                let message = format!("command buffer {} recorded while pending", buffer.id);
                gpu.violations.push(message);
            }
            gpu.calls.push(Call::Record {
                buffer: buffer.id,
                slot: target.slot,
                image_index: target.image_index,
            });
            Ok(())
        }
    }

    /// Writes a per-frame uniform buffer and binds it, the way a mesh recorder does
    struct UniformRecorder {
        gpu: SharedGpu,
        uniforms: SlotResources<Handle>,
    }

    impl UniformRecorder {
        fn new(gpu: &SharedGpu, frames_in_flight: usize) -> UniformRecorder {
            let backend = MockBackend { gpu: gpu.clone() };
            let uniforms = SlotResources::build(frames_in_flight, |_| {
                Ok::<Handle, VulkanError>(backend.handle())
            })
            .expect("mock handles are infallible");

            UniformRecorder {
                gpu: gpu.clone(),
                uniforms,
            }
        }
    }

    impl CommandRecorder<Handle> for UniformRecorder {
        fn record(&mut self, buffer: &mut Handle, target: FrameTarget) -> Result<(), FrameError> {
            let uniform = self.uniforms.get(target)?.id;
            let mut gpu = self.gpu.borrow_mut();
            if gpu.read_in_flight(uniform) {
                let message = format!("uniform buffer {} written while a frame reads it", uniform);
                gpu.violations.push(message);
            }
            gpu.read_by.insert(uniform, buffer.id);
            gpu.calls.push(Call::BindUniform {
                uniform,
                buffer: buffer.id,
            });
            Ok(())
        }
    }

    const TIMEOUT: FenceTimeout = FenceTimeout::Bounded(Duration::from_millis(250));

    fn setup(
        frames_in_flight: usize,
        images: &[u32],
    ) -> (
        SharedGpu,
        FrameScheduler<MockBackend>,
        MockPresenter,
        MockRecorder,
    ) {
        let gpu = SharedGpu::default();
        let scheduler = FrameSchedulerBuilder::new()
            .frames_in_flight(frames_in_flight)
            .throttle_timeout(TIMEOUT)
            .build(MockBackend { gpu: gpu.clone() })
            .expect("mock backend never fails to create slots");
        let presenter = MockPresenter::new(&gpu, images);
        let recorder = MockRecorder::new(&gpu);

        (gpu, scheduler, presenter, recorder)
    }

    fn presented_slot(status: FrameStatus) -> usize {
        match status {
            FrameStatus::Presented { slot, .. } => slot,
            FrameStatus::NeedsRebuild => panic!("expected a presented frame"),
        }
    }

    #[test]
    fn four_cycles_over_two_images_and_two_slots() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);

        let slots: Vec<usize> = (0..4)
            .map(|_| {
                let status = scheduler
                    .draw_frame(&mut presenter, &mut recorder)
                    .expect("frame should render");
                presented_slot(status)
            })
            .collect();

        assert_eq!(slots, vec![0, 1, 0, 1]);
        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::Acquire { .. })), 4);
        assert_eq!(gpu.count(|call| matches!(call, Call::Submit { .. })), 4);
        assert_eq!(gpu.count(|call| matches!(call, Call::Present { .. })), 4);
        assert!(gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::WaitFence { timeout, .. } => Some(*timeout),
                _ => None,
            })
            .all(|timeout| timeout == TIMEOUT));
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn slots_cycle_independently_of_image_order() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 2, 1]);

        let mut slots = Vec::new();
        let mut images = Vec::new();
        for _ in 0..6 {
            match scheduler.draw_frame(&mut presenter, &mut recorder) {
                Ok(FrameStatus::Presented { slot, image_index }) => {
                    slots.push(slot);
                    images.push(image_index);
                }
                other => panic!("unexpected frame result {:?}", other),
            }
        }

        assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
        assert_eq!(images, vec![0, 2, 1, 0, 2, 1]);

        let gpu = gpu.borrow();
        let recorded: Vec<(u32, usize, u32)> = gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Record {
                    buffer,
                    slot,
                    image_index,
                } => Some((*buffer, *slot, *image_index)),
                _ => None,
            })
            .collect();
        let buffers: Vec<u32> = recorded.iter().map(|&(buffer, _, _)| buffer).collect();
        assert_ne!(buffers[0], buffers[1]);
        assert_eq!(
            buffers,
            vec![buffers[0], buffers[1], buffers[0], buffers[1], buffers[0], buffers[1]]
        );
        assert_eq!(
            recorded.iter().map(|&(_, _, image)| image).collect::<Vec<u32>>(),
            images
        );
        assert_eq!(
            recorded.iter().map(|&(_, slot, _)| slot).collect::<Vec<usize>>(),
            slots
        );

        // The image a frame presents is the one acquired, the semaphore is the slot's own
        let presents: Vec<u32> = gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Present { image_index, .. } => Some(*image_index),
                _ => None,
            })
            .collect();
        assert_eq!(presents, images);
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn submission_waits_on_acquire_and_signals_present() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1, 2]);

        for _ in 0..3 {
            scheduler
                .draw_frame(&mut presenter, &mut recorder)
                .expect("frame should render");
        }

        let gpu = gpu.borrow();
        let mut acquired_with = None;
        for call in gpu.calls.iter() {
            match call {
                Call::Acquire { semaphore, timeout } => {
                    assert_eq!(*timeout, FenceTimeout::Infinite);
                    acquired_with = Some(*semaphore);
                }
                Call::Submit {
                    wait, signal, stage, ..
                } => {
                    assert_eq!(Some(*wait), acquired_with);
                    assert_ne!(wait, signal);
                    assert_eq!(*stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
                }
                _ => {}
            }
        }

        let submits: Vec<u32> = gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Submit { signal, .. } => Some(*signal),
                _ => None,
            })
            .collect();
        let presents: Vec<u32> = gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Present { wait, .. } => Some(*wait),
                _ => None,
            })
            .collect();
        assert_eq!(submits, presents);
    }

    #[test]
    fn slot_is_never_reused_before_its_fence_signals() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(3, &[0, 1]);

        for _ in 0..9 {
            scheduler
                .draw_frame(&mut presenter, &mut recorder)
                .expect("frame should render");
        }

        let gpu = gpu.borrow();
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);

        // Every reset of a fence is preceded by a wait on that same fence
        let mut waited: Option<u32> = None;
        for call in gpu.calls.iter() {
            match call {
                Call::WaitFence { fence, .. } => waited = Some(*fence),
                Call::ResetFence(fence) => assert_eq!(waited.take(), Some(*fence)),
                _ => {}
            }
        }
    }

    #[test]
    fn stale_acquire_skips_the_frame() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        presenter.acquire_overrides.push_back(AcquireOutcome::OutOfDate);

        let status = scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("stale swapchain isn't fatal");

        assert_eq!(status, FrameStatus::NeedsRebuild);
        assert_eq!(scheduler.current_slot(), 0);
        {
            let gpu = gpu.borrow();
            assert_eq!(gpu.count(|call| matches!(call, Call::ResetFence(_))), 0);
            assert_eq!(gpu.count(|call| matches!(call, Call::Record { .. })), 0);
            assert_eq!(gpu.count(|call| matches!(call, Call::Submit { .. })), 0);
            assert_eq!(gpu.count(|call| matches!(call, Call::Present { .. })), 0);
        }

        // The slot's fence is still signaled, so the next frame goes through
        let status = scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render after a rebuild request");
        assert_eq!(presented_slot(status), 0);
        assert!(gpu.borrow().violations.is_empty());
    }

    #[test]
    fn stale_present_requests_a_rebuild_after_submitting() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        presenter.present_overrides.push_back(PresentOutcome::OutOfDate);
        presenter.present_overrides.push_back(PresentOutcome::Suboptimal);

        let first = scheduler.draw_frame(&mut presenter, &mut recorder);
        let second = scheduler.draw_frame(&mut presenter, &mut recorder);

        assert_eq!(first.ok(), Some(FrameStatus::NeedsRebuild));
        assert_eq!(second.ok(), Some(FrameStatus::NeedsRebuild));
        assert_eq!(scheduler.current_slot(), 0);
        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::Submit { .. })), 2);
        assert_eq!(gpu.count(|call| matches!(call, Call::Present { .. })), 2);
    }

    #[test]
    fn suboptimal_acquire_still_presents() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        presenter.acquire_overrides.push_back(AcquireOutcome::Ready {
            image_index: 1,
            suboptimal: true,
        });

        let status = scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("suboptimal isn't fatal");

        assert_eq!(status, FrameStatus::NeedsRebuild);
        assert_eq!(scheduler.current_slot(), 1);
        assert_eq!(
            gpu.borrow()
                .count(|call| matches!(call, Call::Present { image_index: 1, .. })),
            1
        );
    }

    #[test]
    fn throttle_timeout_leaves_the_slot_untouched() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render");
        scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render");

        // Slot 0's fence never signals this time around
        let fence = match gpu.borrow().calls.iter().find_map(|call| match call {
            Call::Submit { fence, .. } => Some(*fence),
            _ => None,
        }) {
            Some(fence) => fence,
            None => panic!("no submission recorded"),
        };
        gpu.borrow_mut().hung.insert(fence);
        let calls_before = gpu.borrow().calls.len();

        let result = scheduler.draw_frame(&mut presenter, &mut recorder);

        match result {
            Err(FrameError::ThrottleTimeout { slot, timeout }) => {
                assert_eq!(slot, 0);
                assert_eq!(timeout, TIMEOUT);
            }
            other => panic!("expected a throttle timeout, got {:?}", other),
        }
        assert_eq!(scheduler.current_slot(), 0);
        {
            let gpu = gpu.borrow();
            assert_eq!(gpu.calls.len(), calls_before + 1);
            assert!(matches!(gpu.calls.last(), Some(Call::WaitFence { .. })));
        }

        // Once the GPU catches up the same slot is retried
        gpu.borrow_mut().hung.clear();
        let status = scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render once the fence signals");
        assert_eq!(presented_slot(status), 0);
        assert!(gpu.borrow().violations.is_empty());
    }

    #[test]
    fn infinite_timeout_is_passed_through() {
        let gpu = SharedGpu::default();
        let mut scheduler = FrameSchedulerBuilder::new()
            .throttle_timeout(FenceTimeout::Infinite)
            .build(MockBackend { gpu: gpu.clone() })
            .expect("mock backend never fails to create slots");
        let mut presenter = MockPresenter::new(&gpu, &[0, 1]);
        let mut recorder = MockRecorder::new(&gpu);

        scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render");

        assert_eq!(scheduler.throttle_timeout(), FenceTimeout::Infinite);
        assert_eq!(scheduler.frames_in_flight(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(
            gpu.borrow().count(|call| matches!(
                call,
                Call::WaitFence {
                    timeout: FenceTimeout::Infinite,
                    ..
                }
            )),
            1
        );
    }

    #[test]
    fn creation_failure_names_slot_and_semaphore() {
        let gpu = SharedGpu::default();
        // Slot 1's second semaphore
        gpu.borrow_mut().fail_semaphore_at = Some(4);

        let result = FrameSchedulerBuilder::new()
            .frames_in_flight(2)
            .build(MockBackend { gpu: gpu.clone() });

        match result {
            Err(FrameError::Sync(error)) => assert_eq!(
                error,
                SyncError::CreateSemaphore {
                    slot: 1,
                    role: SemaphoreRole::RenderFinished,
                    source: VulkanError::OutOfDeviceMemory,
                }
            ),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("building should fail"),
        }
        // Slot 0 and the half built slot 1 were released again
        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::Destroy(_))), 6);
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let result = FrameSchedulerBuilder::new()
            .frames_in_flight(0)
            .build(MockBackend {
                gpu: SharedGpu::default(),
            });

        assert!(matches!(result, Err(FrameError::NoFramesInFlight)));
    }

    #[test]
    fn shutdown_waits_for_idle_before_releasing_slots() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1, 2]);
        for _ in 0..3 {
            scheduler
                .draw_frame(&mut presenter, &mut recorder)
                .expect("frame should render");
        }

        scheduler.shutdown().expect("shutdown succeeds");
        scheduler.shutdown().expect("second shutdown is a no-op");

        assert!(scheduler.is_shut_down());
        assert!(matches!(
            scheduler.draw_frame(&mut presenter, &mut recorder),
            Err(FrameError::ShutDown)
        ));
        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::WaitIdle)), 1);
        let idle_at = gpu
            .calls
            .iter()
            .position(|call| matches!(call, Call::WaitIdle));
        let first_destroy = gpu
            .calls
            .iter()
            .position(|call| matches!(call, Call::Destroy(_)));
        assert!(idle_at < first_destroy);
        assert_eq!(gpu.count(|call| matches!(call, Call::Destroy(_))), 8);
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn dropping_the_scheduler_shuts_it_down() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render");

        drop(scheduler);

        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::WaitIdle)), 1);
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn failed_recording_leaves_the_slot_reusable() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        recorder.fail_next = true;

        let result = scheduler.draw_frame(&mut presenter, &mut recorder);

        assert!(matches!(result, Err(FrameError::UnknownImage(0))));
        assert_eq!(scheduler.current_slot(), 0);
        {
            let gpu = gpu.borrow();
            assert_eq!(gpu.count(|call| matches!(call, Call::ResetFence(_))), 0);
            assert_eq!(gpu.count(|call| matches!(call, Call::Submit { .. })), 0);
        }

        // The fence was never reset, so waiting on it again returns straight away
        let status = scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render after a failed recording");
        assert_eq!(presented_slot(status), 0);
        let gpu = gpu.borrow();
        assert_eq!(gpu.count(|call| matches!(call, Call::ResetFence(_))), 1);
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn fence_is_reset_after_recording_and_before_submitting() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);

        scheduler
            .draw_frame(&mut presenter, &mut recorder)
            .expect("frame should render");

        let gpu = gpu.borrow();
        let position = |matches: fn(&Call) -> bool| gpu.calls.iter().position(matches);
        let recorded = position(|call| matches!(call, Call::Record { .. }));
        let reset = position(|call| matches!(call, Call::ResetFence(_)));
        let submitted = position(|call| matches!(call, Call::Submit { .. }));
        assert!(recorded.is_some());
        assert!(recorded < reset);
        assert!(reset < submitted);
    }

    #[test]
    fn per_frame_uniforms_follow_the_slot_not_the_image() {
        let (gpu, mut scheduler, mut presenter, _) = setup(2, &[0, 2, 1]);
        let mut recorder = UniformRecorder::new(&gpu, 2);
        let uniforms: Vec<u32> = recorder.uniforms.iter().map(|uniform| uniform.id).collect();

        let mut images = Vec::new();
        for _ in 0..6 {
            match scheduler.draw_frame(&mut presenter, &mut recorder) {
                Ok(FrameStatus::Presented { image_index, .. }) => images.push(image_index),
                other => panic!("unexpected frame result {:?}", other),
            }
        }

        assert_eq!(images, vec![0, 2, 1, 0, 2, 1]);
        let gpu = gpu.borrow();
        let bound: Vec<u32> = gpu
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::BindUniform { uniform, .. } => Some(*uniform),
                _ => None,
            })
            .collect();
        assert_eq!(
            bound,
            vec![uniforms[0], uniforms[1], uniforms[0], uniforms[1], uniforms[0], uniforms[1]]
        );
        assert!(gpu.violations.is_empty(), "{:?}", gpu.violations);
    }

    #[test]
    fn submit_failure_is_fatal() {
        let (gpu, mut scheduler, mut presenter, mut recorder) = setup(2, &[0, 1]);
        gpu.borrow_mut().fail_submit = true;

        let result = scheduler.draw_frame(&mut presenter, &mut recorder);

        assert!(matches!(
            result,
            Err(FrameError::Submit(VulkanError::DeviceLost))
        ));
        assert_eq!(gpu.borrow().count(|call| matches!(call, Call::Present { .. })), 0);
    }
}
