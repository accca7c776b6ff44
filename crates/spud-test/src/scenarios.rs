//! Frame protocol scenarios against the mock driver.

use std::collections::HashSet;
use std::path::Path;

use approx::assert_relative_eq;
use glam::{Mat4, Vec3, Vec4};
use spud_core::{GlobalUniforms, RenderPacket};
use spud_gpu::{
    vk, AcquireOutcome, CommandBufferState, FrameOrchestrator, GpuError, PresentOutcome,
    ShaderModule, ShaderStage, SwapchainState,
};
use spud_render::{RenderBackend, RendererFrontend, VulkanBackend};

use crate::{test_config, Call, Failure, MemoryFileSystem, MockDriver};

const DT: f32 = 1.0 / 60.0;

fn orchestrator(
    images: u32,
    frames_in_flight: u32,
) -> (FrameOrchestrator<MockDriver>, MockDriver) {
    let driver = MockDriver::new().with_image_count(images);
    let config = test_config(frames_in_flight);
    let frames = FrameOrchestrator::new(driver.clone(), &config, 800, 600).unwrap();
    (frames, driver)
}

/// Run one full frame, returning the slot it used.
fn frame(frames: &mut FrameOrchestrator<MockDriver>) -> usize {
    let slot = frames.current_frame();
    assert!(frames.begin_frame(DT).unwrap());
    frames.end_frame(DT).unwrap();
    slot
}

fn is_create_swapchain(call: &Call) -> bool {
    matches!(call, Call::CreateSwapchain { .. })
}

#[test]
fn frames_in_flight_is_clamped_to_image_count() {
    for images in 1..=4 {
        for requested in 0..=5 {
            let (frames, _) = orchestrator(images, requested);
            let expected = (requested as usize).clamp(1, images as usize);
            assert_eq!(
                frames.synchronizer().frames_in_flight(),
                expected,
                "N={images} M={requested}"
            );
            assert_eq!(frames.synchronizer().images_in_flight().len(), images as usize);
            assert_eq!(frames.command_buffers().len(), images as usize);
            assert_eq!(frames.swapchain().framebuffers().len(), images as usize);
        }
    }
}

#[test]
fn every_slot_and_image_is_used_after_image_count_frames() {
    for images in 1..=4u32 {
        for frames_in_flight in 1..=images {
            let (mut frames, _) = orchestrator(images, frames_in_flight);

            let visited: HashSet<usize> = (0..images).map(|_| frame(&mut frames)).collect();

            assert_eq!(visited.len(), frames_in_flight as usize, "N={images} M={frames_in_flight}");
            assert!(
                frames.synchronizer().images_in_flight().iter().all(Option::is_some),
                "N={images} M={frames_in_flight}"
            );
        }
    }
}

#[test]
fn three_images_two_slots_cycle_slots() {
    let (mut frames, _) = orchestrator(3, 2);

    assert_eq!(frame(&mut frames), 0);
    assert_eq!(frame(&mut frames), 1);

    assert_eq!(frames.current_frame(), 0);
    assert!(frames.begin_frame(DT).unwrap());
    assert_eq!(frames.frame_context().image_index, 2);
    assert_eq!(frames.synchronizer().images_in_flight()[2], None);
    frames.end_frame(DT).unwrap();

    assert_eq!(frames.synchronizer().images_in_flight(), &[Some(0), Some(1), Some(0)]);
    assert_eq!(frames.current_frame(), 1);
}

#[test]
fn repeated_image_waits_on_its_owner() {
    let (mut frames, driver) = orchestrator(3, 2);
    driver.script_images([0, 1, 0]);
    let slot0 = frames.synchronizer().slot(0).in_flight;

    frame(&mut frames);

    // First use of image 1: nothing to wait for at end_frame.
    assert!(frames.begin_frame(DT).unwrap());
    driver.clear_calls();
    frames.end_frame(DT).unwrap();
    assert_eq!(driver.count(|c| matches!(c, Call::WaitForFence(_))), 0);

    assert!(frames.begin_frame(DT).unwrap());
    assert_eq!(frames.synchronizer().images_in_flight()[0], Some(0));
    driver.clear_calls();
    frames.end_frame(DT).unwrap();

    let wait = driver.position(|c| *c == Call::WaitForFence(slot0)).unwrap();
    let reset = driver.position(|c| *c == Call::ResetFence(slot0)).unwrap();
    let submit = driver.position(|c| matches!(c, Call::Submit { .. })).unwrap();
    assert!(wait < reset && reset < submit);
    assert!(driver.is_signaled(slot0));
}

#[test]
fn image_owned_by_other_slot_is_waited_on() {
    let (mut frames, driver) = orchestrator(3, 2);
    driver.script_images([0, 0]);
    let slot0 = frames.synchronizer().slot(0).in_flight;
    let slot1 = frames.synchronizer().slot(1).in_flight;

    frame(&mut frames);
    assert!(frames.begin_frame(DT).unwrap());
    driver.clear_calls();
    frames.end_frame(DT).unwrap();

    assert_eq!(
        driver.calls().first(),
        Some(&Call::EndRenderPass(frames.command_buffers().get(0).handle()))
    );
    assert!(driver.position(|c| *c == Call::WaitForFence(slot0)).is_some());
    assert!(driver.position(|c| *c == Call::ResetFence(slot1)).is_some());
    assert_eq!(frames.synchronizer().images_in_flight()[0], Some(1));
}

#[test]
fn submit_and_present_use_the_slot_semaphores() {
    let (mut frames, driver) = orchestrator(3, 2);
    let slot = *frames.synchronizer().current();

    assert!(frames.begin_frame(DT).unwrap());
    assert!(driver.position(|c| *c == Call::Acquire(slot.image_available)).is_some());
    let command_buffer = frames.command_buffers().get(0).handle();
    frames.end_frame(DT).unwrap();

    assert!(driver
        .position(|c| *c
            == Call::Submit {
                command_buffer,
                wait: slot.image_available,
                signal: slot.queue_complete,
                fence: slot.in_flight,
            })
        .is_some());
    assert!(driver
        .position(|c| *c
            == Call::Present {
                wait: slot.queue_complete,
                image_index: 0,
            })
        .is_some());
    assert_eq!(frames.command_buffers().get(0).state(), CommandBufferState::Submitted);
}

#[test]
fn out_of_date_acquire_defers_to_next_frame() {
    let (mut frames, driver) = orchestrator(3, 2);
    frame(&mut frames);
    let old = frames.swapchain().handle();

    driver.script_acquire([AcquireOutcome::OutOfDate]);
    driver.clear_calls();
    assert!(!frames.begin_frame(DT).unwrap());

    assert_eq!(frames.current_frame(), 1);
    assert!(frames.frame_context().recreate_requested);
    assert!(!frames.frame_context().frame_in_progress);
    assert_eq!(driver.count(is_create_swapchain), 0);
    assert_eq!(driver.count(|c| matches!(c, Call::Submit { .. })), 0);

    driver.clear_calls();
    assert!(frames.begin_frame(DT).unwrap());

    assert_eq!(driver.count(is_create_swapchain), 1);
    let created =
        driver.position(|c| matches!(c, Call::CreateSwapchain { old: o, .. } if *o == old));
    let destroyed = driver.position(|c| *c == Call::DestroySwapchain(old));
    let acquired = driver.position(|c| matches!(c, Call::Acquire(_)));
    assert!(created.is_some());
    assert!(created < destroyed && destroyed < acquired);
    assert_eq!(driver.calls().first(), Some(&Call::WaitIdle));
    assert!(!frames.frame_context().recreate_requested);
    assert_ne!(frames.swapchain().handle(), old);

    frames.end_frame(DT).unwrap();
    assert_eq!(frames.current_frame(), 0);
}

#[test]
fn suboptimal_acquire_still_renders() {
    let (mut frames, driver) = orchestrator(3, 2);
    driver.script_acquire([AcquireOutcome::Acquired {
        image_index: 1,
        suboptimal: true,
    }]);

    assert!(frames.begin_frame(DT).unwrap());
    assert!(frames.frame_context().recreate_requested);
    frames.end_frame(DT).unwrap();

    driver.clear_calls();
    frame(&mut frames);
    assert_eq!(driver.count(is_create_swapchain), 1);
}

#[test]
fn stale_present_requests_recreation() {
    for outcome in [PresentOutcome::Suboptimal, PresentOutcome::OutOfDate] {
        let (mut frames, driver) = orchestrator(3, 2);
        driver.script_present([outcome]);

        frame(&mut frames);
        assert!(frames.frame_context().recreate_requested, "{outcome:?}");
        assert_eq!(frames.current_frame(), 1, "{outcome:?}");

        driver.clear_calls();
        frame(&mut frames);
        assert_eq!(driver.count(is_create_swapchain), 1, "{outcome:?}");
        assert!(!frames.frame_context().recreate_requested);
    }
}

#[test]
fn zero_size_resize_defers_recreation() {
    let (mut frames, driver) = orchestrator(3, 2);
    frame(&mut frames);
    driver.clear_calls();

    frames.on_resized(0, 0);
    assert!(!frames.begin_frame(DT).unwrap());
    assert!(!frames.begin_frame(DT).unwrap());
    assert_eq!(driver.count(is_create_swapchain), 0);
    assert_eq!(driver.count(|c| *c == Call::WaitIdle), 0);
    assert_eq!(frames.swapchain_manager().state(), SwapchainState::Created);
    assert!(frames.frame_context().needs_recreate());

    frames.on_resized(1024, 768);
    frame(&mut frames);
    frame(&mut frames);

    let creates: Vec<Call> = driver.calls().into_iter().filter(is_create_swapchain).collect();
    assert_eq!(creates.len(), 1);
    assert!(matches!(
        creates[0],
        Call::CreateSwapchain {
            width: 1024,
            height: 768,
            ..
        }
    ));
    assert_eq!(frames.size(), (1024, 768));
    let extent = frames.swapchain().extent();
    assert_eq!((extent.width, extent.height), (1024, 768));
    let area = frames.render_pass().render_area();
    assert_eq!((area.extent.width, area.extent.height), (1024, 768));
    assert!(frames
        .swapchain()
        .framebuffers()
        .iter()
        .all(|fb| fb.extent().width == 1024 && fb.extent().height == 768));
}

#[test]
fn recreation_is_not_reentrant() {
    let (mut frames, driver) = orchestrator(3, 2);
    frames.swapchain_manager_mut().begin_recreate().unwrap();
    driver.clear_calls();

    assert!(matches!(frames.recreate_swapchain(), Err(GpuError::RecreationInProgress)));
    assert!(driver.calls().is_empty());
    assert!(frames.is_recreating());

    frames.on_resized(640, 480);
    assert!(!frames.begin_frame(DT).unwrap());
    assert!(driver.calls().is_empty());

    frames.swapchain_manager_mut().finish_recreate();
    frame(&mut frames);
    assert_eq!(driver.count(is_create_swapchain), 1);
}

#[test]
fn failed_recreation_releases_the_guard() {
    let (mut frames, driver) = orchestrator(3, 2);
    driver.fail_next(Failure::CreateSwapchain);
    frames.on_resized(640, 480);

    assert!(matches!(frames.begin_frame(DT), Err(GpuError::Vulkan(_))));
    assert!(!frames.is_recreating());
    assert!(!frames.frame_context().frame_in_progress);
    assert!(frames.frame_context().needs_recreate());

    frame(&mut frames);
    let extent = frames.swapchain().extent();
    assert_eq!((extent.width, extent.height), (640, 480));
    assert_eq!(frames.swapchain().framebuffers().len(), 3);
}

#[test]
fn shrunk_swapchain_caps_cycled_slots() {
    let (mut frames, driver) = orchestrator(3, 3);
    assert_eq!(frame(&mut frames), 0);
    let idle = frames.synchronizer().slot(2).in_flight;

    driver.set_image_count(2);
    frames.on_resized(640, 480);
    driver.clear_calls();

    let used: Vec<usize> = (0..4).map(|_| frame(&mut frames)).collect();
    assert_eq!(used, [1, 0, 1, 0]);
    assert_eq!(frames.synchronizer().frames_in_flight(), 2);
    assert_eq!(frames.synchronizer().allocated_slots(), 3);
    assert_eq!(frames.synchronizer().images_in_flight().len(), 2);
    assert_eq!(
        driver.count(|c| matches!(c, Call::CreateFence(_) | Call::DestroyFence(_))),
        0
    );
    assert_eq!(driver.count(|c| *c == Call::WaitForFence(idle)), 0);
    assert!(driver.is_signaled(idle));

    driver.set_image_count(3);
    frames.on_resized(800, 600);
    let visited: HashSet<usize> = (0..3).map(|_| frame(&mut frames)).collect();
    assert_eq!(visited.len(), 3);
    assert_eq!(frames.synchronizer().frames_in_flight(), 3);
}

#[test]
fn viewport_is_flipped_and_render_area_tracks_extent() {
    let (mut frames, driver) = orchestrator(3, 2);

    assert!(frames.begin_frame(DT).unwrap());
    let calls = driver.calls();
    let Some(Call::SetViewportScissor { y, width, height, .. }) =
        calls.iter().rev().find(|c| matches!(c, Call::SetViewportScissor { .. })).copied()
    else {
        panic!("no viewport recorded");
    };
    assert_relative_eq!(y, 600.0);
    assert_relative_eq!(width, 800.0);
    assert_relative_eq!(height, -600.0);
    assert!(calls.iter().any(|c| matches!(
        c,
        Call::BeginRenderPass {
            width: 800,
            height: 600,
            clear_value_count: 2,
            ..
        }
    )));
    frames.end_frame(DT).unwrap();

    frames.on_resized(320, 200);
    driver.clear_calls();
    frame(&mut frames);
    assert!(driver
        .position(|c| matches!(c, Call::BeginRenderPass { width: 320, height: 200, .. }))
        .is_some());
}

#[test]
fn surface_dictated_extent_wins() {
    let driver = MockDriver::new();
    driver.set_current_extent(Some(vk::Extent2D {
        width: 1000,
        height: 500,
    }));
    let mut frames = FrameOrchestrator::new(driver.clone(), &test_config(2), 800, 600).unwrap();

    frame(&mut frames);
    assert_eq!(frames.swapchain().extent().width, 1000);
    assert_eq!(frames.render_pass().render_area().extent.height, 500);
    assert!(driver
        .position(|c| matches!(c, Call::BeginRenderPass { width: 1000, height: 500, .. }))
        .is_some());
}

#[test]
fn failed_submit_surfaces_as_fence_timeout() {
    let (mut frames, driver) = orchestrator(3, 2);
    frame(&mut frames);

    assert!(frames.begin_frame(DT).unwrap());
    driver.fail_next(Failure::Submit);
    assert!(matches!(frames.end_frame(DT), Err(GpuError::Vulkan(_))));
    assert_eq!(frames.current_frame(), 1);

    // The slot's fence was reset but nothing was submitted to signal it.
    assert!(matches!(
        frames.begin_frame(DT),
        Err(GpuError::FenceTimeout { timeout_ms: 100 })
    ));
    assert!(!frames.frame_context().frame_in_progress);
}

#[test]
fn fence_timeout_is_propagated() {
    let (mut frames, driver) = orchestrator(2, 2);
    driver.fail_next(Failure::WaitForFence);

    assert!(matches!(frames.begin_frame(DT), Err(GpuError::FenceTimeout { .. })));
    assert_eq!(driver.count(|c| matches!(c, Call::Acquire(_))), 0);
}

#[test]
#[should_panic(expected = "end_frame called without a successful begin_frame")]
fn end_frame_without_begin_panics() {
    let (mut frames, _) = orchestrator(3, 2);
    let _ = frames.end_frame(DT);
}

#[test]
#[should_panic(expected = "end_frame called without a successful begin_frame")]
fn end_frame_after_skipped_begin_panics() {
    let (mut frames, _) = orchestrator(3, 2);
    frames.on_resized(0, 0);
    assert!(!frames.begin_frame(DT).unwrap());
    let _ = frames.end_frame(DT);
}

#[test]
#[should_panic(expected = "already in progress")]
fn begin_frame_twice_panics() {
    let (mut frames, _) = orchestrator(3, 2);
    assert!(frames.begin_frame(DT).unwrap());
    let _ = frames.begin_frame(DT);
}

#[test]
fn shutdown_releases_everything_in_order() {
    let (mut frames, driver) = orchestrator(3, 2);
    frame(&mut frames);
    frame(&mut frames);
    let swapchain = frames.swapchain().handle();
    let render_pass = frames.render_pass().handle();
    driver.clear_calls();

    frames.shutdown();
    drop(frames);

    let calls = driver.calls();
    assert_eq!(calls.first(), Some(&Call::WaitIdle));
    assert_eq!(calls.last(), Some(&Call::DestroySwapchain(swapchain)));
    assert_eq!(driver.count(|c| *c == Call::WaitIdle), 1);

    let last_fence = calls.iter().rposition(|c| matches!(c, Call::DestroyFence(_))).unwrap();
    let first_free = driver.position(|c| matches!(c, Call::FreeCommandBuffer(_))).unwrap();
    let last_free = calls.iter().rposition(|c| matches!(c, Call::FreeCommandBuffer(_))).unwrap();
    let first_framebuffer = driver.position(|c| matches!(c, Call::DestroyFramebuffer(_))).unwrap();
    let pass = driver.position(|c| *c == Call::DestroyRenderPass(render_pass)).unwrap();
    assert!(last_fence < first_free);
    assert!(last_free < first_framebuffer);
    assert!(first_framebuffer < pass);

    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn failed_init_leaks_nothing() {
    for failure in [
        Failure::CreateFramebuffer,
        Failure::AllocateCommandBuffer,
        Failure::CreateFence,
    ] {
        let driver = MockDriver::new();
        driver.fail_next(failure);
        assert!(FrameOrchestrator::new(driver.clone(), &test_config(2), 800, 600).is_err());
        assert_eq!(driver.live_objects(), 0, "{failure:?}");
    }
}

#[test]
fn missing_depth_format_fails_init() {
    let driver = MockDriver::new();
    driver.set_depth_format(None);
    assert!(matches!(
        FrameOrchestrator::new(driver.clone(), &test_config(2), 800, 600),
        Err(GpuError::NoDepthFormat)
    ));
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn surface_without_formats_fails_init() {
    let driver = MockDriver::new();
    driver.set_formats(Vec::new());
    assert!(matches!(
        FrameOrchestrator::new(driver, &test_config(2), 800, 600),
        Err(GpuError::SwapchainCreation(_))
    ));
}

#[test]
fn fifo_is_used_without_mailbox() {
    let driver = MockDriver::new();
    driver.set_present_modes(vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE]);
    let frames = FrameOrchestrator::new(driver, &test_config(2), 800, 600).unwrap();
    assert_eq!(frames.swapchain().present_mode(), vk::PresentModeKHR::FIFO);
}

#[test]
fn shader_module_loads_through_filesystem() {
    let driver = MockDriver::new();
    let mut fs = MemoryFileSystem::new();
    fs.insert_words("shaders/basic.vert.spv", &[0x0723_0203, 0x0001_0000, 0, 1, 0]);

    let dir = Path::new("shaders");
    let mut module = ShaderModule::load(&driver, &fs, dir, "basic", ShaderStage::Vertex).unwrap();
    assert_eq!(module.stage(), ShaderStage::Vertex);
    assert!(driver
        .position(|c| *c
            == Call::CreateShaderModule {
                handle: module.handle(),
                words: 5
            })
        .is_some());

    let info = module.stage_create_info();
    assert_eq!(info.stage, vk::ShaderStageFlags::VERTEX);
    assert_eq!(info.module, module.handle());

    module.destroy(&driver);
    module.destroy(&driver);
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn shader_with_partial_word_is_rejected() {
    let driver = MockDriver::new();
    let mut fs = MemoryFileSystem::new();
    fs.insert("shaders/basic.frag.spv", vec![3, 2, 0x23, 0x07, 0]);

    let dir = Path::new("shaders");
    let err = ShaderModule::load(&driver, &fs, dir, "basic", ShaderStage::Fragment).unwrap_err();
    assert!(matches!(err, GpuError::ShaderModule(msg) if msg.contains("basic.frag.spv")));
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn missing_shader_is_not_found() {
    let driver = MockDriver::new();
    let fs = MemoryFileSystem::new();

    let dir = Path::new("shaders");
    let err = ShaderModule::load(&driver, &fs, dir, "sky", ShaderStage::Compute).unwrap_err();
    assert!(matches!(
        err,
        GpuError::Core(spud_core::Error::NotFound(path)) if path.ends_with("sky.comp.spv")
    ));
}

#[test]
fn backend_loads_shaders_from_configured_dir() {
    let driver = MockDriver::new();
    let mut config = test_config(2);
    config.shader_dir = "assets/custom".into();
    let backend = VulkanBackend::with_driver(driver.clone(), &config, 800, 600).unwrap();

    let mut fs = MemoryFileSystem::new();
    fs.insert_words("assets/custom/object.frag.spv", &[0x0723_0203, 0x0001_0000, 0]);

    let mut module = backend.create_shader_module(&fs, "object", ShaderStage::Fragment).unwrap();
    assert_eq!(module.stage(), ShaderStage::Fragment);
    assert!(driver
        .position(|c| matches!(c, Call::CreateShaderModule { words: 3, .. }))
        .is_some());

    let missing = backend.create_shader_module(&fs, "object", ShaderStage::Vertex);
    assert!(matches!(
        missing,
        Err(GpuError::Core(spud_core::Error::NotFound(path))) if path.starts_with("assets/custom")
    ));

    backend.destroy_shader_module(&mut module);
    drop(backend);
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn frontend_drives_the_vulkan_backend() {
    let driver = MockDriver::new();
    let backend = VulkanBackend::with_driver(driver.clone(), &test_config(2), 800, 600).unwrap();
    let mut renderer = RendererFrontend::with_backend(Box::new(backend), 800, 600);

    for _ in 0..3 {
        renderer.draw_frame(&RenderPacket::new(DT)).unwrap();
    }
    assert_eq!(renderer.frame_number(), 3);
    assert_eq!(driver.count(|c| matches!(c, Call::Submit { .. })), 3);
    assert_eq!(driver.count(|c| matches!(c, Call::Present { .. })), 3);

    // Minimized: frames are skipped, not failed.
    renderer.on_resized(0, 0);
    renderer.draw_frame(&RenderPacket::new(DT)).unwrap();
    assert_eq!(renderer.frame_number(), 3);

    renderer.on_resized(640, 480);
    renderer.draw_frame(&RenderPacket::new(DT)).unwrap();
    assert_eq!(renderer.frame_number(), 4);
    assert_eq!(driver.count(is_create_swapchain), 2);

    drop(renderer);
    assert_eq!(driver.live_objects(), 0);
}

#[test]
fn frontend_returns_end_frame_failure() {
    let driver = MockDriver::new();
    let backend = VulkanBackend::with_driver(driver.clone(), &test_config(2), 800, 600).unwrap();
    let mut renderer = RendererFrontend::with_backend(Box::new(backend), 800, 600);

    driver.fail_next(Failure::Present);
    assert!(renderer.draw_frame(&RenderPacket::new(DT)).is_err());
    assert_eq!(renderer.frame_number(), 0);
}

#[test]
fn backend_keeps_last_global_state() {
    let mut backend =
        VulkanBackend::with_driver(MockDriver::new(), &test_config(2), 800, 600).unwrap();
    let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
    let eye = Vec3::new(0.0, 2.0, 5.0);
    let uniforms = GlobalUniforms::new(Mat4::IDENTITY, view, eye, Vec4::splat(0.25), 0);

    assert!(backend.begin_frame(DT).unwrap());
    backend.update_global_state(&uniforms);
    backend.end_frame(DT).unwrap();

    assert_eq!(backend.global_uniforms(), &uniforms);
    assert_relative_eq!(backend.global_uniforms().view_position.y, 2.0);
    assert_eq!(backend.frames().current_frame(), 1);
}
