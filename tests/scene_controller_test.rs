use cgmath::Vector3;
use flow_orbit::{
    Host,
    config::Precision,
    controller::Lifecycle,
    data_structures::light::LightKind,
    host::Listener,
};

use crate::common::test_utils::{close, mount, pointer, renders, tick};

mod common;

#[test]
fn mount_builds_scene_before_any_load_resolves() {
    let controller = mount(1024, 768);
    let record = controller.host().record.borrow();

    assert_eq!(record.attached.len(), 1);
    assert!(record.has_listener(Listener::PointerMove));
    assert!(record.pending_frame.is_some());
    assert_eq!(record.spawned, 2);

    let lights = controller.scene().lights();
    let ambient = lights
        .iter()
        .filter(|l| l.light.kind == LightKind::Ambient)
        .count();
    let positional = lights.iter().filter(|l| l.light.is_positional()).count();
    assert_eq!(ambient, 1);
    assert_eq!(positional, 3);
    let fill = controller
        .scene()
        .node(controller.ambient_light())
        .and_then(|node| node.as_light())
        .expect("ambient light node");
    assert_eq!(fill.kind, LightKind::Ambient);
    assert_eq!(
        controller.position_of(controller.ambient_light()),
        Some(controller.config().ambient.position)
    );
    assert_eq!(controller.scene().mesh_count(), 0);
    assert!(controller.model().is_none());
    assert!(!controller.scene().textures.is_loaded(controller.texture()));

    assert!(close(controller.camera().aspect, 1024.0 / 768.0));
    assert_eq!(controller.lifecycle(), Lifecycle::Running);
}

#[test]
fn renderer_is_configured_for_throughput() {
    let controller = mount(1024, 768);
    let record = controller.host().record.borrow();
    let settings = record.renderer_settings.as_ref().expect("renderer created");
    assert!(!settings.antialias);
    assert_eq!(settings.power_preference, wgpu::PowerPreference::HighPerformance);
    assert_eq!(settings.precision, Precision::Low);
    assert!(settings.shadows);

    let renderer = controller.renderer();
    assert_eq!(renderer.size.map(|v| (v.width, v.height)), Some((1024, 768)));
    assert!(close(renderer.pixel_ratio, 0.5));
    assert!(close(controller.pixel_ratio(), 0.5));
    assert_eq!(renderer.renders, 0);
}

#[test]
fn loads_use_configured_paths() {
    let controller = mount(1024, 768);
    let loader = controller.host().loader();
    assert_eq!(*loader.texture_requests.borrow(), vec!["textures/marble.jpg".to_string()]);
    let models = loader.model_requests.borrow();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].0, "models/statue.glb");
    assert_eq!(models[0].1.path, "draco/");
}

#[test]
fn pointer_at_top_left_lowers_resolution() {
    let mut controller = mount(1024, 768);
    pointer(&mut controller, 0.0, 0.0);

    assert!(close(controller.pixel_ratio(), 0.3));
    assert!(close(controller.renderer().pixel_ratio, 0.3));
    let primary = controller
        .position_of(controller.primary_light())
        .expect("primary light");
    assert_eq!(primary, Vector3::new(-5.0, 5.0, 5.0));
}

#[test]
fn pointer_at_bottom_right_restores_full_resolution() {
    let mut controller = mount(1024, 768);
    pointer(&mut controller, 1024.0, 768.0);

    assert!(close(controller.pixel_ratio(), 1.0));
    let primary = controller
        .position_of(controller.primary_light())
        .expect("primary light");
    assert_eq!(primary, Vector3::new(5.0, -5.0, 5.0));
}

#[test]
fn pointer_renders_immediately_and_is_idempotent() {
    let mut controller = mount(1024, 768);
    pointer(&mut controller, 300.0, 500.0);
    let once = (
        controller.pixel_ratio(),
        controller.position_of(controller.primary_light()),
    );
    assert_eq!(renders(&controller), 1);

    pointer(&mut controller, 300.0, 500.0);
    let twice = (
        controller.pixel_ratio(),
        controller.position_of(controller.primary_light()),
    );
    assert_eq!(once, twice);
    assert_eq!(renders(&controller), 2);
    assert_eq!(controller.renderer().ratios, vec![once.0, once.0]);
}

#[test]
fn pointer_does_not_touch_the_frame_schedule() {
    let mut controller = mount(1024, 768);
    let scheduled = controller.scheduled_frame();
    pointer(&mut controller, 10.0, 10.0);
    assert_eq!(controller.scheduled_frame(), scheduled);
}

#[test]
fn dispose_detaches_and_cancels_the_frame_loop() {
    let mut controller = mount(1024, 768);
    pointer(&mut controller, 512.0, 384.0);
    assert!(tick(&mut controller));
    let scheduled = controller.scheduled_frame().expect("next frame scheduled");
    let ratio = controller.pixel_ratio();
    let primary = controller.position_of(controller.primary_light());
    let rendered = renders(&controller);

    controller.dispose();

    {
        let record = controller.host().record.borrow();
        assert!(record.attached.is_empty());
        assert_eq!(record.removed.len(), 1);
        assert!(!record.has_listener(Listener::PointerMove));
        assert!(record.pending_frame.is_none());
        assert_eq!(record.cancelled_frames, vec![scheduled]);
    }
    assert_eq!(controller.lifecycle(), Lifecycle::Disposed);
    assert_eq!(controller.scheduled_frame(), None);

    // Pointer events no longer reach the scene, routed or not.
    pointer(&mut controller, 0.0, 0.0);
    controller.on_pointer_move(0.0, 0.0);
    assert_eq!(controller.pixel_ratio(), ratio);
    assert_eq!(controller.position_of(controller.primary_light()), primary);

    // The cancelled frame never fires, and replaying it is ignored.
    assert!(!tick(&mut controller));
    controller.on_frame(scheduled);
    assert_eq!(renders(&controller), rendered);
}

#[test]
fn dispose_is_idempotent() {
    let mut controller = mount(1024, 768);
    controller.dispose();
    controller.dispose();
    let record = controller.host().record.borrow();
    assert_eq!(record.removed.len(), 1);
    assert_eq!(record.cancelled_frames.len(), 1);
}

#[test]
fn dropping_the_controller_disposes_it() {
    let controller = mount(1024, 768);
    let record = controller.host().record.clone();
    drop(controller);

    let record = record.borrow();
    assert!(record.attached.is_empty());
    assert!(record.listeners.is_empty());
    assert!(record.pending_frame.is_none());
}

#[test]
fn mount_fails_without_a_renderer() {
    use flow_orbit::{SceneConfig, SceneController};

    use crate::common::test_utils::HeadlessHost;

    let mut host = HeadlessHost::new(1024, 768);
    host.fail_renderer_creation = true;
    let record = host.record.clone();

    let err = SceneController::mount(host, SceneConfig::default())
        .err()
        .expect("mount must fail");
    assert!(format!("{err:#}").contains("no adapter"));

    let record = record.borrow();
    assert!(record.attached.is_empty());
    assert!(record.listeners.is_empty());
    assert_eq!(record.spawned, 0);
}
