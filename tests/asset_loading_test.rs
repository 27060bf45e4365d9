use cgmath::{Rad, Vector3};
use flow_orbit::{
    Host,
    data_structures::{material::Material, scene_graph::NodeKind},
};

use crate::common::test_utils::{close, model, mount, renders, settle, texture_data, tick};

mod common;

#[test]
fn model_spins_only_after_it_is_attached() {
    let mut controller = mount(1024, 768);
    for _ in 0..5 {
        assert!(tick(&mut controller));
    }
    assert!(controller.model().is_none());

    assert!(controller.host().loader().resolve_model(Ok(model())));
    assert_eq!(settle(&mut controller), 1);
    let id = controller.model().expect("model attached");
    let rotation = controller.scene().node(id).map(|n| n.transform.rotation.y);
    assert_eq!(rotation, Some(Rad(0.0)));

    assert!(tick(&mut controller));
    let spin = controller.config().model.spin;
    let rotation = controller
        .scene()
        .node(id)
        .map(|n| n.transform.rotation.y)
        .expect("model node");
    assert!(close(rotation.0, spin));

    assert!(tick(&mut controller));
    let rotation = controller.scene().node(id).map(|n| n.transform.rotation.y.0);
    assert!(rotation.is_some_and(|r| close(r, 2.0 * spin)));
}

#[test]
fn loaded_model_is_prepared_for_the_scene() {
    let mut controller = mount(1024, 768);
    controller.host().loader().resolve_model(Ok(model()));
    settle(&mut controller);

    let id = controller.model().expect("model attached");
    let node = controller.scene().node(id).expect("model node");
    assert_eq!(node.transform.scale, Vector3::new(0.5, 0.5, 0.5));
    assert_eq!(node.transform.position, Vector3::new(0.0, -1.0, 0.0));
    assert_eq!(node.mesh_count(), 2);

    let texture = controller.texture();
    let settings = &controller.config().model;
    let mut meshes = 0;
    node.traverse(&mut |child| {
        if let NodeKind::Mesh(mesh) = &child.kind {
            meshes += 1;
            assert!(mesh.receive_shadow);
            assert!(!mesh.cast_shadow);
            let Material::Physical(material) = &mesh.material else {
                panic!("imported material was not replaced");
            };
            assert_eq!(material.map, Some(texture));
            assert_eq!(material.metalness, settings.metalness);
            assert_eq!(material.roughness, settings.roughness);
            assert_eq!(material.reflectivity, settings.reflectivity);
        }
    });
    assert_eq!(meshes, 2);
}

#[test]
fn texture_load_forces_exactly_one_render() {
    let mut controller = mount(1024, 768);
    let before = renders(&controller);

    assert!(controller.host().loader().resolve_texture(Ok(texture_data())));
    assert_eq!(settle(&mut controller), 1);
    assert_eq!(renders(&controller), before + 1);
    assert!(controller.scene().textures.is_loaded(controller.texture()));

    assert_eq!(settle(&mut controller), 0);
    assert_eq!(renders(&controller), before + 1);
}

#[test]
fn model_load_does_not_force_a_render() {
    let mut controller = mount(1024, 768);
    controller.host().loader().resolve_model(Ok(model()));
    settle(&mut controller);
    assert_eq!(renders(&controller), 0);

    assert!(tick(&mut controller));
    assert_eq!(controller.renderer().last_mesh_count, 2);
}

#[test]
fn failed_loads_leave_the_scene_running() {
    let mut controller = mount(1024, 768);
    controller
        .host()
        .loader()
        .resolve_texture(Err(anyhow::anyhow!("404 textures/marble.jpg")));
    controller
        .host()
        .loader()
        .resolve_model(Err(anyhow::anyhow!("draco decoder unavailable")));
    assert_eq!(settle(&mut controller), 2);

    assert!(controller.model().is_none());
    assert!(!controller.scene().textures.is_loaded(controller.texture()));
    assert_eq!(renders(&controller), 0);

    for _ in 0..3 {
        assert!(tick(&mut controller));
    }
    assert_eq!(renders(&controller), 3);
    assert!(controller.scheduled_frame().is_some());
}

#[test]
fn results_arriving_after_dispose_are_dropped() {
    let mut controller = mount(1024, 768);
    controller.dispose();

    controller.host().loader().resolve_texture(Ok(texture_data()));
    controller.host().loader().resolve_model(Ok(model()));
    assert_eq!(settle(&mut controller), 0);

    assert!(controller.model().is_none());
    assert!(!controller.scene().textures.is_loaded(controller.texture()));
    assert_eq!(controller.scene().mesh_count(), 0);
    assert_eq!(renders(&controller), 0);
}

#[test]
fn results_queued_before_dispose_are_dropped() {
    let mut controller = mount(1024, 768);
    controller.host().loader().resolve_texture(Ok(texture_data()));
    controller.host_mut().run_until_stalled();

    controller.dispose();
    assert_eq!(controller.pump(), 0);
    assert!(!controller.scene().textures.is_loaded(controller.texture()));
    assert_eq!(renders(&controller), 0);
}
