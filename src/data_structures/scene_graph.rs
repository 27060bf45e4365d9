//! Scene graph.
//!
//! The scene owns a flat list of top-level nodes addressed by [`NodeId`]; each
//! node owns its children. Nodes are only ever added, so ids stay valid for the
//! lifetime of the scene. Loaded models arrive as a single [`SceneNode`] tree
//! and are attached as one top-level node.

use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix, Vector3, Vector4};

use crate::data_structures::{
    geometry::Geometry,
    light::Light,
    material::Material,
    texture::TextureSlots,
    transform::Transform,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub struct Mesh {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Group,
    Mesh(Mesh),
    Light(Light),
}

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::new(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: &str, mesh: Mesh) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::new(),
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn light(name: &str, light: Light, position: Vector3<f32>) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::from_position(position),
            kind: NodeKind::Light(light),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Depth-first, parent before children.
    pub fn traverse_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        for child in &mut self.children {
            child.traverse_mut(f);
        }
    }

    pub fn traverse(&self, f: &mut impl FnMut(&SceneNode)) {
        f(self);
        for child in &self.children {
            child.traverse(f);
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |node| {
            if node.as_mesh().is_some() {
                count += 1;
            }
        });
        count
    }
}

/// A light with its position resolved to world space.
#[derive(Clone, Debug)]
pub struct WorldLight<'a> {
    pub light: &'a Light,
    pub position: Vector3<f32>,
}

#[derive(Debug)]
pub struct Scene {
    pub background: wgpu::Color,
    pub textures: TextureSlots,
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new(background: wgpu::Color) -> Self {
        Self {
            background,
            textures: TextureSlots::default(),
            nodes: Vec::new(),
        }
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All lights in the scene with world positions (ambient lights report their origin).
    pub fn lights(&self) -> Vec<WorldLight<'_>> {
        let mut lights = Vec::new();
        for node in &self.nodes {
            collect_lights(node, Matrix4::identity(), &mut lights);
        }
        lights
    }

    /// All meshes in the scene with their world matrices.
    pub fn meshes(&self) -> Vec<(&Mesh, Matrix4<f32>)> {
        let mut meshes = Vec::new();
        for node in &self.nodes {
            collect_meshes(node, Matrix4::identity(), &mut meshes);
        }
        meshes
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().map(SceneNode::mesh_count).sum()
    }
}

fn collect_lights<'a>(node: &'a SceneNode, parent: Matrix4<f32>, out: &mut Vec<WorldLight<'a>>) {
    let world = parent * node.transform.to_matrix();
    if let Some(light) = node.as_light() {
        let origin = world * Vector4::new(0.0, 0.0, 0.0, 1.0);
        out.push(WorldLight {
            light,
            position: origin.truncate(),
        });
    }
    for child in &node.children {
        collect_lights(child, world, out);
    }
}

fn collect_meshes<'a>(
    node: &'a SceneNode,
    parent: Matrix4<f32>,
    out: &mut Vec<(&'a Mesh, Matrix4<f32>)>,
) {
    let world = parent * node.transform.to_matrix();
    if let Some(mesh) = node.as_mesh() {
        out.push((mesh, world));
    }
    for child in &node.children {
        collect_meshes(child, world, out);
    }
}
