//! glTF import into a [`SceneNode`] tree.
//!
//! Only triangle geometry and base colours are kept; the scene replaces
//! materials anyway. Draco-compressed primitives are decoded by the caller
//! and handed to [`import`] as [`Decoded`] geometry.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, bail};
use cgmath::{InnerSpace, Vector3};
use gltf::json::validation::{Error as ValidationError, Validate};

use crate::data_structures::{
    geometry::{Geometry, ModelVertex},
    material::Material,
    scene_graph::{Mesh, SceneNode},
    transform::Transform,
};

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Decoded geometry keyed by `(mesh index, primitive index)`.
pub type Decoded = HashMap<(usize, usize), Arc<Geometry>>;

/// A primitive whose attributes live in a compressed buffer view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressedPrimitive {
    pub mesh: usize,
    pub primitive: usize,
    pub buffer_view: usize,
}

/// Parse and validate a `.gltf` or `.glb` file.
///
/// Accessors of compressed primitives carry no buffer view of their own, so
/// that omission is accepted for them and nothing else.
pub fn parse(bytes: &[u8], label: &str) -> anyhow::Result<gltf::Gltf> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)
        .with_context(|| format!("Failed to parse {label}"))?;
    let mut root = document.into_json();
    root.extensions_required.retain(|ext| ext != DRACO_EXTENSION);

    let exempt: Vec<String> = compressed_accessors(&root)
        .into_iter()
        .map(|index| format!("accessors[{index}].bufferView"))
        .collect();
    let mut problems = Vec::new();
    root.validate(&root, gltf::json::Path::new, &mut |path, error| {
        let path = path();
        if error == ValidationError::Missing && exempt.iter().any(|e| e == path.as_str()) {
            return;
        }
        problems.push(format!("{path}: {error}"));
    });
    if !problems.is_empty() {
        bail!("{label} is not a valid glTF asset: {}", problems.join(", "));
    }

    Ok(gltf::Gltf {
        document: gltf::Document::from_json_without_validation(root),
        blob,
    })
}

fn compressed_accessors(root: &gltf::json::Root) -> Vec<usize> {
    let mut accessors = Vec::new();
    for primitive in root.meshes.iter().flat_map(|mesh| &mesh.primitives) {
        let compressed = primitive
            .extensions
            .as_ref()
            .is_some_and(|ext| ext.others.contains_key(DRACO_EXTENSION));
        if compressed {
            accessors.extend(primitive.attributes.values().map(|index| index.value()));
            accessors.extend(primitive.indices.as_ref().map(|index| index.value()));
        }
    }
    accessors
}

/// Every triangle primitive stored with mesh compression.
pub fn compressed_primitives(gltf: &gltf::Gltf) -> anyhow::Result<Vec<CompressedPrimitive>> {
    let mut out = Vec::new();
    for mesh in gltf.meshes() {
        for primitive in mesh.primitives() {
            let Some(ext) = primitive.extension_value(DRACO_EXTENSION) else {
                continue;
            };
            let buffer_view = ext
                .get("bufferView")
                .and_then(|view| view.as_u64())
                .with_context(|| {
                    format!(
                        "Primitive {} of mesh {} has no compressed buffer view",
                        primitive.index(),
                        mesh.index()
                    )
                })?;
            out.push(CompressedPrimitive {
                mesh: mesh.index(),
                primitive: primitive.index(),
                buffer_view: buffer_view as usize,
            });
        }
    }
    Ok(out)
}

/// URIs of buffers stored next to the model, in buffer order.
pub fn external_buffers(gltf: &gltf::Gltf) -> anyhow::Result<Vec<String>> {
    let mut uris = Vec::new();
    for buffer in gltf.buffers() {
        if let gltf::buffer::Source::Uri(uri) = buffer.source() {
            if uri.starts_with("data:") {
                bail!("Buffer {} uses an embedded data URI", buffer.index());
            }
            uris.push(uri.to_string());
        }
    }
    Ok(uris)
}

/// Pair every buffer with its bytes. `external` holds the contents of
/// [`external_buffers`], in the same order.
pub fn resolve_buffers(gltf: &gltf::Gltf, external: Vec<Vec<u8>>) -> anyhow::Result<Vec<Vec<u8>>> {
    let mut external = external.into_iter();
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .context("Binary buffer referenced but no GLB chunk present")?,
            gltf::buffer::Source::Uri(uri) => external
                .next()
                .with_context(|| format!("Buffer {uri} was not loaded"))?,
        };
        if data.len() < buffer.length() {
            bail!("Buffer {} is truncated", buffer.index());
        }
        buffers.push(data);
    }
    Ok(buffers)
}

/// Bytes of buffer view `index`.
pub fn view_bytes<'a>(
    gltf: &gltf::Gltf,
    buffers: &'a [Vec<u8>],
    index: usize,
) -> anyhow::Result<&'a [u8]> {
    let view = gltf
        .views()
        .nth(index)
        .with_context(|| format!("Buffer view {index} does not exist"))?;
    let data = buffers
        .get(view.buffer().index())
        .with_context(|| format!("Buffer of view {index} was not resolved"))?;
    data.get(view.offset()..view.offset() + view.length())
        .with_context(|| format!("Buffer view {index} exceeds its buffer"))
}

/// Build the node tree of the default scene.
pub fn import(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    decoded: &Decoded,
    label: &str,
) -> anyhow::Result<SceneNode> {
    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .with_context(|| format!("{label} contains no scene"))?;

    let mut root = SceneNode::group(label);
    for node in scene.nodes() {
        root.add_child(convert_node(&node, buffers, decoded)?);
    }
    if root.mesh_count() == 0 {
        bail!("{label} contains no triangle meshes");
    }
    Ok(root)
}

fn convert_node(
    node: &gltf::Node,
    buffers: &[Vec<u8>],
    decoded: &Decoded,
) -> anyhow::Result<SceneNode> {
    let (translation, rotation, scale) = node.transform().decomposed();
    let mut out = SceneNode::group(node.name().unwrap_or("node"));
    out.transform = Transform::from_decomposed(translation, rotation, scale);

    if let Some(mesh) = node.mesh() {
        let name = mesh.name().unwrap_or("mesh");
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("Skipping {:?} primitive of {name}", primitive.mode());
                continue;
            }
            let geometry = if primitive.extension_value(DRACO_EXTENSION).is_some() {
                decoded
                    .get(&(mesh.index(), primitive.index()))
                    .cloned()
                    .with_context(|| {
                        format!("Compressed primitive {} of {name} was not decoded", primitive.index())
                    })?
            } else {
                Arc::new(read_geometry(&primitive, buffers)?)
            };
            let base_color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();
            out.add_child(SceneNode::mesh(
                name,
                Mesh {
                    geometry,
                    material: Material::Imported { base_color },
                    cast_shadow: true,
                    receive_shadow: false,
                },
            ));
        }
    }
    for child in node.children() {
        out.add_child(convert_node(&child, buffers, decoded)?);
    }
    Ok(out)
}

fn read_geometry(primitive: &gltf::Primitive, buffers: &[Vec<u8>]) -> anyhow::Result<Geometry> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()
        .context("Primitive has no positions")?
        .map(|position| ModelVertex {
            position,
            ..Default::default()
        })
        .collect();

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices.iter_mut().zip(normals).for_each(|(v, n)| v.normal = n);
            true
        }
        None => false,
    };
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
        vertices
            .iter_mut()
            .zip(tex_coords)
            .for_each(|(v, uv)| v.tex_coords = uv);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        bail!("Index {bad} out of range for {} vertices", vertices.len());
    }
    if !has_normals {
        compute_normals(&mut vertices, &indices);
    }
    Ok(Geometry::new(vertices, indices))
}

/// Area-weighted vertex normals for meshes that ship without them.
pub(crate) fn compute_normals(vertices: &mut [ModelVertex], indices: &[u32]) {
    let mut sums = vec![Vector3::new(0.0f32, 0.0, 0.0); vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p0: Vector3<f32> = vertices[a].position.into();
        let p1: Vector3<f32> = vertices[b].position.into();
        let p2: Vector3<f32> = vertices[c].position.into();
        let face = (p1 - p0).cross(p2 - p0);
        for i in [a, b, c] {
            sums[i] += face;
        }
    }
    for (vertex, sum) in vertices.iter_mut().zip(sums) {
        if sum.magnitude2() > 0.0 {
            vertex.normal = sum.normalize().into();
        }
    }
}
