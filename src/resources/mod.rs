//! Asset loading.
//!
//! Files are fetched relative to an asset root: `./assets` on native targets
//! (override with `FLOW_ORBIT_ASSETS`) and `<origin>/assets/` on the web.
//! Loading only produces CPU-side data; uploading is the renderer's job.

#[cfg(not(target_arch = "wasm32"))]
use std::sync::Arc;

#[cfg(target_arch = "wasm32")]
use anyhow::bail;
use anyhow::Context;

use crate::{
    data_structures::{scene_graph::SceneNode, texture::TextureData},
    host::{Task, task},
};

#[cfg(not(target_arch = "wasm32"))]
pub mod draco;
pub mod model;
pub mod texture;

#[cfg(not(target_arch = "wasm32"))]
pub const ASSET_ROOT_VAR: &str = "FLOW_ORBIT_ASSETS";

/// Directory, relative to the asset root, holding the mesh decompression
/// runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub path: String,
}

impl DecoderConfig {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

pub trait AssetLoader {
    fn load_texture(&self, path: &str) -> Task<anyhow::Result<TextureData>>;

    fn load_model(&self, path: &str, decoder: &DecoderConfig) -> Task<anyhow::Result<SceneNode>>;
}

/// Loads assets from disk or, on the web, over HTTP.
#[derive(Clone, Debug)]
pub struct FileLoader {
    #[cfg(not(target_arch = "wasm32"))]
    root: std::path::PathBuf,
}

impl FileLoader {
    pub fn new() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let root = std::env::var_os(ASSET_ROOT_VAR)
                .map(std::path::PathBuf::from)
                .unwrap_or_else(|| std::path::Path::new("./").join("assets"));
            Self { root }
        }
        #[cfg(target_arch = "wasm32")]
        {
            Self {}
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_root(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Fetch the raw bytes of `file_name`.
    pub fn load_binary(&self, file_name: &str) -> Task<anyhow::Result<Vec<u8>>> {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let path = self.root.join(file_name);
            task(async move {
                tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))
            })
        }
        #[cfg(target_arch = "wasm32")]
        {
            let file_name = file_name.to_string();
            task(async move {
                let url = format_url(&file_name)?;
                let response = reqwest::get(url.clone())
                    .await
                    .and_then(|response| response.error_for_status())
                    .with_context(|| format!("Failed to fetch {url}"))?;
                Ok(response.bytes().await?.to_vec())
            })
        }
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader for FileLoader {
    fn load_texture(&self, path: &str) -> Task<anyhow::Result<TextureData>> {
        let bytes = self.load_binary(path);
        let label = path.to_string();
        task(async move {
            let bytes = bytes.await?;
            texture::decode_texture(&bytes, &label)
        })
    }

    fn load_model(&self, path: &str, decoder: &DecoderConfig) -> Task<anyhow::Result<SceneNode>> {
        let loader = self.clone();
        let path = path.to_string();
        let decoder = decoder.clone();
        task(async move {
            let bytes = loader.load_binary(&path).await?;
            let document = model::parse(&bytes, &path)?;
            let mut external = Vec::new();
            for uri in model::external_buffers(&document)? {
                external.push(loader.load_binary(&relative_to(&path, &uri)).await?);
            }
            let buffers = model::resolve_buffers(&document, external)?;
            let decoded = loader
                .decode_primitives(&document, &buffers, &decoder, &path)
                .await?;
            model::import(&document, &buffers, &decoded, &path)
        })
    }
}

impl FileLoader {
    #[cfg(not(target_arch = "wasm32"))]
    async fn decode_primitives(
        &self,
        document: &gltf::Gltf,
        buffers: &[Vec<u8>],
        config: &DecoderConfig,
        label: &str,
    ) -> anyhow::Result<model::Decoded> {
        let compressed = model::compressed_primitives(document)?;
        let mut decoded = model::Decoded::new();
        if compressed.is_empty() {
            return Ok(decoded);
        }
        let decoder = draco::DracoDecoder::from_config(&self.root, config);
        log::info!(
            "Decoding {} compressed primitives of {label} with {}",
            compressed.len(),
            decoder.executable().display()
        );
        for primitive in compressed {
            let bytes = model::view_bytes(document, buffers, primitive.buffer_view)?;
            let geometry = decoder.decode(bytes, label).await?;
            decoded.insert((primitive.mesh, primitive.primitive), Arc::new(geometry));
        }
        Ok(decoded)
    }

    #[cfg(target_arch = "wasm32")]
    async fn decode_primitives(
        &self,
        document: &gltf::Gltf,
        _buffers: &[Vec<u8>],
        config: &DecoderConfig,
        label: &str,
    ) -> anyhow::Result<model::Decoded> {
        if model::compressed_primitives(document)?.is_empty() {
            return Ok(model::Decoded::new());
        }
        bail!(
            "{label} uses {}; the decoder at {} cannot run in the browser",
            model::DRACO_EXTENSION,
            config.path
        )
    }
}

/// Resolve `uri` against the directory containing `path`.
pub fn relative_to(path: &str, uri: &str) -> String {
    match path.rfind('/') {
        Some(idx) => format!("{}/{}", &path[..idx], uri),
        None => uri.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("No browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("Page origin is not readable"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_resolve_next_to_model() {
        assert_eq!(relative_to("models/statue.gltf", "statue.bin"), "models/statue.bin");
        assert_eq!(relative_to("statue.gltf", "statue.bin"), "statue.bin");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn missing_file_names_path() {
        let loader = FileLoader::with_root(std::env::temp_dir().join("flow-orbit-missing"));
        let err = loader
            .load_texture("textures/nope.png")
            .await
            .expect_err("file does not exist");
        assert!(format!("{err:#}").contains("nope.png"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn loads_png_from_root() {
        let root = std::env::temp_dir().join(format!("flow-orbit-assets-{}", std::process::id()));
        std::fs::create_dir_all(root.join("textures")).unwrap();
        let image = image::RgbaImage::from_pixel(2, 3, image::Rgba([10, 20, 30, 255]));
        image.save(root.join("textures/tile.png")).unwrap();

        let data = FileLoader::with_root(&root)
            .load_texture("textures/tile.png")
            .await
            .unwrap();
        assert_eq!((data.width, data.height), (2, 3));
        assert_eq!(&data.rgba[..4], &[10, 20, 30, 255]);
        std::fs::remove_dir_all(root).ok();
    }

    #[cfg(unix)]
    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        json.resize(json.len().next_multiple_of(4), b' ');
        let mut bin = bin.to_vec();
        bin.resize(bin.len().next_multiple_of(4), 0);
        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn decodes_compressed_model_with_configured_runtime() {
        use std::os::unix::fs::PermissionsExt;

        let root = std::env::temp_dir().join(format!("flow-orbit-draco-{}", std::process::id()));
        std::fs::create_dir_all(root.join("draco")).unwrap();
        std::fs::create_dir_all(root.join("models")).unwrap();

        // Stand-in runtime: checks the payload it is handed and emits a triangle.
        let script = root.join("draco").join(draco::DECODER_BIN);
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             grep -q DRACO \"$2\" || exit 3\n\
             printf 'v 0 0 0\\nv 1 0 0\\nv 0 1 0\\nf 1 2 3\\n' > \"$4\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let json = r#"{
            "asset": {"version": "2.0"},
            "extensionsUsed": ["KHR_draco_mesh_compression"],
            "extensionsRequired": ["KHR_draco_mesh_compression"],
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "statue", "mesh": 0}],
            "meshes": [{"primitives": [{
                "attributes": {"POSITION": 0},
                "extensions": {"KHR_draco_mesh_compression": {"bufferView": 0, "attributes": {"POSITION": 0}}}
            }]}],
            "buffers": [{"byteLength": 8}],
            "bufferViews": [{"buffer": 0, "byteLength": 8}],
            "accessors": [{"componentType": 5126, "count": 3, "type": "VEC3",
                           "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}]
        }"#;
        std::fs::write(root.join("models/statue.glb"), glb(json, b"DRACOxyz")).unwrap();

        let loader = FileLoader::with_root(&root);
        let model = loader
            .load_model("models/statue.glb", &DecoderConfig::new("draco/"))
            .await
            .unwrap();
        assert_eq!(model.mesh_count(), 1);
        let crate::data_structures::scene_graph::NodeKind::Mesh(mesh) =
            &model.children[0].children[0].kind
        else {
            panic!("expected a mesh child");
        };
        assert_eq!(mesh.geometry.vertices.len(), 3);
        assert_eq!(mesh.geometry.triangle_count(), 1);

        let err = loader
            .load_model("models/statue.glb", &DecoderConfig::new("elsewhere/"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("elsewhere"));
        std::fs::remove_dir_all(root).ok();
    }
}
