//! Decoding of `KHR_draco_mesh_compression` payloads.
//!
//! Decompression is delegated to the `draco_decoder` executable found in the
//! directory named by [`DecoderConfig`]. It is fed the compressed buffer view
//! and writes a Wavefront OBJ, which is read back with `tobj`.

use std::{
    io::{BufReader, Cursor},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, bail};

use crate::{
    data_structures::geometry::{Geometry, ModelVertex},
    resources::{DecoderConfig, model},
};

pub const DECODER_BIN: &str = "draco_decoder";

/// Location of the decoder executable below the asset root.
pub fn decoder_executable(root: &Path, config: &DecoderConfig) -> PathBuf {
    root.join(config.path.trim_end_matches('/'))
        .join(format!("{DECODER_BIN}{}", std::env::consts::EXE_SUFFIX))
}

#[derive(Clone, Debug)]
pub struct DracoDecoder {
    executable: PathBuf,
}

impl DracoDecoder {
    pub fn new(executable: PathBuf) -> Self {
        Self { executable }
    }

    pub fn from_config(root: &Path, config: &DecoderConfig) -> Self {
        Self::new(decoder_executable(root, config))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Decompress one primitive. `label` only shows up in errors and logs.
    pub async fn decode(&self, compressed: &[u8], label: &str) -> anyhow::Result<Geometry> {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let stem = format!(
            "flow-orbit-draco-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let scratch = std::env::temp_dir();
        let input = scratch.join(format!("{stem}.drc"));
        let output = scratch.join(format!("{stem}.obj"));

        tokio::fs::write(&input, compressed)
            .await
            .with_context(|| format!("Failed to stage {label} for decoding"))?;
        let result = self.run(&input, &output, label).await;
        tokio::fs::remove_file(&input).await.ok();
        tokio::fs::remove_file(&output).await.ok();
        result
    }

    async fn run(&self, input: &Path, output: &Path, label: &str) -> anyhow::Result<Geometry> {
        log::debug!("Decoding {label} with {}", self.executable.display());
        let result = tokio::process::Command::new(&self.executable)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .output()
            .await
            .with_context(|| {
                format!("Mesh decoder {} could not be started", self.executable.display())
            })?;
        if !result.status.success() {
            bail!(
                "Mesh decoder {} failed on {label} ({}): {}",
                self.executable.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }
        let obj = tokio::fs::read(output)
            .await
            .with_context(|| format!("Mesh decoder produced no output for {label}"))?;
        geometry_from_obj(&obj, label)
    }
}

/// Merge every object of an OBJ file into one indexed triangle list.
pub fn geometry_from_obj(bytes: &[u8], label: &str) -> anyhow::Result<Geometry> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    let (models, _) = tobj::load_obj_buf(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_| Err(tobj::LoadError::OpenFileFailed),
    )
    .with_context(|| format!("Decoded mesh of {label} is not valid OBJ"))?;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut has_normals = true;
    for m in &models {
        let base = vertices.len() as u32;
        let count = m.mesh.positions.len() / 3;
        has_normals &= m.mesh.normals.len() == count * 3;
        vertices.extend((0..count).map(|i| ModelVertex {
            position: [
                m.mesh.positions[i * 3],
                m.mesh.positions[i * 3 + 1],
                m.mesh.positions[i * 3 + 2],
            ],
            normal: [
                m.mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                m.mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
            tex_coords: [
                m.mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                m.mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
        }));
        indices.extend(m.mesh.indices.iter().map(|i| base + i));
    }
    if indices.is_empty() {
        bail!("Decoded mesh of {label} has no triangles");
    }
    if !has_normals {
        model::compute_normals(&mut vertices, &indices);
    }
    Ok(Geometry::new(vertices, indices))
}
