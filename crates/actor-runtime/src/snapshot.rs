// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Read access to saved model snapshots.
//!
//! Kernels initialise their weights from a snapshot when one carries the
//! blob, and from their random seed otherwise. [`SafeTensorsSnapshot`]
//! memory-maps a `.safetensors` file and decodes tensors on demand;
//! [`MemSnapshot`] holds blobs in memory.

use crate::ActorError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source of saved blob values.
pub trait SnapshotReader: Send + Sync {
    /// Copies the saved value of `lbn` into `dest`.
    ///
    /// Returns `Ok(false)` if the snapshot does not carry the blob.
    fn read_blob(&self, lbn: &str, dest: &mut [f32]) -> Result<bool, ActorError>;
}

/// A snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemSnapshot {
    blobs: HashMap<String, Vec<f32>>,
}

impl MemSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lbn: impl Into<String>, data: Vec<f32>) {
        self.blobs.insert(lbn.into(), data);
    }
}

impl SnapshotReader for MemSnapshot {
    fn read_blob(&self, lbn: &str, dest: &mut [f32]) -> Result<bool, ActorError> {
        let Some(data) = self.blobs.get(lbn) else {
            return Ok(false);
        };
        if data.len() != dest.len() {
            return Err(ActorError::Snapshot {
                path: "<memory>".into(),
                detail: format!(
                    "blob '{lbn}' has {} elements, register expects {}",
                    data.len(),
                    dest.len()
                ),
            });
        }
        dest.copy_from_slice(data);
        Ok(true)
    }
}

/// A memory-mapped SafeTensors snapshot. Tensor names are logical blob
/// names; only `F32` tensors are accepted.
pub struct SafeTensorsSnapshot {
    path: PathBuf,
    mmap: memmap2::Mmap,
}

impl SafeTensorsSnapshot {
    /// Maps the file and checks that its header parses.
    pub fn open(path: &Path) -> Result<Self, ActorError> {
        let snapshot_err = |detail: String| ActorError::Snapshot {
            path: path.display().to_string(),
            detail,
        };
        let file = std::fs::File::open(path).map_err(|e| snapshot_err(format!("cannot open: {e}")))?;
        // SAFETY: the file is opened read-only and is not modified while mapped.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| snapshot_err(format!("mmap failed: {e}")))?;
        let num_tensors = safetensors::SafeTensors::deserialize(&mmap)
            .map_err(|e| snapshot_err(format!("SafeTensors parse error: {e}")))?
            .names()
            .len();
        tracing::info!(
            "snapshot: mmap'd {} ({} tensors, {:.2} MB)",
            path.display(),
            num_tensors,
            mmap.len() as f64 / (1024.0 * 1024.0),
        );
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, detail: String) -> ActorError {
        ActorError::Snapshot {
            path: self.path.display().to_string(),
            detail,
        }
    }
}

impl SnapshotReader for SafeTensorsSnapshot {
    fn read_blob(&self, lbn: &str, dest: &mut [f32]) -> Result<bool, ActorError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)
            .map_err(|e| self.err(format!("SafeTensors parse error: {e}")))?;
        let view = match st.tensor(lbn) {
            Ok(view) => view,
            Err(safetensors::SafeTensorError::TensorNotFound(_)) => return Ok(false),
            Err(e) => return Err(self.err(format!("tensor '{lbn}': {e}"))),
        };
        if view.dtype() != safetensors::Dtype::F32 {
            return Err(self.err(format!("tensor '{lbn}' is {:?}, expected F32", view.dtype())));
        }
        let bytes = view.data();
        if bytes.len() != dest.len() * std::mem::size_of::<f32>() {
            return Err(self.err(format!(
                "tensor '{lbn}' has {} bytes, register expects {}",
                bytes.len(),
                dest.len() * std::mem::size_of::<f32>()
            )));
        }
        for (d, chunk) in dest.iter_mut().zip(bytes.chunks_exact(4)) {
            *d = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(true)
    }
}

impl std::fmt::Debug for SafeTensorsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeTensorsSnapshot")
            .field("path", &self.path)
            .field("bytes", &self.mmap.len())
            .finish()
    }
}
