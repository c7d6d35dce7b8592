// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Register descriptors: the static metadata of one buffer class.
//!
//! A [`RegstDescProto`] describes every register instance a producer task
//! allocates for one output: which tasks consume it, which memory it lives
//! in, the logical blobs it carries and how many instances exist. Blob data
//! is **not** stored here, only names and shapes. The per-register byte
//! size is derived from the blob shapes.

use crate::{RegstDescId, TaskId};

/// Size in bytes of one blob element. All blobs are `f32`.
pub const ELEM_BYTES: usize = std::mem::size_of::<f32>();

/// Where the registers of a descriptor are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryCase {
    /// Pageable host memory.
    HostMem,
    /// Memory of the accelerator with the given local device id.
    DeviceMem { device_id: i64 },
}

impl MemoryCase {
    /// Returns the memory zone id of this case on its machine.
    ///
    /// Device zones are numbered by device id; host memory is the zone
    /// right after the last device, i.e. `device_num_per_machine`.
    pub fn memory_zone_id(&self, device_num_per_machine: i64) -> i64 {
        match self {
            Self::DeviceMem { device_id } => *device_id,
            Self::HostMem => device_num_per_machine,
        }
    }

    /// Returns a short human-readable label.
    pub fn label(&self) -> String {
        match self {
            Self::HostMem => "host".to_string(),
            Self::DeviceMem { device_id } => format!("device:{device_id}"),
        }
    }
}

/// Shape of one logical blob carried by a register.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BlobDesc {
    /// Logical blob name, unique within the plan (e.g. `"fc1/weight"`).
    pub lbn: String,
    /// Blob dimensions.
    pub shape: Vec<usize>,
}

impl BlobDesc {
    pub fn new(lbn: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            lbn: lbn.into(),
            shape,
        }
    }

    /// Number of elements in the blob.
    pub fn elem_cnt(&self) -> usize {
        self.shape.iter().product()
    }

    /// Size of the blob in bytes.
    pub fn byte_size(&self) -> usize {
        self.elem_cnt() * ELEM_BYTES
    }
}

fn default_min_register_num() -> u64 {
    1
}

/// Static metadata for one register class.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegstDescProto {
    /// Plan-wide unique descriptor id.
    pub regst_desc_id: RegstDescId,
    /// Task that produces (and owns) the registers.
    pub producer_task_id: TaskId,
    /// Tasks that read every produced register.
    #[serde(default)]
    pub consumer_task_ids: Vec<TaskId>,
    /// Memory the registers are allocated in.
    pub mem_case: MemoryCase,
    /// Logical blobs carried by each register.
    #[serde(default)]
    pub blobs: Vec<BlobDesc>,
    /// Lower bound on the number of register instances.
    #[serde(default = "default_min_register_num")]
    pub min_register_num: u64,
    /// Upper bound on the number of register instances (`None` = unbounded).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_register_num: Option<u64>,
    /// Number of register instances. `0` means "use the minimum".
    #[serde(default)]
    pub register_num: u64,
}

impl RegstDescProto {
    /// Creates a descriptor with a single register instance.
    pub fn new(
        regst_desc_id: RegstDescId,
        producer_task_id: TaskId,
        consumer_task_ids: Vec<TaskId>,
        mem_case: MemoryCase,
        blobs: Vec<BlobDesc>,
    ) -> Self {
        Self {
            regst_desc_id,
            producer_task_id,
            consumer_task_ids,
            mem_case,
            blobs,
            min_register_num: 1,
            max_register_num: None,
            register_num: 1,
        }
    }

    /// Bytes occupied by one register instance.
    pub fn byte_size_per_register(&self) -> u64 {
        self.blobs.iter().map(|b| b.byte_size() as u64).sum()
    }

    /// Bytes occupied by all register instances.
    pub fn total_byte_size(&self) -> u64 {
        self.byte_size_per_register() * self.effective_register_num()
    }

    /// The register count the runtime will allocate.
    pub fn effective_register_num(&self) -> u64 {
        self.clamp_register_num(self.register_num)
    }

    /// Clamps a candidate register count into `[min, max]`.
    pub fn clamp_register_num(&self, n: u64) -> u64 {
        let n = n.max(self.min_register_num);
        match self.max_register_num {
            Some(max) => n.min(max),
            None => n,
        }
    }

    /// Returns `true` if a blob with this logical name is carried.
    pub fn has_lbn(&self, lbn: &str) -> bool {
        self.blobs.iter().any(|b| b.lbn == lbn)
    }

    /// One-line description for inspection output.
    pub fn summary(&self) -> String {
        format!(
            "regst_desc {:>4}  producer {:>4}  consumers {:?}  {:<10} {:>10} B x {}",
            self.regst_desc_id,
            self.producer_task_id,
            self.consumer_task_ids,
            self.mem_case.label(),
            self.byte_size_per_register(),
            self.effective_register_num(),
        )
    }
}
