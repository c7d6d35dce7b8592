// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # memory-zone
//!
//! Memory capacities the improver must respect.
//!
//! - [`MemoryBudget`] — a byte capacity with human-readable parsing
//!   (`"512M"`, `"16G"`, ...), serialised as a string.
//! - [`AvailableMemDesc`] — the read-only availability table mapping every
//!   (machine, zone) pair to its capacity, loaded from TOML.
//! - [`MemZoneKey`] — the (machine, zone) identifier.
//!
//! # Example
//! ```
//! use memory_zone::{AvailableMemDesc, MemZoneKey};
//!
//! let amd = AvailableMemDesc::from_toml("[[machine]]\nzones = [\"1G\", \"4G\"]\n").unwrap();
//! assert_eq!(amd.available_bytes(MemZoneKey::new(0, 1)), Some(4 << 30));
//! ```

mod available;
mod budget;
mod error;

pub use available::{AvailableMemDesc, MachineMemDesc, MemZoneKey};
pub use budget::MemoryBudget;
pub use error::MemZoneError;
