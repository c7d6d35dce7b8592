// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The kernel interface and a few reference kernels.
//!
//! Actors own kernels but never look inside them. A kernel reads and
//! writes blobs through a [`BlobResolver`] keyed by logical blob name;
//! which registers the resolver searches is up to the calling actor.
//!
//! | op type | blobs | forward |
//! |---|---|---|
//! | `synthetic_input` | `out` | deterministic data derived from the piece id |
//! | `affine` | `in`, `weight`, `bias`, `out` | `out[i] = in[i] × weight[i % W] + bias[i % B]` |
//! | `relu` | `in`, `out` | `out[i] = max(in[i], 0)` |
//! | `square_sum` | `in`, `out` | `out[0] = Σ in[i]²` |

use crate::{ActorError, Blob, SnapshotReader};
use plan_ir::{KernelConf, ParallelContext, PieceId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Per-call context handed to kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelCtx {
    /// The task's random seed, when it has one.
    pub random_seed: Option<i64>,
    /// Piece being computed (`0` during weight initialisation).
    pub piece_id: PieceId,
}

/// Blob lookup by logical blob name.
pub trait BlobResolver {
    fn blob(&self, lbn: &str) -> Option<&Blob>;
    /// `None` if the blob is absent or not writeable by the caller.
    fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob>;
}

/// A unit of computation run by an actor.
pub trait Kernel: Send {
    fn name(&self) -> &str;

    /// Fills weight blobs before the first act.
    fn init_model_and_model_tmp(
        &self,
        _ctx: &KernelCtx,
        _parallel_ctx: &ParallelContext,
        _snapshot: Option<&dyn SnapshotReader>,
        _resolver: &mut dyn BlobResolver,
    ) -> Result<(), ActorError> {
        Ok(())
    }

    /// Computes one piece.
    fn forward(&self, ctx: &KernelCtx, resolver: &mut dyn BlobResolver) -> Result<(), ActorError>;
}

/// Builds a kernel from its configuration.
pub type KernelBuilder = fn(&KernelConf) -> Result<Box<dyn Kernel>, ActorError>;

/// Maps op types to kernel builders.
#[derive(Clone)]
pub struct KernelRegistry {
    builders: HashMap<String, KernelBuilder>,
}

impl KernelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// A registry with the reference kernels.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register("synthetic_input", SyntheticInputKernel::build);
        r.register("affine", AffineKernel::build);
        r.register("relu", ReluKernel::build);
        r.register("square_sum", SquareSumKernel::build);
        r
    }

    /// Registers a builder, returning the one it replaces.
    pub fn register(&mut self, op_type: &str, builder: KernelBuilder) -> Option<KernelBuilder> {
        self.builders.insert(op_type.to_string(), builder)
    }

    /// Builds every kernel of a task's exec sequence.
    pub fn build_all(&self, confs: &[KernelConf]) -> Result<Vec<Box<dyn Kernel>>, ActorError> {
        confs
            .iter()
            .map(|conf| {
                let builder = self
                    .builders
                    .get(&conf.op_type)
                    .ok_or_else(|| ActorError::UnknownKernel(conf.op_type.clone()))?;
                builder(conf)
            })
            .collect()
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.builders.keys().collect();
        names.sort();
        f.debug_struct("KernelRegistry").field("op_types", &names).finish()
    }
}

// ── Helpers ────────────────────────────────────────────────────

fn bound_lbn(conf: &KernelConf, bn: &str) -> Result<String, ActorError> {
    conf.lbn4bn_in_op(bn)
        .map(str::to_string)
        .ok_or_else(|| ActorError::Kernel {
            kernel: conf.op_type.clone(),
            detail: format!("blob name '{bn}' is not bound"),
        })
}

fn read(resolver: &dyn BlobResolver, lbn: &str) -> Result<Vec<f32>, ActorError> {
    resolver
        .blob(lbn)
        .map(|b| b.as_slice().to_vec())
        .ok_or_else(|| ActorError::MissingBlob { lbn: lbn.into() })
}

fn write<'a>(resolver: &'a mut dyn BlobResolver, lbn: &str) -> Result<&'a mut Blob, ActorError> {
    resolver
        .blob_mut(lbn)
        .ok_or_else(|| ActorError::MissingBlob { lbn: lbn.into() })
}

fn check_len(kernel: &str, what: &str, expected: usize, got: usize) -> Result<(), ActorError> {
    if expected == got {
        Ok(())
    } else {
        Err(ActorError::Kernel {
            kernel: kernel.into(),
            detail: format!("{what} has {got} elements, expected {expected}"),
        })
    }
}

/// Seed of one weight blob: distinct per blob and per replica.
fn blob_seed(seed: i64, parallel_ctx: &ParallelContext, lbn: &str) -> u64 {
    let name_hash = lbn
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100_0000_01b3));
    (seed as u64) ^ name_hash ^ (parallel_ctx.parallel_id as u64).rotate_left(32)
}

// ── Reference kernels ──────────────────────────────────────────

/// Writes deterministic data derived from the piece id.
#[derive(Debug)]
pub struct SyntheticInputKernel {
    out: String,
}

impl SyntheticInputKernel {
    fn build(conf: &KernelConf) -> Result<Box<dyn Kernel>, ActorError> {
        Ok(Box::new(Self {
            out: bound_lbn(conf, "out")?,
        }))
    }
}

impl Kernel for SyntheticInputKernel {
    fn name(&self) -> &str {
        "synthetic_input"
    }

    fn forward(&self, ctx: &KernelCtx, resolver: &mut dyn BlobResolver) -> Result<(), ActorError> {
        let out = write(resolver, &self.out)?;
        for (i, v) in out.as_mut_slice().iter_mut().enumerate() {
            *v = ((ctx.piece_id as usize * 31 + i) % 17) as f32 / 17.0 - 0.5;
        }
        Ok(())
    }
}

/// Element-wise affine map with broadcast weight and bias.
#[derive(Debug)]
pub struct AffineKernel {
    input: String,
    weight: String,
    bias: String,
    out: String,
}

impl AffineKernel {
    fn build(conf: &KernelConf) -> Result<Box<dyn Kernel>, ActorError> {
        Ok(Box::new(Self {
            input: bound_lbn(conf, "in")?,
            weight: bound_lbn(conf, "weight")?,
            bias: bound_lbn(conf, "bias")?,
            out: bound_lbn(conf, "out")?,
        }))
    }
}

impl Kernel for AffineKernel {
    fn name(&self) -> &str {
        "affine"
    }

    fn init_model_and_model_tmp(
        &self,
        ctx: &KernelCtx,
        parallel_ctx: &ParallelContext,
        snapshot: Option<&dyn SnapshotReader>,
        resolver: &mut dyn BlobResolver,
    ) -> Result<(), ActorError> {
        for lbn in [&self.weight, &self.bias] {
            let blob = write(resolver, lbn)?;
            if let Some(snapshot) = snapshot {
                if snapshot.read_blob(lbn, blob.as_mut_slice())? {
                    tracing::debug!("affine: '{lbn}' restored from snapshot");
                    continue;
                }
            }
            if lbn == &self.bias {
                blob.as_mut_slice().fill(0.0);
                continue;
            }
            let seed = ctx.random_seed.ok_or_else(|| ActorError::Kernel {
                kernel: self.name().into(),
                detail: format!("no snapshot entry and no random seed for '{lbn}'"),
            })?;
            let mut rng = StdRng::seed_from_u64(blob_seed(seed, parallel_ctx, lbn));
            let scale = 1.0 / (blob.elem_cnt().max(1) as f32).sqrt();
            for v in blob.as_mut_slice() {
                *v = rng.gen_range(-scale..=scale);
            }
        }
        Ok(())
    }

    fn forward(&self, _ctx: &KernelCtx, resolver: &mut dyn BlobResolver) -> Result<(), ActorError> {
        let x = read(resolver, &self.input)?;
        let w = read(resolver, &self.weight)?;
        let b = read(resolver, &self.bias)?;
        if w.is_empty() || b.is_empty() {
            return Err(ActorError::Kernel {
                kernel: self.name().into(),
                detail: "weight and bias must be non-empty".into(),
            });
        }
        let out = write(resolver, &self.out)?;
        check_len(self.name(), "out", x.len(), out.elem_cnt())?;
        for (i, (o, xi)) in out.as_mut_slice().iter_mut().zip(&x).enumerate() {
            *o = xi * w[i % w.len()] + b[i % b.len()];
        }
        Ok(())
    }
}

/// Rectified linear unit.
#[derive(Debug)]
pub struct ReluKernel {
    input: String,
    out: String,
}

impl ReluKernel {
    fn build(conf: &KernelConf) -> Result<Box<dyn Kernel>, ActorError> {
        Ok(Box::new(Self {
            input: bound_lbn(conf, "in")?,
            out: bound_lbn(conf, "out")?,
        }))
    }
}

impl Kernel for ReluKernel {
    fn name(&self) -> &str {
        "relu"
    }

    fn forward(&self, _ctx: &KernelCtx, resolver: &mut dyn BlobResolver) -> Result<(), ActorError> {
        let x = read(resolver, &self.input)?;
        let out = write(resolver, &self.out)?;
        check_len(self.name(), "out", x.len(), out.elem_cnt())?;
        for (o, xi) in out.as_mut_slice().iter_mut().zip(&x) {
            *o = xi.max(0.0);
        }
        Ok(())
    }
}

/// Sum of squares into the first element of `out`.
#[derive(Debug)]
pub struct SquareSumKernel {
    input: String,
    out: String,
}

impl SquareSumKernel {
    fn build(conf: &KernelConf) -> Result<Box<dyn Kernel>, ActorError> {
        Ok(Box::new(Self {
            input: bound_lbn(conf, "in")?,
            out: bound_lbn(conf, "out")?,
        }))
    }
}

impl Kernel for SquareSumKernel {
    fn name(&self) -> &str {
        "square_sum"
    }

    fn forward(&self, _ctx: &KernelCtx, resolver: &mut dyn BlobResolver) -> Result<(), ActorError> {
        let x = read(resolver, &self.input)?;
        let out = write(resolver, &self.out)?;
        let first = out.as_mut_slice().first_mut().ok_or_else(|| ActorError::Kernel {
            kernel: "square_sum".into(),
            detail: "out is empty".into(),
        })?;
        *first = x.iter().map(|v| v * v).sum();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlobMap, MemSnapshot};

    struct MapResolver(BlobMap);

    impl BlobResolver for MapResolver {
        fn blob(&self, lbn: &str) -> Option<&Blob> {
            self.0.get(lbn)
        }
        fn blob_mut(&mut self, lbn: &str) -> Option<&mut Blob> {
            self.0.get_mut(lbn)
        }
    }

    fn resolver(blobs: &[(&str, Vec<f32>)]) -> MapResolver {
        MapResolver(
            blobs
                .iter()
                .map(|(n, v)| (n.to_string(), Blob::from_vec(vec![v.len()], v.clone()).unwrap()))
                .collect(),
        )
    }

    fn affine_conf() -> KernelConf {
        KernelConf::new("affine")
            .with_bn("in", "x")
            .with_bn("weight", "w")
            .with_bn("bias", "b")
            .with_bn("out", "y")
    }

    #[test]
    fn test_affine_forward() {
        let k = KernelRegistry::with_defaults()
            .build_all(&[affine_conf()])
            .unwrap()
            .remove(0);
        let mut r = resolver(&[
            ("x", vec![1.0, 2.0, 3.0, 4.0]),
            ("w", vec![2.0, -1.0]),
            ("b", vec![0.5]),
            ("y", vec![0.0; 4]),
        ]);
        k.forward(&KernelCtx::default(), &mut r).unwrap();
        assert_eq!(r.0["y"].as_slice(), &[2.5, -1.5, 6.5, -3.5]);
    }

    #[test]
    fn test_affine_init_is_seeded() {
        let k = KernelRegistry::with_defaults()
            .build_all(&[affine_conf()])
            .unwrap()
            .remove(0);
        let ctx = KernelCtx {
            random_seed: Some(7),
            piece_id: 0,
        };
        let pc = ParallelContext::default();
        let mut a = resolver(&[("w", vec![0.0; 8]), ("b", vec![9.0; 2])]);
        let mut b = resolver(&[("w", vec![0.0; 8]), ("b", vec![9.0; 2])]);
        k.init_model_and_model_tmp(&ctx, &pc, None, &mut a).unwrap();
        k.init_model_and_model_tmp(&ctx, &pc, None, &mut b).unwrap();
        assert_eq!(a.0["w"], b.0["w"]);
        assert!(a.0["w"].as_slice().iter().any(|&v| v != 0.0));
        assert_eq!(a.0["b"].as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_affine_init_prefers_snapshot() {
        let k = KernelRegistry::with_defaults()
            .build_all(&[affine_conf()])
            .unwrap()
            .remove(0);
        let mut snap = MemSnapshot::new();
        snap.insert("w", vec![1.0, 2.0]);
        let mut r = resolver(&[("w", vec![0.0; 2]), ("b", vec![0.0])]);
        let snap: &dyn SnapshotReader = &snap;
        k.init_model_and_model_tmp(&KernelCtx::default(), &ParallelContext::default(), Some(snap), &mut r)
            .unwrap();
        assert_eq!(r.0["w"].as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_missing_blob() {
        let k = KernelRegistry::with_defaults()
            .build_all(&[KernelConf::new("relu").with_bn("in", "x").with_bn("out", "y")])
            .unwrap()
            .remove(0);
        let mut r = resolver(&[("x", vec![-1.0, 1.0])]);
        let err = k.forward(&KernelCtx::default(), &mut r).unwrap_err();
        assert!(matches!(err, ActorError::MissingBlob { ref lbn } if lbn == "y"));
    }

    #[test]
    fn test_square_sum_and_synthetic_input() {
        let kernels = KernelRegistry::with_defaults()
            .build_all(&[
                KernelConf::new("synthetic_input").with_bn("out", "x"),
                KernelConf::new("square_sum").with_bn("in", "x").with_bn("out", "loss"),
            ])
            .unwrap();
        let mut r = resolver(&[("x", vec![0.0; 3]), ("loss", vec![0.0])]);
        let ctx = KernelCtx {
            random_seed: None,
            piece_id: 1,
        };
        for k in &kernels {
            k.forward(&ctx, &mut r).unwrap();
        }
        let expected: f32 = r.0["x"].as_slice().iter().map(|v| v * v).sum();
        assert_eq!(r.0["loss"].as_slice()[0], expected);
    }

    #[test]
    fn test_unknown_op_and_unbound_blob() {
        let reg = KernelRegistry::with_defaults();
        assert!(matches!(
            reg.build_all(&[KernelConf::new("conv9d")]),
            Err(ActorError::UnknownKernel(_))
        ));
        assert!(matches!(
            reg.build_all(&[KernelConf::new("relu").with_bn("in", "x")]),
            Err(ActorError::Kernel { .. })
        ));
    }
}
