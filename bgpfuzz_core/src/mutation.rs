use crate::fields::{FieldKind, IpPrefix, LeafValue};
use crate::tree::{FieldError, FieldTree, NodeId};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand_core::RngCore;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Step size of the multiplicative-weights update.
pub const DEFAULT_LEARNING_RATE: f64 = 0.05;
/// Upper bound on the length of random raw overrides.
pub const MAX_RAW_LEN: usize = 64;
/// Upper bound on the length of random prefixes and suffixes.
pub const MAX_WRAPPER_LEN: usize = 8;
/// Floor applied after renormalization so no operator ever becomes unreachable.
const MIN_WEIGHT: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    #[error("expected {expected} weights, got {found}")]
    Length { expected: usize, found: usize },

    #[error("weight {index} is {value}; weights must be finite and positive")]
    NonPositive { index: usize, value: f64 },

    #[error("operator {index} out of range for {count} weights")]
    OutOfRange { index: usize, count: usize },
}

/// Per-node probability distribution over the node's mutation operators.
///
/// Entries are always positive and sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationWeights {
    weights: Vec<f64>,
}

impl MutationWeights {
    pub fn uniform(count: usize) -> Self {
        let share = if count == 0 { 0.0 } else { 1.0 / count as f64 };
        Self {
            weights: vec![share; count],
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Samples an operator index from the categorical distribution.
    pub fn select(&self, rng: &mut dyn RngCore) -> usize {
        match WeightedIndex::<f64>::new(&self.weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.random_range(0..self.weights.len().max(1)),
        }
    }

    /// Multiplicative-weights update: scales the chosen entry by `e^eta` on a
    /// positive outcome and `e^-eta` otherwise, then renormalizes.
    pub fn reward(&mut self, index: usize, positive: bool, eta: f64) -> Result<(), WeightError> {
        let count = self.weights.len();
        let weight = self
            .weights
            .get_mut(index)
            .ok_or(WeightError::OutOfRange { index, count })?;
        *weight *= if positive { eta.exp() } else { (-eta).exp() };
        self.normalize();
        Ok(())
    }

    /// Replaces the whole vector. Values are normalized on input.
    pub fn set(&mut self, values: &[f64]) -> Result<(), WeightError> {
        if values.len() != self.weights.len() {
            return Err(WeightError::Length {
                expected: self.weights.len(),
                found: values.len(),
            });
        }
        if let Some((index, value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(WeightError::NonPositive {
                index,
                value: *value,
            });
        }
        self.weights = values.to_vec();
        self.normalize();
        Ok(())
    }

    fn normalize(&mut self) {
        let sum: f64 = self.weights.iter().sum();
        if !sum.is_finite() || sum <= 0.0 {
            *self = Self::uniform(self.weights.len());
            return;
        }
        self.weights.iter_mut().for_each(|w| *w = (*w / sum).max(MIN_WEIGHT));
        let sum: f64 = self.weights.iter().sum();
        self.weights.iter_mut().for_each(|w| *w /= sum);
    }
}

/// Values produced by a mutation generator, handed to the paired setter.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationArgs {
    Bytes(Vec<u8>),
    Uint(u128),
    Bits(Vec<bool>),
    Addr(IpAddr),
    Prefix(IpPrefix),
    Index(usize),
}

pub type Generator = fn(&FieldTree, NodeId, &mut dyn RngCore) -> Result<MutationArgs, FieldError>;
pub type Setter = fn(&mut FieldTree, NodeId, MutationArgs) -> Result<(), FieldError>;

/// A registered mutation: a random value generator and the setter that
/// consumes its output.
#[derive(Debug, Clone, Copy)]
pub struct MutationOp {
    pub name: &'static str,
    pub generate: Generator,
    pub apply: Setter,
}

// Base operators, shared by every registry as its first entries.

const SET_RAW: MutationOp = MutationOp {
    name: "set_raw",
    generate: gen_raw,
    apply: apply_raw,
};
const SET_PREFIX: MutationOp = MutationOp {
    name: "set_prefix",
    generate: gen_wrapper,
    apply: apply_prefix,
};
const SET_SUFFIX: MutationOp = MutationOp {
    name: "set_suffix",
    generate: gen_wrapper,
    apply: apply_suffix,
};

const UINT_RANDOM: MutationOp = MutationOp {
    name: "uint_random",
    generate: gen_uint_random,
    apply: apply_uint,
};
const UINT_BOUNDARY: MutationOp = MutationOp {
    name: "uint_boundary",
    generate: gen_uint_boundary,
    apply: apply_uint,
};
const BYTES_RANDOM: MutationOp = MutationOp {
    name: "bytes_random",
    generate: gen_bytes_random,
    apply: apply_bytes,
};
const BYTES_BIT_FLIP: MutationOp = MutationOp {
    name: "bytes_bit_flip",
    generate: gen_bytes_bit_flip,
    apply: apply_bytes,
};
const BITS_FLIP: MutationOp = MutationOp {
    name: "bits_flip",
    generate: gen_bits_flip,
    apply: apply_bits,
};
const BITS_RANDOM: MutationOp = MutationOp {
    name: "bits_random",
    generate: gen_bits_random,
    apply: apply_bits,
};
const ADDR_RANDOM: MutationOp = MutationOp {
    name: "addr_random",
    generate: gen_addr_random,
    apply: apply_addr,
};
const ADDR_SPECIAL: MutationOp = MutationOp {
    name: "addr_special",
    generate: gen_addr_special,
    apply: apply_addr,
};
const PREFIX_RANDOM: MutationOp = MutationOp {
    name: "prefix_random",
    generate: gen_prefix_random,
    apply: apply_ip_prefix,
};
const PREFIX_LENGTH: MutationOp = MutationOp {
    name: "prefix_length",
    generate: gen_prefix_length,
    apply: apply_ip_prefix,
};
const LIST_DUPLICATE: MutationOp = MutationOp {
    name: "list_duplicate",
    generate: gen_element_index,
    apply: apply_duplicate,
};
const LIST_DROP: MutationOp = MutationOp {
    name: "list_drop",
    generate: gen_element_index,
    apply: apply_drop,
};

pub static BASE_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX];
static UINT_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, UINT_RANDOM, UINT_BOUNDARY];
static BYTES_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, BYTES_RANDOM, BYTES_BIT_FLIP];
static BITS_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, BITS_FLIP, BITS_RANDOM];
static ADDR_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, ADDR_RANDOM, ADDR_SPECIAL];
static PREFIX_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, PREFIX_RANDOM, PREFIX_LENGTH];
static LIST_OPS: &[MutationOp] = &[SET_RAW, SET_PREFIX, SET_SUFFIX, LIST_DUPLICATE, LIST_DROP];

/// The operator registry for a node shape. Registries only ever extend
/// [`BASE_OPS`]; indices are stable for the life of the program.
pub fn operators_for(kind: &FieldKind) -> &'static [MutationOp] {
    match kind {
        FieldKind::Value(LeafValue::Uint { .. }) | FieldKind::Length(_) => UINT_OPS,
        FieldKind::Value(LeafValue::Bytes(_)) => BYTES_OPS,
        FieldKind::Value(LeafValue::Bits(_)) => BITS_OPS,
        FieldKind::Value(LeafValue::Addr(_)) => ADDR_OPS,
        FieldKind::Value(LeafValue::Prefix(_)) => PREFIX_OPS,
        FieldKind::List { .. } => LIST_OPS,
        FieldKind::Composite => BASE_OPS,
    }
}

fn random_bytes(rng: &mut dyn RngCore, max_len: usize) -> Vec<u8> {
    let len = rng.random_range(0..=max_len);
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn random_addr_like(current: IpAddr, rng: &mut dyn RngCore) -> IpAddr {
    match current {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::from(rng.random::<u32>())),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(rng.random::<u128>())),
    }
}

fn gen_raw(_: &FieldTree, _: NodeId, rng: &mut dyn RngCore) -> Result<MutationArgs, FieldError> {
    Ok(MutationArgs::Bytes(random_bytes(rng, MAX_RAW_LEN)))
}

fn gen_wrapper(
    _: &FieldTree,
    _: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    Ok(MutationArgs::Bytes(random_bytes(rng, MAX_WRAPPER_LEN)))
}

fn uint_max(tree: &FieldTree, id: NodeId) -> Result<u128, FieldError> {
    let width = tree.uint_width(id)?.unwrap_or(0);
    Ok(match width {
        0 => 0,
        w if w >= 16 => u128::MAX,
        w => (1u128 << (8 * w)) - 1,
    })
}

fn gen_uint_random(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let max = uint_max(tree, id)?;
    Ok(MutationArgs::Uint(rng.random::<u128>() & max))
}

fn gen_uint_boundary(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let max = uint_max(tree, id)?;
    let candidates = [0, 1u128.min(max), max / 2, max / 2 + 1, max];
    let pick = candidates[rng.random_range(0..candidates.len())];
    Ok(MutationArgs::Uint(pick.min(max)))
}

fn gen_bytes_random(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let current = tree.byte_length(id)?;
    Ok(MutationArgs::Bytes(random_bytes(rng, current * 2 + 4)))
}

fn gen_bytes_bit_flip(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let mut bytes = match tree.leaf_value(id)? {
        Some(LeafValue::Bytes(bytes)) => bytes.clone(),
        _ => Vec::new(),
    };
    if bytes.is_empty() {
        bytes.push(rng.random());
    } else {
        let index = rng.random_range(0..bytes.len());
        bytes[index] ^= 1u8 << rng.random_range(0..8u32);
    }
    Ok(MutationArgs::Bytes(bytes))
}

fn current_bits(tree: &FieldTree, id: NodeId) -> Result<Vec<bool>, FieldError> {
    Ok(match tree.leaf_value(id)? {
        Some(LeafValue::Bits(bits)) => bits.clone(),
        _ => Vec::new(),
    })
}

fn gen_bits_flip(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let mut bits = current_bits(tree, id)?;
    if !bits.is_empty() {
        let index = rng.random_range(0..bits.len());
        bits[index] = !bits[index];
    }
    Ok(MutationArgs::Bits(bits))
}

fn gen_bits_random(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let width = current_bits(tree, id)?.len();
    Ok(MutationArgs::Bits(
        (0..width).map(|_| rng.random_bool(0.5)).collect(),
    ))
}

fn current_addr(tree: &FieldTree, id: NodeId) -> Result<IpAddr, FieldError> {
    Ok(match tree.leaf_value(id)? {
        Some(LeafValue::Addr(addr)) => *addr,
        _ => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    })
}

fn gen_addr_random(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let current = current_addr(tree, id)?;
    Ok(MutationArgs::Addr(random_addr_like(current, rng)))
}

fn gen_addr_special(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let special: [IpAddr; 4] = match current_addr(tree, id)? {
        IpAddr::V4(_) => [
            Ipv4Addr::UNSPECIFIED.into(),
            Ipv4Addr::BROADCAST.into(),
            Ipv4Addr::LOCALHOST.into(),
            Ipv4Addr::new(224, 0, 0, 1).into(),
        ],
        IpAddr::V6(_) => [
            Ipv6Addr::UNSPECIFIED.into(),
            Ipv6Addr::from(u128::MAX).into(),
            Ipv6Addr::LOCALHOST.into(),
            Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1).into(),
        ],
    };
    Ok(MutationArgs::Addr(special[rng.random_range(0..special.len())]))
}

fn current_prefix(tree: &FieldTree, id: NodeId) -> Result<IpPrefix, FieldError> {
    Ok(match tree.leaf_value(id)? {
        Some(LeafValue::Prefix(prefix)) => *prefix,
        _ => IpPrefix::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
    })
}

fn gen_prefix_random(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let current = current_prefix(tree, id)?;
    let addr = random_addr_like(current.addr, rng);
    let length = rng.random_range(0..=current.max_length());
    Ok(MutationArgs::Prefix(IpPrefix::new(addr, length)))
}

fn gen_prefix_length(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let current = current_prefix(tree, id)?;
    Ok(MutationArgs::Prefix(IpPrefix::new(current.addr, rng.random())))
}

fn gen_element_index(
    tree: &FieldTree,
    id: NodeId,
    rng: &mut dyn RngCore,
) -> Result<MutationArgs, FieldError> {
    let len = tree.children(id)?.len();
    Ok(MutationArgs::Index(rng.random_range(0..len.max(1))))
}

fn apply_raw(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Bytes(bytes) => tree.set_raw(id, bytes),
        _ => Err(FieldError::ArgumentMismatch { op: "set_raw" }),
    }
}

fn apply_prefix(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Bytes(bytes) => tree.set_prefix(id, bytes),
        _ => Err(FieldError::ArgumentMismatch { op: "set_prefix" }),
    }
}

fn apply_suffix(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Bytes(bytes) => tree.set_suffix(id, bytes),
        _ => Err(FieldError::ArgumentMismatch { op: "set_suffix" }),
    }
}

fn apply_uint(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Uint(value) => tree.set_uint(id, value),
        _ => Err(FieldError::ArgumentMismatch { op: "set_uint" }),
    }
}

fn apply_bytes(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Bytes(bytes) => tree.set_bytes(id, bytes),
        _ => Err(FieldError::ArgumentMismatch { op: "set_bytes" }),
    }
}

fn apply_bits(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Bits(bits) => tree.set_bits(id, bits),
        _ => Err(FieldError::ArgumentMismatch { op: "set_bits" }),
    }
}

fn apply_addr(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Addr(addr) => tree.set_addr(id, addr),
        _ => Err(FieldError::ArgumentMismatch { op: "set_addr" }),
    }
}

fn apply_ip_prefix(
    tree: &mut FieldTree,
    id: NodeId,
    args: MutationArgs,
) -> Result<(), FieldError> {
    match args {
        MutationArgs::Prefix(prefix) => tree.set_ip_prefix(id, prefix),
        _ => Err(FieldError::ArgumentMismatch { op: "set_ip_prefix" }),
    }
}

fn apply_duplicate(
    tree: &mut FieldTree,
    id: NodeId,
    args: MutationArgs,
) -> Result<(), FieldError> {
    match args {
        MutationArgs::Index(index) => tree.duplicate_element(id, index),
        _ => Err(FieldError::ArgumentMismatch { op: "duplicate_element" }),
    }
}

fn apply_drop(tree: &mut FieldTree, id: NodeId, args: MutationArgs) -> Result<(), FieldError> {
    match args {
        MutationArgs::Index(index) => tree.drop_element(id, index),
        _ => Err(FieldError::ArgumentMismatch { op: "drop_element" }),
    }
}

impl FieldTree {
    pub fn operators(&self, id: NodeId) -> Result<&'static [MutationOp], FieldError> {
        Ok(self.kind(id)?.operators())
    }

    pub fn weights(&self, id: NodeId) -> Result<&MutationWeights, FieldError> {
        Ok(&self.node(id)?.weights)
    }

    pub fn set_weights(&mut self, id: NodeId, values: &[f64]) -> Result<(), FieldError> {
        self.node_mut(id)?.weights.set(values)?;
        Ok(())
    }

    /// Picks one of the node's operators according to its weights.
    pub fn select_mutation(&self, id: NodeId, rng: &mut dyn RngCore) -> Result<usize, FieldError> {
        Ok(self.weights(id)?.select(rng))
    }

    /// Runs operator `index`: generate a value, then hand it to the setter.
    /// Returns the operator name.
    pub fn apply_mutation(
        &mut self,
        id: NodeId,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<&'static str, FieldError> {
        let ops = self.operators(id)?;
        debug_assert_eq!(ops.len(), self.weights(id)?.len());
        let op = ops.get(index).ok_or(FieldError::UnknownOperator {
            type_name: self.type_name(id)?,
            index,
            count: ops.len(),
        })?;
        let args = (op.generate)(self, id, rng)?;
        (op.apply)(self, id, args)?;
        Ok(op.name)
    }

    /// Feeds fuzzing feedback for operator `index` back into the node's weights.
    pub fn reward(&mut self, id: NodeId, index: usize, positive: bool) -> Result<(), FieldError> {
        self.reward_with_rate(id, index, positive, DEFAULT_LEARNING_RATE)
    }

    pub fn reward_with_rate(
        &mut self,
        id: NodeId,
        index: usize,
        positive: bool,
        eta: f64,
    ) -> Result<(), FieldError> {
        self.node_mut(id)?.weights.reward(index, positive, eta)?;
        Ok(())
    }
}

/// Where a mutation landed, so the outcome can be rewarded later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub node: NodeId,
    pub operator: usize,
    pub name: &'static str,
}

/// A `Mutator` changes a field tree in place, one field at a time.
///
/// Mutators are the core engine for generating new test cases in a fuzzing
/// loop. Every call reports which node and operator it used so the driver can
/// reward or penalize that choice once the outcome is known.
///
/// # Type Parameters
/// * `R`: The type of random number generator used for mutation decisions.
pub trait Mutator<R: RngCore> {
    /// Applies one mutation somewhere under `root`.
    ///
    /// # Returns
    /// `Result<MutationRecord, anyhow::Error>`:
    ///   - `Ok(record)`: the node and operator that were applied.
    ///   - `Err(error)`: if the tree could not be mutated.
    fn mutate(
        &mut self,
        tree: &mut FieldTree,
        root: NodeId,
        rng: &mut R,
    ) -> Result<MutationRecord, anyhow::Error>;
}

/// Picks a node under the root uniformly, then one of its operators by the
/// node's adaptive weights.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedFieldMutator {
    /// Only mutate leaves (value and length fields).
    pub leaves_only: bool,
}

impl WeightedFieldMutator {
    pub fn new(leaves_only: bool) -> Self {
        Self { leaves_only }
    }
}

impl<R: RngCore> Mutator<R> for WeightedFieldMutator {
    fn mutate(
        &mut self,
        tree: &mut FieldTree,
        root: NodeId,
        rng: &mut R,
    ) -> Result<MutationRecord, anyhow::Error> {
        let mut candidates = tree.descendants(root)?;
        if self.leaves_only {
            candidates.retain(|id| {
                tree.kind(*id)
                    .map(|k| matches!(k, FieldKind::Value(_) | FieldKind::Length(_)))
                    .unwrap_or(false)
            });
        }
        if candidates.is_empty() {
            return Err(anyhow::anyhow!("no mutable field under node {root}"));
        }
        let node = candidates[rng.random_range(0..candidates.len())];
        let operator = tree.select_mutation(node, rng)?;
        let name = tree.apply_mutation(node, operator, rng)?;
        Ok(MutationRecord {
            node,
            operator,
            name,
        })
    }
}
