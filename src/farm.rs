//! Faster (but not DoS-resistant) hashmaps, and the hash that routes word pairs to shards
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hash, Hasher};
use std::str::FromStr;
use crate::errors::*;

/// Act like a farmhash
///
/// Farmhash isn't a streaming hash, so every write is hashed with the previous
/// state as its seed. Keys that write several pieces (strings write a terminator
/// byte after their contents) still depend on all of them.
pub struct FarmHashLie (u64);

impl Default for FarmHashLie {
    #[inline]
    fn default() -> FarmHashLie { FarmHashLie(0) }
}

impl Hasher for FarmHashLie {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.0 = farmhash::hash64_with_seed(bytes, self.0);
    }
}

pub type Farm = BuildHasherDefault<FarmHashLie>;
pub type FarmMap<X, Y> = HashMap<X, Y, Farm>;
pub type FarmSet<X> = HashSet<X, Farm>;

pub fn new_farm<X: Hash+Eq, Y>() -> FarmMap<X, Y> {
    Default::default()
}

pub fn new_farm_set<X: Hash+Eq>() -> FarmSet<X> {
    Default::default()
}

/// Canonical undirected pair as one integer: smaller id in the high half
#[inline]
pub fn pack_pair(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

#[inline]
pub fn unpack_pair(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

/// How a canonical pair picks one of the `S` shard files
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShardHash {
    /// farmhash of the packed pair, spreads skewed vocabularies evenly
    Farm,
    /// packed pair modulo the shard count, handy when reading shards by eye
    Modulo,
}

impl ShardHash {
    #[inline]
    pub fn shard(self, key: u64, shards: usize) -> usize {
        let h = match self {
            ShardHash::Farm => farmhash::hash64(&key.to_le_bytes()),
            ShardHash::Modulo => key,
        };
        (h % shards as u64) as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ShardHash::Farm => "farm",
            ShardHash::Modulo => "modulo",
        }
    }
}

impl FromStr for ShardHash {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "farm" => Ok(ShardHash::Farm),
            "modulo" => Ok(ShardHash::Modulo),
            other => Err(Error::Configuration(format!(
                "shard_hash should be farm or modulo, not \"{}\"", other))),
        }
    }
}
