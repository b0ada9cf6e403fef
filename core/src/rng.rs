//! Deterministic random number generation.
//!
//! RULE: Nothing in the simulation may call any platform RNG.
//! Stateful randomness exists only while the map is constructed; all of it
//! flows through SubsystemRng instances derived from the match seed.
//!
//! After construction, the only "randomness" is `deterministic_jitter`,
//! a pure hash of (time, actor id). Replaying the same seed and the same
//! action sequence therefore reproduces identical state.

use crate::types::TimeMs;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single construction stage.
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SubsystemRng {
    /// Create an RNG from the master seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, slot_index: u64) -> Self {
        let derived_seed = master_seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.inner.next_u64()
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.next_u64() % n
    }

    /// Roll a u32 in [lo, hi). Returns `lo` for an empty range.
    pub fn range_u32(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        lo + self.next_u64_below(u64::from(hi - lo)) as u32
    }

    /// Percent trial: true with probability `percent / 100`.
    pub fn percent(&mut self, percent: u32) -> bool {
        self.next_u64_below(100) < u64::from(percent)
    }
}

/// All construction RNGs for a single match, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_slot(&self, slot: RngSlot) -> SubsystemRng {
        SubsystemRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngSlot {
    Terrain = 0,
    SpecialTiles = 1,
}

impl RngSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Terrain => "terrain",
            Self::SpecialTiles => "special_tiles",
        }
    }
}

fn fnv1a64(bytes: &[u8], mut hash: u64) -> u64 {
    const FNV_PRIME: u64 = 0x0100_0000_01b3;
    for b in bytes {
        hash = (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Pure hash of (now, actor) folded into `[0, max_ms]`.
pub fn deterministic_jitter(now_ms: TimeMs, actor_id: &str, max_ms: TimeMs) -> TimeMs {
    if max_ms == 0 {
        return 0;
    }
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    let hash = fnv1a64(&now_ms.to_le_bytes(), FNV_OFFSET);
    let hash = fnv1a64(b"|", hash);
    let hash = fnv1a64(actor_id.as_bytes(), hash);
    hash % (max_ms + 1)
}
