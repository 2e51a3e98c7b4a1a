//! Region registry: named address ranges for loaded modules and
//! compiler-generated method bodies
//!
//! Regions are created on first reference and never deleted; later unloads
//! must not invalidate attribution of samples already recorded against a
//! range. The registry's only mutation after creation is `add_samples`.

use fnv::FnvHashMap;
use std::cmp::Ordering;

/// Classification flags for a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionFlags {
    /// Body produced by the code generator at runtime
    pub is_generated_code: bool,
    /// Generated fresh in this run, as opposed to precompiled
    pub is_compiled: bool,
    /// Produced by re-compilation of an already-live method
    pub is_recompiled: bool,
    /// Trusted to claim an address only when no primary region does
    pub is_fallback: bool,
}

/// A named contiguous address interval
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub base: u64,
    pub size: u64,
    /// `base + size`, stored for fast comparison during the sweep
    pub end: u64,
    pub sample_count: u64,
    pub flags: RegionFlags,
}

impl Region {
    fn new(name: String, base: u64, size: u64, flags: RegionFlags) -> Self {
        Self {
            name,
            base,
            size,
            end: base.saturating_add(size),
            sample_count: 0,
            flags,
        }
    }

    /// Whether `address` falls in `[base, end)`
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end
    }

    /// Report label: jit / prejit / native / system
    pub fn kind_label(&self) -> &'static str {
        if self.flags.is_generated_code {
            if self.flags.is_compiled {
                "jit"
            } else {
                "prejit"
            }
        } else if self.flags.is_fallback {
            "system"
        } else {
            "native"
        }
    }

    /// Interval-search order: ascending base, wider range first on ties so a
    /// containing region is considered before a narrower same-start one
    pub fn address_order(a: &Region, b: &Region) -> Ordering {
        a.base.cmp(&b.base).then(b.end.cmp(&a.end))
    }
}

/// Identity under which a region deduplicates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionKey {
    /// Module-style regions dedup on name and load address
    Module { name: String, base: u64 },
    /// Generated code dedups on the per-compilation method id
    Method(u64),
}

/// Outcome of a registration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New region created at this index
    Inserted(usize),
    /// Key already present with the same extent and name
    Duplicate(usize),
    /// Key already present with a different extent or name; the original
    /// registration was kept
    Mismatch(usize),
}

impl RegisterOutcome {
    /// Arena index of the region the key now resolves to
    pub fn index(&self) -> usize {
        match *self {
            RegisterOutcome::Inserted(i)
            | RegisterOutcome::Duplicate(i)
            | RegisterOutcome::Mismatch(i) => i,
        }
    }
}

/// Owns every region seen during one analysis
#[derive(Debug, Default)]
pub struct RegionRegistry {
    regions: Vec<Region>,
    index: FnvHashMap<RegionKey, usize>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent registration: first registration wins. A re-registration
    /// under an existing key returns the original region; the caller decides
    /// whether a divergent extent is worth a diagnostic.
    pub fn register(
        &mut self,
        key: RegionKey,
        name: String,
        base: u64,
        size: u64,
        flags: RegionFlags,
    ) -> RegisterOutcome {
        if let Some(&existing) = self.index.get(&key) {
            let region = &self.regions[existing];
            if region.base == base && region.size == size && region.name == name {
                return RegisterOutcome::Duplicate(existing);
            }
            return RegisterOutcome::Mismatch(existing);
        }

        let idx = self.regions.len();
        self.regions.push(Region::new(name, base, size, flags));
        self.index.insert(key, idx);
        RegisterOutcome::Inserted(idx)
    }

    pub fn get(&self, idx: usize) -> &Region {
        &self.regions[idx]
    }

    /// Iteration order is unspecified; consumers sort explicitly
    pub fn all_regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn add_samples(&mut self, idx: usize, count: u64) {
        self.regions[idx].sample_count += count;
    }

    /// Indices of primary and fallback regions, each sorted by the
    /// interval-search order
    pub fn sorted_partition(&self) -> (Vec<usize>, Vec<usize>) {
        let mut primary = Vec::new();
        let mut fallback = Vec::new();
        for (idx, region) in self.regions.iter().enumerate() {
            if region.flags.is_fallback {
                fallback.push(idx);
            } else {
                primary.push(idx);
            }
        }
        let by_address =
            |&a: &usize, &b: &usize| Region::address_order(&self.regions[a], &self.regions[b]);
        primary.sort_by(by_address);
        fallback.sort_by(by_address);
        (primary, fallback)
    }
}
