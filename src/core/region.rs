//! Region Map — component A.
//!
//! A `Region` is a contiguous span of bytes at a known base virtual address,
//! backed by either mapped section bytes or a synthetic fallback. `RegionMap`
//! keeps regions sorted and disjoint by `base` and answers point lookups with
//! a binary search, falling back to an optional catch-all region (e.g. for
//! addresses inside a segment that has no covering section, such as padding).

use std::sync::Arc;
use tracing::warn;

/// A contiguous, disjoint span of bytes mapped at a virtual address.
#[derive(Debug, Clone)]
pub struct Region {
    pub base: u64,
    pub bytes: Arc<[u8]>,
    pub name: Option<String>,
}

impl Region {
    pub fn new(base: u64, bytes: Arc<[u8]>, name: Option<String>) -> Self {
        Region { base, bytes, name }
    }

    /// Exclusive end address: `base + len`.
    pub fn extent(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.extent()
    }

    /// Bytes available starting at `addr`, or `None` if out of range.
    pub fn slice_from(&self, addr: u64) -> Option<&[u8]> {
        if !self.contains(addr) {
            return None;
        }
        let offset = (addr - self.base) as usize;
        Some(&self.bytes[offset..])
    }
}

/// Ordered, disjoint collection of regions with point lookup.
#[derive(Debug, Clone, Default)]
pub struct RegionMap {
    regions: Vec<Region>,
    fallback: Option<Region>,
}

impl RegionMap {
    pub fn new() -> Self {
        RegionMap {
            regions: Vec::new(),
            fallback: None,
        }
    }

    /// Insert a region, keeping `regions` sorted by `base`.
    ///
    /// Overlapping inserts are rejected rather than silently merged or
    /// truncated — the Region Map's invariant is that its regions are
    /// disjoint, and a format shim inserting an overlapping section is a bug
    /// in the shim, not something the map should paper over.
    pub fn insert(&mut self, region: Region) -> Result<(), String> {
        let idx = self
            .regions
            .partition_point(|r| r.base < region.base);
        if let Some(prev) = idx.checked_sub(1).and_then(|i| self.regions.get(i)) {
            if prev.extent() > region.base {
                return Err(format!(
                    "region '{:?}' at {:#x} overlaps previous region ending at {:#x}",
                    region.name,
                    region.base,
                    prev.extent()
                ));
            }
        }
        if let Some(next) = self.regions.get(idx) {
            if region.extent() > next.base {
                return Err(format!(
                    "region '{:?}' at {:#x} overlaps next region starting at {:#x}",
                    region.name, region.base, next.base
                ));
            }
        }
        self.regions.insert(idx, region);
        Ok(())
    }

    pub fn set_fallback(&mut self, region: Region) {
        self.fallback = Some(region);
    }

    /// Find the region covering `addr`, preferring a mapped region over the
    /// fallback. Returns `None` if neither covers it.
    pub fn find(&self, addr: u64) -> Option<&Region> {
        let idx = self.regions.partition_point(|r| r.base <= addr);
        if idx > 0 {
            if let Some(r) = self.regions.get(idx - 1) {
                if r.contains(addr) {
                    return Some(r);
                }
            }
        }
        self.fallback.as_ref().filter(|r| r.contains(addr))
    }

    /// Read up to `max_len` bytes starting at `addr`, truncated to the
    /// covering region's extent. Logs and returns `None` if no region (and
    /// no fallback) covers `addr`, per §7's skip-and-log resolution.
    pub fn read(&self, addr: u64, max_len: usize) -> Option<&[u8]> {
        let region = match self.find(addr) {
            Some(r) => r,
            None => {
                warn_missing_region(addr);
                return None;
            }
        };
        let bytes = region.slice_from(addr)?;
        Some(&bytes[..max_len.min(bytes.len())])
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Logs a warning for a point lookup that missed every region, matching
/// §7's "skip and log" resolution for missing regions rather than asserting.
fn warn_missing_region(addr: u64) {
    warn!(address = format!("{:#x}", addr), "address not covered by any region");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(base: u64, len: usize) -> Region {
        Region::new(base, vec![0x90u8; len].into(), None)
    }

    #[test]
    fn test_find_exact_region() {
        let mut map = RegionMap::new();
        map.insert(region(0x1000, 0x100)).unwrap();
        map.insert(region(0x2000, 0x100)).unwrap();

        assert_eq!(map.find(0x1050).unwrap().base, 0x1000);
        assert_eq!(map.find(0x2000).unwrap().base, 0x2000);
        assert!(map.find(0x1100).is_none());
        assert!(map.find(0x0fff).is_none());
    }

    #[test]
    fn test_overlap_rejected() {
        let mut map = RegionMap::new();
        map.insert(region(0x1000, 0x100)).unwrap();
        assert!(map.insert(region(0x1050, 0x100)).is_err());
    }

    #[test]
    fn test_fallback_region() {
        let mut map = RegionMap::new();
        map.insert(region(0x1000, 0x10)).unwrap();
        map.set_fallback(region(0, 0x10000));

        assert_eq!(map.find(0x1000).unwrap().base, 0x1000); // mapped region wins
        assert_eq!(map.find(0x500).unwrap().base, 0); // falls back
    }

    #[test]
    fn test_read_truncates_to_region() {
        let mut map = RegionMap::new();
        map.insert(region(0x1000, 0x4)).unwrap();
        let bytes = map.read(0x1000, 16).unwrap();
        assert_eq!(bytes.len(), 4);
    }

    #[test]
    fn test_read_of_uncovered_address_logs_and_returns_none() {
        let mut map = RegionMap::new();
        map.insert(region(0x1000, 0x10)).unwrap();
        assert!(map.read(0x5000, 16).is_none());
    }
}
