use bytes::BytesMut;

const MAX_ALLOC_SIZE: usize = 256 * 1024;
const MIN_ALLOC_SIZE: usize = MAX_ALLOC_SIZE / 4;

/// Allocation counters, one per fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SlabStat {
    /// Requests larger than the arena itself.
    pub large: u64,
    /// Requests that did not fit the tail while the tail was still worth keeping.
    pub medium: u64,
    /// Cursor resets onto a fresh backing buffer.
    pub small: u64,
}

impl SlabStat {
    pub fn any(&self) -> bool {
        self.large > 0 || self.medium > 0 || self.small > 0
    }
}

/// Bump arena for inbound chunk payloads. Sub-`max` requests are carved
/// out of one shared backing buffer; each returned `BytesMut` owns its
/// range, so a recycled cursor can never alias a buffer still held by a
/// consumer.
pub struct Slab {
    min: usize,
    max: usize,
    buf: BytesMut,
    stat: SlabStat,
}

impl Default for Slab {
    fn default() -> Self {
        Slab::new()
    }
}

impl Slab {
    pub fn new() -> Self {
        Slab {
            min: MIN_ALLOC_SIZE,
            max: MAX_ALLOC_SIZE,
            buf: BytesMut::new(),
            stat: SlabStat::default(),
        }
    }

    /// Override the watermarks. Must run before the first `get`.
    pub fn with_marks(min: usize, max: usize) -> Self {
        assert!(min <= max, "slab min > max");

        let max = if max == 0 { MAX_ALLOC_SIZE } else { max };
        let min = if min == 0 { max / 4 } else { min };

        Slab {
            min,
            max,
            buf: BytesMut::new(),
            stat: SlabStat::default(),
        }
    }

    /// Hand out `need` zeroed bytes.
    pub fn get(&mut self, need: usize) -> BytesMut {
        if need > self.max {
            self.stat.large += 1;
            return BytesMut::zeroed(need);
        }

        if need > self.buf.len() {
            if self.buf.len() > self.min {
                // The tail is still big enough to serve upcoming small
                // requests; satisfy this one on the side.
                self.stat.medium += 1;
                return BytesMut::zeroed(need);
            }

            self.stat.small += 1;
            self.buf = BytesMut::zeroed(self.max);
        }

        self.buf.split_to(need)
    }

    pub fn stat(&self) -> SlabStat {
        self.stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_size_and_disjoint() {
        let mut slab = Slab::new();

        let mut a = slab.get(100);
        let b = slab.get(200);
        assert_eq!(a.len(), 100);
        assert_eq!(b.len(), 200);

        // Writes through one handle stay invisible through the other.
        a[0] = 0xFF;
        a[99] = 0xEE;
        assert!(b.iter().all(|&x| x == 0));
    }

    #[test]
    fn test_large_allocation_bypasses_arena() {
        let mut slab = Slab::with_marks(64, 256);

        let big = slab.get(1024);
        assert_eq!(big.len(), 1024);
        assert_eq!(slab.stat().large, 1);

        // The arena cursor is untouched by the bypass.
        let small = slab.get(16);
        assert_eq!(small.len(), 16);
    }

    #[test]
    fn test_medium_fallback_keeps_tail() {
        let mut slab = Slab::with_marks(64, 256);

        // First get installs the backing buffer, leaving a 156-byte tail.
        slab.get(100);
        assert_eq!(slab.stat().small, 1);

        // 200 > tail(156) and tail > min(64): side allocation.
        let side = slab.get(200);
        assert_eq!(side.len(), 200);
        assert_eq!(slab.stat().medium, 1);

        // The tail is still intact for smaller requests.
        let from_tail = slab.get(100);
        assert_eq!(from_tail.len(), 100);
        assert_eq!(slab.stat().small, 1);
    }

    #[test]
    fn test_cursor_reset_when_tail_is_small() {
        let mut slab = Slab::with_marks(64, 256);

        slab.get(200); // tail: 56 < min
        let stat_before = slab.stat().small;

        // Does not fit the 56-byte tail and the tail is below min:
        // a fresh backing buffer is installed.
        let out = slab.get(100);
        assert_eq!(out.len(), 100);
        assert_eq!(slab.stat().small, stat_before + 1);
    }

    #[test]
    fn test_default_watermarks() {
        let mut slab = Slab::new();
        let buf = slab.get(64 * 1024);
        assert_eq!(buf.len(), 64 * 1024);
        assert_eq!(slab.stat().large, 0);
    }
}
