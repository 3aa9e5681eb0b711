//! Fuzzy read localisation by k-mer voting
//!
//! Slides a short window over the read (both orientations), matches each
//! window approximately against the index, and buckets the reported
//! occurrence positions. The densest run of buckets wins and becomes a
//! reference window plus an orientation bit, without ever running full DP
//! against the whole reference.

use rustc_hash::FxHashMap;

use crate::index::Index;
use crate::sequence::{reverse_complement, BioSeq};

/// Window length for the sliding probes.
pub const KMER: i32 = 20;
/// Step between consecutive probes.
pub const STEP: i32 = 3;
/// Lower bound on the vote bucket width.
pub const MIN_BUCKET_SIZE: i32 = 850;
/// Lower bound on the extension threshold.
pub const MIN_THRESHOLD: i32 = 10;

/// Where a read aligns on the reference: a half-open window plus an
/// orientation bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub reversed: bool,
    pub left: i32,
    pub right: i32,
}

impl Index {
    /// Decide where `seq` aligns on the indexed reference and whether it
    /// is reverse-complemented.
    pub fn fuzzy_locate(&self, seq: BioSeq) -> Location {
        let n = seq.len();

        let rev = reverse_complement(seq.bytes());
        let strands = [seq, BioSeq::new(&rev)];

        let bucket_size = MIN_BUCKET_SIZE.max(n / 2);
        let mut bucket: [FxHashMap<i32, i32>; 2] = [FxHashMap::default(), FxHashMap::default()];

        let probe = |bucket: &[FxHashMap<i32, i32>; 2], i: usize, j: i32| -> i32 {
            bucket[i].get(&j).copied().unwrap_or(0)
        };

        for (i, s) in strands.iter().enumerate() {
            let mut l = 1;
            while l + KMER - 1 <= n {
                let hit = self.align(s.take(l, l + KMER));

                for j in self.rpset(hit.token) {
                    let key = (j - hit.token.len / 2) / bucket_size;
                    *bucket[i].entry(key).or_insert(0) += 1;
                }

                l += STEP;
            }
        }

        let mut threshold = i32::MAX;
        let mut max_score = i32::MIN;
        let (mut best_i, mut best_j) = (0usize, 0i32);

        for (i, votes) in bucket.iter().enumerate() {
            // Sorted keys so ties break the same way on every run.
            let mut keys: Vec<i32> = votes.keys().copied().collect();
            keys.sort_unstable();

            for j in keys {
                let own = votes[&j];
                let prev = probe(&bucket, i, j - 1);
                let succ = probe(&bucket, i, j + 1);

                // Only local maxima relative to the neighbours qualify.
                if own * 2 < prev + succ {
                    continue;
                }

                let score = prev + own + succ;
                if score > max_score {
                    let hi = own.max(prev).max(succ);
                    let lo = own.min(prev).min(succ);
                    threshold = lo - (hi - lo) / 2;

                    max_score = score;
                    best_i = i;
                    best_j = j;
                }
            }
        }

        let threshold = threshold.max(MIN_THRESHOLD);

        let mut left = best_j - 1;
        while probe(&bucket, best_i, left - 1) >= threshold {
            left -= 1;
        }

        let mut right = best_j + 1;
        while probe(&bucket, best_i, right + 1) >= threshold {
            right += 1;
        }

        Location {
            reversed: best_i == 1,
            left: 1.max(left * bucket_size),
            right: self.len().min((right + 2) * bucket_size - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_ref(rng: &mut StdRng, n: usize) -> Vec<u8> {
        (0..n).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
    }

    #[test]
    fn test_locate_forward_read() {
        let mut rng = StdRng::seed_from_u64(7);
        let reference = random_ref(&mut rng, 5000);

        let mut index = Index::new();
        index.append_seq(&reference);
        index.build();

        // A clean forward read copied from [3001, 3200].
        let read = reference[3000..3200].to_vec();
        let location = index.fuzzy_locate(BioSeq::new(&read));

        assert!(!location.reversed);
        assert!(location.left <= 3001, "left = {}", location.left);
        assert!(location.right >= 3200, "right = {}", location.right);
        assert!(location.right - location.left <= 4 * MIN_BUCKET_SIZE);
    }

    #[test]
    fn test_locate_reverse_complement_read() {
        let mut rng = StdRng::seed_from_u64(11);
        let reference = random_ref(&mut rng, 5000);

        let mut index = Index::new();
        index.append_seq(&reference);
        index.build();

        // The read is the reverse complement of [2001, 2200].
        let read = reverse_complement(&reference[2000..2200]);
        let location = index.fuzzy_locate(BioSeq::new(&read));

        assert!(location.reversed);
        assert!(location.left <= 2001 && 2001 <= location.right + MIN_BUCKET_SIZE);
        assert!(location.right >= 2200 - MIN_BUCKET_SIZE);
    }

    #[test]
    fn test_locate_window_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(23);
        let reference = random_ref(&mut rng, 3000);

        let mut index = Index::new();
        index.append_seq(&reference);
        index.build();

        let read = reference[0..150].to_vec();
        let location = index.fuzzy_locate(BioSeq::new(&read));

        assert!(location.left >= 1);
        assert!(location.right <= index.len());
        assert!(location.left <= location.right);
    }
}
