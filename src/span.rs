//! One-sided partial alignment with breakpoint detection
//!
//! The prefix span finds the longest prefix of a read that aligns well
//! against a prefix of a reference window, and reports where the two
//! diverge; the suffix span is the same machinery run on both inputs
//! reversed. The DP keeps two rows (`diagonal` and `gap` mode) and a
//! per-column frontier of the best record ever seen; the frontier curve
//! (read consumed vs reference consumed) is trimmed to its monotone
//! ridge, decomposed into straight pieces, and the end of the first piece
//! is the breakpoint corner.

use tracing::warn;

use crate::align::{local_align, Alignment, Range, INF};
use crate::numeric::{french_stick_decompose, linear_least_square, Decomposition, Vec2};
use crate::sequence::BioSeq;

/// Gap-open surcharge of the span DP.
pub const PENALTY: i32 = 3;
/// Outlier-reduction rounds for the first-piece slope fit.
pub const N_REDUCE: i32 = 8;
/// Minimum acceptable slope of the first decomposition piece.
pub const MIN_SLOPE: f64 = 0.8;
/// Offsets above this trigger the window-corrected retry.
const OFFSET_THRESHOLD: i32 = 10;
/// Length of the read prefix used to re-locate a drifting window.
pub const LOCATOR_LENGTH: i32 = 100;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Record {
    t: i32,
    l1: i32,
    l2: i32,
}

impl Record {
    const MAX: Record = Record { t: INF, l1: 0, l2: 0 };

    fn total_length(self) -> i32 {
        self.l1 + self.l2
    }

    fn lt(self, rhs: Record) -> bool {
        if self.t == rhs.t {
            self.total_length() > rhs.total_length()
        } else {
            self.t < rhs.t
        }
    }

    fn add(self, t: i32, l1: i32, l2: i32) -> Record {
        Record {
            t: self.t + t,
            l1: self.l1 + l1,
            l2: self.l2 + l2,
        }
    }
}

fn update(dest: &mut Record, value: Record) {
    if value.lt(*dest) {
        *dest = value;
    }
}

/// Longest-non-decreasing-subsequence trim of the frontier, keeping
/// intermediate points whose height stays within reach of a kept
/// neighbour.
fn trim_outliers(vs: &[Record]) -> Vec<bool> {
    const INNER_THRESHOLD: i32 = 50;

    let n = vs.len();

    // f[i]: (predecessor index, subsequence length); bucket[j]: the
    // lowest tail of any non-decreasing run of length j.
    let mut f: Vec<(i64, usize)> = vec![(-1, 0); n];
    let mut bucket: Vec<(i64, i32)> = vec![(-1, i32::MIN)];

    for (i, v) in vs.iter().enumerate() {
        let y = v.l1;
        let j = bucket.partition_point(|&(_, h)| h <= y);

        f[i] = (bucket[j - 1].0, j);

        if j == bucket.len() {
            bucket.push((i as i64, y));
        } else if bucket[j].1 >= y {
            bucket[j] = (i as i64, y);
        }
    }

    let mut mark = vec![false; n];
    let mut i = bucket[bucket.len() - 1].0;
    while i != -1 {
        mark[i as usize] = true;
        i = f[i as usize].0;
    }

    let mut new_mark = vec![false; n];

    let mut last: i64 = -1;
    for i in 0..n {
        if mark[i] {
            last = i as i64;
        } else if last != -1 && (vs[last as usize].l1 - vs[i].l1).abs() <= INNER_THRESHOLD {
            new_mark[i] = true;
        }
    }

    let mut last: i64 = -1;
    for i in (0..n).rev() {
        if mark[i] {
            last = i as i64;
        } else if last != -1 && (vs[last as usize].l1 - vs[i].l1).abs() <= INNER_THRESHOLD {
            new_mark[i] = true;
        }
    }

    for i in 0..n {
        if new_mark[i] {
            mark[i] = true;
        }
    }

    mark
}

/// Coarse slope estimate of a point run: height span over width span,
/// with damping for very short runs.
fn range_slope(points: &[Vec2]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 1.0;
    }

    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    if n < 5 {
        (max_y - min_y) / 10.0
    } else {
        (max_y - min_y) / (max_x - min_x).max(0.1)
    }
}

/// Decomposition driver: start with K=3 and shrink while pieces come out
/// degenerate (too short, too steep, or indistinguishable in slope),
/// erasing steep tails along the way.
fn decompose(mut vs: Vec<Vec2>) -> Decomposition {
    const MIN_SEGMENT_LEN: usize = 45;
    const MAX_SLOPE: f64 = 9.5;
    const SLOPE_DEVIATION_THRESHOLD: f64 = 0.1;
    const TAIL_CUT_MAX_LENGTH: usize = 25;

    let mut k: i32 = 3;
    let mut result = Decomposition {
        segments: Vec::new(),
        area: 0.0,
    };

    while k > 0 && !vs.is_empty() {
        let last_size = vs.len();
        result = french_stick_decompose(&vs, k as usize);

        let mut fail_count = 0;
        for seg in result.segments.clone() {
            if seg.len() >= MIN_SEGMENT_LEN {
                continue;
            }

            fail_count += 1;

            // A short piece hanging off the end is erased outright.
            let mut do_erase = seg.end >= vs.len();

            // A short, near-vertical piece is cut as well.
            if !do_erase && seg.len() > 1 {
                let slope = range_slope(&vs[seg.begin..seg.end]);
                do_erase = slope > MAX_SLOPE;
            }

            if do_erase {
                vs.truncate(seg.begin);
                break;
            }
        }

        // Two leading pieces with the same fitted slope are one piece.
        if fail_count == 0 && result.segments.len() > 1 {
            let s1 = result.segments[0];
            let s2 = result.segments[1];

            let k1 = linear_least_square(&vs[s1.begin..s1.end], 0).k;
            let k2 = linear_least_square(&vs[s2.begin..s2.end], 0).k;
            if (k1 - k2).abs() <= SLOPE_DEVIATION_THRESHOLD {
                fail_count += 1;
            }
        }

        // A steep tail at the end of the second piece distorts the fit.
        if fail_count == 0 && result.segments.len() > 1 {
            let s = result.segments[1];
            let len = (s.len() / 2).min(TAIL_CUT_MAX_LENGTH);
            let left = s.end - len;
            let slope = range_slope(&vs[left..s.end]);
            if slope > MAX_SLOPE {
                vs.truncate(left);
                if k == 3 {
                    fail_count += 1;
                }
            }
        }

        if fail_count == 0 && vs.len() == last_size {
            break;
        }

        k -= fail_count;
    }

    result
}

struct SpanOutcome {
    best: Record,
    offset: i32,
    mark: bool,
}

fn partial_span_impl(s1: BioSeq, s2: BioSeq, offset: i32, enable_correlation: bool) -> SpanOutcome {
    // The window end is a hard boundary for the DP.
    let n = s1.len() - offset;
    let m = s2.len();

    if n <= 0 || m == 0 {
        return SpanOutcome {
            best: Record { t: 0, l1: 0, l2: 0 },
            offset,
            mark: true,
        };
    }

    let mut f: [Vec<Record>; 2] = [
        (0..=m).map(|j| Record { t: j, l1: 0, l2: j }).collect(),
        (0..=m).map(|j| Record { t: j, l1: 0, l2: j }).collect(),
    ];

    let mut opt = vec![Record::MAX; (m + 1) as usize];

    for i in 1..=n {
        for j in (1..=m).rev() {
            let ju = j as usize;
            f[1][ju] = f[1][ju].add(1, 1, 0);
            let from_diag = f[0][ju].add(1 + PENALTY, 1, 0);
            update(&mut f[1][ju], from_diag);

            f[0][ju] = Record::MAX;
            if s1.code(offset + i) == s2.code(j) {
                let d0 = f[0][ju - 1].add(0, 1, 1);
                let d1 = f[1][ju - 1].add(0, 1, 1);
                update(&mut f[0][ju], d0);
                update(&mut f[0][ju], d1);
            }
        }

        f[1][0] = f[1][0].add(1, 1, 0);
        let from_diag = f[0][0].add(1 + PENALTY, 1, 0);
        update(&mut f[1][0], from_diag);
        f[0][0] = Record::MAX;

        for j in 1..=m {
            let ju = j as usize;
            let gap = f[1][ju - 1].add(1, 0, 1);
            update(&mut f[1][ju], gap);
            let open = f[0][ju - 1].add(1 + PENALTY, 0, 1);
            update(&mut f[1][ju], open);
        }

        for j in 0..=m as usize {
            update(&mut opt[j], f[0][j]);
            update(&mut opt[j], f[1][j]);
        }
    }

    let kept = trim_outliers(&opt);
    let vs: Vec<Vec2> = opt
        .iter()
        .enumerate()
        .filter(|&(j, _)| kept[j])
        .map(|(_, r)| Vec2::new(r.l2 as f64, r.l1 as f64))
        .collect();

    if vs.is_empty() {
        return SpanOutcome {
            best: opt[0],
            offset,
            mark: true,
        };
    }

    let decomp = decompose(vs.clone());
    let first_end = decomp.segments[0].end;
    let mut corner = (vs[first_end - 1].x + 0.5) as i32;
    corner = corner.clamp(0, m);

    let slope = linear_least_square(&vs[..first_end], N_REDUCE).k;
    let slope_notify = slope < MIN_SLOPE;

    if decomp.segments.len() <= 1 || slope_notify {
        if slope_notify && enable_correlation {
            let probe = s2.take(1, m.min(LOCATOR_LENGTH) + 1);
            let alignment = local_align(s1, probe);

            let corrected = alignment.range1.begin;
            warn!(offset = corrected, "span correlation triggered");

            if corrected > OFFSET_THRESHOLD {
                return partial_span_impl(s1, s2, corrected, false);
            }
        }

        corner = 0;
    }

    SpanOutcome {
        best: opt[corner as usize],
        offset,
        mark: slope_notify,
    }
}

/// Longest well-aligning prefix of `s2` against a prefix of `s1`, with
/// the breakpoint where the two diverge.
pub fn prefix_span(s1: BioSeq, s2: BioSeq) -> Alignment {
    let o = partial_span_impl(s1, s2, 0, true);
    Alignment {
        range1: Range::new(1, o.offset + o.best.l1 + 1),
        range2: Range::new(1, o.best.l2 + 1),
        loss: o.best.t,
        mark: o.mark,
    }
}

/// Suffix-side counterpart of [`prefix_span`]: both inputs are reversed
/// and the resulting ranges mapped back.
pub fn suffix_span(s1: BioSeq, s2: BioSeq) -> Alignment {
    let n = s1.len();
    let m = s2.len();

    let r1: Vec<u8> = s1.bytes().iter().rev().copied().collect();
    let r2: Vec<u8> = s2.bytes().iter().rev().copied().collect();

    let o = partial_span_impl(BioSeq::new(&r1), BioSeq::new(&r2), 0, true);
    Alignment {
        range1: Range::new(n - o.offset - o.best.l1 + 1, n + 1),
        range2: Range::new(m - o.best.l2 + 1, m + 1),
        loss: o.best.t,
        mark: o.mark,
    }
}
