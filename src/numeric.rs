//! Small numeric helpers for the span aligner
//!
//! Linear least squares with iterative outlier reduction, a progressive
//! convex-hull area sweep, and the "french-stick" decomposition that
//! splits a monotone curve into K pieces minimising the summed bend-area
//! proxy. The decomposition is what turns the span DP frontier into a
//! breakpoint.

use std::ops::{Add, Div, Mul, Sub};

/// 2D point / vector over f64.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Cross product (z component).
    pub fn cross(self, rhs: Vec2) -> f64 {
        self.x * rhs.y - self.y * rhs.x
    }

    pub fn len2(self) -> f64 {
        self.x * self.x + self.y * self.y
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

/// A fitted line y = k*x + b.
#[derive(Clone, Copy, Debug)]
pub struct Line {
    pub k: f64,
    pub b: f64,
}

/// Least-squares line fit.
///
/// With `n_reduce > 0`, points deviating more than twice the mean absolute
/// deviation are dropped and the fit repeats, as long as at least 30
/// points survive and the set actually shrank.
pub fn linear_least_square(points: &[Vec2], n_reduce: i32) -> Line {
    const N_THRESHOLD: usize = 30;

    let n = points.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sx2) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        sx += p.x;
        sy += p.y;
        sxy += p.x * p.y;
        sx2 += p.x * p.x;
    }

    let k = (n * sxy - sx * sy) / (n * sx2 - sx * sx);

    if n_reduce > 0 {
        let b = (sy - k * sx) / n;
        let dev = |p: &Vec2| (p.y - (k * p.x + b)).abs();

        let sdev: f64 = points.iter().map(dev).sum();
        let threshold = 2.0 * sdev / n;

        let vs: Vec<Vec2> = points.iter().copied().filter(|p| dev(p) <= threshold).collect();
        if N_THRESHOLD <= vs.len() && vs.len() < points.len() {
            return linear_least_square(&vs, n_reduce - 1);
        }
    }

    Line {
        k,
        b: (sy - k * sx) / n,
    }
}

const UPPER: bool = true;
const LOWER: bool = false;

fn last_edge(vs: &[Vec2]) -> f64 {
    if vs.len() < 2 {
        return 0.0;
    }
    let p = vs[vs.len() - 1];
    let q = vs[vs.len() - 2];
    p.cross(q) / 2.0
}

fn push_into<const IS_UPPER: bool>(vs: &mut Vec<Vec2>, p: Vec2) -> f64 {
    let mut sum = 0.0;
    while vs.len() > 1 {
        let q = vs[vs.len() - 1];
        let r = vs[vs.len() - 2];
        let c = (q - p).cross(r - p);

        let pred = if IS_UPPER { c <= 0.0 } else { c >= 0.0 };
        if pred {
            sum += last_edge(vs);
            vs.pop();
        } else {
            break;
        }
    }

    vs.push(p);
    sum
}

/// Running |area| between the upper and lower envelopes of the point
/// prefix ending at each position.
fn progressive_convex_hull(points: impl Iterator<Item = Vec2>, dest: &mut [f64]) {
    let mut sum = 0.0;
    let mut upper: Vec<Vec2> = Vec::new();
    let mut lower: Vec<Vec2> = Vec::new();

    for (p, out) in points.zip(dest.iter_mut()) {
        sum += push_into::<UPPER>(&mut upper, p);
        sum -= push_into::<LOWER>(&mut lower, p);
        sum += last_edge(&lower);
        sum -= last_edge(&upper);
        *out = sum.abs();
    }
}

const BEND_COEFFICIENT: f64 = 0.45;

fn bend_proxy(areas: &mut [f64]) {
    for a in areas.iter_mut() {
        *a = a.powf(BEND_COEFFICIENT);
    }
}

/// One contiguous piece of a decomposition, as a half-open index range
/// into the input point list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub begin: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// A K-piece split of a curve and its total bend area.
#[derive(Clone, Debug)]
pub struct Decomposition {
    pub segments: Vec<Segment>,
    pub area: f64,
}

fn decompose_impl(vs: &[Vec2], suffix: &[f64], k: usize, beg: usize) -> Decomposition {
    let n = vs.len();
    if k == 1 {
        return Decomposition {
            segments: vec![Segment { begin: beg, end: n }],
            area: suffix[beg],
        };
    }

    let m = n - beg;

    let mut prefix = vec![0.0; m];
    progressive_convex_hull(vs[beg..].iter().copied(), &mut prefix);
    bend_proxy(&mut prefix);

    let mut opt = Decomposition {
        segments: Vec::new(),
        area: f64::MAX,
    };
    let mut opt_i = 0;
    for i in 0..m {
        if i + k > m {
            break;
        }
        if prefix[i] > opt.area {
            break;
        }

        let sub = decompose_impl(vs, suffix, k - 1, beg + i + 1);
        let new_area = prefix[i] + sub.area;
        if opt.area > new_area {
            opt_i = i;
            opt.area = new_area;
            opt.segments = sub.segments;
        }
    }

    opt.segments.push(Segment {
        begin: beg,
        end: beg + opt_i + 1,
    });
    opt
}

/// Split a curve (sorted by x) into `k` contiguous pieces minimising the
/// summed bend-area proxy of the pieces.
pub fn french_stick_decompose(vs: &[Vec2], k: usize) -> Decomposition {
    debug_assert!(k > 0);
    debug_assert!(!vs.is_empty());
    debug_assert!(vs.windows(2).all(|w| w[0].x <= w[1].x));

    let n = vs.len();

    let mut suffix = vec![0.0; n];
    progressive_convex_hull(vs.iter().rev().copied(), &mut suffix);
    suffix.reverse();
    bend_proxy(&mut suffix);

    let mut result = decompose_impl(vs, &suffix, k, 0);
    result.segments.reverse();
    result
}
