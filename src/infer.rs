//! SV inference over persisted per-read breakpoints
//!
//! Endpoints live in a flat arena; the typed link graph is adjacency by
//! `(kind, arena index)` and the DFS marker is a per-run bitmap, so there
//! are no pointer cycles to manage. The caller ingests dump records,
//! probes endpoint pairings per reference (INV, DEL/DUP, INS), aggregates
//! connected components per link kind, then pairs compacted windows
//! across references for TRA and finishes with the locator-based extra
//! probes.
//!
//! Emission is deterministic: references in load order, endpoint lists
//! sorted by reference position.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::align::{full_align, local_align};
use crate::dict::Dict;
use crate::records::{DumpRecord, SvKind, SvRecord};
use crate::sequence::BioSeq;
use crate::span::LOCATOR_LENGTH;

/// Single-linkage clustering distance for endpoint positions.
pub const SNAP_DISTANCE: i32 = 200;
/// Largest SV interval considered.
pub const MAX_SV_LENGTH: i32 = 1100;
/// Smallest SV interval considered; doubles as the INS pairing distance.
pub const MIN_SV_LENGTH: i32 = 50;
/// Minimum inversion-match score for the INV probe.
pub const INV_MIN_SCORE: f64 = 0.65;
/// Read window length around a breakpoint for DEL/DUP confirmation.
pub const MAX_CONJECTION_LENGTH: i32 = 150;
/// Minimum conjection alignment rate to accept a DEL/DUP link.
pub const MIN_CONJECTION_MATCH_RATE: f64 = 0.6;
/// Maximum window-length difference for a TRA pairing.
pub const MAX_TRA_DISCREPANCY: f64 = 20.0;
/// Locator length for the extra DEL/DUP probes.
pub const EXTRA_LOCATOR_LENGTH: i32 = 256;
/// Reference scan window for the extra DEL/DUP probes.
pub const SCAN_LENGTH: i32 = 1800;
/// Minimum locator match rate for the extra DEL/DUP probes.
pub const LOCATOR_MIN_MATCH_RATE: f64 = 0.75;

/// Which side of a read's alignment an endpoint came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Clone, Debug)]
struct Endpoint {
    run: String,
    /// Reference position.
    pos1: i32,
    /// Read position.
    pos2: i32,
    /// Read distance between the record's breakpoints.
    len: i32,
    adj: Vec<(SvKind, usize)>,
}

#[derive(Clone, Copy, Debug)]
struct InvCandidate {
    left: i32,
    right: i32,
    score: f64,
}

type EKey = (String, Side);
type PosMap = FxHashMap<EKey, Vec<f64>>;
type MarkMap = FxHashMap<EKey, Vec<bool>>;

fn snaps(a: i32, b: i32, max_dist: i32) -> bool {
    (a - b).abs() <= max_dist
}

/// SV inference engine. Ingest dump records, then [`Caller::call`] once.
pub struct Caller<'a> {
    refs: &'a Dict,
    runs: &'a Dict,
    arena: Vec<Endpoint>,
    emap: FxHashMap<EKey, Vec<usize>>,
    rmap: FxHashMap<String, Vec<InvCandidate>>,
    marked: Vec<bool>,
}

impl<'a> Caller<'a> {
    /// `runs` must already be oriented (reverse-complemented where the
    /// locate stage said so) and name-indexed.
    pub fn new(refs: &'a Dict, runs: &'a Dict) -> Self {
        Caller {
            refs,
            runs,
            arena: Vec::new(),
            emap: FxHashMap::default(),
            rmap: FxHashMap::default(),
            marked: Vec::new(),
        }
    }

    /// Add one per-read record. Endpoints with non-positive reference
    /// positions are discarded; a record whose endpoints are ordered
    /// contributes a candidate inversion range.
    pub fn ingest(&mut self, rec: &DumpRecord) {
        if rec.lp.ref_pos > 0 {
            let i = self.arena.len();
            self.arena.push(Endpoint {
                run: rec.run.clone(),
                pos1: rec.lp.ref_pos,
                pos2: rec.lp.read_pos,
                len: rec.lp.read_len,
                adj: Vec::new(),
            });
            self.emap
                .entry((rec.target.clone(), Side::Left))
                .or_default()
                .push(i);
        }

        if rec.rp.ref_pos > 0 {
            let i = self.arena.len();
            self.arena.push(Endpoint {
                run: rec.run.clone(),
                pos1: rec.rp.ref_pos,
                pos2: rec.rp.read_pos,
                len: rec.rp.read_len,
                adj: Vec::new(),
            });
            self.emap
                .entry((rec.target.clone(), Side::Right))
                .or_default()
                .push(i);
        }

        if rec.lp.ref_pos > 0 && rec.rp.ref_pos > 0 && rec.lp.ref_pos < rec.rp.ref_pos {
            self.rmap.entry(rec.target.clone()).or_default().push(InvCandidate {
                left: rec.lp.ref_pos,
                right: rec.rp.ref_pos,
                score: rec.inv_score,
            });
        }
    }

    /// Run the whole inference pass and return the SV records in
    /// emission order.
    pub fn call(mut self) -> Vec<SvRecord> {
        let refs = self.refs;

        // Position-sorted lists make link construction and aggregation
        // independent of record order.
        let arena = &self.arena;
        for list in self.emap.values_mut() {
            list.sort_by_key(|&i| (arena[i].pos1, i));
        }

        for e in refs.iter() {
            self.probe(&e.name);
        }

        self.marked = vec![false; self.arena.len()];

        let mut out = Vec::new();
        self.aggregate(SvKind::Inv, &mut out);
        self.aggregate(SvKind::Del, &mut out);
        self.aggregate(SvKind::Dup, &mut out);
        self.aggregate(SvKind::Ins, &mut out);

        let pmap = self.compact();
        let mut marks: MarkMap = pmap
            .iter()
            .map(|(k, v)| (k.clone(), vec![false; v.len()]))
            .collect();

        self.pair_tra(&pmap, &mut marks, &mut out);
        self.probe_extra_del_dup(&mut out);
        self.emit_extra_inv(&pmap, &marks, &mut out);

        out
    }

    fn link(&mut self, kind: SvKind, u: usize, v: usize) {
        self.arena[u].adj.push((kind, v));
        self.arena[v].adj.push((kind, u));
    }

    fn probe(&mut self, name: &str) {
        let lefts = self
            .emap
            .get(&(name.to_string(), Side::Left))
            .cloned()
            .unwrap_or_default();
        let rights = self
            .emap
            .get(&(name.to_string(), Side::Right))
            .cloned()
            .unwrap_or_default();
        let candidates = self.rmap.get(name).cloned().unwrap_or_default();

        // INV: endpoint pairs snapping to a well-scored candidate range.
        for c in &candidates {
            if c.score < INV_MIN_SCORE {
                continue;
            }

            for &li in &lefts {
                for &ri in &rights {
                    if snaps(self.arena[li].pos1, c.left, SNAP_DISTANCE)
                        && snaps(self.arena[ri].pos1, c.right, SNAP_DISTANCE)
                    {
                        self.link(SvKind::Inv, li, ri);
                    }
                }
            }
        }

        // DEL/DUP: endpoint pairs at SV distance whose read conjections
        // align.
        for &li in &lefts {
            for &ri in &rights {
                let dist = (self.arena[li].pos1 - self.arena[ri].pos1).abs();
                if dist < MIN_SV_LENGTH || dist > MAX_SV_LENGTH {
                    continue;
                }

                if self.conjections_match(li, ri) {
                    if self.arena[li].pos1 < self.arena[ri].pos1 {
                        self.link(SvKind::Del, li, ri);
                    } else {
                        self.link(SvKind::Dup, li, ri);
                    }
                }
            }
        }

        // INS: endpoint pairs that nearly coincide on the reference.
        for &li in &lefts {
            for &ri in &rights {
                if snaps(self.arena[li].pos1, self.arena[ri].pos1, MIN_SV_LENGTH) {
                    self.link(SvKind::Ins, li, ri);
                }
            }
        }
    }

    fn conjections_match(&self, li: usize, ri: usize) -> bool {
        let lp = &self.arena[li];
        let rp = &self.arena[ri];

        let (Some(run1), Some(run2)) = (self.runs.find(&lp.run), self.runs.find(&rp.run)) else {
            return false;
        };

        let size1 = run1.sequence.len() as i32;
        let size2 = run2.sequence.len() as i32;

        let left_len = MAX_CONJECTION_LENGTH.min(lp.pos2.min(rp.pos2));
        let right_len = MAX_CONJECTION_LENGTH.min((size1 - lp.pos2).min(size2 - rp.pos2));
        let len = left_len + right_len;
        if left_len < 0 || right_len < 0 || len <= 0 {
            return false;
        }

        let seq1 = BioSeq::new(&run1.sequence);
        let seq2 = BioSeq::new(&run2.sequence);
        let slice1 = seq1.take(
            1.max(lp.pos2 - left_len + 1),
            (size1 + 1).min(lp.pos2 + right_len + 1),
        );
        let slice2 = seq2.take(
            1.max(rp.pos2 - left_len + 1),
            (size2 + 1).min(rp.pos2 + right_len + 1),
        );

        let loss = full_align(slice1, slice2);
        let rate = 1.0 - loss as f64 / len as f64;
        rate >= MIN_CONJECTION_MATCH_RATE
    }

    fn collect(&mut self, kind: SvKind, start: usize) -> [Vec<usize>; 2] {
        let mut lists: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        let mut stack = vec![(start, 0usize)];

        while let Some((u, side)) = stack.pop() {
            if self.marked[u] {
                continue;
            }
            self.marked[u] = true;
            lists[side].push(u);

            for &(k, v) in self.arena[u].adj.iter().rev() {
                if k == kind {
                    stack.push((v, side ^ 1));
                }
            }
        }

        lists
    }

    fn aggregate(&mut self, kind: SvKind, out: &mut Vec<SvRecord>) {
        let refs = self.refs;
        self.marked.iter_mut().for_each(|m| *m = false);

        for e in refs.iter() {
            let list = match self.emap.get(&(e.name.clone(), Side::Left)) {
                Some(list) => list.clone(),
                None => continue,
            };

            for &i in &list {
                if self.marked[i] {
                    continue;
                }

                let [l, r] = self.collect(kind, i);
                if !l.is_empty() && !r.is_empty() {
                    let record = if kind == SvKind::Ins {
                        self.emit_ins(&e.name, &l, &r)
                    } else {
                        self.emit_normal(kind, &e.name, &l, &r)
                    };
                    out.push(record);
                }
            }
        }
    }

    fn mean_pos(&self, list: &[usize]) -> f64 {
        let sum: f64 = list.iter().map(|&i| self.arena[i].pos1 as f64).sum();
        sum / list.len() as f64
    }

    fn emit_normal(&self, kind: SvKind, name: &str, l: &[usize], r: &[usize]) -> SvRecord {
        let mut left = self.mean_pos(l).round() as i32;
        let mut right = self.mean_pos(r).round() as i32;
        if right < left {
            std::mem::swap(&mut left, &mut right);
        }

        SvRecord::Sv {
            kind,
            target: name.to_string(),
            left,
            right,
        }
    }

    fn emit_ins(&self, name: &str, l: &[usize], r: &[usize]) -> SvRecord {
        let sum: f64 = l
            .iter()
            .chain(r.iter())
            .map(|&i| self.arena[i].pos1 as f64)
            .sum();
        let left = (sum / (l.len() + r.len()) as f64).round() as i32;

        let mut sum = 0.0;
        let mut count = 0i64;
        let mut seen: FxHashSet<&str> = FxHashSet::default();

        for &i in l {
            let ep = &self.arena[i];
            if ep.len > MAX_SV_LENGTH {
                continue;
            }
            sum += ep.len as f64;
            count += 1;
            seen.insert(&ep.run);
        }

        for &i in r {
            let ep = &self.arena[i];
            if ep.len > MAX_SV_LENGTH {
                continue;
            }

            // A read seen on both sides pins the insert length down.
            let scale = if seen.contains(ep.run.as_str()) { 4 } else { 1 };
            sum += (ep.len * scale) as f64;
            count += scale as i64;
        }

        let right = if count == 0 {
            left
        } else {
            left + (sum / count as f64).round() as i32
        };

        SvRecord::Sv {
            kind: SvKind::Ins,
            target: name.to_string(),
            left,
            right,
        }
    }

    /// Snap-cluster each (reference, side) position list and replace the
    /// clusters by their means.
    fn compact(&self) -> PosMap {
        let mut pmap = PosMap::default();

        for (key, eps) in &self.emap {
            let mut list: Vec<f64> = eps.iter().map(|&i| self.arena[i].pos1 as f64).collect();
            list.sort_by(f64::total_cmp);

            let compacted = pmap.entry(key.clone()).or_default();
            let mut i = 0;
            while i < list.len() {
                let mut j = i;
                let mut k = i + 1;
                while k < list.len() && (list[j] - list[k]).abs() <= SNAP_DISTANCE as f64 {
                    j = k;
                    k += 1;
                }

                let sum: f64 = list[i..k].iter().sum();
                compacted.push(sum / (k - i) as f64);
                i = k;
            }
        }

        pmap
    }

    fn pair_tra(&self, pmap: &PosMap, marks: &mut MarkMap, out: &mut Vec<SvRecord>) {
        let refs = self.refs;

        let positions = |name: &str, side: Side| -> Vec<f64> {
            pmap.get(&(name.to_string(), side)).cloned().unwrap_or_default()
        };

        for a in 0..refs.len() {
            let n1 = &refs[a].name;
            let l1s = positions(n1, Side::Left);
            let r1s = positions(n1, Side::Right);

            for (i1, &l1) in l1s.iter().enumerate() {
                for (j1, &r1) in r1s.iter().enumerate() {
                    let len1 = r1 - l1;
                    if len1 < MIN_SV_LENGTH as f64 || len1 > MAX_SV_LENGTH as f64 {
                        continue;
                    }

                    for b in 0..refs.len() {
                        let n2 = &refs[b].name;
                        if n2 <= n1 {
                            continue;
                        }

                        let l2s = positions(n2, Side::Left);
                        let r2s = positions(n2, Side::Right);
                        for (i2, &l2) in l2s.iter().enumerate() {
                            for (j2, &r2) in r2s.iter().enumerate() {
                                let len2 = r2 - l2;
                                if len2 < MIN_SV_LENGTH as f64 || len2 > MAX_SV_LENGTH as f64 {
                                    continue;
                                }

                                if (len1 - len2).abs() <= MAX_TRA_DISCREPANCY {
                                    if let Some(m) = marks.get_mut(&(n1.clone(), Side::Left)) {
                                        m[i1] = true;
                                    }
                                    if let Some(m) = marks.get_mut(&(n1.clone(), Side::Right)) {
                                        m[j1] = true;
                                    }
                                    if let Some(m) = marks.get_mut(&(n2.clone(), Side::Left)) {
                                        m[i2] = true;
                                    }
                                    if let Some(m) = marks.get_mut(&(n2.clone(), Side::Right)) {
                                        m[j2] = true;
                                    }

                                    out.push(SvRecord::Tra {
                                        target1: n1.clone(),
                                        left1: l1.round() as i32,
                                        right1: r1.round() as i32,
                                        target2: n2.clone(),
                                        left2: l2.round() as i32,
                                        right2: r2.round() as i32,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Link-free endpoints get one more chance: relocate a long read
    /// locator on either side of the breakpoint by local alignment.
    fn probe_extra_del_dup(&self, out: &mut Vec<SvRecord>) {
        let refs = self.refs;

        for e in refs.iter() {
            let ref_len = e.sequence.len() as i32;
            let ref_seq = BioSeq::new(&e.sequence);

            let lefts = self
                .emap
                .get(&(e.name.clone(), Side::Left))
                .cloned()
                .unwrap_or_default();
            for li in lefts {
                let lp = &self.arena[li];
                let Some(run) = self.runs.find(&lp.run) else { continue };
                let run_len = run.sequence.len() as i32;

                if !lp.adj.is_empty() || lp.pos2 < 0 || lp.pos2 >= run_len - LOCATOR_LENGTH {
                    continue;
                }

                let len = EXTRA_LOCATOR_LENGTH.min(run_len - lp.pos2);
                let locator = BioSeq::new(&run.sequence).take(lp.pos2 + 1, lp.pos2 + len + 1);

                // DEL: the continuation should land downstream.
                let right = ref_len.min(lp.pos1 + SCAN_LENGTH);
                if lp.pos1 >= 1 && lp.pos1 + 1 < right {
                    let scan = ref_seq.take(lp.pos1 + 1, right);
                    let result = local_align(scan, locator);
                    let pos = lp.pos1 + result.range1.begin;

                    if result.match_rate2() > LOCATOR_MIN_MATCH_RATE
                        && (pos - lp.pos1).abs() > MIN_SV_LENGTH
                    {
                        out.push(SvRecord::Sv {
                            kind: SvKind::Del,
                            target: e.name.clone(),
                            left: lp.pos1,
                            right: pos,
                        });
                    }
                }

                // DUP: or upstream, before the breakpoint.
                let left = 1.max(lp.pos1 - SCAN_LENGTH);
                if left < lp.pos1 && lp.pos1 <= ref_len + 1 {
                    let scan = ref_seq.take(left, lp.pos1);
                    let result = local_align(scan, locator);
                    let pos = left + result.range1.begin;

                    if result.match_rate2() > LOCATOR_MIN_MATCH_RATE
                        && (pos - lp.pos1).abs() > MIN_SV_LENGTH
                    {
                        out.push(SvRecord::Sv {
                            kind: SvKind::Dup,
                            target: e.name.clone(),
                            left: pos,
                            right: lp.pos1,
                        });
                    }
                }
            }

            let rights = self
                .emap
                .get(&(e.name.clone(), Side::Right))
                .cloned()
                .unwrap_or_default();
            for ri in rights {
                let rp = &self.arena[ri];
                if !rp.adj.is_empty() || rp.pos2 <= LOCATOR_LENGTH {
                    continue;
                }

                let Some(run) = self.runs.find(&rp.run) else { continue };
                let run_len = run.sequence.len() as i32;
                if rp.pos2 > run_len + 1 {
                    continue;
                }

                let len = EXTRA_LOCATOR_LENGTH.min(rp.pos2 - 1);
                let locator = BioSeq::new(&run.sequence).take(rp.pos2 - len, rp.pos2);

                // DEL: the lead-in should land upstream.
                let left = 1.max(rp.pos1 - SCAN_LENGTH);
                if left < rp.pos1 && rp.pos1 <= ref_len + 1 {
                    let scan = ref_seq.take(left, rp.pos1);
                    let result = local_align(scan, locator);
                    let pos = left + result.range1.end;

                    if result.match_rate2() > LOCATOR_MIN_MATCH_RATE
                        && (rp.pos1 - pos).abs() > MIN_SV_LENGTH
                    {
                        out.push(SvRecord::Sv {
                            kind: SvKind::Del,
                            target: e.name.clone(),
                            left: pos,
                            right: rp.pos1,
                        });
                    }
                }

                // DUP: or downstream, past the breakpoint.
                let right = ref_len.min(rp.pos1 + SCAN_LENGTH);
                if rp.pos1 >= 1 && rp.pos1 + 1 < right {
                    let scan = ref_seq.take(rp.pos1 + 1, right);
                    let result = local_align(scan, locator);
                    let pos = rp.pos1 + result.range1.end;

                    if result.match_rate2() > LOCATOR_MIN_MATCH_RATE
                        && (rp.pos1 - pos).abs() > MIN_SV_LENGTH
                    {
                        out.push(SvRecord::Sv {
                            kind: SvKind::Dup,
                            target: e.name.clone(),
                            left: rp.pos1,
                            right: pos,
                        });
                    }
                }
            }
        }
    }

    /// Compacted position pairs untouched by TRA at SV distance are
    /// reported as inversions.
    fn emit_extra_inv(&self, pmap: &PosMap, marks: &MarkMap, out: &mut Vec<SvRecord>) {
        let refs = self.refs;
        let empty_pos: Vec<f64> = Vec::new();
        let empty_mark: Vec<bool> = Vec::new();

        for e in refs.iter() {
            let lkey = (e.name.clone(), Side::Left);
            let rkey = (e.name.clone(), Side::Right);
            let ls = pmap.get(&lkey).unwrap_or(&empty_pos);
            let rs = pmap.get(&rkey).unwrap_or(&empty_pos);
            let lm = marks.get(&lkey).unwrap_or(&empty_mark);
            let rm = marks.get(&rkey).unwrap_or(&empty_mark);

            for (i, &l) in ls.iter().enumerate() {
                for (j, &r) in rs.iter().enumerate() {
                    let len = r - l;
                    if !lm.get(i).copied().unwrap_or(false)
                        && !rm.get(j).copied().unwrap_or(false)
                        && len >= MIN_SV_LENGTH as f64
                        && len <= MAX_SV_LENGTH as f64
                    {
                        out.push(SvRecord::Sv {
                            kind: SvKind::Inv,
                            target: e.name.clone(),
                            left: l.round() as i32,
                            right: r.round() as i32,
                        });
                    }
                }
            }
        }
    }
}
