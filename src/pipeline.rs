//! Per-read pipeline drivers
//!
//! The two parallel stages boil down to one function per read each:
//! [`locate_read`] turns a read into a locate record (window, loss,
//! orientation) against one indexed reference, and [`span_read`] turns a
//! located read into a dump record (two breakpoints plus the inversion
//! score). The CLI fans these out over the worker pool; tests call them
//! directly.

use crate::align::{full_align, local_align};
use crate::dict::Entry;
use crate::index::Index;
use crate::records::{BreakPoint, DumpRecord, LocateRecord};
use crate::sequence::{reverse_complement, BioSeq};
use crate::span::{prefix_span, suffix_span};

/// Locate one read against one indexed reference.
///
/// The fuzzy locator proposes a window and an orientation; the oriented
/// read is then locally aligned against that window to pin the record
/// down and measure its loss.
pub fn locate_read(reference: &Entry, index: &Index, run: &Entry) -> LocateRecord {
    let read = BioSeq::new(&run.sequence);
    let location = index.fuzzy_locate(read);

    let right = location.right.max(location.left);
    let window = BioSeq::new(&reference.sequence).take(location.left, right + 1);

    let result = if location.reversed {
        let oriented = reverse_complement(&run.sequence);
        local_align(window, BioSeq::new(&oriented))
    } else {
        local_align(window, read)
    };

    LocateRecord {
        name: run.name.clone(),
        target: reference.name.clone(),
        left: result.range1.begin + location.left - 1,
        right: result.range1.end - 1 + location.left - 1,
        loss: result.loss,
        reversed: location.reversed,
    }
}

/// Span one located read and derive its dump record.
///
/// `oriented` must already be the reference-strand sequence of the read
/// (reverse-complemented when the locate record says so).
pub fn span_read(reference: &Entry, run_name: &str, oriented: &[u8], rec: &LocateRecord) -> DumpRecord {
    let ref_len = reference.sequence.len() as i32;
    let left = rec.left.clamp(1, ref_len);
    let right = rec.right.clamp(left, ref_len);

    let window = BioSeq::new(&reference.sequence).take(left, right + 1);
    let read = BioSeq::new(oriented);

    let prefix = prefix_span(window, read);
    let suffix = suffix_span(window, read);

    // The read distance between the two breakpoints estimates the
    // inserted sequence length; the INS emitter averages it.
    let distance = suffix.range2.begin - (prefix.range2.end - 1);

    let lp = BreakPoint {
        ref_pos: left + prefix.range1.end - 1,
        read_pos: prefix.range2.end - 1,
        read_len: distance,
    };
    let rp = BreakPoint {
        ref_pos: left + suffix.range1.begin - 2,
        read_pos: suffix.range2.begin,
        read_len: distance,
    };

    DumpRecord {
        run: run_name.to_string(),
        target: reference.name.clone(),
        lp,
        rp,
        inv_score: inversion_score(&reference.sequence, oriented, lp, rp),
    }
}

/// Score the stretch between the two breakpoints as an inversion: align
/// the reference slice against the reverse complement of the read slice.
fn inversion_score(ref_seq: &[u8], read_seq: &[u8], lp: BreakPoint, rp: BreakPoint) -> f64 {
    let ref_len = ref_seq.len() as i32;
    let read_len = read_seq.len() as i32;

    let ref_begin = lp.ref_pos + 1;
    let ref_end = (rp.ref_pos + 1).min(ref_len + 1);
    let read_begin = lp.read_pos + 1;
    let read_end = rp.read_pos.min(read_len + 1);

    if lp.ref_pos <= 0
        || rp.ref_pos <= 0
        || ref_begin >= ref_end
        || read_begin < 1
        || read_begin >= read_end
    {
        return 0.0;
    }

    let middle = BioSeq::new(ref_seq).take(ref_begin, ref_end);
    let flipped = reverse_complement(
        BioSeq::new(read_seq).take(read_begin, read_end).bytes(),
    );

    let loss = full_align(middle, BioSeq::new(&flipped));
    1.0 - 2.0 * loss as f64 / (middle.len() + flipped.len() as i32) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict::Entry;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_seq(rng: &mut StdRng, n: usize) -> Vec<u8> {
        (0..n).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
    }

    fn entry(name: &str, sequence: Vec<u8>) -> Entry {
        Entry {
            name: name.to_string(),
            sequence,
        }
    }

    #[test]
    fn test_locate_read_forward() {
        let mut rng = StdRng::seed_from_u64(31);
        let reference = entry("chr1", random_seq(&mut rng, 4000));

        let mut index = Index::new();
        index.append_seq(&reference.sequence);
        index.build();

        let run = entry("read1", reference.sequence[1000..1400].to_vec());
        let rec = locate_read(&reference, &index, &run);

        assert_eq!(rec.name, "read1");
        assert_eq!(rec.target, "chr1");
        assert!(!rec.reversed);
        assert_eq!(rec.loss, 0);
        assert!((rec.left - 1001).abs() <= 2, "left = {}", rec.left);
        assert!((rec.right - 1400).abs() <= 2, "right = {}", rec.right);
    }

    #[test]
    fn test_locate_read_reversed() {
        let mut rng = StdRng::seed_from_u64(37);
        let reference = entry("chr1", random_seq(&mut rng, 4000));

        let mut index = Index::new();
        index.append_seq(&reference.sequence);
        index.build();

        let run = entry("read1", reverse_complement(&reference.sequence[2000..2400]));
        let rec = locate_read(&reference, &index, &run);

        assert!(rec.reversed);
        assert_eq!(rec.loss, 0);
        assert!((rec.left - 2001).abs() <= 2);
    }

    #[test]
    fn test_span_read_clean_read_brackets_window() {
        let mut rng = StdRng::seed_from_u64(41);
        let reference = entry("chr1", random_seq(&mut rng, 3000));
        // A read deleting [1201, 1800] of the reference.
        let mut read = reference.sequence[600..1200].to_vec();
        read.extend_from_slice(&reference.sequence[1800..2400]);

        let rec = LocateRecord {
            name: "read1".to_string(),
            target: "chr1".to_string(),
            left: 601,
            right: 2400,
            loss: 600,
            reversed: false,
        };

        let dump = span_read(&reference, "read1", &read, &rec);
        assert_eq!(dump.run, "read1");
        assert!((dump.lp.ref_pos - 1200).abs() <= 80, "lp = {}", dump.lp.ref_pos);
        assert!((dump.rp.ref_pos - 1801).abs() <= 80, "rp = {}", dump.rp.ref_pos);
        assert!((dump.lp.read_pos - 600).abs() <= 80);
        assert!((dump.rp.read_pos - 601).abs() <= 80);
        // No sequence sits between the breaks on the read side.
        assert!(dump.lp.read_len.abs() <= 160);
        // A deletion read is no inversion.
        assert!(dump.inv_score < INV_TEST_BOUND);
    }

    #[test]
    fn test_span_read_insert_distance() {
        let mut rng = StdRng::seed_from_u64(47);
        let reference = entry("chr1", random_seq(&mut rng, 2600));
        // A read with 300 novel symbols spliced in after reference
        // position 1100.
        let mut read = reference.sequence[500..1100].to_vec();
        read.extend_from_slice(&random_seq(&mut rng, 300));
        read.extend_from_slice(&reference.sequence[1100..1700]);

        let rec = LocateRecord {
            name: "read1".to_string(),
            target: "chr1".to_string(),
            left: 501,
            right: 1700,
            loss: 300,
            reversed: false,
        };

        let dump = span_read(&reference, "read1", &read, &rec);
        assert!((dump.lp.ref_pos - 1100).abs() <= 80, "lp = {}", dump.lp.ref_pos);
        assert!((dump.rp.ref_pos - 1100).abs() <= 80, "rp = {}", dump.rp.ref_pos);
        assert!((dump.lp.read_len - 300).abs() <= 120, "len = {}", dump.lp.read_len);
        assert_eq!(dump.lp.read_len, dump.rp.read_len);
    }

    const INV_TEST_BOUND: f64 = 0.65;

    #[test]
    fn test_span_read_detects_inversion_score() {
        let mut rng = StdRng::seed_from_u64(43);
        let reference = entry("chr1", random_seq(&mut rng, 3000));
        // The read carries [1201, 1800] reverse-complemented in place.
        let mut read = reference.sequence[600..1200].to_vec();
        read.extend_from_slice(&reverse_complement(&reference.sequence[1200..1800]));
        read.extend_from_slice(&reference.sequence[1800..2400]);

        let rec = LocateRecord {
            name: "read1".to_string(),
            target: "chr1".to_string(),
            left: 601,
            right: 2400,
            loss: 300,
            reversed: false,
        };

        let dump = span_read(&reference, "read1", &read, &rec);
        assert!((dump.lp.ref_pos - 1200).abs() <= 80, "lp = {}", dump.lp.ref_pos);
        assert!((dump.rp.ref_pos - 1801).abs() <= 80, "rp = {}", dump.rp.ref_pos);
        assert!(dump.inv_score >= INV_TEST_BOUND, "score = {}", dump.inv_score);
    }

    #[test]
    fn test_inversion_score_empty_window() {
        let s = b"ACGTACGTACGT".to_vec();
        let lp = BreakPoint {
            ref_pos: 6,
            read_pos: 6,
            read_len: 6,
        };
        let rp = BreakPoint {
            ref_pos: 6,
            read_pos: 6,
            read_len: 6,
        };
        assert_eq!(inversion_score(&s, &s, lp, rp), 0.0);
    }
}
