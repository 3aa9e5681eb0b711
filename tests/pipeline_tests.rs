//! End-to-end pipeline tests on synthetic references
//!
//! These run the real three-stage pipeline in-process: locate a read,
//! span it, feed the dump records to the caller, and check the emitted
//! SV events against the planted truth.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rifty::{
    locate_read, span_read, BioSeq, Caller, Dict, Entry, Index, LocateRecord, SvKind, SvRecord,
};

fn random_seq(rng: &mut StdRng, n: usize) -> Vec<u8> {
    (0..n).map(|_| b"ACGT"[rng.random_range(0..4)]).collect()
}

fn entry(name: &str, sequence: Vec<u8>) -> Entry {
    Entry {
        name: name.to_string(),
        sequence,
    }
}

fn sv_matches(record: &SvRecord, kind: SvKind, left: i32, right: i32, tolerance: i32) -> bool {
    match record {
        SvRecord::Sv {
            kind: k,
            left: l,
            right: r,
            ..
        } => *k == kind && (l - left).abs() <= tolerance && (r - right).abs() <= tolerance,
        SvRecord::Tra { .. } => false,
    }
}

#[test]
fn test_planted_deletion_end_to_end() {
    let mut rng = StdRng::seed_from_u64(101);
    let reference = entry("chr1", random_seq(&mut rng, 2600));

    // Two reads spanning a 600-symbol deletion at [1101, 1700].
    let mut deleted = reference.sequence[500..1100].to_vec();
    deleted.extend_from_slice(&reference.sequence[1700..2300]);

    let mut refs = Dict::default();
    refs.push(reference);
    let mut runs = Dict::default();
    runs.push(entry("read1", deleted.clone()));
    runs.push(entry("read2", deleted));
    runs.build_index();

    let mut index = Index::new();
    index.append_seq(&refs[0].sequence);
    index.build();

    // Stage 1: locate (the second read is identical, so its record is
    // derived rather than recomputed).
    let located = locate_read(&refs[0], &index, &runs[0]);
    assert!(!located.reversed);

    let records = vec![
        located.clone(),
        LocateRecord {
            name: "read2".to_string(),
            ..located
        },
    ];

    // Stage 2: span.
    let mut caller = Caller::new(&refs, &runs);
    for (i, rec) in records.iter().enumerate() {
        let dump = span_read(&refs[0], &runs[i].name, &runs[i].sequence, rec);
        assert!((dump.lp.ref_pos - 1100).abs() <= 100, "lp = {}", dump.lp.ref_pos);
        assert!((dump.rp.ref_pos - 1701).abs() <= 100, "rp = {}", dump.rp.ref_pos);
        caller.ingest(&dump);
    }

    // Stage 3: call.
    let events = caller.call();
    assert!(
        events
            .iter()
            .any(|e| sv_matches(e, SvKind::Del, 1100, 1701, 120)),
        "no DEL near (1100, 1701) in {:?}",
        events
    );
}

#[test]
fn test_planted_insertion_end_to_end() {
    let mut rng = StdRng::seed_from_u64(103);
    let reference = entry("chr1", random_seq(&mut rng, 2600));

    // Two reads with the same 300-symbol insert after position 1100.
    let insert = random_seq(&mut rng, 300);
    let mut inserted = reference.sequence[500..1100].to_vec();
    inserted.extend_from_slice(&insert);
    inserted.extend_from_slice(&reference.sequence[1100..1700]);

    let mut refs = Dict::default();
    refs.push(reference);
    let mut runs = Dict::default();
    runs.push(entry("read1", inserted.clone()));
    runs.push(entry("read2", inserted));
    runs.build_index();

    let record = LocateRecord {
        name: "read1".to_string(),
        target: "chr1".to_string(),
        left: 501,
        right: 1700,
        loss: 300,
        reversed: false,
    };

    let mut caller = Caller::new(&refs, &runs);
    for i in 0..2 {
        let rec = LocateRecord {
            name: runs[i].name.clone(),
            ..record.clone()
        };
        let dump = span_read(&refs[0], &runs[i].name, &runs[i].sequence, &rec);
        caller.ingest(&dump);
    }

    let events = caller.call();
    let ins = events.iter().find_map(|e| match e {
        SvRecord::Sv {
            kind: SvKind::Ins,
            left,
            right,
            ..
        } => Some((*left, *right)),
        _ => None,
    });

    let (left, right) = ins.expect("no INS emitted");
    assert!((left - 1100).abs() <= 120, "left = {}", left);
    assert!((right - left - 300).abs() <= 120, "insert length = {}", right - left);
}

#[test]
fn test_locate_and_exact_queries_agree() {
    let mut rng = StdRng::seed_from_u64(107);
    let reference = entry("chr1", random_seq(&mut rng, 3000));

    let mut index = Index::new();
    index.append_seq(&reference.sequence);
    index.build();

    // Every exact 25-mer is found by the exact locator at full length.
    for start in [0usize, 700, 1500, 2900 - 25] {
        let probe = &reference.sequence[start..start + 25];
        let token = index.locate(BioSeq::new(probe));
        assert_eq!(token.len, 25);
        assert!(index.rpset(token).contains(&((start + 25) as i32)));
    }
}
