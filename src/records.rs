//! Text record formats shared between pipeline stages
//!
//! Three line-oriented formats flow between the stages: locate records
//! (where a read landed), dump records (per-read breakpoints + inversion
//! score), and the final SV lines. Parsing is tolerant: lines with too
//! few fields are skipped by the loaders, which report how many they
//! dropped.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Result, RiftyError};

/// One locate-stage record: `name target left right loss reversed`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocateRecord {
    pub name: String,
    pub target: String,
    pub left: i32,
    pub right: i32,
    pub loss: i32,
    pub reversed: bool,
}

impl fmt::Display for LocateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.name,
            self.target,
            self.left,
            self.right,
            self.loss,
            self.reversed as i32
        )
    }
}

fn field<T: FromStr>(fields: &mut std::str::SplitWhitespace<'_>) -> Option<T> {
    fields.next()?.parse().ok()
}

impl LocateRecord {
    /// Parse one record line; `None` for blank or malformed lines.
    pub fn parse(line: &str) -> Option<LocateRecord> {
        let mut fields = line.split_whitespace();
        let record = LocateRecord {
            name: fields.next()?.to_string(),
            target: fields.next()?.to_string(),
            left: field(&mut fields)?,
            right: field(&mut fields)?,
            loss: field(&mut fields)?,
            reversed: field::<i32>(&mut fields)? != 0,
        };
        Some(record)
    }
}

/// A persisted breakpoint: reference position, read position, and the
/// read distance between its record's two breakpoints (the insert-length
/// estimate).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakPoint {
    pub ref_pos: i32,
    pub read_pos: i32,
    pub read_len: i32,
}

/// One span-stage record:
/// `run target lp.ref lp.read lp.len rp.ref rp.read rp.len inv_score`.
#[derive(Clone, Debug, PartialEq)]
pub struct DumpRecord {
    pub run: String,
    pub target: String,
    pub lp: BreakPoint,
    pub rp: BreakPoint,
    pub inv_score: f64,
}

impl fmt::Display for DumpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {:.4}",
            self.run,
            self.target,
            self.lp.ref_pos,
            self.lp.read_pos,
            self.lp.read_len,
            self.rp.ref_pos,
            self.rp.read_pos,
            self.rp.read_len,
            self.inv_score
        )
    }
}

impl DumpRecord {
    /// Parse one record line; `None` for blank or malformed lines.
    pub fn parse(line: &str) -> Option<DumpRecord> {
        let mut fields = line.split_whitespace();
        let record = DumpRecord {
            run: fields.next()?.to_string(),
            target: fields.next()?.to_string(),
            lp: BreakPoint {
                ref_pos: field(&mut fields)?,
                read_pos: field(&mut fields)?,
                read_len: field(&mut fields)?,
            },
            rp: BreakPoint {
                ref_pos: field(&mut fields)?,
                read_pos: field(&mut fields)?,
                read_len: field(&mut fields)?,
            },
            inv_score: field(&mut fields)?,
        };
        Some(record)
    }
}

fn load_lines<T>(
    path: &Path,
    what: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    let file =
        File::open(path).map_err(|e| RiftyError::Io(format!("{}: {}", path.display(), e)))?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Some(r) => records.push(r),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "dropped malformed {} record(s)", what);
    }

    Ok(records)
}

/// Load a locate file, skipping malformed lines.
pub fn load_locate_file(path: impl AsRef<Path>) -> Result<Vec<LocateRecord>> {
    load_lines(path.as_ref(), "locate", LocateRecord::parse)
}

/// Load a dump file, skipping malformed lines.
pub fn load_dump_file(path: impl AsRef<Path>) -> Result<Vec<DumpRecord>> {
    load_lines(path.as_ref(), "dump", DumpRecord::parse)
}

/// Structural-variant event class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SvKind {
    Inv,
    Dup,
    Del,
    Ins,
    Tra,
}

impl fmt::Display for SvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SvKind::Inv => "INV",
            SvKind::Dup => "DUP",
            SvKind::Del => "DEL",
            SvKind::Ins => "INS",
            SvKind::Tra => "TRA",
        };
        f.write_str(s)
    }
}

/// One emitted SV event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SvRecord {
    /// Single-reference event: `KIND <ref> <left> <right>`.
    Sv {
        kind: SvKind,
        target: String,
        left: i32,
        right: i32,
    },
    /// Translocation: `TRA <ref1> <l1> <r1> <ref2> <l2> <r2>`.
    Tra {
        target1: String,
        left1: i32,
        right1: i32,
        target2: String,
        left2: i32,
        right2: i32,
    },
}

impl fmt::Display for SvRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvRecord::Sv {
                kind,
                target,
                left,
                right,
            } => write!(f, "{} {} {} {}", kind, target, left, right),
            SvRecord::Tra {
                target1,
                left1,
                right1,
                target2,
                left2,
                right2,
            } => write!(
                f,
                "TRA {} {} {} {} {} {}",
                target1, left1, right1, target2, left2, right2
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_locate_record_roundtrip() {
        let r = LocateRecord {
            name: "S1_12".to_string(),
            target: "chr1".to_string(),
            left: 1200,
            right: 4600,
            loss: 312,
            reversed: true,
        };
        let line = r.to_string();
        assert_eq!(line, "S1_12 chr1 1200 4600 312 1");
        assert_eq!(LocateRecord::parse(&line).unwrap(), r);
    }

    #[test]
    fn test_locate_record_malformed() {
        assert!(LocateRecord::parse("").is_none());
        assert!(LocateRecord::parse("S1_12 chr1 1200").is_none());
        assert!(LocateRecord::parse("S1_12 chr1 x y z 0").is_none());
    }

    #[test]
    fn test_dump_record_roundtrip() {
        let r = DumpRecord {
            run: "S2_7".to_string(),
            target: "chr2".to_string(),
            lp: BreakPoint {
                ref_pos: 1000,
                read_pos: 420,
                read_len: 420,
            },
            rp: BreakPoint {
                ref_pos: 1500,
                read_pos: 430,
                read_len: 390,
            },
            inv_score: 0.25,
        };
        let parsed = DumpRecord::parse(&r.to_string()).unwrap();
        assert_eq!(parsed.lp, r.lp);
        assert_eq!(parsed.rp, r.rp);
        assert!((parsed.inv_score - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "S1_1 chr1 10 20 3 0").unwrap();
        writeln!(f, "garbage line").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "S1_2 chr1 30 40 5 1").unwrap();

        let records = load_locate_file(f.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "S1_2");
        assert!(records[1].reversed);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(load_locate_file("/nonexistent/locate.txt").is_err());
        assert!(load_dump_file("/nonexistent/dump.txt").is_err());
    }

    #[test]
    fn test_sv_record_formatting() {
        let sv = SvRecord::Sv {
            kind: SvKind::Del,
            target: "chr1".to_string(),
            left: 1000,
            right: 1500,
        };
        assert_eq!(sv.to_string(), "DEL chr1 1000 1500");

        let tra = SvRecord::Tra {
            target1: "A".to_string(),
            left1: 10,
            right1: 510,
            target2: "B".to_string(),
            left2: 40,
            right2: 535,
        };
        assert_eq!(tra.to_string(), "TRA A 10 510 B 40 535");
    }
}
