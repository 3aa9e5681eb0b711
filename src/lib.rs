//! Rifty - Structural-Variant Calling for Noisy Long Reads
//!
//! Rifty detects structural variants (inversions, deletions,
//! duplications, insertions, translocations) by aligning noisy long
//! reads against a small reference assembly and reasoning about where
//! each read's alignment breaks.
//!
//! # Pipeline
//!
//! ```text
//! reference.fasta   reads.fasta
//!        |               |
//!        v               v
//!  +-----------------------------+
//!  | locate: suffix automaton +  |   one record per read:
//!  | A* k-mer votes -> window    |   name target left right loss rev
//!  +-----------------------------+
//!                 |
//!                 v
//!  +-----------------------------+
//!  | span: prefix/suffix partial |   one record per read:
//!  | DP -> breakpoints + score   |   run target LP RP inv_score
//!  +-----------------------------+
//!                 |
//!                 v
//!  +-----------------------------+
//!  | call: endpoint graph,       |   SV lines:
//!  | probes, DFS aggregation     |   DEL <ref> <left> <right> ...
//!  +-----------------------------+
//! ```
//!
//! The locate and span stages are embarrassingly parallel (one task per
//! read over a worker pool, the index shared read-only); inference is
//! single-threaded and deterministic.
//!
//! # Example
//!
//! ```rust
//! use rifty::{BioSeq, Index};
//!
//! let mut index = Index::new();
//! index.append_seq(b"ACGTACGTACGT");
//! index.build();
//!
//! let token = index.locate(BioSeq::new(b"ACGT"));
//! assert_eq!(token.len, 4);
//! assert_eq!(index.rpset(token), vec![4, 8, 12]);
//! ```

#![warn(clippy::all)]

pub mod align;
pub mod dict;
pub mod error;
pub mod infer;
pub mod index;
pub mod locate;
pub mod numeric;
pub mod pipeline;
pub mod pool;
pub mod records;
pub mod sequence;
pub mod span;

pub use crate::align::{full_align, local_align, Alignment, Range};
pub use crate::dict::{Dict, Entry};
pub use crate::error::{Result, RiftyError};
pub use crate::infer::Caller;
pub use crate::index::{ApproxMatch, Index, Token};
pub use crate::locate::Location;
pub use crate::pipeline::{locate_read, span_read};
pub use crate::pool::WorkerPool;
pub use crate::records::{
    load_dump_file, load_locate_file, BreakPoint, DumpRecord, LocateRecord, SvKind, SvRecord,
};
pub use crate::sequence::{reverse_complement, BioSeq};
pub use crate::span::{prefix_span, suffix_span};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
