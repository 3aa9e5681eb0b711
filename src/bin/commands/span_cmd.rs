use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use rifty::{load_locate_file, reverse_complement, span_read, Dict, DumpRecord, WorkerPool};

use super::{open_sink, resolve_jobs};

/// Span every located read in parallel and persist one dump record per
/// read, in read load order.
pub fn cmd_span(
    reference: &Path,
    runs: &Path,
    locate: &Path,
    jobs: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let mut refs = Dict::load(reference).context("loading reference")?;
    refs.build_index();
    info!(entries = refs.len(), "loaded {}", reference.display());

    let runs = Arc::new(Dict::load(runs).context("loading reads")?);
    info!(entries = runs.len(), "loaded reads");

    let records = load_locate_file(locate).context("loading locate records")?;
    info!(records = records.len(), "loaded {}", locate.display());

    let refs = Arc::new(refs);
    let pool = WorkerPool::new(resolve_jobs(jobs));
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, DumpRecord)>();

    let mut submitted = 0usize;
    for (slot, record) in records.into_iter().enumerate() {
        if refs.find(&record.target).is_none() {
            warn!(target_name = %record.target, run = %record.name, "unknown reference, skipped");
            continue;
        }

        let refs = Arc::clone(&refs);
        let runs = Arc::clone(&runs);
        let tx = tx.clone();

        pool.execute(move || {
            let Some(run) = runs.find(&record.name) else {
                warn!(run = %record.name, "read not found, skipped");
                return;
            };

            let Some(reference) = refs.find(&record.target) else {
                return;
            };
            let oriented = if record.reversed {
                reverse_complement(&run.sequence)
            } else {
                run.sequence.clone()
            };

            let dump = span_read(reference, &run.name, &oriented, &record);
            let _ = tx.send((slot, dump));
        })
        .context("submitting span task")?;
        submitted += 1;
    }

    pool.wait();
    drop(tx);
    info!(reads = submitted, "spanning complete");

    let mut results: Vec<(usize, DumpRecord)> = rx.iter().collect();
    results.sort_by_key(|&(slot, _)| slot);

    let mut sink = open_sink(output, std::io::stdout())?;
    for (_, dump) in results {
        writeln!(sink, "{}", dump)?;
    }
    sink.flush()?;

    Ok(())
}
