use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use rifty::{locate_read, Dict, Index, LocateRecord, WorkerPool};

use super::{open_sink, resolve_jobs};

/// Locate every read against every reference in parallel and keep the
/// lowest-loss record per read.
pub fn cmd_locate(
    reference: &Path,
    runs: &Path,
    jobs: Option<usize>,
    output: Option<&Path>,
) -> Result<()> {
    let mut refs = Dict::load(reference).context("loading reference")?;
    refs.sort_by_name();
    info!(entries = refs.len(), "loaded {}", reference.display());

    let runs = Arc::new(Dict::load(runs).context("loading reads")?);
    info!(entries = runs.len(), "loaded reads");

    let refs = Arc::new(refs);
    let pool = WorkerPool::new(resolve_jobs(jobs));
    let (tx, rx) = crossbeam_channel::unbounded::<(usize, LocateRecord)>();

    for i in 0..refs.len() {
        let mut index = Index::new();
        index.append_seq(&refs[i].sequence);
        index.build();
        info!(target_name = %refs[i].name, "index built");

        let index = Arc::new(index);
        for j in 0..runs.len() {
            let refs = Arc::clone(&refs);
            let runs = Arc::clone(&runs);
            let index = Arc::clone(&index);
            let tx = tx.clone();

            pool.execute(move || {
                let record = locate_read(&refs[i], &index, &runs[j]);
                let _ = tx.send((j, record));
            })
            .context("submitting locate task")?;
        }

        // The index is shared read-only; join the batch before building
        // the next one.
        pool.wait();
        info!(target_name = %refs[i].name, "reads located");
    }

    drop(tx);

    let mut best: Vec<Option<LocateRecord>> = vec![None; runs.len()];
    for (j, record) in rx.iter() {
        match &best[j] {
            Some(kept) if kept.loss <= record.loss => {}
            _ => best[j] = Some(record),
        }
    }

    let mut sink = open_sink(output, std::io::stdout())?;
    for record in best.iter().flatten() {
        writeln!(sink, "{}", record)?;
    }
    sink.flush()?;

    Ok(())
}
