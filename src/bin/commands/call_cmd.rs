use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

use rifty::{load_dump_file, load_locate_file, reverse_complement, Caller, Dict};

use super::open_sink;

/// Infer SV events from the persisted locate and dump records.
///
/// SV lines go to stderr by default so they stay separate from stdout
/// pipelines; `-o` diverts them to a file.
pub fn cmd_call(
    reference: &Path,
    runs: &Path,
    locate: &Path,
    dump: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let refs = Dict::load(reference).context("loading reference")?;
    info!(entries = refs.len(), "loaded {}", reference.display());

    let mut runs = Dict::load(runs).context("loading reads")?;
    runs.build_index();
    info!(entries = runs.len(), "loaded reads");

    // The inference probes read conjections on the reference strand, so
    // reversed reads are flipped in place first.
    let locate_records = load_locate_file(locate).context("loading locate records")?;
    for record in &locate_records {
        if record.reversed {
            if let Some(run) = runs.find_mut(&record.name) {
                run.sequence = reverse_complement(&run.sequence);
            }
        }
    }
    info!(records = locate_records.len(), "loaded {}", locate.display());

    let dump_records = load_dump_file(dump).context("loading dump records")?;
    info!(records = dump_records.len(), "loaded {}", dump.display());

    let mut caller = Caller::new(&refs, &runs);
    for record in &dump_records {
        caller.ingest(record);
    }

    let events = caller.call();
    info!(events = events.len(), "inference complete");

    let mut sink = open_sink(output, std::io::stderr())?;
    for event in &events {
        writeln!(sink, "{}", event)?;
    }
    sink.flush()?;

    Ok(())
}
