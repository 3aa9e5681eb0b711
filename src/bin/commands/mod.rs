mod call_cmd;
mod locate_cmd;
mod query_cmd;
mod span_cmd;

pub use call_cmd::cmd_call;
pub use locate_cmd::cmd_locate;
pub use query_cmd::cmd_query;
pub use span_cmd::cmd_span;

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Open the stage's output sink: a file when `-o` was given, otherwise
/// the fallback stream.
pub fn open_sink(
    output: Option<&Path>,
    fallback: impl Write + Send + 'static,
) -> Result<Box<dyn Write + Send>> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(fallback))),
    }
}

/// Resolve the worker count: explicit flag or all available cores.
pub fn resolve_jobs(jobs: Option<usize>) -> usize {
    jobs.filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}
