use anyhow::{bail, Context, Result};
use std::path::Path;

use rifty::load_locate_file;

/// Print locate records whose window intersects `[left, right]`, with an
/// interleaving sketch of the two ranges.
pub fn cmd_query(locate: &Path, left: i32, right: i32) -> Result<()> {
    if left > right {
        bail!("left={} should not be greater than right={}", left, right);
    }

    let records = load_locate_file(locate).context("loading locate records")?;

    for record in &records {
        let (l, r) = (record.left, record.right);
        let intersected = (left <= l && l <= right)
            || (left <= r && r <= right)
            || (l <= left && left <= r)
            || (l <= right && right <= r);

        if !intersected {
            continue;
        }

        // Sort the four bounds and show the gaps between them.
        let mut marks = [('A', left), ('A', right), ('B', l), ('B', r)];
        marks.sort_by_key(|&(_, position)| position);

        print!("{:>10} @{:<16} [{}, {}]: ", record.name, record.target, l, r);
        for (i, &(id, position)) in marks.iter().enumerate() {
            if i > 0 {
                print!(" --{}-- ", position - marks[i - 1].1);
            }
            print!("{}", id);
        }
        println!();
    }

    Ok(())
}
