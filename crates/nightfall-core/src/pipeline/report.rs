use std::fmt;

use super::sequence::Sequence;

/// Images discarded by one block during a batched-discard run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscardRecord {
    pub block_index: usize,
    pub name: String,
    pub kind: String,
    /// Run positions of the discarded images, in processing order.
    pub images: Vec<usize>,
}

const HEADERS: [&str; 4] = ["index", "name", "type", "processing"];

/// Per-block timing table.
impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.processing_time().as_secs_f64();
        let rows: Vec<[String; 4]> = (0..self.len())
            .map(|k| {
                let seconds = self.block_time(k).unwrap_or_default().as_secs_f64();
                let share = if total > 0.0 { seconds / total * 100.0 } else { 0.0 };
                [
                    k.to_string(),
                    self.block_names()[k].clone(),
                    self[k].kind().to_string(),
                    format!("{seconds:.3} s ({share:.0}%)"),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.chars().count());
            }
        }

        rule(f, &widths, '\u{2552}', '\u{2564}', '\u{2555}')?;
        line(f, &widths, &HEADERS)?;
        rule(f, &widths, '\u{255e}', '\u{256a}', '\u{2561}')?;
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            line(f, &widths, &cells)?;
        }
        rule(f, &widths, '\u{2558}', '\u{2567}', '\u{255b}')
    }
}

fn rule(f: &mut fmt::Formatter<'_>, widths: &[usize], left: char, mid: char, right: char) -> fmt::Result {
    write!(f, "{left}")?;
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            write!(f, "{mid}")?;
        }
        write!(f, "{}", "\u{2550}".repeat(width + 2))?;
    }
    writeln!(f, "{right}")
}

fn line(f: &mut fmt::Formatter<'_>, widths: &[usize], cells: &[&str]) -> fmt::Result {
    write!(f, "\u{2502}")?;
    for (cell, &width) in cells.iter().zip(widths.iter()) {
        write!(f, " {cell:<width$} \u{2502}")?;
    }
    writeln!(f)
}
