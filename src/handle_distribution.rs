//! Handle distribution analysis.
//!
//! Handles are handed out in increasing order and never reused, so a
//! drawing that was only ever edited by AutoCAD shows a dense handle range.
//! Holes in the range and an unusual mix of object types point at objects
//! removed or injected by other tools.

use std::fmt;

use indexmap::IndexMap;

use crate::io::dwg::reader::ObjectRecord;

/// A run of missing handle values between two present ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleGap {
    /// Last handle before the gap
    pub after: u64,
    /// First handle after the gap
    pub before: u64,
}

impl HandleGap {
    pub fn missing(&self) -> u64 {
        self.before - self.after - 1
    }
}

impl fmt::Display for HandleGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#X}..{:#X} ({} missing)",
            self.after,
            self.before,
            self.missing()
        )
    }
}

/// Object type histogram and handle gaps of the parsed records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleDistribution {
    /// Type name to record count, most frequent first
    pub histogram: IndexMap<String, usize>,
    /// Distinct handles of the parsed records, ascending
    pub handles: Vec<u64>,
    pub gaps: Vec<HandleGap>,
}

impl HandleDistribution {
    pub fn from_records(records: &[ObjectRecord]) -> Self {
        let mut histogram: IndexMap<String, usize> = IndexMap::new();
        for record in records {
            *histogram.entry(record.type_name.clone()).or_default() += 1;
        }
        histogram.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));

        let mut handles: Vec<u64> = records.iter().map(|r| r.handle).collect();
        handles.sort_unstable();
        handles.dedup();

        Self {
            histogram,
            gaps: find_gaps(&handles),
            handles,
        }
    }

    /// Number of records counted in the histogram.
    pub fn total(&self) -> usize {
        self.histogram.values().sum()
    }

    pub fn is_contiguous(&self) -> bool {
        self.gaps.is_empty()
    }

    pub fn missing_handles(&self) -> u64 {
        self.gaps.iter().map(HandleGap::missing).sum()
    }
}

impl fmt::Display for HandleDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} objects, {} distinct handles", self.total(), self.handles.len())?;
        for (name, count) in &self.histogram {
            writeln!(f, "  {:<28} {}", name, count)?;
        }
        if self.gaps.is_empty() {
            writeln!(f, "handles are contiguous")?;
        } else {
            writeln!(f, "{} gaps, {} handles missing", self.gaps.len(), self.missing_handles())?;
            for gap in &self.gaps {
                writeln!(f, "  {}", gap)?;
            }
        }
        Ok(())
    }
}

/// Gaps between consecutive values of a sorted, deduplicated list.
pub fn find_gaps(sorted: &[u64]) -> Vec<HandleGap> {
    sorted
        .windows(2)
        .filter(|w| w[1] - w[0] > 1)
        .map(|w| HandleGap {
            after: w[0],
            before: w[1],
        })
        .collect()
}
