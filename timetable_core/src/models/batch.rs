use serde::{Deserialize, Serialize};

use super::course::Course;

/// A numbered slice of a schedule that is validated and repaired as a unit.
///
/// Batches at one level own disjoint course ids; `index` is 1-based and is
/// the number embedded in the batch file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub courses: Vec<Course>,
}

impl Batch {
    pub fn new(index: usize, courses: Vec<Course>) -> Self {
        Self { index, courses }
    }

    /// Name used for the batch file stem, e.g. `batch_3`.
    pub fn name(&self) -> String {
        format!("batch_{}", self.index)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn violating_count(&self) -> usize {
        self.courses.iter().filter(|c| c.has_violations()).count()
    }
}

/// Concatenates the courses of every batch in order.
pub fn flatten_batches(batches: &[Batch]) -> Vec<Course> {
    batches
        .iter()
        .flat_map(|b| b.courses.iter().cloned())
        .collect()
}
