use crate::RegularFile;

/// Copy of a writer's pending queue, oldest first. Excludes the file in flight.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pending: Vec<RegularFile>,
}

impl Snapshot {
    pub fn new(pending: Vec<RegularFile>) -> Self {
        Self { pending }
    }

    pub fn files(&self) -> &[RegularFile] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
