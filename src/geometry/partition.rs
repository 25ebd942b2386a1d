//! Precomputed ("manual") partitions shipped with a mesh file.

use crate::adjacency::Graph;

/// Cell-to-rank assignment of the base mesh refined to `level`.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    name: String,
    priority: i32,
    level: usize,
    elems_at_rank: Graph,
}

impl Partition {
    pub fn new(name: impl Into<String>, priority: i32, level: usize, elems_at_rank: Graph) -> Self {
        Self {
            name: name.into(),
            priority,
            level,
            elems_at_rank,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Number of ranks.
    pub fn size(&self) -> usize {
        self.elems_at_rank.num_domain()
    }

    pub fn num_elements(&self) -> usize {
        self.elems_at_rank.num_image()
    }

    pub fn elems_at_rank(&self) -> &Graph {
        &self.elems_at_rank
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionSet {
    partitions: Vec<Partition>,
}

impl PartitionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_partition(&mut self, partition: Partition) {
        self.partitions.push(partition);
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    /// Best partition for `size` ranks: an empty `name` accepts any name,
    /// the highest priority wins and ties go to the earlier entry.
    pub fn find_partition(&self, size: usize, name: &str) -> Option<&Partition> {
        self.partitions
            .iter()
            .filter(|p| p.size() == size && (name.is_empty() || p.name == name))
            .fold(None, |best: Option<&Partition>, p| match best {
                Some(b) if b.priority >= p.priority => Some(b),
                _ => Some(p),
            })
    }
}
