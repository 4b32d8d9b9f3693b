//! Chain heights reported by peers.

use std::collections::HashMap;

use shared_types::BlockHeight;

/// How far behind our last block an unknown peer may report and still count.
pub const TOO_OLD_MARGIN: BlockHeight = 720;

#[derive(Debug, Clone, Default)]
pub struct OpinionMap {
    heights: HashMap<String, BlockHeight>,
}

impl OpinionMap {
    pub fn contains(&self, ip: &str) -> bool {
        self.heights.contains_key(ip)
    }

    pub fn insert(&mut self, ip: &str, height: BlockHeight) {
        self.heights.insert(ip.to_string(), height);
    }

    pub fn remove(&mut self, ip: &str) -> Option<BlockHeight> {
        self.heights.remove(ip)
    }

    pub fn get(&self, ip: &str) -> Option<BlockHeight> {
        self.heights.get(ip).copied()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Most commonly reported height; ties go to the higher height.
    pub fn consensus(&self) -> Option<BlockHeight> {
        let mut counts: HashMap<BlockHeight, usize> = HashMap::new();
        for height in self.heights.values() {
            *counts.entry(*height).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .max_by_key(|(height, count)| (*count, *height))
            .map(|(height, _)| height)
    }

    /// Share of opinions equal to `height`, in percent.
    pub fn percentage(&self, height: BlockHeight) -> f64 {
        if self.heights.is_empty() {
            return 0.0;
        }
        let matching = self.heights.values().filter(|h| **h == height).count();
        matching as f64 / self.heights.len() as f64 * 100.0
    }

    pub fn max(&self) -> Option<BlockHeight> {
        self.heights.values().copied().max()
    }
}
