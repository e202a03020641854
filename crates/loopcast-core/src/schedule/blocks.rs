//! Block builder: cut one show's episode list into blocks of 3, 4, 3, 4, ...

use crate::inventory::InventoryEntry;

const FALLBACK_SIZES: &[usize] = &[3, 4];

/// A contiguous run of one show's episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub show_id: String,
    pub entries: Vec<InventoryEntry>,
    pub duration_ms: u64,
}

impl Block {
    fn new(show_id: &str, index: usize) -> Self {
        Self {
            id: format!("{}-b{:03}", show_id, index),
            show_id: show_id.to_string(),
            entries: Vec::new(),
            duration_ms: 0,
        }
    }

    fn push(&mut self, entry: InventoryEntry) {
        self.duration_ms += entry.duration_ms;
        self.entries.push(entry);
    }
}

/// Build blocks from one show's entries in (season, episode) order.
///
/// Target sizes cycle through `sizes`. When a multi-part primary with
/// separate part files is placed, its parts join the same block at once,
/// even past the target size.
pub fn build_blocks(show_id: &str, entries: &[InventoryEntry], sizes: &[usize]) -> Vec<Block> {
    let sizes = if sizes.is_empty() || sizes.contains(&0) {
        FALLBACK_SIZES
    } else {
        sizes
    };
    let mut taken = vec![false; entries.len()];
    let mut blocks = Vec::new();
    let mut current = Block::new(show_id, 0);
    let mut target = sizes[0];

    for i in 0..entries.len() {
        if taken[i] {
            continue;
        }
        taken[i] = true;
        let entry = &entries[i];
        current.push(entry.clone());
        for part in &entry.linked_parts {
            let found = (i + 1..entries.len())
                .find(|&j| !taken[j] && entries[j].season == entry.season && entries[j].covers(*part));
            if let Some(j) = found {
                taken[j] = true;
                current.push(entries[j].clone());
            }
        }
        if current.entries.len() >= target {
            let index = blocks.len() + 1;
            blocks.push(std::mem::replace(&mut current, Block::new(show_id, index)));
            target = sizes[index % sizes.len()];
        }
    }
    if !current.entries.is_empty() {
        blocks.push(current);
    }
    blocks
}
