//! Registry of in-flight transfers, owned by the orchestrator and lent to the pool.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ActiveTransfer {
    pub destination: PathBuf,
    pub started: Instant,
}

#[derive(Debug, Default)]
pub struct ActiveTransfers {
    inner: HashMap<String, ActiveTransfer>,
}

impl ActiveTransfers {
    pub fn insert(&mut self, id: &str, destination: &Path) {
        self.inner.insert(
            id.to_string(),
            ActiveTransfer {
                destination: destination.to_path_buf(),
                started: Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, id: &str) -> Option<ActiveTransfer> {
        self.inner.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActiveTransfer)> {
        self.inner.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove() {
        let mut a = ActiveTransfers::default();
        a.insert("x", Path::new("/m/x.mkv"));
        assert!(a.contains("x"));
        assert_eq!(a.len(), 1);
        let t = a.remove("x").unwrap();
        assert_eq!(t.destination, PathBuf::from("/m/x.mkv"));
        assert!(a.is_empty());
        assert!(a.remove("x").is_none());
    }
}
