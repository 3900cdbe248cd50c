//! Local file system adapter.

use crate::ports::outbound::{DirEntry, FileStore};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// File store over the host file system.
///
/// Open-file tracking is cooperative: writers that produce files into a
/// polled directory mark them open until they are complete.
#[derive(Debug, Default)]
pub struct LocalFileStore {
    open: Mutex<HashSet<String>>,
}

impl LocalFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_open(&self, path: &str) {
        if let Ok(mut open) = self.open.lock() {
            open.insert(path.to_string());
        }
    }

    pub fn mark_closed(&self, path: &str) {
        if let Ok(mut open) = self.open.lock() {
            open.remove(path);
        }
    }
}

impl FileStore for LocalFileStore {
    fn list_dir(&self, dir: &str) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(Path::new(dir))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type()?.is_dir();
            entries.push(DirEntry { name, is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn is_open(&self, path: &str) -> bool {
        self.open
            .lock()
            .map(|open| open.contains(path))
            .unwrap_or(false)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn Write>> {
        let file = fs::File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
