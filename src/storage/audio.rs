use std::path::{Path, PathBuf};
use anyhow::Result;
use tracing::info;

use crate::lesson::Lesson;

/// Locates uploaded lesson audio. Files are stored as `{id}_{filename}` under
/// `{data}/audio` while the lesson keeps the original filename.
#[derive(Debug, Clone)]
pub struct AudioLibrary {
    root: PathBuf,
}

impl AudioLibrary {
    pub fn new(data_folder: impl AsRef<Path>) -> Self {
        Self {
            root: data_folder.as_ref().join("audio"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, lesson: &Lesson) -> PathBuf {
        self.root.join(format!("{}_{}", lesson.id, lesson.filename))
    }

    pub fn exists(&self, lesson: &Lesson) -> bool {
        self.path_for(lesson).is_file()
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating audio directory {}", self.root.display());
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }
}
