//! The on-disk layout of the knowledge base: a data root containing the
//! input, processing, completed, and error areas plus the embedding store.
//! Files move between areas by rename, so a state transition is atomic on
//! the same filesystem.

use std::path::{Path, PathBuf};

use crate::{
    config::AreaPaths,
    error::{Error, Result},
};

#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
    input: PathBuf,
    processing: PathBuf,
    completed: PathBuf,
    error: PathBuf,
    store_file: PathBuf,
}

impl Library {
    /// Resolve the data root from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The LORE_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/lore/)
    pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var("LORE_DATA_DIR") {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("lore")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(root)
    }

    /// Location of the config file under a data root.
    pub fn config_file(root: &Path) -> PathBuf {
        root.join("config.json")
    }

    /// Open the library under `root`, creating every work area.
    ///
    /// Relative area paths are joined onto the root; absolute ones are used
    /// as given.
    pub fn open(root: &Path, paths: &AreaPaths) -> Result<Self> {
        let resolve = |p: &Path| -> PathBuf {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };

        let input = resolve(&paths.input);
        let processing = resolve(&paths.processing);
        let completed = resolve(&paths.completed);
        let error = resolve(&paths.error);
        let embeddings = resolve(&paths.embeddings);

        for dir in [&input, &processing, &completed, &error, &embeddings] {
            std::fs::create_dir_all(dir)
                .map_err(|_| Error::DataDir(dir.clone()))?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            input,
            processing,
            completed,
            error,
            store_file: embeddings.join("embeddings.json"),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn processing(&self) -> &Path {
        &self.processing
    }

    pub fn completed(&self) -> &Path {
        &self.completed
    }

    pub fn error_area(&self) -> &Path {
        &self.error
    }

    pub fn store_file(&self) -> &Path {
        &self.store_file
    }

    /// Files currently waiting in the input area, sorted by name.
    pub fn input_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.input)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Number of files directly inside `area`.
    pub fn file_count(&self, area: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in std::fs::read_dir(area)? {
            if entry?.path().is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Claim a file for processing by renaming it into the processing area.
    ///
    /// Returns `None` when the file no longer exists (another watcher tick
    /// already claimed it); callers treat that as a silent skip.
    pub fn claim(&self, file: &Path) -> Result<Option<PathBuf>> {
        let target = self.unique_target(&self.processing, file);
        match std::fs::rename(file, &target) {
            Ok(()) => Ok(Some(target)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Move `file` into `area`, suffixing the name on collision so an
    /// earlier arrival is never overwritten.
    pub fn move_into(&self, area: &Path, file: &Path) -> Result<PathBuf> {
        let target = self.unique_target(area, file);
        std::fs::rename(file, &target)?;
        Ok(target)
    }

    fn unique_target(&self, area: &Path, file: &Path) -> PathBuf {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let mut candidate = area.join(&name);
        let mut n = 1;
        while candidate.exists() {
            candidate = area.join(format!("{name}.{n}"));
            n += 1;
        }
        candidate
    }
}
