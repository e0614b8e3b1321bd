use crate::layout::{RESULTS_DIR, STUDENTS_FILE, USERS_FILE};
use crate::credentials::CredentialTable;
use crate::results::ResultArea;
use crate::roster::Roster;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// A data directory holding the roster, the credential table and the result area.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    pub roster: Roster,
    pub credentials: CredentialTable,
    pub results: ResultArea,
}

impl Workspace {
    pub fn open(root: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(root.join(RESULTS_DIR))
            .with_context(|| format!("failed to create workspace {}", root.to_string_lossy()))?;
        let roster = Roster::open(&root.join(STUDENTS_FILE)).context("failed to open roster")?;
        Ok(Workspace {
            root: root.to_path_buf(),
            roster,
            credentials: CredentialTable::open(&root.join(USERS_FILE)),
            results: ResultArea::new(root.join(RESULTS_DIR)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
