//! Save pipeline: compare, back up, write, verify.
//!
//! Writes never touch the target in place. The new container goes to a
//! temporary sibling first and is renamed over the target, so a crash mid
//! write cannot leave a half-written save. The backup is taken before the
//! write as a separate step and is kept even when verification fails, for
//! manual recovery.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::codec::{self, DEFAULT_PASSWORD};
use crate::diff::{DiffEntry, diff_documents};
use crate::document::GameSaveDocument;
use crate::error::Result;
use crate::raw::RawDocument;

/// Suffix appended to the save path for its backup copy.
pub const BACKUP_SUFFIX: &str = ".backup";

const TEMP_SUFFIX: &str = ".tmp";

/// Knobs for one save operation.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub password: String,
    /// Gzip the payload before encryption. The game accepts both forms;
    /// retail saves ship uncompressed.
    pub compress: bool,
    /// Copy the existing file to `<path>.backup` before writing. Failure to
    /// back up is logged and the save continues.
    pub backup: bool,
    /// Decrypt the freshly written container and compare it against the
    /// intended document.
    pub verify: bool,
    /// Diff the on-disk original against the pending document and report
    /// the changes.
    pub compare: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD.to_string(),
            compress: false,
            backup: true,
            verify: true,
            compare: true,
        }
    }
}

/// What one save operation did.
#[derive(Debug)]
pub struct SaveReport {
    /// Differences between the on-disk original and what was written.
    /// Empty when comparison was disabled or the original was unreadable.
    pub changes: Vec<DiffEntry>,
    /// Where the backup landed, when one was made.
    pub backup_path: Option<PathBuf>,
    /// `Some(false)` means the write landed but did not decode back to the
    /// intended document; the backup is left in place for manual recovery.
    pub verified: Option<bool>,
}

/// An opened save: the raw tree plus the typed document the caller edits.
///
/// All operations against one path must be serialized by the caller; two
/// live handles on the same file will race each other's backups and writes.
#[derive(Debug)]
pub struct SaveFile {
    path: PathBuf,
    raw: RawDocument,
    document: GameSaveDocument,
}

impl SaveFile {
    /// Read, decrypt, and parse a container, then build the typed document.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::Error::Io`], [`crate::Error::Decryption`], and
    /// [`crate::Error::Encoding`]. On failure no document exists at all, so
    /// a load error can never leave a partially populated view.
    pub fn open(path: impl Into<PathBuf>, password: &str) -> Result<Self> {
        let path = path.into();
        let raw = read_raw(&path, password)?;
        let document = GameSaveDocument::load(&raw);
        debug!(
            "opened {} ({} players)",
            path.display(),
            document.player_count()
        );
        Ok(Self {
            path,
            raw,
            document,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn raw(&self) -> &RawDocument {
        &self.raw
    }

    #[must_use]
    pub fn document(&self) -> &GameSaveDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut GameSaveDocument {
        &mut self.document
    }

    /// Materialize the document into a working copy of the original raw
    /// tree and run the save sequence: compare, back up, write, verify.
    ///
    /// On success the working copy becomes the new baseline for later saves.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Schema`] if materializing fails and
    /// [`crate::Error::Io`] if the write fails; in both cases the prior file
    /// and any backup are left untouched. A verification failure is *not* an
    /// error — it is reported through [`SaveReport::verified`] because the
    /// file has already changed on disk.
    pub fn save(&mut self, options: &SaveOptions) -> Result<SaveReport> {
        let mut pending = self.raw.clone();
        self.document.materialize(&mut pending)?;

        let changes = if options.compare {
            self.pending_changes(&pending, &options.password)
        } else {
            Vec::new()
        };

        let backup_path = if options.backup && self.path.exists() {
            self.back_up()
        } else {
            None
        };

        let payload = pending.to_bytes()?;
        let container = codec::encrypt(&payload, &options.password, options.compress)?;
        write_atomically(&self.path, &container)?;
        info!(
            "wrote {} ({} bytes{})",
            self.path.display(),
            container.len(),
            if options.compress { ", compressed" } else { "" }
        );

        let verified = if options.verify {
            let written = fs::read(&self.path)?;
            let ok = verify_round_trip(&written, &options.password, &pending);
            if !ok {
                warn!(
                    "verification failed for {}; backup kept for recovery",
                    self.path.display()
                );
            }
            Some(ok)
        } else {
            None
        };

        self.raw = pending;
        Ok(SaveReport {
            changes,
            backup_path,
            verified,
        })
    }

    fn pending_changes(&self, pending: &RawDocument, password: &str) -> Vec<DiffEntry> {
        match read_raw(&self.path, password) {
            Ok(on_disk) => {
                let changes = diff_documents(&on_disk, pending);
                debug!(
                    "{} pending change(s) against {}",
                    changes.len(),
                    self.path.display()
                );
                changes
            }
            Err(err) => {
                warn!(
                    "could not read {} for comparison: {err}",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    fn back_up(&self) -> Option<PathBuf> {
        let backup = sibling_path(&self.path, BACKUP_SUFFIX);
        match fs::copy(&self.path, &backup) {
            Ok(_) => {
                info!("backup created at {}", backup.display());
                Some(backup)
            }
            Err(err) => {
                // Non-fatal: the save itself still goes ahead.
                warn!("could not create backup {}: {err}", backup.display());
                None
            }
        }
    }
}

/// Read and decrypt a container into its raw tree.
///
/// # Errors
///
/// Propagates I/O, decryption, and encoding failures.
pub fn read_raw(path: &Path, password: &str) -> Result<RawDocument> {
    let container = fs::read(path)?;
    let payload = codec::decrypt(&container, password)?;
    RawDocument::from_slice(&payload)
}

/// Encrypt a raw tree and write it to `path`, creating parent directories.
/// Used when creating a save from scratch or re-encrypting exported JSON.
///
/// # Errors
///
/// Propagates I/O and encoding failures.
pub fn write_container(path: &Path, raw: &RawDocument, password: &str, compress: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let container = codec::encrypt(&raw.to_bytes()?, password, compress)?;
    write_atomically(path, &container)
}

/// Decrypt `container` and check it decodes to exactly `intended`.
///
/// The container format carries no integrity tag, so this is the only way
/// to notice silent corruption after a write.
#[must_use]
pub fn verify_round_trip(container: &[u8], password: &str, intended: &RawDocument) -> bool {
    match codec::decrypt(container, password)
        .and_then(|payload| RawDocument::from_slice(&payload))
    {
        Ok(decoded) => decoded == *intended,
        Err(err) => {
            warn!("round-trip verification could not decode the container: {err}");
            false
        }
    }
}

/// One discovered save: the folder name doubles as the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEntry {
    pub name: String,
    pub file: PathBuf,
}

/// Enumerate `<root>/<name>/<name>.Es3` saves, newest first under the
/// game's date-stamped folder naming.
///
/// # Errors
///
/// Propagates I/O failures from reading `root`.
pub fn list_saves(root: &Path) -> Result<Vec<SaveEntry>> {
    let mut saves = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let file = entry.path().join(format!("{name}.Es3"));
        if file.is_file() {
            saves.push(SaveEntry { name, file });
        }
    }
    saves.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(saves)
}

/// The game's save folder on Windows; `None` elsewhere.
#[must_use]
pub fn default_save_root() -> Option<PathBuf> {
    if !cfg!(windows) {
        return None;
    }
    let profile = std::env::var_os("USERPROFILE")?;
    Some(
        PathBuf::from(profile)
            .join("AppData")
            .join("LocalLow")
            .join("semiwork")
            .join("Repo")
            .join("saves"),
    )
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("save"), OsString::from);
    name.push(suffix);
    path.with_file_name(name)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = sibling_path(path, TEMP_SUFFIX);
    if let Err(err) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_save_on_disk(dir: &Path) -> PathBuf {
        let path = dir.join("REPO_SAVE_2025_03_01_10_00_00.Es3");
        let raw = RawDocument::new_game("Night Shift", "2025-03-01");
        write_container(&path, &raw, DEFAULT_PASSWORD, false).unwrap();
        path
    }

    #[test]
    fn open_edit_save_reopen() {
        let dir = tempdir().unwrap();
        let path = new_save_on_disk(dir.path());

        let mut save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
        save.document_mut().set_run_stat("currency", 4000);
        let report = save.save(&SaveOptions::default()).unwrap();
        assert_eq!(report.verified, Some(true));
        assert!(report.changes.iter().any(|c| c.path.ends_with("currency")));

        let reopened = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
        assert_eq!(reopened.document().currency(), 4000);
    }

    #[test]
    fn save_creates_and_replaces_the_backup() {
        let dir = tempdir().unwrap();
        let path = new_save_on_disk(dir.path());
        let mut save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();

        let first = save.save(&SaveOptions::default()).unwrap();
        let backup = first.backup_path.unwrap();
        assert!(backup.is_file());
        let first_bytes = fs::read(&backup).unwrap();

        save.document_mut().set_run_stat("lives", 9);
        let second = save.save(&SaveOptions::default()).unwrap();
        assert_eq!(second.backup_path.as_deref(), Some(backup.as_path()));
        assert_ne!(fs::read(&backup).unwrap(), first_bytes);
    }

    #[test]
    fn backup_can_be_disabled() {
        let dir = tempdir().unwrap();
        let path = new_save_on_disk(dir.path());
        let mut save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
        let report = save
            .save(&SaveOptions {
                backup: false,
                ..SaveOptions::default()
            })
            .unwrap();
        assert_eq!(report.backup_path, None);
        assert!(!sibling_path(&path, BACKUP_SUFFIX).exists());
    }

    #[test]
    fn no_temp_file_survives_a_save() {
        let dir = tempdir().unwrap();
        let path = new_save_on_disk(dir.path());
        let mut save = SaveFile::open(&path, DEFAULT_PASSWORD).unwrap();
        save.save(&SaveOptions::default()).unwrap();
        assert!(!sibling_path(&path, TEMP_SUFFIX).exists());
    }

    #[test]
    fn wrong_password_cannot_open() {
        let dir = tempdir().unwrap();
        let path = new_save_on_disk(dir.path());
        assert!(SaveFile::open(&path, "wrong").is_err());
    }

    #[test]
    fn verify_round_trip_spots_a_different_document() {
        let raw = RawDocument::new_game("Night Shift", "2025-03-01");
        let container = codec::encrypt(&raw.to_bytes().unwrap(), DEFAULT_PASSWORD, false).unwrap();
        assert!(verify_round_trip(&container, DEFAULT_PASSWORD, &raw));

        let other = RawDocument::new_game("Day Shift", "2025-03-01");
        assert!(!verify_round_trip(&container, DEFAULT_PASSWORD, &other));
        assert!(!verify_round_trip(b"garbage", DEFAULT_PASSWORD, &raw));
    }

    #[test]
    fn list_saves_finds_matching_folders_newest_first() {
        let dir = tempdir().unwrap();
        for name in ["REPO_SAVE_2025_01_01_00_00_00", "REPO_SAVE_2025_02_01_00_00_00"] {
            let folder = dir.path().join(name);
            fs::create_dir(&folder).unwrap();
            fs::write(folder.join(format!("{name}.Es3")), b"stub").unwrap();
        }
        // A folder without a matching container is not a save.
        fs::create_dir(dir.path().join("screenshots")).unwrap();

        let saves = list_saves(dir.path()).unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].name, "REPO_SAVE_2025_02_01_00_00_00");
        assert_eq!(saves[1].name, "REPO_SAVE_2025_01_01_00_00_00");
    }
}
