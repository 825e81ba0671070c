//! Local archive layout: `root/<subject folder>/<lecture subfolder>/<stem>.<ext>`.

use std::path::{Path, PathBuf};

use crate::config::{ArchiveConfig, Config, MediaKind, downloads_dir};
use crate::error::{Error, Result};
use crate::feed::Subject;
use crate::fs::FileSystem;
use crate::naming::NameTemplate;

/// Resolves where each subject's recordings live.
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
    lecture_subfolder: String,
    auto_create: bool,
    folder_template: NameTemplate,
    media: MediaKind,
}

impl ArchiveLayout {
    /// Builds the layout from configuration, using `archive.root` as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the subject folder template is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            root: config.archive.root.clone(),
            lecture_subfolder: config.archive.lecture_subfolder.clone(),
            auto_create: config.archive.auto_create_subfolders,
            folder_template: NameTemplate::parse_subject(&config.archive.subject_folder_format)?,
            media: config.naming.media,
        })
    }

    /// Replaces the archive root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Finds the folder for `subject` under the root.
    ///
    /// The first directory (in name order) whose name contains the subject
    /// code, ignoring case, wins. Without a match, a folder named from the
    /// subject folder template is created when auto-creation is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderResolution`] if nothing matches and
    /// auto-creation is disabled, or the root cannot be listed.
    pub async fn subject_folder<F: FileSystem + ?Sized>(
        &self,
        subject: &Subject,
        fs: &F,
    ) -> Result<PathBuf> {
        let folders = fs
            .list_dirs(&self.root)
            .await
            .map_err(|e| self.resolution_error(subject, format!("cannot list folder: {e}")))?;

        let code = subject.code.to_lowercase();
        if let Some(name) = folders.iter().find(|n| n.to_lowercase().contains(&code)) {
            log::debug!("{}: using folder {name}", subject.code);
            return Ok(self.root.join(name));
        }

        if !self.auto_create {
            return Err(self.resolution_error(
                subject,
                "no folder name contains the subject code and auto-creation is disabled"
                    .to_string(),
            ));
        }

        let folder = self.root.join(self.folder_template.render_subject(subject));
        fs.create_dir_all(&folder)
            .await
            .map_err(|e| self.resolution_error(subject, format!("cannot create folder: {e}")))?;
        log::info!("Made folder {}", folder.display());
        Ok(folder)
    }

    /// Resolves the subject folder and makes sure its lecture subfolder exists.
    ///
    /// # Errors
    ///
    /// See [`subject_folder`](Self::subject_folder); also fails if the
    /// lecture subfolder cannot be created.
    pub async fn lecture_dir<F: FileSystem + ?Sized>(
        &self,
        subject: &Subject,
        fs: &F,
    ) -> Result<PathBuf> {
        let dir = self
            .subject_folder(subject, fs)
            .await?
            .join(&self.lecture_subfolder);
        if !fs.dir_exists(&dir).await {
            log::info!("Making {} folder for {}", self.lecture_subfolder, subject.code);
            fs.create_dir_all(&dir).await?;
        }
        Ok(dir)
    }

    /// Full path of a lecture file inside `dir`.
    #[must_use]
    pub fn lecture_path(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.{}", self.media.extension()))
    }

    fn resolution_error(&self, subject: &Subject, reason: String) -> Error {
        Error::FolderResolution {
            code: subject.code.clone(),
            root: self.root.clone(),
            reason,
        }
    }
}

/// Returns the archive root to use: the configured root if it exists,
/// otherwise the user's downloads folder when fallback is enabled.
///
/// # Errors
///
/// Returns [`Error::Config`] if neither folder exists.
pub async fn check_root<F: FileSystem + ?Sized>(archive: &ArchiveConfig, fs: &F) -> Result<PathBuf> {
    check_root_with_fallback(archive, fs, downloads_dir()).await
}

async fn check_root_with_fallback<F: FileSystem + ?Sized>(
    archive: &ArchiveConfig,
    fs: &F,
    fallback: PathBuf,
) -> Result<PathBuf> {
    if fs.dir_exists(&archive.root).await {
        return Ok(archive.root.clone());
    }
    if !archive.fallback_to_downloads {
        return Err(Error::Config(format!(
            "archive root {} does not exist",
            archive.root.display()
        )));
    }
    if !fs.dir_exists(&fallback).await {
        return Err(Error::Config(format!(
            "archive root {} does not exist and no downloads folder was found at {}",
            archive.root.display(),
            fallback.display()
        )));
    }
    log::warn!(
        "Archive root {} does not exist, using {}",
        archive.root.display(),
        fallback.display()
    );
    Ok(fallback)
}
