//! Multipart form reading and on-disk storage of course files.

use bytes::Buf;
use futures::TryStreamExt;
use rand::{distributions::Alphanumeric, Rng};
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use warp::multipart::FormData;

pub const THUMBNAIL_MAX_BYTES: usize = 10 * 1024 * 1024;
pub const MATERIAL_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Public URL prefix under which the upload root is served
pub const PUBLIC_PREFIX: &str = "/uploads";

const TEXT_MAX_BYTES: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadKind {
    Thumbnail,
    Material,
}

impl UploadKind {
    const ALL: [UploadKind; 2] = [UploadKind::Thumbnail, UploadKind::Material];

    fn dir(self) -> &'static str {
        match self {
            Self::Thumbnail => "course_thumbnails",
            Self::Material => "course_materials",
        }
    }

    fn max_bytes(self) -> usize {
        match self {
            Self::Thumbnail => THUMBNAIL_MAX_BYTES,
            Self::Material => MATERIAL_MAX_BYTES,
        }
    }
}

/// A file field a form is allowed to carry.
pub struct FileField {
    pub name: &'static str,
    pub kind: UploadKind,
    pub max_count: usize,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read multipart body: {0}")]
    Multipart(#[from] warp::Error),
    #[error("unexpected file field `{0}`")]
    UnexpectedField(String),
    #[error("too many files in field `{0}`")]
    TooManyFiles(String),
    #[error("`{0}` is larger than allowed")]
    TooLarge(String),
}

pub struct UploadedFile {
    pub original_name: String,
    pub kind: UploadKind,
    pub data: Vec<u8>,
}

/// Text fields and files of a submitted multipart form.
#[derive(Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: HashMap<&'static str, Vec<UploadedFile>>,
}

struct RawPart {
    name: String,
    filename: Option<String>,
    data: Vec<u8>,
}

impl Form {
    /// Reads the whole form, accepting files only in `file_fields`. A part is refused as soon as
    /// it grows past its limit, before the rest of it is buffered.
    pub async fn read(form: FormData, file_fields: &[FileField]) -> Result<Self, UploadError> {
        futures::pin_mut!(form);
        let mut parts = Vec::new();

        while let Some(mut part) = form.try_next().await? {
            let name = part.name().to_string();
            let filename = part.filename().map(str::to_string);
            let limit = part_limit(&name, filename.as_deref(), file_fields)?;

            let mut data: Vec<u8> = Vec::new();
            while let Some(chunk) = part.data().await {
                let mut chunk = chunk?;
                if data.len() + chunk.remaining() > limit {
                    return Err(UploadError::TooLarge(filename.unwrap_or(name)));
                }

                while chunk.has_remaining() {
                    let len = {
                        let bytes = chunk.chunk();
                        data.extend_from_slice(bytes);
                        bytes.len()
                    };
                    chunk.advance(len);
                }
            }

            parts.push(RawPart {
                name,
                filename,
                data,
            });
        }

        Self::from_parts(parts, file_fields)
    }

    fn from_parts(parts: Vec<RawPart>, file_fields: &[FileField]) -> Result<Self, UploadError> {
        let mut form = Self::default();

        for RawPart {
            name,
            filename,
            data,
        } in parts
        {
            let original_name = match filename {
                Some(filename) => filename,
                None => {
                    form.fields
                        .insert(name, String::from_utf8_lossy(&data).into_owned());
                    continue;
                }
            };

            // Browsers send an empty file part when nothing was picked
            if original_name.is_empty() && data.is_empty() {
                continue;
            }

            let field = file_fields
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| UploadError::UnexpectedField(name.clone()))?;

            if data.len() > field.kind.max_bytes() {
                return Err(UploadError::TooLarge(original_name));
            }

            let files = form.files.entry(field.name).or_insert_with(Vec::new);
            if files.len() >= field.max_count {
                return Err(UploadError::TooManyFiles(name));
            }

            files.push(UploadedFile {
                original_name,
                kind: field.kind,
                data,
            });
        }

        Ok(form)
    }

    /// Trimmed value of a text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        self.files.remove(name).unwrap_or_default()
    }
}

/// Course files on disk, served back under [`PUBLIC_PREFIX`].
#[derive(Clone, Debug)]
pub struct Uploads {
    root: PathBuf,
}

impl Uploads {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for kind in UploadKind::ALL.iter() {
            tokio::fs::create_dir_all(self.root.join(kind.dir())).await?;
        }
        Ok(())
    }

    /// Writes the file under a fresh name and returns its public path.
    pub async fn store(&self, file: &UploadedFile) -> io::Result<String> {
        let name = unique_file_name(&file.original_name);
        let dir = file.kind.dir();

        tokio::fs::write(self.root.join(dir).join(&name), &file.data).await?;
        log::info!("stored {} as {}/{}", file.original_name, dir, name);

        Ok(format!("{}/{}/{}", PUBLIC_PREFIX, dir, name))
    }

    /// Stores every file, or none of them: files written before a failure are removed again.
    pub async fn store_all(&self, files: &[UploadedFile]) -> io::Result<Vec<String>> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            match self.store(file).await {
                Ok(path) => paths.push(path),
                Err(err) => {
                    self.discard(&paths).await;
                    return Err(err);
                }
            }
        }
        Ok(paths)
    }

    /// Removes files returned by [`Uploads::store`] that no record ended up pointing to.
    pub async fn discard(&self, paths: &[String]) {
        for path in paths {
            let relative = match path.strip_prefix(PUBLIC_PREFIX) {
                Some(relative) => relative.trim_start_matches('/'),
                None => continue,
            };

            match tokio::fs::remove_file(self.root.join(relative)).await {
                Ok(()) => log::info!("discarded {}", path),
                Err(err) => log::warn!("could not remove {}: {}", path, err),
            }
        }
    }
}

/// Largest accepted size for a part. Unknown file fields are refused up front.
fn part_limit(
    name: &str,
    filename: Option<&str>,
    file_fields: &[FileField],
) -> Result<usize, UploadError> {
    let filename = match filename {
        Some(filename) => filename,
        None => return Ok(TEXT_MAX_BYTES),
    };

    match file_fields.iter().find(|f| f.name == name) {
        Some(field) => Ok(field.kind.max_bytes()),
        None if filename.is_empty() => Ok(0),
        None => Err(UploadError::UnexpectedField(name.to_string())),
    }
}

/// `<unix millis>-<random><.ext>`, keeping the original extension when it is plain alphanumeric.
fn unique_file_name(original_name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();

    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}
