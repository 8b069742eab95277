//! Writing fetched bodies to standard output, a named file, or a directory tree.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::config::Destination;
use super::constants::{FORBIDDEN_FILE_NAME_CHARS, INDEX_FILE_NAME, MAX_FILE_NAME_LEN};
use super::error::FetchError;

const STDOUT_TARGET: &str = "standard output";

/// Where a body ended up and how many bytes were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Written {
    /// Written to standard output.
    Stdout {
        /// Body length.
        bytes: usize,
    },
    /// Written to a file.
    File {
        /// The file that was created or truncated.
        path: PathBuf,
        /// Body length.
        bytes: usize,
    },
}

impl Written {
    /// Number of body bytes written.
    #[must_use]
    pub fn bytes(&self) -> usize {
        match self {
            Self::Stdout { bytes } | Self::File { bytes, .. } => *bytes,
        }
    }

    /// Output path, when the body went to a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdout { .. } => None,
            Self::File { path, .. } => Some(path),
        }
    }
}

/// Checks an explicit output file name.
///
/// # Errors
///
/// Returns [`FetchError::InvalidFileName`] if the name is empty, longer than
/// 255 bytes, or contains any of `/ \ : * ? " < > |`.
pub fn validate_file_name(name: &str) -> Result<(), FetchError> {
    if name.is_empty() {
        return Err(FetchError::invalid_file_name(name, "file name is empty"));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(FetchError::invalid_file_name(
            name,
            "file name is longer than 255 bytes",
        ));
    }
    if name.contains(FORBIDDEN_FILE_NAME_CHARS) {
        return Err(FetchError::invalid_file_name(
            name,
            "file name contains a forbidden character",
        ));
    }
    Ok(())
}

/// Output path for `url_path` inside `dir`.
///
/// The path (leading slash included) is appended to the directory name as
/// is; a path ending in `/` gets `index.html` appended.
///
/// # Errors
///
/// Returns [`FetchError::InvalidFileName`] if the path has a `..` segment.
pub fn derive_output_path(dir: &Path, url_path: &str) -> Result<PathBuf, FetchError> {
    if Path::new(url_path)
        .components()
        .any(|component| component == Component::ParentDir)
    {
        return Err(FetchError::invalid_file_name(
            url_path,
            "path escapes the destination directory",
        ));
    }

    let mut joined = OsString::from(dir.as_os_str());
    if !url_path.starts_with('/') {
        joined.push("/");
    }
    joined.push(url_path);
    if url_path.is_empty() || url_path.ends_with('/') {
        joined.push(INDEX_FILE_NAME);
    }
    Ok(PathBuf::from(joined))
}

/// Writes `body` to `destination`.
///
/// In directory mode the directory and any parents the derived path needs
/// are created first. An existing file is truncated and overwritten, so
/// writing the same body twice leaves the same bytes on disk.
///
/// # Errors
///
/// - [`FetchError::InvalidFileName`] for a bad explicit name or unsafe derived path
/// - [`FetchError::DirectoryCreateFailed`] if a directory cannot be created
/// - [`FetchError::Persist`] if the write fails; a partially written file is removed
#[instrument(skip(body, destination), fields(bytes = body.len()))]
pub async fn persist(
    body: &[u8],
    destination: &Destination,
    url_path: &str,
) -> Result<Written, FetchError> {
    match destination {
        Destination::Stdout => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(body)
                .await
                .map_err(|e| FetchError::persist(STDOUT_TARGET, e))?;
            stdout
                .flush()
                .await
                .map_err(|e| FetchError::persist(STDOUT_TARGET, e))?;
            Ok(Written::Stdout { bytes: body.len() })
        }
        Destination::File(path) => {
            validate_file_name(&path.to_string_lossy())?;
            write_file(path, body).await?;
            Ok(Written::File {
                path: path.clone(),
                bytes: body.len(),
            })
        }
        Destination::Directory(dir) => {
            let path = derive_output_path(dir, url_path)?;
            let parent = path.parent().unwrap_or(dir);
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::directory_create(parent, e))?;
            write_file(&path, body).await?;
            Ok(Written::File {
                path,
                bytes: body.len(),
            })
        }
    }
}

async fn write_file(path: &Path, body: &[u8]) -> Result<(), FetchError> {
    let file = File::create(path)
        .await
        .map_err(|e| FetchError::persist(path.display().to_string(), e))?;

    let mut writer = BufWriter::new(file);
    let result = async {
        writer.write_all(body).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!(path = %path.display(), "cleaning up partial file after error");
        let _ = fs::remove_file(path).await;
        return Err(FetchError::persist(path.display().to_string(), e));
    }

    info!(path = %path.display(), bytes = body.len(), "body written");
    Ok(())
}
