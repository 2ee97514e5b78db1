//! Test-file upload rules.
//!
//! An upload names a target directory and carries one file. The file must
//! be a Python source (`.py` name, `text/x-python` content type). It is
//! stored at `user_tests/{upload_dir}/{file_name}` under the application
//! root, and that relative path is what the artifact registry records.
//! Uploading to an existing path overwrites the bytes.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, FieldErrors};

/// Directory (relative to the application root) holding uploaded tests.
pub const UPLOAD_ROOT_DIR: &str = "user_tests";

/// Required file-name suffix.
pub const TEST_FILE_EXTENSION: &str = ".py";

/// Required content-type suffix.
pub const TEST_FILE_CONTENT_TYPE: &str = "text/x-python";

/// Maximum accepted length of `upload_dir`.
pub const MAX_UPLOAD_DIR_LEN: usize = 1024;

pub const FIELD_UPLOAD_DIR: &str = "upload_dir";
pub const FIELD_TEST_FILE: &str = "test_file";

/// A file part received from the transport layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Upload form as received; either part may be missing.
#[derive(Debug, Clone, Default)]
pub struct TestFileUpload {
    pub upload_dir: Option<String>,
    pub test_file: Option<UploadedFile>,
}

/// An upload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    /// Path relative to the application root, `/`-separated.
    pub logical_path: String,
    pub bytes: Vec<u8>,
}

impl ValidatedUpload {
    /// Absolute location of the file under `app_root`.
    pub fn target_path(&self, app_root: &Path) -> PathBuf {
        self.logical_path
            .split('/')
            .fold(app_root.to_path_buf(), |acc, part| acc.join(part))
    }
}

/// Split `upload_dir` into path segments, refusing anything that could
/// escape the upload root.
fn normalize_upload_dir(upload_dir: &str) -> Result<Vec<&str>, String> {
    if upload_dir.starts_with('/') || upload_dir.contains('\\') {
        return Err("Upload directory must be a relative path.".into());
    }
    let segments: Vec<&str> = upload_dir
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.iter().any(|s| *s == "..") {
        return Err("Upload directory may not contain '..' segments.".into());
    }
    Ok(segments)
}

fn validate_file(file: &UploadedFile, errors: &mut FieldErrors) {
    if file.name.contains('/') || file.name.contains('\\') || file.name == ".." {
        errors.add(FIELD_TEST_FILE, "File name may not contain path separators.");
        return;
    }
    if !file.name.ends_with(TEST_FILE_EXTENSION) {
        errors.add(FIELD_TEST_FILE, "File extension is not .py");
        return;
    }
    let content_type_ok = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.ends_with(TEST_FILE_CONTENT_TYPE));
    if !content_type_ok {
        errors.add(FIELD_TEST_FILE, "File content-type is not text/x-python");
    }
}

impl TestFileUpload {
    /// Check both parts and derive the logical path. All field problems
    /// are reported together.
    pub fn validate(self) -> Result<ValidatedUpload, CoreError> {
        let mut errors = FieldErrors::new();

        let segments = match self.upload_dir.as_deref() {
            None => {
                errors.add(FIELD_UPLOAD_DIR, "This field is required.");
                None
            }
            Some(dir) if dir.trim().is_empty() => {
                errors.add(FIELD_UPLOAD_DIR, "This field may not be blank.");
                None
            }
            Some(dir) if dir.chars().count() > MAX_UPLOAD_DIR_LEN => {
                errors.add(
                    FIELD_UPLOAD_DIR,
                    format!("Ensure this field has no more than {MAX_UPLOAD_DIR_LEN} characters."),
                );
                None
            }
            Some(dir) => match normalize_upload_dir(dir.trim()) {
                Ok(segments) => Some(segments.join("/")),
                Err(msg) => {
                    errors.add(FIELD_UPLOAD_DIR, msg);
                    None
                }
            },
        };

        match self.test_file.as_ref() {
            None => errors.add(FIELD_TEST_FILE, "No file was submitted."),
            Some(file) => validate_file(file, &mut errors),
        }

        errors.into_result()?;

        let (Some(dir), Some(file)) = (segments, self.test_file) else {
            return Err(CoreError::Internal("upload passed validation with missing parts".into()));
        };

        let logical_path = if dir.is_empty() {
            format!("{UPLOAD_ROOT_DIR}/{}", file.name)
        } else {
            format!("{UPLOAD_ROOT_DIR}/{dir}/{}", file.name)
        };

        Ok(ValidatedUpload {
            logical_path,
            bytes: file.bytes,
        })
    }
}

/// Write the upload under `app_root`, creating directories and replacing
/// any previous bytes at that path.
pub async fn write_test_file(app_root: &Path, upload: &ValidatedUpload) -> std::io::Result<PathBuf> {
    let target = upload.target_path(app_root);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, &upload.bytes).await?;
    Ok(target)
}
