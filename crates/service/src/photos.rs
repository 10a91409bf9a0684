//! Photo attachment rules shared by saved records and unsaved drafts.
//!
//! Images are stored inline as data URLs. Every upload is checked against one
//! size ceiling; an oversized file is rejected on its own and the rest of the
//! batch still goes through.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use models::{PhotoSlot, Photos, Record, RecordFields};
use serde::Serialize;
use tracing::warn;

const MIB: u64 = 1024 * 1024;

/// One binary image payload from an upload action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl PhotoUpload {
    pub fn new(file_name: impl Into<String>, content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        let mime = self
            .content_type
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("application/octet-stream");
        format!("data:{mime};base64,{}", STANDARD.encode(&self.bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_file_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self { max_file_bytes: configs::DEFAULT_MAX_UPLOAD_BYTES }
    }
}

impl From<&configs::UploadConfig> for UploadPolicy {
    fn from(cfg: &configs::UploadConfig) -> Self {
        Self { max_file_bytes: cfg.max_file_bytes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRejection {
    pub file_name: String,
    pub size: u64,
    pub limit: u64,
    pub message: String,
}

impl UploadRejection {
    pub fn too_large(file_name: impl Into<String>, size: u64, limit: u64) -> Self {
        let file_name = file_name.into();
        Self { message: too_large_message(&file_name, limit), file_name, size, limit }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub accepted: usize,
    pub rejected: Vec<UploadRejection>,
}

/// Anything that carries photo slots: a saved record or a form draft.
pub trait PhotoTarget {
    fn photos_mut(&mut self) -> &mut Photos;
}

impl PhotoTarget for Photos {
    fn photos_mut(&mut self) -> &mut Photos {
        self
    }
}

impl PhotoTarget for RecordFields {
    fn photos_mut(&mut self) -> &mut Photos {
        &mut self.photos
    }
}

impl PhotoTarget for Record {
    fn photos_mut(&mut self) -> &mut Photos {
        &mut self.fields.photos
    }
}

/// Attach every upload that fits under the ceiling, in order.
///
/// Singular slots end up holding the last accepted file; multi slots append.
pub fn attach_photos<T: PhotoTarget + ?Sized>(
    target: &mut T,
    slot: PhotoSlot,
    uploads: Vec<PhotoUpload>,
    policy: UploadPolicy,
) -> UploadReport {
    let mut report = UploadReport::default();
    for upload in uploads {
        let size = upload.size();
        if size > policy.max_file_bytes {
            warn!(file = %upload.file_name, size, limit = policy.max_file_bytes, %slot, "upload rejected: too large");
            report.rejected.push(UploadRejection::too_large(upload.file_name, size, policy.max_file_bytes));
            continue;
        }
        target.photos_mut().attach(slot, upload.to_data_url());
        report.accepted += 1;
    }
    report
}

/// Clear a singular slot or drop one position of a multi slot.
pub fn remove_photo<T: PhotoTarget + ?Sized>(target: &mut T, slot: PhotoSlot, index: Option<usize>) -> bool {
    target.photos_mut().remove(slot, index)
}

fn too_large_message(file_name: &str, limit: u64) -> String {
    let max = if limit % MIB == 0 {
        format!("{}MB", limit / MIB)
    } else {
        format!("{:.1}MB", limit as f64 / MIB as f64)
    };
    format!("File {file_name} is too large (Max {max}).")
}
