//! Session controller for the record keeper: which record is open, what the
//! entry form holds, and how form actions reach the store.

use std::sync::Arc;

use models::{PartialRecord, PhotoSlot, Record, RecordFields, TextField};
use serde::Serialize;
use tracing::info;

use crate::autofill::{AutofillGate, AutofillOutcome, Extractor};
use crate::errors::ServiceError;
use crate::photos::{self, PhotoUpload, UploadPolicy, UploadReport};
use crate::records::{Committed, RecordStore};

/// Entry form contents. `editing` names the record an edit will overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub draft: RecordFields,
    pub editing: Option<String>,
}

pub struct Workbook {
    store: Arc<RecordStore>,
    gate: AutofillGate,
    policy: UploadPolicy,
    form: Option<Form>,
    detail: Option<String>,
}

impl Workbook {
    pub fn new(store: Arc<RecordStore>, policy: UploadPolicy) -> Self {
        Self { store, gate: AutofillGate::new(), policy, form: None, detail: None }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    /// Id of the record shown in the detail view.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn open_new(&mut self) {
        self.form = Some(Form::default());
    }

    /// Load a copy of record `id` into the form; the detail view closes.
    pub async fn open_edit(&mut self, id: &str) -> Result<(), ServiceError> {
        let record = self.store.get(id).await.ok_or_else(|| ServiceError::not_found("record"))?;
        self.form = Some(Form { draft: record.fields, editing: Some(record.id) });
        self.detail = None;
        Ok(())
    }

    pub async fn open_detail(&mut self, id: &str) -> Result<Record, ServiceError> {
        let record = self.store.get(id).await.ok_or_else(|| ServiceError::not_found("record"))?;
        self.detail = Some(record.id.clone());
        Ok(record)
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    pub fn set_field(&mut self, field: TextField, value: impl Into<String>) -> Result<(), ServiceError> {
        self.draft_mut()?.set_text(field, value);
        Ok(())
    }

    /// `name` is the camelCase JSON key, e.g. `bikeNumber`.
    pub fn set_field_by_name(&mut self, name: &str, value: impl Into<String>) -> Result<(), ServiceError> {
        let field = name.parse::<TextField>()?;
        self.set_field(field, value)
    }

    pub fn attach_photos(&mut self, slot: PhotoSlot, uploads: Vec<PhotoUpload>) -> Result<UploadReport, ServiceError> {
        let policy = self.policy;
        Ok(photos::attach_photos(self.draft_mut()?, slot, uploads, policy))
    }

    pub fn remove_photo(&mut self, slot: PhotoSlot, index: Option<usize>) -> Result<bool, ServiceError> {
        Ok(photos::remove_photo(self.draft_mut()?, slot, index))
    }

    /// Create or update from the form, then close it.
    pub async fn submit(&mut self) -> Result<Committed<Record>, ServiceError> {
        let form = self.form.take().ok_or_else(no_form)?;
        match form.editing {
            None => Ok(self.store.create(form.draft).await),
            Some(id) => {
                let committed = self.store.update(&id, form.draft).await;
                let notice = committed.notice;
                let record = committed.value.ok_or_else(|| ServiceError::not_found("record"))?;
                Ok(Committed { value: record, notice })
            }
        }
    }

    pub fn cancel(&mut self) {
        self.form = None;
    }

    /// Delete after the user confirmed; an open detail view of `id` closes.
    pub async fn confirm_delete(&mut self, id: &str) -> Committed<bool> {
        let committed = self.store.delete(id).await;
        if self.detail.as_deref() == Some(id) {
            self.detail = None;
        }
        info!(record_id = %id, deleted = committed.value, "delete confirmed");
        committed
    }

    /// Run the extractor and merge what it found into the open draft.
    /// The draft is untouched unless the outcome is `Filled`.
    pub async fn autofill(&mut self, extractor: &dyn Extractor, text: &str) -> Result<AutofillOutcome, ServiceError> {
        if self.form.is_none() {
            return Err(no_form());
        }
        let outcome = self.gate.try_run(extractor, text).await;
        if let AutofillOutcome::Filled(partial) = &outcome {
            self.merge_autofill(partial)?;
        }
        Ok(outcome)
    }

    /// Merge an extraction result produced elsewhere; empty values never overwrite.
    pub fn merge_autofill(&mut self, partial: &PartialRecord) -> Result<(), ServiceError> {
        self.draft_mut()?.apply(partial);
        Ok(())
    }

    fn draft_mut(&mut self) -> Result<&mut RecordFields, ServiceError> {
        self.form.as_mut().map(|f| &mut f.draft).ok_or_else(no_form)
    }
}

fn no_form() -> ServiceError {
    ServiceError::Validation("no entry form is open".into())
}
