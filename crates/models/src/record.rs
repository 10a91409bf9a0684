use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;
use crate::photo::{null_as_default, Photos};

/// One customer/vehicle dossier.
///
/// `id` and `date` are assigned at creation and never change afterwards. They
/// default to empty strings when absent from stored JSON so that one damaged
/// entry does not make the whole collection unreadable; the store repairs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(flatten)]
    pub fields: RecordFields,
}

impl Record {
    /// Fresh record with a new identifier and today's local date.
    pub fn new(fields: RecordFields) -> Self {
        Self { id: new_record_id(), date: today(), fields }
    }
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Creation date in the day/month/year layout shown on record cards.
pub fn today() -> String {
    Local::now().format("%-d/%-m/%Y").to_string()
}

/// Everything on a record except its identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFields {
    // customer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,

    // vehicle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_number: Option<String>,

    // insurance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_party_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub third_party_end: Option<String>,

    // addresses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_landmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondence_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondence_landmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_location_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_location_landmark: Option<String>,

    // legacy work-entry fields, kept so old collections round-trip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(flatten)]
    pub photos: Photos,
}

/// Editable free-text fields of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextField {
    CustomerName,
    FatherName,
    MobileNumber,
    BikeNumber,
    EngineNumber,
    ChassisNumber,
    InsuranceStart,
    InsuranceEnd,
    ThirdPartyStart,
    ThirdPartyEnd,
    PermanentAddress,
    PermanentLandmark,
    CorrespondenceAddress,
    CorrespondenceLandmark,
    BikeLocationAddress,
    BikeLocationLandmark,
}

impl TextField {
    pub const ALL: [TextField; 16] = [
        TextField::CustomerName,
        TextField::FatherName,
        TextField::MobileNumber,
        TextField::BikeNumber,
        TextField::EngineNumber,
        TextField::ChassisNumber,
        TextField::InsuranceStart,
        TextField::InsuranceEnd,
        TextField::ThirdPartyStart,
        TextField::ThirdPartyEnd,
        TextField::PermanentAddress,
        TextField::PermanentLandmark,
        TextField::CorrespondenceAddress,
        TextField::CorrespondenceLandmark,
        TextField::BikeLocationAddress,
        TextField::BikeLocationLandmark,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TextField::CustomerName => "customerName",
            TextField::FatherName => "fatherName",
            TextField::MobileNumber => "mobileNumber",
            TextField::BikeNumber => "bikeNumber",
            TextField::EngineNumber => "engineNumber",
            TextField::ChassisNumber => "chassisNumber",
            TextField::InsuranceStart => "insuranceStart",
            TextField::InsuranceEnd => "insuranceEnd",
            TextField::ThirdPartyStart => "thirdPartyStart",
            TextField::ThirdPartyEnd => "thirdPartyEnd",
            TextField::PermanentAddress => "permanentAddress",
            TextField::PermanentLandmark => "permanentLandmark",
            TextField::CorrespondenceAddress => "correspondenceAddress",
            TextField::CorrespondenceLandmark => "correspondenceLandmark",
            TextField::BikeLocationAddress => "bikeLocationAddress",
            TextField::BikeLocationLandmark => "bikeLocationLandmark",
        }
    }
}

impl FromStr for TextField {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TextField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| ModelError::UnknownField(s.to_string()))
    }
}

impl RecordFields {
    pub fn text(&self, field: TextField) -> Option<&str> {
        self.slot(field).as_deref()
    }

    pub fn set_text(&mut self, field: TextField, value: impl Into<String>) {
        *self.slot_mut(field) = Some(value.into());
    }

    /// Copy over every field the extractor actually found; blanks never erase input.
    pub fn apply(&mut self, partial: &PartialRecord) {
        for (field, value) in partial.entries() {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                self.set_text(field, v.to_string());
            }
        }
    }

    fn slot(&self, field: TextField) -> &Option<String> {
        match field {
            TextField::CustomerName => &self.customer_name,
            TextField::FatherName => &self.father_name,
            TextField::MobileNumber => &self.mobile_number,
            TextField::BikeNumber => &self.bike_number,
            TextField::EngineNumber => &self.engine_number,
            TextField::ChassisNumber => &self.chassis_number,
            TextField::InsuranceStart => &self.insurance_start,
            TextField::InsuranceEnd => &self.insurance_end,
            TextField::ThirdPartyStart => &self.third_party_start,
            TextField::ThirdPartyEnd => &self.third_party_end,
            TextField::PermanentAddress => &self.permanent_address,
            TextField::PermanentLandmark => &self.permanent_landmark,
            TextField::CorrespondenceAddress => &self.correspondence_address,
            TextField::CorrespondenceLandmark => &self.correspondence_landmark,
            TextField::BikeLocationAddress => &self.bike_location_address,
            TextField::BikeLocationLandmark => &self.bike_location_landmark,
        }
    }

    fn slot_mut(&mut self, field: TextField) -> &mut Option<String> {
        match field {
            TextField::CustomerName => &mut self.customer_name,
            TextField::FatherName => &mut self.father_name,
            TextField::MobileNumber => &mut self.mobile_number,
            TextField::BikeNumber => &mut self.bike_number,
            TextField::EngineNumber => &mut self.engine_number,
            TextField::ChassisNumber => &mut self.chassis_number,
            TextField::InsuranceStart => &mut self.insurance_start,
            TextField::InsuranceEnd => &mut self.insurance_end,
            TextField::ThirdPartyStart => &mut self.third_party_start,
            TextField::ThirdPartyEnd => &mut self.third_party_end,
            TextField::PermanentAddress => &mut self.permanent_address,
            TextField::PermanentLandmark => &mut self.permanent_landmark,
            TextField::CorrespondenceAddress => &mut self.correspondence_address,
            TextField::CorrespondenceLandmark => &mut self.correspondence_landmark,
            TextField::BikeLocationAddress => &mut self.bike_location_address,
            TextField::BikeLocationLandmark => &mut self.bike_location_landmark,
        }
    }
}

/// Subset of record fields produced by the text-extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chassis_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permanent_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correspondence_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bike_location_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_end: Option<String>,
}

impl PartialRecord {
    pub fn entries(&self) -> [(TextField, Option<&str>); 11] {
        [
            (TextField::CustomerName, self.customer_name.as_deref()),
            (TextField::FatherName, self.father_name.as_deref()),
            (TextField::MobileNumber, self.mobile_number.as_deref()),
            (TextField::BikeNumber, self.bike_number.as_deref()),
            (TextField::EngineNumber, self.engine_number.as_deref()),
            (TextField::ChassisNumber, self.chassis_number.as_deref()),
            (TextField::PermanentAddress, self.permanent_address.as_deref()),
            (TextField::CorrespondenceAddress, self.correspondence_address.as_deref()),
            (TextField::BikeLocationAddress, self.bike_location_address.as_deref()),
            (TextField::InsuranceStart, self.insurance_start.as_deref()),
            (TextField::InsuranceEnd, self.insurance_end.as_deref()),
        ]
    }

    /// True when no field carries usable text.
    pub fn is_empty(&self) -> bool {
        self.entries()
            .iter()
            .all(|(_, v)| v.map(|s| s.trim().is_empty()).unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoSlot;

    #[test]
    fn parses_stored_camel_case_entry() {
        let raw = r#"{
            "id": "1712345678901",
            "date": "4/4/2024",
            "customerName": "Asha",
            "bikeNumber": "MH12AB1234",
            "customerPhoto": "data:image/png;base64,AAAA",
            "kycPhotos": ["data:image/jpeg;base64,BBBB"],
            "someFutureField": {"nested": true}
        }"#;
        let rec: Record = serde_json::from_str(raw).expect("parse");
        assert_eq!(rec.id, "1712345678901");
        assert_eq!(rec.fields.customer_name.as_deref(), Some("Asha"));
        assert_eq!(rec.fields.photos.images(PhotoSlot::KycPhotos).len(), 1);
        assert!(rec.fields.father_name.is_none());
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let mut fields = RecordFields::default();
        fields.set_text(TextField::MobileNumber, "9876543210");
        let rec = Record { id: "a".into(), date: "1/1/2025".into(), fields };
        let value = serde_json::to_value(&rec).expect("json");
        let obj = value.as_object().expect("object");
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["mobileNumber"], "9876543210");
    }

    #[test]
    fn missing_identity_defaults_to_empty() {
        let rec: Record = serde_json::from_str(r#"{"customerName":"X"}"#).expect("parse");
        assert!(rec.id.is_empty());
        assert!(rec.date.is_empty());
    }

    #[test]
    fn apply_only_overwrites_found_fields() {
        let mut fields = RecordFields::default();
        fields.set_text(TextField::CustomerName, "Typed Name");
        fields.set_text(TextField::BikeNumber, "KA01");
        let partial = PartialRecord {
            customer_name: Some("   ".into()),
            bike_number: Some("MH12AB1234".into()),
            insurance_end: Some("2026-03-31".into()),
            ..PartialRecord::default()
        };
        fields.apply(&partial);
        assert_eq!(fields.text(TextField::CustomerName), Some("Typed Name"));
        assert_eq!(fields.text(TextField::BikeNumber), Some("MH12AB1234"));
        assert_eq!(fields.text(TextField::InsuranceEnd), Some("2026-03-31"));
    }

    #[test]
    fn partial_emptiness() {
        assert!(PartialRecord::default().is_empty());
        let blank = PartialRecord { father_name: Some(" ".into()), ..PartialRecord::default() };
        assert!(blank.is_empty());
        let found = PartialRecord { mobile_number: Some("98".into()), ..PartialRecord::default() };
        assert!(!found.is_empty());
    }

    #[test]
    fn new_record_gets_identity() {
        let a = Record::new(RecordFields::default());
        let b = Record::new(RecordFields::default());
        assert_ne!(a.id, b.id);
        assert!(!a.date.is_empty());
        assert_eq!("bikeLocationLandmark".parse::<TextField>(), Ok(TextField::BikeLocationLandmark));
    }
}
