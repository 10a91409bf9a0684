use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ModelError;

/// Named attachment point on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoSlot {
    CustomerPhoto,
    VehiclePhoto,
    KycPhotos,
    PermanentPhotos,
    CorrespondencePhotos,
    BikeLocationPhotos,
}

impl PhotoSlot {
    pub const ALL: [PhotoSlot; 6] = [
        PhotoSlot::CustomerPhoto,
        PhotoSlot::VehiclePhoto,
        PhotoSlot::KycPhotos,
        PhotoSlot::PermanentPhotos,
        PhotoSlot::CorrespondencePhotos,
        PhotoSlot::BikeLocationPhotos,
    ];

    /// Multi slots hold an ordered list; singular slots hold at most one image.
    pub fn is_multi(self) -> bool {
        !matches!(self, PhotoSlot::CustomerPhoto | PhotoSlot::VehiclePhoto)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PhotoSlot::CustomerPhoto => "customerPhoto",
            PhotoSlot::VehiclePhoto => "vehiclePhoto",
            PhotoSlot::KycPhotos => "kycPhotos",
            PhotoSlot::PermanentPhotos => "permanentPhotos",
            PhotoSlot::CorrespondencePhotos => "correspondencePhotos",
            PhotoSlot::BikeLocationPhotos => "bikeLocationPhotos",
        }
    }
}

impl fmt::Display for PhotoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoSlot {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhotoSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownSlot(s.to_string()))
    }
}

/// Inline image payloads (data URLs) attached to a record or a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photos {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_photo: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub kyc_photos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub permanent_photos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub correspondence_photos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub bike_location_photos: Vec<String>,
}

/// Accept an explicit `null` where a value is expected and treat it as the default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Photos {
    /// Images currently held by `slot`, in order. An empty singular value counts as absent.
    pub fn images(&self, slot: PhotoSlot) -> Vec<&str> {
        match slot {
            PhotoSlot::CustomerPhoto | PhotoSlot::VehiclePhoto => self
                .single(slot)
                .as_deref()
                .filter(|s| !s.is_empty())
                .into_iter()
                .collect(),
            _ => self.list(slot).iter().map(String::as_str).collect(),
        }
    }

    /// Overwrite a singular slot or append to a multi slot.
    pub fn attach(&mut self, slot: PhotoSlot, data_url: String) {
        if slot.is_multi() {
            if let Some(list) = self.list_mut(slot) {
                list.push(data_url);
            }
        } else if let Some(single) = self.single_mut(slot) {
            *single = Some(data_url);
        }
    }

    /// Clear a singular slot, or remove position `index` of a multi slot.
    ///
    /// Returns whether an image was removed. A missing or out-of-range index on a
    /// multi slot removes nothing.
    pub fn remove(&mut self, slot: PhotoSlot, index: Option<usize>) -> bool {
        if slot.is_multi() {
            match (self.list_mut(slot), index) {
                (Some(list), Some(i)) if i < list.len() => {
                    list.remove(i);
                    true
                }
                _ => false,
            }
        } else {
            self.single_mut(slot)
                .and_then(|single| single.take())
                .is_some()
        }
    }

    pub fn count(&self) -> usize {
        PhotoSlot::ALL.iter().map(|slot| self.images(*slot).len()).sum()
    }

    fn single(&self, slot: PhotoSlot) -> &Option<String> {
        match slot {
            PhotoSlot::VehiclePhoto => &self.vehicle_photo,
            _ => &self.customer_photo,
        }
    }

    fn single_mut(&mut self, slot: PhotoSlot) -> Option<&mut Option<String>> {
        match slot {
            PhotoSlot::CustomerPhoto => Some(&mut self.customer_photo),
            PhotoSlot::VehiclePhoto => Some(&mut self.vehicle_photo),
            _ => None,
        }
    }

    fn list(&self, slot: PhotoSlot) -> &[String] {
        match slot {
            PhotoSlot::KycPhotos => &self.kyc_photos,
            PhotoSlot::PermanentPhotos => &self.permanent_photos,
            PhotoSlot::CorrespondencePhotos => &self.correspondence_photos,
            PhotoSlot::BikeLocationPhotos => &self.bike_location_photos,
            _ => &[],
        }
    }

    fn list_mut(&mut self, slot: PhotoSlot) -> Option<&mut Vec<String>> {
        match slot {
            PhotoSlot::KycPhotos => Some(&mut self.kyc_photos),
            PhotoSlot::PermanentPhotos => Some(&mut self.permanent_photos),
            PhotoSlot::CorrespondencePhotos => Some(&mut self.correspondence_photos),
            PhotoSlot::BikeLocationPhotos => Some(&mut self.bike_location_photos),
            _ => None,
        }
    }
}
