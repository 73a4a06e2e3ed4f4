//! Core data models used throughout pet-tagger.
//!
//! These types cover the three shapes that flow through the system: labels
//! coming back from the image-labeling service, post records written to the
//! document store, and the form submission that produces them.
//!
//! Stored attribute names follow the existing collection schema, so several
//! fields carry a `serde(rename)` (e.g. `pet_name` ↔ `mascota`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A parent category attached to a [`RawLabel`] (e.g. `Dog` → `Animal`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelParent {
    pub name: String,
}

/// A label as produced by the image-labeling service, including its
/// category hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLabel {
    pub name: String,
    /// Confidence in percent, `0.0..=100.0`.
    pub confidence: f64,
    #[serde(default)]
    pub parents: Vec<LabelParent>,
}

impl RawLabel {
    pub fn new(name: &str, confidence: f64, parents: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            confidence,
            parents: parents
                .iter()
                .map(|p| LabelParent {
                    name: p.to_string(),
                })
                .collect(),
        }
    }
}

/// A label as reported back to API clients.
///
/// `confidence` is rounded to two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f64,
}

impl From<&RawLabel> for Label {
    fn from(raw: &RawLabel) -> Self {
        Self {
            name: raw.name.clone(),
            confidence: (raw.confidence * 100.0).round() / 100.0,
        }
    }
}

/// A lost/found/adoption listing as stored in the posts collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "mascota", default)]
    pub pet_name: Option<String>,
    #[serde(rename = "especie", default)]
    pub species: Option<String>,
    #[serde(rename = "sexo", default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "contacto", default)]
    pub contact: Option<String>,
    /// Listing status ("found", "lost", "adoption", ...).
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(rename = "imageIds", default, deserialize_with = "null_as_empty")]
    pub image_ids: Vec<String>,
    #[serde(rename = "imageUrls", default, deserialize_with = "null_as_empty")]
    pub image_urls: Vec<String>,
    /// Animal-related labels detected in the post's image.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ai_tags: Vec<String>,
}

/// Satellite record holding the optional reward/adoption/foster attributes
/// of a [`Post`]. Linked back through `post`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetails {
    pub post: String,
    pub reward: Option<String>,
    pub found_condition: Option<String>,
    pub adoption_requirements: Option<String>,
    pub adoption_fee: Option<f64>,
    pub foster_start: Option<String>,
    pub foster_end: Option<String>,
    pub foster_requirements: Option<String>,
}

/// A post exactly as the document store returned it.
///
/// The collection may hold attributes this service never writes (relationship
/// objects, counters, ...), so the document is kept as a raw JSON object and
/// only the attributes the service needs are read from it, leniently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostDocument(pub Map<String, Value>);

impl PostDocument {
    /// The store-assigned `$id`, if present.
    pub fn id(&self) -> Option<&str> {
        self.0.get("$id").and_then(Value::as_str)
    }

    /// The string entries of `ai_tags`. Anything other than an array yields
    /// nothing.
    pub fn ai_tags(&self) -> impl Iterator<Item = &str> {
        self.0
            .get("ai_tags")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    pub fn caption(&self) -> Option<&str> {
        self.0.get("caption").and_then(Value::as_str)
    }
}

impl TryFrom<Value> for PostDocument {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> anyhow::Result<Self> {
        match value {
            Value::Object(fields) => Ok(PostDocument(fields)),
            other => anyhow::bail!("expected a JSON object, got {}", other),
        }
    }
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Text fields of a create-post form submission.
///
/// Field names match the multipart form keys sent by the front end; unknown
/// keys are ignored by [`PostSubmission::set_field`].
#[derive(Debug, Clone, Default)]
pub struct PostSubmission {
    pub creator: Option<String>,
    pub caption: Option<String>,
    pub location: Option<String>,
    pub pet_name: Option<String>,
    pub species: Option<String>,
    pub sex: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub contact: Option<String>,
    pub status: Option<String>,
    pub reward: Option<String>,
    pub found_condition: Option<String>,
    pub adoption_requirements: Option<String>,
    pub adoption_fee: Option<String>,
    pub foster_start: Option<String>,
    pub foster_end: Option<String>,
    pub foster_requirements: Option<String>,
}

impl PostSubmission {
    /// Record a form field by its form key. Returns `false` for unknown keys.
    pub fn set_field(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "creator" => &mut self.creator,
            "caption" => &mut self.caption,
            "location" => &mut self.location,
            "mascota" => &mut self.pet_name,
            "especie" => &mut self.species,
            "sexo" => &mut self.sex,
            "color" => &mut self.color,
            "size" => &mut self.size,
            "contacto" => &mut self.contact,
            "tags" => &mut self.status,
            "reward" => &mut self.reward,
            "foundCondition" => &mut self.found_condition,
            "adoptionRequirements" => &mut self.adoption_requirements,
            "adoptionFee" => &mut self.adoption_fee,
            "fosterStart" => &mut self.foster_start,
            "fosterEnd" => &mut self.foster_end,
            "fosterRequirements" => &mut self.foster_requirements,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    /// Build the post record for this submission.
    pub fn to_post(&self, ai_tags: Vec<String>, image_id: String, image_url: String) -> Post {
        Post {
            creator: self.creator.clone(),
            caption: self.caption.clone(),
            location: self.location.clone(),
            pet_name: self.pet_name.clone(),
            species: self.species.clone(),
            sex: self.sex.clone(),
            color: self.color.clone(),
            size: self.size.clone(),
            contact: self.contact.clone(),
            tags: self.status.iter().cloned().collect(),
            image_ids: vec![image_id],
            image_urls: vec![image_url],
            ai_tags,
        }
    }

    /// Build the details record linked to the post `post_id`.
    pub fn to_details(&self, post_id: &str) -> PostDetails {
        PostDetails {
            post: post_id.to_string(),
            reward: self.reward.clone(),
            found_condition: self.found_condition.clone(),
            adoption_requirements: self.adoption_requirements.clone(),
            adoption_fee: self.adoption_fee.as_deref().and_then(parse_fee),
            foster_start: self.foster_start.clone(),
            foster_end: self.foster_end.clone(),
            foster_requirements: self.foster_requirements.clone(),
        }
    }
}

/// Parse a form-submitted fee. Empty or non-numeric input yields `None`.
fn parse_fee(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|fee| fee.is_finite())
}

/// Generate a fresh document/file identifier accepted by the stores
/// (32 lowercase hex characters).
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
