//! Inspection records and the collaborators that supply them
//!
//! The exporter never mutates these; they are read to build report markup.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Condominium {
    pub id: String,
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Stored photo metadata
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhotoMeta {
    /// Path or URL the image is loaded from
    pub file_locator: String,
    pub display_name: String,
    pub byte_size: u64,
    pub mime_type: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Item {
    pub name: String,
    pub condition: Option<String>,
    pub notes: Option<String>,
    pub photos: Vec<PhotoMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ItemGroup {
    pub name: String,
    pub items: Vec<Item>,
}

/// A room or area of the building
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub name: String,
    pub groups: Vec<ItemGroup>,
    pub photos: Vec<PhotoMeta>,
}

impl Environment {
    /// Every photo of the environment: its own first, then each item's in order.
    pub fn all_photos(&self) -> Vec<&PhotoMeta> {
        self.photos
            .iter()
            .chain(
                self.groups
                    .iter()
                    .flat_map(|g| g.items.iter())
                    .flat_map(|i| i.photos.iter()),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Inspection {
    pub id: String,
    pub title: String,
    pub condominium_id: String,
    pub inspector_id: String,
    /// ISO date as stored, rendered verbatim
    pub date: String,
    pub weather_note: Option<String>,
    pub environments: Vec<Environment>,
}

/// Read access to stored inspections.
pub trait InspectionSource: Send + Sync {
    fn inspection(&self, id: &str) -> Result<Inspection>;
    fn condominium(&self, id: &str) -> Result<Option<Condominium>>;
    fn user(&self, id: &str) -> Result<Option<UserProfile>>;
}

/// The signed-in user, if any.
pub trait AuthContext: Send + Sync {
    fn current_user(&self) -> Option<UserProfile>;
}

/// A fixed identity, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth(pub Option<UserProfile>);

impl AuthContext for StaticAuth {
    fn current_user(&self) -> Option<UserProfile> {
        self.0.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InspectionFile {
    inspections: Vec<Inspection>,
    condominiums: Vec<Condominium>,
    users: Vec<UserProfile>,
}

/// Inspections read from a JSON file:
///
/// ```json
/// { "inspections": [...], "condominiums": [...], "users": [...] }
/// ```
#[derive(Debug, Default)]
pub struct JsonInspectionSource {
    inspections: Vec<Inspection>,
    condominiums: HashMap<String, Condominium>,
    users: HashMap<String, UserProfile>,
}

impl JsonInspectionSource {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: InspectionFile = serde_json::from_str(json)?;
        Ok(Self {
            inspections: file.inspections,
            condominiums: file
                .condominiums
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            users: file.users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The first stored inspection, for single-record files.
    pub fn first(&self) -> Option<&Inspection> {
        self.inspections.first()
    }
}

impl InspectionSource for JsonInspectionSource {
    fn inspection(&self, id: &str) -> Result<Inspection> {
        self.inspections
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| Error::InvalidReport(format!("inspection {} not found", id)))
    }

    fn condominium(&self, id: &str) -> Result<Option<Condominium>> {
        Ok(self.condominiums.get(id).cloned())
    }

    fn user(&self, id: &str) -> Result<Option<UserProfile>> {
        Ok(self.users.get(id).cloned())
    }
}
