use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instruction length accepted by services that do not state their own maximum.
pub const DEFAULT_MAX_INSTRUCTIONS_LEN: usize = 70;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub code: String,
    pub name: String,
    pub group: String,
    pub basic: bool,
    pub options: Vec<String>,
    pub max_weight_kg: Option<f64>,
    pub max_dimension_cm: Option<f64>,
    pub max_instructions_len: Option<usize>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl Service {
    pub fn instructions_limit(&self) -> usize {
        self.max_instructions_len
            .unwrap_or(DEFAULT_MAX_INSTRUCTIONS_LEN)
    }

    pub fn accepts(&self, parcel: &Parcel) -> bool {
        let weight_ok = self
            .max_weight_kg
            .map_or(true, |max| parcel.weight_kg <= max);
        let size_ok = match (self.max_dimension_cm, parcel.largest_side_cm()) {
            (Some(max), Some(side)) => side <= max,
            _ => true,
        };
        weight_ok && size_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptionKind {
    MandatoryDefault,
    OptionalDefault,
    Optional,
}

impl OptionKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim() {
            "mandatory-default" | "MANDATORY_DEFAULT" => Some(OptionKind::MandatoryDefault),
            "optional-default" | "OPTIONAL_DEFAULT" => Some(OptionKind::OptionalDefault),
            "optional" | "OPTIONAL" => Some(OptionKind::Optional),
            _ => None,
        }
    }
}

/// An add-on a service may carry (signature, insurance...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOption {
    pub code: String,
    pub name: String,
    pub kind: OptionKind,
    pub services: Vec<String>,
    pub exclusivity_group: Option<String>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

impl ServiceOption {
    pub fn allows(&self, service: &str) -> bool {
        self.services.iter().any(|code| code == service)
    }
}

fn active_by_default() -> bool {
    true
}

/// Services and options as delivered by one refresh, before integrity checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogData {
    pub services: Vec<Service>,
    pub options: Vec<ServiceOption>,
}

/// Immutable view of the catalog. Lookups are keyed by code and ordered so
/// that every listing is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub revision: u64,
    pub refreshed_at: DateTime<Utc>,
    pub services: BTreeMap<String, Service>,
    pub options: BTreeMap<String, ServiceOption>,
}

impl CatalogSnapshot {
    pub fn empty() -> Self {
        Self {
            revision: 0,
            refreshed_at: Utc::now(),
            services: BTreeMap::new(),
            options: BTreeMap::new(),
        }
    }

    pub fn service(&self, code: &str) -> Option<&Service> {
        self.services.get(code)
    }

    pub fn option(&self, code: &str) -> Option<&ServiceOption> {
        self.options.get(code)
    }

    pub fn active_service(&self, code: &str) -> Option<&Service> {
        self.service(code).filter(|service| service.active)
    }

    pub fn active_option(&self, code: &str) -> Option<&ServiceOption> {
        self.option(code).filter(|option| option.active)
    }

    pub fn active_services(&self) -> impl Iterator<Item = &Service> {
        self.services.values().filter(|service| service.active)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.options.is_empty()
    }
}

/// A service plus options that passed the compatibility checks, options in
/// canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSelection {
    pub service: Service,
    pub options: Vec<ServiceOption>,
}

impl ValidatedSelection {
    pub fn service_code(&self) -> &str {
        &self.service.code
    }

    pub fn option_codes(&self) -> Vec<String> {
        self.options.iter().map(|option| option.code.clone()).collect()
    }
}

/// What an operator submits when saving a carrier method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierMethodDraft {
    pub id: String,
    pub service_group: String,
    pub service: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierMethod {
    id: String,
    service_group: String,
    service: String,
    options: Vec<String>,
    instructions: String,
}

impl CarrierMethod {
    /// The only constructor: the selection must already have been validated
    /// against the draft's service.
    pub fn configure(draft: CarrierMethodDraft, selection: &ValidatedSelection) -> Self {
        Self {
            id: draft.id,
            service_group: draft.service_group,
            service: selection.service.code.clone(),
            options: selection.option_codes(),
            instructions: draft.instructions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn service_group(&self) -> &str {
        &self.service_group
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub street2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub weight_kg: f64,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
}

impl Parcel {
    pub fn dimensions(&self) -> impl Iterator<Item = f64> {
        [self.length_cm, self.width_cm, self.height_cm]
            .into_iter()
            .flatten()
    }

    pub fn largest_side_cm(&self) -> Option<f64> {
        self.dimensions().reduce(f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: String,
    pub reference: String,
    pub sender: Address,
    pub recipient: Address,
    pub parcel: Parcel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBlock {
    pub name: String,
    pub street: String,
    pub street2: Option<String>,
    pub city: String,
    pub zip_code: String,
    pub country_code: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelBlock {
    pub weight_kg: f64,
    pub length_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub height_cm: Option<f64>,
}

/// One label call's worth of data, laid out the way the webservice expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub shipment_reference: String,
    pub carrier_method: String,
    pub service_code: String,
    pub option_codes: Vec<String>,
    pub sender: AddressBlock,
    pub recipient: AddressBlock,
    pub parcel: ParcelBlock,
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelArtifact {
    pub tracking_number: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}
