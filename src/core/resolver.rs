//! Compatibility checks between services and options.
//!
//! Every lookup goes through the snapshot passed in, so a validation never
//! mixes two catalog revisions.

use crate::domain::model::{
    CarrierMethod, CatalogSnapshot, Parcel, Service, ServiceOption, ValidatedSelection,
};
use crate::utils::error::CompatibilityError;
use std::collections::{BTreeMap, HashSet};

/// An option is usable with a service only when both sides list each other.
pub fn is_compatible(service: &Service, option: &ServiceOption) -> bool {
    option.allows(&service.code) && service.options.iter().any(|code| *code == option.code)
}

fn canonical_order(a: &&ServiceOption, b: &&ServiceOption) -> std::cmp::Ordering {
    a.kind.cmp(&b.kind).then_with(|| a.code.cmp(&b.code))
}

pub fn validate(
    service_id: &str,
    option_ids: &[String],
    snapshot: &CatalogSnapshot,
) -> Result<ValidatedSelection, CompatibilityError> {
    let service = snapshot
        .active_service(service_id)
        .ok_or_else(|| CompatibilityError::UnknownService {
            service: service_id.to_string(),
        })?;
    if !service.basic {
        return Err(CompatibilityError::NotBasic {
            service: service_id.to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut accepted = Vec::with_capacity(option_ids.len());
    for option_id in option_ids {
        if !seen.insert(option_id.as_str()) {
            continue;
        }
        let option = snapshot
            .active_option(option_id)
            .ok_or_else(|| CompatibilityError::UnknownOption {
                option: option_id.clone(),
            })?;
        if !is_compatible(service, option) {
            return Err(CompatibilityError::Incompatible {
                service: service.code.clone(),
                option: option.code.clone(),
            });
        }
        accepted.push(option);
    }

    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for option in &accepted {
        if let Some(group) = option.exclusivity_group.as_deref() {
            groups.entry(group).or_default().push(option.code.as_str());
        }
    }
    if let Some((group, members)) = groups.into_iter().find(|(_, members)| members.len() > 1) {
        let mut options: Vec<String> = members.into_iter().map(str::to_string).collect();
        options.sort();
        return Err(CompatibilityError::ConflictingOptions {
            group: group.to_string(),
            options,
        });
    }

    accepted.sort_by(canonical_order);
    Ok(ValidatedSelection {
        service: service.clone(),
        options: accepted.into_iter().cloned().collect(),
    })
}

/// Options an operator may pick once `service_id` is chosen, canonically
/// ordered. Unknown or inactive services have no options.
pub fn filter_options<'a>(service_id: &str, snapshot: &'a CatalogSnapshot) -> Vec<&'a ServiceOption> {
    let Some(service) = snapshot.active_service(service_id) else {
        return Vec::new();
    };
    let mut options: Vec<&ServiceOption> = service
        .options
        .iter()
        .filter_map(|code| snapshot.active_option(code))
        .filter(|option| is_compatible(service, option))
        .collect();
    options.sort_by(canonical_order);
    options.dedup_by(|a, b| a.code == b.code);
    options
}

/// `validate` plus the service group the method was configured under.
pub fn validate_in_group(
    group: &str,
    service_id: &str,
    option_ids: &[String],
    snapshot: &CatalogSnapshot,
) -> Result<ValidatedSelection, CompatibilityError> {
    let selection = validate(service_id, option_ids, snapshot)?;
    if selection.service.group != group {
        return Err(CompatibilityError::WrongGroup {
            service: service_id.to_string(),
            group: group.to_string(),
        });
    }
    Ok(selection)
}

pub fn validate_carrier_method(
    method: &CarrierMethod,
    snapshot: &CatalogSnapshot,
) -> Result<ValidatedSelection, CompatibilityError> {
    validate_in_group(
        method.service_group(),
        method.service(),
        method.options(),
        snapshot,
    )
}

/// Methods still valid against `snapshot` whose service takes this parcel.
pub fn available_methods<'a>(
    snapshot: &CatalogSnapshot,
    methods: &'a [CarrierMethod],
    parcel: &Parcel,
) -> Vec<&'a CarrierMethod> {
    methods
        .iter()
        .filter(|method| is_available(snapshot, method, parcel))
        .collect()
}

/// The preferred method when it is available, else the current one, else none.
pub fn preferred_method<'a>(
    snapshot: &CatalogSnapshot,
    preferred: Option<&'a CarrierMethod>,
    current: Option<&'a CarrierMethod>,
    parcel: &Parcel,
) -> Option<&'a CarrierMethod> {
    preferred
        .into_iter()
        .chain(current)
        .find(|method| is_available(snapshot, method, parcel))
}

fn is_available(snapshot: &CatalogSnapshot, method: &CarrierMethod, parcel: &Parcel) -> bool {
    match validate_carrier_method(method, snapshot) {
        Ok(selection) => selection.service.accepts(parcel),
        Err(err) => {
            tracing::debug!("Carrier method '{}' unavailable: {}", method.id(), err);
            false
        }
    }
}
