use parcel_label::adapters::webservice::xml::{decode, resolve_references, DecodeError, DecodeLimits};
use parcel_label::core::resolver::{filter_options, is_compatible, validate};
use parcel_label::domain::model::{CatalogData, CatalogSnapshot, OptionKind, Service, ServiceOption};
use parcel_label::utils::error::CompatibilityError;
use parcel_label::CatalogStore;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// Per option: which services it allows, its exclusivity group and its kind.
type OptionSpec = (Vec<bool>, Option<u8>, u8);

fn build_catalog(service_count: usize, specs: &[OptionSpec]) -> CatalogData {
    let options: Vec<ServiceOption> = specs
        .iter()
        .enumerate()
        .map(|(i, (allowed, group, kind))| ServiceOption {
            code: format!("O{}", i),
            name: format!("Option {}", i),
            kind: match kind {
                0 => OptionKind::MandatoryDefault,
                1 => OptionKind::OptionalDefault,
                _ => OptionKind::Optional,
            },
            services: allowed
                .iter()
                .enumerate()
                .filter(|(_, allowed)| **allowed)
                .map(|(s, _)| format!("S{}", s))
                .collect(),
            exclusivity_group: group.map(|g| format!("G{}", g)),
            active: true,
        })
        .collect();

    let services = (0..service_count)
        .map(|s| {
            let code = format!("S{}", s);
            Service {
                options: options
                    .iter()
                    .filter(|option| option.services.contains(&code))
                    .map(|option| option.code.clone())
                    .collect(),
                name: code.clone(),
                group: "HOME".to_string(),
                basic: true,
                max_weight_kg: None,
                max_dimension_cm: None,
                max_instructions_len: None,
                active: true,
                code,
            }
        })
        .collect();

    CatalogData { services, options }
}

fn install(data: CatalogData) -> Arc<CatalogSnapshot> {
    let store = CatalogStore::new();
    store.install(store.begin_refresh(), data).unwrap()
}

/// A catalog, a service index and an option mask.
fn catalog_and_pick() -> impl Strategy<Value = (CatalogData, usize, Vec<bool>)> {
    (1usize..5, 1usize..9).prop_flat_map(|(service_count, option_count)| {
        (
            prop::collection::vec(
                (
                    prop::collection::vec(any::<bool>(), service_count),
                    prop::option::of(0u8..3),
                    0u8..3,
                ),
                option_count,
            ),
            0..service_count,
            prop::collection::vec(any::<bool>(), option_count),
        )
            .prop_map(move |(specs, service, mask)| {
                (build_catalog(service_count, &specs), service, mask)
            })
    })
}

fn canonical(options: &[ServiceOption]) -> Vec<String> {
    let mut sorted: Vec<&ServiceOption> = options.iter().collect();
    sorted.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.code.cmp(&b.code)));
    sorted.iter().map(|option| option.code.clone()).collect()
}

proptest! {
    #[test]
    fn compatible_selections_validate_in_canonical_order((data, service, mask) in catalog_and_pick()) {
        let snapshot = install(data);
        let service_code = format!("S{}", service);
        let service = snapshot.active_service(&service_code).unwrap();

        let mut groups = HashSet::new();
        let selection: Vec<String> = service
            .options
            .iter()
            .filter(|code| mask[code[1..].parse::<usize>().unwrap()])
            .filter(|code| match &snapshot.option(code).unwrap().exclusivity_group {
                Some(group) => groups.insert(group.clone()),
                None => true,
            })
            .cloned()
            .collect();

        let validated = validate(&service_code, &selection, &snapshot).unwrap();

        let returned: HashSet<&str> = validated.options.iter().map(|o| o.code.as_str()).collect();
        let requested: HashSet<&str> = selection.iter().map(String::as_str).collect();
        prop_assert_eq!(returned, requested);
        prop_assert_eq!(validated.option_codes(), canonical(&validated.options));
    }

    #[test]
    fn an_incompatible_option_is_always_reported_as_incompatible(
        (data, service, mask) in catalog_and_pick(),
        position in any::<prop::sample::Index>(),
    ) {
        let snapshot = install(data);
        let service_code = format!("S{}", service);
        let service = snapshot.active_service(&service_code).unwrap();

        let outsider = snapshot
            .options
            .values()
            .find(|option| !is_compatible(service, option))
            .map(|option| option.code.clone());
        prop_assume!(outsider.is_some());
        let outsider = outsider.unwrap();

        let mut selection: Vec<String> = service
            .options
            .iter()
            .filter(|code| mask[code[1..].parse::<usize>().unwrap()])
            .cloned()
            .collect();
        selection.insert(position.index(selection.len() + 1), outsider.clone());

        let err = validate(&service_code, &selection, &snapshot).unwrap_err();
        prop_assert_eq!(err, CompatibilityError::Incompatible { service: service_code, option: outsider });
    }

    #[test]
    fn filter_options_is_compatible_and_idempotent((data, service, _mask) in catalog_and_pick()) {
        let snapshot = install(data);
        let service_code = format!("S{}", service);
        let service = snapshot.active_service(&service_code).unwrap();

        let first: Vec<String> = filter_options(&service_code, &snapshot)
            .iter()
            .map(|option| option.code.clone())
            .collect();
        for option in filter_options(&service_code, &snapshot) {
            prop_assert!(is_compatible(service, option));
        }
        let second: Vec<String> = filter_options(&service_code, &snapshot)
            .iter()
            .map(|option| option.code.clone())
            .collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn reference_cycles_are_too_complex(length in 1usize..40, entry in any::<prop::sample::Index>()) {
        let start = entry.index(length);
        let mut xml = format!("<Body><getCatalogResponse><return href=\"#r{}\"/></getCatalogResponse>", start);
        for i in 0..length {
            xml.push_str(&format!(
                "<multiRef id=\"r{}\"><code>X{}</code><next href=\"#r{}\"/></multiRef>",
                i,
                i,
                (i + 1) % length
            ));
        }
        xml.push_str("</Body>");

        let limits = DecodeLimits::default();
        let root = decode(xml.as_bytes(), &limits).unwrap();
        let resolved = resolve_references(root, &limits);
        prop_assert!(matches!(resolved, Err(DecodeError::TooComplex(_))));
    }
}
