use crate::domain::model::{CatalogData, CatalogSnapshot, OptionKind, Service, ServiceOption};
use crate::domain::payload::{RequestPayload, ResponsePayload, XmlNode};
use crate::utils::error::CatalogError;
use arc_swap::ArcSwap;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const CATALOG_METHOD: &str = "getCatalog";

pub fn catalog_request() -> RequestPayload {
    RequestPayload::new(CATALOG_METHOD)
}

/// Orders refreshes. A refresh may only replace a snapshot installed under an
/// older ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshTicket(u64);

impl RefreshTicket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Holds the current catalog snapshot.
///
/// Readers get an `Arc` to a complete snapshot without locking; writers build a
/// whole new snapshot and publish it with a single pointer swap.
pub struct CatalogStore {
    current: ArcSwap<CatalogSnapshot>,
    tickets: AtomicU64,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogStore {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(CatalogSnapshot::empty()),
            tickets: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        self.current.load_full()
    }

    /// Take a ticket before fetching the remote catalog.
    pub fn begin_refresh(&self) -> RefreshTicket {
        RefreshTicket(self.tickets.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Parses a `getCatalog` response and installs it.
    pub fn refresh(
        &self,
        ticket: RefreshTicket,
        source: &ResponsePayload,
    ) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let data = parse_catalog(source)?;
        self.install(ticket, data)
    }

    /// Installs already-parsed catalog data. Integrity failures leave the
    /// current snapshot in place; a ticket older than the installed snapshot
    /// is discarded and the installed snapshot is returned.
    pub fn install(
        &self,
        ticket: RefreshTicket,
        data: CatalogData,
    ) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        check_integrity(
            data.services.iter().map(|service| (&service.code, &service.options)),
            data.options.iter().map(|option| (&option.code, &option.services)),
        )?;

        let mut installed = None;
        let previous = self.current.rcu(|previous| {
            if previous.revision >= ticket.0 {
                installed = None;
                return Arc::clone(previous);
            }
            let next = Arc::new(merge(previous, ticket.0, &data));
            installed = Some(Arc::clone(&next));
            next
        });

        match installed {
            Some(snapshot) => {
                tracing::info!(
                    "Catalog revision {} installed: {} services, {} options ({} inactive entries kept)",
                    snapshot.revision,
                    data.services.len(),
                    data.options.len(),
                    snapshot.services.len() + snapshot.options.len()
                        - data.services.len()
                        - data.options.len()
                );
                Ok(snapshot)
            }
            None => {
                tracing::warn!(
                    "Catalog refresh {} discarded, revision {} is already installed",
                    ticket.0,
                    previous.revision
                );
                Ok(previous)
            }
        }
    }

    /// Reinstalls a previously cached snapshot (e.g. on process start).
    pub fn restore(&self, snapshot: CatalogSnapshot) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        check_integrity(
            snapshot
                .services
                .values()
                .map(|service| (&service.code, &service.options)),
            snapshot
                .options
                .values()
                .map(|option| (&option.code, &option.services)),
        )?;
        self.tickets.fetch_max(snapshot.revision, Ordering::SeqCst);

        let restored = Arc::new(snapshot);
        let previous = self.current.rcu(|previous| {
            if previous.revision >= restored.revision {
                Arc::clone(previous)
            } else {
                Arc::clone(&restored)
            }
        });
        if previous.revision >= restored.revision {
            return Ok(previous);
        }
        tracing::debug!("Catalog revision {} restored from cache", restored.revision);
        Ok(restored)
    }
}

/// New entries are active; entries only known from the previous snapshot are
/// kept as inactive.
fn merge(previous: &CatalogSnapshot, revision: u64, data: &CatalogData) -> CatalogSnapshot {
    let mut services: BTreeMap<String, Service> = data
        .services
        .iter()
        .map(|service| {
            let mut service = service.clone();
            service.active = true;
            (service.code.clone(), service)
        })
        .collect();
    for (code, service) in &previous.services {
        services.entry(code.clone()).or_insert_with(|| Service {
            active: false,
            ..service.clone()
        });
    }

    let mut options: BTreeMap<String, ServiceOption> = data
        .options
        .iter()
        .map(|option| {
            let mut option = option.clone();
            option.active = true;
            (option.code.clone(), option)
        })
        .collect();
    for (code, option) in &previous.options {
        options.entry(code.clone()).or_insert_with(|| ServiceOption {
            active: false,
            ..option.clone()
        });
    }

    CatalogSnapshot {
        revision,
        refreshed_at: Utc::now(),
        services,
        options,
    }
}

fn check_integrity<'a>(
    services: impl Iterator<Item = (&'a String, &'a Vec<String>)> + Clone,
    options: impl Iterator<Item = (&'a String, &'a Vec<String>)> + Clone,
) -> Result<(), CatalogError> {
    let service_codes = unique_codes("service", services.clone())?;
    let option_codes = unique_codes("option", options.clone())?;

    for (service, referenced) in services {
        if let Some(missing) = referenced.iter().find(|code| !option_codes.contains(code.as_str())) {
            return Err(CatalogError::malformed(format!(
                "service '{}' references unknown option '{}'",
                service, missing
            )));
        }
    }
    for (option, referenced) in options {
        if let Some(missing) = referenced.iter().find(|code| !service_codes.contains(code.as_str())) {
            return Err(CatalogError::malformed(format!(
                "option '{}' references unknown service '{}'",
                option, missing
            )));
        }
    }
    Ok(())
}

fn unique_codes<'a>(
    kind: &str,
    entries: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
) -> Result<HashSet<&'a str>, CatalogError> {
    let mut codes = HashSet::new();
    for (code, _) in entries {
        if !codes.insert(code.as_str()) {
            return Err(CatalogError::malformed(format!(
                "duplicate {} '{}'",
                kind, code
            )));
        }
    }
    Ok(codes)
}

/// Maps the `getCatalog` response element onto catalog data.
pub fn parse_catalog(source: &ResponsePayload) -> Result<CatalogData, CatalogError> {
    let catalog = source
        .body
        .child("return")
        .ok_or_else(|| CatalogError::malformed("response has no <return> element"))?;

    let services = catalog
        .children_named("service")
        .map(parse_service)
        .collect::<Result<Vec<_>, _>>()?;
    let options = catalog
        .children_named("option")
        .map(parse_option)
        .collect::<Result<Vec<_>, _>>()?;

    if services.is_empty() {
        return Err(CatalogError::malformed("catalog lists no service"));
    }
    Ok(CatalogData { services, options })
}

fn parse_service(node: &XmlNode) -> Result<Service, CatalogError> {
    let code = required_text(node, "code", "service")?;
    Ok(Service {
        name: node.child_text("name").unwrap_or(&code).to_string(),
        group: required_text(node, "group", &code)?,
        basic: parse_flag(node, "basic", &code)?,
        options: list(node, "options", "option"),
        max_weight_kg: parse_number(node, "maxWeightKg", &code)?,
        max_dimension_cm: parse_number(node, "maxDimensionCm", &code)?,
        max_instructions_len: parse_number::<usize>(node, "maxInstructionsLength", &code)?,
        active: true,
        code,
    })
}

fn parse_option(node: &XmlNode) -> Result<ServiceOption, CatalogError> {
    let code = required_text(node, "code", "option")?;
    let kind_text = required_text(node, "kind", &code)?;
    let kind = OptionKind::from_wire(&kind_text).ok_or_else(|| {
        CatalogError::malformed(format!("option '{}' has unknown kind '{}'", code, kind_text))
    })?;
    Ok(ServiceOption {
        name: node.child_text("name").unwrap_or(&code).to_string(),
        kind,
        services: list(node, "services", "service"),
        exclusivity_group: node.child_text("exclusivityGroup").map(str::to_string),
        active: true,
        code,
    })
}

fn required_text(node: &XmlNode, field: &str, owner: &str) -> Result<String, CatalogError> {
    node.child_text(field)
        .map(str::to_string)
        .ok_or_else(|| CatalogError::malformed(format!("{} has no <{}>", owner, field)))
}

fn parse_flag(node: &XmlNode, field: &str, owner: &str) -> Result<bool, CatalogError> {
    match node.child_text(field) {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(other) => Err(CatalogError::malformed(format!(
            "{}: <{}> is not a boolean: '{}'",
            owner, field, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(
    node: &XmlNode,
    field: &str,
    owner: &str,
) -> Result<Option<T>, CatalogError> {
    node.child_text(field)
        .map(|text| {
            text.parse::<T>().map_err(|_| {
                CatalogError::malformed(format!(
                    "{}: <{}> is not a number: '{}'",
                    owner, field, text
                ))
            })
        })
        .transpose()
}

fn list(node: &XmlNode, container: &str, item: &str) -> Vec<String> {
    node.child(container)
        .map(|list| {
            list.children_named(item)
                .map(|entry| entry.text.trim().to_string())
                .filter(|code| !code.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
