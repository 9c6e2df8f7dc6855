use crate::domain::model::{CarrierMethod, CatalogSnapshot, LabelArtifact, Shipment};
use crate::domain::ports::{AttachmentStore, CarrierMethodStore, CatalogCache, ShipmentProvider};
use crate::utils::error::HostError;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const CATALOG_FILE: &str = "catalog.json";

/// Host data kept as JSON files under one directory:
/// `shipments/<id>.json`, `methods/<id>.json`, `attachments/<shipment>/` and
/// `catalog.json`.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    base_path: PathBuf,
}

impl LocalDirectory {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn entry(&self, folder: &str, id: &str) -> Result<PathBuf, HostError> {
        Ok(self
            .base_path
            .join(folder)
            .join(format!("{}.json", file_stem(id)?)))
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        kind: &'static str,
        id: &str,
    ) -> Result<T, HostError> {
        match fs::read(path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(HostError::NotFound {
                kind,
                id: id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temporary file so readers never see a partial file.
    async fn write_atomically(&self, path: &Path, data: &[u8]) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Host identifiers such as `WH/OUT/0001` are not valid file names. Bytes
/// outside `[A-Za-z0-9._-]`, and a leading dot, are percent-escaped, so two
/// ids never share a file and none resolves outside its folder.
fn file_stem(id: &str) -> Result<String, HostError> {
    if id.is_empty() {
        return Err(HostError::InvalidId { id: id.to_string() });
    }
    let mut stem = String::with_capacity(id.len());
    for (i, byte) in id.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if keep {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    Ok(stem)
}

impl ShipmentProvider for LocalDirectory {
    async fn shipment(&self, id: &str) -> Result<Shipment, HostError> {
        let path = self.entry("shipments", id)?;
        self.read_json(&path, "shipment", id).await
    }
}

impl CarrierMethodStore for LocalDirectory {
    async fn carrier_method(&self, id: &str) -> Result<CarrierMethod, HostError> {
        let path = self.entry("methods", id)?;
        self.read_json(&path, "carrier method", id).await
    }

    async fn carrier_methods(&self) -> Result<Vec<CarrierMethod>, HostError> {
        let folder = self.base_path.join("methods");
        let mut entries = match fs::read_dir(&folder).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut methods = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read(&path).await?;
            methods.push(serde_json::from_slice::<CarrierMethod>(&data)?);
        }
        methods.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(methods)
    }

    async fn save_carrier_method(&self, method: &CarrierMethod) -> Result<(), HostError> {
        let path = self.entry("methods", method.id())?;
        let data = serde_json::to_vec_pretty(method)?;
        self.write_atomically(&path, &data).await
    }
}

impl AttachmentStore for LocalDirectory {
    async fn attach(&self, shipment_id: &str, artifact: &LabelArtifact) -> Result<String, HostError> {
        let path = self
            .base_path
            .join("attachments")
            .join(file_stem(shipment_id)?)
            .join(file_stem(&artifact.filename)?);
        self.write_atomically(&path, &artifact.content).await?;
        tracing::debug!(
            "Label for shipment '{}' stored at {} ({} bytes)",
            shipment_id,
            path.display(),
            artifact.content.len()
        );
        Ok(path.display().to_string())
    }
}

impl CatalogCache for LocalDirectory {
    async fn load_catalog(&self) -> Result<Option<CatalogSnapshot>, HostError> {
        match fs::read(self.base_path.join(CATALOG_FILE)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store_catalog(&self, snapshot: &CatalogSnapshot) -> Result<(), HostError> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        self.write_atomically(&self.base_path.join(CATALOG_FILE), &data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Address, CarrierMethodDraft, Parcel, Service, ValidatedSelection};
    use tempfile::TempDir;

    fn method(id: &str) -> CarrierMethod {
        let selection = ValidatedSelection {
            service: Service {
                code: "DOM".to_string(),
                name: "Home".to_string(),
                group: "HOME".to_string(),
                basic: true,
                options: vec![],
                max_weight_kg: None,
                max_dimension_cm: None,
                max_instructions_len: None,
                active: true,
            },
            options: vec![],
        };
        CarrierMethod::configure(
            CarrierMethodDraft {
                id: id.to_string(),
                service_group: "HOME".to_string(),
                service: "DOM".to_string(),
                options: vec![],
                instructions: "Back door".to_string(),
            },
            &selection,
        )
    }

    #[tokio::test]
    async fn test_carrier_methods_roundtrip_through_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirectory::new(temp_dir.path());

        assert!(store.carrier_methods().await.unwrap().is_empty());
        store.save_carrier_method(&method("home-b")).await.unwrap();
        store.save_carrier_method(&method("home-a")).await.unwrap();

        let loaded = store.carrier_method("home-a").await.unwrap();
        assert_eq!(loaded.instructions(), "Back door");
        let ids: Vec<String> = store
            .carrier_methods()
            .await
            .unwrap()
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        assert_eq!(ids, vec!["home-a", "home-b"]);
    }

    #[test]
    fn test_missing_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirectory::new(temp_dir.path());
        let err = tokio_test::block_on(store.shipment("WH/OUT/0001")).unwrap_err();
        assert!(matches!(err, HostError::NotFound { kind: "shipment", .. }));
        let err = tokio_test::block_on(store.carrier_method("home")).unwrap_err();
        assert!(matches!(err, HostError::NotFound { kind: "carrier method", .. }));
        assert_eq!(file_stem("WH/OUT/0001").unwrap(), "WH%2FOUT%2F0001");
    }

    #[test]
    fn test_file_stems_are_distinct_and_stay_in_their_folder() {
        assert_eq!(file_stem("..").unwrap(), "%2E.");
        assert_eq!(file_stem(".").unwrap(), "%2E");
        assert_eq!(file_stem("label.pdf").unwrap(), "label.pdf");
        assert_ne!(file_stem("A/B").unwrap(), file_stem("A_B").unwrap());
        assert_ne!(file_stem("A/B").unwrap(), file_stem("A%2FB").unwrap());
        assert!(matches!(file_stem(""), Err(HostError::InvalidId { .. })));
    }

    #[tokio::test]
    async fn test_dot_dot_shipment_id_attaches_inside_attachments() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirectory::new(temp_dir.path());
        let artifact = LabelArtifact {
            tracking_number: "6A1".to_string(),
            content: b"%PDF-1.4".to_vec(),
            content_type: "application/pdf".to_string(),
            filename: "SO042_6A1.pdf".to_string(),
        };

        let path = store.attach("..", &artifact).await.unwrap();
        assert_eq!(
            std::path::PathBuf::from(&path),
            temp_dir.path().join("attachments").join("%2E.").join("SO042_6A1.pdf")
        );
        assert!(!temp_dir.path().join("SO042_6A1.pdf").exists());
    }

    #[tokio::test]
    async fn test_shipment_ids_map_to_safe_file_names() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirectory::new(temp_dir.path());
        let shipment = Shipment {
            id: "WH/OUT/0001".to_string(),
            reference: "SO042".to_string(),
            sender: Address::default(),
            recipient: Address::default(),
            parcel: Parcel {
                weight_kg: 1.0,
                length_cm: None,
                width_cm: None,
                height_cm: None,
            },
        };
        let path = temp_dir.path().join("shipments").join("WH%2FOUT%2F0001.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_vec(&shipment).unwrap()).unwrap();

        assert_eq!(store.shipment("WH/OUT/0001").await.unwrap(), shipment);
    }

    #[tokio::test]
    async fn test_attach_and_catalog_cache() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDirectory::new(temp_dir.path());

        let artifact = LabelArtifact {
            tracking_number: "6A1".to_string(),
            content: b"%PDF-1.4".to_vec(),
            content_type: "application/pdf".to_string(),
            filename: "SO042_6A1.pdf".to_string(),
        };
        let path = store.attach("WH/OUT/0001", &artifact).await.unwrap();
        assert!(path.ends_with("SO042_6A1.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");

        assert!(store.load_catalog().await.unwrap().is_none());
        let snapshot = CatalogSnapshot::empty();
        store.store_catalog(&snapshot).await.unwrap();
        assert_eq!(store.load_catalog().await.unwrap(), Some(snapshot));
    }
}
