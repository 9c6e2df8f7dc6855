use crate::domain::model::{CarrierMethod, CatalogSnapshot, Credentials, LabelArtifact, Shipment};
use crate::domain::payload::{RequestPayload, ResponsePayload};
use crate::utils::error::{HostError, TransportError};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Read-only access to the host's shipment records.
pub trait ShipmentProvider: Send + Sync {
    fn shipment(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Shipment, HostError>> + Send;
}

pub trait CarrierMethodStore: Send + Sync {
    fn carrier_method(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<CarrierMethod, HostError>> + Send;

    fn carrier_methods(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<CarrierMethod>, HostError>> + Send;

    fn save_carrier_method(
        &self,
        method: &CarrierMethod,
    ) -> impl std::future::Future<Output = Result<(), HostError>> + Send;
}

/// Receives finished labels. Only ever called by the host after a complete
/// pipeline run.
pub trait AttachmentStore: Send + Sync {
    fn attach(
        &self,
        shipment_id: &str,
        artifact: &LabelArtifact,
    ) -> impl std::future::Future<Output = Result<String, HostError>> + Send;
}

pub trait CatalogCache: Send + Sync {
    fn load_catalog(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<CatalogSnapshot>, HostError>> + Send;

    fn store_catalog(
        &self,
        snapshot: &CatalogSnapshot,
    ) -> impl std::future::Future<Output = Result<(), HostError>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn endpoint(&self) -> &Url;
    fn credentials(&self) -> Credentials;
    fn timeout(&self) -> Duration;
    fn label_format(&self) -> &str;
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
        request: &RequestPayload,
        timeout: Duration,
    ) -> Result<ResponsePayload, TransportError>;
}
