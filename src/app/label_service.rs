use crate::core::catalog::{self, CatalogStore};
use crate::core::label_pipeline::LabelPipeline;
use crate::core::resolver;
use crate::domain::model::{
    CarrierMethod, CarrierMethodDraft, CatalogSnapshot, LabelArtifact, ServiceOption,
    ValidatedSelection,
};
use crate::domain::ports::{CarrierMethodStore, ConfigProvider, ShipmentProvider, Transport};
use crate::utils::error::{
    CatalogError, CompatibilityError, ConfigureError, HostError, PipelineError, PipelineStep,
};
use std::sync::Arc;

/// Host-facing entry point: catalog refresh, carrier method configuration and
/// label generation over one shared catalog store.
pub struct LabelService<T: Transport, C: ConfigProvider, H> {
    catalog: Arc<CatalogStore>,
    pipeline: LabelPipeline<T, C>,
    host: H,
}

impl<T, C, H> LabelService<T, C, H>
where
    T: Transport,
    C: ConfigProvider,
    H: ShipmentProvider + CarrierMethodStore,
{
    pub fn new(transport: T, config: C, host: H) -> Self {
        Self::with_catalog(Arc::new(CatalogStore::new()), transport, config, host)
    }

    pub fn with_catalog(catalog: Arc<CatalogStore>, transport: T, config: C, host: H) -> Self {
        Self {
            catalog,
            pipeline: LabelPipeline::new(transport, config),
            host,
        }
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.catalog.current()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Fetches the remote catalog and installs it. On any failure the
    /// installed snapshot stays as it was.
    pub async fn refresh_catalog(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let ticket = self.catalog.begin_refresh();
        tracing::info!("Refreshing catalog (ticket {})", ticket.value());

        let config = self.pipeline.config();
        let response = self
            .pipeline
            .transport()
            .call(
                config.endpoint(),
                &config.credentials(),
                &catalog::catalog_request(),
                config.timeout(),
            )
            .await?;

        self.catalog.refresh(ticket, &response)
    }

    pub fn filter_options(&self, service_id: &str) -> Vec<ServiceOption> {
        let snapshot = self.catalog.current();
        resolver::filter_options(service_id, &snapshot)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn validate_carrier_method(
        &self,
        service_id: &str,
        option_ids: &[String],
    ) -> Result<ValidatedSelection, CompatibilityError> {
        resolver::validate(service_id, option_ids, &self.catalog.current())
    }

    /// Validates the draft against the current catalog and saves it. This is
    /// the only way a carrier method reaches the store.
    pub async fn configure_carrier_method(
        &self,
        draft: CarrierMethodDraft,
    ) -> Result<CarrierMethod, ConfigureError> {
        let snapshot = self.catalog.current();
        let selection =
            resolver::validate_in_group(&draft.service_group, &draft.service, &draft.options, &snapshot)?;
        let method = CarrierMethod::configure(draft, &selection);
        self.host.save_carrier_method(&method).await?;
        tracing::info!(
            "Carrier method '{}' configured: service {} options {:?}",
            method.id(),
            method.service(),
            method.options()
        );
        Ok(method)
    }

    /// Stored carrier methods that can ship this shipment's parcel.
    pub async fn available_methods(&self, shipment_id: &str) -> Result<Vec<CarrierMethod>, HostError> {
        let snapshot = self.catalog.current();
        let shipment = self.host.shipment(shipment_id).await?;
        let methods = self.host.carrier_methods().await?;
        Ok(resolver::available_methods(&snapshot, &methods, &shipment.parcel)
            .into_iter()
            .cloned()
            .collect())
    }

    /// The preferred method if it can ship the parcel, else the current one.
    /// An id with no stored method counts as no method.
    pub async fn preferred_method(
        &self,
        shipment_id: &str,
        preferred: Option<&str>,
        current: Option<&str>,
    ) -> Result<Option<CarrierMethod>, HostError> {
        let snapshot = self.catalog.current();
        let shipment = self.host.shipment(shipment_id).await?;
        let preferred = self.stored_method(preferred).await?;
        let current = self.stored_method(current).await?;
        Ok(resolver::preferred_method(
            &snapshot,
            preferred.as_ref(),
            current.as_ref(),
            &shipment.parcel,
        )
        .cloned())
    }

    async fn stored_method(&self, id: Option<&str>) -> Result<Option<CarrierMethod>, HostError> {
        let Some(id) = id else {
            return Ok(None);
        };
        match self.host.carrier_method(id).await {
            Ok(method) => Ok(Some(method)),
            Err(HostError::NotFound { .. }) => {
                tracing::warn!("Carrier method '{}' is not stored, ignoring it", id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Produces a label for one shipment. The catalog snapshot is taken once,
    /// up front, and used for the whole run.
    pub async fn generate_label(
        &self,
        shipment_id: &str,
        method_id: &str,
    ) -> Result<LabelArtifact, PipelineError> {
        let snapshot = self.catalog.current();
        let shipment = self
            .host
            .shipment(shipment_id)
            .await
            .map_err(|e| PipelineError::failed(PipelineStep::Building, e))?;
        let method = self
            .host
            .carrier_method(method_id)
            .await
            .map_err(|e| PipelineError::failed(PipelineStep::Building, e))?;

        self.pipeline.run(&shipment, &method, &snapshot).await
    }
}
