pub mod catalog;
pub mod label_pipeline;
pub mod request_builder;
pub mod resolver;

pub use crate::domain::model::{
    CarrierMethod, CatalogSnapshot, LabelArtifact, LabelRequest, Service, ServiceOption, Shipment,
    ValidatedSelection,
};
pub use crate::domain::ports::{ConfigProvider, Transport};
pub use catalog::CatalogStore;
pub use label_pipeline::LabelPipeline;
