use crate::core::{request_builder, resolver};
use crate::domain::model::{CarrierMethod, CatalogSnapshot, LabelArtifact, Shipment};
use crate::domain::payload::ResponsePayload;
use crate::domain::ports::{ConfigProvider, Transport};
use crate::utils::error::{FailureCause, PipelineError, PipelineStep, TransportError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Lifecycle of one label run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Building,
    Requesting,
    Parsing,
    Done,
    Failed(PipelineStep),
}

struct LabelRun<'a> {
    shipment: &'a str,
    state: RunState,
}

impl<'a> LabelRun<'a> {
    fn start(shipment: &'a str) -> Self {
        tracing::debug!("Label run for shipment '{}': building", shipment);
        Self {
            shipment,
            state: RunState::Building,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(matches!(
            (self.state, next),
            (RunState::Building, RunState::Requesting)
                | (RunState::Requesting, RunState::Parsing)
                | (RunState::Parsing, RunState::Done)
        ));
        tracing::debug!(
            "Label run for shipment '{}': {:?} -> {:?}",
            self.shipment,
            self.state,
            next
        );
        self.state = next;
    }

    fn fail(&mut self, err: PipelineError) -> PipelineError {
        let from = self.state;
        self.state = RunState::Failed(err.step());
        tracing::warn!(
            "Label run for shipment '{}': {:?} -> {:?}: {}",
            self.shipment,
            from,
            self.state,
            err
        );
        err
    }
}

/// Runs Building -> Requesting -> Parsing for one shipment. Nothing here
/// writes to the host: the artifact is handed back and attaching it is the
/// caller's job.
pub struct LabelPipeline<T: Transport, C: ConfigProvider> {
    transport: T,
    config: C,
}

impl<T: Transport, C: ConfigProvider> LabelPipeline<T, C> {
    pub fn new(transport: T, config: C) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub async fn run(
        &self,
        shipment: &Shipment,
        method: &CarrierMethod,
        snapshot: &CatalogSnapshot,
    ) -> Result<LabelArtifact, PipelineError> {
        let mut run = LabelRun::start(&shipment.id);

        // The method was validated when it was saved, but the catalog may
        // have moved since.
        let selection = match resolver::validate_carrier_method(method, snapshot) {
            Ok(selection) => selection,
            Err(cause) => {
                return Err(run.fail(PipelineError::StaleConfiguration {
                    carrier_method: method.id().to_string(),
                    cause,
                }))
            }
        };
        let request = request_builder::build(shipment, method, &selection)
            .map_err(|e| run.fail(PipelineError::failed(PipelineStep::Building, e)))?;
        let payload = request_builder::to_payload(&request, self.config.label_format());

        run.advance(RunState::Requesting);
        let credentials = self.config.credentials();
        let response = self
            .transport
            .call(
                self.config.endpoint(),
                &credentials,
                &payload,
                self.config.timeout(),
            )
            .await
            .map_err(|e| run.fail(PipelineError::failed(PipelineStep::Requesting, e)))?;

        run.advance(RunState::Parsing);
        let artifact = interpret_label_response(&response, &request.shipment_reference)
            .map_err(|cause| run.fail(PipelineError::Failed {
                step: PipelineStep::Parsing,
                cause,
            }))?;

        run.advance(RunState::Done);
        tracing::info!(
            "Label generated for shipment '{}': tracking number {}",
            shipment.id,
            artifact.tracking_number
        );
        Ok(artifact)
    }
}

/// Turns a `generateLabel` response into a label artifact. In-band error
/// messages are reported as server faults even when the HTTP call succeeded.
pub fn interpret_label_response(
    response: &ResponsePayload,
    reference: &str,
) -> Result<LabelArtifact, FailureCause> {
    let invalid = |reason: &str| FailureCause::InvalidResponse {
        reason: reason.to_string(),
    };

    let result = response
        .body
        .child("return")
        .ok_or_else(|| invalid("response has no <return> element"))?;

    if let Some(error) = result
        .children_named("messages")
        .find(|message| message.child_text("type") == Some("ERROR"))
    {
        return Err(FailureCause::Transport(TransportError::ServerFault {
            code: error.child_text("id").unwrap_or("UNKNOWN").to_string(),
            message: error.child_text("messageContent").unwrap_or_default().to_string(),
        }));
    }

    let tracking_number = result
        .child_text("parcelNumber")
        .ok_or_else(|| invalid("response carries no parcel number"))?
        .to_string();

    let encoded: String = result
        .child_text("label")
        .ok_or_else(|| invalid("response carries no label"))?
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let content = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| FailureCause::InvalidResponse {
            reason: format!("label is not valid base64: {}", e),
        })?;
    if content.is_empty() {
        return Err(invalid("label is empty"));
    }

    let content_type = result
        .child_text("contentType")
        .unwrap_or("application/pdf")
        .to_string();
    let filename = format!(
        "{}_{}.{}",
        sanitize(reference),
        sanitize(&tracking_number),
        extension(&content_type)
    );

    Ok(LabelArtifact {
        tracking_number,
        content,
        content_type,
        filename,
    })
}

fn extension(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => "pdf",
        "application/zpl" | "application/x-zpl" | "text/zpl" => "zpl",
        "image/png" => "png",
        _ => "bin",
    }
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
