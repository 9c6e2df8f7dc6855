use crate::adapters::webservice::codec::{Decoded, SoapCodec};
use crate::adapters::webservice::xml::DecodeLimits;
use crate::domain::model::Credentials;
use crate::domain::payload::{RequestPayload, ResponsePayload};
use crate::domain::ports::Transport;
use crate::utils::error::TransportError;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// SOAP client for the carrier's catalog and label services.
///
/// The response body is read chunk by chunk and abandoned as soon as it grows
/// past `DecodeLimits::max_bytes`, so an oversized answer never gets buffered
/// in full.
#[derive(Debug, Clone)]
pub struct WebserviceClient {
    client: Client,
    codec: Arc<dyn SoapCodec>,
    limits: DecodeLimits,
    auth_fault_codes: Vec<String>,
}

impl WebserviceClient {
    pub fn new(codec: Arc<dyn SoapCodec>) -> Self {
        Self {
            client: Client::new(),
            codec,
            limits: DecodeLimits::default(),
            auth_fault_codes: Vec::new(),
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_auth_fault_codes(mut self, codes: Vec<String>) -> Self {
        self.auth_fault_codes = codes;
        self
    }

    async fn read_body(&self, mut response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        if let Some(length) = response.content_length() {
            if length > self.limits.max_bytes as u64 {
                return Err(TransportError::ResponseTooComplex {
                    reason: format!(
                        "response announces {} bytes, limit is {}",
                        length, self.limits.max_bytes
                    ),
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(network_error)? {
            if body.len() + chunk.len() > self.limits.max_bytes {
                return Err(TransportError::ResponseTooComplex {
                    reason: format!("response exceeds {} bytes", self.limits.max_bytes),
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    fn classify_fault(&self, code: String, message: String) -> TransportError {
        if self.auth_fault_codes.iter().any(|auth| *auth == code) {
            TransportError::AuthRejected {
                message: format!("{}: {}", code, message),
            }
        } else {
            TransportError::ServerFault { code, message }
        }
    }
}

fn network_error(err: reqwest::Error) -> TransportError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request() || err.is_body();
    TransportError::Network {
        message: err.to_string(),
        retryable,
    }
}

fn status_error(status: StatusCode) -> Option<TransportError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(TransportError::AuthRejected {
            message: format!("HTTP {}", status),
        }),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            Some(TransportError::Network {
                message: format!("HTTP {}", status),
                retryable: true,
            })
        }
        _ => None,
    }
}

#[async_trait]
impl Transport for WebserviceClient {
    async fn call(
        &self,
        endpoint: &Url,
        credentials: &Credentials,
        request: &RequestPayload,
        timeout: Duration,
    ) -> Result<ResponsePayload, TransportError> {
        let url = self.codec.service_url(endpoint)?;
        let envelope = self.codec.encode(credentials, request)?;

        tracing::debug!(
            "Calling {} on {} (codec {}, {} bytes)",
            request.method,
            url,
            self.codec.version(),
            envelope.len()
        );

        let mut builder = self
            .client
            .post(url)
            .timeout(timeout)
            .header(header::CONTENT_TYPE, self.codec.content_type(&request.method))
            .body(envelope);
        if let Some(action) = self.codec.soap_action(&request.method) {
            builder = builder.header("SOAPAction", action);
        }

        let response = builder.send().await.map_err(network_error)?;
        let status = response.status();
        tracing::debug!("Webservice response status: {}", status);

        if let Some(err) = status_error(status) {
            return Err(err);
        }

        let body = self.read_body(response).await?;

        // SOAP faults come back with HTTP 500, so the body is decoded before
        // the status is judged.
        match self.codec.decode(&request.method, &body, &self.limits) {
            Ok(Decoded::Response(payload)) if status.is_success() => Ok(payload),
            Ok(Decoded::Response(_)) => Err(TransportError::ServerFault {
                code: format!("HTTP_{}", status.as_u16()),
                message: "response body returned with an error status".to_string(),
            }),
            Ok(Decoded::Fault { code, message }) => {
                tracing::debug!("Webservice fault {}: {}", code, message);
                Err(self.classify_fault(code, message))
            }
            Err(TransportError::MalformedResponse { reason }) if !status.is_success() => {
                Err(TransportError::ServerFault {
                    code: format!("HTTP_{}", status.as_u16()),
                    message: reason,
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::webservice::CodecVersion;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one chunked response without a Content-Length header.
    async fn serve_chunked(chunks: Vec<Vec<u8>>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 64 * 1024];
            let _ = socket.read(&mut request).await;

            let mut response = b"HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
            for chunk in chunks {
                response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                response.extend_from_slice(&chunk);
                response.extend_from_slice(b"\r\n");
            }
            response.extend_from_slice(b"0\r\n\r\n");
            let _ = socket.write_all(&response).await;
            while matches!(socket.read(&mut request).await, Ok(n) if n > 0) {}
        });
        Url::parse(&format!("http://{}/", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_chunked_body_past_the_limit_is_abandoned() {
        let endpoint = serve_chunked(vec![vec![b' '; 2000]; 3]).await;
        let client = WebserviceClient::new(CodecVersion::V1.codec()).with_limits(DecodeLimits {
            max_bytes: 4096,
            ..DecodeLimits::default()
        });
        let credentials = Credentials {
            login: "800000".to_string(),
            password: "secret".to_string(),
        };

        let err = client
            .call(
                &endpoint,
                &credentials,
                &RequestPayload::new("getCatalog"),
                Duration::from_secs(5),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::ResponseTooComplex {
                reason: "response exceeds 4096 bytes".to_string()
            }
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            Some(TransportError::AuthRejected { .. })
        ));
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE)
            .unwrap()
            .is_retryable());
        assert!(status_error(StatusCode::INTERNAL_SERVER_ERROR).is_none());
        assert!(status_error(StatusCode::OK).is_none());
    }

    #[test]
    fn test_auth_fault_codes_are_classified() {
        let client = WebserviceClient::new(CodecVersion::V1.codec())
            .with_auth_fault_codes(vec!["30000".to_string()]);
        assert!(matches!(
            client.classify_fault("30000".to_string(), "Identifiant ou mot de passe".to_string()),
            TransportError::AuthRejected { .. }
        ));
        assert!(matches!(
            client.classify_fault("30108".to_string(), "Code postal".to_string()),
            TransportError::ServerFault { .. }
        ));
    }
}
