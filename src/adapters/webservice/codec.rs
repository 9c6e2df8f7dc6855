use crate::adapters::webservice::xml::{self, DecodeLimits};
use crate::domain::model::Credentials;
use crate::domain::payload::{Param, ParamValue, RequestPayload, ResponsePayload, XmlNode};
use crate::utils::error::TransportError;
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

const SOAP11_ENVELOPE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP12_ENVELOPE: &str = "http://www.w3.org/2003/05/soap-envelope";
const LABEL_NS_V1: &str = "http://sls.ws.label.post.example/";
const LABEL_NS_V2: &str = "http://ws.label.post.example/v2/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecVersion {
    #[default]
    V1,
    V2,
}

impl CodecVersion {
    pub fn codec(self) -> Arc<dyn SoapCodec> {
        match self {
            CodecVersion::V1 => Arc::new(Soap11Codec),
            CodecVersion::V2 => Arc::new(Soap12Codec),
        }
    }
}

impl fmt::Display for CodecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecVersion::V1 => f.write_str("v1"),
            CodecVersion::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for CodecVersion {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "v1" => Ok(CodecVersion::V1),
            "v2" => Ok(CodecVersion::V2),
            other => Err(format!("unknown codec version '{}'", other)),
        }
    }
}

/// A decoded envelope: either the method's response element or a SOAP fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Response(ResponsePayload),
    Fault { code: String, message: String },
}

/// Envelope layout of one version of the label webservice. Every version
/// carries the same logical fields; only their placement differs.
pub trait SoapCodec: Send + Sync + fmt::Debug {
    fn version(&self) -> CodecVersion;

    /// Path of the service relative to the configured endpoint.
    fn service_path(&self) -> &'static str;

    fn content_type(&self, method: &str) -> String;

    fn soap_action(&self, method: &str) -> Option<String>;

    fn encode(&self, credentials: &Credentials, request: &RequestPayload)
        -> Result<Vec<u8>, TransportError>;

    /// Extracts `(code, message)` from a `Fault` element.
    fn read_fault(&self, fault: &XmlNode) -> (String, String);

    /// Appends the service path to the endpoint's path. Endpoints that cannot
    /// carry a path, or that carry a query or fragment the path would end up
    /// in, are refused.
    fn service_url(&self, endpoint: &Url) -> Result<Url, TransportError> {
        let invalid = |reason: &str| TransportError::InvalidRequest {
            reason: format!("endpoint '{}' {}", endpoint, reason),
        };
        if endpoint.query().is_some() || endpoint.fragment().is_some() {
            return Err(invalid("must not have a query or fragment"));
        }

        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base URL"))?
            .pop_if_empty()
            .extend(self.service_path().split('/'));
        Ok(url)
    }

    fn decode(
        &self,
        method: &str,
        body: &[u8],
        limits: &DecodeLimits,
    ) -> Result<Decoded, TransportError> {
        let root = xml::decode(body, limits)?;
        let root = xml::resolve_references(root, limits)?;
        let soap_body = into_soap_body(root)?;

        if let Some(fault) = soap_body.child("Fault") {
            let (code, message) = self.read_fault(fault);
            return Ok(Decoded::Fault { code, message });
        }

        let expected = format!("{}Response", method);
        let response = soap_body
            .children
            .into_iter()
            .find(|child| child.name == expected)
            .ok_or_else(|| TransportError::MalformedResponse {
                reason: format!("missing <{}> in SOAP body", expected),
            })?;

        Ok(Decoded::Response(ResponsePayload {
            method: method.to_string(),
            body: response,
        }))
    }
}

fn into_soap_body(root: XmlNode) -> Result<XmlNode, TransportError> {
    if root.name != "Envelope" {
        return Err(TransportError::MalformedResponse {
            reason: format!("expected a SOAP Envelope, found <{}>", root.name),
        });
    }
    root.children
        .into_iter()
        .find(|child| child.name == "Body")
        .ok_or_else(|| TransportError::MalformedResponse {
            reason: "SOAP Envelope has no Body".to_string(),
        })
}

fn write_params(writer: &mut Writer<Vec<u8>>, params: &[Param]) -> io::Result<()> {
    for param in params {
        let element = writer.create_element(param.name.as_str());
        match &param.value {
            ParamValue::Text(text) => element.write_text_content(BytesText::new(text))?,
            ParamValue::Group(children) => {
                element.write_inner_content(|inner| write_params(inner, children))?
            }
        };
    }
    Ok(())
}

fn credential_params(credentials: &Credentials) -> [Param; 2] {
    [
        Param::text("login", credentials.login.as_str()),
        Param::text("password", credentials.password.as_str()),
    ]
}

fn xml_declaration(writer: &mut Writer<Vec<u8>>) -> io::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
}

fn encode_error(err: io::Error) -> TransportError {
    TransportError::InvalidRequest {
        reason: format!("could not write SOAP envelope: {}", err),
    }
}

fn text_of(node: Option<&XmlNode>) -> Option<String> {
    node.map(|node| node.text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// SOAP 1.1 layout: credentials travel as the first parameters of the method
/// element, the action goes in the `SOAPAction` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct Soap11Codec;

impl SoapCodec for Soap11Codec {
    fn version(&self) -> CodecVersion {
        CodecVersion::V1
    }

    fn service_path(&self) -> &'static str {
        "soap.shippingservice/services/LabelServiceWS"
    }

    fn content_type(&self, _method: &str) -> String {
        "text/xml; charset=utf-8".to_string()
    }

    fn soap_action(&self, method: &str) -> Option<String> {
        Some(format!("\"{}{}\"", LABEL_NS_V1, method))
    }

    fn encode(
        &self,
        credentials: &Credentials,
        request: &RequestPayload,
    ) -> Result<Vec<u8>, TransportError> {
        let method = format!("sls:{}", request.method);
        let mut writer = Writer::new(Vec::with_capacity(1024));
        xml_declaration(&mut writer).map_err(encode_error)?;
        writer
            .create_element("soapenv:Envelope")
            .with_attribute(("xmlns:soapenv", SOAP11_ENVELOPE))
            .with_attribute(("xmlns:sls", LABEL_NS_V1))
            .write_inner_content(|envelope| {
                envelope.create_element("soapenv:Header").write_empty()?;
                envelope
                    .create_element("soapenv:Body")
                    .write_inner_content(|body| {
                        body.create_element(method.as_str())
                            .write_inner_content(|call| {
                                write_params(call, &credential_params(credentials))?;
                                write_params(call, &request.params)
                            })?;
                        Ok(())
                    })?;
                Ok(())
            })
            .map_err(encode_error)?;
        Ok(writer.into_inner())
    }

    fn read_fault(&self, fault: &XmlNode) -> (String, String) {
        // Carrier-specific codes live under detail; faultcode is the SOAP class.
        let code = text_of(fault.path(&["detail", "code"]))
            .or_else(|| text_of(fault.child("faultcode")))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let message = text_of(fault.child("faultstring")).unwrap_or_default();
        (code, message)
    }
}

/// SOAP 1.2 layout: credentials in an `Authentication` header block, action as
/// a content-type parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Soap12Codec;

impl SoapCodec for Soap12Codec {
    fn version(&self) -> CodecVersion {
        CodecVersion::V2
    }

    fn service_path(&self) -> &'static str {
        "label-ws/v2/LabelService"
    }

    fn content_type(&self, method: &str) -> String {
        format!(
            "application/soap+xml; charset=utf-8; action=\"{}{}\"",
            LABEL_NS_V2, method
        )
    }

    fn soap_action(&self, _method: &str) -> Option<String> {
        None
    }

    fn encode(
        &self,
        credentials: &Credentials,
        request: &RequestPayload,
    ) -> Result<Vec<u8>, TransportError> {
        let method = format!("lbl:{}", request.method);
        let mut writer = Writer::new(Vec::with_capacity(1024));
        xml_declaration(&mut writer).map_err(encode_error)?;
        writer
            .create_element("env:Envelope")
            .with_attribute(("xmlns:env", SOAP12_ENVELOPE))
            .with_attribute(("xmlns:lbl", LABEL_NS_V2))
            .write_inner_content(|envelope| {
                envelope
                    .create_element("env:Header")
                    .write_inner_content(|header| {
                        header
                            .create_element("lbl:Authentication")
                            .write_inner_content(|auth| {
                                write_params(auth, &credential_params(credentials))
                            })?;
                        Ok(())
                    })?;
                envelope
                    .create_element("env:Body")
                    .write_inner_content(|body| {
                        body.create_element(method.as_str())
                            .write_inner_content(|call| write_params(call, &request.params))?;
                        Ok(())
                    })?;
                Ok(())
            })
            .map_err(encode_error)?;
        Ok(writer.into_inner())
    }

    fn read_fault(&self, fault: &XmlNode) -> (String, String) {
        let code = text_of(fault.path(&["Code", "Subcode", "Value"]))
            .or_else(|| text_of(fault.path(&["Code", "Value"])))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let message = text_of(fault.path(&["Reason", "Text"])).unwrap_or_default();
        (code, message)
    }
}
