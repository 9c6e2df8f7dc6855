// Transport and codec layer for the carrier webservice.

pub mod client;
pub mod codec;
pub mod xml;

pub use client::WebserviceClient;
pub use codec::{CodecVersion, Decoded, Soap11Codec, Soap12Codec, SoapCodec};
pub use xml::DecodeLimits;
