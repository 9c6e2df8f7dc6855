#![allow(dead_code)]

use parcel_label::domain::model::{Address, CarrierMethodDraft, Parcel, Shipment};
use parcel_label::{LabelService, LocalDirectory, TomlConfig, WebserviceClient};
use std::path::Path;

pub const V1_PATH: &str = "/soap.shippingservice/services/LabelServiceWS";
pub const V2_PATH: &str = "/label-ws/v2/LabelService";

pub type TestService = LabelService<WebserviceClient, TomlConfig, LocalDirectory>;

pub const CATALOG: &str = r#"<getCatalogResponse><return>
  <service><code>S1</code><name>Home</name><group>HOME</group><basic>true</basic>
    <maxWeightKg>30</maxWeightKg><maxDimensionCm>150</maxDimensionCm><maxInstructionsLength>35</maxInstructionsLength>
    <options><option>O1</option><option>O2</option></options></service>
  <service><code>S2</code><name>Pickup</name><group>PICKUP</group><basic>true</basic>
    <options><option>O3</option></options></service>
  <option><code>O1</code><kind>optional</kind><exclusivityGroup>INSURANCE</exclusivityGroup>
    <services><service>S1</service></services></option>
  <option><code>O2</code><kind>mandatory-default</kind><services><service>S1</service></services></option>
  <option><code>O3</code><kind>optional</kind><services><service>S2</service></services></option>
</return></getCatalogResponse>"#;

pub const CATALOG_WITHOUT_S1: &str = r#"<getCatalogResponse><return>
  <service><code>S2</code><name>Pickup</name><group>PICKUP</group><basic>true</basic>
    <options><option>O3</option></options></service>
  <option><code>O3</code><kind>optional</kind><services><service>S2</service></services></option>
</return></getCatalogResponse>"#;

pub const LABEL: &str = r#"<generateLabelResponse><return>
  <messages><id>0</id><type>INFO</type><messageContent>La requête a été traitée avec succès</messageContent></messages>
  <parcelNumber>6A12345678901</parcelNumber>
  <label>JVBERi0xLjQKJcOkw7zDtsOfCg==</label>
  <contentType>application/pdf</contentType>
</return></generateLabelResponse>"#;

pub fn soap11(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body>{}</soap:Body></soap:Envelope>"#,
        body
    )
}

pub fn soap12(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope"><env:Body>{}</env:Body></env:Envelope>"#,
        body
    )
}

pub fn soap11_fault(code: &str, message: &str) -> String {
    soap11(&format!(
        "<soap:Fault><faultcode>soap:Server</faultcode><faultstring>{}</faultstring><detail><code>{}</code></detail></soap:Fault>",
        message, code
    ))
}

pub fn config(endpoint: &str, codec: &str, data_dir: &Path, timeout_seconds: u64) -> TomlConfig {
    TomlConfig::from_toml_str(&format!(
        r#"
[webservice]
endpoint = "{}"
login = "800000"
password = "secret"
codec = "{}"
timeout_seconds = {}
auth_fault_codes = ["30000"]

[storage]
data_dir = "{}"
"#,
        endpoint,
        codec,
        timeout_seconds,
        data_dir.display()
    ))
    .unwrap()
}

pub fn service(config: TomlConfig) -> TestService {
    let client = WebserviceClient::new(config.codec().codec())
        .with_limits(config.decode_limits())
        .with_auth_fault_codes(config.auth_fault_codes());
    let directory = LocalDirectory::new(config.data_dir());
    LabelService::new(client, config, directory)
}

fn address(name: &str, zip_code: &str) -> Address {
    Address {
        name: name.to_string(),
        street: "12 avenue des Champs".to_string(),
        street2: None,
        city: "Lyon".to_string(),
        zip_code: zip_code.to_string(),
        country_code: "FR".to_string(),
        phone: Some("+33400000000".to_string()),
        email: None,
    }
}

pub fn shipment(id: &str, weight_kg: f64) -> Shipment {
    Shipment {
        id: id.to_string(),
        reference: "SO042".to_string(),
        sender: address("Warehouse", "69001"),
        recipient: address("Jane Doe", "69002"),
        parcel: Parcel {
            weight_kg,
            length_cm: Some(40.0),
            width_cm: Some(30.0),
            height_cm: Some(20.0),
        },
    }
}

/// Writes the shipment where `LocalDirectory` looks for it and returns the path.
pub fn seed_shipment(data_dir: &Path, shipment: &Shipment) -> std::path::PathBuf {
    let path = data_dir
        .join("shipments")
        .join(format!("{}.json", shipment.id));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, serde_json::to_vec_pretty(shipment).unwrap()).unwrap();
    path
}

pub fn draft(id: &str, group: &str, service: &str, options: &[&str]) -> CarrierMethodDraft {
    CarrierMethodDraft {
        id: id.to_string(),
        service_group: group.to_string(),
        service: service.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        instructions: "Leave the parcel with the caretaker if nobody answers".to_string(),
    }
}
