use crate::domain::model::{
    Address, AddressBlock, CarrierMethod, LabelRequest, Parcel, ParcelBlock, Shipment,
    ValidatedSelection,
};
use crate::domain::payload::{Param, RequestPayload};
use crate::utils::error::{BuildError, Party};

pub const LABEL_METHOD: &str = "generateLabel";

pub fn build(
    shipment: &Shipment,
    method: &CarrierMethod,
    selection: &ValidatedSelection,
) -> Result<LabelRequest, BuildError> {
    let sender = address_block(Party::Sender, &shipment.sender)?;
    let recipient = address_block(Party::Recipient, &shipment.recipient)?;
    let parcel = parcel_block(&shipment.parcel, selection)?;

    let reference = if shipment.reference.trim().is_empty() {
        shipment.id.clone()
    } else {
        shipment.reference.trim().to_string()
    };

    Ok(LabelRequest {
        shipment_reference: reference,
        carrier_method: method.id().to_string(),
        service_code: selection.service.code.clone(),
        option_codes: selection.option_codes(),
        sender,
        recipient,
        parcel,
        instructions: truncate_chars(
            method.instructions().trim(),
            selection.service.instructions_limit(),
        ),
    })
}

fn address_block(party: Party, address: &Address) -> Result<AddressBlock, BuildError> {
    let required = |field: &'static str, value: &str| -> Result<String, BuildError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(BuildError::MissingAddress { party, field });
        }
        Ok(value.to_string())
    };

    Ok(AddressBlock {
        name: required("name", &address.name)?,
        street: required("street", &address.street)?,
        street2: non_blank(address.street2.as_deref()),
        city: required("city", &address.city)?,
        zip_code: required("zip_code", &address.zip_code)?,
        country_code: required("country_code", &address.country_code)?.to_uppercase(),
        phone: non_blank(address.phone.as_deref()),
        email: non_blank(address.email.as_deref()),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parcel_block(parcel: &Parcel, selection: &ValidatedSelection) -> Result<ParcelBlock, BuildError> {
    let service = &selection.service;
    let invalid = |reason: String| BuildError::InvalidParcel { reason };

    if !parcel.weight_kg.is_finite() || parcel.weight_kg <= 0.0 {
        return Err(invalid(format!(
            "weight must be positive, got {} kg",
            parcel.weight_kg
        )));
    }
    if let Some(max) = service.max_weight_kg {
        if parcel.weight_kg > max {
            return Err(invalid(format!(
                "weight {} kg exceeds the {} kg maximum of service '{}'",
                parcel.weight_kg, max, service.code
            )));
        }
    }

    for side in parcel.dimensions() {
        if !side.is_finite() || side <= 0.0 {
            return Err(invalid(format!("dimensions must be positive, got {} cm", side)));
        }
        if let Some(max) = service.max_dimension_cm {
            if side > max {
                return Err(invalid(format!(
                    "side of {} cm exceeds the {} cm maximum of service '{}'",
                    side, max, service.code
                )));
            }
        }
    }

    Ok(ParcelBlock {
        weight_kg: parcel.weight_kg,
        length_cm: parcel.length_cm,
        width_cm: parcel.width_cm,
        height_cm: parcel.height_cm,
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Lays a label request out as `generateLabel` parameters.
pub fn to_payload(request: &LabelRequest, label_format: &str) -> RequestPayload {
    let options = request
        .option_codes
        .iter()
        .map(|code| Param::text("option", code.as_str()))
        .collect();

    let mut parcel = vec![Param::text("weight", format!("{:.2}", request.parcel.weight_kg))];
    for (name, value) in [
        ("length", request.parcel.length_cm),
        ("width", request.parcel.width_cm),
        ("height", request.parcel.height_cm),
    ] {
        if let Some(value) = value {
            parcel.push(Param::text(name, format!("{:.1}", value)));
        }
    }
    if !request.instructions.is_empty() {
        parcel.push(Param::text("instructions", request.instructions.as_str()));
    }

    RequestPayload::new(LABEL_METHOD).with_params(vec![
        Param::group(
            "outputFormat",
            vec![Param::text("outputPrintingType", label_format)],
        ),
        Param::group(
            "letter",
            vec![
                Param::group(
                    "service",
                    vec![
                        Param::text("productCode", request.service_code.as_str()),
                        Param::text("reference", request.shipment_reference.as_str()),
                        Param::group("options", options),
                    ],
                ),
                Param::group("parcel", parcel),
                Param::group("sender", vec![address_param(&request.sender)]),
                Param::group("addressee", vec![address_param(&request.recipient)]),
            ],
        ),
    ])
}

fn address_param(address: &AddressBlock) -> Param {
    let mut fields = vec![
        Param::text("name", address.name.as_str()),
        Param::text("line2", address.street.as_str()),
    ];
    fields.extend(Param::optional("line3", address.street2.as_deref()));
    fields.push(Param::text("zipCode", address.zip_code.as_str()));
    fields.push(Param::text("city", address.city.as_str()));
    fields.push(Param::text("countryCode", address.country_code.as_str()));
    fields.extend(Param::optional("phoneNumber", address.phone.as_deref()));
    fields.extend(Param::optional("email", address.email.as_deref()));
    Param::group("address", fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CarrierMethodDraft, OptionKind, Service, ServiceOption};

    fn selection() -> ValidatedSelection {
        ValidatedSelection {
            service: Service {
                code: "DOM".to_string(),
                name: "Home".to_string(),
                group: "HOME".to_string(),
                basic: true,
                options: vec!["SIGN".to_string()],
                max_weight_kg: Some(30.0),
                max_dimension_cm: Some(150.0),
                max_instructions_len: Some(10),
                active: true,
            },
            options: vec![ServiceOption {
                code: "SIGN".to_string(),
                name: "Signature".to_string(),
                kind: OptionKind::Optional,
                services: vec!["DOM".to_string()],
                exclusivity_group: None,
                active: true,
            }],
        }
    }

    fn address(name: &str) -> Address {
        Address {
            name: name.to_string(),
            street: "1 rue de la Paix".to_string(),
            street2: Some("  ".to_string()),
            city: "Paris".to_string(),
            zip_code: "75002".to_string(),
            country_code: "fr".to_string(),
            phone: None,
            email: Some("a@example.com".to_string()),
        }
    }

    fn shipment() -> Shipment {
        Shipment {
            id: "WH/OUT/0001".to_string(),
            reference: "SO042".to_string(),
            sender: address("Warehouse"),
            recipient: address("Jane Doe"),
            parcel: Parcel {
                weight_kg: 2.5,
                length_cm: Some(40.0),
                width_cm: Some(30.0),
                height_cm: None,
            },
        }
    }

    fn method(instructions: &str) -> CarrierMethod {
        CarrierMethod::configure(
            CarrierMethodDraft {
                id: "home-signed".to_string(),
                service_group: "HOME".to_string(),
                service: "DOM".to_string(),
                options: vec!["SIGN".to_string()],
                instructions: instructions.to_string(),
            },
            &selection(),
        )
    }

    #[test]
    fn test_build_label_request() {
        let request = build(&shipment(), &method("Leave with the neighbour"), &selection()).unwrap();
        assert_eq!(request.shipment_reference, "SO042");
        assert_eq!(request.service_code, "DOM");
        assert_eq!(request.option_codes, vec!["SIGN"]);
        assert_eq!(request.recipient.country_code, "FR");
        assert_eq!(request.recipient.street2, None);
        assert_eq!(request.instructions, "Leave with");
    }

    #[test]
    fn test_truncation_counts_characters() {
        assert_eq!(truncate_chars("éééééééééééé", 10).chars().count(), 10);
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_missing_address_fields() {
        let mut shipment = shipment();
        shipment.recipient.zip_code = " ".to_string();
        assert_eq!(
            build(&shipment, &method(""), &selection()).unwrap_err(),
            BuildError::MissingAddress {
                party: Party::Recipient,
                field: "zip_code"
            }
        );

        let mut shipment = self::shipment();
        shipment.sender.name.clear();
        assert!(matches!(
            build(&shipment, &method(""), &selection()),
            Err(BuildError::MissingAddress {
                party: Party::Sender,
                field: "name"
            })
        ));
    }

    #[test]
    fn test_invalid_parcels() {
        for (weight, length) in [(0.0, None), (-1.0, None), (31.0, None), (1.0, Some(0.0)), (1.0, Some(151.0))] {
            let mut shipment = shipment();
            shipment.parcel.weight_kg = weight;
            shipment.parcel.length_cm = length;
            assert!(
                matches!(
                    build(&shipment, &method(""), &selection()),
                    Err(BuildError::InvalidParcel { .. })
                ),
                "weight {} length {:?}",
                weight,
                length
            );
        }
    }

    #[test]
    fn test_payload_layout() {
        let request = build(&shipment(), &method("Gate code 1234"), &selection()).unwrap();
        let payload = to_payload(&request, "PDF_10x15_300dpi");
        assert_eq!(payload.method, LABEL_METHOD);

        let letter = payload.param("letter").unwrap();
        let service = letter.find("service").unwrap();
        assert_eq!(service.find("productCode").and_then(Param::as_text), Some("DOM"));
        let parcel = letter.find("parcel").unwrap();
        assert_eq!(parcel.find("weight").and_then(Param::as_text), Some("2.50"));
        assert_eq!(parcel.find("instructions").and_then(Param::as_text), Some("Gate code "));
        assert!(parcel.find("height").is_none());
        let addressee = letter.find("addressee").and_then(|a| a.find("address")).unwrap();
        assert_eq!(addressee.find("name").and_then(Param::as_text), Some("Jane Doe"));
        assert!(addressee.find("line3").is_none());
    }
}
