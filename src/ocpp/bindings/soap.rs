//! SOAP binding: OCPP 1.6 bodies inside a SOAP envelope with a WS-Addressing header.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::ocpp::header::Header;
use crate::ocpp::ids::{ChargeBoxId, Identity, MessageId};
use crate::ocpp::xml::{QName, XmlElement, XmlError};

pub const SOAP12_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const SOAP11_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const WSA_NS: &str = "http://www.w3.org/2005/08/addressing";
pub const WSA_FAULT_ACTION: &str = "http://www.w3.org/2005/08/addressing/soap/fault";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoapError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("expected a SOAP Envelope, found `{0}`")]
    NotAnEnvelope(String),
    #[error("SOAP envelope has no Header")]
    MissingHeader,
    #[error("SOAP envelope has no Body")]
    MissingBody,
    #[error("SOAP header has no `{0}`")]
    MissingHeaderField(&'static str),
    #[error("SOAP header field `{field}` is invalid: {reason}")]
    InvalidHeaderField { field: &'static str, reason: String },
    #[error("SOAP body has no `{0}` element")]
    MissingBodyElement(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => SOAP11_NS,
            SoapVersion::V12 => SOAP12_NS,
        }
    }

    fn from_namespace(namespace: Option<&str>) -> Option<Self> {
        match namespace {
            Some(SOAP12_NS) => Some(SoapVersion::V12),
            Some(SOAP11_NS) => Some(SoapVersion::V11),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            SoapVersion::V11 => "text/xml; charset=utf-8",
            SoapVersion::V12 => "application/soap+xml; charset=utf-8",
        }
    }
}

/// A decoded inbound envelope: the header plus the untouched Body element.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub version: SoapVersion,
    pub header: Header,
    body: XmlElement,
}

impl SoapRequest {
    pub fn decode(raw: &str, received: DateTime<Utc>) -> Result<Self, SoapError> {
        let envelope = XmlElement::parse(raw)?;
        let version = match SoapVersion::from_namespace(envelope.name.namespace.as_deref()) {
            Some(version) if envelope.name.local == "Envelope" => version,
            _ => return Err(SoapError::NotAnEnvelope(envelope.name.to_string())),
        };
        let soap_ns = version.namespace();

        let soap_header = envelope.child(soap_ns, "Header").ok_or(SoapError::MissingHeader)?;
        let header = decode_header(soap_header, received)?;
        let body = envelope
            .children
            .into_iter()
            .find(|c| c.is(soap_ns, "Body"))
            .ok_or(SoapError::MissingBody)?;

        Ok(Self {
            version,
            header,
            body,
        })
    }

    pub fn action(&self) -> &str {
        &self.header.action
    }

    /// Locates the action body by namespace-qualified local name anywhere below `Body`.
    pub fn body_element(&self, namespace: &str, local: &str) -> Result<&XmlElement, SoapError> {
        self.body
            .descendant(namespace, local)
            .ok_or_else(|| SoapError::MissingBodyElement(QName::new(namespace, local).to_string()))
    }
}

fn decode_header(soap_header: &XmlElement, received: DateTime<Utc>) -> Result<Header, SoapError> {
    let action = soap_header
        .child(WSA_NS, "Action")
        .map(|a| a.text().trim_start_matches('/').to_owned())
        .filter(|a| !a.is_empty())
        .ok_or(SoapError::MissingHeaderField("Action"))?;

    let message_id = soap_header
        .child(WSA_NS, "MessageID")
        .ok_or(SoapError::MissingHeaderField("MessageID"))?
        .text()
        .parse::<MessageId>()
        .map_err(|e| SoapError::InvalidHeaderField {
            field: "MessageID",
            reason: e.to_string(),
        })?;

    let charge_box_id = match soap_header.child_local("chargeBoxIdentity") {
        Some(element) => Some(element.text().parse::<ChargeBoxId>().map_err(|e| {
            SoapError::InvalidHeaderField {
                field: "chargeBoxIdentity",
                reason: e.to_string(),
            }
        })?),
        None => None,
    };

    let relates_to = soap_header
        .child(WSA_NS, "RelatesTo")
        .and_then(|r| MessageId::try_parse(r.text()));
    let source = soap_header
        .child(WSA_NS, "From")
        .and_then(|from| from.child(WSA_NS, "Address"))
        .and_then(|address| Identity::try_parse(address.text()));
    let destination = soap_header
        .child(WSA_NS, "To")
        .and_then(|to| Identity::try_parse(to.text()));

    Ok(Header {
        charge_box_id,
        source,
        destination,
        message_id,
        relates_to,
        action,
        timestamp: received,
    })
}

/// Serializes a complete envelope. Requests carry `wsa:Action = /{Action}`, responses
/// (headers with `relates_to`) carry `/{Action}Response`.
pub fn encode_envelope(version: SoapVersion, header: &Header, body: XmlElement) -> String {
    let soap_ns = version.namespace();
    let body_ns = body.name.namespace.clone();

    let wsa_action = if header.is_response() {
        format!("/{}Response", header.action)
    } else {
        format!("/{}", header.action)
    };

    let mut soap_header = XmlElement::qualified(soap_ns, "Header");
    if let Some(charge_box_id) = &header.charge_box_id {
        let identity = QName {
            namespace: body_ns.clone(),
            local: "chargeBoxIdentity".to_owned(),
        };
        soap_header.push(XmlElement::new(identity).with_text(charge_box_id.as_str()));
    }
    soap_header.push(XmlElement::qualified(WSA_NS, "Action").with_text(wsa_action));
    soap_header.push(XmlElement::qualified(WSA_NS, "MessageID").with_text(header.message_id.as_str()));
    if let Some(relates_to) = &header.relates_to {
        soap_header.push(XmlElement::qualified(WSA_NS, "RelatesTo").with_text(relates_to.as_str()));
    }
    if let Some(source) = &header.source {
        soap_header.push(
            XmlElement::qualified(WSA_NS, "From")
                .with_child(XmlElement::qualified(WSA_NS, "Address").with_text(source.as_str())),
        );
    }
    if let Some(destination) = &header.destination {
        soap_header.push(XmlElement::qualified(WSA_NS, "To").with_text(destination.as_str()));
    }

    let envelope = XmlElement::qualified(soap_ns, "Envelope")
        .with_child(soap_header)
        .with_child(XmlElement::qualified(soap_ns, "Body").with_child(body));

    let mut prefixes = vec![(soap_ns, "soap"), (WSA_NS, "wsa")];
    if let Some(ns) = body_ns.as_deref() {
        prefixes.push((ns, "ns"));
    }
    envelope.to_xml_string(&prefixes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    /// The message was malformed or failed validation.
    Sender,
    /// The receiver could not process a well-formed message.
    Receiver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub code: FaultCode,
    pub reason: String,
}

impl SoapFault {
    pub fn sender(reason: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Sender,
            reason: reason.into(),
        }
    }

    pub fn receiver(reason: impl Into<String>) -> Self {
        Self {
            code: FaultCode::Receiver,
            reason: reason.into(),
        }
    }

    /// Fault envelope; `request` supplies `RelatesTo` when the inbound header was readable.
    pub fn encode(&self, version: SoapVersion, request: Option<&Header>) -> String {
        let soap_ns = version.namespace();

        let mut soap_header = XmlElement::qualified(soap_ns, "Header")
            .with_child(XmlElement::qualified(WSA_NS, "Action").with_text(WSA_FAULT_ACTION))
            .with_child(XmlElement::qualified(WSA_NS, "MessageID").with_text(MessageId::random_urn().as_str()));
        if let Some(request) = request {
            soap_header.push(XmlElement::qualified(WSA_NS, "RelatesTo").with_text(request.message_id.as_str()));
        }

        let fault = match version {
            SoapVersion::V12 => {
                let value = match self.code {
                    FaultCode::Sender => "soap:Sender",
                    FaultCode::Receiver => "soap:Receiver",
                };
                XmlElement::qualified(soap_ns, "Fault")
                    .with_child(
                        XmlElement::qualified(soap_ns, "Code")
                            .with_child(XmlElement::qualified(soap_ns, "Value").with_text(value)),
                    )
                    .with_child(
                        XmlElement::qualified(soap_ns, "Reason").with_child(
                            XmlElement::qualified(soap_ns, "Text")
                                .with_attribute("xml:lang", "en")
                                .with_text(self.reason.as_str()),
                        ),
                    )
            }
            SoapVersion::V11 => {
                let value = match self.code {
                    FaultCode::Sender => "soap:Client",
                    FaultCode::Receiver => "soap:Server",
                };
                XmlElement::qualified(soap_ns, "Fault")
                    .with_child(XmlElement::new(QName::unqualified("faultcode")).with_text(value))
                    .with_child(XmlElement::new(QName::unqualified("faultstring")).with_text(self.reason.as_str()))
            }
        };

        XmlElement::qualified(soap_ns, "Envelope")
            .with_child(soap_header)
            .with_child(XmlElement::qualified(soap_ns, "Body").with_child(fault))
            .to_xml_string(&[(soap_ns, "soap"), (WSA_NS, "wsa")])
    }
}
