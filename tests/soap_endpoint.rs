//! SOAP binding scenarios driven through `OcppEndpoint::handle_soap`.

use open_charge_protocol::ocpp::bindings::soap::{SOAP12_NS, WSA_NS};
use open_charge_protocol::ocpp::enums::ReservationStatus;
use open_charge_protocol::ocpp::ids::Identity;
use open_charge_protocol::ocpp::messages::{ReserveNow, ReserveNowResponse, CHARGE_POINT_NS};
use open_charge_protocol::ocpp::xml::XmlElement;
use open_charge_protocol::ocpp::{OcppEndpoint, Role};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn reserve_now_envelope(body_fields: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="{SOAP12_NS}" xmlns:wsa="{WSA_NS}" xmlns:cp="{CHARGE_POINT_NS}">
  <soap:Header>
    <cp:chargeBoxIdentity>CP-1</cp:chargeBoxIdentity>
    <wsa:Action>/ReserveNow</wsa:Action>
    <wsa:MessageID>urn:uuid:req-1</wsa:MessageID>
    <wsa:From><wsa:Address>http://cs.example/ocpp</wsa:Address></wsa:From>
    <wsa:To>http://cp.example/ocpp</wsa:To>
  </soap:Header>
  <soap:Body>
    <cp:reserveNowRequest>{body_fields}</cp:reserveNowRequest>
  </soap:Body>
</soap:Envelope>"#
    )
}

const RESERVE_FIELDS: &str = "<cp:connectorId>1</cp:connectorId>\
    <cp:expiryDate>2024-01-01T12:00:00Z</cp:expiryDate>\
    <cp:idTag>TAG1</cp:idTag>\
    <cp:reservationId>42</cp:reservationId>";

fn header_text<'a>(envelope: &'a XmlElement, local: &str) -> Option<&'a str> {
    envelope
        .child(SOAP12_NS, "Header")
        .and_then(|h| h.child(WSA_NS, local))
        .map(XmlElement::text)
}

#[tokio::test]
async fn test_reserve_now_without_handlers_is_rejected_and_correlated() {
    let endpoint = OcppEndpoint::charge_point();
    let reply = endpoint
        .handle_soap(&reserve_now_envelope(RESERVE_FIELDS), &CancellationToken::new())
        .await;

    assert_eq!(reply.status, 200);
    assert!(reply.content_type.starts_with("application/soap+xml"));

    let envelope = XmlElement::parse(&reply.body).unwrap();
    assert_eq!(header_text(&envelope, "Action"), Some("/ReserveNowResponse"));
    assert_eq!(header_text(&envelope, "RelatesTo"), Some("urn:uuid:req-1"));
    assert_ne!(header_text(&envelope, "MessageID"), Some("urn:uuid:req-1"));
    assert_eq!(header_text(&envelope, "To"), Some("http://cs.example/ocpp"));

    let soap_header = envelope.child(SOAP12_NS, "Header").unwrap();
    let from = soap_header.child(WSA_NS, "From").and_then(|f| f.child(WSA_NS, "Address"));
    assert_eq!(from.map(XmlElement::text), Some("http://cp.example/ocpp"));
    assert_eq!(
        soap_header.child(CHARGE_POINT_NS, "chargeBoxIdentity").map(XmlElement::text),
        Some("CP-1")
    );

    let status = envelope
        .descendant(CHARGE_POINT_NS, "reserveNowResponse")
        .and_then(|r| r.child_local("status"))
        .map(XmlElement::text);
    assert_eq!(status, Some("Rejected"));
}

#[tokio::test]
async fn test_handler_answer_is_encoded() {
    let endpoint = OcppEndpoint::builder(Role::ChargePoint)
        .identity(Identity::try_parse("cp-endpoint"))
        .build();
    let seen = Arc::new(Mutex::new(None));
    let seen_by_handler = Arc::clone(&seen);
    endpoint.on::<ReserveNow, _, _>(move |ctx, request| {
        let seen = Arc::clone(&seen_by_handler);
        async move {
            *seen.lock() = Some((
                ctx.charge_box_id().map(|id| id.as_str().to_owned()),
                ctx.endpoint.clone(),
                request.reservation_id.value(),
            ));
            Ok(ReserveNowResponse {
                status: ReservationStatus::Accepted,
            })
        }
    });

    let reply = endpoint
        .handle_soap(&reserve_now_envelope(RESERVE_FIELDS), &CancellationToken::new())
        .await;
    assert_eq!(reply.status, 200);
    assert!(reply.body.contains(">Accepted<"), "{}", reply.body);

    let (charge_box, identity, reservation) = seen.lock().clone().unwrap();
    assert_eq!(charge_box.as_deref(), Some("CP-1"));
    assert_eq!(identity.as_ref().map(Identity::as_str), Some("cp-endpoint"));
    assert_eq!(reservation, 42);
}

#[tokio::test]
async fn test_missing_mandatory_field_is_a_sender_fault() {
    let endpoint = OcppEndpoint::charge_point();
    let fields = "<cp:connectorId>1</cp:connectorId>\
        <cp:expiryDate>2024-01-01T12:00:00Z</cp:expiryDate>\
        <cp:reservationId>42</cp:reservationId>";
    let reply = endpoint
        .handle_soap(&reserve_now_envelope(fields), &CancellationToken::new())
        .await;

    assert_eq!(reply.status, 400);
    let envelope = XmlElement::parse(&reply.body).unwrap();
    let fault = envelope.descendant(SOAP12_NS, "Fault").unwrap();
    let code = fault.descendant(SOAP12_NS, "Value").map(XmlElement::text);
    assert_eq!(code, Some("soap:Sender"));
    assert!(reply.body.contains("idTag"), "{}", reply.body);
    assert_eq!(header_text(&envelope, "RelatesTo"), Some("urn:uuid:req-1"));
}

#[tokio::test]
async fn test_unknown_action_is_a_receiver_fault() {
    let endpoint = OcppEndpoint::central_system();
    let reply = endpoint
        .handle_soap(&reserve_now_envelope(RESERVE_FIELDS), &CancellationToken::new())
        .await;

    assert_eq!(reply.status, 500);
    assert!(reply.body.contains("soap:Receiver"), "{}", reply.body);
    assert!(reply.body.contains("ReserveNow"), "{}", reply.body);
}

#[tokio::test]
async fn test_garbage_is_a_sender_fault() {
    let endpoint = OcppEndpoint::charge_point();
    let reply = endpoint.handle_soap("<not-soap/>", &CancellationToken::new()).await;
    assert_eq!(reply.status, 400);
    assert!(reply.body.contains("soap:Sender"), "{}", reply.body);
}

#[tokio::test]
async fn test_hooks_see_raw_traffic_and_cannot_break_the_reply() {
    let endpoint = OcppEndpoint::charge_point();
    let observed = Arc::new(Mutex::new(Vec::new()));

    endpoint.hooks().on_request("ReserveNow", |_| panic!("hook exploded"));
    endpoint
        .hooks()
        .on_request("ReserveNow", |_| Err(anyhow::anyhow!("hook refused")));
    let log = Arc::clone(&observed);
    endpoint.hooks().on_response("ReserveNow", move |event| {
        log.lock().push((
            event.request.body.contains("reserveNowRequest"),
            event.response.body.contains("reserveNowResponse"),
        ));
        Ok(())
    });

    let reply = endpoint
        .handle_soap(&reserve_now_envelope(RESERVE_FIELDS), &CancellationToken::new())
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(*observed.lock(), vec![(true, true)]);
}
