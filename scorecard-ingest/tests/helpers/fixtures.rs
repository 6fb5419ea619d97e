//! EPCIS documents used across the integration tests

const SGTIN_1: &str = "urn:epc:id:sgtin:0614141.107346.1001";
const SGTIN_2: &str = "urn:epc:id:sgtin:0614141.107346.1002";
const SSCC: &str = "urn:epc:id:sscc:0614141.1234567890";
const SGLN: &str = "urn:epc:id:sgln:0614141.07346.1234";

fn header(instance_identifier: Option<&str>) -> String {
    match instance_identifier {
        Some(id) => format!(
            r#"<EPCISHeader>
    <sbdh:StandardBusinessDocumentHeader>
      <sbdh:HeaderVersion>1.0</sbdh:HeaderVersion>
      <sbdh:DocumentIdentification>
        <sbdh:Standard>EPCglobal</sbdh:Standard>
        <sbdh:InstanceIdentifier>{id}</sbdh:InstanceIdentifier>
        <sbdh:Type>Events</sbdh:Type>
      </sbdh:DocumentIdentification>
    </sbdh:StandardBusinessDocumentHeader>
  </EPCISHeader>"#
        ),
        None => String::new(),
    }
}

fn document(instance_identifier: Option<&str>, events: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<epcis:EPCISDocument xmlns:epcis="urn:epcglobal:epcis:xsd:1"
    xmlns:sbdh="http://www.unece.org/cefact/namespaces/StandardBusinessDocumentHeader"
    schemaVersion="1.2" creationDate="2025-02-01T12:00:00Z">
  {header}
  <EPCISBody>
    <EventList>
{events}
    </EventList>
  </EPCISBody>
</epcis:EPCISDocument>
"#,
        header = header(instance_identifier),
        events = events,
    )
}

fn commissioning_event(event_time: Option<&str>) -> String {
    let time = event_time
        .map(|t| format!("<eventTime>{}</eventTime>", t))
        .unwrap_or_default();
    format!(
        r#"      <ObjectEvent>
        {time}
        <eventTimeZoneOffset>-05:00</eventTimeZoneOffset>
        <epcList>
          <epc>{SGTIN_1}</epc>
          <epc>{SGTIN_2}</epc>
        </epcList>
        <action>ADD</action>
        <bizStep>urn:epcglobal:cbv:bizstep:commissioning</bizStep>
        <disposition>urn:epcglobal:cbv:disp:active</disposition>
        <readPoint><id>{SGLN}</id></readPoint>
        <extension>
          <ilmd>
            <cbvmda:lotNumber xmlns:cbvmda="urn:epcglobal:cbv:mda">LOT-2025-02</cbvmda:lotNumber>
            <cbvmda:itemExpirationDate xmlns:cbvmda="urn:epcglobal:cbv:mda">2027-02-28</cbvmda:itemExpirationDate>
          </ilmd>
        </extension>
      </ObjectEvent>"#
    )
}

fn aggregation_event(event_time: &str, action: &str, biz_step: &str, disposition: &str) -> String {
    format!(
        r#"      <AggregationEvent>
        <eventTime>{event_time}</eventTime>
        <eventTimeZoneOffset>+00:00</eventTimeZoneOffset>
        <parentID>{SSCC}</parentID>
        <childEPCs>
          <epc>{SGTIN_1}</epc>
        </childEPCs>
        <action>{action}</action>
        <bizStep>urn:epcglobal:cbv:bizstep:{biz_step}</bizStep>
        <disposition>urn:epcglobal:cbv:disp:{disposition}</disposition>
        <readPoint><id>{SGLN}</id></readPoint>
      </AggregationEvent>"#
    )
}

/// One OBSERVE event with the given raw bizStep and disposition values
pub fn observe_document(instance_identifier: Option<&str>, biz_step: &str, disposition: &str) -> String {
    let event = format!(
        r#"      <ObjectEvent>
        <eventTime>2025-02-03T09:00:00Z</eventTime>
        <eventTimeZoneOffset>+00:00</eventTimeZoneOffset>
        <epcList>
          <epc>{SGTIN_1}</epc>
        </epcList>
        <action>OBSERVE</action>
        <bizStep>{biz_step}</bizStep>
        <disposition>{disposition}</disposition>
        <readPoint><id>{SGLN}</id></readPoint>
      </ObjectEvent>"#
    );
    document(instance_identifier, &event)
}

/// One complete commissioning event; validates with no findings
pub fn valid_document(instance_identifier: Option<&str>) -> String {
    document(instance_identifier, &commissioning_event(Some("2025-02-01T10:00:00-05:00")))
}

/// The valid document without its eventTime; exactly one field error
pub fn missing_event_time_document(instance_identifier: Option<&str>) -> String {
    document(instance_identifier, &commissioning_event(None))
}

/// A pack that is never unpacked; held under the default policy
pub fn open_pack_document(instance_identifier: Option<&str>) -> String {
    document(
        instance_identifier,
        &aggregation_event("2025-02-01T10:00:00Z", "ADD", "packing", "in_progress"),
    )
}

/// The same pack followed by its unpack; validates
pub fn closed_pack_document(instance_identifier: Option<&str>) -> String {
    let events = [
        aggregation_event("2025-02-01T10:00:00Z", "ADD", "packing", "in_progress"),
        aggregation_event("2025-02-01T11:00:00Z", "DELETE", "unpacking", "in_progress"),
    ]
    .join("\n");
    document(instance_identifier, &events)
}

/// Well-formed with every container present but no events
pub fn empty_event_list_document() -> String {
    document(None, "")
}

pub const MALFORMED_XML: &str = "<epcis:EPCISDocument xmlns:epcis=\"urn:epcglobal:epcis:xsd:1\">\n<EPCISBody>\n<EventList>\n";

/// EPCIS 2.0 JSON-LD with one complete commissioning event
pub fn valid_json_document(instance_identifier: &str) -> String {
    serde_json::json!({
        "@context": ["https://ref.gs1.org/standards/epcis/epcis-context.jsonld"],
        "type": "EPCISDocument",
        "schemaVersion": "2.0",
        "creationDate": "2025-02-01T12:00:00Z",
        "epcisHeader": {
            "sbdh:StandardBusinessDocumentHeader": {
                "sbdh:DocumentIdentification": {
                    "sbdh:InstanceIdentifier": instance_identifier
                }
            }
        },
        "epcisBody": {
            "eventList": [
                {
                    "type": "ObjectEvent",
                    "eventTime": "2025-02-01T10:00:00-05:00",
                    "eventTimeZoneOffset": "-05:00",
                    "epcList": [SGTIN_1],
                    "action": "ADD",
                    "bizStep": "urn:epcglobal:cbv:bizstep:commissioning",
                    "disposition": "urn:epcglobal:cbv:disp:active",
                    "readPoint": { "id": SGLN },
                    "ilmd": {
                        "cbvmda:lotNumber": "LOT-2025-02",
                        "cbvmda:itemExpirationDate": "2027-02-28"
                    }
                }
            ]
        }
    })
    .to_string()
}
