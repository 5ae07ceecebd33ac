//! Distinguished name encoding.

use crate::cert::template::Name;
use const_oid::ObjectIdentifier;
use der::asn1::Any;
use der::Tag;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{RdnSequence, RelativeDistinguishedName};

const OID_COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_STREET_ADDRESS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
const OID_POSTAL_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.17");
const OID_ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
const OID_COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_SERIAL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.5");

/// Encode a name as an RDN sequence.
///
/// Attribute order is C, O, OU, L, ST, STREET, PostalCode, SerialNumber, CN;
/// the values of one attribute type share a single RDN.
pub fn name_to_rdn_sequence(name: &Name) -> der::Result<RdnSequence> {
    let mut rdns = Vec::new();

    let multi_valued: [(&ObjectIdentifier, &Vec<String>); 7] = [
        (&OID_COUNTRY, &name.country),
        (&OID_ORGANIZATION, &name.organization),
        (&OID_ORGANIZATIONAL_UNIT, &name.organizational_unit),
        (&OID_LOCALITY, &name.locality),
        (&OID_PROVINCE, &name.province),
        (&OID_STREET_ADDRESS, &name.street_address),
        (&OID_POSTAL_CODE, &name.postal_code),
    ];
    for (oid, values) in multi_valued {
        if values.is_empty() {
            continue;
        }
        let attrs = values
            .iter()
            .map(|value| attribute(oid, value))
            .collect::<der::Result<Vec<_>>>()?;
        rdns.push(RelativeDistinguishedName::try_from(attrs)?);
    }

    for (oid, value) in [
        (&OID_SERIAL_NUMBER, &name.serial_number),
        (&OID_COMMON_NAME, &name.common_name),
    ] {
        if !value.is_empty() {
            rdns.push(RelativeDistinguishedName::try_from(vec![attribute(oid, value)?])?);
        }
    }

    Ok(RdnSequence(rdns))
}

/// Decode an RDN sequence, ignoring attribute types a [`Name`] has no slot for.
pub fn name_from_rdn_sequence(rdns: &RdnSequence) -> Name {
    let mut name = Name::default();

    for rdn in rdns.0.iter() {
        for atv in rdn.0.iter() {
            let value = match std::str::from_utf8(atv.value.value()) {
                Ok(value) => value.to_string(),
                Err(_) => continue,
            };

            match atv.oid {
                OID_COUNTRY => name.country.push(value),
                OID_PROVINCE => name.province.push(value),
                OID_LOCALITY => name.locality.push(value),
                OID_STREET_ADDRESS => name.street_address.push(value),
                OID_POSTAL_CODE => name.postal_code.push(value),
                OID_ORGANIZATION => name.organization.push(value),
                OID_ORGANIZATIONAL_UNIT => name.organizational_unit.push(value),
                OID_COMMON_NAME => name.common_name = value,
                OID_SERIAL_NUMBER => name.serial_number = value,
                _ => {}
            }
        }
    }

    name
}

// PrintableString when the value allows it, UTF8String otherwise.
fn attribute(oid: &ObjectIdentifier, value: &str) -> der::Result<AttributeTypeAndValue> {
    let tag = if value.chars().all(is_printable) {
        Tag::PrintableString
    } else {
        Tag::Utf8String
    };

    Ok(AttributeTypeAndValue {
        oid: *oid,
        value: Any::new(tag, value.as_bytes())?,
    })
}

fn is_printable(c: char) -> bool {
    c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c)
}
