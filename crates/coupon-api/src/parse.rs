//! `couponInfo` response parsing
//!
//! The document is parsed all-or-nothing: a broken root or a record that is
//! not an object fails the whole parse with `MalformedResponse`. Inside a
//! record, missing, null, or wrongly-typed leaves become `None`.
//!
//! Shape of one account record:
//! ```text
//! { "hddServiceCode": .., "plan": ..,
//!   "hdoInfo": [ { "hdoServiceCode": .., "couponUse": .., ..,
//!                  "coupon": [ { "volume": .., "expire": .., "type": .. } ] } ],
//!   "coupon":  [ { "volume": .., "expire": .., "typo": .. }, .. ] }
//! ```

use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Coupon, CouponInfo, HdoInfo};

/// Type field of the in-SIM coupon nested under `hdoInfo`.
const SIM_COUPON_TYPE_FIELD: &str = "type";

/// Type field of the account-level coupon array. The API spells it `typo`;
/// kept distinct from the nested reader on purpose.
const BUNDLED_COUPON_TYPE_FIELD: &str = "typo";

/// Parse a raw coupon-info response body.
pub fn parse_coupon_info(body: &str) -> Result<Vec<CouponInfo>> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON: {e}")))?;
    parse_document(&document)
}

/// Parse an already-decoded coupon-info document.
fn parse_document(document: &Value) -> Result<Vec<CouponInfo>> {
    let records = document
        .get("couponInfo")
        .ok_or_else(|| Error::MalformedResponse("missing couponInfo".into()))?
        .as_array()
        .ok_or_else(|| Error::MalformedResponse("couponInfo is not an array".into()))?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_account(index, record))
        .collect()
}

fn parse_account(index: usize, record: &Value) -> Result<CouponInfo> {
    if !record.is_object() {
        return Err(Error::MalformedResponse(format!(
            "couponInfo[{index}] is not an object"
        )));
    }

    let hdo_info = first_element(record, "hdoInfo")
        .map(parse_hdo)
        .unwrap_or_default();

    let coupon = record
        .get("coupon")
        .and_then(Value::as_array)
        .map(|coupons| {
            coupons
                .iter()
                .map(|c| parse_coupon(c, BUNDLED_COUPON_TYPE_FIELD))
                .collect()
        })
        .unwrap_or_default();

    Ok(CouponInfo {
        hdd_service_code: string_field(record, "hddServiceCode"),
        hdo_info,
        coupon,
        plan: string_field(record, "plan"),
    })
}

fn parse_hdo(hdo: &Value) -> HdoInfo {
    HdoInfo {
        hdo_service_code: string_field(hdo, "hdoServiceCode"),
        regulation: scalar_field(hdo, "regulation"),
        coupon_use: bool_field(hdo, "couponUse"),
        iccid: string_field(hdo, "iccid"),
        coupon: first_element(hdo, "coupon").map(|c| parse_coupon(c, SIM_COUPON_TYPE_FIELD)),
        voice: bool_field(hdo, "voice"),
        sms: bool_field(hdo, "sms"),
        number: string_field(hdo, "number"),
    }
}

fn parse_coupon(coupon: &Value, type_field: &str) -> Coupon {
    Coupon {
        volume: coupon.get("volume").and_then(Value::as_u64),
        expire: string_field(coupon, "expire"),
        coupon_type: string_field(coupon, type_field),
    }
}

/// First element of an array field, if the field is a non-empty array.
fn first_element<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).and_then(Value::as_array).and_then(|a| a.first())
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

fn bool_field(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// String, bool, or number rendered as text. `regulation` arrives as a bool
/// from the live API but as a string in older documents.
fn scalar_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{"couponInfo":[{"hddServiceCode":"abc","plan":"P1","hdoInfo":[{"hdoServiceCode":"h1","couponUse":true,"coupon":[{"volume":100,"expire":"2024-12-31","type":"std"}]}],"coupon":[{"volume":500,"expire":"2024-12-31","typo":"bundle"}]}]}"#;

    #[test]
    fn parses_reference_document() {
        let infos = parse_coupon_info(EXAMPLE).unwrap();
        assert_eq!(infos.len(), 1);

        let info = &infos[0];
        assert_eq!(info.hdd_service_code.as_deref(), Some("abc"));
        assert_eq!(info.plan.as_deref(), Some("P1"));
        assert_eq!(info.hdo_info.hdo_service_code.as_deref(), Some("h1"));
        assert_eq!(info.hdo_info.coupon_use, Some(true));

        let sim = info.hdo_info.coupon.as_ref().unwrap();
        assert_eq!(sim.volume, Some(100));
        assert_eq!(sim.coupon_type.as_deref(), Some("std"));

        assert_eq!(
            info.coupon,
            vec![Coupon {
                volume: Some(500),
                expire: Some("2024-12-31".into()),
                coupon_type: Some("bundle".into()),
            }]
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(
            parse_coupon_info(EXAMPLE).unwrap(),
            parse_coupon_info(EXAMPLE).unwrap()
        );
    }

    #[test]
    fn preserves_record_order_and_count() {
        let body = r#"{"couponInfo":[
            {"hddServiceCode":"hdd3"},
            {"hddServiceCode":"hdd1"},
            {"hddServiceCode":"hdd2"}
        ]}"#;
        let codes: Vec<_> = parse_coupon_info(body)
            .unwrap()
            .into_iter()
            .map(|i| i.hdd_service_code.unwrap())
            .collect();
        assert_eq!(codes, ["hdd3", "hdd1", "hdd2"]);
    }

    #[test]
    fn type_readers_stay_distinct() {
        // Account-level coupons read `typo`, nested SIM coupons read `type`
        let body = r#"{"couponInfo":[{
            "hdoInfo":[{"coupon":[{"typo":"wrong","type":"sim"}]}],
            "coupon":[{"type":"wrong","typo":"topup"}]
        }]}"#;
        let info = &parse_coupon_info(body).unwrap()[0];
        assert_eq!(
            info.hdo_info.coupon.as_ref().unwrap().coupon_type.as_deref(),
            Some("sim")
        );
        assert_eq!(info.coupon[0].coupon_type.as_deref(), Some("topup"));
    }

    #[test]
    fn empty_hdo_list_yields_default_line() {
        let body = r#"{"couponInfo":[{"hddServiceCode":"abc","hdoInfo":[],"coupon":[]}]}"#;
        let info = &parse_coupon_info(body).unwrap()[0];
        assert_eq!(info.hdo_info, HdoInfo::default());
        assert!(info.coupon.is_empty());
    }

    #[test]
    fn missing_and_null_leaves_are_unset() {
        let body = r#"{"couponInfo":[{
            "hddServiceCode":null,
            "hdoInfo":[{"hdoServiceCode":"h1","couponUse":null,"iccid":42}]
        }]}"#;
        let info = &parse_coupon_info(body).unwrap()[0];
        assert_eq!(info.hdd_service_code, None);
        assert_eq!(info.plan, None);
        assert_eq!(info.hdo_info.coupon_use, None);
        assert_eq!(info.hdo_info.iccid, None);
        assert_eq!(info.hdo_info.coupon, None);
        assert!(info.coupon.is_empty());
    }

    #[test]
    fn full_line_record() {
        let body = r#"{"couponInfo":[{
            "hddServiceCode":"hdd9","plan":"Family Share",
            "hdoInfo":[{
                "hdoServiceCode":"hdo9","number":"08011112222","iccid":"DN00000000000",
                "regulation":false,"sms":true,"voice":false,"couponUse":false,
                "coupon":[{"volume":0,"expire":null,"type":"sim"}]
            }],
            "coupon":[{"volume":2000,"expire":"201712","typo":"bundle"},
                      {"volume":100,"expire":"201801","typo":"topup"}]
        }]}"#;
        let info = &parse_coupon_info(body).unwrap()[0];
        let hdo = &info.hdo_info;
        assert_eq!(hdo.number.as_deref(), Some("08011112222"));
        assert_eq!(hdo.iccid.as_deref(), Some("DN00000000000"));
        assert_eq!(hdo.regulation.as_deref(), Some("false"));
        assert_eq!(hdo.sms, Some(true));
        assert_eq!(hdo.voice, Some(false));
        assert_eq!(hdo.coupon_use, Some(false));
        assert_eq!(hdo.coupon.as_ref().unwrap().expire, None);
        assert_eq!(info.coupon.len(), 2);
        assert_eq!(info.total_volume(), 2100);
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_coupon_info(r#"{"couponInfo":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn missing_root_key_is_malformed() {
        let result = parse_coupon_info(r#"{"returnCode":"OK"}"#);
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn non_array_root_is_malformed() {
        let result = parse_coupon_info(r#"{"couponInfo":{"hddServiceCode":"abc"}}"#);
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn non_object_document_is_malformed() {
        assert!(matches!(
            parse_coupon_info("[1,2,3]"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_coupon_info("<html>"),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn non_object_record_fails_whole_document() {
        let body = r#"{"couponInfo":[{"hddServiceCode":"ok"}, "oops"]}"#;
        match parse_coupon_info(body) {
            Err(Error::MalformedResponse(msg)) => assert!(msg.contains("couponInfo[1]")),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }
}
