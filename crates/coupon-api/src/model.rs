//! Coupon domain model
//!
//! Plain values. Every leaf is optional because the API omits fields freely;
//! an absent field is `None`, never an error.

use serde::{Deserialize, Serialize};

/// A quota of high-speed data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Data volume in MB
    pub volume: Option<u64>,
    /// Expiry exactly as sent by the API (e.g. `"201712"`)
    pub expire: Option<String>,
    /// Coupon kind, e.g. `"bundle"`, `"topup"`, `"sim"`
    #[serde(rename = "type")]
    pub coupon_type: Option<String>,
}

/// One line (SIM) within an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdoInfo {
    pub hdo_service_code: Option<String>,
    /// Throttling state as reported by the API
    pub regulation: Option<String>,
    /// Whether coupon (high-speed) consumption is enabled
    pub coupon_use: Option<bool>,
    pub iccid: Option<String>,
    /// Coupon stored on the SIM itself
    pub coupon: Option<Coupon>,
    pub voice: Option<bool>,
    pub sms: Option<bool>,
    pub number: Option<String>,
}

/// One account (HDD) with its line and bundled/purchased coupons.
///
/// The API nests lines as a list; only the first line is modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponInfo {
    pub hdd_service_code: Option<String>,
    pub hdo_info: HdoInfo,
    /// Bundled and purchased coupons, in API order
    pub coupon: Vec<Coupon>,
    pub plan: Option<String>,
}

impl CouponInfo {
    /// Remaining volume in MB across bundled coupons and the in-SIM coupon.
    pub fn total_volume(&self) -> u64 {
        let bundled: u64 = self.coupon.iter().filter_map(|c| c.volume).sum();
        let sim = self
            .hdo_info
            .coupon
            .as_ref()
            .and_then(|c| c.volume)
            .unwrap_or(0);
        bundled + sim
    }
}
