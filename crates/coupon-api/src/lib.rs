//! IIJmio coupon API client
//!
//! Retrieves coupon information and toggles coupon use per line. Every call
//! goes through the authenticated executor; a 403 from the API triggers one
//! re-authentication via the `Authenticator` and a single retry.
//!
//! Layers, leaves first:
//! - `model`: `Coupon`, `HdoInfo`, `CouponInfo`
//! - `parse`: `couponInfo` JSON document -> `Vec<CouponInfo>`
//! - `transport`: raw HTTP seam (`Transport`) and the reqwest implementation
//! - `executor`: auth headers, developer id precondition, status classification
//! - `retry`: the re-authenticate-then-retry-once combinator
//! - `service`: `CouponService`, the public entry point

pub mod error;
pub mod executor;
pub mod model;
pub mod parse;
pub mod retry;
pub mod service;
pub mod transport;

pub use error::{Error, Result};
pub use executor::{COUPON_ENDPOINT, Executor, ResponseClass, classify_status};
pub use model::{Coupon, CouponInfo, HdoInfo};
pub use parse::parse_coupon_info;
pub use retry::retry_after_reauth;
pub use service::{Authenticator, CouponService};
pub use transport::{ApiRequest, ApiResponse, BoxFuture, ReqwestTransport, Transport};
