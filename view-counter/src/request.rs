use crate::errors::RequestError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const PRODUCT_GID_PREFIX: &str = "gid://shopify/Product/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `get_metafield`
    GetCount,
    /// `update_metafield`
    IncrementCount,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::GetCount => "get_metafield",
            Action::IncrementCount => "update_metafield",
        }
    }
}

impl FromStr for Action {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get_metafield" => Ok(Action::GetCount),
            "update_metafield" => Ok(Action::IncrementCount),
            "" => Err(RequestError::MissingAction),
            other => Err(RequestError::UnknownAction(other.to_string())),
        }
    }
}

/// Global id of a product, e.g. `gid://shopify/Product/8123456789`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductGid(String);

impl ProductGid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProductGid {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(RequestError::MissingProductGid);
        }

        match s.strip_prefix(PRODUCT_GID_PREFIX) {
            Some(id) if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(ProductGid(s.to_string()))
            }
            _ => Err(RequestError::InvalidProductGid(s.to_string())),
        }
    }
}

impl fmt::Display for ProductGid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body as sent by the storefront. Every field is optional here so that a
/// missing field becomes a precise client error instead of a generic parse error.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawViewCountRequest {
    action: Option<String>,
    product_gid: Option<String>,
    total_views: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCountRequest {
    pub action: Action,
    pub product_gid: ProductGid,
    /// Target value for `update_metafield`. When absent the stored count is incremented by one.
    pub supplied_count: Option<u64>,
}

impl ViewCountRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let raw: RawViewCountRequest = serde_json::from_slice(body)?;
        raw.try_into()
    }
}

impl TryFrom<RawViewCountRequest> for ViewCountRequest {
    type Error = RequestError;

    fn try_from(raw: RawViewCountRequest) -> Result<Self, Self::Error> {
        let action: Action = raw.action.as_deref().unwrap_or_default().parse()?;
        let product_gid: ProductGid = raw.product_gid.as_deref().unwrap_or_default().parse()?;

        let supplied_count = match raw.total_views {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(parse_count(&value).ok_or(RequestError::InvalidTotalViews)?),
        };

        Ok(ViewCountRequest {
            action,
            product_gid,
            supplied_count,
        })
    }
}

/// Storefront themes send the count either as a JSON number or as a numeric string.
fn parse_count(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
