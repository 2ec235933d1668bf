use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub mod catalog;
pub mod status;
pub mod watermark;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    #[display("standard")]
    Standard,
}

impl FromStr for Family {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            _ => Err(UnknownValue::new("family", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    #[serde(rename = "woocommerce")]
    #[display("woocommerce")]
    WooCommerce,
    #[display("ebay")]
    Ebay,
    #[display("amazon")]
    Amazon,
}

impl FromStr for Destination {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "woocommerce" => Ok(Self::WooCommerce),
            "ebay" => Ok(Self::Ebay),
            "amazon" => Ok(Self::Amazon),
            _ => Err(UnknownValue::new("destination", s)),
        }
    }
}

/// (family, destination) pair used for concurrency control, independent of tenant and session.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[display("{family}:{destination}")]
pub struct Target {
    pub family: Family,
    pub destination: Destination,
}

impl Target {
    pub fn new(family: Family, destination: Destination) -> Self {
        Self {
            family,
            destination,
        }
    }

    pub fn topic(&self) -> String {
        format!("/topic/import/{}/{}", self.family, self.destination)
    }
}

/// Tenant a request acts for. Passed explicitly into every remote call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TenantContext {
    pub identifier: String,
    pub destination: Destination,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    #[display("simple")]
    Simple,
    #[display("grouped")]
    Grouped,
    #[display("external")]
    External,
    #[display("variable")]
    Variable,
    #[display("variation")]
    Variation,
}

impl FromStr for ProductType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "grouped" => Ok(Self::Grouped),
            "external" => Ok(Self::External),
            "variable" => Ok(Self::Variable),
            "variation" => Ok(Self::Variation),
            _ => Err(UnknownValue::new("product type", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    #[display("persist")]
    Persist,
    #[display("delete")]
    Delete,
}

impl FromStr for ActionType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "persist" => Ok(Self::Persist),
            "delete" => Ok(Self::Delete),
            _ => Err(UnknownValue::new("action", s)),
        }
    }
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display("Unknown {kind}: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    pub fn new<S: ToString>(kind: &'static str, value: S) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[display("PRODUCT_CATEGORY")]
    ProductCategory,
    #[display("PRODUCT_TAG")]
    ProductTag,
    #[display("PRODUCT_TYPE")]
    ProductType,
    #[display("PRODUCT_PARENT")]
    ProductParent,
    #[display("LINE_FORMAT")]
    LineFormat,
}

/// Line-fatal error. Recorded against the line, processing moves on to the next one.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display("{code}: {message}")]
pub struct ImportLineError {
    pub code: ErrorCode,
    pub message: String,
}

impl ImportLineError {
    pub fn new<S: ToString>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }
}

/// Order-independent set union: appends the items of `other` not already present in `into`.
pub fn merge_distinct<T: PartialEq>(into: &mut Vec<T>, other: impl IntoIterator<Item = T>) {
    for item in other {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

/// [`merge_distinct`] comparing items by a derived key.
pub fn merge_distinct_by<T, K: PartialEq>(
    into: &mut Vec<T>,
    other: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> K,
) {
    for item in other {
        let k = key(&item);
        if !into.iter().any(|i| key(i) == k) {
            into.push(item);
        }
    }
}
