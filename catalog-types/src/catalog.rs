use crate::{merge_distinct_by, ProductType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Category {
    pub id: Option<u64>,
    pub name: String,
}

impl Category {
    pub fn named<S: ToString>(name: S) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: Option<u64>,
    pub name: String,
}

impl Tag {
    pub fn named<S: ToString>(name: S) -> Self {
        Self {
            id: None,
            name: name.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Image {
    pub id: Option<u64>,
    pub src: String,
}

impl Image {
    pub fn from_src<S: ToString>(src: S) -> Self {
        Self {
            id: None,
            src: src.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AttributeTerm {
    /// Unresolved value as read from the sheet
    Name { name: String },
    /// Value known remotely
    Term { id: u64, name: String },
    /// Value submitted for creation
    NewTerm { id: Option<u64>, name: String },
}

impl AttributeTerm {
    pub fn name_of<S: ToString>(name: S) -> Self {
        Self::Name {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Name { name } | Self::Term { name, .. } | Self::NewTerm { name, .. } => name,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Name { .. } => None,
            Self::Term { id, .. } => Some(*id),
            Self::NewTerm { id, .. } => *id,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Name { .. })
    }

    pub fn is_blank(&self) -> bool {
        self.name().trim().is_empty()
    }

    /// Lower-cased name with all whitespace removed.
    pub fn normalized_name(&self) -> String {
        normalize_term_name(self.name())
    }
}

pub fn normalize_term_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Exactly one term, used at variation granularity
    Single,
    /// Merged multi-valued form used on the parent product
    Multiple,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub id: Option<u64>,
    pub name: String,
    pub position: usize,
    pub visible: bool,
    pub variation: bool,
    pub kind: AttributeKind,
    pub options: Vec<AttributeTerm>,
}

impl Attribute {
    pub fn multiple<S: ToString>(name: S, options: Vec<AttributeTerm>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            position: 0,
            visible: true,
            variation: true,
            kind: AttributeKind::Multiple,
            options,
        }
    }

    pub fn first_option(&self) -> Option<&AttributeTerm> {
        self.options.first()
    }

    /// Non-blank name and non-blank first value.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && self.first_option().is_some_and(|o| !o.is_blank())
    }

    /// Single-term copy carrying the first option.
    pub fn to_single(&self) -> Option<Attribute> {
        let term = self.first_option()?.clone();
        Some(Attribute {
            kind: AttributeKind::Single,
            options: vec![term],
            ..self.clone()
        })
    }

    pub fn merge_options(&mut self, other: impl IntoIterator<Item = AttributeTerm>) {
        merge_distinct_by(&mut self.options, other, AttributeTerm::normalized_name);
    }

    pub fn option_names(&self) -> Vec<String> {
        self.options.iter().map(|o| o.name().to_string()).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Product {
    pub id: Option<u64>,
    pub sku: String,
    pub name: String,
    pub product_type: ProductType,
    pub regular_price: Option<Decimal>,
    pub taxed_price: Option<Decimal>,
    pub stock_quantity: Option<u32>,
    pub short_description: String,
    pub description: String,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub images: Vec<Image>,
    pub attributes: Vec<Attribute>,
    /// Remote ids of the product's variations as last reported by the destination
    pub variations: Vec<u64>,
}

impl Product {
    pub fn new<S: ToString, N: ToString>(sku: S, name: N, product_type: ProductType) -> Self {
        Self {
            id: None,
            sku: sku.to_string(),
            name: name.to_string(),
            product_type,
            regular_price: None,
            taxed_price: None,
            stock_quantity: None,
            short_description: String::new(),
            description: String::new(),
            categories: vec![],
            tags: vec![],
            images: vec![],
            attributes: vec![],
            variations: vec![],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProductVariation {
    pub id: Option<u64>,
    pub sku: String,
    pub parent_sku: String,
    pub description: String,
    pub regular_price: Option<Decimal>,
    pub taxed_price: Option<Decimal>,
    pub stock_quantity: Option<u32>,
    pub image: Option<Image>,
    pub attributes: Vec<Attribute>,
}

impl ProductVariation {
    /// Option values in attribute order.
    pub fn option_values(&self) -> Vec<String> {
        self.attributes
            .iter()
            .filter_map(|a| a.first_option())
            .map(|o| o.name().to_string())
            .collect()
    }
}

/// Generated variation SKU: the parent SKU joined with the option values, whitespace replaced by `-`.
pub fn variation_sku<I, S>(parent_sku: &str, options: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sku = parent_sku.to_string();
    for option in options {
        sku.push('_');
        let mut in_space = false;
        for c in option.as_ref().trim().chars() {
            if c.is_whitespace() {
                if !in_space {
                    sku.push('-');
                }
                in_space = true;
            } else {
                sku.push(c);
                in_space = false;
            }
        }
    }
    sku
}

/// Either kind of node the pipeline persists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "node")]
pub enum CatalogNode {
    Product(Product),
    Variation(ProductVariation),
}

impl CatalogNode {
    pub fn sku(&self) -> &str {
        match self {
            Self::Product(p) => &p.sku,
            Self::Variation(v) => &v.sku,
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Self::Product(p) => p.id,
            Self::Variation(v) => v.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variation_sku_is_deterministic() {
        assert_eq!(variation_sku("SHIRT", ["Red"]), "SHIRT_Red");
        assert_eq!(
            variation_sku("SHIRT", ["Dark  Red", "XL"]),
            variation_sku("SHIRT", vec!["Dark  Red".to_string(), "XL".to_string()])
        );
        assert_eq!(variation_sku("SHIRT", ["Dark  Red", "XL"]), "SHIRT_Dark-Red_XL");
    }

    #[test]
    fn attribute_validity() {
        let valid = Attribute::multiple("Color", vec![AttributeTerm::name_of("Red")]);
        let blank_value = Attribute::multiple("Color", vec![AttributeTerm::name_of(" ")]);
        let blank_name = Attribute::multiple("", vec![AttributeTerm::name_of("Red")]);
        let empty = Attribute::multiple("Color", vec![]);
        assert!(valid.is_valid());
        assert!(!blank_value.is_valid());
        assert!(!blank_name.is_valid());
        assert!(!empty.is_valid());
    }

    #[test]
    fn merge_options_deduplicates_by_normalized_name() {
        let mut a = Attribute::multiple(
            "Color",
            vec![AttributeTerm::Term {
                id: 4,
                name: "Dark Red".to_string(),
            }],
        );
        a.merge_options(vec![
            AttributeTerm::name_of("dark red"),
            AttributeTerm::name_of("Blue"),
        ]);
        assert_eq!(a.option_names(), vec!["Dark Red", "Blue"]);
        assert_eq!(a.options[0].id(), Some(4));
    }

    #[test]
    fn single_form_keeps_first_term() {
        let a = Attribute::multiple(
            "Size",
            vec![AttributeTerm::name_of("M"), AttributeTerm::name_of("L")],
        );
        let single = a.to_single().expect("single");
        assert_eq!(single.kind, AttributeKind::Single);
        assert_eq!(single.option_names(), vec!["M"]);
    }
}
