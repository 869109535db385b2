use super::codes::Jurisdiction;
use chrono::NaiveDate;
use icmsc_derive::CsvSchema;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Description of one CSV column, generated by `#[derive(CsvSchema)]`
#[derive(Debug, Clone, Copy)]
pub struct CsvField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// A line item extracted from a fiscal document.
///
/// Classification codes are kept as supplied; they are validated when the
/// item is assessed so that a malformed code fails the run, not the import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, CsvSchema)]
pub struct LineItem {
    /// Item code, unique within the period
    pub code: String,
    /// Product description
    #[serde(default)]
    pub description: String,
    /// NCM product classification (8 digits, dots allowed)
    pub ncm: String,
    /// CFOP operation code (4 digits)
    pub cfop: String,
    /// CST tax situation (2 or 3 digits)
    pub cst: String,
    /// Quantity
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Unit value
    #[schemars(with = "f64")]
    pub unit_value: Decimal,
    /// Total value of the line
    #[schemars(with = "f64")]
    pub total_value: Decimal,
    /// Discounts applied to the line (used when no base is declared)
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub discount: Option<Decimal>,
    /// ICMS calculation base declared on the document
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub declared_base: Option<Decimal>,
    /// ICMS amount declared on the document
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub declared_tax: Option<Decimal>,
}

impl LineItem {
    /// Calculation base before any benefit: declared base, else total less discounts
    pub fn original_base(&self) -> Decimal {
        self.declared_base
            .unwrap_or_else(|| self.total_value - self.discount.unwrap_or(Decimal::ZERO))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A fiscal operation (document) grouping line items by code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    pub id: String,
    pub direction: Direction,
    pub origin: Jurisdiction,
    pub destination: Jurisdiction,
    pub item_codes: Vec<String>,
}

impl Operation {
    pub fn is_interstate(&self) -> bool {
        self.origin != self.destination
    }
}

/// A candidate fixed-asset acquisition for ICMS credit recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetAcquisition {
    pub asset_id: String,
    #[serde(default)]
    pub description: String,
    pub ncm: String,
    pub cfop: String,
    pub acquisition_date: NaiveDate,
    #[schemars(with = "f64")]
    pub acquisition_value: Decimal,
    #[schemars(with = "f64")]
    pub icms_on_acquisition: Decimal,
}

/// Assessing establishment and its home state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Company {
    pub id: String,
    pub jurisdiction: Jurisdiction,
}

/// Read line items from CSV (columns per `LineItem::csv_schema`)
pub fn read_line_items_csv<R: Read>(reader: R) -> anyhow::Result<Vec<LineItem>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let items = rdr
        .deserialize()
        .collect::<Result<Vec<LineItem>, _>>()?;
    log::info!("Read {} csv line items", items.len());
    Ok(items)
}
