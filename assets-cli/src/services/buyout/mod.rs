// Buyout service: device depreciation and buyout prices for assets
//
// Reads the original cost and purchase date from an asset, computes a quote,
// and turns the quote into a change set for writing back.

pub mod calculator;
pub mod depreciation;

pub use calculator::BuyoutQuote;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use calculator::{BuyoutError, BuyoutInput};
use crate::api::models::AssetObject;
use crate::api::schema::ObjectTypeSchema;
use crate::operations::{AttributeChange, AttributeValue};

/// Attribute names the buyout reads and writes.
///
/// An empty output name leaves that field untouched on `--apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuyoutFields {
    pub original_cost: String,
    pub purchase_date: String,
    pub age_months: String,
    pub device_type: String,
    pub cost_with_vat: String,
    pub depreciation_rate: String,
    pub buyout_price: String,
}

impl Default for BuyoutFields {
    fn default() -> Self {
        Self {
            original_cost: "Original Cost".to_string(),
            purchase_date: "Purchase Date".to_string(),
            age_months: "Age Months".to_string(),
            device_type: "Device Type".to_string(),
            cost_with_vat: "Cost With VAT".to_string(),
            depreciation_rate: "Depreciation Rate".to_string(),
            buyout_price: "Buyout Price".to_string(),
        }
    }
}

/// Value of the named attribute on `object`, looked up through its schema
fn attribute_by_name(object: &AssetObject, schema: &ObjectTypeSchema, name: &str) -> Option<String> {
    let definition = schema.attribute(name)?;
    object.attribute_text(&definition.id)
}

/// Quote for one fetched asset
pub fn quote_for(
    object: &AssetObject,
    schema: &ObjectTypeSchema,
    fields: &BuyoutFields,
    today: NaiveDate,
) -> Result<Option<BuyoutQuote>, BuyoutError> {
    let original_cost = attribute_by_name(object, schema, &fields.original_cost);
    let purchase_date = attribute_by_name(object, schema, &fields.purchase_date);

    let input = BuyoutInput {
        original_cost: original_cost.as_deref(),
        purchase_date: purchase_date.as_deref(),
        object_type_name: object.object_type_name().or(schema.name.as_deref()),
    };
    BuyoutQuote::calculate(&input, today)
}

impl BuyoutQuote {
    /// Change set writing the computed fields back to the asset
    pub fn to_changes(&self, fields: &BuyoutFields) -> AttributeChange {
        let outputs = [
            (&fields.age_months, AttributeValue::Integer(i64::from(self.age_months))),
            (&fields.device_type, AttributeValue::text(self.device_type.as_str())),
            (&fields.cost_with_vat, AttributeValue::text(self.cost_with_vat.to_string())),
            (&fields.depreciation_rate, AttributeValue::text(self.depreciation_rate.to_string())),
            (&fields.buyout_price, AttributeValue::text(self.buyout_price.to_string())),
        ];

        let mut changes = AttributeChange::new();
        for (name, value) in outputs {
            if !name.trim().is_empty() {
                changes.set(name.trim(), value);
            }
        }
        changes
    }
}
