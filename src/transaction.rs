//! Transaction records as returned by the banking API.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the query engine needs to know about a transaction.
///
/// Records are only ever read.
pub trait TransactionRecord {
    /// Status code, e.g. `HELD` or `SETTLED`
    fn status(&self) -> &str;
    fn description(&self) -> &str;
    /// Signed amount in minor units (cents); negative for money out
    fn amount_minor_units(&self) -> i64;
    fn created_at(&self) -> DateTime<Utc>;
    fn transaction_type(&self) -> Option<&str>;
    fn account_id(&self) -> &str;
    fn category_id(&self) -> Option<&str>;
    fn parent_category_id(&self) -> Option<&str>;

    /// Signed amount in major units
    fn amount(&self) -> f64 {
        self.amount_minor_units() as f64 / 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type", default = "default_resource_type")]
    pub resource_type: String,
    pub attributes: TransactionAttributes,
    pub relationships: TransactionRelationships,
}

fn default_resource_type() -> String {
    "transactions".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAttributes {
    pub status: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    pub description: String,
    #[serde(default)]
    pub message: Option<String>,
    pub amount: MoneyObject,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub transaction_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoneyObject {
    pub currency_code: String,
    /// Decimal string, e.g. `"-12.50"`
    pub value: String,
    pub value_in_base_units: i64,
}

impl MoneyObject {
    pub fn from_minor_units(currency_code: &str, minor_units: i64) -> Self {
        let sign = if minor_units < 0 { "-" } else { "" };
        let abs = minor_units.unsigned_abs();
        Self {
            currency_code: currency_code.to_string(),
            value: format!("{}{}.{:02}", sign, abs / 100, abs % 100),
            value_in_base_units: minor_units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRelationships {
    pub account: Relationship,
    #[serde(default)]
    pub category: OptionalRelationship,
    #[serde(default)]
    pub parent_category: OptionalRelationship,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub data: ResourceRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionalRelationship {
    pub data: Option<ResourceRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl ResourceRef {
    fn new(resource_type: &str, id: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }
}

impl Transaction {
    pub fn new(
        id: impl Into<String>,
        status: &str,
        description: &str,
        amount_minor_units: i64,
        created_at: DateTime<Utc>,
        account_id: &str,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: default_resource_type(),
            attributes: TransactionAttributes {
                status: status.to_string(),
                raw_text: None,
                description: description.to_string(),
                message: None,
                amount: MoneyObject::from_minor_units("AUD", amount_minor_units),
                settled_at: None,
                created_at,
                transaction_type: None,
            },
            relationships: TransactionRelationships {
                account: Relationship {
                    data: ResourceRef::new("accounts", account_id),
                },
                category: OptionalRelationship::default(),
                parent_category: OptionalRelationship::default(),
            },
        }
    }

    pub fn with_category(mut self, category: Option<&str>, parent: Option<&str>) -> Self {
        self.relationships.category.data = category.map(|id| ResourceRef::new("categories", id));
        self.relationships.parent_category.data =
            parent.map(|id| ResourceRef::new("categories", id));
        self
    }

    pub fn with_type(mut self, transaction_type: Option<&str>) -> Self {
        self.attributes.transaction_type = transaction_type.map(str::to_string);
        self
    }
}

impl TransactionRecord for Transaction {
    fn status(&self) -> &str {
        &self.attributes.status
    }

    fn description(&self) -> &str {
        &self.attributes.description
    }

    fn amount_minor_units(&self) -> i64 {
        self.attributes.amount.value_in_base_units
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.attributes.created_at
    }

    fn transaction_type(&self) -> Option<&str> {
        self.attributes.transaction_type.as_deref()
    }

    fn account_id(&self) -> &str {
        &self.relationships.account.data.id
    }

    fn category_id(&self) -> Option<&str> {
        self.relationships.category.data.as_ref().map(|r| r.id.as_str())
    }

    fn parent_category_id(&self) -> Option<&str> {
        self.relationships
            .parent_category
            .data
            .as_ref()
            .map(|r| r.id.as_str())
    }
}

/// One page of the list-transactions response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPage {
    pub data: Vec<Transaction>,
    #[serde(default)]
    pub links: PageLinks,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TransactionDocument {
    Page(TransactionPage),
    List(Vec<Transaction>),
}

/// Decode either a response page or a bare array of transactions
pub fn load_transactions(json: &[u8]) -> Result<Vec<Transaction>> {
    let document: TransactionDocument =
        serde_json::from_slice(json).context("Failed to parse transactions JSON")?;
    Ok(match document {
        TransactionDocument::Page(page) => page.data,
        TransactionDocument::List(list) => list,
    })
}

/// Flattened view of a transaction for output
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary<'a> {
    pub id: &'a str,
    pub status: &'a str,
    pub description: &'a str,
    pub amount: f64,
    pub currency_code: &'a str,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub transaction_type: Option<&'a str>,
    pub account_id: &'a str,
    pub category_id: Option<&'a str>,
    pub parent_category_id: Option<&'a str>,
}

impl<'a> From<&'a Transaction> for TransactionSummary<'a> {
    fn from(t: &'a Transaction) -> Self {
        Self {
            id: &t.id,
            status: t.status(),
            description: t.description(),
            amount: t.amount(),
            currency_code: &t.attributes.amount.currency_code,
            created_at: t.created_at(),
            transaction_type: t.transaction_type(),
            account_id: t.account_id(),
            category_id: t.category_id(),
            parent_category_id: t.parent_category_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PAGE: &str = r#"{
        "data": [
            {
                "type": "transactions",
                "id": "abc-1",
                "attributes": {
                    "status": "SETTLED",
                    "rawText": null,
                    "description": "Coffee Corner",
                    "message": null,
                    "amount": { "currencyCode": "AUD", "value": "-4.50", "valueInBaseUnits": -450 },
                    "settledAt": "2024-06-02T09:00:00+10:00",
                    "createdAt": "2024-06-01T08:30:00+10:00",
                    "transactionType": null,
                    "note": null
                },
                "relationships": {
                    "account": { "data": { "type": "accounts", "id": "acc-1" } },
                    "category": { "data": { "type": "categories", "id": "restaurants-and-cafes" } },
                    "parentCategory": { "data": null },
                    "tags": { "data": [] }
                }
            }
        ],
        "links": { "prev": null, "next": null }
    }"#;

    #[test]
    fn test_load_page() {
        let list = load_transactions(PAGE.as_bytes()).unwrap();
        assert_eq!(list.len(), 1);
        let t = &list[0];
        assert_eq!(t.status(), "SETTLED");
        assert_eq!(t.amount_minor_units(), -450);
        assert_eq!(t.amount(), -4.5);
        assert_eq!(t.created_at(), Utc.with_ymd_and_hms(2024, 5, 31, 22, 30, 0).unwrap());
        assert_eq!(t.category_id(), Some("restaurants-and-cafes"));
        assert_eq!(t.parent_category_id(), None);
        assert_eq!(t.transaction_type(), None);
        assert_eq!(t.account_id(), "acc-1");
    }

    #[test]
    fn test_load_bare_array() {
        let t = Transaction::new("x", "HELD", "Lunch", -1200, Utc::now(), "acc-2");
        let json = serde_json::to_vec(&vec![t.clone()]).unwrap();
        assert_eq!(load_transactions(&json).unwrap(), vec![t]);
    }

    #[test]
    fn test_load_invalid() {
        assert!(load_transactions(b"{\"nope\": 1}").is_err());
        assert!(load_transactions(b"not json").is_err());
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(MoneyObject::from_minor_units("AUD", -450).value, "-4.50");
        assert_eq!(MoneyObject::from_minor_units("AUD", 123_456).value, "1234.56");
        assert_eq!(MoneyObject::from_minor_units("AUD", 5).value, "0.05");
    }

    #[test]
    fn test_summary() {
        let t = Transaction::new("x", "HELD", "Lunch", -1200, Utc::now(), "acc-2")
            .with_category(Some("takeaway"), Some("good-life"))
            .with_type(Some("Purchase"));
        let s = TransactionSummary::from(&t);
        assert_eq!(s.amount, -12.0);
        assert_eq!(s.parent_category_id, Some("good-life"));
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["type"], "Purchase");
        assert_eq!(json["accountId"], "acc-2");
    }
}
