use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub type Notes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Smallest currency unit (paise, cents).
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: Notes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
    pub id: String,
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
    #[serde(default, deserialize_with = "notes_or_empty")]
    pub notes: Notes,
}

impl PaymentOrder {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub payment_id: String,
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RefundRequest {
    pub amount: i64,
}

// The gateway sends `notes: []` for orders created without notes.
fn notes_or_empty<'de, D>(deserializer: D) -> Result<Notes, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawNotes {
        Map(BTreeMap<String, serde_json::Value>),
        List(Vec<serde_json::Value>),
    }

    let raw = Option::<RawNotes>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawNotes::Map(map)) => map
            .into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect(),
        Some(RawNotes::List(_)) | None => Notes::new(),
    })
}
