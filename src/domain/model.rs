use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reads `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An uploaded fillable PDF form. Never edited after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: String, data: Vec<u8>) -> Self {
        Self {
            id: new_id(),
            name,
            data,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub templates: Vec<Template>,
    pub created_at: DateTime<Utc>,
}

impl Agency {
    pub fn new(name: String) -> Self {
        Self {
            id: new_id(),
            name,
            templates: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn template(&self, template_id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == template_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Destination {
    pub destination: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
}

/// A trip booking. `remaining_amount` is always derived from the two other
/// money fields when the voucher is built; stored values are never trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: String,
    #[serde(alias = "selectedAgency")]
    pub agency_id: String,
    #[serde(alias = "selectedTemplate")]
    pub template_id: String,
    #[serde(default)]
    pub responsible_agent: Option<String>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub boarding_location: String,
    #[serde(default)]
    pub passengers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub adults: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub infants: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_passengers: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_amount: f64,
    #[serde(default, alias = "preBooking", deserialize_with = "null_as_default")]
    pub advance_payment: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub remaining_amount: f64,
    #[serde(default)]
    pub observations: String,
    #[serde(default)]
    pub contract_date: String,
    pub contractor_name: String,
    #[serde(default)]
    pub contractor_cpf: String,
    #[serde(default)]
    pub contractor_phone1: String,
    #[serde(default)]
    pub contractor_phone2: String,
    #[serde(default)]
    pub contractor_email: String,
    /// Records edited by older releases may lack it; the epoch stands in
    /// until it is filled from `updated_at`.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Admin,
    #[default]
    Agent,
}

impl AgentKind {
    pub fn label(&self) -> &'static str {
        match self {
            AgentKind::Admin => "Administrator",
            AgentKind::Agent => "Agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "type", default)]
    pub kind: AgentKind,
}

/// Profile kept under the legacy `agencyConfig` key: only the agent roster
/// is still read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgencyProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

impl AgencyProfile {
    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }
}
