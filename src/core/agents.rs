use crate::core::store::{Collection, RecordStore};
use crate::domain::model::{new_id, Agent, AgentKind, AgencyProfile};
use crate::domain::ports::Storage;
use crate::utils::error::{Result, VoucherError};
use crate::utils::format::mask_phone;
use crate::utils::validation::validate_non_empty_string;

pub struct AgentRoster<'a, S: Storage> {
    store: &'a RecordStore<S>,
}

impl<'a, S: Storage> AgentRoster<'a, S> {
    pub fn new(store: &'a RecordStore<S>) -> Self {
        Self { store }
    }

    pub async fn profile(&self) -> Result<AgencyProfile> {
        Ok(self
            .store
            .load(Collection::AgencyProfile)
            .await?
            .unwrap_or_default())
    }

    pub async fn add(&self, name: &str, email: &str, phone: &str, kind: AgentKind) -> Result<Agent> {
        validate_non_empty_string("agent.name", name)?;
        validate_non_empty_string("agent.email", email)?;

        let mut profile = self.profile().await?;
        let agent = Agent {
            id: new_id(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            phone: mask_phone(phone),
            kind,
        };
        profile.agents.push(agent.clone());
        self.store.save(Collection::AgencyProfile, &profile).await?;
        Ok(agent)
    }

    /// A blank or unchanged name leaves the roster as it was.
    pub async fn rename(&self, id: &str, new_name: &str) -> Result<Agent> {
        let mut profile = self.profile().await?;
        let agent = profile
            .agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Agent",
                id: id.to_string(),
            })?;

        let trimmed = new_name.trim();
        if trimmed.is_empty() || trimmed == agent.name {
            return Ok(agent.clone());
        }
        agent.name = trimmed.to_string();
        let renamed = agent.clone();

        self.store.save(Collection::AgencyProfile, &profile).await?;
        Ok(renamed)
    }

    pub async fn remove(&self, id: &str) -> Result<Agent> {
        let mut profile = self.profile().await?;
        let index = profile
            .agents
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| VoucherError::NotFound {
                entity: "Agent",
                id: id.to_string(),
            })?;

        let removed = profile.agents.remove(index);
        self.store.save(Collection::AgencyProfile, &profile).await?;
        Ok(removed)
    }
}
