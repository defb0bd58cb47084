use std::collections::BTreeMap;
use std::time::Duration;

use ethers_core::abi::Token;
use ethers_core::types::Address;
use tokio::time::sleep;

use crate::interface::WORKSHOP_CONTRACTS;
use crate::{ContractHandle, HarnessConfig, HarnessError, LedgerClient, LedgerError};

/// Contracts to deploy with their constructor arguments, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentPlan {
    contracts: Vec<(String, Vec<Token>)>,
    attempts: u32,
    retry_delay: Duration,
}

impl Default for DeploymentPlan {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentPlan {
    pub fn new() -> Self {
        Self {
            contracts: Vec::new(),
            attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }

    /// The eight workshop contracts, none taking constructor arguments.
    pub fn workshop() -> Self {
        WORKSHOP_CONTRACTS
            .iter()
            .fold(Self::new(), |plan, name| plan.contract(name, Vec::new()))
    }

    /// Adds `name`, replacing its arguments if it is already planned.
    pub fn contract(mut self, name: &str, args: Vec<Token>) -> Self {
        match self.contracts.iter_mut().find(|(planned, _)| planned == name) {
            Some((_, planned_args)) => *planned_args = args,
            None => self.contracts.push((name.to_string(), args)),
        }
        self
    }

    /// Attempts per contract when the transport times out.
    pub fn with_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Takes the retry policy from `config`.
    pub fn with_config(self, config: &HarnessConfig) -> Self {
        self.with_retries(
            config.deploy_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contracts.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Handles of every deployed contract, by name.
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    handles: BTreeMap<String, ContractHandle>,
}

impl Deployment {
    pub fn get(&self, name: &str) -> Result<&ContractHandle, HarnessError> {
        self.handles
            .get(name)
            .ok_or_else(|| HarnessError::UnknownContract(name.to_string()))
    }

    pub fn handles(&self) -> impl Iterator<Item = &ContractHandle> {
        self.handles.values()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Deploys every planned contract from `from`, one after the other.
///
/// Returns once each deployment has been mined. Transport timeouts are
/// retried; a rejected deployment fails the whole plan.
pub async fn deploy_all<C: LedgerClient>(
    client: &C,
    plan: &DeploymentPlan,
    from: Address,
) -> Result<Deployment, HarnessError> {
    let mut deployment = Deployment::default();
    for (name, args) in &plan.contracts {
        let handle = deploy_with_retry(client, plan, name, args, from).await?;
        tracing::info!(contract = %name, address = ?handle.address, "contract deployed");
        deployment.handles.insert(name.clone(), handle);
    }
    Ok(deployment)
}

async fn deploy_with_retry<C: LedgerClient>(
    client: &C,
    plan: &DeploymentPlan,
    name: &str,
    args: &[Token],
    from: Address,
) -> Result<ContractHandle, HarnessError> {
    let mut last_error = None;
    for attempt in 1..=plan.attempts {
        match client.deploy(name, args, from).await {
            Ok(handle) => return Ok(handle),
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    contract = name,
                    attempt,
                    attempts = plan.attempts,
                    error = %e,
                    "deployment timed out, retrying"
                );
                last_error = Some(e);
                if attempt < plan.attempts {
                    sleep(plan.retry_delay).await;
                }
            }
            Err(e) => {
                tracing::warn!(contract = name, error = %e, "deployment rejected");
                return Err(e.into());
            }
        }
    }
    Err(LedgerError::Other(format!(
        "deployment of {name} failed after {} attempts: {}",
        plan.attempts,
        last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string())
    ))
    .into())
}
