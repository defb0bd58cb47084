use ethers_core::types::Address;

use crate::{
    ContractHandle, Deployment, DeploymentPlan, HarnessError, LedgerClient, deploy_all,
};

/// Everything a scenario needs: the client, the deployed handles and the
/// node's accounts. Built once before the first scenario runs.
#[derive(Debug)]
pub struct Workshop<C> {
    client: C,
    deployment: Deployment,
    accounts: Vec<Address>,
}

impl<C: LedgerClient> Workshop<C> {
    /// Deploys `plan` from the default account and wraps the result.
    pub async fn setup(client: C, plan: &DeploymentPlan) -> Result<Self, HarnessError> {
        let accounts = client.accounts().await?;
        let deployer = *accounts.first().ok_or(HarnessError::MissingAccount(0))?;
        let deployment = deploy_all(&client, plan, deployer).await?;
        Ok(Self::new(client, deployment, accounts))
    }

    pub fn new(client: C, deployment: Deployment, accounts: Vec<Address>) -> Self {
        Self {
            client,
            deployment,
            accounts,
        }
    }

    /// Deploys a fresh copy of `plan` on the same client, discarding the
    /// previous handles.
    pub async fn redeploy(&mut self, plan: &DeploymentPlan) -> Result<(), HarnessError> {
        self.deployment = deploy_all(&self.client, plan, self.default_account()?).await?;
        Ok(())
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn contract(&self, name: &str) -> Result<&ContractHandle, HarnessError> {
        self.deployment.get(name)
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn account(&self, index: usize) -> Result<Address, HarnessError> {
        self.accounts
            .get(index)
            .copied()
            .ok_or(HarnessError::MissingAccount(index))
    }

    pub fn default_account(&self) -> Result<Address, HarnessError> {
        self.account(0)
    }

    pub fn into_client(self) -> C {
        self.client
    }
}
