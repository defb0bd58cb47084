// Test Helpers
use workshop_harness::{Build, DeploymentPlan, SimLedger, Workshop};

#[allow(dead_code)]
pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Deploys the full workshop plan on a fresh simulated ledger, every contract patched.
#[allow(dead_code)]
pub async fn setup_workshop()
-> Result<Workshop<SimLedger>, Box<dyn std::error::Error + Send + Sync>> {
    setup_workshop_on(SimLedger::new()).await
}

#[allow(dead_code)]
pub async fn setup_workshop_on(
    ledger: SimLedger,
) -> Result<Workshop<SimLedger>, Box<dyn std::error::Error + Send + Sync>> {
    let workshop = Workshop::setup(ledger, &DeploymentPlan::workshop()).await?;
    println!("🔍 [DEBUG] Deployed {} contracts", workshop.deployment().len());
    Ok(workshop)
}

/// Deploys the workshop with `contract` in its vulnerable build.
#[allow(dead_code)]
pub async fn setup_vulnerable(
    contract: &str,
) -> Result<Workshop<SimLedger>, Box<dyn std::error::Error + Send + Sync>> {
    setup_workshop_on(SimLedger::new().with_build(contract, Build::Vulnerable)).await
}
