//! # Node Tests
//!
//! Run the workshop suite against a real JSON-RPC node. They need a node with
//! unlocked, funded accounts at `WORKSHOP_RPC_URL` and compiled artifacts in
//! `WORKSHOP_ARTIFACTS_DIR`, so they are ignored by default:
//!
//! ```text
//! WORKSHOP_RPC_URL=http://127.0.0.1:8545 WORKSHOP_ARTIFACTS_DIR=dist/contracts \
//!     cargo test --test rpc_tests -- --ignored
//! ```

mod helpers;

use helpers::*;
use workshop_harness::{
    DeploymentPlan, HarnessConfig, LedgerClient, RpcLedger, Workshop, run_all,
};

async fn setup_node_workshop()
-> Result<Workshop<RpcLedger>, Box<dyn std::error::Error + Send + Sync>> {
    let config = HarnessConfig::load(None)?;
    println!("🔍 [DEBUG] Using node at {}", config.rpc_url);
    let plan = DeploymentPlan::workshop().with_config(&config);
    let ledger = RpcLedger::new(config)?;
    Ok(Workshop::setup(ledger, &plan).await?)
}

/// Tests the node exposes enough accounts for every scenario
#[tokio::test]
#[ignore = "requires a JSON-RPC node and compiled workshop artifacts"]
async fn test_node_accounts() -> TestResult {
    let config = HarnessConfig::load(None)?;
    let ledger = RpcLedger::new(config)?;
    let accounts = ledger.accounts().await?;
    assert!(accounts.len() >= 6, "Scenarios use accounts[0] to accounts[5]");
    Ok(())
}

/// Tests the whole suite against the deployed contracts
#[tokio::test]
#[ignore = "requires a JSON-RPC node and compiled workshop artifacts"]
async fn test_node_suite() -> TestResult {
    let workshop = setup_node_workshop().await?;

    let report = run_all(&workshop).await;
    println!("{report}");

    assert!(report.all_passed(), "{report}");
    Ok(())
}

/// Tests an invalid config is rejected before any request
#[test]
fn test_rpc_ledger_rejects_bad_config() {
    let config = HarnessConfig {
        deploy_attempts: 0,
        ..HarnessConfig::default()
    };
    assert!(RpcLedger::new(config).is_err());
}
