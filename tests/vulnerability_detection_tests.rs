mod helpers;

use helpers::*;
use rstest::rstest;
use workshop_harness::{
    Address, ContractHandle, DeploymentPlan, ErrorKind, LedgerClient, LedgerError, Outcome,
    Scenario, ScenarioError, SimLedger, Token, TxOptions, TxReceipt, U256, Workshop, run_all,
    run_scenario, run_scenarios,
};

/// Ledger whose VaultInvariant books every account at `U256::MAX`, as an
/// underflowed balance would read.
#[derive(Debug)]
struct UnderflowedVault {
    inner: SimLedger,
}

impl LedgerClient for UnderflowedVault {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.inner.accounts().await
    }

    async fn deploy(
        &self,
        name: &str,
        args: &[Token],
        from: Address,
    ) -> Result<ContractHandle, LedgerError> {
        self.inner.deploy(name, args, from).await
    }

    async fn send(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError> {
        self.inner.send(handle, method, args, options).await
    }

    async fn call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>, LedgerError> {
        if handle.name == "VaultInvariant" && method == "balances" {
            return Ok(vec![Token::Uint(U256::MAX)]);
        }
        self.inner.call(handle, method, args, from).await
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.inner.balance(address).await
    }
}

/// Tests each vulnerable build is caught by the scenario that targets it
#[rstest]
#[case(Scenario::BalanceGuard)]
#[case(Scenario::ZeroVoteGuard)]
#[case(Scenario::NonzeroPriceGuard)]
#[case(Scenario::AccessControlGuard)]
#[case(Scenario::FungibleAccounting)]
#[case(Scenario::RepeatedPurchase)]
#[tokio::test]
async fn test_vulnerable_build_detected(#[case] scenario: Scenario) -> TestResult {
    let workshop = setup_vulnerable(scenario.contract()).await?;

    let result = run_scenario(&workshop, scenario).await;
    println!("🔍 [DEBUG] {:?} on vulnerable {}: {:?}", scenario, scenario.contract(), result);

    assert!(
        result.is_err(),
        "Scenario {:?} should fail against the vulnerable {}",
        scenario,
        scenario.contract()
    );
    Ok(())
}

/// Tests the guard scenarios fail because the exploit went through
#[rstest]
#[case(Scenario::BalanceGuard)]
#[case(Scenario::ZeroVoteGuard)]
#[case(Scenario::NonzeroPriceGuard)]
#[case(Scenario::AccessControlGuard)]
#[tokio::test]
async fn test_guard_failures_are_unexpected_successes(#[case] scenario: Scenario) -> TestResult {
    let workshop = setup_vulnerable(scenario.contract()).await?;

    match run_scenario(&workshop, scenario).await {
        Err(ScenarioError::UnexpectedSuccess { step }) => {
            assert!(
                step.contains(scenario.contract()),
                "Step {step} should name {}",
                scenario.contract()
            );
        }
        other => panic!("❌ Expected an unexpected success, got {other:?}"),
    }
    Ok(())
}

/// Tests the `=+` bug in Token shows up as an accounting mismatch
#[tokio::test]
async fn test_token_assignment_bug() -> TestResult {
    let workshop = setup_vulnerable("Token").await?;

    match run_scenario(&workshop, Scenario::FungibleAccounting).await {
        Err(ScenarioError::Assertion(message)) => {
            assert!(message.contains("holds 2 tokens"), "Unexpected message: {message}");
        }
        other => panic!("❌ Expected an assertion failure, got {other:?}"),
    }
    Ok(())
}

/// Tests the DiscountedBuy rounding bug stops the third purchase
#[tokio::test]
async fn test_discounted_buy_third_purchase() -> TestResult {
    let workshop = setup_vulnerable("DiscountedBuy").await?;

    match run_scenario(&workshop, Scenario::RepeatedPurchase).await {
        Err(ScenarioError::Assertion(message)) => {
            assert!(message.contains("purchase 3"), "Unexpected message: {message}");
        }
        other => panic!("❌ Expected an assertion failure, got {other:?}"),
    }
    Ok(())
}

/// Tests one vulnerable contract fails only its own scenario
#[tokio::test]
async fn test_failures_are_isolated() -> TestResult {
    let workshop = setup_vulnerable("VoteTwoChoices").await?;

    let report = run_all(&workshop).await;
    println!("{report}");

    let failed: Vec<Scenario> = report.failures().map(|r| r.scenario).collect();
    assert_eq!(failed, vec![Scenario::ZeroVoteGuard]);
    assert!(matches!(
        report.outcome_of(Scenario::ZeroVoteGuard),
        Some(Outcome::Failed(reason)) if reason.contains("VoteTwoChoices.vote")
    ));
    Ok(())
}

/// Tests a rejection of the wrong kind is not accepted as a pass
#[tokio::test]
async fn test_wrong_rejection_kind() -> TestResult {
    let result = workshop_harness::scenarios::expect_rejection::<()>(
        "CountContribution.recordContribution",
        Err(workshop_harness::LedgerError::classify(
            "VM Exception while processing transaction: revert",
        )),
        ErrorKind::MethodNotFound,
    );
    match result {
        Err(ScenarioError::WrongRejection {
            expected,
            actual_kind,
            ..
        }) => {
            assert_eq!(expected, ErrorKind::MethodNotFound);
            assert_eq!(actual_kind, ErrorKind::GuardRejected);
        }
        other => panic!("❌ Expected a wrong rejection, got {other:?}"),
    }
    Ok(())
}

/// Tests an underflowed vault balance fails its scenario without stopping the run
#[tokio::test]
async fn test_underflowed_vault_balance() -> TestResult {
    let ledger = UnderflowedVault {
        inner: SimLedger::new(),
    };
    let workshop = Workshop::setup(ledger, &DeploymentPlan::workshop()).await?;
    let scenarios = [
        Scenario::BalanceGuard,
        Scenario::VaultInvariant,
        Scenario::ZeroVoteGuard,
    ];

    let report = run_scenarios(&workshop, &scenarios).await;
    println!("{report}");

    assert_eq!(report.reports.len(), scenarios.len());
    assert!(matches!(
        report.outcome_of(Scenario::VaultInvariant),
        Some(Outcome::Failed(reason)) if reason.contains("no larger withdrawal")
    ));
    assert_eq!(report.outcome_of(Scenario::BalanceGuard), Some(&Outcome::Passed));
    assert_eq!(report.outcome_of(Scenario::ZeroVoteGuard), Some(&Outcome::Passed));
    Ok(())
}
