mod helpers;

use helpers::*;
use rstest::rstest;
use workshop_harness::scenarios::{
    access_control_guard, balance_guard, fungible_accounting, nonzero_price_guard,
    overspend_rejected, repeated_purchase, vault_invariant, withdrawal_flow, zero_vote_guard,
    zero_vote_rejected,
};
use workshop_harness::units::ether;
use workshop_harness::{
    LedgerClient, Scenario, Token, U256, run_all, run_scenario, run_scenarios,
};

/// Tests that every scenario passes against the patched contracts
#[tokio::test]
async fn test_run_all_patched() -> TestResult {
    let workshop = setup_workshop().await?;

    let report = run_all(&workshop).await;
    println!("{report}");

    assert!(report.all_passed(), "Patched contracts should pass every scenario:\n{report}");
    assert_eq!(report.reports.len(), Scenario::ALL.len());
    Ok(())
}

/// Tests the default suite leaves the opt-in scenarios out
#[tokio::test]
async fn test_run_all_skips_opt_in() -> TestResult {
    let workshop = setup_workshop().await?;

    let report = run_all(&workshop).await;
    for scenario in Scenario::OPT_IN {
        assert!(!Scenario::ALL.contains(&scenario));
        assert_eq!(report.outcome_of(scenario), None, "{scenario:?} should not run by default");
    }
    Ok(())
}

/// Tests opt-in scenarios run when asked for, after the default suite
#[tokio::test]
async fn test_run_scenarios_with_opt_in() -> TestResult {
    let workshop = setup_workshop().await?;
    let scenarios: Vec<Scenario> = Scenario::ALL.into_iter().chain(Scenario::OPT_IN).collect();

    let report = run_scenarios(&workshop, &scenarios).await;
    println!("{report}");

    assert!(report.all_passed(), "{report}");
    assert_eq!(report.reports.len(), scenarios.len());
    Ok(())
}

/// Tests each scenario on its own deployment
#[rstest]
#[case(Scenario::BalanceGuard)]
#[case(Scenario::ZeroVoteGuard)]
#[case(Scenario::NonzeroPriceGuard)]
#[case(Scenario::WithdrawalFlow)]
#[case(Scenario::AccessControlGuard)]
#[case(Scenario::FungibleAccounting)]
#[case(Scenario::RepeatedPurchase)]
#[case(Scenario::VaultInvariant)]
#[tokio::test]
async fn test_single_scenario(#[case] scenario: Scenario) -> TestResult {
    let workshop = setup_workshop().await?;
    run_scenario(&workshop, scenario).await?;
    Ok(())
}

/// Tests overspending is rejected for several purchases, overspends and account pairs
#[rstest]
#[case(1, 2, 0, 1)]
#[case(2, 4, 0, 1)]
#[case(5, 6, 1, 2)]
#[case(3, 100, 6, 3)]
#[case(2, 3, 4, 4)]
#[tokio::test]
async fn test_overspend_always_rejected(
    #[case] purchase_eth: u64,
    #[case] overspend: u64,
    #[case] sender: usize,
    #[case] recipient: usize,
) -> TestResult {
    let workshop = setup_workshop().await?;
    overspend_rejected(
        &workshop,
        workshop.account(sender)?,
        workshop.account(recipient)?,
        ether(purchase_eth),
        U256::from(overspend),
    )
    .await?;

    // The sender still holds exactly what it bought
    let token = workshop.contract("SimpleToken")?;
    let held = token
        .method("balances", vec![Token::Address(workshop.account(sender)?)])
        .call_uint(workshop.client())
        .await?;
    assert_eq!(held, U256::from(purchase_eth));
    Ok(())
}

/// Tests a non-overspend is reported as a broken precondition, not a pass
#[tokio::test]
async fn test_overspend_precondition() -> TestResult {
    let workshop = setup_workshop().await?;
    let result = overspend_rejected(
        &workshop,
        workshop.account(0)?,
        workshop.account(1)?,
        ether(4),
        U256::from(4),
    )
    .await;
    assert!(result.is_err(), "Sending what was bought is not an overspend");
    Ok(())
}

/// Tests zero votes are rejected whatever the proposition
#[rstest]
#[case("1")]
#[case("0")]
#[case("yes")]
#[case("")]
#[tokio::test]
async fn test_zero_vote_always_rejected(#[case] proposition: &str) -> TestResult {
    let workshop = setup_workshop().await?;
    zero_vote_rejected(&workshop, workshop.account(1)?, proposition).await?;
    Ok(())
}

/// Tests a real vote still goes through after the zero-vote rejection
#[tokio::test]
async fn test_positive_vote_accepted() -> TestResult {
    let workshop = setup_workshop().await?;
    zero_vote_guard(&workshop).await?;

    let vote = workshop.contract("VoteTwoChoices")?;
    let proposition = workshop_harness::ascii_to_bytes32("1")?;
    vote.method("vote", vec![Token::Uint(U256::from(2)), proposition.clone()])
        .send(workshop.client())
        .await?;
    let received = vote
        .method("votesReceived", vec![proposition])
        .call_uint(workshop.client())
        .await?;
    assert_eq!(received, U256::from(2));
    Ok(())
}

/// Tests the BuyToken price stays positive after the guard
#[tokio::test]
async fn test_nonzero_price_keeps_price() -> TestResult {
    let workshop = setup_workshop().await?;
    nonzero_price_guard(&workshop).await?;

    let price = workshop
        .contract("BuyToken")?
        .method("price", vec![])
        .call_uint(workshop.client())
        .await?;
    assert_eq!(price, U256::one());
    Ok(())
}

/// Tests deposit then withdraw returns every wei on the simulated ledger
#[tokio::test]
async fn test_withdrawal_round_trip() -> TestResult {
    let workshop = setup_workshop().await?;
    let depositor = workshop.default_account()?;
    let before = workshop.client().balance(depositor).await?;

    withdrawal_flow(&workshop).await?;

    assert_eq!(workshop.client().balance(depositor).await?, before);
    Ok(())
}

/// Tests the scenarios that need no extra setup from the caller
#[tokio::test]
async fn test_named_scenarios() -> TestResult {
    let workshop = setup_workshop().await?;
    balance_guard(&workshop).await?;
    access_control_guard(&workshop).await?;
    fungible_accounting(&workshop).await?;
    repeated_purchase(&workshop).await?;
    vault_invariant(&workshop).await?;
    Ok(())
}
