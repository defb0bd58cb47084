//! The vulnerability checks, one per workshop contract.
//!
//! Each scenario drives its contract through the [`Workshop`] context and
//! returns `Ok(())` when the contract behaves like its patched version. They
//! assume a fresh deployment: the accounting checks compare against literal
//! totals.
//!
//! [`Scenario::ALL`] is the default suite. The vault check exercises an
//! interface the workshop tests never call, so it only runs when asked for
//! through [`run_scenarios`].

use ethers_core::abi::Token;
use ethers_core::types::{Address, U256};

use crate::units::{ether, whole_units};
use crate::{
    ErrorKind, LedgerClient, LedgerError, Outcome, ScenarioError, SuiteReport, Workshop,
    ascii_to_bytes32,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    BalanceGuard,
    ZeroVoteGuard,
    NonzeroPriceGuard,
    WithdrawalFlow,
    AccessControlGuard,
    FungibleAccounting,
    RepeatedPurchase,
    VaultInvariant,
}

impl Scenario {
    /// The default suite, in execution order.
    pub const ALL: [Scenario; 7] = [
        Scenario::BalanceGuard,
        Scenario::ZeroVoteGuard,
        Scenario::NonzeroPriceGuard,
        Scenario::WithdrawalFlow,
        Scenario::AccessControlGuard,
        Scenario::FungibleAccounting,
        Scenario::RepeatedPurchase,
    ];

    /// Scenarios left out of the default suite. They assume a contract
    /// interface that deployed artifacts may not have.
    pub const OPT_IN: [Scenario; 1] = [Scenario::VaultInvariant];

    /// The contract the scenario targets.
    pub fn contract(&self) -> &'static str {
        match self {
            Scenario::BalanceGuard => "SimpleToken",
            Scenario::ZeroVoteGuard => "VoteTwoChoices",
            Scenario::NonzeroPriceGuard => "BuyToken",
            Scenario::WithdrawalFlow => "Store",
            Scenario::AccessControlGuard => "CountContribution",
            Scenario::FungibleAccounting => "Token",
            Scenario::RepeatedPurchase => "DiscountedBuy",
            Scenario::VaultInvariant => "VaultInvariant",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::BalanceGuard => "should have a zero or positive balance (SimpleToken)",
            Scenario::ZeroVoteGuard => "should not cast 0 votes (VoteTwoChoices)",
            Scenario::NonzeroPriceGuard => "should not have price 0 (BuyToken)",
            Scenario::WithdrawalFlow => "should withdraw from safe (Store)",
            Scenario::AccessControlGuard => {
                "should not be possible to call recordContribution (CountContribution)"
            }
            Scenario::FungibleAccounting => "should keep token accounting exact (Token)",
            Scenario::RepeatedPurchase => "should buy more than 3 times (DiscountedBuy)",
            Scenario::VaultInvariant => "should return deposits in full (VaultInvariant)",
        }
    }
}

/// Runs one scenario.
pub async fn run_scenario<C: LedgerClient>(
    workshop: &Workshop<C>,
    scenario: Scenario,
) -> Result<(), ScenarioError> {
    match scenario {
        Scenario::BalanceGuard => balance_guard(workshop).await,
        Scenario::ZeroVoteGuard => zero_vote_guard(workshop).await,
        Scenario::NonzeroPriceGuard => nonzero_price_guard(workshop).await,
        Scenario::WithdrawalFlow => withdrawal_flow(workshop).await,
        Scenario::AccessControlGuard => access_control_guard(workshop).await,
        Scenario::FungibleAccounting => fungible_accounting(workshop).await,
        Scenario::RepeatedPurchase => repeated_purchase(workshop).await,
        Scenario::VaultInvariant => vault_invariant(workshop).await,
    }
}

/// Runs the default suite in order. A failing scenario doesn't stop the others.
pub async fn run_all<C: LedgerClient>(workshop: &Workshop<C>) -> SuiteReport {
    run_scenarios(workshop, &Scenario::ALL).await
}

/// Runs `scenarios` in the given order, each to completion.
pub async fn run_scenarios<C: LedgerClient>(
    workshop: &Workshop<C>,
    scenarios: &[Scenario],
) -> SuiteReport {
    let mut report = SuiteReport::default();
    for &scenario in scenarios {
        let outcome = match run_scenario(workshop, scenario).await {
            Ok(()) => {
                tracing::info!(scenario = ?scenario, "scenario passed");
                Outcome::Passed
            }
            Err(e) => {
                tracing::warn!(scenario = ?scenario, error = %e, "scenario failed");
                Outcome::Failed(e.to_string())
            }
        };
        report.push(scenario, outcome);
    }
    report
}

fn uint(value: impl Into<U256>) -> Token {
    Token::Uint(value.into())
}

/// Passes when `result` is a rejection of the `expected` kind.
pub fn expect_rejection<T>(
    step: &str,
    result: Result<T, LedgerError>,
    expected: ErrorKind,
) -> Result<(), ScenarioError> {
    match result {
        Ok(_) => Err(ScenarioError::UnexpectedSuccess {
            step: step.to_string(),
        }),
        Err(e) if e.kind() == expected => {
            tracing::debug!(step, error = %e, "rejected as expected");
            Ok(())
        }
        Err(e) => Err(ScenarioError::WrongRejection {
            step: step.to_string(),
            expected,
            actual_kind: e.kind(),
            actual: e,
        }),
    }
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioError> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioError::Assertion(message()))
    }
}

/// Buys SimpleToken with 2 ether, then tries to send 4 tokens to `accounts[1]`.
pub async fn balance_guard<C: LedgerClient>(workshop: &Workshop<C>) -> Result<(), ScenarioError> {
    overspend_rejected(
        workshop,
        workshop.default_account()?,
        workshop.account(1)?,
        ether(2),
        U256::from(4),
    )
    .await
}

/// Buys SimpleToken from `sender` with `payment`, then tries to send
/// `overspend` tokens to `recipient`. `overspend` must exceed what the sender
/// holds after the purchase.
pub async fn overspend_rejected<C: LedgerClient>(
    workshop: &Workshop<C>,
    sender: Address,
    recipient: Address,
    payment: U256,
    overspend: U256,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let token = workshop.contract("SimpleToken")?;

    token
        .method("buyToken", vec![])
        .from(sender)
        .value(payment)
        .send(client)
        .await?;
    let held = token
        .method("balances", vec![Token::Address(sender)])
        .call_uint(client)
        .await?;
    ensure(overspend > held, || {
        format!("sender holds {held} tokens, {overspend} is not an overspend")
    })?;

    let result = token
        .method("sendToken", vec![Token::Address(recipient), uint(overspend)])
        .from(sender)
        .send(client)
        .await;
    expect_rejection("SimpleToken.sendToken", result, ErrorKind::GuardRejected)
}

/// Buys voting rights with 2 ether, then tries to cast zero votes.
pub async fn zero_vote_guard<C: LedgerClient>(workshop: &Workshop<C>) -> Result<(), ScenarioError> {
    zero_vote_rejected(workshop, workshop.default_account()?, "1").await
}

/// Buys voting rights from `voter`, then tries to cast zero votes on `proposition`.
pub async fn zero_vote_rejected<C: LedgerClient>(
    workshop: &Workshop<C>,
    voter: Address,
    proposition: &str,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let vote = workshop.contract("VoteTwoChoices")?;

    vote.method("buyVotingRights", vec![])
        .from(voter)
        .value(ether(2))
        .send(client)
        .await?;

    let result = vote
        .method("vote", vec![uint(0), ascii_to_bytes32(proposition)?])
        .from(voter)
        .send(client)
        .await;
    expect_rejection("VoteTwoChoices.vote", result, ErrorKind::GuardRejected)
}

/// Sets the BuyToken price to 0, then buys at that price without paying.
/// Either step may be rejected; both succeeding means tokens were given away.
pub async fn nonzero_price_guard<C: LedgerClient>(
    workshop: &Workshop<C>,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let buy_token = workshop.contract("BuyToken")?;
    let owner = workshop.default_account()?;

    let result = match buy_token
        .method("setPrice", vec![uint(0)])
        .from(owner)
        .send(client)
        .await
    {
        Ok(_) => {
            buy_token
                .method("buyToken", vec![uint(100_000_000_000_000u64), uint(0)])
                .from(owner)
                .value(U256::zero())
                .send(client)
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Err(ScenarioError::UnexpectedSuccess {
            step: "BuyToken.buyToken at price 0".to_string(),
        }),
        Err(e) if e.kind() == ErrorKind::MethodNotFound => Err(ScenarioError::WrongRejection {
            step: "BuyToken".to_string(),
            expected: ErrorKind::GuardRejected,
            actual_kind: e.kind(),
            actual: e,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "zero price rejected");
            Ok(())
        }
    }
}

/// Stores 1 ether in a safe and takes it back. Afterwards the contract holds
/// what it held before and the depositor lost only the fees.
pub async fn withdrawal_flow<C: LedgerClient>(workshop: &Workshop<C>) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let store = workshop.contract("Store")?;
    let depositor = workshop.default_account()?;

    let contract_before = client.balance(store.address).await?;
    let depositor_before = client.balance(depositor).await?;

    let stored = store
        .method("store", vec![])
        .from(depositor)
        .value(ether(1))
        .send(client)
        .await?;
    let taken = store.method("take", vec![]).from(depositor).send(client).await?;

    let contract_after = client.balance(store.address).await?;
    let depositor_after = client.balance(depositor).await?;
    let fees = stored.fee + taken.fee;

    ensure(contract_after == contract_before, || {
        format!("Store holds {contract_after} wei after take, held {contract_before} before")
    })?;
    ensure(depositor_after + fees == depositor_before, || {
        format!(
            "depositor went from {depositor_before} to {depositor_after} wei \
             with {fees} wei of fees"
        )
    })
}

/// Calls `recordContribution` directly; it must not be an external entry point.
pub async fn access_control_guard<C: LedgerClient>(
    workshop: &Workshop<C>,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let count = workshop.contract("CountContribution")?;
    let caller = workshop.default_account()?;

    let result = count
        .method(
            "recordContribution",
            vec![Token::Address(caller), uint(1_000_000_000_000_000u64)],
        )
        .from(caller)
        .send(client)
        .await;
    expect_rejection(
        "CountContribution.recordContribution",
        result,
        ErrorKind::MethodNotFound,
    )
}

/// `accounts[2]` and `accounts[3]` buy with 2 ether each, then `accounts[3]`
/// sends everything to `accounts[2]`, which must end up with 4 tokens.
pub async fn fungible_accounting<C: LedgerClient>(
    workshop: &Workshop<C>,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let token = workshop.contract("Token")?;
    let recipient = workshop.account(2)?;
    let sender = workshop.account(3)?;
    let payment = ether(2);

    for buyer in [recipient, sender] {
        token
            .method("buyToken", vec![])
            .from(buyer)
            .value(payment)
            .send(client)
            .await?;
    }
    token
        .method("sendAllTokens", vec![Token::Address(recipient)])
        .from(sender)
        .send(client)
        .await?;

    let expected = whole_units(payment) * 2;
    let balance = token
        .method("balances", vec![Token::Address(recipient)])
        .call_uint(client)
        .await?;
    ensure(balance == expected, || {
        format!("recipient holds {balance} tokens, expected {expected}")
    })
}

/// `accounts[4]` buys four DiscountedBuy objects, paying the quoted price
/// each time.
pub async fn repeated_purchase<C: LedgerClient>(
    workshop: &Workshop<C>,
) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let shop = workshop.contract("DiscountedBuy")?;
    let buyer = workshop.account(4)?;
    let purchases = 4u64;

    for purchase in 1..=purchases {
        let price = shop
            .method("price", vec![])
            .from(buyer)
            .call_uint(client)
            .await?;
        shop.method("buy", vec![])
            .from(buyer)
            .value(price)
            .send(client)
            .await
            .map_err(|e| {
                ScenarioError::Assertion(format!("purchase {purchase} at {price} wei failed: {e}"))
            })?;
    }

    let bought = shop
        .method("objectBought", vec![Token::Address(buyer)])
        .call_uint(client)
        .await?;
    ensure(bought == U256::from(purchases), || {
        format!("buyer owns {bought} objects after {purchases} purchases")
    })
}

/// `accounts[5]` deposits 1 ether into the vault and withdraws it. Booked and
/// held balances must both return to where they started, and withdrawing more
/// than the deposit must be rejected.
pub async fn vault_invariant<C: LedgerClient>(workshop: &Workshop<C>) -> Result<(), ScenarioError> {
    let client = workshop.client();
    let vault = workshop.contract("VaultInvariant")?;
    let owner = workshop.account(5)?;
    let amount = ether(1);

    let held_before = client.balance(vault.address).await?;
    let total_before = vault.method("totalBalance", vec![]).call_uint(client).await?;
    let booked_before = vault
        .method("balances", vec![Token::Address(owner)])
        .call_uint(client)
        .await?;

    vault
        .method("deposit", vec![])
        .from(owner)
        .value(amount)
        .send(client)
        .await?;
    let overdraw_amount = booked_before
        .checked_add(amount)
        .and_then(|booked| booked.checked_add(U256::one()))
        .ok_or_else(|| {
            ScenarioError::Assertion(format!(
                "owner is booked {booked_before} wei, no larger withdrawal exists"
            ))
        })?;
    let overdraw = vault
        .method("withdraw", vec![uint(overdraw_amount)])
        .from(owner)
        .send(client)
        .await;
    expect_rejection("VaultInvariant.withdraw overdraw", overdraw, ErrorKind::GuardRejected)?;
    vault
        .method("withdraw", vec![uint(amount)])
        .from(owner)
        .send(client)
        .await?;

    let held_after = client.balance(vault.address).await?;
    let total_after = vault.method("totalBalance", vec![]).call_uint(client).await?;
    let booked_after = vault
        .method("balances", vec![Token::Address(owner)])
        .call_uint(client)
        .await?;

    ensure(booked_after == booked_before, || {
        format!("owner is booked {booked_after} wei, was {booked_before}")
    })?;
    ensure(total_after == total_before, || {
        format!("vault books {total_after} wei in total, was {total_before}")
    })?;
    ensure(held_after == held_before, || {
        format!("vault holds {held_after} wei, held {held_before}")
    })
}
