//! Behavioural models of the workshop contracts.
//!
//! Every model is a plain state machine. The ledger runs a method against a
//! clone of the model and keeps the clone only when the method returns `Ok`, so
//! a model may fail at any point without undoing its own writes.

use std::collections::HashMap;

use ethers_core::abi::Token;
use ethers_core::types::{Address, I256, U256};

use crate::units::{ETH, whole_units};
use crate::LedgerError;

/// Which variant of a contract is deployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Build {
    /// The contract with its vulnerability fixed.
    #[default]
    Patched,
    /// The contract as handed out at the start of the workshop.
    Vulnerable,
}

/// Execution context of one call.
#[derive(Debug, Clone, Copy)]
pub struct Env {
    pub sender: Address,
    pub value: U256,
    /// Contract balance, including `value`.
    pub balance: U256,
}

/// What a successful call returns and which ether it sends out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Effects {
    pub output: Vec<Token>,
    pub payouts: Vec<(Address, U256)>,
}

impl Effects {
    fn none() -> Self {
        Self::default()
    }

    fn output(output: Vec<Token>) -> Self {
        Self {
            output,
            payouts: Vec::new(),
        }
    }

    fn uint(value: U256) -> Self {
        Self::output(vec![Token::Uint(value)])
    }

    fn payout(to: Address, amount: U256) -> Self {
        Self {
            output: Vec::new(),
            payouts: vec![(to, amount)],
        }
    }
}

pub(crate) fn revert(reason: &str) -> LedgerError {
    LedgerError::GuardRejected(format!(
        "VM Exception while processing transaction: revert {reason}"
    ))
}

fn require(condition: bool, reason: &str) -> Result<(), LedgerError> {
    if condition { Ok(()) } else { Err(revert(reason)) }
}

fn address_arg(args: &[Token], index: usize) -> Result<Address, LedgerError> {
    match args.get(index) {
        Some(Token::Address(address)) => Ok(*address),
        other => Err(LedgerError::Other(format!(
            "argument {index}: expected address, got {other:?}"
        ))),
    }
}

fn uint_arg(args: &[Token], index: usize) -> Result<U256, LedgerError> {
    match args.get(index) {
        Some(Token::Uint(value)) => Ok(*value),
        other => Err(LedgerError::Other(format!(
            "argument {index}: expected uint256, got {other:?}"
        ))),
    }
}

fn bytes32_arg(args: &[Token], index: usize) -> Result<[u8; 32], LedgerError> {
    match args.get(index) {
        Some(Token::FixedBytes(bytes)) if bytes.len() <= 32 => {
            let mut word = [0u8; 32];
            word[..bytes.len()].copy_from_slice(bytes);
            Ok(word)
        }
        other => Err(LedgerError::Other(format!(
            "argument {index}: expected bytes32, got {other:?}"
        ))),
    }
}

fn get(map: &HashMap<Address, U256>, key: &Address) -> U256 {
    map.get(key).copied().unwrap_or_default()
}

fn credit(
    map: &mut HashMap<Address, U256>,
    key: Address,
    amount: U256,
) -> Result<(), LedgerError> {
    let entry = map.entry(key).or_default();
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| revert("arithmetic overflow"))?;
    Ok(())
}

fn debit(
    map: &mut HashMap<Address, U256>,
    key: Address,
    amount: U256,
) -> Result<(), LedgerError> {
    let entry = map.entry(key).or_default();
    *entry = entry
        .checked_sub(amount)
        .ok_or_else(|| revert("arithmetic underflow"))?;
    Ok(())
}

/// Tokens bought with the attached ether: one per whole ether.
#[derive(Debug, Clone, Default)]
pub struct SimpleToken {
    build: Build,
    balances: HashMap<Address, U256>,
    // Vulnerable build keeps signed balances that go negative on overspend.
    signed_balances: HashMap<Address, i128>,
}

impl SimpleToken {
    pub const NAME: &'static str = "SimpleToken";

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match (method, self.build) {
            ("buyToken", Build::Patched) => {
                credit(&mut self.balances, env.sender, whole_units(env.value))?;
                Ok(Effects::none())
            }
            ("buyToken", Build::Vulnerable) => {
                let units = i128::try_from(whole_units(env.value).low_u128())
                    .map_err(|_| revert("arithmetic overflow"))?;
                let balance = self.signed_balances.entry(env.sender).or_default();
                *balance = balance.wrapping_add(units);
                Ok(Effects::none())
            }
            ("sendToken", Build::Patched) => {
                let recipient = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                require(get(&self.balances, &env.sender) >= amount, "insufficient balance")?;
                debit(&mut self.balances, env.sender, amount)?;
                credit(&mut self.balances, recipient, amount)?;
                Ok(Effects::none())
            }
            ("sendToken", Build::Vulnerable) => {
                let recipient = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?.low_u128() as i128;
                let sender = self.signed_balances.entry(env.sender).or_default();
                *sender = sender.wrapping_sub(amount);
                let receiver = self.signed_balances.entry(recipient).or_default();
                *receiver = receiver.wrapping_add(amount);
                Ok(Effects::none())
            }
            ("balances", Build::Patched) => {
                Ok(Effects::uint(get(&self.balances, &address_arg(args, 0)?)))
            }
            ("balances", Build::Vulnerable) => {
                let balance = self
                    .signed_balances
                    .get(&address_arg(args, 0)?)
                    .copied()
                    .unwrap_or_default();
                Ok(Effects::uint(I256::from(balance).into_raw()))
            }
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Voting rights bought with ether, cast on `bytes32` propositions.
#[derive(Debug, Clone, Default)]
pub struct VoteTwoChoices {
    build: Build,
    voting_rights: HashMap<Address, U256>,
    votes_cast: HashMap<Address, U256>,
    votes_received: HashMap<[u8; 32], U256>,
}

impl VoteTwoChoices {
    pub const NAME: &'static str = "VoteTwoChoices";

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "buyVotingRights" => {
                credit(&mut self.voting_rights, env.sender, whole_units(env.value))?;
                Ok(Effects::none())
            }
            "vote" => {
                let votes = uint_arg(args, 0)?;
                let proposition = bytes32_arg(args, 1)?;
                let cast = get(&self.votes_cast, &env.sender);
                let rights = get(&self.voting_rights, &env.sender);
                match self.build {
                    Build::Patched => {
                        require(!votes.is_zero(), "cannot cast zero votes")?;
                        let total = cast
                            .checked_add(votes)
                            .ok_or_else(|| revert("arithmetic overflow"))?;
                        require(total <= rights, "not enough voting rights")?;
                    }
                    Build::Vulnerable => {
                        let (total, _) = cast.overflowing_add(votes);
                        require(total <= rights, "not enough voting rights")?;
                    }
                }
                let cast_entry = self.votes_cast.entry(env.sender).or_default();
                *cast_entry = cast_entry.overflowing_add(votes).0;
                let received = self.votes_received.entry(proposition).or_default();
                *received = received.overflowing_add(votes).0;
                Ok(Effects::none())
            }
            "votingRights" => Ok(Effects::uint(get(&self.voting_rights, &address_arg(args, 0)?))),
            "votesCast" => Ok(Effects::uint(get(&self.votes_cast, &address_arg(args, 0)?))),
            "votesReceived" => {
                let proposition = bytes32_arg(args, 0)?;
                Ok(Effects::uint(
                    self.votes_received.get(&proposition).copied().unwrap_or_default(),
                ))
            }
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Tokens sold at an owner-controlled price.
#[derive(Debug, Clone)]
pub struct BuyToken {
    build: Build,
    owner: Address,
    price: U256,
    balances: HashMap<Address, U256>,
}

impl BuyToken {
    pub const NAME: &'static str = "BuyToken";

    fn new(build: Build, owner: Address) -> Self {
        Self {
            build,
            owner,
            price: U256::one(),
            balances: HashMap::new(),
        }
    }

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "buyToken" => {
                let amount = uint_arg(args, 0)?;
                let price = uint_arg(args, 1)?;
                require(price >= self.price, "price below the current price")?;
                let cost = match self.build {
                    Build::Patched => {
                        require(!price.is_zero(), "price must be positive")?;
                        price
                            .checked_mul(amount)
                            .and_then(|c| c.checked_mul(U256::from(ETH)))
                            .ok_or_else(|| revert("arithmetic overflow"))?
                    }
                    Build::Vulnerable => {
                        price.overflowing_mul(amount).0.overflowing_mul(U256::from(ETH)).0
                    }
                };
                require(cost <= env.value, "payment too low")?;
                credit(&mut self.balances, env.sender, amount)?;
                Ok(Effects::none())
            }
            "setPrice" => {
                let price = uint_arg(args, 0)?;
                require(env.sender == self.owner, "caller is not the owner")?;
                if self.build == Build::Patched {
                    require(!price.is_zero(), "price must be positive")?;
                }
                self.price = price;
                Ok(Effects::none())
            }
            "price" => Ok(Effects::uint(self.price)),
            "owner" => Ok(Effects::output(vec![Token::Address(self.owner)])),
            "balances" => Ok(Effects::uint(get(&self.balances, &address_arg(args, 0)?))),
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Safes holding deposited ether until their owner takes it back.
#[derive(Debug, Clone, Default)]
pub struct Store {
    safes: Vec<(Address, U256)>,
}

impl Store {
    pub const NAME: &'static str = "Store";

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "store" => {
                self.safes.push((env.sender, env.value));
                Ok(Effects::none())
            }
            "take" => {
                let mut effects = Effects::none();
                for (owner, amount) in self.safes.iter_mut() {
                    if *owner == env.sender && !amount.is_zero() {
                        effects.payouts.push((env.sender, *amount));
                        *amount = U256::zero();
                    }
                }
                Ok(effects)
            }
            "safes" => {
                let index = uint_arg(args, 0)?;
                let (owner, amount) = (index < U256::from(self.safes.len()))
                    .then(|| self.safes[index.as_usize()])
                    .ok_or_else(|| revert("safe index out of bounds"))?;
                Ok(Effects::output(vec![Token::Address(owner), Token::Uint(amount)]))
            }
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Records ether contributions per account.
#[derive(Debug, Clone)]
pub struct CountContribution {
    build: Build,
    contribution: HashMap<Address, U256>,
    total_contributions: U256,
}

impl CountContribution {
    pub const NAME: &'static str = "CountContribution";

    fn new(build: Build, owner: Address) -> Self {
        let mut contract = Self {
            build,
            contribution: HashMap::new(),
            total_contributions: U256::zero(),
        };
        contract.record(owner, U256::from(ETH));
        contract
    }

    fn record(&mut self, user: Address, amount: U256) {
        let entry = self.contribution.entry(user).or_default();
        *entry = entry.saturating_add(amount);
        self.total_contributions = self.total_contributions.saturating_add(amount);
    }

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "contribute" => {
                self.record(env.sender, env.value);
                Ok(Effects::none())
            }
            "recordContribution" if self.build == Build::Vulnerable => {
                let user = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                self.record(user, amount);
                Ok(Effects::none())
            }
            "contribution" => Ok(Effects::uint(get(&self.contribution, &address_arg(args, 0)?))),
            "totalContributions" => Ok(Effects::uint(self.total_contributions)),
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Fungible token, one unit per whole ether paid.
#[derive(Debug, Clone, Default)]
pub struct FungibleToken {
    build: Build,
    balances: HashMap<Address, U256>,
}

impl FungibleToken {
    pub const NAME: &'static str = "Token";

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "buyToken" => {
                credit(&mut self.balances, env.sender, whole_units(env.value))?;
                Ok(Effects::none())
            }
            "sendToken" => {
                let recipient = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                let balance = get(&self.balances, &env.sender);
                match self.build {
                    Build::Patched => require(balance >= amount, "insufficient balance")?,
                    Build::Vulnerable => require(!balance.is_zero(), "empty balance")?,
                }
                self.balances.insert(env.sender, balance.overflowing_sub(amount).0);
                credit(&mut self.balances, recipient, amount)?;
                Ok(Effects::none())
            }
            "sendAllTokens" => {
                let recipient = address_arg(args, 0)?;
                let amount = get(&self.balances, &env.sender);
                match self.build {
                    Build::Patched => {
                        self.balances.insert(env.sender, U256::zero());
                        credit(&mut self.balances, recipient, amount)?;
                    }
                    // `balances[_recipient] =+ balances[msg.sender]`
                    Build::Vulnerable => {
                        self.balances.insert(recipient, amount);
                        self.balances.insert(env.sender, U256::zero());
                    }
                }
                Ok(Effects::none())
            }
            "balances" => Ok(Effects::uint(get(&self.balances, &address_arg(args, 0)?))),
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Objects sold at `basePrice / (1 + already bought)`.
#[derive(Debug, Clone, Default)]
pub struct DiscountedBuy {
    build: Build,
    object_bought: HashMap<Address, U256>,
}

impl DiscountedBuy {
    pub const NAME: &'static str = "DiscountedBuy";

    fn base_price() -> U256 {
        U256::from(ETH)
    }

    fn price_for(&self, buyer: &Address) -> U256 {
        Self::base_price() / (U256::one() + get(&self.object_bought, buyer))
    }

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "buy" => {
                let bought = get(&self.object_bought, &env.sender);
                match self.build {
                    Build::Patched => {
                        require(env.value == self.price_for(&env.sender), "wrong payment")?
                    }
                    Build::Vulnerable => require(
                        env.value.overflowing_mul(U256::one() + bought).0 == Self::base_price(),
                        "wrong payment",
                    )?,
                }
                credit(&mut self.object_bought, env.sender, U256::one())?;
                Ok(Effects::none())
            }
            "price" => Ok(Effects::uint(self.price_for(&env.sender))),
            "basePrice" => Ok(Effects::uint(Self::base_price())),
            "objectBought" => Ok(Effects::uint(get(&self.object_bought, &address_arg(args, 0)?))),
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// Ether vault whose book total must never exceed what it holds.
#[derive(Debug, Clone, Default)]
pub struct VaultInvariant {
    balances: HashMap<Address, U256>,
    total_balance: U256,
}

impl VaultInvariant {
    pub const NAME: &'static str = "VaultInvariant";

    fn execute(&mut self, method: &str, args: &[Token], env: &Env) -> Result<Effects, LedgerError> {
        match method {
            "deposit" => {
                credit(&mut self.balances, env.sender, env.value)?;
                self.total_balance = self
                    .total_balance
                    .checked_add(env.value)
                    .ok_or_else(|| revert("arithmetic overflow"))?;
                Ok(Effects::none())
            }
            "withdraw" => {
                let amount = uint_arg(args, 0)?;
                require(get(&self.balances, &env.sender) >= amount, "insufficient balance")?;
                debit(&mut self.balances, env.sender, amount)?;
                self.total_balance = self
                    .total_balance
                    .checked_sub(amount)
                    .ok_or_else(|| revert("arithmetic underflow"))?;
                require(
                    env.balance.saturating_sub(amount) >= self.total_balance,
                    "vault invariant broken",
                )?;
                Ok(Effects::payout(env.sender, amount))
            }
            "balances" => Ok(Effects::uint(get(&self.balances, &address_arg(args, 0)?))),
            "totalBalance" => Ok(Effects::uint(self.total_balance)),
            _ => Err(LedgerError::method_not_found(Self::NAME, method)),
        }
    }
}

/// A deployed model of one of the workshop contracts.
#[derive(Debug, Clone)]
pub enum Model {
    SimpleToken(SimpleToken),
    VoteTwoChoices(VoteTwoChoices),
    BuyToken(BuyToken),
    Store(Store),
    CountContribution(CountContribution),
    Token(FungibleToken),
    DiscountedBuy(DiscountedBuy),
    VaultInvariant(VaultInvariant),
}

impl Model {
    /// Runs the constructor of contract `name`.
    pub fn instantiate(name: &str, build: Build, deployer: Address) -> Result<Self, LedgerError> {
        let model = match name {
            SimpleToken::NAME => Model::SimpleToken(SimpleToken {
                build,
                ..Default::default()
            }),
            VoteTwoChoices::NAME => Model::VoteTwoChoices(VoteTwoChoices {
                build,
                ..Default::default()
            }),
            BuyToken::NAME => Model::BuyToken(BuyToken::new(build, deployer)),
            CountContribution::NAME => {
                Model::CountContribution(CountContribution::new(build, deployer))
            }
            FungibleToken::NAME => Model::Token(FungibleToken {
                build,
                ..Default::default()
            }),
            DiscountedBuy::NAME => Model::DiscountedBuy(DiscountedBuy {
                build,
                ..Default::default()
            }),
            Store::NAME | VaultInvariant::NAME if build == Build::Vulnerable => {
                return Err(LedgerError::Other(format!(
                    "no vulnerable build of {name} is available"
                )));
            }
            Store::NAME => Model::Store(Store::default()),
            VaultInvariant::NAME => Model::VaultInvariant(VaultInvariant::default()),
            _ => {
                return Err(LedgerError::Other(format!(
                    "no artifact for contract {name}"
                )));
            }
        };
        Ok(model)
    }

    /// External signatures beyond the patched interface.
    pub fn extra_signatures(name: &str, build: Build) -> &'static [&'static str] {
        match (name, build) {
            (CountContribution::NAME, Build::Vulnerable) => {
                &["function recordContribution(address _user, uint256 _amount)"]
            }
            _ => &[],
        }
    }

    pub fn execute(
        &mut self,
        method: &str,
        args: &[Token],
        env: &Env,
    ) -> Result<Effects, LedgerError> {
        match self {
            Model::SimpleToken(contract) => contract.execute(method, args, env),
            Model::VoteTwoChoices(contract) => contract.execute(method, args, env),
            Model::BuyToken(contract) => contract.execute(method, args, env),
            Model::Store(contract) => contract.execute(method, args, env),
            Model::CountContribution(contract) => contract.execute(method, args, env),
            Model::Token(contract) => contract.execute(method, args, env),
            Model::DiscountedBuy(contract) => contract.execute(method, args, env),
            Model::VaultInvariant(contract) => contract.execute(method, args, env),
        }
    }
}
