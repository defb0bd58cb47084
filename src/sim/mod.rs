//! In-process ledger running behavioural models of the workshop contracts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use ethers_core::abi::{StateMutability, Token};
use ethers_core::types::{Address, H256, U256};

use crate::interface::workshop_signatures;
use crate::units::ether;
use crate::{
    ContractHandle, ContractInterface, LedgerClient, LedgerError, TxOptions, TxReceipt,
};

pub mod models;

pub use models::Build;
use models::{Env, Model, revert};

pub const DEFAULT_ACCOUNTS: usize = 10;
pub const DEFAULT_FUNDING_ETH: u64 = 100;

const ACCOUNT_BASE: u64 = 0x1000;
const CONTRACT_BASE: u64 = 0xc0de_0000;

#[derive(Debug)]
struct Instance {
    model: Model,
    balance: U256,
}

#[derive(Debug, Default)]
struct World {
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    contracts: HashMap<Address, Instance>,
    deployed: u64,
    block: u64,
}

impl World {
    fn next_block(&mut self) -> (H256, u64) {
        self.block += 1;
        (H256::from_low_u64_be(self.block), self.block)
    }

    fn receipt(&mut self) -> TxReceipt {
        let (tx_hash, block_number) = self.next_block();
        TxReceipt {
            tx_hash,
            block_number: Some(block_number),
            fee: U256::zero(),
        }
    }

    fn sender(&self, from: Option<Address>) -> Result<Address, LedgerError> {
        match from {
            Some(from) => Ok(from),
            None => self
                .accounts
                .first()
                .copied()
                .ok_or_else(|| LedgerError::Other("ledger has no accounts".to_string())),
        }
    }
}

/// Deterministic ledger for exercising the harness without a node.
///
/// Rejected transactions leave every balance and contract state untouched,
/// and transactions cost no gas.
#[derive(Debug)]
pub struct SimLedger {
    world: Mutex<World>,
    builds: HashMap<String, Build>,
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLedger {
    /// Ten accounts funded with 100 ether each, every contract patched.
    pub fn new() -> Self {
        Self::with_accounts(DEFAULT_ACCOUNTS, ether(DEFAULT_FUNDING_ETH))
    }

    pub fn with_accounts(count: usize, funding: U256) -> Self {
        let accounts: Vec<Address> = (0..count as u64)
            .map(|i| Address::from_low_u64_be(ACCOUNT_BASE + i))
            .collect();
        let balances = accounts.iter().map(|account| (*account, funding)).collect();
        Self {
            world: Mutex::new(World {
                accounts,
                balances,
                ..Default::default()
            }),
            builds: HashMap::new(),
        }
    }

    /// Selects the build deployed for `contract` from now on.
    pub fn with_build(mut self, contract: &str, build: Build) -> Self {
        self.builds.insert(contract.to_string(), build);
        self
    }

    pub fn build_of(&self, contract: &str) -> Build {
        self.builds.get(contract).copied().unwrap_or_default()
    }

    fn world(&self) -> Result<MutexGuard<'_, World>, LedgerError> {
        self.world
            .lock()
            .map_err(|_| LedgerError::Other("simulated ledger state is poisoned".to_string()))
    }

    fn interface(name: &str, build: Build) -> Result<ContractInterface, LedgerError> {
        let mut signatures: Vec<&str> = workshop_signatures(name)
            .ok_or_else(|| LedgerError::Other(format!("no artifact for contract {name}")))?
            .to_vec();
        signatures.extend_from_slice(Model::extra_signatures(name, build));
        ContractInterface::from_signatures(name, &signatures)
            .map_err(|e| LedgerError::Other(e.to_string()))
    }

    // Checks the call against the handle's interface the way a client library
    // would before anything reaches the ledger.
    fn check_call(
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        value: U256,
    ) -> Result<(), LedgerError> {
        let function = handle.interface.function(method)?;
        handle.interface.encode_call(method, args)?;
        if !value.is_zero() && function.state_mutability != StateMutability::Payable {
            return Err(revert(&format!("{method} is not payable")));
        }
        Ok(())
    }
}

impl LedgerClient for SimLedger {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.world()?.accounts.clone())
    }

    async fn deploy(
        &self,
        name: &str,
        args: &[Token],
        from: Address,
    ) -> Result<ContractHandle, LedgerError> {
        if !args.is_empty() {
            return Err(LedgerError::Other(format!(
                "{name} takes no constructor arguments but {} were given",
                args.len()
            )));
        }
        let build = self.build_of(name);
        let interface = Self::interface(name, build)?;
        let model = Model::instantiate(name, build, from)?;

        let mut world = self.world()?;
        world.deployed += 1;
        let address = Address::from_low_u64_be(CONTRACT_BASE + world.deployed);
        world.contracts.insert(
            address,
            Instance {
                model,
                balance: U256::zero(),
            },
        );
        world.next_block();

        tracing::debug!(contract = name, ?build, ?address, "simulated contract deployed");
        Ok(ContractHandle::new(address, Arc::new(interface)))
    }

    async fn send(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError> {
        Self::check_call(handle, method, args, options.value)?;

        let mut world = self.world()?;
        let sender = world.sender(options.from)?;
        let funds = world.balances.get(&sender).copied().unwrap_or_default();
        if funds < options.value {
            return Err(LedgerError::Other(format!(
                "sender {sender:?} doesn't have enough funds to send tx"
            )));
        }

        let instance = world.contracts.get(&handle.address).ok_or_else(|| {
            LedgerError::Other(format!("no contract deployed at {:?}", handle.address))
        })?;
        let mut model = instance.model.clone();
        let held = instance.balance + options.value;
        let env = Env {
            sender,
            value: options.value,
            balance: held,
        };
        let effects = model.execute(method, args, &env)?;

        let paid = effects
            .payouts
            .iter()
            .fold(U256::zero(), |total, (_, amount)| total.saturating_add(*amount));
        if paid > held {
            return Err(revert("contract balance too low for transfer"));
        }

        // Commit.
        world.balances.insert(sender, funds - options.value);
        if let Some(instance) = world.contracts.get_mut(&handle.address) {
            instance.model = model;
            instance.balance = held - paid;
        }
        for (to, amount) in effects.payouts {
            let balance = world.balances.entry(to).or_default();
            *balance = balance.saturating_add(amount);
        }
        Ok(world.receipt())
    }

    async fn call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>, LedgerError> {
        Self::check_call(handle, method, args, U256::zero())?;

        let world = self.world()?;
        let sender = world.sender(from)?;
        let instance = world.contracts.get(&handle.address).ok_or_else(|| {
            LedgerError::Other(format!("no contract deployed at {:?}", handle.address))
        })?;
        let env = Env {
            sender,
            value: U256::zero(),
            balance: instance.balance,
        };
        Ok(instance.model.clone().execute(method, args, &env)?.output)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        let world = self.world()?;
        Ok(match world.contracts.get(&address) {
            Some(instance) => instance.balance,
            None => world.balances.get(&address).copied().unwrap_or_default(),
        })
    }
}
