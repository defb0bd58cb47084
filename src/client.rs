use std::sync::Arc;

use ethers_core::abi::Token;
use ethers_core::types::{Address, H256, U256};

use crate::{ContractInterface, LedgerError};

/// Sender and attached value of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// `None` sends from the client's default account.
    pub from: Option<Address>,
    pub value: U256,
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    /// Gas used times effective gas price, in wei.
    pub fee: U256,
}

/// The operations the harness needs from a ledger.
///
/// Implementations classify every provider failure into a [`LedgerError`]
/// before returning it.
#[allow(async_fn_in_trait)]
pub trait LedgerClient {
    /// Funded accounts, in the node's order. The first is the default sender.
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError>;

    /// Deploys contract `name` with constructor `args` and waits for it to be mined.
    async fn deploy(
        &self,
        name: &str,
        args: &[Token],
        from: Address,
    ) -> Result<ContractHandle, LedgerError>;

    /// Submits a state-changing call and resolves once it is confirmed.
    async fn send(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError>;

    /// Runs a read-only call.
    async fn call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>, LedgerError>;

    /// Ether balance of any address, in wei.
    async fn balance(&self, address: Address) -> Result<U256, LedgerError>;
}

/// Reference to a deployed contract instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractHandle {
    pub name: String,
    pub address: Address,
    pub interface: Arc<ContractInterface>,
}

impl ContractHandle {
    pub fn new(address: Address, interface: Arc<ContractInterface>) -> Self {
        Self {
            name: interface.name.clone(),
            address,
            interface,
        }
    }

    /// Starts building an invocation of `method`.
    pub fn method(&self, method: &str, args: Vec<Token>) -> MethodCall<'_> {
        MethodCall {
            handle: self,
            method: method.to_string(),
            args,
            options: TxOptions::default(),
        }
    }
}

/// A pending method invocation, sent as a transaction or run as a query.
#[derive(Debug, Clone)]
pub struct MethodCall<'a> {
    handle: &'a ContractHandle,
    method: String,
    args: Vec<Token>,
    options: TxOptions,
}

impl MethodCall<'_> {
    pub fn from(mut self, sender: Address) -> Self {
        self.options.from = Some(sender);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.options.value = value;
        self
    }

    /// Human-readable label used in logs and failure reports.
    pub fn label(&self) -> String {
        format!("{}.{}", self.handle.name, self.method)
    }

    pub async fn send<C: LedgerClient>(self, client: &C) -> Result<TxReceipt, LedgerError> {
        tracing::debug!(call = %self.label(), value = %self.options.value, "sending transaction");
        client
            .send(self.handle, &self.method, &self.args, self.options)
            .await
    }

    pub async fn call<C: LedgerClient>(self, client: &C) -> Result<Vec<Token>, LedgerError> {
        tracing::debug!(call = %self.label(), "querying");
        client
            .call(self.handle, &self.method, &self.args, self.options.from)
            .await
    }

    /// Runs the query and reads its single `uint256` output.
    pub async fn call_uint<C: LedgerClient>(self, client: &C) -> Result<U256, LedgerError> {
        let label = self.label();
        let output = self.call(client).await?;
        match output.as_slice() {
            [Token::Uint(value)] => Ok(*value),
            other => Err(LedgerError::Other(format!(
                "{label} returned {other:?}, expected a single uint256"
            ))),
        }
    }
}
