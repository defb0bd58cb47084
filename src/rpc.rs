use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ethers_core::abi::{Abi, Token};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::{Address, TransactionReceipt, TransactionRequest, U256, U64};
use ethers_providers::{Http, Middleware, Provider, ProviderError};
use serde::Deserialize;

use crate::{
    ContractHandle, ContractInterface, HarnessConfig, HarnessError, LedgerClient, LedgerError,
    TxOptions, TxReceipt,
};

/// Compiled contract as written by the contract toolchain.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub abi: Abi,
    /// Creation bytecode, hex encoded with or without `0x`.
    pub bytecode: String,
}

impl Artifact {
    /// Reads `<dir>/<name>.json`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, HarnessError> {
        let raw = std::fs::read_to_string(dir.join(format!("{name}.json")))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn creation_code(&self) -> Result<Vec<u8>, HarnessError> {
        let code = self.bytecode.trim();
        Ok(hex::decode(code.strip_prefix("0x").unwrap_or(code))?)
    }

    /// Creation code followed by the encoded constructor arguments.
    pub fn deployment_data(&self, args: &[Token]) -> Result<Vec<u8>, HarnessError> {
        let code = self.creation_code()?;
        match &self.abi.constructor {
            Some(constructor) => Ok(constructor.encode_input(code, args)?),
            None if args.is_empty() => Ok(code),
            None => Err(HarnessError::Config(format!(
                "contract takes no constructor arguments but {} were given",
                args.len()
            ))),
        }
    }
}

/// Ledger client backed by an Ethereum JSON-RPC node.
#[derive(Debug, Clone)]
pub struct RpcLedger {
    provider: Provider<Http>,
    config: HarnessConfig,
}

impl RpcLedger {
    pub fn new(config: HarnessConfig) -> Result<Self, HarnessError> {
        config.validate()?;
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| HarnessError::Config(format!("rpc_url {}: {e}", config.rpc_url)))?
            .interval(Duration::from_millis(config.poll_interval_ms));
        Ok(Self { provider, config })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    async fn default_account(&self) -> Result<Address, LedgerError> {
        self.accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Other("node exposes no accounts".to_string()))
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        label: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        let pending = self
            .provider
            .send_transaction(tx, None)
            .await
            .map_err(provider_error)?;
        pending
            .confirmations(self.config.confirmations)
            .await
            .map_err(provider_error)?
            .ok_or_else(|| LedgerError::Other(format!("{label} was dropped before being mined")))
    }

    /// Pre-London nodes omit `effectiveGasPrice`; the transaction's own
    /// `gasPrice` is what was charged there.
    async fn settle(&self, receipt: TransactionReceipt) -> Result<TxReceipt, LedgerError> {
        let gas_price = if receipt.effective_gas_price.is_none() && !is_reverted(&receipt) {
            self.provider
                .get_transaction(receipt.transaction_hash)
                .await
                .map_err(provider_error)?
                .and_then(|tx| tx.gas_price)
        } else {
            None
        };
        into_receipt(receipt, gas_price)
    }
}

fn provider_error(error: ProviderError) -> LedgerError {
    LedgerError::classify(error.to_string())
}

fn harness_error(error: HarnessError) -> LedgerError {
    match error {
        HarnessError::Ledger(inner) => inner,
        other => LedgerError::Other(other.to_string()),
    }
}

/// Converts a mined receipt. `gas_price` stands in for `effectiveGasPrice` on
/// nodes that leave it out of receipts.
pub(crate) fn into_receipt(
    receipt: TransactionReceipt,
    gas_price: Option<U256>,
) -> Result<TxReceipt, LedgerError> {
    if is_reverted(&receipt) {
        return Err(LedgerError::GuardRejected(format!(
            "transaction {:?} mined with status 0 (revert)",
            receipt.transaction_hash
        )));
    }
    let price = receipt.effective_gas_price.or(gas_price).ok_or_else(|| {
        LedgerError::Other(format!(
            "no gas price known for transaction {:?}",
            receipt.transaction_hash
        ))
    })?;
    let fee = receipt.gas_used.unwrap_or_default() * price;
    Ok(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.map(|n| n.as_u64()),
        fee,
    })
}

fn is_reverted(receipt: &TransactionReceipt) -> bool {
    receipt.status == Some(U64::zero())
}

impl LedgerClient for RpcLedger {
    async fn accounts(&self) -> Result<Vec<Address>, LedgerError> {
        self.provider.get_accounts().await.map_err(provider_error)
    }

    async fn deploy(
        &self,
        name: &str,
        args: &[Token],
        from: Address,
    ) -> Result<ContractHandle, LedgerError> {
        let artifact = Artifact::load(&self.config.artifacts_dir, name).map_err(harness_error)?;
        let data = artifact.deployment_data(args).map_err(harness_error)?;
        let tx = TransactionRequest::new().from(from).data(data);

        let receipt = self.submit(tx, &format!("deployment of {name}")).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| {
                LedgerError::Other(format!("deployment of {name} created no contract"))
            })?;
        self.settle(receipt).await?;

        tracing::debug!(contract = name, ?address, "contract mined");
        Ok(ContractHandle::new(
            address,
            Arc::new(ContractInterface::new(name, artifact.abi)),
        ))
    }

    async fn send(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        options: TxOptions,
    ) -> Result<TxReceipt, LedgerError> {
        let data = handle.interface.encode_call(method, args)?;
        let from = match options.from {
            Some(from) => from,
            None => self.default_account().await?,
        };
        let tx = TransactionRequest::new()
            .from(from)
            .to(handle.address)
            .data(data)
            .value(options.value);

        let receipt = self.submit(tx, &format!("{}.{}", handle.name, method)).await?;
        self.settle(receipt).await
    }

    async fn call(
        &self,
        handle: &ContractHandle,
        method: &str,
        args: &[Token],
        from: Option<Address>,
    ) -> Result<Vec<Token>, LedgerError> {
        let data = handle.interface.encode_call(method, args)?;
        let mut tx = TransactionRequest::new().to(handle.address).data(data);
        if let Some(from) = from {
            tx = tx.from(from);
        }
        let tx: TypedTransaction = tx.into();

        let output = self.provider.call(&tx, None).await.map_err(provider_error)?;
        handle.interface.decode_output(method, &output)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(provider_error)
    }
}
