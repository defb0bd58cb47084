//! # Workshop Harness
//!
//! Deploys the hacking workshop contracts and checks each of them for the
//! vulnerability it was written to demonstrate. Scenarios run against any
//! [`LedgerClient`]: a JSON-RPC node through [`RpcLedger`] or the in-process
//! [`SimLedger`].

pub mod client;
pub mod config;
pub mod context;
pub mod deploy;
pub mod error;
pub mod interface;
pub mod report;
pub mod rpc;
pub mod scenarios;
pub mod sim;
pub mod units;


pub use client::{ContractHandle, LedgerClient, MethodCall, TxOptions, TxReceipt};
pub use config::HarnessConfig;
pub use context::Workshop;
pub use deploy::{Deployment, DeploymentPlan, deploy_all};
pub use error::{ErrorKind, HarnessError, LedgerError, ScenarioError};
pub use interface::{ContractInterface, ascii_to_bytes32};
pub use report::{Outcome, ScenarioReport, SuiteReport};
pub use rpc::RpcLedger;
pub use scenarios::{Scenario, run_all, run_scenario, run_scenarios};
pub use sim::{Build, SimLedger};
pub use units::{ETH, ether};

pub use ethers_core::abi::Token;
pub use ethers_core::types::{Address, U256};
