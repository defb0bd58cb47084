use ethers_core::abi::{Abi, Function, Token, parse_abi};

use crate::{HarnessError, LedgerError};

/// Names of the workshop contracts, in deployment order.
pub const WORKSHOP_CONTRACTS: [&str; 8] = [
    "SimpleToken",
    "VoteTwoChoices",
    "BuyToken",
    "Store",
    "CountContribution",
    "Token",
    "DiscountedBuy",
    "VaultInvariant",
];

/// A contract's name together with its external ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractInterface {
    pub name: String,
    pub abi: Abi,
}

impl ContractInterface {
    pub fn new(name: impl Into<String>, abi: Abi) -> Self {
        Self {
            name: name.into(),
            abi,
        }
    }

    /// Builds an interface from human-readable signatures,
    /// e.g. `"function buyToken() payable"`.
    pub fn from_signatures(name: &str, signatures: &[&str]) -> Result<Self, HarnessError> {
        Ok(Self::new(name, parse_abi(signatures)?))
    }

    /// Looks up an external entry point. A missing method is the ledger-level
    /// "is not a function" failure, not a harness bug.
    pub fn function(&self, method: &str) -> Result<&Function, LedgerError> {
        self.abi
            .function(method)
            .map_err(|_| LedgerError::method_not_found(&self.name, method))
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.abi.function(method).is_ok()
    }

    /// ABI-encodes a call to `method`, selector included.
    pub fn encode_call(&self, method: &str, args: &[Token]) -> Result<Vec<u8>, LedgerError> {
        let function = self.function(method)?;
        function.encode_input(args).map_err(|e| {
            LedgerError::Other(format!(
                "invalid arguments for {}.{}: {}",
                self.name, method, e
            ))
        })
    }

    pub fn decode_output(&self, method: &str, data: &[u8]) -> Result<Vec<Token>, LedgerError> {
        let function = self.function(method)?;
        function.decode_output(data).map_err(|e| {
            LedgerError::Other(format!(
                "undecodable output of {}.{}: {}",
                self.name, method, e
            ))
        })
    }

    /// The patched interface of a workshop contract.
    pub fn workshop(name: &str) -> Result<Self, HarnessError> {
        let signatures = workshop_signatures(name)
            .ok_or_else(|| HarnessError::UnknownContract(name.to_string()))?;
        Self::from_signatures(name, signatures)
    }
}

/// External signatures of the patched workshop contracts.
pub fn workshop_signatures(name: &str) -> Option<&'static [&'static str]> {
    let signatures: &'static [&'static str] = match name {
        "SimpleToken" => &[
            "function buyToken() payable",
            "function sendToken(address _recipient, uint256 _amount)",
            "function balances(address) view returns (uint256)",
        ],
        "VoteTwoChoices" => &[
            "function buyVotingRights() payable",
            "function vote(uint256 _nbVotes, bytes32 _proposition)",
            "function votingRights(address) view returns (uint256)",
            "function votesCast(address) view returns (uint256)",
            "function votesReceived(bytes32) view returns (uint256)",
        ],
        "BuyToken" => &[
            "function buyToken(uint256 _amount, uint256 _price) payable",
            "function setPrice(uint256 _price)",
            "function price() view returns (uint256)",
            "function owner() view returns (address)",
            "function balances(address) view returns (uint256)",
        ],
        "Store" => &[
            "function store() payable",
            "function take()",
            "function safes(uint256) view returns (address, uint256)",
        ],
        "CountContribution" => &[
            "function contribute() payable",
            "function contribution(address) view returns (uint256)",
            "function totalContributions() view returns (uint256)",
        ],
        "Token" => &[
            "function buyToken() payable",
            "function sendToken(address _recipient, uint256 _amount)",
            "function sendAllTokens(address _recipient)",
            "function balances(address) view returns (uint256)",
        ],
        "DiscountedBuy" => &[
            "function buy() payable",
            "function price() view returns (uint256)",
            "function basePrice() view returns (uint256)",
            "function objectBought(address) view returns (uint256)",
        ],
        "VaultInvariant" => &[
            "function deposit() payable",
            "function withdraw(uint256 _amount)",
            "function balances(address) view returns (uint256)",
            "function totalBalance() view returns (uint256)",
        ],
        _ => return None,
    };
    Some(signatures)
}

/// Encodes ASCII text as a right-padded `bytes32` argument.
pub fn ascii_to_bytes32(text: &str) -> Result<Token, HarnessError> {
    if !text.is_ascii() {
        return Err(HarnessError::Config(format!("{text:?} is not ascii")));
    }
    let bytes = text.as_bytes();
    if bytes.len() > 32 {
        return Err(HarnessError::Config(format!(
            "{text:?} does not fit in bytes32"
        )));
    }
    let mut word = vec![0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(Token::FixedBytes(word))
}
