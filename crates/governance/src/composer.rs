//! Turns named contract calls into the parallel arrays a multisig proposal is made of.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::Function,
    primitives::{Address, Bytes, U256},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{GovernanceError, GovernanceResult};

/// Deployed contracts by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deployments(BTreeMap<String, Address>);

impl Deployments {
    /// Registers `name` at `address`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) {
        self.0.insert(name.into(), address);
    }

    /// Address of the contract deployed as `name`.
    pub fn address(&self, name: &str) -> GovernanceResult<Address> {
        self.0
            .get(name)
            .copied()
            .ok_or_else(|| GovernanceError::UnknownContract(name.to_string()))
    }

    /// Names of the known contracts.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<(S, Address)> for Deployments {
    fn from_iter<T: IntoIterator<Item = (S, Address)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, address)| (name.into(), address))
                .collect(),
        )
    }
}

/// One call of a governance batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalStep {
    /// Name of the target contract in the [`Deployments`].
    pub contract: String,

    /// Solidity signature of the function, e.g. `setDependencies(address,address)`.
    pub signature: String,

    /// Comma separated arguments. Arrays and tuples are written in brackets and parentheses,
    /// strings may be quoted.
    #[serde(default)]
    pub args: String,

    /// CELO sent along with the call.
    #[serde(default)]
    pub value: U256,
}

impl ProposalStep {
    /// A call carrying no value.
    pub fn new(
        contract: impl Into<String>,
        signature: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            contract: contract.into(),
            signature: signature.into(),
            args: args.into(),
            value: U256::ZERO,
        }
    }

    /// Sends `value` along with the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// The three parallel arrays submitted as one multisig proposal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposalBatch {
    /// Call targets.
    pub destinations: Vec<Address>,

    /// Value sent with each call.
    pub values: Vec<U256>,

    /// ABI-encoded call data.
    pub payloads: Vec<Bytes>,
}

impl ProposalBatch {
    /// Number of calls in the batch.
    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    /// Whether the batch has no calls.
    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    fn push(&mut self, destination: Address, value: U256, payload: Bytes) {
        self.destinations.push(destination);
        self.values.push(value);
        self.payloads.push(payload);
    }
}

/// Steps read from a TOML batch file:
///
/// ```toml
/// [[steps]]
/// contract = "Manager"
/// signature = "upgradeTo(address)"
/// args = "0x1111111111111111111111111111111111111111"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFile {
    /// Steps in execution order.
    #[serde(default)]
    pub steps: Vec<ProposalStep>,
}

impl BatchFile {
    /// Parses a batch from TOML.
    pub fn parse(raw: &str) -> GovernanceResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads and parses the batch file at `path`.
    pub fn load(path: impl AsRef<Path>) -> GovernanceResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| GovernanceError::BatchFile {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw)
    }
}

/// Splits a comma separated argument list. Commas inside brackets, parentheses or quotes do not
/// split. An empty or blank list has no arguments.
pub fn split_args(csv: &str) -> GovernanceResult<Vec<String>> {
    if csv.trim().is_empty() {
        return Ok(Vec::new());
    }

    let malformed = || GovernanceError::MalformedArguments(csv.to_string());

    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in csv.chars() {
        match (quote, c) {
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.checked_sub(1).ok_or_else(malformed)?,
            (None, ',') if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if depth != 0 || quote.is_some() {
        return Err(malformed());
    }
    args.push(current.trim().to_string());

    Ok(args)
}

fn unquote(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));

    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// ABI-encodes a call to `signature` with the given comma separated arguments, selector
/// included.
pub fn encode_function(signature: &str, args: &str) -> GovernanceResult<Bytes> {
    let function = Function::parse(signature).map_err(|err| GovernanceError::InvalidSignature {
        signature: signature.to_string(),
        reason: err.to_string(),
    })?;

    let args = split_args(args)?;
    if args.len() != function.inputs.len() {
        return Err(GovernanceError::ArgumentCount {
            signature: signature.to_string(),
            expected: function.inputs.len(),
            found: args.len(),
        });
    }

    let values = function
        .inputs
        .iter()
        .zip(&args)
        .enumerate()
        .map(|(index, (param, arg))| {
            let ty: DynSolType =
                param
                    .resolve()
                    .map_err(|err| GovernanceError::InvalidSignature {
                        signature: signature.to_string(),
                        reason: err.to_string(),
                    })?;
            let raw = match ty {
                DynSolType::String => unquote(arg),
                _ => arg.as_str(),
            };

            ty.coerce_str(raw)
                .map_err(|err| GovernanceError::InvalidArgument {
                    index,
                    ty: ty.sol_type_name().into_owned(),
                    value: arg.clone(),
                    reason: err.to_string(),
                })
        })
        .collect::<GovernanceResult<Vec<DynSolValue>>>()?;

    let encoded = function
        .abi_encode_input(&values)
        .map_err(|err| GovernanceError::Encode {
            signature: signature.to_string(),
            reason: err.to_string(),
        })?;

    Ok(encoded.into())
}

/// Encodes a call to `signature` on the contract deployed as `contract`.
///
/// The contract must be known even though only the call data is returned.
pub fn encode_call(
    deployments: &Deployments,
    contract: &str,
    signature: &str,
    args: &str,
) -> GovernanceResult<Bytes> {
    deployments.address(contract)?;
    encode_function(signature, args)
}

/// Encodes `steps` into a proposal batch, keeping their order.
///
/// Fails on the first step that names an unknown contract or does not encode; no step is skipped.
pub fn compose_batch(
    deployments: &Deployments,
    steps: &[ProposalStep],
) -> GovernanceResult<ProposalBatch> {
    let mut batch = ProposalBatch::default();
    for step in steps {
        let destination = deployments.address(&step.contract)?;
        let payload = encode_function(&step.signature, &step.args)?;
        debug!(contract = %step.contract, signature = %step.signature, %destination, "composed step");

        batch.push(destination, step.value, payload);
    }

    Ok(batch)
}

/// Points a proxy at a new implementation.
pub fn upgrade_to(contract: impl Into<String>, implementation: Address) -> ProposalStep {
    ProposalStep::new(contract, "upgradeTo(address)", implementation.to_string())
}

/// Calls a single-argument setter.
pub fn set_parameter(
    contract: impl Into<String>,
    signature: impl Into<String>,
    value: impl fmt::Display,
) -> ProposalStep {
    ProposalStep::new(contract, signature, value.to_string())
}

/// Wires the addresses of the contracts named in `dependencies` into `contract`, in the order the
/// setter takes them.
pub fn set_dependencies(
    deployments: &Deployments,
    contract: impl Into<String>,
    signature: impl Into<String>,
    dependencies: &[&str],
) -> GovernanceResult<ProposalStep> {
    let args = dependencies
        .iter()
        .map(|name| deployments.address(name).map(|address| address.to_string()))
        .collect::<GovernanceResult<Vec<_>>>()?
        .join(",");

    Ok(ProposalStep::new(contract, signature, args))
}

#[cfg(test)]
mod tests {
    use alloy::{sol, sol_types::SolCall};

    use super::*;

    sol! {
        function upgradeTo(address newImplementation);
        function setDependencies(address account, address stakedCelo, address vote);
        function setAllowedToVote(address[] groups, bool allowed);
        function setName(string name, uint256 version);
        function pause();
    }

    fn deployments() -> Deployments {
        [
            ("Manager", Address::repeat_byte(0x11)),
            ("Account", Address::repeat_byte(0x22)),
            ("StakedCelo", Address::repeat_byte(0x33)),
            ("Vote", Address::repeat_byte(0x44)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn splits_nested_and_quoted_arguments() {
        assert!(split_args("").unwrap().is_empty());
        assert!(split_args("   ").unwrap().is_empty());
        assert_eq!(
            split_args(r#"[0x1, 0x2], "a, b", (1,[2,3]) ,7"#).unwrap(),
            vec!["[0x1, 0x2]", r#""a, b""#, "(1,[2,3])", "7"]
        );
        assert!(split_args("[1,2").is_err());
        assert!(split_args("1],2").is_err());
        assert!(split_args("\"open").is_err());
    }

    #[test]
    fn encodes_like_the_abi() {
        let implementation = Address::repeat_byte(0xab);
        let encoded = encode_function("upgradeTo(address)", &implementation.to_string()).unwrap();

        let expected = upgradeToCall {
            newImplementation: implementation,
        }
        .abi_encode();
        assert_eq!(encoded.to_vec(), expected);
    }

    #[test]
    fn encodes_arrays_strings_and_empty_calls() {
        let groups = vec![Address::repeat_byte(1), Address::repeat_byte(2)];
        let encoded = encode_function(
            "setAllowedToVote(address[],bool)",
            &format!("[{}, {}], true", groups[0], groups[1]),
        )
        .unwrap();
        assert_eq!(
            encoded.to_vec(),
            setAllowedToVoteCall {
                groups,
                allowed: true
            }
            .abi_encode()
        );

        let encoded = encode_function("setName(string,uint256)", r#""staked, celo", 2"#).unwrap();
        assert_eq!(
            encoded.to_vec(),
            setNameCall {
                name: "staked, celo".to_string(),
                version: U256::from(2),
            }
            .abi_encode()
        );

        let encoded = encode_function("pause()", "").unwrap();
        assert_eq!(encoded.to_vec(), pauseCall {}.abi_encode());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            encode_function("not a signature", ""),
            Err(GovernanceError::InvalidSignature { .. })
        ));
        assert!(matches!(
            encode_function("upgradeTo(address)", ""),
            Err(GovernanceError::ArgumentCount {
                expected: 1,
                found: 0,
                ..
            })
        ));
        assert!(matches!(
            encode_function("upgradeTo(address)", "nope"),
            Err(GovernanceError::InvalidArgument { index: 0, .. })
        ));
    }

    #[test]
    fn unknown_contract_is_an_error() {
        let err = encode_call(&deployments(), "Missing", "pause()", "").unwrap_err();
        assert!(matches!(err, GovernanceError::UnknownContract(name) if name == "Missing"));

        let steps = [
            ProposalStep::new("Manager", "pause()", ""),
            ProposalStep::new("Missing", "pause()", ""),
        ];
        assert!(compose_batch(&deployments(), &steps).is_err());
    }

    #[test]
    fn batch_keeps_step_order() {
        let deployments = deployments();
        let implementation = Address::repeat_byte(0xee);
        let steps = vec![
            upgrade_to("Account", implementation),
            set_dependencies(
                &deployments,
                "Manager",
                "setDependencies(address,address,address)",
                &["Account", "StakedCelo", "Vote"],
            )
            .unwrap(),
            set_parameter("Vote", "pause()", "").with_value(U256::from(3)),
        ];

        let batch = compose_batch(&deployments, &steps).unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(
            batch.destinations,
            vec![
                Address::repeat_byte(0x22),
                Address::repeat_byte(0x11),
                Address::repeat_byte(0x44)
            ]
        );
        assert_eq!(batch.values, vec![U256::ZERO, U256::ZERO, U256::from(3)]);
        assert_eq!(
            batch.payloads[1].to_vec(),
            setDependenciesCall {
                account: Address::repeat_byte(0x22),
                stakedCelo: Address::repeat_byte(0x33),
                vote: Address::repeat_byte(0x44),
            }
            .abi_encode()
        );
    }

    #[test]
    fn batch_file_from_toml() {
        let raw = r#"
            [[steps]]
            contract = "Manager"
            signature = "upgradeTo(address)"
            args = "0x1111111111111111111111111111111111111111"

            [[steps]]
            contract = "Vote"
            signature = "pause()"
        "#;

        let batch = BatchFile::parse(raw);
        assert!(
            batch.is_ok(),
            "must be able to deserialize batch but got: {}",
            batch.unwrap_err()
        );

        let batch = batch.unwrap();
        assert_eq!(batch.steps.len(), 2);
        assert_eq!(batch.steps[1].args, "");
        assert_eq!(batch.steps[1].value, U256::ZERO);

        let composed = compose_batch(&deployments(), &batch.steps).unwrap();
        assert_eq!(composed.len(), 2);
    }
}
