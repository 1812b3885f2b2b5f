//! Lookup of compiled contract artifacts
//!
//! Artifacts are read from a Hardhat `artifacts/` directory, where each
//! contract `Name` defined in `contracts/Path.sol` is stored at
//! `contracts/Path.sol/Name.json`, next to a `Name.dbg.json` file pointing at
//! the build info holding the compiler input.

use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    coercion::TypeTag,
    constants::{
        ARTIFACT_EXTENSION, CONTRACTS_ARTIFACTS_DIR, DEBUG_ARTIFACT_SUFFIX,
        UNLINKED_LIBRARY_MARKER,
    },
    errors::DeployError,
};

/// A compiled contract
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    /// The name of the contract
    pub contract_name: String,
    /// The path of the source file defining the contract
    pub source_name: String,
    /// The contract's interface
    pub abi: JsonAbi,
    /// The creation bytecode
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// The fully qualified name of the contract, `<source>:<name>`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }

    /// The declared types of the constructor's parameters
    pub fn constructor_types(&self) -> Result<Vec<TypeTag>, DeployError> {
        self.abi
            .constructor
            .as_ref()
            .map(|constructor| {
                constructor
                    .inputs
                    .iter()
                    .map(|param| TypeTag::from_str(&param.ty))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// The compiler invocation that produced an artifact
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerInput {
    /// The full compiler version, e.g. `0.8.17+commit.8df45f5f`
    pub solc_long_version: String,
    /// The standard JSON compiler input
    pub input: Value,
}

/// A read-only source of compiled contract artifacts
pub trait ArtifactSource {
    /// Load the artifact for a contract name or fully qualified name
    fn load(&self, contract: &str) -> Result<ContractArtifact, DeployError>;

    /// Load the compiler input that produced an artifact
    fn compiler_input(&self, artifact: &ContractArtifact) -> Result<CompilerInput, DeployError>;
}

/// An artifact file as written by Hardhat
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    /// The contract name
    contract_name: String,
    /// The source file path
    source_name: String,
    /// The contract ABI
    abi: JsonAbi,
    /// The hex-encoded creation bytecode
    bytecode: String,
}

/// A debug file pointing at an artifact's build info
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatDebugFile {
    /// The path of the build info, relative to the debug file
    build_info: String,
}

/// A build info file as written by Hardhat
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatBuildInfo {
    /// The full compiler version
    solc_long_version: String,
    /// The standard JSON compiler input
    input: Value,
}

/// Artifacts stored in a Hardhat artifacts directory
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    /// The artifacts root
    root: PathBuf,
}

impl HardhatArtifacts {
    /// Read artifacts from the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the artifact file for a contract
    fn artifact_path(&self, contract: &str) -> Result<PathBuf, DeployError> {
        // A fully qualified name maps directly onto a path
        if let Some((source, name)) = contract.rsplit_once(':') {
            let path = self
                .root
                .join(source)
                .join(format!("{}.{}", name, ARTIFACT_EXTENSION));
            return if path.is_file() {
                Ok(path)
            } else {
                Err(DeployError::ContractNotFound(contract.to_string()))
            };
        }

        let file_name = format!("{}.{}", contract, ARTIFACT_EXTENSION);
        let mut matches = Vec::new();
        find_files(&self.root.join(CONTRACTS_ARTIFACTS_DIR), &file_name, &mut matches)
            .map_err(|e| DeployError::InvalidArtifact(e.to_string()))?;

        match matches.len() {
            0 => Err(DeployError::ContractNotFound(contract.to_string())),
            1 => Ok(matches.remove(0)),
            _ => Err(DeployError::InvalidArtifact(format!(
                "{} artifacts named {}, use the fully qualified name",
                matches.len(),
                contract
            ))),
        }
    }
}

impl ArtifactSource for HardhatArtifacts {
    fn load(&self, contract: &str) -> Result<ContractArtifact, DeployError> {
        let path = self.artifact_path(contract)?;
        debug!(path = %path.display(), "reading artifact");

        let contents =
            fs::read_to_string(&path).map_err(|e| DeployError::InvalidArtifact(e.to_string()))?;
        let artifact: HardhatArtifact = serde_json::from_str(&contents)
            .map_err(|e| DeployError::InvalidArtifact(format!("{}: {}", path.display(), e)))?;

        let bytecode = parse_bytecode(&artifact.contract_name, &artifact.bytecode)?;

        Ok(ContractArtifact {
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode,
        })
    }

    fn compiler_input(&self, artifact: &ContractArtifact) -> Result<CompilerInput, DeployError> {
        let artifact_dir = self.root.join(&artifact.source_name);
        let debug_path =
            artifact_dir.join(format!("{}{}", artifact.contract_name, DEBUG_ARTIFACT_SUFFIX));

        let contents = fs::read_to_string(&debug_path)
            .map_err(|e| DeployError::InvalidArtifact(format!("{}: {}", debug_path.display(), e)))?;
        let debug_file: HardhatDebugFile = serde_json::from_str(&contents)
            .map_err(|e| DeployError::InvalidArtifact(format!("{}: {}", debug_path.display(), e)))?;

        let build_info_path = artifact_dir.join(&debug_file.build_info);
        let contents = fs::read_to_string(&build_info_path).map_err(|e| {
            DeployError::InvalidArtifact(format!("{}: {}", build_info_path.display(), e))
        })?;
        let build_info: HardhatBuildInfo = serde_json::from_str(&contents).map_err(|e| {
            DeployError::InvalidArtifact(format!("{}: {}", build_info_path.display(), e))
        })?;

        Ok(CompilerInput {
            solc_long_version: build_info.solc_long_version,
            input: build_info.input,
        })
    }
}

/// Decode creation bytecode, rejecting unlinked or abstract contracts
fn parse_bytecode(contract: &str, bytecode: &str) -> Result<Bytes, DeployError> {
    if bytecode.contains(UNLINKED_LIBRARY_MARKER) {
        return Err(DeployError::InvalidArtifact(format!(
            "{} references unlinked libraries",
            contract
        )));
    }

    let bytes = Bytes::from_str(bytecode)
        .map_err(|e| DeployError::InvalidArtifact(format!("{}: {}", contract, e)))?;
    if bytes.is_empty() {
        return Err(DeployError::InvalidArtifact(format!(
            "{} has no bytecode, is it abstract or an interface?",
            contract
        )));
    }

    Ok(bytes)
}

/// Recursively collect files named `file_name` under `dir`
fn find_files(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_files(&path, file_name, found)?;
        } else if path.file_name().is_some_and(|name| name == file_name) {
            found.push(path);
        }
    }
    Ok(())
}
