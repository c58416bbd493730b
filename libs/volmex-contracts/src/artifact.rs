use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::{
    json_abi::JsonAbi,
    primitives::{hex, Address, Bytes},
};
use eyre::{eyre, Context, OptionExt};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

/// Hardhat artifact, Foundry artifact and hardhat-deploy deployment file all
/// share this subset of fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    source_name: Option<String>,
    abi: JsonAbi,
    bytecode: Option<RawBytecode>,
    address: Option<Address>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DebugFile {
    build_info: String,
}

/// Compiler output needed to verify a contract on a block explorer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_long_version: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub source_name: Option<String>,
    pub abi: JsonAbi,
    pub bytecode: Option<Bytes>,
    pub address: Option<Address>,
    pub path: PathBuf,
}

impl ContractArtifact {
    pub fn from_json(name: &str, path: PathBuf, json: &[u8]) -> eyre::Result<Self> {
        let raw: RawArtifact = serde_json::from_slice(json)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let bytecode = match raw.bytecode {
            None => None,
            Some(RawBytecode::Hex(code)) | Some(RawBytecode::Object { object: code }) => {
                decode_bytecode(&code)
                    .with_context(|| format!("Invalid bytecode in {}", path.display()))?
            }
        };

        Ok(Self {
            name: raw.contract_name.unwrap_or_else(|| name.to_owned()),
            source_name: raw.source_name,
            abi: raw.abi,
            bytecode,
            address: raw.address,
            path,
        })
    }

    pub fn creation_code(&self) -> eyre::Result<&Bytes> {
        self.bytecode
            .as_ref()
            .ok_or_else(|| eyre!("Artifact {} has no creation bytecode", self.name))
    }

    /// Fully qualified name as compilers and explorers expect it.
    pub fn qualified_name(&self) -> String {
        match &self.source_name {
            Some(source) => format!("{}:{}", source, self.name),
            None => self.name.clone(),
        }
    }
}

fn decode_bytecode(code: &str) -> eyre::Result<Option<Bytes>> {
    let code = code.trim().trim_start_matches("0x");
    if code.is_empty() {
        return Ok(None);
    }
    if code.contains("__$") {
        return Err(eyre!("bytecode has unlinked library placeholders"));
    }
    Ok(Some(Bytes::from(hex::decode(code)?)))
}

/// Lookup of compiled artifacts under a Hardhat `artifacts/` (or Foundry
/// `out/`) directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn find(&self, name: &str) -> eyre::Result<PathBuf> {
        let file_name = format!("{}.json", name);
        let mut stack = vec![self.root.clone()];
        let mut found = Vec::new();

        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("Failed to read artifacts in {}", dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|n| n == "build-info") {
                        continue;
                    }
                    stack.push(path);
                } else if path.file_name().is_some_and(|n| *n == *file_name) {
                    found.push(path);
                }
            }
        }

        found.sort();
        match found.len() {
            0 => Err(eyre!(
                "Artifact {} not found under {}",
                name,
                self.root.display()
            )),
            1 => Ok(found.remove(0)),
            _ => {
                tracing::warn!(
                    "Artifact {} is ambiguous, using {} (candidates: {})",
                    name,
                    found[0].display(),
                    itertools::join(found.iter().map(|p| p.display()), ", ")
                );
                Ok(found.remove(0))
            }
        }
    }

    pub fn load(&self, name: &str) -> eyre::Result<ContractArtifact> {
        let path = self.find(name)?;
        Self::load_path(name, path)
    }

    pub fn load_path(name: &str, path: PathBuf) -> eyre::Result<ContractArtifact> {
        let json = fs::read(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        ContractArtifact::from_json(name, path, &json)
    }

    /// hardhat-deploy record: `deployments/<network>/<name>.json`.
    pub fn load_deployment(
        deployments_dir: &Path,
        network: &str,
        name: &str,
    ) -> eyre::Result<ContractArtifact> {
        let path = deployments_dir
            .join(network)
            .join(format!("{}.json", name));
        let artifact = Self::load_path(name, path)?;
        artifact
            .address
            .ok_or_eyre("Deployment file has no address")?;
        Ok(artifact)
    }

    /// Hardhat keeps the compiler input next to the artifact, referenced
    /// from `<name>.dbg.json`.
    pub fn build_info(&self, artifact: &ContractArtifact) -> eyre::Result<BuildInfo> {
        let dbg_path = artifact.path.with_extension("dbg.json");
        let dbg: DebugFile = serde_json::from_slice(
            &fs::read(&dbg_path)
                .with_context(|| format!("Failed to read {}", dbg_path.display()))?,
        )?;

        let base = dbg_path.parent().unwrap_or(&self.root);
        let build_info_path = base.join(&dbg.build_info);
        let build_info: BuildInfo = serde_json::from_slice(
            &fs::read(&build_info_path)
                .with_context(|| format!("Failed to read {}", build_info_path.display()))?,
        )
        .with_context(|| format!("Failed to parse {}", build_info_path.display()))?;

        Ok(build_info)
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use alloy::primitives::{address, Bytes};
    use test_case::test_case;

    use super::{ArtifactStore, ContractArtifact};

    const HARDHAT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "VolmexProtocol",
        "sourceName": "contracts/protocol/VolmexProtocol.sol",
        "abi": [
            {"type":"function","name":"active","inputs":[],"outputs":[{"name":"","type":"bool","internalType":"bool"}],"stateMutability":"view"}
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080"
    }"#;

    const FOUNDRY: &str = r#"{
        "abi": [],
        "bytecode": {"object": "0x60016002", "linkReferences": {}}
    }"#;

    const DEPLOYMENT: &str = r#"{
        "address": "0x1111111111111111111122222222222222222222",
        "abi": []
    }"#;

    #[test]
    fn test_parse_hardhat_artifact() {
        let artifact = ContractArtifact::from_json(
            "VolmexProtocol",
            PathBuf::from("a.json"),
            HARDHAT.as_bytes(),
        )
        .unwrap();

        assert_eq!(artifact.name, "VolmexProtocol");
        assert_eq!(
            artifact.qualified_name(),
            "contracts/protocol/VolmexProtocol.sol:VolmexProtocol"
        );
        assert_eq!(
            artifact.bytecode,
            Some(Bytes::from(vec![0x60, 0x80, 0x60, 0x40, 0x52]))
        );
        assert!(artifact.abi.function("active").is_some());
    }

    #[test]
    fn test_parse_foundry_artifact() {
        let artifact =
            ContractArtifact::from_json("Token", PathBuf::from("t.json"), FOUNDRY.as_bytes())
                .unwrap();
        assert_eq!(artifact.name, "Token");
        assert_eq!(artifact.qualified_name(), "Token");
        assert_eq!(artifact.creation_code().unwrap().len(), 4);
    }

    #[test]
    fn test_parse_deployment_without_bytecode() {
        let artifact = ContractArtifact::from_json(
            "VolmexIndexFactory",
            PathBuf::from("d.json"),
            DEPLOYMENT.as_bytes(),
        )
        .unwrap();
        assert_eq!(
            artifact.address,
            Some(address!("0x1111111111111111111122222222222222222222"))
        );
        assert!(artifact.creation_code().is_err());
    }

    #[test_case(r#"{"abi": [], "bytecode": "0x"}"# => true; "empty bytecode is interface")]
    #[test_case(r#"{"abi": [], "bytecode": "0x60__$abc$__00"}"# => false; "unlinked library")]
    #[test_case(r#"{"abi": [], "bytecode": "0xzz"}"# => false; "bad hex")]
    fn test_bytecode_edge_cases(json: &str) -> bool {
        ContractArtifact::from_json("X", PathBuf::from("x.json"), json.as_bytes())
            .map(|a| a.bytecode.is_none())
            .unwrap_or(false)
    }

    #[test]
    fn test_store_finds_nested_artifact() {
        let root = std::env::temp_dir().join(format!("volmex-artifacts-{}", std::process::id()));
        let dir = root.join("contracts").join("VolmexProtocol.sol");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("VolmexProtocol.json"), HARDHAT).unwrap();

        let store = ArtifactStore::new(&root);
        let artifact = store.load("VolmexProtocol").unwrap();
        assert_eq!(artifact.source_name.as_deref(), Some("contracts/protocol/VolmexProtocol.sol"));
        assert!(store.load("VolmexIndexFactory").is_err());

        let _ = std::fs::remove_dir_all(&root);
    }
}
