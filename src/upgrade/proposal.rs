use std::path::PathBuf;

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deploy_core::core::json_file_async::write_json_to_file_async;
use eyre::{eyre, Context};
use serde::{Deserialize, Serialize};
use volmex_contracts::proxy::ProxyAdminHandle;

/// Upgrade handed to the multisig for approval instead of being executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeProposal {
    pub network: String,
    pub chain_id: u64,
    pub proxy: Address,
    pub proxy_admin: Address,
    pub current_implementation: Address,
    pub new_implementation: Address,
    pub contract: String,
    /// Transaction the multisig executes: `to` is the proxy admin.
    pub calldata: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisig: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl UpgradeProposal {
    pub fn new(
        network: impl Into<String>,
        chain_id: u64,
        proxy: Address,
        proxy_admin: Address,
        current_implementation: Address,
        new_implementation: Address,
        contract: impl Into<String>,
        multisig: Option<Address>,
    ) -> Self {
        Self {
            network: network.into(),
            chain_id,
            proxy,
            proxy_admin,
            current_implementation,
            new_implementation,
            contract: contract.into(),
            calldata: ProxyAdminHandle::upgrade_calldata(proxy, new_implementation),
            multisig,
            created_at: Utc::now(),
        }
    }

    pub fn title(&self) -> String {
        format!("Upgrade {} to {}", self.contract, self.new_implementation)
    }
}

#[async_trait]
pub trait UpgradeProposer {
    /// Publish `proposal` and return where it can be reviewed.
    async fn propose(&self, proposal: &UpgradeProposal) -> eyre::Result<String>;
}

/// Writes the proposal as JSON for offline signing.
pub struct FileProposer {
    path: PathBuf,
}

impl FileProposer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UpgradeProposer for FileProposer {
    async fn propose(&self, proposal: &UpgradeProposal) -> eyre::Result<String> {
        write_json_to_file_async(&self.path, proposal)
            .await
            .with_context(|| format!("Failed to write proposal to {}", self.path.display()))?;
        Ok(self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposalBody<'a> {
    title: String,
    #[serde(flatten)]
    proposal: &'a UpgradeProposal,
}

#[derive(Debug, Clone, Deserialize)]
struct ProposalResponse {
    url: Option<String>,
    #[serde(rename = "proposalId")]
    proposal_id: Option<String>,
}

/// Posts the proposal to a review service, which answers with its URL.
pub struct HttpProposer {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpProposer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl UpgradeProposer for HttpProposer {
    async fn propose(&self, proposal: &UpgradeProposal) -> eyre::Result<String> {
        let body = ProposalBody {
            title: proposal.title(),
            proposal,
        };

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response: ProposalResponse = request
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("Proposal service {} refused the proposal", self.url))?
            .json()
            .await?;

        response
            .url
            .or(response.proposal_id)
            .ok_or_else(|| eyre!("Proposal service returned neither url nor proposalId"))
    }
}

#[cfg(test)]
mod test {
    use alloy::{
        primitives::{address, Address},
        sol_types::SolCall,
    };
    use volmex_contracts::contracts::ProxyAdmin;

    use super::{FileProposer, ProposalBody, UpgradeProposal, UpgradeProposer};

    const PROXY: Address = address!("0x00000000000000000000000000000000000000b1");
    const ADMIN: Address = address!("0x00000000000000000000000000000000000000ad");
    const OLD: Address = address!("0x00000000000000000000000000000000000000c1");
    const NEW: Address = address!("0x00000000000000000000000000000000000000c2");
    const SAFE: Address = address!("0x00000000000000000000000000000000000000ee");

    fn proposal() -> UpgradeProposal {
        UpgradeProposal::new(
            "kovan",
            42,
            PROXY,
            ADMIN,
            OLD,
            NEW,
            "VolmexProtocolV2",
            Some(SAFE),
        )
    }

    #[test]
    fn test_calldata_targets_proxy_and_new_implementation() {
        let decoded = ProxyAdmin::upgradeCall::abi_decode(&proposal().calldata).unwrap();
        assert_eq!(decoded.proxy, PROXY);
        assert_eq!(decoded.implementation, NEW);
    }

    #[test]
    fn test_http_body_is_flat() {
        let proposal = proposal();
        let body = serde_json::to_value(ProposalBody {
            title: proposal.title(),
            proposal: &proposal,
        })
        .unwrap();

        assert_eq!(
            body["title"],
            format!("Upgrade VolmexProtocolV2 to {}", NEW)
        );
        assert_eq!(body["chainId"], 42);
        assert_eq!(
            body["proxyAdmin"].as_str().unwrap().parse::<Address>().unwrap(),
            ADMIN
        );
        assert!(body.get("proposal").is_none());
    }

    #[tokio::test]
    async fn test_file_proposer_writes_proposal() {
        let path = std::env::temp_dir().join(format!(
            "volmex-proposal-{}.json",
            std::process::id()
        ));
        let proposal = proposal();

        let location = FileProposer::new(&path).propose(&proposal).await.unwrap();
        assert_eq!(location, path.display().to_string());

        let written: UpgradeProposal =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, proposal);

        let _ = std::fs::remove_file(&path);
    }
}
