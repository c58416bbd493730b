use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, Bytes, U256},
    providers::DynProvider,
};
use eyre::{eyre, Context};
use volmex_contracts::{
    artifact::{ArtifactStore, ContractArtifact},
    events::EventDecoder,
    factory::{FactoryVersion, IndexFactoryHandle},
    protocol::{ProtocolParams, ProtocolSnapshot},
    proxy::{admin_of, deploy_proxy},
    util::{deploy_contract, has_code, DeployedContract},
};

use crate::{
    app::config::ContractNames,
    verification::explorer::{ExplorerVerifier, VerificationRequest},
};

/// The factory artifact must declare the registration event of the
/// factory's version. Catches a forced `FACTORY_VERSION` that does not match
/// the artifact.
pub fn check_factory_abi(abi: &JsonAbi, factory: &IndexFactoryHandle) -> eyre::Result<()> {
    EventDecoder::new(abi.clone(), factory.address)
        .selector(factory.version.registration_event())
        .with_context(|| format!("ABI does not describe a {} index factory", factory.version))?;
    Ok(())
}

/// Connection, signer and artifacts shared by every step.
pub struct DeployContext {
    pub provider: DynProvider,
    pub deployer: Address,
    pub network: String,
    pub chain_id: u64,
    pub artifacts: ArtifactStore,
    pub contracts: ContractNames,
    pub verifier: Option<ExplorerVerifier>,
}

impl DeployContext {
    pub fn load(&self, name: &str) -> eyre::Result<ContractArtifact> {
        self.artifacts.load(name)
    }

    pub async fn deploy(
        &self,
        name: &str,
        constructor_args: &[u8],
    ) -> eyre::Result<(ContractArtifact, DeployedContract)> {
        let artifact = self.load(name)?;
        let deployed = deploy_contract(&self.provider, self.deployer, &artifact, constructor_args)
            .await
            .with_context(|| format!("Failed to deploy {}", name))?;
        Ok((artifact, deployed))
    }

    /// Factory ABI generation: forced by configuration, else detected from
    /// the factory's artifact.
    pub fn factory_version(
        &self,
        forced: Option<FactoryVersion>,
        artifact_name: &str,
    ) -> eyre::Result<FactoryVersion> {
        if let Some(version) = forced {
            return Ok(version);
        }
        let artifact = self.load(artifact_name)?;
        let version = FactoryVersion::detect(&artifact.abi).ok_or_else(|| {
            eyre!(
                "Cannot tell the index factory version from {}, set FACTORY_VERSION",
                artifact.path.display()
            )
        })?;
        tracing::info!(%version, "Detected index factory version from {}", artifact_name);
        Ok(version)
    }

    pub async fn attach_factory(
        &self,
        address: Address,
        forced: Option<FactoryVersion>,
        artifact_name: &str,
    ) -> eyre::Result<IndexFactoryHandle> {
        if !has_code(&self.provider, address).await? {
            return Err(eyre!("No contract deployed at factory address {}", address));
        }
        let version = self.factory_version(forced, artifact_name)?;
        let factory = IndexFactoryHandle::new(address, version);
        let artifact = self.load(artifact_name)?;
        check_factory_abi(&artifact.abi, &factory).with_context(|| {
            format!("{} is not the artifact of factory {}", artifact_name, address)
        })?;
        Ok(factory)
    }

    /// Proxy admin for new proxies: `explicit` if given, else the admin of
    /// `proxy`, else a freshly deployed one.
    pub async fn proxy_admin(
        &self,
        explicit: Option<Address>,
        proxy: Option<Address>,
    ) -> eyre::Result<(Address, Option<DeployedContract>)> {
        if let Some(admin) = explicit {
            return Ok((admin, None));
        }

        if let Some(proxy) = proxy {
            let admin = admin_of(&self.provider, proxy).await?;
            if !admin.is_zero() && has_code(&self.provider, admin).await? {
                tracing::info!(proxy_admin = %admin, "Reusing proxy admin of {}", proxy);
                return Ok((admin, None));
            }
        }

        let (_, deployed) = self.deploy(&self.contracts.proxy_admin, &[]).await?;
        Ok((deployed.address, Some(deployed)))
    }

    /// Proxy in front of an already deployed protocol implementation,
    /// initialised with `params`.
    pub async fn deploy_protocol_proxy(
        &self,
        implementation: Address,
        params: &ProtocolParams,
        proxy_admin: Address,
    ) -> eyre::Result<(DeployedContract, Bytes)> {
        let proxy_artifact = self.load(&self.contracts.proxy)?;
        deploy_proxy(
            &self.provider,
            self.deployer,
            &proxy_artifact,
            implementation,
            proxy_admin,
            params.initialize_calldata(),
        )
        .await
        .context("Failed to deploy protocol proxy")
    }

    /// Read the protocol back and compare with what was requested, and check
    /// the registry entry when the factory keys one.
    pub async fn check_deployment(
        &self,
        protocol: Address,
        params: &ProtocolParams,
        registration: Option<(&IndexFactoryHandle, U256)>,
    ) -> eyre::Result<ProtocolSnapshot> {
        let snapshot = ProtocolSnapshot::read(&self.provider, protocol).await?;
        let mismatched = snapshot.mismatches(params);
        if !mismatched.is_empty() {
            return Err(eyre!(
                "Protocol {} does not match requested parameters: {}",
                protocol,
                mismatched.join(", ")
            ));
        }

        if let Some((factory, index_count)) = registration {
            let registered = factory.index_at(&self.provider, index_count).await?;
            if registered != protocol {
                return Err(eyre!(
                    "Factory {} returns {} for index {}, expected {}",
                    factory.address,
                    registered,
                    index_count,
                    protocol
                ));
            }
        }

        tracing::info!(
            %protocol,
            active = snapshot.active,
            volatility_cap_ratio = %snapshot.volatility_cap_ratio,
            minimum_collateral_qty = %snapshot.minimum_collateral_qty,
            "Deployment checked"
        );
        Ok(snapshot)
    }

    /// Submit `name` at `address` for source verification, if a verifier is
    /// configured. Never fails.
    pub async fn verify(&self, name: &str, address: Address, constructor_args: Bytes) -> bool {
        let Some(verifier) = &self.verifier else {
            tracing::debug!("No explorer configured, skipping verification of {}", name);
            return false;
        };

        let request = self.load(name).and_then(|artifact| {
            VerificationRequest::from_artifact(
                &self.artifacts,
                &artifact,
                address,
                constructor_args,
            )
        });

        match request {
            Ok(request) => verifier.verify_best_effort(&request).await,
            Err(err) => {
                tracing::warn!(%address, "Cannot verify {}: {:?}", name, err);
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use alloy::{json_abi::JsonAbi, primitives::address};
    use test_case::test_case;
    use volmex_contracts::factory::{FactoryVersion, IndexFactoryHandle};

    use super::check_factory_abi;

    const V1_EVENTS: &[&str] = &[
        "event IndexCreated(address indexed index, uint256 indexed indexCount)",
        "function createIndex(address,uint256,uint256,string,string) returns (address)",
    ];
    const V3_EVENTS: &[&str] = &[
        "event IndexRegistered(uint256 indexed indexCount, address indexed index)",
        "function registerIndex(address _protocol, string _symbol)",
    ];

    #[test_case(V1_EVENTS, FactoryVersion::V1 => true)]
    #[test_case(V3_EVENTS, FactoryVersion::V3 => true)]
    #[test_case(V3_EVENTS, FactoryVersion::V2 => true; "v2 and v3 share the event")]
    #[test_case(V1_EVENTS, FactoryVersion::V3 => false; "forced version mismatch")]
    #[test_case(V3_EVENTS, FactoryVersion::V1 => false; "registry factory forced to v1")]
    fn test_check_factory_abi(signatures: &[&str], version: FactoryVersion) -> bool {
        let abi = JsonAbi::parse(signatures.iter().copied()).unwrap();
        let factory = IndexFactoryHandle::new(
            address!("0x1111111111111111111122222222222222222222"),
            version,
        );
        check_factory_abi(&abi, &factory).is_ok()
    }
}
