use std::sync::Arc;

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use deploy_core::core::env::EnvReader;
use eyre::{eyre, Context, Result};

pub const ENV_DEPLOYER_PRIVATE_KEY: &str = "DEPLOYER_PRIVATE_KEY";
pub const ENV_PRIVATE_KEY: &str = "PRIVATE_KEY";

/// Deployer key, loaded lazily so that it is only read when a signer is
/// actually needed and never kept in a config struct.
#[derive(Clone)]
pub struct DeployerCredentials {
    get_private_key_fn: Arc<dyn Fn() -> Option<String> + Send + Sync>,
}

impl DeployerCredentials {
    pub fn new(get_private_key_fn: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            get_private_key_fn: Arc::new(get_private_key_fn),
        }
    }

    /// `DEPLOYER_PRIVATE_KEY`, falling back to `PRIVATE_KEY`.
    pub fn from_env(env: &EnvReader) -> Self {
        let env = env.clone();
        Self::new(move || {
            env.first_of(&[ENV_DEPLOYER_PRIVATE_KEY, ENV_PRIVATE_KEY])
                .ok()
                .flatten()
        })
    }

    pub fn signer(&self) -> Result<PrivateKeySigner> {
        let key = (*self.get_private_key_fn)().ok_or_else(|| {
            eyre!(
                "Neither {} nor {} environment variable is set",
                ENV_DEPLOYER_PRIVATE_KEY,
                ENV_PRIVATE_KEY
            )
        })?;

        key.trim()
            .parse::<PrivateKeySigner>()
            .context("Invalid deployer private key")
    }

    pub fn address(&self) -> Result<Address> {
        Ok(self.signer()?.address())
    }
}

impl std::fmt::Debug for DeployerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployerCredentials")
            .field("get_private_key_fn", &"<hidden>")
            .finish()
    }
}
