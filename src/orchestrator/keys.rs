//! WireGuard key material

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::Stdio,
};

use netcmd::wg::{GENKEY, PUBKEY};
use tokio::{fs::OpenOptions, io::AsyncWriteExt, process::Command};

use super::{Orchestrator, ProvisionError};
use crate::{
    command::{must, CommandResult},
    emulator::Emulator,
};

/// A private key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Keys for one tunnel endpoint
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    /// The only place the private key is persisted
    pub private_key_file: PathBuf,
    pub public_key: String,
}

/// Something that can mint WireGuard keys
#[allow(async_fn_in_trait)]
pub trait KeyTool {
    /// Produce a fresh private key on stdout
    async fn generate_private(&mut self) -> io::Result<CommandResult>;

    /// Derive the public key matching `private_key` on stdout
    async fn derive_public(&mut self, private_key: &str) -> io::Result<CommandResult>;
}

/// Shells out to `wg` on the machine running the lab
#[derive(Debug, Default, Clone, Copy)]
pub struct WgKeyTool;

impl KeyTool for WgKeyTool {
    async fn generate_private(&mut self) -> io::Result<CommandResult> {
        let output = Command::new(GENKEY[0]).args(&GENKEY[1..]).output().await?;
        Ok(output.into())
    }

    async fn derive_public(&mut self, private_key: &str) -> io::Result<CommandResult> {
        let mut child = Command::new(PUBKEY[0])
            .args(&PUBKEY[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Dropping stdin closes it so `wg pubkey` sees EOF
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(private_key.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        Ok(child.wait_with_output().await?.into())
    }
}

/// Persist a private key readable by its owner only
async fn write_private_key(path: &Path, key: &PrivateKey) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    let to_error = |source| ProvisionError::KeyFile {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await
        .map_err(to_error)?;

    // `mode` only applies to new files, so tighten one left over from an earlier run before writing
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(to_error)?;
    file.write_all(format!("{}\n", key.expose()).as_bytes())
        .await
        .map_err(to_error)?;
    file.flush().await.map_err(to_error)
}

impl<E: Emulator> Orchestrator<'_, E> {
    /// Generate a key pair for `host`, writing the private half to `<key_dir>/<host>.private`
    pub async fn generate_keypair<K: KeyTool>(
        &mut self,
        keys: &mut K,
        host: &str,
    ) -> Result<KeyPair, ProvisionError> {
        let to_error = |source| ProvisionError::KeyGeneration {
            host: host.to_owned(),
            source,
        };

        let (private, _) = must(keys.generate_private().await.map_err(ProvisionError::KeyTool)?)
            .map_err(to_error)?;
        let private_key = PrivateKey(private.trim().to_owned());

        let private_key_file = self.key_dir().join(format!("{host}.private"));
        write_private_key(&private_key_file, &private_key).await?;
        log::debug!("Wrote private key for {} to {}", host, private_key_file.display());

        let (public, _) = must(
            keys.derive_public(private_key.expose())
                .await
                .map_err(ProvisionError::KeyTool)?,
        )
        .map_err(to_error)?;

        Ok(KeyPair {
            private_key,
            private_key_file,
            public_key: public.trim().to_owned(),
        })
    }
}
