//! External signer integration.
//!
//! The wallet capability is an external command (hardware wallet
//! bridge, browser extension relay, or a test stub). It receives the
//! transaction spec as JSON on stdin and prints the submission result
//! as JSON on stdout. A non-zero exit is a user rejection.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use mintflow_protocols::{SignedSubmission, TransactionSpec, WalletCapability, WalletError};

use crate::config::WalletConfig;

/// Wallet capability backed by an external signer command.
pub struct CommandWallet {
    command: String,
    timeout: Duration,
}

impl CommandWallet {
    pub fn new(config: &WalletConfig) -> Self {
        Self {
            command: config.signer_command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl WalletCapability for CommandWallet {
    async fn sign_and_send(&self, spec: TransactionSpec) -> Result<SignedSubmission, WalletError> {
        let payload = serde_json::to_vec(&spec)
            .map_err(|e| WalletError::Unavailable(format!("failed to encode spec: {}", e)))?;

        debug!("Invoking signer: {}", self.command);
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WalletError::Unavailable(format!("{}: {}", self.command, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| WalletError::Unavailable("signer stdin unavailable".to_string()))?;
        stdin
            .write_all(&payload)
            .await
            .map_err(|e| WalletError::Unavailable(format!("failed to write to signer: {}", e)))?;
        drop(stdin);

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| WalletError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| WalletError::Unavailable(format!("signer failed: {}", e)))?;

        if !output.status.success() {
            return Err(WalletError::Rejected);
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| WalletError::Unavailable(format!("unreadable signer output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn spec() -> TransactionSpec {
        TransactionSpec::VoucherClaim {
            recipient: "0xabc".into(),
            amount: 1500,
            nonce: "n-1".into(),
            deadline: Utc::now(),
            signature: "sig".into(),
        }
    }

    fn wallet(command: &str, timeout_secs: u64) -> CommandWallet {
        CommandWallet::new(&WalletConfig {
            signer_command: command.to_string(),
            timeout_secs,
        })
    }

    #[tokio::test]
    async fn test_successful_signer() {
        let wallet = wallet(
            r#"cat > /dev/null; echo '{"status":"success","tx_id":"0xfeed"}'"#,
            5,
        );
        let submission = wallet.sign_and_send(spec()).await.unwrap();
        assert_eq!(submission.usable_tx_id(), Some("0xfeed"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_rejection() {
        let wallet = wallet("cat > /dev/null; exit 1", 5);
        let err = wallet.sign_and_send(spec()).await.unwrap_err();
        assert!(matches!(err, WalletError::Rejected));
    }

    #[tokio::test]
    async fn test_garbage_output_is_unavailable() {
        let wallet = wallet("cat > /dev/null; echo not-json", 5);
        let err = wallet.sign_and_send(spec()).await.unwrap_err();
        assert!(matches!(err, WalletError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_signer_times_out() {
        let wallet = wallet("cat > /dev/null; sleep 10", 1);
        let err = wallet.sign_and_send(spec()).await.unwrap_err();
        assert!(matches!(err, WalletError::Timeout(1)));
    }
}
