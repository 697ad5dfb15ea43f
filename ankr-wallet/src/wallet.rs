//! Wallet operations over the keystore directory and the chain RPC
//!
//! Everything the command line does goes through [`Wallet`], with password
//! and confirmation input supplied by a [`Prompter`].

use ankr_crypto_keystore::{KeyInfo, KeyPair, KeystoreRecord};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::prompt::Prompter;
use crate::rpc_pool::{EndpointSelector, HttpProbe, LivenessProbe, RpcClient, Selection};
use crate::storage::KeystoreStore;
use crate::transaction::{
    self, validate_address, Amount, Currency, Receipt, TransactionBuilder, TransferMsg,
    TransferStage, TxHeader,
};

/// A keystore just written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredKey {
    pub info: KeyInfo,
    pub path: PathBuf,
}

/// Parameters of a transfer, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Keystore name, or a path to a keystore file outside the wallet home
    pub keyfile: String,
    pub to: String,
    pub symbol: String,
    /// Value in the smallest unit of `symbol`
    pub amount: u128,
    pub memo: String,
    /// Overrides the configured gas price
    pub gas_price: Option<u128>,
    /// Overrides the configured transaction version
    pub version: Option<String>,
}

/// A committed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub from: String,
    pub receipt: Receipt,
    pub selection: Selection,
    /// Always [`TransferStage::Confirmed`] for a returned report
    pub stage: TransferStage,
}

pub struct Wallet {
    config: WalletConfig,
    store: KeystoreStore,
}

impl Wallet {
    /// Open the wallet home described by `config`
    pub fn open(config: WalletConfig) -> WalletResult<Self> {
        config.validate()?;
        let store = KeystoreStore::open(config.keystore_dir())?;
        Ok(Self { config, store })
    }

    pub fn store(&self) -> &KeystoreStore {
        &self.store
    }

    fn ensure_name_free(&self, name: &str) -> WalletResult<()> {
        match self.store.find_by_name(name) {
            Ok(_) => Err(WalletError::DuplicateName(name.to_string())),
            Err(WalletError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Generate a key pair and store it encrypted under a new password
    pub fn generate_key(&self, name: &str, prompter: &mut dyn Prompter) -> WalletResult<StoredKey> {
        self.ensure_name_free(name)?;
        let password = prompter.new_password("Keystore password: ")?;

        let key_pair = KeyPair::generate()?;
        let params = self.config.keystore.kdf.params();
        let record = KeystoreRecord::encrypt(name, &key_pair, password.as_bytes(), &params)?;
        let path = self.store.create(&record)?;

        info!("Generated key {} ({})", name, record.address());
        Ok(StoredKey {
            info: record.info(),
            path,
        })
    }

    /// Copy an existing keystore file into the wallet under `name`.
    ///
    /// The file's password must decrypt it. The source file is not modified.
    pub fn import_key(
        &self,
        name: &str,
        keyfile: &Path,
        prompter: &mut dyn Prompter,
    ) -> WalletResult<StoredKey> {
        let bytes = std::fs::read(keyfile)?;
        let record = KeystoreRecord::decode(&bytes)?;
        self.ensure_name_free(name)?;

        let password = prompter.password("Keystore password: ")?;
        record.decrypt(password.as_bytes())?;

        let imported = record.renamed(name);
        let path = self.store.create(&imported)?;

        info!("Imported key {} ({})", name, imported.address());
        Ok(StoredKey {
            info: imported.info(),
            path,
        })
    }

    pub fn list_keys(&self) -> WalletResult<Vec<KeyInfo>> {
        self.store.list()
    }

    /// Delete a keystore after confirmation. Returns the removed file, or
    /// `None` if the user declined.
    pub fn delete_key(
        &self,
        name: &str,
        prompter: &mut dyn Prompter,
    ) -> WalletResult<Option<PathBuf>> {
        self.store.find_by_name(name)?;
        if !prompter.confirm(&format!("About to delete keystore '{}'. Continue?", name))? {
            return Ok(None);
        }
        let path = self.store.delete(name)?;
        info!("Deleted key {}", name);
        Ok(Some(path))
    }

    /// Load a record by name, falling back to a keystore file path
    fn load_record(&self, keyfile: &str) -> WalletResult<KeystoreRecord> {
        match self.store.find_by_name(keyfile) {
            Err(WalletError::NotFound(_)) if Path::new(keyfile).is_file() => {
                let bytes = std::fs::read(keyfile)?;
                Ok(KeystoreRecord::decode(&bytes)?)
            }
            other => other,
        }
    }

    /// Decrypt the named key
    pub fn decrypt(&self, name: &str, prompter: &mut dyn Prompter) -> WalletResult<KeyPair> {
        let record = self.store.find_by_name(name)?;
        let password = prompter.password("Keystore password: ")?;
        Ok(record.decrypt(password.as_bytes())?)
    }

    fn http_selector(&self) -> WalletResult<EndpointSelector<HttpProbe>> {
        let probe = HttpProbe::new(self.config.network.probe_timeout())?;
        Ok(EndpointSelector::new(self.config.network.port, probe))
    }

    /// Sign and submit a transfer. Returns `None` if the user declined.
    pub async fn send_transfer(
        &self,
        request: &TransferRequest,
        prompter: &mut dyn Prompter,
    ) -> WalletResult<Option<TransferReport>> {
        let selector = self.http_selector()?;
        self.send_transfer_with(&selector, request, prompter).await
    }

    /// [`Wallet::send_transfer`] with a caller-supplied endpoint selector
    pub async fn send_transfer_with<P: LivenessProbe>(
        &self,
        selector: &EndpointSelector<P>,
        request: &TransferRequest,
        prompter: &mut dyn Prompter,
    ) -> WalletResult<Option<TransferReport>> {
        let mut stage = TransferStage::Idle;
        let result = self
            .run_transfer(&mut stage, selector, request, prompter)
            .await;
        if let Err(e) = &result {
            warn!("Transfer failed after reaching {:?}: {}", stage, e);
            stage.fail();
        }
        result
    }

    async fn run_transfer<P: LivenessProbe>(
        &self,
        stage: &mut TransferStage,
        selector: &EndpointSelector<P>,
        request: &TransferRequest,
        prompter: &mut dyn Prompter,
    ) -> WalletResult<Option<TransferReport>> {
        validate_address(&request.to)?;
        let (header, message) = self.transfer_parts(request)?;

        let record = self.load_record(&request.keyfile)?;
        stage.advance(TransferStage::KeyLoaded)?;

        let password = prompter.password("Keystore password: ")?;
        let key_pair = record.decrypt(password.as_bytes())?;
        drop(password);
        stage.advance(TransferStage::PasswordVerified)?;

        let question = format!(
            "About to send {} {} from {} to {}. Continue?",
            request.amount,
            request.symbol,
            key_pair.address(),
            request.to
        );
        if !prompter.confirm(&question)? {
            info!("Transfer declined at {:?}", stage);
            return Ok(None);
        }

        let selection = selector.select(&self.config.network.endpoints).await?;
        stage.advance(TransferStage::EndpointSelected)?;

        let envelope = TransactionBuilder::new(header, message).build(&key_pair)?;
        drop(key_pair);
        stage.advance(TransferStage::Signed)?;

        debug!(
            "Submitting {} to {}",
            envelope.tx_hash()?,
            selection.endpoint
        );
        let receipt = transaction::submit(
            &envelope,
            &selection.endpoint,
            self.config.network.rpc_timeout(),
        )
        .await?;
        stage.advance(TransferStage::Submitted)?;
        stage.advance(TransferStage::Confirmed)?;

        info!("Transaction {} committed at height {}", receipt.tx_hash, receipt.height);
        Ok(Some(TransferReport {
            from: envelope.message.from,
            receipt,
            selection,
            stage: *stage,
        }))
    }

    fn transfer_parts(&self, request: &TransferRequest) -> WalletResult<(TxHeader, TransferMsg)> {
        let tx = &self.config.transaction;
        let gas_price = match request.gas_price {
            Some(price) => price,
            None => tx
                .gas_price
                .parse::<u128>()
                .map_err(|e| WalletError::Config(format!("gas_price: {}", e)))?,
        };
        let fee_currency = Currency::new(tx.fee_symbol.clone(), tx.fee_decimals);
        let transfer_currency = if request.symbol == tx.fee_symbol {
            fee_currency.clone()
        } else {
            Currency::new(request.symbol.clone(), 0)
        };

        let header = TxHeader {
            chain_id: tx.chain_id.clone(),
            gas_limit: tx.gas_limit,
            gas_price: Amount::new(fee_currency, gas_price),
            version: request.version.clone().unwrap_or_else(|| tx.version.clone()),
            memo: request.memo.clone(),
        };
        let message = TransferMsg {
            from: String::new(),
            to: request.to.clone(),
            amounts: vec![Amount::new(transfer_currency, request.amount)],
        };
        Ok((header, message))
    }

    /// Balance of `address` in `symbol`, in the smallest unit
    pub async fn balance(&self, address: &str, symbol: &str) -> WalletResult<String> {
        validate_address(address)?;
        let selection = self
            .http_selector()?
            .select(&self.config.network.endpoints)
            .await?;
        let client = RpcClient::new(selection.endpoint, self.config.network.rpc_timeout())?;
        client.query_balance(address, symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfPreset;
    use crate::prompt::ScriptedPrompt;
    use tempfile::TempDir;

    fn wallet(dir: &TempDir) -> Wallet {
        let mut config = WalletConfig::with_home(dir.path());
        config.keystore.kdf = KdfPreset::Light;
        Wallet::open(config).unwrap()
    }

    #[test]
    fn test_generate_list_delete() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);

        let mut prompt = ScriptedPrompt::new().with_password("pw").with_password("pw");
        let stored = wallet.generate_key("alice", &mut prompt).unwrap();
        assert_eq!(stored.info.name, "alice");
        assert!(stored.path.exists());

        let keys = wallet.list_keys().unwrap();
        assert_eq!(keys, vec![stored.info.clone()]);

        let mut decline = ScriptedPrompt::new().with_answer(false);
        assert_eq!(wallet.delete_key("alice", &mut decline).unwrap(), None);
        assert!(stored.path.exists());

        let mut accept = ScriptedPrompt::new().with_answer(true);
        assert_eq!(
            wallet.delete_key("alice", &mut accept).unwrap(),
            Some(stored.path.clone())
        );
        assert!(wallet.list_keys().unwrap().is_empty());
    }

    #[test]
    fn test_generate_duplicate_asks_nothing() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);
        let mut prompt = ScriptedPrompt::new().with_password("pw").with_password("pw");
        wallet.generate_key("alice", &mut prompt).unwrap();

        let mut second = ScriptedPrompt::new().with_password("pw").with_password("pw");
        let result = wallet.generate_key("alice", &mut second);
        assert!(matches!(result, Err(WalletError::DuplicateName(_))));
        assert_eq!(second.remaining_passwords(), 2);
    }

    #[test]
    fn test_generate_password_mismatch() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);
        let mut prompt = ScriptedPrompt::new().with_password("a").with_password("b");
        assert!(matches!(
            wallet.generate_key("alice", &mut prompt),
            Err(WalletError::Prompt(_))
        ));
        assert!(wallet.list_keys().unwrap().is_empty());
    }

    #[test]
    fn test_decrypt() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);
        let mut prompt = ScriptedPrompt::new().with_password("pw").with_password("pw");
        let stored = wallet.generate_key("alice", &mut prompt).unwrap();

        let mut right = ScriptedPrompt::new().with_password("pw");
        let key = wallet.decrypt("alice", &mut right).unwrap();
        assert_eq!(key.address(), stored.info.address);

        let mut wrong = ScriptedPrompt::new().with_password("nope");
        assert!(matches!(
            wallet.decrypt("alice", &mut wrong),
            Err(WalletError::Integrity)
        ));

        let mut unused = ScriptedPrompt::new().with_password("pw");
        assert!(matches!(
            wallet.decrypt("bob", &mut unused),
            Err(WalletError::NotFound(_))
        ));
    }

    #[test]
    fn test_import_requires_password() {
        let source_dir = TempDir::new().unwrap();
        let source = wallet(&source_dir);
        let mut prompt = ScriptedPrompt::new().with_password("pw").with_password("pw");
        let stored = source.generate_key("orig", &mut prompt).unwrap();

        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);

        let mut wrong = ScriptedPrompt::new().with_password("bad");
        assert!(matches!(
            wallet.import_key("copy", &stored.path, &mut wrong),
            Err(WalletError::Integrity)
        ));
        assert!(wallet.list_keys().unwrap().is_empty());

        let mut right = ScriptedPrompt::new().with_password("pw");
        let imported = wallet.import_key("copy", &stored.path, &mut right).unwrap();
        assert_eq!(imported.info.name, "copy");
        assert_eq!(imported.info.address, stored.info.address);
    }

    #[test]
    fn test_transfer_parts_use_config() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);
        let request = TransferRequest {
            keyfile: "alice".to_string(),
            to: "B508ED0D54597D516A680E7951F18CAD24C7EC9F".to_string(),
            symbol: "ANKR".to_string(),
            amount: 5,
            memo: "hi".to_string(),
            gas_price: None,
            version: None,
        };
        let (header, message) = wallet.transfer_parts(&request).unwrap();
        assert_eq!(header.chain_id, "ankr-chain");
        assert_eq!(header.gas_limit, 20_000);
        assert_eq!(header.gas_price.value, 10_000_000_000_000_000);
        assert_eq!(header.version, "1.0");
        assert_eq!(message.amounts[0].currency, Currency::new("ANKR", 18));

        let request = TransferRequest {
            gas_price: Some(7),
            version: Some("2.0".to_string()),
            symbol: "USDT".to_string(),
            ..request
        };
        let (header, message) = wallet.transfer_parts(&request).unwrap();
        assert_eq!(header.gas_price.value, 7);
        assert_eq!(header.version, "2.0");
        assert_eq!(message.amounts[0].currency, Currency::new("USDT", 0));
    }
}
