use std::fmt;

use openssl::{
    error::ErrorStack,
    pkey::{Id, PKey, Private, Public},
    rsa::Rsa,
};
use thiserror::Error;

/// 鍵相關操作的錯誤列舉。
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key generation failed: {0}")]
    Generation(ErrorStack),
    #[error("Invalid private key: {0}")]
    InvalidKey(ErrorStack),
    #[error("OpenSSL error: {0}")]
    OpenSSL(#[from] ErrorStack),
    #[error("Unsupported key algorithm, only RSA keys are accepted")]
    UnsupportedAlgorithm,
    #[error("RSA key size {0} is below the 2048-bit minimum")]
    KeyTooSmall(u32),
}

/// 本模組使用的結果類型，當中錯誤皆為 `KeyError`。
type Result<T> = std::result::Result<T, KeyError>;

/// RSA 金鑰對，同時用於 ACME 帳戶金鑰與憑證金鑰。
///
/// `Debug` 輸出只包含位元長度，私鑰內容不會出現在日誌中。
#[derive(Clone)]
pub struct KeyPair {
    /// 私鑰，使用 OpenSSL 的 `PKey` 封裝。
    pub pri_key: PKey<Private>,
    /// 公鑰，從私鑰派生而來。
    pub pub_key: PKey<Public>,
}

impl KeyPair {
    /// 預設的 RSA 金鑰長度。
    pub const DEFAULT_BITS: u32 = 2048;
    /// 允許的最小 RSA 金鑰長度。
    pub const MIN_BITS: u32 = 2048;

    /// 產生指定長度的新 RSA 金鑰對。
    ///
    /// # 錯誤
    ///
    /// 長度不足時回傳 [`KeyError::KeyTooSmall`]；OpenSSL 產生失敗（例如熵不足）時回傳
    /// [`KeyError::Generation`]。
    pub fn generate(bits: u32) -> Result<Self> {
        if bits < Self::MIN_BITS {
            return Err(KeyError::KeyTooSmall(bits));
        }
        let rsa = Rsa::generate(bits).map_err(KeyError::Generation)?;
        let pri_key = PKey::from_rsa(rsa).map_err(KeyError::Generation)?;
        let pub_key = Self::derive_public_key(&pri_key)?;

        Ok(Self { pri_key, pub_key })
    }

    /// 根據 PEM 格式的私鑰資料建立一組金鑰對（PKCS#1 或 PKCS#8 皆可）。
    pub fn from_pem(pri_key_pem: &[u8]) -> Result<Self> {
        let pri_key = PKey::private_key_from_pem(pri_key_pem).map_err(KeyError::InvalidKey)?;
        let pub_key = Self::derive_public_key(&pri_key)?;

        Ok(Self { pri_key, pub_key })
    }

    /// 根據私鑰派生出對應的公鑰。
    fn derive_public_key(pri_key: &PKey<Private>) -> Result<PKey<Public>> {
        match pri_key.id() {
            Id::RSA => {
                let rsa = pri_key.rsa()?;
                let pub_rsa =
                    Rsa::from_public_components(rsa.n().to_owned()?, rsa.e().to_owned()?)?;
                Ok(PKey::from_rsa(pub_rsa)?)
            }
            _ => Err(KeyError::UnsupportedAlgorithm),
        }
    }

    /// 將私鑰輸出為 PKCS#8 PEM。
    pub fn private_key_to_pem(&self) -> Result<Vec<u8>> {
        Ok(self.pri_key.private_key_to_pem_pkcs8()?)
    }

    /// RSA 公開指數 `e` 的大端序位元組，不含前導零。
    pub fn public_exponent(&self) -> Result<Vec<u8>> {
        Ok(self.pub_key.rsa()?.e().to_vec())
    }

    /// RSA 模數 `n` 的大端序位元組，不含前導零。
    pub fn modulus(&self) -> Result<Vec<u8>> {
        Ok(self.pub_key.rsa()?.n().to_vec())
    }

    /// 取得金鑰的位元長度（例如 2048）。
    pub fn bits(&self) -> u32 {
        self.pri_key.bits()
    }

    /// 判斷兩組金鑰是否擁有相同的公鑰。
    pub fn same_public_key(&self, other: &KeyPair) -> bool {
        self.pub_key.public_eq(&other.pub_key)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("alg", &"RSA")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}
