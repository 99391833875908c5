use openssl::base64::{decode_block, encode_block};
use thiserror::Error;

/// 錯誤類型，用於描述 Base64 解碼過程中的各種錯誤情形。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// 當遇到無效字符時返回此錯誤，包含該無效字符的 ASCII 值。
    #[error("Invalid character: {0}")]
    InvalidCharacter(u8),

    /// 當 Base64 字符串的填充（`=`）不符合規範時返回此錯誤。
    #[error("Invalid padding")]
    InvalidPadding,

    /// 當 Base64 字符串的長度不符合要求（必須是 4 的倍數）時返回此錯誤。
    #[error("Invalid length")]
    InvalidLength,

    /// OpenSSL 無法解碼內容。
    #[error("Malformed base64 input")]
    Malformed,
}

/// PEM 內容每行的字元數。
pub const PEM_LINE_WIDTH: usize = 64;

/// 以標準 Base64 形式保存編碼結果，並可輸出 ACME 使用的 URL 安全格式。
///
/// 編碼與解碼交給 OpenSSL，本結構只負責字母表轉換與填充處理。
///
/// # 示例
///
/// ```
/// use racme_dns::base64::Base64;
///
/// let b64 = Base64::new("Hello, World!");
/// assert_eq!(b64.as_str(), "SGVsbG8sIFdvcmxkIQ==");
/// assert_eq!(b64.base64_url(), "SGVsbG8sIFdvcmxkIQ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64 {
    encoded: String,
}

impl Base64 {
    /// 根據輸入數據生成 Base64 編碼。
    ///
    /// 接受任何可轉換為字節切片的類型（例如 `&str`、`String` 或 `Vec<u8>`）。
    pub fn new<T: AsRef<[u8]>>(input: T) -> Self {
        Self {
            encoded: encode_block(input.as_ref()),
        }
    }

    /// 根據已編碼的標準 Base64 字符串生成 `Base64` 實例，並進行基礎驗證。
    ///
    /// # 錯誤
    ///
    /// 可能返回 [`DecodeError::InvalidLength`], [`DecodeError::InvalidCharacter`] 或
    /// [`DecodeError::InvalidPadding`] 之一。
    pub fn from_encoded(encoded: &str) -> Result<Self, DecodeError> {
        validate_base64(encoded)?;
        Ok(Self {
            encoded: encoded.to_string(),
        })
    }

    /// 從 URL 安全格式（`-`、`_`，無填充）的字符串生成 `Base64` 實例。
    ///
    /// # 錯誤
    ///
    /// 同 [`from_encoded`](Self::from_encoded)。
    pub fn from_url(url_encoded: &str) -> Result<Self, DecodeError> {
        if let Some(c) = url_encoded.bytes().find(|b| *b == b'+' || *b == b'/') {
            return Err(DecodeError::InvalidCharacter(c));
        }
        let mut encoded = url_encoded.replace('-', "+").replace('_', "/");
        let mod4 = encoded.len() % 4;
        if mod4 != 0 {
            encoded.push_str(&"=".repeat(4 - mod4));
        }
        Self::from_encoded(&encoded)
    }

    /// 將當前 Base64 編碼的數據解碼為原始二進制數據。
    pub fn decode(&self) -> Result<Vec<u8>, DecodeError> {
        decode_block(&self.encoded).map_err(|_| DecodeError::Malformed)
    }

    /// 轉換為 URL 安全且不含填充的 Base64 字符串，這是 ACME 協議的標準格式。
    pub fn base64_url(&self) -> String {
        self.encoded
            .replace('+', "-")
            .replace('/', "_")
            .replace('=', "")
    }

    /// 返回內部存儲的標準 Base64 編碼字符串的引用。
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// 以 64 字元換行並包上 `-----BEGIN {label}-----` 與 `-----END {label}-----`。
    ///
    /// 輸出以換行結尾，可直接與其他 PEM 區塊串接。
    pub fn to_pem(&self, label: &str) -> String {
        let mut pem = format!("-----BEGIN {}-----\n", label);
        for line in self.encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
            // 標準 Base64 字母表皆為 ASCII
            pem.push_str(&String::from_utf8_lossy(line));
            pem.push('\n');
        }
        pem.push_str(&format!("-----END {}-----\n", label));
        pem
    }
}

/// 直接取得輸入的 URL 安全 Base64 表示。
pub fn base64_url<T: AsRef<[u8]>>(input: T) -> String {
    Base64::new(input).base64_url()
}

/// 驗證給定字符串是否符合標準 Base64 格式要求。
fn validate_base64(s: &str) -> Result<(), DecodeError> {
    if s.len() % 4 != 0 {
        return Err(DecodeError::InvalidLength);
    }

    let bytes = s.as_bytes();
    let mut padding_start = None;

    for (i, &c) in bytes.iter().enumerate() {
        if c == b'=' {
            if padding_start.is_none() {
                padding_start = Some(i);
            }
            if i < bytes.len() - 2 {
                return Err(DecodeError::InvalidPadding);
            }
        } else if padding_start.is_some() {
            return Err(DecodeError::InvalidPadding);
        } else if !c.is_ascii_alphanumeric() && c != b'+' && c != b'/' {
            return Err(DecodeError::InvalidCharacter(c));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_encoding() {
        let base64 = Base64::new("Hello, World!");
        assert_eq!(base64.as_str(), "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(base64.base64_url(), "SGVsbG8sIFdvcmxkIQ");
    }

    #[test]
    fn test_url_alphabet_and_no_padding() {
        let input = vec![0xFB, 0xFF, 0xBF, 0x01];
        let url_safe = base64_url(&input);
        assert_eq!(url_safe, "-_-_AQ");
        assert!(!url_safe.contains(&['+', '/', '='][..]));
    }

    #[test]
    fn test_string_and_bytes_agree() {
        assert_eq!(base64_url("abc"), base64_url(b"abc".to_vec()));
        assert_eq!(base64_url(String::from("ab")), "YWI");
    }

    #[test]
    fn test_round_trip_various_lengths() -> Result<(), DecodeError> {
        let samples: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0xFF, 0x00],
            (0u8..=255).collect(),
            b"{\"termsOfServiceAgreed\":true}".to_vec(),
        ];
        for sample in samples {
            let encoded = base64_url(&sample);
            assert!(!encoded.contains('='));
            assert_eq!(Base64::from_url(&encoded)?.decode()?, sample);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(
            Base64::from_encoded("SGVsbG8$Ww=="),
            Err(DecodeError::InvalidCharacter(b'$'))
        );
        assert_eq!(Base64::from_encoded("A==="), Err(DecodeError::InvalidPadding));
        assert_eq!(Base64::from_encoded("AAA"), Err(DecodeError::InvalidLength));
        assert_eq!(
            Base64::from_url("ab+c"),
            Err(DecodeError::InvalidCharacter(b'+'))
        );
    }

    #[test]
    fn test_pem_wrapping() {
        let pem = Base64::new(vec![7u8; 100]).to_pem("CERTIFICATE");
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 8);
        assert!(lines[1..4].iter().all(|line| line.len() <= 64));
        assert!(pem.ends_with("-----\n"));
    }
}
