//! Version token → [`CipherConfiguration`] resolution.
//!
//! Each token segment is an opaque label looked up in a fixed table. Required
//! segments (mode, padding, key size) must resolve; the RSA padding segment
//! must resolve when present; the digest segment is best-effort.

use std::fmt;

use super::error::CryptoError;

/// Maximum number of dot-separated segments in a version token.
pub const MAX_SEGMENTS: usize = 5;

macro_rules! label_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every member, in table order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Resolve a version token label; `None` if the table has no entry.
            pub fn from_label(label: &str) -> Option<Self> {
                match label {
                    $( $label => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// The version token label of this member.
            pub fn label(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }
        }
    };
}

label_table! {
    /// AES block cipher mode.
    SymmetricMode {
        /// Cipher block chaining.
        Cbc => "alpha",
        /// Full-block cipher feedback.
        Cfb => "beta",
        /// Output feedback.
        Ofb => "gamma",
        /// Big-endian 128-bit counter.
        Ctr => "delta",
        /// Galois/counter mode (authenticated).
        Gcm => "epsilon",
    }
}

label_table! {
    /// Padding applied to the plaintext before a non-authenticated mode runs.
    PaddingScheme {
        /// PKCS#7.
        Pkcs7 => "alpha",
        /// No padding.
        NoPadding => "beta",
        /// ISO 10126: random filler plus a count byte.
        Iso10126 => "gamma",
        /// ANSI X.923: zero filler plus a count byte.
        AnsiX923 => "delta",
        /// ISO/IEC 9797-1 method 2: `0x80` then zeros.
        Iso97971 => "epsilon",
        /// Zero bytes up to the block boundary.
        ZeroPadding => "zeta",
    }
}

label_table! {
    /// AES key size.
    KeySize {
        /// AES-128.
        Aes128 => "tau",
        /// AES-192.
        Aes192 => "phi",
        /// AES-256.
        Aes256 => "psi",
    }
}

label_table! {
    /// RSA padding used to wrap the symmetric key.
    AsymmetricPadding {
        /// RSAES-OAEP.
        Oaep => "omega",
        /// OAEP wrap with an MGF1 keyed by the configured digest.
        Pss => "theta",
        /// RSAES-PKCS1-v1_5.
        Pkcs1v15 => "lambda",
    }
}

label_table! {
    /// Hash used by the RSA padding.
    DigestAlgorithm {
        /// SHA-256.
        Sha256 => "sigma",
        /// SHA-1.
        Sha1 => "tau",
        /// SHA-512.
        Sha512 => "phi",
        /// MD5.
        Md5 => "psi",
    }
}

impl SymmetricMode {
    /// Whether the mode produces an authentication tag.
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Gcm)
    }
}

impl KeySize {
    /// Key size in bits.
    pub fn bits(self) -> usize {
        match self {
            Self::Aes128 => 128,
            Self::Aes192 => 192,
            Self::Aes256 => 256,
        }
    }

    /// Key size in bytes.
    pub fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// A version token exactly as configured for the deployment.
///
/// The token travels on the wire unchanged (`ev` / `e-version`), so the
/// raw text is kept alongside the resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token string. No validation happens here.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this token into a [`CipherConfiguration`].
    ///
    /// # Errors
    ///
    /// See [`CipherConfiguration::resolve`].
    pub fn resolve(&self) -> Result<CipherConfiguration, CryptoError> {
        CipherConfiguration::resolve(self)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved set of algorithm choices for one session. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherConfiguration {
    /// AES key size.
    pub key_size: KeySize,
    /// AES mode.
    pub mode: SymmetricMode,
    /// Plaintext padding for non-authenticated modes.
    pub padding: PaddingScheme,
    /// RSA padding for key wrapping; `None` when no wrapping was requested.
    pub asymmetric_padding: Option<AsymmetricPadding>,
    /// Digest parameterising the RSA padding; `None` selects the default.
    pub digest: Option<DigestAlgorithm>,
}

impl CipherConfiguration {
    /// Parse `token` into a configuration.
    ///
    /// Empty optional segments are treated as absent. An unknown digest label
    /// leaves the digest unset.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnsupportedConfiguration`] if the mode, padding or
    /// key size label is missing or unknown, if an RSA padding label is present
    /// but unknown, or if the token has more than [`MAX_SEGMENTS`] segments.
    pub fn resolve(token: &VersionToken) -> Result<Self, CryptoError> {
        let unsupported = || CryptoError::UnsupportedConfiguration(token.as_str().to_owned());

        let segments: Vec<&str> = token.as_str().split('.').collect();
        if segments.len() > MAX_SEGMENTS {
            return Err(unsupported());
        }
        let segment = |i: usize| segments.get(i).copied().filter(|s| !s.is_empty());

        let mode = segment(0)
            .and_then(SymmetricMode::from_label)
            .ok_or_else(unsupported)?;
        let padding = segment(1)
            .and_then(PaddingScheme::from_label)
            .ok_or_else(unsupported)?;
        let key_size = segment(2)
            .and_then(KeySize::from_label)
            .ok_or_else(unsupported)?;
        let asymmetric_padding = match segment(3) {
            Some(label) => Some(AsymmetricPadding::from_label(label).ok_or_else(unsupported)?),
            None => None,
        };
        let digest = segment(4).and_then(DigestAlgorithm::from_label);

        Ok(Self {
            key_size,
            mode,
            padding,
            asymmetric_padding,
            digest,
        })
    }

    /// Canonical token for this configuration.
    pub fn to_token(&self) -> VersionToken {
        let mut labels = vec![self.mode.label(), self.padding.label(), self.key_size.label()];
        match (self.asymmetric_padding, self.digest) {
            (Some(rsa), Some(digest)) => labels.extend([rsa.label(), digest.label()]),
            (Some(rsa), None) => labels.push(rsa.label()),
            (None, Some(digest)) => labels.extend(["", digest.label()]),
            (None, None) => {}
        }
        VersionToken::new(labels.join("."))
    }
}
