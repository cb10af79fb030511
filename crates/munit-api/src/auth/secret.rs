//! Signing key bootstrap
//!
//! The process signs tokens with one Ed25519 key pair derived from a 32 byte
//! seed. The seed lives base64 encoded in a file with mode `0600`. When the
//! file is missing, unreadable or holds a seed of the wrong length a new seed
//! is generated and written back; failing to write it is logged and the key
//! is kept in memory only. Only a failure of the OS random source is fatal.
//!
//! Seed derivation ([`SigningKeys::from_seed`]) is pure and does not touch
//! the filesystem.

use base64::alphabet;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Seed length in bytes
pub const SEED_LEN: usize = SECRET_KEY_LENGTH;

/// Required permission bits of the secret file
pub const SECRET_FILE_MODE: u32 = 0o600;

// PKCS#8 v1 wrapper for a raw Ed25519 private key (RFC 8410)
const PKCS8_ED25519_PREFIX: [u8; 16] = [
    0x30, 0x2e, // SEQUENCE, 46 bytes
    0x02, 0x01, 0x00, // INTEGER version 0
    0x30, 0x05, // SEQUENCE, algorithm identifier
    0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
    0x04, 0x22, // OCTET STRING, 34 bytes
    0x04, 0x20, // OCTET STRING, 32 bytes
];

// Reads both padded and unpadded standard base64
const SEED_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub type Seed = Zeroizing<[u8; SEED_LEN]>;

/// Key material could not be produced
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret unavailable: unable to generate random seed: {0}")]
    Unavailable(#[from] rand::Error),
}

/// Why the contents of a secret file were rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedError {
    #[error("secret is not valid base64")]
    Encoding,

    #[error("secret invalid length: got {got}, expected {}", SEED_LEN)]
    Length { got: usize },
}

/// Process signing key pair
///
/// Created once at startup and shared read-only by every token operation.
#[derive(Clone)]
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public: VerifyingKey,
}

impl SigningKeys {
    /// Derive the key pair from a seed
    pub fn from_seed(seed: &[u8; SEED_LEN]) -> Self {
        let public = SigningKey::from_bytes(seed).verifying_key();

        let mut pkcs8_der =
            Zeroizing::new(Vec::with_capacity(PKCS8_ED25519_PREFIX.len() + SEED_LEN));
        pkcs8_der.extend_from_slice(&PKCS8_ED25519_PREFIX);
        pkcs8_der.extend_from_slice(seed);

        Self {
            encoding: EncodingKey::from_ed_der(&pkcs8_der),
            decoding: DecodingKey::from_ed_der(public.as_bytes()),
            public,
        }
    }

    /// Derive a key pair from a freshly generated seed
    pub fn generate() -> Result<Self, SecretError> {
        let seed = generate_seed()?;
        Ok(Self::from_seed(&seed))
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    /// Raw 32 byte public verification key
    pub fn public_key(&self) -> [u8; 32] {
        self.public.to_bytes()
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Load the signing key seed from `path`, creating it if absent or invalid
pub fn load_or_create_secret(path: impl AsRef<Path>) -> Result<SigningKeys, SecretError> {
    let path = path.as_ref();

    let seed = match read_seed(path) {
        Some(seed) => seed,
        None => {
            info!(file = %path.display(), "creating secret");
            let seed = generate_seed()?;
            if let Err(e) = write_seed(path, &seed) {
                warn!(file = %path.display(), error = %e, "unable to write secret");
            }
            seed
        }
    };

    Ok(SigningKeys::from_seed(&seed))
}

/// Draw a new seed from the OS random source
pub fn generate_seed() -> Result<Seed, SecretError> {
    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    OsRng.try_fill_bytes(&mut seed[..])?;
    Ok(seed)
}

/// Decode the text stored in a secret file
pub fn decode_seed(contents: &str) -> Result<Seed, SeedError> {
    let bytes = Zeroizing::new(
        SEED_DECODER
            .decode(contents.trim())
            .map_err(|_| SeedError::Encoding)?,
    );
    if bytes.len() != SEED_LEN {
        return Err(SeedError::Length { got: bytes.len() });
    }

    let mut seed = Zeroizing::new([0u8; SEED_LEN]);
    seed.copy_from_slice(&bytes);
    Ok(seed)
}

/// Encode a seed the way it is written to the secret file
pub fn encode_seed(seed: &[u8; SEED_LEN]) -> Zeroizing<String> {
    Zeroizing::new(STANDARD_NO_PAD.encode(seed))
}

/// Returns `None` when the secret must be regenerated
fn read_seed(path: &Path) -> Option<Seed> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => Zeroizing::new(contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "unable to read secret");
            return None;
        }
    };

    check_permissions(path);

    match decode_seed(&contents) {
        Ok(seed) => Some(seed),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "invalid secret");
            None
        }
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode() & 0o777;
            if mode != SECRET_FILE_MODE {
                warn!(
                    file = %path.display(),
                    "secret file perm {:o}, expected {:o}",
                    mode,
                    SECRET_FILE_MODE
                );
            }
        }
        Err(e) => warn!(file = %path.display(), error = %e, "unable to stat secret"),
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) {}

fn write_seed(path: &Path, seed: &[u8; SEED_LEN]) -> io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(SECRET_FILE_MODE);
    }

    let mut file = options.open(path)?;

    // An existing file keeps its old mode through open(), tighten it before
    // the seed lands on disk
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(SECRET_FILE_MODE))?;
    }

    file.write_all(encode_seed(seed).as_bytes())?;
    file.sync_all()?;
    Ok(())
}
