// Password hashing and verification using bcrypt
// The plaintext is only kept for the lifetime of the request that set it

use thiserror::Error;

/// bcrypt work factor used for every new hash
pub const DEFAULT_COST: u32 = 12;

/// bcrypt silently ignores everything past this many bytes, so longer input is rejected
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Errors that can occur during password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),
}

/// A user's credential: a one-way bcrypt hash plus, transiently, the plaintext it came from.
///
/// A `Password` can only be built by hashing a plaintext or by loading a stored hash,
/// so a value of this type always carries a hash.
#[derive(Clone)]
pub struct Password {
    plaintext: Option<String>,
    hash: String,
}

impl Password {
    /// Hash a plaintext password with the default cost
    pub fn set(plaintext: &str) -> Result<Self, PasswordError> {
        Self::set_with_cost(plaintext, DEFAULT_COST)
    }

    /// Hash a plaintext password with an explicit bcrypt cost
    ///
    /// # Errors
    /// Returns `PasswordError::HashingError` when the input exceeds bcrypt's
    /// 72 byte limit or the cost is out of range.
    pub fn set_with_cost(plaintext: &str, cost: u32) -> Result<Self, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::HashingError(format!(
                "password is {} bytes, bcrypt accepts at most {}",
                plaintext.len(),
                MAX_PASSWORD_BYTES
            )));
        }

        let hash = bcrypt::hash(plaintext, cost)
            .map_err(|e| PasswordError::HashingError(e.to_string()))?;

        Ok(Self {
            plaintext: Some(plaintext.to_string()),
            hash,
        })
    }

    /// Wrap a hash loaded from storage. No plaintext is available.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            plaintext: None,
            hash: hash.into(),
        }
    }

    /// Compare a candidate plaintext against the stored hash
    ///
    /// Returns `Ok(false)` on a clean mismatch and `Err` when the comparison
    /// itself could not be carried out (e.g. a corrupt stored hash).
    pub fn matches(&self, candidate: &str) -> Result<bool, PasswordError> {
        bcrypt::verify(candidate, &self.hash)
            .map_err(|e| PasswordError::VerificationError(e.to_string()))
    }

    /// The plaintext, if this value was produced by `set` during this request
    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Drop the transient plaintext once validation is done
    pub fn forget_plaintext(&mut self) {
        self.plaintext = None;
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "[redacted]"))
            .field("hash", &"[redacted]")
            .finish()
    }
}
