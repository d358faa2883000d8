use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Token kind reserved for the application-master-to-resource-manager
/// channel. Never forwarded to worker containers: a worker holding this
/// token could impersonate the application master against the resource
/// manager.
pub const AM_RM_TOKEN_KIND: &str = "RM_DELEGATION_TOKEN";

/// An opaque delegation token granting scoped access to a cluster service
/// on behalf of the launching user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: String,
    pub identifier: Vec<u8>,
    pub password: Vec<u8>,
    pub service: String,
}

/// Current-user credentials handle: whatever is holding the delegation
/// tokens for this identity.
pub trait CredentialsSource: Send + Sync {
    fn tokens(&self) -> Vec<Token>;
}

/// An in-memory token source for tests and for daemon start-up paths that
/// load credentials from a fixed token file.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials(pub Vec<Token>);

impl CredentialsSource for StaticCredentials {
    fn tokens(&self) -> Vec<Token> {
        self.0.clone()
    }
}

/// An immutable, serialized set of delegation tokens. Shares its backing
/// bytes across every duplicate handed to a launch context.
#[derive(Debug, Clone)]
pub struct CredentialBlob(Bytes);

impl CredentialBlob {
    /// An independent read cursor over the same backing bytes; cheap,
    /// never copies the underlying buffer.
    pub fn duplicate(&self) -> Bytes {
        self.0.clone()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize the token set back out, for diagnostics and tests.
    pub fn tokens(&self) -> Result<Vec<Token>> {
        serde_json::from_slice(&self.0)
            .map_err(|e| DaemonError::Config(format!("malformed credential blob: {e}")))
    }
}

/// Extracts delegation tokens of the current identity, strips the AM↔RM
/// token, and serializes the rest for worker use.
pub struct CredentialPacker;

impl CredentialPacker {
    /// Serialize every token from `source` except the AM↔RM token into an
    /// immutable blob.
    pub fn pack(source: &dyn CredentialsSource) -> Result<CredentialBlob> {
        let filtered: Vec<Token> = source
            .tokens()
            .into_iter()
            .filter(|t| t.kind != AM_RM_TOKEN_KIND)
            .collect();

        let encoded = serde_json::to_vec(&filtered)
            .map_err(|e| DaemonError::Config(format!("failed to pack credentials: {e}")))?;

        Ok(CredentialBlob(Bytes::from(encoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(kind: &str) -> Token {
        Token {
            kind: kind.to_string(),
            identifier: vec![1, 2, 3],
            password: vec![4, 5, 6],
            service: "cluster".to_string(),
        }
    }

    #[test]
    fn packing_strips_the_am_rm_token() {
        let source = StaticCredentials(vec![
            token(AM_RM_TOKEN_KIND),
            token("HDFS_DELEGATION_TOKEN"),
        ]);

        let blob = CredentialPacker::pack(&source).unwrap();
        let tokens = blob.tokens().unwrap();

        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, "HDFS_DELEGATION_TOKEN");
    }

    #[test]
    fn round_trip_preserves_non_am_rm_tokens() {
        let source = StaticCredentials(vec![token("HDFS_DELEGATION_TOKEN"), token("HBASE_TOKEN")]);
        let blob = CredentialPacker::pack(&source).unwrap();
        let tokens = blob.tokens().unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn duplicate_shares_backing_bytes_but_is_an_independent_handle() {
        let source = StaticCredentials(vec![token("HDFS_DELEGATION_TOKEN")]);
        let blob = CredentialPacker::pack(&source).unwrap();

        let a = blob.duplicate();
        let b = blob.duplicate();
        assert_eq!(a, b);
        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}
