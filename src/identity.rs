//! Identity resolution at connection-accept time
//!
//! The relay never stores anonymous connections: before a connection is
//! registered, the handler asks an [`IdentityProvider`] for the username
//! bound to the handshake. Absence means the unauthorized path — reject
//! and close without creating any state.

/// Identity collaborator contract
///
/// `query` is the raw query string of the handshake request URI, if any.
/// Returns the authenticated username, or `None` for an unauthorized
/// connection.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(&self, query: Option<&str>) -> Option<String>;
}

/// Identity from the `username` query parameter of the handshake URI
///
/// Stands in for a real credential service: any non-empty username is
/// accepted. Empty or missing usernames are rejected.
#[derive(Debug, Default)]
pub struct QueryIdentity;

impl IdentityProvider for QueryIdentity {
    fn authenticate(&self, query: Option<&str>) -> Option<String> {
        let username = query?
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "username")
            .map(|(_, value)| value.trim())?;
        if username.is_empty() {
            return None;
        }
        Some(username.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_extracted() {
        let identity = QueryIdentity;
        assert_eq!(
            identity.authenticate(Some("username=alice")),
            Some("alice".to_string())
        );
        assert_eq!(
            identity.authenticate(Some("token=xyz&username=bob")),
            Some("bob".to_string())
        );
    }

    #[test]
    fn test_missing_query_rejected() {
        let identity = QueryIdentity;
        assert_eq!(identity.authenticate(None), None);
    }

    #[test]
    fn test_missing_or_empty_username_rejected() {
        let identity = QueryIdentity;
        assert_eq!(identity.authenticate(Some("token=xyz")), None);
        assert_eq!(identity.authenticate(Some("username=")), None);
        assert_eq!(identity.authenticate(Some("username=   ")), None);
    }
}
