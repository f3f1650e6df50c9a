// ---------------------------------------------------------------------------
// Access gate
// ---------------------------------------------------------------------------

/// Who is running the app, read once at startup and handed to the UI.
///
/// This only decides whether the page body is drawn. The values come from
/// the environment and are trivially spoofed, so this is not a security boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub domain: String,
}

impl AuthContext {
    pub fn new(username: impl Into<String>, domain: impl Into<String>) -> Self {
        AuthContext {
            username: username.into(),
            domain: domain.into(),
        }
    }

    /// `USERDOMAIN` plus the first of `USER`, `USERNAME`, `LOGNAME` that is set.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let username = var("USER")
            .or_else(|| var("USERNAME"))
            .or_else(|| var("LOGNAME"))
            .unwrap_or_default();
        AuthContext::new(username, var("USERDOMAIN").unwrap_or_default())
    }

    /// `DOMAIN\user`.
    pub fn qualified_name(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }

    /// Case-insensitive substring check on the qualified name.
    pub fn is_member_of(&self, org: &str) -> bool {
        self.qualified_name()
            .to_lowercase()
            .contains(&org.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_ignores_case() {
        let ctx = AuthContext::new("jdoe", "PWCGLB");
        assert_eq!(ctx.qualified_name(), "PWCGLB\\jdoe");
        assert!(ctx.is_member_of("pwcglb"));
        assert!(!ctx.is_member_of("contoso"));
    }

    #[test]
    fn missing_domain_is_not_a_member() {
        let ctx = AuthContext::new("jdoe", "");
        assert!(!ctx.is_member_of("pwcglb"));
    }
}
