use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use tourhub_types::claim::TimeLimited;

use crate::error::{Error, Result};

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

pub struct TokenManager {
    keys: Keys,
    default_validity: std::time::Duration,
    header: Header,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, default_validity: std::time::Duration) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let header = Header::default();
        Self {
            keys: Keys::new(secret),
            default_validity,
            header,
            validation,
        }
    }

    pub fn issue(&self, mut claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        let now = std::time::SystemTime::now();
        let validity = now + self.default_validity;
        claims.set_validity(now, validity);
        let token = encode(&self.header, &claims, &self.keys.encoding)?;
        Ok(token)
    }

    #[cfg(test)]
    pub fn issue_expired(&self, mut claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        let now = std::time::SystemTime::now();
        let issued = now - 2 * self.default_validity;
        claims.set_validity(issued, now - self.default_validity);
        let token = encode(&self.header, &claims, &self.keys.encoding)?;
        Ok(token)
    }

    pub fn validate<T>(&self, token: &str) -> Result<T>
    where
        T: DeserializeOwned + TimeLimited,
    {
        let data = decode::<T>(token, &self.keys.decoding, &self.validation)?;
        if !data.claims.check_validity() {
            return Err(Error::TokenExpired);
        }
        Ok(data.claims)
    }

    pub fn default_validity(&self) -> std::time::Duration {
        self.default_validity
    }
}

#[cfg(test)]
mod tests {
    use tourhub_types::claim::{ApiClaim, Role};

    use super::*;

    #[test]
    fn test_token() {
        let claim = ApiClaim::new_expired(123, Role::Admin);
        let manager = TokenManager::new("secret", std::time::Duration::from_secs(3600));
        let token = manager.issue(claim).unwrap();
        let res = manager.validate::<ApiClaim>(&token);
        assert!(res.is_ok());
        let claim = res.unwrap();
        assert_eq!(claim.sub, "123");
        assert_eq!(claim.role, Role::Admin);
        assert!(claim.iat > 0);
        assert!(claim.check_validity());
    }

    #[test]
    fn test_token_expiration() {
        let claim = ApiClaim::new_expired(123, Role::User);
        let manager = TokenManager::new("secret", std::time::Duration::from_secs(3600));
        let token = manager.issue_expired(claim).unwrap();
        let res = manager.validate::<ApiClaim>(&token);
        let err = res.unwrap_err();
        assert!(err.is_expired(), "Unexpected error: {err}");
    }

    #[test]
    fn test_token_wrong_secret() {
        let claim = ApiClaim::new_expired(1, Role::User);
        let manager = TokenManager::new("secret", std::time::Duration::from_secs(3600));
        let other = TokenManager::new("other secret", std::time::Duration::from_secs(3600));
        let token = manager.issue(claim).unwrap();
        let err = other.validate::<ApiClaim>(&token).unwrap_err();
        assert!(!err.is_expired());
    }
}
