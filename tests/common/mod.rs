// ABOUTME: Shared helpers for integration tests
// ABOUTME: RSA test key generation and token issuer construction

#![allow(dead_code)]

use gatehouse::config::JwtConfig;
use gatehouse::tokens::TokenIssuer;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// 2048-bit keys keep test execution fast; production deployments
/// mount larger keys.
pub const TEST_KEY_BITS: usize = 2048;

pub struct TestKeys {
    pub private_pem: String,
    pub public_pem: String,
    pub public_key: RsaPublicKey,
}

pub fn generate_keys() -> TestKeys {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, TEST_KEY_BITS).unwrap();
    let public_key = RsaPublicKey::from(&private_key);
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .unwrap()
        .to_string();
    let public_pem = public_key.to_public_key_pem(LineEnding::LF).unwrap();
    TestKeys {
        private_pem,
        public_pem,
        public_key,
    }
}

pub fn jwt_config(keys: &TestKeys) -> JwtConfig {
    JwtConfig::new(keys.private_pem.clone(), keys.public_pem.clone())
}

pub fn issuer(keys: &TestKeys) -> TokenIssuer {
    TokenIssuer::new(&jwt_config(keys)).unwrap()
}
