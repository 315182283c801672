//! Key agreement: X25519 ECDH with dual-HKDF-SHA-256 directional session
//! key derivation, and Ed25519 identity signatures.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

const INFO_K1: &[u8] = b"riptide/session/k1";
const INFO_K2: &[u8] = b"riptide/session/k2";

/// An X25519 keypair used for one handshake.
pub struct X25519KeyPair {
    secret: StaticSecret,
    pub public: PublicKey,
}

impl X25519KeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(&mut rand_core_06_compat());
        let public = PublicKey::from(&secret);
        X25519KeyPair { secret, public }
    }

    /// Compute the ECDH shared secret with a peer's public key.
    pub fn shared_secret(&self, peer_public: &PublicKey) -> [u8; 32] {
        self.secret.diffie_hellman(peer_public).to_bytes()
    }
}

/// x25519-dalek 2.x's `random_from_rng` wants an `rand_core` 0.6 `CryptoRng
/// + RngCore`. We depend on `rand` 0.10 at the workspace level for every
/// other source of randomness, so bridge through `rand_core`'s OsRng here
/// rather than pulling in a second, newer `rand_core` for one call site.
fn rand_core_06_compat() -> rand_core::OsRng {
    rand_core::OsRng
}

/// Two 32-byte directional session keys derived from an ECDH shared secret.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKeys {
    pub tx: [u8; 32],
    pub rx: [u8; 32],
}

/// Derive directional session keys from a shared secret and salt.
///
/// Two independent HKDF-SHA-256 `expand` calls produce `k1` and `k2`
/// (never one `expand` call split in half). The initiator's `(tx, rx)` is
/// `(k1, k2)`; the responder's is the same pair with roles swapped.
pub fn derive_session(shared: &[u8; 32], salt: &[u8], is_initiator: bool) -> SessionKeys {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared);
    let mut k1 = [0u8; 32];
    let mut k2 = [0u8; 32];
    hk.expand(INFO_K1, &mut k1)
        .expect("32 is a valid HKDF-SHA-256 output length");
    hk.expand(INFO_K2, &mut k2)
        .expect("32 is a valid HKDF-SHA-256 output length");
    if is_initiator {
        SessionKeys { tx: k1, rx: k2 }
    } else {
        SessionKeys { tx: k2, rx: k1 }
    }
}

/// Identity keypair used to sign/verify the handshake transcript.
pub struct IdentityKeyPair {
    signing: SigningKey,
}

impl IdentityKeyPair {
    pub fn generate() -> Self {
        IdentityKeyPair {
            signing: SigningKey::generate(&mut rand_core_06_compat()),
        }
    }

    pub fn from_bytes(seed: [u8; 32]) -> Self {
        IdentityKeyPair {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

pub fn verify(public: &VerifyingKey, message: &[u8], signature: &Signature) -> bool {
    public.verify(message, signature).is_ok()
}
