//! Proof verification capability used before a reward is minted.
//!
//! The proof system itself lives outside this crate; the issuer only needs a
//! yes/no answer for a submitted proof.

/// Decides whether a submitted proof earns the reward it claims
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &str) -> bool;
}

/// Accepts any non-blank proof.
///
/// Placeholder until a real verifier is plugged in; the binary logs a warning
/// when it is used.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyProofVerifier;

impl ProofVerifier for NonEmptyProofVerifier {
    fn verify(&self, proof: &str) -> bool {
        !proof.trim().is_empty()
    }
}

impl<F> ProofVerifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn verify(&self, proof: &str) -> bool {
        self(proof)
    }
}
