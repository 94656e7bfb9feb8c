//! # Ballot Proof Verification Library
//!
//! Shared types and checks for anonymous ballots. The election contract treats
//! proof verification as an opaque capability: it hands a [`Proof`] and the
//! public inputs to whatever contract implements [`ProofVerifier`] and accepts
//! the ballot only on `true`.
//!
//! ## Public inputs
//! Anonymous ballots are verified against three public signals, in order:
//! `[nullifier, election_id, candidate_id]`. A Groth16 verification key for
//! this statement therefore carries `PUBLIC_INPUT_COUNT + 1` IC points.
//!
//! ## Nullifiers
//! A nullifier is a BN254 scalar-field element derived from a credential's
//! nullifier seed and the target election (see [`derive_nullifier`]). The same
//! credential gets a different, stable nullifier in every election.
//!
//! ## Groth16 on BN254
//! - **Scalar field order**: r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//! - **Paper**: "On the Size of Pairing-based Non-interactive Arguments" by Jens Groth (2016)
//! - **Implementation**: Soroban BN254 host functions

#![no_std]

#[allow(unused_imports)]
use soroban_sdk::{
    contractclient, contracterror, contracttype,
    crypto::bn254::{Bn254G1Affine as G1Affine, Bn254G2Affine as G2Affine, Fr},
    Bytes, BytesN, Env, Vec, U256,
};

/// Number of public signals in the ballot statement.
pub const PUBLIC_INPUT_COUNT: u32 = 3;

/// IC vector length a ballot verification key must have.
pub const EXPECTED_IC_LENGTH: u32 = PUBLIC_INPUT_COUNT + 1;

/// BN254 scalar field modulus (Fr) in big-endian bytes
pub const BN254_FR_MODULUS: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// r - 1 in big-endian bytes; (r-1) * P = -P
pub const BN254_R_MINUS_ONE: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x00,
];

// Clearing the top three bits of a 256-bit digest keeps it below 2^253 < r.
const NULLIFIER_TOP_BYTE_MASK: u8 = 0x1f;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BallotProofError {
    /// IC vector length doesn't match public inputs + 1
    IcLengthMismatch = 30,
    /// Public input value >= BN254 scalar field modulus
    SignalNotInField = 31,
    /// Nullifier is zero
    InvalidNullifier = 32,
}

/// Groth16 verification key for BN254
#[contracttype]
#[derive(Clone)]
pub struct VerificationKey {
    pub alpha: BytesN<64>,   // G1 point
    pub beta: BytesN<128>,   // G2 point
    pub gamma: BytesN<128>,  // G2 point
    pub delta: BytesN<128>,  // G2 point
    pub ic: Vec<BytesN<64>>, // IC points (G1)
}

/// Groth16 proof
#[contracttype]
#[derive(Clone)]
pub struct Proof {
    pub a: BytesN<64>,  // G1 point
    pub b: BytesN<128>, // G2 point
    pub c: BytesN<64>,  // G1 point
}

/// Capability interface consumed by the election contract.
///
/// Any contract exposing a `verify(proof, public_inputs) -> bool` entry point
/// can be plugged in; the generated `ProofVerifierClient` is what callers use.
#[contractclient(name = "ProofVerifierClient")]
pub trait ProofVerifier {
    fn verify(env: Env, proof: Proof, public_inputs: Vec<U256>) -> bool;
}

/// Build the public input vector for an anonymous ballot.
pub fn ballot_public_inputs(
    env: &Env,
    nullifier: &U256,
    election_id: u64,
    candidate_id: u32,
) -> Vec<U256> {
    soroban_sdk::vec![
        env,
        nullifier.clone(),
        U256::from_u128(env, election_id as u128),
        U256::from_u32(env, candidate_id)
    ]
}

/// Validate that a U256 value is within the BN254 scalar field (< r).
///
/// Values >= r would be reduced mod r inside the circuit, so two distinct
/// storage keys could verify identically. Every public input must pass this.
pub fn assert_in_field(env: &Env, value: &U256) -> Result<(), BallotProofError> {
    if !is_in_field(env, value) {
        return Err(BallotProofError::SignalNotInField);
    }
    Ok(())
}

pub fn is_in_field(env: &Env, value: &U256) -> bool {
    let modulus = U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_FR_MODULUS));
    value < &modulus
}

/// Validate that a nullifier is non-zero and within the BN254 scalar field.
pub fn validate_nullifier(env: &Env, nullifier: &U256) -> Result<(), BallotProofError> {
    if nullifier == &U256::from_u32(env, 0) {
        return Err(BallotProofError::InvalidNullifier);
    }
    assert_in_field(env, nullifier)
}

/// Derive the nullifier a credential uses in one election.
///
/// `sha256(seed as 32 big-endian bytes || election_id as 8 big-endian bytes)`,
/// truncated to 253 bits.
pub fn derive_nullifier(env: &Env, seed: &U256, election_id: u64) -> U256 {
    let mut data = seed.to_be_bytes();
    data.append(&Bytes::from_array(env, &election_id.to_be_bytes()));

    let digest: BytesN<32> = env.crypto().sha256(&data).into();
    let mut bytes = digest.to_array();
    bytes[0] &= NULLIFIER_TOP_BYTE_MASK;

    U256::from_be_bytes(env, &Bytes::from_array(env, &bytes))
}

/// Verify a Groth16 proof using the BN254 pairing check.
///
/// e(-A, B) * e(alpha, beta) * e(vk_x, gamma) * e(C, delta) = 1
/// where vk_x = IC[0] + sum(pub_signals[i] * IC[i+1]).
///
/// In test mode (cfg(test) or feature="testutils") the pairing is skipped and
/// only the IC length is checked, so tests can run without circuit artifacts.
#[allow(unused_variables)]
pub fn verify_groth16(
    env: &Env,
    vk: &VerificationKey,
    proof: &Proof,
    pub_signals: &Vec<U256>,
) -> bool {
    if pub_signals.len() + 1 != vk.ic.len() {
        return false;
    }

    #[cfg(any(test, feature = "testutils"))]
    {
        return true;
    }

    #[cfg(not(any(test, feature = "testutils")))]
    {
        let vk_x = compute_vk_x(vk, pub_signals);

        let a_point = G1Affine::from_bytes(proof.a.clone());
        let neg_a = a_point * neg_one_scalar(env);

        let mut g1_vec = Vec::new(env);
        g1_vec.push_back(neg_a);
        g1_vec.push_back(G1Affine::from_bytes(vk.alpha.clone()));
        g1_vec.push_back(G1Affine::from_bytes(vk_x));
        g1_vec.push_back(G1Affine::from_bytes(proof.c.clone()));

        let mut g2_vec = Vec::new(env);
        g2_vec.push_back(G2Affine::from_bytes(proof.b.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.beta.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.gamma.clone()));
        g2_vec.push_back(G2Affine::from_bytes(vk.delta.clone()));

        env.crypto().bn254().pairing_check(g1_vec, g2_vec)
    }
}

#[cfg(not(any(test, feature = "testutils")))]
fn neg_one_scalar(env: &Env) -> Fr {
    let u = U256::from_be_bytes(env, &Bytes::from_array(env, &BN254_R_MINUS_ONE));
    Fr::from(u)
}

/// vk_x = IC[0] + sum(pub_signals[i] * IC[i+1])
#[cfg(not(any(test, feature = "testutils")))]
fn compute_vk_x(vk: &VerificationKey, pub_signals: &Vec<U256>) -> BytesN<64> {
    let mut vk_x = G1Affine::from_bytes(vk.ic.get(0).expect("IC[0] missing"));

    for i in 0..pub_signals.len() {
        let signal = pub_signals.get(i).expect("signal missing");
        let ic_point = G1Affine::from_bytes(vk.ic.get(i + 1).expect("IC point missing"));
        vk_x = vk_x + ic_point * Fr::from(signal);
    }

    vk_x.to_bytes()
}
