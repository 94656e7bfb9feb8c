//! # Groth16 Ballot Verifier Contract
//!
//! Concrete [`ProofVerifier`] backed by a Groth16 verification key stored by
//! the verifier admin. The election contract only sees the `verify` entry
//! point, so this contract can be swapped for any other implementation.
//!
//! ## Point validation
//! BN254 points are not curve/subgroup checked here. Invalid points cannot
//! satisfy the pairing equation, so the pairing check rejects them.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, log, panic_with_error, symbol_short, Address, Bytes,
    BytesN, Env, Symbol, Vec, U256,
};

pub use ballot_verifier::{Proof, ProofVerifier, VerificationKey, EXPECTED_IC_LENGTH};

const ADMIN: Symbol = symbol_short!("admin");
const VK: Symbol = symbol_short!("vk");
const VK_HASH: Symbol = symbol_short!("vk_hash");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VerifierError {
    Unauthorized = 2,
    AlreadyInitialized = 20,
    InvalidKey = 21,
    KeyNotSet = 22,
    NotInitialized = 23,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct VkSetEvent {
    pub vk_hash: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Groth16Verifier;

#[contractimpl]
impl Groth16Verifier {
    pub fn __constructor(env: Env, admin: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, VerifierError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&ADMIN, &admin);
    }

    /// Install or replace the ballot verification key (admin only).
    /// IC must hold exactly one point per public input plus IC[0].
    pub fn set_vk(env: Env, admin: Address, vk: VerificationKey) {
        admin.require_auth();

        if admin != Self::admin(env.clone()) {
            panic_with_error!(&env, VerifierError::Unauthorized);
        }

        if vk.ic.len() != EXPECTED_IC_LENGTH {
            panic_with_error!(&env, VerifierError::InvalidKey);
        }

        let vk_hash = Self::hash_vk(&env, &vk);
        env.storage().persistent().set(&VK, &vk);
        env.storage().instance().set(&VK_HASH, &vk_hash);

        VkSetEvent { vk_hash }.publish(&env);
    }

    pub fn get_vk(env: Env) -> VerificationKey {
        env.storage()
            .persistent()
            .get(&VK)
            .unwrap_or_else(|| panic_with_error!(&env, VerifierError::KeyNotSet))
    }

    /// SHA256 of the installed key, for off-chain provers to pin against
    pub fn vk_hash(env: Env) -> Option<BytesN<32>> {
        env.storage().instance().get(&VK_HASH)
    }

    pub fn admin(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&ADMIN)
            .unwrap_or_else(|| panic_with_error!(&env, VerifierError::NotInitialized))
    }

    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn hash_vk(env: &Env, vk: &VerificationKey) -> BytesN<32> {
        let mut data = Bytes::new(env);
        data.append(&Bytes::from_array(env, &vk.alpha.to_array()));
        data.append(&Bytes::from_array(env, &vk.beta.to_array()));
        data.append(&Bytes::from_array(env, &vk.gamma.to_array()));
        data.append(&Bytes::from_array(env, &vk.delta.to_array()));
        for ic_point in vk.ic.iter() {
            data.append(&Bytes::from_array(env, &ic_point.to_array()));
        }

        env.crypto().sha256(&data).into()
    }
}

#[contractimpl]
impl ProofVerifier for Groth16Verifier {
    /// Returns false for a missing key, a malformed input vector or a failed
    /// pairing check. Points that are not on the curve trap inside the host
    /// pairing instead; callers go through `try_verify` to treat that as a
    /// rejection.
    fn verify(env: Env, proof: Proof, public_inputs: Vec<U256>) -> bool {
        let vk: VerificationKey = match env.storage().persistent().get(&VK) {
            Some(vk) => vk,
            None => {
                log!(&env, "verify called before a key was set");
                return false;
            }
        };

        for input in public_inputs.iter() {
            if !ballot_verifier::is_in_field(&env, &input) {
                return false;
            }
        }

        ballot_verifier::verify_groth16(&env, &vk, &proof, &public_inputs)
    }
}
