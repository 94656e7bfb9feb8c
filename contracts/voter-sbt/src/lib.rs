#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, panic_with_error, symbol_short, Address,
    BytesN, Env, Symbol, Vec, U256,
};

const ADMIN: Symbol = symbol_short!("admin");
const APPLICANT_COUNT: Symbol = symbol_short!("app_cnt");
const TOKEN_COUNT: Symbol = symbol_short!("tok_cnt");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SbtError {
    Unauthorized = 2,
    NotApplied = 20,
    AlreadyApplied = 21,
    AlreadyRegistered = 22,
    NotRegistered = 23,
    NonTransferable = 24,
    InvalidSeed = 25,
    SeedInUse = 26,
    AlreadyInitialized = 27,
    NotInitialized = 28,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Credential(Address),   // applicant -> Credential
    ApplicantAtIndex(u64), // index -> applicant
    SeedOwner(U256),       // nullifier seed -> holder
}

#[contracttype]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStatus {
    Applied,
    Approved,
}

/// Soul-bound voter credential. Lives at `DataKey::Credential(owner)`
/// and is never moved to another key.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Credential {
    pub owner: Address,
    pub status: CredentialStatus,
    pub commitment: BytesN<32>, // hash of the applicant's off-chain identity data
    pub token_id: u64,          // 0 until approved
    pub nullifier_seed: U256,   // 0 until approved
    pub applied_at: u64,
    pub approved_at: u64,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationSubmitted {
    #[topic]
    pub applicant: Address,
    pub commitment: BytesN<32>,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ApplicationApproved {
    #[topic]
    pub applicant: Address,
    pub token_id: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct VoterSbt;

#[contractimpl]
impl VoterSbt {
    /// Constructor: fix the credential administrator
    pub fn __constructor(env: Env, admin: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, SbtError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&ADMIN, &admin);
    }

    /// Helper: Add applicant to enumeration list
    fn add_applicant_to_list(env: &Env, applicant: &Address) {
        let current_count: u64 = env.storage().instance().get(&APPLICANT_COUNT).unwrap_or(0);

        let index_key = DataKey::ApplicantAtIndex(current_count);
        env.storage().persistent().set(&index_key, applicant);

        env.storage()
            .instance()
            .set(&APPLICANT_COUNT, &(current_count + 1));
    }

    fn load_credential(env: &Env, identity: &Address) -> Option<Credential> {
        env.storage()
            .persistent()
            .get(&DataKey::Credential(identity.clone()))
    }

    fn approved_credential(env: &Env, identity: &Address) -> Credential {
        match Self::load_credential(env, identity) {
            Some(c) if c.status == CredentialStatus::Approved => c,
            _ => panic_with_error!(env, SbtError::NotRegistered),
        }
    }

    /// Apply for a voter credential.
    /// The applicant authorizes; one application per identity, ever.
    pub fn apply(env: Env, applicant: Address, commitment: BytesN<32>) {
        applicant.require_auth();

        if let Some(existing) = Self::load_credential(&env, &applicant) {
            match existing.status {
                CredentialStatus::Applied => panic_with_error!(&env, SbtError::AlreadyApplied),
                CredentialStatus::Approved => {
                    panic_with_error!(&env, SbtError::AlreadyRegistered)
                }
            }
        }

        let credential = Credential {
            owner: applicant.clone(),
            status: CredentialStatus::Applied,
            commitment: commitment.clone(),
            token_id: 0,
            nullifier_seed: U256::from_u32(&env, 0),
            applied_at: env.ledger().timestamp(),
            approved_at: 0,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Credential(applicant.clone()), &credential);

        Self::add_applicant_to_list(&env, &applicant);

        ApplicationSubmitted {
            applicant,
            commitment,
        }
        .publish(&env);
    }

    /// Approve a pending application and mint the soul-bound token (admin only).
    /// Binds `nullifier_seed`, which must be non-zero and unused by any other credential.
    pub fn approve(env: Env, applicant: Address, nullifier_seed: U256) {
        let admin = Self::admin(env.clone());
        admin.require_auth();

        let mut credential = match Self::load_credential(&env, &applicant) {
            Some(c) => c,
            None => panic_with_error!(&env, SbtError::NotApplied),
        };

        if credential.status == CredentialStatus::Approved {
            panic_with_error!(&env, SbtError::AlreadyRegistered);
        }

        if nullifier_seed == U256::from_u32(&env, 0) {
            panic_with_error!(&env, SbtError::InvalidSeed);
        }

        let seed_key = DataKey::SeedOwner(nullifier_seed.clone());
        if env.storage().persistent().has(&seed_key) {
            panic_with_error!(&env, SbtError::SeedInUse);
        }

        let token_id = Self::next_token_id(&env);

        credential.status = CredentialStatus::Approved;
        credential.token_id = token_id;
        credential.nullifier_seed = nullifier_seed;
        credential.approved_at = env.ledger().timestamp();

        env.storage().persistent().set(&seed_key, &applicant);
        env.storage()
            .persistent()
            .set(&DataKey::Credential(applicant.clone()), &credential);

        ApplicationApproved {
            applicant,
            token_id,
        }
        .publish(&env);
    }

    /// Credentials are soul-bound; this always fails.
    pub fn transfer(env: Env, from: Address, _to: Address) {
        from.require_auth();
        panic_with_error!(&env, SbtError::NonTransferable);
    }

    /// (has_applied, is_approved)
    pub fn get_application_status(env: Env, identity: Address) -> (bool, bool) {
        match Self::load_credential(&env, &identity) {
            Some(c) => (true, c.status == CredentialStatus::Approved),
            None => (false, false),
        }
    }

    /// Check if identity holds an approved credential
    pub fn is_registered(env: Env, identity: Address) -> bool {
        matches!(
            Self::load_credential(&env, &identity),
            Some(Credential {
                status: CredentialStatus::Approved,
                ..
            })
        )
    }

    pub fn get_credential(env: Env, identity: Address) -> Credential {
        Self::load_credential(&env, &identity)
            .unwrap_or_else(|| panic_with_error!(&env, SbtError::NotApplied))
    }

    pub fn get_token_id(env: Env, identity: Address) -> u64 {
        Self::approved_credential(&env, &identity).token_id
    }

    pub fn get_nullifier_seed(env: Env, identity: Address) -> U256 {
        Self::approved_credential(&env, &identity).nullifier_seed
    }

    /// Nullifier this identity's credential uses in `election_id`.
    /// Stable for the pair, different for every election.
    pub fn nullifier_for(env: Env, identity: Address, election_id: u64) -> U256 {
        let credential = Self::approved_credential(&env, &identity);
        ballot_verifier::derive_nullifier(&env, &credential.nullifier_seed, election_id)
    }

    pub fn admin(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&ADMIN)
            .unwrap_or_else(|| panic_with_error!(&env, SbtError::NotInitialized))
    }

    /// Number of credentials minted so far
    pub fn token_count(env: Env) -> u64 {
        env.storage().instance().get(&TOKEN_COUNT).unwrap_or(0)
    }

    pub fn get_applicant_count(env: Env) -> u64 {
        env.storage().instance().get(&APPLICANT_COUNT).unwrap_or(0)
    }

    pub fn get_applicant_at_index(env: Env, index: u64) -> Option<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::ApplicantAtIndex(index))
    }

    /// Get a batch of applicants, in application order
    /// Returns addresses from offset to offset+limit (or end of list)
    pub fn get_applicants(env: Env, offset: u64, limit: u64) -> Vec<Address> {
        let mut applicants = Vec::new(&env);
        let count = Self::get_applicant_count(env.clone());
        let end = core::cmp::min(offset.saturating_add(limit), count);

        for i in offset..end {
            if let Some(applicant) = Self::get_applicant_at_index(env.clone(), i) {
                applicants.push_back(applicant);
            }
        }

        applicants
    }

    /// Applicants in the index window [offset, offset+limit) still awaiting approval
    pub fn get_pending_applicants(env: Env, offset: u64, limit: u64) -> Vec<Address> {
        let mut pending = Vec::new(&env);
        for applicant in Self::get_applicants(env.clone(), offset, limit).iter() {
            let (_, approved) = Self::get_application_status(env.clone(), applicant.clone());
            if !approved {
                pending.push_back(applicant);
            }
        }
        pending
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn next_token_id(env: &Env) -> u64 {
        let count: u64 = env.storage().instance().get(&TOKEN_COUNT).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&TOKEN_COUNT, &new_id);
        new_id
    }
}
