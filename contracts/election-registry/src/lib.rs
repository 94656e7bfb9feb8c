//! # Election Registry Contract
//!
//! Owns every election, its candidate roster and its ballot ledger.
//!
//! ## Lifecycle
//! `Pending -> Active -> Completed`, forward only. Candidates are appended
//! while Pending; ballots are accepted while Active; results are readable
//! once Completed. Elections are never deleted.
//!
//! ## Ballots
//! - `vote`: direct ballot, one per voter address per election.
//! - `zk_vote`: anonymous ballot. The caller must hold an approved voter
//!   credential and submit the nullifier that credential derives for the
//!   election. The ballot records only the nullifier, which is the
//!   double-vote guard on this path and is scoped per election.
//!
//! Proof checking is delegated to the verifier contract fixed at
//! construction (any implementation of `ballot_verifier::ProofVerifier`).

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    Address, Env, IntoVal, String, Symbol, Vec, U256,
};

pub use ballot_verifier::{Proof, ProofVerifierClient};

const ELECTION_COUNT: Symbol = symbol_short!("elec_cnt");
const SBT_CONTRACT: Symbol = symbol_short!("sbt");
const VERIFIER: Symbol = symbol_short!("verifier");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

// Size limit to prevent DoS attacks
const MAX_NAME_LEN: u32 = 256;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ElectionError {
    NotFound = 1,
    Unauthorized = 2,
    InvalidState = 3,
    AlreadyActive = 4,
    AlreadyCompleted = 5,
    NotActive = 6,
    NotCompleted = 7,
    AlreadyVoted = 8,
    InvalidCandidate = 9,
    InvalidProof = 10,
    InvalidInput = 12,
    AlreadyInitialized = 20,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Election(u64),           // election_id -> Election
    Candidate(u64, u32),     // (election_id, candidate_id) -> Candidate
    Voted(u64, Address),     // (election_id, voter) -> bool
    Nullifier(u64, U256),    // (election_id, nullifier) -> bool
    VoterAtIndex(u64, u64),  // (election_id, index) -> Address
    VoterListLen(u64),       // election_id -> direct voter list length
}

#[contracttype]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionStatus {
    Pending,
    Active,
    Completed,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Election {
    pub id: u64,
    pub name: String,
    pub admin: Address,
    pub status: ElectionStatus,
    pub created_at: u64,
    pub start_time: u64, // 0 until started
    pub end_time: u64,   // 0 until stopped
    pub candidate_count: u32,
    pub voter_count: u64,
}

impl Election {
    pub fn is_active(&self) -> bool {
        self.status == ElectionStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.status == ElectionStatus::Completed
    }
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub id: u32,
    pub name: String,
    pub vote_count: u64,
}

/// Roster view; `vote_counts` are zero until the election is Completed
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateList {
    pub ids: Vec<u32>,
    pub names: Vec<String>,
    pub vote_counts: Vec<u64>,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionResults {
    pub name: String,
    pub ids: Vec<u32>,
    pub names: Vec<String>,
    pub vote_counts: Vec<u64>,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionCreated {
    #[topic]
    pub election_id: u64,
    pub name: String,
    pub admin: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateAdded {
    #[topic]
    pub election_id: u64,
    pub candidate_id: u32,
    pub name: String,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionStarted {
    #[topic]
    pub election_id: u64,
    pub start_time: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ElectionStopped {
    #[topic]
    pub election_id: u64,
    pub end_time: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ResultsStored {
    #[topic]
    pub election_id: u64,
    pub voter_count: u64,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct Voted {
    #[topic]
    pub election_id: u64,
    pub candidate_id: u32,
    pub voter: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct AnonVoted {
    #[topic]
    pub election_id: u64,
    pub candidate_id: u32,
    pub nullifier: U256,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct ElectionRegistry;

#[contractimpl]
impl ElectionRegistry {
    /// Constructor: Initialize contract with VoterSbt and verifier addresses
    pub fn __constructor(env: Env, sbt_contract: Address, verifier: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, ElectionError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&SBT_CONTRACT, &sbt_contract);
        env.storage().instance().set(&VERIFIER, &verifier);
    }

    /// Create a new election; the creator becomes its admin.
    pub fn create_election(env: Env, creator: Address, name: String) -> u64 {
        creator.require_auth();

        Self::validate_name(&env, &name);

        let election_id = Self::next_election_id(&env);

        let election = Election {
            id: election_id,
            name: name.clone(),
            admin: creator.clone(),
            status: ElectionStatus::Pending,
            created_at: env.ledger().timestamp(),
            start_time: 0,
            end_time: 0,
            candidate_count: 0,
            voter_count: 0,
        };
        Self::save_election(&env, &election);

        ElectionCreated {
            election_id,
            name,
            admin: creator,
        }
        .publish(&env);

        election_id
    }

    /// Append a candidate (admin only, Pending only)
    pub fn add_candidate(env: Env, election_id: u64, admin: Address, name: String) -> u32 {
        let mut election = Self::load_election(&env, election_id);
        Self::require_admin(&env, &election, &admin);

        if election.status != ElectionStatus::Pending {
            panic_with_error!(&env, ElectionError::InvalidState);
        }

        Self::validate_name(&env, &name);

        election.candidate_count += 1;
        let candidate_id = election.candidate_count;

        let candidate = Candidate {
            id: candidate_id,
            name: name.clone(),
            vote_count: 0,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Candidate(election_id, candidate_id), &candidate);
        Self::save_election(&env, &election);

        CandidateAdded {
            election_id,
            candidate_id,
            name,
        }
        .publish(&env);

        candidate_id
    }

    /// Open voting (admin only). An empty roster is allowed here.
    pub fn start_election(env: Env, election_id: u64, admin: Address) {
        let mut election = Self::load_election(&env, election_id);
        Self::require_admin(&env, &election, &admin);

        match election.status {
            ElectionStatus::Active => panic_with_error!(&env, ElectionError::AlreadyActive),
            ElectionStatus::Completed => panic_with_error!(&env, ElectionError::AlreadyCompleted),
            ElectionStatus::Pending => {}
        }

        election.status = ElectionStatus::Active;
        election.start_time = env.ledger().timestamp();
        Self::save_election(&env, &election);

        ElectionStarted {
            election_id,
            start_time: election.start_time,
        }
        .publish(&env);
    }

    /// Close voting for good (admin only). Tallies become readable.
    pub fn stop_election(env: Env, election_id: u64, admin: Address) {
        let mut election = Self::load_election(&env, election_id);
        Self::require_admin(&env, &election, &admin);

        if election.status != ElectionStatus::Active {
            panic_with_error!(&env, ElectionError::NotActive);
        }

        election.status = ElectionStatus::Completed;
        election.end_time = env.ledger().timestamp();
        Self::save_election(&env, &election);

        ElectionStopped {
            election_id,
            end_time: election.end_time,
        }
        .publish(&env);

        ResultsStored {
            election_id,
            voter_count: election.voter_count,
        }
        .publish(&env);
    }

    /// Cast a direct ballot; `voter` is recorded against the election.
    pub fn vote(env: Env, election_id: u64, candidate_id: u32, voter: Address) {
        voter.require_auth();

        let mut election = Self::load_election(&env, election_id);
        Self::require_open(&env, &election);
        let mut candidate = Self::load_candidate(&env, &election, candidate_id);

        let voted_key = DataKey::Voted(election_id, voter.clone());
        if env.storage().persistent().has(&voted_key) {
            panic_with_error!(&env, ElectionError::AlreadyVoted);
        }

        env.storage().persistent().set(&voted_key, &true);
        Self::add_voter_to_list(&env, election_id, &voter);
        Self::record_ballot(&env, &mut election, &mut candidate);

        Voted {
            election_id,
            candidate_id,
            voter,
        }
        .publish(&env);
    }

    /// Cast an anonymous ballot.
    ///
    /// `voter` must hold an approved credential and `nullifier` must be the
    /// one that credential derives for this election, yet only `nullifier`
    /// is stored. Public inputs handed to the verifier:
    /// `[nullifier, election_id, candidate_id]`.
    pub fn zk_vote(
        env: Env,
        election_id: u64,
        candidate_id: u32,
        voter: Address,
        nullifier: U256,
        proof: Proof,
    ) {
        voter.require_auth();

        let mut election = Self::load_election(&env, election_id);
        Self::require_open(&env, &election);
        let mut candidate = Self::load_candidate(&env, &election, candidate_id);

        if ballot_verifier::validate_nullifier(&env, &nullifier).is_err() {
            panic_with_error!(&env, ElectionError::InvalidInput);
        }

        // Cheap storage lookup before any cross-contract call
        let null_key = DataKey::Nullifier(election_id, nullifier.clone());
        if env.storage().persistent().has(&null_key) {
            panic_with_error!(&env, ElectionError::AlreadyVoted);
        }

        let sbt_contract = Self::sbt_contract(env.clone());
        let registered: bool = env.invoke_contract(
            &sbt_contract,
            &Symbol::new(&env, "is_registered"),
            soroban_sdk::vec![&env, voter.into_val(&env)],
        );
        if !registered {
            panic_with_error!(&env, ElectionError::Unauthorized);
        }

        // One nullifier per credential per election
        let bound: U256 = env.invoke_contract(
            &sbt_contract,
            &Symbol::new(&env, "nullifier_for"),
            soroban_sdk::vec![&env, voter.into_val(&env), election_id.into_val(&env)],
        );
        if bound != nullifier {
            panic_with_error!(&env, ElectionError::InvalidInput);
        }

        let public_inputs =
            ballot_verifier::ballot_public_inputs(&env, &nullifier, election_id, candidate_id);
        let verifier = ProofVerifierClient::new(&env, &Self::verifier_contract(env.clone()));
        let accepted = matches!(verifier.try_verify(&proof, &public_inputs), Ok(Ok(true)));
        if !accepted {
            log!(&env, "ballot proof rejected", election_id, candidate_id);
            panic_with_error!(&env, ElectionError::InvalidProof);
        }

        env.storage().persistent().set(&null_key, &true);
        Self::record_ballot(&env, &mut election, &mut candidate);

        AnonVoted {
            election_id,
            candidate_id,
            nullifier,
        }
        .publish(&env);
    }

    /// Candidate roster in id order. Counts stay zero until Completed so an
    /// in-progress tally is never served.
    pub fn get_candidates(env: Env, election_id: u64) -> CandidateList {
        let election = Self::load_election(&env, election_id);
        let reveal = election.is_completed();

        let mut list = CandidateList {
            ids: Vec::new(&env),
            names: Vec::new(&env),
            vote_counts: Vec::new(&env),
        };
        for candidate in Self::candidates(&env, &election).iter() {
            list.ids.push_back(candidate.id);
            list.names.push_back(candidate.name);
            list.vote_counts
                .push_back(if reveal { candidate.vote_count } else { 0 });
        }
        list
    }

    /// Final tallies; fails with NotCompleted until the election is stopped.
    pub fn get_results(env: Env, election_id: u64) -> ElectionResults {
        let election = Self::load_completed(&env, election_id);

        let mut results = ElectionResults {
            name: election.name.clone(),
            ids: Vec::new(&env),
            names: Vec::new(&env),
            vote_counts: Vec::new(&env),
        };
        for candidate in Self::candidates(&env, &election).iter() {
            results.ids.push_back(candidate.id);
            results.names.push_back(candidate.name);
            results.vote_counts.push_back(candidate.vote_count);
        }
        results
    }

    /// Ids of every candidate holding the top count. Ties are never broken,
    /// and an election without ballots has no winner.
    pub fn get_winners(env: Env, election_id: u64) -> Vec<u32> {
        let election = Self::load_completed(&env, election_id);
        let candidates = Self::candidates(&env, &election);

        let mut winners = Vec::new(&env);
        let top = candidates.iter().map(|c| c.vote_count).max().unwrap_or(0);
        if top == 0 {
            return winners;
        }
        for candidate in candidates.iter() {
            if candidate.vote_count == top {
                winners.push_back(candidate.id);
            }
        }
        winners
    }

    pub fn get_election(env: Env, election_id: u64) -> Election {
        Self::load_election(&env, election_id)
    }

    /// (start_time, end_time); 0 marks a transition that has not happened
    pub fn get_election_times(env: Env, election_id: u64) -> (u64, u64) {
        let election = Self::load_election(&env, election_id);
        (election.start_time, election.end_time)
    }

    pub fn get_voter_count(env: Env, election_id: u64) -> u64 {
        Self::load_election(&env, election_id).voter_count
    }

    /// Get total number of elections created
    pub fn election_count(env: Env) -> u64 {
        env.storage().instance().get(&ELECTION_COUNT).unwrap_or(0)
    }

    pub fn has_voted(env: Env, election_id: u64, voter: Address) -> bool {
        Self::load_election(&env, election_id);
        env.storage()
            .persistent()
            .has(&DataKey::Voted(election_id, voter))
    }

    /// Check if nullifier has been used in this election
    pub fn is_nullifier_used(env: Env, election_id: u64, nullifier: U256) -> bool {
        Self::load_election(&env, election_id);
        env.storage()
            .persistent()
            .has(&DataKey::Nullifier(election_id, nullifier))
    }

    /// Direct-ballot voters in casting order, from offset to offset+limit.
    /// Anonymous ballots never appear here.
    pub fn get_voters(env: Env, election_id: u64, offset: u64, limit: u64) -> Vec<Address> {
        Self::load_election(&env, election_id);

        let mut voters = Vec::new(&env);
        let count: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::VoterListLen(election_id))
            .unwrap_or(0);
        let end = core::cmp::min(offset.saturating_add(limit), count);

        for i in offset..end {
            if let Some(voter) = env
                .storage()
                .persistent()
                .get(&DataKey::VoterAtIndex(election_id, i))
            {
                voters.push_back(voter);
            }
        }
        voters
    }

    pub fn sbt_contract(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&SBT_CONTRACT)
            .unwrap_or_else(|| panic_with_error!(&env, ElectionError::NotFound))
    }

    pub fn verifier_contract(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&VERIFIER)
            .unwrap_or_else(|| panic_with_error!(&env, ElectionError::NotFound))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    // Internal helpers

    fn validate_name(env: &Env, name: &String) {
        if name.len() == 0 || name.len() > MAX_NAME_LEN {
            panic_with_error!(env, ElectionError::InvalidInput);
        }
    }

    fn load_election(env: &Env, election_id: u64) -> Election {
        env.storage()
            .persistent()
            .get(&DataKey::Election(election_id))
            .unwrap_or_else(|| panic_with_error!(env, ElectionError::NotFound))
    }

    fn load_completed(env: &Env, election_id: u64) -> Election {
        let election = Self::load_election(env, election_id);
        if !election.is_completed() {
            panic_with_error!(env, ElectionError::NotCompleted);
        }
        election
    }

    fn save_election(env: &Env, election: &Election) {
        env.storage()
            .persistent()
            .set(&DataKey::Election(election.id), election);
    }

    fn require_admin(env: &Env, election: &Election, caller: &Address) {
        caller.require_auth();
        if caller != &election.admin {
            panic_with_error!(env, ElectionError::Unauthorized);
        }
    }

    fn require_open(env: &Env, election: &Election) {
        match election.status {
            ElectionStatus::Completed => panic_with_error!(env, ElectionError::AlreadyCompleted),
            ElectionStatus::Pending => panic_with_error!(env, ElectionError::NotActive),
            ElectionStatus::Active => {}
        }
    }

    fn load_candidate(env: &Env, election: &Election, candidate_id: u32) -> Candidate {
        if candidate_id == 0 || candidate_id > election.candidate_count {
            panic_with_error!(env, ElectionError::InvalidCandidate);
        }
        env.storage()
            .persistent()
            .get(&DataKey::Candidate(election.id, candidate_id))
            .unwrap_or_else(|| panic_with_error!(env, ElectionError::InvalidCandidate))
    }

    fn candidates(env: &Env, election: &Election) -> Vec<Candidate> {
        let mut candidates = Vec::new(env);
        for candidate_id in 1..=election.candidate_count {
            if let Some(candidate) = env
                .storage()
                .persistent()
                .get(&DataKey::Candidate(election.id, candidate_id))
            {
                candidates.push_back(candidate);
            }
        }
        candidates
    }

    fn record_ballot(env: &Env, election: &mut Election, candidate: &mut Candidate) {
        candidate.vote_count += 1;
        election.voter_count += 1;
        env.storage()
            .persistent()
            .set(&DataKey::Candidate(election.id, candidate.id), candidate);
        Self::save_election(env, election);
    }

    fn add_voter_to_list(env: &Env, election_id: u64, voter: &Address) {
        let len_key = DataKey::VoterListLen(election_id);
        let current: u64 = env.storage().persistent().get(&len_key).unwrap_or(0);

        env.storage()
            .persistent()
            .set(&DataKey::VoterAtIndex(election_id, current), voter);
        env.storage().persistent().set(&len_key, &(current + 1));
    }

    fn next_election_id(env: &Env) -> u64 {
        let count: u64 = env.storage().instance().get(&ELECTION_COUNT).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&ELECTION_COUNT, &new_id);
        new_id
    }
}
