//! # Treasury Contract
//!
//! Pooled funds held in a single token contract (Stellar Asset Contract
//! interface), disbursed only through proposals.
//!
//! Proposal lifecycle: `Submitted -> Approved -> Executed`, forward only.
//! A proposal is approved once `QUORUM` distinct addresses have voted for
//! it; anyone may then release the funds, once.

#![no_std]
use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, log, panic_with_error, symbol_short,
    token, Address, Env, String, Symbol,
};

const TOKEN: Symbol = symbol_short!("token");
const BALANCE: Symbol = symbol_short!("balance");
const PROPOSAL_COUNT: Symbol = symbol_short!("prop_cnt");
const VERSION: u32 = 1;
const VERSION_KEY: Symbol = symbol_short!("ver");

/// Distinct votes needed to approve a proposal
pub const QUORUM: u32 = 3;

const MAX_DESCRIPTION_LEN: u32 = 1024;

#[contracterror]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TreasuryError {
    NotFound = 1,
    AlreadyVoted = 8,
    InsufficientFunds = 11,
    InvalidInput = 12,
    AlreadyInitialized = 20,
    AlreadyExecuted = 21,
    NotApproved = 22,
}

#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Proposal(u64),
    Voted(u64, Address), // (proposal_id, voter) -> bool
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Address,
    pub description: String,
    pub amount: i128,
    pub recipient: Address,
    pub votes: u32,
    pub approved: bool,
    pub executed: bool,
    pub created_at: u64,
    pub executed_at: u64,
}

// Typed Events
#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct Deposited {
    #[topic]
    pub from: Address,
    pub amount: i128,
    pub new_balance: i128,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalSubmitted {
    #[topic]
    pub proposal_id: u64,
    pub proposer: Address,
    pub amount: i128,
    pub recipient: Address,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalVoted {
    #[topic]
    pub proposal_id: u64,
    #[topic]
    pub voter: Address,
    pub votes: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ProposalApproved {
    #[topic]
    pub proposal_id: u64,
    pub votes: u32,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct FundsReleased {
    #[topic]
    pub proposal_id: u64,
    #[topic]
    pub recipient: Address,
    pub amount: i128,
}

#[soroban_sdk::contractevent]
#[derive(Clone, Debug, PartialEq)]
pub struct ContractUpgraded {
    pub from: u32,
    pub to: u32,
}

#[contract]
pub struct Treasury;

#[contractimpl]
impl Treasury {
    /// Constructor: fix the token the treasury holds
    pub fn __constructor(env: Env, token: Address) {
        if env.storage().instance().has(&VERSION_KEY) {
            panic_with_error!(&env, TreasuryError::AlreadyInitialized);
        }
        env.storage().instance().set(&VERSION_KEY, &VERSION);
        ContractUpgraded {
            from: 0,
            to: VERSION,
        }
        .publish(&env);

        env.storage().instance().set(&TOKEN, &token);
        env.storage().instance().set(&BALANCE, &0i128);
    }

    /// Pull `amount` tokens from `from` into the treasury.
    pub fn deposit(env: Env, from: Address, amount: i128) {
        from.require_auth();

        if amount <= 0 {
            panic_with_error!(&env, TreasuryError::InvalidInput);
        }

        let token = token::Client::new(&env, &Self::token(env.clone()));
        token.transfer(&from, &env.current_contract_address(), &amount);

        let new_balance = Self::get_treasury_balance(env.clone()) + amount;
        env.storage().instance().set(&BALANCE, &new_balance);

        Deposited {
            from,
            amount,
            new_balance,
        }
        .publish(&env);
    }

    /// Open a spending proposal. The balance is only checked at release.
    pub fn submit_proposal(
        env: Env,
        proposer: Address,
        description: String,
        amount: i128,
        recipient: Address,
    ) -> u64 {
        proposer.require_auth();

        if amount <= 0 {
            panic_with_error!(&env, TreasuryError::InvalidInput);
        }
        if description.len() == 0 || description.len() > MAX_DESCRIPTION_LEN {
            panic_with_error!(&env, TreasuryError::InvalidInput);
        }
        if recipient == env.current_contract_address() {
            panic_with_error!(&env, TreasuryError::InvalidInput);
        }

        let proposal_id = Self::next_proposal_id(&env);
        let proposal = Proposal {
            id: proposal_id,
            proposer: proposer.clone(),
            description,
            amount,
            recipient: recipient.clone(),
            votes: 0,
            approved: false,
            executed: false,
            created_at: env.ledger().timestamp(),
            executed_at: 0,
        };
        Self::save_proposal(&env, &proposal);

        ProposalSubmitted {
            proposal_id,
            proposer,
            amount,
            recipient,
        }
        .publish(&env);

        proposal_id
    }

    /// One vote per address per proposal. Voting stays open after approval
    /// until the proposal is executed.
    pub fn vote_on_proposal(env: Env, proposal_id: u64, voter: Address) {
        voter.require_auth();

        let mut proposal = Self::load_proposal(&env, proposal_id);
        if proposal.executed {
            panic_with_error!(&env, TreasuryError::AlreadyExecuted);
        }

        let voted_key = DataKey::Voted(proposal_id, voter.clone());
        if env.storage().persistent().has(&voted_key) {
            panic_with_error!(&env, TreasuryError::AlreadyVoted);
        }

        proposal.votes += 1;
        let crossed = !proposal.approved && proposal.votes >= QUORUM;
        if crossed {
            proposal.approved = true;
        }

        env.storage().persistent().set(&voted_key, &true);
        Self::save_proposal(&env, &proposal);

        ProposalVoted {
            proposal_id,
            voter,
            votes: proposal.votes,
        }
        .publish(&env);

        if crossed {
            ProposalApproved {
                proposal_id,
                votes: proposal.votes,
            }
            .publish(&env);
        }
    }

    /// Pay out an approved proposal. The proposal is marked executed and the
    /// balance debited before the token transfer.
    pub fn release_funds(env: Env, proposal_id: u64) {
        let mut proposal = Self::load_proposal(&env, proposal_id);

        if proposal.executed {
            panic_with_error!(&env, TreasuryError::AlreadyExecuted);
        }
        if !proposal.approved {
            panic_with_error!(&env, TreasuryError::NotApproved);
        }

        let balance = Self::get_treasury_balance(env.clone());
        if balance < proposal.amount {
            log!(&env, "release exceeds balance", proposal_id, balance);
            panic_with_error!(&env, TreasuryError::InsufficientFunds);
        }

        proposal.executed = true;
        proposal.executed_at = env.ledger().timestamp();
        Self::save_proposal(&env, &proposal);
        env.storage()
            .instance()
            .set(&BALANCE, &(balance - proposal.amount));

        let token = token::Client::new(&env, &Self::token(env.clone()));
        token.transfer(
            &env.current_contract_address(),
            &proposal.recipient,
            &proposal.amount,
        );

        FundsReleased {
            proposal_id,
            recipient: proposal.recipient,
            amount: proposal.amount,
        }
        .publish(&env);
    }

    pub fn get_treasury_balance(env: Env) -> i128 {
        env.storage().instance().get(&BALANCE).unwrap_or(0)
    }

    pub fn get_proposal(env: Env, proposal_id: u64) -> Proposal {
        Self::load_proposal(&env, proposal_id)
    }

    pub fn proposal_count(env: Env) -> u64 {
        env.storage().instance().get(&PROPOSAL_COUNT).unwrap_or(0)
    }

    pub fn has_voted(env: Env, proposal_id: u64, voter: Address) -> bool {
        Self::load_proposal(&env, proposal_id);
        env.storage()
            .persistent()
            .has(&DataKey::Voted(proposal_id, voter))
    }

    pub fn quorum() -> u32 {
        QUORUM
    }

    pub fn token(env: Env) -> Address {
        env.storage()
            .instance()
            .get(&TOKEN)
            .unwrap_or_else(|| panic_with_error!(&env, TreasuryError::NotFound))
    }

    /// Contract version for upgrade tracking.
    pub fn version(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&VERSION_KEY)
            .unwrap_or(VERSION)
    }

    fn load_proposal(env: &Env, proposal_id: u64) -> Proposal {
        env.storage()
            .persistent()
            .get(&DataKey::Proposal(proposal_id))
            .unwrap_or_else(|| panic_with_error!(env, TreasuryError::NotFound))
    }

    fn save_proposal(env: &Env, proposal: &Proposal) {
        env.storage()
            .persistent()
            .set(&DataKey::Proposal(proposal.id), proposal);
    }

    fn next_proposal_id(env: &Env) -> u64 {
        let count: u64 = env.storage().instance().get(&PROPOSAL_COUNT).unwrap_or(0);
        let new_id = count + 1;
        env.storage().instance().set(&PROPOSAL_COUNT, &new_id);
        new_id
    }
}
