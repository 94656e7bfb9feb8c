#![no_std]

// Integration test crate - all code is test-only

#[cfg(test)]
mod tests {
    extern crate std;
    use soroban_sdk::{
        testutils::Address as _, testutils::Ledger as _, token, token::StellarAssetClient,
        Address, BytesN, Env, String, Vec, U256,
    };

    // Import actual contract clients
    use election_registry::{ElectionError, ElectionRegistryClient};
    use groth16_verifier::{Groth16VerifierClient, Proof, VerificationKey};
    use treasury::{TreasuryClient, TreasuryError};
    use voter_sbt::VoterSbtClient;

    /// Helper to setup the full voting and treasury system
    struct CivicSystem {
        env: Env,
        admin: Address,
        sbt: Address,
        verifier: Address,
        registry: Address,
        treasury: Address,
        token: Address,
    }

    impl CivicSystem {
        fn new() -> Self {
            let env = Env::default();
            env.mock_all_auths();

            let admin = Address::generate(&env);

            // Register all contracts with constructors
            let sbt = env.register(voter_sbt::VoterSbt, (admin.clone(),));
            let verifier = env.register(groth16_verifier::Groth16Verifier, (admin.clone(),));
            let registry = env.register(
                election_registry::ElectionRegistry,
                (sbt.clone(), verifier.clone()),
            );
            let token = env
                .register_stellar_asset_contract_v2(admin.clone())
                .address();
            let treasury = env.register(treasury::Treasury, (token.clone(),));

            let system = Self {
                env,
                admin,
                sbt,
                verifier,
                registry,
                treasury,
                token,
            };
            system
                .verifier_client()
                .set_vk(&system.admin, &system.create_test_vk());
            system
        }

        fn sbt_client(&self) -> VoterSbtClient {
            VoterSbtClient::new(&self.env, &self.sbt)
        }

        fn verifier_client(&self) -> Groth16VerifierClient {
            Groth16VerifierClient::new(&self.env, &self.verifier)
        }

        fn registry_client(&self) -> ElectionRegistryClient {
            ElectionRegistryClient::new(&self.env, &self.registry)
        }

        fn treasury_client(&self) -> TreasuryClient {
            TreasuryClient::new(&self.env, &self.treasury)
        }

        fn token_client(&self) -> token::Client {
            token::Client::new(&self.env, &self.token)
        }

        fn str(&self, s: &str) -> String {
            String::from_str(&self.env, s)
        }

        /// Apply and approve a fresh identity, returning it
        fn enroll(&self, seed: u32) -> Address {
            let citizen = Address::generate(&self.env);
            let sbt = self.sbt_client();
            sbt.apply(&citizen, &BytesN::from_array(&self.env, &[seed as u8; 32]));
            sbt.approve(&citizen, &U256::from_u32(&self.env, seed));
            citizen
        }

        fn open_election(&self, name: &str, candidates: &[&str]) -> u64 {
            let registry = self.registry_client();
            let id = registry.create_election(&self.admin, &self.str(name));
            for candidate in candidates {
                registry.add_candidate(&id, &self.admin, &self.str(candidate));
            }
            registry.start_election(&id, &self.admin);
            id
        }

        /// Anonymous ballot with the nullifier the SBT derives for `citizen`
        fn cast_anonymous(&self, election_id: u64, candidate_id: u32, citizen: &Address) {
            let nullifier = self.sbt_client().nullifier_for(citizen, &election_id);
            self.registry_client().zk_vote(
                &election_id,
                &candidate_id,
                citizen,
                &nullifier,
                &self.create_test_proof(),
            );
        }

        fn create_test_vk(&self) -> VerificationKey {
            let g1_gen = self.bn254_g1_generator();
            let g2_gen = self.bn254_g2_generator();

            VerificationKey {
                alpha: g1_gen.clone(),
                beta: g2_gen.clone(),
                gamma: g2_gen.clone(),
                delta: g2_gen,
                // Public signals: [nullifier, electionId, candidateId]
                ic: Vec::from_array(
                    &self.env,
                    [
                        g1_gen.clone(), // IC[0] base
                        g1_gen.clone(), // IC[1] for nullifier
                        g1_gen.clone(), // IC[2] for electionId
                        g1_gen,         // IC[3] for candidateId
                    ],
                ),
            }
        }

        fn create_test_proof(&self) -> Proof {
            let g1_gen = self.bn254_g1_generator();
            Proof {
                a: g1_gen.clone(),
                b: self.bn254_g2_generator(),
                c: g1_gen,
            }
        }

        // BN254 G1 generator: (1, 2)
        fn bn254_g1_generator(&self) -> BytesN<64> {
            let mut bytes = [0u8; 64];
            bytes[31] = 1;
            bytes[63] = 2;
            BytesN::from_array(&self.env, &bytes)
        }

        fn bn254_g2_generator(&self) -> BytesN<128> {
            let raw = hex::decode(concat!(
                "1800deef121f1e76426a00665e5c4479674322d4f75edadd46debd5cd992f6ed",
                "198e9393920d483a7260bfb731fb5d25f1aa493335a9e71297e485b7aef312c2",
                "12c85ea5db8c6deb4aab71808dcb408fe3d1e7690c43d37b4ce6cc0166fa7daa",
                "090689d0585ff075ec9e99ad690c3395bc4b313370b38ef355acdadcd122975b"
            ))
            .expect("invalid hex");
            let mut bytes = [0u8; 128];
            bytes.copy_from_slice(&raw);
            BytesN::from_array(&self.env, &bytes)
        }
    }

    #[test]
    fn test_enrolment_then_anonymous_ballot() {
        let system = CivicSystem::new();
        let registry = system.registry_client();

        let citizen = system.enroll(11);
        assert!(system.sbt_client().is_registered(&citizen));

        let id = system.open_election("Mayoral Race", &["Alice", "Bob"]);
        system.cast_anonymous(id, 2, &citizen);

        let nullifier = system.sbt_client().nullifier_for(&citizen, &id);
        assert!(registry.is_nullifier_used(&id, &nullifier));
        assert!(!registry.has_voted(&id, &citizen));
        assert_eq!(registry.get_voter_count(&id), 1);
    }

    #[test]
    fn test_mayoral_race_mixed_ballots() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let id = system.open_election("Mayoral Race", &["Alice", "Bob"]);

        registry.vote(&id, &1, &Address::generate(&system.env));
        system.cast_anonymous(id, 2, &system.enroll(21));
        system.cast_anonymous(id, 1, &system.enroll(22));

        registry.stop_election(&id, &system.admin);

        let results = registry.get_results(&id);
        assert_eq!(results.name, system.str("Mayoral Race"));
        assert_eq!(results.vote_counts, soroban_sdk::vec![&system.env, 2u64, 1]);
        assert_eq!(registry.get_winners(&id), soroban_sdk::vec![&system.env, 1u32]);
    }

    #[test]
    fn test_anonymous_double_vote_rejected() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let citizen = system.enroll(31);
        let id = system.open_election("Budget Vote", &["Yes", "No"]);

        system.cast_anonymous(id, 1, &citizen);

        let nullifier = system.sbt_client().nullifier_for(&citizen, &id);
        let res = registry.try_zk_vote(
            &id,
            &2,
            &citizen,
            &nullifier,
            &system.create_test_proof(),
        );
        assert_eq!(res, Err(Ok(ElectionError::AlreadyVoted)));
        assert_eq!(registry.get_voter_count(&id), 1);
    }

    #[test]
    fn test_fresh_nullifier_cannot_buy_a_second_ballot() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let citizen = system.enroll(7);
        let id = system.open_election("Budget Vote", &["Yes", "No"]);

        system.cast_anonymous(id, 1, &citizen);

        for fresh in 1..4u32 {
            let res = registry.try_zk_vote(
                &id,
                &1,
                &citizen,
                &U256::from_u32(&system.env, fresh),
                &system.create_test_proof(),
            );
            assert_eq!(res, Err(Ok(ElectionError::InvalidInput)));
        }

        // Another credential's nullifier is rejected too
        let other = system.enroll(8);
        let foreign = system.sbt_client().nullifier_for(&other, &id);
        let res = registry.try_zk_vote(&id, &2, &citizen, &foreign, &system.create_test_proof());
        assert_eq!(res, Err(Ok(ElectionError::InvalidInput)));

        assert_eq!(registry.get_voter_count(&id), 1);
    }

    #[test]
    fn test_credential_votes_once_per_election_across_elections() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let citizen = system.enroll(41);

        let school = system.open_election("School Board", &["A", "B"]);
        let city = system.open_election("City Council", &["C", "D"]);

        system.cast_anonymous(school, 1, &citizen);
        system.cast_anonymous(city, 2, &citizen);

        assert_ne!(
            system.sbt_client().nullifier_for(&citizen, &school),
            system.sbt_client().nullifier_for(&citizen, &city)
        );
        assert_eq!(registry.get_voter_count(&school), 1);
        assert_eq!(registry.get_voter_count(&city), 1);
    }

    #[test]
    fn test_pending_applicant_cannot_vote_anonymously() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let id = system.open_election("Referendum", &["Yes", "No"]);

        let applicant = Address::generate(&system.env);
        system
            .sbt_client()
            .apply(&applicant, &BytesN::from_array(&system.env, &[9u8; 32]));

        let res = registry.try_zk_vote(
            &id,
            &1,
            &applicant,
            &U256::from_u32(&system.env, 123),
            &system.create_test_proof(),
        );
        assert_eq!(res, Err(Ok(ElectionError::Unauthorized)));
        assert_eq!(registry.get_voter_count(&id), 0);
    }

    #[test]
    fn test_missing_verification_key_rejects_ballot() {
        let env = Env::default();
        env.mock_all_auths();

        let admin = Address::generate(&env);
        let sbt = env.register(voter_sbt::VoterSbt, (admin.clone(),));
        // Verifier without a key
        let verifier = env.register(groth16_verifier::Groth16Verifier, (admin.clone(),));
        let registry_id = env.register(
            election_registry::ElectionRegistry,
            (sbt.clone(), verifier.clone()),
        );
        let sbt_client = VoterSbtClient::new(&env, &sbt);
        let registry = ElectionRegistryClient::new(&env, &registry_id);

        let citizen = Address::generate(&env);
        sbt_client.apply(&citizen, &BytesN::from_array(&env, &[1u8; 32]));
        sbt_client.approve(&citizen, &U256::from_u32(&env, 5));

        let id = registry.create_election(&admin, &String::from_str(&env, "Keyless"));
        registry.add_candidate(&id, &admin, &String::from_str(&env, "Only"));
        registry.start_election(&id, &admin);

        let nullifier = sbt_client.nullifier_for(&citizen, &id);
        let mut g1 = [0u8; 64];
        g1[31] = 1;
        g1[63] = 2;
        let proof = Proof {
            a: BytesN::from_array(&env, &g1),
            b: BytesN::from_array(&env, &[0u8; 128]),
            c: BytesN::from_array(&env, &g1),
        };

        let res = registry.try_zk_vote(&id, &1, &citizen, &nullifier, &proof);
        assert_eq!(res, Err(Ok(ElectionError::InvalidProof)));
        assert!(!registry.is_nullifier_used(&id, &nullifier));
    }

    #[test]
    fn test_no_ballot_after_stop() {
        let system = CivicSystem::new();
        let registry = system.registry_client();
        let citizen = system.enroll(51);
        let id = system.open_election("Closed", &["A"]);

        registry.stop_election(&id, &system.admin);

        let nullifier = system.sbt_client().nullifier_for(&citizen, &id);
        let res = registry.try_zk_vote(&id, &1, &citizen, &nullifier, &system.create_test_proof());
        assert_eq!(res, Err(Ok(ElectionError::AlreadyCompleted)));

        let res = registry.try_vote(&id, &1, &citizen);
        assert_eq!(res, Err(Ok(ElectionError::AlreadyCompleted)));
    }

    #[test]
    fn test_treasury_proposal_lifecycle() {
        let system = CivicSystem::new();
        let treasury = system.treasury_client();

        let funder = Address::generate(&system.env);
        let recipient = Address::generate(&system.env);
        StellarAssetClient::new(&system.env, &system.token).mint(&funder, &10);

        treasury.deposit(&funder, &10);
        assert_eq!(treasury.get_treasury_balance(), 10);

        system.env.ledger().set_timestamp(1_700_000_000);
        let proposal_id = treasury.submit_proposal(
            &funder,
            &system.str("Repaint the town hall"),
            &5,
            &recipient,
        );

        // Enrolled citizens vote on the proposal
        for seed in 61..64u32 {
            treasury.vote_on_proposal(&proposal_id, &system.enroll(seed));
        }
        assert!(treasury.get_proposal(&proposal_id).approved);

        treasury.release_funds(&proposal_id);
        assert_eq!(treasury.get_treasury_balance(), 5);
        assert_eq!(system.token_client().balance(&recipient), 5);

        let res = treasury.try_release_funds(&proposal_id);
        assert_eq!(res, Err(Ok(TreasuryError::AlreadyExecuted)));
        assert_eq!(treasury.get_treasury_balance(), 5);
    }

    #[test]
    fn test_treasury_balance_matches_token_holdings() {
        let system = CivicSystem::new();
        let treasury = system.treasury_client();
        let funder = Address::generate(&system.env);
        StellarAssetClient::new(&system.env, &system.token).mint(&funder, &100);

        treasury.deposit(&funder, &40);
        treasury.deposit(&funder, &20);

        let small = treasury.submit_proposal(
            &funder,
            &system.str("Library books"),
            &15,
            &Address::generate(&system.env),
        );
        let large = treasury.submit_proposal(
            &funder,
            &system.str("New bridge"),
            &90,
            &Address::generate(&system.env),
        );
        for proposal_id in [small, large] {
            for _ in 0..treasury.quorum() {
                treasury.vote_on_proposal(&proposal_id, &Address::generate(&system.env));
            }
        }

        treasury.release_funds(&small);
        let res = treasury.try_release_funds(&large);
        assert_eq!(res, Err(Ok(TreasuryError::InsufficientFunds)));

        assert_eq!(treasury.get_treasury_balance(), 45);
        assert_eq!(
            system.token_client().balance(&system.treasury),
            treasury.get_treasury_balance()
        );
    }
}
