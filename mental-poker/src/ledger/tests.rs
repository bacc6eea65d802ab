#[cfg(test)]
mod test {
    use crate::card::{Card, Deck, Rank, Suit};
    use crate::encrypted_deck::{EncryptedDeck, ShuffledDeck};
    use crate::error::ProtocolError;
    use crate::ledger::{Bet, GameLogger, RoundLogger};
    use crate::protocols::random_deck::derive_points;

    use proof_essentials::commitment::HashCommitment;
    use proof_essentials::homomorphic_encryption::{
        sra::{Parameters, SecretKey, Sra},
        CommutativeEncryptionScheme,
    };
    use proof_essentials::utils::encoding::to_hex;
    use rand::thread_rng;
    use sha2::Sha256;

    type Curve = ark_bn254::G1Projective;

    /// Unshuffled deck locked by one per-position key per player, as each
    /// player sees it.
    fn locked_decks(players: usize, size: usize) -> Vec<ShuffledDeck<Curve>> {
        let rng = &mut thread_rng();
        let params = Parameters::<Curve>::default();
        let base = derive_points::<Curve>(3, size);
        let mut encrypted = EncryptedDeck::new(params, &base);
        let keys: Vec<Vec<SecretKey<Curve>>> = (0..players)
            .map(|_| {
                (0..size)
                    .map(|_| Sra::<Curve>::keygen(&params, rng).unwrap().1)
                    .collect()
            })
            .collect();
        for k in &keys {
            encrypted.encrypt_separate(k).unwrap();
        }

        keys.into_iter()
            .map(|keys| ShuffledDeck {
                original: Deck::new(size).unwrap(),
                base: base.clone(),
                encrypted: encrypted.clone(),
                keys,
            })
            .collect()
    }

    fn round_robin(players: usize, size: usize) -> Vec<Option<usize>> {
        (0..size).map(|p| Some(p % players)).collect()
    }

    fn opening(position: usize, key: &SecretKey<Curve>, salt: &str) -> String {
        format!("{} {} {}", position, to_hex(key).unwrap(), salt)
    }

    #[test]
    fn test_hand_decrypts_with_every_key() {
        let decks = locked_decks(2, 32);
        let theirs = decks[1].keys.clone();
        let mut ledger = RoundLogger::new(2, decks[0].clone(), round_robin(2, 32)).unwrap();
        ledger.register_own_keys(0).unwrap();

        for position in ledger.positions_of(0) {
            assert_eq!(ledger.card_at(position), None);
            let card = ledger.register_card_key(1, position, theirs[position]).unwrap();
            assert_eq!(card, Deck::new(32).unwrap().get(position));
        }
        for position in ledger.positions_of(1) {
            assert_eq!(ledger.card_at(position), None);
        }
        assert_eq!(ledger.user_keys_hash(1).unwrap(), None);
        assert!(ledger.user_keys_hash(0).unwrap().is_some());
    }

    #[test]
    fn test_wrong_key_never_yields_a_card() {
        let decks = locked_decks(2, 32);
        let theirs = decks[1].keys.clone();
        let mut ledger = RoundLogger::new(2, decks[0].clone(), round_robin(2, 32)).unwrap();
        ledger.register_own_keys(0).unwrap();

        assert_eq!(
            ledger.register_card_key(1, 0, theirs[2]),
            Err(ProtocolError::InvalidKey { position: 0 })
        );
        assert_eq!(ledger.card_at(0), None);

        ledger.register_card_key(1, 0, theirs[0]).unwrap();
        // repeating the recorded key is fine, changing it is not
        assert!(ledger.register_card_key(1, 0, theirs[0]).is_ok());
        assert_eq!(
            ledger.register_card_key(1, 0, theirs[4]),
            Err(ProtocolError::InvalidKey { position: 0 })
        );
        assert!(ledger.register_card_key(2, 0, theirs[0]).is_err());
    }

    #[test]
    fn test_opening_reveals_committed_card() {
        let decks = locked_decks(2, 32);
        let bob_keys = decks[1].keys.clone();
        let mut ledger = RoundLogger::new(2, decks[0].clone(), round_robin(2, 32)).unwrap();
        ledger.register_own_keys(0).unwrap();

        let open = opening(1, &bob_keys[1], "pepper");
        let hash = HashCommitment::<Sha256>::commit(&open);
        ledger
            .register_add_play_hashes(1, 1, Some(Rank::Ace), vec![hash])
            .unwrap();
        assert!(!ledger.is_new_stack());

        assert!(matches!(
            ledger.register_opening(0, 0, 0, &open),
            Err(ProtocolError::MalformedMove(_))
        ));
        assert!(matches!(
            ledger.register_opening(1, 0, 0, &opening(1, &bob_keys[1], "salt")),
            Err(ProtocolError::ProtocolDisagreement(_))
        ));

        let card = ledger.register_opening(1, 0, 0, &open).unwrap();
        assert_eq!(Some(card), Deck::new(32).unwrap().get(1));

        let taken = ledger.resolve_stack(0).unwrap();
        assert_eq!(taken, vec![(1, card)]);
        assert_eq!(ledger.owner(1), Some(0));
        assert!(ledger.is_new_stack());
    }

    #[test]
    fn test_opening_of_foreign_position_is_cheating() {
        let decks = locked_decks(2, 32);
        let alice_keys = decks[0].keys.clone();
        let mut ledger = RoundLogger::new(2, decks[1].clone(), round_robin(2, 32)).unwrap();
        ledger.register_own_keys(1).unwrap();

        // position 0 belongs to seat 0
        let open = opening(0, &alice_keys[0], "pepper");
        ledger
            .register_add_play_hashes(1, 1, Some(Rank::Two), vec![HashCommitment::<Sha256>::commit(&open)])
            .unwrap();
        assert!(matches!(
            ledger.register_opening(1, 0, 0, &open),
            Err(ProtocolError::ProtocolDisagreement(_))
        ));
        assert!(ledger.resolve_stack(1).is_err());
    }

    #[test]
    fn test_face_up_plays_need_ownership() {
        let decks = locked_decks(2, 32);
        let bob_keys = decks[1].keys.clone();
        let alice_keys = decks[0].keys.clone();
        let mut ledger = RoundLogger::new(2, decks[0].clone(), round_robin(2, 32)).unwrap();
        for position in 0..32 {
            ledger.register_card_key(0, position, alice_keys[position]).unwrap();
            ledger.register_card_key(1, position, bob_keys[position]).unwrap();
        }
        ledger.update_bet(Bet::Game {
            tricks: 6,
            trump: Some(Suit::Hearts),
        });

        let seven_of_clubs = Card::new(Rank::Seven, Suit::Clubs);
        assert_eq!(ledger.card_at(0), Some(seven_of_clubs));
        assert!(ledger.register_play(1, seven_of_clubs).is_err());
        assert_eq!(ledger.register_play(0, seven_of_clubs).unwrap(), 1);
        assert!(!ledger.new_turn_started());
        assert!(!ledger.round_finished());
        assert!(ledger.format_log().starts_with("Round status: FAIL"));
    }

    #[test]
    fn test_game_logger_keeps_rounds() {
        let decks = locked_decks(2, 32);
        let mut game = GameLogger::default();
        assert!(game.current().is_none());
        game.new_round(RoundLogger::new(2, decks[0].clone(), round_robin(2, 32)).unwrap());
        game.new_round(RoundLogger::new(2, decks[1].clone(), round_robin(2, 32)).unwrap());

        assert_eq!(game.rounds().len(), 2);
        assert_eq!(game.current().unwrap().players(), 2);
        assert!(game.current_mut().is_some());
        assert_eq!(game.format_log().matches("Round status").count(), 2);
    }

    #[test]
    fn test_round_needs_players() {
        let decks = locked_decks(2, 32);
        assert!(matches!(
            RoundLogger::new(0, decks[0].clone(), vec![None; 32]),
            Err(ProtocolError::InvalidConfig(_))
        ));
        assert!(matches!(
            RoundLogger::new(2, decks[0].clone(), round_robin(3, 32)),
            Err(ProtocolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_owner_table_must_cover_deck() {
        let decks = locked_decks(2, 32);
        assert!(matches!(
            RoundLogger::new(2, decks[0].clone(), round_robin(2, 31)),
            Err(ProtocolError::InvalidConfig(_))
        ));
    }
}
