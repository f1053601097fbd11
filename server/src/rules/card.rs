//! The three-player card game.
//!
//! Each player is dealt three cards from a shuffled 1..=15 deck and plays
//! one card per round together with a MAX/MIN vote, simultaneously. With
//! two or more MIN votes the smallest card wins the round, otherwise the
//! largest. After three rounds the role with strictly the most round wins
//! takes the match; any tie at the top is a draw.

use super::{GameRules, RoundVerdict, RuleViolation};
use rand::seq::SliceRandom;
use rand::thread_rng;
use shared::{CardMove, MatchWinner, Mode, Move, Role, Turn};
use std::cmp::Reverse;
use std::collections::BTreeMap;

pub const ROUNDS: u32 = 3;
pub const HAND_SIZE: usize = 3;
const DECK_TOP: u8 = 15;

#[derive(Debug)]
pub struct CardRules;

impl CardRules {
    pub fn new() -> Self {
        CardRules
    }
}

impl Default for CardRules {
    fn default() -> Self {
        CardRules::new()
    }
}

impl GameRules for CardRules {
    fn name(&self) -> &'static str {
        "card3p"
    }

    fn required_players(&self) -> u8 {
        3
    }

    fn initial_deal(&mut self, roles: &[Role]) -> BTreeMap<Role, Vec<u8>> {
        let mut deck: Vec<u8> = (1..=DECK_TOP).collect();
        deck.shuffle(&mut thread_rng());

        roles
            .iter()
            .enumerate()
            .map(|(seat, role)| {
                let mut hand = deck[seat * HAND_SIZE..(seat + 1) * HAND_SIZE].to_vec();
                hand.sort_unstable();
                (*role, hand)
            })
            .collect()
    }

    fn turn(&self, _round: u32) -> Turn {
        Turn::All
    }

    fn resolve_round(
        &mut self,
        moves: &BTreeMap<Role, Move>,
    ) -> Result<RoundVerdict, RuleViolation> {
        let mut plays: BTreeMap<Role, CardMove> = BTreeMap::new();
        for (role, submitted) in moves {
            match submitted {
                Move::Card(play) => {
                    plays.insert(*role, *play);
                }
                Move::Cell(_) => return Err(RuleViolation::WrongShape { role: *role }),
            }
        }

        let min_votes = plays.values().filter(|play| play.mode == Mode::Min).count();

        // Two or more MIN votes flip the round to smallest-card-wins.
        // min_by_key keeps the first of equal keys, so a value tie always
        // goes to the lowest role in canonical order.
        let winner = if min_votes >= 2 {
            plays.iter().min_by_key(|(_, play)| play.card)
        } else {
            plays.iter().min_by_key(|(_, play)| Reverse(play.card))
        };

        match winner {
            Some((role, _)) => Ok(RoundVerdict::Winner(*role)),
            None => Ok(RoundVerdict::Undecided),
        }
    }

    fn resolve_match(
        &self,
        totals: &BTreeMap<Role, u32>,
        rounds_played: u32,
    ) -> Option<MatchWinner> {
        if rounds_played < ROUNDS {
            return None;
        }

        let best = totals.values().copied().max().unwrap_or(0);
        let mut leaders = totals.iter().filter(|(_, wins)| **wins == best);
        let first = leaders.next().map(|(role, _)| *role)?;
        if leaders.next().is_some() {
            Some(MatchWinner::Draw)
        } else {
            Some(MatchWinner::Player(first))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(value: u8, mode: Mode) -> Move {
        Move::Card(CardMove { card: value, mode })
    }

    fn moves(entries: &[(u8, Move)]) -> BTreeMap<Role, Move> {
        entries
            .iter()
            .map(|(seat, submitted)| (Role::new(*seat), *submitted))
            .collect()
    }

    fn totals(entries: &[(u8, u32)]) -> BTreeMap<Role, u32> {
        entries
            .iter()
            .map(|(seat, wins)| (Role::new(*seat), *wins))
            .collect()
    }

    #[test]
    fn test_deal_hands_three_sorted_distinct_cards() {
        let mut rules = CardRules::new();
        let roles = Role::first(3);
        let hands = rules.initial_deal(&roles);

        assert_eq!(hands.len(), 3);
        let mut seen = Vec::new();
        for role in &roles {
            let hand = &hands[role];
            assert_eq!(hand.len(), HAND_SIZE);
            let mut sorted = hand.clone();
            sorted.sort_unstable();
            assert_eq!(&sorted, hand);
            assert!(hand.iter().all(|card| (1..=DECK_TOP).contains(card)));
            seen.extend_from_slice(hand);
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 9, "dealt cards must not repeat");
    }

    #[test]
    fn test_largest_card_wins_with_fewer_than_two_min_votes() {
        let mut rules = CardRules::new();
        let submitted = moves(&[
            (1, card(10, Mode::Max)),
            (2, card(5, Mode::Min)),
            (3, card(12, Mode::Max)),
        ]);
        assert_eq!(
            rules.resolve_round(&submitted).unwrap(),
            RoundVerdict::Winner(Role::new(3))
        );
    }

    #[test]
    fn test_smallest_card_wins_with_two_min_votes() {
        let mut rules = CardRules::new();
        let submitted = moves(&[
            (1, card(3, Mode::Min)),
            (2, card(7, Mode::Min)),
            (3, card(1, Mode::Max)),
        ]);
        assert_eq!(
            rules.resolve_round(&submitted).unwrap(),
            RoundVerdict::Winner(Role::new(3))
        );
    }

    #[test]
    fn test_round_resolution_ignores_arrival_order() {
        let mut rules = CardRules::new();
        let forward = moves(&[
            (1, card(4, Mode::Max)),
            (2, card(9, Mode::Max)),
            (3, card(2, Mode::Min)),
        ]);
        let mut reversed = BTreeMap::new();
        for (role, submitted) in forward.iter().rev() {
            reversed.insert(*role, *submitted);
        }

        let first = rules.resolve_round(&forward).unwrap();
        let second = rules.resolve_round(&reversed).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, RoundVerdict::Winner(Role::new(2)));
    }

    #[test]
    fn test_value_tie_goes_to_lowest_role() {
        let mut rules = CardRules::new();
        let submitted = moves(&[
            (1, card(5, Mode::Max)),
            (2, card(10, Mode::Max)),
            (3, card(10, Mode::Max)),
        ]);
        assert_eq!(
            rules.resolve_round(&submitted).unwrap(),
            RoundVerdict::Winner(Role::new(2))
        );

        let min_tie = moves(&[
            (1, card(2, Mode::Min)),
            (2, card(2, Mode::Min)),
            (3, card(9, Mode::Max)),
        ]);
        assert_eq!(
            rules.resolve_round(&min_tie).unwrap(),
            RoundVerdict::Winner(Role::new(1))
        );
    }

    #[test]
    fn test_board_move_is_wrong_shape() {
        let mut rules = CardRules::new();
        let submitted = moves(&[
            (1, card(5, Mode::Max)),
            (2, Move::Cell(4)),
            (3, card(9, Mode::Max)),
        ]);
        assert_eq!(
            rules.resolve_round(&submitted),
            Err(RuleViolation::WrongShape { role: Role::new(2) })
        );
    }

    #[test]
    fn test_no_decision_before_final_round() {
        let rules = CardRules::new();
        assert_eq!(rules.resolve_match(&totals(&[(1, 1), (2, 0), (3, 0)]), 1), None);
        assert_eq!(rules.resolve_match(&totals(&[(1, 1), (2, 1), (3, 0)]), 2), None);
    }

    #[test]
    fn test_highest_total_wins_the_match() {
        let rules = CardRules::new();
        assert_eq!(
            rules.resolve_match(&totals(&[(1, 2), (2, 1), (3, 0)]), ROUNDS),
            Some(MatchWinner::Player(Role::new(1)))
        );
    }

    #[test]
    fn test_tie_at_the_top_is_a_draw() {
        let rules = CardRules::new();
        assert_eq!(
            rules.resolve_match(&totals(&[(1, 1), (2, 1), (3, 1)]), ROUNDS),
            Some(MatchWinner::Draw)
        );
        assert_eq!(
            rules.resolve_match(&totals(&[(1, 0), (2, 2), (3, 1)]), ROUNDS),
            Some(MatchWinner::Player(Role::new(2)))
        );
    }
}
