//! Card primitives shared by the blackjack engine.
//!
//! Cards are encoded as a single byte 0..52: rank index `card % 13`
//! (0 = Ace, 9 = Ten, 12 = King), suit index `card / 13`.

use rand::seq::SliceRandom;
use rand::Rng;

pub const DECK_SIZE: usize = 52;

pub fn is_valid_card(card: u8) -> bool {
    (card as usize) < DECK_SIZE
}

/// Rank index 0..13 (0 = Ace).
pub fn card_rank(card: u8) -> u8 {
    card % 13
}

/// Suit index 0..4.
pub fn card_suit(card: u8) -> u8 {
    card / 13
}

/// A freshly shuffled single deck.
pub fn fresh_deck(rng: &mut impl Rng) -> Vec<u8> {
    let mut deck: Vec<u8> = (0..DECK_SIZE as u8).collect();
    deck.shuffle(rng);
    deck
}

/// Blackjack value of a hand and whether it is soft (an ace still counted
/// as 11).
pub fn hand_value(cards: &[u8]) -> (u8, bool) {
    let mut value: u16 = 0;
    let mut aces: u8 = 0;

    for &card in cards {
        let rank = (card % 13) + 1; // 1=Ace, 2-10, 11=J, 12=Q, 13=K
        if rank == 1 {
            aces += 1;
            value += 11;
        } else if rank >= 10 {
            value += 10;
        } else {
            value += rank as u16;
        }
    }

    while value > 21 && aces > 0 {
        value -= 10;
        aces -= 1;
    }

    let is_soft = aces > 0 && value <= 21;
    (value.min(255) as u8, is_soft)
}

/// 21 with exactly two cards.
pub fn is_blackjack(cards: &[u8]) -> bool {
    cards.len() == 2 && hand_value(cards).0 == 21
}

/// Short human label, e.g. "A♠" or "10♦".
pub fn card_label(card: u8) -> String {
    const RANKS: [&str; 13] = [
        "A", "2", "3", "4", "5", "6", "7", "8", "9", "10", "J", "Q", "K",
    ];
    const SUITS: [&str; 4] = ["♠", "♥", "♦", "♣"];
    if !is_valid_card(card) {
        return "?".to_string();
    }
    format!(
        "{}{}",
        RANKS[card_rank(card) as usize],
        SUITS[card_suit(card) as usize]
    )
}
