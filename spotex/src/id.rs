use nanoid::nanoid;

/// Alphabet for saved-search identifiers (no ambiguous glyphs).
const SEARCH_ID_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
    '2', '3', '4', '5', '6', '7', '8', '9',
];
const SEARCH_ID_LENGTH: usize = 20;

pub fn generate_search_id() -> String {
    nanoid!(SEARCH_ID_LENGTH, SEARCH_ID_ALPHABET)
}

/// Ids are only ever produced by [`generate_search_id`]; anything else is rejected before
/// it is used in a Redis key.
pub fn is_search_id(value: &str) -> bool {
    value.chars().count() == SEARCH_ID_LENGTH && value.chars().all(|c| SEARCH_ID_ALPHABET.contains(&c))
}
