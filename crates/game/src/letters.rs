//! The trailing-silent-letter rule shared by both games: the next starting
//! letter is the last letter of a word that isn't "silent" — ь, ы, ъ, й, ё
//! carry no sound of their own in this chain-game convention, so the walk
//! continues backwards past them.

const SILENT: [char; 5] = ['ь', 'ы', 'ъ', 'й', 'ё'];

fn is_silent(c: char) -> bool {
    let lower = c.to_lowercase().next().unwrap_or(c);
    SILENT.contains(&lower)
}

/// The letter the next word/city must start with, or `None` if every
/// character in `word` is silent (degenerate input).
pub fn next_start_letter(word: &str) -> Option<char> {
    word.chars()
        .rev()
        .find(|&c| !is_silent(c))
        .map(|c| c.to_uppercase().next().unwrap_or(c))
}

/// Case-insensitive "does `word` start with `letter`" check, Cyrillic-aware.
pub fn starts_with_letter(word: &str, letter: char) -> bool {
    word.chars()
        .next()
        .map(|c| c.to_uppercase().eq(letter.to_uppercase()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_word_uses_last_letter() {
        assert_eq!(next_start_letter("Калуга"), Some('А'));
        assert_eq!(next_start_letter("Сочи"), Some('И'));
    }

    #[test]
    fn single_trailing_silent_letter_is_skipped() {
        assert_eq!(next_start_letter("Казань"), Some('Н'));
    }

    #[test]
    fn walks_back_past_multiple_silent_letters() {
        // ...ный: 'й' silent, 'ы' silent, 'н' is the letter.
        assert_eq!(next_start_letter("Грозный"), Some('Н'));
    }

    #[test]
    fn all_silent_word_has_no_next_letter() {
        assert_eq!(next_start_letter("ъ"), None);
    }

    #[test]
    fn starts_with_letter_is_case_insensitive() {
        assert!(starts_with_letter("астрахань", 'А'));
        assert!(!starts_with_letter("казань", 'А'));
    }
}
