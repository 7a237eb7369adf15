// src/engine/matcher.rs

use strsim::sorensen_dice;

/// Minimum Sorensen-Dice bigram similarity for a transcript to count as a
/// selection. Below this the answer is rejected rather than forced.
pub const ACCEPT_THRESHOLD: f64 = 0.70;

/// A transcript matched against one of a question's options.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Position of the matched option in the original list.
    pub index: usize,
    /// The matched option, verbatim as authored.
    pub option: String,
    pub similarity: f64,
}

/// Scores a spoken transcript against a question's answer options and returns
/// the best candidate, or `None` if nothing clears [`ACCEPT_THRESHOLD`].
///
/// Comparison is case-insensitive. Exact ties keep the earlier option.
/// An empty option list is a caller error.
pub fn best_match(transcript: &str, options: &[String]) -> Option<MatchResult> {
    debug_assert!(!options.is_empty(), "options must not be empty");

    let transcript = transcript.to_lowercase();

    let mut best: Option<(usize, f64)> = None;
    for (index, option) in options.iter().enumerate() {
        let similarity = sorensen_dice(&transcript, &option.to_lowercase());
        match best {
            // Strictly-greater keeps the first candidate on ties.
            Some((_, top)) if similarity <= top => {}
            _ => best = Some((index, similarity)),
        }
    }

    let (index, similarity) = best?;
    if similarity < ACCEPT_THRESHOLD {
        return None;
    }

    Some(MatchResult {
        index,
        option: options[index].clone(),
        similarity,
    })
}
