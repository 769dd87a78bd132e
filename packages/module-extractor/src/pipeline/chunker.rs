//! Corpus chunking for Pass 1.
//!
//! Pages are the primary unit: whole pages are packed into a chunk while
//! they fit. A page larger than the budget is split at paragraphs, then
//! lines, then words; only a single word longer than the budget is cut
//! mid-word. Every piece of a page starts with that page's marker so each
//! chunk names its sources; under a very small budget the marker's URL is
//! shortened, or the marker left out, so no chunk exceeds the ceiling.

use std::collections::VecDeque;

use crate::types::corpus::{page_marker, Chunk, Corpus, PAGE_MARKER_PREFIX, PAGE_MARKER_SUFFIX};

/// Room always left for body text next to a page marker.
const MIN_BODY_CHARS: usize = 16;

/// Separators tried in order when a text exceeds its budget.
const SEPARATORS: &[&str] = &["\n\n", "\n", " "];

/// Lazily split `corpus` into chunks of at most `max_chars` characters.
///
/// Deterministic and restartable: calling it again yields the same
/// sequence.
pub fn chunk(corpus: &Corpus, max_chars: usize) -> Chunks<'_> {
    Chunks {
        corpus,
        max_chars: max_chars.max(1),
        segment: 0,
        pending: VecDeque::new(),
        next_index: 0,
    }
}

/// Iterator returned by [`chunk`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    corpus: &'a Corpus,
    max_chars: usize,
    segment: usize,
    pending: VecDeque<(String, &'a str)>,
    next_index: usize,
}

impl<'a> Chunks<'a> {
    /// Queue the pieces of the next segment. False once the corpus is exhausted.
    fn refill(&mut self) -> bool {
        let corpus = self.corpus;
        let Some(segment) = corpus.segments().get(self.segment) else {
            return false;
        };
        self.segment += 1;

        let marker = fit_marker(&segment.source_url, self.max_chars);
        let body_budget = if marker.is_empty() {
            self.max_chars
        } else {
            self.max_chars - marker.chars().count() - 1
        };

        for body in split_to_fit(&segment.text, body_budget, SEPARATORS) {
            let piece = if marker.is_empty() {
                body
            } else {
                format!("{}\n{}", marker, body)
            };
            self.pending.push_back((piece, segment.source_url.as_str()));
        }
        true
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let mut text = String::new();
        let mut len = 0;
        let mut sources: Vec<String> = Vec::new();

        loop {
            if self.pending.is_empty() && !self.refill() {
                break;
            }
            let piece_len = match self.pending.front() {
                Some((piece, _)) => piece.chars().count(),
                None => continue,
            };
            if !text.is_empty() && len + 2 + piece_len > self.max_chars {
                break;
            }
            let Some((piece, source)) = self.pending.pop_front() else {
                break;
            };

            if !text.is_empty() {
                text.push_str("\n\n");
                len += 2;
            }
            text.push_str(&piece);
            len += piece_len;
            if sources.last().map(String::as_str) != Some(source) {
                sources.push(source.to_string());
            }
        }

        if text.is_empty() {
            return None;
        }

        let chunk = Chunk {
            index: self.next_index,
            text,
            sources,
        };
        self.next_index += 1;
        Some(chunk)
    }
}

/// The page marker for `url`, shortened so that it, a newline and
/// [`MIN_BODY_CHARS`] of body fit in `max_chars`. Empty when not even the
/// marker's frame fits.
fn fit_marker(url: &str, max_chars: usize) -> String {
    let room = max_chars.saturating_sub(MIN_BODY_CHARS + 1);
    let marker = page_marker(url);
    if marker.chars().count() <= room {
        return marker;
    }

    let frame = PAGE_MARKER_PREFIX.chars().count() + PAGE_MARKER_SUFFIX.chars().count();
    if room <= frame {
        return String::new();
    }
    let shortened: String = url.chars().take(room - frame).collect();
    page_marker(&shortened)
}

/// Split `text` into parts of at most `budget` characters, preferring the
/// coarsest separator that works. Parts that fit are packed back together
/// with the separator they were split on.
fn split_to_fit(text: &str, budget: usize, separators: &[&str]) -> Vec<String> {
    if text.chars().count() <= budget {
        return vec![text.to_string()];
    }
    let Some((separator, finer)) = separators.split_first() else {
        return hard_split(text, budget);
    };
    let sep_len = separator.chars().count();

    let mut packed = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for part in text.split(separator).filter(|part| !part.trim().is_empty()) {
        let part_len = part.chars().count();
        if part_len > budget {
            if !current.is_empty() {
                packed.push(std::mem::take(&mut current));
            }
            packed.extend(split_to_fit(part, budget, finer));
        } else if current.is_empty() {
            current = part.to_string();
            current_len = part_len;
        } else if current_len + sep_len + part_len <= budget {
            current.push_str(separator);
            current.push_str(part);
            current_len += sep_len + part_len;
        } else {
            packed.push(std::mem::replace(&mut current, part.to_string()));
            current_len = part_len;
        }
    }
    if !current.is_empty() {
        packed.push(current);
    }
    packed
}

/// Cut at character boundaries; used only for words longer than the budget.
fn hard_split(text: &str, budget: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(budget.max(1))
        .map(|c| c.iter().collect())
        .collect()
}
