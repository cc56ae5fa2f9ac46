//! Token-order-insensitive string similarity.
//!
//! Both inputs are normalised (Latin-1 supplement characters `U+0080..=U+00FF`
//! deleted, lowercased, every other non-alphanumeric character turned into a
//! separator), split into tokens, sorted and re-joined. The score is the indel
//! similarity of the two sorted strings: `200 * lcs(a, b) / (len(a) + len(b))`,
//! rounded half to even.

pub const MAX_SCORE: u8 = 100;

/// Scores `left` against `right` in `0..=100`.
///
/// Symmetric and deterministic; `"Flooring Vinyl"` and `"vinyl flooring"`
/// score 100. Inputs with no alphanumeric content score 0.
pub fn token_sort_ratio(left: &str, right: &str) -> u8 {
    let left = sorted_tokens(left);
    let right = sorted_tokens(right);
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    ratio(&left, &right)
}

fn sorted_tokens(text: &str) -> Vec<char> {
    let normalised: String = text
        .chars()
        .filter(|ch| !('\u{80}'..='\u{FF}').contains(ch))
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .to_lowercase();

    let mut tokens: Vec<&str> = normalised.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ").chars().collect()
}

fn ratio(left: &[char], right: &[char]) -> u8 {
    let total = left.len() + right.len();
    let common = longest_common_subsequence(left, right);
    let numerator = 200 * common;
    let (quotient, remainder) = (numerator / total, numerator % total);
    let score = match (2 * remainder).cmp(&total) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + quotient % 2,
        std::cmp::Ordering::Less => quotient,
    };
    score.min(usize::from(MAX_SCORE)) as u8
}

fn longest_common_subsequence(left: &[char], right: &[char]) -> usize {
    let (outer, inner) = if left.len() >= right.len() { (left, right) } else { (right, left) };
    let mut previous = vec![0usize; inner.len() + 1];
    let mut current = vec![0usize; inner.len() + 1];

    for outer_ch in outer {
        for (index, inner_ch) in inner.iter().enumerate() {
            current[index + 1] = if outer_ch == inner_ch {
                previous[index] + 1
            } else {
                current[index].max(previous[index + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[inner.len()]
}
