//! Scoring layers
//!
//! Each layer is a pure function of the message text (the semantic layer
//! only contributes the distance banding here) and is capped independently.
//! The caps sum to 100.

use crate::embedding::EmbeddingError;

pub const SIGNATURE_CAP: f64 = 25.0;
pub const SEMANTIC_CAP: f64 = 40.0;
pub const STATISTICAL_CAP: f64 = 15.0;
pub const RISK_KEYWORD_CAP: f64 = 10.0;
pub const ADVERSARIAL_CAP: f64 = 10.0;

/// Known prompt-injection phrases, matched against upper-cased content
const ATTACK_SIGNATURES: &[&str] = &[
    "INSTRUCTION FOR",
    "SYSTEM PROMPT",
    "JAILBREAK",
    "IGNORE",
    "OVERRIDE",
    "EXECUTE",
    "COMMAND",
    "FORGET",
    "BYPASS",
    "DISABLE",
    "UNLOCK",
];

const SIGNATURE_POINTS: f64 = 5.0;

/// Lines at least this similar to a signature count as a near miss
const FUZZY_RATIO: f32 = 0.85;

/// Exfiltration vocabulary for the density check
const EXFILTRATION_KEYWORDS: &[&str] = &[
    "steal",
    "exfiltrate",
    "leak",
    "send",
    "data",
    "unauthorized",
    "export",
];

const ENTROPY_LIMIT: f64 = 5.0;

/// Any one of these is enough for the full risk score
const HIGH_RISK_PHRASES: &[&str] = &[
    "exfiltrate",
    "steal",
    "leak",
    "export database",
    "dump database",
    "patient records",
    "system prompt",
];

const DESTINATION_MARKERS: &[&str] = &["http://", "https://", "@"];

const RISK_KEYWORDS: &[&str] = &["attacker", "malicious", "evil", "pastebin", "dropbox"];

const ENCODING_INDICATORS: &[&str] = &["base64", "rot13", "cipher", "encode", "decode", "obfuscate"];

/// Symbol runs matched against the raw content
const OBFUSCATION_RUNS: &[&str] = &["***", "!!!!", "%%%%", "####", "===="];

/// Layer 1: attack phrase signatures plus fuzzy near-miss lines (0-25)
pub fn signature_score(content: &str) -> f64 {
    let upper = content.to_uppercase();

    let mut matches = ATTACK_SIGNATURES
        .iter()
        .filter(|sig| upper.contains(*sig))
        .count() as f64;

    let mut lines = split_lines(&upper);
    if lines.is_empty() {
        lines.push(upper.as_str());
    }

    for sig in ATTACK_SIGNATURES {
        for line in &lines {
            if line_similarity(sig, line) > FUZZY_RATIO {
                matches += 0.5;
            }
        }
    }

    (matches * SIGNATURE_POINTS).min(SIGNATURE_CAP)
}

/// Line boundaries recognised when splitting content for fuzzy matching
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split on every line break, `\r\n` counting as one; no trailing empty line
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..i]);
        start = i + c.len_utf8();
        if c == '\r' {
            if let Some(&(j, '\n')) = chars.peek() {
                chars.next();
                start = j + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Ratcliff/Obershelp similarity `2*M / (len(a) + len(b))` over characters
///
/// `M` is the total size of the matching blocks found by taking the longest
/// common block and recursing on both sides of it.
pub fn line_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    // Upper bound on the ratio; skips the search for lines far longer than the phrase
    let bound = 2.0 * a.len().min(b.len()) as f32 / total as f32;
    if bound <= FUZZY_RATIO {
        return bound;
    }

    2.0 * matching_chars(&a, &b) as f32 / total as f32
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, len)`
///
/// Ties go to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    // run[j + 1]: length of the match ending at a[i - 1], b[j]
    let mut run = vec![0usize; b.len() + 1];

    for i in alo..ahi {
        let mut next = vec![0usize; b.len() + 1];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = run[j] + 1;
            next[j + 1] = k;
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        run = next;
    }

    best
}

/// Layer 2 banding: cosine distance to the baseline centroid (0-40)
pub fn semantic_band(distance: f64) -> f64 {
    if distance > 0.7 {
        SEMANTIC_CAP
    } else if distance > 0.5 {
        20.0
    } else if distance > 0.3 {
        10.0
    } else {
        0.0
    }
}

/// Cosine distance `1 - cos(a, b)`; zero vectors are treated as identical
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::Dimension {
            expected: b.len(),
            actual: a.len(),
        });
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(1.0 - dot / (norm_a * norm_b))
}

/// Layer 3: exfiltration keyword density plus character entropy (0-15)
pub fn statistical_score(content: &str) -> f64 {
    let lower = content.to_lowercase();
    let total_words = lower.split_whitespace().count();
    if total_words == 0 {
        return 0.0;
    }

    let keyword_count: usize = EXFILTRATION_KEYWORDS
        .iter()
        .map(|kw| lower.matches(kw).count())
        .sum();
    let density = keyword_count as f64 / total_words as f64;

    let density_score: f64 = if density > 0.10 {
        15.0
    } else if density > 0.05 {
        10.0
    } else if density > 0.02 {
        5.0
    } else {
        0.0
    };

    let entropy_score: f64 = if shannon_entropy(content) > ENTROPY_LIMIT { 5.0 } else { 0.0 };

    (density_score + entropy_score).min(STATISTICAL_CAP)
}

/// Shannon entropy in bits over the character distribution
pub fn shannon_entropy(text: &str) -> f64 {
    let mut frequencies = std::collections::HashMap::new();
    let mut len = 0usize;
    for ch in text.chars() {
        *frequencies.entry(ch).or_insert(0usize) += 1;
        len += 1;
    }
    if len == 0 {
        return 0.0;
    }

    frequencies
        .values()
        .map(|&count| {
            let p = count as f64 / len as f64;
            -p * p.log2()
        })
        .sum()
}

/// Layer 4: high-risk phrases and exfiltration destinations (0-10)
pub fn risk_keyword_score(content: &str) -> f64 {
    let lower = content.to_lowercase();

    if HIGH_RISK_PHRASES.iter().any(|p| lower.contains(p)) {
        return RISK_KEYWORD_CAP;
    }

    if DESTINATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return RISK_KEYWORD_CAP;
    }

    let risk_count: usize = RISK_KEYWORDS.iter().map(|kw| lower.matches(kw).count()).sum();
    (risk_count as f64 * 2.0).min(RISK_KEYWORD_CAP)
}

/// Layer 5: encoding vocabulary and obfuscation symbol runs (0-10)
pub fn adversarial_score(content: &str) -> f64 {
    let lower = content.to_lowercase();

    let encoding = ENCODING_INDICATORS
        .iter()
        .filter(|ind| lower.contains(*ind))
        .count() as f64
        * 2.0;

    let obfuscation = OBFUSCATION_RUNS
        .iter()
        .filter(|run| content.contains(*run))
        .count() as f64
        * 3.0;

    (encoding + obfuscation).min(ADVERSARIAL_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_empty_is_zero() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert!((shannon_entropy("ab") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_word_content_scores_nothing() {
        assert_eq!(statistical_score(""), 0.0);
        assert_eq!(statistical_score(" \n\t "), 0.0);
    }

    #[test]
    fn test_signature_counts_distinct_phrases() {
        // one phrase present, no line close enough for a near miss
        assert_eq!(signature_score("please ignore the noise in the logs"), 5.0);
        assert_eq!(signature_score("Ignore it. IGNORE it again."), 5.0);
        assert_eq!(signature_score("hello, how are you?"), 0.0);
    }

    #[test]
    fn test_signature_fuzzy_near_miss() {
        // "JAILBRAEK" shares 8 of 9 characters in order: ratio 16/18
        assert_eq!(signature_score("jailbraek"), 2.5);
        // exact single-word line: substring hit plus a perfect fuzzy hit
        assert_eq!(signature_score("bypass"), 7.5);
    }

    #[test]
    fn test_fuzzy_ratio_uses_longest_blocks() {
        // blocks "EX" and "CUTE": 2*6/16
        assert!((line_similarity("EXECUTE", "EIXEXCUTE") - 0.75).abs() < 1e-6);
        assert!((line_similarity("SYSTEM PROMPT", "YJSEM PROMPT") - 0.8).abs() < 1e-6);
        assert!((line_similarity("JAILBREAK", "JAILBRAEK") - 16.0 / 18.0).abs() < 1e-6);
        assert_eq!(signature_score("eixexcute"), 0.0);
    }

    #[test]
    fn test_lines_split_on_carriage_returns() {
        assert_eq!(split_lines("a\r\nb\rc\n"), vec!["a", "b", "c"]);
        assert_eq!(split_lines("a\u{2028}b"), vec!["a", "b"]);
        assert!(split_lines("").is_empty());
        assert_eq!(signature_score("foo\rignore"), 7.5);
        assert_eq!(signature_score("a\r\nbypass\r\n"), 7.5);
    }

    #[test]
    fn test_signature_cap() {
        let content = "IGNORE SYSTEM PROMPT OVERRIDE BYPASS DISABLE UNLOCK";
        assert_eq!(signature_score(content), SIGNATURE_CAP);
    }

    #[test]
    fn test_line_similarity_bound_skips_long_lines() {
        let long = "A".repeat(500);
        assert!(line_similarity("IGNORE", &long) <= FUZZY_RATIO);
        assert!((line_similarity("IGNORE", "IGNORE") - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_statistical_density_bands() {
        // 2 keywords in 4 words
        assert_eq!(statistical_score("steal the data now"), 15.0);
        // 1 keyword in 15 words: density 0.066
        let content = "please send the weekly summary to the team before friday so everyone can plan ahead";
        assert_eq!(statistical_score(content), 10.0);
        assert_eq!(statistical_score("nothing interesting here at all"), 0.0);
    }

    #[test]
    fn test_statistical_entropy_bonus() {
        let noisy: String = (33u8..=126).map(|b| b as char).collect();
        assert!(shannon_entropy(&noisy) > ENTROPY_LIMIT);
        assert_eq!(statistical_score(&noisy), 5.0);
    }

    #[test]
    fn test_risk_keywords() {
        assert_eq!(risk_keyword_score("leak the patient records"), 10.0);
        assert_eq!(risk_keyword_score("see https://example.com"), 10.0);
        assert_eq!(risk_keyword_score("mail bob@example.com"), 10.0);
        assert_eq!(risk_keyword_score("the attacker used pastebin"), 4.0);
        assert_eq!(risk_keyword_score("evil evil evil evil evil evil"), 10.0);
        assert_eq!(risk_keyword_score("all good"), 0.0);
    }

    #[test]
    fn test_adversarial_score() {
        assert_eq!(adversarial_score("base64 decode this"), 4.0);
        assert_eq!(adversarial_score("#### secret ####"), 3.0);
        assert_eq!(adversarial_score("base64 rot13 cipher *** !!!!"), ADVERSARIAL_CAP);
        assert_eq!(adversarial_score("plain words"), 0.0);
    }

    #[test]
    fn test_semantic_band_breakpoints() {
        assert_eq!(semantic_band(0.95), 40.0);
        assert_eq!(semantic_band(0.6), 20.0);
        assert_eq!(semantic_band(0.4), 10.0);
        assert_eq!(semantic_band(0.3), 0.0);
    }

    #[test]
    fn test_cosine_distance() {
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-9);
        assert!(cosine_distance(&[2.0, 0.0], &[1.0, 0.0]).unwrap().abs() < 1e-9);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap(), 0.0);
        assert!(cosine_distance(&[1.0], &[1.0, 0.0]).is_err());
    }
}
