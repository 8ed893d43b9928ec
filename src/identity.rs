use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use strsim::normalized_levenshtein;
use tracing::debug;

use crate::config::DEFAULT_FUZZY_THRESHOLD;

/// Normalized identity string: lower-case, diacritics folded, punctuation
/// dropped, whitespace collapsed. Idempotent.
pub fn normalize_name(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars() {
        if let Some(folded) = fold_diacritic(ch) {
            push_token_chars(&mut out, folded, &mut pending_space);
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                push_token_chars(&mut out, lower.encode_utf8(&mut [0u8; 4]), &mut pending_space);
            }
        } else if matches!(ch, '\'' | '’' | '`' | '.' | '´') {
            // "N'Golo", "O'Brien", "Jr." stay joined.
        } else if !out.is_empty() {
            pending_space = true;
        }
    }
    out
}

fn push_token_chars(out: &mut String, chars: &str, pending_space: &mut bool) {
    if *pending_space && !out.is_empty() {
        out.push(' ');
    }
    *pending_space = false;
    out.push_str(chars);
}

/// Latin letters with diacritics and ligatures, lower-cased.
fn fold_diacritic(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å'
        | 'Ā' | 'Ă' | 'Ą' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' | 'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "c",
        'ď' | 'đ' | 'ð' | 'Ď' | 'Đ' | 'Ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ'
        | 'Ė' | 'Ę' | 'Ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' | 'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => "g",
        'ĥ' | 'ħ' | 'Ĥ' | 'Ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī'
        | 'Ĭ' | 'Į' | 'İ' => "i",
        'ĵ' | 'Ĵ' => "j",
        'ķ' | 'Ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' | 'Ĺ' | 'Ļ' | 'Ľ' | 'Ŀ' | 'Ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' | 'Ñ' | 'Ń' | 'Ņ' | 'Ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø'
        | 'Ō' | 'Ŏ' | 'Ő' => "o",
        'œ' | 'Œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' | 'Ŕ' | 'Ŗ' | 'Ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' | 'Ś' | 'Ŝ' | 'Ş' | 'Š' | 'Ș' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' | 'ț' | 'Ţ' | 'Ť' | 'Ŧ' | 'Ț' => "t",
        'þ' | 'Þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ'
        | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "u",
        'ŵ' | 'Ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' | 'Ý' | 'Ÿ' | 'Ŷ' => "y",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        _ => return None,
    };
    Some(folded)
}

/// Which priority step produced a match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Override,
    Exact,
    LastName,
    Fuzzy { score: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityMatch {
    /// Index into the candidate list the index was built from.
    pub index: usize,
    pub kind: MatchKind,
}

/// Candidate names from one source, normalized once.
#[derive(Debug, Clone, Default)]
pub struct CandidateIndex {
    normalized: Vec<String>,
    first_by_key: HashMap<String, usize>,
}

impl CandidateIndex {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: Vec<String> = names
            .into_iter()
            .map(|n| normalize_name(n.as_ref()))
            .collect();
        let mut first_by_key = HashMap::with_capacity(normalized.len());
        for (idx, key) in normalized.iter().enumerate() {
            if !key.is_empty() {
                first_by_key.entry(key.clone()).or_insert(idx);
            }
        }
        Self {
            normalized,
            first_by_key,
        }
    }

    pub fn len(&self) -> usize {
        self.normalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn key(&self, index: usize) -> Option<&str> {
        self.normalized.get(index).map(String::as_str)
    }
}

/// Resolves a player name against another source's names.
///
/// Priority: override table, exact normalized name, last-name containment,
/// fuzzy similarity above the threshold. Ties go to the first candidate in
/// source order.
#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    overrides: HashMap<String, String>,
    fuzzy_threshold: f64,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(Vec::<(String, String)>::new(), DEFAULT_FUZZY_THRESHOLD)
    }
}

const MIN_SURNAME_TOKEN: usize = 3;

impl IdentityMatcher {
    pub fn new<I, A, C>(overrides: I, fuzzy_threshold: f64) -> Self
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let overrides = overrides
            .into_iter()
            .map(|(alias, canonical)| {
                (
                    normalize_name(alias.as_ref()),
                    normalize_name(canonical.as_ref()),
                )
            })
            .filter(|(alias, canonical)| !alias.is_empty() && !canonical.is_empty())
            .collect();
        Self {
            overrides,
            fuzzy_threshold,
        }
    }

    pub fn override_count(&self) -> usize {
        self.overrides.len()
    }

    /// Stable text form of the matcher settings, for cache keys derived
    /// from match results.
    pub fn signature(&self) -> String {
        let mut pairs: Vec<String> = self
            .overrides
            .iter()
            .map(|(alias, canonical)| format!("{alias}={canonical}"))
            .collect();
        pairs.sort();
        format!("threshold={};{}", self.fuzzy_threshold, pairs.join(";"))
    }

    pub fn resolve(&self, query: &str, candidates: &CandidateIndex) -> Option<IdentityMatch> {
        let q = normalize_name(query);
        if q.is_empty() || candidates.is_empty() {
            return None;
        }

        if let Some(found) = self.override_match(&q, candidates) {
            return Some(found);
        }

        if let Some(&index) = candidates.first_by_key.get(&q) {
            return Some(IdentityMatch {
                index,
                kind: MatchKind::Exact,
            });
        }

        let surnames: Vec<&str> = q
            .split(' ')
            .skip(1)
            .filter(|t| t.chars().count() >= MIN_SURNAME_TOKEN)
            .collect();
        if !surnames.is_empty()
            && let Some(index) = candidates
                .normalized
                .iter()
                .position(|c| surnames.iter().any(|t| c.contains(t)))
        {
            return Some(IdentityMatch {
                index,
                kind: MatchKind::LastName,
            });
        }

        let mut best: Option<(usize, f64)> = None;
        for (index, candidate) in candidates.normalized.iter().enumerate() {
            if candidate.is_empty() {
                continue;
            }
            let score = normalized_levenshtein(&q, candidate) * 100.0;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((index, score));
            }
        }
        match best {
            Some((index, score)) if score > self.fuzzy_threshold => {
                debug!(query, candidate = %candidates.normalized[index], score, "fuzzy identity match");
                Some(IdentityMatch {
                    index,
                    kind: MatchKind::Fuzzy { score },
                })
            }
            _ => None,
        }
    }

    fn override_match(&self, q: &str, candidates: &CandidateIndex) -> Option<IdentityMatch> {
        let canonical = self.overrides.get(q).map(String::as_str);
        candidates
            .normalized
            .iter()
            .position(|c| {
                let c_canonical = self.overrides.get(c).map(String::as_str);
                match (canonical, c_canonical) {
                    (Some(target), _) if c == target => true,
                    (_, Some(target)) if target == q => true,
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            })
            .map(|index| IdentityMatch {
                index,
                kind: MatchKind::Override,
            })
    }
}

/// Reads `(alias, canonical)` pairs from JSON (`[["alias","canonical"], ...]`
/// or `{"alias": "canonical"}`) or from a two-column CSV.
pub fn load_overrides(path: &Path) -> Result<Vec<(String, String)>> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read override table {}", path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse override table {}", path.display()))?;
        return overrides_from_json(&value)
            .with_context(|| format!("override table {} has an unsupported shape", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open override table {}", path.display()))?;
    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("read override table {}", path.display()))?;
        let (Some(alias), Some(canonical)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if alias.trim().eq_ignore_ascii_case("alias") {
            continue;
        }
        out.push((alias.trim().to_string(), canonical.trim().to_string()));
    }
    Ok(out)
}

fn overrides_from_json(value: &Value) -> Result<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|c| (k.clone(), c.to_string())))
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let pair = item.as_array().ok_or_else(|| anyhow!("expected [alias, canonical]"))?;
                match pair.as_slice() {
                    [Value::String(a), Value::String(c)] => Ok((a.clone(), c.clone())),
                    _ => Err(anyhow!("expected [alias, canonical]")),
                }
            })
            .collect(),
        _ => Err(anyhow!("expected an array of pairs or an object")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_folds_and_compacts() {
        assert_eq!(normalize_name("  Kylian   Mbappé "), "kylian mbappe");
        assert_eq!(normalize_name("N'Golo Kanté"), "ngolo kante");
        assert_eq!(normalize_name("Trent Alexander-Arnold"), "trent alexander arnold");
        assert_eq!(normalize_name("Ødegaard, Martin"), "odegaard martin");
        assert_eq!(normalize_name("Müller-Wohlfahrt Jr."), "muller wohlfahrt jr");
        assert_eq!(normalize_name("Ilkay Gündoğan"), "ilkay gundogan");
    }

    #[test]
    fn normalize_name_is_idempotent() {
        for raw in ["Vinícius Júnior", "Łukasz Fabiański", "Sergej Milinković-Savić", "ß-Straße"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once);
        }
    }

    #[test]
    fn surname_containment_keeps_first_candidate() {
        let matcher = IdentityMatcher::default();
        let candidates = CandidateIndex::new(["Jonh Smyth", "Jonh Smyth"]);
        let m = matcher.resolve("John Smyth", &candidates);
        // "smyth" is a surname token, so containment wins before fuzzy.
        assert_eq!(m.map(|m| m.index), Some(0));
    }
}
