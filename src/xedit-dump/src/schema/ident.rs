//! Identifier synthesis from host display strings
//!
//! Flag names come from the host verbatim ("Open!", "Created/Deleted", ...)
//! and have to become Pascal identifiers. Within one [`IdentScope`] every
//! assigned identifier is distinct: a base shared by several change types is
//! suffixed with each change type's code, and anything still colliding gets
//! the bit number and then a counter.

use std::collections::{HashMap, HashSet};

/// Keep `[A-Za-z0-9_]`, drop everything else
pub fn sanitize(display: &str) -> String {
    display
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// A display string waiting for an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentRequest {
    /// Change type the name belongs to
    pub code: u32,
    pub bit: u8,
    pub display: String,
}

/// Set of identifiers already emitted in one declaration scope
#[derive(Debug, Default)]
pub struct IdentScope {
    taken: HashSet<String>,
}

impl IdentScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a fixed identifier (e.g. `wbChangeFlags000`). False if taken.
    pub fn reserve(&mut self, ident: &str) -> bool {
        self.taken.insert(ident.to_string())
    }

    pub fn contains(&self, ident: &str) -> bool {
        self.taken.contains(ident)
    }

    /// Assign `prefix`-ed identifiers for a batch of display strings.
    ///
    /// Output is positionally aligned with `requests` and depends only on
    /// their order and content.
    pub fn assign(&mut self, prefix: &str, requests: &[IdentRequest]) -> Vec<String> {
        let bases: Vec<String> = requests
            .iter()
            .map(|r| {
                let cleaned = sanitize(&r.display);
                if cleaned.is_empty() {
                    format!("{}Unnamed{:02}", prefix, r.bit)
                } else {
                    format!("{}{}", prefix, cleaned)
                }
            })
            .collect();

        let mut uses: HashMap<&str, usize> = HashMap::new();
        for base in &bases {
            *uses.entry(base.as_str()).or_default() += 1;
        }

        // Unshared bases are claimed first so a suffixed name can't take one
        let mut assigned: Vec<Option<String>> = vec![None; requests.len()];
        for (i, base) in bases.iter().enumerate() {
            if uses[base.as_str()] == 1 && self.reserve(base) {
                assigned[i] = Some(base.clone());
            }
        }

        for (i, request) in requests.iter().enumerate() {
            if assigned[i].is_some() {
                continue;
            }
            let base = &bases[i];
            let ident = self.claim_suffixed(base, request);
            assigned[i] = Some(ident);
        }

        assigned.into_iter().flatten().collect()
    }

    fn claim_suffixed(&mut self, base: &str, request: &IdentRequest) -> String {
        let by_code = format!("{}_{}", base, request.code);
        if self.reserve(&by_code) {
            return by_code;
        }

        let by_bit = format!("{}_{:02}", by_code, request.bit);
        if self.reserve(&by_bit) {
            return by_bit;
        }

        let mut n = 2usize;
        loop {
            let candidate = format!("{}_{}", by_bit, n);
            if self.reserve(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// True for a non-empty `[A-Za-z_][A-Za-z0-9_]*` identifier
pub fn is_valid_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
