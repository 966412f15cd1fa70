/// Join accumulated per-turn diffs with the live diff of the running turn.
/// The live diff is skipped when it is byte-identical to the last accumulated
/// entry (the turn just finished and was recorded).
pub fn join_diff_sources<S: AsRef<str>>(accumulated: &[S], live: Option<&str>) -> String {
    let mut parts: Vec<&str> = accumulated
        .iter()
        .map(|s| s.as_ref())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(live) = live.filter(|l| !l.is_empty()) {
        let duplicate = accumulated
            .last()
            .map(|last| last.as_ref() == live)
            .unwrap_or(false);
        if !duplicate {
            parts.push(live);
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_diff_is_appended_when_new() {
        let joined = join_diff_sources(&["turn1"], Some("live"));
        assert_eq!(joined, "turn1\nlive");
    }

    #[test]
    fn live_diff_equal_to_last_entry_is_dropped() {
        let joined = join_diff_sources(&["turn1", "turn2"], Some("turn2"));
        assert_eq!(joined, "turn1\nturn2");
    }

    #[test]
    fn live_diff_equal_to_earlier_entry_is_kept() {
        let joined = join_diff_sources(&["turn1", "turn2"], Some("turn1"));
        assert_eq!(joined, "turn1\nturn2\nturn1");
    }

    #[test]
    fn no_sources_yield_empty_text() {
        let none: [&str; 0] = [];
        assert_eq!(join_diff_sources(&none, None), "");
        assert_eq!(join_diff_sources(&none, Some("")), "");
    }
}
