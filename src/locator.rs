/*!
Finding the registry spreadsheet among a list of candidates.

The registry is the spreadsheet holding the Users/Students/Groups/TimeSlots
tabs. Deployments know several spreadsheet ids but not reliably which one
that is, so candidates are probed in order.
*/
use crate::error::Error;
use crate::sheets::Sheets;

/// Case-insensitive title marker identifying a registry spreadsheet.
const REGISTRY_MARKER: &str = "REG";

/// Tabs only a registry spreadsheet would have.
const REGISTRY_TABS: &[&str] = &["Users", "Students", "Groups", "TimeSlots"];

/**
Concatenate the environment-provided ids and the fallback ids, in that
order, dropping blanks and any id already seen.
*/
pub fn candidate_ids<S: AsRef<str>>(env_ids: &[S], fallback_ids: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(env_ids.len() + fallback_ids.len());
    for id in env_ids.iter().chain(fallback_ids.iter()) {
        let id = id.as_ref().trim();
        if !id.is_empty() && !out.iter().any(|x| x == id) {
            out.push(id.to_owned());
        }
    }
    out
}

fn looks_like_registry<'a, I>(title: &str, tabs: I) -> bool
where
    I: IntoIterator<Item = &'a str>
{
    if title.to_ascii_uppercase().contains(REGISTRY_MARKER) {
        return true;
    }
    tabs.into_iter().any(|t| REGISTRY_TABS.contains(&t))
}

/**
Return the first candidate that looks like the registry spreadsheet.

Candidates whose metadata can't be fetched are skipped. If none matches,
the first candidate is returned anyway. An empty candidate list is a
configuration error.
*/
pub async fn resolve_primary_spreadsheet<S: Sheets>(
    sheets: &S,
    candidates: &[String],
) -> Result<String, Error> {
    log::trace!("resolve_primary_spreadsheet( {:?} ) called.", candidates);

    let first = match candidates.first() {
        Some(id) => id,
        None => {
            return Err(Error::Config(
                "No candidate spreadsheet ids are configured.".to_owned()
            ));
        },
    };

    for id in candidates.iter() {
        match sheets.metadata(id).await {
            Ok(meta) => {
                if looks_like_registry(&meta.title, meta.tab_titles()) {
                    log::debug!("Resolved registry spreadsheet {:?} ({:?}).", id, &meta.title);
                    return Ok(id.clone());
                }
                log::trace!("    ...{:?} ({:?}) is not the registry.", id, &meta.title);
            },
            Err(e) => {
                log::warn!("Unable to probe spreadsheet {:?}: {}", id, &e);
            },
        }
    }

    log::warn!(
        "No candidate looks like the registry; falling back to {:?}.", first
    );
    Ok(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::MemorySheets;
    use crate::tests::ensure_logging;

    #[test]
    fn candidates_keep_first_occurrence() {
        let c = candidate_ids(&["b", "a", " ", "b"], &["c", "a"]);
        assert_eq!(c, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn failing_candidate_is_skipped() {
        ensure_logging();
        let s = MemorySheets::new()
            .with_spreadsheet("A", "Registry")
            .with_spreadsheet("B", "School REG 2024");
        s.fail_spreadsheet("A", "The caller does not have permission");

        let id = resolve_primary_spreadsheet(&s, &["A".to_owned(), "B".to_owned()])
            .await.unwrap();
        assert_eq!(id, "B");
    }

    #[tokio::test]
    async fn matches_on_tab_names() {
        ensure_logging();
        let s = MemorySheets::new()
            .with_spreadsheet("A", "Budget")
            .with_spreadsheet("B", "Roster");
        s.set_rows("B", "Students", vec![]);

        let id = resolve_primary_spreadsheet(&s, &["A".to_owned(), "B".to_owned()])
            .await.unwrap();
        assert_eq!(id, "B");
    }

    #[tokio::test]
    async fn no_match_falls_back_to_first() {
        ensure_logging();
        let s = MemorySheets::new().with_spreadsheet("B", "Budget");
        let id = resolve_primary_spreadsheet(&s, &["A".to_owned(), "B".to_owned()])
            .await.unwrap();
        assert_eq!(id, "A");
    }

    #[tokio::test]
    async fn empty_candidates_is_a_config_error() {
        let s = MemorySheets::new();
        match resolve_primary_spreadsheet(&s, &[]).await {
            Err(Error::Config(_)) => {},
            x => panic!("expected configuration error, got {:?}", x),
        }
    }
}
