//! Free-text facility search and keystroke debouncing.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::dataset::Facility;

/// Case-insensitive match on name, city, owner or chain, or a CCN prefix.
/// A blank query matches everything.
pub fn matches(facility: &Facility, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }

    facility.ccn.to_lowercase().starts_with(&query)
        || facility.name.to_lowercase().contains(&query)
        || facility.city.to_lowercase().contains(&query)
        || facility.owner_name.to_lowercase().contains(&query)
        || facility.chain_name.to_lowercase().contains(&query)
}

fn relevance(facility: &Facility, query: &str) -> u8 {
    if facility.ccn.eq_ignore_ascii_case(query) {
        0
    } else if facility.name.to_lowercase().starts_with(query) {
        1
    } else {
        2
    }
}

/// Matching facilities, exact CCN first, then name-prefix matches, then the
/// rest; within a group the highest composite score comes first.
///
/// A blank query returns nothing.
pub fn search<'a>(
    facilities: impl IntoIterator<Item = &'a Facility>,
    query: &str,
    limit: usize,
) -> Vec<&'a Facility> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<&Facility> = facilities
        .into_iter()
        .filter(|f| matches(f, &query))
        .collect();
    hits.sort_by(|a, b| {
        relevance(a, &query)
            .cmp(&relevance(b, &query))
            .then_with(|| b.composite.total_cmp(&a.composite))
            .then_with(|| a.name.cmp(&b.name))
    });
    hits.truncate(limit);
    hits
}

/// Forwards only values that are followed by `window` of silence.
///
/// Each value received restarts the window. When the window elapses the
/// latest value is handed to `on_settled`; a value still pending when the
/// sender closes is flushed immediately.
pub async fn debounce<T, F>(mut rx: mpsc::Receiver<T>, window: Duration, mut on_settled: F)
where
    F: FnMut(T),
{
    let mut pending: Option<T> = None;

    loop {
        match pending.take() {
            None => match rx.recv().await {
                Some(value) => pending = Some(value),
                None => return,
            },
            Some(value) => {
                tokio::select! {
                    next = rx.recv() => match next {
                        Some(newer) => {
                            debug!("Debounce window restarted");
                            pending = Some(newer);
                        }
                        None => {
                            on_settled(value);
                            return;
                        }
                    },
                    _ = tokio::time::sleep(window) => on_settled(value),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn facility(ccn: &str, name: &str, city: &str, owner: &str, composite: f64) -> Facility {
        Facility {
            ccn: ccn.to_string(),
            name: name.to_string(),
            city: city.to_string(),
            owner_name: owner.to_string(),
            composite,
            ..Default::default()
        }
    }

    fn sample() -> Vec<Facility> {
        vec![
            facility("105001", "Sunrise Manor", "Tampa", "Sunrise Holdings", 35.0),
            facility("105002", "Palm Gardens", "Sunrise", "Coastal Care", 62.0),
            facility("105003", "The Sunrise Center", "Ocala", "Coastal Care", 80.0),
            facility("205001", "Bayfront", "Miami", "", 10.0),
        ]
    }

    #[test]
    fn test_matches_is_case_insensitive() {
        let facilities = sample();
        let f = &facilities[0];

        assert!(matches(f, "SUNRISE"));
        assert!(matches(f, "tampa"));
        assert!(matches(f, "holdings"));
        assert!(matches(f, "1050"));
        assert!(!matches(f, "5001"));
        assert!(matches(f, "   "));
    }

    #[test]
    fn test_search_ranks_name_prefix_first() {
        let facilities = sample();
        let hits = search(&facilities, "sunrise", 10);
        let ccns: Vec<&str> = hits.iter().map(|f| f.ccn.as_str()).collect();

        assert_eq!(ccns, vec!["105001", "105003", "105002"]);
    }

    #[test]
    fn test_search_exact_ccn_wins() {
        let facilities = sample();
        let hits = search(&facilities, "205001", 10);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Bayfront");
    }

    #[test]
    fn test_lettered_ccn_matches_in_any_case() {
        let mut facilities = sample();
        facilities.push(facility("05A123", "Mission Hills", "Fresno", "", 20.0));
        facilities.push(facility("05A124", "05a123 Annex", "Fresno", "", 90.0));

        assert!(matches(&facilities[4], "05A1"));
        assert!(matches(&facilities[4], "05a1"));

        let hits = search(&facilities, "05A123", 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].ccn, "05A123");
    }

    #[test]
    fn test_blank_query_returns_nothing() {
        assert!(search(&sample(), "  ", 10).is_empty());
    }

    #[test]
    fn test_search_respects_limit() {
        assert_eq!(search(&sample(), "1050", 2).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_final_keystroke_triggers_search() {
        let (tx, rx) = mpsc::channel(16);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();

        let handle = tokio::spawn(debounce(rx, Duration::from_millis(300), move |q: String| {
            sink.lock().unwrap().push(q);
        }));

        for keystroke in ["m", "ma", "map", "mapl", "maple"] {
            tx.send(keystroke.to_string()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(*calls.lock().unwrap(), vec!["maple".to_string()]);

        tx.send("oak".to_string()).await.unwrap();
        drop(tx);
        handle.await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["maple".to_string(), "oak".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_queries_each_trigger() {
        let (tx, rx) = mpsc::channel(16);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();

        let handle = tokio::spawn(debounce(rx, Duration::from_millis(100), move |q: &'static str| {
            sink.lock().unwrap().push(q);
        }));

        tx.send("first").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send("second").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }
}
