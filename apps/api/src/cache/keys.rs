//! Cache key construction. Keys are relative; `Cache` applies the global prefix.

use uuid::Uuid;

pub const JOBS_NAMESPACE: &str = "jobs";

/// Counter bumped on every job mutation; listing keys embed its value so a
/// bump orphans every cached listing at once.
pub const JOB_LIST_GENERATION: &str = "jobs:list:gen";

pub fn job_detail(id: Uuid) -> String {
    format!("jobs:detail:{id}")
}

pub fn job_list(generation: i64, canonical_query: &str) -> String {
    format!("jobs:list:v{generation}:{canonical_query}")
}

/// Builds a stable query fingerprint: absent parameters are dropped,
/// parameters are sorted by name, and `&`/`=` in values are escaped.
pub fn canonical_query(params: &[(&str, Option<String>)]) -> String {
    let mut present: Vec<(&str, String)> = params
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (*k, escape(v))))
        .collect();
    present.sort_by(|a, b| a.0.cmp(b.0));
    present
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_query_is_order_independent() {
        let a = canonical_query(&[
            ("page", Some("1".into())),
            ("q", Some("rust".into())),
            ("location", None),
        ]);
        let b = canonical_query(&[
            ("location", None),
            ("q", Some("rust".into())),
            ("page", Some("1".into())),
        ]);
        assert_eq!(a, b);
        assert_eq!(a, "page=1&q=rust");
    }

    #[test]
    fn test_values_cannot_forge_parameters() {
        let forged = canonical_query(&[("q", Some("x&page=2".into()))]);
        let honest = canonical_query(&[("q", Some("x".into())), ("page", Some("2".into()))]);
        assert_ne!(forged, honest);
    }

    #[test]
    fn test_list_key_embeds_generation() {
        assert_ne!(job_list(1, "page=1"), job_list(2, "page=1"));
        assert!(job_detail(Uuid::nil()).starts_with("jobs:detail:"));
    }
}
