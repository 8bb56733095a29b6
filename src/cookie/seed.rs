//! Seed cookies supplied when a session is constructed.

use std::sync::Arc;

use tracing::debug;

use super::{Cookie, CookieJar};

/// Cookies handed to a session up front instead of being obtained by login.
///
/// A top-level [`SeedCookies::Jar`] is adopted by reference. Every other shape
/// is flattened into a fresh jar; lists may nest arbitrarily and a jar found
/// inside a list contributes copies of its cookies.
#[derive(Debug, Clone)]
pub enum SeedCookies {
    /// An existing jar, shared with the caller.
    Jar(Arc<CookieJar>),
    /// A `Set-Cookie` style string, e.g. `sid=abc; Domain=.example.org; Path=/`.
    Raw(String),
    /// A structured cookie record.
    Record(Cookie),
    /// Any mix of the above.
    List(Vec<SeedCookies>),
}

impl From<&str> for SeedCookies {
    fn from(value: &str) -> Self {
        Self::Raw(value.to_string())
    }
}

impl From<String> for SeedCookies {
    fn from(value: String) -> Self {
        Self::Raw(value)
    }
}

impl From<Cookie> for SeedCookies {
    fn from(value: Cookie) -> Self {
        Self::Record(value)
    }
}

impl From<Arc<CookieJar>> for SeedCookies {
    fn from(value: Arc<CookieJar>) -> Self {
        Self::Jar(value)
    }
}

impl<T: Into<SeedCookies>> From<Vec<T>> for SeedCookies {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Resolves seed input into the jar a session will use.
///
/// Returns the jar and whether it counts as an established session: true iff
/// a fresh jar was built and at least one cookie made it in. An adopted jar
/// never counts, whatever it holds.
pub(crate) fn build_seeded_jar(seed: Option<SeedCookies>) -> (Arc<CookieJar>, bool) {
    match seed {
        Some(SeedCookies::Jar(jar)) => (jar, false),
        other => {
            let jar = CookieJar::new();
            if let Some(seed) = other {
                fill_jar(&jar, seed);
            }
            let established = !jar.is_empty();
            (Arc::new(jar), established)
        }
    }
}

fn fill_jar(jar: &CookieJar, seed: SeedCookies) {
    match seed {
        SeedCookies::Jar(source) => {
            for cookie in source.cookies() {
                jar.insert_or_replace(cookie);
            }
        }
        SeedCookies::Raw(raw) => match Cookie::parse(&raw) {
            Ok(cookie) => {
                if !jar.insert_or_replace(cookie) {
                    debug!("seed cookie string rejected by jar");
                }
            }
            Err(error) => debug!(reason = %error, "skipping malformed seed cookie string"),
        },
        SeedCookies::Record(cookie) => {
            if !jar.insert_or_replace(cookie) {
                debug!("seed cookie record rejected by jar");
            }
        }
        SeedCookies::List(items) => {
            for item in items {
                fill_jar(jar, item);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn seed_string() -> String {
        let expires = SystemTime::now() + Duration::from_secs(2 * 60 * 60);
        format!(
            "sessionToken=abc123; Domain=.httpbin.org; Path=/; Expires={}",
            httpdate::fmt_http_date(expires)
        )
    }

    #[test]
    fn test_every_seed_shape_flattens_to_same_jar() {
        let raw = seed_string();
        let expected = vec![Cookie::parse(&raw).unwrap()];

        let shapes: Vec<SeedCookies> = vec![
            raw.clone().into(),
            vec![raw.clone()].into(),
            Cookie::parse(&raw).unwrap().into(),
            vec![Cookie::parse(&raw).unwrap()].into(),
        ];

        for shape in shapes {
            let (jar, established) = build_seeded_jar(Some(shape.clone()));
            assert_eq!(jar.cookies(), expected, "shape {shape:?}");
            assert!(established, "non-empty seed must establish the session");
        }
    }

    #[test]
    fn test_absent_seed_builds_empty_fresh_jar() {
        let (jar, established) = build_seeded_jar(None);
        assert!(jar.is_empty());
        assert!(!established);
    }

    #[test]
    fn test_top_level_jar_is_adopted_by_reference() {
        let shared = Arc::new(CookieJar::new());
        shared.insert_or_replace(Cookie::parse(&seed_string()).unwrap());

        let (jar, established) = build_seeded_jar(Some(Arc::clone(&shared).into()));
        assert!(Arc::ptr_eq(&jar, &shared));
        assert!(!established, "adopted jar leaves the session fresh");

        jar.insert_or_replace(Cookie::new("extra", "1", "httpbin.org"));
        assert_eq!(shared.len(), 2, "caller sees writes through its handle");
    }

    #[test]
    fn test_nested_lists_and_jars_are_flattened() {
        let inner = Arc::new(CookieJar::new());
        inner.insert_or_replace(Cookie::new("from_jar", "1", "example.org"));

        let seed = SeedCookies::List(vec![
            SeedCookies::List(vec!["a=1; Domain=example.org".into()]),
            SeedCookies::Jar(Arc::clone(&inner)),
            Cookie::new("b", "2", "example.org").into(),
        ]);
        let (jar, established) = build_seeded_jar(Some(seed));
        let names: Vec<String> = jar.cookies().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["a", "from_jar", "b"]);
        assert!(established);
        assert!(!Arc::ptr_eq(&jar, &inner));
    }

    #[test]
    fn test_malformed_entries_are_skipped_silently() {
        let seed = SeedCookies::List(vec![
            "no pair here".into(),
            "nodomain=1".into(),
            Cookie::new("bad name", "v", "example.org").into(),
        ]);
        let (jar, established) = build_seeded_jar(Some(seed));
        assert!(jar.is_empty());
        assert!(!established);
    }
}
