use serde::{Deserialize, Serialize};

/// Named status filters accepted by `api/status/*`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StatusFilter {
    Ok,
    Warning,
    Critical,
    Unknown,
    Unhandled,
}

impl StatusFilter {
    /// The query parameter this filter contributes.
    pub fn query_pair(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("state", "0"),
            Self::Warning => ("state", "1"),
            Self::Critical => ("state", "2"),
            Self::Unknown => ("state", "3"),
            Self::Unhandled => ("filter", "unhandled"),
        }
    }
}

/// Query parameters for a filter list, in the order given.
pub(crate) fn query_params(filters: &[StatusFilter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let (key, value) = f.query_pair();
            (key.to_owned(), value.to_owned())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn filter_set_is_closed() {
        let names: Vec<String> = StatusFilter::iter().map(|f| f.to_string()).collect();
        assert_eq!(names, ["ok", "warning", "critical", "unknown", "unhandled"]);
    }

    #[test]
    fn filters_map_to_query_pairs() {
        assert_eq!(StatusFilter::Critical.query_pair(), ("state", "2"));
        assert_eq!(StatusFilter::Unhandled.query_pair(), ("filter", "unhandled"));
        assert_eq!(
            query_params(&[StatusFilter::Warning, StatusFilter::Unknown]),
            [
                ("state".to_owned(), "1".to_owned()),
                ("state".to_owned(), "3".to_owned())
            ]
        );
    }

    #[test]
    fn filters_parse_from_names() {
        assert_eq!("Warning".parse::<StatusFilter>().unwrap(), StatusFilter::Warning);
        assert!("pending".parse::<StatusFilter>().is_err());
    }
}
