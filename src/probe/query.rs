use std::borrow::Cow;

use serde::{Deserialize, Serialize};


/// Body of the query sent to the search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryRequest<'a> {
    pub kind: Cow<'a, str>,
    pub limit: u32,
    pub query: Cow<'a, str>,
}

impl QueryRequest<'static> {
    /// The one query the probe ever sends: ten wells matching "10".
    pub const PROBE: Self = Self {
        kind: Cow::Borrowed("ihs:well:1.0.0"),
        limit: 10,
        query: Cow::Borrowed("10"),
    };
}

impl QueryRequest<'_> {
    pub fn to_json(&self) -> Vec<u8> {
        // Only strings and integers: serializing cannot fail.
        serde_json::to_vec(self).expect("failed to serialize query")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_body_is_exact() {
        assert_eq!(
            std::str::from_utf8(&QueryRequest::PROBE.to_json()).unwrap(),
            r#"{"kind":"ihs:well:1.0.0","limit":10,"query":"10"}"#,
        );
    }

    #[test]
    fn parsing_yields_the_three_fields() {
        let json = QueryRequest::PROBE.to_json();
        let parsed: QueryRequest = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, QueryRequest::PROBE);

        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["kind"], "ihs:well:1.0.0");
        assert_eq!(fields["limit"], 10);
        assert_eq!(fields["query"], "10");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{"kind":"ihs:well:1.0.0","limit":10,"query":"10","offset":0}"#;
        assert!(serde_json::from_str::<QueryRequest>(json).is_err());
    }

    #[test]
    fn body_has_no_byte_order_mark() {
        assert_eq!(QueryRequest::PROBE.to_json()[0], b'{');
    }
}
