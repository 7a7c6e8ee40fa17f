//! Routing tree types and per-receiver route synthesis.
//!
//! Migrated alerts carry a contact label listing the receivers they notify.
//! Each receiver gets one child route under the root whose regex matcher
//! selects alerts whose contact label mentions that receiver.

use crate::config::CONTACT_LABEL;
use crate::core::{ChannelKey, Receiver};
use crate::error::{MigrationError, MigrationResult};
use crate::receivers::MigrationIndex;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// The comparison a matcher applies to a label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "=~")]
    Regexp,
    #[serde(rename = "!~")]
    NotRegexp,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            MatchType::Equal => "=",
            MatchType::NotEqual => "!=",
            MatchType::Regexp => "=~",
            MatchType::NotRegexp => "!~",
        };
        f.write_str(op)
    }
}

/// A single label matcher.
///
/// Serialized the way Alertmanager reads `object_matchers`: a
/// `[name, operator, value]` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub kind: MatchType,
    pub name: String,
    pub value: String,
}

impl Matcher {
    /// Compiles the value of a regex matcher, anchored at both ends.
    fn compile(&self) -> MigrationResult<Regex> {
        Regex::new(&format!("^(?:{})$", self.value)).map_err(|e| {
            MigrationError::InvalidConfiguration(format!("matcher {} is not a valid regex: {}", self, e))
        })
    }

    /// Checks that a regex matcher's value compiles.
    pub fn validate(&self) -> MigrationResult<()> {
        CompiledMatcher::new(self).map(|_| ())
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{:?}", self.name, self.kind, self.value)
    }
}

impl Serialize for Matcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.name, self.kind, &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (name, kind, value) = <(String, MatchType, String)>::deserialize(deserializer)?;
        Ok(Matcher { kind, name, value })
    }
}

/// A matcher with its regex compiled once.
struct CompiledMatcher<'a> {
    matcher: &'a Matcher,
    regex: Option<Regex>,
}

impl<'a> CompiledMatcher<'a> {
    fn new(matcher: &'a Matcher) -> MigrationResult<Self> {
        let regex = match matcher.kind {
            MatchType::Regexp | MatchType::NotRegexp => Some(matcher.compile()?),
            MatchType::Equal | MatchType::NotEqual => None,
        };
        Ok(Self { matcher, regex })
    }

    /// A missing label compares as the empty string.
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.matcher.name).map(String::as_str).unwrap_or("");
        match (self.matcher.kind, &self.regex) {
            (MatchType::Equal, _) => value == self.matcher.value,
            (MatchType::NotEqual, _) => value != self.matcher.value,
            (MatchType::Regexp, Some(regex)) => regex.is_match(value),
            (MatchType::NotRegexp, Some(regex)) => !regex.is_match(value),
            (MatchType::Regexp | MatchType::NotRegexp, None) => false,
        }
    }
}

/// A node of the routing tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub receiver: String,
    #[serde(rename = "object_matchers", default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<Matcher>,
    /// Keep evaluating sibling routes after this one matched.
    #[serde(rename = "continue", default)]
    pub continue_matching: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
}

impl Route {
    /// Compiles every matcher of the tree, failing on the first invalid regex.
    pub fn compile(&self) -> MigrationResult<CompiledRoute<'_>> {
        let matchers = self
            .matchers
            .iter()
            .map(CompiledMatcher::new)
            .collect::<MigrationResult<Vec<_>>>()?;
        let routes = self
            .routes
            .iter()
            .map(Route::compile)
            .collect::<MigrationResult<Vec<_>>>()?;
        Ok(CompiledRoute {
            route: self,
            matchers,
            routes,
        })
    }

    /// Returns the receivers an alert with the given labels is delivered to.
    ///
    /// Compiles the tree on every call; use [`Route::compile`] when
    /// evaluating many label sets.
    pub fn matching_receivers(&self, labels: &BTreeMap<String, String>) -> MigrationResult<Vec<&str>> {
        Ok(self.compile()?.matching_receivers(labels))
    }

    /// Visits this node and all of its descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Route)) {
        visit(self);
        for child in &self.routes {
            child.walk(visit);
        }
    }
}

/// A routing tree whose regex matchers are compiled, ready for evaluation.
pub struct CompiledRoute<'a> {
    route: &'a Route,
    matchers: Vec<CompiledMatcher<'a>>,
    routes: Vec<CompiledRoute<'a>>,
}

impl<'a> CompiledRoute<'a> {
    /// Whether every matcher of this node matches the labels.
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(labels))
    }

    /// Returns the receivers an alert with the given labels is delivered to.
    ///
    /// Children are tried in order. A matching child without `continue` stops
    /// the search among its siblings. A node only uses its own receiver when
    /// none of its children matched.
    pub fn matching_receivers(&self, labels: &BTreeMap<String, String>) -> Vec<&'a str> {
        if !self.matches(labels) {
            return Vec::new();
        }

        let mut receivers = Vec::new();
        for child in &self.routes {
            let matched = child.matching_receivers(labels);
            if matched.is_empty() {
                continue;
            }
            receivers.extend(matched);
            if !child.route.continue_matching {
                break;
            }
        }

        if receivers.is_empty() {
            receivers.push(self.route.receiver.as_str());
        }
        receivers
    }
}

/// Quotes a receiver name the way it appears inside the contact label.
///
/// Quotes, commas and percent signs inside the name are percent-encoded, so a
/// quoted name never occurs inside the label of a different name.
fn quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        match c {
            '%' => quoted.push_str("%25"),
            '"' => quoted.push_str("%22"),
            ',' => quoted.push_str("%2C"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Builds the child route that selects alerts routed to `receiver`.
pub fn create_route(receiver: &Receiver) -> MigrationResult<Route> {
    let matcher = Matcher {
        kind: MatchType::Regexp,
        name: CONTACT_LABEL.to_string(),
        value: format!(".*{}.*", regex::escape(&quote(&receiver.name))),
    };
    matcher.validate()?;

    Ok(Route {
        receiver: receiver.name.clone(),
        matchers: vec![matcher],
        continue_matching: true,
        routes: Vec::new(),
        group_by: None,
    })
}

/// Renders the contact label value for a set of receiver names.
pub fn contact_label_value(receiver_names: &BTreeSet<String>) -> String {
    receiver_names.iter().map(|name| quote(name)).join(",")
}

/// Looks up the receiver an alert's channel reference points at.
pub fn resolve_receiver<'a>(
    alert_id: i64,
    key: &ChannelKey,
    index: &'a MigrationIndex,
) -> MigrationResult<&'a Rc<Receiver>> {
    index
        .get(key)
        .ok_or_else(|| MigrationError::UnknownReceiverReference {
            alert_id,
            key: key.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receivers::build_receivers;
    use crate::test_utils::channel;

    fn receiver(name: &str) -> Receiver {
        Receiver {
            name: name.to_string(),
            integrations: Vec::new(),
        }
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn node_matches(route: &Route, labels: &BTreeMap<String, String>) -> bool {
        route.compile().unwrap().matches(labels)
    }

    #[test]
    fn test_route_regex_matches_quoted_name_with_continue() {
        let route = create_route(&receiver("recv1")).unwrap();

        let expected = Route {
            receiver: "recv1".to_string(),
            matchers: vec![Matcher {
                kind: MatchType::Regexp,
                name: "__contacts__".to_string(),
                value: r#".*"recv1".*"#.to_string(),
            }],
            continue_matching: true,
            routes: Vec::new(),
            group_by: None,
        };
        assert_eq!(route, expected);
    }

    #[test]
    fn test_special_characters_in_names_are_escaped() {
        let route = create_route(&receiver("ops.team (eu)")).unwrap();
        assert_eq!(route.matchers[0].value, r#".*"ops\.team \(eu\)".*"#);

        let names: BTreeSet<String> = ["ops.team (eu)".to_string()].into();
        let alert = labels(&[("__contacts__", &contact_label_value(&names))]);
        assert!(node_matches(&route, &alert));
        assert!(!node_matches(&route, &labels(&[("__contacts__", r#""opsxteam (eu)""#)])));
    }

    #[test]
    fn test_contact_label_lists_sorted_quoted_names() {
        let names: BTreeSet<String> = ["recv2".to_string(), "recv1".to_string()].into();
        assert_eq!(contact_label_value(&names), r#""recv1","recv2""#);
    }

    #[test]
    fn test_route_does_not_match_name_prefixes() {
        let route = create_route(&receiver("recv")).unwrap();
        let names: BTreeSet<String> = ["recv1".to_string()].into();
        let alert = labels(&[("__contacts__", &contact_label_value(&names))]);
        assert!(!node_matches(&route, &alert));
    }

    #[test]
    fn test_names_with_quotes_and_commas_do_not_overlap() {
        let tricky = r#"a","b"#;
        let names = ["b", tricky, ",", "100%"];
        let mut root = create_route(&receiver("default")).unwrap();
        root.matchers.clear();
        for name in names {
            root.routes.push(create_route(&receiver(name)).unwrap());
        }
        let compiled = root.compile().unwrap();

        for name in names {
            let only: BTreeSet<String> = [name.to_string()].into();
            let alert = labels(&[("__contacts__", &contact_label_value(&only))]);
            assert_eq!(compiled.matching_receivers(&alert), vec![name]);
        }
        let only: BTreeSet<String> = [tricky.to_string()].into();
        assert_eq!(contact_label_value(&only), r#""a%22%2C%22b""#);
    }

    #[test]
    fn test_matchers_serialize_as_triples() {
        let route = create_route(&receiver("recv1")).unwrap();
        let value = serde_json::to_value(&route).unwrap();
        assert_eq!(
            value["object_matchers"],
            serde_json::json!([["__contacts__", "=~", r#".*"recv1".*"#]])
        );

        let parsed: Route = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, route);
    }

    #[test]
    fn test_invalid_regex_fails_to_compile() {
        let mut route = create_route(&receiver("recv1")).unwrap();
        route.matchers[0].value = "(unclosed".to_string();
        assert!(matches!(route.compile(), Err(MigrationError::InvalidConfiguration(_))));
        assert!(route.matching_receivers(&labels(&[])).is_err());
    }

    #[test]
    fn test_matching_receivers_follows_continue() {
        let mut root = Route {
            receiver: "default".to_string(),
            matchers: Vec::new(),
            continue_matching: false,
            routes: Vec::new(),
            group_by: None,
        };
        root.routes.push(create_route(&receiver("recv1")).unwrap());
        root.routes.push(create_route(&receiver("recv2")).unwrap());

        let both: BTreeSet<String> = ["recv1".to_string(), "recv2".to_string()].into();
        let alert = labels(&[("__contacts__", &contact_label_value(&both))]);
        assert_eq!(root.matching_receivers(&alert).unwrap(), vec!["recv1", "recv2"]);

        root.routes[0].continue_matching = false;
        assert_eq!(root.matching_receivers(&alert).unwrap(), vec!["recv1"]);

        assert_eq!(root.matching_receivers(&labels(&[])).unwrap(), vec!["default"]);
    }

    #[test]
    fn test_unknown_reference_is_reported() {
        let index = build_receivers(&[channel("uid1", 1, "recv1")]).unwrap();
        assert_eq!(resolve_receiver(3, &ChannelKey::Id(1), &index).unwrap().name, "recv1");

        let err = resolve_receiver(3, &ChannelKey::from("missing"), &index).unwrap_err();
        assert!(matches!(err, MigrationError::UnknownReceiverReference { alert_id: 3, .. }));
    }
}
