// Request bodies for mutating operations
//
// Everything that changes server state is either an `<opsview>` XML document
// POSTed to `api`, or the acknowledgement form. The functions here are pure:
// they only render bodies, the client sends them.

use std::fmt;

use chrono::NaiveDateTime;
use indexmap::{IndexMap, IndexSet};
use quick_xml::escape::escape;

use crate::error::Error;

/// Keys `create_host` and `clone_host` refuse to send without.
pub const REQUIRED_HOST_ATTRIBUTES: [&str; 2] = ["name", "ip"];

const DOWNTIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// ── Host attributes ─────────────────────────────────────────────────

/// Ordered host attributes; nested maps render as nested elements.
pub type Fields = IndexMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Nested(Fields),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Fields> for FieldValue {
    fn from(value: Fields) -> Self {
        Self::Nested(value)
    }
}

/// Build `Fields` from `(key, value)` pairs, keeping their order.
pub fn fields<K, V, I>(pairs: I) -> Fields
where
    K: Into<String>,
    V: Into<FieldValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Renders fields as sibling elements, recursing into nested maps.
struct FieldsXml<'a>(&'a Fields);

impl fmt::Display for FieldsXml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.0 {
            let tag = escape(key.as_str());
            match value {
                FieldValue::Text(text) => write!(f, "<{tag}>{}</{tag}>", escape(text.as_str()))?,
                FieldValue::Nested(inner) => write!(f, "<{tag}>{}</{tag}>", FieldsXml(inner))?,
            }
        }
        Ok(())
    }
}

fn check_required(attrs: &Fields) -> Result<(), Error> {
    let missing: Vec<String> = REQUIRED_HOST_ATTRIBUTES
        .iter()
        .filter(|key| !attrs.contains_key(**key))
        .map(|key| (*key).to_owned())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingAttribute { missing })
    }
}

// ── Addressing ──────────────────────────────────────────────────────

/// How a host or hostgroup is addressed in an `<opsview>` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(String),
    Name(String),
}

impl Target {
    /// All-digit identifiers are ids, anything else is a name.
    pub fn parse(identifier: &str) -> Self {
        if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
            Self::Id(identifier.to_owned())
        } else {
            Self::Name(identifier.to_owned())
        }
    }

    fn attribute(&self) -> (&'static str, &str) {
        match self {
            Self::Id(id) => ("by_id", id),
            Self::Name(name) => ("by_name", name),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (attr, value) = self.attribute();
        write!(f, r#"{attr}="{}""#, escape(value))
    }
}

// ── XML commands ────────────────────────────────────────────────────

fn opsview(inner: &str) -> String {
    format!("<opsview>{inner}</opsview>")
}

pub fn create_host(attrs: &Fields) -> Result<String, Error> {
    check_required(attrs)?;
    Ok(opsview(&format!(
        r#"<host action="create">{}</host>"#,
        FieldsXml(attrs)
    )))
}

/// Like `create_host`, copying everything else from `source_name`.
pub fn clone_host(source_name: &str, attrs: &Fields) -> Result<String, Error> {
    check_required(attrs)?;
    Ok(opsview(&format!(
        r#"<host action="create"><clone><name>{}</name></clone>{}</host>"#,
        escape(source_name),
        FieldsXml(attrs)
    )))
}

pub fn delete_host(identifier: &str) -> String {
    opsview(&format!(
        r#"<host action="delete" {}/>"#,
        Target::parse(identifier)
    ))
}

fn change_hostgroup(hostgroup: &str, directive: &str) -> String {
    opsview(&format!(
        r#"<hostgroup action="change" {}>{directive}</hostgroup>"#,
        Target::parse(hostgroup)
    ))
}

pub fn schedule_downtime(
    hostgroup: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    comment: &str,
) -> String {
    change_hostgroup(
        hostgroup,
        &format!(
            r#"<downtime start="{}" end="{}" comment="{}">enable</downtime>"#,
            start.format(DOWNTIME_FORMAT),
            end.format(DOWNTIME_FORMAT),
            escape(comment)
        ),
    )
}

pub fn disable_scheduled_downtime(hostgroup: &str) -> String {
    change_hostgroup(hostgroup, "<downtime>disable</downtime>")
}

pub fn enable_notifications(hostgroup: &str) -> String {
    change_hostgroup(hostgroup, "<notifications>enable</notifications>")
}

pub fn disable_notifications(hostgroup: &str) -> String {
    change_hostgroup(hostgroup, "<notifications>disable</notifications>")
}

pub fn reload() -> String {
    opsview(r#"<system action="reload"/>"#)
}

// ── Acknowledgements ────────────────────────────────────────────────

/// What to acknowledge on a host: the host itself or one of its services.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AckTarget {
    Host,
    Service(String),
}

/// Host name → things to acknowledge on it, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acknowledgements {
    targets: IndexMap<String, IndexSet<AckTarget>>,
}

impl Acknowledgements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.add(host, AckTarget::Host);
        self
    }

    pub fn service(mut self, host: impl Into<String>, service: impl Into<String>) -> Self {
        self.add(host, AckTarget::Service(service.into()));
        self
    }

    pub fn add(&mut self, host: impl Into<String>, target: AckTarget) {
        self.targets.entry(host.into()).or_default().insert(target);
    }

    pub fn is_empty(&self) -> bool {
        self.targets.values().all(IndexSet::is_empty)
    }

    /// Flattened `(host, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AckTarget)> {
        self.targets
            .iter()
            .flat_map(|(host, targets)| targets.iter().map(move |t| (host.as_str(), t)))
    }
}

/// Flags sent alongside an acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckOptions {
    pub notify: bool,
    pub auto_remove_comment: bool,
}

impl Default for AckOptions {
    fn default() -> Self {
        Self {
            notify: true,
            auto_remove_comment: true,
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Form fields for the acknowledgement handler, in send order.
pub fn acknowledge(
    from: &str,
    targets: &Acknowledgements,
    comment: &str,
    options: &AckOptions,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("from".to_owned(), from.to_owned()),
        ("submit".to_owned(), "Submit".to_owned()),
        ("comment".to_owned(), comment.to_owned()),
        ("notify".to_owned(), on_off(options.notify).to_owned()),
        (
            "autoremovecomment".to_owned(),
            on_off(options.auto_remove_comment).to_owned(),
        ),
    ];
    form.extend(targets.iter().map(|(host, target)| match target {
        AckTarget::Service(service) => ("service_selection".to_owned(), format!("{host};{service}")),
        AckTarget::Host => ("host_selection".to_owned(), host.to_owned()),
    }));
    form
}

/// `application/x-www-form-urlencoded` rendering of form fields.
pub fn encode_form(form: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form)
        .finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn create_host_renders_attributes_in_order() {
        let body = create_host(&fields([("name", "h1"), ("ip", "10.0.0.1")])).unwrap();
        assert_snapshot!(body, @r#"<opsview><host action="create"><name>h1</name><ip>10.0.0.1</ip></host></opsview>"#);
    }

    #[test]
    fn create_host_expands_nested_maps() {
        let mut attrs = fields([("name", "h1"), ("ip", "10.0.0.1")]);
        attrs.insert(
            "hostgroup".into(),
            FieldValue::Nested(fields([("name", "Web & Mail")])),
        );
        let body = create_host(&attrs).unwrap();
        assert!(
            body.contains("<hostgroup><name>Web &amp; Mail</name></hostgroup>"),
            "{body}"
        );
    }

    #[test]
    fn create_host_requires_name() {
        let err = create_host(&fields([("ip", "10.0.0.1")])).unwrap_err();
        match err {
            Error::MissingAttribute { missing } => assert_eq!(missing, ["name"]),
            other => panic!("expected MissingAttribute, got {other:?}"),
        }
    }

    #[test]
    fn clone_host_names_the_source_first() {
        let body = clone_host("template", &fields([("name", "h2"), ("ip", "10.0.0.2")])).unwrap();
        assert_snapshot!(body, @r#"<opsview><host action="create"><clone><name>template</name></clone><name>h2</name><ip>10.0.0.2</ip></host></opsview>"#);
    }

    #[test]
    fn clone_host_validates_like_create() {
        let err = clone_host("template", &Fields::new()).unwrap_err();
        match err {
            Error::MissingAttribute { missing } => assert_eq!(missing, ["name", "ip"]),
            other => panic!("expected MissingAttribute, got {other:?}"),
        }
    }

    #[test]
    fn delete_host_picks_id_or_name() {
        assert_eq!(
            delete_host("42"),
            r#"<opsview><host action="delete" by_id="42"/></opsview>"#
        );
        assert_eq!(
            delete_host("web1"),
            r#"<opsview><host action="delete" by_name="web1"/></opsview>"#
        );
        assert_eq!(Target::parse(""), Target::Name(String::new()));
        assert_eq!(Target::parse("4a"), Target::Name("4a".into()));
    }

    #[test]
    fn downtime_wraps_a_hostgroup_change() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(22, 0, 0)
            .unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 2)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let body = schedule_downtime("7", start, end, "patching \"db\"");
        assert_snapshot!(body, @r#"<opsview><hostgroup action="change" by_id="7"><downtime start="2024-06-01 22:00" end="2024-06-02 02:30" comment="patching &quot;db&quot;">enable</downtime></hostgroup></opsview>"#);
    }

    #[test]
    fn hostgroup_toggles() {
        assert_eq!(
            disable_scheduled_downtime("Web"),
            r#"<opsview><hostgroup action="change" by_name="Web"><downtime>disable</downtime></hostgroup></opsview>"#
        );
        assert!(enable_notifications("3").contains(r#"by_id="3"><notifications>enable</notifications>"#));
        assert!(disable_notifications("Web").contains("<notifications>disable</notifications>"));
    }

    #[test]
    fn reload_is_fixed() {
        assert_eq!(reload(), r#"<opsview><system action="reload"/></opsview>"#);
    }

    #[test]
    fn acknowledge_form_flattens_targets() {
        let targets = Acknowledgements::new()
            .service("h1", "svc1")
            .host("h2")
            .service("h2", "disk");
        let form = acknowledge(
            "https://opsview.example/",
            &targets,
            "down",
            &AckOptions {
                notify: false,
                auto_remove_comment: true,
            },
        );
        let encoded = encode_form(&form);
        assert_snapshot!(encoded, @"from=https%3A%2F%2Fopsview.example%2F&submit=Submit&comment=down&notify=off&autoremovecomment=on&service_selection=h1%3Bsvc1&host_selection=h2&service_selection=h2%3Bdisk");
    }

    #[test]
    fn duplicate_targets_collapse() {
        let targets = Acknowledgements::new().host("h1").host("h1");
        assert_eq!(targets.iter().count(), 1);
        assert!(Acknowledgements::new().is_empty());
    }
}
